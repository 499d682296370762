//! Tests for command identity and the running view

use std::sync::Arc;

use prometheus_command_scheduler::core::{CommandId, RunningView, Schedulable, Strategy};

struct Fixed {
    id: CommandId,
    name: &'static str,
    strategy: Option<Strategy>,
}

impl Schedulable for Fixed {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn strategy(&self) -> Option<&Strategy> {
        self.strategy.as_ref()
    }

    fn should_block(&self, _other: &dyn Schedulable) -> bool {
        self.strategy.as_ref().is_some_and(Strategy::is_exclusive)
    }
}

fn fixed(name: &'static str, strategy: Option<Strategy>) -> Arc<dyn Schedulable> {
    Arc::new(Fixed {
        id: CommandId::new(),
        name,
        strategy,
    })
}

#[test]
fn test_command_ids_are_unique() {
    let first = CommandId::new();
    let second = CommandId::default();
    assert_ne!(first, second);
    assert_eq!(first.to_string(), first.as_uuid().to_string());
}

#[test]
fn test_command_id_serializes_as_uuid() {
    let id = CommandId::new();
    let value = serde_json::to_value(id).expect("id serializes");
    assert_eq!(value, serde_json::Value::String(id.to_string()));
    let back: CommandId = serde_json::from_value(value).expect("id deserializes");
    assert_eq!(back, id);
}

#[test]
fn test_running_view_queries() {
    let running = vec![
        fixed("upload", Some(Strategy::Concurrent)),
        fixed("refresh", Some(Strategy::single_with_tag("Refresh"))),
    ];
    let view = RunningView::new(&running);

    assert_eq!(view.len(), 2);
    assert!(!view.is_empty());
    assert!(view.contains(running[1].id()));
    assert!(!view.contains(CommandId::new()));
    assert!(view.any(|command| command.strategy().and_then(Strategy::tag).is_some()));
    let names: Vec<&str> = view.iter().map(|command| command.name()).collect();
    assert_eq!(names, vec!["upload", "refresh"]);
}

#[test]
fn test_schedulable_debug_output() {
    let command = fixed("plain", None);
    let rendered = format!("{:?}", &*command);
    assert!(rendered.contains("plain"));
    assert!(!command.should_block(&*fixed("other", None)));
}
