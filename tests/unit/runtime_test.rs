//! Tests for tokio spawner utilities

use futures::FutureExt;
use prometheus_command_scheduler::runtime::{Spawn, TokioSpawner};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(
        async move {
            tx.send(123).unwrap();
        }
        .boxed(),
    );

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_owned_runtime_spawner() {
    let spawner = TokioSpawner::with_worker_threads(1).expect("runtime builds");
    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(
        async move {
            tx.send("ran").unwrap();
        }
        .boxed(),
    );
    assert_eq!(rx.recv().expect("task ran"), "ran");
}
