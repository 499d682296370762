pub mod clock;
pub mod panic;
pub mod telemetry;

pub use clock::*;
pub use panic::*;
pub use telemetry::*;
