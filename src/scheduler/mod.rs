// src/scheduler/mod.rs - Tick pacing and wall-clock mapping
pub mod clock;
pub mod ticker;

pub use clock::{Clock, SystemClock, TokioClock};
pub use ticker::Ticker;
