pub mod engine;
pub mod retry;
pub mod timer;
pub mod types;

pub use engine::SyncEngine;
pub use retry::PollPolicy;
pub use timer::TimerController;
pub use types::{SyncError, TickFlow};
