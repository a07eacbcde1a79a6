mod engine;
mod result_sync;

// Public API of the quiz session subsystem.
pub use crate::error::QuizError;
pub use engine::QuizEngine;
pub use result_sync::{PendingSync, ResultSync, TeardownRequest};
