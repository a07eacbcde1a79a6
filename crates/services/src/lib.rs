#![forbid(unsafe_code)]

pub mod error;
pub mod http_backend;
pub mod sessions;
pub mod timer;

pub use quiz_core::Clock;

pub use error::{BackendError, QuizError, TimerError};
pub use http_backend::{BackendConfig, HttpBackend};
pub use sessions::{PendingSync, QuizEngine, ResultSync, TeardownRequest};
pub use timer::{CountdownTimer, TimerState};
