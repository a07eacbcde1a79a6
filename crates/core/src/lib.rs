#![forbid(unsafe_code)]

pub mod model;
pub mod session_name;
pub mod time;

pub use session_name::{SessionName, current_session_name, next_session_name};
pub use time::Clock;
