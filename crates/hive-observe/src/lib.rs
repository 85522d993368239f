mod logger;
pub use logger::*;

mod status;
pub use status::{LoggingSink, log_transition, message_for};
