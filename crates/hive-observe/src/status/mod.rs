mod sink;
mod view;

pub use sink::LoggingSink;
pub use view::{log_transition, message_for};
