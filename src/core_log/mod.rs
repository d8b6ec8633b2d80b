pub mod events;
pub mod logger;

pub use events::{EventSink, FtpEvent, LogSink, NullSink};
