pub mod processed;
pub mod processor;
pub mod scheduler;

pub use processor::{EventError, ProcessorSettings, TicketProcessor};
