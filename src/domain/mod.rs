pub mod ticket;
pub mod types;

pub use ticket::{Conversation, CustomerMessage, Ticket, TicketEvent, TicketStatus, TicketUpdate};
pub use types::{ActionTaken, AnalysisOutcome, ClassificationResult, CycleStatistics, SpamOverview};
