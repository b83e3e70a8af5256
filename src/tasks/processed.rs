use std::collections::HashSet;

use parking_lot::Mutex;

/// Ids of tickets fully handled during this process lifetime. Not persisted.
#[derive(Debug, Default)]
pub struct ProcessedTicketSet {
    ids: Mutex<HashSet<u64>>,
}

impl ProcessedTicketSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, ticket_id: u64) -> bool {
        self.ids.lock().contains(&ticket_id)
    }

    /// Returns `false` when the id was already present.
    pub fn insert(&self, ticket_id: u64) -> bool {
        self.ids.lock().insert(ticket_id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }
}
