//! Process-local record of names already synced

use std::collections::HashSet;
use std::sync::Mutex;

/// Names this process has finished with
///
/// Holds two sets that only grow and are never persisted: names confirmed
/// in the destination, and names rejected for a reason specific to the
/// file (unreadable content, a request the store refuses outright).
/// After a restart the destination store is the only record of what was
/// uploaded, and rejected files get one fresh attempt.
#[derive(Debug, Default)]
pub struct SyncLedger {
    inner: Mutex<LedgerSets>,
}

#[derive(Debug, Default)]
struct LedgerSets {
    synced: HashSet<String>,
    rejected: HashSet<String>,
}

impl SyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().unwrap().synced.contains(name)
    }

    /// Record a synced name; returns false if it was already present
    pub fn insert(&self, name: &str) -> bool {
        let mut sets = self.inner.lock().unwrap();
        sets.rejected.remove(name);
        sets.synced.insert(name.to_string())
    }

    /// Stop offering a name for the rest of the run
    pub fn reject(&self, name: &str) -> bool {
        self.inner.lock().unwrap().rejected.insert(name.to_string())
    }

    pub fn is_rejected(&self, name: &str) -> bool {
        self.inner.lock().unwrap().rejected.contains(name)
    }

    pub fn rejected_len(&self) -> usize {
        self.inner.lock().unwrap().rejected.len()
    }

    /// Number of synced names
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().synced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
