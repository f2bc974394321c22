//! Bookkeeping of outstanding remote work, for timeout reports

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Seeds or identifiers whose remote calls have not completed yet
///
/// Only the coordinating task updates it; a clone is kept by whoever needs
/// to report what was left when a deadline hit.
#[derive(Clone, Default)]
pub struct PendingWork {
    items: Arc<Mutex<BTreeSet<String>>>,
}

impl PendingWork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, item: &str) {
        self.lock().insert(item.to_string());
    }

    pub fn remove(&self, item: &str) {
        self.lock().remove(item);
    }

    /// Outstanding items, sorted
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
