//! Round-robin worklist of remote sensors

use crate::model::Target;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct Worklist {
    entries: Mutex<VecDeque<Target>>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Target>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the worklist with `targets`. Entries already queued keep
    /// their position, new ones go to the back, the rest are dropped.
    pub fn set_devices(&self, targets: &[Target]) {
        let mut entries = self.lock();
        let mut next: VecDeque<Target> = entries
            .iter()
            .filter(|e| targets.contains(e))
            .cloned()
            .collect();
        for target in targets {
            if !next.contains(target) {
                next.push_back(target.clone());
            }
        }
        *entries = next;
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Take the head and requeue it at the tail
    pub fn rotate(&self) -> Option<Target> {
        let mut entries = self.lock();
        let head = entries.pop_front()?;
        entries.push_back(head.clone());
        Some(head)
    }

    pub fn snapshot(&self) -> Vec<Target> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
