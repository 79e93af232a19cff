//! Set of agent names that currently hold a live agent session.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Tracks which agent names are connected.
///
/// A name is claimed when its agent session is accepted and released when
/// that session is removed. Claims never wait or replace: a second claim for
/// a held name fails and leaves the set untouched.
#[derive(Debug, Default)]
pub struct AgentPresence {
    names: Mutex<HashSet<String>>,
}

impl AgentPresence {
    pub fn new() -> Self {
        Self::default()
    }

    // The set stays consistent even if a holder panicked mid-insert.
    fn names(&self) -> MutexGuard<'_, HashSet<String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `name`. Returns `false` if it is already held.
    pub fn claim(&self, name: &str) -> bool {
        let mut names = self.names();
        if names.contains(name) {
            return false;
        }
        names.insert(name.to_string())
    }

    /// Releases `name`. Returns `false` if it was not held.
    pub fn release(&self, name: &str) -> bool {
        self.names().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(name)
    }

    /// Held names, sorted.
    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names().iter().cloned().collect();
        names.sort();
        names
    }
}
