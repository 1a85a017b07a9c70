//! In-memory index of unconfirmed name operations, keyed by name. Used to
//! keep conflicting activations for the same name from entering a block
//! template together, and to back the pending-operations report.

use crate::types::Txid;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default, Clone)]
pub struct PendingIndex {
    by_name: HashMap<Vec<u8>, BTreeSet<Txid>>,
}

impl PendingIndex {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn mark_pending(&mut self, name: &[u8], txid: Txid) {
        self.by_name.entry(name.to_vec()).or_default().insert(txid);
    }

    /// Remove one pending operation; drops the name's entry when it was
    /// the last one.
    pub fn clear_pending(&mut self, name: &[u8], txid: &Txid) {
        if let Some(set) = self.by_name.get_mut(name) {
            set.remove(txid);
            if set.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    pub fn has_pending(&self, name: &[u8]) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn pending_set(&self, name: &[u8]) -> Option<&BTreeSet<Txid>> {
        self.by_name.get(name)
    }

    /// All pending operations, name by name, in name order.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<Txid>)> {
        let mut entries: Vec<_> = self
            .by_name
            .iter()
            .map(|(name, set)| (name.clone(), set.iter().cloned().collect()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
