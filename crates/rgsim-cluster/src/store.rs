use std::collections::BTreeMap;

use rgsim_types::{RgsimError, Store, StoreId, StoreLabel, StoreState};

#[derive(Debug, Clone)]
struct StoreEntry {
    meta: Store,
    /// Address lookups report `Canceled` while set.
    cancel: bool,
}

impl StoreEntry {
    fn new(id: StoreId, address: &str, peer_address: &str, labels: Vec<StoreLabel>) -> Self {
        StoreEntry {
            meta: Store {
                id,
                address: address.to_string(),
                peer_address: peer_address.to_string(),
                labels,
                state: StoreState::Up,
            },
            cancel: false,
        }
    }
}

/// Store id → store metadata. Iteration is in ascending id order, which makes
/// "first store" and "first address match" deterministic.
#[derive(Debug, Default)]
pub(crate) struct StoreRegistry {
    stores: BTreeMap<StoreId, StoreEntry>,
}

impl StoreRegistry {
    pub(crate) fn add(&mut self, id: StoreId, address: &str, labels: Vec<StoreLabel>) {
        self.stores.insert(id, StoreEntry::new(id, address, address, labels));
    }

    pub(crate) fn remove(&mut self, id: StoreId) -> bool {
        self.stores.remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: StoreId) -> bool {
        self.stores.contains_key(&id)
    }

    pub(crate) fn set_state(&mut self, id: StoreId, state: StoreState) -> bool {
        match self.stores.get_mut(&id) {
            Some(entry) => {
                entry.meta.state = state;
                true
            }
            None => false,
        }
    }

    /// Swap in a fresh tombstoned record rather than editing the old one.
    pub(crate) fn mark_tombstone(&mut self, id: StoreId) -> Result<(), RgsimError> {
        let entry = self.stores.get(&id).ok_or(RgsimError::StoreNotFound(id))?;
        let replacement = StoreEntry {
            meta: Store { state: StoreState::Tombstone, ..entry.meta.clone() },
            cancel: entry.cancel,
        };
        self.stores.insert(id, replacement);
        Ok(())
    }

    pub(crate) fn set_cancel(&mut self, id: StoreId, cancel: bool) -> bool {
        match self.stores.get_mut(&id) {
            Some(entry) => {
                entry.cancel = cancel;
                true
            }
            None => false,
        }
    }

    pub(crate) fn get(&self, id: StoreId) -> Option<Store> {
        self.stores.get(&id).map(|e| e.meta.clone())
    }

    pub(crate) fn get_by_addr(&self, address: &str) -> Option<Store> {
        self.stores
            .values()
            .find(|e| e.meta.address == address)
            .map(|e| e.meta.clone())
    }

    /// Every store at `address`, unless a cancelled store is met first.
    pub(crate) fn get_and_check_by_addr(&self, address: &str) -> Result<Vec<Store>, RgsimError> {
        let mut found = Vec::new();
        for entry in self.stores.values() {
            if entry.cancel {
                return Err(RgsimError::Canceled);
            }
            if entry.meta.address == address {
                found.push(entry.meta.clone());
            }
        }
        Ok(found)
    }

    pub(crate) fn all(&self) -> Vec<Store> {
        self.stores.values().map(|e| e.meta.clone()).collect()
    }

    pub(crate) fn first_id(&self) -> Option<StoreId> {
        self.stores.keys().next().copied()
    }

    /// Full replace: address, peer address and labels all come from the call.
    pub(crate) fn update_addr(&mut self, id: StoreId, address: &str, labels: Vec<StoreLabel>) {
        self.stores.insert(id, StoreEntry::new(id, address, address, labels));
    }

    pub(crate) fn update_peer_addr(
        &mut self,
        id: StoreId,
        peer_address: &str,
        labels: Vec<StoreLabel>,
    ) -> Result<(), RgsimError> {
        let address = self
            .stores
            .get(&id)
            .map(|e| e.meta.address.clone())
            .ok_or(RgsimError::StoreNotFound(id))?;
        self.stores.insert(id, StoreEntry::new(id, &address, peer_address, labels));
        Ok(())
    }

    pub(crate) fn merge_labels(
        &mut self,
        id: StoreId,
        labels: Vec<StoreLabel>,
    ) -> Result<(), RgsimError> {
        let entry = self.stores.get_mut(&id).ok_or(RgsimError::StoreNotFound(id))?;
        merge_labels(&mut entry.meta.labels, labels);
        Ok(())
    }
}

/// Key-wise merge: incoming values win, untouched keys keep their position,
/// new keys are appended in the order given.
fn merge_labels(existing: &mut Vec<StoreLabel>, incoming: Vec<StoreLabel>) {
    for label in incoming {
        match existing.iter_mut().find(|l| l.key == label.key) {
            Some(slot) => slot.value = label.value,
            None => existing.push(label),
        }
    }
}
