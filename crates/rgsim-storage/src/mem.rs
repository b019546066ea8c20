use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use rgsim_types::{IsolationLevel, KvPair, RgsimError};

use crate::traits::MvccStore;

/// Maximum versions retained per key before the oldest ones are compacted.
const MAX_HISTORY: usize = 10;

struct MemMvccInner {
    /// raw key → (commit_ts → value, `None` for a delete marker)
    data: BTreeMap<Vec<u8>, BTreeMap<u64, Option<Vec<u8>>>>,
}

/// In-memory multi-version `MvccStore` backed by nested `BTreeMap`s.
///
/// Only committed writes exist here; there are no locks, so snapshot isolation
/// and read committed observe the same data.
#[derive(Clone)]
pub struct MemMvccStore {
    inner: Arc<RwLock<MemMvccInner>>,
}

impl MemMvccStore {
    pub fn new() -> Self {
        MemMvccStore {
            inner: Arc::new(RwLock::new(MemMvccInner { data: BTreeMap::new() })),
        }
    }

    pub fn put(&self, key: &[u8], value: &[u8], commit_ts: u64) {
        self.write_version(key, Some(value.to_vec()), commit_ts);
    }

    pub fn delete(&self, key: &[u8], commit_ts: u64) {
        self.write_version(key, None, commit_ts);
    }

    /// Point read of the newest version visible at `start_ts`.
    #[cfg(test)]
    pub(crate) fn get(&self, key: &[u8], start_ts: u64) -> Option<Vec<u8>> {
        let g = self.inner.read();
        g.data.get(key).and_then(|versions| visible(versions, start_ts))
    }

    fn write_version(&self, key: &[u8], value: Option<Vec<u8>>, commit_ts: u64) {
        let mut g = self.inner.write();
        let versions = g.data.entry(key.to_vec()).or_default();
        versions.insert(commit_ts, value);
        while versions.len() > MAX_HISTORY {
            versions.pop_first();
        }
    }
}

impl Default for MemMvccStore {
    fn default() -> Self {
        Self::new()
    }
}

fn visible(versions: &BTreeMap<u64, Option<Vec<u8>>>, start_ts: u64) -> Option<Vec<u8>> {
    versions
        .range(..=start_ts)
        .next_back()
        .and_then(|(_, v)| v.clone())
}

impl MvccStore for MemMvccStore {
    fn scan(
        &self,
        start_key: &[u8],
        end_key: &[u8],
        limit: usize,
        start_ts: u64,
        _isolation: IsolationLevel,
    ) -> Result<Vec<KvPair>, RgsimError> {
        if !end_key.is_empty() && start_key >= end_key {
            return Ok(Vec::new());
        }
        let upper = if end_key.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end_key)
        };
        let g = self.inner.read();
        Ok(g.data
            .range::<[u8], _>((Bound::Included(start_key), upper))
            .filter_map(|(k, versions)| {
                visible(versions, start_ts).map(|value| KvPair { key: k.clone(), value })
            })
            .take(limit)
            .collect())
    }
}
