use std::cmp::Ordering;

use rgsim_storage::{MvccKey, MvccStore};
use rgsim_types::{IsolationLevel, KvPair, PeerId, Region, RegionEpoch, RegionId, RgsimError, StoreId};

use crate::cluster::ClusterState;
use crate::region::RegionState;

/// Scan limit used when pulling every pair of a range to be re-split.
const SPLIT_SCAN_LIMIT: usize = i32::MAX as usize;

/// Compare two end keys where empty means +infinity.
fn cmp_end(a: &[u8], b: &[u8]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// Cut `pairs` into at most `count` consecutive slices whose sizes differ by
/// at most one, larger slices first. Never yields an empty slice.
pub(crate) fn group_evenly(pairs: Vec<KvPair>, count: usize) -> Vec<Vec<KvPair>> {
    debug_assert!(count > 0);
    let quotient = pairs.len() / count;
    let mut remainder = pairs.len() % count;
    let mut groups = Vec::with_capacity(count.min(pairs.len()));
    let mut iter = pairs.into_iter();
    loop {
        let mut size = quotient;
        if remainder > 0 {
            remainder -= 1;
            size += 1;
        }
        let group: Vec<KvPair> = iter.by_ref().take(size).collect();
        if group.is_empty() {
            break;
        }
        groups.push(group);
    }
    groups
}

impl ClusterState {
    fn first_store_id(&self) -> Result<StoreId, RgsimError> {
        self.stores
            .first_id()
            .ok_or_else(|| RgsimError::InvalidInput("cluster has no stores".into()))
    }

    /// A fresh region with a single leader peer on `store_id`. Ids are drawn
    /// peer first, then region.
    fn single_peer_region(&mut self, store_id: StoreId, start: Vec<u8>, end: Vec<u8>) -> RegionId {
        let peer_id = self.ids.alloc();
        let region_id = self.ids.alloc();
        let mut region =
            RegionState::new(region_id, &[store_id], &[peer_id], peer_id, RegionEpoch::default());
        region.update_key_range(start, end);
        tracing::info!(region_id, peer_id, store_id, "region created");
        self.regions.insert(region_id, region);
        region_id
    }

    pub(crate) fn split_region(
        &mut self,
        region_id: RegionId,
        new_region_id: RegionId,
        key: Vec<u8>,
        peer_ids: &[PeerId],
        leader: PeerId,
    ) -> Result<Region, RgsimError> {
        let parent = self.region_mut(region_id)?;
        if !parent.meta.contains(&key) || key == parent.meta.start_key {
            return Err(RgsimError::InvalidInput(format!(
                "split key {key:?} is not strictly inside region {region_id}"
            )));
        }
        if parent.meta.peers.len() != peer_ids.len() {
            return Err(RgsimError::InvalidInput(format!(
                "region {region_id} has {} peers but {} peer ids were given",
                parent.meta.peers.len(),
                peer_ids.len()
            )));
        }
        let child = parent.split(new_region_id, key, peer_ids, leader);
        let meta = child.meta.clone();
        self.regions.insert(new_region_id, child);
        tracing::info!(region_id, new_region_id, version = meta.region_epoch.version, "region split");
        Ok(meta)
    }

    pub(crate) fn merge_regions(&mut self, region_id1: RegionId, region_id2: RegionId) -> Result<(), RgsimError> {
        let end_key = self
            .regions
            .get(&region_id2)
            .map(|r| r.meta.end_key.clone())
            .ok_or(RgsimError::RegionNotFound(region_id2))?;
        self.region_mut(region_id1)?.merge(end_key);
        self.regions.remove(&region_id2);
        tracing::info!(region_id1, region_id2, "regions merged");
        Ok(())
    }

    /// Replace whatever covers `[start, end)` with up to `count` new regions
    /// that split the existing pairs of the range evenly.
    pub(crate) fn split_range<S: MvccStore>(
        &mut self,
        mvcc: &S,
        start: &MvccKey,
        end: &MvccKey,
        count: usize,
    ) -> Result<Vec<RegionId>, RgsimError> {
        if count == 0 {
            return Err(RgsimError::InvalidInput("split count must be positive".into()));
        }
        if !end.is_empty() && start > end {
            return Err(RgsimError::InvalidInput("split range start is after its end".into()));
        }
        let store_id = self.first_store_id()?;

        let pairs = mvcc.scan(
            &start.raw()?,
            &end.raw()?,
            SPLIT_SCAN_LIMIT,
            u64::MAX,
            IsolationLevel::Si,
        )?;
        let pair_count = pairs.len();
        let groups = group_evenly(pairs, count);

        self.evacuate_old_region_ranges(store_id, start.as_bytes(), end.as_bytes());
        let created = self.create_new_regions(store_id, &groups, start, end);
        tracing::info!(
            count,
            pairs = pair_count,
            regions = created.len(),
            "range split evenly"
        );
        Ok(created)
    }

    fn create_new_regions(
        &mut self,
        store_id: StoreId,
        groups: &[Vec<KvPair>],
        start: &MvccKey,
        end: &MvccKey,
    ) -> Vec<RegionId> {
        let first_key = |i: usize| MvccKey::new(&groups[i][0].key).into_bytes();
        (0..groups.len())
            .map(|i| {
                let region_start = if i == 0 { start.as_bytes().to_vec() } else { first_key(i) };
                let region_end = if i == groups.len() - 1 {
                    end.as_bytes().to_vec()
                } else {
                    first_key(i + 1)
                };
                self.single_peer_region(store_id, region_start, region_end)
            })
            .collect()
    }

    /// Clear `[start, end)` so fresh regions can be placed there. Regions
    /// inside the range are dropped, regions straddling an edge are trimmed,
    /// and a region straddling both edges keeps its left part while a new
    /// region takes the part right of `end`.
    pub(crate) fn evacuate_old_region_ranges(&mut self, store_id: StoreId, start: &[u8], end: &[u8]) {
        for region_id in self.regions_cover_range(start, end) {
            let Some(region) = self.regions.get_mut(&region_id) else {
                continue;
            };
            let start_cmp = region.meta.start_key.as_slice().cmp(start);
            let end_cmp = cmp_end(&region.meta.end_key, end);

            if start_cmp.is_ge() && end_cmp.is_le() {
                self.regions.remove(&region_id);
                tracing::info!(region_id, "region evacuated");
            } else if start_cmp.is_lt() && end_cmp.is_gt() {
                let old_end = std::mem::take(&mut region.meta.end_key);
                let old_start = std::mem::take(&mut region.meta.start_key);
                region.update_key_range(old_start, start.to_vec());
                self.single_peer_region(store_id, end.to_vec(), old_end);
            } else if start_cmp.is_lt() {
                let old_start = std::mem::take(&mut region.meta.start_key);
                region.update_key_range(old_start, start.to_vec());
            } else {
                let old_end = std::mem::take(&mut region.meta.end_key);
                region.update_key_range(end.to_vec(), old_end);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rgsim_storage::MemMvccStore;

    use super::*;

    fn pairs(n: usize) -> Vec<KvPair> {
        (0..n)
            .map(|i| KvPair { key: format!("k{i:04}").into_bytes(), value: vec![] })
            .collect()
    }

    fn sizes(groups: &[Vec<KvPair>]) -> Vec<usize> {
        groups.iter().map(Vec::len).collect()
    }

    /// One store (id 1) and one whole-keyspace region (id 2, peer 3).
    fn bootstrapped() -> ClusterState {
        let mut state = ClusterState::default();
        let ids = state.ids.alloc_n(3);
        state.stores.add(ids[0], "store1", Vec::new());
        state.regions.insert(
            ids[1],
            RegionState::new(ids[1], &[ids[0]], &[ids[2]], ids[2], RegionEpoch::default()),
        );
        state
    }

    fn ranges(state: &ClusterState) -> Vec<(Vec<u8>, Vec<u8>)> {
        state
            .all_regions()
            .into_iter()
            .map(|r| (r.start_key, r.end_key))
            .collect()
    }

    fn enc(raw: &[u8]) -> Vec<u8> {
        MvccKey::new(raw).into_bytes()
    }

    #[test]
    fn group_sizes_front_load_remainder() {
        assert_eq!(sizes(&group_evenly(pairs(10), 3)), vec![4, 3, 3]);
        assert_eq!(sizes(&group_evenly(pairs(9), 3)), vec![3, 3, 3]);
        assert_eq!(sizes(&group_evenly(pairs(2), 5)), vec![1, 1]);
        assert!(group_evenly(pairs(0), 4).is_empty());
    }

    #[test]
    fn groups_preserve_order() {
        let flat: Vec<KvPair> = group_evenly(pairs(7), 2).into_iter().flatten().collect();
        assert_eq!(flat, pairs(7));
    }

    #[test]
    fn cmp_end_treats_empty_as_infinite() {
        assert_eq!(cmp_end(b"", b""), Ordering::Equal);
        assert_eq!(cmp_end(b"", b"z"), Ordering::Greater);
        assert_eq!(cmp_end(b"z", b""), Ordering::Less);
        assert_eq!(cmp_end(b"a", b"b"), Ordering::Less);
    }

    #[test]
    fn evacuate_region_covering_both_sides() {
        let mut state = bootstrapped();
        state.evacuate_old_region_ranges(1, b"c", b"f");
        assert_eq!(
            ranges(&state),
            vec![(b"".to_vec(), b"c".to_vec()), (b"f".to_vec(), b"".to_vec())]
        );
        // Left part keeps the original id, right part is new with a fresh peer.
        assert_eq!(state.regions[&2].meta.region_epoch.version, 1);
        assert_eq!(state.ids.alloc(), 6);
    }

    #[test]
    fn evacuate_trims_and_drops() {
        let mut state = bootstrapped();
        state.split_region(2, 10, b"c".to_vec(), &[11], 11).unwrap();
        state.split_region(10, 20, b"e".to_vec(), &[21], 21).unwrap();
        state.split_region(20, 30, b"g".to_vec(), &[31], 31).unwrap();
        // [,c) [c,e) [e,g) [g,)
        state.evacuate_old_region_ranges(1, b"d", b"h");
        assert_eq!(
            ranges(&state),
            vec![
                (b"".to_vec(), b"c".to_vec()),
                (b"c".to_vec(), b"d".to_vec()),
                (b"h".to_vec(), b"".to_vec()),
            ]
        );
        assert!(!state.regions.contains_key(&20));
        assert_eq!(state.regions[&30].meta.start_key, b"h".to_vec());
    }

    #[test]
    fn evacuate_to_unbounded_end() {
        let mut state = bootstrapped();
        state.split_region(2, 10, b"m".to_vec(), &[11], 11).unwrap();
        state.evacuate_old_region_ranges(1, b"d", b"");
        assert_eq!(ranges(&state), vec![(b"".to_vec(), b"d".to_vec())]);
    }

    #[test]
    fn split_region_rejects_peer_count_mismatch() {
        let mut state = bootstrapped();
        let err = state.split_region(2, 10, b"m".to_vec(), &[11, 12], 11).unwrap_err();
        assert!(matches!(err, RgsimError::InvalidInput(_)));
        assert_eq!(state.regions.len(), 1);
        assert!(matches!(
            state.split_region(99, 10, b"m".to_vec(), &[11], 11),
            Err(RgsimError::RegionNotFound(99))
        ));
    }

    #[test]
    fn split_region_rejects_key_outside_range() {
        let mut state = bootstrapped();
        state.split_region(2, 10, b"m".to_vec(), &[11], 11).unwrap();
        let before = ranges(&state);
        // [,m) is region 2, [m,) is region 10.
        for (region_id, key) in [(2, &b""[..]), (2, b"m"), (2, b"zz"), (10, b"m"), (10, b"a")] {
            assert!(matches!(
                state.split_region(region_id, 20, key.to_vec(), &[21], 21),
                Err(RgsimError::InvalidInput(_))
            ));
        }
        assert_eq!(ranges(&state), before);
        assert_eq!(state.regions[&2].meta.region_epoch.version, 1);
        assert!(!state.regions.contains_key(&20));
    }

    #[test]
    fn merge_missing_region() {
        let mut state = bootstrapped();
        assert_eq!(state.merge_regions(2, 7), Err(RgsimError::RegionNotFound(7)));
        assert_eq!(state.merge_regions(7, 2), Err(RgsimError::RegionNotFound(7)));
        assert_eq!(state.regions.len(), 1);
    }

    #[test]
    fn split_range_distributes_pairs() {
        let mvcc = MemMvccStore::new();
        for i in 0..10u8 {
            mvcc.put(&[b'a' + i], b"v", 1);
        }
        let mut state = bootstrapped();
        let created = state
            .split_range(&mvcc, &MvccKey::new(b"a"), &MvccKey::new(b"z"), 3)
            .unwrap();
        assert_eq!(created.len(), 3);

        let new: Vec<(Vec<u8>, Vec<u8>)> = created
            .iter()
            .map(|id| (state.regions[id].meta.start_key.clone(), state.regions[id].meta.end_key.clone()))
            .collect();
        assert_eq!(
            new,
            vec![
                (enc(b"a"), enc(b"e")),
                (enc(b"e"), enc(b"h")),
                (enc(b"h"), enc(b"z")),
            ]
        );
        // Tiling outside the range is intact.
        assert_eq!(ranges(&state).first().map(|r| r.1.clone()), Some(enc(b"a")));
        assert_eq!(ranges(&state).last().map(|r| r.0.clone()), Some(enc(b"z")));
        assert_eq!(state.regions.len(), 5);
    }

    #[test]
    fn split_range_rejects_zero_count_and_empty_cluster() {
        let mvcc = MemMvccStore::new();
        let mut state = bootstrapped();
        assert!(matches!(
            state.split_range(&mvcc, &MvccKey::new(b"a"), &MvccKey::new(b"b"), 0),
            Err(RgsimError::InvalidInput(_))
        ));

        let mut empty = ClusterState::default();
        assert!(matches!(
            empty.split_range(&mvcc, &MvccKey::new(b"a"), &MvccKey::new(b"b"), 2),
            Err(RgsimError::InvalidInput(_))
        ));
    }

    #[test]
    fn split_range_rejects_inverted_range() {
        let mvcc = MemMvccStore::new();
        mvcc.put(b"d", b"v", 1);
        let mut state = bootstrapped();
        let before = ranges(&state);
        assert!(matches!(
            state.split_range(&mvcc, &MvccKey::new(b"m"), &MvccKey::new(b"c"), 2),
            Err(RgsimError::InvalidInput(_))
        ));
        assert_eq!(ranges(&state), before);
        assert_eq!(state.regions[&2].meta.region_epoch.version, 0);

        // Equal bounds are an empty range, not an inverted one.
        assert!(state
            .split_range(&mvcc, &MvccKey::new(b"m"), &MvccKey::new(b"m"), 2)
            .unwrap()
            .is_empty());
    }

    proptest! {
        #[test]
        fn group_sizes_differ_by_at_most_one(n in 0usize..200, count in 1usize..20) {
            let groups = group_evenly(pairs(n), count);
            prop_assert_eq!(groups.len(), n.min(count));
            prop_assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), n);
            if let (Some(max), Some(min)) = (groups.iter().map(Vec::len).max(), groups.iter().map(Vec::len).min()) {
                prop_assert!(max - min <= 1);
                prop_assert!(min > 0);
            }
        }

        #[test]
        fn split_range_keeps_tiling(
            keys in proptest::collection::btree_set(proptest::collection::vec(b'a'..=b'y', 1..4), 1..40),
            count in 1usize..8,
        ) {
            let mvcc = MemMvccStore::new();
            for k in &keys {
                mvcc.put(k, b"v", 1);
            }
            let mut state = bootstrapped();
            state.split_range(&mvcc, &MvccKey::new(b"a"), &MvccKey::new(b"zz"), count).unwrap();

            let all = ranges(&state);
            prop_assert!(all.first().map(|r| r.0.is_empty()).unwrap_or(false));
            prop_assert!(all.last().map(|r| r.1.is_empty()).unwrap_or(false));
            for w in all.windows(2) {
                prop_assert_eq!(&w[0].1, &w[1].0);
            }
        }
    }
}
