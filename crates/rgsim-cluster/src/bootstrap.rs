//! Canned topologies for tests and the node binary.

use rgsim_storage::MvccStore;
use rgsim_types::{PeerId, RegionId, RgsimError, StoreId, StoreLabel};

use crate::cluster::Cluster;

/// Ids produced by [`bootstrap_with_multi_stores`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiStoreLayout {
    pub store_ids: Vec<StoreId>,
    pub peer_ids: Vec<PeerId>,
    pub region_id: RegionId,
    pub leader: PeerId,
}

/// Ids produced by [`bootstrap_with_multi_regions`]. `region_ids[i]` and
/// `peer_ids[i]` belong to the i-th region in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiRegionLayout {
    pub store_id: StoreId,
    pub region_ids: Vec<RegionId>,
    pub peer_ids: Vec<PeerId>,
}

pub fn store_addr(store_id: StoreId) -> String {
    format!("store{store_id}")
}

/// One store, one region, one peer. Returns `(store_id, peer_id, region_id)`.
pub fn bootstrap_with_single_store<S: MvccStore>(
    cluster: &Cluster<S>,
) -> Result<(StoreId, PeerId, RegionId), RgsimError> {
    let ids = cluster.alloc_ids(3);
    let (store_id, peer_id, region_id) = (ids[0], ids[1], ids[2]);
    cluster.add_store(store_id, &store_addr(store_id), Vec::new());
    cluster.bootstrap(region_id, &[store_id], &[peer_id], peer_id)?;
    Ok((store_id, peer_id, region_id))
}

/// `n` stores, each labelled `id=<store id>`, and one region with a peer on
/// every store. The first peer leads.
pub fn bootstrap_with_multi_stores<S: MvccStore>(
    cluster: &Cluster<S>,
    n: usize,
) -> Result<MultiStoreLayout, RgsimError> {
    if n == 0 {
        return Err(RgsimError::InvalidInput("at least one store is required".into()));
    }
    let store_ids = cluster.alloc_ids(n);
    let peer_ids = cluster.alloc_ids(n);
    let region_id = cluster.alloc_id();
    let leader = peer_ids[0];
    for &store_id in &store_ids {
        let labels = vec![StoreLabel::new("id", store_id.to_string())];
        cluster.add_store(store_id, &store_addr(store_id), labels);
    }
    cluster.bootstrap(region_id, &store_ids, &peer_ids, leader)?;
    Ok(MultiStoreLayout { store_ids, peer_ids, region_id, leader })
}

/// A single store whose keyspace is pre-split at each raw key in
/// `split_keys`, which must be ascending.
pub fn bootstrap_with_multi_regions<S: MvccStore>(
    cluster: &Cluster<S>,
    split_keys: &[Vec<u8>],
) -> Result<MultiRegionLayout, RgsimError> {
    let (store_id, first_peer, first_region) = bootstrap_with_single_store(cluster)?;
    let mut region_ids = vec![first_region];
    region_ids.extend(cluster.alloc_ids(split_keys.len()));
    let mut peer_ids = vec![first_peer];
    peer_ids.extend(cluster.alloc_ids(split_keys.len()));

    for (i, key) in split_keys.iter().enumerate() {
        cluster.split(region_ids[i], region_ids[i + 1], key, &[peer_ids[i + 1]], peer_ids[i + 1])?;
    }
    Ok(MultiRegionLayout { store_id, region_ids, peer_ids })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rgsim_storage::{MemMvccStore, MvccKey};

    use super::*;

    fn cluster() -> Cluster<MemMvccStore> {
        Cluster::new(Arc::new(MemMvccStore::new()))
    }

    #[test]
    fn single_store_layout() {
        let c = cluster();
        let (store_id, peer_id, region_id) = bootstrap_with_single_store(&c).unwrap();
        assert_eq!((store_id, peer_id, region_id), (1, 2, 3));
        assert_eq!(c.get_store(store_id).unwrap().address, "store1");
        let (region, leader) = c.get_region(region_id).unwrap();
        assert_eq!(leader, peer_id);
        assert_eq!(region.peers.len(), 1);
    }

    #[test]
    fn multi_store_layout() {
        let c = cluster();
        let layout = bootstrap_with_multi_stores(&c, 3).unwrap();
        assert_eq!(layout.store_ids, vec![1, 2, 3]);
        assert_eq!(layout.peer_ids, vec![4, 5, 6]);
        assert_eq!(layout.region_id, 7);
        assert_eq!(layout.leader, 4);
        assert_eq!(c.get_store(2).unwrap().label("id"), Some("2"));

        let info = c.get_region_by_key(b"anything").unwrap();
        let stores: Vec<StoreId> = info.meta.peers.iter().map(|p| p.store_id).collect();
        assert_eq!(stores, layout.store_ids);
        assert_eq!(info.leader.map(|p| p.store_id), Some(1));

        assert!(bootstrap_with_multi_stores(&cluster(), 0).is_err());
    }

    #[test]
    fn multi_region_layout() {
        let c = cluster();
        let keys = vec![b"b".to_vec(), b"d".to_vec()];
        let layout = bootstrap_with_multi_regions(&c, &keys).unwrap();
        assert_eq!(layout.region_ids.len(), 3);
        assert_eq!(layout.peer_ids.len(), 3);

        for (raw, idx) in [(&b"a"[..], 0), (&b"b"[..], 1), (&b"c"[..], 1), (&b"d"[..], 2), (&b"z"[..], 2)] {
            let info = c.get_region_by_key(MvccKey::new(raw).as_bytes()).unwrap();
            assert_eq!(info.meta.id, layout.region_ids[idx]);
            assert_eq!(info.leader.map(|p| p.id), Some(layout.peer_ids[idx]));
        }
    }
}
