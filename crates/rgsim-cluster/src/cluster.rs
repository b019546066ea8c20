use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use rgsim_storage::{MvccKey, MvccStore};
use rgsim_types::{
    Buckets, PeerId, PeerRole, Region, RegionEpoch, RegionId, RegionInfo, RgsimError,
    ScannedRegion, Store, StoreId, StoreLabel, StoreState,
};

use crate::delay::DelayTable;
use crate::id::IdAllocator;
use crate::region::RegionState;
use crate::store::StoreRegistry;

/// Everything guarded by the cluster-wide lock.
#[derive(Debug, Default)]
pub(crate) struct ClusterState {
    pub(crate) ids: IdAllocator,
    pub(crate) stores: StoreRegistry,
    pub(crate) regions: BTreeMap<RegionId, RegionState>,
    /// Peers reported unavailable, independent of region membership.
    pub(crate) down_peers: BTreeSet<PeerId>,
    /// Region hidden from `scan_regions`, simulating a split the metadata
    /// service has not heard about yet.
    pub(crate) unreported_region: Option<RegionId>,
}

impl ClusterState {
    pub(crate) fn region_mut(&mut self, region_id: RegionId) -> Result<&mut RegionState, RgsimError> {
        self.regions
            .get_mut(&region_id)
            .ok_or(RgsimError::RegionNotFound(region_id))
    }
}

fn check_replicas(store_ids: &[StoreId], peer_ids: &[PeerId]) -> Result<(), RgsimError> {
    if store_ids.len() != peer_ids.len() {
        return Err(RgsimError::InvalidInput(format!(
            "{} store ids but {} peer ids",
            store_ids.len(),
            peer_ids.len()
        )));
    }
    Ok(())
}

/// Simulated cluster metadata: stores, regions, peers and leaders.
///
/// Every method takes the internal lock for its own duration (shared for
/// reads, exclusive for writes) and every returned value is an owned copy, so
/// callers never observe later mutations through something they hold.
///
/// `S` is the data engine consulted by [`Cluster::split_keys`] to place
/// region boundaries.
pub struct Cluster<S> {
    state: RwLock<ClusterState>,
    delays: DelayTable,
    mvcc: Arc<S>,
}

impl<S: MvccStore> Cluster<S> {
    /// An empty cluster. Add stores and call [`Cluster::bootstrap`] before use.
    pub fn new(mvcc: Arc<S>) -> Self {
        Cluster {
            state: RwLock::new(ClusterState::default()),
            delays: DelayTable::default(),
            mvcc,
        }
    }

    pub fn mvcc(&self) -> &Arc<S> {
        &self.mvcc
    }

    // -----------------------------------------------------------------------
    // Ids
    // -----------------------------------------------------------------------

    /// A cluster-unique id, usable as a store, region or peer id.
    pub fn alloc_id(&self) -> u64 {
        self.state.write().ids.alloc()
    }

    pub fn alloc_ids(&self, n: usize) -> Vec<u64> {
        self.state.write().ids.alloc_n(n)
    }

    // -----------------------------------------------------------------------
    // Stores
    // -----------------------------------------------------------------------

    pub fn add_store(&self, store_id: StoreId, address: &str, labels: Vec<StoreLabel>) {
        self.state.write().stores.add(store_id, address, labels);
        tracing::info!(store_id, address, "store added");
    }

    pub fn remove_store(&self, store_id: StoreId) {
        if self.state.write().stores.remove(store_id) {
            tracing::info!(store_id, "store removed");
        }
    }

    pub fn get_store(&self, store_id: StoreId) -> Option<Store> {
        self.state.read().stores.get(store_id)
    }

    /// All stores in ascending id order.
    pub fn get_all_stores(&self) -> Vec<Store> {
        self.state.read().stores.all()
    }

    /// The lowest-id store whose client address is `address`.
    pub fn get_store_by_addr(&self, address: &str) -> Option<Store> {
        self.state.read().stores.get_by_addr(address)
    }

    /// All stores at `address`, or `RgsimError::Canceled` if any store in the
    /// cluster is flagged cancelled (a request landing mid-shutdown).
    pub fn get_and_check_store_by_addr(&self, address: &str) -> Result<Vec<Store>, RgsimError> {
        self.state.read().stores.get_and_check_by_addr(address)
    }

    pub fn stop_store(&self, store_id: StoreId) {
        if self.state.write().stores.set_state(store_id, StoreState::Offline) {
            tracing::info!(store_id, "store stopped");
        }
    }

    pub fn start_store(&self, store_id: StoreId) {
        if self.state.write().stores.set_state(store_id, StoreState::Up) {
            tracing::info!(store_id, "store started");
        }
    }

    pub fn mark_tombstone(&self, store_id: StoreId) -> Result<(), RgsimError> {
        self.state.write().stores.mark_tombstone(store_id)?;
        tracing::info!(store_id, "store tombstoned");
        Ok(())
    }

    pub fn cancel_store(&self, store_id: StoreId) {
        if self.state.write().stores.set_cancel(store_id, true) {
            tracing::debug!(store_id, "store cancel flag set");
        }
    }

    pub fn uncancel_store(&self, store_id: StoreId) {
        if self.state.write().stores.set_cancel(store_id, false) {
            tracing::debug!(store_id, "store cancel flag cleared");
        }
    }

    /// Replace the store record; labels are overwritten, not merged.
    pub fn update_store_addr(&self, store_id: StoreId, address: &str, labels: Vec<StoreLabel>) {
        self.state.write().stores.update_addr(store_id, address, labels);
    }

    /// Change only the replica-traffic address (labels are replaced).
    pub fn update_store_peer_addr(
        &self,
        store_id: StoreId,
        peer_address: &str,
        labels: Vec<StoreLabel>,
    ) -> Result<(), RgsimError> {
        self.state.write().stores.update_peer_addr(store_id, peer_address, labels)
    }

    /// Merge `labels` into the store's labels; incoming values win per key.
    pub fn update_store_labels(
        &self,
        store_id: StoreId,
        labels: Vec<StoreLabel>,
    ) -> Result<(), RgsimError> {
        self.state.write().stores.merge_labels(store_id, labels)
    }

    // -----------------------------------------------------------------------
    // Region lookups
    // -----------------------------------------------------------------------

    /// Region metadata plus the raw leader id (0 when leaderless).
    pub fn get_region(&self, region_id: RegionId) -> Option<(Region, PeerId)> {
        let g = self.state.read();
        g.regions.get(&region_id).map(|r| (r.meta.clone(), r.leader))
    }

    /// All regions ordered by start key.
    pub fn get_all_regions(&self) -> Vec<Region> {
        self.state.read().all_regions()
    }

    /// The region whose range contains the encoded `key`.
    pub fn get_region_by_key(&self, key: &[u8]) -> Option<RegionInfo> {
        self.state.read().region_by_key(key)
    }

    /// The region immediately before the one containing the encoded `key`.
    pub fn get_prev_region_by_key(&self, key: &[u8]) -> Option<RegionInfo> {
        self.state.read().prev_region_by_key(key)
    }

    pub fn get_region_by_id(&self, region_id: RegionId) -> Option<RegionInfo> {
        self.state.read().region_by_id(region_id)
    }

    /// Regions intersecting `[start_key, end_key)` in key order, at most
    /// `limit` of them when `limit > 0`. Both keys are encoded; an empty
    /// `end_key` is unbounded.
    pub fn scan_regions(&self, start_key: &[u8], end_key: &[u8], limit: i64) -> Vec<ScannedRegion> {
        self.state.read().scan_regions(start_key, end_key, limit)
    }

    /// Hide one region from `scan_regions` (other lookups still see it).
    pub fn set_unreported_region(&self, region_id: Option<RegionId>) {
        self.state.write().unreported_region = region_id;
    }

    // -----------------------------------------------------------------------
    // Region placement
    // -----------------------------------------------------------------------

    /// Create the first region, spanning the whole keyspace. The stores must
    /// already be registered.
    pub fn bootstrap(
        &self,
        region_id: RegionId,
        store_ids: &[StoreId],
        peer_ids: &[PeerId],
        leader: PeerId,
    ) -> Result<(), RgsimError> {
        check_replicas(store_ids, peer_ids)?;
        let mut g = self.state.write();
        if let Some(missing) = store_ids.iter().find(|&&id| !g.stores.contains(id)) {
            return Err(RgsimError::InvalidInput(format!(
                "store {missing} must be added before bootstrap"
            )));
        }
        g.regions.insert(
            region_id,
            RegionState::new(region_id, store_ids, peer_ids, leader, RegionEpoch::default()),
        );
        tracing::info!(region_id, ?store_ids, leader, "cluster bootstrapped");
        Ok(())
    }

    /// Add or replace a whole-keyspace region carrying an explicit epoch.
    pub fn put_region(
        &self,
        region_id: RegionId,
        conf_ver: u64,
        version: u64,
        store_ids: &[StoreId],
        peer_ids: &[PeerId],
        leader: PeerId,
    ) -> Result<(), RgsimError> {
        check_replicas(store_ids, peer_ids)?;
        let epoch = RegionEpoch { conf_ver, version };
        self.state
            .write()
            .regions
            .insert(region_id, RegionState::new(region_id, store_ids, peer_ids, leader, epoch));
        tracing::info!(region_id, conf_ver, version, leader, "region put");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Peers and leaders
    // -----------------------------------------------------------------------

    pub fn add_peer(&self, region_id: RegionId, store_id: StoreId, peer_id: PeerId) -> Result<(), RgsimError> {
        self.state.write().region_mut(region_id)?.add_peer(peer_id, store_id, PeerRole::Voter);
        Ok(())
    }

    pub fn add_learner(&self, region_id: RegionId, store_id: StoreId, peer_id: PeerId) -> Result<(), RgsimError> {
        self.state.write().region_mut(region_id)?.add_peer(peer_id, store_id, PeerRole::Learner);
        Ok(())
    }

    /// Removing the leader leaves the region leaderless until
    /// [`Cluster::change_leader`] is called.
    pub fn remove_peer(&self, region_id: RegionId, peer_id: PeerId) -> Result<(), RgsimError> {
        self.state.write().region_mut(region_id)?.remove_peer(peer_id);
        Ok(())
    }

    /// The caller guarantees `leader` is a peer of the region.
    pub fn change_leader(&self, region_id: RegionId, leader: PeerId) -> Result<(), RgsimError> {
        self.state.write().region_mut(region_id)?.change_leader(leader);
        tracing::debug!(region_id, leader, "leader changed");
        Ok(())
    }

    pub fn give_up_leader(&self, region_id: RegionId) -> Result<(), RgsimError> {
        self.change_leader(region_id, rgsim_types::NO_LEADER)
    }

    pub fn mark_peer_down(&self, peer_id: PeerId) {
        self.state.write().down_peers.insert(peer_id);
    }

    pub fn remove_down_peer(&self, peer_id: PeerId) {
        self.state.write().down_peers.remove(&peer_id);
    }

    // -----------------------------------------------------------------------
    // Split / merge
    // -----------------------------------------------------------------------

    /// Split `region_id` at the raw `key`; see [`Cluster::split_raw`].
    pub fn split(
        &self,
        region_id: RegionId,
        new_region_id: RegionId,
        key: &[u8],
        peer_ids: &[PeerId],
        leader: PeerId,
    ) -> Result<Region, RgsimError> {
        self.split_raw(region_id, new_region_id, MvccKey::new(key).into_bytes(), peer_ids, leader)
    }

    /// Split `region_id` at `key`, which is stored as given. The new region
    /// takes `[key, end)` on the same stores with one id from `peer_ids` per
    /// parent peer. Returns a copy of the new region.
    pub fn split_raw(
        &self,
        region_id: RegionId,
        new_region_id: RegionId,
        key: Vec<u8>,
        peer_ids: &[PeerId],
        leader: PeerId,
    ) -> Result<Region, RgsimError> {
        self.state
            .write()
            .split_region(region_id, new_region_id, key, peer_ids, leader)
    }

    /// Replace the region's bucket boundaries (raw keys, encoded here). The key
    /// range and epoch are untouched.
    pub fn split_region_buckets(
        &self,
        region_id: RegionId,
        keys: &[Vec<u8>],
        bucket_version: u64,
    ) -> Result<(), RgsimError> {
        let mut g = self.state.write();
        let region = g.region_mut(region_id)?;
        region.buckets = Some(Buckets {
            region_id,
            version: bucket_version,
            keys: keys.iter().map(|k| MvccKey::new(k).into_bytes()).collect(),
        });
        Ok(())
    }

    /// Fold `region_id2` into `region_id1`. The ranges must be adjacent with
    /// `region_id1` first; this is not checked.
    pub fn merge(&self, region_id1: RegionId, region_id2: RegionId) -> Result<(), RgsimError> {
        self.state.write().merge_regions(region_id1, region_id2)
    }

    /// Re-partition the raw range `[start, end)` into up to `count` fresh
    /// single-peer regions holding roughly equal numbers of existing keys.
    /// Returns the new region ids in key order.
    ///
    /// All new regions land on the lowest-id store.
    pub fn split_keys(&self, start: &[u8], end: &[u8], count: usize) -> Result<Vec<RegionId>, RgsimError> {
        let start = MvccKey::new(start);
        let end = MvccKey::new(end);
        self.state.write().split_range(self.mvcc.as_ref(), &start, &end, count)
    }

    // -----------------------------------------------------------------------
    // Delay injection
    // -----------------------------------------------------------------------

    /// Delay the next request of transaction `start_ts` on `region_id` once.
    pub fn schedule_delay(&self, start_ts: u64, region_id: RegionId, dur: Duration) {
        self.delays.schedule(start_ts, region_id, dur);
    }

    /// Consume the scheduled delay without sleeping.
    pub fn take_delay(&self, start_ts: u64, region_id: RegionId) -> Option<Duration> {
        self.delays.take(start_ts, region_id)
    }

    /// Consume the scheduled delay and block the calling thread for it. Only
    /// the delay table is locked, and not while sleeping.
    pub fn handle_delay(&self, start_ts: u64, region_id: RegionId) -> Option<Duration> {
        self.delays.handle(start_ts, region_id)
    }
}
