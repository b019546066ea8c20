use rgsim_types::{Buckets, Peer, PeerId, PeerRole, Region, RegionEpoch, RegionId, StoreId, NO_LEADER};

/// A region as the cluster holds it: public metadata plus the leader id and
/// bucket layout, which are not part of `Region` itself.
#[derive(Debug, Clone)]
pub(crate) struct RegionState {
    pub(crate) meta: Region,
    pub(crate) leader: PeerId,
    pub(crate) buckets: Option<Buckets>,
}

impl RegionState {
    /// Whole-keyspace region with one voter per `(store_id, peer_id)` pair.
    ///
    /// Callers validate that both slices have the same length.
    pub(crate) fn new(
        region_id: RegionId,
        store_ids: &[StoreId],
        peer_ids: &[PeerId],
        leader: PeerId,
        epoch: RegionEpoch,
    ) -> Self {
        debug_assert_eq!(store_ids.len(), peer_ids.len());
        let peers = store_ids
            .iter()
            .zip(peer_ids)
            .map(|(&store_id, &peer_id)| Peer::new(peer_id, store_id))
            .collect();
        RegionState {
            meta: Region {
                id: region_id,
                start_key: Vec::new(),
                end_key: Vec::new(),
                peers,
                region_epoch: epoch,
            },
            leader,
            buckets: None,
        }
    }

    pub(crate) fn id(&self) -> RegionId {
        self.meta.id
    }

    pub(crate) fn add_peer(&mut self, peer_id: PeerId, store_id: StoreId, role: PeerRole) {
        self.meta.peers.push(Peer { id: peer_id, store_id, role });
        self.inc_conf_ver();
    }

    /// Removing the leader leaves the region leaderless.
    pub(crate) fn remove_peer(&mut self, peer_id: PeerId) {
        if let Some(pos) = self.meta.peers.iter().position(|p| p.id == peer_id) {
            self.meta.peers.remove(pos);
        }
        if self.leader == peer_id {
            self.leader = NO_LEADER;
        }
        self.inc_conf_ver();
    }

    pub(crate) fn change_leader(&mut self, leader: PeerId) {
        self.leader = leader;
    }

    pub(crate) fn leader_peer(&self) -> Option<&Peer> {
        if self.leader == NO_LEADER {
            return None;
        }
        self.meta.peer(self.leader)
    }

    /// Carve `[key, end)` off into a new region placed on the same stores.
    /// Both halves get a version bump.
    pub(crate) fn split(
        &mut self,
        new_region_id: RegionId,
        key: Vec<u8>,
        peer_ids: &[PeerId],
        leader: PeerId,
    ) -> RegionState {
        let store_ids: Vec<StoreId> = self.meta.peers.iter().map(|p| p.store_id).collect();
        let mut child =
            RegionState::new(new_region_id, &store_ids, peer_ids, leader, RegionEpoch::default());
        child.update_key_range(key.clone(), self.meta.end_key.clone());
        let start = std::mem::take(&mut self.meta.start_key);
        self.update_key_range(start, key);
        child
    }

    pub(crate) fn merge(&mut self, end_key: Vec<u8>) {
        self.meta.end_key = end_key;
        self.inc_version();
    }

    pub(crate) fn update_key_range(&mut self, start: Vec<u8>, end: Vec<u8>) {
        self.meta.start_key = start;
        self.meta.end_key = end;
        self.inc_version();
    }

    fn inc_conf_ver(&mut self) {
        self.meta.region_epoch.conf_ver += 1;
    }

    fn inc_version(&mut self) {
        self.meta.region_epoch.version += 1;
    }
}
