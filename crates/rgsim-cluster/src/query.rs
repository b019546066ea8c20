use rgsim_types::{Peer, Region, RegionId, RegionInfo, ScannedRegion};

use crate::cluster::ClusterState;
use crate::region::RegionState;

/// Whether a region `[region_start, region_end)` intersects `[start, end)`.
/// An empty end on either side is unbounded.
pub(crate) fn intersects(region_start: &[u8], region_end: &[u8], start: &[u8], end: &[u8]) -> bool {
    let on_right = !end.is_empty() && end <= region_start;
    let on_left = !region_end.is_empty() && region_end <= start;
    !(on_left || on_right)
}

impl ClusterState {
    /// Down peers of `region`, in the region's peer order.
    pub(crate) fn down_peers(&self, region: &RegionState) -> Vec<Peer> {
        region
            .meta
            .peers
            .iter()
            .filter(|p| self.down_peers.contains(&p.id))
            .copied()
            .collect()
    }

    fn region_info(&self, region: &RegionState) -> RegionInfo {
        RegionInfo {
            meta: region.meta.clone(),
            leader: region.leader_peer().copied(),
            buckets: region.buckets.clone(),
            down_peers: self.down_peers(region),
        }
    }

    fn containing_region(&self, key: &[u8]) -> Option<&RegionState> {
        self.regions.values().find(|r| r.meta.contains(key))
    }

    pub(crate) fn all_regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self.regions.values().map(|r| r.meta.clone()).collect();
        regions.sort_by(|a, b| a.start_key.cmp(&b.start_key));
        regions
    }

    pub(crate) fn region_by_key(&self, key: &[u8]) -> Option<RegionInfo> {
        self.containing_region(key).map(|r| self.region_info(r))
    }

    pub(crate) fn prev_region_by_key(&self, key: &[u8]) -> Option<RegionInfo> {
        let current = self.containing_region(key)?;
        if current.meta.start_key.is_empty() {
            return None;
        }
        let start = current.meta.start_key.as_slice();
        self.regions
            .values()
            .find(|r| r.meta.end_key == start)
            .map(|r| self.region_info(r))
    }

    pub(crate) fn region_by_id(&self, region_id: RegionId) -> Option<RegionInfo> {
        self.regions.get(&region_id).map(|r| self.region_info(r))
    }

    pub(crate) fn scan_regions(&self, start_key: &[u8], end_key: &[u8], limit: i64) -> Vec<ScannedRegion> {
        let mut regions: Vec<&RegionState> = self.regions.values().collect();
        regions.sort_by(|a, b| a.meta.start_key.cmp(&b.meta.start_key));

        // First region that ends after `start_key`.
        let first = regions.partition_point(|r| {
            !r.meta.end_key.is_empty() && r.meta.end_key.as_slice() <= start_key
        });
        let mut regions = regions.split_off(first);

        if !end_key.is_empty() {
            let last = regions.partition_point(|r| r.meta.start_key.as_slice() < end_key);
            regions.truncate(last);
        }

        if let Some(hidden) = self.unreported_region {
            regions.retain(|r| r.id() != hidden);
        }

        if limit > 0 {
            regions.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        regions
            .into_iter()
            .map(|r| ScannedRegion {
                meta: r.meta.clone(),
                leader: r.leader_peer().copied().unwrap_or_default(),
                down_peers: self.down_peers(r),
                buckets: r.buckets.clone(),
            })
            .collect()
    }

    /// Ids of every region intersecting `[start, end)`, in key order.
    pub(crate) fn regions_cover_range(&self, start: &[u8], end: &[u8]) -> Vec<RegionId> {
        let mut covering: Vec<&RegionState> = self
            .regions
            .values()
            .filter(|r| intersects(&r.meta.start_key, &r.meta.end_key, start, end))
            .collect();
        covering.sort_by(|a, b| a.meta.start_key.cmp(&b.meta.start_key));
        covering.into_iter().map(|r| r.id()).collect()
    }
}
