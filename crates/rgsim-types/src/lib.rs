pub type StoreId = u64;
pub type RegionId = u64;
pub type PeerId = u64;

/// Leader id meaning "the region currently has no leader".
pub const NO_LEADER: PeerId = 0;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoreLabel {
    pub key: String,
    pub value: String,
}

impl StoreLabel {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        StoreLabel { key: key.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StoreState {
    #[default]
    Up,
    Offline,
    Tombstone,
}

/// Metadata of a simulated storage node.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub address: String,
    /// Address used for replica-to-replica traffic.
    pub peer_address: String,
    pub labels: Vec<StoreLabel>,
    pub state: StoreState,
}

impl Store {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|l| l.key == key).map(|l| l.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PeerRole {
    #[default]
    Voter,
    Learner,
}

/// One replica of a region. `Peer::default()` (id 0) is the placeholder used
/// when a region has no leader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub store_id: StoreId,
    pub role: PeerRole,
}

impl Peer {
    pub fn new(id: PeerId, store_id: StoreId) -> Self {
        Peer { id, store_id, role: PeerRole::Voter }
    }
}

/// `conf_ver` moves on membership changes, `version` on key-range changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegionEpoch {
    pub conf_ver: u64,
    pub version: u64,
}

/// A half-open key range `[start_key, end_key)` and its replica set.
///
/// Keys are held in their encoded form. An empty `end_key` means the range is
/// unbounded on the right; an empty `start_key` is the beginning of keyspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub peers: Vec<Peer>,
    pub region_epoch: RegionEpoch,
}

impl Region {
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_slice()
            && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }

    pub fn peer(&self, peer_id: PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == peer_id)
    }
}

/// Logical sub-range boundaries of a region, tagged with their own version.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Buckets {
    pub region_id: RegionId,
    pub version: u64,
    pub keys: Vec<Vec<u8>>,
}

/// Result of a point, predecessor or by-id region lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    pub meta: Region,
    /// `None` when the region has no leader.
    pub leader: Option<Peer>,
    pub buckets: Option<Buckets>,
    pub down_peers: Vec<Peer>,
}

/// One entry of a bounded region scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRegion {
    pub meta: Region,
    /// `Peer::default()` when the region has no leader.
    pub leader: Peer,
    pub down_peers: Vec<Peer>,
    pub buckets: Option<Buckets>,
}

/// A committed key/value pair as returned by the data collaborator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IsolationLevel {
    /// Snapshot isolation.
    #[default]
    Si,
    /// Read committed.
    Rc,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RgsimError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("operation canceled")]
    Canceled,
    #[error("region {0} not found")]
    RegionNotFound(RegionId),
    #[error("store {0} not found")]
    StoreNotFound(StoreId),
    #[error("storage error: {0}")]
    Storage(String),
}
