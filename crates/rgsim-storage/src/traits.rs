use rgsim_types::{IsolationLevel, KvPair, RgsimError};

/// Committed-data range scan, the one capability the cluster needs from the
/// key/value engine.
///
/// Keys are raw (not memcomparable-encoded). Implementations must be safe to
/// share across threads since a `Cluster` holds one behind an `Arc`.
pub trait MvccStore: Send + Sync + 'static {
    /// Return up to `limit` pairs with `start_key <= key < end_key`, ordered by
    /// key, as visible to a reader at `start_ts`.
    ///
    /// * `end_key` empty means unbounded.
    /// * Deleted keys are omitted.
    fn scan(
        &self,
        start_key: &[u8],
        end_key: &[u8],
        limit: usize,
        start_ts: u64,
        isolation: IsolationLevel,
    ) -> Result<Vec<KvPair>, RgsimError>;
}
