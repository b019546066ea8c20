use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use rgsim_types::RegionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DelayKey {
    start_ts: u64,
    region_id: RegionId,
}

/// One-shot delays keyed by `(transaction start_ts, region)`.
///
/// Has its own lock so scheduling or consuming a delay never waits on region
/// or store mutation.
#[derive(Debug, Default)]
pub(crate) struct DelayTable {
    events: Mutex<HashMap<DelayKey, Duration>>,
}

impl DelayTable {
    pub(crate) fn schedule(&self, start_ts: u64, region_id: RegionId, dur: Duration) {
        self.events.lock().insert(DelayKey { start_ts, region_id }, dur);
    }

    /// Remove and return the delay registered for the pair, if any.
    pub(crate) fn take(&self, start_ts: u64, region_id: RegionId) -> Option<Duration> {
        self.events.lock().remove(&DelayKey { start_ts, region_id })
    }

    /// Consume the delay for the pair and block the calling thread for it.
    /// The table lock is released before sleeping.
    pub(crate) fn handle(&self, start_ts: u64, region_id: RegionId) -> Option<Duration> {
        let dur = self.take(start_ts, region_id)?;
        tracing::debug!(start_ts, region_id, delay_ms = dur.as_millis() as u64, "injecting delay");
        std::thread::sleep(dur);
        Some(dur)
    }
}
