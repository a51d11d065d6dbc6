// Live relay statistics for the health route.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

struct StatsSample {
    at: Instant,
    relayed_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub streams_started: u64,
    pub active_streams: u32,
    pub stream_failures: u64,
    pub bytes_relayed: u64,
    pub relay_bps: u64,
}

pub struct RelayStats {
    streams_started: AtomicU64,
    active_streams: AtomicU32,
    stream_failures: AtomicU64,
    relayed_bytes_total: AtomicU64,
    last_sample: Mutex<StatsSample>,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            streams_started: AtomicU64::new(0),
            active_streams: AtomicU32::new(0),
            stream_failures: AtomicU64::new(0),
            relayed_bytes_total: AtomicU64::new(0),
            last_sample: Mutex::new(StatsSample {
                at: Instant::now(),
                relayed_bytes: 0,
            }),
        }
    }

    pub fn stream_started(&self) {
        self.streams_started.fetch_add(1, Ordering::Relaxed);
        self.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_finished(&self) {
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.stream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self, bytes: u64) {
        self.relayed_bytes_total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (current, relay_bps) = {
            // Read the counter under the lock so concurrent snapshots stay ordered.
            let mut sample = self.last_sample.lock();
            let now = Instant::now();
            let current = self.relayed_bytes_total.load(Ordering::Relaxed);
            let elapsed = now.duration_since(sample.at).as_secs_f64();
            let bps = if elapsed > 0.1 {
                (current.saturating_sub(sample.relayed_bytes) as f64 / elapsed) as u64
            } else {
                0
            };
            sample.at = now;
            sample.relayed_bytes = current;
            (current, bps)
        };

        StatsSnapshot {
            streams_started: self.streams_started.load(Ordering::Relaxed),
            active_streams: self.active_streams.load(Ordering::Relaxed),
            stream_failures: self.stream_failures.load(Ordering::Relaxed),
            bytes_relayed: current,
            relay_bps,
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let stats = RelayStats::new();
        stats.stream_started();
        stats.stream_started();
        stats.stream_finished();
        stats.record_failure();
        stats.record_relayed(1000);
        stats.record_relayed(500);

        let snap = stats.snapshot();
        assert_eq!(snap.streams_started, 2);
        assert_eq!(snap.active_streams, 1);
        assert_eq!(snap.stream_failures, 1);
        assert_eq!(snap.bytes_relayed, 1500);
    }

    #[test]
    fn test_concurrent_snapshots() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(RelayStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        stats.record_relayed(7);
                        let _ = stats.snapshot();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().bytes_relayed, 4 * 2000 * 7);
    }
}
