//! Turn response latency sampling
//!
//! Observability only: nothing in the state machine reads these numbers.

use serde::Serialize;
use std::time::Duration;

/// Samples collected before a summary is emitted and the window resets
pub const LATENCY_WINDOW: usize = 20;

/// Statistics for one full window of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub p95_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: u64,
}

/// Collects user-speech-end to assistant-speech-start durations
#[derive(Debug, Default)]
pub struct LatencyRecorder {
    samples: Vec<Duration>,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self {
            samples: Vec::with_capacity(LATENCY_WINDOW),
        }
    }

    /// Record a sample. Returns a summary when the window fills, after which
    /// the sample set is empty again.
    pub fn record(&mut self, sample: Duration) -> Option<LatencySummary> {
        self.samples.push(sample);
        if self.samples.len() < LATENCY_WINDOW {
            return None;
        }

        let summary = summarize(&self.samples);
        self.samples.clear();
        summary
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Nearest-rank percentile: sort ascending, take index `ceil(p/100 * n) - 1`
pub fn percentile(samples: &[Duration], p: usize) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = (p * sorted.len()).div_ceil(100).max(1);
    sorted.get(rank - 1).copied()
}

fn summarize(samples: &[Duration]) -> Option<LatencySummary> {
    let p95 = percentile(samples, 95)?;
    let min = samples.iter().min()?;
    let max = samples.iter().max()?;
    let total: Duration = samples.iter().sum();
    let count = u32::try_from(samples.len()).ok()?;

    Some(LatencySummary {
        count: samples.len(),
        p95_ms: as_millis(p95),
        min_ms: as_millis(*min),
        max_ms: as_millis(*max),
        mean_ms: as_millis(total / count),
    })
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
