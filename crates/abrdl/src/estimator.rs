use std::time::Duration;

/// Weight given to the accumulated estimate on every update.
pub const HISTORY_WEIGHT: f64 = 0.8;

/// Exponential moving average of observed throughput, in Kbps.
#[derive(Debug, Clone)]
pub struct BandwidthEstimator {
    estimate_kbps: f64,
}

impl BandwidthEstimator {
    pub fn new(seed_kbps: f64) -> Self {
        Self {
            estimate_kbps: seed_kbps,
        }
    }

    pub fn update(&mut self, observed_kbps: f64) {
        self.estimate_kbps =
            HISTORY_WEIGHT * self.estimate_kbps + (1.0 - HISTORY_WEIGHT) * observed_kbps;
    }

    pub fn estimate(&self) -> f64 {
        self.estimate_kbps
    }
}

/// Converts a finished transfer into Kbps.
///
/// Returns `None` for an empty payload or a zero elapsed time. Such a sample
/// must be skipped instead of being fed to [`BandwidthEstimator::update`].
pub fn observed_kbps(bytes: usize, elapsed: Duration) -> Option<f64> {
    let seconds = elapsed.as_secs_f64();
    if bytes == 0 || seconds <= 0.0 {
        return None;
    }

    Some((bytes as f64 / 1024.0) * 8.0 / seconds)
}
