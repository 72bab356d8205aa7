//! Polling-interval inference for newly added feeds.
//!
//! A new feed should be polled roughly twice as often as it publishes,
//! without going below one minute or above one day, so the desired value is
//! half the mean gap between its existing entries, snapped down onto a fixed
//! lattice of human-friendly intervals.

use chrono::{DateTime, Utc};

use crate::config::Config;

/// The allowed polling intervals, ascending, in seconds.
const CHOICES: [i64; 11] = [
    60,
    60 * 5,
    60 * 10,
    60 * 15,
    60 * 30,
    60 * 60,
    60 * 60 * 2,
    60 * 60 * 4,
    60 * 60 * 8,
    60 * 60 * 12,
    60 * 60 * 24,
];

/// Estimate a polling interval in seconds from entry publish times.
///
/// Fewer than two timestamps give no spacing information, so the configured
/// default is returned.
pub fn estimate(timestamps: &[DateTime<Utc>], config: &Config) -> i64 {
    if timestamps.len() < 2 {
        return config.default_interval_secs;
    }

    let mut sorted: Vec<i64> = timestamps.iter().map(|t| t.timestamp()).collect();
    sorted.sort_unstable();

    let gaps: Vec<i64> = sorted.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = gaps.iter().sum::<i64>() / gaps.len() as i64;
    let desired = mean / 2;

    if desired == 0 {
        config.default_interval_secs
    } else if desired < CHOICES[0] {
        CHOICES[0]
    } else {
        CHOICES
            .iter()
            .copied()
            .filter(|&choice| choice <= desired)
            .max()
            .unwrap_or(CHOICES[0])
    }
}
