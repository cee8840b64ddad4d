//! Tuning constants and the settings for a discovery run.

use crate::relation::NullPolicy;

/// Ratio of invalid to valid candidates above which validation gives up on the current round and
/// goes back to sampling, provided the number of invalid candidates also grew since the previous
/// level.
pub const EFFICIENCY_THRESHOLD: f64 = 0.01;

/// Each sampling round after the first lowers its efficiency threshold to at most this fraction
/// of the best remaining column efficiency.
pub const SAMPLING_THRESHOLD_DECREASE: f64 = 0.9;

/// Longest field, in bytes, that [`DelimitedStream`](crate::input::DelimitedStream) accepts.
pub const MAX_FIELD_LEN: usize = 64 * 1024;

/// Environment variable consulted for the default worker count.
pub const THREADS_ENV: &str = "AGREE_LATTICE_THREADS";

/// Settings for one discovery run.
///
/// ```
/// use agree_lattice::{DiscoveryConfig, NullPolicy};
///
/// let config = DiscoveryConfig::default()
///     .with_threads(4)
///     .with_null_policy(NullPolicy::NullNotEqualsNull);
/// assert_eq!(config.threads, 4);
/// assert_eq!(config.max_rounds, None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryConfig {
    /// Number of worker threads for sampling and validation. `1` runs everything on the calling
    /// thread.
    pub threads: usize,
    /// Whether two NULL (or empty) values count as equal when building PLIs.
    pub null_policy: NullPolicy,
    /// Upper bound on the number of sample/induct/validate rounds. The bound is only checked
    /// between rounds.
    pub max_rounds: Option<usize>,
    /// Efficiency threshold for the sampler's windows and the validator's early return.
    pub efficiency_threshold: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            threads: default_threads(),
            null_policy: NullPolicy::NullEqualsNull,
            max_rounds: None,
            efficiency_threshold: EFFICIENCY_THRESHOLD,
        }
    }
}

impl DiscoveryConfig {
    /// Sets the worker count. Zero is treated as one.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Sets how NULL values compare when building PLIs.
    pub fn with_null_policy(mut self, null_policy: NullPolicy) -> Self {
        self.null_policy = null_policy;
        self
    }

    /// Limits the number of discovery rounds.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// Overrides [`EFFICIENCY_THRESHOLD`].
    pub fn with_efficiency_threshold(mut self, threshold: f64) -> Self {
        assert!(threshold >= 0.0 && threshold.is_finite());
        self.efficiency_threshold = threshold;
        self
    }
}

fn default_threads() -> usize {
    std::env::var(THREADS_ENV)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}
