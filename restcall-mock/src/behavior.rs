// Network behavior knobs
// Models three properties of a network: delay (time before a response
// arrives), variance (fluctuation of that delay), and failure (percentage of
// invocations that fail). Knob changes apply to the next invocation's draws,
// never retroactively.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use restcall_core::NetworkFailure;

const DEFAULT_DELAY_MS: u64 = 2000; // Simulated calls take 2 seconds.
const DEFAULT_VARIANCE_PERCENT: u32 = 40; // Delay varies by ±40%.
const DEFAULT_FAILURE_PERCENT: u32 = 3; // 3% of simulated calls fail.

/// Randomized latency and failure injection for simulated calls.
#[derive(Debug)]
pub struct NetworkBehavior {
    delay_ms: AtomicU64,
    variance_percent: AtomicU32,
    failure_percent: AtomicU32,
    failure: Mutex<NetworkFailure>,
    rng: Mutex<StdRng>,
}

impl NetworkBehavior {
    /// Default behavior with an OS-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic behavior for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        NetworkBehavior {
            delay_ms: AtomicU64::new(DEFAULT_DELAY_MS),
            variance_percent: AtomicU32::new(DEFAULT_VARIANCE_PERCENT),
            failure_percent: AtomicU32::new(DEFAULT_FAILURE_PERCENT),
            failure: Mutex::new(NetworkFailure::io("simulated network failure")),
            rng: Mutex::new(rng),
        }
    }

    /// Set the simulated round-trip delay.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::Release);
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::Acquire))
    }

    /// Set the plus-or-minus variance percentage of the delay.
    ///
    /// # Panics
    /// Panics when `percent` exceeds 100.
    pub fn set_variance_percent(&self, percent: u32) {
        assert!(
            percent <= 100,
            "variance percentage must be between 0 and 100"
        );
        self.variance_percent.store(percent, Ordering::Release);
    }

    pub fn variance_percent(&self) -> u32 {
        self.variance_percent.load(Ordering::Acquire)
    }

    /// Set the percentage of invocations that fail.
    ///
    /// # Panics
    /// Panics when `percent` exceeds 100.
    pub fn set_failure_percent(&self, percent: u32) {
        assert!(
            percent <= 100,
            "failure percentage must be between 0 and 100"
        );
        self.failure_percent.store(percent, Ordering::Release);
    }

    pub fn failure_percent(&self) -> u32 {
        self.failure_percent.load(Ordering::Acquire)
    }

    /// Set the failure surfaced when the failure draw triggers.
    pub fn set_failure(&self, failure: NetworkFailure) {
        *self.lock_failure() = failure;
    }

    pub fn failure(&self) -> NetworkFailure {
        self.lock_failure().clone()
    }

    /// Draw whether this invocation fails: uniform in [0, 100) against the
    /// configured failure percentage.
    pub fn calculate_is_failure(&self) -> bool {
        let draw = self.lock_rng().random_range(0..100u32);
        draw < self.failure_percent.load(Ordering::Acquire)
    }

    /// Draw the delay for a successful invocation: base delay scaled by a
    /// uniform multiplier in [1 - variance, 1 + variance].
    pub fn calculate_delay(&self) -> Duration {
        let base = self.delay_ms.load(Ordering::Acquire) as f64;
        let variance = self.variance_percent.load(Ordering::Acquire) as f64 / 100.0;
        let lower = 1.0 - variance;
        let multiplier = lower + self.lock_rng().random::<f64>() * (2.0 * variance);
        Duration::from_millis((base * multiplier) as u64)
    }

    /// Draw the delay for a failing invocation: uniform in [0, 3 x base), so
    /// failures manifest anywhere from fast-fail to slow-timeout.
    pub fn calculate_failure_delay(&self) -> Duration {
        let cap = self.delay_ms.load(Ordering::Acquire).saturating_mul(3);
        if cap == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.lock_rng().random_range(0..cap))
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_failure(&self) -> std::sync::MutexGuard<'_, NetworkFailure> {
        match self.failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for NetworkBehavior {
    fn default() -> Self {
        Self::new()
    }
}
