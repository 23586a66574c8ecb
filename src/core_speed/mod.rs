//! Per-transfer speed accounting and throttling.

use crate::config::Config;
use crate::constants::MINIMUM_SPEED_KICK_SECS;
use crate::core_acl::speed::{self, TransferRules};
use crate::core_acl::user::User;
use crate::core_counter::{Counter, SpeedCounter};
use crate::core_fs::VirtualPath;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A `(duration, bytes)` pair used to compute rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSample {
    pub duration: Duration,
    pub bytes: u64,
}

impl SpeedSample {
    /// Average bytes/s over the sample window.
    pub fn speed(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 {
            return self.bytes as f64;
        }
        self.bytes as f64 / secs
    }
}

/// Monotone counters for one in-flight transfer.
#[derive(Debug)]
pub struct TransferState {
    bytes: u64,
    started: Instant,
}

impl TransferState {
    pub fn new() -> Self {
        Self {
            bytes: 0,
            started: Instant::now(),
        }
    }

    pub fn restart(&mut self) {
        self.bytes = 0;
        self.started = Instant::now();
    }

    pub fn add_bytes(&mut self, n: u64) {
        self.bytes += n;
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn duration(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn sample(&self) -> SpeedSample {
        SpeedSample {
            duration: self.duration(),
            bytes: self.bytes,
        }
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
#[error("transfer fell below the minimum of {minimum} B/s (currently {actual:.0} B/s)")]
pub struct MinimumSpeedError {
    pub minimum: u64,
    pub actual: f64,
}

/// Sleep needed to keep an average rate at or under `limit` bytes/s.
fn speed_limit_sleep(sample: SpeedSample, limit: u64) -> Duration {
    if limit == 0 {
        return Duration::ZERO;
    }
    let required = Duration::from_secs_f64(sample.bytes as f64 / limit as f64);
    required.saturating_sub(sample.duration)
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Enforces one transfer's speed rules after every chunk.
///
/// Rules are captured from the config snapshot valid when the transfer
/// opened. Dropping the controller deregisters from every global class.
pub struct SpeedControl {
    rules: TransferRules,
    counter: &'static SpeedCounter,
    token: u64,
    last_minimum_ok: Instant,
}

impl SpeedControl {
    pub fn upload(user: &User, path: &VirtualPath, config: &Config) -> Self {
        Self::new(speed::upload_rules(user, path, config), Counter::upload_speeds())
    }

    pub fn download(user: &User, path: &VirtualPath, config: &Config) -> Self {
        Self::new(
            speed::download_rules(user, path, config),
            Counter::download_speeds(),
        )
    }

    /// Controller with no rules; listings and other unshaped pumps use it.
    pub fn unlimited() -> Self {
        Self::new(TransferRules::default(), Counter::upload_speeds())
    }

    fn new(rules: TransferRules, counter: &'static SpeedCounter) -> Self {
        Self {
            rules,
            counter,
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            last_minimum_ok: Instant::now(),
        }
    }

    /// Invoked after each chunk with the transfer's cumulative state.
    /// A transfer with no rules short-circuits before any arithmetic.
    pub async fn apply(&mut self, state: &TransferState) -> Result<(), MinimumSpeedError> {
        if self.rules.is_empty() {
            return Ok(());
        }

        let sample = state.sample();
        if self.rules.minimum > 0 {
            self.check_minimum(sample.speed(), Instant::now())?;
        }

        let mut sleep = Duration::ZERO;
        if self.rules.maximum > 0 {
            sleep = speed_limit_sleep(sample, self.rules.maximum);
        }
        if !self.rules.classes.is_empty() {
            sleep = sleep.max(self.counter.update(self.token, sample, &self.rules.classes));
        }
        if sleep > Duration::ZERO {
            tokio::time::sleep(sleep).await;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn test_with_rules(rules: TransferRules, counter: &'static SpeedCounter) -> Self {
        Self::new(rules, counter)
    }

    fn check_minimum(&mut self, speed: f64, now: Instant) -> Result<(), MinimumSpeedError> {
        if speed > self.rules.minimum as f64 {
            self.last_minimum_ok = now;
            return Ok(());
        }
        if now.duration_since(self.last_minimum_ok) > Duration::from_secs(MINIMUM_SPEED_KICK_SECS) {
            return Err(MinimumSpeedError {
                minimum: self.rules.minimum,
                actual: speed,
            });
        }
        Ok(())
    }
}

impl Drop for SpeedControl {
    fn drop(&mut self) {
        self.counter.clear(self.token, &self.rules.classes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_acl::speed::LimitClass;

    #[test]
    fn sample_speed() {
        let sample = SpeedSample {
            duration: Duration::from_secs(2),
            bytes: 2048,
        };
        assert_eq!(sample.speed(), 1024.0);
    }

    #[test]
    fn shaping_sleep_matches_budget() {
        // 100 KiB moved in 1 s against a 10 KiB/s ceiling should have taken
        // 10 s: owes 9 s of sleep.
        let sample = SpeedSample {
            duration: Duration::from_secs(1),
            bytes: 100 * 1024,
        };
        let sleep = speed_limit_sleep(sample, 10 * 1024);
        assert_eq!(sleep, Duration::from_secs(9));

        // Under budget owes nothing.
        let slow = SpeedSample {
            duration: Duration::from_secs(20),
            bytes: 100 * 1024,
        };
        assert_eq!(speed_limit_sleep(slow, 10 * 1024), Duration::ZERO);
    }

    #[test]
    fn minimum_kicks_after_sustained_underrun() {
        let rules = TransferRules {
            minimum: 1000,
            maximum: 0,
            classes: Vec::new(),
        };
        let mut control = SpeedControl::new(rules, Counter::download_speeds());

        let start = Instant::now();
        control.last_minimum_ok = start;
        // Under the floor but inside the 5 s window: tolerated.
        assert!(control.check_minimum(10.0, start + Duration::from_secs(4)).is_ok());
        // Beyond the window: kicked.
        let err = control
            .check_minimum(10.0, start + Duration::from_secs(6))
            .unwrap_err();
        assert_eq!(err.minimum, 1000);
        // Recovery resets the window.
        control.last_minimum_ok = start;
        assert!(control.check_minimum(5000.0, start + Duration::from_secs(6)).is_ok());
        assert!(control.check_minimum(10.0, start + Duration::from_secs(7)).is_ok());
    }

    #[tokio::test]
    async fn empty_rules_short_circuit() {
        let mut control = SpeedControl::new(TransferRules::default(), Counter::upload_speeds());
        let state = TransferState::new();
        control.apply(&state).await.unwrap();
    }

    #[tokio::test]
    async fn drop_clears_global_classes() {
        let classes = vec![LimitClass {
            name: "drop-test".to_string(),
            bytes_per_sec: 1 << 30,
        }];
        let rules = TransferRules {
            minimum: 0,
            maximum: 0,
            classes,
        };
        let mut control = SpeedControl::new(rules, Counter::upload_speeds());
        let mut state = TransferState::new();
        state.add_bytes(1);
        control.apply(&state).await.unwrap();
        assert_eq!(Counter::upload_speeds().participants("drop-test"), 1);
        drop(control);
        assert_eq!(Counter::upload_speeds().participants("drop-test"), 0);
    }
}
