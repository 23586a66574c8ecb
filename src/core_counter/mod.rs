//! Process-wide admission gates: logins, simultaneous transfers, bandwidth.
//!
//! One mutex per counter kind, short critical sections, no cross-counter
//! locks. Caps are read from a config snapshot by the caller at each
//! admission, so a reload applies to the next admission, not running ones.

use crate::core_acl::speed::LimitClass;
use crate::core_acl::user::UserId;
use crate::core_speed::SpeedSample;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterResult {
    Okay,
    PersonalFail,
    GlobalFail,
}

#[derive(Default)]
struct LoginGauges {
    personal: HashMap<UserId, usize>,
    total: usize,
}

/// Tracks active logins per user and in total.
#[derive(Default)]
pub struct LoginCounter {
    gauges: Mutex<LoginGauges>,
}

impl LoginCounter {
    /// Admits one login. `personal_cap` of 0 means unlimited; `replace`
    /// allows a full personal gauge through because an eviction of the
    /// oldest login has already been scheduled; exempt users bypass both
    /// caps. Every `Okay` must be paired with exactly one `stop`.
    pub fn start(
        &self,
        uid: UserId,
        personal_cap: usize,
        replace: bool,
        exempt: bool,
        global_cap: usize,
    ) -> CounterResult {
        let mut gauges = self.gauges.lock().expect("login counter lock poisoned");
        let current = gauges.personal.get(&uid).copied().unwrap_or(0);
        if !exempt {
            if personal_cap > 0 && current >= personal_cap && !replace {
                return CounterResult::PersonalFail;
            }
            if global_cap > 0 && gauges.total >= global_cap {
                return CounterResult::GlobalFail;
            }
        }
        *gauges.personal.entry(uid).or_insert(0) += 1;
        gauges.total += 1;
        CounterResult::Okay
    }

    pub fn stop(&self, uid: UserId) {
        let mut gauges = self.gauges.lock().expect("login counter lock poisoned");
        match gauges.personal.get_mut(&uid) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                gauges.personal.remove(&uid);
            }
            None => return,
        }
        gauges.total = gauges.total.saturating_sub(1);
    }

    pub fn total(&self) -> usize {
        self.gauges.lock().expect("login counter lock poisoned").total
    }

    pub fn logins_for(&self, uid: UserId) -> usize {
        self.gauges
            .lock()
            .expect("login counter lock poisoned")
            .personal
            .get(&uid)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Error, Debug)]
#[error("Maximum number of simultaneous {direction}s reached")]
pub struct TransferLimitExceeded {
    pub direction: &'static str,
}

/// Gauge for one transfer direction.
pub struct TransferCounter {
    direction: &'static str,
    count: Mutex<usize>,
}

impl TransferCounter {
    fn new(direction: &'static str) -> Self {
        Self {
            direction,
            count: Mutex::new(0),
        }
    }

    /// Admits one transfer; `cap` below 0 means unlimited. The returned
    /// guard releases the slot on drop, whatever ends the transfer.
    pub fn start(&'static self, cap: i64) -> Result<TransferGuard, TransferLimitExceeded> {
        let mut count = self.count.lock().expect("transfer counter lock poisoned");
        if cap >= 0 && *count >= cap as usize {
            return Err(TransferLimitExceeded {
                direction: self.direction,
            });
        }
        *count += 1;
        Ok(TransferGuard { counter: self })
    }

    pub fn active(&self) -> usize {
        *self.count.lock().expect("transfer counter lock poisoned")
    }
}

pub struct TransferGuard {
    counter: &'static TransferCounter,
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        let mut count = self
            .counter
            .count
            .lock()
            .expect("transfer counter lock poisoned");
        *count = count.saturating_sub(1);
    }
}

/// Latest speed sample of every transfer participating in each limit class.
#[derive(Default)]
pub struct SpeedCounter {
    classes: Mutex<HashMap<String, HashMap<u64, SpeedSample>>>,
}

impl SpeedCounter {
    /// Replaces `token`'s sample in every class and returns the sleep that
    /// keeps the busiest class compliant. Budget is shared fairly: each of
    /// the `n` participants gets `limit / n` of the class budget.
    pub fn update(&self, token: u64, sample: SpeedSample, classes: &[LimitClass]) -> Duration {
        if classes.is_empty() {
            return Duration::ZERO;
        }
        let mut map = self.classes.lock().expect("speed counter lock poisoned");
        let mut sleep = Duration::ZERO;
        for class in classes {
            let participants = map.entry(class.name.clone()).or_default();
            participants.insert(token, sample);
            let share = class.bytes_per_sec / participants.len() as u64;
            if share == 0 {
                continue;
            }
            let required = Duration::from_secs_f64(sample.bytes as f64 / share as f64);
            if required > sample.duration {
                sleep = sleep.max(required - sample.duration);
            }
        }
        sleep
    }

    /// Deregisters a finished transfer from each of its classes.
    pub fn clear(&self, token: u64, classes: &[LimitClass]) {
        let mut map = self.classes.lock().expect("speed counter lock poisoned");
        for class in classes {
            if let Some(participants) = map.get_mut(&class.name) {
                participants.remove(&token);
                if participants.is_empty() {
                    map.remove(&class.name);
                }
            }
        }
    }

    pub fn participants(&self, class: &str) -> usize {
        self.classes
            .lock()
            .expect("speed counter lock poisoned")
            .get(class)
            .map(|p| p.len())
            .unwrap_or(0)
    }
}

static LOGINS: Lazy<LoginCounter> = Lazy::new(LoginCounter::default);
static UPLOADS: Lazy<TransferCounter> = Lazy::new(|| TransferCounter::new("upload"));
static DOWNLOADS: Lazy<TransferCounter> = Lazy::new(|| TransferCounter::new("download"));
static UPLOAD_SPEEDS: Lazy<SpeedCounter> = Lazy::new(SpeedCounter::default);
static DOWNLOAD_SPEEDS: Lazy<SpeedCounter> = Lazy::new(SpeedCounter::default);

/// Access to the process-wide counter singletons.
pub struct Counter;

impl Counter {
    pub fn login() -> &'static LoginCounter {
        &LOGINS
    }

    pub fn uploads() -> &'static TransferCounter {
        &UPLOADS
    }

    pub fn downloads() -> &'static TransferCounter {
        &DOWNLOADS
    }

    pub fn upload_speeds() -> &'static SpeedCounter {
        &UPLOAD_SPEEDS
    }

    pub fn download_speeds() -> &'static SpeedCounter {
        &DOWNLOAD_SPEEDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_caps() {
        let counter = LoginCounter::default();
        assert_eq!(counter.start(1, 2, false, false, 10), CounterResult::Okay);
        assert_eq!(counter.start(1, 2, false, false, 10), CounterResult::Okay);
        assert_eq!(
            counter.start(1, 2, false, false, 10),
            CounterResult::PersonalFail
        );
        // replace admits past a full personal gauge
        assert_eq!(counter.start(1, 2, true, false, 10), CounterResult::Okay);
        assert_eq!(counter.logins_for(1), 3);
        counter.stop(1);
        counter.stop(1);
        counter.stop(1);
        assert_eq!(counter.total(), 0);
        assert_eq!(counter.logins_for(1), 0);
    }

    #[test]
    fn global_cap_and_exemption() {
        let counter = LoginCounter::default();
        assert_eq!(counter.start(1, 0, false, false, 1), CounterResult::Okay);
        assert_eq!(
            counter.start(2, 0, false, false, 1),
            CounterResult::GlobalFail
        );
        assert_eq!(counter.start(3, 0, false, true, 1), CounterResult::Okay);
        assert_eq!(counter.total(), 2);
    }

    #[test]
    fn stop_without_start_is_harmless() {
        let counter = LoginCounter::default();
        counter.stop(42);
        assert_eq!(counter.total(), 0);
    }

    #[test]
    fn transfer_guard_releases_on_drop() {
        static COUNTER: Lazy<TransferCounter> = Lazy::new(|| TransferCounter::new("test"));
        let first = COUNTER.start(1).unwrap();
        assert!(COUNTER.start(1).is_err());
        drop(first);
        let second = COUNTER.start(1).unwrap();
        assert_eq!(COUNTER.active(), 1);
        drop(second);
    }

    #[test]
    fn speed_counter_fair_share() {
        let counter = SpeedCounter::default();
        let classes = vec![LimitClass {
            name: "archive".to_string(),
            bytes_per_sec: 1000,
        }];

        // Lone participant within budget: no sleep.
        let sample = SpeedSample {
            duration: Duration::from_secs(1),
            bytes: 500,
        };
        assert_eq!(counter.update(1, sample, &classes), Duration::ZERO);

        // A second participant halves the share; 800 B over 1 s now needs
        // 1.6 s, so it owes 0.6 s.
        let fast = SpeedSample {
            duration: Duration::from_secs(1),
            bytes: 800,
        };
        let sleep = counter.update(2, fast, &classes);
        assert!(sleep > Duration::from_millis(500) && sleep < Duration::from_millis(700));

        counter.clear(2, &classes);
        assert_eq!(counter.participants("archive"), 1);
        counter.clear(1, &classes);
        assert_eq!(counter.participants("archive"), 0);
    }
}
