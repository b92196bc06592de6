//! Keyed store of the last absolute sample per resource, and the delta rule.
//!
//! For every `(kind, key)` the store keeps the most recent absolute counters.
//! Advancing a key with a fresh sample yields `current - previous`
//! field-by-field and replaces the stored sample:
//!
//! - A key seen for the first time is diffed against an all-zero sample, so
//!   the first delta for a resource equals its absolute counters. Consumers
//!   should discard or down-weight that first value.
//! - A field that went backwards (counter reset, device re-enumerated under
//!   the same name) is handled by [`RegressionPolicy`].
//! - Keys that stop being reported are never evicted; they just stop
//!   changing.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};

use crate::sample::{CounterBatch, CpuTimes, DiskCounters, NetCounters, ResourceKind};

// ---------------------------------------------------------------------------
// Regression policy
// ---------------------------------------------------------------------------

/// What to report when a counter is lower than its stored predecessor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegressionPolicy {
    /// Unsigned wraparound subtraction. Yields values near `u64::MAX`.
    #[default]
    Wrap,
    /// Saturate each regressed field at zero.
    Clamp,
    /// Treat the whole sample as a new baseline and report it verbatim.
    Rebaseline,
}

impl RegressionPolicy {
    fn apply<C: Counters>(self, current: &C, previous: &C) -> C {
        match self {
            Self::Wrap => current.zip_with(previous, u64::wrapping_sub),
            Self::Clamp => current.zip_with(previous, u64::saturating_sub),
            Self::Rebaseline => {
                if current.any_field(previous, |cur, prev| cur < prev) {
                    *current
                } else {
                    current.zip_with(previous, u64::wrapping_sub)
                }
            }
        }
    }
}

impl std::fmt::Display for RegressionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wrap => write!(f, "wrap"),
            Self::Clamp => write!(f, "clamp"),
            Self::Rebaseline => write!(f, "rebaseline"),
        }
    }
}

impl FromStr for RegressionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wrap" => Ok(Self::Wrap),
            "clamp" => Ok(Self::Clamp),
            "rebaseline" | "reset" => Ok(Self::Rebaseline),
            other => Err(format!(
                "unknown regression policy '{other}' (expected wrap, clamp or rebaseline)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Counter sets
// ---------------------------------------------------------------------------

/// Stored absolute sample, one variant per rate-based resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredSample {
    Cpu(CpuTimes),
    Disk(DiskCounters),
    Network(NetCounters),
}

/// A stored sample and when it was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub captured_at: DateTime<Utc>,
    pub sample: StoredSample,
}

/// A fixed set of cumulative `u64` counters that can be diffed field-wise.
pub trait Counters: Copy + Default {
    const KIND: ResourceKind;

    fn into_stored(self) -> StoredSample;

    fn from_stored(stored: &StoredSample) -> Option<Self>;

    /// Combine each field of `self` with the same field of `other`.
    fn zip_with(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self;

    /// `true` if `pred` holds for any field pair.
    fn any_field(&self, other: &Self, pred: impl Fn(u64, u64) -> bool) -> bool;
}

macro_rules! impl_counters {
    ($ty:ident, $kind:ident, $($field:ident),+ $(,)?) => {
        impl Counters for $ty {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn into_stored(self) -> StoredSample {
                StoredSample::$kind(self)
            }

            fn from_stored(stored: &StoredSample) -> Option<Self> {
                match stored {
                    StoredSample::$kind(c) => Some(*c),
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }

            fn zip_with(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self {
                Self {
                    $($field: op(self.$field, other.$field),)+
                }
            }

            fn any_field(&self, other: &Self, pred: impl Fn(u64, u64) -> bool) -> bool {
                false $(|| pred(self.$field, other.$field))+
            }
        }
    };
}

impl_counters!(
    CpuTimes, Cpu, user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice,
);
impl_counters!(DiskCounters, Disk, rbyte, rtick, wbyte, wtick, iotick);
impl_counters!(NetCounters, Network, rx, tx);

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Result of advancing one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta<C> {
    pub counters: C,
    /// No previous sample existed; `counters` are the absolute values.
    pub first_observation: bool,
    /// Time since the previous capture for this key.
    pub elapsed: Option<TimeDelta>,
}

/// Last absolute sample per `(kind, key)`, owned by the dispatch loop.
#[derive(Debug, Default)]
pub struct DeltaStore {
    policy: RegressionPolicy,
    entries: HashMap<(ResourceKind, String), Observation>,
}

impl DeltaStore {
    pub fn new(policy: RegressionPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn policy(&self) -> RegressionPolicy {
        self.policy
    }

    /// Number of tracked `(kind, key)` entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, kind: ResourceKind, key: &str) -> bool {
        self.entries.contains_key(&(kind, key.to_owned()))
    }

    pub fn observation(&self, kind: ResourceKind, key: &str) -> Option<&Observation> {
        self.entries.get(&(kind, key.to_owned()))
    }

    /// Stored absolute counters for `key` of kind `C::KIND`.
    pub fn previous<C: Counters>(&self, key: &str) -> Option<C> {
        self.observation(C::KIND, key)
            .and_then(|o| C::from_stored(&o.sample))
    }

    /// Tracked keys of one kind, sorted.
    pub fn keys(&self, kind: ResourceKind) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Forget every stored sample.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Diff `current` against the stored sample for `key` and store it.
    pub fn advance<C: Counters>(
        &mut self,
        key: &str,
        current: C,
        captured_at: DateTime<Utc>,
    ) -> Delta<C> {
        let slot = (C::KIND, key.to_owned());
        let previous = self
            .entries
            .get(&slot)
            .and_then(|o| C::from_stored(&o.sample).map(|c| (c, o.captured_at)));

        let delta = match previous {
            None => Delta {
                counters: self.policy.apply(&current, &C::default()),
                first_observation: true,
                elapsed: None,
            },
            Some((prev, prev_at)) => Delta {
                counters: self.policy.apply(&current, &prev),
                first_observation: false,
                elapsed: Some(captured_at.signed_duration_since(prev_at)),
            },
        };

        self.entries.insert(
            slot,
            Observation {
                captured_at,
                sample: current.into_stored(),
            },
        );
        delta
    }

    /// Advance every entry of a batch in order.
    pub fn advance_batch<C: Counters>(
        &mut self,
        batch: &CounterBatch<C>,
    ) -> Vec<(String, Delta<C>)> {
        batch
            .entries
            .iter()
            .map(|(key, counters)| {
                let delta = self.advance(key, *counters, batch.captured_at);
                if delta.first_observation {
                    log::debug!("first {} sample for {key}", C::KIND);
                }
                (key.clone(), delta)
            })
            .collect()
    }
}
