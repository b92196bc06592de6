//! Absolute counter samples and the [`RawSampler`] capability.
//!
//! A sampler reads cumulative kernel counters exactly as the platform reports
//! them. It never computes deltas; that is the job of
//! [`DeltaStore`](crate::delta::DeltaStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SampleError;

/// Category of monitored subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Cumulative CPU time per category, in clock ticks (`USER_HZ`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

/// Cumulative block device I/O.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCounters {
    /// Bytes read.
    pub rbyte: u64,
    /// Milliseconds spent reading.
    pub rtick: u64,
    /// Bytes written.
    pub wbyte: u64,
    /// Milliseconds spent writing.
    pub wtick: u64,
    /// Milliseconds the device had I/O in flight.
    pub iotick: u64,
}

/// Cumulative interface traffic in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetCounters {
    pub rx: u64,
    pub tx: u64,
}

/// Keyed absolute counters for one resource kind, captured together.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterBatch<C> {
    pub captured_at: DateTime<Utc>,
    /// `(resource key, absolute counters)`, one entry per discovered key.
    pub entries: Vec<(String, C)>,
}

impl<C> CounterBatch<C> {
    pub fn new(captured_at: DateTime<Utc>, entries: Vec<(String, C)>) -> Self {
        Self {
            captured_at,
            entries,
        }
    }
}

/// Absolute CPU state.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuSample {
    pub captured_at: DateTime<Utc>,
    /// Aggregate over all cores (the `"all"` key).
    pub all: CpuTimes,
    /// Per-core counters keyed by core name (`"cpu0"`, `"cpu1"`, ...).
    pub cores: Vec<(String, CpuTimes)>,
    /// Current clock per core in kHz, in core order. May be shorter than
    /// `cores` or empty when the platform does not expose every core.
    pub core_clocks_khz: Vec<u64>,
    /// Runnable processes.
    pub running: u64,
    /// Processes blocked on I/O.
    pub blocked: u64,
}

/// Instantaneous memory gauges in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub captured_at: DateTime<Utc>,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub shared: u64,
    pub buffers: u64,
    pub cache: u64,
    pub available: u64,
}

/// Source of absolute counters for each resource kind.
///
/// Implementations enumerate every currently discoverable key on each call.
/// A failure for any key fails the whole call; partial batches are never
/// returned.
pub trait RawSampler {
    fn sample_cpu(&mut self) -> Result<CpuSample, SampleError>;

    fn sample_memory(&mut self) -> Result<MemorySample, SampleError>;

    fn sample_disks(&mut self) -> Result<CounterBatch<DiskCounters>, SampleError>;

    fn sample_networks(&mut self) -> Result<CounterBatch<NetCounters>, SampleError>;
}

impl<S: RawSampler + ?Sized> RawSampler for Box<S> {
    fn sample_cpu(&mut self) -> Result<CpuSample, SampleError> {
        (**self).sample_cpu()
    }

    fn sample_memory(&mut self) -> Result<MemorySample, SampleError> {
        (**self).sample_memory()
    }

    fn sample_disks(&mut self) -> Result<CounterBatch<DiskCounters>, SampleError> {
        (**self).sample_disks()
    }

    fn sample_networks(&mut self) -> Result<CounterBatch<NetCounters>, SampleError> {
        (**self).sample_networks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_matches_wire_tag() {
        assert_eq!(ResourceKind::Cpu.to_string(), "cpu");
        assert_eq!(ResourceKind::Network.to_string(), "network");
        assert_eq!(
            serde_json::to_string(&ResourceKind::Disk).unwrap(),
            "\"disk\""
        );
    }
}
