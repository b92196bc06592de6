//! One collector per resource kind.
//!
//! Each collector asks the [`RawSampler`](crate::sample::RawSampler) for
//! absolute values and, for cumulative counters (cpu, disk, network), turns
//! them into per-interval deltas through the
//! [`DeltaStore`](crate::delta::DeltaStore). Memory values are gauges and
//! pass through as read.
//!
//! A sampler failure is returned as [`Error::SamplingFailed`] and leaves the
//! store untouched for that kind.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;

pub use cpu::{CpuCommand, CpuStat, CpuUtilization, collect_cpu};
pub use disk::{DiskCommand, DiskStat, DiskUtilization, collect_disk};
pub use memory::{MemoryCommand, MemoryStat, collect_memory};
pub use network::{NetworkCommand, NetworkStat, NetworkUtilization, collect_network};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::sample::ResourceKind;

fn sampling_failed(kind: ResourceKind) -> impl FnOnce(crate::error::SampleError) -> Error {
    move |source| Error::SamplingFailed { kind, source }
}

fn to_stat<T: Serialize>(stat: &T) -> Result<Value> {
    serde_json::to_value(stat).map_err(Error::Serialize)
}
