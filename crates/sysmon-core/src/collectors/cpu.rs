//! CPU tick deltas, run queue gauges and average clock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{sampling_failed, to_stat};
use crate::command::{Command, ExecContext, tag};
use crate::delta::DeltaStore;
use crate::error::Result;
use crate::sample::{CpuSample, CpuTimes, RawSampler, ResourceKind};

/// Resource key of the aggregate CPU line.
pub const ALL_KEY: &str = "all";

/// Tick deltas for one core, or for all cores together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuUtilization {
    pub name: String,
    #[serde(flatten)]
    pub ticks: CpuTimes,
    /// Current clock in kHz; `None` when not every core reported one.
    pub clock: Option<u64>,
}

/// `stat` payload of a `cpu` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuStat {
    pub time: DateTime<Utc>,
    pub all: CpuUtilization,
    pub cores: Vec<CpuUtilization>,
    pub running: u64,
    pub blocked: u64,
}

/// Per-core clocks, only if every core has one.
fn complete_clocks(sample: &CpuSample) -> Option<&[u64]> {
    let n = sample.cores.len();
    if n == 0 || sample.core_clocks_khz.len() < n {
        if n > 0 {
            log::debug!(
                "clock available for {} of {n} cores; reporting none",
                sample.core_clocks_khz.len()
            );
        }
        return None;
    }
    Some(&sample.core_clocks_khz[..n])
}

/// Sample CPU counters and diff them against the previous call.
///
/// The aggregate line and each core are tracked as separate keys; the
/// aggregate delta is not derived from the per-core deltas.
pub fn collect_cpu(store: &mut DeltaStore, sampler: &mut dyn RawSampler) -> Result<CpuStat> {
    let sample = sampler
        .sample_cpu()
        .map_err(sampling_failed(ResourceKind::Cpu))?;
    let at = sample.captured_at;
    let clocks = complete_clocks(&sample);

    let all = store.advance(ALL_KEY, sample.all, at);
    let cores = sample
        .cores
        .iter()
        .enumerate()
        .map(|(i, (name, ticks))| CpuUtilization {
            name: name.clone(),
            ticks: store.advance(name, *ticks, at).counters,
            clock: clocks.map(|c| c[i]),
        })
        .collect();

    Ok(CpuStat {
        time: at,
        all: CpuUtilization {
            name: ALL_KEY.to_string(),
            ticks: all.counters,
            clock: clocks.map(|c| c.iter().sum::<u64>() / c.len() as u64),
        },
        cores,
        running: sample.running,
        blocked: sample.blocked,
    })
}

/// `{"type": "cpu"}`
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuCommand;

impl Command for CpuCommand {
    fn command_type(&self) -> &'static str {
        tag::CPU
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<Value> {
        to_stat(&collect_cpu(ctx.store, ctx.sampler)?)
    }
}
