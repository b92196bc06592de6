//! Memory gauges. No deltas: every value is a live reading.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{sampling_failed, to_stat};
use crate::command::{Command, ExecContext, tag};
use crate::error::Result;
use crate::sample::{RawSampler, ResourceKind};

/// `stat` payload of a `memory` response, in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStat {
    pub time: DateTime<Utc>,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub shared: u64,
    pub buffers: u64,
    pub cache: u64,
    pub available: u64,
}

pub fn collect_memory(sampler: &mut dyn RawSampler) -> Result<MemoryStat> {
    let m = sampler
        .sample_memory()
        .map_err(sampling_failed(ResourceKind::Memory))?;
    Ok(MemoryStat {
        time: m.captured_at,
        total: m.total,
        used: m.used,
        free: m.free,
        shared: m.shared,
        buffers: m.buffers,
        cache: m.cache,
        available: m.available,
    })
}

/// `{"type": "memory"}`
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryCommand;

impl Command for MemoryCommand {
    fn command_type(&self) -> &'static str {
        tag::MEMORY
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<Value> {
        to_stat(&collect_memory(ctx.sampler)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, SampleError};
    use crate::testing::{ScriptedSampler, memory_sample};

    #[test]
    fn gauges_are_reported_as_read() {
        let mut sampler = ScriptedSampler::default();
        sampler.push_memory(Ok(memory_sample(16_000_000, 9_000_000)));
        sampler.push_memory(Ok(memory_sample(16_000_000, 9_000_000)));
        let first = collect_memory(&mut sampler).unwrap();
        let second = collect_memory(&mut sampler).unwrap();
        assert_eq!(first.total, 16_000_000);
        assert_eq!(second.available, 9_000_000);
        assert_eq!(first.used, second.used);
    }

    #[test]
    fn failure_names_memory() {
        let mut sampler = ScriptedSampler::default();
        sampler.push_memory(Err(SampleError::Tool {
            program: "free".into(),
            detail: "exit status 1".into(),
        }));
        assert!(matches!(
            collect_memory(&mut sampler),
            Err(Error::SamplingFailed {
                kind: ResourceKind::Memory,
                ..
            })
        ));
    }
}
