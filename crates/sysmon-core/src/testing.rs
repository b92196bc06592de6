//! Scripted [`RawSampler`] for exercising collectors and the dispatch loop
//! without a live `/proc`.
//!
//! Each kind has its own queue of canned results. An exhausted queue answers
//! with a [`SampleError::Tool`] so a test that under-scripts fails loudly.

use std::collections::VecDeque;

use chrono::Utc;

use crate::error::SampleError;
use crate::sample::{
    CounterBatch, CpuSample, CpuTimes, DiskCounters, MemorySample, NetCounters, RawSampler,
};

#[derive(Debug, Default)]
pub struct ScriptedSampler {
    cpu: VecDeque<Result<CpuSample, SampleError>>,
    memory: VecDeque<Result<MemorySample, SampleError>>,
    disks: VecDeque<Result<CounterBatch<DiskCounters>, SampleError>>,
    networks: VecDeque<Result<CounterBatch<NetCounters>, SampleError>>,
}

impl ScriptedSampler {
    pub fn push_cpu(&mut self, result: Result<CpuSample, SampleError>) {
        self.cpu.push_back(result);
    }

    pub fn push_memory(&mut self, result: Result<MemorySample, SampleError>) {
        self.memory.push_back(result);
    }

    pub fn push_disks(&mut self, result: Result<CounterBatch<DiskCounters>, SampleError>) {
        self.disks.push_back(result);
    }

    pub fn push_networks(&mut self, result: Result<CounterBatch<NetCounters>, SampleError>) {
        self.networks.push_back(result);
    }

    /// Results not yet consumed, across all kinds.
    pub fn remaining(&self) -> usize {
        self.cpu.len() + self.memory.len() + self.disks.len() + self.networks.len()
    }
}

fn next<T>(queue: &mut VecDeque<Result<T, SampleError>>, kind: &str) -> Result<T, SampleError> {
    queue.pop_front().unwrap_or_else(|| {
        Err(SampleError::Tool {
            program: "scripted sampler".to_string(),
            detail: format!("no {kind} sample scripted"),
        })
    })
}

impl RawSampler for ScriptedSampler {
    fn sample_cpu(&mut self) -> Result<CpuSample, SampleError> {
        next(&mut self.cpu, "cpu")
    }

    fn sample_memory(&mut self) -> Result<MemorySample, SampleError> {
        next(&mut self.memory, "memory")
    }

    fn sample_disks(&mut self) -> Result<CounterBatch<DiskCounters>, SampleError> {
        next(&mut self.disks, "disk")
    }

    fn sample_networks(&mut self) -> Result<CounterBatch<NetCounters>, SampleError> {
        next(&mut self.networks, "network")
    }
}

// ---------------------------------------------------------------------------
// Sample builders
// ---------------------------------------------------------------------------

/// CPU sample with cores named `cpu0`, `cpu1`, ... and no run-queue load.
pub fn cpu_sample(all: CpuTimes, cores: Vec<CpuTimes>, core_clocks_khz: Vec<u64>) -> CpuSample {
    CpuSample {
        captured_at: Utc::now(),
        all,
        cores: cores
            .into_iter()
            .enumerate()
            .map(|(i, t)| (format!("cpu{i}"), t))
            .collect(),
        core_clocks_khz,
        running: 1,
        blocked: 0,
    }
}

/// Memory sample where `used` is everything not available.
pub fn memory_sample(total: u64, available: u64) -> MemorySample {
    MemorySample {
        captured_at: Utc::now(),
        total,
        used: total.saturating_sub(available),
        free: available / 2,
        shared: 1024,
        buffers: 2048,
        cache: available / 2,
        available,
    }
}

/// Disk counters with the given `rbyte` and fixed other fields.
pub fn disk(rbyte: u64) -> DiskCounters {
    DiskCounters {
        rbyte,
        rtick: 40,
        wbyte: 8192,
        wtick: 12,
        iotick: 55,
    }
}

pub fn disk_batch(entries: Vec<(&str, DiskCounters)>) -> CounterBatch<DiskCounters> {
    CounterBatch::new(
        Utc::now(),
        entries
            .into_iter()
            .map(|(k, c)| (k.to_string(), c))
            .collect(),
    )
}

pub fn net_batch(entries: Vec<(&str, NetCounters)>) -> CounterBatch<NetCounters> {
    CounterBatch::new(
        Utc::now(),
        entries
            .into_iter()
            .map(|(k, c)| (k.to_string(), c))
            .collect(),
    )
}
