//! [`RawSampler`] backed by Linux procfs and sysfs.
//!
//! Sources:
//! - cpu: `/proc/stat`, clock from `/proc/cpuinfo` with a per-core
//!   `cpufreq/scaling_cur_freq` fallback
//! - memory: `/proc/meminfo`
//! - disk: `/sys/class/block/<dev>/stat`
//! - network: `/sys/class/net/<if>/statistics/{rx,tx}_bytes`
//!
//! Both roots are configurable so the sampler can read a host filesystem
//! mounted elsewhere, or a fixture tree.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::SampleError;
use crate::sample::{
    CounterBatch, CpuSample, CpuTimes, DiskCounters, MemorySample, NetCounters, RawSampler,
};

/// Bytes per sector in `/sys/class/block/*/stat`, fixed by the kernel
/// regardless of the device's physical sector size.
pub const SECTOR_SIZE: u64 = 512;

/// Reads absolute counters from procfs/sysfs.
#[derive(Debug, Clone)]
pub struct ProcfsSampler {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for ProcfsSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsSampler {
    pub fn new() -> Self {
        Self::with_roots("/proc", "/sys")
    }

    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    pub fn sys_root(&self) -> &Path {
        &self.sys_root
    }

    /// Whether the procfs root looks usable on this machine.
    pub fn is_available(&self) -> bool {
        self.proc_root.join("stat").is_file()
    }

    /// Per-core clock in kHz, in `cores` order. Stops at the first core
    /// without a reading, so a short result means "incomplete".
    fn core_clocks(&self, cores: &[(String, CpuTimes)]) -> Vec<u64> {
        let cpuinfo = self.proc_root.join("cpuinfo");
        match std::fs::read_to_string(&cpuinfo) {
            Ok(text) => match parse_cpuinfo_khz(&text) {
                Ok(clocks) if clocks.len() >= cores.len() => return clocks,
                Ok(clocks) => log::debug!(
                    "{} lists {} clocks for {} cores; trying cpufreq",
                    cpuinfo.display(),
                    clocks.len(),
                    cores.len()
                ),
                Err(e) => log::debug!("ignoring clock data: {e}"),
            },
            Err(e) => log::debug!("{} unreadable: {e}", cpuinfo.display()),
        }

        let mut clocks = Vec::with_capacity(cores.len());
        for (name, _) in cores {
            let path = self
                .sys_root
                .join("devices/system/cpu")
                .join(name)
                .join("cpufreq/scaling_cur_freq");
            match read_u64(&path) {
                Ok(khz) => clocks.push(khz),
                Err(_) => break,
            }
        }
        clocks
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, SampleError> {
    std::fs::read_to_string(path).map_err(|e| SampleError::io(path, e))
}

fn read_u64(path: &Path) -> Result<u64, SampleError> {
    let raw = read_file(path)?;
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .map_err(|e| SampleError::parse(path.display().to_string(), format!("{trimmed:?}: {e}")))
}

/// Entry names of a directory, sorted.
fn list_dir(path: &Path) -> Result<Vec<String>, SampleError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(path).map_err(|e| SampleError::io(path, e))? {
        let entry = entry.map_err(|e| SampleError::io(path, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Parsed `/proc/stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub all: CpuTimes,
    pub cores: Vec<(String, CpuTimes)>,
    pub running: u64,
    pub blocked: u64,
}

fn parse_field(what: &str, raw: &str) -> Result<u64, SampleError> {
    raw.parse::<u64>()
        .map_err(|e| SampleError::parse(what, format!("{raw:?}: {e}")))
}

/// Parse the tick columns of a `cpu`/`cpuN` line. Kernels older than
/// 2.6.33 omit trailing columns; those read as zero.
fn parse_cpu_fields(tag: &str, fields: &[&str]) -> Result<CpuTimes, SampleError> {
    if fields.len() < 4 {
        return Err(SampleError::parse(
            format!("/proc/stat {tag}"),
            format!("expected at least 4 tick columns, found {}", fields.len()),
        ));
    }
    let mut v = [0u64; 10];
    for (slot, raw) in v.iter_mut().zip(fields) {
        *slot = parse_field(&format!("/proc/stat {tag}"), raw)?;
    }
    Ok(CpuTimes {
        user: v[0],
        nice: v[1],
        system: v[2],
        idle: v[3],
        iowait: v[4],
        irq: v[5],
        softirq: v[6],
        steal: v[7],
        guest: v[8],
        guest_nice: v[9],
    })
}

fn is_core_tag(tag: &str) -> bool {
    tag.strip_prefix("cpu")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

pub fn parse_proc_stat(text: &str) -> Result<ProcStat, SampleError> {
    let mut all = None;
    let mut cores = Vec::new();
    let mut running = 0;
    let mut blocked = 0;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        let fields: Vec<&str> = parts.collect();
        match tag {
            "cpu" => all = Some(parse_cpu_fields(tag, &fields)?),
            "procs_running" | "procs_blocked" => {
                let raw = fields
                    .first()
                    .ok_or_else(|| SampleError::parse("/proc/stat", format!("{tag} has no value")))?;
                let value = parse_field(&format!("/proc/stat {tag}"), raw)?;
                if tag == "procs_running" {
                    running = value;
                } else {
                    blocked = value;
                }
            }
            t if is_core_tag(t) => cores.push((t.to_string(), parse_cpu_fields(t, &fields)?)),
            _ => {}
        }
    }

    let all = all.ok_or_else(|| SampleError::parse("/proc/stat", "no aggregate cpu line"))?;
    Ok(ProcStat {
        all,
        cores,
        running,
        blocked,
    })
}

/// `cpu MHz` values from `/proc/cpuinfo`, converted to kHz.
pub fn parse_cpuinfo_khz(text: &str) -> Result<Vec<u64>, SampleError> {
    let mut clocks = Vec::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim() != "cpu MHz" {
            continue;
        }
        let value = value.trim();
        let mhz = value
            .parse::<f64>()
            .map_err(|e| SampleError::parse("/proc/cpuinfo cpu MHz", format!("{value:?}: {e}")))?;
        if !mhz.is_finite() || mhz < 0.0 {
            return Err(SampleError::parse(
                "/proc/cpuinfo cpu MHz",
                format!("{value:?} out of range"),
            ));
        }
        clocks.push((mhz * 1000.0).round() as u64);
    }
    Ok(clocks)
}

/// Gauges from `/proc/meminfo`, in KiB, laid out like the `free -w` columns.
pub fn parse_meminfo(text: &str) -> Result<MemoryGauges, SampleError> {
    let mut total = None;
    let mut free = None;
    let mut available = None;
    let mut shared = 0;
    let mut buffers = 0;
    let mut cached = 0;
    let mut reclaimable = 0;

    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(raw) = rest.split_whitespace().next() else {
            continue;
        };
        let slot = match key {
            "MemTotal" => &mut total,
            "MemFree" => &mut free,
            "MemAvailable" => &mut available,
            "Shmem" => {
                shared = parse_field("/proc/meminfo Shmem", raw)?;
                continue;
            }
            "Buffers" => {
                buffers = parse_field("/proc/meminfo Buffers", raw)?;
                continue;
            }
            "Cached" => {
                cached = parse_field("/proc/meminfo Cached", raw)?;
                continue;
            }
            "SReclaimable" => {
                reclaimable = parse_field("/proc/meminfo SReclaimable", raw)?;
                continue;
            }
            _ => continue,
        };
        *slot = Some(parse_field(&format!("/proc/meminfo {key}"), raw)?);
    }

    let total = total.ok_or_else(|| SampleError::parse("/proc/meminfo", "no MemTotal"))?;
    let free = free.ok_or_else(|| SampleError::parse("/proc/meminfo", "no MemFree"))?;
    let cache = cached + reclaimable;
    Ok(MemoryGauges {
        total,
        used: total
            .saturating_sub(free)
            .saturating_sub(buffers)
            .saturating_sub(cache),
        free,
        shared,
        buffers,
        cache,
        available: available.unwrap_or(free),
    })
}

/// Memory values without a capture time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryGauges {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub shared: u64,
    pub buffers: u64,
    pub cache: u64,
    pub available: u64,
}

/// One line of `/sys/class/block/<dev>/stat`.
///
/// Columns: reads, reads merged, sectors read, read ticks, writes, writes
/// merged, sectors written, write ticks, in flight, io ticks, ...
pub fn parse_block_stat(device: &str, text: &str) -> Result<DiskCounters, SampleError> {
    let what = format!("/sys/class/block/{device}/stat");
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 10 {
        return Err(SampleError::parse(
            what,
            format!("expected at least 10 columns, found {}", fields.len()),
        ));
    }
    let col = |i: usize| parse_field(&what, fields[i]);
    Ok(DiskCounters {
        rbyte: col(2)?.saturating_mul(SECTOR_SIZE),
        rtick: col(3)?,
        wbyte: col(6)?.saturating_mul(SECTOR_SIZE),
        wtick: col(7)?,
        iotick: col(9)?,
    })
}

// ---------------------------------------------------------------------------
// RawSampler
// ---------------------------------------------------------------------------

impl RawSampler for ProcfsSampler {
    fn sample_cpu(&mut self) -> Result<CpuSample, SampleError> {
        let captured_at = Utc::now();
        let stat = parse_proc_stat(&read_file(&self.proc_root.join("stat"))?)?;
        let core_clocks_khz = self.core_clocks(&stat.cores);
        Ok(CpuSample {
            captured_at,
            all: stat.all,
            cores: stat.cores,
            core_clocks_khz,
            running: stat.running,
            blocked: stat.blocked,
        })
    }

    fn sample_memory(&mut self) -> Result<MemorySample, SampleError> {
        let captured_at = Utc::now();
        let m = parse_meminfo(&read_file(&self.proc_root.join("meminfo"))?)?;
        Ok(MemorySample {
            captured_at,
            total: m.total,
            used: m.used,
            free: m.free,
            shared: m.shared,
            buffers: m.buffers,
            cache: m.cache,
            available: m.available,
        })
    }

    fn sample_disks(&mut self) -> Result<CounterBatch<DiskCounters>, SampleError> {
        let captured_at = Utc::now();
        let root = self.sys_root.join("class/block");
        let mut entries = Vec::new();
        for name in list_dir(&root)? {
            let text = read_file(&root.join(&name).join("stat"))?;
            let counters = parse_block_stat(&name, &text)?;
            entries.push((name, counters));
        }
        Ok(CounterBatch::new(captured_at, entries))
    }

    fn sample_networks(&mut self) -> Result<CounterBatch<NetCounters>, SampleError> {
        let captured_at = Utc::now();
        let root = self.sys_root.join("class/net");
        let mut entries = Vec::new();
        for name in list_dir(&root)? {
            let stats = root.join(&name).join("statistics");
            // Entries are symlinks; is_dir follows them. Non-interfaces such
            // as bonding_masters have no statistics directory.
            if !stats.is_dir() {
                log::debug!("skipping {}: not a network interface", root.join(&name).display());
                continue;
            }
            let rx = read_u64(&stats.join("rx_bytes"))?;
            let tx = read_u64(&stats.join("tx_bytes"))?;
            entries.push((name, NetCounters { rx, tx }));
        }
        Ok(CounterBatch::new(captured_at, entries))
    }
}
