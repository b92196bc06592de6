//! Block device I/O deltas.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{sampling_failed, to_stat};
use crate::command::{Command, ExecContext, tag};
use crate::delta::DeltaStore;
use crate::error::Result;
use crate::sample::{DiskCounters, RawSampler, ResourceKind};

/// Per-interval I/O of one block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskUtilization {
    pub name: String,
    #[serde(flatten)]
    pub counters: DiskCounters,
}

/// `stat` payload of a `disk` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskStat {
    pub time: DateTime<Utc>,
    pub disks: Vec<DiskUtilization>,
}

pub fn collect_disk(store: &mut DeltaStore, sampler: &mut dyn RawSampler) -> Result<DiskStat> {
    let batch = sampler
        .sample_disks()
        .map_err(sampling_failed(ResourceKind::Disk))?;
    let disks = store
        .advance_batch(&batch)
        .into_iter()
        .map(|(name, delta)| DiskUtilization {
            name,
            counters: delta.counters,
        })
        .collect();
    Ok(DiskStat {
        time: batch.captured_at,
        disks,
    })
}

/// `{"type": "disk"}`
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskCommand;

impl Command for DiskCommand {
    fn command_type(&self) -> &'static str {
        tag::DISK
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<Value> {
        to_stat(&collect_disk(ctx.store, ctx.sampler)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, SampleError};
    use crate::testing::{ScriptedSampler, disk, disk_batch};

    #[test]
    fn rbyte_delta_across_two_requests() {
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        sampler.push_disks(Ok(disk_batch(vec![("sda", disk(1000))])));
        sampler.push_disks(Ok(disk_batch(vec![("sda", disk(1500))])));

        let first = collect_disk(&mut store, &mut sampler).unwrap();
        assert_eq!(first.disks[0].counters, disk(1000));
        let second = collect_disk(&mut store, &mut sampler).unwrap();
        assert_eq!(second.disks[0].name, "sda");
        assert_eq!(second.disks[0].counters.rbyte, 500);
        assert_eq!(second.disks[0].counters.wbyte, 0);
    }

    #[test]
    fn hot_plugged_device_starts_from_absolute() {
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        sampler.push_disks(Ok(disk_batch(vec![("sda", disk(100))])));
        sampler.push_disks(Ok(disk_batch(vec![("sda", disk(150)), ("sdb", disk(70))])));

        collect_disk(&mut store, &mut sampler).unwrap();
        let stat = collect_disk(&mut store, &mut sampler).unwrap();
        assert_eq!(stat.disks[0].counters.rbyte, 50);
        assert_eq!(stat.disks[1].counters, disk(70));
    }

    #[test]
    fn wire_shape_uses_short_field_names() {
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        sampler.push_disks(Ok(disk_batch(vec![("nvme0n1", disk(1))])));
        let json = serde_json::to_value(collect_disk(&mut store, &mut sampler).unwrap()).unwrap();
        let entry = &json["disks"][0];
        for field in ["name", "rbyte", "rtick", "wbyte", "wtick", "iotick"] {
            assert!(entry.get(field).is_some(), "missing {field}");
        }
        assert!(json["time"].is_string());
    }

    #[test]
    fn failure_leaves_previous_samples_intact() {
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        sampler.push_disks(Ok(disk_batch(vec![("sda", disk(100))])));
        sampler.push_disks(Err(SampleError::parse("/sys/class/block/sda/stat", "empty")));
        sampler.push_disks(Ok(disk_batch(vec![("sda", disk(180))])));

        collect_disk(&mut store, &mut sampler).unwrap();
        assert!(matches!(
            collect_disk(&mut store, &mut sampler),
            Err(Error::SamplingFailed {
                kind: ResourceKind::Disk,
                ..
            })
        ));
        let stat = collect_disk(&mut store, &mut sampler).unwrap();
        assert_eq!(stat.disks[0].counters.rbyte, 80);
    }
}
