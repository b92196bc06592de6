//! Interface traffic deltas.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{sampling_failed, to_stat};
use crate::command::{Command, ExecContext, tag};
use crate::delta::DeltaStore;
use crate::error::Result;
use crate::sample::{NetCounters, RawSampler, ResourceKind};

/// Bytes received and sent by one interface during the interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkUtilization {
    pub name: String,
    #[serde(flatten)]
    pub counters: NetCounters,
}

/// `stat` payload of a `network` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkStat {
    pub time: DateTime<Utc>,
    pub networks: Vec<NetworkUtilization>,
}

pub fn collect_network(
    store: &mut DeltaStore,
    sampler: &mut dyn RawSampler,
) -> Result<NetworkStat> {
    let batch = sampler
        .sample_networks()
        .map_err(sampling_failed(ResourceKind::Network))?;
    let networks = store
        .advance_batch(&batch)
        .into_iter()
        .map(|(name, delta)| NetworkUtilization {
            name,
            counters: delta.counters,
        })
        .collect();
    Ok(NetworkStat {
        time: batch.captured_at,
        networks,
    })
}

/// `{"type": "network"}`
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkCommand;

impl Command for NetworkCommand {
    fn command_type(&self) -> &'static str {
        tag::NETWORK
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<Value> {
        to_stat(&collect_network(ctx.store, ctx.sampler)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, SampleError};
    use crate::testing::{ScriptedSampler, net_batch};

    fn net(rx: u64, tx: u64) -> NetCounters {
        NetCounters { rx, tx }
    }

    #[test]
    fn deltas_per_interface() {
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        sampler.push_networks(Ok(net_batch(vec![("eth0", net(1000, 200)), ("lo", net(5, 5))])));
        sampler.push_networks(Ok(net_batch(vec![("eth0", net(1800, 260)), ("lo", net(9, 9))])));

        collect_network(&mut store, &mut sampler).unwrap();
        let stat = collect_network(&mut store, &mut sampler).unwrap();
        assert_eq!(stat.networks[0].counters, net(800, 60));
        assert_eq!(stat.networks[1].counters, net(4, 4));
    }

    #[test]
    fn failing_interface_aborts_whole_response_and_keeps_others() {
        let mut store = DeltaStore::default();
        let mut sampler = ScriptedSampler::default();
        sampler.push_networks(Ok(net_batch(vec![("eth0", net(1000, 100)), ("eth1", net(50, 50))])));
        sampler.push_networks(Err(SampleError::parse(
            "/sys/class/net/eth1/statistics/rx_bytes",
            "\"\"",
        )));
        sampler.push_networks(Ok(net_batch(vec![("eth0", net(1300, 150)), ("eth1", net(60, 55))])));

        collect_network(&mut store, &mut sampler).unwrap();
        let err = collect_network(&mut store, &mut sampler).unwrap_err();
        assert!(matches!(
            err,
            Error::SamplingFailed {
                kind: ResourceKind::Network,
                ..
            }
        ));
        assert_eq!(store.previous::<NetCounters>("eth0"), Some(net(1000, 100)));
        assert_eq!(store.previous::<NetCounters>("eth1"), Some(net(50, 50)));

        let stat = collect_network(&mut store, &mut sampler).unwrap();
        assert_eq!(stat.networks[0].counters, net(300, 50));
        assert_eq!(stat.networks[1].counters, net(10, 5));
    }
}
