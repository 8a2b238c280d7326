//! Aurora-like: primary and read replicas share a remote, log-structured
//! storage fleet that replicates both data and log records on its own.

use cloudcalc_core::{Durability, FailoverTime, Latency, Rate};
use cloudcalc_model::{Node, Parameter, Primary, Secondaries, ZipfCache};

use crate::architecture::{rate_min, ArchitectureOps};
use crate::log_service::LogService;
use crate::page_service::{CombinedPageServiceLog, PageService};

#[derive(Debug, Clone)]
pub struct AuroraLike {
    primary: Primary,
    secondaries: Secondaries,
    page_service: PageService,
    log_service: LogService,
    lookups: Rate,
    sec_lookups: Rate,
    updates: Rate,
}

impl AuroraLike {
    /// Aurora replicates data across 3 storage nodes and log records across 6.
    pub const DATA_REPLICATION: u32 = 3;
    pub const LOG_REPLICATION: u32 = 6;
    pub const MAX_SECONDARIES: u32 = 15;

    pub fn assemble(
        parameter: &Parameter,
        node: &Node,
        storage_node: &Node,
        target_latency: Latency,
        zipf_cache: &mut ZipfCache,
    ) -> Option<AuroraLike> {
        let mut p = parameter.clone();
        p.wal_includes_undo = false;
        debug_assert!(p.index_only_tables, "aurora-like assumes index-only tables");
        debug_assert!(p.num_secondaries <= Self::MAX_SECONDARIES);

        let primary = Primary::assemble(&p, node, false, zipf_cache)?;
        let secondaries = Secondaries::new(p.num_secondaries, node.clone());

        let storage = CombinedPageServiceLog::assemble(&p, &primary, storage_node, target_latency, Self::DATA_REPLICATION, Self::LOG_REPLICATION);

        let updates = rate_min(&[primary.get_cache_hit_ops(Rate::ZERO), storage.get_update_ops(), p.required_update_ops]);

        let cpu_lookups = primary.get_cache_hit_ops(updates);
        let storage_lookups = storage.get_page_read_ops();
        let lookups = rate_min(&[cpu_lookups, storage_lookups, p.required_lookup_ops]);
        let sec_lookups = rate_min(&[lookups * secondaries.available_for_lookups() as f64, p.required_lookup_ops - lookups]);

        if updates < p.required_update_ops {
            return None;
        }

        let page_service = PageService::Combined(storage);
        let log_service = page_service.as_log_service().expect("combined page service always yields a log service view");

        Some(AuroraLike { primary, secondaries, page_service, log_service, lookups, sec_lookups, updates })
    }
}

impl ArchitectureOps for AuroraLike {
    fn parameter(&self) -> &Parameter {
        &self.primary.parameter
    }
    fn primary(&self) -> &Primary {
        &self.primary
    }
    fn secondaries(&self) -> &Secondaries {
        &self.secondaries
    }
    fn page_service(&self) -> &PageService {
        &self.page_service
    }
    fn log_service(&self) -> &LogService {
        &self.log_service
    }
    fn op_latency(&self) -> Latency {
        self.page_service.get_op_latency()
    }
    fn commit_latency(&self) -> Latency {
        self.log_service.get_commit_latency()
    }
    fn durability(&self) -> Durability {
        self.log_service.get_durability()
    }

    /// Even with a standby secondary, a replacement still needs to warm its
    /// cache from the storage tier over the network; that bound dominates,
    /// so there is no separate standby-takeover fast path here.
    fn failover_time(&self) -> FailoverTime {
        let storage_reads = match &self.page_service {
            PageService::Combined(s) => s.get_page_read_ops(),
            _ => unreachable!("aurora-like always assembles a combined page/log service"),
        };
        let page_size = self.primary.parameter.page_size as f64;
        let byte_in_via_network = self.primary.node.network.get_read_limit().value().min(storage_reads.value() * page_size);
        let warmup = self.primary.data_in_cache() as f64 / byte_in_via_network;
        Node::NODE_SPINUP_TIME + FailoverTime::new(warmup)
    }

    fn primary_random_lookup_tx(&self) -> Rate {
        self.lookups
    }
    fn secondaries_random_lookup_tx(&self) -> Rate {
        self.sec_lookups
    }
    fn random_update_tx(&self) -> Rate {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudcalc_core::Price;
    use cloudcalc_model::resources::{Cpu, InstanceStorage, InstanceStorageType, MachineEbsLimits, Memory, Network};

    fn test_node(name: &str, storage_gib: u64) -> Node {
        Node {
            name: name.to_string(),
            cpu: Cpu { count: 8, speed: 3.1e9, vendor: "intel".to_string() },
            memory: Memory { size: 8 * cloudcalc_model::GIB },
            network: Network { speed: 25, burst_speed: 25, devices: 1, up_to: false },
            price: Price::hourly(1.0),
            instance_storage: InstanceStorage {
                storage_type: InstanceStorageType::NVMe,
                size: storage_gib * cloudcalc_model::GIB,
                devices: 1.0,
                read_ops: 400_000,
                write_ops: 200_000,
            },
            machine_ebs: MachineEbsLimits {
                base_iops: Rate::secondly(32_000.0),
                burst_iops: Rate::secondly(32_000.0),
                base_throughput: 1000.0 * cloudcalc_model::MIB as f64,
                burst_throughput: 1000.0 * cloudcalc_model::MIB as f64,
            },
        }
    }

    #[test]
    fn failover_time_scales_with_network_warmup_not_standby_count() {
        let parameter = Parameter {
            dataset_size: 10 * cloudcalc_model::GIB,
            required_lookup_ops: Rate::secondly(100.0),
            required_update_ops: Rate::secondly(10.0),
            min_secondaries: 0,
            max_secondaries: 1,
            ..Default::default()
        };
        let node = test_node("r5.2xlarge", 0);
        let storage_node = test_node("i3en.24xl", 60_000);
        let target_latency = Latency::new(10_000_000, 10_000_000, 10_000_000);
        let mut zipf_cache = ZipfCache::new();

        let mut no_standby = parameter.clone();
        no_standby.num_secondaries = 0;
        let without_standby = AuroraLike::assemble(&no_standby, &node, &storage_node, target_latency, &mut zipf_cache)
            .expect("feasible aurora deployment without secondaries");

        let mut with_standby = parameter.clone();
        with_standby.num_secondaries = 1;
        let with_standby = AuroraLike::assemble(&with_standby, &node, &storage_node, target_latency, &mut zipf_cache)
            .expect("feasible aurora deployment with a standby secondary");

        // A standby replica doesn't change how the primary itself warms its
        // cache, so failover time is identical with or without one.
        assert!((without_standby.failover_time().value - with_standby.failover_time().value).abs() < 1e-9);
        assert!(without_standby.failover_time().value > Node::NODE_SPINUP_TIME.value);
    }
}
