//! Socrates-like: compute, a dedicated EC2 page server fleet, and a
//! dedicated EC2 log node are all separate tiers, each scaled independently.

use cloudcalc_core::{Durability, FailoverTime, Latency, Rate};
use cloudcalc_model::resources::S3;
use cloudcalc_model::{EbsType, Node, Parameter, Primary, Secondaries, ZipfCache};

use crate::architecture::{rate_min, ArchitectureOps};
use crate::log_service::{Ec2LogService, LogService};
use crate::page_service::{Ec2PageService, PageService};

#[derive(Debug, Clone)]
pub struct SocratesLike {
    primary: Primary,
    secondaries: Secondaries,
    page_service: PageService,
    log_service: LogService,
    lookups: Rate,
    updates: Rate,
}

impl SocratesLike {
    pub fn assemble(
        parameter: &Parameter,
        node: &Node,
        page_node: &Node,
        log_node: &Node,
        target_latency: Latency,
        zipf_cache: &mut ZipfCache,
    ) -> Option<SocratesLike> {
        let mut p = parameter.clone();
        p.wal_includes_undo = true;
        debug_assert!(p.index_only_tables, "socrates-like assumes index-only tables");

        // GPU-oriented instances like p4d.24xlarge carry local NVMe sized for
        // scratch space, not as a buffer-pool extension candidate; disable
        // RBPEx there, and everywhere local storage can't outgrow memory.
        let use_rbpex = !node.name.starts_with("p4d.24")
            && node.instance_storage.is_present()
            && node.instance_storage.get_usable_size() >= node.memory.get_total_size();

        let mut primary = Primary::assemble(&p, node, use_rbpex, zipf_cache)?;

        let page_service_inner = Ec2PageService::assemble(&p, &primary, page_node, target_latency, p.page_server_replication, use_rbpex);
        if page_service_inner.fraction > 1.0 {
            return None;
        }
        let log_service_inner = Ec2LogService::assemble(&p, &mut primary, log_node, p.log_service_replication as u32)?;

        let cpu_updates = primary.get_cache_hit_ops(Rate::ZERO);
        let updates = rate_min(&[cpu_updates, log_service_inner.get_update_ops(), p.required_update_ops]);

        let cpu_lookups = primary.get_cache_hit_ops(updates);
        let page_read_limit = page_service_inner.get_page_read_ops();
        let lookups = rate_min(&[cpu_lookups, page_read_limit, p.required_lookup_ops]);

        Some(SocratesLike {
            secondaries: Secondaries::new(0, node.clone()),
            primary,
            page_service: PageService::Ec2(page_service_inner),
            log_service: LogService::Ec2(log_service_inner),
            lookups,
            updates,
        })
    }
}

impl ArchitectureOps for SocratesLike {
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
        // Fixed at the weaker of the log device's own durability and the
        // remote object store's, independent of which log/page nodes were
        // actually chosen - Socrates always keeps an S3 copy of the log.
        let ebs = EbsType::Io2.durability();
        let s3 = S3::durability();
        if ebs.numeric_value < s3.numeric_value { ebs } else { s3 }
    }

    /// Spinup, then warm the first cache over the network, then warm the
    /// second (local-storage) cache at whichever is slower: the network or
    /// the local device's own write throughput.
    fn failover_time(&self) -> FailoverTime {
        let page_read_bytes = self.page_service.get_page_read_ops().value() * self.parameter().page_size as f64;
        let byte_in_via_network = self.primary.node.network.get_read_limit().value().min(page_read_bytes);

        let first_cache_warmup = self.primary.data_in_first_cache() as f64 / byte_in_via_network;
        let second_cache_limit = byte_in_via_network.min(self.primary.node.instance_storage.get_write_throughput());
        let second_cache_warmup = self.primary.data_in_second_cache() as f64 / second_cache_limit;

        Node::NODE_SPINUP_TIME + FailoverTime::new(first_cache_warmup) + FailoverTime::new(second_cache_warmup)
    }

    fn primary_random_lookup_tx(&self) -> Rate {
        self.lookups
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
    use cloudcalc_model::ZipfCache;

    fn test_node(name: &str, storage_gib: u64) -> Node {
        Node {
            name: name.to_string(),
            cpu: Cpu { count: 8, speed: 3.1e9, vendor: "intel".to_string() },
            memory: Memory { size: 16 * cloudcalc_model::GIB },
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
    fn durability_is_weaker_of_io2_and_s3() {
        let parameter = Parameter { dataset_size: 10 * cloudcalc_model::GIB, required_lookup_ops: Rate::secondly(100.0), ..Default::default() };
        let node = test_node("r5.2xlarge", 64);
        let page_node = test_node("i3en.24xl", 60_000);
        let log_node = test_node("i3en.24xl", 60_000);
        let target_latency = Latency::new(10_000_000, 10_000_000, 10_000_000);
        let mut zipf_cache = ZipfCache::new();
        let arch = SocratesLike::assemble(&parameter, &node, &page_node, &log_node, target_latency, &mut zipf_cache)
            .expect("feasible socrates deployment");
        let expected = EbsType::Io2.durability().numeric_value.min(S3::durability().numeric_value);
        assert!((arch.durability().numeric_value - expected).abs() < 1e-12);
    }

    #[test]
    fn failover_time_exceeds_bare_node_spinup() {
        let parameter = Parameter { dataset_size: 10 * cloudcalc_model::GIB, required_lookup_ops: Rate::secondly(100.0), ..Default::default() };
        let node = test_node("r5.2xlarge", 64);
        let page_node = test_node("i3en.24xl", 60_000);
        let log_node = test_node("i3en.24xl", 60_000);
        let target_latency = Latency::new(10_000_000, 10_000_000, 10_000_000);
        let mut zipf_cache = ZipfCache::new();
        let arch = SocratesLike::assemble(&parameter, &node, &page_node, &log_node, target_latency, &mut zipf_cache)
            .expect("feasible socrates deployment");
        assert!(arch.failover_time().value > Node::NODE_SPINUP_TIME.value);
    }
}
