//! Classic: a single primary, no replicas, pages and log both on local
//! instance storage.

use cloudcalc_core::{Durability, FailoverTime, Latency, Rate};
use cloudcalc_model::{div_round_up, InstanceStorage, Node, Parameter, Primary, Secondaries, ZipfCache, MIB};

use crate::architecture::{rate_min, ArchitectureOps};
use crate::log_service::{InstanceStorageLogService, LogService};
use crate::page_service::{InstanceStoragePageService, PageService};

#[derive(Debug, Clone)]
pub struct Classic {
    primary: Primary,
    secondaries: Secondaries,
    page_service: PageService,
    log_service: LogService,
    lookups: Rate,
    updates: Rate,
    op_latency: Latency,
    commit_latency: Latency,
}

impl Classic {
    pub fn assemble(parameter: &Parameter, node: &Node, zipf_cache: &mut ZipfCache) -> Option<Classic> {
        if !node.instance_storage.is_present() {
            return None;
        }
        let mut p = parameter.clone();
        p.wal_includes_undo = true;
        debug_assert!(p.index_only_tables, "classic assumes index-only tables");

        let mut primary = Primary::assemble(&p, node, false, zipf_cache)?;

        let iops_per_page = div_round_up(p.page_size, InstanceStorage::MAX_IO_SIZE);
        let page_writes_per_update = primary.prob_evict_dirty_page_from_cache() * iops_per_page as f64;
        let log_writes_per_update = if p.group_commit {
            p.get_aries_log_record_size() as f64 / InstanceStorage::MAX_IO_SIZE as f64
        } else {
            div_round_up(p.get_aries_log_record_size(), InstanceStorage::MAX_IO_SIZE) as f64
        };
        let writes_per_update = page_writes_per_update + log_writes_per_update;
        let reads_per_update = primary.prob_cache_miss() * iops_per_page as f64;

        let write_iops = node.instance_storage.get_write_ops();
        let read_iops = node.instance_storage.get_read_ops();
        let cpu_updates = primary.get_cache_hit_ops(Rate::ZERO);
        let updates = rate_min(&[cpu_updates, read_iops / reads_per_update, write_iops / writes_per_update, p.required_update_ops]);

        let cpu_lookups = cpu_updates - updates;
        let remaining_write_ops = write_iops - updates * writes_per_update;
        let remaining_read_ops = read_iops - updates * reads_per_update;
        let lookups = rate_min(&[
            cpu_lookups,
            remaining_write_ops / writes_per_update,
            remaining_read_ops / reads_per_update,
            p.required_lookup_ops,
        ]);

        primary.log_volume = (updates.value() * p.get_aries_log_record_size() as f64) as u64;

        let page_service = PageService::InstanceStorage(InstanceStoragePageService::assemble(&p, &mut primary)?);
        let log_service = LogService::InstanceStorage(InstanceStorageLogService::assemble(&p, &mut primary)?);

        let commit_latency = Latency::from_micros(InstanceStorage::WRITE_LATENCY_US);
        let op_latency = Latency::combine(&[
            (primary.prob_cache_miss(), Latency::from_micros(InstanceStorage::READ_LATENCY_US)),
            (primary.prob_cache_hit(), Latency::from_nanos(cloudcalc_model::Memory::READ_LATENCY_NS)),
        ]);

        Some(Classic {
            secondaries: Secondaries::new(0, node.clone()),
            primary,
            page_service,
            log_service,
            lookups,
            updates,
            op_latency,
            commit_latency,
        })
    }
}

impl ArchitectureOps for Classic {
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
        self.op_latency
    }
    fn commit_latency(&self) -> Latency {
        self.commit_latency
    }
    fn durability(&self) -> Durability {
        Durability::new(self.primary.node.get_availability().numeric_value.powi(12))
    }

    fn failover_time(&self) -> FailoverTime {
        let p = &self.primary.parameter;
        let data_size = p.get_data_size() as f64;
        let download = data_size / self.primary.get_network_in_limit().value();
        let disk_write = data_size / self.primary.node.instance_storage.get_write_throughput();
        let recovery = p.get_required_aries_log_storage() as f64 / (100.0 * MIB as f64);
        Node::NODE_SPINUP_TIME + FailoverTime::new(download.max(disk_write)) + FailoverTime::new(recovery)
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

    fn test_node(name: &str, memory_gib: u64, storage_gib: u64) -> Node {
        Node {
            name: name.to_string(),
            cpu: Cpu { count: 8, speed: 3.1e9, vendor: "intel".to_string() },
            memory: Memory { size: memory_gib * cloudcalc_model::GIB },
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

    /// A tiny, read-only dataset that fits comfortably in local NVMe
    /// survives as Classic with a non-trivial cache-hit ratio.
    #[test]
    fn small_read_only_dataset_survives() {
        let parameter = Parameter {
            dataset_size: 10 * cloudcalc_model::GIB,
            required_lookup_ops: Rate::secondly(10_000.0),
            required_update_ops: Rate::ZERO,
            ..Default::default()
        };
        let node = test_node("m5.2xlarge", 32, 1_000);
        let mut zipf_cache = ZipfCache::new();

        let arch = Classic::assemble(&parameter, &node, &mut zipf_cache).expect("feasible classic deployment");
        assert!(arch.lookups.value() > 0.0);
        assert_eq!(arch.updates, Rate::ZERO);
        assert!(arch.durability().numeric_value > 0.0 && arch.durability().numeric_value <= 1.0);
    }

    /// A node with no local instance storage device can never host Classic,
    /// which pins both the page and log service to local disk.
    #[test]
    fn no_instance_storage_is_infeasible() {
        let parameter = Parameter { dataset_size: 10 * cloudcalc_model::GIB, required_lookup_ops: Rate::secondly(100.0), ..Default::default() };
        let mut node = test_node("r5.2xlarge", 32, 0);
        node.instance_storage.devices = 0.0;
        let mut zipf_cache = ZipfCache::new();
        assert!(Classic::assemble(&parameter, &node, &mut zipf_cache).is_none());
    }

    /// Even with a device present, a dataset larger than its usable
    /// capacity is still infeasible - rejected by `Primary`'s reservation,
    /// not by the up-front `is_present` check.
    #[test]
    fn dataset_larger_than_local_storage_is_infeasible() {
        let parameter = Parameter { dataset_size: 10 * cloudcalc_model::GIB, required_lookup_ops: Rate::secondly(100.0), ..Default::default() };
        let node = test_node("r5.2xlarge", 32, 0);
        let mut zipf_cache = ZipfCache::new();
        assert!(Classic::assemble(&parameter, &node, &mut zipf_cache).is_none());
    }

    /// A dataset too large for local storage, at a write rate the disk
    /// can't sustain, drives updates to zero rather than going negative.
    #[test]
    fn write_heavy_workload_saturates_without_going_negative() {
        let parameter = Parameter {
            dataset_size: 100 * cloudcalc_model::GIB,
            required_lookup_ops: Rate::ZERO,
            required_update_ops: Rate::secondly(1_000_000.0),
            ..Default::default()
        };
        let node = test_node("m5.2xlarge", 32, 1_000);
        let mut zipf_cache = ZipfCache::new();

        let arch = Classic::assemble(&parameter, &node, &mut zipf_cache).expect("feasible classic deployment");
        assert!(arch.updates.value() <= parameter.required_update_ops.value());
        assert!(arch.updates.value() > 0.0);
        assert!(arch.lookups.value() >= 0.0);
    }
}
