//! In-memory: the whole dataset is resident in the primary's RAM, so every
//! lookup and update is a cache hit by construction. The log, if any updates
//! are required at all, still needs somewhere durable to land.

use cloudcalc_core::{Durability, FailoverTime, Latency, Rate};
use cloudcalc_model::{Memory, Node, Parameter, Primary, Secondaries, ZipfCache};

use crate::architecture::ArchitectureOps;
use crate::log_service::{InstanceStorageLogService, LogService};
use crate::page_service::{InMemoryPageService, PageService};

#[derive(Debug, Clone)]
pub struct InMemory {
    primary: Primary,
    secondaries: Secondaries,
    page_service: PageService,
    log_service: LogService,
}

impl InMemory {
    pub fn assemble(parameter: &Parameter, node: &Node, zipf_cache: &mut ZipfCache) -> Option<InMemory> {
        let mut p = parameter.clone();
        p.wal_includes_undo = false;
        debug_assert!(p.index_only_tables, "in-memory assumes index-only tables");

        if !node.instance_storage.is_present() && p.required_update_ops != Rate::ZERO {
            return None;
        }
        if node.memory.get_total_size() < p.get_data_size() {
            return None;
        }

        let mut primary = Primary::assemble(&p, node, false, zipf_cache)?;
        let page_service = InMemoryPageService::assemble(&p, &primary)?;

        primary.log_volume = (p.required_update_ops.value() * p.get_redo_log_record_size() as f64) as u64;
        let log_service = LogService::InstanceStorage(InstanceStorageLogService::assemble(&p, &mut primary)?);

        if log_service.get_update_ops() < p.required_update_ops {
            return None;
        }

        Some(InMemory {
            secondaries: Secondaries::new(0, node.clone()),
            primary,
            page_service: PageService::InMemory(page_service),
            log_service,
        })
    }
}

impl ArchitectureOps for InMemory {
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
        Latency::from_nanos(Memory::READ_LATENCY_NS)
    }
    fn commit_latency(&self) -> Latency {
        self.log_service.get_commit_latency()
    }
    fn durability(&self) -> Durability {
        self.log_service.get_durability()
    }

    /// Spin up a fresh instance, download the dataset back into RAM over the
    /// network, then replay however much redo log has accumulated since the
    /// last full backup.
    fn failover_time(&self) -> FailoverTime {
        let p = &self.primary.parameter;
        let data_size = p.get_data_size() as f64;
        let download = data_size / self.primary.get_network_in_limit().value();
        let recovery = p.get_required_log_storage() as f64 / (1000.0 * cloudcalc_model::MIB as f64);
        Node::NODE_SPINUP_TIME + FailoverTime::new(download) + FailoverTime::new(recovery)
    }

    fn primary_random_lookup_tx(&self) -> Rate {
        self.primary.parameter.required_lookup_ops
    }

    fn random_update_tx(&self) -> Rate {
        self.primary.parameter.required_update_ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudcalc_core::Price;
    use cloudcalc_model::resources::{Cpu, InstanceStorage, InstanceStorageType, MachineEbsLimits, Network};

    fn test_node() -> Node {
        Node {
            name: "r5.2xlarge".to_string(),
            cpu: Cpu { count: 8, speed: 3.1e9, vendor: "intel".to_string() },
            memory: Memory { size: 64 * cloudcalc_model::GIB },
            network: Network { speed: 10, burst_speed: 10, devices: 1, up_to: false },
            price: Price::hourly(0.5),
            instance_storage: InstanceStorage {
                storage_type: InstanceStorageType::NVMe,
                size: 1000 * cloudcalc_model::GIB,
                devices: 1.0,
                read_ops: 400_000,
                write_ops: 200_000,
            },
            machine_ebs: MachineEbsLimits {
                base_iops: Rate::secondly(16_000.0),
                burst_iops: Rate::secondly(16_000.0),
                base_throughput: 1000.0 * cloudcalc_model::MIB as f64,
                burst_throughput: 1000.0 * cloudcalc_model::MIB as f64,
            },
        }
    }

    #[test]
    fn rejects_dataset_that_does_not_fit_in_memory() {
        let parameter = Parameter { dataset_size: 1000 * cloudcalc_model::GIB, required_lookup_ops: Rate::secondly(100.0), ..Default::default() };
        let node = test_node();
        let mut zipf_cache = ZipfCache::new();
        assert!(InMemory::assemble(&parameter, &node, &mut zipf_cache).is_none());
    }

    #[test]
    fn failover_time_includes_log_recovery_on_top_of_download() {
        let parameter = Parameter {
            dataset_size: 10 * cloudcalc_model::GIB,
            required_lookup_ops: Rate::secondly(100.0),
            required_update_ops: Rate::secondly(10.0),
            ..Default::default()
        };
        let node = test_node();
        let mut zipf_cache = ZipfCache::new();
        let arch = InMemory::assemble(&parameter, &node, &mut zipf_cache).expect("feasible in-memory deployment");

        let download_only = Node::NODE_SPINUP_TIME
            + FailoverTime::new(parameter.get_data_size() as f64 / arch.primary.get_network_in_limit().value());
        assert!(arch.failover_time().value > download_only.value);
    }
}
