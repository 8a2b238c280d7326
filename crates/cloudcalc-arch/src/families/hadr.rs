//! HADR: a primary plus one or more hot-standby secondaries, streaming the
//! WAL to every secondary over the network.

use cloudcalc_core::{Durability, FailoverTime, Latency, Rate};
use cloudcalc_model::{div_round_up, InstanceStorage, Node, Parameter, Primary, Secondaries, ZipfCache, MIB};

use crate::architecture::{rate_min, ArchitectureOps};
use crate::log_service::{InstanceStorageLogService, LogService};
use crate::page_service::{InstanceStoragePageService, PageService};

#[derive(Debug, Clone)]
pub struct Hadr {
    primary: Primary,
    secondaries: Secondaries,
    page_service: PageService,
    log_service: LogService,
    lookups: Rate,
    updates: Rate,
    sec_lookups: Rate,
    op_latency: Latency,
    commit_latency: Latency,
}

impl Hadr {
    pub fn assemble(parameter: &Parameter, node: &Node, zipf_cache: &mut ZipfCache) -> Option<Hadr> {
        if !node.instance_storage.is_present() {
            return None;
        }
        let mut p = parameter.clone();
        p.wal_includes_undo = true;
        debug_assert!(p.index_only_tables, "HADR assumes index-only tables");
        if p.num_secondaries == 0 {
            return None;
        }

        let mut primary = Primary::assemble(&p, node, false, zipf_cache)?;
        let secondaries = Secondaries::new(p.num_secondaries, node.clone());
        debug_assert!(secondaries.has_standby());

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
        let network_per_update = p.get_aries_log_record_size() as f64 * secondaries.get_count() as f64;
        let network_scale = primary.get_network_out_limit() / network_per_update;
        let updates = rate_min(&[
            cpu_updates,
            read_iops / reads_per_update,
            write_iops / writes_per_update,
            network_scale,
            p.required_update_ops,
        ]);

        let cpu_lookups = primary.get_cache_hit_ops(updates);
        let remaining_write_ops = write_iops - updates * writes_per_update;
        let remaining_read_ops = read_iops - updates * reads_per_update;
        let lookups = rate_min(&[
            cpu_lookups,
            remaining_write_ops / writes_per_update,
            remaining_read_ops / reads_per_update,
            p.required_lookup_ops,
        ]);
        let sec_lookups = rate_min(&[lookups * secondaries.available_for_lookups() as f64, p.required_lookup_ops - lookups]);

        primary.network_out = (updates.value() * p.get_aries_log_record_size() as f64 * secondaries.get_count() as f64) as u64;
        primary.log_volume = (updates.value() * p.get_aries_log_record_size() as f64) as u64;

        let page_service = PageService::InstanceStorage(InstanceStoragePageService::assemble(&p, &mut primary)?);
        let log_service = LogService::InstanceStorage(InstanceStorageLogService::assemble(&p, &mut primary)?);

        let commit_latency = Latency::from_micros(InstanceStorage::WRITE_LATENCY_US);
        let op_latency = Latency::combine(&[
            (primary.prob_cache_miss(), Latency::from_micros(InstanceStorage::READ_LATENCY_US)),
            (primary.prob_cache_hit(), primary.get_cache_hit_latency()),
        ]);

        Some(Hadr { primary, secondaries, page_service, log_service, lookups, updates, sec_lookups, op_latency, commit_latency })
    }
}

impl ArchitectureOps for Hadr {
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
        let p = &self.primary.parameter;
        Durability::calculate(
            self.secondaries.get_count() + 1,
            self.primary.node.get_availability().numeric_value,
            p.get_data_size() / (50 * cloudcalc_model::MIB),
            1,
        )
    }

    fn failover_time(&self) -> FailoverTime {
        let storage = &self.primary.node.instance_storage;
        let throughput = self
            .primary
            .get_network_in_limit()
            .value()
            .min(storage.get_read_throughput())
            .min(storage.get_write_throughput());
        Node::NODE_SPINUP_TIME + FailoverTime::new(self.primary.parameter.get_data_size() as f64 / throughput)
    }

    fn inter_az_traffic(&self) -> u64 {
        let p = &self.primary.parameter;
        if !p.deploy_across_az {
            return 0;
        }
        let count = self.secondaries.get_count();
        let same_az = count / p.number_of_azs;
        let remote = count - same_az;
        (remote as f64 * self.updates.value() * p.get_aries_log_record_size() as f64) as u64
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

    fn base_parameter() -> Parameter {
        Parameter {
            dataset_size: 50 * cloudcalc_model::GIB,
            required_lookup_ops: Rate::secondly(7_000.0),
            required_update_ops: Rate::secondly(3_000.0),
            ..Default::default()
        }
    }

    /// Zero secondaries disables HADR outright: it has no standby to
    /// distinguish it from Classic, so `assemble` must refuse rather than
    /// silently degrade to a single node.
    #[test]
    fn zero_secondaries_is_infeasible() {
        let mut parameter = base_parameter();
        parameter.num_secondaries = 0;
        let node = test_node("i3en.2xlarge", 5_000);
        let mut zipf_cache = ZipfCache::new();
        assert!(Hadr::assemble(&parameter, &node, &mut zipf_cache).is_none());
    }

    /// With `--inter-az` and 3 AZs, HADR with 3 secondaries puts 2 of the 3
    /// replicas in remote AZs, so inter-AZ traffic is
    /// `2 * updateRate * ariesLogRecordSize`.
    #[test]
    fn inter_az_traffic_matches_remote_replica_count() {
        let mut parameter = base_parameter();
        parameter.num_secondaries = 3;
        parameter.deploy_across_az = true;
        parameter.number_of_azs = 3;
        let node = test_node("i3en.2xlarge", 5_000);
        let mut zipf_cache = ZipfCache::new();

        let arch = Hadr::assemble(&parameter, &node, &mut zipf_cache).expect("feasible HADR deployment");
        let expected = 2.0 * arch.updates.value() * parameter.get_aries_log_record_size() as f64;
        assert!((arch.inter_az_traffic() as f64 - expected).abs() / expected.max(1.0) < 1e-6);
    }

    /// No `--inter-az` means every replica is treated as same-AZ, so there
    /// is no cross-AZ traffic to account for regardless of replica count.
    #[test]
    fn single_az_deployment_has_no_inter_az_traffic() {
        let mut parameter = base_parameter();
        parameter.num_secondaries = 3;
        parameter.deploy_across_az = false;
        let node = test_node("i3en.2xlarge", 5_000);
        let mut zipf_cache = ZipfCache::new();

        let arch = Hadr::assemble(&parameter, &node, &mut zipf_cache).expect("feasible HADR deployment");
        assert_eq!(arch.inter_az_traffic(), 0);
    }

    /// With a fixed primary, adding secondaries never makes the deployment
    /// less durable.
    #[test]
    fn durability_is_monotonic_in_secondary_count() {
        let node = test_node("i3en.2xlarge", 5_000);
        let mut zipf_cache = ZipfCache::new();

        let mut prev = Durability::new(0.0);
        for count in 1..=4 {
            let mut parameter = base_parameter();
            parameter.num_secondaries = count;
            let arch = Hadr::assemble(&parameter, &node, &mut zipf_cache).expect("feasible HADR deployment");
            let durability = arch.durability();
            assert!(durability.numeric_value >= prev.numeric_value - 1e-12, "durability regressed going from {} to {} secondaries", count - 1, count);
            prev = durability;
        }
    }
}
