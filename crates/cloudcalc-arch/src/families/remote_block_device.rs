//! Remote block device: primary node with no local storage at all; pages and
//! log both live on attached EBS volumes.

use cloudcalc_core::{Durability, FailoverTime, Latency, Rate};
use cloudcalc_model::{EbsType, Node, Parameter, Primary, Secondaries, ZipfCache};

use crate::architecture::{rate_min, ArchitectureOps};
use crate::log_service::{EbsLogService, LogService};
use crate::page_service::{EbsPageService, PageService};

#[derive(Debug, Clone)]
pub struct RemoteBlockDevice {
    primary: Primary,
    secondaries: Secondaries,
    page_service: PageService,
    log_service: LogService,
    op_latency: Latency,
    commit_latency: Latency,
}

impl RemoteBlockDevice {
    pub fn assemble(parameter: &Parameter, node: &Node, ebs_type: EbsType, zipf_cache: &mut ZipfCache) -> Option<RemoteBlockDevice> {
        let mut p = parameter.clone();
        p.wal_includes_undo = true;
        debug_assert!(p.index_only_tables, "remote block device assumes index-only tables");

        let mut primary = Primary::assemble(&p, node, false, zipf_cache)?;

        let page_service = EbsPageService::assemble(&p, &mut primary, ebs_type)?;
        let log_service = EbsLogService::assemble(&p, &mut primary, ebs_type)?;

        let update_ops = rate_min(&[log_service.get_update_ops(), p.required_update_ops]);
        if update_ops < p.required_update_ops {
            return None;
        }

        let commit_latency = Latency::from_micros(cloudcalc_model::resources::EBS_WRITE_LATENCY_US);
        let op_latency = Latency::combine(&[
            (primary.prob_cache_miss(), Latency::from_micros(cloudcalc_model::resources::EBS_READ_LATENCY_US)),
            (primary.prob_cache_hit(), primary.get_cache_hit_latency()),
        ]);

        Some(RemoteBlockDevice {
            secondaries: Secondaries::new(0, node.clone()),
            primary,
            page_service: PageService::Ebs(page_service),
            log_service: LogService::Ebs(log_service),
            op_latency,
            commit_latency,
        })
    }
}

impl ArchitectureOps for RemoteBlockDevice {
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
        match &self.log_service {
            LogService::Ebs(s) => s.get_durability(),
            _ => unreachable!("remote block device always assembles an EBS log service"),
        }
    }

    fn failover_time(&self) -> FailoverTime {
        // No local state to reconstruct after reattaching the EBS volumes;
        // the only work is warming the in-memory cache back up over EBS.
        let bandwidth = match &self.page_service {
            PageService::Ebs(s) => s.ebs.bandwidth,
            _ => unreachable!(),
        };
        let warmup = self.primary.data_in_cache() as f64 / (bandwidth.max(10) as f64);
        Node::NODE_SPINUP_TIME + FailoverTime::new(warmup)
    }

    fn primary_random_lookup_tx(&self) -> Rate {
        let storage_limit = match &self.page_service {
            PageService::Ebs(s) => s.ebs.iops,
            _ => unreachable!(),
        };
        rate_min(&[storage_limit, self.primary.parameter.required_lookup_ops])
    }

    fn random_update_tx(&self) -> Rate {
        match &self.log_service {
            LogService::Ebs(s) => rate_min(&[s.get_update_ops(), self.primary.parameter.required_update_ops]),
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudcalc_core::Price;
    use cloudcalc_model::resources::{Cpu, InstanceStorage, InstanceStorageType, MachineEbsLimits, Memory, Network};

    fn test_node() -> Node {
        Node {
            name: "r5.2xlarge".to_string(),
            cpu: Cpu { count: 8, speed: 3.1e9, vendor: "intel".to_string() },
            memory: Memory { size: 8 * cloudcalc_model::GIB },
            network: Network { speed: 10, burst_speed: 10, devices: 1, up_to: false },
            price: Price::hourly(0.5),
            instance_storage: InstanceStorage { storage_type: InstanceStorageType::None, size: 0, devices: 0.0, read_ops: 0, write_ops: 0 },
            machine_ebs: MachineEbsLimits {
                base_iops: Rate::secondly(16_000.0),
                burst_iops: Rate::secondly(16_000.0),
                base_throughput: 1000.0 * cloudcalc_model::MIB as f64,
                burst_throughput: 1000.0 * cloudcalc_model::MIB as f64,
            },
        }
    }

    #[test]
    fn failover_time_warms_cache_over_the_ebs_device() {
        let parameter = Parameter { dataset_size: 10 * cloudcalc_model::GIB, required_lookup_ops: Rate::secondly(100.0), ..Default::default() };
        let node = test_node();
        let mut zipf_cache = ZipfCache::new();
        let arch = RemoteBlockDevice::assemble(&parameter, &node, EbsType::Gp3, &mut zipf_cache).expect("feasible rbd deployment");
        assert!(arch.failover_time().value > Node::NODE_SPINUP_TIME.value);
    }
}
