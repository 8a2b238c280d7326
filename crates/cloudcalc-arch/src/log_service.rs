//! Log service variants: wherever commit records land before an update is
//! acknowledged.

use cloudcalc_core::{Durability, Latency, Price, Rate};
use cloudcalc_model::resources::{EBS_MAX_IOP_SIZE, EBS_READ_LATENCY_US, EBS_WRITE_LATENCY_US};
use cloudcalc_model::{div_round_up, EbsAllotment, EbsType, InstanceStorage, InstanceStorageAllotment, Node, Parameter, Primary};

use crate::architecture::{rate_min, vmaxafter};
use crate::page_service::CombinedPageServiceLog;

#[derive(Debug, Clone)]
pub struct NoopLogService;

#[derive(Debug, Clone)]
pub struct InstanceStorageLogService {
    pub storage: InstanceStorageAllotment,
    pub log_record_size: u64,
    pub group_commit: bool,
    pub primary_availability: f64,
}

impl InstanceStorageLogService {
    pub fn assemble(parameter: &Parameter, primary: &mut Primary) -> Option<InstanceStorageLogService> {
        let availability = primary.node.get_availability().numeric_value;
        let storage = primary.reserve_instance_storage(
            parameter.get_required_log_storage(),
            Rate::ZERO,
            parameter.get_log_writes_required_for_updates(InstanceStorage::MAX_IO_SIZE),
        )?;
        Some(InstanceStorageLogService {
            storage,
            log_record_size: parameter.get_log_record_size(),
            group_commit: parameter.group_commit,
            primary_availability: availability,
        })
    }

    pub fn get_update_ops(&self) -> Rate {
        let log_writes_per_update = if self.group_commit {
            self.log_record_size as f64 / InstanceStorage::MAX_IO_SIZE as f64
        } else {
            div_round_up(self.log_record_size, InstanceStorage::MAX_IO_SIZE) as f64
        };
        self.storage.writes / log_writes_per_update
    }

    pub fn get_durability(&self) -> Durability {
        Durability::new(self.primary_availability.powi(12))
    }
}

#[derive(Debug, Clone)]
pub struct EbsLogService {
    pub ebs: EbsAllotment,
    pub log_record_size: u64,
    pub group_commit: bool,
}

impl EbsLogService {
    pub fn assemble(parameter: &Parameter, primary: &mut Primary, t: EbsType) -> Option<EbsLogService> {
        let log_writes = parameter.get_log_writes_required_for_updates(EBS_MAX_IOP_SIZE);
        let required_bandwidth = parameter.required_update_ops.value() * parameter.get_log_record_size() as f64;
        let log_storage = parameter.get_required_log_storage();
        let iop_size = if parameter.group_commit { EBS_MAX_IOP_SIZE } else { parameter.get_log_record_size() };
        let ebs = primary.add_ebs_capacity(t, log_storage, log_writes, required_bandwidth, iop_size)?;
        Some(EbsLogService { ebs, log_record_size: parameter.get_log_record_size(), group_commit: parameter.group_commit })
    }

    pub fn get_update_ops(&self) -> Rate {
        let writes_per_update = if self.group_commit {
            self.log_record_size as f64 / EBS_MAX_IOP_SIZE as f64
        } else {
            div_round_up(self.log_record_size, EBS_MAX_IOP_SIZE) as f64
        };
        self.ebs.iops / writes_per_update
    }

    pub fn get_durability(&self) -> Durability {
        self.ebs.ebs_type.durability()
    }
}

/// A dedicated EC2 log node, fronted by an `io2` EBS device that is
/// physically attributed to the primary's allotments even though it
/// conceptually belongs to the log service.
#[derive(Debug, Clone)]
pub struct Ec2LogService {
    pub log_node: Node,
    pub fraction: f64,
    pub targets: u32,
    pub ebs: EbsAllotment,
    pub log_record_size: u64,
    pub group_commit: bool,
}

impl Ec2LogService {
    /// Unused directly in the scaling formulas below (each term already
    /// carries its own replication factor), kept for parity with the
    /// original's named constant.
    pub const REPLICATION: f64 = 1.0;

    pub fn compute_scale(parameter: &Parameter, log_node: &Node, log_targets: u32) -> f64 {
        if parameter.required_update_ops == Rate::ZERO {
            return 0.0;
        }
        let storage_scale =
            parameter.get_required_log_storage() as f64 * Self::REPLICATION / log_node.instance_storage.get_usable_size() as f64;
        let network_read_scale = (parameter.required_update_ops.value() * Self::REPLICATION)
            / (log_node.network.get_read_limit().value() / parameter.get_log_record_size() as f64);
        let log_volume_write_scale = (parameter.required_update_ops.value() * Self::REPLICATION * parameter.get_log_record_size() as f64)
            / log_node.instance_storage.get_write_throughput();
        let log_network_write_scale = (parameter.required_update_ops.value() * parameter.get_log_record_size() as f64 * log_targets as f64)
            / log_node.network.get_write_limit().value();
        vmaxafter(&[storage_scale, network_read_scale, log_volume_write_scale, log_network_write_scale])
    }

    pub fn assemble(parameter: &Parameter, primary: &mut Primary, log_node: &Node, replication: u32) -> Option<Ec2LogService> {
        let log_writes = parameter.get_log_writes_required_for_updates(EBS_MAX_IOP_SIZE);
        let throughput = parameter.required_update_ops.value() * parameter.get_log_record_size() as f64;
        let size = parameter.get_required_log_storage();
        let iop_size = if parameter.group_commit { EBS_MAX_IOP_SIZE } else { parameter.get_log_record_size() };
        let ebs = primary.add_ebs_capacity(EbsType::Io2, size, log_writes, throughput, iop_size)?;

        let log_targets = parameter.num_secondaries + replication;
        let scale = Self::compute_scale(parameter, log_node, log_targets);
        if scale > 1.0 {
            return None;
        }

        Some(Ec2LogService {
            log_node: log_node.clone(),
            fraction: scale,
            targets: log_targets,
            ebs,
            log_record_size: parameter.get_log_record_size(),
            group_commit: parameter.group_commit,
        })
    }

    pub fn get_commit_latency(&self) -> Latency {
        Latency::from_micros(EBS_WRITE_LATENCY_US)
    }

    pub fn get_durability(&self) -> Durability {
        self.ebs.ebs_type.durability()
    }

    pub fn get_price(&self) -> Price {
        self.fraction * self.log_node.price
    }

    pub fn get_update_ops(&self) -> Rate {
        let storage_write_volume =
            Rate::secondly((self.log_node.instance_storage.get_write_throughput() * self.fraction) / self.log_record_size as f64);
        let network_reads =
            self.log_node.network.get_read_limit() / self.log_record_size as f64 * self.fraction;
        let network_writes =
            self.log_node.network.get_write_limit() / self.log_record_size as f64 * self.fraction / self.targets as f64;
        let device_throughput = Rate::secondly(self.ebs.bandwidth as f64 / self.log_record_size as f64);

        let mut result = rate_min(&[storage_write_volume, network_reads, network_writes, device_throughput]);
        if !self.group_commit {
            result = rate_min(&[result, self.ebs.iops]);
        }
        result
    }
}

/// A read-only `LogService` view over an Aurora-style combined storage
/// tier; `PageService::as_log_service` produces this.
#[derive(Debug, Clone)]
pub enum LogService {
    Noop(NoopLogService),
    InstanceStorage(InstanceStorageLogService),
    Ebs(EbsLogService),
    Ec2(Ec2LogService),
    CombinedWrapper(CombinedPageServiceLog),
}

impl LogService {
    pub fn get_description(&self) -> String {
        match self {
            LogService::Noop(_) => "no-log".to_string(),
            LogService::InstanceStorage(_) => "inst-stor".to_string(),
            LogService::Ebs(s) => s.ebs.describe(),
            LogService::Ec2(s) => format!("{:.2}x{}", s.fraction, s.log_node.name),
            LogService::CombinedWrapper(s) => s.get_description(),
        }
    }

    pub fn get_price(&self) -> Price {
        match self {
            LogService::Noop(_) | LogService::InstanceStorage(_) | LogService::Ebs(_) => Price::ZERO,
            LogService::Ec2(s) => s.get_price(),
            LogService::CombinedWrapper(_) => Price::ZERO,
        }
    }

    pub fn is_s3(&self) -> bool {
        false
    }

    pub fn get_total_size(&self) -> u64 {
        match self {
            LogService::InstanceStorage(s) => s.storage.size,
            LogService::Ebs(s) => s.ebs.size,
            LogService::Ec2(s) => s.ebs.size,
            _ => 0,
        }
    }

    pub fn get_commit_latency(&self) -> Latency {
        match self {
            LogService::Noop(_) => Latency::default(),
            LogService::InstanceStorage(_) => Latency::from_micros(InstanceStorage::WRITE_LATENCY_US),
            LogService::Ebs(_) => Latency::from_micros(EBS_WRITE_LATENCY_US),
            LogService::Ec2(s) => s.get_commit_latency(),
            LogService::CombinedWrapper(s) => s.commit_latency,
        }
    }

    pub fn get_max_iop_size(&self) -> u64 {
        match self {
            LogService::InstanceStorage(_) => InstanceStorage::MAX_IO_SIZE,
            LogService::Ebs(_) | LogService::Ec2(_) => EBS_MAX_IOP_SIZE,
            _ => 0,
        }
    }

    pub fn get_update_ops(&self) -> Rate {
        match self {
            LogService::Noop(_) => Rate::UNLIMITED,
            LogService::InstanceStorage(s) => s.get_update_ops(),
            LogService::Ebs(s) => s.get_update_ops(),
            LogService::Ec2(s) => s.get_update_ops(),
            LogService::CombinedWrapper(s) => s.get_update_ops(),
        }
    }

    pub fn get_durability(&self) -> Durability {
        match self {
            LogService::Noop(_) => Durability { numeric_value: 1.0 },
            LogService::InstanceStorage(s) => s.get_durability(),
            LogService::Ebs(s) => s.get_durability(),
            LogService::Ec2(s) => s.get_durability(),
            LogService::CombinedWrapper(s) => s.get_durability(),
        }
    }
}
