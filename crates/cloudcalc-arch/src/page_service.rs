//! Page service variants: whatever the primary (or Aurora/Socrates storage
//! tier) reads and writes pages through.

use cloudcalc_core::{Latency, Price, Rate};
use cloudcalc_model::resources::{EBS_MAX_IOP_SIZE, EBS_READ_LATENCY_US, EBS_WRITE_LATENCY_US};
use cloudcalc_model::{
    div_round_up, EbsAllotment, EbsType, InstanceStorage, InstanceStorageAllotment, Memory, Node, Parameter, Primary,
};

use crate::architecture::{cache_miss_for_fraction, network_latency, vmaxafter};
use crate::log_service::LogService;

#[derive(Debug, Clone)]
pub struct NoopPageService;

#[derive(Debug, Clone)]
pub struct InMemoryPageService;

impl InMemoryPageService {
    pub fn assemble(parameter: &Parameter, primary: &Primary) -> Option<InMemoryPageService> {
        if primary.node.memory.get_total_size() >= parameter.get_data_size() {
            Some(InMemoryPageService)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceStoragePageService {
    pub storage: InstanceStorageAllotment,
    pub description: String,
    pub device_type: &'static str,
    pub page_size: u64,
}

impl InstanceStoragePageService {
    pub fn assemble(parameter: &Parameter, primary: &mut Primary) -> Option<InstanceStoragePageService> {
        let size = parameter.get_data_size();
        let iops_per_page = div_round_up(parameter.page_size, InstanceStorage::MAX_IO_SIZE);
        let page_writes = parameter.required_ops_per_node() * primary.prob_evict_dirty_page_from_cache() * iops_per_page as f64;
        let page_reads = parameter.required_ops_per_node() * primary.prob_cache_miss() * iops_per_page as f64;
        let storage = primary.reserve_instance_storage(size, page_reads.round_up(), page_writes.round_up())?;
        Some(InstanceStoragePageService {
            storage,
            description: primary.node.instance_storage.describe(),
            device_type: primary.node.instance_storage.storage_type_name(),
            page_size: parameter.page_size,
        })
    }

    pub fn get_write_volume(&self) -> u64 {
        self.storage.writes.next_int() * self.page_size
    }

    pub fn get_read_volume(&self) -> u64 {
        self.storage.reads.next_int() * self.page_size
    }
}

#[derive(Debug, Clone)]
pub struct EbsPageService {
    pub ebs: EbsAllotment,
    pub page_size: u64,
    pub page_reads: Rate,
    pub page_writes: Rate,
}

impl EbsPageService {
    /// The EBS equivalent carries its own 1.001 headroom, distinct from the
    /// `vmaxafter`/1.0001 hack used by the EC2-backed variants.
    const ROUNDING_HEADROOM: f64 = 1.001;

    pub fn assemble(parameter: &Parameter, primary: &mut Primary, t: EbsType) -> Option<EbsPageService> {
        let size = parameter.get_data_size();
        let iops_per_page = div_round_up(parameter.page_size, EBS_MAX_IOP_SIZE);
        let page_writes =
            parameter.required_ops() * primary.prob_evict_dirty_page_from_cache() * iops_per_page as f64 * Self::ROUNDING_HEADROOM;
        let page_reads =
            parameter.required_ops() * primary.prob_cache_miss() * iops_per_page as f64 * Self::ROUNDING_HEADROOM;
        let iops = page_writes + page_reads;
        let bandwidth = iops.next_int() as f64 * parameter.page_size as f64;
        let ebs = primary.add_ebs_capacity(t, size, iops, bandwidth, parameter.page_size)?;
        Some(EbsPageService { ebs, page_size: parameter.page_size, page_reads, page_writes })
    }

    pub fn get_write_volume(&self) -> u64 {
        self.ebs.iops.next_int() * self.page_size
    }

    pub fn get_read_volume(&self) -> u64 {
        self.ebs.iops.next_int() * self.page_size
    }
}

#[derive(Debug, Clone)]
pub struct S3PageService;

#[derive(Debug, Clone)]
pub struct Ec2PageService {
    pub page_node: Node,
    pub fraction: f64,
    pub use_rbpex: bool,
    pub page_size: u64,
    pub data_size: u64,
    pub network: Latency,
    pub iops_per_page: u64,
}

impl Ec2PageService {
    pub fn assemble(
        parameter: &Parameter,
        primary: &Primary,
        page_node: &Node,
        target_latency: Latency,
        replication: u32,
        use_rbpex: bool,
    ) -> Ec2PageService {
        let data_size = parameter.get_data_size();
        let cache_bytes = page_node.instance_storage.get_usable_size() as f64
            + if use_rbpex { page_node.memory.get_total_size() as f64 } else { 0.0 };
        let storage_scale = (replication as f64 * data_size as f64) / cache_bytes;

        let network_read_scale = (parameter.required_update_ops.value() * replication as f64 * parameter.get_log_record_size() as f64)
            / page_node.network.get_read_limit().value();

        let network = network_latency(parameter);
        let min_required_cache_hit_rate =
            Latency::get_ratio(target_latency - network.as_avg(), Latency::from_nanos(Memory::READ_LATENCY_NS), Latency::from_micros(InstanceStorage::READ_LATENCY_US));
        let memory_scale_for_latency =
            (replication as f64 * data_size as f64 * min_required_cache_hit_rate) / page_node.memory.get_total_size() as f64;

        let iops_per_page = div_round_up(parameter.page_size, InstanceStorage::MAX_IO_SIZE);
        let required_page_node_gets = parameter.required_ops() * primary.prob_cache_miss();
        let network_write_scale = required_page_node_gets.value() / (page_node.network.get_write_limit().value() / parameter.page_size as f64);

        let write_ops = page_node.instance_storage.get_write_ops().value() / iops_per_page as f64;
        let read_ops = page_node.instance_storage.get_read_ops().value() / iops_per_page as f64;
        let disk_ops = if use_rbpex { write_ops.min(read_ops) } else { read_ops };
        let iops_scale = (required_page_node_gets.value() * data_size as f64)
            / (disk_ops * data_size as f64 + required_page_node_gets.value() * page_node.memory.get_total_size() as f64);

        let mut fraction = vmaxafter(&[storage_scale, network_read_scale, network_write_scale, iops_scale, memory_scale_for_latency]);
        fraction *= 1.0001;

        Ec2PageService {
            page_node: page_node.clone(),
            fraction,
            use_rbpex,
            page_size: parameter.page_size,
            data_size,
            network,
            iops_per_page,
        }
    }

    pub fn get_description(&self) -> String {
        let suffix = if self.use_rbpex { "-rbpex" } else { "" };
        format!("{:.2}x{}{}", self.fraction, self.page_node.name, suffix)
    }

    fn cache_miss(&self) -> f64 {
        let cache_bytes = self.page_node.memory.get_total_size() as f64;
        cache_miss_for_fraction(self.data_size, cache_bytes, self.fraction)
    }

    pub fn get_op_latency(&self) -> Latency {
        let miss = self.cache_miss();
        self.network
            + Latency::combine(&[
                (miss, Latency::from_micros(InstanceStorage::READ_LATENCY_US)),
                (1.0 - miss, Latency::from_nanos(Memory::READ_LATENCY_NS)),
            ])
    }

    pub fn get_page_read_ops(&self) -> Rate {
        let disk_reads = self.page_node.instance_storage.get_read_ops() * self.fraction / self.iops_per_page as f64;
        let disk_writes = self.page_node.instance_storage.get_write_ops() * self.fraction / self.iops_per_page as f64;
        let disk_ops = if self.use_rbpex { crate::architecture::rate_min(&[disk_reads, disk_writes]) } else { disk_reads };
        let miss = self.cache_miss();
        let page_node_storage_limit = disk_ops / miss;
        let page_node_network_out_limit = (self.page_node.network.get_write_limit() * self.fraction) / self.page_size as f64;
        crate::architecture::rate_min(&[page_node_storage_limit, page_node_network_out_limit])
    }

    pub fn get_page_write_ops(&self) -> Rate {
        Rate::UNLIMITED
    }

    pub fn get_price(&self) -> Price {
        self.fraction * self.page_node.price
    }

    pub fn get_total_size(&self) -> u64 {
        let usable = self.page_node.instance_storage.get_usable_size() as f64
            + if self.use_rbpex { self.page_node.memory.get_total_size() as f64 } else { 0.0 };
        (self.fraction * usable) as u64
    }
}

/// Aurora-style combined storage tier: satisfies both the page-service and
/// log-service contracts off the same fraction of a shared storage fleet.
#[derive(Debug, Clone)]
pub struct CombinedPageServiceLog {
    pub node: Node,
    pub fraction: f64,
    pub page_size: u64,
    pub data_size: u64,
    pub log_record_size: u64,
    pub iops_per_page: u64,
    pub replication: u32,
    pub group_commit: bool,
    pub deploy_across_az: bool,
    pub cache_miss: f64,
    pub commit_latency: Latency,
    pub op_latency: Latency,
}

impl CombinedPageServiceLog {
    /// Aurora replicates data 3-ways and log 6-ways; `REPLICATION` below is
    /// this service's own (6-way) replication factor, used for durability
    /// and for the log/network-write scaling - distinct from
    /// `AuroraLike::DATA_REPLICATION`/`LOG_REPLICATION` used to size the
    /// gross storage footprint.
    pub const REPLICATION: u32 = 6;
    pub const MIN_NODES_FOR_DURABILITY: u32 = 3;
    /// "Aurora paper: 10GB in 10s on 10Gbit" - the assumed repair bandwidth.
    pub const MTTR_SECONDS: u64 = 10;

    pub fn assemble(
        parameter: &Parameter,
        primary: &Primary,
        storage_node: &Node,
        target_latency: Latency,
        data_replication: u32,
        log_replication: u32,
    ) -> CombinedPageServiceLog {
        let gross_storage_size = (parameter.get_data_size() + parameter.index_size()) * data_replication as u64
            + parameter.get_required_log_storage() * log_replication as u64;
        let dataset_scale = gross_storage_size as f64 / storage_node.instance_storage.get_usable_size() as f64;

        let network = network_latency(parameter);
        let min_required_cache_hit_rate = Latency::get_ratio(
            target_latency - network.as_avg(),
            Latency::from_nanos(Memory::READ_LATENCY_NS),
            Latency::from_micros(InstanceStorage::READ_LATENCY_US),
        );
        let latency_scale =
            (parameter.get_data_size() as f64 * min_required_cache_hit_rate) / storage_node.memory.get_total_size() as f64;

        let required_storage_write_ops = parameter.required_update_ops * Self::REPLICATION as f64;
        let network_read_scale = (required_storage_write_ops.value() * parameter.get_redo_log_record_size() as f64)
            / storage_node.network.get_read_limit().value();

        let adjusted_storage_write_ops =
            parameter.get_log_writes_required_for_updates(InstanceStorage::MAX_IO_SIZE) * Self::REPLICATION as f64;
        let storage_write_scale = adjusted_storage_write_ops.value() / storage_node.instance_storage.get_write_ops().value();

        let iops_per_page = div_round_up(parameter.page_size, InstanceStorage::MAX_IO_SIZE);
        let required_page_node_gets = parameter.required_ops() * (primary.prob_cache_miss() + primary.prob_index_cache_miss());
        let disk_ops = storage_node.instance_storage.get_read_ops().value() / iops_per_page as f64;
        let mem_size = storage_node.memory.get_total_size() as f64;
        let iops_scale = (required_page_node_gets.value() * parameter.get_data_size() as f64)
            / (disk_ops * parameter.get_data_size() as f64 + required_page_node_gets.value() * mem_size);
        let network_write_scale =
            required_page_node_gets.value() / (storage_node.network.get_write_limit().value() / parameter.page_size as f64);

        let mut fraction = vmaxafter(&[
            dataset_scale,
            network_read_scale,
            storage_write_scale,
            network_write_scale,
            iops_scale,
            latency_scale,
        ]);
        fraction *= 1.0001;

        let cache_miss = cache_miss_for_fraction(parameter.get_data_size(), mem_size, fraction);

        let commit_network = if parameter.deploy_across_az {
            crate::architecture::same_region_latency(parameter).max
        } else {
            crate::architecture::same_datacenter_latency(parameter).max
        };
        let commit_latency = Latency::from_nanos(commit_network) + Latency::from_micros(EBS_WRITE_LATENCY_US);

        let op_latency = network
            + Latency::combine(&[
                (cache_miss, Latency::from_micros(InstanceStorage::READ_LATENCY_US)),
                (1.0 - cache_miss, Latency::from_nanos(Memory::READ_LATENCY_NS)),
            ]);

        CombinedPageServiceLog {
            node: storage_node.clone(),
            fraction,
            page_size: parameter.page_size,
            data_size: parameter.get_data_size(),
            log_record_size: parameter.get_redo_log_record_size(),
            iops_per_page,
            replication: Self::REPLICATION,
            group_commit: parameter.group_commit,
            deploy_across_az: parameter.deploy_across_az,
            cache_miss,
            commit_latency,
            op_latency,
        }
    }

    pub fn get_description(&self) -> String {
        format!("comb-p+l({:.2}x{})", self.fraction, self.node.name)
    }

    pub fn get_page_read_ops(&self) -> Rate {
        let storage_reads =
            (self.node.instance_storage.get_read_ops() * self.fraction / self.iops_per_page as f64) / self.cache_miss;
        let network_writes = self.node.network.get_write_limit() * self.fraction / self.page_size as f64;
        crate::architecture::rate_min(&[storage_reads, network_writes])
    }

    pub fn get_update_ops(&self) -> Rate {
        let possible_storage_writes = self.node.instance_storage.get_write_ops() * self.fraction;
        let storage_writes_per_update = if self.group_commit {
            self.log_record_size as f64 / InstanceStorage::MAX_IO_SIZE as f64
        } else {
            div_round_up(self.log_record_size, InstanceStorage::MAX_IO_SIZE) as f64
        };
        let storage_writes = possible_storage_writes / storage_writes_per_update;
        let network_reads = self.node.network.get_read_limit() * self.fraction / self.log_record_size as f64;
        crate::architecture::rate_min(&[storage_writes, network_reads]) / self.replication as f64
    }

    pub fn get_durability(&self) -> cloudcalc_core::Durability {
        cloudcalc_core::Durability::calculate(
            self.replication,
            self.node.get_availability().numeric_value,
            Self::MTTR_SECONDS,
            Self::MIN_NODES_FOR_DURABILITY,
        )
    }

    pub fn get_price(&self) -> Price {
        self.fraction * self.node.price
    }

    pub fn get_total_size(&self) -> u64 {
        (self.fraction * self.node.instance_storage.get_usable_size() as f64) as u64
    }
}

/// The six variants `PageService` can take; `S3` is carried for catalog
/// completeness but no family currently assembles one.
#[derive(Debug, Clone)]
pub enum PageService {
    Noop(NoopPageService),
    InMemory(InMemoryPageService),
    InstanceStorage(InstanceStoragePageService),
    Ebs(EbsPageService),
    S3(S3PageService),
    Ec2(Ec2PageService),
    Combined(CombinedPageServiceLog),
}

impl PageService {
    pub fn get_description(&self) -> String {
        match self {
            PageService::Noop(_) => "no-p".to_string(),
            PageService::InMemory(_) => "in-mem".to_string(),
            PageService::InstanceStorage(s) => s.description.clone(),
            PageService::Ebs(s) => s.ebs.describe(),
            PageService::S3(_) => "s3-p".to_string(),
            PageService::Ec2(s) => s.get_description(),
            PageService::Combined(s) => s.get_description(),
        }
    }

    pub fn get_price(&self) -> Price {
        match self {
            PageService::Noop(_) | PageService::InMemory(_) | PageService::InstanceStorage(_) | PageService::S3(_) => Price::ZERO,
            PageService::Ebs(_) => Price::ZERO,
            PageService::Ec2(s) => s.get_price(),
            PageService::Combined(s) => s.get_price(),
        }
    }

    pub fn get_total_size(&self) -> u64 {
        match self {
            PageService::Noop(_) | PageService::InMemory(_) | PageService::S3(_) => 0,
            PageService::InstanceStorage(s) => s.storage.size,
            PageService::Ebs(s) => s.ebs.size,
            PageService::Ec2(s) => s.get_total_size(),
            PageService::Combined(s) => s.get_total_size(),
        }
    }

    pub fn get_write_volume(&self) -> u64 {
        match self {
            PageService::InstanceStorage(s) => s.get_write_volume(),
            PageService::Ebs(s) => s.get_write_volume(),
            _ => 0,
        }
    }

    pub fn get_read_volume(&self) -> u64 {
        match self {
            PageService::InstanceStorage(s) => s.get_read_volume(),
            PageService::Ebs(s) => s.get_read_volume(),
            _ => 0,
        }
    }

    pub fn is_disk(&self) -> bool {
        matches!(self, PageService::InstanceStorage(_) | PageService::Ebs(_))
    }

    pub fn is_s3(&self) -> bool {
        matches!(self, PageService::S3(_))
    }

    pub fn get_op_latency(&self) -> Latency {
        match self {
            PageService::InMemory(_) => Latency::from_nanos(Memory::READ_LATENCY_NS),
            PageService::InstanceStorage(_) => Latency::from_micros(InstanceStorage::READ_LATENCY_US),
            PageService::Ebs(_) => Latency::from_micros(EBS_READ_LATENCY_US),
            PageService::Ec2(s) => s.get_op_latency(),
            PageService::Combined(s) => s.op_latency,
            PageService::Noop(_) | PageService::S3(_) => Latency::infinite(),
        }
    }

    pub fn get_page_read_ops(&self) -> Rate {
        match self {
            PageService::InMemory(_) => Rate::UNLIMITED,
            PageService::InstanceStorage(s) => s.storage.reads,
            PageService::Ebs(s) => s.page_reads,
            PageService::Ec2(s) => s.get_page_read_ops(),
            PageService::Combined(s) => s.get_page_read_ops(),
            _ => Rate::ZERO,
        }
    }

    pub fn get_page_write_ops(&self) -> Rate {
        match self {
            PageService::InMemory(_) => Rate::UNLIMITED,
            PageService::InstanceStorage(s) => s.storage.writes,
            PageService::Ebs(s) => s.page_writes,
            PageService::Ec2(s) => s.get_page_write_ops(),
            _ => Rate::ZERO,
        }
    }

    pub fn get_device_type(&self) -> &'static str {
        match self {
            PageService::Noop(_) => "none",
            PageService::InMemory(_) => "mem",
            PageService::InstanceStorage(s) => s.device_type,
            PageService::Ebs(s) => s.ebs.ebs_type.name(),
            PageService::S3(_) => "s3",
            PageService::Ec2(_) => "ec2",
            PageService::Combined(_) => "ec2",
        }
    }

    pub fn contains_log_service(&self) -> bool {
        matches!(self, PageService::Combined(_))
    }

    /// A `LogService` view over an Aurora-style combined storage tier; the
    /// EBS/EC2/instance-storage log variants need none of this since they
    /// own a dedicated `LogService` value instead.
    pub fn as_log_service(&self) -> Option<LogService> {
        match self {
            PageService::Combined(s) => Some(LogService::CombinedWrapper(s.clone())),
            _ => None,
        }
    }
}
