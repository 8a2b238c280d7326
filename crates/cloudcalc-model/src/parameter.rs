//! Workload and SLA inputs: the one struct every architecture family reads
//! from to decide feasibility and size itself.

use crate::resources::div_round_up;
use cloudcalc_core::{Durability, Latency, Rate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub dataset_size: u64,
    pub data_bloat: f64,
    pub usable_memory: f64,
    pub network_overhead: f64,

    pub required_lookup_ops: Rate,
    /// 0.0 means uniform access; otherwise the Zipf skew parameter driving
    /// `Primary`'s cache-hit-probability curve.
    pub lookup_zipf: f64,
    pub required_update_ops: Rate,

    pub tuple_size: u64,
    pub page_size: u64,
    pub cpu_cost: u64,

    pub num_secondaries: u32,
    pub min_secondaries: u32,
    pub max_secondaries: u32,

    pub intra_az_latency: f64,
    pub inter_az_latency: f64,
    pub ec2_discount: f64,
    pub number_of_azs: u32,

    pub log_service_instance: String,
    pub log_service_capacity_in_seconds: u64,
    pub log_service_replication: u64,
    pub log_record_header_size: u64,

    pub page_service_instance: String,
    pub page_server_replication: u32,

    pub group_commit: bool,
    pub deploy_across_az: bool,
    pub wal_includes_undo: bool,
    pub index_only_tables: bool,

    pub required_op_latency: Latency,
    pub required_durability: Durability,
}

impl Default for Parameter {
    fn default() -> Self {
        Parameter {
            dataset_size: 0,
            data_bloat: 1.0,
            usable_memory: 0.8,
            network_overhead: 1.0,
            required_lookup_ops: Rate::ZERO,
            lookup_zipf: 0.0,
            required_update_ops: Rate::ZERO,
            tuple_size: 1024,
            page_size: 16 * 1024,
            cpu_cost: 1000,
            num_secondaries: 0,
            min_secondaries: 0,
            max_secondaries: 0,
            intra_az_latency: 0.0,
            inter_az_latency: 0.0,
            ec2_discount: 0.0,
            number_of_azs: 3,
            log_service_instance: "i3en.24xl".to_string(),
            log_service_capacity_in_seconds: 3600,
            log_service_replication: 6,
            log_record_header_size: 48,
            page_service_instance: "i3en.24xl".to_string(),
            page_server_replication: 2,
            group_commit: true,
            deploy_across_az: false,
            wal_includes_undo: false,
            index_only_tables: true,
            required_op_latency: Latency::infinite(),
            required_durability: Durability::new(0.0),
        }
    }
}

impl Parameter {
    pub fn required_ops(&self) -> Rate {
        self.required_lookup_ops + self.required_update_ops
    }

    pub fn num_tuples(&self) -> u64 {
        self.dataset_size / self.tuple_size
    }

    pub fn get_data_size(&self) -> u64 {
        (self.dataset_size as f64 * self.data_bloat) as u64
    }

    pub fn index_size(&self) -> u64 {
        if self.index_only_tables {
            0
        } else {
            self.num_tuples() * 20
        }
    }

    /// Lookups are spread across the primary and its readable secondaries;
    /// updates always land on the primary alone.
    pub fn required_ops_per_node(&self) -> Rate {
        if self.num_secondaries > 1 {
            self.required_update_ops + self.required_lookup_ops / self.num_secondaries as f64
        } else {
            self.required_update_ops + self.required_lookup_ops
        }
    }

    pub fn get_redo_log_record_size(&self) -> u64 {
        self.tuple_size + self.log_record_header_size
    }

    pub fn get_aries_log_record_size(&self) -> u64 {
        2 * self.tuple_size + self.log_record_header_size
    }

    pub fn get_log_record_size(&self) -> u64 {
        if self.wal_includes_undo {
            self.get_aries_log_record_size()
        } else {
            self.get_redo_log_record_size()
        }
    }

    fn get_required_log_storage_impl(&self, log_record_size: u64) -> u64 {
        (self.required_update_ops.value() * self.log_service_capacity_in_seconds as f64 * log_record_size as f64)
            as u64
    }

    pub fn get_required_redo_log_storage(&self) -> u64 {
        self.get_required_log_storage_impl(self.get_redo_log_record_size())
    }

    pub fn get_required_aries_log_storage(&self) -> u64 {
        self.get_required_log_storage_impl(self.get_aries_log_record_size())
    }

    pub fn get_required_log_storage(&self) -> u64 {
        self.get_required_log_storage_impl(self.get_log_record_size())
    }

    /// With group commit, writes batch up to `max_iop_size`; without it,
    /// every update forces a whole extra I/O regardless of how small the
    /// record is.
    pub fn get_log_writes_required_for_updates(&self, max_iop_size: u64) -> Rate {
        if self.group_commit {
            self.required_update_ops * (self.get_log_record_size() as f64 / max_iop_size as f64)
        } else {
            self.required_update_ops * div_round_up(self.get_log_record_size(), max_iop_size) as f64
        }
    }

    pub fn get_remote_az_ratio(&self) -> f64 {
        if self.deploy_across_az {
            (self.number_of_azs - 1) as f64 / self.number_of_azs as f64
        } else {
            0.0
        }
    }

    pub fn get_same_az_ratio(&self) -> f64 {
        if self.deploy_across_az {
            1.0 / self.number_of_azs as f64
        } else {
            1.0
        }
    }
}
