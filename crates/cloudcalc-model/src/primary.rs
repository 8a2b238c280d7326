//! The primary node: the one instance every architecture family always has,
//! holding data, serving reads/writes, and optionally fronting EBS volumes
//! or a slice of instance storage.

use crate::parameter::Parameter;
use crate::resources::{
    Ebs, EbsAllotment, EbsType, InstanceStorage, InstanceStorageAllotment, Memory, Node, GIB,
};
use cloudcalc_core::{Latency, Price, Rate};
use std::collections::HashMap;

/// Append-only memoization of the generalized harmonic number used by the
/// Zipf cache-hit model, keyed on `(n, alpha)`. Owned by whichever
/// enumerator constructs `Primary`s across a sweep, since the table is
/// useful cache across many candidate nodes sharing the same dataset.
#[derive(Debug, Default)]
pub struct ZipfCache {
    table: HashMap<(u64, u64), f64>,
}

impl ZipfCache {
    pub fn new() -> Self {
        ZipfCache { table: HashMap::new() }
    }

    fn harmonic(&mut self, n: u64, alpha: f64) -> f64 {
        let key = (n, alpha.to_bits());
        if let Some(&v) = self.table.get(&key) {
            return v;
        }
        let v = generalized_harmonic_number(n, alpha);
        self.table.insert(key, v);
        v
    }

    pub fn get_accumulated_zipf(&mut self, k: u64, n: u64, alpha: f64) -> f64 {
        self.harmonic(k, alpha) / self.harmonic(n, alpha)
    }
}

fn generalized_harmonic_number(n: u64, alpha: f64) -> f64 {
    (1..=n.max(1)).map(|i| 1.0 / (i as f64).powf(alpha)).sum()
}

fn ebs_slot(t: EbsType) -> usize {
    match t {
        EbsType::Gp3 => 0,
        EbsType::Gp2 => 1,
        EbsType::Io1 => 2,
        EbsType::Io2 => 3,
        EbsType::Io2x => unreachable!("io2x is only ever synthesized inside EBS::create_volume"),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ReservedDemand {
    size: u64,
    iops: u64,
    throughput: u64,
    iop_size: u64,
}

fn data_in_first_cache(node: &Node, parameter: &Parameter) -> f64 {
    (node.memory.size as f64 * parameter.usable_memory).min(parameter.get_data_size() as f64)
}

fn buffer_cache_size(node: &Node, parameter: &Parameter, rbpex: bool) -> f64 {
    node.memory.size as f64 * parameter.usable_memory
        + if rbpex { node.instance_storage.get_usable_size() as f64 } else { 0.0 }
}

fn data_in_cache(node: &Node, parameter: &Parameter, rbpex: bool) -> f64 {
    buffer_cache_size(node, parameter, rbpex).min(parameter.get_data_size() as f64)
}

fn index_in_cache(node: &Node, parameter: &Parameter, rbpex: bool) -> f64 {
    buffer_cache_size(node, parameter, rbpex).min(parameter.index_size() as f64)
}

fn data_in_second_cache(node: &Node, parameter: &Parameter, rbpex: bool) -> f64 {
    if rbpex {
        data_in_cache(node, parameter, rbpex) - data_in_first_cache(node, parameter)
    } else {
        0.0
    }
}

/// A deployed primary instance, with whatever EBS volumes and instance
/// storage it has reserved so far.
#[derive(Debug, Clone)]
pub struct Primary {
    pub parameter: Parameter,
    pub node: Node,
    ebs: [Option<Ebs>; 4],
    ebs_reserved: [ReservedDemand; 4],
    pub uses_buffer_pool_extension: bool,
    pub reserved: InstanceStorageAllotment,
    prob_first_cache_hit_val: f64,
    prob_second_cache_hit_val: f64,
    prob_cache_hit_val: f64,
    prob_index_cache_hit_val: f64,
    pub network_in: u64,
    pub network_out: u64,
    pub log_volume: u64,
}

impl Primary {
    pub fn new(parameter: &Parameter, node: &Node, rbpex: bool, zipf_cache: &mut ZipfCache) -> Self {
        let data_size = parameter.get_data_size() as f64;
        let (prob_cache_hit_val, prob_first_cache_hit_val, prob_second_cache_hit_val, prob_index_cache_hit_val);

        if parameter.lookup_zipf != 0.0 {
            debug_assert!(parameter.index_only_tables);
            debug_assert!(parameter.required_update_ops == Rate::ZERO);
            let cache_gb = (buffer_cache_size(node, parameter, rbpex) / GIB as f64).round() as u64;
            let first_cache_gb = (node.memory.size as f64 * parameter.usable_memory / GIB as f64).round() as u64;
            let dataset_gb = (data_size / GIB as f64).round() as u64;
            prob_cache_hit_val = zipf_cache.get_accumulated_zipf(cache_gb, dataset_gb, parameter.lookup_zipf);
            prob_first_cache_hit_val =
                zipf_cache.get_accumulated_zipf(first_cache_gb, dataset_gb, parameter.lookup_zipf);
            prob_second_cache_hit_val = prob_cache_hit_val - prob_first_cache_hit_val;
            prob_index_cache_hit_val = 1.0;
        } else {
            prob_cache_hit_val = data_in_cache(node, parameter, rbpex) / data_size;
            prob_index_cache_hit_val = if parameter.index_only_tables {
                1.0
            } else {
                index_in_cache(node, parameter, rbpex) / parameter.index_size() as f64
            };
            prob_first_cache_hit_val = data_in_first_cache(node, parameter) / data_size;
            prob_second_cache_hit_val = data_in_second_cache(node, parameter, rbpex) / data_size;
        }

        Primary {
            parameter: parameter.clone(),
            node: node.clone(),
            ebs: [None, None, None, None],
            ebs_reserved: [ReservedDemand::default(); 4],
            uses_buffer_pool_extension: rbpex,
            reserved: InstanceStorageAllotment::default(),
            prob_first_cache_hit_val,
            prob_second_cache_hit_val,
            prob_cache_hit_val,
            prob_index_cache_hit_val,
            network_in: 0,
            network_out: 0,
            log_volume: 0,
        }
    }

    pub fn assemble(parameter: &Parameter, node: &Node, rbpex: bool, zipf_cache: &mut ZipfCache) -> Option<Primary> {
        let primary = Primary::new(parameter, node, rbpex, zipf_cache);
        if primary.get_cache_hit_ops(Rate::ZERO) < parameter.required_ops_per_node() {
            None
        } else {
            Some(primary)
        }
    }

    pub fn get_description(&self) -> String {
        if self.uses_buffer_pool_extension {
            format!("{}-rbpex", self.node.name)
        } else {
            self.node.name.clone()
        }
    }

    pub fn get_price(&self) -> Price {
        self.node.price
    }

    pub fn get_ebs_price(&self) -> Price {
        self.ebs.iter().flatten().fold(Price::ZERO, |acc, e| acc + e.get_price())
    }

    pub fn get_cpu_vendor(&self) -> &str {
        &self.node.cpu.vendor
    }

    pub fn get_network_in_limit(&self) -> Rate {
        self.node.network.get_read_limit()
    }

    pub fn get_network_out_limit(&self) -> Rate {
        self.node.network.get_write_limit()
    }

    /// Attempts to grow (or first-create) the EBS volume for slot `t` to
    /// cover an additional `size`/`iops`/`bandwidth` of demand, re-checking
    /// every slot's aggregate IOPS, throughput and device count against the
    /// node's limits before committing.
    pub fn add_ebs_capacity(
        &mut self,
        t: EbsType,
        size: u64,
        iops: Rate,
        bandwidth: f64,
        iop_size: u64,
    ) -> Option<EbsAllotment> {
        debug_assert!(t != EbsType::Io2x, "io2x is only reachable via r5b auto-upgrade");
        let slot = ebs_slot(t);
        let iops_int = iops.round_up().value() as u64;

        let mut candidate = self.ebs_reserved[slot];
        candidate.size += size;
        candidate.iops += iops_int;
        candidate.throughput += bandwidth as u64;
        candidate.iop_size = candidate.iop_size.max(iop_size);

        let candidate_ebs =
            Ebs::create_volume(&self.node.name, t, candidate.size, candidate.iops, candidate.throughput, candidate.iop_size);

        let mut total_iops = candidate_ebs.get_iops();
        let mut total_throughput = candidate_ebs.get_throughput();
        let mut total_devices = candidate_ebs.num_devices;
        for (i, existing) in self.ebs.iter().enumerate() {
            if i == slot {
                continue;
            }
            if let Some(e) = existing {
                total_iops = total_iops + e.get_iops();
                total_throughput += e.get_throughput();
                total_devices += e.num_devices;
            }
        }

        if total_iops > self.node.machine_ebs.base_iops
            || total_throughput > self.node.machine_ebs.base_throughput
            || total_devices > self.node.max_ebs_devices()
        {
            return None;
        }

        self.ebs_reserved[slot] = candidate;
        self.ebs[slot] = Some(candidate_ebs);

        Some(EbsAllotment {
            ebs_type: t,
            size: candidate.size,
            iops: Rate::secondly(iops_int as f64),
            bandwidth: candidate.throughput,
            max_iop_size: candidate.iop_size,
        })
    }

    pub fn get_ebs(&self, t: EbsType) -> Option<&Ebs> {
        self.ebs[ebs_slot(t)].as_ref()
    }

    /// Carves `size`/`reads`/`writes` out of the node's raw instance storage.
    /// Fails outright for rbpex primaries (their instance storage is fully
    /// committed to the buffer pool extension) or once the node's usable
    /// size/read/write budget is exhausted.
    pub fn reserve_instance_storage(&mut self, size: u64, reads: Rate, writes: Rate) -> Option<InstanceStorageAllotment> {
        if self.uses_buffer_pool_extension {
            return None;
        }
        let new_reserved = InstanceStorageAllotment {
            size: self.reserved.size + size,
            reads: self.reserved.reads + reads,
            writes: self.reserved.writes + writes,
        };
        if new_reserved.size > self.node.instance_storage.get_usable_size()
            || new_reserved.reads > self.node.instance_storage.get_read_ops()
            || new_reserved.writes > self.node.instance_storage.get_write_ops()
        {
            return None;
        }
        self.reserved = new_reserved;
        Some(new_reserved)
    }

    /// Remaining op budget after `already_used`, rbpex-aware: a buffer pool
    /// extension also consumes instance-storage read/write IOPS in
    /// proportion to the second-cache-hit ratio, so CPU alone isn't the
    /// binding constraint.
    pub fn get_cache_hit_ops(&self, already_used: Rate) -> Rate {
        let cpu_budget = self.node.cpu.get_ops(self.parameter.cpu_cost as f64) - already_used;
        if !self.uses_buffer_pool_extension {
            return cpu_budget;
        }
        let p2 = self.prob_second_cache_hit_val;
        if p2 <= 0.0 {
            return cpu_budget;
        }
        let remaining_writes = self.node.instance_storage.get_write_ops() - self.reserved.writes;
        let remaining_reads = self.node.instance_storage.get_read_ops() - self.reserved.reads;
        let mut r = cpu_budget;
        let by_writes = remaining_writes / p2;
        let by_reads = remaining_reads / p2;
        if by_writes < r {
            r = by_writes;
        }
        if by_reads < r {
            r = by_reads;
        }
        r
    }

    pub fn get_cache_hit_latency(&self) -> Latency {
        if !self.uses_buffer_pool_extension {
            return Latency::from_nanos(Memory::READ_LATENCY_NS);
        }
        let total = self.prob_first_cache_hit_val + self.prob_second_cache_hit_val;
        if total <= 0.0 {
            return Latency::from_nanos(Memory::READ_LATENCY_NS);
        }
        Latency::combine(&[
            (self.prob_first_cache_hit_val / total, Latency::from_nanos(Memory::READ_LATENCY_NS)),
            (self.prob_second_cache_hit_val / total, Latency::from_micros(InstanceStorage::READ_LATENCY_US)),
        ])
    }

    pub fn get_buffer_cache_size(&self) -> u64 {
        buffer_cache_size(&self.node, &self.parameter, self.uses_buffer_pool_extension) as u64
    }

    pub fn prob_dirty(&self) -> f64 {
        let total = self.parameter.required_update_ops + self.parameter.required_lookup_ops;
        if total == Rate::ZERO {
            0.0
        } else {
            self.parameter.required_update_ops / total
        }
    }

    pub fn data_in_cache(&self) -> u64 {
        data_in_cache(&self.node, &self.parameter, self.uses_buffer_pool_extension) as u64
    }

    pub fn index_in_cache(&self) -> u64 {
        index_in_cache(&self.node, &self.parameter, self.uses_buffer_pool_extension) as u64
    }

    pub fn data_not_in_cache(&self) -> u64 {
        self.parameter.get_data_size() - self.data_in_cache()
    }

    pub fn prob_first_cache_hit(&self) -> f64 {
        self.prob_first_cache_hit_val
    }

    pub fn prob_second_cache_hit(&self) -> f64 {
        self.prob_second_cache_hit_val
    }

    pub fn prob_cache_hit(&self) -> f64 {
        self.prob_cache_hit_val
    }

    pub fn prob_cache_miss(&self) -> f64 {
        1.0 - self.prob_cache_hit_val
    }

    pub fn prob_index_cache_hit(&self) -> f64 {
        self.prob_index_cache_hit_val
    }

    pub fn prob_index_cache_miss(&self) -> f64 {
        (1.0 - self.prob_index_cache_hit_val).max(0.0)
    }

    pub fn prob_evict_dirty_page_from_cache(&self) -> f64 {
        self.prob_cache_miss() * self.prob_dirty()
    }

    pub fn data_in_first_cache(&self) -> u64 {
        data_in_first_cache(&self.node, &self.parameter) as u64
    }

    pub fn data_not_in_first_cache(&self) -> u64 {
        self.parameter.get_data_size() - self.data_in_first_cache()
    }

    pub fn data_in_second_cache(&self) -> u64 {
        data_in_second_cache(&self.node, &self.parameter, self.uses_buffer_pool_extension) as u64
    }

    pub fn data_not_in_second_cache(&self) -> u64 {
        if !self.uses_buffer_pool_extension {
            self.data_not_in_cache()
        } else {
            self.parameter.get_data_size() - self.data_in_second_cache()
        }
    }
}

/// Read replicas of the primary, all of the same node type.
#[derive(Debug, Clone)]
pub struct Secondaries {
    count: u32,
    node: Node,
}

impl Secondaries {
    pub fn new(count: u32, node: Node) -> Self {
        Secondaries { count, node }
    }

    pub fn get_price(&self) -> Price {
        self.node.price * self.count as f64
    }

    pub fn has_standby(&self) -> bool {
        self.count > 0
    }

    /// One secondary always takes over as the new primary on failover, so
    /// only `count - 1` remain available to absorb lookup traffic.
    pub fn available_for_lookups(&self) -> u32 {
        if self.count > 0 {
            self.count - 1
        } else {
            0
        }
    }

    pub fn get_count(&self) -> u32 {
        self.count
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Cpu, MachineEbsLimits, Memory as Mem, Network};

    fn test_node() -> Node {
        Node {
            name: "m5.xlarge".to_string(),
            cpu: Cpu { count: 4, speed: 3.1e9, vendor: "intel".to_string() },
            memory: Mem { size: 16 * GIB },
            network: Network { speed: 10, burst_speed: 10, devices: 1, up_to: false },
            price: Price::hourly(0.192),
            instance_storage: InstanceStorage::NONE,
            machine_ebs: MachineEbsLimits {
                base_iops: Rate::secondly(6000.0),
                burst_iops: Rate::secondly(6000.0),
                base_throughput: 250.0 * 1024.0 * 1024.0,
                burst_throughput: 250.0 * 1024.0 * 1024.0,
            },
        }
    }

    #[test]
    fn zipf_cache_memoizes_harmonic_numbers() {
        let mut cache = ZipfCache::new();
        let a = cache.get_accumulated_zipf(10, 100, 0.8);
        let b = cache.get_accumulated_zipf(10, 100, 0.8);
        assert_eq!(a, b);
        assert!(a > 0.0 && a < 1.0);
    }

    #[test]
    fn primary_uniform_cache_hit_probability_matches_memory_fraction() {
        let node = test_node();
        let mut parameter = Parameter { dataset_size: 8 * GIB, ..Default::default() };
        parameter.data_bloat = 1.0;
        let mut cache = ZipfCache::new();
        let primary = Primary::new(&parameter, &node, false, &mut cache);
        assert!(primary.prob_cache_hit() > 0.9);
    }

    #[test]
    fn secondaries_reserve_one_for_failover() {
        let node = test_node();
        let s = Secondaries::new(3, node);
        assert_eq!(s.available_for_lookups(), 2);
    }
}
