//! The enumerator: turns an instance catalog plus a workload `Parameter`
//! into every feasible `Architecture` across the requested families.

use cloudcalc_core::{Latency, Rate};
use cloudcalc_model::{EbsType, Node, Parameter, ZipfCache};

use crate::architecture::{ArchType, Architecture};
use crate::families::aurora_like::AuroraLike;
use crate::families::classic::Classic;
use crate::families::dynamic::{Dynamic, DynamicCandidates};
use crate::families::hadr::Hadr;
use crate::families::in_memory::InMemory;
use crate::families::remote_block_device::RemoteBlockDevice;
use crate::families::socrates_like::SocratesLike;

const EBS_TYPES: [EbsType; 5] = [EbsType::Gp3, EbsType::Gp2, EbsType::Io1, EbsType::Io2, EbsType::Io2x];

/// `Io2x` is never a catalog-selectable family; `EBS::create_volume` upgrades
/// a plain `Io2` request into it on its own (the `r5b` substring check), so
/// RemoteBlockDevice only ever enumerates the four device families the
/// original tool iterates directly.
const RBD_EBS_TYPES: [EbsType; 4] = [EbsType::Gp3, EbsType::Gp2, EbsType::Io1, EbsType::Io2];

/// Sizes the remote page/log tiers against; the original tool hardcodes a
/// single-digit-millisecond target rather than exposing it as a flag.
const DEFAULT_TARGET_LATENCY: Latency = Latency::new(10_000_000, 10_000_000, 10_000_000);

pub struct ArchitectureBuilder<'a> {
    nodes: &'a [Node],
}

impl<'a> ArchitectureBuilder<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        ArchitectureBuilder { nodes }
    }

    /// Nodes no other node beats on network throughput, instance-storage
    /// capability, and price simultaneously; a dominated node can never
    /// improve on the cheapest feasible assembly and is dropped from the
    /// per-family search to keep the enumeration tractable.
    pub fn pareto_nodes(&self) -> Vec<Node> {
        Self::pareto_of(&self.nodes)
    }

    fn pareto_of(nodes: &[Node]) -> Vec<Node> {
        nodes
            .iter()
            .filter(|candidate| {
                !nodes.iter().any(|other| {
                    !std::ptr::eq(*candidate, other)
                        && other.network.get_read_limit() > candidate.network.get_read_limit()
                        && other.instance_storage.is_pareto_better(&candidate.instance_storage)
                        && other.price < candidate.price
                })
            })
            .cloned()
            .collect()
    }

    /// One node per instance class (the part of the name before the size
    /// suffix), keeping the largest (by vcpu count) of each class. Storage
    /// nodes are deduped this way before Pareto-filtering so that, say,
    /// `i3en.xlarge` and `i3en.24xlarge` don't both survive just because
    /// neither dominates the other on price.
    fn largest_per_instance_class(nodes: &[Node]) -> Vec<Node> {
        let mut by_class: std::collections::HashMap<&str, &Node> = std::collections::HashMap::new();
        for n in nodes {
            if !n.instance_storage.is_present() {
                continue;
            }
            by_class
                .entry(n.get_instance_type())
                .and_modify(|existing| {
                    if existing.cpu.count < n.cpu.count {
                        *existing = n;
                    }
                })
                .or_insert(n);
        }
        by_class.into_values().cloned().collect()
    }

    /// Storage-node candidates for families that front a page/log service
    /// with a dedicated EC2 fleet: one per instance class, Pareto-filtered
    /// on network/storage/price.
    fn storage_candidates(&self) -> Vec<Node> {
        Self::pareto_of(&Self::largest_per_instance_class(self.nodes))
    }

    /// Log-node candidates default to the storage Pareto set; when there is
    /// nothing to log, there is nothing to differentiate candidates on, so
    /// just take the single cheapest node in the catalog.
    fn log_candidates(&self, parameter: &Parameter) -> Vec<Node> {
        if parameter.required_update_ops == Rate::ZERO {
            self.nodes
                .iter()
                .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
                .cloned()
                .into_iter()
                .collect()
        } else {
            self.storage_candidates()
        }
    }

    /// Assembles every requested family and logs, per family, how many
    /// feasible architectures it produced.
    pub fn assemble(&self, parameter: &Parameter, requested: &[ArchType]) -> Vec<Architecture> {
        let mut results = Vec::new();
        for &arch_type in requested {
            let before = results.len();
            match arch_type {
                ArchType::Classic => self.assemble_classic(parameter, &mut results),
                ArchType::Hadr => self.assemble_hadr(parameter, &mut results),
                ArchType::RemoteBlockDevice => self.assemble_remote_block_device(parameter, &mut results),
                ArchType::InMemory => self.assemble_in_memory(parameter, &mut results),
                ArchType::AuroraLike => self.assemble_aurora_like(parameter, &mut results),
                ArchType::SocratesLike => self.assemble_socrates_like(parameter, &mut results),
                ArchType::Dynamic => self.assemble_dynamic(parameter, &mut results),
            }
            tracing::debug!(family = arch_type.name(), count = results.len() - before, "assembled architectures");
        }
        tracing::info!(total = results.len(), "finished assembling architectures");
        results
    }

    /// Classic, RemoteBlockDevice and InMemory have no secondaries to place;
    /// a workload that demands any skips them entirely rather than silently
    /// ignoring `min_secondaries`.
    fn assemble_classic(&self, parameter: &Parameter, out: &mut Vec<Architecture>) {
        if parameter.min_secondaries > 0 {
            return;
        }
        let mut zipf_cache = ZipfCache::new();
        for node in self.nodes {
            if let Some(a) = Classic::assemble(parameter, node, &mut zipf_cache) {
                out.push(Architecture::Classic(a));
            }
        }
    }

    fn assemble_hadr(&self, parameter: &Parameter, out: &mut Vec<Architecture>) {
        let mut zipf_cache = ZipfCache::new();
        let lo = parameter.min_secondaries.max(1);
        let hi = parameter.max_secondaries.max(lo);
        for node in self.nodes {
            for count in lo..=hi {
                let mut p = parameter.clone();
                p.num_secondaries = count;
                if let Some(a) = Hadr::assemble(&p, node, &mut zipf_cache) {
                    out.push(Architecture::Hadr(a));
                }
            }
        }
    }

    fn assemble_remote_block_device(&self, parameter: &Parameter, out: &mut Vec<Architecture>) {
        if parameter.min_secondaries > 0 {
            return;
        }
        let mut zipf_cache = ZipfCache::new();
        for node in self.nodes {
            for &ebs_type in &RBD_EBS_TYPES {
                if let Some(a) = RemoteBlockDevice::assemble(parameter, node, ebs_type, &mut zipf_cache) {
                    out.push(Architecture::RemoteBlockDevice(a));
                }
            }
        }
    }

    fn assemble_in_memory(&self, parameter: &Parameter, out: &mut Vec<Architecture>) {
        if parameter.min_secondaries > 0 {
            return;
        }
        let mut zipf_cache = ZipfCache::new();
        for node in self.nodes {
            if let Some(a) = InMemory::assemble(parameter, node, &mut zipf_cache) {
                out.push(Architecture::InMemory(a));
            }
        }
    }

    fn assemble_aurora_like(&self, parameter: &Parameter, out: &mut Vec<Architecture>) {
        let storage_candidates = self.storage_candidates();
        tracing::debug!(count = storage_candidates.len(), "aurora storage candidates");
        let mut zipf_cache = ZipfCache::new();
        let hi = parameter.max_secondaries.min(AuroraLike::MAX_SECONDARIES);
        for storage_node in &storage_candidates {
            for node in self.nodes {
                for count in parameter.min_secondaries..=hi {
                    let mut p = parameter.clone();
                    p.num_secondaries = count;
                    if let Some(a) = AuroraLike::assemble(&p, node, storage_node, DEFAULT_TARGET_LATENCY, &mut zipf_cache) {
                        out.push(Architecture::AuroraLike(a));
                    }
                }
            }
        }
    }

    fn assemble_socrates_like(&self, parameter: &Parameter, out: &mut Vec<Architecture>) {
        let page_candidates = self.storage_candidates();
        let log_candidates = self.log_candidates(parameter);
        tracing::debug!(pages = page_candidates.len(), logs = log_candidates.len(), "socrates page/log candidates");
        let mut zipf_cache = ZipfCache::new();
        for page_node in &page_candidates {
            for log_node in &log_candidates {
                for node in self.nodes {
                    if let Some(a) = SocratesLike::assemble(parameter, node, page_node, log_node, DEFAULT_TARGET_LATENCY, &mut zipf_cache) {
                        out.push(Architecture::SocratesLike(a));
                    }
                }
            }
        }
    }

    fn assemble_dynamic(&self, parameter: &Parameter, out: &mut Vec<Architecture>) {
        let page_nodes = self.storage_candidates();
        let log_nodes = self.log_candidates(parameter);
        let candidates = DynamicCandidates { ebs_types: &EBS_TYPES, page_nodes: &page_nodes, log_nodes: &log_nodes, target_latency: DEFAULT_TARGET_LATENCY };
        let mut zipf_cache = ZipfCache::new();
        for node in self.nodes {
            for a in Dynamic::assemble(parameter, node, &candidates, &mut zipf_cache) {
                out.push(Architecture::Dynamic(a));
            }
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

    /// `RemoteBlockDevice` must never reach `EbsType::Io2x` - that variant
    /// is only ever synthesized internally by `EBS::create_volume`'s `r5b`
    /// upgrade, and reserving it directly panics in `Primary::ebs_slot`.
    /// This exercises the full enumerator path (not just the device list
    /// constant) so a future regression would fail loudly here instead of
    /// only in an end-to-end run against a live catalog.
    #[test]
    fn remote_block_device_never_panics_on_io2x() {
        let node = test_node();
        let builder = ArchitectureBuilder::new(std::slice::from_ref(&node));
        let parameter = Parameter { dataset_size: 10 * cloudcalc_model::GIB, required_lookup_ops: Rate::secondly(1_000.0), ..Default::default() };
        let results = builder.assemble(&parameter, &[ArchType::RemoteBlockDevice]);
        assert!(!results.is_empty());
    }

    #[test]
    fn rbd_ebs_types_excludes_io2x() {
        assert!(!RBD_EBS_TYPES.contains(&cloudcalc_model::EbsType::Io2x));
        assert_eq!(RBD_EBS_TYPES.len(), 4);
    }
}
