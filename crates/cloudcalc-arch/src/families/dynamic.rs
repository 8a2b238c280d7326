//! Dynamic: page service and log service are chosen independently of each
//! other and of any fixed family shape, crossed with the secondary-replica
//! count and whether the primary itself runs a buffer-pool extension. Every
//! other family fixes page/log placement together; this one is the
//! combinatorial search over all of it, and - unlike the other families,
//! which each produce at most one architecture per candidate node - yields
//! one architecture per surviving combination, exactly like every other
//! family's contribution to the enumerator.

use cloudcalc_core::{Durability, Latency, Rate};
use cloudcalc_model::{EbsType, Node, Parameter, Primary, Secondaries, ZipfCache};

use crate::architecture::{rate_min, ArchitectureOps};
use crate::families::aurora_like::AuroraLike;
use crate::log_service::{Ec2LogService, EbsLogService, InstanceStorageLogService, LogService};
use crate::page_service::{CombinedPageServiceLog, Ec2PageService, EbsPageService, InMemoryPageService, InstanceStoragePageService, PageService};

#[derive(Debug, Clone)]
pub struct Dynamic {
    primary: Primary,
    secondaries: Secondaries,
    page_service: PageService,
    log_service: LogService,
    lookups: Rate,
    sec_lookups: Rate,
    updates: Rate,
}

/// The candidate fleets the enumerator offers `Dynamic` to mix and match.
pub struct DynamicCandidates<'a> {
    pub ebs_types: &'a [EbsType],
    pub page_nodes: &'a [Node],
    pub log_nodes: &'a [Node],
    pub target_latency: Latency,
}

/// A page-service candidate paired with the WAL shape it needs (dirty-page
/// eviction needs undo records; a tier that never evicts dirty pages itself
/// doesn't).
type PageBuild<'a> = (bool, Box<dyn Fn(&Parameter, &mut Primary) -> Option<(PageService, Rate)> + 'a>);
type LogBuild<'a> = Box<dyn Fn(&Parameter, &mut Primary) -> Option<(LogService, Rate)> + 'a>;

/// io2x is only ever reached via `Ebs::create_volume`'s r5b auto-upgrade, so
/// it's filtered out of whatever EBS family list the caller hands in here.
fn device_backed_ebs_types(candidates: &DynamicCandidates) -> Vec<EbsType> {
    candidates.ebs_types.iter().copied().filter(|t| *t != EbsType::Io2x).collect()
}

impl Dynamic {
    pub fn assemble(parameter: &Parameter, node: &Node, candidates: &DynamicCandidates, zipf_cache: &mut ZipfCache) -> Vec<Dynamic> {
        let mut out = Vec::new();
        let lo = parameter.min_secondaries;
        let hi = parameter.max_secondaries.max(lo);
        for num_secondaries in lo..=hi {
            for primary_rbpex in [true, false] {
                let mut p = parameter.clone();
                p.num_secondaries = num_secondaries;
                if let Some(base_primary) = Primary::assemble(&p, node, primary_rbpex, zipf_cache) {
                    Self::generate(&p, node, &base_primary, candidates, &mut out);
                }
            }
        }
        out
    }

    fn page_builds<'a>(candidates: &'a DynamicCandidates<'a>) -> Vec<PageBuild<'a>> {
        let mut builds: Vec<PageBuild<'a>> = Vec::new();

        builds.push((
            false,
            Box::new(|p: &Parameter, primary: &mut Primary| {
                InMemoryPageService::assemble(p, primary).map(|s| (PageService::InMemory(s), Rate::UNLIMITED))
            }),
        ));

        builds.push((
            true,
            Box::new(|p: &Parameter, primary: &mut Primary| {
                InstanceStoragePageService::assemble(p, primary).map(|s| {
                    let reads = s.storage.reads;
                    (PageService::InstanceStorage(s), reads)
                })
            }),
        ));

        for t in device_backed_ebs_types(candidates) {
            builds.push((
                true,
                Box::new(move |p: &Parameter, primary: &mut Primary| {
                    EbsPageService::assemble(p, primary, t).map(|s| {
                        let reads = s.ebs.iops;
                        (PageService::Ebs(s), reads)
                    })
                }),
            ));
        }

        for page_node in candidates.page_nodes {
            for use_rbpex in [true, false] {
                builds.push((
                    false,
                    Box::new(move |p: &Parameter, primary: &mut Primary| {
                        let s = Ec2PageService::assemble(p, primary, page_node, candidates.target_latency, p.page_server_replication, use_rbpex);
                        if s.fraction > 1.0 {
                            None
                        } else {
                            let reads = s.get_page_read_ops();
                            Some((PageService::Ec2(s), reads))
                        }
                    }),
                ));
            }
        }

        builds
    }

    fn log_builds<'a>(candidates: &'a DynamicCandidates<'a>) -> Vec<LogBuild<'a>> {
        let mut builds: Vec<LogBuild<'a>> = Vec::new();

        builds.push(Box::new(|p: &Parameter, primary: &mut Primary| {
            InstanceStorageLogService::assemble(p, primary).map(|s| {
                let ops = s.get_update_ops();
                (LogService::InstanceStorage(s), ops)
            })
        }));

        for t in device_backed_ebs_types(candidates) {
            builds.push(Box::new(move |p: &Parameter, primary: &mut Primary| {
                EbsLogService::assemble(p, primary, t).map(|s| {
                    let ops = s.get_update_ops();
                    (LogService::Ebs(s), ops)
                })
            }));
        }

        for log_node in candidates.log_nodes {
            builds.push(Box::new(move |p: &Parameter, primary: &mut Primary| {
                Ec2LogService::assemble(p, primary, log_node, p.log_service_replication as u32).map(|s| {
                    let ops = s.get_update_ops();
                    (LogService::Ec2(s), ops)
                })
            }));
        }

        builds
    }

    /// Crosses every page-service shape against every log-service shape
    /// (each combination gets its own fresh clone of `base_primary`, since
    /// resource reservation is mutating), then separately adds the
    /// Aurora-style combined-storage shape, which satisfies both contracts
    /// off a single reservation and so never crosses with a log candidate.
    fn generate(p: &Parameter, node: &Node, base_primary: &Primary, candidates: &DynamicCandidates, out: &mut Vec<Dynamic>) {
        let page_builds = Self::page_builds(candidates);
        let log_builds = Self::log_builds(candidates);

        for (wal_undo, page_build) in &page_builds {
            for log_build in &log_builds {
                let mut pp = p.clone();
                pp.wal_includes_undo = *wal_undo;
                let mut primary = base_primary.clone();

                let Some((page_service, page_read_limit)) = page_build(&pp, &mut primary) else { continue };
                let Some((log_service, update_limit)) = log_build(&pp, &mut primary) else { continue };

                if let Some(arch) = Self::finish(node, primary, page_service, log_service, page_read_limit, update_limit) {
                    out.push(arch);
                }
            }
        }

        for storage_node in candidates.page_nodes {
            let mut pp = p.clone();
            pp.wal_includes_undo = false;
            let mut primary = base_primary.clone();
            let storage = CombinedPageServiceLog::assemble(
                &pp,
                &primary,
                storage_node,
                candidates.target_latency,
                AuroraLike::DATA_REPLICATION,
                AuroraLike::LOG_REPLICATION,
            );
            let update_limit = storage.get_update_ops();
            let page_read_limit = storage.get_page_read_ops();
            primary.log_volume = (pp.required_update_ops.value() * pp.get_log_record_size() as f64) as u64;
            let page_service = PageService::Combined(storage);
            let log_service = page_service.as_log_service().expect("combined page service always yields a log service view");
            if let Some(arch) = Self::finish(node, primary, page_service, log_service, page_read_limit, update_limit) {
                out.push(arch);
            }
        }
    }

    fn finish(
        node: &Node,
        primary: Primary,
        page_service: PageService,
        log_service: LogService,
        page_read_limit: Rate,
        update_limit: Rate,
    ) -> Option<Dynamic> {
        let p = primary.parameter.clone();
        let secondaries = Secondaries::new(p.num_secondaries, node.clone());

        let cpu_updates = primary.get_cache_hit_ops(Rate::ZERO);
        let updates = rate_min(&[cpu_updates, update_limit, p.required_update_ops]);

        let cpu_lookups = primary.get_cache_hit_ops(updates);
        let lookups = rate_min(&[cpu_lookups, page_read_limit, p.required_lookup_ops]);
        let sec_lookups = rate_min(&[lookups * secondaries.available_for_lookups() as f64, p.required_lookup_ops - lookups]);

        Some(Dynamic { primary, secondaries, page_service, log_service, lookups, sec_lookups, updates })
    }
}

impl ArchitectureOps for Dynamic {
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
        Latency::combine(&[
            (self.primary.prob_cache_miss(), self.page_service.get_op_latency()),
            (self.primary.prob_cache_hit(), self.primary.get_cache_hit_latency()),
        ])
    }
    fn commit_latency(&self) -> Latency {
        self.log_service.get_commit_latency()
    }
    fn durability(&self) -> Durability {
        self.log_service.get_durability()
    }

    // No single failover story fits every page/log combination this family
    // can assemble; the original never overrides it either, so this falls
    // through to `ArchitectureOps::failover_time`'s sentinel default.

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
    use cloudcalc_model::resources::{Cpu, InstanceStorage, InstanceStorageType, MachineEbsLimits, Memory, Network};
    use cloudcalc_core::{Price, Rate};

    fn test_node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            cpu: Cpu { count: 4, speed: 3.1e9, vendor: "intel".to_string() },
            memory: Memory { size: 16 * cloudcalc_model::GIB },
            network: Network { speed: 10, burst_speed: 10, devices: 1, up_to: false },
            price: Price::hourly(0.192),
            instance_storage: InstanceStorage {
                storage_type: InstanceStorageType::NVMe,
                size: 100 * cloudcalc_model::GIB,
                devices: 1.0,
                read_ops: 100_000,
                write_ops: 50_000,
            },
            machine_ebs: MachineEbsLimits {
                base_iops: Rate::secondly(6000.0),
                burst_iops: Rate::secondly(6000.0),
                base_throughput: 250.0 * cloudcalc_model::MIB as f64,
                burst_throughput: 250.0 * cloudcalc_model::MIB as f64,
            },
        }
    }

    #[test]
    fn dynamic_explores_secondaries_and_rbpex_dimensions() {
        let parameter = Parameter {
            dataset_size: cloudcalc_model::GIB,
            required_lookup_ops: Rate::secondly(100.0),
            required_update_ops: Rate::secondly(10.0),
            min_secondaries: 0,
            max_secondaries: 1,
            ..Default::default()
        };
        let node = test_node("m5.xlarge");
        let ebs_types = [EbsType::Gp3];
        let page_nodes = [test_node("i3en.24xlarge")];
        let log_nodes = [test_node("i3en.24xlarge")];
        let candidates = DynamicCandidates {
            ebs_types: &ebs_types,
            page_nodes: &page_nodes,
            log_nodes: &log_nodes,
            target_latency: Latency::new(10_000_000, 10_000_000, 10_000_000),
        };
        let mut zipf_cache = ZipfCache::new();
        let results = Dynamic::assemble(&parameter, &node, &candidates, &mut zipf_cache);
        assert!(!results.is_empty());
        assert!(results.iter().any(|a| a.secondaries.get_count() == 0));
    }
}
