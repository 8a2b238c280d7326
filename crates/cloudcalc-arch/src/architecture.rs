//! The architecture base: shared pricing/network math every family composes
//! on top of, plus the small numeric helpers the per-family solvers lean on.

use cloudcalc_core::{Durability, FailoverTime, Latency, Price, Rate};
use cloudcalc_model::{get_s3_storage_cost, Network, Parameter, Primary, Secondaries, S3};

use crate::log_service::LogService;
use crate::page_service::PageService;

/// The seven deployable architecture families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchType {
    Classic,
    Hadr,
    RemoteBlockDevice,
    InMemory,
    AuroraLike,
    SocratesLike,
    Dynamic,
}

impl ArchType {
    pub fn name(self) -> &'static str {
        match self {
            ArchType::Classic => "classic",
            ArchType::Hadr => "hadr",
            ArchType::RemoteBlockDevice => "rbd",
            ArchType::InMemory => "inmem",
            ArchType::AuroraLike => "aurora",
            ArchType::SocratesLike => "socrates",
            ArchType::Dynamic => "dynamic",
        }
    }

    pub fn all() -> [ArchType; 7] {
        [
            ArchType::Classic,
            ArchType::RemoteBlockDevice,
            ArchType::AuroraLike,
            ArchType::InMemory,
            ArchType::Hadr,
            ArchType::SocratesLike,
            ArchType::Dynamic,
        ]
    }

    pub fn from_name(name: &str) -> Option<ArchType> {
        ArchType::all().into_iter().find(|a| a.name() == name)
    }
}

/// Operations every family implements directly; `Architecture` builds the
/// shared pricing/lookup math on top of these.
pub trait ArchitectureOps {
    fn parameter(&self) -> &Parameter;
    fn primary(&self) -> &Primary;
    fn secondaries(&self) -> &Secondaries;
    fn page_service(&self) -> &PageService;
    fn log_service(&self) -> &LogService;
    fn op_latency(&self) -> Latency;
    fn commit_latency(&self) -> Latency;
    fn durability(&self) -> Durability;

    fn failover_time(&self) -> FailoverTime {
        FailoverTime::new(999_990.0)
    }
    fn s3_storage(&self) -> u64 {
        0
    }
    fn inter_az_traffic(&self) -> u64 {
        0
    }
    fn s3_get_rate(&self) -> Rate {
        Rate::ZERO
    }
    fn s3_put_rate(&self) -> Rate {
        Rate::ZERO
    }
    fn primary_random_lookup_tx(&self) -> Rate;
    fn secondaries_random_lookup_tx(&self) -> Rate {
        Rate::ZERO
    }
    fn random_update_tx(&self) -> Rate;
}

/// A fully assembled, feasible architecture: a deployable combination of a
/// primary, its secondaries, a page service and a log service, plus the
/// derived latency figures the enumerator computed when it sized the thing.
pub enum Architecture {
    Classic(crate::families::classic::Classic),
    Hadr(crate::families::hadr::Hadr),
    RemoteBlockDevice(crate::families::remote_block_device::RemoteBlockDevice),
    InMemory(crate::families::in_memory::InMemory),
    AuroraLike(crate::families::aurora_like::AuroraLike),
    SocratesLike(crate::families::socrates_like::SocratesLike),
    Dynamic(crate::families::dynamic::Dynamic),
}

macro_rules! dispatch {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            Architecture::Classic(a) => a.$method($($arg),*),
            Architecture::Hadr(a) => a.$method($($arg),*),
            Architecture::RemoteBlockDevice(a) => a.$method($($arg),*),
            Architecture::InMemory(a) => a.$method($($arg),*),
            Architecture::AuroraLike(a) => a.$method($($arg),*),
            Architecture::SocratesLike(a) => a.$method($($arg),*),
            Architecture::Dynamic(a) => a.$method($($arg),*),
        }
    };
}

impl Architecture {
    pub fn arch_type(&self) -> ArchType {
        match self {
            Architecture::Classic(_) => ArchType::Classic,
            Architecture::Hadr(_) => ArchType::Hadr,
            Architecture::RemoteBlockDevice(_) => ArchType::RemoteBlockDevice,
            Architecture::InMemory(_) => ArchType::InMemory,
            Architecture::AuroraLike(_) => ArchType::AuroraLike,
            Architecture::SocratesLike(_) => ArchType::SocratesLike,
            Architecture::Dynamic(_) => ArchType::Dynamic,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.arch_type().name()
    }

    pub fn parameter(&self) -> &Parameter {
        dispatch!(self, parameter)
    }
    pub fn primary(&self) -> &Primary {
        dispatch!(self, primary)
    }
    pub fn secondaries(&self) -> &Secondaries {
        dispatch!(self, secondaries)
    }
    pub fn page_service(&self) -> &PageService {
        dispatch!(self, page_service)
    }
    pub fn log_service(&self) -> &LogService {
        dispatch!(self, log_service)
    }
    pub fn op_latency(&self) -> Latency {
        dispatch!(self, op_latency)
    }
    pub fn commit_latency(&self) -> Latency {
        dispatch!(self, commit_latency)
    }
    pub fn durability(&self) -> Durability {
        dispatch!(self, durability)
    }
    pub fn failover_time(&self) -> FailoverTime {
        dispatch!(self, failover_time)
    }
    pub fn s3_storage(&self) -> u64 {
        dispatch!(self, s3_storage)
    }
    pub fn inter_az_traffic(&self) -> u64 {
        dispatch!(self, inter_az_traffic)
    }
    pub fn s3_get_rate(&self) -> Rate {
        dispatch!(self, s3_get_rate)
    }
    pub fn s3_put_rate(&self) -> Rate {
        dispatch!(self, s3_put_rate)
    }
    pub fn primary_random_lookup_tx(&self) -> Rate {
        dispatch!(self, primary_random_lookup_tx)
    }
    pub fn secondaries_random_lookup_tx(&self) -> Rate {
        dispatch!(self, secondaries_random_lookup_tx)
    }
    pub fn random_update_tx(&self) -> Rate {
        dispatch!(self, random_update_tx)
    }

    pub fn random_lookup_tx(&self) -> Rate {
        self.primary_random_lookup_tx() + self.secondaries_random_lookup_tx()
    }

    pub fn s3_price(&self) -> Price {
        get_s3_storage_cost(self.s3_storage()) + S3::GET_PRICE * self.s3_get_rate() + S3::PUT_PRICE * self.s3_put_rate()
    }

    pub fn network_price(&self) -> Price {
        (self.inter_az_traffic() as f64 / cloudcalc_model::GIB as f64) * Network::INTER_AZ_COST
    }

    /// The full deployment cost: primary, its EBS volumes, secondaries (each
    /// sharing the primary's EBS devices), the page/log services, and
    /// inter-AZ network and S3 spend.
    pub fn total_price(&self) -> Price {
        let mut price = self.primary().get_price();
        price += self.primary().get_ebs_price();
        price += self.secondaries().get_price();
        price += self.secondaries().get_count() as u64 * self.primary().get_ebs_price();
        price += self.page_service().get_price();
        if !self.page_service().contains_log_service() {
            price += self.log_service().get_price();
        }
        price += self.network_price();
        price += self.s3_price();
        price
    }
}

// =============================================================================
// Shared numeric helpers every family's two-phase solver relies on.
// =============================================================================

/// Smallest of several rates; `Rate::UNLIMITED` is the identity.
pub(crate) fn rate_min(values: &[Rate]) -> Rate {
    values.iter().copied().fold(Rate::UNLIMITED, |acc, v| if v < acc { v } else { acc })
}

/// `nextafter(max(values), +inf)`: the scale factor a resource axis demands,
/// nudged just past the computed value so later floating-point comparisons
/// against it (`scale > 1.0`) don't misfire on an exact tie.
pub(crate) fn vmaxafter(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max).next_up()
}

/// Round-trip latency between the primary and a replica, weighted by how
/// much of the fleet sits in the same AZ versus a remote one.
pub(crate) fn network_latency(p: &Parameter) -> Latency {
    Latency::combine(&[
        (p.get_same_az_ratio(), Latency::from_millis(p.intra_az_latency)),
        (p.get_remote_az_ratio(), Latency::from_millis(p.inter_az_latency)),
    ])
}

pub(crate) fn same_region_latency(p: &Parameter) -> Latency {
    Latency::from_millis(p.inter_az_latency)
}

pub(crate) fn same_datacenter_latency(p: &Parameter) -> Latency {
    Latency::from_millis(p.intra_az_latency)
}

/// Fraction of `total` a page/storage node fraction still holds in cache,
/// used identically by `Ec2PageService` and `CombinedPageServiceLog`.
pub(crate) fn cache_miss_for_fraction(data_size: u64, cache_bytes: f64, fraction: f64) -> f64 {
    let data_size = data_size as f64;
    let in_cache = (fraction * cache_bytes).min(data_size);
    let miss = (data_size - in_cache) / data_size;
    debug_assert!((0.0..=1.0).contains(&miss), "cache miss out of range: {miss}");
    miss
}
