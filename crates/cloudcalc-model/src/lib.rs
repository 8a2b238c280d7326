//! Hardware and workload data model: the instance catalog's `Node`, the
//! `Parameter` describing a workload's SLA, and the `Primary` node that
//! every architecture family builds around.

pub mod parameter;
pub mod primary;
pub mod resources;

pub use parameter::Parameter;
pub use primary::{Primary, Secondaries, ZipfCache};
pub use resources::{
    div_round_up, get_s3_storage_cost, Cpu, Ebs, EbsAllotment, EbsType, InstanceStorage,
    InstanceStorageAllotment, InstanceStorageType, MachineEbsLimits, Memory, Network, Node, S3,
    GIB, KIB, MIB, TIB,
};
