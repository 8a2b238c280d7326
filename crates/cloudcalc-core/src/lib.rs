//! Shared scalar types for cloud deployment cost/feasibility modeling.
//!
//! Every quantity that flows through the solver (`Rate`, `Latency`, `Price`,
//! `Durability`, `FailoverTime`) is wrapped so that a CPU rate can never be
//! added to a network rate by accident, and so that latency algebra always
//! goes through the weighted-combination helpers instead of raw arithmetic.

pub mod error;
pub mod units;

pub use error::{CloudCalcError, CloudCalcResult};
pub use units::{
    is_machine_readable, set_machine_readable, set_timeunit_for_print, Durability, FailoverTime, Latency, Price,
    Rate, Timeunit,
};
