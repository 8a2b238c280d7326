//! The seven deployable architecture families and the enumerator that
//! builds every feasible combination of them over an instance catalog.

pub mod architecture;
pub mod builder;
pub mod families;
pub mod log_service;
pub mod page_service;

pub use architecture::{ArchType, Architecture, ArchitectureOps};
pub use builder::ArchitectureBuilder;
pub use log_service::LogService;
pub use page_service::PageService;
