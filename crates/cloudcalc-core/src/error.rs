use thiserror::Error;

/// Failures that can surface while building and ranking architectures.
///
/// Infeasibility of a single architecture is not an error - the solver
/// represents that as `None` from an `assemble` call. This enum is reserved
/// for malformed input (bad CLI flags, a catalog row missing a required
/// column) and internal invariant violations that a `debug_assert!` alone
/// can't surface to a CLI user (e.g. derived from untrusted catalog data).
#[derive(Debug, Error)]
pub enum CloudCalcError {
    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type CloudCalcResult<T> = Result<T, CloudCalcError>;
