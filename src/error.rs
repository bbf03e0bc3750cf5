//! Error types shared by every stage of a walk.

use thiserror::Error;

use crate::placement::{ComputeTarget, Precision};

/// Problems with how a walk or a polytope was configured.
///
/// All of these are detected before the first step is taken.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown compute target {0:?}, expected one of cpu, host, cuda, gpu, wgpu, accelerator")]
    InvalidTarget(String),
    #[error("unknown numeric precision {0:?}, expected 16, 32 or 64 bits")]
    InvalidPrecision(String),
    #[error("{precision} precision is not supported on the {target} target")]
    UnsupportedPlacement {
        precision: Precision,
        target: ComputeTarget,
    },
    #[error("the {0} target is not available, rebuild with the `wgpu` feature")]
    TargetUnavailable(ComputeTarget),
    #[error("initial points live in dimension {found}, the polytope in dimension {expected}")]
    AmbientDimension { expected: usize, found: usize },
    #[error("draws were bound to {sampler} but the polytope is stored as {storage}")]
    PlacementMismatch { sampler: String, storage: String },
    #[error("the number of parallel chains must be at least 1")]
    NoChains,
    #[error("the thinning factor must be at least 1")]
    ZeroThinning,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Row/column counts of the constraint matrices disagree.
    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A point matrix has the wrong shape for the polytope.
    #[error("invalid shape for {what}: expected {expected} rows, found {found}")]
    InvalidShape {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// The equality system pins the polytope to a single point.
    #[error("equality constraints have rank {rank} in dimension {n}, no direction is left to move in")]
    DegenerateEquality { rank: usize, n: usize },
    /// Clamped chord bounds no longer describe a valid interval.
    #[error(
        "step bounds left the representable range at iteration {iteration}, chain {chain}: \
         lower {lower}, upper {upper}"
    )]
    RangeExhaustion {
        iteration: usize,
        chain: usize,
        lower: f64,
        upper: f64,
    },
    /// A chain position overflowed or became NaN.
    #[error("chain {chain} left the representable range at iteration {iteration}")]
    NonFinitePosition { iteration: usize, chain: usize },
    /// Reading tensors back from the compute target failed.
    #[error("failed to read data back from the compute target: {0}")]
    Transfer(String),
}

pub type Result<T> = std::result::Result<T, Error>;
