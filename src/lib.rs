//! Uniform-ish sampling from convex polytopes `{x : A_in·x ≤ b_in, A_eq·x = b_eq}` with
//! batched hit-and-run chains on `burn` backends.
//!
//! Start with [`Polytope`] and [`Walk`], or the one-shot [`walk()`] function.

mod backend;
mod direction;
pub mod error;
pub mod initial_points;
pub mod io;
pub mod placement;
pub mod polytope;
pub mod progress;
pub mod ratio;
pub mod schedule;
pub mod walk;

pub use error::{ConfigurationError, Error, Result};
pub use placement::{ComputeTarget, Placement, Precision};
pub use polytope::Polytope;
pub use walk::{walk, Walk};
