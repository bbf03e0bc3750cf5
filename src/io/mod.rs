//! Writing collected samples to disk.

#[cfg(feature = "csv")]
pub mod csv;
