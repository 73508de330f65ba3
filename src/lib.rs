//! Live process-table sampling core.
//!
//! A background worker re-enumerates OS processes on an interval, merges the
//! result into a pid-keyed registry, and publishes a consistent [`system::snapshot::Snapshot`]
//! that any number of consumer threads can check out, read, and deep-copy
//! without blocking the sampler for the full enumeration duration.

pub mod config;
pub mod format;
pub mod system;
pub mod tasks;
