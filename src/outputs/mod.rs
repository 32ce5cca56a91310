//! Output stages: notification delivery and snapshot persistence.
//!
//! Both submodules are best-effort consumers of the finished run:
//!
//! - [`flex`]: builds the LINE flex briefing and pushes it to the single
//!   configured recipient
//! - [`snapshot`]: overwrites the latest-run JSON document read by the
//!   companion web view
//!
//! Failures in either stage are logged and absorbed; neither blocks the
//! other, and neither fails the run.

pub mod flex;
pub mod snapshot;
