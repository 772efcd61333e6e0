//! Service layer for hostvault
//!
//! The service layer sequences the external clients (snapshot store,
//! container runtime, file sync) into the backup and restore operations,
//! with the disk-space preflight in front of both.

pub mod backup;
pub mod restore;
pub mod space;

pub use backup::BackupOrchestrator;
pub use restore::RestoreOrchestrator;
pub use space::{SpaceCheck, SpaceEstimator};
