//! Artifact retrieval
//!
//! ## Module Organization
//!
//! - `core` - offline validation, authenticated HTTP download, staging
//! - `progress` - periodic sampling of the partially written file

mod core;
mod progress;

pub use core::{
    DownloadJob, MIN_DOWNLOAD_BYTES, MIN_OFFLINE_BYTES, StagedArtifact, download, fetch,
    validate_offline,
};
