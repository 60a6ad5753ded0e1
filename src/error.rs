//! Error taxonomy for the installation engine.
//!
//! Every variant maps to a stable negative status code (see
//! [`InstallerError::code`]) which the installer binary uses as its exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Why elevation was not obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The user answered "no" or did not answer in time.
    Declined,
    /// Reading the answer failed.
    PromptFailed,
    /// Quiet mode, or a platform where no prompt can be offered.
    NonInteractive,
}

/// What is wrong with the configured artifact source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceProblem {
    NotConfigured,
    OfflineInvalid,
}

/// Marker file written for non-system installations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Portable,
    User,
}

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("administrator / root privileges are required ({0:?})")]
    PrivilegeDenied(DenialReason),

    #[error("failed to relaunch with elevated privileges: {0}")]
    ElevationFailed(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("unsupported CPU architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("installation source unusable: {detail}")]
    SourceMissing {
        problem: SourceProblem,
        detail: String,
    },

    #[error("invalid download URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("network failure while downloading {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("authentication rejected by {url}: {reason}")]
    AuthFailure { url: String, reason: String },

    #[error("{url} is probably not a file (declared length: {declared:?} bytes)")]
    DownloadTooSmall { url: String, declared: Option<u64> },

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create {kind:?} installation files at {}: {reason}", path.display())]
    MarkerFile {
        kind: MarkerKind,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to generate {artifact}: {reason}")]
    ArtifactGeneration {
        artifact: &'static str,
        reason: String,
    },
}

impl InstallerError {
    /// Stable status code reported to the caller.
    pub fn code(&self) -> i32 {
        match self {
            Self::PrivilegeDenied(DenialReason::Declined) => -2,
            Self::PrivilegeDenied(DenialReason::PromptFailed) => -3,
            Self::PrivilegeDenied(DenialReason::NonInteractive) => -4,
            Self::SourceMissing {
                problem: SourceProblem::NotConfigured,
                ..
            } => -5,
            Self::ElevationFailed(_) => -6,
            Self::UnsupportedArchitecture(_) => -8,
            Self::UnsupportedPlatform(_) => -10,
            Self::SourceMissing {
                problem: SourceProblem::OfflineInvalid,
                ..
            } => -11,
            Self::DirectoryCreation { .. } => -12,
            Self::CopyFailure { .. } => -13,
            Self::MarkerFile {
                kind: MarkerKind::Portable,
                ..
            } => -14,
            Self::MarkerFile {
                kind: MarkerKind::User,
                ..
            } => -15,
            Self::NetworkFailure { .. } => -20,
            Self::InvalidUrl { .. } => -21,
            Self::AuthFailure { .. } => -22,
            Self::DownloadTooSmall { .. } => -23,
            Self::ArtifactGeneration { .. } => -30,
        }
    }

    pub(crate) fn directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreation {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn artifact(artifact: &'static str, reason: impl ToString) -> Self {
        Self::ArtifactGeneration {
            artifact,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_denials_have_distinct_codes() {
        let codes = [
            InstallerError::PrivilegeDenied(DenialReason::Declined).code(),
            InstallerError::PrivilegeDenied(DenialReason::PromptFailed).code(),
            InstallerError::PrivilegeDenied(DenialReason::NonInteractive).code(),
        ];
        assert_eq!(codes, [-2, -3, -4]);
    }

    #[test]
    fn marker_codes_depend_on_kind() {
        let portable = InstallerError::MarkerFile {
            kind: MarkerKind::Portable,
            path: PathBuf::from("/tmp/portable"),
            reason: "read-only".into(),
        };
        let user = InstallerError::MarkerFile {
            kind: MarkerKind::User,
            path: PathBuf::from("/tmp/userInstallation"),
            reason: "read-only".into(),
        };
        assert_eq!(portable.code(), -14);
        assert_eq!(user.code(), -15);
    }

    #[test]
    fn directory_error_mentions_path() {
        let err = InstallerError::directory(
            "/opt/app",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.code(), -12);
        assert!(err.to_string().contains("/opt/app"));
    }
}
