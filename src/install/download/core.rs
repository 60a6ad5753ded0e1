//! Artifact retrieval: authenticated HTTP download or validated local file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::{StatusCode, Url};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use super::progress::{ProgressSampler, progress_bar};
use crate::config::{ArtifactSource, Credentials, DownloadSpec};
use crate::error::{InstallerError, Result, SourceProblem};
use crate::install::platform::{ArchTag, OsType, download_tag};
use crate::install::prompt::Prompter;

/// Offline artifacts smaller than this are not the real thing.
pub const MIN_OFFLINE_BYTES: u64 = 1024 * 1024;
/// Downloads declaring less than this are probably an error page.
pub const MIN_DOWNLOAD_BYTES: u64 = 100 * 1024;

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);
const TEMP_PREFIX: &str = "Download-Installation";

/// One download, valid for the duration of `install()`.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub credentials: Option<Credentials>,
    pub prompt_for_credentials: bool,
    pub show_progress: bool,
    /// Extension of the staged temporary file, e.g. `.jar`.
    pub temp_suffix: String,
}

impl DownloadJob {
    /// Build the job for `spec`, appending `_<os>_<arch><ending>` to the URL
    /// for versioned downloads.
    pub fn new(spec: &DownloadSpec, os: OsType, arch: ArchTag, quiet: bool) -> Result<Self> {
        let url = match &spec.versioned_ending {
            Some(ending) => format!("{}_{}{ending}", spec.url, download_tag(os, arch)?),
            None => spec.url.clone(),
        };
        let temp_suffix = Path::new(url.rsplit('/').next().unwrap_or_default())
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_else(|| ".jar".to_string());
        Ok(Self {
            url,
            credentials: spec.credentials.clone(),
            prompt_for_credentials: spec.prompt_for_credentials && !quiet,
            show_progress: !quiet,
            temp_suffix,
        })
    }
}

/// Artifact ready to be copied into the application directory.
#[derive(Debug)]
pub enum StagedArtifact {
    /// Fresh temporary file, deleted when dropped.
    Downloaded(TempPath),
    /// Caller supplied file, left untouched.
    Local(PathBuf),
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        match self {
            Self::Downloaded(temp) => temp,
            Self::Local(path) => path,
        }
    }
}

/// Obtain the artifact described by `source`.
pub async fn fetch(
    source: &ArtifactSource,
    os: OsType,
    arch: ArchTag,
    quiet: bool,
    prompter: &dyn Prompter,
    auth_message: &str,
) -> Result<StagedArtifact> {
    match source {
        ArtifactSource::Offline(path) => validate_offline(path),
        ArtifactSource::Download(spec) => {
            let job = DownloadJob::new(spec, os, arch, quiet)?;
            download(&job, prompter, auth_message).await
        }
    }
}

/// Accept a local file only if it exists and is at least 1 MiB.
pub fn validate_offline(path: &Path) -> Result<StagedArtifact> {
    let invalid = |detail: String| InstallerError::SourceMissing {
        problem: SourceProblem::OfflineInvalid,
        detail,
    };
    let meta = std::fs::metadata(path)
        .map_err(|e| invalid(format!("{} is not readable: {e}", path.display())))?;
    if !meta.is_file() {
        return Err(invalid(format!("{} is not a file", path.display())));
    }
    if meta.len() < MIN_OFFLINE_BYTES {
        return Err(invalid(format!(
            "{} has only {} bytes, it is probably not the installation file",
            path.display(),
            meta.len()
        )));
    }
    info!("Installing from local file {}", path.display());
    Ok(StagedArtifact::Local(path.to_path_buf()))
}

/// Download `job.url` into a fresh temporary file.
pub async fn download(
    job: &DownloadJob,
    prompter: &dyn Prompter,
    auth_message: &str,
) -> Result<StagedArtifact> {
    let network = |reason: String| InstallerError::NetworkFailure {
        url: job.url.clone(),
        reason,
    };

    let url = Url::parse(&job.url).map_err(|e| InstallerError::InvalidUrl {
        url: job.url.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InstallerError::InvalidUrl {
            url: job.url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    let client = reqwest::Client::builder()
        .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
        .user_agent(concat!("app-installer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| network(format!("failed to build HTTP client: {e}")))?;

    let mut credentials = job.credentials.clone();
    let response = loop {
        let mut request = client.get(url.clone());
        if let Some(creds) = &credentials {
            request = request
                .basic_auth(&creds.username, Some(&creds.password))
                .header("X-Requested-With", "XMLHttpRequest");
        }
        let response = request.send().await.map_err(|e| network(e.to_string()))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            break response;
        }

        // configured credentials or a second challenge: no further retry
        if credentials.is_some() {
            return Err(InstallerError::AuthFailure {
                url: job.url.clone(),
                reason: "credentials were rejected".into(),
            });
        }
        if !job.prompt_for_credentials {
            return Err(InstallerError::AuthFailure {
                url: job.url.clone(),
                reason: "authentication required and prompting is disabled".into(),
            });
        }
        warn!("{} answered 401, asking for credentials", job.url);
        credentials = Some(prompter.credentials(&job.url, auth_message)?);
    };

    let status = response.status();
    if !status.is_success() {
        return Err(network(format!("server answered {status}")));
    }

    let declared = response.content_length();
    let total = match declared {
        Some(length) if length >= MIN_DOWNLOAD_BYTES => length,
        _ => {
            return Err(InstallerError::DownloadTooSmall {
                url: job.url.clone(),
                declared,
            });
        }
    };
    debug!("Downloading {total} bytes from {}", job.url);

    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&job.temp_suffix)
        .tempfile()
        .map_err(|e| network(format!("failed to create temporary file: {e}")))?;
    let (file, temp_path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let bar = progress_bar(total, job.show_progress);
    let sampler = ProgressSampler::spawn(temp_path.to_path_buf(), bar.clone());

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    loop {
        let chunk = match timeout(DOWNLOAD_INACTIVITY_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => return Err(network(e.to_string())),
            Ok(None) => break,
            Err(_) => {
                return Err(network(format!(
                    "no data received for {} seconds after {downloaded}/{total} bytes",
                    DOWNLOAD_INACTIVITY_TIMEOUT.as_secs()
                )));
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| network(format!("failed to write temporary file: {e}")))?;
        downloaded += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| network(format!("failed to flush temporary file: {e}")))?;
    drop(file);

    sampler.finish().await;
    bar.set_position(downloaded);
    bar.finish_and_clear();

    if downloaded < total {
        return Err(network(format!(
            "connection closed after {downloaded} of {total} bytes"
        )));
    }
    info!("Downloaded {downloaded} bytes to {}", temp_path.display());
    Ok(StagedArtifact::Downloaded(temp_path))
}
