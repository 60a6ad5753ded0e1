//! Periodic download progress sampling.
//!
//! The transfer loop never reports progress itself. A separate task samples
//! the size of the partially written file and feeds the progress bar.

use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) const SAMPLE_DELAY: Duration = Duration::from_millis(200);
pub(crate) const SAMPLE_PERIOD: Duration = Duration::from_millis(450);

/// Progress bar for a transfer of `total` bytes. Hidden in quiet mode.
pub(crate) fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        let bar = ProgressBar::hidden();
        bar.set_length(total);
        return bar;
    }
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "Downloading file: {percent:>3}% [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar
}

/// Background task sampling the size of `path`. Cancelled on drop.
pub(crate) struct ProgressSampler {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressSampler {
    pub(crate) fn spawn(path: PathBuf, bar: ProgressBar) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => return,
                _ = tokio::time::sleep(SAMPLE_DELAY) => {}
            }
            let mut ticker = tokio::time::interval(SAMPLE_PERIOD);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Ok(meta) = tokio::fs::metadata(&path).await {
                            let total = bar.length().unwrap_or(u64::MAX);
                            bar.set_position(meta.len().min(total));
                        }
                    }
                }
            }
        });
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Stop sampling and wait for the task to exit.
    pub(crate) async fn finish(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressSampler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
