//! End-to-end installs against a local HTTP server.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use app_installer::config::{Credentials, DownloadSpec, InstallConfig};
use app_installer::error::Result;
use app_installer::install::{HostEnv, InstallOrchestrator, InstallStage, Prompter, native_platform};
use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::get;

/// base64 of `alice:secret`
const GOOD_AUTH: &str = "Basic YWxpY2U6c2VjcmV0";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Answers every credential request with fixed values and counts them.
struct FixedCredentials {
    username: &'static str,
    password: &'static str,
    asked: Arc<AtomicUsize>,
}

impl Prompter for FixedCredentials {
    fn confirm(&self, _question: &str, _timeout: Duration) -> std::io::Result<bool> {
        Ok(false)
    }

    fn credentials(&self, _url: &str, _message: &str) -> Result<Credentials> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(Credentials {
            username: self.username.into(),
            password: self.password.into(),
        })
    }
}

fn download_config(root: &Path, url: String, quiet: bool) -> InstallConfig {
    InstallConfig::builder("Acme", "1.0", "tool", "Acme Tool")
        .portable(root)
        .kill_running_instances(false)
        .quiet(quiet)
        .download(DownloadSpec {
            url,
            versioned_ending: None,
            credentials: None,
            prompt_for_credentials: true,
        })
        .build()
}

fn protected_payload(hits: Arc<AtomicUsize>, len: usize) -> Router {
    Router::new().route(
        "/tool.jar",
        get(move |headers: HeaderMap| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let authorized = headers
                    .get(header::AUTHORIZATION)
                    .is_some_and(|value| value == GOOD_AUTH);
                if authorized {
                    (StatusCode::OK, vec![0x5a; len])
                } else {
                    (StatusCode::UNAUTHORIZED, Vec::new())
                }
            }
        }),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_fail_without_installing() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(protected_payload(hits.clone(), 200 * 1024)).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("stick");
    let asked = Arc::new(AtomicUsize::new(0));

    let mut orchestrator = InstallOrchestrator::new(
        download_config(&root, format!("{base}/tool.jar"), false),
        HostEnv::capture(),
        native_platform(),
    )
    .with_prompter(Box::new(FixedCredentials {
        username: "alice",
        password: "wrong",
        asked: asked.clone(),
    }))
    .with_relaunch_args(Vec::new());

    let outcome = orchestrator.install().await;
    assert_eq!(outcome.code(), -22);
    assert_eq!(orchestrator.stage(), InstallStage::Failed(-22));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert!(!root.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn tiny_download_is_rejected_before_transfer() {
    let router = Router::new().route("/tool.jar", get(|| async { vec![1u8; 10 * 1024] }));
    let base = serve(router).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("stick");

    let mut orchestrator = InstallOrchestrator::new(
        download_config(&root, format!("{base}/tool.jar"), true),
        HostEnv::capture(),
        native_platform(),
    )
    .with_relaunch_args(Vec::new());

    assert_eq!(orchestrator.install().await.code(), -23);
    assert!(!root.join("Programm").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_network_failures() {
    let router = Router::new().route(
        "/tool.jar",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = serve(router).await;
    let dir = tempfile::tempdir().unwrap();

    let mut orchestrator = InstallOrchestrator::new(
        download_config(&dir.path().join("stick"), format!("{base}/tool.jar"), true),
        HostEnv::capture(),
        native_platform(),
    )
    .with_relaunch_args(Vec::new());

    assert_eq!(orchestrator.install().await.code(), -20);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_file_below_one_mebibyte_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("tool.jar");
    std::fs::write(&source, vec![0u8; 512 * 1024]).unwrap();
    let root = dir.path().join("stick");

    let config = InstallConfig::builder("Acme", "1.0", "tool", "Acme Tool")
        .portable(&root)
        .offline(&source)
        .kill_running_instances(false)
        .quiet(true)
        .build();
    let mut orchestrator = InstallOrchestrator::new(config, HostEnv::capture(), native_platform())
        .with_relaunch_args(Vec::new());

    assert_eq!(orchestrator.install().await.code(), -11);
    assert!(!root.join("Programm").join("tool.jar").exists());
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread")]
async fn portable_download_after_credential_prompt() {
    use std::os::unix::fs::PermissionsExt;

    use app_installer::install::linux::{LinuxLayout, LinuxPlatform};

    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(protected_payload(hits.clone(), 200 * 1024)).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("stick");
    let asked = Arc::new(AtomicUsize::new(0));
    let platform = LinuxPlatform::with_layout(LinuxLayout::rooted_at(&dir.path().join("sys")));

    let mut orchestrator = InstallOrchestrator::new(
        download_config(&root, format!("{base}/tool.jar"), false),
        HostEnv::capture(),
        Box::new(platform),
    )
    .with_prompter(Box::new(FixedCredentials {
        username: "alice",
        password: "secret",
        asked: asked.clone(),
    }))
    .with_relaunch_args(Vec::new());

    let outcome = orchestrator.install().await;
    assert_eq!(outcome.code(), 0, "{outcome:?}");
    assert_eq!(orchestrator.stage(), InstallStage::Done);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(asked.load(Ordering::SeqCst), 1);

    let artifact = root.join("Programm/tool.jar");
    assert_eq!(std::fs::metadata(&artifact).unwrap().len(), 200 * 1024);
    assert!(root.join("Programm/portable").is_file());
    assert!(root.join("Appdata").is_dir());
    let launcher = std::fs::metadata(root.join("tool")).unwrap();
    assert_ne!(launcher.permissions().mode() & 0o111, 0);
    assert!(!dir.path().join("sys").exists());
}
