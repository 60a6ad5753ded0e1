mod cli;

use anyhow::Result;
use app_installer::config::{InstallConfig, InstallManifest};
use app_installer::install::{HostEnv, InstallOrchestrator, native_platform};
use clap::Parser;
use log::error;

fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(level)
        .init();
}

fn load_config(args: &cli::Args) -> Result<InstallConfig> {
    let mut builder = InstallManifest::load(&args.config)?
        .into_builder()
        .quiet(args.quiet)
        .debug(args.debug);
    if let Some(root) = &args.portable {
        builder = builder.portable(root);
    }
    if args.user {
        builder = builder.user_installation(true);
    }
    if let Some(file) = &args.offline {
        builder = builder.offline(file);
    }
    if args.no_kill {
        builder = builder.kill_running_instances(false);
    }
    Ok(builder.build())
}

fn main() {
    let args = cli::Args::parse();
    init_logging(args.debug);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let mut orchestrator = InstallOrchestrator::new(config, HostEnv::capture(), native_platform())
        .with_relaunch_args(args.relaunch_args());
    let outcome = rt.block_on(orchestrator.install());
    std::process::exit(outcome.code());
}
