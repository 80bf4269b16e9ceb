mod logging;
mod platform;
mod updater;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use minorgate_shared::config::{self, GateConfig};
use minorgate_shared::{GateState, HttpFetcher, JsonPrefs, RuntimeContext, UpdateGate};

#[derive(Debug, Parser)]
#[command(
    name = "minorgate",
    version,
    about = "Only lets same-major updates through the host's automatic updater"
)]
struct Args {
    /// Run a single check after startup and exit
    #[arg(long)]
    once: bool,
    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = match config::load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&cfg.log_level);
    tracing::debug!("Loaded config from {}", config_path.display());

    // One event loop: triggers, downloads and cache invalidation share it.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cfg, args.once));
    ExitCode::SUCCESS
}

async fn run(cfg: GateConfig, once: bool) {
    let platform = platform::current();
    let context = RuntimeContext::detect(&cfg, platform.as_ref());
    let timing = cfg.timing();
    tracing::info!(
        "Gating updates for {} {} on {}",
        context.product,
        context.version,
        context.build_target()
    );

    let gate = UpdateGate::new(
        &cfg,
        context,
        Arc::new(HttpFetcher::new(timing.fetch_timeout)),
        Arc::new(JsonPrefs::in_profile(&cfg.profile_dir())),
        Arc::new(updater::HostUpdater::from_config(&cfg)),
    );

    gate.on_profile_ready().await;

    if once {
        gate.on_check_start().await;
        wait_until_idle(&gate, timing.invalidate_delay + Duration::from_secs(1)).await;
        return;
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(cfg.check_interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }
        tokio::select! {
            _ = gate.on_check_start() => {}
            _ = &mut shutdown => break,
        }
    }
    tracing::info!("Shutting down");
}

/// Lets the deferred cache invalidation finish before the runtime stops.
async fn wait_until_idle(gate: &UpdateGate, limit: Duration) {
    let idle = async {
        while gate.state() != GateState::Idle {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    if tokio::time::timeout(limit, idle).await.is_err() {
        tracing::warn!("Cached descriptor cleanup did not finish before exit");
    }
}
