//! songgen-daemon: song generation task service and GPU job worker.
//!
//! Subcommands:
//! - `worker`: run the GPU job worker
//! - `serve`: run the task service and background orchestrator
//! - `generate`: run one job on a worker and save the audio locally

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::Router;
use tracing::{info, warn};

use songgen_daemon::api::{self, AppState};
use songgen_daemon::cli::{output_format, Cli, Command};
use songgen_daemon::client::RemoteJobClient;
use songgen_daemon::config::{default_data_dir, ServiceConfig, WorkerConfig};
use songgen_daemon::generation::{build_generator, ArtifactStore};
use songgen_daemon::orchestrator::{Pipeline, PipelineSettings};
use songgen_daemon::store::{SqliteOpener, SqliteStore};
use songgen_daemon::tasks::TaskRegistry;
use songgen_daemon::types::GenerationRequest;
use songgen_daemon::worker;

const DEFAULT_LOG_FILTER: &str = "songgen_daemon=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_tracing();

    match &cli.command {
        Command::Worker { .. } => {
            run_worker(cli.command.worker_config(WorkerConfig::from_env())).await
        }
        Command::Serve { .. } => {
            run_service(cli.command.service_config(ServiceConfig::from_env())).await
        }
        Command::Generate {
            prompt,
            duration,
            style,
            lyrics,
            seed,
            output,
            ..
        } => {
            let config = cli.command.service_config(ServiceConfig::from_env());
            let mut request = GenerationRequest::new(prompt.clone(), *duration);
            request.style = style.clone();
            request.lyrics = lyrics.clone();
            request.instrumental = lyrics.is_none();
            request.seed = *seed;
            request.format = output_format(output);
            run_generate(&config, request, output).await
        }
    }
}

/// `RUST_LOG` filter, defaulting to info for this crate; JSON output when
/// `SONGGEN_LOG_JSON=1`.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    let json = std::env::var("SONGGEN_LOG_JSON")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run_worker(config: WorkerConfig) -> anyhow::Result<()> {
    if let Some(problem) = config.validate() {
        anyhow::bail!("invalid worker configuration: {}", problem);
    }
    info!(version = env!("CARGO_PKG_VERSION"), bind = %config.bind, "songgen worker starting");

    let bind = config.bind.clone();
    let registry = worker::build_registry(config).await?;
    serve(worker::router(registry), &bind).await?;

    info!("songgen worker stopped");
    Ok(())
}

async fn run_service(config: ServiceConfig) -> anyhow::Result<()> {
    if let Some(problem) = config.validate() {
        anyhow::bail!("invalid service configuration: {}", problem);
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.bind,
        backend = config.backend.as_str(),
        "songgen service starting"
    );

    if config.database_url.is_none() {
        tokio::fs::create_dir_all(default_data_dir())
            .await
            .context("failed to create data directory")?;
    }
    let database_url = config.effective_database_url();
    let store = SqliteStore::connect(&database_url).await?;

    let static_dir = config.effective_static_dir();
    tokio::fs::create_dir_all(&static_dir)
        .await
        .with_context(|| format!("failed to create {}", static_dir.display()))?;

    let pipeline = Pipeline::new(
        TaskRegistry::new(Arc::new(store)),
        build_generator(&config)?,
        ArtifactStore::new(&static_dir),
        Arc::new(SqliteOpener::new(database_url)),
    )
    .with_settings(PipelineSettings {
        max_lyrics_chars: config.max_lyrics_chars,
        enrich_timeout: config.enrich_timeout,
    });
    let state = Arc::new(AppState {
        pipeline,
        stale_after: config.stale_after(),
        default_duration_sec: config.default_duration_sec,
    });

    serve(api::router(state, &static_dir), &config.bind).await?;

    info!("songgen service stopped");
    Ok(())
}

async fn run_generate(
    config: &ServiceConfig,
    request: GenerationRequest,
    output: &Path,
) -> anyhow::Result<()> {
    request.validate()?;
    let client = RemoteJobClient::new(&config.remote_url, config.request_timeout)?;

    eprintln!("=== songgen-daemon one-shot generation ===");
    eprintln!("Worker: {}", client.base_url());
    eprintln!("Prompt: \"{}\"", request.prompt);
    eprintln!("Duration: {}s", request.duration_sec);
    eprintln!("Output: {}", output.display());
    eprintln!();

    let start_time = Instant::now();
    let bytes = client
        .run(&request, config.total_timeout, config.poll_interval)
        .await?;
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    eprintln!("Generation complete!");
    eprintln!("  Time: {:.2}s", start_time.elapsed().as_secs_f32());
    eprintln!("  Size: {} bytes", bytes.len());
    eprintln!("Saved to: {}", output.display());
    Ok(())
}

async fn serve(app: Router, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
