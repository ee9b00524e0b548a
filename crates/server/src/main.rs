use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentinel_core::{
    load_config, raster::ColorRamp, validate_config, AcquisitionManager, Config, CopernicusAuth,
    CopernicusCatalog, GdalCliBackend, HttpArchiveFetcher, JsonWatermarkStore, PipelineRunner,
    PipelineScheduler, SharedToken, ZipExtractor,
};
use sentinel_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("SENTINEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(config.logging.json);
    info!("Configuration loaded from {:?}", config_path);

    validate_config(&config).context("Configuration validation failed")?;

    let families = config.enabled_families();
    if families.is_empty() {
        warn!("No satellite family enabled, runs will do nothing");
    }
    info!(?families, download_dir = ?config.paths.download_dir, output_dir = ?config.paths.output_dir, "Configuration validated");

    let runner = Arc::new(build_runner(&config).await?);
    let scheduler = Arc::new(PipelineScheduler::new(Arc::clone(&runner)));

    if !config.server.enabled {
        return run_headless(&config, &scheduler).await;
    }

    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&scheduler)));
    info!(config_hash = state.config_hash(), "Application state ready");

    if config.runner.interval_secs.is_some() {
        scheduler.start();
    } else if let Err(e) = scheduler.trigger() {
        warn!(error = %e, "Initial run not started");
    }

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    scheduler.stop().await;

    Ok(())
}

/// Wire the real Copernicus, archive and GDAL collaborators.
async fn build_runner(config: &Config) -> Result<PipelineRunner> {
    let catalog = CopernicusCatalog::new(&config.copernicus)
        .context("Failed to create catalog client")?;
    let auth =
        CopernicusAuth::new(&config.copernicus).context("Failed to create token provider")?;
    let fetcher =
        HttpArchiveFetcher::new(&config.copernicus).context("Failed to create archive fetcher")?;

    let acquisition = AcquisitionManager::new(
        Arc::new(fetcher),
        Arc::new(ZipExtractor::new()),
        Arc::new(SharedToken::new(Arc::new(auth))),
        &config.paths.download_dir,
    );

    let watermarks = JsonWatermarkStore::new(&config.paths.watermark_dir);
    let backend = GdalCliBackend::new(config.raster.clone());

    let mut runner = PipelineRunner::new(
        config.clone(),
        Arc::new(catalog),
        Arc::new(watermarks),
        acquisition,
        Arc::new(backend),
    );

    if let Some(path) = &config.raster.ndvi_color_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read color file {:?}", path))?;
        let ramp = ColorRamp::from_gdaldem_text(&text)
            .with_context(|| format!("Invalid color file {:?}", path))?;
        info!(path = ?path, "Using custom vegetation index color ramp");
        runner = runner.with_color_ramp(ramp);
    }

    Ok(runner)
}

/// Without the HTTP server: one run, or the interval loop until a signal.
async fn run_headless(config: &Config, scheduler: &PipelineScheduler) -> Result<()> {
    if config.runner.interval_secs.is_none() {
        let summary = scheduler.run_now().await.context("Pipeline run failed")?;
        info!(
            run_id = %summary.run_id,
            products_failed = summary.products_failed(),
            stages_failed = summary.stages_failed(),
            "Pipeline run finished"
        );
        return Ok(());
    }

    scheduler.start();
    shutdown_signal().await;
    info!("Shutting down...");
    scheduler.stop().await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
