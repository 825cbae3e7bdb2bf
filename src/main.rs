use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use staybook::api::{self, AppState};
use staybook::cache::{AvailabilityCache, MemoryCache, NoopCache};
use staybook::config::Config;
use staybook::engine::{Collaborators, Engine};
use staybook::notify::{BroadcastPublisher, EventPublisher, NoopPublisher, log_notifications};
use staybook::pricing::{FallbackQuoter, LocalQuoter, RateQuoter, RemoteQuoter};
use staybook::seed::Dataset;

fn collaborators(config: &Config) -> Result<Collaborators, Box<dyn std::error::Error>> {
    let quoter: Arc<dyn RateQuoter> = match &config.pricing_url {
        Some(url) => {
            let remote = RemoteQuoter::new(url.clone(), config.pricing_timeout)?;
            Arc::new(FallbackQuoter::new(Arc::new(remote), config.pricing_timeout))
        }
        None => Arc::new(LocalQuoter),
    };
    let cache: Arc<dyn AvailabilityCache> = if config.cache_ttl.is_zero() {
        Arc::new(NoopCache)
    } else {
        Arc::new(MemoryCache::new(config.cache_ttl))
    };
    let events: Arc<dyn EventPublisher> = if config.events {
        let hub = BroadcastPublisher::new();
        tokio::spawn(log_notifications(hub.subscribe()));
        Arc::new(hub)
    } else {
        Arc::new(NoopPublisher)
    };
    Ok(Collaborators { quoter, cache, events })
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, draining requests");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    staybook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let dataset = Arc::new(Dataset::load(config.seed_file.as_deref())?);
    let engine = Arc::new(Engine::open(config.journal_path(), collaborators(&config)?)?);
    if !dataset.apply(&engine).await? {
        info!(rooms = engine.room_count(), "state restored from journal");
    }

    tokio::spawn(staybook::reaper::run_reaper(engine.clone()));
    tokio::spawn(staybook::reaper::run_compactor(engine.clone(), config.compact_threshold));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("staybook listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  pricing: {}", config.pricing_url.as_deref().unwrap_or("in-process"));
    info!(
        "  cache: {}",
        if config.cache_ttl.is_zero() {
            "disabled".to_string()
        } else {
            format!("{}s ttl", config.cache_ttl.as_secs())
        }
    );
    info!("  events: {}", if config.events { "enabled" } else { "disabled" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    api::serve(listener, AppState { engine, dataset }, shutdown_signal()).await?;
    info!("staybook stopped");
    Ok(())
}
