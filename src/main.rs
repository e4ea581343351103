use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use chain_watchbot::config;
use chain_watchbot::events::TracingSink;
use chain_watchbot::jobs::JobSet;
use chain_watchbot::notify::WebhookNotifier;
use chain_watchbot::schedule;
use chain_watchbot::server::{self, AppState};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let webhook_url = cfg.webhook_url();
    if webhook_url.is_none() {
        warn!(env = %cfg.webhook.url_env, "webhook URL not set; notifications will be skipped");
    }
    let notifier = Arc::new(WebhookNotifier::new(webhook_url.as_deref(), cfg.webhook.at_all)?);
    let jobs = JobSet::from_config(&cfg, notifier, Arc::new(TracingSink)).await?;

    let schedule = &cfg.app.schedule;
    if schedule.new_projects_secs > 0 {
        info!(every_secs = schedule.new_projects_secs, "scheduling new project checks");
        schedule::spawn_interval(
            jobs.new_projects.clone(),
            Duration::from_secs(schedule.new_projects_secs),
        );
    }
    if schedule.countdown_secs > 0 {
        info!(every_secs = schedule.countdown_secs, "scheduling countdown checks");
        schedule::spawn_interval(
            jobs.countdown.clone(),
            Duration::from_secs(schedule.countdown_secs),
        );
    }

    let addr = cfg.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "trigger server listening");
    axum::serve(listener, server::build_router(AppState::from(jobs))).await?;

    Ok(())
}
