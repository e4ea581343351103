use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use chain_watchbot::config;
use chain_watchbot::events::TracingSink;
use chain_watchbot::jobs::{Job, JobSet};
use chain_watchbot::notify::{LogNotifier, Notifier, WebhookNotifier};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Which {
    NewProjects,
    Countdown,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Run one job once and exit")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Which job to run
    #[arg(long, value_enum)]
    job: Which,

    /// Log messages instead of posting them to the webhook
    #[arg(long)]
    dry_run: bool,
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

    let notifier: Arc<dyn Notifier> = if args.dry_run {
        info!("dry run: messages go to the log only");
        Arc::new(LogNotifier)
    } else {
        let url = cfg.webhook_url();
        if url.is_none() {
            warn!(env = %cfg.webhook.url_env, "webhook URL not set; notifications will be skipped");
        }
        Arc::new(WebhookNotifier::new(url.as_deref(), cfg.webhook.at_all)?)
    };

    let jobs = JobSet::from_config(&cfg, notifier, Arc::new(TracingSink)).await?;
    let job: Arc<dyn Job> = match args.job {
        Which::NewProjects => jobs.new_projects,
        Which::Countdown => jobs.countdown,
    };

    let report = job.run_once().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
