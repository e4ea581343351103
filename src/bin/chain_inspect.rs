use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use chain_watchbot::chain::{ChainClient, ChainService};
use chain_watchbot::config;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Table {
    Projects,
    Likes,
}

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Table to dump
    #[arg(long, value_enum, default_value = "projects")]
    table: Table,

    /// Scope for the likes table; defaults to the countdown account
    #[arg(long)]
    account: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let client = ChainClient::from_config(&cfg)?;

    match args.table {
        Table::Projects => {
            let rows = client.list_projects().await?;
            println!("{} project rows (newest first):", rows.len());
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Table::Likes => {
            let account = args
                .account
                .unwrap_or_else(|| cfg.jobs.countdown.account.clone());
            let rows = client.list_liked(&account).await?;
            println!("{} liked rows for {}:", rows.len(), account);
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
    }
    Ok(())
}
