//! The two scheduled pipelines and the wiring that builds them from config.
//!
//! Every collaborator failure is turned into an event plus a safe default
//! here; only a failed watermark read aborts a run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::chain::ChainClient;
use crate::config::{Config, StoreKind};
use crate::db;
use crate::events::{Event, EventKind, EventSink};
use crate::format::MessageFormatter;
use crate::notify::{Message, NotifyError, Notifier};
use crate::watermark::{MemoryWatermarkStore, SqliteWatermarkStore, WatermarkStore};

pub mod new_projects;
pub mod reminders;

pub use new_projects::{NewProjectJob, NewProjectReport, NewProjectSettings};
pub use reminders::{CountdownJob, CountdownReport, CountdownSettings};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to read watermark {key}: {source}")]
    WatermarkRead {
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to encode job report: {0}")]
    Report(#[from] serde_json::Error),
}

/// A pipeline that can be triggered over HTTP or from a timer.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs the pipeline once and returns its report as a JSON object.
    async fn run_once(&self) -> Result<Value, JobError>;
}

/// Send one message and record the outcome. Returns whether it went out.
pub(crate) async fn deliver(
    notifier: &dyn Notifier,
    events: &dyn EventSink,
    run_id: Uuid,
    job: &'static str,
    project_id: i64,
    message: &Message,
) -> bool {
    let base = |kind| {
        Event::new(kind)
            .field("job", job)
            .field("run_id", run_id.to_string())
            .field("project_id", project_id)
            .field("msgtype", message.kind())
    };
    match notifier.send(message).await {
        Ok(()) => {
            events.emit(base(EventKind::NotificationSent));
            true
        }
        Err(NotifyError::NotConfigured) => {
            events.emit(base(EventKind::NotificationSkipped).field("reason", "webhook not configured"));
            false
        }
        Err(err) => {
            events.emit(base(EventKind::NotificationFailed).field("error", err.to_string()));
            false
        }
    }
}

/// Both jobs, sharing one chain client, notifier and event sink.
#[derive(Clone)]
pub struct JobSet {
    pub new_projects: Arc<NewProjectJob>,
    pub countdown: Arc<CountdownJob>,
}

impl JobSet {
    pub async fn from_config(
        cfg: &Config,
        notifier: Arc<dyn Notifier>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let chain = Arc::new(ChainClient::from_config(cfg).context("failed to build chain client")?);
        let formatter = MessageFormatter::new(cfg.display_offset()?, &cfg.chain.balance_tokens);

        let store: Arc<dyn WatermarkStore> = match cfg.jobs.new_projects.store {
            StoreKind::Sqlite => {
                let pool = db::init_pool(&cfg.database_url()).await?;
                db::run_migrations(&pool).await?;
                Arc::new(SqliteWatermarkStore::new(pool))
            }
            StoreKind::Memory => Arc::new(MemoryWatermarkStore::new()),
        };

        let new_projects = NewProjectJob::new(
            chain.clone(),
            notifier.clone(),
            store,
            events.clone(),
            formatter.clone(),
            NewProjectSettings::from_config(cfg),
        );
        let countdown = CountdownJob::new(
            chain,
            notifier,
            events,
            formatter,
            CountdownSettings::from_config(cfg),
        );

        Ok(Self {
            new_projects: Arc::new(new_projects),
            countdown: Arc::new(countdown),
        })
    }
}
