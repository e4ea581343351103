use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{deliver, Job, JobError};
use crate::chain::{fetch_balance_snapshot, ChainService};
use crate::config::{BalanceTokens, Config};
use crate::diff::detect_new_projects;
use crate::events::{Event, EventKind, EventSink};
use crate::format::MessageFormatter;
use crate::notify::Notifier;
use crate::watermark::WatermarkStore;

const JOB_NAME: &str = "new_projects";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectSettings {
    /// Watermark used when the store has no value yet.
    pub seed_watermark: i64,
    pub watermark_key: String,
    pub with_balances: bool,
    pub tokens: BalanceTokens,
}

impl NewProjectSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            seed_watermark: cfg.jobs.new_projects.seed_watermark,
            watermark_key: cfg.jobs.new_projects.watermark_key.clone(),
            with_balances: cfg.jobs.new_projects.with_balances,
            tokens: cfg.chain.balance_tokens.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewProjectReport {
    pub run_id: Uuid,
    pub fetched: usize,
    /// Ids above the watermark this run, in delivery order, whatever the
    /// send outcome.
    pub new_projects: Vec<i64>,
    /// Subset of `new_projects` whose notification the webhook accepted.
    pub notified: Vec<i64>,
    /// Watermark in effect after the run.
    pub watermark: i64,
}

/// fetch -> load watermark -> diff -> notify each -> persist watermark.
pub struct NewProjectJob {
    chain: Arc<dyn ChainService>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn WatermarkStore>,
    events: Arc<dyn EventSink>,
    formatter: MessageFormatter,
    settings: NewProjectSettings,
}

impl NewProjectJob {
    pub fn new(
        chain: Arc<dyn ChainService>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn WatermarkStore>,
        events: Arc<dyn EventSink>,
        formatter: MessageFormatter,
        settings: NewProjectSettings,
    ) -> Self {
        Self {
            chain,
            notifier,
            store,
            events,
            formatter,
            settings,
        }
    }

    fn event(&self, kind: EventKind, run_id: Uuid) -> Event {
        Event::new(kind)
            .field("job", JOB_NAME)
            .field("run_id", run_id.to_string())
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<NewProjectReport, JobError> {
        let run_id = Uuid::new_v4();
        self.events.emit(self.event(EventKind::RunStarted, run_id));

        let projects = match self.chain.list_projects().await {
            Ok(projects) => projects,
            Err(err) => {
                self.events.emit(
                    self.event(EventKind::FetchFailed, run_id)
                        .field("source", "projects")
                        .field("error", err.to_string()),
                );
                Vec::new()
            }
        };

        let key = self.settings.watermark_key.as_str();
        let stored = self
            .store
            .get(key)
            .await
            .map_err(|source| JobError::WatermarkRead {
                key: key.to_string(),
                source,
            })?;
        let watermark = stored.unwrap_or(self.settings.seed_watermark);
        self.events.emit(
            self.event(EventKind::WatermarkLoaded, run_id)
                .field("key", key)
                .field("value", watermark)
                .field("seeded", stored.is_none()),
        );

        let detection = detect_new_projects(&projects, watermark);

        // Delivery order follows the fetch order: newest project first.
        let mut detected = Vec::with_capacity(detection.new_projects.len());
        let mut notified = Vec::new();
        for project in &detection.new_projects {
            self.events.emit(
                self.event(EventKind::NewProjectDetected, run_id)
                    .field("project_id", project.id)
                    .field("project_name", project.project_name.as_str()),
            );

            let balances = if self.settings.with_balances {
                let snapshot = fetch_balance_snapshot(
                    self.chain.as_ref(),
                    &self.settings.tokens,
                    &project.creator,
                    |code, err| {
                        self.events.emit(
                            self.event(EventKind::BalanceFetchFailed, run_id)
                                .field("project_id", project.id)
                                .field("code", code)
                                .field("error", err.to_string()),
                        )
                    },
                )
                .await;
                Some(snapshot)
            } else {
                None
            };

            let message = self.formatter.new_project(project, balances.as_ref());
            let sent = deliver(
                self.notifier.as_ref(),
                self.events.as_ref(),
                run_id,
                JOB_NAME,
                project.id,
                &message,
            )
            .await;
            detected.push(project.id);
            if sent {
                notified.push(project.id);
            }
        }

        // Advance regardless of delivery outcome: a failed send is not retried.
        let mut effective = watermark;
        if let Some(next) = detection.advance_to {
            match self.store.set(key, next).await {
                Ok(()) => {
                    effective = next;
                    self.events.emit(
                        self.event(EventKind::WatermarkAdvanced, run_id)
                            .field("key", key)
                            .field("from", watermark)
                            .field("to", next),
                    );
                }
                Err(err) => self.events.emit(
                    self.event(EventKind::WatermarkWriteFailed, run_id)
                        .field("key", key)
                        .field("value", next)
                        .field("error", format!("{err:#}")),
                ),
            }
        }

        let report = NewProjectReport {
            run_id,
            fetched: projects.len(),
            new_projects: detected,
            notified,
            watermark: effective,
        };
        self.events.emit(
            self.event(EventKind::RunFinished, run_id)
                .field("fetched", report.fetched)
                .field("new_projects", report.new_projects.len())
                .field("notified", report.notified.len())
                .field("watermark", report.watermark),
        );
        Ok(report)
    }
}

#[async_trait]
impl Job for NewProjectJob {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run_once(&self) -> Result<Value, JobError> {
        let report = self.run().await?;
        Ok(serde_json::to_value(report)?)
    }
}
