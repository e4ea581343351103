use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{deliver, Job, JobError};
use crate::chain::ChainService;
use crate::config::Config;
use crate::countdown::{countdown_from_raw, is_threshold};
use crate::events::{Event, EventKind, EventSink};
use crate::format::MessageFormatter;
use crate::model::Project;
use crate::notify::Notifier;

const JOB_NAME: &str = "countdown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownSettings {
    /// Account whose liked projects are watched.
    pub account: String,
    pub thresholds_minutes: Vec<i64>,
}

impl CountdownSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            account: cfg.jobs.countdown.account.clone(),
            thresholds_minutes: cfg.jobs.countdown.thresholds_minutes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountdownReport {
    pub run_id: Uuid,
    pub checked: usize,
    /// Projects a reminder was issued for, in liked-table order.
    pub reminders: Vec<i64>,
}

/// fetch projects -> fetch liked set -> per liked project, remind at the
/// threshold minutes. No de-duplication: two runs inside the same minute
/// both remind.
pub struct CountdownJob {
    chain: Arc<dyn ChainService>,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn EventSink>,
    formatter: MessageFormatter,
    settings: CountdownSettings,
}

impl CountdownJob {
    pub fn new(
        chain: Arc<dyn ChainService>,
        notifier: Arc<dyn Notifier>,
        events: Arc<dyn EventSink>,
        formatter: MessageFormatter,
        settings: CountdownSettings,
    ) -> Self {
        Self {
            chain,
            notifier,
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

    pub async fn run(&self) -> CountdownReport {
        self.run_at(Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> CountdownReport {
        let run_id = Uuid::new_v4();
        self.events.emit(
            self.event(EventKind::RunStarted, run_id)
                .field("account", self.settings.account.as_str()),
        );

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
        let liked = match self.chain.list_liked(&self.settings.account).await {
            Ok(liked) => liked,
            Err(err) => {
                self.events.emit(
                    self.event(EventKind::FetchFailed, run_id)
                        .field("source", "liked")
                        .field("error", err.to_string()),
                );
                Vec::new()
            }
        };

        let mut reminders = Vec::new();
        for like in &liked {
            let Some(project) = self.resolve(&projects, like.pid, run_id).await else {
                continue;
            };

            // Unparsable or out-of-range round data is skipped.
            let Some(countdown) =
                countdown_from_raw(&project.last_round, project.sec_per_round, now)
            else {
                self.events.emit(
                    self.event(EventKind::InvalidTimestamp, run_id)
                        .field("project_id", project.id)
                        .field("last_round", project.last_round.as_str())
                        .field("sec_per_round", project.sec_per_round),
                );
                continue;
            };

            if !is_threshold(countdown.minutes_left, &self.settings.thresholds_minutes) {
                continue;
            }

            self.events.emit(
                self.event(EventKind::ReminderDue, run_id)
                    .field("project_id", project.id)
                    .field("minutes_left", countdown.minutes_left),
            );
            let message =
                self.formatter
                    .countdown(&project, countdown.minutes_left, countdown.next_round);
            deliver(
                self.notifier.as_ref(),
                self.events.as_ref(),
                run_id,
                JOB_NAME,
                project.id,
                &message,
            )
            .await;
            reminders.push(project.id);
        }

        let report = CountdownReport {
            run_id,
            checked: liked.len(),
            reminders,
        };
        self.events.emit(
            self.event(EventKind::RunFinished, run_id)
                .field("checked", report.checked)
                .field("reminders", report.reminders.len()),
        );
        report
    }

    /// Look the liked id up in the listing first, then by point query.
    async fn resolve(&self, projects: &[Project], pid: i64, run_id: Uuid) -> Option<Project> {
        if let Some(project) = projects.iter().find(|p| p.id == pid) {
            return Some(project.clone());
        }
        match self.chain.find_project(pid).await {
            Ok(Some(project)) => Some(project),
            Ok(None) => {
                self.events.emit(
                    self.event(EventKind::LikedProjectMissing, run_id)
                        .field("project_id", pid),
                );
                None
            }
            Err(err) => {
                self.events.emit(
                    self.event(EventKind::FetchFailed, run_id)
                        .field("source", "project")
                        .field("project_id", pid)
                        .field("error", err.to_string()),
                );
                None
            }
        }
    }
}

#[async_trait]
impl Job for CountdownJob {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run_once(&self) -> Result<Value, JobError> {
        Ok(serde_json::to_value(self.run().await)?)
    }
}
