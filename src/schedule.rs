use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::jobs::Job;

/// Run `job` every `every`, starting immediately. Runs never overlap within
/// one ticker; a slow run delays the next tick instead of bursting.
pub fn spawn_interval(job: Arc<dyn Job>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match job.run_once().await {
                Ok(report) => info!(job = job.name(), %report, "scheduled run finished"),
                Err(err) => error!(job = job.name(), %err, "scheduled run failed"),
            }
        }
    })
}
