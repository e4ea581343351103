//! Polls a chain node for new launchpad projects and round countdowns and
//! forwards notifications to a chat webhook.

pub mod chain;
pub mod config;
pub mod countdown;
pub mod db;
pub mod diff;
pub mod events;
pub mod format;
pub mod jobs;
pub mod model;
pub mod notify;
pub mod schedule;
pub mod server;
pub mod watermark;
