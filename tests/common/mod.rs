#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chain_watchbot::chain::{ChainError, ChainService};
use chain_watchbot::config::{self, BalanceTokens, Config};
use chain_watchbot::format::MessageFormatter;
use chain_watchbot::model::{LikedProject, Project};
use chain_watchbot::notify::{Message, NotifyError, Notifier};
use chain_watchbot::watermark::WatermarkStore;
use chrono::FixedOffset;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn example_config() -> Config {
    serde_yaml::from_str(config::example()).unwrap()
}

pub fn tokens() -> BalanceTokens {
    example_config().chain.balance_tokens
}

pub fn formatter() -> MessageFormatter {
    MessageFormatter::new(FixedOffset::east_opt(8 * 3600).unwrap(), &tokens())
}

pub fn project(id: i64) -> Project {
    Project {
        id,
        creator: format!("creator{}", id),
        project_name: format!("Project {}", id),
        nft_name: format!("NFT{}", id),
        nft_img: String::new(),
        desc: String::new(),
        init_nft_number: 100,
        init_nft_price: "1.0000 EOS".into(),
        create_time: "2024-01-01T00:00:00".into(),
        last_round: "2024-01-01T00:00:00".into(),
        sec_per_round: 1200,
    }
}

pub fn projects(ids: &[i64]) -> Vec<Project> {
    ids.iter().copied().map(project).collect()
}

/// Chain fake with canned responses. `None` for a list means "fail".
#[derive(Clone, Default)]
pub struct FakeChain {
    pub projects: Arc<Mutex<Option<Vec<Project>>>>,
    pub liked: Arc<Mutex<Option<Vec<LikedProject>>>>,
    pub extra: Arc<Mutex<HashMap<i64, Project>>>,
    pub balances: Arc<Mutex<HashMap<String, Vec<String>>>>,
    pub balance_calls: Arc<Mutex<Vec<(String, String, String)>>>,
    pub lookups: Arc<Mutex<Vec<i64>>>,
}

impl FakeChain {
    pub fn with_projects(projects: Vec<Project>) -> Self {
        let fake = Self::default();
        *fake.projects.try_lock().unwrap() = Some(projects);
        fake
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub async fn set_projects(&self, projects: Option<Vec<Project>>) {
        *self.projects.lock().await = projects;
    }

    pub async fn set_liked(&self, liked: Option<Vec<LikedProject>>) {
        *self.liked.lock().await = liked;
    }

    pub async fn add_extra(&self, project: Project) {
        self.extra.lock().await.insert(project.id, project);
    }

    pub async fn set_balance(&self, code: &str, balances: Vec<String>) {
        self.balances.lock().await.insert(code.to_string(), balances);
    }

    pub async fn balance_calls(&self) -> Vec<(String, String, String)> {
        self.balance_calls.lock().await.clone()
    }

    pub async fn lookups(&self) -> Vec<i64> {
        self.lookups.lock().await.clone()
    }
}

fn unavailable() -> ChainError {
    ChainError::Status {
        status: reqwest::StatusCode::BAD_GATEWAY,
        body: "node unavailable".into(),
    }
}

#[async_trait]
impl ChainService for FakeChain {
    async fn list_projects(&self) -> Result<Vec<Project>, ChainError> {
        self.projects.lock().await.clone().ok_or_else(unavailable)
    }

    async fn find_project(&self, id: i64) -> Result<Option<Project>, ChainError> {
        self.lookups.lock().await.push(id);
        Ok(self.extra.lock().await.get(&id).cloned())
    }

    async fn list_liked(&self, _account: &str) -> Result<Vec<LikedProject>, ChainError> {
        self.liked.lock().await.clone().ok_or_else(unavailable)
    }

    async fn currency_balance(
        &self,
        code: &str,
        account: &str,
        symbol: &str,
    ) -> Result<Vec<String>, ChainError> {
        self.balance_calls
            .lock()
            .await
            .push((code.to_string(), account.to_string(), symbol.to_string()));
        self.balances
            .lock()
            .await
            .get(code)
            .cloned()
            .ok_or_else(unavailable)
    }
}

/// Records every message; pops scripted outcomes, succeeding once exhausted.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    outcomes: Arc<Mutex<VecDeque<Result<(), NotifyError>>>>,
    sent: Arc<Mutex<Vec<Message>>>,
}

impl RecordingNotifier {
    pub fn with_outcomes(outcomes: Vec<Result<(), NotifyError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::from(outcomes))),
            ..Default::default()
        }
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }

    pub async fn titles(&self) -> Vec<String> {
        self.messages()
            .await
            .into_iter()
            .map(|m| match m {
                Message::Markdown { title, .. } => title,
                Message::Text { content } => content,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        self.sent.lock().await.push(message.clone());
        self.outcomes.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

/// Store whose reads and/or writes fail.
#[derive(Debug, Default)]
pub struct BrokenStore {
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub values: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl WatermarkStore for BrokenStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        if self.fail_reads {
            return Err(anyhow!("store offline"));
        }
        Ok(self.values.lock().await.get(key).copied())
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("store read-only"));
        }
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
