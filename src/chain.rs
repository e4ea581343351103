//! Client for the chain node's read endpoints.
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::{BalanceTokens, Config};
use crate::model::{BalanceSnapshot, LikedProject, Project};

const TABLE_ROWS_PATH: &str = "v1/chain/get_table_rows";
const CURRENCY_BALANCE_PATH: &str = "v1/chain/get_currency_balance";

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid chain endpoint: {0}")]
    Url(String),
    #[error("failed to reach chain node: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chain node returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected chain response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Body of a `get_table_rows` call. Field names are the node's wire names.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableQuery {
    pub json: bool,
    pub code: String,
    pub scope: String,
    pub table: String,
    pub lower_bound: String,
    pub upper_bound: String,
    pub index_position: u32,
    pub key_type: String,
    pub limit: u32,
    pub reverse: bool,
    pub show_payer: bool,
}

impl TableQuery {
    /// Primary-index scan, newest rows first.
    pub fn newest_first(code: &str, scope: &str, table: &str, limit: u32) -> Self {
        Self {
            json: true,
            code: code.to_string(),
            scope: scope.to_string(),
            table: table.to_string(),
            lower_bound: String::new(),
            upper_bound: String::new(),
            index_position: 1,
            key_type: String::new(),
            limit,
            reverse: true,
            show_payer: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BalanceQuery {
    pub code: String,
    pub account: String,
    pub symbol: String,
}

#[derive(Deserialize)]
struct TableRowsResponse {
    #[serde(default)]
    rows: Vec<Value>,
}

/// Read operations the jobs need from the chain.
#[async_trait]
pub trait ChainService: Send + Sync {
    /// Project rows, highest id first.
    async fn list_projects(&self) -> Result<Vec<Project>, ChainError>;

    /// Point lookup by primary key, for rows older than the listing window.
    async fn find_project(&self, id: i64) -> Result<Option<Project>, ChainError>;

    async fn list_liked(&self, account: &str) -> Result<Vec<LikedProject>, ChainError>;

    async fn currency_balance(
        &self,
        code: &str,
        account: &str,
        symbol: &str,
    ) -> Result<Vec<String>, ChainError>;
}

#[derive(Clone)]
pub struct ChainClient {
    http: Client,
    base_url: Url,
    contract: String,
    projects_table: String,
    projects_limit: u32,
    likes_table: String,
    likes_limit: u32,
}

impl fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainClient")
            .field("base_url", &self.base_url)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl ChainClient {
    pub fn from_config(cfg: &Config) -> Result<Self, ChainError> {
        let base_url = Url::parse(&cfg.chain.endpoint).map_err(|e| ChainError::Url(e.to_string()))?;
        let http = Client::builder()
            .user_agent(concat!("chain-watchbot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            contract: cfg.chain.contract.clone(),
            projects_table: cfg.chain.projects_table.clone(),
            projects_limit: cfg.chain.projects_limit,
            likes_table: cfg.chain.likes_table.clone(),
            likes_limit: cfg.chain.likes_limit,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChainError> {
        self.base_url
            .join(path)
            .map_err(|e| ChainError::Url(e.to_string()))
    }

    pub fn build_table_request(&self, query: &TableQuery) -> Result<reqwest::Request, ChainError> {
        let endpoint = self.endpoint(TABLE_ROWS_PATH)?;
        Ok(self.http.post(endpoint).json(query).build()?)
    }

    /// One `get_table_rows` call; rows that fail to decode fail the whole call.
    #[instrument(skip(self), fields(table = %query.table, scope = %query.scope))]
    pub async fn get_table_rows<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
    ) -> Result<Vec<T>, ChainError> {
        let request = self.build_table_request(query)?;
        let res = self.http.execute(request).await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ChainError::Status { status, body });
        }
        let body = res.text().await?;
        let payload: TableRowsResponse = serde_json::from_str(&body)?;
        debug!(rows = payload.rows.len(), "table rows received");
        payload
            .rows
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(ChainError::from))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn get_currency_balance(&self, query: &BalanceQuery) -> Result<Vec<String>, ChainError> {
        let endpoint = self.endpoint(CURRENCY_BALANCE_PATH)?;
        let res = self.http.post(endpoint).json(query).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ChainError::Status { status, body });
        }
        let body = res.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ChainService for ChainClient {
    async fn list_projects(&self) -> Result<Vec<Project>, ChainError> {
        let query = TableQuery::newest_first(
            &self.contract,
            &self.contract,
            &self.projects_table,
            self.projects_limit,
        );
        self.get_table_rows(&query).await
    }

    async fn find_project(&self, id: i64) -> Result<Option<Project>, ChainError> {
        let mut query =
            TableQuery::newest_first(&self.contract, &self.contract, &self.projects_table, 1);
        query.lower_bound = id.to_string();
        query.upper_bound = id.to_string();
        query.reverse = false;
        let rows: Vec<Project> = self.get_table_rows(&query).await?;
        Ok(rows.into_iter().find(|p| p.id == id))
    }

    async fn list_liked(&self, account: &str) -> Result<Vec<LikedProject>, ChainError> {
        let query =
            TableQuery::newest_first(&self.contract, account, &self.likes_table, self.likes_limit);
        self.get_table_rows(&query).await
    }

    async fn currency_balance(
        &self,
        code: &str,
        account: &str,
        symbol: &str,
    ) -> Result<Vec<String>, ChainError> {
        self.get_currency_balance(&BalanceQuery {
            code: code.to_string(),
            account: account.to_string(),
            symbol: symbol.to_string(),
        })
        .await
    }
}

/// Query both configured tokens for `account`. Each failed query is reported
/// through `on_error` and leaves that side of the snapshot empty.
pub async fn fetch_balance_snapshot(
    chain: &dyn ChainService,
    tokens: &BalanceTokens,
    account: &str,
    mut on_error: impl FnMut(&str, &ChainError),
) -> BalanceSnapshot {
    let primary = match chain
        .currency_balance(&tokens.primary.code, account, &tokens.primary.symbol)
        .await
    {
        Ok(list) => list,
        Err(err) => {
            on_error(&tokens.primary.code, &err);
            Vec::new()
        }
    };
    let secondary = match chain
        .currency_balance(&tokens.secondary.code, account, &tokens.secondary.symbol)
        .await
    {
        Ok(list) => list,
        Err(err) => {
            on_error(&tokens.secondary.code, &err);
            Vec::new()
        }
    };
    BalanceSnapshot { primary, secondary }
}
