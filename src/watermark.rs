//! Durable "highest project id already notified" storage.
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::db::{self, Pool};

/// Plain get/set; read-then-write across calls is not atomic.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>>;
    async fn set(&self, key: &str, value: i64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteWatermarkStore {
    pool: Pool,
}

impl SqliteWatermarkStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatermarkStore for SqliteWatermarkStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        db::get_watermark(&self.pool, key).await
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        db::set_watermark(&self.pool, key, value).await
    }
}

/// Process-local store. Forgets everything on restart.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.values.lock().await.get(key).copied())
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
