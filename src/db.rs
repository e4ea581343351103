use anyhow::{Context, Result};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {}", normalized))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", normalized))?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and create the parent
/// directory. In-memory and non-sqlite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{}?{}", path, q),
        None => format!("sqlite://{}", path),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_watermark(pool: &Pool, key: &str) -> Result<Option<i64>> {
    let value = sqlx::query_scalar::<_, i64>("SELECT value FROM watermarks WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to read watermark {}", key))?;
    Ok(value)
}

#[instrument(skip(pool))]
pub async fn set_watermark(pool: &Pool, key: &str, value: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO watermarks (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .with_context(|| format!("failed to persist watermark {}", key))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let pool = setup_pool().await;
        assert_eq!(get_watermark(&pool, "last_project_id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_overwrite() {
        let pool = setup_pool().await;
        set_watermark(&pool, "last_project_id", 113).await.unwrap();
        assert_eq!(
            get_watermark(&pool, "last_project_id").await.unwrap(),
            Some(113)
        );
        set_watermark(&pool, "last_project_id", 120).await.unwrap();
        assert_eq!(
            get_watermark(&pool, "last_project_id").await.unwrap(),
            Some(120)
        );
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watermarks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn init_pool_creates_missing_database_file() {
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("data").join("watchbot.db");
        assert!(!db.exists());

        let pool = init_pool(&format!("sqlite://{}", db.display())).await.unwrap();
        run_migrations(&pool).await.unwrap();
        set_watermark(&pool, "last_project_id", 112).await.unwrap();
        pool.close().await;

        assert!(db.exists());
        let reopened = init_pool(&format!("sqlite://{}", db.display())).await.unwrap();
        assert_eq!(
            get_watermark(&reopened, "last_project_id").await.unwrap(),
            Some(112)
        );
    }

    #[test]
    fn sqlite_url_normalization() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://x/y"),
            "postgres://x/y"
        );
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("nested").join("w.db");
        let url = format!("sqlite://{}?mode=rwc", db.display());
        assert_eq!(prepare_sqlite_url(&url), url);
        assert!(td.path().join("nested").exists());
    }
}
