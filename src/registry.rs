//! The publication registry: a persistent mapping from post name to the date
//! the post was first published. Each collection directory gets its own
//! store. An entry is written at most once; the store rejects a second entry
//! for the same post rather than overwriting the first.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// The file name of the store created inside a collection directory.
pub const DEFAULT_FILE_NAME: &str = "blog.sqlite";

/// Get and set publication dates for the posts of one collection.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Creates the backing structures if they are missing. Running it again
    /// against an initialized store does nothing.
    async fn initialize(&self) -> Result<()>;

    /// Returns the stored publication date for `name`, or `None` if the post
    /// has never been published.
    async fn get(&self, name: &str) -> Result<Option<NaiveDate>>;

    /// Records the publication date for `name` and returns the stored date.
    /// `None` stores today's date (UTC). Explicit dates are truncated to their
    /// UTC calendar date. Fails with [`Error::DuplicateEntry`] if `name`
    /// already has a date; callers should [`Registry::get`] first.
    async fn set(&self, name: &str, date: Option<DateTime<Utc>>) -> Result<NaiveDate>;

    /// The location of the backing store.
    fn location(&self) -> &Path;
}

/// The kinds of store a registry can be backed by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
}

/// Settings for opening registries.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    pub backend: Backend,

    /// File name of the store, relative to the collection directory.
    pub file_name: String,

    /// Upper bound on open connections per store.
    pub max_connections: u32,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        RegistryOptions {
            backend: Backend::default(),
            file_name: DEFAULT_FILE_NAME.to_owned(),
            max_connections: 1,
        }
    }
}

impl RegistryOptions {
    /// Opens and initializes the registry for the collection in `directory`
    /// using the configured [`Backend`].
    pub async fn open(&self, directory: &Path) -> Result<Arc<dyn Registry>> {
        match self.backend {
            Backend::Sqlite => {
                let registry = SqliteRegistry::open(
                    directory.join(&self.file_name),
                    self.max_connections,
                )
                .await?;
                registry.initialize().await?;
                Ok(Arc::new(registry))
            }
        }
    }
}

/// A [`Registry`] stored in a SQLite database file.
#[derive(Clone, Debug)]
pub struct SqliteRegistry {
    pool: SqlitePool,
    location: PathBuf,
}

impl SqliteRegistry {
    /// Connects to the database at `location`, creating the file if it
    /// doesn't exist. The schema is not touched; see
    /// [`Registry::initialize`].
    pub async fn open(location: PathBuf, max_connections: u32) -> Result<SqliteRegistry> {
        let options = SqliteConnectOptions::new()
            .filename(&location)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        tracing::debug!(location = %location.display(), "opened publication registry");
        Ok(SqliteRegistry { pool, location })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Registry for SqliteRegistry {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                name TEXT NOT NULL,
                dt_posted DATE DEFAULT CURRENT_DATE
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS name_idx ON posts (name)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<NaiveDate>> {
        let date = sqlx::query_scalar::<_, NaiveDate>("SELECT dt_posted FROM posts WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(date)
    }

    async fn set(&self, name: &str, date: Option<DateTime<Utc>>) -> Result<NaiveDate> {
        let query = match date {
            None => sqlx::query_scalar::<_, NaiveDate>(
                "INSERT INTO posts (name) VALUES (?) RETURNING dt_posted",
            )
            .bind(name),
            Some(date) => sqlx::query_scalar::<_, NaiveDate>(
                "INSERT INTO posts (name, dt_posted) VALUES (?, ?) RETURNING dt_posted",
            )
            .bind(name)
            .bind(date.date_naive()),
        };

        query.fetch_one(&self.pool).await.map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::DuplicateEntry {
                name: name.to_owned(),
            },
            other => Error::Storage(other),
        })
    }

    fn location(&self) -> &Path {
        &self.location
    }
}

/// Represents the result of a registry operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading or writing publication dates.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a publication date is set for a post that already has
    /// one.
    #[error("post '{name}' has already been published")]
    DuplicateEntry { name: String },

    /// Returned when the backing store fails.
    #[error("publication registry: {0}")]
    Storage(#[from] sqlx::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    async fn open(dir: &Path) -> Result<Arc<dyn Registry>> {
        RegistryOptions::default().open(dir).await
    }

    #[tokio::test]
    async fn test_location_and_file_creation() -> Result<()> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let registry = open(dir.path()).await?;
        assert_eq!(dir.path().join("blog.sqlite"), registry.location());
        assert!(registry.location().is_file());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_without_entry() -> Result<()> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let registry = open(dir.path()).await?;
        assert_eq!(None, registry.get("test.md").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_today_then_get() -> Result<()> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let registry = open(dir.path()).await?;

        let before = Utc::now().date_naive();
        let stored = registry.set("test.md", None).await?;
        let after = Utc::now().date_naive();
        assert!(stored == before || stored == after);
        assert_eq!(Some(stored), registry.get("test.md").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_explicit_date_truncates_time() -> Result<()> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let registry = open(dir.path()).await?;

        let date = Utc.with_ymd_and_hms(2024, 1, 1, 17, 45, 12).unwrap();
        let wanted = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(wanted, registry.set("test.md", Some(date)).await?);
        assert_eq!(Some(wanted), registry.get("test.md").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_twice_is_duplicate() -> Result<()> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let registry = open(dir.path()).await?;

        let first = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        registry.set("test.md", Some(first)).await?;
        match registry.set("test.md", None).await {
            Err(Error::DuplicateEntry { name }) => assert_eq!("test.md", name),
            other => panic!("expected a duplicate entry error, got {:?}", other),
        }
        assert_eq!(Some(first.date_naive()), registry.get("test.md").await?);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_has_one_winner() -> Result<()> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let options = RegistryOptions {
            max_connections: 8,
            ..RegistryOptions::default()
        };
        let registry = options.open(dir.path()).await?;

        for round in 0..20 {
            let name = format!("race-{}.md", round);
            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    let name = name.clone();
                    tokio::spawn(async move { registry.set(&name, None).await })
                })
                .collect();

            let mut results = Vec::new();
            for task in tasks {
                results.push(task.await.map_err(|err| sqlx::Error::Io(err.into()))?);
            }
            assert_eq!(1, results.iter().filter(|r| r.is_ok()).count());
            assert_eq!(
                3,
                results
                    .iter()
                    .filter(|r| matches!(r, Err(Error::DuplicateEntry { .. })))
                    .count()
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let date = Utc.with_ymd_and_hms(2022, 2, 2, 0, 0, 0).unwrap();
        {
            let registry = open(dir.path()).await?;
            registry.set("kept.md", Some(date)).await?;
            registry.initialize().await?;
        }

        // a fresh handle against the existing file keeps its entries
        let reopened = open(dir.path()).await?;
        assert_eq!(Some(date.date_naive()), reopened.get("kept.md").await?);
        Ok(())
    }
}
