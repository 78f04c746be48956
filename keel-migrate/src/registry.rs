//! Connection options and a caller-owned cache of executors.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::executor::{ExecutionError, ExecutionResult, SqlExecutor};

/// Options used to open an executor.
///
/// Two executors are considered the same connection when their options
/// serialize to the same JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Database URL or path.
    pub url: String,
    /// Enforce foreign key constraints.
    pub foreign_keys: bool,
    /// How long to wait on a locked database.
    pub busy_timeout: Duration,
    /// Additional options as key-value pairs.
    pub extra: BTreeMap<String, String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            url: ":memory:".to_string(),
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
            extra: BTreeMap::new(),
        }
    }
}

impl ConnectionOptions {
    /// Create options for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Options for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set an extra option.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The file path named by the URL, with any `sqlite:` or `file:` scheme removed.
    pub fn path(&self) -> &str {
        let url = self.url.as_str();
        let url = url.strip_prefix("sqlite://").unwrap_or(url);
        let url = url.strip_prefix("sqlite:").unwrap_or(url);
        url.strip_prefix("file:").unwrap_or(url)
    }

    /// Whether the URL names an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        matches!(self.path(), ":memory:" | "")
    }

    /// PRAGMA statements to run after connecting.
    pub fn to_pragmas(&self) -> Vec<String> {
        let mut pragmas = vec![
            format!(
                "PRAGMA foreign_keys = {}",
                if self.foreign_keys { "ON" } else { "OFF" }
            ),
            format!("PRAGMA busy_timeout = {}", self.busy_timeout.as_millis()),
        ];
        for (key, value) in &self.extra {
            pragmas.push(format!("PRAGMA {key} = {value}"));
        }
        pragmas
    }

    /// Cache key for the registry.
    pub fn cache_key(&self) -> ExecutionResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ExecutionError::Connection(format!("unserializable options: {e}")))
    }
}

/// Shared executors, one per distinct [`ConnectionOptions`].
///
/// The registry is owned by the caller; there is no process-wide cache.
pub struct ExecutorRegistry<E> {
    executors: Mutex<HashMap<String, Arc<E>>>,
}

impl<E> Default for ExecutorRegistry<E> {
    fn default() -> Self {
        Self {
            executors: Mutex::new(HashMap::new()),
        }
    }
}

impl<E> std::fmt::Debug for ExecutorRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry").finish_non_exhaustive()
    }
}

impl<E: SqlExecutor> ExecutorRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the executor for `options`, connecting on first use.
    ///
    /// Concurrent callers with the same options share a single connect.
    pub async fn get_or_connect<F, Fut>(
        &self,
        options: &ConnectionOptions,
        connect: F,
    ) -> ExecutionResult<Arc<E>>
    where
        F: FnOnce(ConnectionOptions) -> Fut,
        Fut: Future<Output = ExecutionResult<E>>,
    {
        let key = options.cache_key()?;
        let mut executors = self.executors.lock().await;

        if let Some(existing) = executors.get(&key) {
            return Ok(Arc::clone(existing));
        }

        debug!(url = %options.url, "opening executor");
        let executor = Arc::new(connect(options.clone()).await?);
        executors.insert(key, Arc::clone(&executor));
        Ok(executor)
    }

    /// Number of cached executors.
    pub async fn len(&self) -> usize {
        self.executors.lock().await.len()
    }

    /// Check if the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.executors.lock().await.is_empty()
    }

    /// Remove and close the executor for `options`.
    pub async fn remove(&self, options: &ConnectionOptions) -> ExecutionResult<bool> {
        let key = options.cache_key()?;
        let removed = self.executors.lock().await.remove(&key);
        match removed {
            Some(executor) => {
                executor.close().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close and drop every cached executor.
    pub async fn close_all(&self) -> ExecutionResult<()> {
        let drained: Vec<_> = self.executors.lock().await.drain().map(|(_, e)| e).collect();
        for executor in drained {
            executor.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Row, SqlValue, Transaction};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct NullExecutor;

    #[async_trait]
    impl SqlExecutor for NullExecutor {
        async fn execute(&self, _sql: &str, _params: &[SqlValue]) -> ExecutionResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn begin<'a>(&'a self) -> ExecutionResult<Box<dyn Transaction + 'a>> {
            Err(ExecutionError::Transaction("unsupported".into()))
        }
    }

    #[test]
    fn test_options_builder() {
        let options = ConnectionOptions::new("sqlite://data/dev.db")
            .foreign_keys(false)
            .busy_timeout(Duration::from_millis(250))
            .set("journal_mode", "WAL");

        assert_eq!(options.path(), "data/dev.db");
        assert!(!options.is_in_memory());
        assert_eq!(
            options.to_pragmas(),
            vec![
                "PRAGMA foreign_keys = OFF".to_string(),
                "PRAGMA busy_timeout = 250".to_string(),
                "PRAGMA journal_mode = WAL".to_string(),
            ]
        );
    }

    #[test]
    fn test_in_memory_paths() {
        assert!(ConnectionOptions::in_memory().is_in_memory());
        assert!(ConnectionOptions::new("file::memory:").is_in_memory());
        assert_eq!(ConnectionOptions::new("file:dev.db").path(), "dev.db");
    }

    #[tokio::test]
    async fn test_registry_connects_once_per_options() {
        let registry = ExecutorRegistry::<NullExecutor>::new();
        let connects = AtomicUsize::new(0);
        let connect = |_| {
            connects.fetch_add(1, Ordering::SeqCst);
            async { Ok(NullExecutor) }
        };

        let a = ConnectionOptions::new("a.db");
        let first = registry.get_or_connect(&a, connect).await.unwrap();
        let second = registry.get_or_connect(&a, connect).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        let b = ConnectionOptions::new("a.db").foreign_keys(false);
        registry.get_or_connect(&b, connect).await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len().await, 2);

        assert!(registry.remove(&a).await.unwrap());
        assert!(!registry.remove(&a).await.unwrap());
        registry.close_all().await.unwrap();
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_registry_propagates_connect_failure() {
        let registry = ExecutorRegistry::<NullExecutor>::new();
        let err = registry
            .get_or_connect(&ConnectionOptions::default(), |_| async {
                Err(ExecutionError::Connection("refused".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Connection(_)));
        assert!(registry.is_empty().await);
    }
}
