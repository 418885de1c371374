//! Response cache for slow-changing service data.
//!
//! Type metadata, state colors and attachments rarely change between
//! exports; queries and work items are always fetched fresh. Entries are
//! namespaced by organization URL so one cache file can serve several
//! configurations.

use crate::client::{StateColors, TrackerClient};
use crate::error::Result;
use async_trait::async_trait;
use bex_core::{CacheMode, QuerySpec, WorkItemRecord, WorkItemType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

const CACHE_DIR: &str = ".bex";
const CACHE_FILE: &str = "cache.json";

const KIND_TYPES: &str = "types";
const KIND_STATES: &str = "states";
const KIND_ATTACHMENTS: &str = "attachments";

/// A mode-aware key-value store. In `persistent` mode the whole map is
/// flushed to `.bex/cache.json` under the given root on every write.
pub struct Cache {
    mode: CacheMode,
    file: Option<PathBuf>,
    namespace: String,
    entries: Mutex<HashMap<String, Value>>,
}

impl Cache {
    /// Open a cache rooted at `root` (only used in persistent mode).
    ///
    /// # Errors
    /// Fails when an existing cache file cannot be read or parsed.
    pub fn open(mode: CacheMode, organization_url: &str, root: &Path) -> Result<Self> {
        let (file, entries) = match mode {
            CacheMode::Persistent => {
                let file = root.join(CACHE_DIR).join(CACHE_FILE);
                let entries = if file.exists() {
                    serde_json::from_str(&fs::read_to_string(&file)?)?
                } else {
                    HashMap::new()
                };
                (Some(file), entries)
            }
            CacheMode::Memory | CacheMode::Off => (None, HashMap::new()),
        };

        Ok(Self {
            mode,
            file,
            namespace: organization_url.trim_end_matches('/').to_string(),
            entries: Mutex::new(entries),
        })
    }

    /// Look up a typed entry. Always misses in `off` mode.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, kind: &str, key: &str) -> Option<T> {
        if self.mode == CacheMode::Off {
            return None;
        }
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let value = entries.get(&self.entry_key(kind, key))?.clone();
        serde_json::from_value(value).ok()
    }

    /// Store a typed entry. A no-op in `off` mode.
    ///
    /// # Errors
    /// Fails when the persistent cache file cannot be written.
    pub fn set<T: Serialize>(&self, kind: &str, key: &str, value: &T) -> Result<()> {
        if self.mode == CacheMode::Off {
            return Ok(());
        }

        let serialized = serde_json::to_value(value)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(self.entry_key(kind, key), serialized);

        if let Some(file) = &self.file {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(file, serde_json::to_string_pretty(&*entries)?)?;
            debug!(path = %file.display(), "cache flushed");
        }
        Ok(())
    }

    fn entry_key(&self, kind: &str, key: &str) -> String {
        format!("{}:{kind}:{key}", self.namespace)
    }
}

/// A [`TrackerClient`] decorator that serves type metadata, state colors
/// and attachments from the cache. Queries and work item fetches always
/// pass through.
pub struct CachingClient<C> {
    inner: C,
    cache: Cache,
}

impl<C: TrackerClient> CachingClient<C> {
    #[must_use]
    pub const fn new(inner: C, cache: Cache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<C: TrackerClient> TrackerClient for CachingClient<C> {
    async fn fetch_items(&self, project: &str, ids: &[u64]) -> Result<Vec<WorkItemRecord>> {
        self.inner.fetch_items(project, ids).await
    }

    async fn run_query(&self, project: &str, query: &QuerySpec) -> Result<Vec<u64>> {
        self.inner.run_query(project, query).await
    }

    async fn fetch_types(&self, project: &str) -> Result<Vec<WorkItemType>> {
        if let Some(types) = self.cache.get(KIND_TYPES, project) {
            debug!(project, "work item types served from cache");
            return Ok(types);
        }
        let types = self.inner.fetch_types(project).await?;
        self.cache.set(KIND_TYPES, project, &types)?;
        Ok(types)
    }

    async fn fetch_state_colors(
        &self,
        project: &str,
        type_names: &[String],
    ) -> Result<StateColors> {
        let key = format!("{project}:{}", type_names.join(","));
        if let Some(colors) = self.cache.get(KIND_STATES, &key) {
            debug!(project, "state colors served from cache");
            return Ok(colors);
        }
        let colors = self.inner.fetch_state_colors(project, type_names).await?;
        self.cache.set(KIND_STATES, &key, &colors)?;
        Ok(colors)
    }

    async fn resolve_attachment(&self, url: &str) -> Result<Option<String>> {
        if let Some(data) = self.cache.get::<String>(KIND_ATTACHMENTS, url) {
            return Ok(Some(data));
        }
        let resolved = self.inner.resolve_attachment(url).await?;
        if let Some(data) = &resolved {
            self.cache.set(KIND_ATTACHMENTS, url, data)?;
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ORG: &str = "https://dev.azure.com/acme";

    #[test]
    fn memory_cache_round_trips_values() {
        let cache = Cache::open(CacheMode::Memory, ORG, Path::new("/nonexistent")).unwrap();

        assert_eq!(cache.get::<String>("k", "a"), None);
        cache.set("k", "a", &"hello".to_string()).unwrap();
        assert_eq!(cache.get::<String>("k", "a"), Some("hello".to_string()));
    }

    #[test]
    fn off_mode_never_stores() {
        let cache = Cache::open(CacheMode::Off, ORG, Path::new("/nonexistent")).unwrap();

        cache.set("k", "a", &1_u32).unwrap();
        assert_eq!(cache.get::<u32>("k", "a"), None);
    }

    #[test]
    fn persistent_cache_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();

        let cache = Cache::open(CacheMode::Persistent, ORG, dir.path()).unwrap();
        cache.set("k", "a", &vec![1_u32, 2, 3]).unwrap();

        let reopened = Cache::open(CacheMode::Persistent, ORG, dir.path()).unwrap();
        assert_eq!(reopened.get::<Vec<u32>>("k", "a"), Some(vec![1, 2, 3]));

        // A different organization namespace does not see the entry.
        let other = Cache::open(CacheMode::Persistent, "https://other", dir.path()).unwrap();
        assert_eq!(other.get::<Vec<u32>>("k", "a"), None);
    }

    struct CountingInner {
        type_calls: AtomicUsize,
    }

    #[async_trait]
    impl TrackerClient for CountingInner {
        async fn fetch_items(&self, _: &str, _: &[u64]) -> Result<Vec<WorkItemRecord>> {
            Ok(vec![])
        }

        async fn run_query(&self, _: &str, _: &QuerySpec) -> Result<Vec<u64>> {
            Ok(vec![])
        }

        async fn fetch_types(&self, _: &str) -> Result<Vec<WorkItemType>> {
            self.type_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![WorkItemType {
                name: "Epic".to_string(),
                color: "ff7b00".to_string(),
                icon: None,
            }])
        }

        async fn fetch_state_colors(&self, _: &str, _: &[String]) -> Result<StateColors> {
            Ok(StateColors::new())
        }

        async fn resolve_attachment(&self, _: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn caching_client_fetches_types_once() {
        let inner = CountingInner {
            type_calls: AtomicUsize::new(0),
        };
        let cache = Cache::open(CacheMode::Memory, ORG, Path::new("/nonexistent")).unwrap();
        let client = CachingClient::new(inner, cache);

        let first = client.fetch_types("proj").await.unwrap();
        let second = client.fetch_types("proj").await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, second[0].name);
        assert_eq!(client.inner.type_calls.load(Ordering::SeqCst), 1);
    }
}
