use async_trait::async_trait;
use common::domain::Project;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// How long a cached project list stays valid; a Keystone token lives an hour by default
pub const DEFAULT_PROJECT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Authorized-project lists of signed-in identities, keyed by session token
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProjectCache: Send + Sync {
    async fn get(&self, token_id: &str) -> Option<Vec<Project>>;

    async fn insert(&self, token_id: &str, projects: Vec<Project>);

    /// Forget the list so the next lookup goes back to the identity service
    async fn invalidate(&self, token_id: &str);
}

struct CacheEntry {
    stored_at: Instant,
    projects: Vec<Project>,
}

/// In-memory implementation of ProjectCache using HashMap.
/// Entries older than the TTL are never returned and are dropped on the next insert.
pub struct InMemoryProjectCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl InMemoryProjectCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_PROJECT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }
}

impl Default for InMemoryProjectCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectCache for InMemoryProjectCache {
    async fn get(&self, token_id: &str) -> Option<Vec<Project>> {
        let entries = self.entries.read().await;
        entries
            .get(token_id)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.projects.clone())
    }

    async fn insert(&self, token_id: &str, projects: Vec<Project>) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| self.is_fresh(entry));
        entries.insert(
            token_id.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                projects,
            },
        );
    }

    async fn invalidate(&self, token_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(token_id);
    }
}
