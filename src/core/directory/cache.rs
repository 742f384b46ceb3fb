use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

use super::{AgentProfile, Directory, DirectoryResult};
use crate::core::credentials::ProviderId;

const MAX_CACHED_KEYS: u64 = 10_000;

/// Caches provider key lookups of an inner directory for a bounded time.
///
/// Only keys that exist are cached, so a key added upstream becomes visible
/// on the next lookup while a revoked key lingers for at most the TTL.
/// Organization, agent and collection lookups always hit the inner directory.
pub struct CachedDirectory {
    inner: Arc<dyn Directory>,
    keys: Cache<(String, ProviderId), Arc<Zeroizing<String>>>,
}

impl CachedDirectory {
    pub fn new(inner: Arc<dyn Directory>, ttl: Duration) -> Self {
        let keys = Cache::builder()
            .max_capacity(MAX_CACHED_KEYS)
            .time_to_live(ttl)
            .build();
        Self { inner, keys }
    }
}

#[async_trait]
impl Directory for CachedDirectory {
    async fn organization_for_user(&self, user_id: &str) -> DirectoryResult<Option<String>> {
        self.inner.organization_for_user(user_id).await
    }

    async fn agent(&self, org_id: &str, agent_id: &str) -> DirectoryResult<Option<AgentProfile>> {
        self.inner.agent(org_id, agent_id).await
    }

    async fn provider_key(
        &self,
        org_id: &str,
        provider: ProviderId,
    ) -> DirectoryResult<Option<String>> {
        let cache_key = (org_id.to_string(), provider);
        if let Some(key) = self.keys.get(&cache_key).await {
            debug!(org_id, provider = %provider, "Provider key served from cache");
            return Ok(Some(key.as_str().to_string()));
        }

        let key = self.inner.provider_key(org_id, provider).await?;
        if let Some(key) = &key {
            self.keys
                .insert(cache_key, Arc::new(Zeroizing::new(key.clone())))
                .await;
        }
        Ok(key)
    }

    async fn knowledge_collection(&self, agent_id: &str) -> DirectoryResult<Option<String>> {
        self.inner.knowledge_collection(agent_id).await
    }
}
