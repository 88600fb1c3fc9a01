//! # Response Cache
//!
//! Successful lookups and address verifications are cached under a hash of
//! the exact request payload, so any change to the cart, destination or
//! exemption produces a new key.
//!
//! ```text
//! "taxcloud_rates_"   + hex(sha256(json(LookupRequest)))
//! "taxcloud_address_" + hex(sha256(json(VerifyAddressRequest)))
//! ```
//!
//! Two backends: [`MemoryCache`] for a single process and [`RedisCache`] for
//! several checkout nodes sharing one instance.

use moka::future::Cache;
use moka::Expiry;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::{Duration, Instant as StdInstant};
use tracing::info;

use crate::config::{CacheBackend, CacheSettings};
use crate::error::{ClientError, ClientResult};

/// Key prefix of cached lookups.
pub const RATES_PREFIX: &str = "taxcloud_rates_";

/// Key prefix of cached address verifications.
pub const ADDRESS_PREFIX: &str = "taxcloud_address_";

/// Builds a cache key from a prefix and the serialized request.
pub fn cache_key(prefix: &str, request: &impl Serialize) -> ClientResult<String> {
    let bytes = serde_json::to_vec(request)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{prefix}{}", hex::encode(digest)))
}

// =============================================================================
// Cache Seam
// =============================================================================

/// String cache with per-entry expiry.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = ClientResult<Option<String>>> + Send;

    fn set(&self, key: &str, value: String, ttl: Duration) -> impl Future<Output = ClientResult<()>> + Send;
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// Entry bound used by [`MemoryCache::new`].
pub const MEMORY_MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct CachedResponse {
    body: String,
    ttl: Duration,
}

/// Expires every entry after the lifetime it was stored with.
struct StoredLifetime;

impl Expiry<String, CachedResponse> for StoredLifetime {
    fn expire_after_create(&self, _key: &String, entry: &CachedResponse, _created_at: StdInstant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CachedResponse,
        _updated_at: StdInstant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Per-process cache, bounded in size. Expired entries are evicted during
/// cache maintenance whether or not they are read again.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, CachedResponse>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(MEMORY_MAX_CAPACITY)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(StoredLifetime)
            .build();
        Self { entries }
    }

    /// Number of live entries, after pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.entries.get(key).await.map(|entry| entry.body))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> ClientResult<()> {
        let entry = CachedResponse { body: value, ttl };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }
}

// =============================================================================
// Redis Backend
// =============================================================================

/// Redis-backed cache using `SET key value EX ttl`.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> ClientResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!(target: "taxcloud", "Connected to Redis response cache");
        Ok(Self { manager })
    }
}

impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> ClientResult<()> {
        let mut conn = self.manager.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, secs).await?;
        Ok(())
    }
}

// =============================================================================
// Configured Backend
// =============================================================================

/// The backend selected in `[cache]`.
#[derive(Clone)]
pub enum CacheStore {
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl CacheStore {
    pub async fn from_settings(settings: &CacheSettings) -> ClientResult<Self> {
        match settings.backend {
            CacheBackend::Memory => Ok(CacheStore::Memory(MemoryCache::with_capacity(settings.memory_capacity))),
            CacheBackend::Redis => {
                let url = settings.redis_url.as_deref().ok_or_else(|| {
                    ClientError::InvalidConfig("redis_url is required for the redis cache backend".into())
                })?;
                Ok(CacheStore::Redis(RedisCache::connect(url).await?))
            }
        }
    }
}

impl ResponseCache for CacheStore {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        match self {
            CacheStore::Memory(cache) => cache.get(key).await,
            CacheStore::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> ClientResult<()> {
        match self {
            CacheStore::Memory(cache) => cache.set(key, value, ttl).await,
            CacheStore::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_is_prefixed_sha256() {
        let key = cache_key(RATES_PREFIX, &json!({"cartID": "1"})).unwrap();
        assert!(key.starts_with("taxcloud_rates_"));
        assert_eq!(key.len(), RATES_PREFIX.len() + 64);
        assert!(key[RATES_PREFIX.len()..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_cache_key_depends_on_payload() {
        let a = cache_key(RATES_PREFIX, &json!({"cartID": "1"})).unwrap();
        let b = cache_key(RATES_PREFIX, &json!({"cartID": "2"})).unwrap();
        let c = cache_key(ADDRESS_PREFIX, &json!({"cartID": "1"})).unwrap();
        assert_ne!(a, b);
        assert_ne!(a[RATES_PREFIX.len()..], b[RATES_PREFIX.len()..]);
        assert_eq!(a[RATES_PREFIX.len()..], c[ADDRESS_PREFIX.len()..]);
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.len().await, 1);

        cache.set("k", "w".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("w"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.set("short", "v".into(), Duration::from_millis(50)).await.unwrap();
        cache.set("long", "v".into(), Duration::from_secs(600)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_cache_evicts_unread_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..500 {
            cache.set(&format!("rates_{i}"), "v".into(), Duration::from_millis(50)).await.unwrap();
        }

        // Expired keys are never read again; eviction must still reclaim them.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        cache.set("fresh", "v".into(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("fresh").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_memory_cache_is_bounded() {
        let cache = MemoryCache::with_capacity(50);
        for i in 0..500 {
            cache.set(&format!("rates_{i}"), "v".into(), Duration::from_secs(600)).await.unwrap();
        }

        assert!(cache.len().await <= 50);
    }

    #[tokio::test]
    async fn test_store_from_memory_settings() {
        let store = CacheStore::from_settings(&CacheSettings::default()).await.unwrap();
        assert!(matches!(store, CacheStore::Memory(_)));
        store.set("k", "v".into(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
