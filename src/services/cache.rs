//! Redis access for carts and cached lookups.
//!
//! Values are JSON strings with a TTL. Read errors degrade to a miss, so a
//! Redis hiccup empties a cart view instead of failing the request.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const SCAN_BATCH: usize = 500;

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!(default_ttl_seconds, "Redis connected");
        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    /// Cached value, or `None` on a miss, a Redis error or a stale shape.
    #[instrument(skip(self), fields(hit = tracing::field::Empty))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        let raw = match conn.get::<_, Option<String>>(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Redis GET failed");
                None
            }
        };

        let value = raw.and_then(|data| match serde_json::from_str::<T>(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                // written by an older build; treat as a miss and let it expire
                warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        });
        tracing::Span::current().record("hit", value.is_some());
        value
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    #[instrument(skip(self, value))]
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let data = serde_json::to_string(value).context("Failed to encode cache value")?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, data, ttl.as_secs().max(1))
            .await
            .with_context(|| format!("Failed to write cache key {key}"))?;
        debug!(key, ttl_secs = ttl.as_secs(), "Cache write");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn
            .del(key)
            .await
            .with_context(|| format!("Failed to delete cache key {key}"))?;
        Ok(deleted > 0)
    }

    /// Delete every key matching a glob such as `catalog:*`.
    ///
    /// Walks the keyspace with SCAN until the cursor returns to 0.
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .context("Failed to scan cache keys")?;

            if !keys.is_empty() {
                let removed: i64 = conn.del(&keys).await.context("Failed to delete cache keys")?;
                deleted += removed.max(0) as usize;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, deleted, "Cache pattern delete");
        Ok(deleted)
    }

    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}

/// Key layout. Everything under `catalog:` is derived from products and
/// categories and may be dropped at any time.
pub mod keys {
    pub fn cart(cart_id: &str) -> String {
        format!("cart:{cart_id}")
    }

    /// VIES answer for a normalized VAT number
    pub fn vat(full_vat_number: &str) -> String {
        format!("vat:{full_vat_number}")
    }

    /// Plain-text catalog handed to the chatbot
    pub fn catalog_context() -> String {
        "catalog:ai-context".to_string()
    }

    pub fn catalog_pattern() -> String {
        "catalog:*".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn key_formats() {
        assert_eq!(keys::cart("abc"), "cart:abc");
        assert_eq!(keys::vat("DE123456789"), "vat:DE123456789");
    }

    #[test]
    fn catalog_keys_fall_under_the_invalidation_pattern() {
        let prefix = keys::catalog_pattern();
        let prefix = prefix.trim_end_matches('*');
        assert!(keys::catalog_context().starts_with(prefix));
        assert!(!keys::cart("x").starts_with(prefix));
    }
}
