//! Revoked-token denylist backed by an expiring key-value store.
//!
//! Entries are keyed by the raw token under a namespaced prefix and carry a
//! TTL equal to the token's remaining lifetime at revocation time, so a
//! denylist entry never outlives the credential it revokes and no cleanup
//! task is needed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;

const DENYLIST_KEY_PREFIX: &str = "collega:denylist:";

/// Expiring revocation store consulted by every bearer-credential consumer.
#[async_trait]
pub trait DenyStore: Send + Sync {
    /// Mark a token revoked for `ttl_seconds`.
    async fn deny(&self, token: &str, ttl_seconds: u64) -> Result<()>;

    /// Whether the token is currently revoked.
    async fn contains(&self, token: &str) -> Result<bool>;
}

fn denylist_key(token: &str) -> String {
    format!("{DENYLIST_KEY_PREFIX}{token}")
}

/// Redis-backed denylist; entries self-expire via `SET ... EX`.
pub struct RedisDenylist {
    manager: ConnectionManager,
}

impl RedisDenylist {
    /// Connect and build the shared connection manager.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid cache URL")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("failed to connect to cache")?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl DenyStore for RedisDenylist {
    async fn deny(&self, token: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(denylist_key(token))
            .arg("1")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut conn)
            .await
            .context("failed to write denylist entry")?;
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(denylist_key(token))
            .query_async(&mut conn)
            .await
            .context("failed to check denylist entry")?;
        Ok(exists)
    }
}

/// In-memory denylist with real TTL semantics, for tests.
#[cfg(test)]
pub(crate) struct MemoryDenylist {
    entries: std::sync::Mutex<std::collections::HashMap<String, i64>>,
}

#[cfg(test)]
impl MemoryDenylist {
    pub(crate) fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub(crate) fn ttl_seconds(&self, token: &str) -> Option<i64> {
        let entries = self.entries.lock().expect("denylist lock poisoned");
        entries
            .get(&denylist_key(token))
            .map(|expires_at| expires_at - chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
#[async_trait]
impl DenyStore for MemoryDenylist {
    async fn deny(&self, token: &str, ttl_seconds: u64) -> Result<()> {
        let expires_at = chrono::Utc::now().timestamp() + i64::try_from(ttl_seconds)?;
        let mut entries = self.entries.lock().expect("denylist lock poisoned");
        entries.insert(denylist_key(token), expires_at);
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries.lock().expect("denylist lock poisoned");
        match entries.get(&denylist_key(token)) {
            Some(expires_at) if *expires_at > now => Ok(true),
            Some(_) => {
                // Expired entries behave as absent, like the real store.
                entries.remove(&denylist_key(token));
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(
            denylist_key("abc.def.ghi"),
            "collega:denylist:abc.def.ghi"
        );
    }

    #[tokio::test]
    async fn memory_denylist_expires_entries() -> Result<()> {
        let denylist = MemoryDenylist::new();
        denylist.deny("live", 60).await?;
        denylist.deny("dead", 0).await?;

        assert!(denylist.contains("live").await?);
        assert!(!denylist.contains("dead").await?);
        assert!(!denylist.contains("never-denied").await?);
        Ok(())
    }
}
