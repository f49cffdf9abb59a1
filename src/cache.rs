//! Cache Layer (CL), §4.6. Cache-aside in front of embeddings and hybrid
//! search results. Same posture as the Vector Index: every failure logs
//! and degrades to a cache miss rather than propagating.

use std::sync::atomic::{AtomicBool, Ordering};

use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::config::Config;

const EMBEDDING_PREFIX: &str = "emb";
const SEARCH_PREFIX: &str = "search";

/// First 8 hex characters of the SHA-256 digest (§4.6 `sha256_8`).
pub fn sha256_8(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let full = format!("{digest:x}");
    full[..8].to_string()
}

pub fn embedding_key(query: &str) -> String {
    format!("{EMBEDDING_PREFIX}:{}", sha256_8(query))
}

pub fn search_key(canonical_key: &str) -> String {
    format!("{SEARCH_PREFIX}:{}", sha256_8(canonical_key))
}

pub struct Cache {
    manager: Option<redis::aio::ConnectionManager>,
    ttl_seconds: u64,
    available: AtomicBool,
}

impl Cache {
    pub async fn new(config: &Config) -> Self {
        let manager = match redis::Client::open(config.cache_url.clone()) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(manager) => Some(manager),
                Err(err) => {
                    tracing::warn!(%err, "cache connection failed, running without cache");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(%err, "invalid cache url, running without cache");
                None
            }
        };

        Self {
            available: AtomicBool::new(manager.is_some()),
            manager,
            ttl_seconds: config.cache_ttl_seconds,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn mark(&self, ok: bool) {
        self.available.store(ok, Ordering::Relaxed);
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let Some(manager) = &self.manager else { return None };
        let mut conn = manager.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => {
                self.mark(true);
                value
            }
            Err(err) => {
                tracing::warn!(%err, %key, "cache read failed");
                self.mark(false);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) {
        let Some(manager) = &self.manager else { return };
        let mut conn = manager.clone();
        if let Err(err) = conn.set_ex::<_, _, ()>(key, value, self.ttl_seconds).await {
            tracing::warn!(%err, %key, "cache write failed");
            self.mark(false);
        } else {
            self.mark(true);
        }
    }

    pub async fn get_embedding(&self, query: &str) -> Option<Vec<f32>> {
        let raw = self.get(&embedding_key(query)).await?;
        match serde_json::from_str(&raw) {
            Ok(vector) => Some(vector),
            Err(err) => {
                tracing::warn!(%err, "cached embedding payload was not valid json, treating as miss");
                None
            }
        }
    }

    pub async fn set_embedding(&self, query: &str, embedding: &[f32]) {
        if let Ok(serialized) = serde_json::to_string(embedding) {
            self.set(&embedding_key(query), &serialized).await;
        }
    }

    pub async fn get_search<T: serde::de::DeserializeOwned>(&self, canonical_key: &str) -> Option<T> {
        let raw = self.get(&search_key(canonical_key)).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%err, "cached search payload was not valid json, treating as miss");
                None
            }
        }
    }

    pub async fn set_search<T: serde::Serialize>(&self, canonical_key: &str, value: &T) {
        if let Ok(serialized) = serde_json::to_string(value) {
            self.set(&search_key(canonical_key), &serialized).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_8_is_eight_hex_chars_and_stable() {
        let a = sha256_8("chicken soup");
        let b = sha256_8("chicken soup");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn embedding_and_search_keys_are_namespaced_and_distinct() {
        assert!(embedding_key("chicken").starts_with("emb:"));
        assert!(search_key("chicken").starts_with("search:"));
        assert_ne!(embedding_key("chicken"), search_key("chicken"));
    }
}
