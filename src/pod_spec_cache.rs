use crate::k8s::resources::PodResourceSpec;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local TTL cache of per-pod resource requests and limits.
///
/// Pod specs change rarely, so the SSE stream and job monitor read them from
/// here instead of hitting the cluster API every 5 seconds. Entries past the
/// TTL are never served; two concurrent misses on the same pod may fetch
/// twice, which is harmless.
pub struct PodSpecCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    spec: PodResourceSpec,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatus {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
    pub ttl_seconds: i64,
}

impl PodSpecCache {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(600)
    }

    /// Fresh cached spec for `pod_name`, or `None` on miss/expiry.
    pub async fn get(&self, pod_name: &str) -> Option<PodResourceSpec> {
        let entries = self.entries.read().await;
        let entry = entries.get(pod_name)?;
        if Utc::now() - entry.fetched_at < self.ttl {
            Some(entry.spec.clone())
        } else {
            None
        }
    }

    pub async fn insert(&self, pod_name: &str, spec: PodResourceSpec) {
        let mut entries = self.entries.write().await;
        entries.insert(
            pod_name.to_string(),
            CacheEntry {
                spec,
                fetched_at: Utc::now(),
            },
        );
    }

    /// Drops entries older than the TTL. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now - entry.fetched_at < self.ttl);
        before - entries.len()
    }

    pub async fn status(&self) -> CacheStatus {
        let now = Utc::now();
        let entries = self.entries.read().await;
        let active = entries
            .values()
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .count();
        CacheStatus {
            total_entries: entries.len(),
            active_entries: active,
            expired_entries: entries.len() - active,
            ttl_seconds: self.ttl.num_seconds(),
        }
    }

    pub async fn cached_pods(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(cpu_limit: f64) -> PodResourceSpec {
        PodResourceSpec {
            cpu_request_millicores: 100.0,
            cpu_limit_millicores: cpu_limit,
            memory_request_mb: 128.0,
            memory_limit_mb: 256.0,
        }
    }

    #[tokio::test]
    async fn returns_fresh_entries() {
        let cache = PodSpecCache::new(600);
        cache.insert("pod-a", spec(500.0)).await;
        let hit = cache.get("pod-a").await.unwrap();
        assert_eq!(hit.cpu_limit_millicores, 500.0);
    }

    #[tokio::test]
    async fn never_serves_expired_entries() {
        let cache = PodSpecCache::new(0);
        cache.insert("pod-a", spec(500.0)).await;
        assert!(cache.get("pod-a").await.is_none());
    }

    #[tokio::test]
    async fn cleanup_drops_only_expired() {
        let cache = PodSpecCache::new(0);
        cache.insert("stale", spec(500.0)).await;
        let dropped = cache.cleanup().await;
        assert_eq!(dropped, 1);
        assert_eq!(cache.status().await.total_entries, 0);
    }

    #[tokio::test]
    async fn status_counts_active_entries() {
        let cache = PodSpecCache::new(600);
        cache.insert("pod-a", spec(500.0)).await;
        cache.insert("pod-b", spec(1000.0)).await;
        let status = cache.status().await;
        assert_eq!(status.total_entries, 2);
        assert_eq!(status.active_entries, 2);
        assert_eq!(status.expired_entries, 0);
    }
}
