use crate::config::Settings;
use crate::pod_spec_cache::PodSpecCache;
use crate::resource_buffers::ResourceBufferMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

const STALE_BUFFER_AGE_MINUTES: i64 = 30;
const FORCED_CLEANUP_AGE_MINUTES: i64 = 15;
const MEMORY_PRESSURE_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CleanupStats {
    pub total_cleanups: u64,
    pub pod_cache_cleanups: u64,
    pub metrics_buffer_cleanups: u64,
    pub last_cleanup_time: Option<DateTime<Utc>>,
    pub active_jobs: usize,
    pub active_pods_cached: usize,
}

/// Periodic sweep of expired pod-spec cache entries and abandoned metric
/// buffers, with an RSS check that forces a more aggressive sweep under
/// memory pressure.
pub struct CacheCleanupController {
    pod_spec_cache: Arc<PodSpecCache>,
    buffers: Arc<ResourceBufferMap>,
    stats: Arc<Mutex<CleanupStats>>,
    cleanup_interval: Duration,
    memory_check_interval: Duration,
}

impl CacheCleanupController {
    pub fn new(
        pod_spec_cache: Arc<PodSpecCache>,
        buffers: Arc<ResourceBufferMap>,
        stats: Arc<Mutex<CleanupStats>>,
        settings: &Settings,
    ) -> Self {
        Self {
            pod_spec_cache,
            buffers,
            stats,
            cleanup_interval: Duration::from_secs(settings.scheduler.cleanup_interval),
            memory_check_interval: Duration::from_secs(settings.scheduler.memory_check_interval),
        }
    }

    pub async fn run_loop(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Cache cleanup controller started with {}s interval",
            self.cleanup_interval.as_secs()
        );
        let checks_per_memory_sweep =
            (self.memory_check_interval.as_secs() / self.cleanup_interval.as_secs()).max(1);
        let mut ticks: u64 = 0;

        loop {
            self.sweep().await;

            ticks += 1;
            if ticks % checks_per_memory_sweep == 0 {
                self.check_memory_pressure().await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cleanup_interval) => {}
                _ = shutdown.changed() => {
                    info!("Cache cleanup controller stopping");
                    return;
                }
            }
        }
    }

    /// One regular sweep. Also usable as a manual trigger from the debug
    /// surface; returns (cache entries dropped, buffer maps dropped).
    pub async fn sweep(&self) -> (usize, usize) {
        let cache_dropped = self.pod_spec_cache.cleanup().await;
        if cache_dropped > 0 {
            info!("Cleaned up {cache_dropped} expired pod spec cache entries");
        }

        let dropped_jobs = self
            .buffers
            .cleanup_stale(ChronoDuration::minutes(STALE_BUFFER_AGE_MINUTES))
            .await;
        if !dropped_jobs.is_empty() {
            info!("Cleaned up metric buffers for jobs: {dropped_jobs:?}");
        }

        let buffer_status = self.buffers.status().await;
        let cache_status = self.pod_spec_cache.status().await;

        let mut stats = self.stats.lock().await;
        stats.total_cleanups += 1;
        stats.pod_cache_cleanups += cache_dropped as u64;
        stats.metrics_buffer_cleanups += dropped_jobs.len() as u64;
        stats.last_cleanup_time = Some(Utc::now());
        stats.active_jobs = buffer_status.active_jobs;
        stats.active_pods_cached = cache_status.active_entries;

        (cache_dropped, dropped_jobs.len())
    }

    async fn check_memory_pressure(&self) {
        let Some(rss) = process_rss_bytes() else {
            debug!("Process RSS unavailable, skipping memory check");
            return;
        };

        let rss_mb = rss / (1024 * 1024);
        if rss < MEMORY_PRESSURE_BYTES {
            debug!("Memory usage: {rss_mb}MB");
            return;
        }

        warn!("Memory usage over 1GiB ({rss_mb}MB), forcing aggressive buffer cleanup");
        let dropped = self
            .buffers
            .cleanup_stale(ChronoDuration::minutes(FORCED_CLEANUP_AGE_MINUTES))
            .await;
        if !dropped.is_empty() {
            warn!("Force cleaned {} jobs due to memory pressure", dropped.len());
            let mut stats = self.stats.lock().await;
            stats.metrics_buffer_cleanups += dropped.len() as u64;
        }
    }
}

fn process_rss_bytes() -> Option<u64> {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        ProcessRefreshKind::new().with_memory(),
    );
    system.process(pid).map(|process| process.memory())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_is_readable_for_current_process() {
        let rss = process_rss_bytes();
        assert!(rss.is_some());
        assert!(rss.unwrap() > 0);
    }

    #[tokio::test]
    async fn sweep_updates_stats() {
        let cache = Arc::new(PodSpecCache::new(0));
        cache
            .insert("expired-pod", crate::k8s::resources::PodResourceSpec::default())
            .await;
        let buffers = Arc::new(ResourceBufferMap::new());
        buffers.with_pod_buffers("dead-job", "pod", |_| {}).await;

        let stats = Arc::new(Mutex::new(CleanupStats::default()));
        let settings = test_settings();
        let controller =
            CacheCleanupController::new(cache, buffers, stats.clone(), &settings);

        let (cache_dropped, buffers_dropped) = controller.sweep().await;
        assert_eq!(cache_dropped, 1);
        assert_eq!(buffers_dropped, 1);

        let stats = stats.lock().await;
        assert_eq!(stats.total_cleanups, 1);
        assert_eq!(stats.pod_cache_cleanups, 1);
        assert_eq!(stats.metrics_buffer_cleanups, 1);
        assert!(stats.last_cleanup_time.is_some());
    }

    fn test_settings() -> Settings {
        std::env::remove_var("CACHE_CLEANUP_INTERVAL");
        std::env::remove_var("MEMORY_CHECK_INTERVAL");
        Settings::from_env().expect("test settings")
    }
}
