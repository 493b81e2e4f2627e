use crate::metrics_buffer::SmartMetricsBuffer;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Per-pod prediction buffers for one streamed job.
pub struct PodBuffers {
    pub cpu: SmartMetricsBuffer,
    pub memory: SmartMetricsBuffer,
}

impl PodBuffers {
    fn new(pod_name: &str) -> Self {
        Self {
            cpu: SmartMetricsBuffer::percentage(&format!("{pod_name}/cpu")),
            memory: SmartMetricsBuffer::percentage(&format!("{pod_name}/memory")),
        }
    }

    fn is_empty(&self) -> bool {
        self.cpu.is_empty() && self.memory.is_empty()
    }

    fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        match (self.cpu.last_timestamp(), self.memory.last_timestamp()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}

/// Map of `job -> pod -> buffers`, shared between the SSE emitters (the only
/// writers) and the cleanup controller (reads and drops whole job subtrees).
#[derive(Default)]
pub struct ResourceBufferMap {
    inner: Mutex<HashMap<String, HashMap<String, PodBuffers>>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BufferMapStatus {
    pub active_jobs: usize,
    pub total_pod_buffers: usize,
    pub jobs: Vec<JobBufferStatus>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct JobBufferStatus {
    pub job_name: String,
    pub pod_count: usize,
    pub last_update: Option<DateTime<Utc>>,
}

impl ResourceBufferMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the buffers of `(job, pod)`, creating them on first
    /// use.
    pub async fn with_pod_buffers<R>(
        &self,
        job_name: &str,
        pod_name: &str,
        f: impl FnOnce(&mut PodBuffers) -> R,
    ) -> R {
        let mut inner = self.inner.lock().await;
        let pods = inner.entry(job_name.to_string()).or_default();
        let buffers = pods
            .entry(pod_name.to_string())
            .or_insert_with(|| PodBuffers::new(pod_name));
        f(buffers)
    }

    pub async fn drop_job(&self, job_name: &str) -> bool {
        self.inner.lock().await.remove(job_name).is_some()
    }

    /// Drops jobs whose buffers are all empty or whose most recent sample is
    /// older than `max_age`. Returns the dropped job names.
    pub async fn cleanup_stale(&self, max_age: Duration) -> Vec<String> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        let stale: Vec<String> = inner
            .iter()
            .filter(|(_, pods)| {
                if pods.is_empty() || pods.values().all(|buffers| buffers.is_empty()) {
                    return true;
                }
                let newest = pods
                    .values()
                    .filter_map(|buffers| buffers.last_timestamp())
                    .max();
                match newest {
                    Some(ts) => now - ts > max_age,
                    None => true,
                }
            })
            .map(|(job, _)| job.clone())
            .collect();

        for job in &stale {
            inner.remove(job);
        }
        stale
    }

    pub async fn status(&self) -> BufferMapStatus {
        let inner = self.inner.lock().await;
        let jobs: Vec<JobBufferStatus> = inner
            .iter()
            .map(|(job, pods)| JobBufferStatus {
                job_name: job.clone(),
                pod_count: pods.len(),
                last_update: pods
                    .values()
                    .filter_map(|buffers| buffers.last_timestamp())
                    .max(),
            })
            .collect();
        BufferMapStatus {
            active_jobs: inner.len(),
            total_pod_buffers: inner.values().map(HashMap::len).sum(),
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_buffers_on_demand() {
        let map = ResourceBufferMap::new();
        map.with_pod_buffers("job-a", "pod-1", |buffers| {
            buffers.cpu.add_value(40.0, false, None);
        })
        .await;

        let status = map.status().await;
        assert_eq!(status.active_jobs, 1);
        assert_eq!(status.total_pod_buffers, 1);
    }

    #[tokio::test]
    async fn cleanup_drops_empty_jobs() {
        let map = ResourceBufferMap::new();
        map.with_pod_buffers("job-a", "pod-1", |_| {}).await;
        let dropped = map.cleanup_stale(Duration::minutes(30)).await;
        assert_eq!(dropped, vec!["job-a".to_string()]);
        assert_eq!(map.status().await.active_jobs, 0);
    }

    #[tokio::test]
    async fn cleanup_drops_stale_jobs_but_keeps_fresh_ones() {
        let map = ResourceBufferMap::new();
        let old = Utc::now() - Duration::hours(2);
        map.with_pod_buffers("stale-job", "pod-1", |buffers| {
            buffers.cpu.add_value(40.0, false, Some(old));
        })
        .await;
        map.with_pod_buffers("fresh-job", "pod-1", |buffers| {
            buffers.cpu.add_value(40.0, false, None);
        })
        .await;

        let dropped = map.cleanup_stale(Duration::minutes(30)).await;
        assert_eq!(dropped, vec!["stale-job".to_string()]);
        assert_eq!(map.status().await.active_jobs, 1);
    }

    #[tokio::test]
    async fn drop_job_removes_subtree() {
        let map = ResourceBufferMap::new();
        map.with_pod_buffers("job-a", "pod-1", |_| {}).await;
        assert!(map.drop_job("job-a").await);
        assert!(!map.drop_job("job-a").await);
    }
}
