use crate::k8s::K8sClient;
use anyhow::{Context, Result};
use k8s_openapi::api::batch::v1::Job;
use kube::api::{DeleteParams, ListParams};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub name: String,
    pub status: JobStatus,
}

/// Generator-job lookups in the namespace the k6 jobs run in.
pub struct JobClient {
    client: K8sClient,
    namespace: String,
}

impl JobClient {
    pub fn new(client: K8sClient, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    pub async fn list_all_jobs(&self) -> Result<Vec<JobSummary>> {
        let jobs = self
            .client
            .jobs(&self.namespace)
            .list(&ListParams::default())
            .await
            .context("Error listing jobs")?;

        Ok(jobs
            .items
            .iter()
            .filter_map(|job| {
                let name = job.metadata.name.clone()?;
                Some(JobSummary {
                    name,
                    status: job_status(job),
                })
            })
            .collect())
    }

    /// Jobs that have reached a terminal state, succeeded or failed.
    pub async fn list_completed_jobs(&self) -> Result<Vec<JobSummary>> {
        Ok(self
            .list_all_jobs()
            .await?
            .into_iter()
            .filter(|job| job.status != JobStatus::Running)
            .collect())
    }

    pub async fn delete_completed_job(&self, job_name: &str) -> Result<()> {
        self.client
            .jobs(&self.namespace)
            .delete(job_name, &DeleteParams::background())
            .await
            .context(format!("Error deleting job {job_name}"))?;
        info!("Deleted completed job {job_name}");
        Ok(())
    }
}

fn job_status(job: &Job) -> JobStatus {
    let Some(status) = job.status.as_ref() else {
        return JobStatus::Running;
    };

    if let Some(conditions) = status.conditions.as_ref() {
        for condition in conditions {
            if condition.status == "True" {
                match condition.type_.as_str() {
                    "Complete" => return JobStatus::Succeeded,
                    "Failed" => return JobStatus::Failed,
                    _ => {}
                }
            }
        }
    }

    if status.succeeded.unwrap_or(0) > 0 {
        JobStatus::Succeeded
    } else if status.failed.unwrap_or(0) > 0 {
        JobStatus::Failed
    } else {
        JobStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::{JobCondition, JobStatus as K8sJobStatus};

    fn job_with_status(status: K8sJobStatus) -> Job {
        Job {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn succeeded_condition_wins() {
        let job = job_with_status(K8sJobStatus {
            conditions: Some(vec![JobCondition {
                type_: "Complete".into(),
                status: "True".into(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert_eq!(job_status(&job), JobStatus::Succeeded);
    }

    #[test]
    fn failed_counter_marks_failed() {
        let job = job_with_status(K8sJobStatus {
            failed: Some(1),
            ..Default::default()
        });
        assert_eq!(job_status(&job), JobStatus::Failed);
    }

    #[test]
    fn active_job_is_running() {
        let job = job_with_status(K8sJobStatus {
            active: Some(1),
            ..Default::default()
        });
        assert_eq!(job_status(&job), JobStatus::Running);
    }
}
