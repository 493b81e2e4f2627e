use crate::config::Settings;
use crate::dao;
use crate::entities::server_infra;
use crate::k8s::pods::{PodDirectory, ServiceInfo};
use crate::k8s::K8sClient;
use crate::openapi::parser::{OpenApiParser, ParsedOpenApi};
use anyhow::Result;
use futures::future::join_all;
use sea_orm::{ActiveValue, DatabaseConnection, TransactionTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

const SWAGGER_PROBE_PATHS: &[&str] = &[
    "/v3/api-docs",
    "/swagger-ui",
    "/swagger-ui/index.html",
    "/api/swagger",
    "/swagger",
    "/docs",
    "/api/docs",
    "/openapi.json",
    "/swagger.json",
    "/v1/api-docs",
    "/v2/api-docs",
    "/api-docs",
];

const SWAGGER_KEYWORDS: &[&str] = &[
    "swagger",
    "openapi",
    "api documentation",
    "swagger-ui",
    "redoc",
    "rapidoc",
];

/// Where an accepted probe URL came from; NodePort hits need their base URL
/// rewritten to the in-cluster service address before persisting.
#[derive(Debug, Clone)]
struct NodePortConversion {
    service_name: String,
    service_port: i32,
    node_port: i32,
}

/// Level-triggered reconciliation of cluster services/pods against the
/// persistent server-infra inventory. A missed change is picked up on the
/// next tick; one tick is one transaction.
pub struct DiscoveryController {
    db: DatabaseConnection,
    directory: PodDirectory,
    parser: OpenApiParser,
    probe_client: reqwest::Client,
    namespace: String,
    environment: String,
    poll_interval: Duration,
}

impl DiscoveryController {
    pub fn new(db: DatabaseConnection, k8s: K8sClient, settings: &Settings) -> Self {
        let namespace = settings.kubernetes.test_namespace.clone();
        Self {
            db,
            directory: PodDirectory::new(k8s, &namespace),
            parser: OpenApiParser::new(),
            probe_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(3))
                .build()
                .expect("reqwest client"),
            namespace,
            environment: "K3S".to_string(),
            poll_interval: Duration::from_secs(settings.scheduler.pod_poll_interval),
        }
    }

    pub async fn run_loop(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Discovery controller started with {}s interval",
            self.poll_interval.as_secs()
        );
        loop {
            if let Err(e) = self.tick().await {
                warn!("Discovery tick failed: {e:#}");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!("Discovery controller stopping");
                    return;
                }
            }
        }
    }

    /// One reconciliation pass. All inventory changes commit together; any
    /// error rolls the whole tick back.
    pub async fn tick(&self) -> Result<()> {
        debug!("Starting pod status processing");

        let scan = self.directory.services_with_pods().await?;

        let txn = self.db.begin().await?;
        let saved_groups = dao::server_infra::group_spec_ids(&txn).await?;

        let mut new_rows: Vec<server_infra::ActiveModel> = Vec::new();
        let mut deleted_names: Vec<String> = Vec::new();

        for (service, pod_names) in &scan {
            if let Some(spec_id) = saved_groups.get(&service.name) {
                // Known service: sync pod membership.
                let known_pods =
                    dao::server_infra::pod_names_by_group(&service.name, &self.namespace, &txn)
                        .await?;

                for pod_name in pod_names {
                    if !known_pods.contains(pod_name) {
                        match self.directory.pod_details(pod_name).await {
                            Ok(details) => new_rows.push(self.infra_row(
                                *spec_id,
                                &service.name,
                                &details.name,
                                &details.resource_type,
                                &details.service_type,
                                &details.labels,
                            )),
                            Err(e) => warn!("Skipping pod {pod_name}: {e:#}"),
                        }
                    }
                }

                for known_pod in &known_pods {
                    if !pod_names.contains(known_pod) {
                        deleted_names.push(known_pod.clone());
                    }
                }
            } else {
                info!("New service detected: {}", service.name);
                let spec_id = self.register_service_spec(service, pod_names, &txn).await;

                for pod_name in pod_names {
                    match self.directory.pod_details(pod_name).await {
                        Ok(details) => new_rows.push(self.infra_row(
                            spec_id,
                            &service.name,
                            &details.name,
                            &details.resource_type,
                            &details.service_type,
                            &details.labels,
                        )),
                        Err(e) => warn!("Skipping pod {pod_name}: {e:#}"),
                    }
                }
            }
        }

        let added = new_rows.len();
        let removed = deleted_names.len();
        dao::server_infra::insert_many(new_rows, &txn).await?;
        dao::server_infra::delete_by_names(&deleted_names, &self.namespace, &txn).await?;
        txn.commit().await?;

        if added > 0 || removed > 0 {
            info!("Discovery tick applied: {added} pods added, {removed} removed");
        }
        Ok(())
    }

    fn infra_row(
        &self,
        spec_id: Option<i32>,
        group_name: &str,
        pod_name: &str,
        resource_type: &str,
        service_type: &str,
        labels: &std::collections::BTreeMap<String, String>,
    ) -> server_infra::ActiveModel {
        server_infra::ActiveModel {
            id: ActiveValue::NotSet,
            openapi_spec_id: ActiveValue::Set(spec_id),
            resource_type: ActiveValue::Set(resource_type.to_string()),
            environment: ActiveValue::Set(self.environment.clone()),
            service_type: ActiveValue::Set(service_type.to_string()),
            name: ActiveValue::Set(pod_name.to_string()),
            group_name: ActiveValue::Set(group_name.to_string()),
            labels: ActiveValue::Set(serde_json::to_value(labels).ok()),
            namespace: ActiveValue::Set(self.namespace.clone()),
        }
    }

    /// Tries to discover and persist an OpenAPI document for a new service.
    /// A failed probe just means the pod is not a documented server yet; the
    /// next tick retries.
    async fn register_service_spec<C: sea_orm::ConnectionTrait>(
        &self,
        service: &ServiceInfo,
        pod_names: &[String],
        db: &C,
    ) -> Option<i32> {
        for pod_name in pod_names {
            let details = match self.directory.pod_details(pod_name).await {
                Ok(details) => details,
                Err(e) => {
                    warn!("Could not inspect pod {pod_name}: {e:#}");
                    continue;
                }
            };
            if details.service_type != "SERVER" {
                continue;
            }

            let services = match self.directory.services_for_pod(&details.labels).await {
                Ok(services) => services,
                Err(e) => {
                    warn!("Could not resolve services for pod {pod_name}: {e:#}");
                    continue;
                }
            };

            let (swagger_url, conversion) = match self.discover_swagger_url(&services).await {
                Some(found) => found,
                None => continue,
            };

            match self.parser.parse(&swagger_url).await {
                Ok(mut parsed) => {
                    if let Some(conversion) = &conversion {
                        rewrite_nodeport_base_url(&mut parsed, conversion, &self.namespace);
                    }
                    match dao::openapi::save_spec(None, &parsed, db).await {
                        Ok(spec) => {
                            info!(
                                "OpenAPI spec '{}' registered for service {}",
                                parsed.title, service.name
                            );
                            return Some(spec.id);
                        }
                        Err(e) => warn!("Failed to persist spec for {}: {e:#}", service.name),
                    }
                }
                Err(e) => debug!("OpenAPI parse failed for {swagger_url}: {e:#}"),
            }
        }
        None
    }

    /// Probes well-known documentation paths against every cluster-internal
    /// URL of the given services, falling back to NodePort localhost URLs.
    async fn discover_swagger_url(
        &self,
        services: &[ServiceInfo],
    ) -> Option<(String, Option<NodePortConversion>)> {
        for service in services {
            for port in &service.ports {
                if !is_http_port(*port) {
                    continue;
                }

                let dns_url = format!(
                    "http://{}.{}.svc.cluster.local:{port}",
                    service.name, self.namespace
                );
                if let Some(url) = self.check_swagger_endpoints(&dns_url).await {
                    return Some((url, None));
                }

                if let Some(cluster_ip) = &service.cluster_ip {
                    let ip_url = format!("http://{cluster_ip}:{port}");
                    if let Some(url) = self.check_swagger_endpoints(&ip_url).await {
                        return Some((url, None));
                    }
                }
            }

            if service.service_type == "NodePort" {
                for node_port in &service.node_ports {
                    let localhost_url = format!("http://localhost:{node_port}");
                    if let Some(url) = self.check_swagger_endpoints(&localhost_url).await {
                        let service_port = service
                            .port_mappings
                            .get(node_port)
                            .copied()
                            .unwrap_or(*node_port);
                        return Some((
                            url,
                            Some(NodePortConversion {
                                service_name: service.name.clone(),
                                service_port,
                                node_port: *node_port,
                            }),
                        ));
                    }
                }
            }
        }
        None
    }

    /// Checks every probe path under one base URL, at most five in flight.
    async fn check_swagger_endpoints(&self, base_url: &str) -> Option<String> {
        let semaphore = Arc::new(Semaphore::new(5));
        let checks = SWAGGER_PROBE_PATHS.iter().map(|path| {
            let url = format!("{base_url}{path}");
            let client = self.probe_client.clone();
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                looks_like_swagger(&client, &url).await.then_some(url)
            }
        });

        join_all(checks).await.into_iter().flatten().next()
    }
}

fn is_http_port(port: i32) -> bool {
    matches!(port, 80 | 8080 | 3000 | 4000 | 5000 | 8000 | 9000) || (8000..=9999).contains(&port)
}

/// A URL accepted via the NodePort localhost fallback is only reachable from
/// the node; the stored base URL must point at the in-cluster service.
fn rewrite_nodeport_base_url(
    parsed: &mut ParsedOpenApi,
    conversion: &NodePortConversion,
    namespace: &str,
) {
    let from = format!("localhost:{}", conversion.node_port);
    let to = format!(
        "{}.{namespace}.svc.cluster.local:{}",
        conversion.service_name, conversion.service_port
    );
    parsed.base_url = parsed.base_url.replace(&from, &to);
}

async fn looks_like_swagger(client: &reqwest::Client, url: &str) -> bool {
    let Ok(response) = client.get(url).send().await else {
        return false;
    };
    if !response.status().is_success() {
        return false;
    }
    let Ok(body) = response.text().await else {
        return false;
    };

    let lower = body.to_lowercase();
    if SWAGGER_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        return true;
    }

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => {
            json.get("swagger").is_some() || json.get("openapi").is_some() || json.get("info").is_some()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_port_heuristic() {
        assert!(is_http_port(80));
        assert!(is_http_port(8080));
        assert!(is_http_port(8500));
        assert!(is_http_port(9999));
        assert!(!is_http_port(443));
        assert!(!is_http_port(5432));
        assert!(!is_http_port(11211));
    }

    #[test]
    fn nodeport_base_url_is_rewritten_to_cluster_dns() {
        let mut parsed = ParsedOpenApi {
            title: "t".into(),
            version: "1".into(),
            base_url: "http://localhost:30080".into(),
            endpoints: vec![],
        };
        let conversion = NodePortConversion {
            service_name: "svc-x".into(),
            service_port: 8080,
            node_port: 30080,
        };
        rewrite_nodeport_base_url(&mut parsed, &conversion, "test");
        assert_eq!(parsed.base_url, "http://svc-x.test.svc.cluster.local:8080");
    }

    #[test]
    fn other_base_urls_are_untouched() {
        let mut parsed = ParsedOpenApi {
            title: "t".into(),
            version: "1".into(),
            base_url: "http://svc-x.test.svc.cluster.local:8080".into(),
            endpoints: vec![],
        };
        let conversion = NodePortConversion {
            service_name: "svc-x".into(),
            service_port: 8080,
            node_port: 30080,
        };
        rewrite_nodeport_base_url(&mut parsed, &conversion, "test");
        assert_eq!(parsed.base_url, "http://svc-x.test.svc.cluster.local:8080");
    }
}
