use crate::k8s::K8sClient;
use anyhow::{Context, Result};
use kube::api::ListParams;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

const DATABASE_IMAGES: &[&str] = &[
    "mysql",
    "postgres",
    "postgresql",
    "redis",
    "mongodb",
    "mongo",
    "mariadb",
    "elasticsearch",
    "cassandra",
    "dynamodb",
    "influxdb",
];

/// Pod identity resolved through its owner chain.
#[derive(Debug, Clone)]
pub struct PodDetails {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub images: Vec<String>,
    /// Pod, ReplicaSet, Deployment, StatefulSet or DaemonSet.
    pub resource_type: String,
    /// SERVER or DATABASE.
    pub service_type: String,
}

#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub ports: Vec<i32>,
    pub node_ports: Vec<i32>,
    /// NodePort -> service port.
    pub port_mappings: HashMap<i32, i32>,
    pub cluster_ip: Option<String>,
    pub service_type: String,
}

/// Pod and Service lookups for one namespace.
pub struct PodDirectory {
    client: K8sClient,
    namespace: String,
}

impl PodDirectory {
    pub fn new(client: K8sClient, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    /// Every Service in the namespace with the names of the pods its label
    /// selector currently matches. Selector-less services are skipped.
    pub async fn services_with_pods(&self) -> Result<Vec<(ServiceInfo, Vec<String>)>> {
        let services = self
            .client
            .services(&self.namespace)
            .list(&ListParams::default())
            .await
            .context("Error listing services")?;

        let mut result = Vec::new();
        for service in services.items {
            let Some(name) = service.metadata.name.clone() else {
                continue;
            };
            let Some(spec) = service.spec.as_ref() else {
                continue;
            };
            let Some(selector) = spec.selector.clone() else {
                continue;
            };
            if selector.is_empty() {
                continue;
            }

            let label_selector = selector
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            let pods = self
                .client
                .pods(&self.namespace)
                .list(&ListParams::default().labels(&label_selector))
                .await
                .context(format!("Error listing pods for service {name}"))?;

            let pod_names = pods
                .items
                .into_iter()
                .filter(|pod| {
                    pod.status
                        .as_ref()
                        .and_then(|status| status.phase.as_deref())
                        == Some("Running")
                })
                .filter_map(|pod| pod.metadata.name)
                .collect();

            result.push((service_info(&name, spec), pod_names));
        }

        Ok(result)
    }

    /// Resolves the pod's owner chain (Pod -> ReplicaSet -> Deployment) and
    /// classifies it as SERVER or DATABASE from its container images.
    pub async fn pod_details(&self, pod_name: &str) -> Result<PodDetails> {
        let pod = self
            .client
            .pods(&self.namespace)
            .get(pod_name)
            .await
            .context(format!("Error reading pod {pod_name}"))?;

        let labels = pod.metadata.labels.clone().unwrap_or_default();
        let images: Vec<String> = pod
            .spec
            .as_ref()
            .map(|spec| {
                spec.containers
                    .iter()
                    .filter_map(|container| container.image.clone())
                    .collect()
            })
            .unwrap_or_default();

        let mut resource_type = "Pod".to_string();
        if let Some(owner) = pod
            .metadata
            .owner_references
            .as_ref()
            .and_then(|owners| owners.first())
        {
            resource_type = match owner.kind.as_str() {
                "ReplicaSet" => match self
                    .client
                    .replica_sets(&self.namespace)
                    .get(&owner.name)
                    .await
                {
                    Ok(rs) => {
                        let deployment_owned = rs
                            .metadata
                            .owner_references
                            .as_ref()
                            .and_then(|owners| owners.first())
                            .map(|o| o.kind == "Deployment")
                            .unwrap_or(false);
                        if deployment_owned {
                            "Deployment".to_string()
                        } else {
                            "ReplicaSet".to_string()
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read ReplicaSet {}: {e}", owner.name);
                        "ReplicaSet".to_string()
                    }
                },
                other => other.to_string(),
            };
        }

        Ok(PodDetails {
            name: pod_name.to_string(),
            namespace: self.namespace.clone(),
            service_type: determine_service_type(&images).to_string(),
            labels,
            images,
            resource_type,
        })
    }

    /// Services whose selector matches the given pod labels.
    pub async fn services_for_pod(
        &self,
        pod_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ServiceInfo>> {
        let services = self
            .client
            .services(&self.namespace)
            .list(&ListParams::default())
            .await
            .context("Error listing services")?;

        let mut matched = Vec::new();
        for service in services.items {
            let Some(name) = service.metadata.name.clone() else {
                continue;
            };
            let Some(spec) = service.spec.as_ref() else {
                continue;
            };
            let Some(selector) = spec.selector.as_ref() else {
                continue;
            };
            if !selector.is_empty() && labels_match(selector, pod_labels) {
                matched.push(service_info(&name, spec));
            }
        }
        Ok(matched)
    }
}

fn service_info(name: &str, spec: &k8s_openapi::api::core::v1::ServiceSpec) -> ServiceInfo {
    let mut ports = Vec::new();
    let mut node_ports = Vec::new();
    let mut port_mappings = HashMap::new();
    for port in spec.ports.iter().flatten() {
        ports.push(port.port);
        if let Some(node_port) = port.node_port {
            node_ports.push(node_port);
            port_mappings.insert(node_port, port.port);
        }
    }
    ServiceInfo {
        name: name.to_string(),
        ports,
        node_ports,
        port_mappings,
        cluster_ip: spec.cluster_ip.clone().filter(|ip| ip != "None"),
        service_type: spec.type_.clone().unwrap_or_else(|| "ClusterIP".into()),
    }
}

pub fn determine_service_type(images: &[String]) -> &'static str {
    for image in images {
        let lower = image.to_lowercase();
        if DATABASE_IMAGES.iter().any(|db| lower.contains(db)) {
            return "DATABASE";
        }
    }
    "SERVER"
}

fn labels_match(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn database_images_are_classified() {
        assert_eq!(
            determine_service_type(&strings(&["bitnami/postgresql:16"])),
            "DATABASE"
        );
        assert_eq!(determine_service_type(&strings(&["redis:7-alpine"])), "DATABASE");
        assert_eq!(
            determine_service_type(&strings(&["acme/api:1.0", "mongo:6"])),
            "DATABASE"
        );
    }

    #[test]
    fn application_images_are_servers() {
        assert_eq!(determine_service_type(&strings(&["acme/api:1.0"])), "SERVER");
        assert_eq!(determine_service_type(&[]), "SERVER");
    }

    #[test]
    fn selector_must_be_subset_of_labels() {
        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "api".to_string());

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "api".to_string());
        labels.insert("tier".to_string(), "backend".to_string());
        assert!(labels_match(&selector, &labels));

        selector.insert("tier".to_string(), "frontend".to_string());
        assert!(!labels_match(&selector, &labels));
    }
}
