use crate::k8s::K8sClient;
use anyhow::{Context, Result};
use tracing::warn;

/// Per-pod resource requests and limits, summed across containers.
/// CPU in millicores, memory in MB.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct PodResourceSpec {
    pub cpu_request_millicores: f64,
    pub cpu_limit_millicores: f64,
    pub memory_request_mb: f64,
    pub memory_limit_mb: f64,
}

/// Reads pod resource specs from the cluster API.
pub struct ResourceClient {
    client: K8sClient,
    namespace: String,
}

impl ResourceClient {
    pub fn new(client: K8sClient, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    pub async fn pod_aggregated_resources(&self, pod_name: &str) -> Result<PodResourceSpec> {
        let pod = self
            .client
            .pods(&self.namespace)
            .get(pod_name)
            .await
            .context(format!("Error reading pod {pod_name}"))?;

        let mut aggregated = PodResourceSpec::default();
        for container in pod.spec.iter().flat_map(|spec| spec.containers.iter()) {
            let Some(resources) = container.resources.as_ref() else {
                continue;
            };
            if let Some(requests) = resources.requests.as_ref() {
                if let Some(cpu) = requests.get("cpu") {
                    aggregated.cpu_request_millicores += parse_cpu_millicores(&cpu.0);
                }
                if let Some(memory) = requests.get("memory") {
                    aggregated.memory_request_mb += parse_memory_mb(&memory.0);
                }
            }
            if let Some(limits) = resources.limits.as_ref() {
                if let Some(cpu) = limits.get("cpu") {
                    aggregated.cpu_limit_millicores += parse_cpu_millicores(&cpu.0);
                }
                if let Some(memory) = limits.get("memory") {
                    aggregated.memory_limit_mb += parse_memory_mb(&memory.0);
                }
            }
        }

        Ok(aggregated)
    }
}

/// Parses a Kubernetes CPU quantity to millicores: "500m" -> 500, "1" -> 1000.
pub fn parse_cpu_millicores(value: &str) -> f64 {
    let value = value.trim().to_lowercase();
    if let Some(millis) = value.strip_suffix('m') {
        match millis.parse::<f64>() {
            Ok(n) => return n,
            Err(e) => {
                warn!("Failed to parse CPU quantity '{value}': {e}");
                return 0.0;
            }
        }
    }
    match value.parse::<f64>() {
        Ok(cores) => cores * 1000.0,
        Err(e) => {
            warn!("Failed to parse CPU quantity '{value}': {e}");
            0.0
        }
    }
}

/// Parses a Kubernetes memory quantity to MB. Binary suffixes (Ki/Mi/Gi),
/// decimal suffixes (K/M/G treated as their binary neighbours, as the
/// inventory only sanity-checks magnitudes) and bare byte counts.
pub fn parse_memory_mb(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() {
        return 0.0;
    }

    if let Ok(bytes) = value.parse::<f64>() {
        return bytes / (1024.0 * 1024.0);
    }

    let split = value
        .find(|c: char| c.is_ascii_alphabetic())
        .map(|idx| value.split_at(idx));
    let Some((number, unit)) = split else {
        warn!("Cannot parse memory quantity: {value}");
        return 0.0;
    };
    let Ok(number) = number.trim().parse::<f64>() else {
        warn!("Cannot parse memory quantity: {value}");
        return 0.0;
    };

    match unit.trim().to_lowercase().as_str() {
        "b" | "byte" | "bytes" => number / (1024.0 * 1024.0),
        "k" | "kb" | "ki" | "kib" => number / 1024.0,
        "m" | "mb" | "mi" | "mib" => number,
        "g" | "gb" | "gi" | "gib" => number * 1024.0,
        "t" | "tb" | "ti" | "tib" => number * 1024.0 * 1024.0,
        other => {
            warn!("Unknown memory unit '{other}' in quantity {value}");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_millicores_suffix() {
        assert_eq!(parse_cpu_millicores("500m"), 500.0);
        assert_eq!(parse_cpu_millicores("250m"), 250.0);
    }

    #[test]
    fn cpu_whole_and_fractional_cores() {
        assert_eq!(parse_cpu_millicores("1"), 1000.0);
        assert_eq!(parse_cpu_millicores("0.5"), 500.0);
        assert_eq!(parse_cpu_millicores("2"), 2000.0);
    }

    #[test]
    fn cpu_garbage_is_zero() {
        assert_eq!(parse_cpu_millicores("lots"), 0.0);
    }

    #[test]
    fn memory_binary_units() {
        assert_eq!(parse_memory_mb("512Mi"), 512.0);
        assert_eq!(parse_memory_mb("1Gi"), 1024.0);
        assert_eq!(parse_memory_mb("256Ki"), 0.25);
    }

    #[test]
    fn memory_bare_bytes() {
        let mb = parse_memory_mb("1024000000");
        assert!((mb - 976.5625).abs() < 0.01);
    }

    #[test]
    fn memory_decimal_suffixes() {
        assert_eq!(parse_memory_mb("1G"), 1024.0);
        assert_eq!(parse_memory_mb("100M"), 100.0);
    }

    #[test]
    fn memory_garbage_is_zero() {
        assert_eq!(parse_memory_mb("much"), 0.0);
        assert_eq!(parse_memory_mb(""), 0.0);
    }
}
