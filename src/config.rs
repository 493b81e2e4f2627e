use anyhow::{bail, Context};
use chrono_tz::Tz;
use std::env;

/// Application settings, derived from the environment at startup.
///
/// Every value has a default so a bare `loadlens serve` works against a local
/// cluster, but anything out of range fails fast in [`Settings::from_env`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub influxdb: InfluxDbSettings,
    pub kubernetes: KubernetesSettings,
    pub llm: LlmSettings,
    pub server_port: u16,
    pub database_url: String,
    /// Zone used when rendering timestamps for humans. Storage is always UTC.
    pub display_timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Job monitor poll interval in seconds.
    pub poll_interval: u64,
    /// Discovery loop poll interval in seconds.
    pub pod_poll_interval: u64,
    pub max_retry: u32,
    pub metrics_delay: u64,
    pub job_timeout_hours: u64,
    pub job_warning_hours: u64,
    pub auto_delete_completed_jobs: bool,
    /// Cache cleanup sweep interval in seconds.
    pub cleanup_interval: u64,
    /// Process RSS check interval in seconds.
    pub memory_check_interval: u64,
}

#[derive(Debug, Clone)]
pub struct InfluxDbSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl InfluxDbSettings {
    pub fn query_url(&self) -> String {
        format!("http://{}:{}/query", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct KubernetesSettings {
    /// Namespace holding the applications under test.
    pub test_namespace: String,
    /// Namespace the k6 generator jobs run in.
    pub plog_namespace: String,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model_name: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env_or(key, default);
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e))
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = Settings {
            scheduler: SchedulerSettings {
                poll_interval: env_parse("SCHEDULER_POLL_INTERVAL", "15")?,
                pod_poll_interval: env_parse("POD_SCHEDULER_POLL_INTERVAL", "30")?,
                max_retry: env_parse("SCHEDULER_MAX_RETRY", "3")?,
                metrics_delay: env_parse("SCHEDULER_METRICS_DELAY", "30")?,
                job_timeout_hours: env_parse("SCHEDULER_JOB_TIMEOUT_HOURS", "4")?,
                job_warning_hours: env_parse("SCHEDULER_JOB_WARNING_HOURS", "1")?,
                auto_delete_completed_jobs: env_or("AUTO_DELETE_COMPLETED_JOBS", "true")
                    .to_lowercase()
                    == "true",
                cleanup_interval: env_parse("CACHE_CLEANUP_INTERVAL", "60")?,
                memory_check_interval: env_parse("MEMORY_CHECK_INTERVAL", "300")?,
            },
            influxdb: InfluxDbSettings {
                host: env_or("INFLUXDB_HOST", "localhost"),
                port: env_parse("INFLUXDB_PORT", "8086")?,
                database: env_or("INFLUXDB_DATABASE", "k6"),
            },
            kubernetes: KubernetesSettings {
                test_namespace: env_or("KUBERNETES_TEST_NAMESPACE", "test"),
                plog_namespace: env_or("KUBERNETES_PLOG_NAMESPACE", "plog"),
            },
            llm: LlmSettings {
                model_name: env_or("AI_MODEL_NAME", "llama3.1:8b"),
                base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
                temperature: env_parse("OLLAMA_TEMPERATURE", "0.1")?,
                max_tokens: env_parse("OLLAMA_MAX_TOKENS", "2000")?,
                timeout_seconds: env_parse("OLLAMA_TIMEOUT_SECONDS", "120")?,
            },
            server_port: env_parse("SERVER_PORT", "8000")?,
            database_url: env_or("DATABASE_URL", "sqlite://loadlens.db?mode=rwc"),
            display_timezone: env_or("DISPLAY_TIMEZONE", "Asia/Seoul")
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("Invalid DISPLAY_TIMEZONE: {e}"))?,
        };

        settings.validate().context("Invalid configuration")?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.llm.model_name.is_empty() || self.llm.base_url.is_empty() {
            bail!("AI_MODEL_NAME and OLLAMA_BASE_URL must not be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "OLLAMA_TEMPERATURE must be within [0.0, 2.0], got {}",
                self.llm.temperature
            );
        }
        if !(100..=10_000).contains(&self.llm.max_tokens) {
            bail!(
                "OLLAMA_MAX_TOKENS must be within [100, 10000], got {}",
                self.llm.max_tokens
            );
        }
        if !(10..=600).contains(&self.llm.timeout_seconds) {
            bail!(
                "OLLAMA_TIMEOUT_SECONDS must be within [10, 600], got {}",
                self.llm.timeout_seconds
            );
        }
        if self.scheduler.poll_interval == 0 || self.scheduler.pod_poll_interval == 0 {
            bail!("scheduler poll intervals must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            scheduler: SchedulerSettings {
                poll_interval: 15,
                pod_poll_interval: 30,
                max_retry: 3,
                metrics_delay: 30,
                job_timeout_hours: 4,
                job_warning_hours: 1,
                auto_delete_completed_jobs: true,
                cleanup_interval: 60,
                memory_check_interval: 300,
            },
            influxdb: InfluxDbSettings {
                host: "localhost".into(),
                port: 8086,
                database: "k6".into(),
            },
            kubernetes: KubernetesSettings {
                test_namespace: "test".into(),
                plog_namespace: "plog".into(),
            },
            llm: LlmSettings {
                model_name: "llama3.1:8b".into(),
                base_url: "http://localhost:11434".into(),
                temperature: 0.1,
                max_tokens: 2000,
                timeout_seconds: 120,
            },
            server_port: 8000,
            database_url: "sqlite::memory:".into(),
            display_timezone: chrono_tz::Asia::Seoul,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut settings = base_settings();
        settings.llm.temperature = 3.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_max_tokens() {
        let mut settings = base_settings();
        settings.llm.max_tokens = 50;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_llm_timeout() {
        let mut settings = base_settings();
        settings.llm.timeout_seconds = 5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn influx_query_url_is_well_formed() {
        let settings = base_settings();
        assert_eq!(settings.influxdb.query_url(), "http://localhost:8086/query");
    }
}
