use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::queue::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub delivery_url: String,
    pub delivery_timeout: Duration,
    pub storage: StorageConfig,
    pub retry: RetryPolicy,
    pub start_online: bool,
    pub probe_interval: Option<Duration>,
    pub corrections: Option<CorrectionsConfig>,
    pub purge_sent_after: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Set when the embedded database is available.
    pub database_url: Option<String>,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CorrectionsConfig {
    pub url: String,
    pub form_name: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host: IpAddr = env_or("FORMQUEUE_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| format!("Invalid FORMQUEUE_HOST: {e}"))?;

        let port: u16 = env_or("FORMQUEUE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid FORMQUEUE_PORT: {e}"))?;

        let log_level = env_or("FORMQUEUE_LOG_LEVEL", "info");

        let delivery_url = env_required("FORMQUEUE_DELIVERY_URL")?;

        let delivery_timeout = Duration::from_secs(
            env_or("FORMQUEUE_DELIVERY_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|e| format!("Invalid FORMQUEUE_DELIVERY_TIMEOUT_SECS: {e}"))?,
        );

        let storage = StorageConfig {
            database_url: env_optional("FORMQUEUE_DATABASE_URL"),
            local_path: PathBuf::from(env_or("FORMQUEUE_LOCAL_STORE", "./formqueue-queue.json")),
        };

        let defaults = RetryPolicy::default();
        let max_retries: u32 = env_or("FORMQUEUE_MAX_RETRIES", &defaults.max_retries.to_string())
            .parse()
            .map_err(|e| format!("Invalid FORMQUEUE_MAX_RETRIES: {e}"))?;
        if max_retries == 0 {
            return Err("FORMQUEUE_MAX_RETRIES must be at least 1".to_string());
        }
        let base_delay_ms: i64 =
            env_or("FORMQUEUE_BACKOFF_BASE_MS", &defaults.base_delay_ms.to_string())
                .parse()
                .map_err(|e| format!("Invalid FORMQUEUE_BACKOFF_BASE_MS: {e}"))?;
        if base_delay_ms < 0 {
            return Err("FORMQUEUE_BACKOFF_BASE_MS must not be negative".to_string());
        }

        let start_online = match env_or("FORMQUEUE_START_ONLINE", "true").as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => return Err(format!("Invalid FORMQUEUE_START_ONLINE: {other}")),
        };

        let probe_secs: u64 = env_or("FORMQUEUE_PROBE_INTERVAL_SECS", "0")
            .parse()
            .map_err(|e| format!("Invalid FORMQUEUE_PROBE_INTERVAL_SECS: {e}"))?;
        let probe_interval = (probe_secs > 0).then(|| Duration::from_secs(probe_secs));

        let corrections = env_optional("FORMQUEUE_CORRECTIONS_URL").map(|url| CorrectionsConfig {
            url,
            form_name: env_or("FORMQUEUE_FORM_NAME", "Maintenance Request"),
            timeout: delivery_timeout,
        });

        let purge_sent_after = purge_age(&env_or("FORMQUEUE_PURGE_SENT_AFTER_DAYS", "0"))?;

        Ok(Config {
            host,
            port,
            log_level,
            delivery_url,
            delivery_timeout,
            storage,
            retry: RetryPolicy {
                max_retries,
                base_delay_ms,
            },
            start_online,
            probe_interval,
            corrections,
            purge_sent_after,
        })
    }
}

/// Retention for delivered entries, in whole days. Zero disables the purge.
/// The age must fit in epoch milliseconds.
fn purge_age(days: &str) -> Result<Option<Duration>, String> {
    let days: i64 = days
        .parse()
        .map_err(|e| format!("Invalid FORMQUEUE_PURGE_SENT_AFTER_DAYS: {e}"))?;
    if days < 0 {
        return Err("FORMQUEUE_PURGE_SENT_AFTER_DAYS must not be negative".to_string());
    }
    if days == 0 {
        return Ok(None);
    }
    let millis = days
        .checked_mul(MILLIS_PER_DAY)
        .ok_or_else(|| "FORMQUEUE_PURGE_SENT_AFTER_DAYS is too large".to_string())?;
    Ok(Some(Duration::from_millis(millis as u64)))
}

const MILLIS_PER_DAY: i64 = 86_400_000;

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_age_zero_disables_purge() {
        assert_eq!(purge_age("0").unwrap(), None);
    }

    #[test]
    fn purge_age_is_whole_days() {
        assert_eq!(
            purge_age("30").unwrap(),
            Some(Duration::from_secs(30 * 86_400))
        );
    }

    #[test]
    fn purge_age_rejects_overflow_and_garbage() {
        assert!(purge_age(&i64::MAX.to_string()).is_err());
        assert!(purge_age(&(i64::MAX / MILLIS_PER_DAY + 1).to_string()).is_err());
        assert!(purge_age("-1").is_err());
        assert!(purge_age("soon").is_err());
    }
}
