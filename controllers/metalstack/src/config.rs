//! Controller configuration, read once from the environment at start-up.

use crate::error::ControllerError;
use crate::requeue::RequeueDelays;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub metal_api_url: String,
    pub metal_api_token: String,
    /// Namespace to watch, all namespaces when unset
    pub namespace: Option<String>,
    /// Network used for control-plane IPs and firewall uplinks when a cluster does not name one
    pub public_network_id: String,
    pub delays: RequeueDelays,
    pub error_backoff_min_seconds: u64,
    pub error_backoff_max_seconds: u64,
    pub concurrency: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let metal_api_url = lookup("METAL_API_URL")
            .unwrap_or_else(|| "http://metal-api.metal-control-plane:8080".to_string());
        let metal_api_token = lookup("METAL_API_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ControllerError::InvalidConfig("METAL_API_TOKEN environment variable is required".to_string())
            })?;
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());
        let public_network_id = lookup("METAL_PUBLIC_NETWORK_ID").unwrap_or_else(|| "internet".to_string());

        let short: u64 = parse_or(&lookup, "REQUEUE_SHORT_DELAY_SECONDS", 5)?;
        let standard: u64 = parse_or(&lookup, "REQUEUE_DELAY_SECONDS", 30)?;
        let error_backoff_min_seconds = parse_or(&lookup, "ERROR_BACKOFF_MIN_SECONDS", 5)?;
        let error_backoff_max_seconds = parse_or(&lookup, "ERROR_BACKOFF_MAX_SECONDS", 300)?;
        let concurrency = parse_or(&lookup, "RECONCILE_CONCURRENCY", 3)?;

        if error_backoff_min_seconds == 0 || error_backoff_min_seconds > error_backoff_max_seconds {
            return Err(ControllerError::InvalidConfig(format!(
                "ERROR_BACKOFF_MIN_SECONDS ({}) must be > 0 and <= ERROR_BACKOFF_MAX_SECONDS ({})",
                error_backoff_min_seconds, error_backoff_max_seconds
            )));
        }

        Ok(Self {
            metal_api_url,
            metal_api_token,
            namespace,
            public_network_id,
            delays: RequeueDelays {
                short: Duration::from_secs(short),
                standard: Duration::from_secs(standard),
            },
            error_backoff_min_seconds,
            error_backoff_max_seconds,
            concurrency,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("METAL_API_TOKEN", "secret")])).unwrap();
        assert_eq!(config.metal_api_url, "http://metal-api.metal-control-plane:8080");
        assert_eq!(config.public_network_id, "internet");
        assert_eq!(config.namespace, None);
        assert_eq!(config.delays, RequeueDelays::default());
        assert_eq!(config.error_backoff_min_seconds, 5);
        assert_eq!(config.error_backoff_max_seconds, 300);
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("METAL_API_TOKEN", "secret"),
            ("METAL_API_URL", "https://api.metal.example"),
            ("WATCH_NAMESPACE", "capi"),
            ("METAL_PUBLIC_NETWORK_ID", "internet-fra"),
            ("REQUEUE_SHORT_DELAY_SECONDS", "1"),
            ("REQUEUE_DELAY_SECONDS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.metal_api_url, "https://api.metal.example");
        assert_eq!(config.namespace.as_deref(), Some("capi"));
        assert_eq!(config.public_network_id, "internet-fra");
        assert_eq!(config.delays.short, Duration::from_secs(1));
        assert_eq!(config.delays.standard, Duration::from_secs(10));
    }

    #[test]
    fn test_unparsable_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("METAL_API_TOKEN", "secret"),
            ("RECONCILE_CONCURRENCY", "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RECONCILE_CONCURRENCY"));
    }
}
