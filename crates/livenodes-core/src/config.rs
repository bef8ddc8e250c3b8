//! Configuration types for livenodes

use crate::error::{LbError, Result};
use crate::types::{Endpoint, Scheme};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path that lists the live members of the cluster
pub const DEFAULT_DISCOVERY_PATH: &str = "/localnodes";

/// How the discovery fetcher picks the member it asks for the node list
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStrategy {
    /// A pseudo-random member of the current list, on every fetch
    #[default]
    RandomMember,
    /// Always the first seed node
    Seed,
}

/// Main configuration for a load-balanced client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiveNodesConfig {
    /// Scheme shared by every cluster member
    pub scheme: Scheme,

    /// Hosts known before the first discovery (no scheme, no port)
    pub seeds: Vec<String>,

    /// Port shared by every cluster member
    pub port: u16,

    /// Path queried for the live node list
    #[serde(default = "default_discovery_path")]
    pub discovery_path: String,

    /// Restrict discovery to one rack
    #[serde(default)]
    pub rack: Option<String>,

    /// Restrict discovery to one datacenter
    #[serde(default)]
    pub datacenter: Option<String>,

    #[serde(default)]
    pub contact_strategy: ContactStrategy,

    /// Default interval for the background refresher
    #[serde(with = "duration_secs")]
    pub refresh_interval: Duration,

    /// Forwarded to the HTTP transport as-is
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for LiveNodesConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Http,
            seeds: vec!["127.0.0.1".to_string()],
            port: 8080,
            discovery_path: default_discovery_path(),
            rack: None,
            datacenter: None,
            contact_strategy: ContactStrategy::default(),
            refresh_interval: Duration::from_secs(10),
            transport: TransportConfig::default(),
        }
    }
}

impl LiveNodesConfig {
    pub fn new(scheme: Scheme, seeds: Vec<String>, port: u16) -> Self {
        Self {
            scheme,
            seeds,
            port,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.seeds.is_empty() {
            return Err(LbError::InvalidConfig("at least one seed node is required".into()));
        }
        if let Some(seed) = self.seeds.iter().find(|s| s.trim().is_empty()) {
            return Err(LbError::InvalidConfig(format!("empty seed host: {:?}", seed)));
        }
        if self.port == 0 {
            return Err(LbError::InvalidConfig("port must be non-zero".into()));
        }
        if self.refresh_interval.is_zero() {
            return Err(LbError::InvalidConfig("refresh interval must be non-zero".into()));
        }
        if !self.discovery_path.starts_with('/') {
            return Err(LbError::InvalidConfig(format!(
                "discovery path must start with '/': {}",
                self.discovery_path
            )));
        }
        Ok(())
    }

    /// Endpoint for a bare host, using the configured scheme and port
    pub fn host_endpoint(&self, host: &str) -> Endpoint {
        Endpoint::new(self.scheme, host.trim(), self.port)
    }

    /// Initial membership, in seed order
    pub fn seed_endpoints(&self) -> Vec<Endpoint> {
        self.seeds.iter().map(|s| self.host_endpoint(s)).collect()
    }

    /// `rack=..&dc=..` filter for the discovery request, if any is set
    pub fn discovery_query(&self) -> Option<String> {
        let parts: Vec<String> = [("rack", &self.rack), ("dc", &self.datacenter)]
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}={}", key, v))
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("&"))
        }
    }

    pub fn has_locality_filter(&self) -> bool {
        self.discovery_query().is_some()
    }
}

fn default_discovery_path() -> String {
    DEFAULT_DISCOVERY_PATH.to_string()
}

/// HTTP transport settings; not interpreted by the balancer itself
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Whole-request timeout
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,

    /// TCP connect timeout
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept
    #[serde(with = "duration_secs")]
    pub pool_idle_timeout: Duration,

    /// Skip server certificate verification
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Ignore proxy settings from the environment
    #[serde(default)]
    pub no_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(2000),
            pool_idle_timeout: Duration::from_secs(90),
            accept_invalid_certs: false,
            no_proxy: false,
        }
    }
}

// Serde helpers for Duration
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LiveNodesConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.discovery_path, "/localnodes");
        assert_eq!(config.contact_strategy, ContactStrategy::RandomMember);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LiveNodesConfig::new(Scheme::Http, vec![], 8000);
        assert!(matches!(config.validate(), Err(LbError::InvalidConfig(_))));

        config.seeds = vec!["a".into(), " ".into()];
        assert!(config.validate().is_err());

        config.seeds = vec!["a".into()];
        config.port = 0;
        assert!(config.validate().is_err());

        config.port = 8000;
        config.refresh_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.refresh_interval = Duration::from_secs(1);
        config.discovery_path = "localnodes".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seed_endpoints_follow_config() {
        let config = LiveNodesConfig::new(Scheme::Https, vec!["a".into(), " b ".into()], 8043);
        let seeds = config.seed_endpoints();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].to_string(), "https://a:8043");
        assert_eq!(seeds[1].to_string(), "https://b:8043");
    }

    #[test]
    fn test_discovery_query() {
        let mut config = LiveNodesConfig::default();
        assert_eq!(config.discovery_query(), None);
        assert!(!config.has_locality_filter());

        config.datacenter = Some("dc1".into());
        assert_eq!(config.discovery_query().as_deref(), Some("dc=dc1"));

        config.rack = Some("r1".into());
        assert_eq!(config.discovery_query().as_deref(), Some("rack=r1&dc=dc1"));

        config.datacenter = Some(String::new());
        assert_eq!(config.discovery_query().as_deref(), Some("rack=r1"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "scheme": "https",
            "seeds": ["10.0.0.1", "10.0.0.2"],
            "port": 8043,
            "refresh_interval": 30,
            "contact_strategy": "seed"
        }"#;
        let config: LiveNodesConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.contact_strategy, ContactStrategy::Seed);
        assert_eq!(config.discovery_path, DEFAULT_DISCOVERY_PATH);
        assert_eq!(config.transport.request_timeout, Duration::from_millis(5000));
    }
}
