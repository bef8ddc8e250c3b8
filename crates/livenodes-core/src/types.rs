//! Core types for livenodes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// URL scheme used to reach cluster members
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!("unsupported scheme: {}", other)),
        }
    }
}

/// A reachable cluster member.
///
/// Endpoints are plain values: they are never mutated after construction and
/// two endpoints naming the same address are not deduplicated anywhere.
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    #[serde(default)]
    path: String,
}

impl Endpoint {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
            path: String::new(),
        }
    }

    /// Same member, with a path suffix appended to its base URL
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host as it must appear in a URL authority (IPv6 literals get brackets)
    pub fn authority_host(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    /// `scheme://host:port`, without the path
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.authority_host(), self.port)
    }

    /// Base URL with the given path and optional query in place of this
    /// endpoint's own path
    pub fn url_with(&self, path: &str, query: Option<&str>) -> String {
        let mut url = self.base_url();
        if !path.is_empty() && !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({})", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base_url(), self.path)
    }
}
