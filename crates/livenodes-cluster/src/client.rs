//! Load-balanced cluster client
//!
//! [`LiveNodes`] owns one membership store, the discovery fetcher that feeds
//! it, a dispatcher reading from it and an optional background refresher.
//! Each instance is independent; nothing is shared process-wide.

use crate::discovery::{DiscoveryFetcher, HttpTransport, NodeListTransport};
use crate::dispatch::{Dispatcher, OutgoingRequest};
use crate::membership::MembershipStore;
use crate::refresher::{RefreshStats, Refresher};
use livenodes_core::{Endpoint, LbError, LiveNodesConfig, Result};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

pub struct LiveNodes<T = HttpTransport> {
    config: Arc<LiveNodesConfig>,
    store: Arc<MembershipStore>,
    fetcher: Arc<DiscoveryFetcher<T>>,
    dispatcher: Dispatcher,
    refresher: Refresher,
}

impl LiveNodes<HttpTransport> {
    /// Build a reqwest transport from the config and run the first discovery.
    ///
    /// Fails if that discovery fails: there is no usable node list yet.
    pub async fn connect(config: LiveNodesConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.transport)?;
        Self::with_transport(config, transport).await
    }

    /// The reqwest client shared by discovery and [`execute`](Self::execute)
    pub fn http_client(&self) -> &reqwest::Client {
        self.fetcher.transport().client()
    }

    /// Send `request` to the next member in rotation
    pub async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        self.dispatch(&mut request)?;
        self.http_client()
            .execute(request)
            .await
            .map_err(|e| LbError::Transport(e.to_string()))
    }
}

impl<T: NodeListTransport> LiveNodes<T> {
    pub async fn with_transport(config: LiveNodesConfig, transport: T) -> Result<Self> {
        config.validate()?;
        validate_seed_urls(&config)?;

        let config = Arc::new(config);
        let store = Arc::new(MembershipStore::new(config.seed_endpoints())?);
        let fetcher = Arc::new(DiscoveryFetcher::new(
            transport,
            store.clone(),
            config.clone(),
        ));

        let nodes = fetcher.fetch().await?;
        tracing::info!(
            seeds = config.seeds.len(),
            nodes = nodes.len(),
            "Discovered cluster members"
        );

        Ok(Self {
            dispatcher: Dispatcher::new(store.clone()),
            refresher: Refresher::new(),
            config,
            store,
            fetcher,
        })
    }

    pub fn config(&self) -> &LiveNodesConfig {
        &self.config
    }

    /// Start refreshing membership every `interval`; no-op if already running
    /// or `interval` is zero
    pub fn start(&self, interval: Duration) -> bool {
        self.refresher.start(self.fetcher.clone(), interval)
    }

    /// Start refreshing at the configured interval
    pub fn start_default(&self) -> bool {
        self.start(self.config.refresh_interval)
    }

    /// Stop the refresher and wait for it to exit; no-op if not running
    pub async fn stop(&self) -> bool {
        self.refresher.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.refresher.is_running()
    }

    /// Next member in round-robin order
    pub fn next_endpoint(&self) -> Endpoint {
        self.store.next()
    }

    pub fn dispatch<R: OutgoingRequest + ?Sized>(&self, request: &mut R) -> Result<Endpoint> {
        self.dispatcher.dispatch(request)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn known_nodes(&self) -> Vec<Endpoint> {
        self.store.snapshot().to_vec()
    }

    /// Run one discovery round now
    pub async fn refresh(&self) -> Result<Vec<Endpoint>> {
        self.fetcher.fetch().await
    }

    pub fn refresh_stats(&self) -> RefreshStats {
        self.refresher.stats()
    }

    pub async fn check_rack_and_datacenter(&self) -> Result<()> {
        self.fetcher.check_rack_and_datacenter().await
    }

    pub async fn rack_datacenter_supported(&self) -> Result<bool> {
        self.fetcher.rack_datacenter_supported().await
    }
}

/// Every seed must form a valid URL with the configured scheme and port
fn validate_seed_urls(config: &LiveNodesConfig) -> Result<()> {
    for endpoint in config.seed_endpoints() {
        if let Err(e) = Url::parse(&endpoint.base_url()) {
            return Err(LbError::InvalidConfig(format!(
                "invalid seed host {:?}: {}",
                endpoint.host(),
                e
            )));
        }
    }
    Ok(())
}
