//! Node discovery
//!
//! Asks one known member for the cluster's live node list and installs the
//! answer into the [`MembershipStore`].

use crate::membership::MembershipStore;
use livenodes_core::{
    ContactStrategy, DiscoveryFailure, Endpoint, LbError, LiveNodesConfig, Result,
    TransportConfig,
};
use reqwest::{Client, Url};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Filter used to probe whether the server honours rack filtering at all
const FAKE_RACK_QUERY: &str = "rack=fakeRack";

/// The HTTP capability discovery needs: GET a URL and decode its JSON body
pub trait NodeListTransport: Send + Sync + 'static {
    fn get_json(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<Value, DiscoveryFailure>> + Send;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if config.no_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| LbError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl NodeListTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> std::result::Result<Value, DiscoveryFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryFailure::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DiscoveryFailure::Transport(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| DiscoveryFailure::MalformedJson(e.to_string()))
    }
}

/// Turn a discovery response into endpoints.
///
/// Elements that are not strings, are blank, or do not form a valid URL
/// with the configured scheme and port are skipped. A non-list payload or a
/// list with nothing usable is a failure.
pub fn parse_node_list(
    body: &Value,
    config: &LiveNodesConfig,
) -> std::result::Result<Vec<Endpoint>, DiscoveryFailure> {
    let items = body.as_array().ok_or(DiscoveryFailure::NotAList)?;

    let mut endpoints = Vec::with_capacity(items.len());
    for item in items {
        let Some(host) = item.as_str().map(str::trim) else {
            tracing::debug!(element = %item, "Skipping non-string node entry");
            continue;
        };
        if host.is_empty() {
            continue;
        }

        let endpoint = config.host_endpoint(host);
        if let Err(e) = Url::parse(&endpoint.base_url()) {
            tracing::warn!(host, error = %e, "Skipping invalid node host");
            continue;
        }
        endpoints.push(endpoint);
    }

    if endpoints.is_empty() {
        return Err(DiscoveryFailure::EmptyList);
    }
    Ok(endpoints)
}

/// Fetches the live node list and installs it into the membership store
pub struct DiscoveryFetcher<T> {
    transport: T,
    store: Arc<MembershipStore>,
    config: Arc<LiveNodesConfig>,
}

impl<T: NodeListTransport> DiscoveryFetcher<T> {
    pub fn new(transport: T, store: Arc<MembershipStore>, config: Arc<LiveNodesConfig>) -> Self {
        Self {
            transport,
            store,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Member to ask for the next node list
    pub fn contact(&self) -> Endpoint {
        match self.config.contact_strategy {
            ContactStrategy::RandomMember => self.store.pick_random(),
            ContactStrategy::Seed => self.store.seed_contact(),
        }
    }

    /// Run one discovery round.
    ///
    /// On success the returned list is already installed and the round-robin
    /// cursor is back at its first entry. On failure the store is untouched.
    pub async fn fetch(&self) -> Result<Vec<Endpoint>> {
        let contact = self.contact();
        let query = self.config.discovery_query();
        let endpoints = self.query(&contact, query.as_deref()).await?;

        self.store.replace(endpoints.clone())?;
        tracing::debug!(
            contact = %contact,
            nodes = endpoints.len(),
            "Installed discovered nodes"
        );
        Ok(endpoints)
    }

    /// Ask `contact` for its node list without touching the store
    pub async fn query(&self, contact: &Endpoint, query: Option<&str>) -> Result<Vec<Endpoint>> {
        let url = contact.url_with(&self.config.discovery_path, query);

        let body = self
            .transport
            .get_json(&url)
            .await
            .map_err(|reason| LbError::discovery(&url, reason))?;

        parse_node_list(&body, &self.config).map_err(|reason| LbError::discovery(&url, reason))
    }

    /// Verify the configured rack/datacenter filter matches at least one node
    pub async fn check_rack_and_datacenter(&self) -> Result<()> {
        let Some(query) = self.config.discovery_query() else {
            return Ok(());
        };

        match self.query(&self.contact(), Some(&query)).await {
            Ok(_) => Ok(()),
            Err(LbError::DiscoveryFailed {
                reason: DiscoveryFailure::EmptyList,
                ..
            }) => Err(LbError::RackOrDatacenterMismatch {
                rack: self.config.rack.clone(),
                datacenter: self.config.datacenter.clone(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Whether the contacted server filters its node list by rack.
    ///
    /// A server without filtering support answers a bogus rack with the full
    /// list, so the two counts match.
    pub async fn rack_datacenter_supported(&self) -> Result<bool> {
        let contact = self.contact();

        let with_fake_rack = match self.query(&contact, Some(FAKE_RACK_QUERY)).await {
            Ok(nodes) => nodes.len(),
            Err(LbError::DiscoveryFailed {
                reason: DiscoveryFailure::EmptyList,
                ..
            }) => 0,
            Err(e) => return Err(e),
        };
        let without_filter = self.query(&contact, None).await?.len();

        Ok(with_fake_rack != without_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use livenodes_core::Scheme;
    use serde_json::json;

    fn config() -> LiveNodesConfig {
        LiveNodesConfig::new(Scheme::Http, vec!["seed".into()], 8000)
    }

    fn fetcher(
        config: LiveNodesConfig,
        transport: MockTransport,
    ) -> DiscoveryFetcher<MockTransport> {
        let store = Arc::new(MembershipStore::new(config.seed_endpoints()).unwrap());
        DiscoveryFetcher::new(transport, store, Arc::new(config))
    }

    fn hosts(endpoints: &[Endpoint]) -> Vec<&str> {
        endpoints.iter().map(|e| e.host()).collect()
    }

    #[test]
    fn test_parse_node_list() {
        let parsed = parse_node_list(&json!(["a", "b", "c"]), &config()).unwrap();
        let urls: Vec<String> = parsed.iter().map(|e| e.to_string()).collect();
        assert_eq!(urls, vec!["http://a:8000", "http://b:8000", "http://c:8000"]);
    }

    #[test]
    fn test_parse_skips_unusable_entries() {
        let body = json!(["a", 42, null, "", "  ", {"host": "x"}, "b", "bad host"]);
        let parsed = parse_node_list(&body, &config()).unwrap();
        assert_eq!(hosts(&parsed), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_rejects_non_list_and_empty() {
        assert_eq!(
            parse_node_list(&json!({"nodes": ["a"]}), &config()),
            Err(DiscoveryFailure::NotAList)
        );
        assert_eq!(
            parse_node_list(&json!([]), &config()),
            Err(DiscoveryFailure::EmptyList)
        );
        assert_eq!(
            parse_node_list(&json!([1, 2]), &config()),
            Err(DiscoveryFailure::EmptyList)
        );
    }

    #[tokio::test]
    async fn test_fetch_installs_nodes_and_resets_cursor() {
        let transport = MockTransport::new();
        transport.push_ok(json!(["a", "b", "c"]));
        let fetcher = fetcher(config(), transport.clone());

        // Move the cursor off zero first
        fetcher.store.next();

        let installed = fetcher.fetch().await.unwrap();
        assert_eq!(hosts(&installed), vec!["a", "b", "c"]);
        assert_eq!(fetcher.store.next().to_string(), "http://a:8000");
        assert_eq!(fetcher.store.next().to_string(), "http://b:8000");
        assert_eq!(transport.requests(), vec!["http://seed:8000/localnodes"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_store_unchanged() {
        let transport = MockTransport::new();
        transport.push_ok(json!({"not": "a list"}));
        transport.push_ok(json!([]));
        transport.push_err(DiscoveryFailure::Status(500));
        transport.push_err(DiscoveryFailure::MalformedJson("eof".into()));
        let fetcher = fetcher(config(), transport.clone());

        let expected = [
            DiscoveryFailure::NotAList,
            DiscoveryFailure::EmptyList,
            DiscoveryFailure::Status(500),
            DiscoveryFailure::MalformedJson("eof".into()),
        ];
        for want in expected {
            match fetcher.fetch().await {
                Err(LbError::DiscoveryFailed { reason, .. }) => assert_eq!(reason, want),
                other => panic!("expected DiscoveryFailed, got {:?}", other),
            }
            assert_eq!(hosts(&fetcher.store.snapshot()), vec!["seed"]);
        }
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn test_fetch_sends_locality_query() {
        let mut config = config();
        config.rack = Some("r1".into());
        config.datacenter = Some("dc1".into());

        let transport = MockTransport::new();
        transport.push_ok(json!(["a"]));
        let fetcher = fetcher(config, transport.clone());
        fetcher.fetch().await.unwrap();

        assert_eq!(
            transport.requests(),
            vec!["http://seed:8000/localnodes?rack=r1&dc=dc1"]
        );
    }

    #[tokio::test]
    async fn test_seed_strategy_always_contacts_seed() {
        let mut config = config();
        config.contact_strategy = ContactStrategy::Seed;

        let transport = MockTransport::new();
        transport.push_ok(json!(["a", "b"]));
        transport.push_ok(json!(["c"]));
        let fetcher = fetcher(config, transport.clone());

        fetcher.fetch().await.unwrap();
        fetcher.fetch().await.unwrap();

        assert_eq!(
            transport.requests(),
            vec!["http://seed:8000/localnodes", "http://seed:8000/localnodes"]
        );
    }

    #[tokio::test]
    async fn test_random_strategy_contacts_current_member() {
        let transport = MockTransport::new();
        transport.push_ok(json!(["a"]));
        transport.push_ok(json!(["a"]));
        let fetcher = fetcher(config(), transport.clone());

        fetcher.fetch().await.unwrap();
        fetcher.fetch().await.unwrap();

        // Second round can only pick "a", the seed is gone from the list
        assert_eq!(transport.requests()[1], "http://a:8000/localnodes");
    }

    #[tokio::test]
    async fn test_check_rack_and_datacenter() {
        // No filter configured: nothing is sent
        let transport = MockTransport::new();
        let unfiltered = fetcher(config(), transport.clone());
        unfiltered.check_rack_and_datacenter().await.unwrap();
        assert_eq!(transport.call_count(), 0);

        let mut filtered_config = config();
        filtered_config.rack = Some("missing".into());
        let transport = MockTransport::new();
        transport.push_ok(json!([]));
        transport.push_ok(json!(["a"]));
        let filtered = fetcher(filtered_config, transport.clone());

        assert!(matches!(
            filtered.check_rack_and_datacenter().await,
            Err(LbError::RackOrDatacenterMismatch { rack: Some(_), datacenter: None })
        ));
        filtered.check_rack_and_datacenter().await.unwrap();
        // Checks never install anything
        assert_eq!(hosts(&filtered.store.snapshot()), vec!["seed"]);
    }

    #[tokio::test]
    async fn test_rack_datacenter_supported() {
        let transport = MockTransport::new();
        transport.push_ok(json!([]));
        transport.push_ok(json!(["a", "b"]));
        transport.push_ok(json!(["a", "b"]));
        transport.push_ok(json!(["a", "b"]));
        let fetcher = fetcher(config(), transport.clone());

        assert!(fetcher.rack_datacenter_supported().await.unwrap());
        assert!(!fetcher.rack_datacenter_supported().await.unwrap());

        let requests = transport.requests();
        assert_eq!(requests[0], "http://seed:8000/localnodes?rack=fakeRack");
        assert_eq!(requests[1], "http://seed:8000/localnodes");
    }
}
