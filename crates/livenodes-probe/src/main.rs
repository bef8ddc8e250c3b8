//! livenodes probe - Discover a cluster's live nodes from a seed

use anyhow::Context;
use clap::{Parser, ValueEnum};
use livenodes_cluster::LiveNodes;
use livenodes_core::{ContactStrategy, LiveNodesConfig, Scheme};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Which node to ask for the node list
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Contact {
    /// A random member of the current list
    Random,
    /// Always the first seed
    Seed,
}

impl From<Contact> for ContactStrategy {
    fn from(contact: Contact) -> Self {
        match contact {
            Contact::Random => ContactStrategy::RandomMember,
            Contact::Seed => ContactStrategy::Seed,
        }
    }
}

#[derive(Parser)]
#[command(name = "livenodes-probe")]
#[command(about = "Discover and watch the live members of a cluster")]
struct Args {
    /// Seed hosts (no scheme, no port)
    seeds: Vec<String>,

    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scheme used to reach every node
    #[arg(long)]
    scheme: Option<Scheme>,

    /// Port shared by every node
    #[arg(long)]
    port: Option<u16>,

    /// Only use nodes from this rack
    #[arg(long)]
    rack: Option<String>,

    /// Only use nodes from this datacenter
    #[arg(long)]
    datacenter: Option<String>,

    /// Which node to ask for the node list
    #[arg(long, value_enum)]
    contact: Option<Contact>,

    /// Keep refreshing every N seconds until Ctrl-C
    #[arg(long)]
    watch: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(LiveNodesConfig, Option<Duration>)> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => LiveNodesConfig::default(),
        };

        if !self.seeds.is_empty() {
            config.seeds = self.seeds;
        }
        if let Some(scheme) = self.scheme {
            config.scheme = scheme;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.rack.is_some() {
            config.rack = self.rack;
        }
        if self.datacenter.is_some() {
            config.datacenter = self.datacenter;
        }
        if let Some(contact) = self.contact {
            config.contact_strategy = contact.into();
        }
        if self.watch == Some(0) {
            anyhow::bail!("--watch interval must be at least 1 second");
        }

        Ok((config, self.watch.map(Duration::from_secs)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, watch) = Args::parse().into_config()?;

    tracing::info!(
        seeds = ?config.seeds,
        scheme = %config.scheme,
        port = config.port,
        "Probing cluster"
    );

    let nodes = LiveNodes::connect(config).await?;
    nodes.check_rack_and_datacenter().await?;

    for endpoint in nodes.known_nodes() {
        println!("{}", endpoint);
    }

    let Some(interval) = watch else {
        return Ok(());
    };

    nodes.start(interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let known: Vec<String> = nodes.known_nodes().iter().map(|e| e.to_string()).collect();
                tracing::info!(nodes = ?known, "Current membership");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    nodes.stop().await;
    println!("{}", serde_json::to_string_pretty(&nodes.refresh_stats())?);

    Ok(())
}
