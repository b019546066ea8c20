use std::sync::Arc;

use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use rgsim_cluster::bootstrap::bootstrap_with_multi_stores;
use rgsim_cluster::Cluster;
use rgsim_storage::{MemMvccStore, MvccKey};

/// Commit timestamp for seeded keys.
const SEED_TS: u64 = 1;

#[derive(clap::Parser, Debug)]
#[command(name = "rgsim-node", about = "Simulated region placement metadata")]
struct Cli {
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    /// Overrides `topology.stores`.
    #[arg(long)]
    stores: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TopologyConfig {
    stores: usize,
    split_keys: Vec<String>,
    seed_keys: Vec<String>,
    even_split_regions: usize,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    log_level: String,
    log_format: String,
}

#[derive(Debug, Deserialize)]
struct Config {
    topology: TopologyConfig,
    observability: ObservabilityConfig,
}

#[derive(Serialize)]
struct TopologyOverride {
    stores: usize,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut figment = Figment::new()
        .merge(Toml::string(include_str!("../../../config/default.toml")));

    if let Some(ref config_path) = cli.config {
        figment = figment.merge(Toml::file_exact(config_path));
    }

    figment = figment.merge(Env::prefixed("RGSIM_").split("__"));

    if let Some(stores) = cli.stores {
        figment = figment.merge(Serialized::default("topology", TopologyOverride { stores }));
    }

    figment.extract().context("failed to load configuration")
}

fn build(topology: &TopologyConfig) -> anyhow::Result<Cluster<MemMvccStore>> {
    let mvcc = Arc::new(MemMvccStore::new());
    for key in &topology.seed_keys {
        mvcc.put(key.as_bytes(), key.as_bytes(), SEED_TS);
    }

    let cluster = Cluster::new(mvcc);
    let layout = bootstrap_with_multi_stores(&cluster, topology.stores)
        .context("failed to bootstrap cluster")?;

    let mut region_id = layout.region_id;
    for key in &topology.split_keys {
        let new_region_id = cluster.alloc_id();
        let peer_ids = cluster.alloc_ids(layout.store_ids.len());
        let leader = peer_ids[0];
        cluster
            .split(region_id, new_region_id, key.as_bytes(), &peer_ids, leader)
            .with_context(|| format!("failed to split at {key:?}"))?;
        region_id = new_region_id;
    }

    if topology.even_split_regions > 0 {
        cluster
            .split_keys(b"", b"", topology.even_split_regions)
            .context("failed to split keyspace evenly")?;
    }

    Ok(cluster)
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let log_format = config.observability.log_format.as_str();
    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(&config.observability.log_level)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(&config.observability.log_level)
                .init();
        }
    }

    tracing::info!(
        stores = config.topology.stores,
        split_keys = config.topology.split_keys.len(),
        seed_keys = config.topology.seed_keys.len(),
        "building topology"
    );

    let cluster = build(&config.topology)?;

    for store in cluster.get_all_stores() {
        tracing::info!(store_id = store.id, address = %store.address, state = ?store.state, "store");
    }
    for region in cluster.get_all_regions() {
        let start = MvccKey::from_encoded(region.start_key.clone()).raw()?;
        let end = MvccKey::from_encoded(region.end_key.clone()).raw()?;
        let leader = cluster.get_region(region.id).map(|(_, leader)| leader).unwrap_or_default();
        tracing::info!(
            region_id = region.id,
            start = %String::from_utf8_lossy(&start),
            end = %String::from_utf8_lossy(&end),
            peers = region.peers.len(),
            leader,
            conf_ver = region.region_epoch.conf_ver,
            version = region.region_epoch.version,
            "region"
        );
    }

    Ok(())
}
