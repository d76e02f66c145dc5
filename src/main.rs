//! Liquidity Book engine operator CLI
//!
//! Thin wrapper over the library for inspecting pools by hand:
//! - `discover`: one page of new pairs from the factory, cursor kept in a file
//! - `sync <pool>...`: full state refresh of several pools at once, records
//!   printed as JSON on stdout
//! - `quote <pool> <token_in> <amount>`: sync, then simulate a swap
//!
//! Logs go to stderr so stdout stays machine-readable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::future::try_join_all;
use lb_engine::chain::{ChainReader, MulticallReader};
use lb_engine::subgraph::HttpSubgraphClient;
use lb_engine::{EngineConfig, PoolRecord, PoolSimulator, PoolStore, PoolTracker, PoolsListUpdater};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Liquidity Book v2.0 pool simulation and sync
#[derive(Parser)]
#[command(name = "lb-engine")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "LB_ENGINE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one page of new pairs from the factory
    Discover {
        /// File holding the discovery cursor (created if missing)
        #[arg(long, default_value = "pools_cursor.json")]
        cursor_file: PathBuf,
    },
    /// Fully sync pools concurrently and print their records
    Sync {
        pools: Vec<Address>,
        /// JSON array of saved records to refresh alongside `pools`
        #[arg(long)]
        records: Option<PathBuf>,
    },
    /// Sync a pool, then quote a swap against the fresh state
    Quote {
        pool: Address,
        token_in: Address,
        /// Raw input amount in token units (no decimals applied)
        amount: String,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let config = EngineConfig::load(&args.config)?;
    info!("Configuration loaded from {}", args.config.display());
    info!("RPC: {}...", config.chain.rpc_url.chars().take(30).collect::<String>());

    let provider = ProviderBuilder::new()
        .connect_http(config.chain.rpc_url.parse().context("Invalid RPC URL")?);
    let chain = Arc::new(MulticallReader::new(
        Arc::new(provider),
        config.chain.multicall_address,
        config.tracker.request_timeout(),
    ));

    match args.command {
        Command::Discover { cursor_file } => {
            let factory = config
                .discovery
                .factory_address
                .context("discovery.factory_address not set")?;
            let cursor = match std::fs::read(&cursor_file) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", cursor_file.display()))
                }
            };

            let updater = PoolsListUpdater::new(
                chain,
                factory,
                config.tracker.dex_id.clone(),
                config.discovery.new_pool_limit,
                config.tracker.request_timeout(),
            );
            let batch = updater.get_new_pools(&cursor).await?;

            println!("{}", serde_json::to_string_pretty(&batch.pools)?);
            for skipped in &batch.skipped {
                eprintln!("skipped: {}", serde_json::to_string(skipped)?);
            }
            std::fs::write(&cursor_file, &batch.metadata)
                .with_context(|| format!("Failed to write {}", cursor_file.display()))?;
            info!("Cursor saved to {}", cursor_file.display());
        }
        Command::Sync { pools, records } => {
            let mut bases = match records {
                Some(path) => load_records(&path)?,
                None => Vec::new(),
            };
            for pool in pools {
                bases.push(unsynced_record(chain.as_ref(), pool, &config).await?);
            }
            if bases.is_empty() {
                bail!("Nothing to sync: pass pool addresses or --records");
            }

            let tracker = tracker(&config, chain)?;
            let store = PoolStore::new();
            sync_into_store(&tracker, &store, &bases).await?;

            let mut synced = store.all();
            synced.sort_by_key(|record| record.address);
            let synced: Vec<&PoolRecord> = synced.iter().map(|record| record.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&synced)?);
        }
        Command::Quote { pool, token_in, amount } => {
            let amount_in: U256 = amount
                .parse()
                .with_context(|| format!("Invalid amount: {}", amount))?;

            let base = unsynced_record(chain.as_ref(), pool, &config).await?;
            let tracker = tracker(&config, chain)?;
            let store = PoolStore::new();
            sync_into_store(&tracker, &store, std::slice::from_ref(&base)).await?;

            let record = store.get(&pool).context("Pool missing from store after sync")?;
            let token_out = if token_in == record.token_x() {
                record.token_y()
            } else if token_in == record.token_y() {
                record.token_x()
            } else {
                bail!("{} is not a token of pool {}", token_in, pool);
            };

            let simulator = PoolSimulator::from_record(&record)?;
            let result = simulator.calc_amount_out(token_in, amount_in, token_out)?;
            info!(
                "Quote {} -> {}: in {} out {} (fee {}, protocol {})",
                token_in, token_out, amount_in, result.amount_out, result.fee, result.protocol_fee
            );

            let quote = serde_json::json!({
                "pool": pool,
                "tokenIn": token_in,
                "tokenOut": token_out,
                "amountIn": amount_in.to_string(),
                "amountOut": result.amount_out.to_string(),
                "fee": result.fee.to_string(),
                "protocolFee": result.protocol_fee.to_string(),
                "newActiveId": result.swap_info.new_active_id,
                "binsCrossed": result.swap_info.bins_reserve_changes.len(),
            });
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
    }

    Ok(())
}

fn tracker<C: ChainReader>(
    config: &EngineConfig,
    chain: Arc<C>,
) -> Result<PoolTracker<C, HttpSubgraphClient>> {
    let subgraph = HttpSubgraphClient::new(
        config.tracker.subgraph_url.clone(),
        config.tracker.request_timeout(),
    )
    .context("Failed to build subgraph client")?;
    Ok(PoolTracker::new(config.tracker.clone(), chain, Arc::new(subgraph)))
}

/// Full sync of every record concurrently; each result lands in `store`.
async fn sync_into_store<C: ChainReader>(
    tracker: &PoolTracker<C, HttpSubgraphClient>,
    store: &PoolStore,
    bases: &[PoolRecord],
) -> Result<()> {
    try_join_all(bases.iter().map(|base| async move {
        let synced = tracker
            .get_new_pool_state(base)
            .await
            .with_context(|| format!("Failed to sync pool {}", base.address))?;
        store.upsert(synced);
        Ok::<_, anyhow::Error>(())
    }))
    .await?;
    info!("Synced {} pools", store.len());
    Ok(())
}

fn load_records(path: &Path) -> Result<Vec<PoolRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid pool records in {}", path.display()))
}

/// Record with tokens read from the pair and no state yet
async fn unsynced_record<C: ChainReader>(chain: &C, pool: Address, config: &EngineConfig) -> Result<PoolRecord> {
    let timeout = config.tracker.request_timeout();
    let tokens = tokio::time::timeout(timeout, chain.pair_tokens(&[pool]))
        .await
        .context("Timed out reading pair tokens")??;
    let (token_x, token_y) = tokens
        .into_iter()
        .next()
        .flatten()
        .with_context(|| format!("{} did not answer tokenX/tokenY", pool))?;
    Ok(PoolRecord::new_unsynced(pool, &config.tracker.dex_id, token_x, token_y))
}
