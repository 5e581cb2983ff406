//! Environment based configuration.
use std::fmt::Display;
use std::str::FromStr;

use ethers::types::Address;
use eyre::{Result, WrapErr};
use tokio::time::Duration;

use crate::metrics_aggregator::DEFAULT_CACHE_TTL_SECS;

pub const DEFAULT_RPC_URL: &str = "https://sepolia-rollup.arbitrum.io/rpc";
pub const DEFAULT_CHAIN_NAME: &str = "arbitrum-sepolia";
pub const DEFAULT_AAVE_POOL: &str = "0xBfC91D59fdAA134A4ED45f7B584cAf96D7792Eff";
pub const DEFAULT_ASSET: &str = "0x75faf114eafb1BDbe2F0316DF893fd58CE46AA4d";
pub const DEFAULT_MULTICALL: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";
pub const DEFAULT_ASSET_DECIMALS: u32 = 6;
/// Largest scale a `Decimal` can carry.
pub const MAX_ASSET_DECIMALS: u32 = 28;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublisherKind {
    Log,
    JsonFile { directory: String },
    Http { server_url: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub rpc_url: String,
    pub chain_name: String,
    pub aave_pool_address: Address,
    pub asset_address: Address,
    pub asset_decimals: u32,
    /// Compound market is skipped when not configured.
    pub compound_comet_address: Option<Address>,
    pub multicall_address: Address,
    pub cache_ttl: Duration,
    pub call_timeout: Duration,
    pub protocol_timeout: Duration,
    pub poll_interval: Duration,
    pub max_rounds: Option<u64>,
    pub publisher: PublisherKind,
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| eyre::eyre!("{}", e))
        .wrap_err_with(|| format!("Invalid value {:?} for {}", raw, key))
}

fn seconds(key: &str, raw: &str) -> Result<Duration> {
    let secs: u64 = parse(key, raw)?;
    if secs == 0 {
        eyre::bail!("{} must be greater than zero", key);
    }
    Ok(Duration::from_secs(secs))
}

fn decimals(key: &str, raw: &str) -> Result<u32> {
    let decimals: u32 = parse(key, raw)?;
    if decimals > MAX_ASSET_DECIMALS {
        eyre::bail!("{} must be at most {}, got {}", key, MAX_ASSET_DECIMALS, decimals);
    }
    Ok(decimals)
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let publisher = match var("PUBLISHER", "log").as_str() {
            "log" => PublisherKind::Log,
            "json" => PublisherKind::JsonFile {
                directory: var("SNAPSHOT_DIR", "snapshots"),
            },
            "http" => PublisherKind::Http {
                server_url: lookup("SNAPSHOT_SERVER_URL").ok_or_else(|| {
                    eyre::eyre!("SNAPSHOT_SERVER_URL is required when PUBLISHER=http")
                })?,
            },
            other => eyre::bail!("Unknown PUBLISHER {:?}, expected log, json or http", other),
        };

        Ok(Config {
            rpc_url: var("RPC_URL", DEFAULT_RPC_URL),
            chain_name: var("CHAIN_NAME", DEFAULT_CHAIN_NAME),
            aave_pool_address: parse("AAVE_POOL_ADDRESS", &var("AAVE_POOL_ADDRESS", DEFAULT_AAVE_POOL))?,
            asset_address: parse("ASSET_ADDRESS", &var("ASSET_ADDRESS", DEFAULT_ASSET))?,
            asset_decimals: decimals(
                "ASSET_DECIMALS",
                &var("ASSET_DECIMALS", &DEFAULT_ASSET_DECIMALS.to_string()),
            )?,
            compound_comet_address: lookup("COMPOUND_COMET_ADDRESS")
                .map(|raw| parse("COMPOUND_COMET_ADDRESS", &raw))
                .transpose()?,
            multicall_address: parse("MULTICALL_ADDRESS", &var("MULTICALL_ADDRESS", DEFAULT_MULTICALL))?,
            cache_ttl: seconds(
                "CACHE_TTL_SECS",
                &var("CACHE_TTL_SECS", &DEFAULT_CACHE_TTL_SECS.to_string()),
            )?,
            call_timeout: seconds("CALL_TIMEOUT_SECS", &var("CALL_TIMEOUT_SECS", "10"))?,
            protocol_timeout: seconds("PROTOCOL_TIMEOUT_SECS", &var("PROTOCOL_TIMEOUT_SECS", "20"))?,
            poll_interval: seconds("POLL_INTERVAL_SECS", &var("POLL_INTERVAL_SECS", "30"))?,
            max_rounds: lookup("MAX_ROUNDS")
                .map(|raw| parse("MAX_ROUNDS", &raw))
                .transpose()?,
            publisher,
        })
    }
}
