mod abi_words;
mod chain_reader;
mod config;
mod error;
mod fixed_point;
mod metrics_aggregator;
mod monitor_scheduler;
mod protocol_fetcher;
mod snapshot_publisher;
mod snapshot_series;
mod tvl_tracker;

use std::sync::Arc;

use eyre::Result;

use chain_reader::rpc::RpcChainReader;
use config::{Config, PublisherKind};
use metrics_aggregator::MetricsAggregator;
use monitor_scheduler::MonitorScheduler;
use protocol_fetcher::{aave::AaveFetcher, compound::CompoundFetcher, ProtocolFetcher};
use snapshot_publisher::{
    http::HttpSnapshotPublisher, json::JsonFileSnapshotPublisher, log::LogSnapshotPublisher,
    SnapshotPublisher,
};
use snapshot_series::SnapshotSeries;
use tvl_tracker::TvlTracker;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    log::debug!("Config: {:?}", config);

    let reader = Arc::new(RpcChainReader::new(
        &config.rpc_url,
        config.multicall_address,
        config.call_timeout,
    )?);
    log::info!("Initialized chain reader for {}", config.chain_name);

    let mut fetchers: Vec<Box<dyn ProtocolFetcher>> = vec![Box::new(AaveFetcher::new(
        reader.clone(),
        config.aave_pool_address,
        config.asset_address,
        config.asset_decimals,
    ))];
    match config.compound_comet_address {
        Some(comet) => fetchers.push(Box::new(CompoundFetcher::new(
            reader.clone(),
            comet,
            config.asset_decimals,
        ))),
        None => log::warn!("COMPOUND_COMET_ADDRESS not set, skipping Compound"),
    }
    log::info!("Initialized {} protocol fetchers", fetchers.len());

    let aggregator = Arc::new(MetricsAggregator::new(
        fetchers,
        config.chain_name.clone(),
        config.cache_ttl,
        config.protocol_timeout,
    ));
    let tracker = Arc::new(TvlTracker::new(SnapshotSeries::default()));
    log::info!("Initialized metrics aggregator and TVL tracker");

    let publisher: Box<dyn SnapshotPublisher> = match config.publisher {
        PublisherKind::Log => Box::new(LogSnapshotPublisher {}),
        PublisherKind::JsonFile { directory } => {
            Box::new(JsonFileSnapshotPublisher::new(Some(directory))?)
        }
        PublisherKind::Http { server_url } => Box::new(HttpSnapshotPublisher::new(server_url)),
    };
    log::info!("Initialized snapshot publisher");

    let scheduler = MonitorScheduler::new(
        aggregator,
        tracker,
        publisher,
        config.poll_interval,
        config.max_rounds,
    );

    scheduler.run().await;

    Ok(())
}
