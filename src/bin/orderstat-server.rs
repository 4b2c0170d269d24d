use std::{error::Error, sync::Arc};

use log::{info, warn};
use orderstat::{
    config::{read_config_file, resolve_config_path},
    network::run_server,
    provision::SchemaProvisioner,
    stat_log,
    statistics::{ClickHouseStatistics, Statistics},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>>
{
    let config_path = resolve_config_path(std::env::args().nth(1));
    let config = read_config_file(&config_path)?;
    let _guard = stat_log::init_from_config(&config.log)?;
    info!("[OrderStat] : Loaded configuration from {}.", config_path.display());

    if config.migration.provision_on_startup {
        let report = SchemaProvisioner::from_config(&config)?.provision().await?;
        info!("[OrderStat] : Schema ready in {} ({} statements).", report.database, report.statements);
    }

    let store: Arc<dyn Statistics> = Arc::new(ClickHouseStatistics::connect(&config.clickhouse).await?);
    let addr = config.server.socket_addr()?;

    run_server(addr, store, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[OrderStat] : Failed to listen for shutdown signal: {}", e);
        }
        info!("[OrderStat] : Shutdown signal received.");
    }).await?;

    Ok(())
}
