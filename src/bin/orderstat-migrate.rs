use std::error::Error;

use log::{error, info};
use orderstat::{
    config::{read_config_file, resolve_config_path},
    provision::SchemaProvisioner,
    stat_log,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>>
{
    let config_path = resolve_config_path(std::env::args().nth(1));
    let config = read_config_file(&config_path)?;
    let _guard = stat_log::init_from_config(&config.log)?;
    info!("[OrderStat] : Loaded configuration from {}.", config_path.display());

    let provisioner = SchemaProvisioner::from_config(&config)?;
    match provisioner.provision().await {
        | Ok(report) => {
            info!("[OrderStat] : Migration finished: {} statements applied to {}.", report.statements, report.database);
            Ok(())
        }
        | Err(e) => {
            error!("[OrderStat] : Migration failed: {}", e);
            Err(e.into())
        }
    }
}
