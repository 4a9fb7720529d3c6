use std::sync::Arc;

use clap::Parser;
use slog::{error, info, o};

use netclass_exporter::collector::NodeCollector;
use netclass_exporter::config::Config;
use netclass_exporter::logging;
use netclass_exporter::sysfs::FS;
use netclass_exporter::web::{self, Handler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    let logger = logging::new_logger(config.log_level);

    info!(logger, "Starting netclass_exporter"; "version" => env!("CARGO_PKG_VERSION"));

    let fs = match FS::new(&config.sysfs_path) {
        Ok(fs) => fs
            .with_policy(config.soft_error_policy())
            .with_logger(logger.new(o!("component" => "sysfs"))),
        Err(err) => {
            error!(logger, "failed to open sysfs"; "err" => %err);
            return Err(err.into());
        }
    };

    let nc = NodeCollector::new(&fs, &config.collector_config(), &logger);
    info!(logger, "Enabled collectors");
    for name in nc.collector_names() {
        info!(logger, "{}", name);
    }

    let handler = match Handler::new(nc, config.telemetry_path.clone(), logger.clone()) {
        Ok(handler) => Arc::new(handler),
        Err(err) => {
            error!(logger, "failed to register collectors"; "err" => %err);
            return Err(err.into());
        }
    };
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(logger, "failed to listen for shutdown signal"; "err" => %err);
            std::future::pending::<()>().await;
        }
    };

    if let Err(err) = web::serve(config.listen_address, handler, shutdown).await {
        error!(logger, "server error"; "err" => %err);
        return Err(err.into());
    }
    Ok(())
}
