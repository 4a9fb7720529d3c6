use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use regex::Regex;

use crate::collector::CollectorConfig;
use crate::logging::LogLevel;
use crate::sysfs::{SoftCondition, SoftErrorPolicy, DEFAULT_MOUNT_POINT};

/// Exports bonding and network interface state read from sysfs.
#[derive(Debug, Clone, Parser)]
#[command(name = "netclass_exporter", version)]
pub struct Config {
    /// sysfs mountpoint.
    #[arg(long = "path.sysfs", env = "NODE_EXPORTER_SYSFS", default_value = DEFAULT_MOUNT_POINT)]
    pub sysfs_path: PathBuf,

    /// Address on which to expose metrics and web interface.
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:9100")]
    pub listen_address: SocketAddr,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", default_value = "/metrics", value_parser = parse_telemetry_path)]
    pub telemetry_path: String,

    /// Disable the bonding collector.
    #[arg(long = "no-collector.bonding")]
    pub no_bonding: bool,

    /// Disable the netclass collector.
    #[arg(long = "no-collector.netclass")]
    pub no_netclass: bool,

    /// Regexp of net devices to ignore for the netclass collector.
    #[arg(long = "collector.netclass.ignored-devices", default_value = "^$")]
    pub netclass_ignored_devices: Regex,

    /// Attribute read errors that only skip the attribute instead of failing
    /// the interface.
    #[arg(
        long = "sysfs.soft-errors",
        value_enum,
        value_delimiter = ',',
        default_values_t = SoftCondition::ALL.to_vec()
    )]
    pub soft_errors: Vec<SoftCondition>,

    /// Only log messages with the given severity or above.
    #[arg(long = "log.level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

impl Config {
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            bonding: !self.no_bonding,
            netclass: !self.no_netclass,
            netclass_ignored_devices: self.netclass_ignored_devices.clone(),
        }
    }

    pub fn soft_error_policy(&self) -> SoftErrorPolicy {
        SoftErrorPolicy::new(self.soft_errors.iter().copied())
    }
}

fn parse_telemetry_path(s: &str) -> Result<String, String> {
    if s.starts_with('/') {
        Ok(s.to_string())
    } else {
        Err(format!("telemetry path {:?} must start with '/'", s))
    }
}
