//! Reads network interface and bonding state from sysfs and exposes it in
//! the Prometheus text format, node_exporter style.

pub mod collector;
pub mod config;
pub mod logging;
pub mod sysfs;
pub mod web;

#[cfg(test)]
mod testutil;
