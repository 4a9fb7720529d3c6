// Copyright 2018 The Prometheus Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use regex::Regex;
use slog::{debug, Logger};

use crate::collector::{build_fq_name, Collector, CollectorError, ConstMetric, TypedDesc, ValueType, NAMESPACE};
use crate::sysfs::{NetClassIface, FS};

pub struct NetClassCollector {
    fs: FS,
    subsystem: String,
    ignored_devices_pattern: Regex,
    metric_descs: Mutex<HashMap<String, Arc<TypedDesc>>>,
    logger: Logger,
}

impl NetClassCollector {
    pub fn new(fs: FS, ignored_devices_pattern: Regex, logger: Logger) -> Self {
        NetClassCollector {
            fs,
            subsystem: "network".to_string(),
            ignored_devices_pattern,
            metric_descs: Mutex::new(HashMap::new()),
            logger,
        }
    }

    /// Returns the cached desc for `name`, creating it on first use.
    fn desc(&self, name: &str, help: &str, labels: &[&str], value_type: ValueType) -> Arc<TypedDesc> {
        let mut descs = self.metric_descs.lock().unwrap_or_else(|e| e.into_inner());
        descs
            .entry(name.to_string())
            .or_insert_with(|| TypedDesc::new(build_fq_name(NAMESPACE, &self.subsystem, name), help, labels, value_type))
            .clone()
    }

    fn push_metric(
        &self,
        ch: &mut dyn FnMut(ConstMetric),
        name: &str,
        value: Option<i64>,
        value_type: ValueType,
        device: &str,
    ) {
        let value = match value {
            Some(value) => value,
            None => return,
        };

        let help = format!("Network device property: {}", name);
        let desc = self.desc(name, &help, &["device"], value_type);
        ch(ConstMetric::new(&desc, value as f64, vec![device.to_string()]));
    }

    fn update_iface(&self, ch: &mut dyn FnMut(ConstMetric), iface: &NetClassIface) {
        let up_desc = self.desc(
            "up",
            "Value is 1 if operstate is 'up', 0 otherwise.",
            &["device"],
            ValueType::Gauge,
        );
        let up = if iface.operstate == "up" { 1.0 } else { 0.0 };
        ch(ConstMetric::new(&up_desc, up, vec![iface.name.clone()]));

        let info_desc = self.desc(
            "info",
            "Non-numeric data from /sys/class/net/<iface>, value is always 1.",
            &["device", "address", "broadcast", "duplex", "operstate", "adminstate", "ifalias"],
            ValueType::Gauge,
        );
        ch(ConstMetric::new(
            &info_desc,
            1.0,
            vec![
                iface.name.clone(),
                iface.address.clone(),
                iface.broadcast.clone(),
                iface.duplex.clone(),
                iface.operstate.clone(),
                get_admin_state(iface.flags).to_string(),
                iface.ifalias.clone(),
            ],
        ));

        let device = iface.name.as_str();
        self.push_metric(ch, "address_assign_type", iface.addr_assign_type, ValueType::Gauge, device);
        self.push_metric(ch, "carrier", iface.carrier, ValueType::Gauge, device);
        self.push_metric(ch, "carrier_changes_total", iface.carrier_changes, ValueType::Counter, device);
        self.push_metric(ch, "carrier_up_changes_total", iface.carrier_up_count, ValueType::Counter, device);
        self.push_metric(ch, "carrier_down_changes_total", iface.carrier_down_count, ValueType::Counter, device);
        self.push_metric(ch, "device_id", iface.dev_id, ValueType::Gauge, device);
        self.push_metric(ch, "dormant", iface.dormant, ValueType::Gauge, device);
        self.push_metric(ch, "flags", iface.flags, ValueType::Gauge, device);
        self.push_metric(ch, "iface_id", iface.ifindex, ValueType::Gauge, device);
        self.push_metric(ch, "iface_link", iface.iflink, ValueType::Gauge, device);
        self.push_metric(ch, "iface_link_mode", iface.link_mode, ValueType::Gauge, device);
        self.push_metric(ch, "mtu_bytes", iface.mtu, ValueType::Gauge, device);
        self.push_metric(ch, "name_assign_type", iface.name_assign_type, ValueType::Gauge, device);
        self.push_metric(ch, "net_dev_group", iface.netdev_group, ValueType::Gauge, device);

        // speed is -1 while the link is down.
        let speed_bytes = iface.speed.filter(|s| *s >= 0).map(|s| s.saturating_mul(1000 * 1000) / 8);
        self.push_metric(ch, "speed_bytes", speed_bytes, ValueType::Gauge, device);

        self.push_metric(ch, "transmit_queue_length", iface.tx_queue_len, ValueType::Gauge, device);
        self.push_metric(ch, "protocol_type", iface.type_, ValueType::Gauge, device);
    }
}

impl Collector for NetClassCollector {
    fn update(&self, ch: &mut dyn FnMut(ConstMetric)) -> Result<(), CollectorError> {
        let net_class = self.fs.net_class()?;
        for iface in net_class.values() {
            if self.ignored_devices_pattern.is_match(&iface.name) {
                debug!(self.logger, "Ignoring device"; "device" => &iface.name);
                continue;
            }
            self.update_iface(ch, iface);
        }
        Ok(())
    }
}

fn get_admin_state(flags: Option<i64>) -> &'static str {
    match flags {
        None => "unknown",
        Some(flags) if flags & libc::IFF_UP as i64 != 0 => "up",
        Some(_) => "down",
    }
}
