// Copyright 2015 The Prometheus Authors
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

use std::sync::Arc;

use slog::{debug, Logger};

use crate::collector::{build_fq_name, Collector, CollectorError, ConstMetric, TypedDesc, ValueType, NAMESPACE};
use crate::sysfs::FS;

/// Exposes the number of configured and active slaves of Linux bonding
/// interfaces.
pub struct BondingCollector {
    fs: FS,
    slaves: Arc<TypedDesc>,
    active: Arc<TypedDesc>,
    logger: Logger,
}

impl BondingCollector {
    pub fn new(fs: FS, logger: Logger) -> Self {
        BondingCollector {
            fs,
            slaves: TypedDesc::new(
                build_fq_name(NAMESPACE, "bonding", "slaves"),
                "Number of configured slaves per bonding interface.",
                &["master"],
                ValueType::Gauge,
            ),
            active: TypedDesc::new(
                build_fq_name(NAMESPACE, "bonding", "active"),
                "Number of active slaves per bonding interface.",
                &["master"],
                ValueType::Gauge,
            ),
            logger,
        }
    }
}

impl Collector for BondingCollector {
    fn update(&self, ch: &mut dyn FnMut(ConstMetric)) -> Result<(), CollectorError> {
        let bonding_stats = match self.fs.net_class_bonding()? {
            Some(stats) if !stats.is_empty() => stats,
            _ => {
                debug!(self.logger, "Not collecting bonding, no bonds found");
                return Err(CollectorError::NoData);
            }
        };

        for (master, bonding_info) in &bonding_stats {
            ch(ConstMetric::new(&self.slaves, bonding_info.slave_count() as f64, vec![master.clone()]));
            ch(ConstMetric::new(&self.active, bonding_info.active_count() as f64, vec![master.clone()]));
        }

        Ok(())
    }
}
