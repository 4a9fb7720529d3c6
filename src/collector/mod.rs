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

//! Collector plumbing: typed samples, the `Collector` trait and the
//! `NodeCollector` that runs every enabled collector per scrape.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use lazy_static::lazy_static;
use prometheus::core::Desc;
use prometheus::proto::{self, MetricFamily, MetricType};
use regex::Regex;
use slog::{debug, error, o, Logger};
use thiserror::Error;

use crate::sysfs::{SysfsError, FS};

mod bonding_linux;
mod netclass_linux;

pub use bonding_linux::BondingCollector;
pub use netclass_linux::NetClassCollector;

pub const NAMESPACE: &str = "node";

lazy_static! {
    static ref SCRAPE_DURATION_DESC: Arc<TypedDesc> = TypedDesc::new(
        build_fq_name(NAMESPACE, "scrape", "collector_duration_seconds"),
        "node_exporter: Duration of a collector scrape.",
        &["collector"],
        ValueType::Gauge,
    );
    static ref SCRAPE_SUCCESS_DESC: Arc<TypedDesc> = TypedDesc::new(
        build_fq_name(NAMESPACE, "scrape", "collector_success"),
        "node_exporter: Whether a collector succeeded.",
        &["collector"],
        ValueType::Gauge,
    );
    static ref SCRAPE_DESCS: Vec<Desc> = [&*SCRAPE_DURATION_DESC, &*SCRAPE_SUCCESS_DESC]
        .iter()
        .map(|desc| desc.to_desc().expect("valid scrape desc"))
        .collect();
}

#[derive(Debug, Error)]
pub enum CollectorError {
    /// The collector ran fine but had nothing to report.
    #[error("collector returned no data")]
    NoData,
    #[error(transparent)]
    Sysfs(#[from] SysfsError),
}

impl CollectorError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, CollectorError::NoData)
    }
}

/// A single metric source. `update` pushes samples onto `ch` one at a time.
pub trait Collector: Send + Sync {
    fn update(&self, ch: &mut dyn FnMut(ConstMetric)) -> Result<(), CollectorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Gauge,
    Counter,
}

impl ValueType {
    fn metric_type(self) -> MetricType {
        match self {
            ValueType::Gauge => MetricType::GAUGE,
            ValueType::Counter => MetricType::COUNTER,
        }
    }
}

/// Joins the non-empty parts of a metric name with underscores.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Metric metadata shared by every sample of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedDesc {
    fq_name: String,
    help: String,
    variable_labels: Vec<String>,
    value_type: ValueType,
}

impl TypedDesc {
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        variable_labels: &[&str],
        value_type: ValueType,
    ) -> Arc<Self> {
        Arc::new(TypedDesc {
            fq_name: fq_name.into(),
            help: help.into(),
            variable_labels: variable_labels.iter().map(|l| l.to_string()).collect(),
            value_type,
        })
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn variable_labels(&self) -> &[String] {
        &self.variable_labels
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Converts to the descriptor a `prometheus::Registry` validates at
    /// registration.
    pub fn to_desc(&self) -> prometheus::Result<Desc> {
        Desc::new(
            self.fq_name.clone(),
            self.help.clone(),
            self.variable_labels.clone(),
            HashMap::new(),
        )
    }

    fn new_family(&self) -> MetricFamily {
        let mut family = MetricFamily::default();
        family.set_name(self.fq_name.clone());
        family.set_help(self.help.clone());
        family.set_field_type(self.value_type.metric_type());
        family
    }
}

/// One sample: a value plus label values matching its desc's variable labels.
#[derive(Debug, Clone)]
pub struct ConstMetric {
    desc: Arc<TypedDesc>,
    value: f64,
    label_values: Vec<String>,
}

impl ConstMetric {
    pub fn new(desc: &Arc<TypedDesc>, value: f64, label_values: Vec<String>) -> Self {
        debug_assert_eq!(
            desc.variable_labels.len(),
            label_values.len(),
            "inconsistent label cardinality for {}",
            desc.fq_name
        );
        ConstMetric {
            desc: Arc::clone(desc),
            value,
            label_values,
        }
    }

    pub fn desc(&self) -> &TypedDesc {
        &self.desc
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    fn to_proto(&self) -> proto::Metric {
        let mut labels: Vec<proto::LabelPair> = self
            .desc
            .variable_labels
            .iter()
            .zip(&self.label_values)
            .map(|(name, value)| {
                let mut pair = proto::LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                pair
            })
            .collect();
        labels.sort_by(|a, b| a.get_name().cmp(b.get_name()));

        let mut metric = proto::Metric::default();
        metric.set_label(labels.into());
        match self.desc.value_type {
            ValueType::Gauge => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(self.value);
                metric.set_gauge(gauge);
            }
            ValueType::Counter => {
                let mut counter = proto::Counter::default();
                counter.set_value(self.value);
                metric.set_counter(counter);
            }
        }
        metric
    }
}

/// Which collectors run and how they are tuned.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub bonding: bool,
    pub netclass: bool,
    pub netclass_ignored_devices: Regex,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            bonding: true,
            netclass: true,
            netclass_ignored_devices: Regex::new("^$").expect("static regex"),
        }
    }
}

/// Runs every enabled collector and reports per-collector scrape duration
/// and success alongside their samples. Register it in a
/// `prometheus::Registry` to expose it.
pub struct NodeCollector {
    collectors: BTreeMap<String, Box<dyn Collector>>,
    logger: Logger,
}

impl NodeCollector {
    pub fn new(fs: &FS, config: &CollectorConfig, logger: &Logger) -> Self {
        let mut collectors: Vec<(String, Box<dyn Collector>)> = Vec::new();
        if config.bonding {
            let bonding: Box<dyn Collector> =
                Box::new(BondingCollector::new(fs.clone(), logger.new(o!("collector" => "bonding"))));
            collectors.push(("bonding".to_string(), bonding));
        }
        if config.netclass {
            let netclass: Box<dyn Collector> = Box::new(NetClassCollector::new(
                fs.clone(),
                config.netclass_ignored_devices.clone(),
                logger.new(o!("collector" => "netclass")),
            ));
            collectors.push(("netclass".to_string(), netclass));
        }
        Self::from_collectors(collectors, logger.clone())
    }

    pub fn from_collectors(collectors: Vec<(String, Box<dyn Collector>)>, logger: Logger) -> Self {
        NodeCollector {
            collectors: collectors.into_iter().collect(),
            logger,
        }
    }

    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.keys().map(String::as_str).collect()
    }

    /// Runs all collectors concurrently and returns their samples.
    pub fn scrape(&self) -> Vec<ConstMetric> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .collectors
                .iter()
                .map(|(name, collector)| {
                    let logger = &self.logger;
                    scope.spawn(move || execute(name, &**collector, logger))
                })
                .collect();

            let mut metrics = Vec::new();
            for (handle, name) in handles.into_iter().zip(self.collectors.keys()) {
                match handle.join() {
                    Ok(samples) => metrics.extend(samples),
                    Err(_) => {
                        error!(self.logger, "collector panicked"; "name" => name);
                        metrics.push(ConstMetric::new(&SCRAPE_SUCCESS_DESC, 0.0, vec![name.clone()]));
                    }
                }
            }
            metrics
        })
    }
}

impl prometheus::core::Collector for NodeCollector {
    fn desc(&self) -> Vec<&Desc> {
        SCRAPE_DESCS.iter().collect()
    }

    /// Groups one scrape's samples by metric name. The registry sorts
    /// families and samples.
    fn collect(&self) -> Vec<MetricFamily> {
        let mut families: HashMap<String, MetricFamily> = HashMap::new();
        for metric in self.scrape() {
            families
                .entry(metric.desc.fq_name.clone())
                .or_insert_with(|| metric.desc.new_family())
                .mut_metric()
                .push(metric.to_proto());
        }
        families.into_values().collect()
    }
}

fn execute(name: &str, collector: &dyn Collector, logger: &Logger) -> Vec<ConstMetric> {
    let mut metrics = Vec::new();
    let start = Instant::now();
    let result = collector.update(&mut |m| metrics.push(m));
    let duration = start.elapsed().as_secs_f64();

    let success = match result {
        Ok(()) => {
            debug!(logger, "collector succeeded"; "name" => name, "duration_seconds" => duration);
            1.0
        }
        Err(err) if err.is_no_data() => {
            debug!(logger, "collector returned no data"; "name" => name, "duration_seconds" => duration, "err" => %err);
            1.0
        }
        Err(err) => {
            error!(logger, "collector failed"; "name" => name, "duration_seconds" => duration, "err" => %err);
            0.0
        }
    };

    metrics.push(ConstMetric::new(&SCRAPE_DURATION_DESC, duration, vec![name.to_string()]));
    metrics.push(ConstMetric::new(&SCRAPE_SUCCESS_DESC, success, vec![name.to_string()]));
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{discard_logger, sample_value};
    use prometheus::Registry;

    struct StaticCollector(Vec<(Arc<TypedDesc>, f64, Vec<String>)>);

    impl Collector for StaticCollector {
        fn update(&self, ch: &mut dyn FnMut(ConstMetric)) -> Result<(), CollectorError> {
            for (desc, value, labels) in &self.0 {
                ch(ConstMetric::new(desc, *value, labels.clone()));
            }
            Ok(())
        }
    }

    struct NoDataCollector;

    impl Collector for NoDataCollector {
        fn update(&self, _ch: &mut dyn FnMut(ConstMetric)) -> Result<(), CollectorError> {
            Err(CollectorError::NoData)
        }
    }

    struct FailingCollector;

    impl Collector for FailingCollector {
        fn update(&self, _ch: &mut dyn FnMut(ConstMetric)) -> Result<(), CollectorError> {
            Err(CollectorError::Sysfs(SysfsError::NotADirectory {
                path: "/nonexistent".into(),
            }))
        }
    }

    #[test]
    fn test_build_fq_name() {
        assert_eq!(build_fq_name("node", "bonding", "slaves"), "node_bonding_slaves");
        assert_eq!(build_fq_name("node", "", "up"), "node_up");
        assert_eq!(build_fq_name("", "", "up"), "up");
    }

    #[test]
    fn test_node_collector_scrape_success() {
        let desc = TypedDesc::new("test_value", "Test value.", &["device"], ValueType::Gauge);
        let nc = NodeCollector::from_collectors(
            vec![
                (
                    "static".to_string(),
                    Box::new(StaticCollector(vec![(desc, 42.0, vec!["eth0".to_string()])])) as Box<dyn Collector>,
                ),
                ("nodata".to_string(), Box::new(NoDataCollector) as Box<dyn Collector>),
                ("failing".to_string(), Box::new(FailingCollector) as Box<dyn Collector>),
            ],
            discard_logger(),
        );

        assert_eq!(nc.collector_names(), vec!["failing", "nodata", "static"]);

        let metrics = nc.scrape();
        assert_eq!(sample_value(&metrics, "test_value", &["eth0"]), Some(42.0));
        assert_eq!(sample_value(&metrics, "node_scrape_collector_success", &["static"]), Some(1.0));
        assert_eq!(sample_value(&metrics, "node_scrape_collector_success", &["nodata"]), Some(1.0));
        assert_eq!(sample_value(&metrics, "node_scrape_collector_success", &["failing"]), Some(0.0));
        assert!(sample_value(&metrics, "node_scrape_collector_duration_seconds", &["failing"]).is_some());
    }

    fn static_node_collector(samples: Vec<(Arc<TypedDesc>, f64, Vec<String>)>) -> NodeCollector {
        let collector: Box<dyn Collector> = Box::new(StaticCollector(samples));
        NodeCollector::from_collectors(vec![("static".to_string(), collector)], discard_logger())
    }

    #[test]
    fn test_registry_gather() {
        let gauge = TypedDesc::new("b_gauge", "A gauge.", &["master", "device"], ValueType::Gauge);
        let counter = TypedDesc::new("a_total", "A counter.", &["device"], ValueType::Counter);
        let nc = static_node_collector(vec![
            (gauge.clone(), 2.0, vec!["bond1".to_string(), "eth1".to_string()]),
            (counter, 7.0, vec!["eth0".to_string()]),
            (gauge, 1.0, vec!["bond0".to_string(), "eth0".to_string()]),
        ]);

        let registry = Registry::new();
        registry.register(Box::new(nc)).unwrap();
        let families = registry.gather();

        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert_eq!(
            names,
            vec![
                "a_total",
                "b_gauge",
                "node_scrape_collector_duration_seconds",
                "node_scrape_collector_success",
            ]
        );
        assert_eq!(families[0].get_field_type(), MetricType::COUNTER);
        assert_eq!(families[0].get_metric()[0].get_counter().get_value(), 7.0);

        let gauges = families[1].get_metric();
        assert_eq!(families[1].get_help(), "A gauge.");
        assert_eq!(families[1].get_field_type(), MetricType::GAUGE);
        assert_eq!(gauges.len(), 2);
        // Label pairs are sorted by name, samples by label values.
        let labels = gauges[0].get_label();
        assert_eq!(labels[0].get_name(), "device");
        assert_eq!(labels[0].get_value(), "eth0");
        assert_eq!(labels[1].get_name(), "master");
        assert_eq!(labels[1].get_value(), "bond0");
        assert_eq!(gauges[0].get_gauge().get_value(), 1.0);
        assert_eq!(gauges[1].get_gauge().get_value(), 2.0);
    }

    #[test]
    fn test_registry_keeps_duplicate_series() {
        let gauge = TypedDesc::new("dup", "Dup.", &["device"], ValueType::Gauge);
        let nc = static_node_collector(vec![
            (gauge.clone(), 1.0, vec!["eth0".to_string()]),
            (gauge, 2.0, vec!["eth0".to_string()]),
        ]);

        let registry = Registry::new();
        registry.register(Box::new(nc)).unwrap();
        let families = registry.gather();

        let dup = families.iter().find(|f| f.get_name() == "dup").expect("dup family");
        assert_eq!(dup.get_metric().len(), 2);
    }

    #[test]
    fn test_scrape_descs_register_once() {
        let registry = Registry::new();
        registry.register(Box::new(static_node_collector(vec![]))).unwrap();
        assert!(registry.register(Box::new(static_node_collector(vec![]))).is_err());
    }
}
