// Copyright 2018 The Prometheus Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Helpers to build throwaway sysfs trees and inspect collector output.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use slog::{o, Logger};
use tempfile::TempDir;

use crate::collector::ConstMetric;
use crate::sysfs::FS;

/// A temporary directory standing in for a sysfs mount point.
pub struct SysfsFixture {
    dir: TempDir,
}

impl SysfsFixture {
    pub fn new() -> Self {
        SysfsFixture {
            dir: TempDir::new().expect("failed to create fixture dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn fs(&self) -> FS {
        FS::new(self.root()).expect("failed to open fixture sysfs")
    }

    /// Writes `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture parent dir");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(&path).expect("failed to create fixture dir");
        path
    }

    /// Creates a symlink at `rel` pointing to `target`, which is taken
    /// verbatim so relative targets resolve like they do in sysfs.
    pub fn symlink(&self, target: &str, rel: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture parent dir");
        }
        symlink(target, &path).expect("failed to create fixture symlink");
        path
    }
}

pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Finds the value of the sample named `name` whose label values equal
/// `label_values`.
pub fn sample_value(metrics: &[ConstMetric], name: &str, label_values: &[&str]) -> Option<f64> {
    metrics
        .iter()
        .find(|m| m.desc().fq_name() == name && m.label_values() == label_values)
        .map(|m| m.value())
}

pub fn count_samples(metrics: &[ConstMetric], name: &str) -> usize {
    metrics.iter().filter(|m| m.desc().fq_name() == name).count()
}
