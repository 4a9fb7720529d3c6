// Copyright 2017 The Prometheus Authors
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

//! Typed access to the parts of sysfs this exporter reads.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use slog::{o, Logger};

mod error;
pub mod net_class;
mod sys_read_file;
mod value_parser;

pub use error::SysfsError;
pub use net_class::{
    NetClass, NetClassBonding, NetClassIface, NetClassIfaceBonding, NetClassIfaceBondingSlave,
};
pub use sys_read_file::{read_file_no_stat, sys_read_file, Attribute, SoftCondition, SoftErrorPolicy};
pub use value_parser::{parse_int64, parse_optional_i64};

pub const DEFAULT_MOUNT_POINT: &str = "/sys";

/// A sysfs mount point plus the rules used when reading from it.
#[derive(Clone)]
pub struct FS {
    sys_path: PathBuf,
    policy: SoftErrorPolicy,
    logger: Logger,
}

impl FS {
    pub fn new_default_fs() -> Result<Self, SysfsError> {
        Self::new(DEFAULT_MOUNT_POINT)
    }

    /// Returns a new FS mounted under the given mount point. The mount point
    /// must be an existing directory.
    pub fn new(mount_point: impl AsRef<Path>) -> Result<Self, SysfsError> {
        let sys_path = mount_point.as_ref().to_path_buf();
        let info = fs::metadata(&sys_path).map_err(|source| SysfsError::ReadDir {
            path: sys_path.clone(),
            source,
        })?;
        if !info.is_dir() {
            return Err(SysfsError::NotADirectory { path: sys_path });
        }

        Ok(FS {
            sys_path,
            policy: SoftErrorPolicy::default(),
            logger: Logger::root(slog::Discard, o!()),
        })
    }

    pub fn with_policy(mut self, policy: SoftErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Joins `subsystem` onto the mount point.
    pub fn path(&self, subsystem: impl AsRef<Path>) -> PathBuf {
        self.sys_path.join(subsystem)
    }

    pub fn policy(&self) -> &SoftErrorPolicy {
        &self.policy
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl fmt::Debug for FS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FS")
            .field("sys_path", &self.sys_path)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SysfsFixture;

    #[test]
    fn test_new_fs() {
        let fixture = SysfsFixture::new();
        let fs = FS::new(fixture.root()).unwrap();
        assert_eq!(fs.path("class/net"), fixture.root().join("class/net"));
        assert_eq!(fs.policy(), &SoftErrorPolicy::default());
    }

    #[test]
    fn test_new_fs_rejects_file_mount_point() {
        let fixture = SysfsFixture::new();
        let file = fixture.write("not-a-dir", "");

        match FS::new(&file) {
            Err(SysfsError::NotADirectory { path }) => assert_eq!(path, file),
            other => panic!("expected NotADirectory, got {:?}", other),
        }
    }

    #[test]
    fn test_new_fs_missing_mount_point() {
        let fixture = SysfsFixture::new();
        let err = FS::new(fixture.root().join("missing")).unwrap_err();
        assert!(matches!(err, SysfsError::ReadDir { .. }), "{:?}", err);
    }
}
