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

use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Hard failures while walking sysfs. Soft, per-attribute conditions never
/// surface here; see [`crate::sysfs::Attribute::Skipped`].
#[derive(Debug, Error)]
pub enum SysfsError {
    #[error("mount point {path:?} is not a directory")]
    NotADirectory { path: PathBuf },
    #[error("cannot access dir {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read file {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path:?} value {value:?}: {source}")]
    ParseInt {
        path: PathBuf,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

impl SysfsError {
    pub fn path(&self) -> &PathBuf {
        match self {
            SysfsError::NotADirectory { path }
            | SysfsError::ReadDir { path, .. }
            | SysfsError::ReadFile { path, .. }
            | SysfsError::ParseInt { path, .. } => path,
        }
    }
}
