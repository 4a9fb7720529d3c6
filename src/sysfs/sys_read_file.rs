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

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::sysfs::SysfsError;

// sysfs attributes are at most a page long.
const SYS_FILE_BUFFER_SIZE: usize = 4096;

// Aggregate files such as bonding_masters can outgrow a page.
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Read conditions a single attribute may hit without failing the parse of
/// its interface. Which of them are tolerated is decided by a
/// [`SoftErrorPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SoftCondition {
    NotFound,
    PermissionDenied,
    Unsupported,
    InvalidArgument,
}

impl SoftCondition {
    pub const ALL: [SoftCondition; 4] = [
        SoftCondition::NotFound,
        SoftCondition::PermissionDenied,
        SoftCondition::Unsupported,
        SoftCondition::InvalidArgument,
    ];

    /// Maps an I/O error onto a soft condition. The errno is checked first,
    /// std has no `ErrorKind` for EOPNOTSUPP.
    pub fn classify(err: &io::Error) -> Option<SoftCondition> {
        if let Some(code) = err.raw_os_error() {
            return match code {
                libc::ENOENT => Some(SoftCondition::NotFound),
                libc::EACCES | libc::EPERM => Some(SoftCondition::PermissionDenied),
                libc::EOPNOTSUPP => Some(SoftCondition::Unsupported),
                libc::EINVAL => Some(SoftCondition::InvalidArgument),
                _ => None,
            };
        }
        match err.kind() {
            io::ErrorKind::NotFound => Some(SoftCondition::NotFound),
            io::ErrorKind::PermissionDenied => Some(SoftCondition::PermissionDenied),
            io::ErrorKind::Unsupported => Some(SoftCondition::Unsupported),
            io::ErrorKind::InvalidInput => Some(SoftCondition::InvalidArgument),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SoftCondition::NotFound => "not found",
            SoftCondition::PermissionDenied => "permission denied",
            SoftCondition::Unsupported => "operation not supported",
            SoftCondition::InvalidArgument => "invalid argument",
        }
    }
}

impl fmt::Display for SoftCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of [`SoftCondition`]s that are skipped rather than reported as
/// errors. Defaults to all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftErrorPolicy {
    conditions: Vec<SoftCondition>,
}

impl SoftErrorPolicy {
    pub fn new(conditions: impl IntoIterator<Item = SoftCondition>) -> Self {
        let mut policy = SoftErrorPolicy::none();
        for condition in conditions {
            policy = policy.with(condition);
        }
        policy
    }

    /// A policy under which every read error is hard.
    pub fn none() -> Self {
        SoftErrorPolicy { conditions: Vec::new() }
    }

    pub fn with(mut self, condition: SoftCondition) -> Self {
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
        self
    }

    pub fn allows(&self, condition: SoftCondition) -> bool {
        self.conditions.contains(&condition)
    }

    pub fn conditions(&self) -> &[SoftCondition] {
        &self.conditions
    }
}

impl Default for SoftErrorPolicy {
    fn default() -> Self {
        SoftErrorPolicy::new(SoftCondition::ALL)
    }
}

/// Outcome of reading one attribute file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Trimmed file content.
    Value(String),
    /// The read hit a condition the policy tolerates; the field stays unset.
    Skipped(SoftCondition),
}

/// Reads a single sysfs attribute and trims surrounding whitespace.
///
/// sysfs files report a size of 4096 regardless of content and some of them
/// block or fail on a second read, so this does exactly one `read` into a
/// page-sized buffer instead of stat-ing and looping.
pub fn sys_read_file(path: &Path, policy: &SoftErrorPolicy) -> Result<Attribute, SysfsError> {
    match read_once(path) {
        Ok(value) => Ok(Attribute::Value(value)),
        Err(err) => match SoftCondition::classify(&err) {
            Some(condition) if policy.allows(condition) => Ok(Attribute::Skipped(condition)),
            _ => Err(SysfsError::ReadFile {
                path: path.to_path_buf(),
                source: err,
            }),
        },
    }
}

fn read_once(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; SYS_FILE_BUFFER_SIZE];
    let n = loop {
        match file.read(&mut buffer) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            res => break res?,
        }
    };
    Ok(String::from_utf8_lossy(&buffer[..n]).trim().to_string())
}

/// Reads the contents of an entire file without calling `metadata`, capped
/// at 1024kB. Errors are returned unclassified; callers decide which of them
/// mean "absent".
pub fn read_file_no_stat(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut buffer = Vec::new();
    file.take(MAX_BUFFER_SIZE as u64).read_to_end(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
