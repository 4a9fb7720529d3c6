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
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use slog::{trace, warn, Logger};

use crate::sysfs::{
    parse_optional_i64, read_file_no_stat, sys_read_file, Attribute, SoftErrorPolicy, SysfsError, FS,
};

const NETCLASS_PATH: &str = "class/net";

/// Info from the files in /sys/class/net/<iface> for a single interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetClassIface {
    pub name: String,
    pub addr_assign_type: Option<i64>,
    pub addr_len: Option<i64>,
    pub address: String,
    pub broadcast: String,
    pub carrier: Option<i64>,
    pub carrier_changes: Option<i64>,
    pub carrier_up_count: Option<i64>,
    pub carrier_down_count: Option<i64>,
    pub dev_id: Option<i64>,
    pub dormant: Option<i64>,
    pub duplex: String,
    pub flags: Option<i64>,
    pub ifalias: String,
    pub ifindex: Option<i64>,
    pub iflink: Option<i64>,
    pub link_mode: Option<i64>,
    pub mtu: Option<i64>,
    pub name_assign_type: Option<i64>,
    pub netdev_group: Option<i64>,
    pub operstate: String,
    pub phys_port_id: String,
    pub phys_port_name: String,
    pub phys_switch_id: String,
    pub speed: Option<i64>,
    pub tx_queue_len: Option<i64>,
    pub type_: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetClassIfaceBondingSlave {
    pub name: String,
    /// 1 if bonding_slave/mii_status reads "up", 0 otherwise.
    pub mii_status: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetClassIfaceBonding {
    pub name: String,
    pub slaves: HashMap<String, NetClassIfaceBondingSlave>,
}

impl NetClassIfaceBonding {
    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    pub fn active_count(&self) -> usize {
        self.slaves.values().filter(|s| s.mii_status == 1).count()
    }
}

/// Bonding masters keyed by interface name.
pub type NetClassBonding = HashMap<String, NetClassIfaceBonding>;

/// Every interface in /sys/class/net keyed by interface name.
pub type NetClass = HashMap<String, NetClassIface>;

enum Setter {
    Text(fn(&mut NetClassIface) -> &mut String),
    Int(fn(&mut NetClassIface) -> &mut Option<i64>),
}

lazy_static! {
    static ref ATTRIBUTE_SETTERS: HashMap<&'static str, Setter> = {
        let mut m = HashMap::new();
        m.insert("addr_assign_type", Setter::Int(|i| &mut i.addr_assign_type));
        m.insert("addr_len", Setter::Int(|i| &mut i.addr_len));
        m.insert("address", Setter::Text(|i| &mut i.address));
        m.insert("broadcast", Setter::Text(|i| &mut i.broadcast));
        m.insert("carrier", Setter::Int(|i| &mut i.carrier));
        m.insert("carrier_changes", Setter::Int(|i| &mut i.carrier_changes));
        m.insert("carrier_up_count", Setter::Int(|i| &mut i.carrier_up_count));
        m.insert("carrier_down_count", Setter::Int(|i| &mut i.carrier_down_count));
        m.insert("dev_id", Setter::Int(|i| &mut i.dev_id));
        m.insert("dormant", Setter::Int(|i| &mut i.dormant));
        m.insert("duplex", Setter::Text(|i| &mut i.duplex));
        m.insert("flags", Setter::Int(|i| &mut i.flags));
        m.insert("ifalias", Setter::Text(|i| &mut i.ifalias));
        m.insert("ifindex", Setter::Int(|i| &mut i.ifindex));
        m.insert("iflink", Setter::Int(|i| &mut i.iflink));
        m.insert("link_mode", Setter::Int(|i| &mut i.link_mode));
        m.insert("mtu", Setter::Int(|i| &mut i.mtu));
        m.insert("name_assign_type", Setter::Int(|i| &mut i.name_assign_type));
        m.insert("netdev_group", Setter::Int(|i| &mut i.netdev_group));
        m.insert("operstate", Setter::Text(|i| &mut i.operstate));
        m.insert("phys_port_id", Setter::Text(|i| &mut i.phys_port_id));
        m.insert("phys_port_name", Setter::Text(|i| &mut i.phys_port_name));
        m.insert("phys_switch_id", Setter::Text(|i| &mut i.phys_switch_id));
        m.insert("speed", Setter::Int(|i| &mut i.speed));
        m.insert("tx_queue_len", Setter::Int(|i| &mut i.tx_queue_len));
        m.insert("type", Setter::Int(|i| &mut i.type_));
        m
    };
}

impl FS {
    fn net_class_path(&self) -> PathBuf {
        self.path(NETCLASS_PATH)
    }

    /// Scans /sys/class/net for devices and returns them as a sorted list of
    /// names. Anything that is not a regular file counts as a device. Names
    /// that are not valid UTF-8 are skipped.
    pub fn net_class_devices(&self) -> Result<Vec<String>, SysfsError> {
        let path = self.net_class_path();
        let read_dir_err = |source| SysfsError::ReadDir {
            path: path.clone(),
            source,
        };

        let mut res = Vec::new();
        for entry in fs::read_dir(&path).map_err(read_dir_err)? {
            let entry = entry.map_err(read_dir_err)?;
            if entry.file_type().map_err(read_dir_err)?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => res.push(name),
                Err(name) => warn!(self.logger(), "skipping device with non UTF-8 name"; "name" => ?name),
            }
        }
        res.sort();

        Ok(res)
    }

    /// Returns info for a single interface read from /sys/class/net/<iface>.
    pub fn net_class_by_iface(&self, device: &str) -> Result<NetClassIface, SysfsError> {
        let path = self.net_class_path().join(device);
        let mut iface = parse_net_class_iface(&path, &self.policy, self.logger())?;
        iface.name = device.to_string();
        Ok(iface)
    }

    /// Returns info for all interfaces read from /sys/class/net/<iface>.
    pub fn net_class(&self) -> Result<NetClass, SysfsError> {
        let mut net_class = NetClass::new();
        for device in self.net_class_devices()? {
            let iface = self.net_class_by_iface(&device)?;
            net_class.insert(device, iface);
        }
        Ok(net_class)
    }

    /// Reads /sys/class/net/bonding_masters. `None` means the file does not
    /// exist, i.e. the bonding driver is not loaded and there are no bonds.
    pub fn net_class_bonding_masters(&self) -> Result<Option<Vec<String>>, SysfsError> {
        let path = self.net_class_path().join("bonding_masters");
        match read_file_no_stat(&path) {
            Ok(content) => Ok(Some(split_fields(&content))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SysfsError::ReadFile { path, source }),
        }
    }

    /// Reads the slave state of every bonding master. `None` when no
    /// bonding_masters file exists.
    pub fn net_class_bonding(&self) -> Result<Option<NetClassBonding>, SysfsError> {
        let masters = match self.net_class_bonding_masters()? {
            Some(masters) => masters,
            None => return Ok(None),
        };

        let mut bonding = NetClassBonding::new();
        for master in masters {
            let path = self.net_class_path().join(&master).join("bonding");
            let info = parse_bond(&path, &master)?;
            bonding.insert(master, info);
        }
        Ok(Some(bonding))
    }
}

fn split_fields(content: &str) -> Vec<String> {
    content.split_whitespace().map(String::from).collect()
}

/// Scans the known attribute files in an interface directory. Symlinks,
/// subdirectories and unknown files are ignored.
fn parse_net_class_iface(
    device_path: &Path,
    policy: &SoftErrorPolicy,
    logger: &Logger,
) -> Result<NetClassIface, SysfsError> {
    let read_dir_err = |source| SysfsError::ReadDir {
        path: device_path.to_path_buf(),
        source,
    };

    let mut iface = NetClassIface::default();
    for entry in fs::read_dir(device_path).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        if !entry.file_type().map_err(read_dir_err)?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let setter = match file_name.to_str().and_then(|n| ATTRIBUTE_SETTERS.get(n)) {
            Some(setter) => setter,
            None => continue,
        };

        let path = entry.path();
        let value = match sys_read_file(&path, policy)? {
            Attribute::Value(value) => value,
            Attribute::Skipped(reason) => {
                trace!(logger, "skipping attribute"; "path" => %path.display(), "reason" => %reason);
                continue;
            }
        };

        match setter {
            Setter::Text(field) => *field(&mut iface) = value,
            Setter::Int(field) => *field(&mut iface) = parse_optional_i64(&path, &value)?,
        }
    }

    Ok(iface)
}

/// Parses the mii_status of every slave listed in <bond>/slaves.
fn parse_bond(path: &Path, master: &str) -> Result<NetClassIfaceBonding, SysfsError> {
    let slaves_path = path.join("slaves");
    let content = read_file_no_stat(&slaves_path).map_err(|source| SysfsError::ReadFile {
        path: slaves_path.clone(),
        source,
    })?;

    let mut bonding = NetClassIfaceBonding {
        name: master.to_string(),
        slaves: HashMap::new(),
    };
    for name in content.split_whitespace() {
        let state = read_mii_status(path, name)?;
        let slave = NetClassIfaceBondingSlave {
            name: name.to_string(),
            mii_status: if state.trim() == "up" { 1 } else { 0 },
        };
        bonding.slaves.insert(name.to_string(), slave);
    }
    Ok(bonding)
}

fn read_mii_status(bond_path: &Path, slave: &str) -> Result<String, SysfsError> {
    let lower = bond_path
        .join(format!("lower_{}", slave))
        .join("bonding_slave")
        .join("mii_status");
    match read_file_no_stat(&lower) {
        Ok(state) => return Ok(state),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(SysfsError::ReadFile { path: lower, source }),
    }

    // Older kernels name the link slave_<iface>.
    let legacy = bond_path
        .join(format!("slave_{}", slave))
        .join("bonding_slave")
        .join("mii_status");
    read_file_no_stat(&legacy).map_err(|source| SysfsError::ReadFile { path: legacy.clone(), source })
}
