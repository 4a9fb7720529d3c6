// Copyright 2019 The Prometheus Authors
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

use std::num::ParseIntError;
use std::path::Path;

use crate::sysfs::SysfsError;

/// Parses a signed integer, inferring the base from its prefix: `0x` for
/// hex, `0o` or a bare leading `0` for octal, `0b` for binary, decimal
/// otherwise. sysfs prints `flags` and `dev_id` as hex.
pub fn parse_int64(v: &str) -> Result<i64, ParseIntError> {
    let (negative, unsigned) = match v.as_bytes().first() {
        Some(b'-') => (true, &v[1..]),
        Some(b'+') => (false, &v[1..]),
        _ => (false, v),
    };

    let (radix, digits) = split_radix(unsigned);
    if digits.starts_with(['+', '-']) {
        // Force an InvalidDigit error rather than accepting "--1" or "0x-1".
        return i64::from_str_radix("-", 10);
    }

    if negative {
        // Parse with the sign attached so that i64::MIN round-trips.
        let mut signed = String::with_capacity(digits.len() + 1);
        signed.push('-');
        signed.push_str(digits);
        i64::from_str_radix(&signed, radix)
    } else {
        i64::from_str_radix(digits, radix)
    }
}

fn split_radix(v: &str) -> (u32, &str) {
    let bytes = v.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'0' {
        return (10, v);
    }
    match bytes[1] {
        b'x' | b'X' => (16, &v[2..]),
        b'o' | b'O' => (8, &v[2..]),
        b'b' | b'B' => (2, &v[2..]),
        _ => (8, &v[1..]),
    }
}

/// Converts a raw attribute into a present integer. Any parse failure is
/// reported against `path`.
pub fn parse_optional_i64(path: &Path, value: &str) -> Result<Option<i64>, SysfsError> {
    parse_int64(value)
        .map(Some)
        .map_err(|source| SysfsError::ParseInt {
            path: path.to_path_buf(),
            value: value.to_string(),
            source,
        })
}
