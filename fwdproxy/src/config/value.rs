/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, anyhow};
use humanize_rs::bytes::Bytes;
use yaml_rust::{Yaml, yaml};

pub(super) fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

pub(super) fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

pub(super) fn as_u16(v: &Yaml) -> anyhow::Result<u16> {
    match v {
        Yaml::String(s) => Ok(u16::from_str(s)?),
        Yaml::Integer(i) => Ok(u16::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'u16' should be 'string' or 'integer'"
        )),
    }
}

pub(super) fn as_u32(v: &Yaml) -> anyhow::Result<u32> {
    match v {
        Yaml::String(s) => Ok(u32::from_str(s)?),
        Yaml::Integer(i) => Ok(u32::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'u32' should be 'string' or 'integer'"
        )),
    }
}

pub(super) fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

/// Sizes like `64KiB` or `1MB`, or a plain integer.
pub(super) fn as_humanize_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(value) => {
            let v = value.parse::<Bytes>()?;
            Ok(v.size())
        }
        Yaml::Integer(value) => Ok(usize::try_from(*value)?),
        _ => Err(anyhow!(
            "yaml value type for humanize usize should be 'string' or 'integer'"
        )),
    }
}

/// A full socket address, or only a port to listen on all IPv4 addresses.
pub(super) fn as_sockaddr(v: &Yaml) -> anyhow::Result<SocketAddr> {
    match v {
        Yaml::String(s) => {
            if let Ok(port) = u16::from_str(s) {
                return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
            }
            SocketAddr::from_str(s).map_err(|e| anyhow!("invalid socket address {s}: {e}"))
        }
        Yaml::Integer(i) => {
            let port = u16::try_from(*i)?;
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
        }
        _ => Err(anyhow!(
            "yaml value type for 'SocketAddr' should be 'string' or 'integer'"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key() {
        assert_eq!(normalize_key("Buffer-Size"), "buffer_size");
        assert_eq!(normalize_key("max_events"), "max_events");
    }

    #[test]
    fn integers() {
        assert_eq!(as_u16(&Yaml::Integer(80)).unwrap(), 80);
        assert_eq!(as_u16(&Yaml::String("8080".to_string())).unwrap(), 8080);
        assert!(as_u16(&Yaml::Integer(65536)).is_err());
        assert!(as_u32(&Yaml::Integer(-1)).is_err());
        assert_eq!(as_usize(&Yaml::Integer(1024)).unwrap(), 1024);
        assert!(as_usize(&Yaml::Boolean(true)).is_err());
    }

    #[test]
    fn humanize() {
        assert_eq!(
            as_humanize_usize(&Yaml::String("64KiB".to_string())).unwrap(),
            64 * 1024
        );
        assert_eq!(as_humanize_usize(&Yaml::Integer(4096)).unwrap(), 4096);
        assert!(as_humanize_usize(&Yaml::String("lots".to_string())).is_err());
    }

    #[test]
    fn sockaddr() {
        assert_eq!(
            as_sockaddr(&Yaml::String("127.0.0.1:8080".to_string())).unwrap(),
            SocketAddr::from_str("127.0.0.1:8080").unwrap()
        );
        assert_eq!(
            as_sockaddr(&Yaml::Integer(50505)).unwrap(),
            SocketAddr::from_str("0.0.0.0:50505").unwrap()
        );
        assert_eq!(
            as_sockaddr(&Yaml::String("[::1]:80".to_string())).unwrap(),
            SocketAddr::from_str("[::1]:80").unwrap()
        );
        assert!(as_sockaddr(&Yaml::String("localhost:80".to_string())).is_err());
    }
}
