/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader, yaml};

use crate::opts::ProcArgs;

mod value;

const DEFAULT_LISTEN_PORT: u16 = 50505;
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
const MINIMAL_BUFFER_SIZE: usize = 4096;
const DEFAULT_UPSTREAM_PORT: u16 = 80;
const DEFAULT_MAX_EVENTS: usize = 1024;
const DEFAULT_RESOLVER_THREADS: usize = 4;

/// Settings of the proxy, fixed after startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen: SocketAddr,
    /// 0 means the os default.
    pub backlog: u32,
    /// Capacity of each relay buffer, one per connection.
    pub buffer_size: usize,
    /// The port used to connect to origin servers.
    ///
    /// Keep the default 80 in deployments. Requests are only accepted for
    /// port 80 regardless of this value, so any other port is only useful to
    /// point the proxy at a local test origin.
    pub upstream_port: u16,
    /// Threads doing blocking host name lookups.
    pub resolver_threads: usize,
    pub max_events: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_LISTEN_PORT),
            backlog: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            upstream_port: DEFAULT_UPSTREAM_PORT,
            resolver_threads: DEFAULT_RESOLVER_THREADS,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl ProxyConfig {
    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match value::normalize_key(k).as_str() {
            "listen" => {
                self.listen = value::as_sockaddr(v)?;
                Ok(())
            }
            "backlog" | "listen_backlog" => {
                self.backlog = value::as_u32(v)?;
                Ok(())
            }
            "buffer_size" => {
                self.buffer_size = value::as_humanize_usize(v)?;
                Ok(())
            }
            "upstream_port" => {
                self.upstream_port = value::as_u16(v)?;
                Ok(())
            }
            "max_events" => {
                self.max_events = value::as_usize(v)?;
                Ok(())
            }
            "resolver_threads" => {
                self.resolver_threads = value::as_usize(v)?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.buffer_size < MINIMAL_BUFFER_SIZE {
            return Err(anyhow!(
                "buffer size {} is smaller than {MINIMAL_BUFFER_SIZE}",
                self.buffer_size
            ));
        }
        if self.upstream_port == 0 {
            return Err(anyhow!("upstream port should not be 0"));
        }
        if self.max_events == 0 {
            return Err(anyhow!("max events should not be 0"));
        }
        if self.resolver_threads == 0 {
            return Err(anyhow!("resolver threads should not be 0"));
        }
        Ok(())
    }

    fn parse_doc(&mut self, map: &yaml::Hash) -> anyhow::Result<()> {
        value::foreach_kv(map, |k, v| self.set(k, v))
    }

    /// Parse config text, multiple docs are merged in order.
    pub fn parse_yaml(content: &str) -> anyhow::Result<Self> {
        let docs = YamlLoader::load_from_str(content).map_err(|e| anyhow!("invalid yaml: {e}"))?;

        let mut config = ProxyConfig::default();
        for (i, doc) in docs.iter().enumerate() {
            match doc {
                Yaml::Hash(map) => config
                    .parse_doc(map)
                    .context(format!("failed to parse yaml doc #{i}"))?,
                Yaml::Null => {}
                _ => return Err(anyhow!("yaml doc root should be hash")),
            }
        }
        config.check()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        ProxyConfig::parse_yaml(&content)
    }
}

pub fn load(args: &ProcArgs) -> anyhow::Result<ProxyConfig> {
    let mut config = match &args.config_file {
        Some(path) => ProxyConfig::load_file(path)
            .context(format!("failed to load config file {}", path.display()))?,
        None => ProxyConfig::default(),
    };
    if let Some(addr) = args.listen {
        config.listen = addr;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        assert_eq!(ProxyConfig::parse_yaml("").unwrap(), ProxyConfig::default());
    }

    #[test]
    fn full() {
        let config = ProxyConfig::parse_yaml(
            "listen: 127.0.0.1:3128\nbacklog: 128\nbuffer-size: 64KiB\nupstream_port: 8080\nmax_events: 256\nresolver-threads: 2\n",
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:3128".parse().unwrap());
        assert_eq!(config.backlog, 128);
        assert_eq!(config.buffer_size, 64 * 1024);
        assert_eq!(config.upstream_port, 8080);
        assert_eq!(config.max_events, 256);
        assert_eq!(config.resolver_threads, 2);
    }

    #[test]
    fn multiple_docs() {
        let config = ProxyConfig::parse_yaml("listen: 3128\n---\nbacklog: 16\n").unwrap();
        assert_eq!(config.listen, "0.0.0.0:3128".parse().unwrap());
        assert_eq!(config.backlog, 16);
    }

    #[test]
    fn invalid() {
        assert!(ProxyConfig::parse_yaml("unknown_key: 1\n").is_err());
        assert!(ProxyConfig::parse_yaml("buffer_size: 1024\n").is_err());
        assert!(ProxyConfig::parse_yaml("upstream_port: 0\n").is_err());
        assert!(ProxyConfig::parse_yaml("resolver_threads: 0\n").is_err());
        assert!(ProxyConfig::parse_yaml("- listen\n").is_err());
        assert!(ProxyConfig::parse_yaml("listen: [1, 2]\n").is_err());
    }

    #[test]
    fn listen_override() {
        let args = ProcArgs {
            listen: Some("127.0.0.1:0".parse().unwrap()),
            ..Default::default()
        };
        let config = load(&args).unwrap();
        assert_eq!(config.listen, "127.0.0.1:0".parse().unwrap());
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }
}
