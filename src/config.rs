use std::{fs::read_to_string, str::FromStr};

use anyhow::Result;
use clap::Parser;
use codec::{Address, address::{IP_SIZE, PORT_SIZE}};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub struct Daemons {
    ///
    /// Main loop cadence, in seconds.
    ///
    /// Each cycle drains the inbound frame buffer, dispatches, drains
    /// the user command buffer and flushes the outbound queues.
    ///
    #[serde(default = "Daemons::tick_interval")]
    pub tick_interval: u64,
    ///
    /// Reunion daemon cadence, in seconds.
    ///
    #[serde(default = "Daemons::reunion_interval")]
    pub reunion_interval: u64,
    ///
    /// Reunion acceptance threshold, in seconds.
    ///
    /// A client that waits longer than this for its helloback declares
    /// reunion failure and re-advertises; the root prunes any peer whose
    /// hellos stay away longer than this.
    ///
    #[serde(default = "Daemons::reunion_timeout")]
    pub reunion_timeout: u64,
}

impl Daemons {
    fn tick_interval() -> u64 {
        2
    }

    fn reunion_interval() -> u64 {
        4
    }

    fn reunion_timeout() -> u64 {
        20
    }
}

impl Default for Daemons {
    fn default() -> Self {
        Self {
            tick_interval: Self::tick_interval(),
            reunion_interval: Self::reunion_interval(),
            reunion_timeout: Self::reunion_timeout(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    ///
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    ///
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub daemons: Daemons,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    ///
    /// Specify the configuration file path
    ///
    /// Example: arbor-peer --config /etc/arbor-peer/config.toml
    ///
    #[arg(long, short)]
    config: Option<String>,
}

impl Config {
    ///
    /// Load configure from config file and command line parameters.
    ///
    /// Load command line parameters, if the configuration file path is
    /// specified, the configuration is read from the configuration file,
    /// otherwise the default configuration is used.
    ///
    pub fn load() -> Result<Self> {
        Ok(match Cli::parse().config {
            Some(path) => toml::from_str::<Self>(&read_to_string(&path)?)?,
            None => Self::default(),
        })
    }
}

/// The boot command read from stdin before the loops start.
///
/// `add root <ip> <port>` starts the distinguished root peer;
/// `add client <ip> <port> <root-ip> <root-port>` starts a client that
/// registers against an existing root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boot {
    Root { address: Address },
    Client { address: Address, root: Address },
}

impl Boot {
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            ["add", "root", ip, port] => Some(Self::Root {
                address: parse_strict(ip, port)?,
            }),
            ["add", "client", ip, port, root_ip, root_port] => Some(Self::Client {
                address: parse_strict(ip, port)?,
                root: parse_strict(root_ip, root_port)?,
            }),
            _ => None,
        }
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Root { address } | Self::Client { address, .. } => *address,
        }
    }
}

/// Boot tokens must already be in canonical width; nothing is
/// re-padded here.
fn parse_strict(ip: &str, port: &str) -> Option<Address> {
    if ip.len() != IP_SIZE || port.len() != PORT_SIZE {
        return None;
    }

    Address::from_text_parts(ip, port).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_a_root() {
        let boot = Boot::parse("add root 192.168.000.001 00001").unwrap();

        assert_eq!(
            boot,
            Boot::Root {
                address: "192.168.000.001:00001".parse().unwrap(),
            }
        );
    }

    #[test]
    fn boots_a_client() {
        let boot = Boot::parse("add client 192.168.000.002 00002 192.168.000.001 00001").unwrap();

        let Boot::Client { address, root } = boot else {
            panic!("not a client boot");
        };

        assert_eq!(address, "192.168.000.002:00002".parse().unwrap());
        assert_eq!(root, "192.168.000.001:00001".parse().unwrap());
    }

    #[test]
    fn rejects_malformed_boot_lines() {
        let lines = [
            "",
            "add",
            "add server 192.168.000.001 00001",
            "add root 192.168.0.1 00001",
            "add root 192.168.000.001 1",
            "add root 192.168.000.256 00001",
            "add root 192.168.000.001 00001 extra",
            "add client 192.168.000.002 00002",
            "add client 192.168.000.002 00002 192.168.000.001 1",
        ];

        for line in lines {
            assert!(Boot::parse(line).is_none(), "accepted {line:?}");
        }
    }

    #[test]
    fn default_timings() {
        let config = Config::default();

        assert_eq!(config.daemons.tick_interval, 2);
        assert_eq!(config.daemons.reunion_interval, 4);
        assert_eq!(config.daemons.reunion_timeout, 20);
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [log]
            level = "debug"

            [daemons]
            reunion-timeout = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.daemons.reunion_timeout, 30);
        assert_eq!(config.daemons.tick_interval, 2);
        assert!(matches!(config.log.level, LogLevel::Debug));
    }
}
