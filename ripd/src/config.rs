//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashSet;
use std::time::Duration;

use ripd_core::instance::TimerConfig;
use ripd_core::route::{RouterId, MAX_ROUTER_ID, MIN_ROUTER_ID};
use serde::Deserialize;

pub const MIN_PORT: u16 = 1024;
pub const MAX_PORT: u16 = 64000;
pub const MIN_LINK_METRIC: u8 = 1;
pub const MAX_LINK_METRIC: u8 = 15;

/// The on-disk shape of the configuration file (see `§6 External
/// Interfaces`). Deliberately a thin, fully-owned value: nothing here
/// binds a socket or touches the routing engine directly.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub router_id: RouterId,
    pub input_ports: Vec<u16>,
    pub output_ports: Vec<NeighborEntry>,
    #[serde(default)]
    pub timers: TimersConfig,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct NeighborEntry {
    pub local_port: u16,
    pub link_metric: u8,
    pub neighbor_router_id: RouterId,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct TimersConfig {
    pub periodic_base_secs: u64,
    pub timeout_secs: u64,
    pub garbage_collect_secs: u64,
}

impl Default for TimersConfig {
    fn default() -> TimersConfig {
        TimersConfig {
            periodic_base_secs: 5,
            timeout_secs: 30,
            garbage_collect_secs: 20,
        }
    }
}

impl TimersConfig {
    pub fn to_timer_config(self) -> TimerConfig {
        TimerConfig {
            periodic_base: Duration::from_secs(self.periodic_base_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            garbage_collect: Duration::from_secs(self.garbage_collect_secs),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    RouterIdOutOfRange(u32),
    InputPortOutOfRange(u32),
    DuplicateInputPort(u16),
    LocalPortOutOfRange(u32),
    LinkMetricOutOfRange(u32),
    NeighborRouterIdOutOfRange(u32),
    NeighborIsSelf(RouterId),
    DuplicateNeighbor(RouterId),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(error) => {
                write!(f, "failed to read configuration file: {error}")
            }
            ConfigError::Parse(error) => {
                write!(f, "failed to parse configuration file: {error}")
            }
            ConfigError::RouterIdOutOfRange(value) => {
                write!(
                    f,
                    "router_id {value} out of range [{MIN_ROUTER_ID}, {MAX_ROUTER_ID}]"
                )
            }
            ConfigError::InputPortOutOfRange(value) => {
                write!(
                    f,
                    "input port {value} out of range [{MIN_PORT}, {MAX_PORT}]"
                )
            }
            ConfigError::DuplicateInputPort(port) => {
                write!(f, "input port {port} repeated")
            }
            ConfigError::LocalPortOutOfRange(value) => {
                write!(
                    f,
                    "output_ports local_port {value} out of range [{MIN_PORT}, {MAX_PORT}]"
                )
            }
            ConfigError::LinkMetricOutOfRange(value) => {
                write!(
                    f,
                    "link_metric {value} out of range [{MIN_LINK_METRIC}, {MAX_LINK_METRIC}]"
                )
            }
            ConfigError::NeighborRouterIdOutOfRange(value) => {
                write!(
                    f,
                    "neighbor_router_id {value} out of range [{MIN_ROUTER_ID}, {MAX_ROUTER_ID}]"
                )
            }
            ConfigError::NeighborIsSelf(id) => {
                write!(f, "neighbor_router_id {id} equals this router's own router_id")
            }
            ConfigError::DuplicateNeighbor(id) => {
                write!(f, "neighbor_router_id {id} repeated in output_ports")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn print(&self) {
        eprintln!("configuration error: {self}");
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Config =
            toml::from_str(&text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ROUTER_ID..=MAX_ROUTER_ID).contains(&self.router_id) {
            return Err(ConfigError::RouterIdOutOfRange(self.router_id.into()));
        }

        let mut seen_input_ports = HashSet::new();
        for &port in &self.input_ports {
            if !(MIN_PORT..=MAX_PORT).contains(&port) {
                return Err(ConfigError::InputPortOutOfRange(port.into()));
            }
            if !seen_input_ports.insert(port) {
                return Err(ConfigError::DuplicateInputPort(port));
            }
        }

        let mut seen_neighbors = HashSet::new();
        for neighbor in &self.output_ports {
            if !(MIN_PORT..=MAX_PORT).contains(&neighbor.local_port) {
                return Err(ConfigError::LocalPortOutOfRange(
                    neighbor.local_port.into(),
                ));
            }
            if !(MIN_LINK_METRIC..=MAX_LINK_METRIC)
                .contains(&neighbor.link_metric)
            {
                return Err(ConfigError::LinkMetricOutOfRange(
                    neighbor.link_metric.into(),
                ));
            }
            if !(MIN_ROUTER_ID..=MAX_ROUTER_ID)
                .contains(&neighbor.neighbor_router_id)
            {
                return Err(ConfigError::NeighborRouterIdOutOfRange(
                    neighbor.neighbor_router_id.into(),
                ));
            }
            if neighbor.neighbor_router_id == self.router_id {
                return Err(ConfigError::NeighborIsSelf(
                    neighbor.neighbor_router_id,
                ));
            }
            if !seen_neighbors.insert(neighbor.neighbor_router_id) {
                return Err(ConfigError::DuplicateNeighbor(
                    neighbor.neighbor_router_id,
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            router_id: 1,
            input_ports: vec![5001],
            output_ports: vec![NeighborEntry {
                local_port: 5002,
                link_metric: 3,
                neighbor_router_id: 2,
            }],
            timers: TimersConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_router_id_out_of_range() {
        let mut config = base_config();
        config.router_id = 64001;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RouterIdOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_neighbor_equal_to_self() {
        let mut config = base_config();
        config.output_ports[0].neighbor_router_id = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NeighborIsSelf(1))
        ));
    }

    #[test]
    fn rejects_duplicate_neighbor() {
        let mut config = base_config();
        config.output_ports.push(config.output_ports[0]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateNeighbor(2))
        ));
    }

    #[test]
    fn rejects_link_metric_out_of_range() {
        let mut config = base_config();
        config.output_ports[0].link_metric = 16;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LinkMetricOutOfRange(_))
        ));
    }

    #[test]
    fn default_timers_match_spec_constants() {
        let timers = TimersConfig::default().to_timer_config();
        assert_eq!(timers.periodic_base, Duration::from_secs(5));
        assert_eq!(timers.timeout, Duration::from_secs(30));
        assert_eq!(timers.garbage_collect, Duration::from_secs(20));
    }
}
