// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_FLUSH_MAX_POINTS, DEFAULT_FLUSH_THREADS,
    DEFAULT_MEMORY_BUFFER_LIMIT, DEFAULT_PUSH_LISTENER_PORT,
};
use crate::errors::ConfigError;
use crate::handler::HandlerConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Proxy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    /// Base URL of the remote collector
    pub server: String,
    /// Identifier this proxy posts under
    pub agent_id: String,
    /// Ports accepting Graphite lines
    pub push_listener_ports: Vec<u16>,
    /// Ports accepting OpenTSDB `put` lines
    pub opentsdb_ports: Vec<u16>,
    /// Forwarders per listener
    pub flush_threads: usize,
    /// Milliseconds between flushes
    pub push_flush_interval: u64,
    /// Largest batch sent in one flush
    pub push_flush_max_points: usize,
    /// Lines a forwarder buffers before overflowing
    pub push_memory_buffer_limit: usize,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            agent_id: String::new(),
            push_listener_ports: vec![DEFAULT_PUSH_LISTENER_PORT],
            opentsdb_ports: Vec::new(),
            flush_threads: DEFAULT_FLUSH_THREADS,
            push_flush_interval: DEFAULT_FLUSH_INTERVAL_MS,
            push_flush_max_points: DEFAULT_FLUSH_MAX_POINTS,
            push_memory_buffer_limit: DEFAULT_MEMORY_BUFFER_LIMIT,
            log_level: "info".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            server: lookup("PROXY_SERVER").unwrap_or_default(),
            agent_id: lookup("PROXY_AGENT_ID").unwrap_or_default(),
            push_listener_ports: match lookup("PROXY_PUSH_LISTENER_PORTS") {
                Some(val) => parse_ports("PROXY_PUSH_LISTENER_PORTS", &val)?,
                None => defaults.push_listener_ports,
            },
            opentsdb_ports: match lookup("PROXY_OPENTSDB_PORTS") {
                Some(val) => parse_ports("PROXY_OPENTSDB_PORTS", &val)?,
                None => defaults.opentsdb_ports,
            },
            flush_threads: parse_or(&lookup, "PROXY_FLUSH_THREADS", defaults.flush_threads)?,
            push_flush_interval: parse_or(
                &lookup,
                "PROXY_PUSH_FLUSH_INTERVAL",
                defaults.push_flush_interval,
            )?,
            push_flush_max_points: parse_or(
                &lookup,
                "PROXY_PUSH_FLUSH_MAX_POINTS",
                defaults.push_flush_max_points,
            )?,
            push_memory_buffer_limit: parse_or(
                &lookup,
                "PROXY_PUSH_MEMORY_BUFFER_LIMIT",
                defaults.push_memory_buffer_limit,
            )?,
            log_level: lookup("PROXY_LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "PROXY_SERVER cannot be empty".to_string(),
            ));
        }
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "PROXY_AGENT_ID cannot be empty".to_string(),
            ));
        }
        if self.push_listener_ports.is_empty() && self.opentsdb_ports.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one listener port is required".to_string(),
            ));
        }
        if self
            .push_listener_ports
            .iter()
            .chain(&self.opentsdb_ports)
            .any(|port| *port == 0)
        {
            return Err(ConfigError::Invalid(
                "listener ports must be greater than 0".to_string(),
            ));
        }
        if self.push_flush_max_points == 0 || self.push_memory_buffer_limit == 0 {
            return Err(ConfigError::Invalid(
                "flush and buffer sizes must be greater than 0".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Handler settings for one listener. The handle is filled in once the port is bound.
    pub fn handler_config(&self, format: &str, work_unit_id: &str) -> HandlerConfig {
        HandlerConfig {
            handle: String::new(),
            work_unit_id: work_unit_id.to_string(),
            format: format.to_string(),
            num_forwarders: self.flush_threads,
            flush_interval: Duration::from_millis(self.push_flush_interval),
            max_buffer_size: self.push_memory_buffer_limit,
            max_flush_size: self.push_flush_max_points,
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{key} is not a valid number: '{val}'"))),
        None => Ok(default),
    }
}

// comma separated, blanks ignored
fn parse_ports(key: &str, val: &str) -> Result<Vec<u16>, ConfigError> {
    val.split(',')
        .map(str::trim)
        .filter(|port| !port.is_empty())
        .map(|port| {
            port.parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("{key} has an invalid port: '{port}'")))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("PROXY_SERVER", "http://collector"),
        ("PROXY_AGENT_ID", "agent-1"),
    ];

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(
            config,
            ProxyConfig {
                server: "http://collector".to_string(),
                agent_id: "agent-1".to_string(),
                ..Default::default()
            }
        );
        assert_eq!(config.push_listener_ports, vec![2878]);
        assert_eq!(config.flush_threads, 4);
        assert_eq!(config.push_flush_max_points, 40000);
        assert_eq!(config.push_memory_buffer_limit, 640000);
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PROXY_PUSH_LISTENER_PORTS", "2878, 2879"),
            ("PROXY_OPENTSDB_PORTS", "4242"),
            ("PROXY_FLUSH_THREADS", "8"),
            ("PROXY_PUSH_FLUSH_INTERVAL", "5000"),
            ("PROXY_PUSH_FLUSH_MAX_POINTS", "100"),
            ("PROXY_PUSH_MEMORY_BUFFER_LIMIT", "1000"),
            ("PROXY_LOG_LEVEL", "DEBUG"),
        ]);
        let config = ProxyConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.push_listener_ports, vec![2878, 2879]);
        assert_eq!(config.opentsdb_ports, vec![4242]);
        assert_eq!(config.log_level, "debug");

        let handler_config = config.handler_config("graphite_v2", "work");
        assert_eq!(handler_config.num_forwarders, 8);
        assert_eq!(handler_config.flush_interval, Duration::from_secs(5));
        assert_eq!(handler_config.max_flush_size, 100);
        assert_eq!(handler_config.max_buffer_size, 1000);
        assert_eq!(handler_config.format, "graphite_v2");
        assert_eq!(handler_config.work_unit_id, "work");
    }

    #[test]
    fn test_required_values() {
        assert!(ProxyConfig::from_lookup(lookup(&[])).is_err());
        assert!(ProxyConfig::from_lookup(lookup(&REQUIRED[..1])).is_err());
        assert!(ProxyConfig::from_lookup(lookup(&[
            ("PROXY_SERVER", "  "),
            ("PROXY_AGENT_ID", "agent-1")
        ]))
        .is_err());
    }

    #[test]
    fn test_invalid_values() {
        for (key, val) in [
            ("PROXY_PUSH_LISTENER_PORTS", "0"),
            ("PROXY_PUSH_LISTENER_PORTS", "70000"),
            ("PROXY_PUSH_LISTENER_PORTS", ""),
            ("PROXY_OPENTSDB_PORTS", "abc"),
            ("PROXY_FLUSH_THREADS", "-1"),
            ("PROXY_PUSH_FLUSH_MAX_POINTS", "0"),
            ("PROXY_PUSH_MEMORY_BUFFER_LIMIT", "lots"),
            ("PROXY_LOG_LEVEL", "verbose"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((key, val));
            assert!(
                ProxyConfig::from_lookup(lookup(&vars)).is_err(),
                "{key}={val} should be rejected"
            );
        }
    }

    #[test]
    fn test_error_message() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PROXY_FLUSH_THREADS", "many"));
        assert_eq!(
            ProxyConfig::from_lookup(lookup(&vars))
                .unwrap_err()
                .to_string(),
            "Invalid configuration: PROXY_FLUSH_THREADS is not a valid number: 'many'"
        );
    }
}
