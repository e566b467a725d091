// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers and small shared enums.
//!
//! Types validate their invariants at creation time so the rest of the
//! harness never has to re-check them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Validated network port.
/// Must be in range 1-65535 (0 is reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a new Port with validation.
    pub fn new(port: u16) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort {
                port,
                reason: "Port 0 is reserved and cannot be used".to_string(),
            });
        }
        Ok(Self(port))
    }

    /// Get the inner port value.
    pub fn value(&self) -> u16 {
        self.0
    }

    /// URL the harness uses to reach a responder bound to this port.
    pub fn local_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.0)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// How an adapter schedules its concurrent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionCategory {
    /// Single-threaded cooperative scheduler, suspension at each I/O boundary.
    Cooperative,
    /// Fixed-size pool of OS threads doing blocking I/O.
    ThreadPool,
}

impl fmt::Display for ExecutionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionCategory::Cooperative => write!(f, "cooperative"),
            ExecutionCategory::ThreadPool => write!(f, "thread_pool"),
        }
    }
}

/// The built-in adapters, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdapterKind {
    /// Async reqwest client.
    Reqwest,
    /// Target client, smart (LIFO) connection reuse.
    Sonic,
    /// Thread-pool driven blocking reqwest client.
    Blocking,
    /// Target client, round-robin connection reuse.
    SonicCyclic,
    /// hyper-util legacy client gated by a semaphore.
    Hyper,
}

impl AdapterKind {
    /// All built-in adapters in the order they are measured.
    pub const ALL: [AdapterKind; 5] = [
        AdapterKind::Reqwest,
        AdapterKind::Sonic,
        AdapterKind::Blocking,
        AdapterKind::SonicCyclic,
        AdapterKind::Hyper,
    ];

    /// Name used in the report and on the command line.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reqwest => "reqwest",
            Self::Sonic => "sonic",
            Self::Blocking => "blocking",
            Self::SonicCyclic => "sonic cyclic",
            Self::Hyper => "hyper",
        }
    }

    pub const fn category(&self) -> ExecutionCategory {
        match self {
            Self::Blocking => ExecutionCategory::ThreadPool,
            _ => ExecutionCategory::Cooperative,
        }
    }

    /// Look up an adapter by name. Underscores and hyphens match spaces.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let normalized = name.trim().replace(['_', '-'], " ").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| ConfigError::UnknownAdapter {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_err());
        assert!(Port::new(8080).is_ok());
        assert_eq!(Port::new(8080).unwrap().value(), 8080);
    }

    #[test]
    fn test_port_local_url() {
        let port = Port::new(4321).unwrap();
        assert_eq!(port.local_url(), "http://127.0.0.1:4321/");
    }

    #[test]
    fn test_adapter_lookup() {
        assert_eq!(AdapterKind::from_name("sonic").unwrap(), AdapterKind::Sonic);
        assert_eq!(
            AdapterKind::from_name("sonic_cyclic").unwrap(),
            AdapterKind::SonicCyclic
        );
        assert_eq!(
            AdapterKind::from_name("Sonic-Cyclic").unwrap(),
            AdapterKind::SonicCyclic
        );
        assert!(AdapterKind::from_name("curl").is_err());
    }

    #[test]
    fn test_adapter_names_unique() {
        let mut names: Vec<_> = AdapterKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), AdapterKind::ALL.len());
    }

    #[test]
    fn test_only_blocking_uses_threads() {
        for kind in AdapterKind::ALL {
            let expected = if kind == AdapterKind::Blocking {
                ExecutionCategory::ThreadPool
            } else {
                ExecutionCategory::Cooperative
            };
            assert_eq!(kind.category(), expected);
        }
    }
}
