// src/config.rs

//! Runtime configuration
//!
//! Defaults match the services as they are installed on Fedora/RHEL style
//! hosts. A TOML file may override any field:
//!
//! ```toml
//! wait_status_grace_ms = 1500
//!
//! [packagekit]
//! service = "org.freedesktop.PackageKit"
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pkgbridge/config.toml";

/// D-Bus coordinates of a backend service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Well-known bus name
    pub service: String,
    /// Root object path
    pub path: String,
}

impl ServiceConfig {
    fn packagekit() -> Self {
        Self {
            service: "org.freedesktop.PackageKit".to_string(),
            path: "/org/freedesktop/PackageKit".to_string(),
        }
    }

    fn dnf5daemon() -> Self {
        Self {
            service: "org.rpm.dnf.v0".to_string(),
            path: "/org/rpm/dnf/v0".to_string(),
        }
    }
}

/// Package manager configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// PackageKit service coordinates
    pub packagekit: ServiceConfig,
    /// dnf5daemon service coordinates
    pub dnf5daemon: ServiceConfig,
    /// Waiting-on-lock states are hidden for this long after a transaction starts
    pub wait_status_grace_ms: u64,
    /// Mount point checked for a read-only mount to detect an immutable OS
    pub immutable_probe_path: PathBuf,
    /// Command used to read the mount options of `immutable_probe_path`
    pub findmnt_command: String,
    /// Bus address used instead of the system bus
    pub bus_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packagekit: ServiceConfig::packagekit(),
            dnf5daemon: ServiceConfig::dnf5daemon(),
            wait_status_grace_ms: 1000,
            immutable_probe_path: PathBuf::from("/usr"),
            findmnt_command: "findmnt".to_string(),
            bus_address: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the configuration file if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the wait-status suppression window
    pub fn with_wait_status_grace(mut self, grace: Duration) -> Self {
        self.wait_status_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Talk to the services on the bus at `address`
    pub fn with_bus_address(mut self, address: impl Into<String>) -> Self {
        self.bus_address = Some(address.into());
        self
    }

    /// Wait-status suppression window as a `Duration`
    pub fn wait_status_grace(&self) -> Duration {
        Duration::from_millis(self.wait_status_grace_ms)
    }
}
