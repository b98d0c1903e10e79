// src/selector.rs

//! Backend selection
//!
//! Exactly one backend is chosen per process, in a fixed order:
//!
//! 1. An immutable OS (read-only `/usr`) has no package manager at all
//! 2. dnf5daemon, if it answers a ping
//! 3. PackageKit, if its version property can be read
//!
//! Probing opens the service connections; the chosen facade keeps using
//! the transport it was probed through.

use crate::config::Config;
use crate::dnf5daemon::{Dnf5Bus, Dnf5DaemonManager};
use crate::error::{Error, Result};
use crate::manager::PackageManager;
use crate::packagekit::{PackageKitBus, PackageKitManager};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Host capability checks
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// True if the base system is mounted read-only
    async fn is_immutable_os(&self) -> bool;
}

/// Detects an immutable OS from the mount options `findmnt` reports
#[derive(Debug, Clone)]
pub struct FindmntProbe {
    command: String,
    path: PathBuf,
}

impl FindmntProbe {
    pub fn new(config: &Config) -> Self {
        Self {
            command: config.findmnt_command.clone(),
            path: config.immutable_probe_path.clone(),
        }
    }

    async fn mount_options(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .arg("-T")
            .arg(&self.path)
            .args(["-n", "-o", "VFS-OPTIONS"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Io(std::io::Error::other(format!(
                "{} exited with {}",
                self.command, output.status
            ))));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl HostProbe for FindmntProbe {
    async fn is_immutable_os(&self) -> bool {
        match self.mount_options().await {
            Ok(options) => is_read_only(&options),
            Err(e) => {
                warn!("Could not read mount options of {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

/// True if a comma separated mount option list contains `ro`
pub fn is_read_only(options: &str) -> bool {
    options.trim().split(',').any(|option| option == "ro")
}

/// Pick the backend for this host
pub async fn select_backend(
    host: &dyn HostProbe,
    dnf5daemon: Arc<dyn Dnf5Bus>,
    packagekit: Arc<dyn PackageKitBus>,
    config: &Config,
) -> Result<Box<dyn PackageManager>> {
    if host.is_immutable_os().await {
        info!("Immutable OS detected, package management is disabled");
        return Err(Error::UnsupportedPlatform);
    }

    match dnf5daemon.probe().await {
        Ok(()) => {
            info!("Using dnf5daemon");
            return Ok(Box::new(Dnf5DaemonManager::new(dnf5daemon)));
        }
        Err(e) => {
            debug!("dnf5daemon is not available: {}", e);
            dnf5daemon.invalidate();
        }
    }

    match packagekit.probe().await {
        Ok(()) => {
            info!("Using PackageKit");
            Ok(Box::new(PackageKitManager::new(packagekit, config)))
        }
        Err(e) => {
            debug!("PackageKit is not available: {}", e);
            packagekit.invalidate();
            Err(Error::NoPackageManagerFound)
        }
    }
}

/// Pick the backend for this host over the system bus
#[cfg(feature = "dbus")]
pub async fn get_package_manager(config: &Config) -> Result<Box<dyn PackageManager>> {
    use crate::dnf5daemon::SystemDnf5Daemon;
    use crate::packagekit::SystemPackageKit;

    select_backend(
        &FindmntProbe::new(config),
        Arc::new(SystemDnf5Daemon::new(config)),
        Arc::new(SystemPackageKit::new(config)),
        config,
    )
    .await
}
