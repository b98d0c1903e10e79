// src/dnf5daemon/mod.rs

//! dnf5daemon backend
//!
//! dnf5daemon works in sessions: `open_session` returns a session object
//! on which repositories are loaded, a goal is built and resolved, and
//! optionally applied with `do_transaction`. Progress is announced through
//! signals on the `Base` and `rpm.Rpm` interfaces, each tagged with the
//! session it belongs to.
//!
//! # Module Structure
//!
//! - `progress` - Install progress state machine
//! - `manager` - The `PackageManager` facade and the session driver
//! - `bus` - zbus transport (feature `dbus`)

pub mod manager;
pub mod progress;

#[cfg(feature = "dbus")]
pub mod bus;

use crate::error::Result;
use crate::subscription::Subscription;
use async_trait::async_trait;
use std::fmt;

pub use manager::Dnf5DaemonManager;
pub use progress::InstallTracker;

#[cfg(feature = "dbus")]
pub use bus::SystemDnf5Daemon;

/// Package attributes requested from `rpm.Rpm.list`
pub const PACKAGE_ATTRS: [&str; 6] = [
    "name",
    "version",
    "release",
    "arch",
    "download_size",
    "is_installed",
];

/// Object path of an open session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionPath(String);

impl SessionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A package record as returned by `list` and `resolve`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpmPackage {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub download_size: u64,
    pub is_installed: bool,
}

impl RpmPackage {
    pub fn nevra(&self) -> String {
        format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }
}

/// One entry of a resolved goal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionItem {
    /// `Package`, `Group`, `Environment`, ...
    pub object_type: String,
    /// `Install`, `Upgrade`, `Remove`, ...
    pub action: String,
    /// `User`, `Dependency`, `Clean`, ...
    pub reason: String,
    pub package: RpmPackage,
}

impl TransactionItem {
    pub fn is_package(&self) -> bool {
        self.object_type == "Package"
    }

    /// True for actions that bring a package onto the system
    pub fn is_inbound(&self) -> bool {
        matches!(
            self.action.as_str(),
            "Install" | "Upgrade" | "Downgrade" | "Reinstall"
        )
    }

    /// True if the package is removed outright (not replaced by an upgrade)
    pub fn is_removal(&self) -> bool {
        self.action == "Remove"
    }
}

/// `Goal.resolve` result codes
pub const RESOLVE_NO_PROBLEM: u32 = 0;
pub const RESOLVE_WARNING: u32 = 1;
pub const RESOLVE_ERROR: u32 = 2;

/// Result of `Goal.resolve`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub items: Vec<TransactionItem>,
    pub status: u32,
}

impl ResolveOutcome {
    /// True if the goal can be applied (possibly with warnings)
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, RESOLVE_NO_PROBLEM | RESOLVE_WARNING)
    }
}

/// Signals dnf5daemon emits while a session works
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dnf5Signal {
    DownloadAddNew {
        session: SessionPath,
        download_id: String,
        description: String,
        total_to_download: i64,
    },
    DownloadProgress {
        session: SessionPath,
        download_id: String,
        total_to_download: i64,
        downloaded: i64,
    },
    DownloadEnd {
        session: SessionPath,
        download_id: String,
        transfer_status: u32,
        message: String,
    },
    TransactionBeforeBegin {
        session: SessionPath,
        total: u64,
    },
    TransactionElemProgress {
        session: SessionPath,
        nevra: String,
        processed: u64,
        total: u64,
    },
}

impl Dnf5Signal {
    /// Session the signal belongs to
    pub fn session(&self) -> &SessionPath {
        match self {
            Self::DownloadAddNew { session, .. }
            | Self::DownloadProgress { session, .. }
            | Self::DownloadEnd { session, .. }
            | Self::TransactionBeforeBegin { session, .. }
            | Self::TransactionElemProgress { session, .. } => session,
        }
    }
}

/// Transport used to talk to dnf5daemon
#[async_trait]
pub trait Dnf5Bus: Send + Sync {
    /// Liveness check (`org.freedesktop.DBus.Peer.Ping`)
    async fn probe(&self) -> Result<()>;

    async fn open_session(&self) -> Result<SessionPath>;

    /// Close a session; false if dnf5daemon did not know it
    async fn close_session(&self, session: &SessionPath) -> Result<bool>;

    async fn read_all_repos(&self, session: &SessionPath) -> Result<bool>;

    /// `Base.clean`; returns the success flag and error message
    async fn clean(&self, session: &SessionPath, cache_type: &str) -> Result<(bool, String)>;

    async fn resolve(&self, session: &SessionPath) -> Result<ResolveOutcome>;

    /// `Goal.get_transaction_problems_string`
    async fn transaction_problems(&self, session: &SessionPath) -> Result<Vec<String>>;

    async fn do_transaction(&self, session: &SessionPath) -> Result<()>;

    /// `rpm.Rpm.list` over all packages matching `patterns`
    async fn list(&self, session: &SessionPath, patterns: &[String]) -> Result<Vec<RpmPackage>>;

    /// `rpm.Rpm.install`: add packages to the session's goal
    async fn install(&self, session: &SessionPath, specs: &[String]) -> Result<()>;

    /// Subscribe to every dnf5daemon signal
    async fn subscribe(&self) -> Result<Subscription<Dnf5Signal>>;

    /// Drop the connection; also drops every subscription made on it
    fn invalidate(&self);
}
