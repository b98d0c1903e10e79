// src/packagekit/mod.rs

//! PackageKit backend
//!
//! PackageKit runs every operation as a transaction object on the bus:
//! `CreateTransaction` hands out an object path, the caller subscribes to
//! that path's signals, then calls one method on it and waits for
//! `Finished`. Results arrive as `Package`/`Details` signals, progress as
//! property changes.
//!
//! # Module Structure
//!
//! - `enums` - Numeric constants from PackageKit's `pk-enum.h`
//! - `transaction` - Transaction driver and progress normalizer
//! - `manager` - The `PackageManager` facade
//! - `bus` - zbus transport (feature `dbus`)

pub mod enums;
pub mod manager;
pub mod transaction;

#[cfg(feature = "dbus")]
pub mod bus;

use crate::error::Result;
use crate::manager::PackageId;
use crate::subscription::Subscription;
use async_trait::async_trait;
use std::fmt;

pub use manager::PackageKitManager;
pub use transaction::{TransactionDriver, TransactionObserver, TransactionProgress};

#[cfg(feature = "dbus")]
pub use bus::SystemPackageKit;

/// D-Bus interface of PackageKit transaction objects
pub const TRANSACTION_INTERFACE: &str = "org.freedesktop.PackageKit.Transaction";

/// Object path of a PackageKit transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionPath(String);

impl TransactionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The one method called on a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionCall {
    RefreshCache { force: bool },
    Resolve { filter: u64, names: Vec<String> },
    InstallPackages { flags: u64, ids: Vec<PackageId> },
    GetDetails { ids: Vec<PackageId> },
}

impl TransactionCall {
    /// D-Bus method name
    pub fn method(&self) -> &'static str {
        match self {
            Self::RefreshCache { .. } => "RefreshCache",
            Self::Resolve { .. } => "Resolve",
            Self::InstallPackages { .. } => "InstallPackages",
            Self::GetDetails { .. } => "GetDetails",
        }
    }
}

/// Changed transaction properties; `None` means unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionProps {
    pub status: Option<u32>,
    pub allow_cancel: Option<bool>,
    pub percentage: Option<u32>,
}

/// Signals of one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSignal {
    Package {
        info: u32,
        package_id: String,
        summary: String,
    },
    Details {
        package_id: Option<String>,
        size: Option<u64>,
    },
    ErrorCode {
        code: u32,
        details: String,
    },
    Finished {
        exit: u32,
        runtime_ms: u32,
    },
    PropertiesChanged(TransactionProps),
}

/// Split a `name;version;arch;data` package id into name and data
pub fn split_package_id(package_id: &str) -> (&str, &str) {
    let mut parts = package_id.split(';');
    let name = parts.next().unwrap_or_default();
    let data = parts.nth(2).unwrap_or_default();
    (name, data)
}

/// True if the package id's data field marks it as installed
pub fn is_installed_id(package_id: &str) -> bool {
    let (_, data) = split_package_id(package_id);
    data.split(':').any(|repo| repo == "installed")
}

/// Transport used to talk to PackageKit
///
/// The zbus implementation is [`SystemPackageKit`]; tests drive the
/// transaction machinery through scripted implementations.
#[async_trait]
pub trait PackageKitBus: Send + Sync {
    /// Cheap liveness check (reads `VersionMajor`)
    async fn probe(&self) -> Result<()>;

    /// Create a transaction object
    async fn create_transaction(&self) -> Result<TransactionPath>;

    /// Subscribe to the signals and property changes of a transaction
    ///
    /// The first delivered item may carry the current property values.
    async fn subscribe(&self, transaction: &TransactionPath)
    -> Result<Subscription<TransactionSignal>>;

    /// Call the transaction's method
    async fn dispatch(&self, transaction: &TransactionPath, call: &TransactionCall) -> Result<()>;

    /// Ask PackageKit to cancel the transaction
    async fn cancel(&self, transaction: &TransactionPath) -> Result<()>;

    /// Drop the connection; the next call reconnects
    fn invalidate(&self);
}
