// src/lib.rs

//! pkgbridge
//!
//! One package management interface over the two transactional package
//! services found on RPM based hosts: PackageKit and dnf5daemon.
//!
//! # Architecture
//!
//! - Facade: [`PackageManager`] with `refresh`, `check_missing_packages`
//!   and `install_missing_packages`
//! - Backends: [`packagekit`] (transactions) and [`dnf5daemon`] (sessions),
//!   each behind a transport trait so the protocol logic runs without a bus
//! - Progress: both backends report through [`ProgressReporter`] with a
//!   common [`ProgressData`] shape
//! - Selection: [`selector::select_backend`] picks exactly one backend

pub mod config;
pub mod dnf5daemon;
mod error;
pub mod manager;
pub mod packagekit;
pub mod progress;
pub mod selector;
pub mod subscription;

#[cfg(feature = "dbus")]
pub mod connection;

pub use config::Config;
pub use error::{Error, Result, TransactionCode};
pub use manager::{BackendKind, MissingPackages, PackageId, PackageManager};
pub use progress::{
    CallbackProgress, CancelHandle, InstallProgressData, LogProgress, PackageInfo, ProgressData,
    ProgressEvent, ProgressReporter, SilentProgress,
};
pub use selector::{HostProbe, select_backend};

#[cfg(feature = "dbus")]
pub use selector::get_package_manager;
