// src/manager.rs

//! The package manager facade
//!
//! [`PackageManager`] is the one interface UI code depends on. It is
//! implemented once per backend (PackageKit, dnf5daemon); the backend
//! selector hands out exactly one implementation per process.
//!
//! Calls against one instance must be serialized by the caller. Neither
//! backend queues or locks overlapping calls.

use crate::error::Result;
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Which backend a facade talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Dnf5Daemon,
    PackageKit,
}

impl BackendKind {
    /// Backend name as shown to users
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dnf5Daemon => "dnf5daemon",
            Self::PackageKit => "packagekit",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Backend-specific package identifier
///
/// A full `name;version;arch;data` id for PackageKit, the numeric package
/// id for dnf5daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PackageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Result of [`PackageManager::check_missing_packages`], and the input of
/// [`PackageManager::install_missing_packages`]
///
/// The optional fields are only present when a simulated install ran,
/// which happens only if every requested name could be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingPackages {
    /// Requested, not installed, installable
    pub missing_names: Vec<String>,
    /// Ids for `missing_names`, index-aligned
    pub missing_ids: Vec<PackageId>,
    /// Requested, not installed, not found in any repository
    pub unavailable_names: Vec<String>,
    /// Everything the simulated transaction would install
    pub install_ids: Vec<PackageId>,
    /// Everything the simulated transaction would remove
    pub remove_ids: Vec<PackageId>,

    /// Dependencies pulled in by `missing_names`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_names: Option<Vec<String>>,
    /// Packages the install would remove
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_names: Option<Vec<String>>,
    /// Bytes to download
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_size: Option<u64>,
}

impl MissingPackages {
    /// True if there is nothing to install
    ///
    /// Either list being empty is enough: each backend installs from one
    /// of them.
    pub fn is_empty(&self) -> bool {
        self.missing_names.is_empty() || self.missing_ids.is_empty()
    }

    /// True if a simulated install computed the optional fields
    pub fn is_simulated(&self) -> bool {
        self.extra_names.is_some()
    }

    /// True if every requested name can be satisfied
    pub fn is_installable(&self) -> bool {
        self.unavailable_names.is_empty()
    }

    /// Whether a simulated install should run for this resolution
    pub(crate) fn needs_simulation(&self) -> bool {
        !self.missing_ids.is_empty() && self.unavailable_names.is_empty()
    }

    /// Start the simulation fields at empty
    pub(crate) fn begin_simulation(&mut self) {
        self.install_ids.clear();
        self.remove_ids.clear();
        self.extra_names = Some(Vec::new());
        self.remove_names = Some(Vec::new());
    }

    /// Record a package the simulation would install
    pub(crate) fn add_install(&mut self, name: &str, id: PackageId) {
        self.install_ids.push(id);
        if !self.missing_names.iter().any(|n| n == name)
            && let Some(extra) = self.extra_names.as_mut()
            && !extra.iter().any(|n| n == name)
        {
            extra.push(name.to_string());
        }
    }

    /// Record a package the simulation would remove
    pub(crate) fn add_removal(&mut self, name: &str, id: PackageId) {
        self.remove_ids.push(id);
        if let Some(remove) = self.remove_names.as_mut() {
            remove.push(name.to_string());
        }
    }

    /// Sort the name lists, keeping `missing_ids` aligned with `missing_names`
    pub(crate) fn sort_names(&mut self) {
        let mut missing: Vec<(String, PackageId)> = self
            .missing_names
            .drain(..)
            .zip(self.missing_ids.drain(..))
            .collect();
        missing.sort_by(|a, b| a.0.cmp(&b.0));
        (self.missing_names, self.missing_ids) = missing.into_iter().unzip();

        if let Some(extra) = self.extra_names.as_mut() {
            extra.sort();
        }
        if let Some(remove) = self.remove_names.as_mut() {
            remove.sort();
        }
    }
}

/// Bookkeeping for the resolve step shared by both backends
///
/// A name reported more than once counts once; the first report decides
/// whether it is installed or missing.
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    seen: HashSet<String>,
    installed: HashSet<String>,
    missing_names: Vec<String>,
    missing_ids: Vec<PackageId>,
}

impl Resolution {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one resolve result
    pub(crate) fn record(&mut self, name: &str, id: PackageId, installed: bool) {
        if !self.seen.insert(name.to_string()) {
            return;
        }

        if installed {
            self.installed.insert(name.to_string());
        } else {
            self.missing_names.push(name.to_string());
            self.missing_ids.push(id);
        }
    }

    /// Classify the requested names
    pub(crate) fn finish(self, requested: &[String]) -> MissingPackages {
        let mut unavailable_names: Vec<String> = Vec::new();
        for name in requested {
            if !self.seen.contains(name) && !unavailable_names.contains(name) {
                unavailable_names.push(name.clone());
            }
        }

        MissingPackages {
            missing_names: self.missing_names,
            missing_ids: self.missing_ids,
            unavailable_names,
            ..Default::default()
        }
    }
}

/// Uniform package manager operations
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Backend name
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Refresh repository metadata
    ///
    /// `force` discards any cached validity window. Ordinary refresh
    /// failures are logged and reported as `Ok(false)`; failures that keep
    /// the refresh from starting at all are returned as errors.
    async fn refresh(&self, force: bool, progress: &dyn ProgressReporter) -> Result<bool>;

    /// Find out which of `names` need installing, and what installing them
    /// would involve
    ///
    /// Never changes the system: the install is only simulated.
    async fn check_missing_packages(
        &self,
        names: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<MissingPackages>;

    /// Install the packages found missing by a previous check
    ///
    /// A no-op if `data` has nothing missing.
    async fn install_missing_packages(
        &self,
        data: &MissingPackages,
        progress: &dyn ProgressReporter,
    ) -> Result<()>;

    /// Forget the service connection so the next call reconnects
    ///
    /// Call this when the caller's privileges change.
    fn reset_connection(&self);
}
