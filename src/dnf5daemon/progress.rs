// src/dnf5daemon/progress.rs

//! Install progress for dnf5daemon sessions
//!
//! dnf5daemon announces downloads and the RPM transaction separately.
//! [`InstallTracker`] folds both into one state and produces an
//! [`InstallProgressData`] snapshot after every signal. dnf5daemon offers no
//! cancellation, so snapshots never carry a cancel handle.

use super::Dnf5Signal;
use crate::progress::{InstallProgressData, PackageInfo, ProgressData};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallTracker {
    phase: Option<PackageInfo>,
    package: Option<String>,
    percentage: u32,
    verifying: bool,
    total: Option<u64>,
}

impl InstallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one signal into the state
    pub fn apply(&mut self, signal: &Dnf5Signal) {
        match signal {
            Dnf5Signal::DownloadAddNew { description, .. } => {
                self.phase = Some(PackageInfo::Downloading);
                self.package = Some(description.clone());
            }
            Dnf5Signal::DownloadProgress { .. } => {
                self.phase = Some(PackageInfo::Downloading);
            }
            Dnf5Signal::DownloadEnd { .. } => {
                self.phase = None;
                self.package = None;
            }
            Dnf5Signal::TransactionBeforeBegin { total, .. } => {
                self.phase = Some(PackageInfo::Installing);
                self.verifying = true;
                self.total = Some(*total);
            }
            Dnf5Signal::TransactionElemProgress {
                nevra,
                processed,
                total,
                ..
            } => {
                self.verifying = false;
                self.package = Some(nevra.clone());

                let total = self.total.filter(|t| *t > 0).unwrap_or(*total);
                if total > 0 {
                    let percentage = processed.saturating_mul(100) / total;
                    self.percentage = percentage.min(100) as u32;
                }
            }
        }
    }

    pub fn snapshot(&self) -> InstallProgressData {
        InstallProgressData {
            progress: ProgressData {
                waiting: false,
                cancel: None,
                absolute_percentage: self.percentage,
            },
            info: self.phase,
            package: self.package.clone(),
            verifying: self.verifying,
        }
    }
}
