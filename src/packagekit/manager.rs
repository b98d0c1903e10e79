// src/packagekit/manager.rs

//! `PackageManager` over PackageKit
//!
//! Every facade call is a short series of transactions. `check` never
//! installs anything: the install is run with the simulate flag only.

use super::enums::{
    EXIT_SUCCESS, INFO_INSTALLING, INFO_REMOVING, INFO_UPDATING, RESOLVE_FILTER,
    TRANSACTION_FLAG_NONE, TRANSACTION_FLAG_SIMULATE,
};
use super::transaction::{ReportProgress, TransactionDriver, TransactionObserver};
use super::{PackageKitBus, TransactionCall, TransactionSignal, is_installed_id, split_package_id};
use crate::config::Config;
use crate::error::{Error, Result, TransactionCode};
use crate::manager::{BackendKind, MissingPackages, PackageId, PackageManager, Resolution};
use crate::progress::{InstallProgressData, PackageInfo, ProgressData, ProgressReporter};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// PackageKit facade
pub struct PackageKitManager {
    bus: Arc<dyn PackageKitBus>,
    driver: TransactionDriver,
}

impl PackageKitManager {
    pub fn new(bus: Arc<dyn PackageKitBus>, config: &Config) -> Self {
        let driver = TransactionDriver::new(bus.clone(), config.wait_status_grace());
        Self { bus, driver }
    }

    /// Facade over the system bus PackageKit service
    #[cfg(feature = "dbus")]
    pub fn system(config: &Config) -> Self {
        Self::new(Arc::new(super::SystemPackageKit::new(config)), config)
    }

    async fn resolve(
        &self,
        names: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<MissingPackages> {
        let mut observer = ResolveObserver {
            progress,
            resolution: Resolution::new(),
        };
        let call = TransactionCall::Resolve {
            filter: RESOLVE_FILTER,
            names: names.to_vec(),
        };
        self.driver.run(call, &mut observer).await?;
        Ok(observer.resolution.finish(names))
    }

    async fn simulate(
        &self,
        data: &mut MissingPackages,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        data.begin_simulation();
        let mut observer = SimulateObserver {
            progress,
            data: &mut *data,
        };
        let call = TransactionCall::InstallPackages {
            flags: TRANSACTION_FLAG_SIMULATE,
            ids: observer.data.missing_ids.clone(),
        };
        self.driver.run(call, &mut observer).await?;
        data.sort_names();
        Ok(())
    }

    async fn download_size(
        &self,
        ids: &[PackageId],
        progress: &dyn ProgressReporter,
    ) -> Result<u64> {
        let mut observer = DetailsObserver { progress, size: 0 };
        if !ids.is_empty() {
            let call = TransactionCall::GetDetails { ids: ids.to_vec() };
            self.driver.run(call, &mut observer).await?;
        }
        Ok(observer.size)
    }

    async fn check(
        &self,
        names: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<MissingPackages> {
        self.refresh(false, progress).await?;

        let mut data = self.resolve(names, progress).await?;
        if data.needs_simulation() {
            self.simulate(&mut data, progress).await?;
            data.download_size = Some(self.download_size(&data.install_ids, progress).await?);
        }
        Ok(data)
    }
}

#[async_trait]
impl PackageManager for PackageKitManager {
    fn kind(&self) -> BackendKind {
        BackendKind::PackageKit
    }

    async fn refresh(&self, force: bool, progress: &dyn ProgressReporter) -> Result<bool> {
        let mut observer = ReportProgress(progress);
        match self
            .driver
            .run(TransactionCall::RefreshCache { force }, &mut observer)
            .await
        {
            Ok(exit) => Ok(exit == EXIT_SUCCESS),
            Err(e @ Error::Transaction { .. }) => {
                warn!("Refreshing package metadata failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn check_missing_packages(
        &self,
        names: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<MissingPackages> {
        if names.is_empty() {
            return Ok(MissingPackages::default());
        }

        self.check(names, progress).await.inspect_err(|e| {
            warn!("Checking for missing packages failed: {}", e);
        })
    }

    async fn install_missing_packages(
        &self,
        data: &MissingPackages,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        info!("Installing {}", data.missing_names.join(", "));
        let mut observer = InstallObserver {
            progress,
            last: ProgressData::default(),
            info: None,
            package: None,
        };
        let call = TransactionCall::InstallPackages {
            flags: TRANSACTION_FLAG_NONE,
            ids: data.missing_ids.clone(),
        };
        match self.driver.run(call, &mut observer).await {
            Ok(EXIT_SUCCESS) => Ok(()),
            Ok(exit) => {
                warn!("Installing packages finished with exit code {}", exit);
                Err(Error::transaction(
                    TransactionCode::Backend(exit),
                    "package installation did not succeed",
                ))
            }
            Err(e) => {
                warn!("Installing packages failed: {}", e);
                Err(e)
            }
        }
    }

    fn reset_connection(&self) {
        self.bus.invalidate();
    }
}

struct ResolveObserver<'a> {
    progress: &'a dyn ProgressReporter,
    resolution: Resolution,
}

impl TransactionObserver for ResolveObserver<'_> {
    fn on_progress(&mut self, data: ProgressData) {
        self.progress.report(&data);
    }

    fn on_signal(&mut self, signal: &TransactionSignal) {
        if let TransactionSignal::Package { package_id, .. } = signal {
            let (name, _) = split_package_id(package_id);
            self.resolution.record(
                name,
                PackageId::from(package_id.as_str()),
                is_installed_id(package_id),
            );
        }
    }
}

struct SimulateObserver<'a> {
    progress: &'a dyn ProgressReporter,
    data: &'a mut MissingPackages,
}

impl TransactionObserver for SimulateObserver<'_> {
    fn on_progress(&mut self, data: ProgressData) {
        self.progress.report(&data);
    }

    fn on_signal(&mut self, signal: &TransactionSignal) {
        let TransactionSignal::Package {
            info, package_id, ..
        } = signal
        else {
            return;
        };

        let (name, _) = split_package_id(package_id);
        let id = PackageId::from(package_id.as_str());
        match *info {
            INFO_REMOVING => self.data.add_removal(name, id),
            INFO_INSTALLING | INFO_UPDATING => self.data.add_install(name, id),
            _ => debug!("Ignoring simulated package {} with info {}", package_id, info),
        }
    }
}

struct DetailsObserver<'a> {
    progress: &'a dyn ProgressReporter,
    size: u64,
}

impl TransactionObserver for DetailsObserver<'_> {
    fn on_progress(&mut self, data: ProgressData) {
        self.progress.report(&data);
    }

    fn on_signal(&mut self, signal: &TransactionSignal) {
        if let TransactionSignal::Details {
            size: Some(size), ..
        } = signal
        {
            self.size += size;
        }
    }
}

/// Combines transaction progress with the package currently processed
struct InstallObserver<'a> {
    progress: &'a dyn ProgressReporter,
    last: ProgressData,
    info: Option<PackageInfo>,
    package: Option<String>,
}

impl InstallObserver<'_> {
    fn emit(&self) {
        self.progress.report_install(&InstallProgressData {
            progress: self.last.clone(),
            info: self.info,
            package: self.package.clone(),
            verifying: false,
        });
    }
}

impl TransactionObserver for InstallObserver<'_> {
    fn on_progress(&mut self, data: ProgressData) {
        self.last = data;
        self.emit();
    }

    fn on_signal(&mut self, signal: &TransactionSignal) {
        if let TransactionSignal::Package {
            info, package_id, ..
        } = signal
        {
            let (name, _) = split_package_id(package_id);
            self.info = Some(PackageInfo::from_raw(*info));
            self.package = Some(name.to_string());
            self.emit();
        }
    }
}
