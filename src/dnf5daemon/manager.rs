// src/dnf5daemon/manager.rs

//! `PackageManager` over dnf5daemon
//!
//! Every facade call runs in its own session. The signal subscription is
//! taken before the session is opened and released, together with the
//! connection, once the session is closed; dnf5daemon only drops the match
//! rules of a client when its connection goes away. The session is closed
//! on every path, and a failure is returned only after that.

use super::progress::InstallTracker;
use super::{Dnf5Bus, Dnf5Signal, RESOLVE_WARNING, ResolveOutcome, SessionPath};
use crate::error::{Error, Result, TransactionCode};
use crate::manager::{BackendKind, MissingPackages, PackageId, PackageManager, Resolution};
use crate::progress::ProgressReporter;
use crate::subscription::Subscription;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// dnf5daemon facade
pub struct Dnf5DaemonManager {
    bus: Arc<dyn Dnf5Bus>,
}

/// Signal handling for one open session
struct SessionEvents<'a> {
    session: SessionPath,
    signals: Subscription<Dnf5Signal>,
    tracker: InstallTracker,
    progress: &'a dyn ProgressReporter,
    install: bool,
}

impl<'a> SessionEvents<'a> {
    fn new(
        session: SessionPath,
        signals: Subscription<Dnf5Signal>,
        progress: &'a dyn ProgressReporter,
        install: bool,
    ) -> Self {
        Self {
            session,
            signals,
            tracker: InstallTracker::new(),
            progress,
            install,
        }
    }

    /// Drive a bus call while handling the signals it causes
    ///
    /// Fails with [`TransactionCode::Closed`] once the signal stream ends,
    /// which happens when the service leaves the bus.
    async fn pump<T, F>(&mut self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::pin!(call);
        loop {
            tokio::select! {
                biased;
                signal = self.signals.recv() => match signal {
                    Some(signal) => self.handle(signal),
                    None => {
                        warn!("dnf5daemon went away during session {}", self.session);
                        return Err(Error::transaction(
                            TransactionCode::Closed,
                            "dnf5daemon went away",
                        ));
                    }
                },
                result = &mut call => {
                    while let Some(signal) = self.signals.try_recv() {
                        self.handle(signal);
                    }
                    return result;
                }
            }
        }
    }

    fn handle(&mut self, signal: Dnf5Signal) {
        if signal.session() != &self.session {
            debug!("Ignoring signal of session {}", signal.session());
            return;
        }

        debug!("dnf5daemon signal: {:?}", signal);
        self.tracker.apply(&signal);
        let snapshot = self.tracker.snapshot();
        if self.install {
            self.progress.report_install(&snapshot);
        } else {
            self.progress.report(&snapshot.progress);
        }
    }
}

impl Dnf5DaemonManager {
    pub fn new(bus: Arc<dyn Dnf5Bus>) -> Self {
        Self { bus }
    }

    /// Facade over the system bus dnf5daemon service
    #[cfg(feature = "dbus")]
    pub fn system(config: &crate::config::Config) -> Self {
        Self::new(Arc::new(super::SystemDnf5Daemon::new(config)))
    }

    async fn open_session<'a>(
        &self,
        progress: &'a dyn ProgressReporter,
        install: bool,
    ) -> Result<SessionEvents<'a>> {
        let signals = match self.bus.subscribe().await {
            Ok(signals) => signals,
            Err(e) => {
                self.bus.invalidate();
                return Err(Error::Session(format!(
                    "cannot subscribe to dnf5daemon signals: {}",
                    e
                )));
            }
        };

        match self.bus.open_session().await {
            Ok(session) => {
                debug!("Opened dnf5daemon session {}", session);
                Ok(SessionEvents::new(session, signals, progress, install))
            }
            Err(e) => {
                drop(signals);
                self.bus.invalidate();
                Err(Error::Session(format!(
                    "cannot open dnf5daemon session: {}",
                    e
                )))
            }
        }
    }

    /// Close the session, release the subscription and the connection,
    /// then hand back the session's result
    async fn close_session<T>(&self, events: SessionEvents<'_>, result: Result<T>) -> Result<T> {
        let session = events.session.clone();
        let closed = self.bus.close_session(&session).await;
        drop(events);
        self.bus.invalidate();

        match (result, closed) {
            (Ok(value), Ok(true)) => Ok(value),
            (Ok(value), Ok(false)) => {
                warn!("dnf5daemon did not know session {}", session);
                Ok(value)
            }
            (Ok(_), Err(e)) => Err(Error::Session(format!(
                "cannot close dnf5daemon session {}: {}",
                session, e
            ))),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!("Failed to close dnf5daemon session {}: {}", session, close_err);
                Err(e)
            }
        }
    }

    /// Resolve the session's goal, failing with the problem description
    /// when it cannot be resolved
    async fn resolve_goal(&self, events: &mut SessionEvents<'_>) -> Result<ResolveOutcome> {
        let session = events.session.clone();
        let outcome = events.pump(self.bus.resolve(&session)).await?;
        if outcome.is_resolved() {
            if outcome.status == RESOLVE_WARNING {
                warn!("dnf5daemon resolved the goal with warnings");
            }
            return Ok(outcome);
        }

        let problems = match events.pump(self.bus.transaction_problems(&session)).await {
            Ok(problems) => problems.join("\n"),
            Err(e) => format!("problems unavailable: {}", e),
        };
        Err(Error::transaction(
            TransactionCode::Unresolvable(outcome.status),
            problems,
        ))
    }

    /// Load repositories and resync the session state; `apply` also runs
    /// the (empty) transaction
    async fn sync_state(&self, events: &mut SessionEvents<'_>, apply: bool) -> Result<()> {
        let session = events.session.clone();
        if !events.pump(self.bus.read_all_repos(&session)).await? {
            warn!("dnf5daemon could not load all repositories");
        }
        self.resolve_goal(events).await?;
        if apply {
            events.pump(self.bus.do_transaction(&session)).await?;
        }
        Ok(())
    }

    async fn refresh_in_session(&self, events: &mut SessionEvents<'_>, force: bool) -> Result<bool> {
        if let Err(e) = self.sync_state(events, true).await {
            warn!("Could not read repositories: {}", e);
        }

        let session = events.session.clone();
        let cache_type = if force { "all" } else { "expire-cache" };
        let (success, message) = events.pump(self.bus.clean(&session, cache_type)).await?;
        if !success {
            warn!("Failed to clean dnf5daemon cache: {}", message);
        }
        Ok(success)
    }

    async fn check_in_session(
        &self,
        events: &mut SessionEvents<'_>,
        names: &[String],
    ) -> Result<MissingPackages> {
        self.sync_state(events, false).await?;

        let session = events.session.clone();
        let packages = events.pump(self.bus.list(&session, names)).await?;
        let mut resolution = Resolution::new();
        for package in &packages {
            resolution.record(
                &package.name,
                PackageId::new(package.id.to_string()),
                package.is_installed,
            );
        }

        let mut data = resolution.finish(names);
        if data.needs_simulation() {
            self.simulate(events, &mut data).await?;
        }
        Ok(data)
    }

    async fn simulate(&self, events: &mut SessionEvents<'_>, data: &mut MissingPackages) -> Result<()> {
        let session = events.session.clone();
        events
            .pump(self.bus.install(&session, &data.missing_names))
            .await?;
        let outcome = self.resolve_goal(events).await?;

        data.begin_simulation();
        let mut download_size = 0u64;
        for item in outcome.items.iter().filter(|item| item.is_package()) {
            let id = PackageId::new(item.package.id.to_string());
            if item.is_removal() {
                data.add_removal(&item.package.name, id);
            } else if item.is_inbound() {
                data.add_install(&item.package.name, id);
                download_size += item.package.download_size;
            }
        }
        data.download_size = Some(download_size);
        data.sort_names();
        Ok(())
    }

    async fn install_in_session(
        &self,
        events: &mut SessionEvents<'_>,
        data: &MissingPackages,
    ) -> Result<()> {
        let session = events.session.clone();
        events
            .pump(self.bus.install(&session, &data.missing_names))
            .await?;
        self.resolve_goal(events).await?;
        events.pump(self.bus.do_transaction(&session)).await
    }
}

#[async_trait]
impl PackageManager for Dnf5DaemonManager {
    fn kind(&self) -> BackendKind {
        BackendKind::Dnf5Daemon
    }

    async fn refresh(&self, force: bool, progress: &dyn ProgressReporter) -> Result<bool> {
        let mut events = self.open_session(progress, false).await?;
        let result = self.refresh_in_session(&mut events, force).await;
        match self.close_session(events, result).await {
            Ok(success) => Ok(success),
            Err(e) => {
                warn!("Refreshing package metadata failed: {}", e);
                Ok(false)
            }
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

        let mut events = self.open_session(progress, false).await?;
        let result = self.check_in_session(&mut events, names).await;
        self.close_session(events, result).await.inspect_err(|e| {
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
        let mut events = self.open_session(progress, true).await?;
        let result = self.install_in_session(&mut events, data).await;
        self.close_session(events, result).await.inspect_err(|e| {
            warn!("Installing packages failed: {}", e);
        })
    }

    fn reset_connection(&self) {
        self.bus.invalidate();
    }
}
