// src/packagekit/transaction.rs

//! Cancellable PackageKit transactions
//!
//! [`TransactionDriver::run`] takes one transaction from creation to its
//! `Finished` (or `ErrorCode`) signal:
//!
//! 1. `CreateTransaction` returns the object path
//! 2. The driver subscribes to that path before calling anything on it, so
//!    no early signal is lost
//! 3. The operation's method is dispatched
//! 4. Signals are processed until the transaction ends; the subscription is
//!    dropped on every exit path
//!
//! While running, property changes are folded into a [`TransactionProgress`]
//! and re-emitted as [`ProgressData`] snapshots.

use super::enums::{EXIT_CANCELLED, is_wait_status};
use super::{PackageKitBus, TransactionCall, TransactionProps, TransactionSignal};
use crate::error::{Error, Result, TransactionCode};
use crate::progress::{CancelHandle, ProgressData, ProgressReporter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Normalized view of a transaction's `Status`/`AllowCancel`/`Percentage`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionProgress {
    status: Option<u32>,
    allow_wait_status: bool,
    allow_cancel: bool,
    percentage: u32,
}

impl TransactionProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a property change in
    ///
    /// PackageKit reports 101 for "unknown"; values above 100 are ignored.
    pub fn apply(&mut self, props: &TransactionProps) {
        if let Some(status) = props.status {
            self.status = Some(status);
        }
        if let Some(allow_cancel) = props.allow_cancel {
            self.allow_cancel = allow_cancel;
        }
        if let Some(percentage) = props.percentage
            && percentage <= 100
        {
            self.percentage = percentage;
        }
    }

    /// End the wait-status suppression window
    pub fn allow_wait_status(&mut self) {
        self.allow_wait_status = true;
    }

    /// True if the transaction is visibly queued behind another one
    pub fn is_waiting(&self) -> bool {
        self.allow_wait_status && self.status.is_some_and(is_wait_status)
    }

    pub fn percentage(&self) -> u32 {
        self.percentage
    }

    /// Snapshot for reporting; the cancel handle is offered only while
    /// PackageKit allows cancelling
    pub fn snapshot(&self, cancel: &CancelHandle) -> ProgressData {
        ProgressData {
            waiting: self.is_waiting(),
            cancel: self.allow_cancel.then(|| cancel.clone()),
            absolute_percentage: self.percentage,
        }
    }
}

/// Receives what a running transaction produces
pub trait TransactionObserver: Send {
    /// A new progress snapshot
    fn on_progress(&mut self, data: ProgressData);

    /// A result signal (`Package`, `Details`)
    fn on_signal(&mut self, _signal: &TransactionSignal) {}
}

/// Observer that forwards progress to a reporter and ignores results
pub struct ReportProgress<'a>(pub &'a dyn ProgressReporter);

impl TransactionObserver for ReportProgress<'_> {
    fn on_progress(&mut self, data: ProgressData) {
        self.0.report(&data);
    }
}

/// Runs PackageKit transactions
#[derive(Clone)]
pub struct TransactionDriver {
    bus: Arc<dyn PackageKitBus>,
    grace: Duration,
}

impl TransactionDriver {
    /// Create a driver; `grace` is the wait-status suppression window
    pub fn new(bus: Arc<dyn PackageKitBus>, grace: Duration) -> Self {
        Self { bus, grace }
    }

    /// Run one transaction and return its exit code
    ///
    /// Fails with a transaction error when PackageKit reports `ErrorCode`;
    /// the code becomes [`TransactionCode::Cancelled`] if a cancel was
    /// requested through the offered [`CancelHandle`]. If the signal stream
    /// ends before `Finished`, the connection is invalidated and the error
    /// code is [`TransactionCode::Closed`].
    pub async fn run(
        &self,
        call: TransactionCall,
        observer: &mut dyn TransactionObserver,
    ) -> Result<u32> {
        let grace = tokio::time::sleep(self.grace);
        tokio::pin!(grace);

        let path = self.bus.create_transaction().await?;
        let mut events = self.bus.subscribe(&path).await?;
        debug!("{} on transaction {}", call.method(), path);
        self.bus.dispatch(&path, &call).await?;

        let (cancel, mut cancel_requests) = CancelHandle::channel();
        let mut progress = TransactionProgress::new();
        let mut grace_elapsed = false;
        let mut cancelled = false;

        loop {
            tokio::select! {
                _ = &mut grace, if !grace_elapsed => {
                    grace_elapsed = true;
                    progress.allow_wait_status();
                    observer.on_progress(progress.snapshot(&cancel));
                }
                Some(()) = cancel_requests.recv(), if !cancelled => {
                    cancelled = true;
                    info!("Cancelling transaction {}", path);
                    if let Err(e) = self.bus.cancel(&path).await {
                        warn!("Failed to cancel transaction {}: {}", path, e);
                    }
                }
                event = events.recv() => match event {
                    Some(TransactionSignal::PropertiesChanged(props)) => {
                        progress.apply(&props);
                        observer.on_progress(progress.snapshot(&cancel));
                    }
                    Some(TransactionSignal::ErrorCode { code, details }) => {
                        debug!("Transaction {} error {}: {}", path, code, details);
                        let code = if cancelled {
                            TransactionCode::Cancelled
                        } else {
                            TransactionCode::Backend(code)
                        };
                        return Err(Error::transaction(code, details));
                    }
                    Some(TransactionSignal::Finished { exit, runtime_ms }) => {
                        debug!("Transaction {} finished: exit {} after {} ms", path, exit, runtime_ms);
                        if cancelled && exit == EXIT_CANCELLED {
                            return Err(Error::transaction(
                                TransactionCode::Cancelled,
                                "transaction was cancelled",
                            ));
                        }
                        return Ok(exit);
                    }
                    Some(signal) => observer.on_signal(&signal),
                    None => {
                        warn!("PackageKit went away during transaction {}", path);
                        self.bus.invalidate();
                        let code = if cancelled {
                            TransactionCode::Cancelled
                        } else {
                            TransactionCode::Closed
                        };
                        return Err(Error::transaction(code, "PackageKit went away"));
                    }
                },
            }
        }
    }
}
