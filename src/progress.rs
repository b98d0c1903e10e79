// src/progress.rs

//! Progress reporting shared by both backends
//!
//! Every backend turns its own signal vocabulary into the same two shapes:
//! [`ProgressData`] for any long running operation and
//! [`InstallProgressData`] for real installs, which also names the package
//! being processed and the phase it is in.
//!
//! Reports are delivered through the [`ProgressReporter`] trait.
//! Implementations include:
//! - `SilentProgress`: No-op for callers that don't want progress
//! - `LogProgress`: Logs progress to tracing
//! - `CallbackProgress`: Forwards snapshots to a closure
//!
//! # Example
//!
//! ```ignore
//! use pkgbridge::progress::{CallbackProgress, ProgressEvent};
//!
//! let progress = CallbackProgress::new(|event| {
//!     if let ProgressEvent::Progress(data) = event {
//!         println!("{}%", data.absolute_percentage);
//!         if let Some(cancel) = &data.cancel {
//!             // keep the handle around for a cancel button
//!         }
//!     }
//! });
//! manager.refresh(false, &progress).await?;
//! ```

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::info;

/// Phase tag of a package inside a transaction
///
/// Values follow PackageKit's `PkInfoEnum`; dnf5daemon phases are mapped
/// onto the same tags so callers only deal with one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageInfo {
    Unknown,
    Installed,
    Available,
    Low,
    Enhancement,
    Normal,
    Bugfix,
    Important,
    Security,
    Blocked,
    Downloading,
    Updating,
    Installing,
    Removing,
    Cleanup,
    Obsoleting,
    Reinstalling,
    Downgrading,
    Other(u32),
}

impl PackageInfo {
    /// Map a raw PackageKit info value to a phase tag
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Self::Installed,
            2 => Self::Available,
            3 => Self::Low,
            4 => Self::Enhancement,
            5 => Self::Normal,
            6 => Self::Bugfix,
            7 => Self::Important,
            8 => Self::Security,
            9 => Self::Blocked,
            10 => Self::Downloading,
            11 => Self::Updating,
            12 => Self::Installing,
            13 => Self::Removing,
            14 => Self::Cleanup,
            15 => Self::Obsoleting,
            19 => Self::Reinstalling,
            20 => Self::Downgrading,
            0 | u32::MAX => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for PackageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Installed => write!(f, "installed"),
            Self::Available => write!(f, "available"),
            Self::Low => write!(f, "low"),
            Self::Enhancement => write!(f, "enhancement"),
            Self::Normal => write!(f, "normal"),
            Self::Bugfix => write!(f, "bugfix"),
            Self::Important => write!(f, "important"),
            Self::Security => write!(f, "security"),
            Self::Blocked => write!(f, "blocked"),
            Self::Downloading => write!(f, "downloading"),
            Self::Updating => write!(f, "updating"),
            Self::Installing => write!(f, "installing"),
            Self::Removing => write!(f, "removing"),
            Self::Cleanup => write!(f, "cleanup"),
            Self::Obsoleting => write!(f, "obsoleting"),
            Self::Reinstalling => write!(f, "reinstalling"),
            Self::Downgrading => write!(f, "downgrading"),
            Self::Other(value) => write!(f, "info-{}", value),
        }
    }
}

/// Capability to cancel the transaction that produced a progress report
///
/// Calling [`cancel`](Self::cancel) only asks the backend to cancel; the
/// operation keeps running until the backend confirms. Once the transaction
/// has finished the request goes nowhere, so calling it late is harmless.
#[derive(Clone)]
pub struct CancelHandle {
    requests: mpsc::UnboundedSender<()>,
}

/// Receiving side of [`CancelHandle`], owned by the transaction driver
pub type CancelRequests = mpsc::UnboundedReceiver<()>;

impl CancelHandle {
    /// Create a handle together with the receiver the driver listens on
    pub fn channel() -> (Self, CancelRequests) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }

    /// Request cancellation
    pub fn cancel(&self) {
        // The driver is gone once the transaction finished
        let _ = self.requests.send(());
    }

    /// True once the transaction that issued this handle has ended
    pub fn is_finished(&self) -> bool {
        self.requests.is_closed()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Progress of a long running backend operation
#[derive(Debug, Clone, Default)]
pub struct ProgressData {
    /// The backend waits on a lock or another operation to finish
    pub waiting: bool,
    /// Present while the current transaction can be cancelled
    pub cancel: Option<CancelHandle>,
    /// Overall completion, 0..=100
    pub absolute_percentage: u32,
}

/// Progress of a real install
#[derive(Debug, Clone, Default)]
pub struct InstallProgressData {
    pub progress: ProgressData,
    /// Phase the current package is in
    pub info: Option<PackageInfo>,
    /// Name of the package currently processed
    pub package: Option<String>,
    /// dnf5daemon is verifying packages before applying the transaction
    pub verifying: bool,
}

/// Sink for progress snapshots
///
/// Implementations must be `Send + Sync` since reports are produced from
/// inside backend futures.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress snapshot
    fn report(&self, data: &ProgressData);

    /// Report an install snapshot
    ///
    /// Defaults to reporting only the generic part.
    fn report_install(&self, data: &InstallProgressData) {
        self.report(&data.progress);
    }
}

/// Silent progress reporter (no-op)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _data: &ProgressData) {}
}

/// Logging progress reporter
///
/// Logs at info level whenever the percentage crosses a step boundary,
/// the waiting state flips, or the current package changes.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    step: u32,
    last_bucket: AtomicU32,
    waiting: AtomicBool,
    last_package: Mutex<Option<String>>,
}

impl LogProgress {
    /// Create a new logging reporter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step: 10,
            last_bucket: AtomicU32::new(0),
            waiting: AtomicBool::new(false),
            last_package: Mutex::new(None),
        }
    }

    /// Set the percentage step between log lines
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step.max(1);
        self
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, data: &ProgressData) {
        if self.waiting.swap(data.waiting, Ordering::Relaxed) != data.waiting && data.waiting {
            info!("{}: waiting for another package operation", self.name);
        }

        let bucket = data.absolute_percentage / self.step;
        if self.last_bucket.swap(bucket, Ordering::Relaxed) != bucket {
            info!("{}: {}%", self.name, data.absolute_percentage);
        }
    }

    fn report_install(&self, data: &InstallProgressData) {
        self.report(&data.progress);

        let Ok(mut last) = self.last_package.lock() else {
            return;
        };
        if *last != data.package {
            if let Some(package) = &data.package {
                let phase = data.info.unwrap_or(PackageInfo::Unknown);
                info!("{}: {} {}", self.name, phase, package);
            }
            *last = data.package.clone();
        }
    }
}

/// Events emitted by [`CallbackProgress`]
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Generic progress snapshot
    Progress(ProgressData),
    /// Install snapshot
    Install(InstallProgressData),
}

/// Callback-based progress reporter
///
/// Calls a user-provided function on every snapshot.
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    /// Create a new callback reporter
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, data: &ProgressData) {
        (self.callback)(ProgressEvent::Progress(data.clone()));
    }

    fn report_install(&self, data: &InstallProgressData) {
        (self.callback)(ProgressEvent::Install(data.clone()));
    }
}
