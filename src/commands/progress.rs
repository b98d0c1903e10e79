// src/commands/progress.rs
//! Terminal progress for backend operations
//!
//! Renders [`ProgressData`] snapshots as an indicatif bar and remembers the
//! latest cancel handle so Ctrl-C can cancel the running transaction. When
//! stderr is not a terminal the snapshots are logged instead.

use indicatif::{ProgressBar, ProgressStyle};
use pkgbridge::{CancelHandle, InstallProgressData, LogProgress, ProgressData, ProgressReporter};
use std::io::IsTerminal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

enum Output {
    Bar(ProgressBar),
    Log(LogProgress),
}

pub struct CliProgress {
    output: Output,
    operation: String,
    cancel: Arc<Mutex<Option<CancelHandle>>>,
}

impl CliProgress {
    pub fn new(operation: &str) -> Self {
        let output = if std::io::stderr().is_terminal() {
            Output::Bar(progress_bar(operation))
        } else {
            Output::Log(LogProgress::new(operation))
        };

        Self {
            output,
            operation: operation.to_string(),
            cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// Cancel the running transaction on Ctrl-C
    ///
    /// Exits the process if the transaction cannot be cancelled right now.
    pub fn cancel_on_ctrl_c(&self) -> CtrlCGuard {
        let cancel = self.cancel.clone();
        let bar = match &self.output {
            Output::Bar(bar) => Some(bar.clone()),
            Output::Log(_) => None,
        };
        let task = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let handle = cancel.lock().ok().and_then(|slot| slot.clone());
                match handle {
                    Some(handle) if !handle.is_finished() => {
                        match &bar {
                            Some(bar) => bar.println("Cancelling..."),
                            None => info!("Cancelling..."),
                        }
                        handle.cancel();
                    }
                    _ => {
                        if let Some(bar) = &bar {
                            bar.abandon_with_message("Interrupted");
                        }
                        std::process::exit(130);
                    }
                }
            }
        });
        CtrlCGuard(task)
    }

    pub fn finish(&self, message: &str) {
        match &self.output {
            Output::Bar(bar) => bar.finish_with_message(message.to_string()),
            Output::Log(_) => info!("{}", message),
        }
    }

    pub fn abandon(&self) {
        if let Output::Bar(bar) = &self.output {
            bar.abandon();
        }
    }

    fn remember_cancel(&self, cancel: &Option<CancelHandle>) {
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = cancel.clone();
        }
    }
}

fn progress_bar(operation: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.green/dim}] {pos}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    bar.set_message(operation.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

impl ProgressReporter for CliProgress {
    fn report(&self, data: &ProgressData) {
        self.remember_cancel(&data.cancel);
        let bar = match &self.output {
            Output::Bar(bar) => bar,
            Output::Log(log) => return log.report(data),
        };

        bar.set_position(u64::from(data.absolute_percentage));
        if data.waiting {
            bar.set_message(format!("{} (waiting for other package operations)", self.operation));
        } else {
            bar.set_message(self.operation.clone());
        }
    }

    fn report_install(&self, data: &InstallProgressData) {
        let bar = match &self.output {
            Output::Bar(bar) => bar,
            Output::Log(log) => {
                self.remember_cancel(&data.progress.cancel);
                return log.report_install(data);
            }
        };

        self.report(&data.progress);
        if data.verifying {
            bar.set_message(format!("{}: verifying packages", self.operation));
        } else if let Some(package) = &data.package {
            match data.info {
                Some(info) => bar.set_message(format!("{}: {} {}", self.operation, info, package)),
                None => bar.set_message(format!("{}: {}", self.operation, package)),
            }
        }
    }
}

/// Stops listening for Ctrl-C when dropped
pub struct CtrlCGuard(JoinHandle<()>);

impl Drop for CtrlCGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
