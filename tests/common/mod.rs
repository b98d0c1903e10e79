// tests/common/mod.rs

//! Shared test utilities: an in-memory package repository and scripted
//! PackageKit / dnf5daemon transports that operate on it.

#![allow(dead_code)]

use async_trait::async_trait;
use pkgbridge::dnf5daemon::{
    Dnf5Bus, Dnf5Signal, RESOLVE_ERROR, ResolveOutcome, RpmPackage, SessionPath, TransactionItem,
};
use pkgbridge::packagekit::enums::{
    EXIT_CANCELLED, EXIT_FAILED, EXIT_SUCCESS, INFO_INSTALLING, INFO_REMOVING,
    TRANSACTION_FLAG_SIMULATE,
};
use pkgbridge::packagekit::{
    PackageKitBus, TransactionCall, TransactionPath, TransactionProps, TransactionSignal,
};
use pkgbridge::progress::{ProgressEvent, ProgressReporter};
use pkgbridge::subscription::{self, SignalSender, Subscription};
use pkgbridge::{CallbackProgress, Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PK_INFO_INSTALLED: u32 = 1;
pub const PK_INFO_AVAILABLE: u32 = 2;
pub const PK_INFO_DOWNLOADING: u32 = 10;
pub const PK_ERROR_TRANSACTION_CANCELLED: u32 = 21;
pub const PK_ERROR_NO_NETWORK: u32 = 3;

/// A package known to the fake repository
#[derive(Debug, Clone)]
pub struct FakePackage {
    pub name: String,
    pub version: String,
    pub size: u64,
    pub installed: bool,
    pub available: bool,
    pub requires: Vec<String>,
    pub obsoletes: Vec<String>,
}

impl FakePackage {
    pub fn available(name: &str, version: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            size,
            installed: false,
            available: true,
            requires: Vec::new(),
            obsoletes: Vec::new(),
        }
    }

    pub fn installed(name: &str, version: &str) -> Self {
        Self {
            installed: true,
            available: false,
            ..Self::available(name, version, 0)
        }
    }

    pub fn requires(mut self, names: &[&str]) -> Self {
        self.requires = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn obsoletes(mut self, names: &[&str]) -> Self {
        self.obsoletes = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Installed and also available from a repository
    pub fn also_available(mut self) -> Self {
        self.available = true;
        self
    }
}

/// In-memory package universe
#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
    packages: Vec<FakePackage>,
}

impl FakeRepo {
    pub fn new(packages: Vec<FakePackage>) -> Self {
        Self { packages }
    }

    /// tmux needs libevent; zsh is installed; bash is installed and
    /// available; nano obsoletes the installed vim-minimal
    pub fn standard() -> Self {
        Self::new(vec![
            FakePackage::available("tmux", "3.5a", 490_000).requires(&["libevent"]),
            FakePackage::available("libevent", "2.1.12", 260_000),
            FakePackage::installed("zsh", "5.9"),
            FakePackage::installed("bash", "5.2").also_available(),
            FakePackage::available("nano", "8.2", 700_000).obsoletes(&["vim-minimal"]),
            FakePackage::installed("vim-minimal", "9.1"),
            FakePackage::available("htop", "3.3", 180_000),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&FakePackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.get(name).is_some_and(|p| p.installed)
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.packages.iter().position(|p| p.name == name)
    }

    /// Packages an install of `names` would bring in, requested first
    fn closure(&self, names: &[String]) -> Option<Vec<FakePackage>> {
        let mut result: Vec<FakePackage> = Vec::new();
        let mut queue: Vec<String> = names.to_vec();
        while !queue.is_empty() {
            let name = queue.remove(0);
            let package = self.get(&name)?;
            if package.installed || result.iter().any(|p| p.name == name) {
                continue;
            }
            if !package.available {
                return None;
            }
            queue.extend(package.requires.iter().cloned());
            result.push(package.clone());
        }
        Some(result)
    }

    /// Installed packages an install of `packages` would remove
    fn removals(&self, packages: &[FakePackage]) -> Vec<FakePackage> {
        packages
            .iter()
            .flat_map(|p| p.obsoletes.iter())
            .filter_map(|name| self.get(name))
            .filter(|p| p.installed)
            .cloned()
            .collect()
    }

    fn apply(&mut self, installs: &[FakePackage], removals: &[FakePackage]) {
        for package in &mut self.packages {
            if installs.iter().any(|p| p.name == package.name) {
                package.installed = true;
            }
            if removals.iter().any(|p| p.name == package.name) {
                package.installed = false;
            }
        }
    }
}

/// Progress reporter that records every event
pub fn recording_progress() -> (
    CallbackProgress<impl Fn(ProgressEvent) + Send + Sync>,
    Arc<Mutex<Vec<ProgressEvent>>>,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let progress = CallbackProgress::new(move |event| sink.lock().unwrap().push(event));
    (progress, events)
}

/// Progress reporter that requests cancellation as soon as it is offered
pub fn cancelling_progress() -> impl ProgressReporter {
    CallbackProgress::new(|event| {
        if let ProgressEvent::Progress(data) = event
            && let Some(cancel) = data.cancel
        {
            cancel.cancel();
        }
    })
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// PackageKit
// =============================================================================

#[derive(Default)]
struct PkState {
    repo: FakeRepo,
    next_transaction: u32,
    transactions: HashMap<String, SignalSender<TransactionSignal>>,
    calls: Vec<TransactionCall>,
    cancels: Vec<String>,
    unavailable: bool,
    hang: HashSet<&'static str>,
    drop_on: HashSet<&'static str>,
    fail: HashMap<&'static str, u32>,
    dispatch_props: Vec<TransactionProps>,
    create_delay: Option<Duration>,
    invalidations: usize,
}

/// Scripted PackageKit
///
/// Transactions finish right after dispatch unless the method is marked
/// to hang (then only a cancel finishes them), to fail, or to drop the
/// connection.
#[derive(Default)]
pub struct FakePackageKit {
    state: Mutex<PkState>,
}

impl FakePackageKit {
    pub fn new(repo: FakeRepo) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().repo = repo;
        fake
    }

    pub fn unavailable() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().unavailable = true;
        fake
    }

    /// Leave `method` transactions running (cancellable) until cancelled
    pub fn hang_on(self, method: &'static str) -> Self {
        self.state.lock().unwrap().hang.insert(method);
        self
    }

    /// Drop off the bus while a `method` transaction runs
    pub fn drop_on(self, method: &'static str) -> Self {
        self.state.lock().unwrap().drop_on.insert(method);
        self
    }

    /// Fail `method` transactions with `code`
    pub fn fail_on(self, method: &'static str, code: u32) -> Self {
        self.state.lock().unwrap().fail.insert(method, code);
        self
    }

    /// Property changes sent right after every dispatch
    pub fn with_dispatch_props(self, props: Vec<TransactionProps>) -> Self {
        self.state.lock().unwrap().dispatch_props = props;
        self
    }

    /// Take `delay` to hand out each transaction path
    pub fn with_create_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().create_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<TransactionCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.state.lock().unwrap().cancels.clone()
    }

    pub fn invalidations(&self) -> usize {
        self.state.lock().unwrap().invalidations
    }

    pub fn open_transactions(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .transactions
            .values()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    pub fn repo(&self) -> FakeRepo {
        self.state.lock().unwrap().repo.clone()
    }

    /// Finish every running transaction
    pub fn finish_all(&self, exit: u32) {
        let mut state = self.state.lock().unwrap();
        for tx in state.transactions.values() {
            let _ = tx.send(TransactionSignal::Finished { exit, runtime_ms: 1 });
        }
        state.transactions.clear();
    }

    fn package_id(package: &FakePackage, data: &str) -> String {
        format!("{};{};x86_64;{}", package.name, package.version, data)
    }

    fn package(info: u32, package_id: String) -> TransactionSignal {
        TransactionSignal::Package {
            info,
            package_id,
            summary: String::new(),
        }
    }

    fn name_of(id: &str) -> String {
        id.split(';').next().unwrap_or_default().to_string()
    }

    fn result_signals(state: &mut PkState, call: &TransactionCall) -> Vec<TransactionSignal> {
        let mut signals = Vec::new();
        match call {
            TransactionCall::RefreshCache { .. } => {
                signals.push(TransactionSignal::PropertiesChanged(TransactionProps {
                    percentage: Some(50),
                    ..Default::default()
                }));
            }
            TransactionCall::Resolve { names, .. } => {
                for name in names {
                    let Some(package) = state.repo.get(name) else {
                        continue;
                    };
                    if package.installed {
                        signals.push(Self::package(
                            PK_INFO_INSTALLED,
                            Self::package_id(package, "installed"),
                        ));
                    }
                    if package.available {
                        signals.push(Self::package(
                            PK_INFO_AVAILABLE,
                            Self::package_id(package, "fedora"),
                        ));
                    }
                }
            }
            TransactionCall::InstallPackages { flags, ids } => {
                let requested: Vec<String> = ids.iter().map(|id| Self::name_of(id.as_str())).collect();
                let installs = state.repo.closure(&requested).unwrap_or_default();
                let removals = state.repo.removals(&installs);
                let simulate = flags & TRANSACTION_FLAG_SIMULATE != 0;

                for package in &removals {
                    signals.push(Self::package(
                        INFO_REMOVING,
                        Self::package_id(package, "installed"),
                    ));
                }
                for (n, package) in installs.iter().enumerate() {
                    let id = Self::package_id(package, "fedora");
                    if !simulate {
                        signals.push(Self::package(PK_INFO_DOWNLOADING, id.clone()));
                    }
                    signals.push(Self::package(INFO_INSTALLING, id));
                    if !simulate {
                        signals.push(TransactionSignal::PropertiesChanged(TransactionProps {
                            percentage: Some(((n + 1) * 100 / installs.len()) as u32),
                            ..Default::default()
                        }));
                    }
                }
                if !simulate {
                    state.repo.apply(&installs, &removals);
                }
            }
            TransactionCall::GetDetails { ids } => {
                for id in ids {
                    let size = state.repo.get(&Self::name_of(id.as_str())).map(|p| p.size);
                    signals.push(TransactionSignal::Details {
                        package_id: Some(id.to_string()),
                        size,
                    });
                }
            }
        }
        signals
    }
}

#[async_trait]
impl PackageKitBus for FakePackageKit {
    async fn probe(&self) -> Result<()> {
        if self.state.lock().unwrap().unavailable {
            return Err(Error::Bus("org.freedesktop.PackageKit was not provided".to_string()));
        }
        Ok(())
    }

    async fn create_transaction(&self) -> Result<TransactionPath> {
        let delay = self.state.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(Error::Bus("org.freedesktop.PackageKit was not provided".to_string()));
        }
        state.next_transaction += 1;
        Ok(TransactionPath::new(format!("/{}_fake", state.next_transaction)))
    }

    async fn subscribe(
        &self,
        transaction: &TransactionPath,
    ) -> Result<Subscription<TransactionSignal>> {
        let (tx, subscription) = subscription::channel();
        let _ = tx.send(TransactionSignal::PropertiesChanged(TransactionProps {
            status: Some(2),
            allow_cancel: Some(false),
            percentage: Some(101),
        }));
        self.state
            .lock()
            .unwrap()
            .transactions
            .insert(transaction.to_string(), tx);
        Ok(subscription)
    }

    async fn dispatch(&self, transaction: &TransactionPath, call: &TransactionCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        let method = call.method();

        let Some(tx) = state.transactions.get(transaction.as_str()).cloned() else {
            return Err(Error::Bus(format!("unknown transaction {}", transaction)));
        };

        if state.drop_on.contains(method) {
            state.transactions.remove(transaction.as_str());
            return Ok(());
        }

        for props in state.dispatch_props.clone() {
            let _ = tx.send(TransactionSignal::PropertiesChanged(props));
        }

        if state.hang.contains(method) {
            let _ = tx.send(TransactionSignal::PropertiesChanged(TransactionProps {
                allow_cancel: Some(true),
                ..Default::default()
            }));
            return Ok(());
        }

        if let Some(code) = state.fail.get(method).copied() {
            let _ = tx.send(TransactionSignal::ErrorCode {
                code,
                details: format!("{} failed", method),
            });
            let _ = tx.send(TransactionSignal::Finished {
                exit: EXIT_FAILED,
                runtime_ms: 5,
            });
            state.transactions.remove(transaction.as_str());
            return Ok(());
        }

        for signal in Self::result_signals(&mut state, call) {
            let _ = tx.send(signal);
        }
        let _ = tx.send(TransactionSignal::Finished {
            exit: EXIT_SUCCESS,
            runtime_ms: 5,
        });
        state.transactions.remove(transaction.as_str());
        Ok(())
    }

    async fn cancel(&self, transaction: &TransactionPath) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.cancels.push(transaction.to_string());
        if let Some(tx) = state.transactions.remove(transaction.as_str()) {
            let _ = tx.send(TransactionSignal::ErrorCode {
                code: PK_ERROR_TRANSACTION_CANCELLED,
                details: "The task was canceled".to_string(),
            });
            let _ = tx.send(TransactionSignal::Finished {
                exit: EXIT_CANCELLED,
                runtime_ms: 5,
            });
        }
        Ok(())
    }

    fn invalidate(&self) {
        self.state.lock().unwrap().invalidations += 1;
    }
}

// =============================================================================
// dnf5daemon
// =============================================================================

#[derive(Default)]
struct Dnf5State {
    repo: FakeRepo,
    next_session: u32,
    open: HashSet<String>,
    goals: HashMap<String, Vec<String>>,
    calls: Vec<String>,
    subscribers: Vec<SignalSender<Dnf5Signal>>,
    unavailable: bool,
    fail_on: HashSet<&'static str>,
    clean_fails: bool,
    foreign_signals: bool,
    vanish_on: HashSet<&'static str>,
    invalidations: usize,
}

/// Scripted dnf5daemon
#[derive(Default)]
pub struct FakeDnf5 {
    state: Mutex<Dnf5State>,
}

pub const FOREIGN_SESSION: &str = "/org/rpm/dnf/v0/foreign";

impl FakeDnf5 {
    pub fn new(repo: FakeRepo) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().repo = repo;
        fake
    }

    pub fn unavailable() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().unavailable = true;
        fake
    }

    /// Make calls to `method` fail
    pub fn fail_on(self, method: &'static str) -> Self {
        self.state.lock().unwrap().fail_on.insert(method);
        self
    }

    /// Leave the bus during a call to `method`; the call never returns
    pub fn vanish_on(self, method: &'static str) -> Self {
        self.state.lock().unwrap().vanish_on.insert(method);
        self
    }

    /// Make `clean` report failure
    pub fn clean_fails(self) -> Self {
        self.state.lock().unwrap().clean_fails = true;
        self
    }

    /// Also emit signals of another client's session
    pub fn with_foreign_signals(self) -> Self {
        self.state.lock().unwrap().foreign_signals = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    pub fn invalidations(&self) -> usize {
        self.state.lock().unwrap().invalidations
    }

    pub fn live_subscriptions(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .subscribers
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    pub fn repo(&self) -> FakeRepo {
        self.state.lock().unwrap().repo.clone()
    }

    fn enter(&self, method: &str, session: Option<&SessionPath>) -> Result<std::sync::MutexGuard<'_, Dnf5State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        if state.unavailable {
            return Err(Error::Bus("org.rpm.dnf.v0 was not provided".to_string()));
        }
        if state.fail_on.contains(method) {
            return Err(Error::Bus(format!("{} failed", method)));
        }
        if let Some(session) = session
            && !state.open.contains(session.as_str())
        {
            return Err(Error::Bus(format!("no such session {}", session)));
        }
        Ok(state)
    }

    /// Drop every subscription if `method` is scripted to vanish
    fn vanishes(&self, method: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.vanish_on.contains(method) {
            return false;
        }
        state.calls.push(method.to_string());
        state.subscribers.clear();
        true
    }

    fn rpm_package(repo: &FakeRepo, package: &FakePackage, installed: bool) -> RpmPackage {
        let index = repo.index(&package.name).unwrap_or_default() as i64;
        RpmPackage {
            id: if installed { 1000 + index } else { index + 1 },
            name: package.name.clone(),
            version: package.version.clone(),
            release: "1.fc41".to_string(),
            arch: "x86_64".to_string(),
            download_size: if installed { 0 } else { package.size },
            is_installed: installed,
        }
    }

    fn goal_items(state: &Dnf5State, specs: &[String]) -> Option<Vec<TransactionItem>> {
        let installs = state.repo.closure(specs)?;
        let removals = state.repo.removals(&installs);
        let mut items = Vec::new();
        for package in &installs {
            items.push(TransactionItem {
                object_type: "Package".to_string(),
                action: "Install".to_string(),
                reason: if specs.contains(&package.name) {
                    "User".to_string()
                } else {
                    "Dependency".to_string()
                },
                package: Self::rpm_package(&state.repo, package, false),
            });
        }
        for package in &removals {
            items.push(TransactionItem {
                object_type: "Package".to_string(),
                action: "Remove".to_string(),
                reason: "Clean".to_string(),
                package: Self::rpm_package(&state.repo, package, true),
            });
        }
        Some(items)
    }

    fn emit(state: &Dnf5State, signal: Dnf5Signal) {
        for tx in &state.subscribers {
            let _ = tx.send(signal.clone());
        }
    }
}

#[async_trait]
impl Dnf5Bus for FakeDnf5 {
    async fn probe(&self) -> Result<()> {
        self.enter("Ping", None).map(|_| ())
    }

    async fn open_session(&self) -> Result<SessionPath> {
        let mut state = self.enter("open_session", None)?;
        state.next_session += 1;
        let path = format!("/org/rpm/dnf/v0/{}", state.next_session);
        state.open.insert(path.clone());
        Ok(SessionPath::new(path))
    }

    async fn close_session(&self, session: &SessionPath) -> Result<bool> {
        let mut state = self.enter("close_session", None)?;
        state.goals.remove(session.as_str());
        Ok(state.open.remove(session.as_str()))
    }

    async fn read_all_repos(&self, session: &SessionPath) -> Result<bool> {
        self.enter("read_all_repos", Some(session)).map(|_| true)
    }

    async fn clean(&self, session: &SessionPath, cache_type: &str) -> Result<(bool, String)> {
        let state = self.enter("clean", Some(session))?;
        if state.clean_fails {
            return Ok((false, format!("cannot clean {} cache", cache_type)));
        }
        Ok((true, String::new()))
    }

    async fn resolve(&self, session: &SessionPath) -> Result<ResolveOutcome> {
        let state = self.enter("resolve", Some(session))?;
        let specs = state.goals.get(session.as_str()).cloned().unwrap_or_default();
        match Self::goal_items(&state, &specs) {
            Some(items) => Ok(ResolveOutcome { items, status: 0 }),
            None => Ok(ResolveOutcome {
                items: Vec::new(),
                status: RESOLVE_ERROR,
            }),
        }
    }

    async fn transaction_problems(&self, session: &SessionPath) -> Result<Vec<String>> {
        let state = self.enter("get_transaction_problems_string", Some(session))?;
        let specs = state.goals.get(session.as_str()).cloned().unwrap_or_default();
        Ok(specs
            .iter()
            .filter(|spec| state.repo.get(spec).is_none_or(|p| !p.available && !p.installed))
            .map(|spec| format!("No match for argument: {}", spec))
            .collect())
    }

    async fn do_transaction(&self, session: &SessionPath) -> Result<()> {
        if self.vanishes("do_transaction") {
            std::future::pending::<()>().await;
        }

        let mut state = self.enter("do_transaction", Some(session))?;
        let specs = state.goals.remove(session.as_str()).unwrap_or_default();
        let items = Self::goal_items(&state, &specs)
            .ok_or_else(|| Error::Bus("goal does not resolve".to_string()))?;
        if items.is_empty() {
            return Ok(());
        }

        if state.foreign_signals {
            Self::emit(
                &state,
                Dnf5Signal::DownloadAddNew {
                    session: SessionPath::new(FOREIGN_SESSION),
                    download_id: "foreign".to_string(),
                    description: "foreign-package".to_string(),
                    total_to_download: 1,
                },
            );
        }

        let installs: Vec<&TransactionItem> = items.iter().filter(|i| i.is_inbound()).collect();
        for item in &installs {
            let download_id = item.package.id.to_string();
            let size = item.package.download_size as i64;
            Self::emit(
                &state,
                Dnf5Signal::DownloadAddNew {
                    session: session.clone(),
                    download_id: download_id.clone(),
                    description: item.package.nevra(),
                    total_to_download: size,
                },
            );
            Self::emit(
                &state,
                Dnf5Signal::DownloadProgress {
                    session: session.clone(),
                    download_id: download_id.clone(),
                    total_to_download: size,
                    downloaded: size,
                },
            );
            Self::emit(
                &state,
                Dnf5Signal::DownloadEnd {
                    session: session.clone(),
                    download_id,
                    transfer_status: 0,
                    message: String::new(),
                },
            );
        }

        let total = items.len() as u64;
        Self::emit(
            &state,
            Dnf5Signal::TransactionBeforeBegin {
                session: session.clone(),
                total,
            },
        );
        for (n, item) in items.iter().enumerate() {
            Self::emit(
                &state,
                Dnf5Signal::TransactionElemProgress {
                    session: session.clone(),
                    nevra: item.package.nevra(),
                    processed: n as u64 + 1,
                    total,
                },
            );
        }

        let installs: Vec<FakePackage> = installs
            .iter()
            .filter_map(|item| state.repo.get(&item.package.name).cloned())
            .collect();
        let removals = state.repo.removals(&installs);
        state.repo.apply(&installs, &removals);
        Ok(())
    }

    async fn list(&self, session: &SessionPath, patterns: &[String]) -> Result<Vec<RpmPackage>> {
        let state = self.enter("list", Some(session))?;
        let mut packages = Vec::new();
        for pattern in patterns {
            let Some(package) = state.repo.get(pattern) else {
                continue;
            };
            if package.installed {
                packages.push(Self::rpm_package(&state.repo, package, true));
            }
            if package.available {
                packages.push(Self::rpm_package(&state.repo, package, false));
            }
        }
        Ok(packages)
    }

    async fn install(&self, session: &SessionPath, specs: &[String]) -> Result<()> {
        let mut state = self.enter("install", Some(session))?;
        state
            .goals
            .entry(session.to_string())
            .or_default()
            .extend(specs.iter().cloned());
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription<Dnf5Signal>> {
        let mut state = self.enter("subscribe", None)?;
        let (tx, subscription) = subscription::channel();
        state.subscribers.push(tx);
        Ok(subscription)
    }

    fn invalidate(&self) {
        let mut state = self.state.lock().unwrap();
        state.invalidations += 1;
        state.subscribers.clear();
    }
}
