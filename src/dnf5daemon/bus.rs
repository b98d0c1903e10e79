// src/dnf5daemon/bus.rs

//! dnf5daemon over the system bus
//!
//! dnf5daemon's methods and signals use snake_case names on the wire.

use super::{
    Dnf5Bus, Dnf5Signal, PACKAGE_ATTRS, ResolveOutcome, RpmPackage, SessionPath, TransactionItem,
};
use crate::config::{Config, ServiceConfig};
use crate::connection::{
    ConnectionHandle, owner_lost, value_bool, value_i64, value_str, value_u64, watch_owner,
};
use crate::error::Result;
use crate::subscription::{self, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::debug;
use zbus::message::Type as MessageType;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, MatchRule, Message, MessageStream};

const BASE_INTERFACE: &str = "org.rpm.dnf.v0.Base";
const RPM_INTERFACE: &str = "org.rpm.dnf.v0.rpm.Rpm";

type Options<'a> = HashMap<&'a str, &'a Value<'a>>;
type RawItem = (
    String,
    String,
    String,
    HashMap<String, OwnedValue>,
    HashMap<String, OwnedValue>,
);

#[zbus::proxy(interface = "org.rpm.dnf.v0.SessionManager")]
trait SessionManager {
    #[zbus(name = "open_session")]
    fn open_session(&self, options: &HashMap<&str, &Value<'_>>) -> zbus::Result<OwnedObjectPath>;

    #[zbus(name = "close_session")]
    fn close_session(&self, session_object_path: &ObjectPath<'_>) -> zbus::Result<bool>;
}

#[zbus::proxy(interface = "org.rpm.dnf.v0.Base")]
trait Base {
    #[zbus(name = "read_all_repos")]
    fn read_all_repos(&self) -> zbus::Result<bool>;

    #[zbus(name = "clean")]
    fn clean(&self, cache_type: &str) -> zbus::Result<(bool, String)>;
}

#[zbus::proxy(interface = "org.rpm.dnf.v0.Goal")]
trait Goal {
    #[zbus(name = "resolve")]
    fn resolve(&self, options: &HashMap<&str, &Value<'_>>) -> zbus::Result<(Vec<RawItem>, u32)>;

    #[zbus(name = "get_transaction_problems_string")]
    fn get_transaction_problems_string(&self) -> zbus::Result<Vec<String>>;

    #[zbus(name = "do_transaction")]
    fn do_transaction(&self, options: &HashMap<&str, &Value<'_>>) -> zbus::Result<()>;
}

#[zbus::proxy(interface = "org.rpm.dnf.v0.rpm.Rpm")]
trait Rpm {
    #[zbus(name = "list")]
    fn list(
        &self,
        options: &HashMap<&str, &Value<'_>>,
    ) -> zbus::Result<Vec<HashMap<String, OwnedValue>>>;

    #[zbus(name = "install")]
    fn install(&self, pkg_specs: &[&str], options: &HashMap<&str, &Value<'_>>) -> zbus::Result<()>;
}

/// [`Dnf5Bus`] backed by the system bus
#[derive(Debug)]
pub struct SystemDnf5Daemon {
    service: ServiceConfig,
    connection: ConnectionHandle,
}

impl SystemDnf5Daemon {
    pub fn new(config: &Config) -> Self {
        Self {
            service: config.dnf5daemon.clone(),
            connection: ConnectionHandle::with_address(config.bus_address.clone()),
        }
    }

    async fn session_manager(&self) -> Result<SessionManagerProxy<'_>> {
        let conn = self.connection.ensure_connected().await?;
        Ok(SessionManagerProxy::builder(&conn)
            .destination(self.service.service.as_str())?
            .path(self.service.path.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn base<'a>(&'a self, session: &'a SessionPath) -> Result<BaseProxy<'a>> {
        let conn = self.connection.ensure_connected().await?;
        Ok(BaseProxy::builder(&conn)
            .destination(self.service.service.as_str())?
            .path(session.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn goal<'a>(&'a self, session: &'a SessionPath) -> Result<GoalProxy<'a>> {
        let conn = self.connection.ensure_connected().await?;
        Ok(GoalProxy::builder(&conn)
            .destination(self.service.service.as_str())?
            .path(session.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn rpm<'a>(&'a self, session: &'a SessionPath) -> Result<RpmProxy<'a>> {
        let conn = self.connection.ensure_connected().await?;
        Ok(RpmProxy::builder(&conn)
            .destination(self.service.service.as_str())?
            .path(session.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }
}

#[async_trait]
impl Dnf5Bus for SystemDnf5Daemon {
    async fn probe(&self) -> Result<()> {
        let conn: Connection = self.connection.ensure_connected().await?;
        zbus::fdo::PeerProxy::builder(&conn)
            .destination(self.service.service.as_str())?
            .path(self.service.path.as_str())?
            .build()
            .await?
            .ping()
            .await?;
        Ok(())
    }

    async fn open_session(&self) -> Result<SessionPath> {
        let options = Options::new();
        let path = self.session_manager().await?.open_session(&options).await?;
        Ok(SessionPath::new(path.as_str()))
    }

    async fn close_session(&self, session: &SessionPath) -> Result<bool> {
        let path = ObjectPath::try_from(session.as_str()).map_err(zbus::Error::from)?;
        Ok(self.session_manager().await?.close_session(&path).await?)
    }

    async fn read_all_repos(&self, session: &SessionPath) -> Result<bool> {
        Ok(self.base(session).await?.read_all_repos().await?)
    }

    async fn clean(&self, session: &SessionPath, cache_type: &str) -> Result<(bool, String)> {
        Ok(self.base(session).await?.clean(cache_type).await?)
    }

    async fn resolve(&self, session: &SessionPath) -> Result<ResolveOutcome> {
        let options = Options::new();
        let (raw, status) = self.goal(session).await?.resolve(&options).await?;
        let items = raw
            .into_iter()
            .map(|(object_type, action, reason, _, package)| TransactionItem {
                object_type,
                action,
                reason,
                package: package_from_map(&package),
            })
            .collect();
        Ok(ResolveOutcome { items, status })
    }

    async fn transaction_problems(&self, session: &SessionPath) -> Result<Vec<String>> {
        Ok(self
            .goal(session)
            .await?
            .get_transaction_problems_string()
            .await?)
    }

    async fn do_transaction(&self, session: &SessionPath) -> Result<()> {
        let options = Options::new();
        self.goal(session).await?.do_transaction(&options).await?;
        Ok(())
    }

    async fn list(&self, session: &SessionPath, patterns: &[String]) -> Result<Vec<RpmPackage>> {
        let attrs = Value::from(PACKAGE_ATTRS.to_vec());
        let scope = Value::from("all");
        let patterns = Value::from(patterns.iter().map(String::as_str).collect::<Vec<_>>());
        let mut options = Options::new();
        options.insert("package_attrs", &attrs);
        options.insert("scope", &scope);
        options.insert("patterns", &patterns);

        let raw = self.rpm(session).await?.list(&options).await?;
        Ok(raw.iter().map(package_from_map).collect())
    }

    async fn install(&self, session: &SessionPath, specs: &[String]) -> Result<()> {
        let specs: Vec<&str> = specs.iter().map(String::as_str).collect();
        let options = Options::new();
        self.rpm(session).await?.install(&specs, &options).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription<Dnf5Signal>> {
        let conn = self.connection.ensure_connected().await?;
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .path_namespace(self.service.path.as_str())?
            .build();
        let mut stream = MessageStream::for_match_rule(rule, &conn, Some(256)).await?;
        let mut owner_changes = watch_owner(&conn, &self.service.service).await?;

        let (tx, subscription) = subscription::channel();
        let connection = self.connection.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = stream.next() => {
                        let Some(message) = message else {
                            break;
                        };
                        let Ok(message) = message else {
                            continue;
                        };
                        if let Some(signal) = decode_signal(&message)
                            && tx.send(signal).is_err()
                        {
                            break;
                        }
                    }
                    change = owner_changes.next() => {
                        if change.is_none_or(|change| owner_lost(&change)) {
                            debug!("dnf5daemon left the bus");
                            connection.invalidate_if_current(&conn);
                            break;
                        }
                    }
                }
            }
            debug!("dnf5daemon signal stream ended");
        });

        Ok(subscription.with_forwarder(forwarder))
    }

    fn invalidate(&self) {
        self.connection.invalidate();
    }
}

fn package_from_map(attrs: &HashMap<String, OwnedValue>) -> RpmPackage {
    let text = |key: &str| attrs.get(key).and_then(|v| value_str(v)).unwrap_or_default();
    RpmPackage {
        id: attrs.get("id").and_then(|v| value_i64(v)).unwrap_or_default(),
        name: text("name"),
        version: text("version"),
        release: text("release"),
        arch: text("arch"),
        download_size: attrs
            .get("download_size")
            .and_then(|v| value_u64(v))
            .unwrap_or_default(),
        is_installed: attrs
            .get("is_installed")
            .and_then(|v| value_bool(v))
            .unwrap_or_default(),
    }
}

fn decode_signal(message: &Message) -> Option<Dnf5Signal> {
    let header = message.header();
    let interface = header.interface()?.as_str();
    let member = header.member()?.as_str();
    let body = message.body();

    let signal = match (interface, member) {
        (BASE_INTERFACE, "download_add_new") => {
            let (session, download_id, description, total_to_download): (
                OwnedObjectPath,
                String,
                String,
                i64,
            ) = body.deserialize().ok()?;
            Dnf5Signal::DownloadAddNew {
                session: SessionPath::new(session.as_str()),
                download_id,
                description,
                total_to_download,
            }
        }
        (BASE_INTERFACE, "download_progress") => {
            let (session, download_id, total_to_download, downloaded): (
                OwnedObjectPath,
                String,
                i64,
                i64,
            ) = body.deserialize().ok()?;
            Dnf5Signal::DownloadProgress {
                session: SessionPath::new(session.as_str()),
                download_id,
                total_to_download,
                downloaded,
            }
        }
        (BASE_INTERFACE, "download_end") => {
            let (session, download_id, transfer_status, message): (
                OwnedObjectPath,
                String,
                u32,
                String,
            ) = body.deserialize().ok()?;
            Dnf5Signal::DownloadEnd {
                session: SessionPath::new(session.as_str()),
                download_id,
                transfer_status,
                message,
            }
        }
        (RPM_INTERFACE, "transaction_before_begin") => {
            let (session, total): (OwnedObjectPath, u64) = body.deserialize().ok()?;
            Dnf5Signal::TransactionBeforeBegin {
                session: SessionPath::new(session.as_str()),
                total,
            }
        }
        (RPM_INTERFACE, "transaction_elem_progress") => {
            let (session, nevra, processed, total): (OwnedObjectPath, String, u64, u64) =
                body.deserialize().ok()?;
            Dnf5Signal::TransactionElemProgress {
                session: SessionPath::new(session.as_str()),
                nevra,
                processed,
                total,
            }
        }
        _ => return None,
    };
    Some(signal)
}
