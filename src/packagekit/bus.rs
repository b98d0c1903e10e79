// src/packagekit/bus.rs

//! PackageKit over the system bus

use super::{
    PackageKitBus, TRANSACTION_INTERFACE, TransactionCall, TransactionPath, TransactionProps,
    TransactionSignal,
};
use crate::config::{Config, ServiceConfig};
use crate::connection::{
    ConnectionHandle, owner_lost, value_bool, value_str, value_u64, watch_owner,
};
use crate::error::Result;
use crate::subscription::{self, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::debug;
use zbus::message::Type as MessageType;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::{Connection, MatchRule, Message, MessageStream};

#[zbus::proxy(interface = "org.freedesktop.PackageKit")]
trait PackageKit {
    fn create_transaction(&self) -> zbus::Result<OwnedObjectPath>;

    #[zbus(property)]
    fn version_major(&self) -> zbus::Result<u32>;
}

#[zbus::proxy(interface = "org.freedesktop.PackageKit.Transaction")]
trait Transaction {
    fn refresh_cache(&self, force: bool) -> zbus::Result<()>;

    fn resolve(&self, filter: u64, packages: &[&str]) -> zbus::Result<()>;

    fn install_packages(&self, transaction_flags: u64, package_ids: &[&str]) -> zbus::Result<()>;

    fn get_details(&self, package_ids: &[&str]) -> zbus::Result<()>;

    fn cancel(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn status(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn allow_cancel(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn percentage(&self) -> zbus::Result<u32>;
}

/// [`PackageKitBus`] backed by the system bus
#[derive(Debug)]
pub struct SystemPackageKit {
    service: ServiceConfig,
    connection: ConnectionHandle,
}

impl SystemPackageKit {
    pub fn new(config: &Config) -> Self {
        Self {
            service: config.packagekit.clone(),
            connection: ConnectionHandle::with_address(config.bus_address.clone()),
        }
    }

    async fn root(&self, conn: &Connection) -> Result<PackageKitProxy<'_>> {
        Ok(PackageKitProxy::builder(conn)
            .destination(self.service.service.as_str())?
            .path(self.service.path.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn transaction<'a>(
        &'a self,
        conn: &Connection,
        path: &'a TransactionPath,
    ) -> Result<TransactionProxy<'a>> {
        Ok(TransactionProxy::builder(conn)
            .destination(self.service.service.as_str())?
            .path(path.as_str())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }
}

#[async_trait]
impl PackageKitBus for SystemPackageKit {
    async fn probe(&self) -> Result<()> {
        let conn = self.connection.ensure_connected().await?;
        let version = self.root(&conn).await?.version_major().await?;
        debug!("PackageKit {} is available", version);
        Ok(())
    }

    async fn create_transaction(&self) -> Result<TransactionPath> {
        let conn = self.connection.ensure_connected().await?;
        let path = self.root(&conn).await?.create_transaction().await?;
        Ok(TransactionPath::new(path.as_str()))
    }

    async fn subscribe(
        &self,
        transaction: &TransactionPath,
    ) -> Result<Subscription<TransactionSignal>> {
        let conn = self.connection.ensure_connected().await?;
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .path(transaction.as_str())?
            .build();
        let mut stream = MessageStream::for_match_rule(rule, &conn, Some(64)).await?;
        let mut owner_changes = watch_owner(&conn, &self.service.service).await?;

        let (tx, subscription) = subscription::channel();

        let proxy = self.transaction(&conn, transaction).await?;
        let initial = TransactionProps {
            status: proxy.status().await.ok(),
            allow_cancel: proxy.allow_cancel().await.ok(),
            percentage: proxy.percentage().await.ok(),
        };
        let _ = tx.send(TransactionSignal::PropertiesChanged(initial));

        let path = transaction.clone();
        let connection = self.connection.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = stream.next() => {
                        let Some(message) = message else {
                            break;
                        };
                        let message = match message {
                            Ok(message) => message,
                            Err(e) => {
                                debug!("Dropping bad message on {}: {}", path, e);
                                continue;
                            }
                        };
                        if let Some(signal) = decode_signal(&message)
                            && tx.send(signal).is_err()
                        {
                            break;
                        }
                    }
                    change = owner_changes.next() => {
                        if change.is_none_or(|change| owner_lost(&change)) {
                            debug!("PackageKit left the bus during {}", path);
                            connection.invalidate_if_current(&conn);
                            break;
                        }
                    }
                }
            }
        });

        Ok(subscription.with_forwarder(forwarder))
    }

    async fn dispatch(&self, transaction: &TransactionPath, call: &TransactionCall) -> Result<()> {
        let conn = self.connection.ensure_connected().await?;
        let proxy = self.transaction(&conn, transaction).await?;
        match call {
            TransactionCall::RefreshCache { force } => proxy.refresh_cache(*force).await?,
            TransactionCall::Resolve { filter, names } => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                proxy.resolve(*filter, &names).await?
            }
            TransactionCall::InstallPackages { flags, ids } => {
                let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                proxy.install_packages(*flags, &ids).await?
            }
            TransactionCall::GetDetails { ids } => {
                let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                proxy.get_details(&ids).await?
            }
        }
        Ok(())
    }

    async fn cancel(&self, transaction: &TransactionPath) -> Result<()> {
        let conn = self.connection.ensure_connected().await?;
        self.transaction(&conn, transaction).await?.cancel().await?;
        Ok(())
    }

    fn invalidate(&self) {
        self.connection.invalidate();
    }
}

fn decode_signal(message: &Message) -> Option<TransactionSignal> {
    let header = message.header();
    let interface = header.interface()?.as_str();
    let member = header.member()?.as_str();
    let body = message.body();

    let signal = match (interface, member) {
        (TRANSACTION_INTERFACE, "Package") => {
            let (info, package_id, summary): (u32, String, String) = body.deserialize().ok()?;
            TransactionSignal::Package {
                info,
                package_id,
                summary,
            }
        }
        (TRANSACTION_INTERFACE, "Details") => {
            let data: HashMap<String, OwnedValue> = body.deserialize().ok()?;
            TransactionSignal::Details {
                package_id: data
                    .get("package-id")
                    .and_then(|v| value_str(v)),
                size: data.get("size").and_then(|v| value_u64(v)),
            }
        }
        (TRANSACTION_INTERFACE, "ErrorCode") => {
            let (code, details): (u32, String) = body.deserialize().ok()?;
            TransactionSignal::ErrorCode { code, details }
        }
        (TRANSACTION_INTERFACE, "Finished") => {
            let (exit, runtime_ms): (u32, u32) = body.deserialize().ok()?;
            TransactionSignal::Finished { exit, runtime_ms }
        }
        ("org.freedesktop.DBus.Properties", "PropertiesChanged") => {
            let (iface, changed, _): (String, HashMap<String, OwnedValue>, Vec<String>) =
                body.deserialize().ok()?;
            if iface != TRANSACTION_INTERFACE {
                return None;
            }
            TransactionSignal::PropertiesChanged(props_from_map(&changed))
        }
        _ => return None,
    };
    Some(signal)
}

fn props_from_map(changed: &HashMap<String, OwnedValue>) -> TransactionProps {
    TransactionProps {
        status: changed
            .get("Status")
            .and_then(|v| value_u64(v))
            .and_then(|n| u32::try_from(n).ok()),
        allow_cancel: changed
            .get("AllowCancel")
            .and_then(|v| value_bool(v)),
        percentage: changed
            .get("Percentage")
            .and_then(|v| value_u64(v))
            .and_then(|n| u32::try_from(n).ok()),
    }
}
