// src/connection.rs

//! Lazily opened system bus connection
//!
//! Each backend transport owns one [`ConnectionHandle`]. The connection is
//! opened on first use and forgotten by [`ConnectionHandle::invalidate`]
//! when the service drops off the bus or the caller's privileges change;
//! the next call reconnects. The lock is never held across the connect, so
//! two racing callers may each open a connection and the last one is kept.

use crate::error::Result;
use std::sync::{Arc, Mutex};
use tracing::debug;
use zbus::Connection;
use zbus::fdo::{DBusProxy, NameOwnerChanged, NameOwnerChangedStream};
use zbus::zvariant::Value;

/// Process-side handle to a system bus connection
///
/// Clones share the same slot, so a signal forwarder can drop the
/// connection its owner uses.
#[derive(Debug, Clone, Default)]
pub struct ConnectionHandle {
    address: Option<String>,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl ConnectionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to the bus at `address` instead of the system bus
    pub fn with_address(address: Option<String>) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Return the open connection, connecting if there is none
    pub async fn ensure_connected(&self) -> Result<Connection> {
        if let Some(conn) = self.cached() {
            return Ok(conn);
        }

        let conn = match &self.address {
            Some(address) => {
                debug!("Connecting to the bus at {}", address);
                zbus::connection::Builder::address(address.as_str())?
                    .build()
                    .await?
            }
            None => {
                debug!("Connecting to the system bus");
                Connection::system().await?
            }
        };
        if let Ok(mut slot) = self.conn.lock() {
            *slot = Some(conn.clone());
        }
        Ok(conn)
    }

    /// Forget the connection
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.conn.lock()
            && slot.take().is_some()
        {
            debug!("System bus connection invalidated");
        }
    }

    /// Forget the connection only if it is still `conn`
    pub fn invalidate_if_current(&self, conn: &Connection) {
        if let Ok(mut slot) = self.conn.lock()
            && slot
                .as_ref()
                .is_some_and(|current| current.unique_name() == conn.unique_name())
        {
            slot.take();
            debug!("System bus connection invalidated");
        }
    }

    /// True if a connection is currently cached
    pub fn is_connected(&self) -> bool {
        self.cached().is_some()
    }

    fn cached(&self) -> Option<Connection> {
        self.conn.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Subscribe to ownership changes of the well-known name `service`
pub(crate) async fn watch_owner(
    conn: &Connection,
    service: &str,
) -> Result<NameOwnerChangedStream<'static>> {
    let dbus = DBusProxy::new(conn).await?;
    Ok(dbus.receive_name_owner_changed_with_args(&[(0, service)]).await?)
}

/// True if the change means the service left the bus
pub(crate) fn owner_lost(change: &NameOwnerChanged) -> bool {
    change
        .args()
        .is_ok_and(|args| args.new_owner().is_none())
}

/// Read an unsigned integer out of a variant, whatever its width
pub(crate) fn value_u64(value: &Value<'_>) -> Option<u64> {
    match value {
        Value::U8(n) => Some(u64::from(*n)),
        Value::U16(n) => Some(u64::from(*n)),
        Value::U32(n) => Some(u64::from(*n)),
        Value::U64(n) => Some(*n),
        Value::I16(n) => u64::try_from(*n).ok(),
        Value::I32(n) => u64::try_from(*n).ok(),
        Value::I64(n) => u64::try_from(*n).ok(),
        Value::Value(inner) => value_u64(inner),
        _ => None,
    }
}

/// Read a signed integer out of a variant
pub(crate) fn value_i64(value: &Value<'_>) -> Option<i64> {
    match value {
        Value::I64(n) => Some(*n),
        Value::I32(n) => Some(i64::from(*n)),
        Value::I16(n) => Some(i64::from(*n)),
        Value::U32(n) => Some(i64::from(*n)),
        Value::U64(n) => i64::try_from(*n).ok(),
        Value::Value(inner) => value_i64(inner),
        _ => None,
    }
}

pub(crate) fn value_bool(value: &Value<'_>) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Value(inner) => value_bool(inner),
        _ => None,
    }
}

pub(crate) fn value_str(value: &Value<'_>) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.as_str().to_string()),
        Value::ObjectPath(p) => Some(p.as_str().to_string()),
        Value::Value(inner) => value_str(inner),
        _ => None,
    }
}
