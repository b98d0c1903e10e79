// src/packagekit/enums.rs

//! PackageKit enum values used on the wire

/// `PkExitEnum`
pub const EXIT_SUCCESS: u32 = 1;
pub const EXIT_FAILED: u32 = 2;
pub const EXIT_CANCELLED: u32 = 3;

/// `PkStatusEnum` values that mean "waiting on something else"
pub const STATUS_WAIT: u32 = 1;
pub const STATUS_WAITING_FOR_LOCK: u32 = 30;

/// `PkFilterEnum` bits
pub const FILTER_NEWEST: u64 = 1 << 16;
pub const FILTER_ARCH: u64 = 1 << 18;
pub const FILTER_NOT_SOURCE: u64 = 1 << 21;

/// Filter used for every resolve: native arch, no source packages, newest only
pub const RESOLVE_FILTER: u64 = FILTER_ARCH | FILTER_NOT_SOURCE | FILTER_NEWEST;

/// `PkTransactionFlagEnum` bits
pub const TRANSACTION_FLAG_NONE: u64 = 0;
pub const TRANSACTION_FLAG_SIMULATE: u64 = 1 << 2;

/// `PkInfoEnum` values reported by a simulated install
pub const INFO_UPDATING: u32 = 11;
pub const INFO_INSTALLING: u32 = 12;
pub const INFO_REMOVING: u32 = 13;

/// True for statuses that mean the transaction is queued behind another
pub fn is_wait_status(status: u32) -> bool {
    matches!(status, STATUS_WAIT | STATUS_WAITING_FOR_LOCK)
}
