// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport status codes.
//!
//! `0` is success, `1` is pending, negative codes are errors. The numbering is
//! the one used by the device library and must not change.

use std::fmt;

/// Outcome of a transport operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    Pending,
    #[default]
    Ok,

    // Lifecycle
    Abort,
    Close,
    Create,
    MutexDestroy,
    MutexInit,
    MutexLock,
    MutexUnlock,
    Open,

    // Connection / configuration
    BadConfig,
    BadConnection,
    BadDevice,
    BadGateway,
    BadParam,
    BadReply,
    BadStatus,
    RemoteErr,
    Winsock,

    // Data
    BadData,
    Encode,
    NoData,
    NoMatch,
    Read,
    Write,
    Duplicate,
    NotFound,

    // Resources
    NoMem,
    NoResources,
    NullPtr,
    ThreadCreate,
    ThreadJoin,

    // Bounds / permissions
    NotAllowed,
    NotImplemented,
    OutOfBounds,
    TooLarge,
    TooSmall,
    Unsupported,

    // Time
    Timeout,

    /// Code outside the known taxonomy.
    Unknown(i32),
}

/// (status, code, description) table; single source for both directions.
const TABLE: &[(Status, i32, &str)] = &[
    (Status::Pending, 1, "Operation in progress"),
    (Status::Ok, 0, "No error"),
    (Status::Abort, -1, "Operation was aborted"),
    (Status::BadConfig, -2, "Bad configuration"),
    (Status::BadConnection, -3, "Connection failed"),
    (Status::BadData, -4, "Bad data received"),
    (Status::BadDevice, -5, "Unsupported or bad device"),
    (Status::BadGateway, -6, "Gateway unreachable or bad"),
    (Status::BadParam, -7, "Bad parameter"),
    (Status::BadReply, -8, "Bad reply from device"),
    (Status::BadStatus, -9, "Bad status from device"),
    (Status::Close, -10, "Error closing"),
    (Status::Create, -11, "Error creating"),
    (Status::Duplicate, -12, "Duplicate entry"),
    (Status::Encode, -13, "Error encoding"),
    (Status::MutexDestroy, -14, "Error destroying mutex"),
    (Status::MutexInit, -15, "Error initializing mutex"),
    (Status::MutexLock, -16, "Error locking mutex"),
    (Status::MutexUnlock, -17, "Error unlocking mutex"),
    (Status::NotAllowed, -18, "Operation not allowed"),
    (Status::NotFound, -19, "Not found"),
    (Status::NotImplemented, -20, "Not implemented"),
    (Status::NoData, -21, "No data"),
    (Status::NoMatch, -22, "No match"),
    (Status::NoMem, -23, "Out of memory"),
    (Status::NoResources, -24, "Out of resources"),
    (Status::NullPtr, -25, "Null pointer"),
    (Status::Open, -26, "Error opening"),
    (Status::OutOfBounds, -27, "Out of bounds"),
    (Status::Read, -28, "Error reading"),
    (Status::RemoteErr, -29, "Remote error"),
    (Status::ThreadCreate, -30, "Error creating thread"),
    (Status::ThreadJoin, -31, "Error joining thread"),
    (Status::Timeout, -32, "Timeout"),
    (Status::TooLarge, -33, "Too large"),
    (Status::TooSmall, -34, "Too small"),
    (Status::Unsupported, -35, "Unsupported"),
    (Status::Winsock, -36, "Socket error"),
    (Status::Write, -37, "Error writing"),
];

impl Status {
    /// Map a raw status code.
    pub fn from_code(code: i32) -> Self {
        TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(s, _, _)| *s)
            .unwrap_or(Status::Unknown(code))
    }

    /// Raw status code.
    pub fn code(self) -> i32 {
        match self {
            Status::Unknown(code) => code,
            s => TABLE
                .iter()
                .find(|(t, _, _)| *t == s)
                .map(|(_, c, _)| *c)
                .unwrap_or(i32::MIN),
        }
    }

    /// True for anything other than `Ok` and `Pending`.
    pub fn is_error(self) -> bool {
        !matches!(self, Status::Ok | Status::Pending)
    }

    /// True only for `Ok`.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Status::Unknown(_) => "Unknown status",
            s => TABLE
                .iter()
                .find(|(t, _, _)| *t == s)
                .map(|(_, _, d)| *d)
                .unwrap_or("Unknown status"),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status::from_code(code)
    }
}
