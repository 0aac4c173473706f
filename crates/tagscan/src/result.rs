// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outcome of a device read or write.

use crate::error::{Error, Result};
use crate::transport::Status;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Immutable record of one device operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    variable: Arc<str>,
    tag_name: Arc<str>,
    timestamp: SystemTime,
    elapsed: Duration,
    status: Status,
}

impl OperationResult {
    /// Create a new result.
    pub fn new(
        variable: Arc<str>,
        tag_name: Arc<str>,
        timestamp: SystemTime,
        elapsed: Duration,
        status: Status,
    ) -> Self {
        Self {
            variable,
            tag_name,
            timestamp,
            elapsed,
            status,
        }
    }

    /// Variable of the tag the operation ran on.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Device-side tag name.
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Wall-clock time the operation started.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Time spent in the transport.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Transport status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// True when the status is an error.
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Turn an error status into `Err(Error::Operation)` when `raise` is set.
    ///
    /// This is the only place a device outcome becomes a Rust error.
    pub fn into_result(self, raise: bool) -> Result<Self> {
        if raise && self.is_error() {
            return Err(Error::Operation(self));
        }
        Ok(self)
    }
}

/// Fold many results into one.
///
/// - tag reference: first result
/// - timestamp: earliest
/// - elapsed: sum
/// - status: most negative error code; else `Pending` if any; else `Ok`
///
/// Returns `None` for an empty input.
pub fn reduce<'a, I>(results: I) -> Option<OperationResult>
where
    I: IntoIterator<Item = &'a OperationResult>,
{
    let mut iter = results.into_iter();
    let first = iter.next()?;
    let mut acc = first.clone();
    for r in iter {
        acc.timestamp = acc.timestamp.min(r.timestamp);
        acc.elapsed += r.elapsed;
        acc.status = worst(acc.status, r.status);
    }
    Some(acc)
}

fn worst(a: Status, b: Status) -> Status {
    match (a.is_error(), b.is_error()) {
        (true, true) => {
            if b.code() < a.code() {
                b
            } else {
                a
            }
        }
        (true, false) => a,
        (false, true) => b,
        (false, false) => {
            if a == Status::Pending || b == Status::Pending {
                Status::Pending
            } else {
                Status::Ok
            }
        }
    }
}
