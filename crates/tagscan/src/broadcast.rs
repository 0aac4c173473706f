// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast channel: one producer, any number of independent subscribers.
//!
//! Every subscriber gets its own unbounded crossbeam channel and receives every
//! value published after it subscribed. A subscriber that drops its receiver is
//! pruned on the next publish, so the fan-out lives exactly as long as its
//! subscribers do. [`Broadcast::close`] completes every stream: receivers drain
//! what is queued and then observe disconnection.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// Multicast sender.
pub struct Broadcast<T> {
    /// `None` once closed.
    subscribers: Mutex<Option<Vec<Sender<T>>>>,
}

impl<T: Clone + Send> Broadcast<T> {
    /// Create an open broadcast with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Some(Vec::new())),
        }
    }

    /// Subscribe to values published from now on.
    ///
    /// Subscribing to a closed broadcast yields an already-completed receiver.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = channel::unbounded();
        if let Some(subs) = self.subscribers.lock().as_mut() {
            subs.push(tx);
        }
        rx
    }

    /// Deliver `value` to every live subscriber; returns how many received it.
    pub fn publish(&self, value: T) -> usize {
        let mut guard = self.subscribers.lock();
        let Some(subs) = guard.as_mut() else {
            return 0;
        };
        subs.retain(|tx| tx.send(value.clone()).is_ok());
        subs.len()
    }

    /// Complete every stream. Idempotent.
    pub fn close(&self) {
        self.subscribers.lock().take();
    }

    /// True once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.subscribers.lock().is_none()
    }

    /// Subscribers still attached (as of the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().as_ref().map_or(0, Vec::len)
    }
}

impl<T: Clone + Send> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}
