// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Observation handle.

use crate::error::{Error, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Stream of values produced by a worker thread.
///
/// Values arrive in order; `None` from [`recv`](Self::recv) means the stream
/// completed (its source was disposed). Dropping the view stops the worker and
/// waits for it.
pub struct View<T> {
    rx: Receiver<T>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> View<T> {
    /// Run `work` on a named thread. It gets the output sender and a stop
    /// receiver that disconnects when the view is dropped.
    pub(crate) fn spawn<F>(name: &str, work: F) -> Result<Self>
    where
        F: FnOnce(Sender<T>, Receiver<()>) + Send + 'static,
    {
        let (tx, rx) = channel::unbounded();
        let (stop_tx, stop_rx) = channel::bounded(0);
        let worker = thread::Builder::new()
            .name(format!("tagscan-view-{}", name))
            .spawn(move || work(tx, stop_rx))
            .map_err(|e| {
                log::error!("[view] failed to spawn {} worker: {}", name, e);
                Error::Io(e)
            })?;
        Ok(Self {
            rx,
            stop: Some(stop_tx),
            worker: Some(worker),
        })
    }

    /// View that yields `items` and completes.
    pub(crate) fn ready(items: impl IntoIterator<Item = T>) -> Self {
        let (tx, rx) = channel::unbounded();
        for item in items {
            let _ = tx.send(item);
        }
        Self {
            rx,
            stop: None,
            worker: None,
        }
    }
}

impl<T> View<T> {
    /// Next value, blocking. `None` once the stream completed.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Next value, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next value if one is queued.
    pub fn try_recv(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Blocking iterator over the remaining values.
    pub fn iter(&self) -> channel::Iter<'_, T> {
        self.rx.iter()
    }

    /// Queued values, without blocking.
    pub fn try_iter(&self) -> channel::TryIter<'_, T> {
        self.rx.try_iter()
    }

    /// Underlying receiver, for use with `crossbeam::select!`.
    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }
}

impl<T> Drop for View<T> {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl<T> std::fmt::Debug for View<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("queued", &self.rx.len())
            .field("live", &self.worker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_values_then_completion() {
        let view = View::spawn("count", |tx, _stop| {
            for i in 0..3 {
                tx.send(i).unwrap();
            }
        })
        .unwrap();
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(view.recv().is_none());
    }

    #[test]
    fn test_drop_stops_worker() {
        let view: View<u8> = View::spawn("idle", |_tx, stop| {
            let _ = stop.recv();
        })
        .unwrap();
        assert!(view.recv_timeout(Duration::from_millis(10)).is_none());
        drop(view);
    }

    #[test]
    fn test_ready_view() {
        let view = View::ready(vec!["a"]);
        assert_eq!(view.try_recv(), Some("a"));
        assert!(view.recv().is_none());
    }
}
