// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scan groups.
//!
//! A [`ScanGroup`] owns tags polled on a shared interval by a dedicated timer
//! thread. The thread ticks immediately at creation, then every `interval`:
//!
//! ```text
//! tick --enabled?--no--> (idle)
//!        |
//!        yes --try_lock(scan)--busy--> skipped
//!                 |
//!                 read every tag in order --> publish batch
//! ```
//!
//! Device failures never stop the timer. They are reported as error statuses
//! in the batch and retried on the next tick. Ticks missed while a scan runs
//! long are skipped, not queued.

use crate::broadcast::Broadcast;
use crate::config::SharedSettings;
use crate::error::{Error, Result};
use crate::result::OperationResult;
use crate::tag::Tag;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Group used when none is named.
pub const DEFAULT_GROUP: &str = "Default";

struct GroupState {
    name: Arc<str>,
    interval: Duration,
    settings: SharedSettings,
    enabled: AtomicBool,
    tags: RwLock<Vec<Arc<Tag>>>,
    /// Held for the duration of one scan.
    scan_lock: Mutex<()>,
    batches: Broadcast<Vec<OperationResult>>,
    scans: AtomicU64,
    skipped: AtomicU64,
}

impl GroupState {
    fn snapshot(&self) -> Vec<Arc<Tag>> {
        self.tags.read().clone()
    }

    /// One timer tick. `None` when disabled or when a scan is already running.
    fn tick(&self) -> Option<Vec<OperationResult>> {
        if !self.enabled.load(Ordering::Acquire) {
            return None;
        }
        let Some(_scan) = self.scan_lock.try_lock() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            log::debug!("[scan] {} still scanning, tick skipped", self.name);
            return None;
        };

        let mut batch = Vec::new();
        for tag in self.snapshot() {
            match tag.read_unchecked() {
                Ok(result) => {
                    if result.is_error() {
                        log::warn!(
                            "[scan] {} read {} failed: {}",
                            self.name,
                            tag.variable(),
                            result.status()
                        );
                    }
                    batch.push(result);
                }
                // Removed while the scan was running.
                Err(Error::Disposed(_)) => {}
                Err(e) => log::warn!("[scan] {} read {}: {}", self.name, tag.variable(), e),
            }
        }
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.batches.publish(batch.clone());
        Some(batch)
    }
}

/// Collect bulk results, dropping tags disposed since the snapshot was taken.
fn live_results(
    results: impl Iterator<Item = Result<OperationResult>>,
) -> Result<Vec<OperationResult>> {
    let mut out = Vec::new();
    for result in results {
        match result {
            Ok(result) => out.push(result),
            Err(Error::Disposed(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

struct ScanTimer {
    /// Dropping the sender stops the thread.
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ScanTimer {
    fn spawn(state: Arc<GroupState>) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let name = format!("tagscan-scan-{}", state.name);
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || scan_loop(&state, &stop_rx))
            .map_err(|e| {
                log::error!("[scan] failed to spawn timer thread: {}", e);
                Error::Io(e)
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn stop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ScanTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn scan_loop(state: &GroupState, stop: &Receiver<()>) {
    log::debug!(
        "[scan] timer for {} started (interval={:?})",
        state.name,
        state.interval
    );
    let mut next = Instant::now();
    loop {
        state.tick();

        next += state.interval;
        let now = Instant::now();
        while next <= now {
            next += state.interval;
            state.skipped.fetch_add(1, Ordering::Relaxed);
        }

        match stop.recv_timeout(next - now) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    log::debug!("[scan] timer for {} stopped", state.name);
}

/// Raise the first failed result when the settings ask for it.
pub(crate) fn raise_first_error(
    settings: &SharedSettings,
    results: Vec<OperationResult>,
) -> Result<Vec<OperationResult>> {
    if settings.get().fail_operation_raises_error {
        if let Some(failed) = results.iter().find(|r| r.is_error()) {
            return Err(Error::Operation(failed.clone()));
        }
    }
    Ok(results)
}

/// Named set of tags polled together.
pub struct ScanGroup {
    state: Arc<GroupState>,
    timer: Mutex<Option<ScanTimer>>,
    disposed: AtomicBool,
}

impl ScanGroup {
    /// Create an enabled group and start its timer.
    pub fn new(name: &str, interval: Duration, settings: SharedSettings) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::Config("group name is empty".into()));
        }
        if interval.is_zero() {
            return Err(Error::Config(format!("scan interval of {} is zero", name)));
        }
        let state = Arc::new(GroupState {
            name: Arc::from(name),
            interval,
            settings,
            enabled: AtomicBool::new(true),
            tags: RwLock::new(Vec::new()),
            scan_lock: Mutex::new(()),
            batches: Broadcast::new(),
            scans: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });
        let timer = ScanTimer::spawn(Arc::clone(&state))?;
        log::debug!("[scan] group {} created", name);
        Ok(Self {
            state,
            timer: Mutex::new(Some(timer)),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn interval(&self) -> Duration {
        self.state.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable periodic scanning. Manual reads and writes still work.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::Release);
    }

    /// Add a tag, replacing any tag registered under the same variable.
    ///
    /// Returns the replaced tag.
    pub fn add_tag(&self, tag: Arc<Tag>) -> Result<Option<Arc<Tag>>> {
        self.ensure_live()?;
        let mut tags = self.state.tags.write();
        if let Some(slot) = tags.iter_mut().find(|t| t.variable() == tag.variable()) {
            return Ok(Some(std::mem::replace(slot, tag)));
        }
        tags.push(tag);
        Ok(None)
    }

    /// Detach a tag. It is released once no other owner holds it.
    pub fn remove_tag(&self, variable: &str) -> Option<Arc<Tag>> {
        let mut tags = self.state.tags.write();
        let pos = tags.iter().position(|t| t.variable() == variable)?;
        Some(tags.remove(pos))
    }

    /// Member tags in insertion order.
    pub fn tags(&self) -> Vec<Arc<Tag>> {
        self.state.snapshot()
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.state.tags.read().iter().any(|t| t.variable() == variable)
    }

    pub fn len(&self) -> usize {
        self.state.tags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read every tag now, in insertion order.
    ///
    /// A device failure on one tag does not stop the others. With
    /// `fail_operation_raises_error` set, the first failed result is raised
    /// after all tags have been read.
    pub fn read(&self) -> Result<Vec<OperationResult>> {
        let results = self.read_results()?;
        self.raise_first_error(results)
    }

    /// Write every writable tag now, in insertion order.
    ///
    /// Read-only tags are skipped. Failure handling follows [`read`](Self::read).
    pub fn write(&self) -> Result<Vec<OperationResult>> {
        let results = self.write_results()?;
        self.raise_first_error(results)
    }

    pub(crate) fn read_results(&self) -> Result<Vec<OperationResult>> {
        self.ensure_live()?;
        live_results(self.state.snapshot().iter().map(|tag| tag.read_unchecked()))
    }

    pub(crate) fn write_results(&self) -> Result<Vec<OperationResult>> {
        self.ensure_live()?;
        live_results(
            self.state
                .snapshot()
                .iter()
                .filter(|tag| !tag.is_read_only())
                .map(|tag| tag.write_unchecked()),
        )
    }

    /// Run one scan on the calling thread, as the timer would.
    ///
    /// Returns `None` when scanning is disabled or another scan is running.
    pub fn scan_now(&self) -> Option<Vec<OperationResult>> {
        if self.is_disposed() {
            return None;
        }
        self.state.tick()
    }

    /// Batch results of every scan from now on.
    pub fn subscribe_batches(&self) -> Receiver<Vec<OperationResult>> {
        self.state.batches.subscribe()
    }

    /// Completed scans.
    pub fn scan_count(&self) -> u64 {
        self.state.scans.load(Ordering::Relaxed)
    }

    /// Ticks skipped because a scan was still running.
    pub fn skipped_count(&self) -> u64 {
        self.state.skipped.load(Ordering::Relaxed)
    }

    /// Stop the timer, complete the batch stream and release member tags.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut timer) = self.timer.lock().take() {
            timer.stop();
        }
        self.state.batches.close();
        let released = std::mem::take(&mut *self.state.tags.write());
        log::debug!(
            "[scan] group {} disposed ({} tags released)",
            self.state.name,
            released.len()
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed(format!("Group {}", self.state.name)));
        }
        Ok(())
    }

    fn raise_first_error(&self, results: Vec<OperationResult>) -> Result<Vec<OperationResult>> {
        raise_first_error(&self.state.settings, results)
    }
}

impl Drop for ScanGroup {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ScanGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanGroup")
            .field("name", &self.name())
            .field("interval", &self.interval())
            .field("enabled", &self.is_enabled())
            .field("tags", &self.len())
            .finish()
    }
}
