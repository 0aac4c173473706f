// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tag namespace and bulk operations.
//!
//! The [`Registry`] keeps two indices behind one mutation lock:
//!
//! - variable -> [`Tag`] (O(1) lookup, last registration wins)
//! - group name -> [`ScanGroup`] (groups are created lazily on first use)
//!
//! Critical sections only touch the indices. Device I/O, handle release and
//! group shutdown always run after the lock is released, on a snapshot taken
//! under it. Structural changes are announced as [`RegistryEvent`]s, also
//! after the lock is released, so observers never see a half-updated index.

use crate::broadcast::Broadcast;
use crate::codec::TagData;
use crate::config::{RegistryConfig, Settings, SharedSettings};
use crate::error::{check_variable, Error, Result};
use crate::group::{raise_first_error, ScanGroup};
use crate::probe::{self, CancelToken, Probe, TcpProbe};
use crate::result::{reduce, OperationResult};
use crate::tag::{Tag, TagDescriptor};
use crate::transport::TagTransport;
use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

/// Structural change of the registry.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A tag was registered (or re-registered).
    TagAdded {
        variable: Arc<str>,
        group: Arc<str>,
        /// Weak so unread events never keep a tag alive.
        tag: Weak<Tag>,
    },
    /// A tag left the registry.
    TagRemoved { variable: Arc<str>, group: Arc<str> },
}

impl RegistryEvent {
    pub fn variable(&self) -> &str {
        match self {
            RegistryEvent::TagAdded { variable, .. } | RegistryEvent::TagRemoved { variable, .. } => {
                variable
            }
        }
    }

    pub fn group(&self) -> &str {
        match self {
            RegistryEvent::TagAdded { group, .. } | RegistryEvent::TagRemoved { group, .. } => group,
        }
    }

    /// The added tag, if it is still alive.
    pub fn tag(&self) -> Option<Arc<Tag>> {
        match self {
            RegistryEvent::TagAdded { tag, .. } => tag.upgrade(),
            RegistryEvent::TagRemoved { .. } => None,
        }
    }

    fn added(tag: &Arc<Tag>) -> Self {
        RegistryEvent::TagAdded {
            variable: Arc::from(tag.variable()),
            group: Arc::from(tag.group()),
            tag: Arc::downgrade(tag),
        }
    }

    fn removed(tag: &Tag) -> Self {
        RegistryEvent::TagRemoved {
            variable: Arc::from(tag.variable()),
            group: Arc::from(tag.group()),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    tags: HashMap<String, Arc<Tag>>,
    groups: HashMap<String, Arc<ScanGroup>>,
    /// Group names in creation order.
    order: Vec<String>,
    /// Derived from `groups` + `order`; reset on every structural change.
    flattened: Option<Vec<Arc<ScanGroup>>>,
    probe: Option<Arc<dyn Probe>>,
}

impl RegistryState {
    fn invalidate(&mut self) {
        self.flattened = None;
    }

    fn flattened(&mut self) -> Vec<Arc<ScanGroup>> {
        if self.flattened.is_none() {
            let groups = self
                .order
                .iter()
                .filter_map(|name| self.groups.get(name).cloned())
                .collect();
            self.flattened = Some(groups);
        }
        self.flattened.clone().unwrap_or_default()
    }
}

/// Owner of every tag and scan group of one device session.
pub struct Registry {
    config: RegistryConfig,
    settings: SharedSettings,
    transport: Arc<dyn TagTransport>,
    state: Mutex<RegistryState>,
    events: Broadcast<RegistryEvent>,
    disposed: AtomicBool,
}

impl Registry {
    /// Create an empty registry. The configuration is validated first.
    pub fn new(config: RegistryConfig, transport: Arc<dyn TagTransport>) -> Result<Self> {
        config.validate()?;
        let settings = SharedSettings::new(config.settings());
        log::debug!(
            "[registry] created for {} (cpu={})",
            config.gateway,
            config.cpu
        );
        Ok(Self {
            config,
            settings,
            transport,
            state: Mutex::new(RegistryState::default()),
            events: Broadcast::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// Use `probe` instead of the default TCP probe.
    pub fn with_probe(self, probe: Arc<dyn Probe>) -> Self {
        self.state.lock().probe = Some(probe);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Current runtime settings.
    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    /// Replace the runtime settings. Live tags see the change on their next
    /// operation.
    pub fn set_settings(&self, settings: Settings) {
        self.settings.set(settings);
    }

    /// Modify the runtime settings in place.
    pub fn update_settings<F: Fn(&mut Settings)>(&self, f: F) {
        self.settings.update(f);
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a scalar tag of type `T`.
    ///
    /// The group is created with `scan_interval` if it does not exist yet; an
    /// existing group keeps its own interval. Registering a variable again
    /// replaces the previous tag.
    pub fn add_tag<T: TagData>(
        &self,
        variable: &str,
        tag_name: &str,
        scan_interval: Duration,
        group: &str,
    ) -> Result<Arc<Tag>> {
        let descriptor = TagDescriptor::of::<T>(variable, tag_name)?.in_group(group);
        self.add_tag_with(descriptor, scan_interval)
    }

    /// Register a tag scanned at the configured `default_scan_interval_ms`.
    pub fn add_tag_default<T: TagData>(
        &self,
        variable: &str,
        tag_name: &str,
        group: &str,
    ) -> Result<Arc<Tag>> {
        self.add_tag::<T>(variable, tag_name, self.config.default_scan_interval(), group)
    }

    /// Register an array tag of `count` elements of type `T`.
    pub fn add_array_tag<T: TagData>(
        &self,
        variable: &str,
        tag_name: &str,
        count: usize,
        scan_interval: Duration,
        group: &str,
    ) -> Result<Arc<Tag>> {
        let descriptor = TagDescriptor::array_of::<T>(variable, tag_name, count)?.in_group(group);
        self.add_tag_with(descriptor, scan_interval)
    }

    /// Register a tag from a full descriptor.
    pub fn add_tag_with(&self, descriptor: TagDescriptor, scan_interval: Duration) -> Result<Arc<Tag>> {
        self.ensure_live()?;
        let tag = Arc::new(Tag::create(
            descriptor,
            Arc::clone(&self.transport),
            &self.config,
            self.settings.clone(),
        )?);

        let replaced = {
            let mut state = self.state.lock();
            let group = match state.groups.get(tag.group()) {
                Some(group) => {
                    if group.interval() != scan_interval {
                        log::debug!(
                            "[registry] group {} keeps interval {:?} (requested {:?})",
                            group.name(),
                            group.interval(),
                            scan_interval
                        );
                    }
                    Arc::clone(group)
                }
                None => {
                    let group = Arc::new(ScanGroup::new(
                        tag.group(),
                        scan_interval,
                        self.settings.clone(),
                    )?);
                    state.groups.insert(tag.group().to_string(), Arc::clone(&group));
                    state.order.push(tag.group().to_string());
                    group
                }
            };

            let replaced = state.tags.insert(tag.variable().to_string(), Arc::clone(&tag));
            if let Some(old) = &replaced {
                if old.group() != tag.group() {
                    if let Some(old_group) = state.groups.get(old.group()) {
                        old_group.remove_tag(old.variable());
                    }
                }
            }
            group.add_tag(Arc::clone(&tag))?;
            state.invalidate();
            replaced
        };

        if let Some(old) = replaced {
            self.events.publish(RegistryEvent::removed(&old));
        }
        self.events.publish(RegistryEvent::added(&tag));
        log::debug!(
            "[registry] added {} -> {} in {}",
            tag.variable(),
            tag.tag_name(),
            tag.group()
        );
        Ok(tag)
    }

    /// Tag registered under `variable`.
    pub fn get_tag(&self, variable: &str) -> Option<Arc<Tag>> {
        let state = self.state.lock();
        if let Some(tag) = state.tags.get(variable) {
            return Some(Arc::clone(tag));
        }
        // The index is authoritative; this only matters if it ever went stale.
        let found = state
            .groups
            .values()
            .flat_map(|g| g.tags())
            .find(|t| t.variable() == variable);
        if found.is_some() {
            log::warn!("[registry] {} found in a group but not in the index", variable);
        }
        found
    }

    /// Tag registered under `variable`, or `UnknownVariable`.
    pub fn tag(&self, variable: &str) -> Result<Arc<Tag>> {
        check_variable(variable)?;
        self.get_tag(variable)
            .ok_or_else(|| Error::UnknownVariable(variable.to_string()))
    }

    /// Unregister one tag. Returns false if the variable is unknown.
    pub fn remove_tag(&self, variable: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let Some(tag) = state.tags.remove(variable) else {
                return false;
            };
            if let Some(group) = state.groups.get(tag.group()) {
                group.remove_tag(variable);
            }
            state.invalidate();
            tag
        };
        self.events.publish(RegistryEvent::removed(&removed));
        log::debug!("[registry] removed {}", variable);
        true
    }

    /// Remove a group and every tag in it. Returns false if the group is unknown.
    pub fn remove_group(&self, name: &str) -> bool {
        let (group, removed) = {
            let mut state = self.state.lock();
            let Some(group) = state.groups.remove(name) else {
                return false;
            };
            state.order.retain(|n| n != name);

            let mut removed = Vec::new();
            for tag in group.tags() {
                let indexed = state
                    .tags
                    .get(tag.variable())
                    .is_some_and(|t| Arc::ptr_eq(t, &tag));
                if indexed {
                    state.tags.remove(tag.variable());
                    removed.push(tag);
                }
            }
            state.invalidate();
            (group, removed)
        };

        for tag in &removed {
            self.events.publish(RegistryEvent::removed(tag));
        }
        group.dispose();
        log::debug!(
            "[registry] removed group {} ({} tags)",
            name,
            removed.len()
        );
        true
    }

    /// Groups in creation order.
    pub fn groups(&self) -> Vec<Arc<ScanGroup>> {
        self.state.lock().flattened()
    }

    pub fn group(&self, name: &str) -> Option<Arc<ScanGroup>> {
        self.state.lock().groups.get(name).cloned()
    }

    /// Registered variables, sorted.
    pub fn variables(&self) -> Vec<String> {
        let mut vars: Vec<_> = self.state.lock().tags.keys().cloned().collect();
        vars.sort();
        vars
    }

    /// Every registered tag.
    pub fn tags(&self) -> Vec<Arc<Tag>> {
        self.state.lock().tags.values().cloned().collect()
    }

    /// Structural changes from now on.
    pub fn subscribe(&self) -> Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Every registered tag plus every later change, with no gap in between.
    pub(crate) fn watch(&self) -> (Vec<Arc<Tag>>, Receiver<RegistryEvent>) {
        let state = self.state.lock();
        let events = self.events.subscribe();
        (state.tags.values().cloned().collect(), events)
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Read every tag, group by group.
    ///
    /// Device failures are collected, never short-circuited. With
    /// `fail_operation_raises_error` set, the first failure is raised once
    /// every tag has been read.
    pub fn read_all(&self) -> Result<Vec<OperationResult>> {
        self.ensure_live()?;
        let mut results = Vec::new();
        for group in self.groups() {
            match group.read_results() {
                Ok(batch) => results.extend(batch),
                // Removed after the group list was taken.
                Err(Error::Disposed(_)) => {}
                Err(e) => return Err(e),
            }
        }
        raise_first_error(&self.settings, results)
    }

    /// Write every writable tag, group by group. See [`read_all`](Self::read_all).
    pub fn write_all(&self) -> Result<Vec<OperationResult>> {
        self.ensure_live()?;
        let mut results = Vec::new();
        for group in self.groups() {
            match group.write_results() {
                Ok(batch) => results.extend(batch),
                // Removed after the group list was taken.
                Err(Error::Disposed(_)) => {}
                Err(e) => return Err(e),
            }
        }
        raise_first_error(&self.settings, results)
    }

    /// [`read_all`](Self::read_all) folded with [`reduce`].
    pub fn read_all_reduced(&self) -> Result<Option<OperationResult>> {
        Ok(reduce(&self.read_all()?))
    }

    /// [`write_all`](Self::write_all) folded with [`reduce`].
    pub fn write_all_reduced(&self) -> Result<Option<OperationResult>> {
        Ok(reduce(&self.write_all()?))
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    fn probe(&self) -> Arc<dyn Probe> {
        let mut state = self.state.lock();
        let probe = state
            .probe
            .get_or_insert_with(|| Arc::new(TcpProbe::new(&self.config.gateway)) as Arc<dyn Probe>);
        Arc::clone(probe)
    }

    /// Check that the device is reachable. `echo` logs the outcome.
    pub fn ping(&self, echo: bool) -> bool {
        let probe = self.probe();
        probe::run(probe.as_ref(), self.settings.get().timeout, echo)
    }

    /// Probe on a background thread.
    ///
    /// The returned channel yields exactly one value. `cancel` is checked
    /// before and after the probe; a cancelled probe yields
    /// `Err(Error::Cancelled)`.
    pub fn ping_async(&self, echo: bool, cancel: CancelToken) -> Result<Receiver<Result<bool>>> {
        let probe = self.probe();
        let timeout = self.settings.get().timeout;
        let (tx, rx) = channel::bounded(1);
        thread::Builder::new()
            .name("tagscan-ping".into())
            .spawn(move || {
                let outcome = if cancel.is_cancelled() {
                    Err(Error::Cancelled)
                } else {
                    let reachable = probe::run(probe.as_ref(), timeout, echo);
                    if cancel.is_cancelled() {
                        Err(Error::Cancelled)
                    } else {
                        Ok(reachable)
                    }
                };
                let _ = tx.send(outcome);
            })
            .map_err(|e| {
                log::error!("[registry] failed to spawn ping thread: {}", e);
                Error::Io(e)
            })?;
        Ok(rx)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Dispose every group, clear both indices and complete the event stream.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (groups, tags) = {
            let mut state = self.state.lock();
            let groups = state.flattened();
            state.groups.clear();
            state.order.clear();
            state.invalidate();
            state.probe = None;
            (groups, std::mem::take(&mut state.tags))
        };
        for tag in tags.values() {
            self.events.publish(RegistryEvent::removed(tag));
        }
        for group in &groups {
            group.dispose();
        }
        self.events.close();
        log::debug!(
            "[registry] disposed ({} groups, {} tags)",
            groups.len(),
            tags.len()
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed("Registry".into()));
        }
        Ok(())
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Registry")
            .field("gateway", &self.config.gateway)
            .field("tags", &state.tags.len())
            .field("groups", &state.order)
            .finish()
    }
}
