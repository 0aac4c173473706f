// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Following the change streams of a changing set of tags.
//!
//! A [`Follower`] subscribes to the registry's structural events and to the
//! change stream of every tag matching its [`Filter`]. Tags registered later
//! are picked up from `TagAdded` events; a tag stream that completes is
//! re-resolved through the registry, so a re-created tag is followed again.
//! Each newly followed tag first yields its current value ([`Input::Current`]).

use crate::codec::TagValue;
use crate::registry::{Registry, RegistryEvent};
use crate::tag::{Tag, TagChange};
use crossbeam::channel::{Receiver, RecvError, Select};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Which tags to follow.
#[derive(Debug, Clone)]
pub(crate) enum Filter {
    Variables(HashSet<String>),
    Group(String),
    All,
}

impl Filter {
    fn matches(&self, variable: &str, group: &str) -> bool {
        match self {
            Filter::Variables(vars) => vars.contains(variable),
            Filter::Group(name) => name == group,
            Filter::All => true,
        }
    }
}

/// What woke the follower.
#[derive(Debug)]
pub(crate) enum Input {
    /// The owning view was dropped.
    Stop,
    /// A tag is now followed; this is its value at subscription time.
    Current { variable: Arc<str>, value: TagValue },
    /// A followed tag published a change.
    Change(TagChange),
    /// The caller-supplied ticker fired.
    Tick,
    /// Nothing left to follow: the registry is gone and no tag stream is open.
    Closed,
}

enum Raw {
    Stop,
    Tick,
    Event(Result<RegistryEvent, RecvError>),
    Change(usize, Result<TagChange, RecvError>),
}

pub(crate) struct Follower {
    filter: Filter,
    registry: Weak<Registry>,
    events: Option<Receiver<RegistryEvent>>,
    streams: Vec<(Arc<str>, Receiver<TagChange>)>,
    pending: VecDeque<Input>,
}

impl Follower {
    /// Subscribe on the calling thread, so nothing registered after this
    /// returns can be missed.
    pub(crate) fn new(registry: &Arc<Registry>, filter: Filter) -> Self {
        let (tags, events) = registry.watch();
        let mut follower = Self {
            filter,
            registry: Arc::downgrade(registry),
            events: Some(events),
            streams: Vec::new(),
            pending: VecDeque::new(),
        };
        for tag in tags {
            if follower.filter.matches(tag.variable(), tag.group()) {
                follower.follow(&tag);
            }
        }
        follower
    }

    /// Block until something happens.
    pub(crate) fn next(&mut self, stop: &Receiver<()>, ticker: Option<&Receiver<Instant>>) -> Input {
        loop {
            if let Some(input) = self.pending.pop_front() {
                return input;
            }
            if self.events.is_none() && self.streams.is_empty() && ticker.is_none() {
                return Input::Closed;
            }

            match self.wait(stop, ticker) {
                Raw::Stop => return Input::Stop,
                Raw::Tick => return Input::Tick,
                Raw::Event(Ok(event)) => self.on_event(event),
                Raw::Event(Err(_)) => {
                    log::debug!("[follow] registry event stream closed");
                    self.events = None;
                }
                Raw::Change(_, Ok(change)) => return Input::Change(change),
                Raw::Change(index, Err(_)) => {
                    let (variable, _) = self.streams.remove(index);
                    self.resubscribe(&variable);
                }
            }
        }
    }

    fn wait(&self, stop: &Receiver<()>, ticker: Option<&Receiver<Instant>>) -> Raw {
        let mut sel = Select::new();
        let stop_idx = sel.recv(stop);
        let tick_idx = ticker.map(|rx| sel.recv(rx));
        let event_idx = self.events.as_ref().map(|rx| sel.recv(rx));
        let stream_idx: Vec<usize> = self.streams.iter().map(|(_, rx)| sel.recv(rx)).collect();

        let oper = sel.select();
        let index = oper.index();
        if index == stop_idx {
            let _ = oper.recv(stop);
            return Raw::Stop;
        }
        if let (Some(i), Some(rx)) = (tick_idx, ticker) {
            if index == i {
                let _ = oper.recv(rx);
                return Raw::Tick;
            }
        }
        if let (Some(i), Some(rx)) = (event_idx, self.events.as_ref()) {
            if index == i {
                return Raw::Event(oper.recv(rx));
            }
        }
        match stream_idx.iter().position(|&i| i == index) {
            Some(pos) => Raw::Change(pos, oper.recv(&self.streams[pos].1)),
            // Every registered operation is handled above.
            None => Raw::Stop,
        }
    }

    fn on_event(&mut self, event: RegistryEvent) {
        if !self.filter.matches(event.variable(), event.group()) {
            return;
        }
        match &event {
            RegistryEvent::TagAdded { .. } => {
                if let Some(tag) = event.tag() {
                    self.follow(&tag);
                }
            }
            RegistryEvent::TagRemoved { variable, .. } => {
                self.streams.retain(|(v, _)| v != variable);
            }
        }
    }

    fn follow(&mut self, tag: &Arc<Tag>) {
        if tag.is_disposed() {
            return;
        }
        let variable: Arc<str> = Arc::from(tag.variable());
        let (value, rx) = tag.watch();
        self.streams.retain(|(v, _)| *v != variable);
        self.streams.push((Arc::clone(&variable), rx));
        self.pending.push_back(Input::Current { variable, value });
    }

    fn resubscribe(&mut self, variable: &str) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Some(tag) = registry.get_tag(variable) {
            if self.filter.matches(tag.variable(), tag.group()) {
                log::debug!("[follow] resubscribing to {}", variable);
                self.follow(&tag);
            }
        }
    }
}
