// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use dashmap::DashMap;
use meridian_core::Token;
use std::sync::Arc;
use tracing::trace;

/// Notified when a write durably changes a scope this listener previously
/// registered interest in. An [`crate::AtomicOperation`] implements this for
/// itself (marking itself conflicted); a [`crate::Transaction`] implements it
/// to route a notification to whichever nested child registered the token,
/// or to its own underlying atomic operation otherwise.
pub trait VersionChangeListener: Send + Sync {
    fn on_version_change(&self, token: &Token);
}

/// Capability to subscribe/unsubscribe a [`VersionChangeListener`] for a
/// [`Token`]. Implemented by [`crate::Engine`] (the top-level parent) and by
/// [`crate::Transaction`] (the parent nested atomic operations register
/// against).
pub trait VersionRegistry: Send + Sync {
    fn add_version_change_listener(&self, token: Token, listener: Arc<dyn VersionChangeListener>);
    fn remove_version_change_listener(&self, token: &Token, listener: &Arc<dyn VersionChangeListener>);

    /// Notifies every listener currently registered for `token`. Called
    /// once per implied scope of every write a commit drains into the
    /// parent (see `crate::atomic::implied_tokens`).
    fn notify_version_change(&self, token: &Token);
}

fn listener_id(listener: &Arc<dyn VersionChangeListener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

/// A plain `Token -> {listeners}` table, shared by every [`VersionRegistry`]
/// implementation in this crate so the subscribe/notify bookkeeping is
/// written once.
#[derive(Default)]
pub struct ListenerTable {
    subscribers: DashMap<Token, Vec<(usize, Arc<dyn VersionChangeListener>)>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, token: Token, listener: Arc<dyn VersionChangeListener>) {
        let id = listener_id(&listener);
        let mut entry = self.subscribers.entry(token).or_default();
        if !entry.iter().any(|(existing, _)| *existing == id) {
            entry.push((id, listener));
        }
    }

    pub fn remove(&self, token: &Token, listener: &Arc<dyn VersionChangeListener>) {
        let id = listener_id(listener);
        if let Some(mut entry) = self.subscribers.get_mut(token) {
            entry.retain(|(existing, _)| *existing != id);
            if entry.is_empty() {
                drop(entry);
                self.subscribers.remove(token);
            }
        }
    }

    /// Notifies and leaves the subscriber list intact -- a listener must
    /// unsubscribe itself explicitly (on commit/abort) rather than being
    /// dropped on first notification, since a single write can imply
    /// several tokens (record, key, key+record) that the same listener may
    /// be watching independently.
    pub fn notify(&self, token: &Token) {
        if let Some(entry) = self.subscribers.get(token) {
            trace!(%token, count = entry.len(), "notifying version-change listeners");
            for (_, listener) in entry.iter() {
                listener.on_version_change(token);
            }
        }
    }

    pub fn is_empty_for(&self, token: &Token) -> bool {
        match self.subscribers.get(token) {
            Some(entry) => entry.is_empty(),
            None => true,
        }
    }
}
