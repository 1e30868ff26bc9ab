//! Live window instance registry
//!
//! Singleton windows are indexed by `(recipient, kind)`; non-singleton
//! windows by `(recipient, handle)`. Registration order is kept so that
//! listing the instances of a kind is stable between two mutations.

use std::collections::HashMap;

use crate::window::{WindowHandle, WindowKind};

/// Recipient a window is bound to; `None` targets the active group.
pub type Recipient = Option<String>;

#[derive(Debug, Clone, PartialEq)]
struct RegistryEntry {
    handle: WindowHandle,
    kind: WindowKind,
    recipient: Recipient,
    singleton: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    /// Index of singleton instances
    singletons: HashMap<(Recipient, WindowKind), WindowHandle>,

    /// Every live instance in registration order
    entries: Vec<RegistryEntry>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The singleton instance of `kind` bound to `recipient`, if any.
    pub fn singleton(&self, recipient: &Recipient, kind: WindowKind) -> Option<WindowHandle> {
        self.singletons.get(&(recipient.clone(), kind)).copied()
    }

    pub fn register(
        &mut self,
        handle: WindowHandle,
        recipient: Recipient,
        kind: WindowKind,
        singleton: bool,
    ) {
        if singleton {
            self.singletons.insert((recipient.clone(), kind), handle);
        }
        self.entries.push(RegistryEntry {
            handle,
            kind,
            recipient,
            singleton,
        });
    }

    /// Every live instance of `kind`, singleton or not, in registration order.
    pub fn get_all(&self, kind: WindowKind) -> Vec<WindowHandle> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.handle)
            .collect()
    }

    /// Instances of `kind` bound to `recipient`, singleton first.
    pub fn for_recipient(&self, kind: WindowKind, recipient: &Recipient) -> Vec<WindowHandle> {
        let mut handles: Vec<WindowHandle> = self.singleton(recipient, kind).into_iter().collect();
        handles.extend(
            self.entries
                .iter()
                .filter(|entry| !entry.singleton && entry.kind == kind && &entry.recipient == recipient)
                .map(|entry| entry.handle),
        );
        handles
    }

    /// Distinct recipients holding at least one instance of `kind`.
    pub fn recipients_of(&self, kind: WindowKind) -> Vec<Recipient> {
        let mut recipients: Vec<Recipient> = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.kind == kind) {
            if !recipients.contains(&entry.recipient) {
                recipients.push(entry.recipient.clone());
            }
        }
        recipients
    }

    /// Removes `handle` from every index; returns whether it was registered.
    pub fn remove(&mut self, handle: WindowHandle) -> bool {
        let Some(position) = self.entries.iter().position(|entry| entry.handle == handle) else {
            return false;
        };
        let entry = self.entries.remove(position);
        if entry.singleton {
            let key = (entry.recipient, entry.kind);
            if self.singletons.get(&key) == Some(&handle) {
                self.singletons.remove(&key);
            }
        }
        true
    }

    pub fn contains(&self, handle: WindowHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    /// Every registered handle in registration order.
    pub fn handles(&self) -> Vec<WindowHandle> {
        self.entries.iter().map(|entry| entry.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
