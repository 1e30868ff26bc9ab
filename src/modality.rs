//! Dialog modality bookkeeping
//!
//! At most one dialog per recipient holds modality. While it does, actions
//! aimed at any other window bound to that recipient are suppressed.

use std::collections::HashMap;

use log::debug;

use crate::registry::Recipient;
use crate::window::WindowHandle;

/// Active dialog and the window that opened it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogRecord {
    pub owner: WindowHandle,
    pub dialog: WindowHandle,
}

#[derive(Debug, Clone, Default)]
pub struct DialogModality {
    active: HashMap<Recipient, DialogRecord>,
}

impl DialogModality {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dialog currently holding modality for `recipient`.
    pub fn active(&self, recipient: &Recipient) -> Option<WindowHandle> {
        self.active.get(recipient).map(|record| record.dialog)
    }

    pub fn record(&self, recipient: &Recipient) -> Option<DialogRecord> {
        self.active.get(recipient).copied()
    }

    /// Installs a new record and returns the one it replaced.
    pub fn install(&mut self, recipient: Recipient, record: DialogRecord) -> Option<DialogRecord> {
        debug!("Dialog {:?} is modal for {:?}", record.dialog, recipient);
        self.active.insert(recipient, record)
    }

    /// Clears the record held by `dialog`, wherever it is.
    ///
    /// Returns the recipient and record that were released.
    pub fn release(&mut self, dialog: WindowHandle) -> Option<(Recipient, DialogRecord)> {
        let recipient = self
            .active
            .iter()
            .find(|(_, record)| record.dialog == dialog)
            .map(|(recipient, _)| recipient.clone())?;
        let record = self.active.remove(&recipient)?;
        debug!("Dialog {:?} released modality for {:?}", dialog, recipient);
        Some((recipient, record))
    }

    /// Whether actions from `recipient` aimed at `window` must be dropped.
    pub fn is_blocked(&self, recipient: &Recipient, window: WindowHandle) -> bool {
        matches!(self.active.get(recipient), Some(record) if record.dialog != window)
    }

    /// Drops every record mentioning `window` as owner or dialog.
    pub fn forget_window(&mut self, window: WindowHandle) -> Vec<DialogRecord> {
        let mut dropped = Vec::new();
        self.active.retain(|_, record| {
            if record.owner == window || record.dialog == window {
                dropped.push(*record);
                false
            } else {
                true
            }
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}
