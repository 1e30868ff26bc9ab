//! Render target boundary
//!
//! The manager never talks to clients itself. Showing a window hands a
//! [`Displayable::Window`] to the render target, hiding hands over a
//! [`Displayable::Blank`] that replaces the previous payload for the same
//! protocol id.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::ProtocolId;
use crate::registry::Recipient;
use crate::window::{Component, Rect};

/// Prepared visual payload for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowView {
    pub id: ProtocolId,
    pub bounds: Rect,
    pub z: f32,
    pub scale: f32,
    pub header: Option<Component>,
    pub components: Vec<Component>,
    pub links_deactivated: bool,
    pub classic_positioning: bool,
}

/// Payload sent to the render target for a protocol id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Displayable {
    Window(WindowView),
    Blank { id: ProtocolId },
}

impl Displayable {
    pub fn id(&self) -> ProtocolId {
        match self {
            Displayable::Window(view) => view.id,
            Displayable::Blank { id } => *id,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("render target rejected the payload: {0}")]
    Rejected(String),
}

/// Consumer of window payloads.
#[cfg_attr(test, mockall::automock)]
pub trait RenderTarget: Send {
    /// Queues `displayable` for `recipient` (`None` is the active group).
    fn add_displayable(
        &mut self,
        recipient: &Recipient,
        displayable: Displayable,
    ) -> Result<(), RenderError>;

    /// Drops any cached payload for `id`.
    fn clear_displayable(&mut self, id: ProtocolId);
}

/// Render target that logs payloads as JSON.
///
/// Recipients must be connected before payloads addressed to them are
/// accepted; payloads for the active group are always accepted.
#[derive(Debug, Default)]
pub struct LogRenderTarget {
    connected: HashSet<String>,
    sent: usize,
}

impl LogRenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, login: impl Into<String>) {
        let login = login.into();
        info!("Recipient {} connected", login);
        self.connected.insert(login);
    }

    pub fn disconnect(&mut self, login: &str) {
        if self.connected.remove(login) {
            info!("Recipient {} disconnected", login);
        }
    }

    /// Number of payloads accepted so far.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl RenderTarget for LogRenderTarget {
    fn add_displayable(
        &mut self,
        recipient: &Recipient,
        displayable: Displayable,
    ) -> Result<(), RenderError> {
        if let Some(login) = recipient {
            if !self.connected.contains(login) {
                warn!("Dropping payload {} for unknown recipient {}", displayable.id(), login);
                return Err(RenderError::UnknownRecipient(login.clone()));
            }
        }

        let payload = serde_json::to_string(&displayable)
            .map_err(|e| RenderError::Rejected(e.to_string()))?;
        info!(
            "-> {}: {}",
            recipient.as_deref().unwrap_or("<active group>"),
            payload
        );
        self.sent += 1;
        Ok(())
    }

    fn clear_displayable(&mut self, id: ProtocolId) {
        debug!("Clearing cached payload {}", id);
    }
}
