//! Core Window Management System
//!
//! This module implements the per-recipient window model:
//! - Window instances addressed by arena handles
//! - Content hooks (initialize, show, hide, recover, dialog closed, actions)
//! - Component containers and geometry
//! - Per-recipient scratch values and close actions
//!
//! The [`WindowManager`] owns every window and drives the show/hide state
//! machine, z-stacking and dialog modality. Window contents never hold
//! references to other windows, only [`WindowHandle`]s.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::callbacks::{CallbackTable, Command};
use crate::error::WindowResult;
use crate::ids::{ActionId, ProtocolId};
use crate::registry::Recipient;

pub mod manager;

pub use manager::{SharedWindowManager, WindowContext, WindowManager};

slotmap::new_key_type! {
    /// Process-unique identity of a window instance.
    pub struct WindowHandle;
}

/// Type tag of a concrete window; singleton instances are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKind(&'static str);

impl WindowKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Observable lifecycle state of a window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Hidden,
    Shown,
    /// The handle no longer refers to a live window
    Destroyed,
}

/// Axis-aligned rectangle in screen units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn border_left(&self) -> f32 {
        self.x
    }

    pub fn border_right(&self) -> f32 {
        self.x + self.width
    }

    pub fn border_top(&self) -> f32 {
        self.y
    }

    pub fn border_bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.border_left().min(other.border_left());
        let top = self.border_top().min(other.border_top());
        let right = self.border_right().max(other.border_right());
        let bottom = self.border_bottom().max(other.border_bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Identifier of a component inside its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

/// Element drawn as part of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub bounds: Rect,
    pub action: Option<ActionId>,
}

impl Component {
    pub fn new(name: impl Into<String>, bounds: Rect) -> Self {
        Self {
            id: ComponentId(0),
            name: name.into(),
            bounds,
            action: None,
        }
    }

    pub fn with_action(mut self, action: ActionId) -> Self {
        self.action = Some(action);
        self
    }
}

/// Geometry and child components of a window
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub bounds: Rect,
    pub z: f32,
    pub scale: f32,
    header: Option<Component>,
    components: Vec<Component>,
    next_component: u32,
}

impl Container {
    pub fn new(z: f32) -> Self {
        Self {
            bounds: Rect::default(),
            z,
            scale: 1.0,
            header: None,
            components: Vec::new(),
            next_component: 0,
        }
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.bounds.x = x;
        self.bounds.y = y;
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        self.bounds.width = width;
        self.bounds.height = height;
    }

    /// Adds a component and assigns it a fresh id.
    pub fn add_component(&mut self, mut component: Component) -> ComponentId {
        self.next_component += 1;
        component.id = ComponentId(self.next_component);
        let id = component.id;
        self.components.push(component);
        id
    }

    pub fn remove_component(&mut self, id: ComponentId) -> Option<Component> {
        let position = self.components.iter().position(|c| c.id == id)?;
        Some(self.components.remove(position))
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id == id)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn clear_components(&mut self) {
        self.components.clear();
    }

    /// Sets the element drawn before the window body.
    pub fn set_header(&mut self, header: Component) {
        self.header = Some(header);
    }

    pub fn header(&self) -> Option<&Component> {
        self.header.as_ref()
    }
}

/// Behaviour of a concrete window type.
///
/// Hooks receive a [`WindowContext`] so they can mutate their own window or
/// drive other windows through the manager. Effects triggered from a hook
/// complete before the hook returns.
pub trait WindowContent: Send {
    /// Builds components and registers callbacks; runs once at creation.
    fn initialize_components(&mut self, cx: &mut WindowContext<'_>) -> WindowResult<()>;

    /// Prepares geometry and components before the window is sent.
    fn on_show(&mut self, _cx: &mut WindowContext<'_>) {}

    /// Cleans up when the window leaves the screen.
    fn on_hide(&mut self, _cx: &mut WindowContext<'_>) {}

    /// Runs when a hidden window becomes visible again.
    fn on_recover(&mut self, _cx: &mut WindowContext<'_>) {}

    /// A dialog shown over this window has closed.
    fn dialog_closed(&mut self, _cx: &mut WindowContext<'_>, _dialog: WindowHandle) {}

    /// Executes a registered command clicked by `recipient`.
    fn on_action(&mut self, _cx: &mut WindowContext<'_>, _recipient: &str, _command: &Command) {}
}

/// Window type with a static kind, constructible by the manager.
pub trait WindowType: WindowContent + Sized + 'static {
    const KIND: WindowKind;

    fn build(recipient: Option<&str>) -> Self;
}

/// Deferred effect run when a window is closed by a successful hide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseAction {
    /// Notify the owner that this dialog closed and release modality
    NotifyDialogOwner(WindowHandle),
    /// Destroy the window
    Destroy,
}

/// Hook invocation queued while the window's content was busy
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Hook {
    Show(Recipient),
    Hide,
    Recover,
    DialogClosed(WindowHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Hidden,
    Shown,
}

/// Live window instance owned by the manager's arena
pub(crate) struct Window {
    pub(crate) kind: WindowKind,
    pub(crate) id: ProtocolId,
    pub(crate) recipient: Recipient,
    pub(crate) visibility: Visibility,
    /// Whether the last payload sent matches the current state
    pub(crate) uptodate: bool,
    pub(crate) destroying: bool,
    /// Destroyed while a hook was running; torn down once the content returns
    pub(crate) teardown_pending: bool,
    pub(crate) container: Container,
    pub(crate) callbacks: CallbackTable,
    pub(crate) player_values: HashMap<Recipient, HashMap<String, Value>>,
    pub(crate) on_close: Vec<CloseAction>,
    pub(crate) autohide: Option<Instant>,
    /// Z of the last view sent to the render target
    pub(crate) view_z: Option<f32>,
    pub(crate) links_deactivated: bool,
    pub(crate) classic_positioning: bool,
    /// `None` while a hook of this window is executing
    pub(crate) content: Option<Box<dyn WindowContent>>,
    pub(crate) deferred: Vec<Hook>,
}

impl Window {
    pub(crate) fn new(
        kind: WindowKind,
        id: ProtocolId,
        recipient: Recipient,
        z: f32,
        content: Box<dyn WindowContent>,
    ) -> Self {
        Self {
            kind,
            id,
            recipient,
            visibility: Visibility::Hidden,
            uptodate: false,
            destroying: false,
            teardown_pending: false,
            container: Container::new(z),
            callbacks: CallbackTable::new(),
            player_values: HashMap::new(),
            on_close: Vec::new(),
            autohide: None,
            view_z: None,
            links_deactivated: false,
            classic_positioning: false,
            content: Some(content),
            deferred: Vec::new(),
        }
    }

    pub(crate) fn is_shown(&self) -> bool {
        self.visibility == Visibility::Shown
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("recipient", &self.recipient)
            .field("visibility", &self.visibility)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
