//! Window manager service
//!
//! Owns every window instance together with the instance registry, the
//! stacking graph, dialog modality and the id pools. All operations run to
//! completion synchronously; hooks that trigger further transitions finish
//! those before returning to the caller.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use slotmap::SlotMap;

use super::{
    CloseAction, Component, ComponentId, Container, Hook, Visibility, Window, WindowContent,
    WindowHandle, WindowKind, WindowState, WindowType,
};
use crate::callbacks::{CallbackTarget, Command};
use crate::config::{DialogReplacePolicy, WindowingConfig};
use crate::error::{WindowError, WindowResult};
use crate::events::{EventDispatcher, EventKind, ListenerId, WindowEvent};
use crate::ids::{ActionId, ActionRegistry, IdAllocator, ProtocolId, ProtocolIdPool};
use crate::modality::{DialogModality, DialogRecord};
use crate::registry::{InstanceRegistry, Recipient};
use crate::render::{Displayable, RenderTarget, WindowView};
use crate::zorder::{StackingError, ZOrderGraph};

/// Dialogs closed in a row by one `show_dialog` before giving up.
const MAX_DIALOG_REPLACEMENTS: usize = 8;

/// Manager shared between threads; every mutation goes through the lock.
pub type SharedWindowManager = Arc<Mutex<WindowManager>>;

pub struct WindowManager {
    config: WindowingConfig,
    windows: SlotMap<WindowHandle, Window>,
    registry: InstanceRegistry,
    zorder: ZOrderGraph<WindowHandle>,
    modality: DialogModality,
    ids: Box<dyn IdAllocator>,
    actions: ActionRegistry,
    by_protocol_id: HashMap<ProtocolId, WindowHandle>,
    events: EventDispatcher,
    render: Box<dyn RenderTarget>,
    /// Windows with a pending autohide deadline
    ticking: BTreeSet<WindowHandle>,
    max_depth: usize,
}

impl WindowManager {
    /// Creates a manager sending its payloads to `render`.
    pub fn new(config: &WindowingConfig, render: Box<dyn RenderTarget>) -> Result<Self> {
        config.validate()?;

        info!(
            "Window manager ready: z [{}, {}] step {}, {} protocol ids",
            config.stacking.z_min,
            config.stacking.z_max,
            config.stacking.z_offset,
            config.ids.protocol_id_capacity
        );

        Ok(Self {
            config: config.clone(),
            windows: SlotMap::with_key(),
            registry: InstanceRegistry::new(),
            zorder: ZOrderGraph::new(),
            modality: DialogModality::new(),
            ids: Box::new(ProtocolIdPool::from_config(&config.ids)),
            actions: ActionRegistry::new(config.ids.actions_per_window),
            by_protocol_id: HashMap::new(),
            events: EventDispatcher::new(),
            render,
            ticking: BTreeSet::new(),
            max_depth: config.stacking.max_depth(),
        })
    }

    /// Replaces the protocol id source. Must be called before any window exists.
    pub fn with_id_allocator(mut self, ids: Box<dyn IdAllocator>) -> Self {
        debug_assert!(self.windows.is_empty());
        self.ids = ids;
        self
    }

    pub fn into_shared(self) -> SharedWindowManager {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &WindowingConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Creation and teardown
    // ---------------------------------------------------------------------

    /// Returns the singleton of `T` for `recipient`, or builds a new instance.
    pub fn create<T: WindowType>(
        &mut self,
        recipient: Option<&str>,
        singleton: bool,
    ) -> WindowResult<WindowHandle> {
        self.create_with(T::KIND, recipient, singleton, |recipient| {
            Box::new(T::build(recipient))
        })
    }

    /// Same as [`create`](Self::create) for contents built at runtime.
    ///
    /// `build` only runs when a new instance is needed. The content's
    /// `initialize_components` runs before this returns; if it fails the
    /// instance is destroyed again and the error returned.
    pub fn create_with<F>(
        &mut self,
        kind: WindowKind,
        recipient: Option<&str>,
        singleton: bool,
        build: F,
    ) -> WindowResult<WindowHandle>
    where
        F: FnOnce(Option<&str>) -> Box<dyn WindowContent>,
    {
        let recipient: Recipient = recipient.map(str::to_owned);

        if singleton {
            if let Some(existing) = self.registry.singleton(&recipient, kind) {
                return Ok(existing);
            }
        }

        let id = self.ids.allocate_protocol_id()?;
        let content = build(recipient.as_deref());
        let window = Window::new(kind, id, recipient.clone(), self.config.stacking.z_min, content);
        let handle = self.windows.insert(window);
        self.by_protocol_id.insert(id, handle);
        self.registry.register(handle, recipient.clone(), kind, singleton);

        debug!(
            "Created {} window {:?} (id {}) for {:?}",
            kind, handle, id, recipient
        );

        match self.with_content(handle, |content, cx| content.initialize_components(cx)) {
            Some(Err(e)) => {
                warn!("Initializing {} window failed: {}", kind, e);
                self.destroy(handle);
                Err(e)
            }
            _ => Ok(handle),
        }
    }

    /// Every live instance of `kind`, in registration order.
    pub fn get_all(&self, kind: WindowKind) -> Vec<WindowHandle> {
        self.registry.get_all(kind)
    }

    /// Closes and frees the instances of `kind` bound to `recipient`.
    ///
    /// Shown windows are hidden and destroyed once the hide went through,
    /// hidden ones are destroyed right away. Returns the number of windows
    /// affected.
    pub fn erase(&mut self, kind: WindowKind, recipient: Option<&str>) -> usize {
        let recipient: Recipient = recipient.map(str::to_owned);
        let handles = self.registry.for_recipient(kind, &recipient);
        for handle in &handles {
            self.erase_window(*handle);
        }
        handles.len()
    }

    /// Erases every instance of `kind` and drops cached payloads for them.
    pub fn erase_all(&mut self, kind: WindowKind) -> usize {
        let mut erased = 0;
        for recipient in self.registry.recipients_of(kind) {
            for handle in self.registry.for_recipient(kind, &recipient) {
                let id = self.windows.get(handle).map(|window| window.id);
                self.erase_window(handle);
                if let Some(id) = id {
                    self.render.clear_displayable(id);
                }
                erased += 1;
            }
        }

        if erased > 0 {
            info!("Erased {} {} window(s)", erased, kind);
        }
        erased
    }

    fn erase_window(&mut self, handle: WindowHandle) {
        let shown = match self.windows.get_mut(handle) {
            Some(window) if window.is_shown() => {
                window.on_close.push(CloseAction::Destroy);
                true
            }
            Some(_) => false,
            None => return,
        };

        if !shown || !matches!(self.hide(handle, None), Ok(true)) {
            // A recipient that went away can no longer receive the blank
            self.destroy(handle);
        }
    }

    /// Tears a window down and severs every reference to it.
    ///
    /// A window destroyed from inside one of its own hooks is torn down as
    /// soon as that hook returns, so its `on_hide` still runs. Returns
    /// `false` if the handle was already destroyed.
    pub fn destroy(&mut self, handle: WindowHandle) -> bool {
        let Some(window) = self.windows.get_mut(handle) else {
            return false;
        };
        if window.destroying {
            return false;
        }
        window.destroying = true;

        if window.content.is_none() {
            debug!("Window {:?} destroyed by its own hook, finishing on return", handle);
            window.teardown_pending = true;
            self.registry.remove(handle);
            return true;
        }
        self.teardown(handle)
    }

    fn teardown(&mut self, handle: WindowHandle) -> bool {
        let Some(window) = self.windows.get_mut(handle) else {
            return false;
        };
        window.teardown_pending = false;

        let was_shown = window.is_shown();
        window.visibility = Visibility::Hidden;
        let recipient = window.recipient.clone();
        let owners: Vec<WindowHandle> = window
            .on_close
            .drain(..)
            .filter_map(|action| match action {
                CloseAction::NotifyDialogOwner(owner) => Some(owner),
                CloseAction::Destroy => None,
            })
            .collect();

        if was_shown {
            self.call_hook(handle, Hook::Hide);
        }
        self.events
            .emit(&WindowEvent::new(EventKind::WindowClose, handle, recipient));
        for owner in owners {
            self.finish_dialog(owner, handle);
        }

        self.modality.forget_window(handle);
        self.zorder.detach(handle);
        self.ticking.remove(&handle);
        self.registry.remove(handle);

        let Some(mut window) = self.windows.remove(handle) else {
            return false;
        };
        window.callbacks.clear();
        window.player_values.clear();
        window.container.clear_components();
        self.by_protocol_id.remove(&window.id);
        self.actions.release_all(window.id);
        self.ids.free_protocol_id(window.id);

        info!("Destroyed {} window {:?} (id {})", window.kind, handle, window.id);
        true
    }

    /// Destroys every window.
    pub fn shutdown(&mut self) {
        let handles: Vec<WindowHandle> = self.windows.keys().collect();
        for handle in handles {
            self.destroy(handle);
        }
        self.modality.clear();
        self.zorder.clear();
    }

    // ---------------------------------------------------------------------
    // Show / hide state machine
    // ---------------------------------------------------------------------

    /// Sends the window to its recipient, or to `recipient` when the window
    /// is not bound to one.
    ///
    /// Returns `Ok(false)` when the render target refused the payload; the
    /// window then keeps its previous state.
    pub fn show(&mut self, handle: WindowHandle, recipient: Option<&str>) -> WindowResult<bool> {
        let window = self.live(handle)?;
        let target: Recipient = window
            .recipient
            .clone()
            .or_else(|| recipient.map(str::to_owned));
        let was_hidden = !window.is_shown();

        self.call_hook(handle, Hook::Show(target.clone()));
        self.live(handle)?;

        if !self.send_view(handle, &target) {
            return Ok(false);
        }

        let window = self.live_mut(handle)?;
        window.visibility = Visibility::Shown;

        if was_hidden {
            debug!("Window {:?} recovered for {:?}", handle, target);
            self.call_hook(handle, Hook::Recover);
            self.events
                .emit(&WindowEvent::new(EventKind::WindowRecover, handle, target));
        }
        Ok(true)
    }

    /// Replaces the window with a blank payload.
    ///
    /// Hiding a hidden window is a no-op returning `Ok(false)`. After a
    /// successful hide the close actions of the window run: the dialog owner
    /// is notified first, a scheduled destruction happens last.
    pub fn hide(&mut self, handle: WindowHandle, recipient: Option<&str>) -> WindowResult<bool> {
        let window = self.live(handle)?;
        if !window.is_shown() {
            return Ok(false);
        }
        let target: Recipient = window
            .recipient
            .clone()
            .or_else(|| recipient.map(str::to_owned));
        let id = window.id;

        if let Err(e) = self.render.add_displayable(&target, Displayable::Blank { id }) {
            warn!("Could not hide window {:?} for {:?}: {}", handle, target, e);
            return Ok(false);
        }

        let window = self.live_mut(handle)?;
        window.visibility = Visibility::Hidden;
        window.uptodate = true;
        window.autohide = None;
        self.ticking.remove(&handle);
        debug!("Window {:?} hidden for {:?}", handle, target);

        self.call_hook(handle, Hook::Hide);
        self.events
            .emit(&WindowEvent::new(EventKind::WindowClose, handle, target));
        self.run_close_actions(handle);
        Ok(true)
    }

    /// Builds the current view and hands it to the render target.
    fn send_view(&mut self, handle: WindowHandle, target: &Recipient) -> bool {
        let z = self.config.stacking.z_for_depth(self.zorder.depth(handle));
        let Some(window) = self.windows.get_mut(handle) else {
            return false;
        };
        window.container.z = z;

        let view = WindowView {
            id: window.id,
            bounds: window.container.bounds,
            z,
            scale: window.container.scale,
            header: window.container.header().cloned(),
            components: window.container.components().to_vec(),
            links_deactivated: window.links_deactivated,
            classic_positioning: window.classic_positioning,
        };

        match self.render.add_displayable(target, Displayable::Window(view)) {
            Ok(()) => {
                window.uptodate = true;
                window.view_z = Some(z);
                true
            }
            Err(e) => {
                warn!("Could not show window {:?} to {:?}: {}", handle, target, e);
                false
            }
        }
    }

    fn run_close_actions(&mut self, handle: WindowHandle) {
        let Some(window) = self.windows.get_mut(handle) else {
            return;
        };
        let actions = std::mem::take(&mut window.on_close);

        for action in &actions {
            if let CloseAction::NotifyDialogOwner(owner) = action {
                self.finish_dialog(*owner, handle);
            }
        }
        if actions.contains(&CloseAction::Destroy) {
            self.destroy(handle);
        }
    }

    // ---------------------------------------------------------------------
    // Hooks
    // ---------------------------------------------------------------------

    /// Runs `f` on the window's content with a context borrowing the manager.
    ///
    /// Returns `None` if the window is gone or its content is already running
    /// a hook.
    fn with_content<R>(
        &mut self,
        handle: WindowHandle,
        f: impl FnOnce(&mut dyn WindowContent, &mut WindowContext<'_>) -> R,
    ) -> Option<R> {
        let mut content = self.windows.get_mut(handle)?.content.take()?;

        let result = {
            let mut cx = WindowContext {
                manager: self,
                window: handle,
            };
            f(content.as_mut(), &mut cx)
        };

        // Windows are never removed while their content is checked out
        let window = self.windows.get_mut(handle)?;
        window.content = Some(content);
        self.run_deferred(handle);

        if self
            .windows
            .get(handle)
            .is_some_and(|window| window.teardown_pending && window.content.is_some())
        {
            self.teardown(handle);
        }
        Some(result)
    }

    /// Runs `hook` now, or queues it while the content is busy.
    fn call_hook(&mut self, handle: WindowHandle, hook: Hook) -> bool {
        let Some(window) = self.windows.get_mut(handle) else {
            return false;
        };
        if window.content.is_none() {
            debug!("Deferring {:?} on busy window {:?}", hook, handle);
            window.deferred.push(hook);
            return false;
        }
        self.invoke_hook(handle, hook)
    }

    fn invoke_hook(&mut self, handle: WindowHandle, hook: Hook) -> bool {
        let ran = match hook {
            Hook::Show(_) => self.with_content(handle, |content, cx| content.on_show(cx)),
            Hook::Hide => self.with_content(handle, |content, cx| content.on_hide(cx)),
            Hook::Recover => self.with_content(handle, |content, cx| content.on_recover(cx)),
            Hook::DialogClosed(dialog) => {
                self.with_content(handle, |content, cx| content.dialog_closed(cx, dialog))
            }
        };
        ran.is_some()
    }

    fn run_deferred(&mut self, handle: WindowHandle) {
        loop {
            let hook = match self.windows.get_mut(handle) {
                Some(window) if window.content.is_some() && !window.deferred.is_empty() => {
                    window.deferred.remove(0)
                }
                _ => return,
            };

            let resend = match &hook {
                Hook::Show(target) => Some(target.clone()),
                _ => None,
            };
            self.invoke_hook(handle, hook);

            // The view went out before its on_show ran
            if let Some(target) = resend {
                let stale = self
                    .windows
                    .get(handle)
                    .is_some_and(|window| {
                        window.is_shown() && !window.uptodate && !window.destroying
                    });
                if stale {
                    self.send_view(handle, &target);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Stacking and layout
    // ---------------------------------------------------------------------

    /// Places `moving` directly above `reference`.
    pub fn move_above(&mut self, moving: WindowHandle, reference: WindowHandle) -> WindowResult<()> {
        self.live(moving)?;
        self.live(reference)?;

        self.zorder
            .move_above(moving, reference, self.max_depth)
            .map_err(|e| match e {
                StackingError::SelfReference => WindowError::SelfStacking,
                StackingError::Cycle => WindowError::StackingCycle { moving, reference },
                StackingError::TooDeep { depth, max } => {
                    WindowError::StackingTooDeep { depth, max }
                }
            })?;

        debug!("Window {:?} stacked above {:?}", moving, reference);
        self.mark_dirty(moving);
        Ok(())
    }

    /// Centers the window over the windows directly below it.
    pub fn center_on_below(&mut self, handle: WindowHandle) -> WindowResult<()> {
        self.live(handle)?;
        let windows = &self.windows;
        let (cx, cy) = self.zorder.center_below(handle, |other| {
            windows.get(other).map(|window| window.container.bounds)
        });

        let window = self.live_mut(handle)?;
        let bounds = window.container.bounds;
        window
            .container
            .set_position(cx - bounds.width / 2.0, cy - bounds.height / 2.0);
        window.uptodate = false;
        Ok(())
    }

    /// Centers the window on the screen, shifted up by the layout offset.
    pub fn center_on_screen(&mut self, handle: WindowHandle) -> WindowResult<()> {
        let offset = self.config.layout.screen_center_offset_y;
        let window = self.live_mut(handle)?;
        let bounds = window.container.bounds;
        window
            .container
            .set_position(-bounds.width / 2.0, -bounds.height / 2.0 - offset);
        window.uptodate = false;
        Ok(())
    }

    /// Z coordinate derived from the window's stacking depth.
    pub fn z_of(&self, handle: WindowHandle) -> WindowResult<f32> {
        self.window(handle)?;
        Ok(self.config.stacking.z_for_depth(self.zorder.depth(handle)))
    }

    /// Highest z used by the last view sent, `z_min` if none was sent yet.
    pub fn max_z(&self, handle: WindowHandle) -> WindowResult<f32> {
        Ok(self
            .window(handle)?
            .view_z
            .unwrap_or(self.config.stacking.z_min))
    }

    pub fn windows_above(&self, handle: WindowHandle) -> Vec<WindowHandle> {
        self.zorder.above(handle).collect()
    }

    pub fn windows_below(&self, handle: WindowHandle) -> Vec<WindowHandle> {
        self.zorder.below(handle).collect()
    }

    // ---------------------------------------------------------------------
    // Dialogs
    // ---------------------------------------------------------------------

    /// Shows `dialog` above `owner` and gives it modality for the owner's
    /// recipient.
    ///
    /// When the dialog is hidden, `owner` receives `dialog_closed` and the
    /// modality is released. Returns `Ok(false)` if the dialog could not be
    /// shown; no modality is held in that case.
    pub fn show_dialog(&mut self, owner: WindowHandle, dialog: WindowHandle) -> WindowResult<bool> {
        let recipient = self.live(owner)?.recipient.clone();
        self.live(dialog)?;

        let previous = self
            .modality
            .record(&recipient)
            .filter(|record| record.dialog != dialog);
        if previous.is_some() && self.config.dialog.replace_policy == DialogReplacePolicy::Reject {
            return Err(WindowError::DialogActive(recipient));
        }

        self.move_above(dialog, owner)?;
        self.center_on_below(dialog)?;

        // An owner notified of the close may open another dialog from
        // `dialog_closed`; that one is replaced as well
        let mut replaced = previous.map(|record| record.dialog);
        let mut attempts = 0;
        while let Some(previous) = replaced {
            if attempts == MAX_DIALOG_REPLACEMENTS {
                warn!("Dialogs for {:?} keep reopening, not showing {:?}", recipient, dialog);
                return Err(WindowError::DialogActive(recipient));
            }
            attempts += 1;

            debug!("Closing dialog {:?} replaced by {:?}", previous, dialog);
            self.close_dialog(previous);
            replaced = self
                .modality
                .record(&recipient)
                .filter(|record| record.dialog != dialog)
                .map(|record| record.dialog);
        }
        self.live(owner)?;
        self.live(dialog)?;

        self.modality
            .install(recipient.clone(), DialogRecord { owner, dialog });
        let window = self.live_mut(dialog)?;
        window
            .on_close
            .retain(|action| !matches!(action, CloseAction::NotifyDialogOwner(_)));
        window.on_close.push(CloseAction::NotifyDialogOwner(owner));

        let shown = self.show(dialog, recipient.as_deref())?;
        if !shown {
            self.modality.release(dialog);
            if let Some(window) = self.windows.get_mut(dialog) {
                window
                    .on_close
                    .retain(|action| !matches!(action, CloseAction::NotifyDialogOwner(_)));
            }
        }
        Ok(shown)
    }

    /// Hides a dialog, releasing it by force if the hide does not go through.
    fn close_dialog(&mut self, dialog: WindowHandle) {
        if matches!(self.hide(dialog, None), Ok(true)) {
            return;
        }

        let owners: Vec<WindowHandle> = match self.windows.get_mut(dialog) {
            Some(window) => {
                let mut owners = Vec::new();
                window.on_close.retain(|action| match action {
                    CloseAction::NotifyDialogOwner(owner) => {
                        owners.push(*owner);
                        false
                    }
                    CloseAction::Destroy => true,
                });
                owners
            }
            None => Vec::new(),
        };
        for owner in owners {
            self.finish_dialog(owner, dialog);
        }
        self.modality.release(dialog);
    }

    fn finish_dialog(&mut self, owner: WindowHandle, dialog: WindowHandle) {
        self.modality.release(dialog);
        if self.windows.contains_key(owner) {
            debug!("Dialog {:?} of window {:?} closed", dialog, owner);
            self.call_hook(owner, Hook::DialogClosed(dialog));
        }
    }

    /// Dialog holding modality for `recipient`.
    pub fn active_dialog(&self, recipient: Option<&str>) -> Option<WindowHandle> {
        self.modality.active(&recipient.map(str::to_owned))
    }

    // ---------------------------------------------------------------------
    // Callbacks and actions
    // ---------------------------------------------------------------------

    /// Registers `command` and returns the action id to attach to components.
    pub fn register_callback(
        &mut self,
        handle: WindowHandle,
        command: Command,
    ) -> WindowResult<ActionId> {
        let window = match self.windows.get_mut(handle) {
            Some(window) if !window.destroying => window,
            _ => return Err(WindowError::Destroyed(handle)),
        };
        window.callbacks.register(window.id, &mut self.actions, command)
    }

    /// Drops every callback owned by `target`.
    pub fn remove_callbacks_of(
        &mut self,
        handle: WindowHandle,
        target: CallbackTarget,
    ) -> WindowResult<usize> {
        Ok(self.live_mut(handle)?.callbacks.remove_target(target))
    }

    /// Runs the command bound to `action` for `recipient`.
    ///
    /// Unknown actions and actions suppressed by another window's dialog
    /// return `Ok(false)`.
    pub fn on_action_click(
        &mut self,
        handle: WindowHandle,
        recipient: &str,
        action: ActionId,
    ) -> WindowResult<bool> {
        let Some(window) = self.windows.get(handle).filter(|window| !window.destroying) else {
            debug!("Action {} for stale window {:?}", action, handle);
            return Ok(false);
        };
        let Some(command) = window.callbacks.get(action).cloned() else {
            debug!("Unknown action {} on window {:?}", action, handle);
            return Ok(false);
        };
        if window.recipient.as_deref().is_some_and(|bound| bound != recipient) {
            debug!(
                "Action {} from {} ignored by window {:?} bound to {:?}",
                action, recipient, handle, window.recipient
            );
            return Ok(false);
        }

        let login: Recipient = Some(recipient.to_owned());
        if self.modality.is_blocked(&login, handle) || self.modality.is_blocked(&None, handle) {
            debug!("Action {} from {} suppressed by an active dialog", action, recipient);
            return Ok(false);
        }

        self.events
            .emit(&WindowEvent::action_click(handle, login, action));
        Ok(self
            .with_content(handle, |content, cx| content.on_action(cx, recipient, &command))
            .is_some())
    }

    /// Routes a raw client action to the window that issued it.
    pub fn dispatch_action(&mut self, recipient: &str, action: ActionId) -> WindowResult<bool> {
        match self.by_protocol_id.get(&action.owner()).copied() {
            Some(handle) => self.on_action_click(handle, recipient, action),
            None => {
                debug!("No window owns action {}", action);
                Ok(false)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------------

    pub fn add_component(
        &mut self,
        handle: WindowHandle,
        component: Component,
    ) -> WindowResult<ComponentId> {
        let window = self.live_mut(handle)?;
        window.uptodate = false;
        Ok(window.container.add_component(component))
    }

    /// Detaches a component together with the callbacks it registered.
    pub fn remove_component(
        &mut self,
        handle: WindowHandle,
        component: ComponentId,
    ) -> WindowResult<Option<Component>> {
        let window = self.live_mut(handle)?;
        window
            .callbacks
            .remove_target(CallbackTarget::Component(component));
        window.uptodate = false;
        Ok(window.container.remove_component(component))
    }

    /// Sets the element drawn before the window body.
    pub fn set_header_element(
        &mut self,
        handle: WindowHandle,
        header: Component,
    ) -> WindowResult<()> {
        let window = self.live_mut(handle)?;
        window.container.set_header(header);
        window.uptodate = false;
        Ok(())
    }

    pub fn header_element(&self, handle: WindowHandle) -> WindowResult<Option<&Component>> {
        Ok(self.window(handle)?.container.header())
    }

    pub fn container(&self, handle: WindowHandle) -> WindowResult<&Container> {
        Ok(&self.window(handle)?.container)
    }

    pub fn container_mut(&mut self, handle: WindowHandle) -> WindowResult<&mut Container> {
        let window = self.window_mut(handle)?;
        window.uptodate = false;
        Ok(&mut window.container)
    }

    pub fn deactivate_links(&mut self, handle: WindowHandle) -> WindowResult<()> {
        self.set_links_deactivated(handle, true)
    }

    pub fn activate_links(&mut self, handle: WindowHandle) -> WindowResult<()> {
        self.set_links_deactivated(handle, false)
    }

    fn set_links_deactivated(&mut self, handle: WindowHandle, value: bool) -> WindowResult<()> {
        let window = self.live_mut(handle)?;
        window.links_deactivated = value;
        window.uptodate = false;
        Ok(())
    }

    pub fn links_deactivated(&self, handle: WindowHandle) -> WindowResult<bool> {
        Ok(self.window(handle)?.links_deactivated)
    }

    /// Positions with a non-inverted y axis when set.
    pub fn set_classic_positioning(&mut self, handle: WindowHandle, value: bool) -> WindowResult<()> {
        let window = self.live_mut(handle)?;
        window.classic_positioning = value;
        window.uptodate = false;
        Ok(())
    }

    pub fn classic_positioning(&self, handle: WindowHandle) -> WindowResult<bool> {
        Ok(self.window(handle)?.classic_positioning)
    }

    // ---------------------------------------------------------------------
    // Per-recipient values
    // ---------------------------------------------------------------------

    pub fn set_player_value(
        &mut self,
        handle: WindowHandle,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> WindowResult<()> {
        let window = self.live_mut(handle)?;
        window
            .player_values
            .entry(window.recipient.clone())
            .or_default()
            .insert(name.into(), value.into());
        Ok(())
    }

    /// Value stored under `name` for the window's recipient, or `default`.
    pub fn get_player_value(
        &self,
        handle: WindowHandle,
        name: &str,
        default: Value,
    ) -> WindowResult<Value> {
        let window = self.window(handle)?;
        Ok(window
            .player_values
            .get(&window.recipient)
            .and_then(|values| values.get(name))
            .cloned()
            .unwrap_or(default))
    }

    // ---------------------------------------------------------------------
    // Autohide
    // ---------------------------------------------------------------------

    /// Hides the window once `after` has elapsed; replaces any pending deadline.
    pub fn set_timeout(&mut self, handle: WindowHandle, after: Duration) -> WindowResult<()> {
        self.set_timeout_at(handle, Instant::now() + after)
    }

    pub fn set_timeout_at(&mut self, handle: WindowHandle, deadline: Instant) -> WindowResult<()> {
        self.live_mut(handle)?.autohide = Some(deadline);
        self.ticking.insert(handle);
        Ok(())
    }

    #[deprecated(note = "use `set_timeout`")]
    pub fn set_autohide(&mut self, handle: WindowHandle, after: Duration) -> WindowResult<()> {
        self.set_timeout(handle, after)
    }

    /// Time left before the window hides itself, if a deadline is pending.
    pub fn autohide_remaining(&self, handle: WindowHandle) -> WindowResult<Option<Duration>> {
        Ok(self
            .window(handle)?
            .autohide
            .map(|deadline| deadline.saturating_duration_since(Instant::now())))
    }

    /// Hides every window whose deadline passed; returns how many were hidden.
    pub fn tick(&mut self, now: Instant) -> usize {
        let due: Vec<WindowHandle> = self
            .ticking
            .iter()
            .copied()
            .filter(|handle| {
                self.windows
                    .get(*handle)
                    .and_then(|window| window.autohide)
                    .map_or(true, |deadline| deadline <= now)
            })
            .collect();

        let mut hidden = 0;
        for handle in due {
            self.ticking.remove(&handle);
            let Some(window) = self.windows.get_mut(handle) else {
                continue;
            };
            window.autohide = None;
            if matches!(self.hide(handle, None), Ok(true)) {
                debug!("Window {:?} hidden by timeout", handle);
                hidden += 1;
            }
        }
        hidden
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WindowEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, kind: EventKind, id: ListenerId) -> bool {
        self.events.unsubscribe(kind, id)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn state(&self, handle: WindowHandle) -> WindowState {
        match self.windows.get(handle) {
            Some(window) if window.destroying => WindowState::Destroyed,
            Some(window) if window.is_shown() => WindowState::Shown,
            Some(_) => WindowState::Hidden,
            None => WindowState::Destroyed,
        }
    }

    pub fn is_shown(&self, handle: WindowHandle) -> bool {
        self.state(handle) == WindowState::Shown
    }

    /// Whether the last payload sent still matches the window.
    pub fn is_uptodate(&self, handle: WindowHandle) -> WindowResult<bool> {
        Ok(self.window(handle)?.uptodate)
    }

    pub fn contains(&self, handle: WindowHandle) -> bool {
        self.windows
            .get(handle)
            .is_some_and(|window| !window.destroying)
    }

    pub fn recipient(&self, handle: WindowHandle) -> WindowResult<Option<&str>> {
        Ok(self.window(handle)?.recipient.as_deref())
    }

    pub fn protocol_id(&self, handle: WindowHandle) -> WindowResult<ProtocolId> {
        Ok(self.window(handle)?.id)
    }

    pub fn kind(&self, handle: WindowHandle) -> WindowResult<WindowKind> {
        Ok(self.window(handle)?.kind)
    }

    pub fn window_by_protocol_id(&self, id: ProtocolId) -> Option<WindowHandle> {
        self.by_protocol_id.get(&id).copied()
    }

    pub fn callback(&self, handle: WindowHandle, action: ActionId) -> Option<&Command> {
        self.windows.get(handle)?.callbacks.get(action)
    }

    pub fn callback_count(&self, handle: WindowHandle) -> usize {
        self.windows
            .get(handle)
            .map_or(0, |window| window.callbacks.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Checks that indexes, registry and stacking graph agree with the arena.
    pub fn is_consistent(&self) -> bool {
        self.zorder.is_consistent()
            && self.registry.len() == self.windows.len()
            && self.registry.handles().iter().all(|h| self.windows.contains_key(*h))
            && self.by_protocol_id.len() == self.windows.len()
            && self
                .by_protocol_id
                .iter()
                .all(|(id, h)| self.windows.get(*h).is_some_and(|window| window.id == *id))
            && self.windows.keys().all(|h| {
                self.zorder
                    .above(h)
                    .chain(self.zorder.below(h))
                    .all(|other| self.windows.contains_key(other))
            })
    }

    fn window(&self, handle: WindowHandle) -> WindowResult<&Window> {
        self.windows
            .get(handle)
            .ok_or(WindowError::Destroyed(handle))
    }

    fn window_mut(&mut self, handle: WindowHandle) -> WindowResult<&mut Window> {
        self.windows
            .get_mut(handle)
            .ok_or(WindowError::Destroyed(handle))
    }

    /// Like `window` but also rejects windows being torn down.
    fn live(&self, handle: WindowHandle) -> WindowResult<&Window> {
        match self.windows.get(handle) {
            Some(window) if !window.destroying => Ok(window),
            _ => Err(WindowError::Destroyed(handle)),
        }
    }

    fn live_mut(&mut self, handle: WindowHandle) -> WindowResult<&mut Window> {
        match self.windows.get_mut(handle) {
            Some(window) if !window.destroying => Ok(window),
            _ => Err(WindowError::Destroyed(handle)),
        }
    }

    fn mark_dirty(&mut self, handle: WindowHandle) {
        if let Some(window) = self.windows.get_mut(handle) {
            window.uptodate = false;
        }
    }
}

impl std::fmt::Debug for WindowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowManager")
            .field("windows", &self.windows.len())
            .field("dialogs", &self.modality.len())
            .field("ticking", &self.ticking.len())
            .field("events", &self.events)
            .finish()
    }
}

/// Access handed to window hooks: the manager plus the window being run.
pub struct WindowContext<'a> {
    manager: &'a mut WindowManager,
    window: WindowHandle,
}

impl<'a> WindowContext<'a> {
    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn manager(&mut self) -> &mut WindowManager {
        self.manager
    }

    pub fn recipient(&self) -> Option<&str> {
        self.manager.recipient(self.window).ok().flatten()
    }

    pub fn container_mut(&mut self) -> WindowResult<&mut Container> {
        self.manager.container_mut(self.window)
    }

    pub fn add_component(&mut self, component: Component) -> WindowResult<ComponentId> {
        self.manager.add_component(self.window, component)
    }

    pub fn register_callback(&mut self, command: Command) -> WindowResult<ActionId> {
        self.manager.register_callback(self.window, command)
    }

    pub fn set_header_element(&mut self, header: Component) -> WindowResult<()> {
        self.manager.set_header_element(self.window, header)
    }

    pub fn set_player_value(&mut self, name: impl Into<String>, value: impl Into<Value>) -> WindowResult<()> {
        self.manager.set_player_value(self.window, name, value)
    }

    pub fn get_player_value(&self, name: &str, default: Value) -> WindowResult<Value> {
        self.manager.get_player_value(self.window, name, default)
    }

    pub fn center_on_screen(&mut self) -> WindowResult<()> {
        self.manager.center_on_screen(self.window)
    }

    pub fn set_timeout(&mut self, after: Duration) -> WindowResult<()> {
        self.manager.set_timeout(self.window, after)
    }

    pub fn show(&mut self) -> WindowResult<bool> {
        self.manager.show(self.window, None)
    }

    pub fn hide(&mut self) -> WindowResult<bool> {
        self.manager.hide(self.window, None)
    }

    /// Shows `dialog` modally above this window.
    pub fn show_dialog(&mut self, dialog: WindowHandle) -> WindowResult<bool> {
        self.manager.show_dialog(self.window, dialog)
    }

    pub fn destroy(&mut self) -> bool {
        self.manager.destroy(self.window)
    }
}
