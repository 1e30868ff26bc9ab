//! Window lifecycle and action event dispatch

use std::collections::HashMap;

use log::trace;

use crate::ids::ActionId;
use crate::registry::Recipient;
use crate::window::WindowHandle;

/// Kinds of events emitted by the window manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A hidden window became visible
    WindowRecover,
    /// A window was hidden or destroyed
    WindowClose,
    /// An action was dispatched to a window callback
    ActionClick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowEvent {
    pub kind: EventKind,
    pub window: WindowHandle,
    pub recipient: Recipient,
    pub action: Option<ActionId>,
}

impl WindowEvent {
    pub fn new(kind: EventKind, window: WindowHandle, recipient: Recipient) -> Self {
        Self {
            kind,
            window,
            recipient,
            action: None,
        }
    }

    pub fn action_click(window: WindowHandle, recipient: Recipient, action: ActionId) -> Self {
        Self {
            kind: EventKind::ActionClick,
            window,
            recipient,
            action: Some(action),
        }
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&WindowEvent) + Send + Sync>;

/// Synchronous publish/subscribe hub; listeners run in subscription order.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_listener: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WindowEvent) + Send + Sync + 'static,
    {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Removes a listener; returns whether it was subscribed to `kind`.
    pub fn unsubscribe(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    pub fn emit(&self, event: &WindowEvent) {
        trace!("Emitting {:?} for window {:?}", event.kind, event.window);
        if let Some(listeners) = self.listeners.get(&event.kind) {
            for (_, listener) in listeners {
                listener(event);
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("recover", &self.listener_count(EventKind::WindowRecover))
            .field("close", &self.listener_count(EventKind::WindowClose))
            .field("action", &self.listener_count(EventKind::ActionClick))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn handle() -> WindowHandle {
        let mut arena: SlotMap<WindowHandle, ()> = SlotMap::with_key();
        arena.insert(())
    }

    #[test]
    fn test_listeners_only_see_their_kind() {
        let mut dispatcher = EventDispatcher::new();
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = closes.clone();
        dispatcher.subscribe(EventKind::WindowClose, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let window = handle();
        dispatcher.emit(&WindowEvent::new(EventKind::WindowRecover, window, None));
        dispatcher.emit(&WindowEvent::new(EventKind::WindowClose, window, None));

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut dispatcher = EventDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let id = dispatcher.subscribe(EventKind::ActionClick, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatcher.unsubscribe(EventKind::ActionClick, id));
        assert!(!dispatcher.unsubscribe(EventKind::ActionClick, id));
        assert!(!dispatcher.unsubscribe(EventKind::WindowClose, id));

        dispatcher.emit(&WindowEvent::action_click(handle(), None, ActionId::new(1, 1)));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.listener_count(EventKind::ActionClick), 0);
    }
}
