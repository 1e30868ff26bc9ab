//! Action callback table
//!
//! A callback is stored as a [`Command`]: the component it belongs to, the
//! name of the handler to run and a list of serialized arguments. Commands are
//! compared by value, so registering the same command twice returns the action
//! id issued the first time.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WindowError, WindowResult};
use crate::ids::{ActionId, ActionRegistry, ProtocolId};
use crate::window::ComponentId;

/// Owner of a callback inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackTarget {
    /// The window content itself.
    Window,
    /// A component attached to the window.
    Component(ComponentId),
}

/// Handler reference plus the extra arguments bound at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub target: CallbackTarget,
    pub handler: String,
    pub args: Vec<Value>,
}

impl Command {
    /// Command handled by the window content.
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            target: CallbackTarget::Window,
            handler: handler.into(),
            args: Vec::new(),
        }
    }

    /// Command handled on behalf of a component.
    pub fn for_component(component: ComponentId, handler: impl Into<String>) -> Self {
        Self {
            target: CallbackTarget::Component(component),
            handler: handler.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Looks up a bound argument by position.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// Per-window mapping from action id to command.
#[derive(Debug, Clone, Default)]
pub struct CallbackTable {
    entries: BTreeMap<ActionId, Command>,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command` for the window owning `owner`, reusing the id of
    /// an identical command when there is one.
    pub fn register(
        &mut self,
        owner: ProtocolId,
        actions: &mut ActionRegistry,
        command: Command,
    ) -> WindowResult<ActionId> {
        if command.handler.is_empty() {
            return Err(WindowError::NullHandler);
        }

        if let Some(existing) = self.find(&command) {
            return Ok(existing);
        }

        let action = actions.allocate(owner)?;
        debug!("Registered action {} -> {}", action, command.handler);
        self.entries.insert(action, command);
        Ok(action)
    }

    /// Returns the action id already issued for an identical command.
    pub fn find(&self, command: &Command) -> Option<ActionId> {
        self.entries
            .iter()
            .find(|(_, existing)| *existing == command)
            .map(|(action, _)| *action)
    }

    pub fn get(&self, action: ActionId) -> Option<&Command> {
        self.entries.get(&action)
    }

    /// Drops every callback owned by `target`; returns how many were removed.
    pub fn remove_target(&mut self, target: CallbackTarget) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, command| command.target != target);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_commands_share_an_action() {
        let mut actions = ActionRegistry::new(16);
        let mut table = CallbackTable::new();

        let first = table
            .register(4, &mut actions, Command::new("select").with_arg(3))
            .unwrap();
        let second = table
            .register(4, &mut actions, Command::new("select").with_arg(3))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(actions.issued(4), 1);
    }

    #[test]
    fn test_different_args_get_different_actions() {
        let mut actions = ActionRegistry::new(16);
        let mut table = CallbackTable::new();

        let a = table
            .register(4, &mut actions, Command::new("select").with_arg(1))
            .unwrap();
        let b = table
            .register(4, &mut actions, Command::new("select").with_arg(2))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(table.get(b).and_then(|c| c.arg(0)), Some(&Value::from(2)));
    }

    #[test]
    fn test_empty_handler_is_rejected() {
        let mut actions = ActionRegistry::new(16);
        let mut table = CallbackTable::new();

        assert_eq!(
            table.register(1, &mut actions, Command::new("")),
            Err(WindowError::NullHandler)
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_target_only_drops_that_component() {
        let mut actions = ActionRegistry::new(16);
        let mut table = CallbackTable::new();
        let pager = ComponentId(1);
        let list = ComponentId(2);

        let next = table
            .register(9, &mut actions, Command::for_component(pager, "next"))
            .unwrap();
        table
            .register(9, &mut actions, Command::for_component(pager, "prev"))
            .unwrap();
        let pick = table
            .register(9, &mut actions, Command::for_component(list, "pick"))
            .unwrap();

        assert_eq!(table.remove_target(CallbackTarget::Component(pager)), 2);
        assert!(table.get(next).is_none());
        assert!(table.get(pick).is_some());
    }
}
