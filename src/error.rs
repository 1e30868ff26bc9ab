//! Error types for window management operations

use thiserror::Error;

use crate::window::WindowHandle;

/// Errors surfaced by [`WindowManager`](crate::window::WindowManager) operations.
///
/// Only programmer mistakes and exhausted resources are reported here. Stale
/// recipients and unknown action ids are soft failures and show up as
/// `Ok(false)` results instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    #[error("window {0:?} has been destroyed")]
    Destroyed(WindowHandle),

    #[error("a window cannot be stacked above itself")]
    SelfStacking,

    #[error("stacking {moving:?} above {reference:?} would create a cycle")]
    StackingCycle {
        moving: WindowHandle,
        reference: WindowHandle,
    },

    #[error("callback handler name is empty")]
    NullHandler,

    #[error("protocol id space exhausted ({capacity} ids in use)")]
    ProtocolIdsExhausted { capacity: u32 },

    #[error("action id space exhausted for protocol id {0}")]
    ActionIdsExhausted(u32),

    #[error("stacking depth {depth} exceeds the {max} representable z-layers")]
    StackingTooDeep { depth: usize, max: usize },

    #[error("a dialog is already active for recipient {0:?}")]
    DialogActive(Option<String>),
}

/// Result type alias for window management operations
pub type WindowResult<T> = Result<T, WindowError>;
