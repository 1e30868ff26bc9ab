//! # Winstack Window Management Library
//!
//! Per-recipient UI windows for multi-user game server controllers: instance
//! lifetime, show/hide transitions, z-stacking, dialog modality and routing
//! of client actions back to window callbacks.
//!
//! ## Architecture
//!
//! Winstack is built on a modular architecture:
//! - `window`: Window instances, content hooks and the `WindowManager`
//! - `zorder`: Above/below stacking graph
//! - `registry`: Singleton and per-recipient instance tables
//! - `modality`: Active dialog per recipient
//! - `callbacks`: Action id to command tables
//! - `ids`: Protocol and action id allocation
//! - `events`: Lifecycle event dispatch
//! - `render`: Boundary to the layer that draws windows
//! - `config`: Configuration parsing and management
//!
//! ## Usage
//!
//! ```rust
//! use winstack::{
//!     LogRenderTarget, WindowContent, WindowContext, WindowKind, WindowManager,
//!     WindowResult, WindowType, WindowingConfig,
//! };
//!
//! struct Scoreboard;
//!
//! impl WindowContent for Scoreboard {
//!     fn initialize_components(&mut self, cx: &mut WindowContext<'_>) -> WindowResult<()> {
//!         cx.container_mut()?.set_size(60.0, 40.0);
//!         Ok(())
//!     }
//! }
//!
//! impl WindowType for Scoreboard {
//!     const KIND: WindowKind = WindowKind::new("scoreboard");
//!
//!     fn build(_recipient: Option<&str>) -> Self {
//!         Scoreboard
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut render = LogRenderTarget::new();
//!     render.connect("alice");
//!
//!     let mut manager = WindowManager::new(&WindowingConfig::default(), Box::new(render))?;
//!     let board = manager.create::<Scoreboard>(Some("alice"), true)?;
//!     manager.center_on_screen(board)?;
//!     assert!(manager.show(board, None)?);
//!     Ok(())
//! }
//! ```

pub mod callbacks;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod modality;
pub mod registry;
pub mod render;
pub mod window;
pub mod zorder;

// Re-export main types for easy access
pub use callbacks::{CallbackTarget, Command};
pub use config::WindowingConfig;
pub use error::{WindowError, WindowResult};
pub use events::{EventKind, ListenerId, WindowEvent};
pub use ids::{ActionId, ProtocolId};
pub use registry::Recipient;
pub use render::{Displayable, LogRenderTarget, RenderTarget};
pub use window::{
    Component, ComponentId, Rect, SharedWindowManager, WindowContent, WindowContext,
    WindowHandle, WindowKind, WindowManager, WindowState, WindowType,
};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information for Winstack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
