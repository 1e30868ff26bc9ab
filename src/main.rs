//! # Winstack - Per-recipient Window Manager
//!
//! Runs a scripted session against a logging render target: a menu per
//! recipient, a notice that hides itself on a timer, and a confirmation dialog
//! that locks the menu until it is answered.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};

use winstack::{
    Command, Component, EventKind, LogRenderTarget, Rect, SharedWindowManager, WindowContent,
    WindowContext, WindowHandle, WindowKind, WindowManager, WindowResult, WindowType,
    WindowingConfig,
};

#[derive(Parser)]
#[command(name = "winstack")]
#[command(about = "Per-recipient window stacking, dialog modality and action routing")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/winstack/winstack.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Recipients taking part in the session
    #[arg(short, long, value_delimiter = ',', default_value = "alice,bob")]
    recipients: Vec<String>,

    /// Seconds before the notice hides itself
    #[arg(long, default_value_t = 2)]
    notice_timeout: u64,

    /// Maximum number of ticks to run before shutting down
    #[arg(long, default_value_t = 5)]
    max_ticks: u32,
}

/// Main menu with a quit button guarded by a confirmation dialog.
struct Menu;

impl WindowContent for Menu {
    fn initialize_components(&mut self, cx: &mut WindowContext<'_>) -> WindowResult<()> {
        cx.container_mut()?.set_size(50.0, 30.0);
        cx.set_header_element(Component::new("menu-title", Rect::new(0.0, 0.0, 50.0, 5.0)))?;

        let quit = cx.register_callback(Command::new("quit"))?;
        cx.add_component(
            Component::new("quit-button", Rect::new(15.0, 20.0, 20.0, 5.0)).with_action(quit),
        )?;
        Ok(())
    }

    fn on_action(&mut self, cx: &mut WindowContext<'_>, recipient: &str, command: &Command) {
        if command.handler != "quit" {
            return;
        }

        let bound = cx.recipient().map(str::to_owned);
        let dialog = match cx.manager().create::<ConfirmDialog>(bound.as_deref(), true) {
            Ok(dialog) => dialog,
            Err(e) => {
                warn!("Could not open confirmation for {}: {}", recipient_label(&bound), e);
                return;
            }
        };

        match cx.show_dialog(dialog) {
            Ok(true) => info!("Asking {} to confirm", recipient),
            Ok(false) => warn!("Confirmation could not be shown to {}", recipient),
            Err(e) => warn!("Confirmation rejected: {}", e),
        }
    }

    fn dialog_closed(&mut self, cx: &mut WindowContext<'_>, _dialog: WindowHandle) {
        info!("Menu of {} is interactive again", recipient_label(&cx.recipient().map(str::to_owned)));
    }
}

impl WindowType for Menu {
    const KIND: WindowKind = WindowKind::new("menu");

    fn build(_recipient: Option<&str>) -> Self {
        Menu
    }
}

/// Yes/no question shown above the menu.
struct ConfirmDialog;

impl WindowContent for ConfirmDialog {
    fn initialize_components(&mut self, cx: &mut WindowContext<'_>) -> WindowResult<()> {
        cx.container_mut()?.set_size(30.0, 12.0);

        let confirm = cx.register_callback(Command::new("answer").with_arg(true))?;
        let cancel = cx.register_callback(Command::new("answer").with_arg(false))?;
        cx.add_component(Component::new("yes", Rect::new(2.0, 7.0, 12.0, 4.0)).with_action(confirm))?;
        cx.add_component(Component::new("no", Rect::new(16.0, 7.0, 12.0, 4.0)).with_action(cancel))?;
        Ok(())
    }

    fn on_action(&mut self, cx: &mut WindowContext<'_>, recipient: &str, command: &Command) {
        let answer = command.arg(0).and_then(|value| value.as_bool()).unwrap_or(false);
        info!("{} answered {}", recipient, if answer { "yes" } else { "no" });
        if let Err(e) = cx.set_player_value("answer", answer) {
            warn!("Could not store answer: {}", e);
        }
        if let Err(e) = cx.hide() {
            warn!("Could not close confirmation: {}", e);
        }
    }
}

impl WindowType for ConfirmDialog {
    const KIND: WindowKind = WindowKind::new("confirm");

    fn build(_recipient: Option<&str>) -> Self {
        ConfirmDialog
    }
}

/// Short message hiding itself after a timeout.
struct Notice;

impl WindowContent for Notice {
    fn initialize_components(&mut self, cx: &mut WindowContext<'_>) -> WindowResult<()> {
        cx.container_mut()?.set_size(40.0, 8.0);
        cx.add_component(Component::new("notice-text", Rect::new(1.0, 1.0, 38.0, 6.0)))?;
        Ok(())
    }

    fn on_show(&mut self, cx: &mut WindowContext<'_>) {
        if let Ok(container) = cx.container_mut() {
            container.set_position(-20.0, 40.0);
        }
    }
}

impl WindowType for Notice {
    const KIND: WindowKind = WindowKind::new("notice");

    fn build(_recipient: Option<&str>) -> Self {
        Notice
    }
}

fn recipient_label(recipient: &Option<String>) -> &str {
    recipient.as_deref().unwrap_or("<active group>")
}

/// Shows the menu and a timed notice to every recipient.
fn open_windows(manager: &SharedWindowManager, recipients: &[String], timeout: Duration) -> Result<()> {
    let mut manager = manager.lock();

    for recipient in recipients {
        let menu = manager.create::<Menu>(Some(recipient.as_str()), true)?;
        manager.center_on_screen(menu)?;
        if !manager.show(menu, None)? {
            warn!("Menu could not be shown to {}", recipient);
        }

        let notice = manager.create::<Notice>(Some(recipient.as_str()), false)?;
        manager.move_above(notice, menu)?;
        manager.show(notice, None)?;
        manager.set_timeout(notice, timeout)?;
    }

    info!("📋 {} window(s) open", manager.len());
    Ok(())
}

/// Plays the quit flow for the first recipient.
fn confirm_quit(manager: &SharedWindowManager, recipient: &str) -> Result<()> {
    let mut manager = manager.lock();

    let menu = manager.create::<Menu>(Some(recipient), true)?;
    // Registering the same command again yields the id the menu already uses
    let quit = manager.register_callback(menu, Command::new("quit"))?;
    manager.dispatch_action(recipient, quit)?;

    let Some(dialog) = manager.active_dialog(Some(recipient)) else {
        warn!("No confirmation is active for {}", recipient);
        return Ok(());
    };

    if !manager.dispatch_action(recipient, quit)? {
        info!("🔒 Menu click from {} suppressed while the dialog is open", recipient);
    }

    let yes = manager.register_callback(dialog, Command::new("answer").with_arg(true))?;
    manager.dispatch_action(recipient, yes)?;
    Ok(())
}

/// Drives autohide until every notice is gone or the tick budget runs out.
async fn run_ticks(manager: SharedWindowManager, interval: Duration, max_ticks: u32) {
    let mut ticker = tokio::time::interval(interval);

    for _ in 0..max_ticks {
        ticker.tick().await;
        let mut manager = manager.lock();
        let hidden = manager.tick(Instant::now());
        if hidden > 0 {
            info!("⏱️ {} window(s) hidden by timeout", hidden);
        }
        let pending = manager
            .get_all(Notice::KIND)
            .into_iter()
            .filter(|notice| manager.is_shown(*notice))
            .count();
        if pending == 0 {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so that `general.debug` applies
    let loaded = WindowingConfig::load(&cli.config);
    let debug = cli.debug || loaded.as_ref().map_or(false, |config| config.general.debug);

    // Initialize logging
    let filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    info!("🚀 Starting Winstack {}", winstack::VERSION);
    info!(
        "📄 Built {} for {} ({})",
        env!("BUILD_DATE"),
        env!("TARGET_TRIPLE"),
        option_env!("GIT_COMMIT").unwrap_or("unknown commit")
    );

    let config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            WindowingConfig::default()
        }
    };

    let mut render = LogRenderTarget::new();
    for recipient in &cli.recipients {
        render.connect(recipient.as_str());
    }

    let mut manager = WindowManager::new(&config, Box::new(render))?;
    manager.subscribe(EventKind::WindowClose, |event| {
        info!("🪟 Window {:?} closed for {}", event.window, recipient_label(&event.recipient));
    });
    let manager = manager.into_shared();

    open_windows(&manager, &cli.recipients, Duration::from_secs(cli.notice_timeout))?;

    if let Some(first) = cli.recipients.first() {
        if let Err(e) = confirm_quit(&manager, first) {
            error!("❌ Quit flow failed: {}", e);
        }
    }

    run_ticks(
        manager.clone(),
        Duration::from_millis(config.general.tick_interval_ms),
        cli.max_ticks,
    )
    .await;

    let mut manager = manager.lock();
    for kind in [Notice::KIND, ConfirmDialog::KIND, Menu::KIND] {
        manager.erase_all(kind);
    }
    manager.shutdown();

    info!("✅ Session finished");
    Ok(())
}
