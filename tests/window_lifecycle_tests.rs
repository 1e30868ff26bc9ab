// Window lifecycle integration tests for Winstack
//
// Drives the public API the way a host server does: windows for several
// recipients, dialogs, raw client actions, timed hiding and teardown.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use winstack::render::RenderError;
use winstack::{
    Command, Displayable, EventKind, ProtocolId, Recipient, RenderTarget, WindowContent,
    WindowContext, WindowHandle, WindowKind, WindowManager, WindowResult, WindowState, WindowType,
    WindowingConfig,
};

/// Render target shared with the test body.
#[derive(Clone, Default)]
struct Screen {
    payloads: Arc<Mutex<Vec<(Recipient, Displayable)>>>,
    online: Arc<Mutex<HashSet<String>>>,
}

impl Screen {
    fn with_players(players: &[&str]) -> Self {
        let screen = Screen::default();
        screen
            .online
            .lock()
            .extend(players.iter().map(|p| p.to_string()));
        screen
    }

    fn sent_to(&self, player: &str) -> usize {
        self.payloads
            .lock()
            .iter()
            .filter(|(recipient, _)| recipient.as_deref() == Some(player))
            .count()
    }
}

impl RenderTarget for Screen {
    fn add_displayable(&mut self, recipient: &Recipient, displayable: Displayable) -> Result<(), RenderError> {
        if let Some(login) = recipient {
            if !self.online.lock().contains(login) {
                return Err(RenderError::UnknownRecipient(login.clone()));
            }
        }
        self.payloads.lock().push((recipient.clone(), displayable));
        Ok(())
    }

    fn clear_displayable(&mut self, _id: ProtocolId) {}
}

/// Ranking list with one "page" action per page.
struct Ranking {
    page: Arc<Mutex<i64>>,
}

impl WindowContent for Ranking {
    fn initialize_components(&mut self, cx: &mut WindowContext<'_>) -> WindowResult<()> {
        cx.container_mut()?.set_size(60.0, 50.0);
        for page in 0..3 {
            cx.register_callback(Command::new("page").with_arg(page))?;
        }
        Ok(())
    }

    fn on_action(&mut self, cx: &mut WindowContext<'_>, _recipient: &str, command: &Command) {
        if let Some(page) = command.arg(0).and_then(|v| v.as_i64()) {
            *self.page.lock() = page;
            let _ = cx.set_player_value("page", page);
            let _ = cx.show();
        }
    }
}

struct Question;

impl WindowContent for Question {
    fn initialize_components(&mut self, cx: &mut WindowContext<'_>) -> WindowResult<()> {
        cx.container_mut()?.set_size(20.0, 10.0);
        cx.register_callback(Command::new("ok"))?;
        Ok(())
    }

    fn on_action(&mut self, cx: &mut WindowContext<'_>, _recipient: &str, _command: &Command) {
        let _ = cx.hide();
    }
}

impl WindowType for Question {
    const KIND: WindowKind = WindowKind::new("question");

    fn build(_recipient: Option<&str>) -> Self {
        Question
    }
}

const RANKING: WindowKind = WindowKind::new("ranking");

fn ranking(manager: &mut WindowManager, player: &str) -> (WindowHandle, Arc<Mutex<i64>>) {
    let page = Arc::new(Mutex::new(0));
    let shared = page.clone();
    let handle = manager
        .create_with(RANKING, Some(player), true, move |_| Box::new(Ranking { page: shared }))
        .unwrap();
    (handle, page)
}

#[test]
fn test_multi_recipient_session() {
    let screen = Screen::with_players(&["alice", "bob"]);
    let mut manager = WindowManager::new(&WindowingConfig::default(), Box::new(screen.clone())).unwrap();

    let (alice, alice_page) = ranking(&mut manager, "alice");
    let (bob, _) = ranking(&mut manager, "bob");
    assert_eq!(ranking(&mut manager, "alice").0, alice);

    assert!(manager.show(alice, None).unwrap());
    assert!(manager.show(bob, None).unwrap());
    assert_eq!(screen.sent_to("alice"), 1);

    // A raw action id carries its owner
    let page_two = manager
        .register_callback(alice, Command::new("page").with_arg(2))
        .unwrap();
    assert!(manager.dispatch_action("alice", page_two).unwrap());
    assert_eq!(*alice_page.lock(), 2);
    assert_eq!(screen.sent_to("alice"), 2);
    assert_eq!(
        manager.get_player_value(alice, "page", 0.into()).unwrap(),
        serde_json::json!(2)
    );

    // Bob leaves: hiding his window is a soft failure
    screen.online.lock().remove("bob");
    assert!(!manager.hide(bob, None).unwrap());
    assert_eq!(manager.state(bob), WindowState::Shown);

    manager.erase_all(RANKING);
    assert!(manager.get_all(RANKING).is_empty());
    assert_eq!(manager.state(bob), WindowState::Destroyed);
    assert!(manager.is_consistent());
}

#[test]
fn test_dialog_round_trip() {
    let screen = Screen::with_players(&["alice"]);
    let mut manager = WindowManager::new(&WindowingConfig::default(), Box::new(screen)).unwrap();
    let closed = Arc::new(Mutex::new(Vec::new()));
    let sink = closed.clone();
    manager.subscribe(EventKind::WindowClose, move |event| sink.lock().push(event.window));

    let (owner, page) = ranking(&mut manager, "alice");
    let dialog = manager.create::<Question>(Some("alice"), true).unwrap();
    manager.show(owner, None).unwrap();
    assert!(manager.show_dialog(owner, dialog).unwrap());

    let owner_action = manager
        .register_callback(owner, Command::new("page").with_arg(1))
        .unwrap();
    assert!(!manager.dispatch_action("alice", owner_action).unwrap());
    assert_eq!(*page.lock(), 0);

    let ok = manager.register_callback(dialog, Command::new("ok")).unwrap();
    assert!(manager.dispatch_action("alice", ok).unwrap());
    assert_eq!(manager.state(dialog), WindowState::Hidden);
    assert_eq!(manager.active_dialog(Some("alice")), None);
    assert_eq!(*closed.lock(), vec![dialog]);

    assert!(manager.dispatch_action("alice", owner_action).unwrap());
    assert_eq!(*page.lock(), 1);
}

#[test]
fn test_timed_hide_through_shared_manager() {
    let screen = Screen::with_players(&["alice"]);
    let manager = WindowManager::new(&WindowingConfig::default(), Box::new(screen))
        .unwrap()
        .into_shared();

    let notice = {
        let mut guard = manager.lock();
        let notice = guard.create::<Question>(Some("alice"), false).unwrap();
        guard.show(notice, None).unwrap();
        guard.set_timeout(notice, Duration::from_millis(10)).unwrap();
        notice
    };

    let later = Instant::now() + Duration::from_secs(1);
    assert_eq!(manager.lock().tick(later), 1);
    assert_eq!(manager.lock().state(notice), WindowState::Hidden);
}

#[test]
fn test_protocol_ids_are_recycled() {
    let mut config = WindowingConfig::default();
    config.ids.protocol_id_capacity = 2;
    let mut manager = WindowManager::new(&config, Box::new(Screen::default())).unwrap();

    let a = manager.create::<Question>(None, false).unwrap();
    let _b = manager.create::<Question>(None, false).unwrap();
    assert!(manager.create::<Question>(None, false).is_err());

    let freed = manager.protocol_id(a).unwrap();
    manager.destroy(a);
    let c = manager.create::<Question>(None, false).unwrap();
    assert_eq!(manager.protocol_id(c).unwrap(), freed);
}
