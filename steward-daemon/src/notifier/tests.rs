use super::*;
use crate::errors::{DaemonError, Result};
use crate::events::{EventType, event_channel};
use crate::manager::mock::MockManager;
use crate::persistence::{PersistedRegistry, RegistryStore};
use crate::registry::RegistryOptions;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::Instant;

const ADMIN: i64 = 7;
const CHAT: i64 = -100;

#[derive(Clone, Default)]
struct MockChat {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
    polls: Arc<Mutex<VecDeque<Result<Vec<Update>>>>>,
    offsets: Arc<Mutex<Vec<(i64, Instant)>>>,
}

impl MockChat {
    fn queue(&self, poll: Result<Vec<Update>>) {
        self.polls.lock().push_back(poll);
    }

    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().clone()
    }
}

impl ChatApi for MockChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.offsets.lock().push((offset, Instant::now()));
        let next = self.polls.lock().pop_front();
        match next {
            Some(poll) => poll,
            None => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}

struct Fixture {
    _dir: TempDir,
    manager: MockManager,
    chat: MockChat,
    notifier: Notifier<MockChat, MockManager>,
    events: crate::events::EventReceiver,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = RegistryStore::new(dir.path().join("config.json"));
    let persisted = PersistedRegistry {
        services: vec!["web".into(), "db".into()],
        ..Default::default()
    };
    let manager = MockManager::new();
    let options = RegistryOptions {
        event_capacity: 64,
        ..Default::default()
    };
    let registry = Registry::with_state(manager.clone(), store, persisted, options);
    let events = registry.events().unwrap();

    let chat = MockChat::default();
    let settings = NotifierSettings {
        chat_id: CHAT,
        admins: vec![ADMIN],
        ..Default::default()
    };
    Fixture {
        _dir: dir,
        manager,
        notifier: Notifier::new(chat.clone(), registry, settings),
        chat,
        events,
    }
}

fn message(update_id: i64, from: Option<User>, chat: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            text: Some(text.to_string()),
            from,
            chat: Chat { id: chat },
        }),
    }
}

fn admin_says(update_id: i64, text: &str) -> Update {
    message(update_id, Some(User { id: ADMIN, is_bot: false }), 42, text)
}

#[test]
fn test_render_default_template() {
    let fx = fixture();
    let event = SystemEvent::new(EventType::Stopped, "web");
    assert_eq!(fx.notifier.render(&event), "✋ steward: web stopped");
}

#[tokio::test]
async fn test_send_events_to_configured_chat() {
    let fx = fixture();
    let (tx, rx) = event_channel(4);
    tx.send(SystemEvent::new(EventType::Created, "api")).await.unwrap();
    tx.send(SystemEvent::new(EventType::Started, "api")).await.unwrap();
    drop(tx);

    fx.notifier.send_events(rx).await;

    assert_eq!(
        fx.chat.sent(),
        vec![
            (CHAT, "\u{2795} steward: api created".to_string()),
            (CHAT, "👌 steward: api started".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_ignored_updates() {
    let fx = fixture();
    let no_message = Update {
        update_id: 1,
        message: None,
    };
    let no_sender = message(2, None, 42, "status");
    let bot = message(3, Some(User { id: ADMIN, is_bot: true }), 42, "status");
    let stranger = message(4, Some(User { id: 99, is_bot: false }), 42, "status");
    let unknown = admin_says(5, "reboot web");

    for update in [no_message, no_sender, bot, stranger, unknown] {
        assert_eq!(fx.notifier.handle_update(&update).await, None);
    }
    assert!(fx.chat.sent().is_empty());
    assert!(fx.manager.calls().is_empty());
}

#[tokio::test]
async fn test_status_commands() {
    let fx = fixture();
    fx.manager.set_running("web", true);

    let reply = fx.notifier.handle_update(&admin_says(1, "status web")).await;
    assert_eq!(reply.as_deref(), Some("\u{2699} web is running"));

    let reply = fx.notifier.handle_update(&admin_says(2, "status")).await;
    assert_eq!(
        reply.as_deref(),
        Some("\u{2699} web is running\n⚰️ db is dead")
    );
    assert_eq!(fx.chat.sent().len(), 2);
    assert!(fx.chat.sent().iter().all(|(chat, _)| *chat == 42));
}

#[tokio::test]
async fn test_control_command_replies_to_origin() {
    let mut fx = fixture();
    let reply = fx.notifier.handle_update(&admin_says(1, "start web")).await;

    assert_eq!(reply.as_deref(), Some(REPLY_OK));
    assert_eq!(fx.chat.sent(), vec![(42, "OK".to_string())]);
    let event = fx.events.try_recv().unwrap();
    assert_eq!((event.event_type, event.name.as_str()), (EventType::Started, "web"));
}

#[tokio::test]
async fn test_command_errors_are_replied() {
    let fx = fixture();
    let reply = fx.notifier.handle_update(&admin_says(1, "stop")).await;
    assert_eq!(reply.as_deref(), Some("⚠️ argument required"));

    fx.manager.fail("web", "restart");
    let reply = fx.notifier.handle_update(&admin_says(2, "restart web")).await.unwrap();
    assert!(reply.starts_with("⚠️ restart failed for service web"));
}

#[tokio::test]
async fn test_help_command() {
    let fx = fixture();
    let reply = fx.notifier.handle_update(&admin_says(1, "help")).await.unwrap();
    assert!(reply.starts_with("commands:\n\n"));
    assert!(reply.contains("update"));
}

#[tokio::test(start_paused = true)]
async fn test_listen_advances_offset_and_backs_off() {
    let fx = fixture();
    fx.chat.queue(Ok(vec![admin_says(5, "status web"), admin_says(7, "help")]));
    fx.chat.queue(Err(DaemonError::Telegram("bad gateway".into())));
    fx.chat.queue(Ok(vec![admin_says(9, "help")]));

    let offset = fx
        .notifier
        .listen_commands(tokio::time::sleep(Duration::from_secs(60)))
        .await;
    assert_eq!(offset, 10);

    let offsets = fx.chat.offsets.lock().clone();
    let seen: Vec<i64> = offsets.iter().map(|(o, _)| *o).collect();
    assert_eq!(seen, vec![0, 8, 8, 10]);
    assert!(offsets[2].1 - offsets[1].1 >= POLL_BACKOFF);
    assert_eq!(fx.chat.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_backoff() {
    let fx = fixture();
    fx.chat.queue(Err(DaemonError::Telegram("unauthorized".into())));

    let start = Instant::now();
    fx.notifier
        .listen_commands(tokio::time::sleep(Duration::from_secs(1)))
        .await;

    assert!(start.elapsed() < POLL_BACKOFF);
    assert_eq!(fx.chat.offsets.lock().len(), 1);
}
