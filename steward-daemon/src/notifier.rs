//! Chat notifier.
//!
//! Sends every event to a chat and listens for operator commands from a
//! fixed allow-list of admin user ids. Command polling is a two-state loop:
//! `Polling` long-polls for updates, `BackingOff` waits a fixed delay after a
//! failed poll. Both states give way to the shutdown future immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::events::{EventReceiver, SystemEvent};
use crate::manager::ServiceManager;
use crate::registry::Registry;

mod api;
mod commands;

pub use api::{ChatApi, Chat, Message, POLL_TIMEOUT_SECS, TelegramApi, Update, User};
pub use commands::{Command, REPLY_OK};

/// Template used when none is configured
pub const DEFAULT_TEMPLATE: &str = "steward: {name} {event}";

/// Delay after a failed poll
pub const POLL_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// Chat receiving event notifications
    pub chat_id: i64,
    /// Message template; `{name}` and `{event}` are substituted
    pub template: String,
    /// User ids allowed to run commands
    pub admins: Vec<i64>,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            chat_id: 0,
            template: DEFAULT_TEMPLATE.to_string(),
            admins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollState {
    Polling,
    BackingOff,
}

pub struct Notifier<C: ChatApi, M: ServiceManager> {
    api: C,
    registry: Registry<M>,
    settings: NotifierSettings,
}

impl<C: ChatApi, M: ServiceManager> Notifier<C, M> {
    pub fn new(api: C, registry: Registry<M>, settings: NotifierSettings) -> Self {
        Self {
            api,
            registry,
            settings,
        }
    }

    /// Notification text for an event: icon, then the rendered template
    pub fn render(&self, event: &SystemEvent) -> String {
        let body = self
            .settings
            .template
            .replace("{name}", &event.name)
            .replace("{event}", event.event_type.as_str());
        format!("{} {}", event.event_type.icon(), body)
    }

    /// Forward events to the configured chat until the stream closes
    pub async fn send_events(&self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.api.send_text(self.settings.chat_id, &self.render(&event)).await {
                warn!("Failed to send {} to chat: {}", event, e);
            }
        }
        debug!("Notifier event stream closed");
    }

    fn is_admin(&self, user_id: i64) -> bool {
        self.settings.admins.contains(&user_id)
    }

    /// Handle one inbound update. Returns the reply that was sent, if any.
    pub async fn handle_update(&self, update: &Update) -> Option<String> {
        let message = update.message.as_ref()?;
        let sender = message.from.as_ref()?;
        if sender.is_bot || !self.is_admin(sender.id) {
            debug!("Ignoring update {} from {}", update.update_id, sender.id);
            return None;
        }
        let (command, arg) = Command::parse(message.text.as_deref()?)?;
        info!("Chat command {} {:?} from {}", command.name(), arg, sender.id);

        let reply = match command.execute(&self.registry, arg).await {
            Ok(reply) if reply.is_empty() => return None,
            Ok(reply) => reply,
            Err(e) => format!("⚠️ {}", e),
        };
        if let Err(e) = self.api.send_text(message.chat.id, &reply).await {
            warn!("Failed to send reply to chat {}: {}", message.chat.id, e);
        }
        Some(reply)
    }

    /// Poll for commands until `shutdown` resolves. Returns the next offset.
    pub async fn listen_commands(&self, shutdown: impl Future<Output = ()>) -> i64 {
        tokio::pin!(shutdown);
        let mut offset: i64 = 0;
        let mut state = PollState::Polling;

        loop {
            match state {
                PollState::Polling => {
                    let polled = tokio::select! {
                        _ = &mut shutdown => break,
                        polled = self.api.get_updates(offset) => polled,
                    };
                    match polled {
                        Ok(updates) => {
                            for update in &updates {
                                offset = offset.max(update.update_id + 1);
                                self.handle_update(update).await;
                            }
                        }
                        Err(e) => {
                            warn!("Failed to poll chat updates: {}", e);
                            state = PollState::BackingOff;
                        }
                    }
                }
                PollState::BackingOff => {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(POLL_BACKOFF) => state = PollState::Polling,
                    }
                }
            }
        }

        info!("Chat command listener stopped");
        offset
    }

    /// Send events and listen for commands until the event stream closes or
    /// `shutdown` resolves, whichever comes first
    pub async fn run(self, events: EventReceiver, shutdown: impl Future<Output = ()>) {
        tokio::select! {
            _ = self.send_events(events) => {}
            _ = self.listen_commands(shutdown) => {}
        }
    }
}

#[cfg(test)]
mod tests;
