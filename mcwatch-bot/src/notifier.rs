//! Alert delivery for server transitions and player joins.

use crate::embeds;
use poise::serenity_prelude::{ChannelId, CreateMessage, Http, UserId};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Something worth telling the alert channel about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ServerUp,
    ServerDown,
    /// Names that were not online on the previous poll
    PlayersJoined(Vec<String>),
}

/// Best-effort, fire-and-forget delivery. Implementations log failures
/// instead of returning them.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification) -> impl Future<Output = ()> + Send;
}

/// Posts notifications as embeds in a Discord channel.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channel: Option<ChannelId>,
    ping_user: Option<UserId>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>, channel: Option<u64>, ping_user: Option<u64>) -> Self {
        Self {
            http,
            channel: channel.map(ChannelId::new),
            ping_user: ping_user.map(UserId::new),
        }
    }

    fn message(&self, notification: &Notification) -> CreateMessage {
        match notification {
            Notification::ServerUp => CreateMessage::new().embed(embeds::server_back_online()),
            Notification::ServerDown => {
                let message = CreateMessage::new().embed(embeds::server_went_offline());
                match self.ping_user {
                    Some(user) => message.content(format!("<@{}>", user)),
                    None => message,
                }
            }
            Notification::PlayersJoined(names) => {
                CreateMessage::new().embed(embeds::players_joined(names))
            }
        }
    }
}

impl Notifier for DiscordNotifier {
    async fn notify(&self, notification: Notification) {
        let Some(channel) = self.channel else {
            debug!(?notification, "no alert channel configured, dropping notification");
            return;
        };

        match channel.send_message(&self.http, self.message(&notification)).await {
            Ok(_) => debug!(?notification, %channel, "notification sent"),
            Err(e) => warn!(error = %e, ?notification, %channel, "failed to deliver notification"),
        }
    }
}
