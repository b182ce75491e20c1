//! # Matrix Connection Adapter
//!
//! Implements the `Connection` trait for the Matrix protocol using the `matrix_sdk`.
//! Recipients are room ids of rooms the bot has joined; replies become `m.in_reply_to`
//! relations and media is posted as a markdown link.

use async_trait::async_trait;
use matrix_sdk::Client;
use matrix_sdk::ruma::events::relation::InReplyTo;
use matrix_sdk::ruma::events::room::message::{Relation, RoomMessageEventContent};
use matrix_sdk::ruma::{EventId, RoomId};

use crate::domain::traits::Connection;
use crate::domain::types::{MediaKind, MessageId, OutboundContent};

#[derive(Clone)]
pub struct MatrixConnection {
    client: Client,
}

impl MatrixConnection {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Map a payload to a Matrix room message.
pub fn build_content(content: &OutboundContent) -> Result<RoomMessageEventContent, String> {
    let event = match content {
        OutboundContent::Text(body) => RoomMessageEventContent::text_markdown(body),
        OutboundContent::Notice(body) => RoomMessageEventContent::notice_markdown(body),
        OutboundContent::Reply { body, in_reply_to } => {
            let event_id = EventId::parse(in_reply_to)
                .map_err(|e| format!("invalid reply anchor `{in_reply_to}`: {e}"))?;
            let mut event = RoomMessageEventContent::text_markdown(body);
            event.relates_to = Some(Relation::Reply {
                in_reply_to: InReplyTo::new(event_id),
            });
            event
        }
        OutboundContent::Media { kind, url, caption } => {
            let icon = match kind {
                MediaKind::Image => "🖼️",
                MediaKind::Video => "🎬",
                MediaKind::Audio => "🎵",
                MediaKind::File => "📎",
            };
            let label = caption.as_deref().unwrap_or(url);
            RoomMessageEventContent::text_markdown(format!("{icon} [{label}]({url})"))
        }
    };
    Ok(event)
}

#[async_trait]
impl Connection for MatrixConnection {
    async fn send(&self, recipient: &str, content: &OutboundContent) -> Result<MessageId, String> {
        let room_id = RoomId::parse(recipient)
            .map_err(|e| format!("invalid recipient room id `{recipient}`: {e}"))?;
        let room = self
            .client
            .get_room(&room_id)
            .ok_or_else(|| format!("unknown recipient room `{recipient}`: bot has not joined it"))?;
        let event = build_content(content)?;

        tracing::debug!("Bot sending message to {}: {:?}", recipient, content);
        room.send(event)
            .await
            .map(|resp| resp.event_id.to_string())
            .map_err(|e| e.to_string())
    }

    fn identity(&self) -> Option<String> {
        self.client.user_id().map(|id| id.to_string())
    }
}
