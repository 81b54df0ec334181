//! Chat handler: one independent task per inbound message.
//!
//! The task owns its reply sink and shares only the read-only resolver, so messages from
//! different chats run concurrently without coordination. Within a task the replies are
//! awaited in sequence, which keeps "thinking" ahead of the final answer.

use crate::telegram::{ChatReplier, TelegramClient};
use qbot_core::{AnswerResolver, IncomingMessage, MessageContext};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// A plain text message pulled off the platform, plus where to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    pub chat_id: i64,
    pub text: String,
}

/// Spawns the reply task for one message. Delivery failures are logged, never propagated.
pub fn spawn_reply(
    resolver: Arc<AnswerResolver>,
    client: Arc<TelegramClient>,
    inbound: InboundText,
) -> JoinHandle<()> {
    let ctx = MessageContext::new(Some(inbound.chat_id));
    let span = tracing::info_span!(
        "message",
        correlation_id = %ctx.correlation_id,
        chat_id = inbound.chat_id
    );
    tokio::spawn(
        async move {
            let sink = ChatReplier::new(client, inbound.chat_id);
            let message = IncomingMessage::new(inbound.text);
            match resolver.handle(&ctx, &message, &sink).await {
                Ok(source) => tracing::info!(?source, "replied"),
                Err(e) => tracing::warn!(error = %e, "could not deliver reply"),
            }
        }
        .instrument(span),
    )
}
