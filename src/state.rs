use crate::discord::{ChatApi, ChatError};
use crate::report::STATUS_BANNER;
use tracing::info;

/// How many history entries to scan when rediscovering the live message.
const SEARCH_WINDOW: u8 = 100;

/// Identity of the single live status message. Initialized empty at process
/// start and owned by the scheduler task for the process lifetime; the
/// message itself is rediscovered by banner search, so nothing is persisted.
#[derive(Debug, Default)]
pub struct StatusMessageHandle {
    message_id: Option<String>,
}

impl StatusMessageHandle {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn cached(message_id: &str) -> Self {
        Self {
            message_id: Some(message_id.to_string()),
        }
    }
}

/// What the upsert did this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Cached message was still there and got edited.
    Edited,
    /// No cached id; an existing banner message was found in history and
    /// taken over.
    Adopted,
    /// No cached id and nothing in history; a fresh message was sent.
    Created,
    /// Cached message had vanished; a replacement was sent.
    Replaced,
}

/// Ensures the channel holds exactly one authoritative status message and
/// that it carries `text` after this call. Chat failures propagate; the
/// caller treats them as a lost cycle and retries on the next tick.
pub async fn upsert_status<C: ChatApi + ?Sized>(
    chat: &C,
    channel_id: &str,
    handle: &mut StatusMessageHandle,
    text: &str,
) -> Result<UpsertOutcome, ChatError> {
    let outcome = match handle.message_id.clone() {
        Some(message_id) => match chat.fetch_message(channel_id, &message_id).await? {
            Some(_) => {
                chat.edit_message(channel_id, &message_id, text).await?;
                UpsertOutcome::Edited
            }
            None => {
                let sent = chat.send_message(channel_id, text).await?;
                info!(old_id = %message_id, new_id = %sent.id, "status message was deleted, sent replacement");
                handle.message_id = Some(sent.id);
                UpsertOutcome::Replaced
            }
        },
        None => {
            let existing = chat
                .recent_messages(channel_id, SEARCH_WINDOW)
                .await?
                .into_iter()
                .find(|m| {
                    m.author_id == chat.self_user_id() && m.content.starts_with(STATUS_BANNER)
                });
            match existing {
                Some(message) => {
                    chat.edit_message(channel_id, &message.id, text).await?;
                    info!(message_id = %message.id, "adopted existing status message");
                    handle.message_id = Some(message.id);
                    UpsertOutcome::Adopted
                }
                None => {
                    let sent = chat.send_message(channel_id, text).await?;
                    info!(message_id = %sent.id, "created status message");
                    handle.message_id = Some(sent.id);
                    UpsertOutcome::Created
                }
            }
        }
    };
    Ok(outcome)
}
