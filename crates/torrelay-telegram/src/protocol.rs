//! Bot API wire format.
//!
//! Every Bot API response is wrapped in an `{ok, result, description}`
//! envelope; `ok: false` carries a human-readable description instead of
//! a result.

use serde::{Deserialize, Serialize};
use torrelay_abstraction::{ChatError, ChatEvent, ChatId, DocumentMeta, FileRef};

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwraps the envelope into its result.
    ///
    /// # Errors
    /// Returns `ChatError::Api` when the platform flagged the request as
    /// failed, or `ChatError::Decode` when a successful envelope carries
    /// no result.
    pub fn into_result(self) -> Result<T, ChatError> {
        if !self.ok {
            return Err(ChatError::Api(
                self.description.unwrap_or_else(|| "unspecified error".to_string()),
            ));
        }
        self.result.ok_or_else(|| ChatError::Decode("envelope carried no result".to_string()))
    }
}

/// Parameters of `getUpdates`.
#[derive(Debug, Serialize)]
pub struct GetUpdatesRequest {
    /// Identifier of the first update to return; updates below it are
    /// confirmed and dropped by the platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Long-poll timeout in seconds.
    pub timeout: u64,
}

/// Parameters of `getFile`.
#[derive(Debug, Serialize)]
pub struct GetFileRequest<'a> {
    pub file_id: &'a str,
}

/// Parameters of `sendMessage`.
#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

/// One entry of a `getUpdates` response.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// An incoming message.
#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

/// The chat a message originated from.
#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// An attached document.
#[derive(Debug, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Result of `getFile`.
#[derive(Debug, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Update {
    /// Maps an update to a chat event, if it is one the bridge reacts to.
    ///
    /// `/start` (with or without a bot-name suffix) becomes `Started`;
    /// messages carrying a document become `Document`. Everything else is
    /// dropped.
    pub fn into_event(self) -> Option<ChatEvent> {
        let message = self.message?;
        let chat = ChatId(message.chat.id);

        if let Some(document) = message.document {
            return Some(ChatEvent::Document {
                chat,
                document: DocumentMeta {
                    file_ref: FileRef(document.file_id),
                    mime_type: document.mime_type,
                    file_name: document.file_name,
                },
            });
        }

        match message.text {
            Some(text) if text.trim().starts_with("/start") => Some(ChatEvent::Started { chat }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_command_maps_to_started() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":1,"message":{"chat":{"id":42},"text":"/start"}}"#,
        )
        .unwrap();
        assert_eq!(update.into_event(), Some(ChatEvent::Started { chat: ChatId(42) }));
    }

    #[test]
    fn start_command_with_bot_suffix_maps_to_started() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":1,"message":{"chat":{"id":42},"text":"/start@torrelay_bot"}}"#,
        )
        .unwrap();
        assert_eq!(update.into_event(), Some(ChatEvent::Started { chat: ChatId(42) }));
    }

    #[test]
    fn document_message_carries_metadata() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":2,"message":{"chat":{"id":7},"document":
                {"file_id":"F1","file_name":"debian.torrent","mime_type":"application/x-bittorrent"}}}"#,
        )
        .unwrap();

        match update.into_event() {
            Some(ChatEvent::Document { chat, document }) => {
                assert_eq!(chat, ChatId(7));
                assert_eq!(document.file_ref, FileRef("F1".to_string()));
                assert_eq!(document.mime_type.as_deref(), Some("application/x-bittorrent"));
                assert_eq!(document.file_name.as_deref(), Some("debian.torrent"));
            }
            other => panic!("Expected Document event, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_and_empty_updates_are_dropped() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":3,"message":{"chat":{"id":7},"text":"hello"}}"#,
        )
        .unwrap();
        assert_eq!(update.into_event(), None);

        let update: Update = serde_json::from_str(r#"{"update_id":4}"#).unwrap();
        assert_eq!(update.into_event(), None);
    }

    #[test]
    fn failed_envelope_surfaces_description() {
        let envelope: ApiEnvelope<Vec<Update>> =
            serde_json::from_str(r#"{"ok":false,"description":"Unauthorized"}"#).unwrap();
        match envelope.into_result() {
            Err(ChatError::Api(description)) => assert_eq!(description, "Unauthorized"),
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn ok_envelope_without_result_is_decode_error() {
        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(matches!(envelope.into_result(), Err(ChatError::Decode(_))));
    }
}
