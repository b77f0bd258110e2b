//! The Bot API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use torrelay_abstraction::{ChatAdapter, ChatError, ChatEvent, ChatId, FileRef};
use tracing::{debug, error};

use crate::protocol::{
    ApiEnvelope, FileInfo, GetFileRequest, GetUpdatesRequest, SendMessageRequest, Update,
};

/// Extra headroom on the HTTP timeout so the long poll can complete.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Telegram Bot API adapter.
///
/// Tracks the `getUpdates` offset internally so each poll confirms the
/// updates delivered by the previous one.
#[derive(Debug)]
pub struct TelegramAdapter {
    /// Bot token issued by BotFather.
    token: String,
    /// API base URL (default: `https://api.telegram.org`).
    base_url: String,
    /// Long-poll timeout handed to `getUpdates`.
    poll_timeout: Duration,
    /// Identifier of the next update to ask for.
    offset: AtomicI64,
    /// HTTP client for making requests.
    client: Client,
}

impl TelegramAdapter {
    /// Creates a new adapter against the public Bot API.
    ///
    /// # Errors
    /// Returns a `ChatError` if the HTTP client cannot be created.
    pub fn new(token: String, poll_timeout: Duration) -> Result<Self, ChatError> {
        Self::with_base_url(token, "https://api.telegram.org".to_string(), poll_timeout)
    }

    /// Creates a new adapter with a custom API base URL.
    ///
    /// # Errors
    /// Returns a `ChatError` if the HTTP client cannot be created.
    pub fn with_base_url(
        token: String,
        base_url: String,
        poll_timeout: Duration,
    ) -> Result<Self, ChatError> {
        // The request timeout must outlast the server-held long poll.
        let client = Client::builder()
            .timeout(poll_timeout + POLL_TIMEOUT_MARGIN)
            .build()
            .map_err(|e| ChatError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { token, base_url, poll_timeout, offset: AtomicI64::new(0), client })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    /// Invokes a Bot API method and unwraps the response envelope.
    async fn invoke<R, T>(&self, method: &str, request: &R) -> Result<T, ChatError>
    where
        R: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, method, "failed to reach chat API");
                ChatError::Transport(format!("Network error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %body, method, "chat API returned error status");

            // Error responses still use the envelope; prefer its description.
            if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body) {
                if let Some(description) = envelope.description {
                    return Err(ChatError::Api(description));
                }
            }
            return Err(ChatError::Api(format!("API error ({status}): {body}")));
        }

        let envelope: ApiEnvelope<T> = response.json().await.map_err(|e| {
            error!(error = %e, method, "failed to parse chat API response");
            ChatError::Decode(format!("failed to parse response: {e}"))
        })?;
        envelope.into_result()
    }
}

#[async_trait]
impl ChatAdapter for TelegramAdapter {
    async fn next_events(&self) -> Result<Vec<ChatEvent>, ChatError> {
        let offset = self.offset.load(Ordering::Acquire);
        let request = GetUpdatesRequest {
            offset: (offset > 0).then_some(offset),
            timeout: self.poll_timeout.as_secs(),
        };

        let updates: Vec<Update> = self.invoke("getUpdates", &request).await?;
        debug!(count = updates.len(), "received updates");

        let mut events = Vec::new();
        for update in updates {
            // Advance past every update seen, mapped to an event or not,
            // so the platform stops redelivering it.
            self.offset.fetch_max(update.update_id + 1, Ordering::AcqRel);
            if let Some(event) = update.into_event() {
                events.push(event);
            }
        }
        Ok(events)
    }

    async fn fetch_document(&self, file: &FileRef) -> Result<Vec<u8>, ChatError> {
        let info: FileInfo = self.invoke("getFile", &GetFileRequest { file_id: &file.0 }).await?;
        let file_path = info
            .file_path
            .ok_or_else(|| ChatError::Decode("getFile response carried no file_path".to_string()))?;

        debug!(file_path = %file_path, "downloading document");

        let response =
            self.client.get(self.file_url(&file_path)).send().await.map_err(|e| {
                error!(error = %e, "failed to download document");
                ChatError::Transport(format!("Network error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Api(format!("document download failed ({status})")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::Transport(format!("Network error: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn send_reply(&self, chat: ChatId, text: &str) -> Result<(), ChatError> {
        let _: serde_json::Value =
            self.invoke("sendMessage", &SendMessageRequest { chat_id: chat.0, text }).await?;
        debug!(chat = %chat, "reply delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(url: &str) -> TelegramAdapter {
        TelegramAdapter::with_base_url("TOKEN".to_string(), url.to_string(), Duration::ZERO)
            .unwrap()
    }

    #[tokio::test]
    async fn next_events_maps_updates_and_advances_offset() {
        let mut server = mockito::Server::new_async().await;

        let first = server
            .mock("POST", "/botTOKEN/getUpdates")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok":true,"result":[
                    {"update_id":9,"message":{"chat":{"id":42},"text":"/start"}},
                    {"update_id":10,"message":{"chat":{"id":42},"document":
                        {"file_id":"F1","mime_type":"application/x-bittorrent"}}}
                ]}"#,
            )
            .expect(1)
            .create();

        let adapter = adapter(&server.url());
        let events = adapter.next_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatEvent::Started { chat: ChatId(42) });

        first.assert();

        // The next poll must confirm everything seen so far.
        let second = server
            .mock("POST", "/botTOKEN/getUpdates")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"offset":11}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":[]}"#)
            .expect(1)
            .create();

        let events = adapter.next_events().await.unwrap();
        assert!(events.is_empty());

        second.assert();
    }

    #[tokio::test]
    async fn failed_envelope_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/botTOKEN/getUpdates")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
            .create();

        let result = adapter(&server.url()).next_events().await;
        match result.unwrap_err() {
            ChatError::Api(description) => assert_eq!(description, "Unauthorized"),
            other => panic!("Expected Api error, got {other:?}"),
        }

        mock.assert();
    }

    #[tokio::test]
    async fn fetch_document_resolves_path_then_downloads() {
        let mut server = mockito::Server::new_async().await;

        let get_file = server
            .mock("POST", "/botTOKEN/getFile")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"file_id":"F1"}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"file_id":"F1","file_path":"documents/file_1.torrent"}}"#)
            .create();

        let download = server
            .mock("GET", "/file/botTOKEN/documents/file_1.torrent")
            .with_status(200)
            .with_body([0u8, 1, 2, 3])
            .create();

        let bytes =
            adapter(&server.url()).fetch_document(&FileRef("F1".to_string())).await.unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);

        get_file.assert();
        download.assert();
    }

    #[tokio::test]
    async fn fetch_document_without_path_is_decode_error() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/botTOKEN/getFile")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"file_id":"F1"}}"#)
            .create();

        let result = adapter(&server.url()).fetch_document(&FileRef("F1".to_string())).await;
        assert!(matches!(result.unwrap_err(), ChatError::Decode(_)));

        mock.assert();
    }

    #[tokio::test]
    async fn send_reply_posts_chat_and_text() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"chat_id":42,"text":"Torrent added successfully."}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"message_id":1}}"#)
            .create();

        adapter(&server.url())
            .send_reply(ChatId(42), "Torrent added successfully.")
            .await
            .unwrap();

        mock.assert();
    }
}
