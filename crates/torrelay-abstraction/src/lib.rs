//! Contract layer for torrelay.
//!
//! This crate defines the seams between the three moving parts of the
//! bridge: the chat front-end, the transfer-submission flow, and the
//! download daemon. Concrete clients live in `torrelay-telegram` and
//! `torrelay-daemon`; the flow in `torrelay-core` only ever talks to the
//! traits defined here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error raised while talking to the download daemon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// Network or connection failure reaching the daemon.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The daemon reported an expired session token on the retried attempt.
    ///
    /// A single 409 is handled inside the client by retrying with the token
    /// carried on that response; this variant is only produced when the
    /// retry itself comes back 409 again.
    #[error("Session token rejected twice by the daemon")]
    SessionExpired,

    /// The daemon answered with a non-success, non-409 HTTP status.
    #[error("Daemon RPC error ({status}): {body}")]
    Rpc {
        /// HTTP status code returned by the daemon.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The call succeeded at the HTTP level but the daemon's `result`
    /// field was not `"success"`.
    #[error("Daemon rejected request: {0}")]
    Rejected(String),

    /// The daemon's response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Represents an error raised while talking to the chat platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Network or connection failure reaching the chat API.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The chat API answered but flagged the request as failed.
    #[error("Chat API error: {0}")]
    Api(String),

    /// The chat API's response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Opaque session token issued by the daemon.
///
/// Required as a header value on every RPC call. Tokens are short-lived
/// and never cached across submission flows: each flow acquires its own
/// and drops it when the flow ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a raw token string as received from the daemon.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Daemon-assigned transfer identifier.
///
/// Opaque to the bridge; it is only ever echoed back in status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(pub i64);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse transfer state, mapped from the daemon's numeric status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    /// Transfer is stopped.
    Stopped,
    /// Queued for local data verification.
    QueuedToVerify,
    /// Verifying local data.
    Verifying,
    /// Queued for download.
    QueuedToDownload,
    /// Actively downloading.
    Downloading,
    /// Queued for seeding.
    QueuedToSeed,
    /// Actively seeding.
    Seeding,
    /// A status code this bridge does not recognize.
    Unknown(i64),
}

impl TransferState {
    /// Maps a daemon status code to a state.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Stopped,
            1 => Self::QueuedToVerify,
            2 => Self::Verifying,
            3 => Self::QueuedToDownload,
            4 => Self::Downloading,
            5 => Self::QueuedToSeed,
            6 => Self::Seeding,
            other => Self::Unknown(other),
        }
    }

    /// Human-readable label used in chat replies.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::QueuedToVerify => "queued to verify",
            Self::Verifying => "verifying",
            Self::QueuedToDownload => "queued to download",
            Self::Downloading => "downloading",
            Self::QueuedToSeed => "queued to seed",
            Self::Seeding => "seeding",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Whether the daemon has actually started working on the transfer.
    ///
    /// Used by the flow to stop polling early once the snapshot carries
    /// meaningful metrics.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Downloading | Self::Seeding)
    }
}

/// One status snapshot of a transfer.
///
/// Valid only at the instant it was fetched; there is no freshness
/// guarantee beyond that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStatus {
    /// Transfer name, or `"unknown"` when the daemon omitted it.
    pub name: String,
    /// Coarse state.
    pub state: TransferState,
    /// Fractional completion, 0.0 to 1.0.
    pub percent_done: f64,
    /// Download rate in bytes/sec.
    pub rate_download: i64,
    /// Upload rate in bytes/sec.
    pub rate_upload: i64,
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            state: TransferState::Unknown(-1),
            percent_done: 0.0,
            rate_download: 0,
            rate_upload: 0,
        }
    }
}

impl TransferStatus {
    /// Whether the snapshot shows any activity worth reporting.
    #[must_use]
    pub fn has_activity(&self) -> bool {
        self.state.is_active()
            || self.percent_done > 0.0
            || self.rate_download > 0
            || self.rate_upload > 0
    }
}

/// Identifies the chat a reply should be delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform-side handle used to fetch a document's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef(pub String);

/// Metadata of a document received from the chat front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Handle for fetching the raw bytes.
    pub file_ref: FileRef,
    /// Declared MIME type, as reported by the platform.
    pub mime_type: Option<String>,
    /// Original file name, if the platform reported one.
    pub file_name: Option<String>,
}

/// An event delivered by the chat front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The user opened a conversation with the bot.
    Started {
        /// Originating chat.
        chat: ChatId,
    },
    /// The user sent a document.
    Document {
        /// Originating chat.
        chat: ChatId,
        /// Document metadata; bytes are fetched separately.
        document: DocumentMeta,
    },
}

/// A trait for the download daemon's session-gated RPC surface.
///
/// Implementations must be `Send + Sync`: each submission flow runs on its
/// own task and holds its own session token.
#[async_trait]
pub trait TransferDaemon: Send + Sync {
    /// Acquires a fresh session token.
    ///
    /// # Errors
    /// Returns a `DaemonError` on transport failure or when the daemon
    /// answers with a status that carries no token.
    async fn acquire_session(&self) -> Result<SessionToken, DaemonError>;

    /// Submits a transfer descriptor (raw metafile bytes).
    ///
    /// Returns the daemon-assigned identifier, or `None` when the daemon
    /// accepted the call but reported no identifier.
    ///
    /// # Errors
    /// Returns a `DaemonError` if the call fails.
    async fn add_transfer(
        &self,
        token: &SessionToken,
        metainfo: &[u8],
    ) -> Result<Option<TransferId>, DaemonError>;

    /// Fetches one status snapshot for a transfer.
    ///
    /// # Errors
    /// Returns a `DaemonError` if the call fails.
    async fn transfer_status(
        &self,
        token: &SessionToken,
        id: TransferId,
    ) -> Result<TransferStatus, DaemonError>;
}

/// A trait for the chat front-end.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Waits for and returns the next batch of chat events.
    ///
    /// # Errors
    /// Returns a `ChatError` if polling the platform fails.
    async fn next_events(&self) -> Result<Vec<ChatEvent>, ChatError>;

    /// Fetches the raw bytes of a previously announced document.
    ///
    /// # Errors
    /// Returns a `ChatError` if the platform refuses or the download fails.
    async fn fetch_document(&self, file: &FileRef) -> Result<Vec<u8>, ChatError>;

    /// Sends a plain-text reply to a chat.
    ///
    /// # Errors
    /// Returns a `ChatError` if delivery fails.
    async fn send_reply(&self, chat: ChatId, text: &str) -> Result<(), ChatError>;
}
