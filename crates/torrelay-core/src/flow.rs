//! The transfer-submission flow.
//!
//! One invocation of [`handle_document`] moves a descriptor from
//! "received from chat" to "submitted to daemon" to "one status snapshot
//! reported", and always produces exactly one chat reply.

use std::time::Instant;
use thiserror::Error;
use torrelay_abstraction::{
    ChatAdapter, ChatError, ChatId, DaemonError, DocumentMeta, SessionToken, TransferDaemon,
    TransferId, TransferStatus,
};
use tracing::{debug, error, info};

use crate::config::FlowSettings;
use crate::format;
use crate::spool::SpoolFile;

/// MIME type of torrent metafiles; anything else is rejected up front.
pub const TORRENT_MIME: &str = "application/x-bittorrent";

/// Greeting sent when a user opens the conversation.
pub const GREETING: &str = "Send me a .torrent file and I'll pass it to the download daemon.";

/// Reply for documents that are not torrent metafiles.
pub const REJECT_NON_TORRENT: &str = "Please send a .torrent file.";

/// Reply when the daemon accepted the call but reported no identifier.
pub const NO_ID_AFTER_ADD: &str = "No torrent id found after adding.";

/// Represents a failed submission flow.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The document's declared MIME type is not the torrent type.
    #[error("Unsupported document type: {0}")]
    UnsupportedDocument(String),

    /// The daemon accepted the call but returned no usable identifier.
    #[error("No transfer identifier found after adding")]
    SubmissionRejected,

    /// Daemon-side failure.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Chat-side failure while fetching the document.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Spool I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs one submission flow and sends exactly one reply.
///
/// Failures terminate this flow only; the caller's event loop keeps
/// serving other chats.
pub async fn handle_document<D, C>(
    daemon: &D,
    chat: &C,
    settings: &FlowSettings,
    chat_id: ChatId,
    document: DocumentMeta,
) where
    D: TransferDaemon + ?Sized,
    C: ChatAdapter + ?Sized,
{
    let reply = match submit(daemon, chat, settings, &document).await {
        Ok(status) => format::summary(&status),
        Err(FlowError::UnsupportedDocument(mime)) => {
            debug!(chat = %chat_id, mime = %mime, "rejecting non-torrent document");
            REJECT_NON_TORRENT.to_string()
        }
        Err(FlowError::SubmissionRejected) => NO_ID_AFTER_ADD.to_string(),
        Err(error @ (FlowError::Daemon(_) | FlowError::Chat(_))) => {
            error!(chat = %chat_id, error = %error, "submission failed");
            format!("Request error: {error}")
        }
        Err(error) => {
            error!(chat = %chat_id, error = %error, "submission failed unexpectedly");
            format!("Error: {error}")
        }
    };

    if let Err(error) = chat.send_reply(chat_id, &reply).await {
        error!(chat = %chat_id, error = %error, "failed to deliver reply");
    }
}

/// The flow body; the spool guard drops on every exit path.
async fn submit<D, C>(
    daemon: &D,
    chat: &C,
    settings: &FlowSettings,
    document: &DocumentMeta,
) -> Result<TransferStatus, FlowError>
where
    D: TransferDaemon + ?Sized,
    C: ChatAdapter + ?Sized,
{
    // Gate on the declared type before any RPC work or file I/O.
    let mime = document.mime_type.as_deref().unwrap_or("");
    if mime != TORRENT_MIME {
        return Err(FlowError::UnsupportedDocument(mime.to_string()));
    }

    let bytes = chat.fetch_document(&document.file_ref).await?;
    let spool = SpoolFile::write(&settings.spool_dir, &document.file_ref.0, &bytes)?;
    debug!(path = %spool.path().display(), payload_len = bytes.len(), "descriptor spooled");

    let payload = std::fs::read(spool.path())?;
    let token = daemon.acquire_session().await?;
    let id = daemon
        .add_transfer(&token, &payload)
        .await?
        .ok_or(FlowError::SubmissionRejected)?;
    info!(id = %id, "transfer submitted");

    Ok(poll_status(daemon, &token, id, settings).await?)
}

/// Polls the status snapshot until it shows activity or the configured
/// bound elapses, reporting the last snapshot either way.
///
/// The bound replaces a fixed post-submission sleep: the daemon needs an
/// unknowable amount of time to register initial metrics, so the flow
/// checks at short intervals and settles for whatever it has at the
/// deadline.
async fn poll_status<D>(
    daemon: &D,
    token: &SessionToken,
    id: TransferId,
    settings: &FlowSettings,
) -> Result<TransferStatus, DaemonError>
where
    D: TransferDaemon + ?Sized,
{
    let deadline = Instant::now() + settings.status_poll_timeout();

    loop {
        let status = daemon.transfer_status(token, id).await?;
        if status.has_activity() || Instant::now() >= deadline {
            return Ok(status);
        }
        debug!(id = %id, interval = ?settings.status_poll_interval(), "transfer not active yet");
        tokio::time::sleep(settings.status_poll_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use torrelay_abstraction::{ChatEvent, FileRef, TransferState};

    struct FakeDaemon {
        add_response: Result<Option<TransferId>, DaemonError>,
        statuses: Mutex<Vec<TransferStatus>>,
        sessions: AtomicUsize,
        adds: AtomicUsize,
        polls: AtomicUsize,
    }

    impl FakeDaemon {
        fn accepting(statuses: Vec<TransferStatus>) -> Self {
            Self {
                add_response: Ok(Some(TransferId(1))),
                statuses: Mutex::new(statuses),
                sessions: AtomicUsize::new(0),
                adds: AtomicUsize::new(0),
                polls: AtomicUsize::new(0),
            }
        }

        fn with_add_response(add_response: Result<Option<TransferId>, DaemonError>) -> Self {
            Self {
                add_response,
                statuses: Mutex::new(Vec::new()),
                sessions: AtomicUsize::new(0),
                adds: AtomicUsize::new(0),
                polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransferDaemon for FakeDaemon {
        async fn acquire_session(&self) -> Result<SessionToken, DaemonError> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(SessionToken::new("tok"))
        }

        async fn add_transfer(
            &self,
            _token: &SessionToken,
            _metainfo: &[u8],
        ) -> Result<Option<TransferId>, DaemonError> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            self.add_response.clone()
        }

        async fn transfer_status(
            &self,
            _token: &SessionToken,
            _id: TransferId,
        ) -> Result<TransferStatus, DaemonError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                Ok(statuses.remove(0))
            } else {
                Ok(statuses.first().cloned().unwrap_or_default())
            }
        }
    }

    struct FakeChat {
        fetches: AtomicUsize,
        replies: Mutex<Vec<(ChatId, String)>>,
    }

    impl FakeChat {
        fn new() -> Self {
            Self { fetches: AtomicUsize::new(0), replies: Mutex::new(Vec::new()) }
        }

        fn replies(&self) -> Vec<(ChatId, String)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatAdapter for FakeChat {
        async fn next_events(&self) -> Result<Vec<ChatEvent>, ChatError> {
            Ok(Vec::new())
        }

        async fn fetch_document(&self, _file: &FileRef) -> Result<Vec<u8>, ChatError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(b"d8:announce0:e".to_vec())
        }

        async fn send_reply(&self, chat: ChatId, text: &str) -> Result<(), ChatError> {
            self.replies.lock().unwrap().push((chat, text.to_string()));
            Ok(())
        }
    }

    fn torrent_document() -> DocumentMeta {
        DocumentMeta {
            file_ref: FileRef("F1".to_string()),
            mime_type: Some(TORRENT_MIME.to_string()),
            file_name: Some("debian.torrent".to_string()),
        }
    }

    fn active_status() -> TransferStatus {
        TransferStatus {
            name: "X".to_string(),
            state: TransferState::Downloading,
            percent_done: 0.4321,
            rate_download: 2048,
            rate_upload: 0,
        }
    }

    fn settings(dir: &Path) -> FlowSettings {
        FlowSettings {
            spool_dir: dir.to_path_buf(),
            status_poll_interval_secs: 0,
            status_poll_timeout_secs: 0,
        }
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn valid_document_submits_once_and_reports_summary() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = FakeDaemon::accepting(vec![active_status()]);
        let chat = FakeChat::new();

        handle_document(&daemon, &chat, &settings(dir.path()), ChatId(42), torrent_document())
            .await;

        assert_eq!(daemon.sessions.load(Ordering::SeqCst), 1);
        assert_eq!(daemon.adds.load(Ordering::SeqCst), 1);
        assert_eq!(daemon.polls.load(Ordering::SeqCst), 1);

        let replies = chat.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, ChatId(42));
        assert!(replies[0].1.contains("Torrent added successfully."));
        assert!(replies[0].1.contains("43.21%"));
        assert!(replies[0].1.contains("2.00 KB/s"));

        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn non_torrent_document_is_rejected_before_any_rpc() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = FakeDaemon::accepting(vec![active_status()]);
        let chat = FakeChat::new();

        let mut document = torrent_document();
        document.mime_type = Some("application/pdf".to_string());
        handle_document(&daemon, &chat, &settings(dir.path()), ChatId(42), document).await;

        assert_eq!(daemon.sessions.load(Ordering::SeqCst), 0);
        assert_eq!(daemon.adds.load(Ordering::SeqCst), 0);
        assert_eq!(chat.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(chat.replies(), vec![(ChatId(42), REJECT_NON_TORRENT.to_string())]);
    }

    #[tokio::test]
    async fn document_without_mime_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = FakeDaemon::accepting(vec![active_status()]);
        let chat = FakeChat::new();

        let mut document = torrent_document();
        document.mime_type = None;
        handle_document(&daemon, &chat, &settings(dir.path()), ChatId(42), document).await;

        assert_eq!(daemon.adds.load(Ordering::SeqCst), 0);
        assert_eq!(chat.replies(), vec![(ChatId(42), REJECT_NON_TORRENT.to_string())]);
    }

    #[tokio::test]
    async fn missing_id_ends_the_flow_without_a_status_query() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = FakeDaemon::with_add_response(Ok(None));
        let chat = FakeChat::new();

        handle_document(&daemon, &chat, &settings(dir.path()), ChatId(42), torrent_document())
            .await;

        assert_eq!(daemon.adds.load(Ordering::SeqCst), 1);
        assert_eq!(daemon.polls.load(Ordering::SeqCst), 0);
        assert_eq!(chat.replies(), vec![(ChatId(42), NO_ID_AFTER_ADD.to_string())]);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn daemon_error_reports_request_error_and_cleans_the_spool() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = FakeDaemon::with_add_response(Err(DaemonError::Transport(
            "connection refused".to_string(),
        )));
        let chat = FakeChat::new();

        handle_document(&daemon, &chat, &settings(dir.path()), ChatId(42), torrent_document())
            .await;

        let replies = chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.starts_with("Request error:"));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn unexpected_io_failure_reports_plain_error() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the spool directory should be makes the spool
        // write fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let daemon = FakeDaemon::accepting(vec![active_status()]);
        let chat = FakeChat::new();
        let settings = FlowSettings {
            spool_dir: blocker.join("sub"),
            status_poll_interval_secs: 0,
            status_poll_timeout_secs: 0,
        };

        handle_document(&daemon, &chat, &settings, ChatId(42), torrent_document()).await;

        assert_eq!(daemon.adds.load(Ordering::SeqCst), 0);
        let replies = chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.starts_with("Error:"));
    }

    #[tokio::test]
    async fn poll_stops_early_once_the_transfer_shows_activity() {
        let dir = tempfile::tempdir().unwrap();
        let daemon =
            FakeDaemon::accepting(vec![TransferStatus::default(), active_status()]);
        let chat = FakeChat::new();
        let settings = FlowSettings {
            spool_dir: dir.path().to_path_buf(),
            status_poll_interval_secs: 0,
            status_poll_timeout_secs: 60,
        };

        handle_document(&daemon, &chat, &settings, ChatId(42), torrent_document()).await;

        assert_eq!(daemon.polls.load(Ordering::SeqCst), 2);
        assert!(chat.replies()[0].1.contains("43.21%"));
    }

    #[tokio::test]
    async fn poll_reports_the_last_snapshot_at_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = FakeDaemon::accepting(vec![TransferStatus::default()]);
        let chat = FakeChat::new();

        handle_document(&daemon, &chat, &settings(dir.path()), ChatId(42), torrent_document())
            .await;

        assert_eq!(daemon.polls.load(Ordering::SeqCst), 1);
        let replies = chat.replies();
        assert!(replies[0].1.contains("Progress: 0.00%"));
        assert!(replies[0].1.contains("Name: unknown"));
    }
}
