//! The serving loop.

use std::sync::Arc;
use std::time::Duration;
use torrelay_abstraction::{ChatAdapter, ChatEvent, TransferDaemon};
use tracing::{error, info, warn};

use crate::config::FlowSettings;
use crate::flow;

/// Pause before re-polling after a chat transport error.
const POLL_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Wires the chat front-end to the daemon client and serves events.
///
/// Each document spawns its own task, so one flow's status wait never
/// stalls the poll loop or other in-flight flows; flows share nothing
/// but the clients themselves.
pub struct Bridge<D, C> {
    daemon: Arc<D>,
    chat: Arc<C>,
    settings: FlowSettings,
}

impl<D, C> Bridge<D, C>
where
    D: TransferDaemon + 'static,
    C: ChatAdapter + 'static,
{
    /// Creates a bridge over the given clients.
    pub fn new(daemon: D, chat: C, settings: FlowSettings) -> Self {
        Self { daemon: Arc::new(daemon), chat: Arc::new(chat), settings }
    }

    /// Serves chat events until interrupted.
    ///
    /// Poll errors are logged and retried after a pause; they never bring
    /// the loop down.
    pub async fn run(&self) {
        info!("bridge started");

        loop {
            let events = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break;
                }
                events = self.chat.next_events() => events,
            };

            match events {
                Ok(events) => {
                    for event in events {
                        self.dispatch(event);
                    }
                }
                Err(error) => {
                    warn!(error = %error, "event poll failed, retrying");
                    tokio::time::sleep(POLL_RETRY_PAUSE).await;
                }
            }
        }
    }

    fn dispatch(&self, event: ChatEvent) {
        match event {
            ChatEvent::Started { chat } => {
                let adapter = Arc::clone(&self.chat);
                tokio::spawn(async move {
                    if let Err(error) = adapter.send_reply(chat, flow::GREETING).await {
                        error!(chat = %chat, error = %error, "failed to send greeting");
                    }
                });
            }
            ChatEvent::Document { chat, document } => {
                let daemon = Arc::clone(&self.daemon);
                let adapter = Arc::clone(&self.chat);
                let settings = self.settings.clone();
                tokio::spawn(async move {
                    flow::handle_document(
                        daemon.as_ref(),
                        adapter.as_ref(),
                        &settings,
                        chat,
                        document,
                    )
                    .await;
                });
            }
        }
    }
}
