//! The session-gated RPC client.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use torrelay_abstraction::{
    DaemonError, SessionToken, TransferDaemon, TransferId, TransferStatus,
};
use tracing::{debug, error};

use crate::protocol::{
    AddRequest, AddResponse, GetRequest, GetResponse, RpcRequest, RpcResponse, STATUS_FIELDS,
    TorrentFields,
};

/// Header the daemon uses to issue and expect session tokens.
pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Transmission RPC client.
///
/// Holds the endpoint URL, basic-auth credentials, and a reqwest client
/// built with an explicit request timeout. The client is safe to share
/// across submission flows; session tokens are not shared, each flow
/// acquires and threads its own.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    /// RPC endpoint URL, e.g. `http://localhost:9091/transmission/rpc/`.
    url: String,
    /// Basic-auth username.
    username: String,
    /// Basic-auth password.
    password: String,
    /// HTTP client for making requests.
    client: Client,
}

impl DaemonClient {
    /// Creates a new `DaemonClient`.
    ///
    /// # Arguments
    /// * `url` - The daemon's RPC endpoint URL
    /// * `username` / `password` - Basic-auth credentials
    /// * `timeout` - Per-request timeout applied to every RPC call
    ///
    /// # Errors
    /// Returns a `DaemonError` if the HTTP client cannot be created.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DaemonError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DaemonError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { url: url.into(), username: username.into(), password: password.into(), client })
    }

    /// Extracts the session token from a response's headers.
    fn token_from_response(response: &Response) -> Result<SessionToken, DaemonError> {
        response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(SessionToken::new)
            .ok_or_else(|| {
                DaemonError::Decode(format!("response carried no {SESSION_HEADER} header"))
            })
    }

    /// Sends one RPC request with the given token attached.
    async fn post<A>(
        &self,
        request: &RpcRequest<'_, A>,
        token: &SessionToken,
    ) -> Result<Response, DaemonError>
    where
        A: Serialize,
    {
        self.client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(SESSION_HEADER, token.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %self.url, "failed to reach daemon");
                DaemonError::Transport(format!("Network error: {e}"))
            })
    }

    /// Performs an RPC call, retrying exactly once on token expiry.
    ///
    /// The daemon signals a stale token with 409 and puts the replacement
    /// token on that same response, so the retry needs no extra round
    /// trip. A second 409 fails hard; retrying further would loop forever
    /// against a misconfigured daemon.
    async fn call<A, T>(
        &self,
        method: &str,
        arguments: A,
        token: &SessionToken,
    ) -> Result<T, DaemonError>
    where
        A: Serialize + Send + Sync,
        T: DeserializeOwned + Default,
    {
        let request = RpcRequest { method, arguments };

        let response = self.post(&request, token).await?;
        if response.status() != StatusCode::CONFLICT {
            return Self::decode(response).await;
        }

        let fresh = Self::token_from_response(&response)?;
        debug!(method, "session token expired, retrying once with refreshed token");

        let retry = self.post(&request, &fresh).await?;
        if retry.status() == StatusCode::CONFLICT {
            error!(method, "refreshed session token rejected as well");
            return Err(DaemonError::SessionExpired);
        }
        Self::decode(retry).await
    }

    /// Decodes a non-409 RPC response into its arguments.
    async fn decode<T>(response: Response) -> Result<T, DaemonError>
    where
        T: DeserializeOwned + Default,
    {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %body, "daemon returned error status");
            return Err(DaemonError::Rpc { status: status.as_u16(), body });
        }

        let envelope: RpcResponse<T> = response.json().await.map_err(|e| {
            error!(error = %e, "failed to parse daemon response");
            DaemonError::Decode(format!("failed to parse daemon response: {e}"))
        })?;

        if envelope.result != "success" {
            return Err(DaemonError::Rejected(envelope.result));
        }
        Ok(envelope.arguments.unwrap_or_default())
    }
}

#[async_trait]
impl TransferDaemon for DaemonClient {
    async fn acquire_session(&self) -> Result<SessionToken, DaemonError> {
        debug!(url = %self.url, "acquiring session token");

        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %self.url, "failed to reach daemon");
                DaemonError::Transport(format!("Network error: {e}"))
            })?;

        let status = response.status();
        // Both a success response and the 409 expiry response carry a
        // usable token in the session header.
        if status.is_success() || status == StatusCode::CONFLICT {
            return Self::token_from_response(&response);
        }

        let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        error!(status = %status, body = %body, "daemon refused session acquisition");
        Err(DaemonError::Rpc { status: status.as_u16(), body })
    }

    async fn add_transfer(
        &self,
        token: &SessionToken,
        metainfo: &[u8],
    ) -> Result<Option<TransferId>, DaemonError> {
        debug!(payload_len = metainfo.len(), "submitting transfer");

        let arguments = AddRequest { metainfo: STANDARD.encode(metainfo) };
        let response: AddResponse = self.call("torrent-add", arguments, token).await?;

        Ok(response.torrent_added.and_then(|added| added.id).map(TransferId))
    }

    async fn transfer_status(
        &self,
        token: &SessionToken,
        id: TransferId,
    ) -> Result<TransferStatus, DaemonError> {
        debug!(id = %id, "querying transfer status");

        let arguments = GetRequest { ids: vec![id.0], fields: STATUS_FIELDS.to_vec() };
        let response: GetResponse = self.call("torrent-get", arguments, token).await?;

        Ok(response
            .torrents
            .into_iter()
            .next()
            .map_or_else(TransferStatus::default, TorrentFields::into_status))
    }
}
