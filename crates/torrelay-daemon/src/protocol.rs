//! Wire format of the Transmission RPC endpoint.
//!
//! Requests are `{method, arguments}` JSON objects; responses wrap their
//! payload in `{result, arguments}` where `result` is `"success"` on the
//! happy path and an error string otherwise.

use serde::{Deserialize, Serialize};
use torrelay_abstraction::{TransferState, TransferStatus};

/// Fields requested from `torrent-get` for a status snapshot.
pub const STATUS_FIELDS: [&str; 5] =
    ["name", "status", "percentDone", "rateDownload", "rateUpload"];

/// RPC request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, A> {
    /// Method name, e.g. `torrent-add`.
    pub method: &'a str,
    /// Method-specific arguments.
    pub arguments: A,
}

/// RPC response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<A> {
    /// `"success"` or a daemon-provided error string.
    pub result: String,
    /// Method-specific response arguments; absent on some errors.
    #[serde(default)]
    pub arguments: Option<A>,
}

/// Arguments for `torrent-add`.
#[derive(Debug, Serialize)]
pub struct AddRequest {
    /// Base64-encoded metafile content.
    pub metainfo: String,
}

/// Response arguments of `torrent-add`.
#[derive(Debug, Default, Deserialize)]
pub struct AddResponse {
    /// Present when the daemon registered a new transfer.
    #[serde(rename = "torrent-added", default)]
    pub torrent_added: Option<AddedTorrent>,
}

/// The `torrent-added` object.
#[derive(Debug, Deserialize)]
pub struct AddedTorrent {
    /// Daemon-assigned identifier; the daemon may omit it.
    #[serde(default)]
    pub id: Option<i64>,
}

/// Arguments for `torrent-get`.
#[derive(Debug, Serialize)]
pub struct GetRequest {
    /// Transfer ids to query.
    pub ids: Vec<i64>,
    /// Field names to include in the snapshot.
    pub fields: Vec<&'static str>,
}

/// Response arguments of `torrent-get`.
#[derive(Debug, Default, Deserialize)]
pub struct GetResponse {
    /// One entry per queried id that the daemon knows about.
    #[serde(default)]
    pub torrents: Vec<TorrentFields>,
}

/// A single torrent entry as returned by `torrent-get`.
///
/// Every field is optional: the daemon only echoes what was requested and
/// may omit fields it has no value for yet. Missing fields fall back to
/// the snapshot defaults rather than failing the whole flow.
#[derive(Debug, Default, Deserialize)]
pub struct TorrentFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(rename = "percentDone", default)]
    pub percent_done: Option<f64>,
    #[serde(rename = "rateDownload", default)]
    pub rate_download: Option<i64>,
    #[serde(rename = "rateUpload", default)]
    pub rate_upload: Option<i64>,
}

impl TorrentFields {
    /// Converts the wire entry into a snapshot, substituting defaults for
    /// anything the daemon omitted.
    pub fn into_status(self) -> TransferStatus {
        let defaults = TransferStatus::default();
        TransferStatus {
            name: self.name.unwrap_or(defaults.name),
            state: self.status.map_or(defaults.state, TransferState::from_code),
            percent_done: self.percent_done.unwrap_or(defaults.percent_done),
            rate_download: self.rate_download.unwrap_or(defaults.rate_download),
            rate_upload: self.rate_upload.unwrap_or(defaults.rate_upload),
        }
    }
}
