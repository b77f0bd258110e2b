//! Bridge core for torrelay.
//!
//! Hosts the transfer-submission flow, the spool-file lifecycle, reply
//! formatting, configuration, and the serving loop. Everything here works
//! against the `TransferDaemon` and `ChatAdapter` traits; concrete
//! clients are injected by the binary.

pub mod config;
pub mod flow;
pub mod format;
pub mod service;
pub mod spool;

pub use config::{BridgeConfig, ConfigError, DaemonSettings, FlowSettings, TelegramSettings};
pub use flow::FlowError;
pub use service::Bridge;
