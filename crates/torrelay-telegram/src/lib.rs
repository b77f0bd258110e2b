//! Telegram Bot API adapter for torrelay.
//!
//! Implements the `ChatAdapter` trait over the Bot API: `getUpdates` long
//! polling for events, the two-step `getFile` + download for document
//! bytes, and `sendMessage` for replies.

pub mod adapter;
pub mod protocol;

pub use adapter::TelegramAdapter;
