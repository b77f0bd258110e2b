//! Transmission RPC client for torrelay.
//!
//! This crate implements the `TransferDaemon` trait against Transmission's
//! session-gated RPC endpoint. The daemon hands out short-lived session
//! tokens in a response header and signals a stale token with HTTP 409;
//! the 409 response itself always carries the next valid token, so a
//! single retry is enough and no separate refresh round trip exists.

pub mod client;
pub mod protocol;

pub use client::DaemonClient;
