//! # Infrastructure
//!
//! - [`session`] - server-assigned session token, persisted locally
//! - [`sse`] - incremental Server-Sent-Events decoder
//! - [`transport`] - the HTTP call itself

pub mod session;
pub mod sse;
pub mod transport;
