//! # Application Module
//!
//! ## Submodules
//!
//! - [`resolver`] - locates an action's endpoint and renders its path
//! - [`state`] - per-tool config, input, queued files and field errors
//! - [`gate`] - the non-reentrant "generating" gate
//! - [`content`] - content builders and file encoding
//! - [`ports`] - collaborators the engine consumes (storage, notifications, UI)
//! - [`engine`] - the action dispatcher
//! - [`poller`] - periodic side-channel actions (metrics, logs)

pub mod content;
pub mod engine;
pub mod gate;
pub mod poller;
pub mod ports;
pub mod resolver;
pub mod state;
