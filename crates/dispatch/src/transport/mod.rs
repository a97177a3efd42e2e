//! Transport abstraction between the command queue and the server.
//!
//! The queue hands a [`Command`] to a [`Transport`] and gets back either a
//! [`Response`] or a [`TransportError`]. It knows nothing about HTTP or
//! sockets:
//! - [`HttpTransport`] posts form-encoded commands to a REST endpoint
//! - [`ScriptedTransport`] replays canned replies (tests, offline scenarios)

#[cfg(feature = "http")]
mod http;
mod scripted;

#[cfg(feature = "http")]
pub use http::{HttpTransport, AUTH_TOKEN_ENV};
pub use scripted::{ScriptedReply, ScriptedTransport};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::params::Params;
use crate::response::Response;

/// A named remote operation and its parameters, as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub params: Params,
}

/// Sends ONE command to the server and waits for its answer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, command: &Command) -> Result<Response, TransportError>;

    /// Returns this transport's identifier (e.g. "http", "scripted").
    fn transport_id(&self) -> &str;
}
