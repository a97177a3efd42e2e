//! Scripted transport: replays canned replies in order.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Command, Transport};
use crate::error::TransportError;
use crate::response::Response;

/// One canned reply.
///
/// In scenario files a reply is either a response body
/// (`{"jsonCode": 200, "onyxData": [...]}`) or a transport failure
/// (`{"networkError": "offline"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptedReply {
    NetworkError {
        #[serde(rename = "networkError")]
        network_error: String,
    },
    Respond(Response),
}

/// Transport that answers from a queue of scripted replies.
///
/// Once the script runs out every command succeeds with `jsonCode` 200.
/// Every command received is recorded for later inspection.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    sent: Mutex<Vec<Command>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Append a reply to the end of the script.
    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Commands received so far, in order.
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, command: &Command) -> Result<Response, TransportError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match reply {
            Some(ScriptedReply::NetworkError { network_error }) => {
                Err(TransportError::Connection(network_error))
            }
            Some(ScriptedReply::Respond(response)) => Ok(response),
            None => Ok(Response::ok()),
        }
    }

    fn transport_id(&self) -> &str {
        "scripted"
    }
}
