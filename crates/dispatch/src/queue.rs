//! Sequential command queue.
//!
//! Commands are sent one at a time in enqueue order, which gives FIFO
//! ordering per key (and, as a consequence, across keys). Retryable
//! transport failures are retried with exponential backoff before the
//! command is given up on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::mutation::{Mutation, MutationId};
use crate::response::{Outcome, Response};
use crate::transport::{Command, Transport};

/// How often and how patiently a command is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Send `command`, retrying retryable failures according to `policy`.
pub async fn send_with_retry(
    transport: &dyn Transport,
    command: &Command,
    policy: &RetryPolicy,
) -> Result<Response, TransportError> {
    let mut attempt = 0;
    loop {
        match transport.send(command).await {
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    command = %command.name,
                    transport = transport.transport_id(),
                    attempt,
                    error = %e,
                    ?delay,
                    "command failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// A mutation waiting in the queue.
pub(crate) struct Job {
    pub(crate) id: MutationId,
    pub(crate) mutation: Arc<Mutation>,
    pub(crate) reply: oneshot::Sender<Outcome>,
}

/// Called by the worker once per job with the classified outcome.
pub(crate) trait Settle: Send + Sync + 'static {
    fn settle(&self, id: MutationId, mutation: &Mutation, outcome: &Outcome);
}

/// Drain `jobs` one at a time until every sender is dropped.
pub(crate) async fn run_worker<S: Settle + ?Sized>(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    settler: Arc<S>,
) {
    while let Some(job) = jobs.recv().await {
        let command = job.mutation.command();
        debug!(id = %job.id, command = %command.name, "dequeued command");

        let result = send_with_retry(transport.as_ref(), &command, &policy).await;
        let outcome = Outcome::from_transport(result);

        settler.settle(job.id, &job.mutation, &outcome);

        // The caller may have dropped its handle; the store is already settled.
        let _ = job.reply.send(outcome);
    }
    debug!("command queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedReply, ScriptedTransport};

    fn offline() -> ScriptedReply {
        ScriptedReply::NetworkError {
            network_error: "offline".into(),
        }
    }

    fn command() -> Command {
        Command {
            name: "OpenReport".into(),
            params: Default::default(),
        }
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let transport = ScriptedTransport::new([offline(), offline()]);
        let response = send_with_retry(&transport, &command(), &fast(3)).await.unwrap();
        assert!(response.is_success());
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let transport = ScriptedTransport::new([offline(), offline(), offline()]);
        let err = send_with_retry(&transport, &command(), &fast(1)).await.unwrap_err();
        assert_eq!(err, TransportError::Connection("offline".into()));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn server_answers_are_not_retried() {
        let transport = ScriptedTransport::new([ScriptedReply::Respond(Response::with_code(
            402, "bad",
        ))]);
        let response = send_with_retry(&transport, &command(), &fast(3)).await.unwrap();
        assert_eq!(response.json_code, 402);
        assert_eq!(transport.sent().len(), 1);
    }
}
