//! Optimistic mutation dispatch.
//!
//! A [`Mutation`] bundles a named remote command with three sets of store
//! patches. [`MutationDispatcher::write`] applies the optimistic set at once,
//! queues the command, and once the server answers applies exactly one of
//! the success or failure sets through [`reduce`].
//!
//! The dispatcher never talks to the network directly; it depends only on
//! the [`Transport`] trait.

mod dispatcher;
mod error;
mod mutation;
mod params;
pub mod queue;
mod reducer;
mod response;
pub mod transport;

pub use dispatcher::{
    persisted_requests, DispatchConfig, MutationDispatcher, MutationHandle, PersistedRequest,
    PERSISTED_REQUESTS_KEY,
};
pub use error::{DispatchError, MutationError, TransportError};
pub use mutation::{Mutation, MutationBuilder, MutationId};
pub use params::{ParamValue, Params};
pub use queue::RetryPolicy;
pub use reducer::reduce;
pub use response::{Outcome, Response, CONFLICT_CODES, SUCCESS_CODE};
pub use transport::{Command, ScriptedReply, ScriptedTransport, Transport};

#[cfg(feature = "http")]
pub use transport::HttpTransport;
