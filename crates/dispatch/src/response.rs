use onyx_store::StorePatch;
use serde::{Deserialize, Serialize};

use crate::error::{MutationError, TransportError};

/// `jsonCode` of a successful command.
pub const SUCCESS_CODE: i64 = 200;

/// `jsonCode`s meaning the target entity was deleted or changed concurrently.
pub const CONFLICT_CODES: [i64; 2] = [404, 409];

/// Body returned by the server for one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub json_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Server-pushed updates, applied before the mutation's success patches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub onyx_data: Vec<StorePatch>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            json_code: SUCCESS_CODE,
            message: None,
            onyx_data: Vec::new(),
        }
    }

    pub fn with_code(json_code: i64, message: impl Into<String>) -> Self {
        Self {
            json_code,
            message: Some(message.into()),
            onyx_data: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.json_code == SUCCESS_CODE
    }
}

/// How a mutation settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Response),
    Failure(MutationError),
}

impl Outcome {
    /// Classify the final result of sending a command.
    ///
    /// A response with an unexpected `jsonCode` is treated exactly like a
    /// network failure; conflict codes become [`MutationError::Conflict`].
    pub fn from_transport(result: Result<Response, TransportError>) -> Self {
        match result {
            Ok(response) if response.is_success() => Outcome::Success(response),
            Ok(response) if CONFLICT_CODES.contains(&response.json_code) => {
                Outcome::Failure(MutationError::Conflict {
                    code: response.json_code,
                    message: response
                        .message
                        .unwrap_or_else(|| "The item was changed or deleted".to_string()),
                })
            }
            Ok(response) => Outcome::Failure(MutationError::Network {
                message: response
                    .message
                    .unwrap_or_else(|| format!("unexpected jsonCode {}", response.json_code)),
            }),
            Err(e) => Outcome::Failure(MutationError::Network {
                message: e.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn error(&self) -> Option<&MutationError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_code_is_success() {
        assert!(Outcome::from_transport(Ok(Response::ok())).is_success());
    }

    #[test]
    fn wrong_code_is_network_failure() {
        let outcome = Outcome::from_transport(Ok(Response::with_code(666, "Server error")));
        assert_eq!(
            outcome.error(),
            Some(&MutationError::Network {
                message: "Server error".into()
            })
        );
    }

    #[test]
    fn missing_message_names_the_code() {
        let response = Response {
            json_code: 500,
            message: None,
            onyx_data: Vec::new(),
        };
        let outcome = Outcome::from_transport(Ok(response));
        assert_eq!(outcome.error().unwrap().message(), "unexpected jsonCode 500");
    }

    #[test]
    fn conflict_codes_map_to_conflict() {
        let outcome = Outcome::from_transport(Ok(Response::with_code(404, "Report not found")));
        assert!(matches!(
            outcome.error(),
            Some(MutationError::Conflict { code: 404, .. })
        ));
    }

    #[test]
    fn transport_error_is_network_failure() {
        let outcome =
            Outcome::from_transport(Err(TransportError::Connection("offline".into())));
        assert!(matches!(
            outcome.error(),
            Some(MutationError::Network { .. })
        ));
    }
}
