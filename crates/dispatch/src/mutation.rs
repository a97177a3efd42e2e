use std::fmt;

use onyx_store::StorePatch;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::params::{ParamValue, Params};
use crate::transport::Command;

/// Dispatcher-assigned identifier, increasing in write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(pub u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named remote operation bundled with its local patch sets.
///
/// Immutable once built: there are no setters, and the dispatcher consumes
/// it exactly once. The serialized form (camelCase fields) is also the
/// persisted-request and scenario-file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    name: String,
    #[serde(default)]
    params: Params,
    #[serde(default)]
    optimistic_data: Vec<StorePatch>,
    #[serde(default)]
    success_data: Vec<StorePatch>,
    #[serde(default)]
    failure_data: Vec<StorePatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    finally_data: Vec<StorePatch>,
}

impl Mutation {
    pub fn builder(name: impl Into<String>) -> MutationBuilder {
        MutationBuilder {
            mutation: Mutation {
                name: name.into(),
                params: Params::new(),
                optimistic_data: Vec::new(),
                success_data: Vec::new(),
                failure_data: Vec::new(),
                finally_data: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn optimistic_data(&self) -> &[StorePatch] {
        &self.optimistic_data
    }

    pub fn success_data(&self) -> &[StorePatch] {
        &self.success_data
    }

    pub fn failure_data(&self) -> &[StorePatch] {
        &self.failure_data
    }

    pub fn finally_data(&self) -> &[StorePatch] {
        &self.finally_data
    }

    /// The command sent to the server for this mutation.
    pub fn command(&self) -> Command {
        Command {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }

    /// Local checks run before any optimistic patch is applied.
    pub fn validate(&self) -> Result<(), DispatchError> {
        let invalid = |message: String| DispatchError::Validation {
            name: self.name.clone(),
            message,
        };

        if self.name.is_empty() {
            return Err(invalid("command name is empty".to_string()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid(format!(
                "command name '{}' must be ASCII alphanumeric",
                self.name
            )));
        }
        if self.params.keys().any(|k| k.is_empty()) {
            return Err(invalid("parameter with empty name".to_string()));
        }

        let all_patches = self
            .optimistic_data
            .iter()
            .chain(&self.success_data)
            .chain(&self.failure_data)
            .chain(&self.finally_data);
        for patch in all_patches {
            if patch.key.is_empty() {
                return Err(invalid("patch with empty key".to_string()));
            }
        }
        Ok(())
    }
}

/// Builder for [`Mutation`].
#[derive(Debug, Clone)]
pub struct MutationBuilder {
    mutation: Mutation,
}

impl MutationBuilder {
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.mutation.params.insert(name.into(), value.into());
        self
    }

    /// Patch applied immediately when the mutation is written.
    pub fn optimistic(mut self, patch: StorePatch) -> Self {
        self.mutation.optimistic_data.push(patch);
        self
    }

    /// Patch applied when the server acknowledges success.
    pub fn on_success(mut self, patch: StorePatch) -> Self {
        self.mutation.success_data.push(patch);
        self
    }

    /// Patch applied when the command fails.
    pub fn on_failure(mut self, patch: StorePatch) -> Self {
        self.mutation.failure_data.push(patch);
        self
    }

    /// Patch applied after either outcome.
    pub fn finally(mut self, patch: StorePatch) -> Self {
        self.mutation.finally_data.push(patch);
        self
    }

    pub fn build(self) -> Mutation {
        self.mutation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn replacement_card() -> Mutation {
        Mutation::builder("RequestReplacementExpensifyCard")
            .param("cardID", 7)
            .param("reason", "stolen")
            .optimistic(StorePatch::merge("cardList", json!({"isLoading": true})))
            .on_success(StorePatch::merge("cardList", json!({"isLoading": false})))
            .on_failure(StorePatch::merge("cardList", json!({"isLoading": false})))
            .build()
    }

    #[test]
    fn builder_collects_patch_sets() {
        let m = replacement_card();
        assert_eq!(m.name(), "RequestReplacementExpensifyCard");
        assert_eq!(m.params()["cardID"], ParamValue::Int(7));
        assert_eq!(m.optimistic_data().len(), 1);
        assert_eq!(m.success_data().len(), 1);
        assert_eq!(m.failure_data().len(), 1);
        assert!(m.finally_data().is_empty());
        assert!(m.validate().is_ok());
    }

    #[test]
    fn command_carries_name_and_params() {
        let command = replacement_card().command();
        assert_eq!(command.name, "RequestReplacementExpensifyCard");
        assert_eq!(command.params.len(), 2);
    }

    #[test]
    fn deserializes_camel_case_form() {
        let m: Mutation = serde_json::from_value(json!({
            "name": "UpdateComment",
            "params": {"reportID": "1", "reportActionID": "9", "reportComment": "hi"},
            "optimisticData": [{"onyxMethod": "merge", "key": "reportActions_1", "value": {"9": {"message": "hi"}}}],
            "failureData": [{"onyxMethod": "merge", "key": "reportActions_1", "value": {"9": {"message": "old"}}}]
        }))
        .unwrap();
        assert_eq!(m.name(), "UpdateComment");
        assert!(m.success_data().is_empty());
        assert_eq!(m.failure_data()[0].key, "reportActions_1");
    }

    #[test]
    fn validation_rejects_bad_names_and_keys() {
        assert!(Mutation::builder("").build().validate().is_err());
        assert!(Mutation::builder("Open Report").build().validate().is_err());
        let empty_key = Mutation::builder("OpenReport")
            .optimistic(StorePatch::merge("", json!({})))
            .build();
        assert!(matches!(
            empty_key.validate(),
            Err(DispatchError::Validation { .. })
        ));
    }
}
