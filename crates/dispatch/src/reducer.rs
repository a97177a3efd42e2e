use onyx_store::{StorePatch, ERRORS_FIELD, PENDING_ACTION_FIELD};
use serde_json::{Map, Value};

use crate::mutation::Mutation;
use crate::response::Outcome;

/// Compute the batch that settles `mutation` with `outcome`.
///
/// The batch is, in order:
/// 1. on success, the server's `onyxData` followed by `successData`;
///    on failure, `failureData`
/// 2. `finallyData`
/// 3. for every key in `owned_keys` (keys whose `pendingAction` this mutation
///    set and still owns): a merge clearing `pendingAction` unless step 1-2
///    already wrote it, plus, on failure, the error message under
///    `errors[error_key]`. Keys removed by step 1-2 are skipped.
///
/// No error is attached anywhere when `owned_keys` is empty, so a mutation
/// without a `pendingAction` must carry its own `errors` in `failureData`.
///
/// The function is pure; the dispatcher applies the result as one store batch.
pub fn reduce(
    mutation: &Mutation,
    outcome: &Outcome,
    owned_keys: &[String],
    error_key: &str,
) -> Vec<StorePatch> {
    let mut patches: Vec<StorePatch> = match outcome {
        Outcome::Success(response) => response
            .onyx_data
            .iter()
            .chain(mutation.success_data())
            .cloned()
            .collect(),
        Outcome::Failure(_) => mutation.failure_data().to_vec(),
    };
    patches.extend_from_slice(mutation.finally_data());

    let settled = patches.len();
    for key in owned_keys {
        let for_key = || patches[..settled].iter().filter(|p| &p.key == key);

        if for_key().last().is_some_and(|p| p.is_tombstone()) {
            continue;
        }

        let mut fields = Map::new();
        if !for_key().any(|p| p.touches_field(PENDING_ACTION_FIELD)) {
            fields.insert(PENDING_ACTION_FIELD.to_string(), Value::Null);
        }
        if let Outcome::Failure(error) = outcome {
            let mut errors = Map::new();
            errors.insert(error_key.to_string(), Value::String(error.message().to_string()));
            fields.insert(ERRORS_FIELD.to_string(), Value::Object(errors));
        }
        if !fields.is_empty() {
            patches.push(StorePatch::merge(key.clone(), Value::Object(fields)));
        }
    }

    patches
}
