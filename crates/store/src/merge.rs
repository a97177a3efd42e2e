use serde_json::{Map, Value};

/// Deep-merge `patch` into `target`.
///
/// - objects are unioned recursively
/// - a `null` field inside an object patch removes that field
/// - arrays and scalars replace the existing value wholesale
///
/// Merging is absolute: applying the same patch twice yields the same value
/// as applying it once.
pub fn merge_value(target: &mut Value, patch: Value) {
    let Value::Object(incoming) = patch else {
        *target = patch;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    if let Value::Object(existing) = target {
        for (field, value) in incoming {
            if value.is_null() {
                existing.remove(&field);
            } else {
                merge_value(existing.entry(field).or_insert(Value::Null), value);
            }
        }
    }
}
