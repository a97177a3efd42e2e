use std::collections::BTreeMap;
use std::path::Path;

use onyx_dispatch::persisted_requests;
use serde_json::Value;

use super::open_store;
use crate::render::print_entries;
use crate::OutputFormat;

pub(crate) fn cmd_inspect(
    path: &Path,
    key: Option<&str>,
    collection: Option<&str>,
    output: OutputFormat,
) -> Result<(), String> {
    let store = open_store(path)?;

    let entries: BTreeMap<String, Value> = match (key, collection) {
        (Some(key), _) => match store.get(key) {
            Some(value) => BTreeMap::from([(key.to_string(), value)]),
            None => return Err(format!("key not found: {}", key)),
        },
        (None, Some(prefix)) => store.get_collection(prefix),
        (None, None) => store.snapshot(),
    };

    print_entries(&entries, output);

    if output == OutputFormat::Text && key.is_none() && collection.is_none() {
        let pending = persisted_requests(&store).len();
        println!("{} key(s), {} pending request(s)", entries.len(), pending);
    }
    Ok(())
}
