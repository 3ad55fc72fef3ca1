use serde_json::Value;
use tracing::instrument;

/// Deeply merges `source` into `target` in place. Only object pairs merge
/// per key; arrays and scalars from `source` overwrite, since two subschemas
/// only ever contribute disjoint subtrees of the same composite object.
#[instrument(level = "trace", name = "deep_merge", skip_all)]
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => deep_merge(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}
