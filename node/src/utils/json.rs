use serde_json::Value;

/// Overlays the keys of `overlay` onto `base` when both are objects;
/// otherwise `overlay` wins. Used to thread task output into the next task's
/// input without losing what earlier tasks produced.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base.clone(),
        (_, overlay) => overlay.clone(),
    }
}
