// Default Overlay
//
// Produces a display copy of a configuration value with unset fields
// filled from the type's default hints. The copy is a serde round trip,
// so it shares nothing with the input value. Overlays are never persisted.

use serde_json::Value;

use super::{ConfigValue, VersionedRecord};

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("encode value for overlay: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("default hints do not fit the configuration type: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Copy `value` and populate its zero-valued fields from `T::default_hints()`.
pub fn overlay<T: ConfigValue>(value: &T) -> Result<T, OverlayError> {
    let mut doc = serde_json::to_value(value).map_err(OverlayError::Encode)?;
    apply_hints(&mut doc, &T::default_hints());
    serde_json::from_value(doc).map_err(OverlayError::Decode)
}

/// Overlay the value of a record, keeping its audit fields.
pub fn overlay_record<T: ConfigValue>(
    record: &VersionedRecord<T>,
) -> Result<VersionedRecord<T>, OverlayError> {
    Ok(VersionedRecord {
        version: record.version,
        updated_by: record.updated_by.clone(),
        created_at: record.created_at,
        value: overlay(&record.value)?,
    })
}

/// Merge `hints` into `target` in place. Set fields are left untouched.
pub fn apply_hints(target: &mut Value, hints: &Value) {
    let (Value::Object(fields), Value::Object(hints)) = (target, hints) else {
        return;
    };
    for (name, hint) in hints {
        if hint.is_null() {
            continue;
        }
        let field = fields.entry(name.clone()).or_insert(Value::Null);
        if field.is_object() && hint.is_object() {
            apply_hints(field, hint);
        } else if is_zero(field) {
            *field = hint.clone();
        }
    }
}

/// Whether a serialized field holds the zero value of its type.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
