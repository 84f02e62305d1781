//! Generic YAML decoding into a schema-free value tree

mod value;

pub use value::{Number, Shape, ShapeError, YamlValue};

use crate::error::DecodeError;
use serde::Deserialize;

/// Decodes the first non-empty document of a YAML stream
///
/// Anchors and merge keys (`<<: *defaults`) are resolved. An empty stream
/// decodes to [`YamlValue::Null`].
pub fn decode(path: &str, text: &str) -> Result<YamlValue, DecodeError> {
    Ok(decode_raw(path, text)?
        .map(YamlValue::from)
        .unwrap_or_default())
}

pub(crate) fn decode_raw(path: &str, text: &str) -> Result<Option<serde_yaml::Value>, DecodeError> {
    for document in serde_yaml::Deserializer::from_str(text) {
        let mut value =
            serde_yaml::Value::deserialize(document).map_err(|e| DecodeError::new(path, e))?;
        if value.is_null() {
            continue;
        }
        value
            .apply_merge()
            .map_err(|e| DecodeError::new(path, e))?;
        return Ok(Some(value));
    }
    Ok(None)
}
