//! Schema-free YAML value tree
//!
//! Configuration files are loaded into [`YamlValue`] before any format-specific
//! interpretation. Every accessor returns a typed result instead of panicking,
//! so polymorphic fields (a bare string in one file, a list or an object in
//! another) can be normalized by trying each shape in turn.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The shape of a YAML node, used in shape-mismatch errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Null => "null",
            Shape::Bool => "bool",
            Shape::Number => "number",
            Shape::String => "string",
            Shape::Sequence => "sequence",
            Shape::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

/// Returned when a node does not have the shape an accessor asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ShapeError {
    pub expected: Shape,
    pub found: Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A decoded YAML node
///
/// Mapping keys are always strings; non-string keys (numbers, booleans) are
/// rendered to their scalar text during conversion.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum YamlValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<YamlValue>),
    Mapping(BTreeMap<String, YamlValue>),
}

impl YamlValue {
    pub fn shape(&self) -> Shape {
        match self {
            YamlValue::Null => Shape::Null,
            YamlValue::Bool(_) => Shape::Bool,
            YamlValue::Number(_) => Shape::Number,
            YamlValue::String(_) => Shape::String,
            YamlValue::Sequence(_) => Shape::Sequence,
            YamlValue::Mapping(_) => Shape::Mapping,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, YamlValue::Null)
    }

    fn mismatch(&self, expected: Shape) -> ShapeError {
        ShapeError {
            expected,
            found: self.shape(),
        }
    }

    pub fn as_str(&self) -> Result<&str, ShapeError> {
        match self {
            YamlValue::String(s) => Ok(s),
            other => Err(other.mismatch(Shape::String)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ShapeError> {
        match self {
            YamlValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch(Shape::Bool)),
        }
    }

    /// Integer view of a number; floats without a fractional part are accepted
    pub fn as_i64(&self) -> Result<i64, ShapeError> {
        match self {
            YamlValue::Number(Number::Int(i)) => Ok(*i),
            YamlValue::Number(Number::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
                Ok(*f as i64)
            }
            other => Err(other.mismatch(Shape::Number)),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ShapeError> {
        match self {
            YamlValue::Number(Number::Int(i)) => Ok(*i as f64),
            YamlValue::Number(Number::Float(f)) => Ok(*f),
            other => Err(other.mismatch(Shape::Number)),
        }
    }

    pub fn as_sequence(&self) -> Result<&[YamlValue], ShapeError> {
        match self {
            YamlValue::Sequence(items) => Ok(items),
            other => Err(other.mismatch(Shape::Sequence)),
        }
    }

    pub fn as_mapping(&self) -> Result<&BTreeMap<String, YamlValue>, ShapeError> {
        match self {
            YamlValue::Mapping(map) => Ok(map),
            other => Err(other.mismatch(Shape::Mapping)),
        }
    }

    /// Text of any scalar node (string, number or bool)
    pub fn scalar_string(&self) -> Result<String, ShapeError> {
        match self {
            YamlValue::String(s) => Ok(s.clone()),
            YamlValue::Number(n) => Ok(n.to_string()),
            YamlValue::Bool(b) => Ok(b.to_string()),
            other => Err(other.mismatch(Shape::String)),
        }
    }

    /// Looks up a key; `None` for missing keys and for non-mapping nodes
    pub fn get(&self, key: &str) -> Option<&YamlValue> {
        match self {
            YamlValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.scalar_string().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(|v| match v {
                YamlValue::String(s) => s.trim().parse::<i64>().ok(),
                other => other.as_i64().ok(),
            })
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Normalizes a string-or-list field: a scalar becomes a one-element list,
    /// a sequence keeps its scalar items, anything else is empty
    pub fn string_or_list(&self) -> Vec<String> {
        match self {
            YamlValue::Sequence(items) => items
                .iter()
                .filter_map(|item| item.scalar_string().ok())
                .collect(),
            YamlValue::Null | YamlValue::Mapping(_) => Vec::new(),
            scalar => scalar.scalar_string().into_iter().collect(),
        }
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(YamlValue::string_or_list).unwrap_or_default()
    }

    /// Normalizes an environment-style field: either a mapping of scalars or a
    /// list of `KEY=VALUE` strings
    pub fn string_map(&self) -> BTreeMap<String, String> {
        match self {
            YamlValue::Mapping(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.scalar_string().unwrap_or_default()))
                .collect(),
            YamlValue::Sequence(items) => items
                .iter()
                .filter_map(|item| item.as_str().ok())
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (entry.to_string(), String::new()),
                })
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn get_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key).map(YamlValue::string_map).unwrap_or_default()
    }

    /// Key/value pairs of a mapping; empty for any other shape
    pub fn entries(&self) -> impl Iterator<Item = (&String, &YamlValue)> {
        self.as_mapping().ok().into_iter().flatten()
    }

    /// Items of a sequence; empty for any other shape
    pub fn items(&self) -> &[YamlValue] {
        self.as_sequence().unwrap_or(&[])
    }

    /// Items of a sequence, or a lone non-null value as a one-item list
    pub fn one_or_many(&self) -> &[YamlValue] {
        match self {
            YamlValue::Sequence(items) => items,
            YamlValue::Null => &[],
            single => std::slice::from_ref(single),
        }
    }

    /// Keys of a mapping, or the scalar items of a sequence
    pub fn names(&self) -> Vec<String> {
        match self {
            YamlValue::Mapping(map) => map.keys().cloned().collect(),
            other => other.string_or_list(),
        }
    }
}

impl From<serde_yaml::Value> for YamlValue {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => YamlValue::Null,
            serde_yaml::Value::Bool(b) => YamlValue::Bool(b),
            serde_yaml::Value::Number(n) => YamlValue::Number(convert_number(&n)),
            serde_yaml::Value::String(s) => YamlValue::String(s),
            serde_yaml::Value::Sequence(items) => {
                YamlValue::Sequence(items.into_iter().map(YamlValue::from).collect())
            }
            serde_yaml::Value::Mapping(map) => YamlValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_string(k), YamlValue::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => YamlValue::from(tagged.value),
        }
    }
}

impl<'de> Deserialize<'de> for YamlValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_yaml::Value::deserialize(deserializer).map(YamlValue::from)
    }
}

fn convert_number(n: &serde_yaml::Number) -> Number {
    if let Some(i) = n.as_i64() {
        Number::Int(i)
    } else {
        Number::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn key_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> YamlValue {
        let raw: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
        YamlValue::from(raw)
    }

    #[test]
    fn test_accessor_shape_mismatch() {
        let value = parse("name: build");
        let err = value.as_str().unwrap_err();
        assert_eq!(err.expected, Shape::String);
        assert_eq!(err.found, Shape::Mapping);
        assert_eq!(err.to_string(), "expected string, found mapping");
    }

    #[test]
    fn test_string_or_list_equivalence() {
        let single = parse("needs: build");
        let list = parse("needs: [build]");
        assert_eq!(single.get_list("needs"), list.get_list("needs"));
        assert_eq!(single.get_list("needs"), vec!["build".to_string()]);
    }

    #[test]
    fn test_one_or_many() {
        let single = parse("ports: '8080:80'");
        let list = parse("ports: ['8080:80', '9090:90']");
        assert_eq!(single.get("ports").unwrap().one_or_many().len(), 1);
        assert_eq!(list.get("ports").unwrap().one_or_many().len(), 2);
        assert!(parse("ports:").get("ports").unwrap().one_or_many().is_empty());
    }

    #[test]
    fn test_string_or_list_ignores_objects() {
        let value = parse("needs: {job: build}");
        assert!(value.get_list("needs").is_empty());
        assert!(value.get_list("missing").is_empty());
    }

    #[test]
    fn test_numbers_render_as_text() {
        let value = parse("a: 2.1\nb: 3\nc: true");
        assert_eq!(value.get_string("a").as_deref(), Some("2.1"));
        assert_eq!(value.get_string("b").as_deref(), Some("3"));
        assert_eq!(value.get_string("c").as_deref(), Some("true"));
    }

    #[test]
    fn test_non_string_keys() {
        let value = parse("1: one\ntrue: yes");
        let map = value.as_mapping().unwrap();
        assert!(map.contains_key("1"));
        assert!(map.contains_key("true"));
    }

    #[test]
    fn test_string_map_from_list_and_mapping() {
        let list = parse("env: [\"A=1\", \"B=two\", FLAG]");
        let map = parse("env: {A: 1, B: two}");
        let from_list = list.get_map("env");
        assert_eq!(from_list.get("A").map(String::as_str), Some("1"));
        assert_eq!(from_list.get("FLAG").map(String::as_str), Some(""));
        assert_eq!(map.get_map("env").get("B").map(String::as_str), Some("two"));
    }

    #[test]
    fn test_get_u32_accepts_quoted_numbers() {
        let value = parse("a: 4\nb: \"8\"\nc: -1");
        assert_eq!(value.get_u32("a"), Some(4));
        assert_eq!(value.get_u32("b"), Some(8));
        assert_eq!(value.get_u32("c"), None);
    }

    #[test]
    fn test_serialize_untagged() {
        let value = parse("list: [1, two]\nflag: false");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"flag":false,"list":[1,"two"]}"#);
    }
}
