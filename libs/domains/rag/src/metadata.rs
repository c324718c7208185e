//! Document metadata as a typed value tree.
//!
//! Metadata crosses two boundaries: JSON (gateway bodies, seed files) and
//! protobuf `Struct` (the remote vector store). Both are converted here so
//! the rest of the crate only sees [`MetadataValue`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type Metadata = BTreeMap<String, MetadataValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(Metadata),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

// ===== JSON =====

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => MetadataValue::Null,
            Value::Bool(b) => MetadataValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MetadataValue::Int(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => MetadataValue::String(s),
            Value::Array(items) => MetadataValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => MetadataValue::Map(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<MetadataValue> for serde_json::Value {
    fn from(value: MetadataValue) -> Self {
        use serde_json::Value;

        match value {
            MetadataValue::Null => Value::Null,
            MetadataValue::Bool(b) => Value::Bool(b),
            MetadataValue::Int(i) => Value::from(i),
            // Non-finite floats have no JSON form.
            MetadataValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            MetadataValue::String(s) => Value::String(s),
            MetadataValue::List(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            MetadataValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Object-valued JSON becomes a metadata map; anything else is rejected.
pub fn metadata_from_json(value: serde_json::Value) -> Option<Metadata> {
    match MetadataValue::from(value) {
        MetadataValue::Map(map) => Some(map),
        MetadataValue::Null => Some(Metadata::new()),
        _ => None,
    }
}

// ===== Protobuf =====

impl From<prost_types::Value> for MetadataValue {
    fn from(value: prost_types::Value) -> Self {
        use prost_types::value::Kind;

        match value.kind {
            None | Some(Kind::NullValue(_)) => MetadataValue::Null,
            Some(Kind::BoolValue(b)) => MetadataValue::Bool(b),
            Some(Kind::NumberValue(n)) => number_from_proto(n),
            Some(Kind::StringValue(s)) => MetadataValue::String(s),
            Some(Kind::ListValue(list)) => {
                MetadataValue::List(list.values.into_iter().map(Into::into).collect())
            }
            Some(Kind::StructValue(s)) => MetadataValue::Map(metadata_from_proto(s)),
        }
    }
}

/// Protobuf numbers are always doubles; integral ones come back as `Int`.
fn number_from_proto(n: f64) -> MetadataValue {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53

    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        MetadataValue::Int(n as i64)
    } else {
        MetadataValue::Float(n)
    }
}

impl From<MetadataValue> for prost_types::Value {
    fn from(value: MetadataValue) -> Self {
        use prost_types::value::Kind;

        let kind = match value {
            MetadataValue::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
            MetadataValue::Bool(b) => Kind::BoolValue(b),
            MetadataValue::Int(i) => Kind::NumberValue(i as f64),
            MetadataValue::Float(f) => Kind::NumberValue(f),
            MetadataValue::String(s) => Kind::StringValue(s),
            MetadataValue::List(items) => Kind::ListValue(prost_types::ListValue {
                values: items.into_iter().map(Into::into).collect(),
            }),
            MetadataValue::Map(map) => Kind::StructValue(metadata_to_proto(map)),
        };

        prost_types::Value { kind: Some(kind) }
    }
}

pub fn metadata_from_proto(proto: prost_types::Struct) -> Metadata {
    proto
        .fields
        .into_iter()
        .map(|(k, v)| (k, v.into()))
        .collect()
}

pub fn metadata_to_proto(metadata: Metadata) -> prost_types::Struct {
    prost_types::Struct {
        fields: metadata.into_iter().map(|(k, v)| (k, v.into())).collect(),
    }
}
