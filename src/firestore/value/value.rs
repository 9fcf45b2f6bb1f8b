use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::firestore::model::{GeoPoint, Timestamp};
use crate::firestore::value::BytesValue;

/// A document field value as seen by callers.
///
/// `Reference` and `Bytes` are explicit variants. Plain strings can still be promoted to those
/// wire types on write when the codec runs with legacy heuristics, see
/// [`StringHeuristics`](crate::firestore::value::StringHeuristics).
#[derive(Clone, Debug, PartialEq)]
pub struct FirestoreValue {
    kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    Bytes(BytesValue),
    Reference(String),
    GeoPoint(GeoPoint),
    Array(Vec<FirestoreValue>),
    /// Keys are kept sorted, so a map always encodes to the same bytes whatever order it was
    /// built in.
    Map(BTreeMap<String, FirestoreValue>),
}

impl FirestoreValue {
    pub fn null() -> Self {
        Self {
            kind: ValueKind::Null,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            kind: ValueKind::Boolean(value),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            kind: ValueKind::Integer(value),
        }
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double(value),
        }
    }

    pub fn from_timestamp(value: Timestamp) -> Self {
        Self {
            kind: ValueKind::Timestamp(value),
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::String(value.into()),
        }
    }

    pub fn from_bytes(value: impl Into<BytesValue>) -> Self {
        Self {
            kind: ValueKind::Bytes(value.into()),
        }
    }

    /// A reference to another document, given as its absolute resource name.
    pub fn from_reference(path: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Reference(path.into()),
        }
    }

    pub fn from_geo_point(value: GeoPoint) -> Self {
        Self {
            kind: ValueKind::GeoPoint(value),
        }
    }

    pub fn from_array(values: Vec<FirestoreValue>) -> Self {
        Self {
            kind: ValueKind::Array(values),
        }
    }

    pub fn from_map(map: BTreeMap<String, FirestoreValue>) -> Self {
        Self {
            kind: ValueKind::Map(map),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn into_kind(self) -> ValueKind {
        self.kind
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ValueKind::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.kind {
            ValueKind::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Numeric view of integers and doubles alike.
    pub fn as_f64(&self) -> Option<f64> {
        match self.kind {
            ValueKind::Integer(value) => Some(value as f64),
            ValueKind::Double(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::String(value) | ValueKind::Reference(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self.kind {
            ValueKind::Timestamp(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FirestoreValue]> {
        match &self.kind {
            ValueKind::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FirestoreValue>> {
        match &self.kind {
            ValueKind::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Converts a dynamically typed JSON value, the shape scripting hosts hand over.
    ///
    /// Numbers that fit an `i64` become integers, every other number a double. Strings,
    /// objects and arrays map one to one; type promotion (references, bytes, geo points)
    /// is left to the codec.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::null(),
            JsonValue::Bool(value) => Self::from_bool(*value),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => Self::from_integer(integer),
                None => Self::from_double(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(value) => Self::from_string(value.as_str()),
            JsonValue::Array(values) => Self::from_array(values.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::from_map(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl Default for FirestoreValue {
    fn default() -> Self {
        Self::null()
    }
}

impl From<bool> for FirestoreValue {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl From<i64> for FirestoreValue {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

impl From<i32> for FirestoreValue {
    fn from(value: i32) -> Self {
        Self::from_integer(i64::from(value))
    }
}

impl From<u32> for FirestoreValue {
    fn from(value: u32) -> Self {
        Self::from_integer(i64::from(value))
    }
}

impl From<f64> for FirestoreValue {
    fn from(value: f64) -> Self {
        Self::from_double(value)
    }
}

impl From<&str> for FirestoreValue {
    fn from(value: &str) -> Self {
        Self::from_string(value)
    }
}

impl From<String> for FirestoreValue {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

impl From<Timestamp> for FirestoreValue {
    fn from(value: Timestamp) -> Self {
        Self::from_timestamp(value)
    }
}

impl From<DateTime<Utc>> for FirestoreValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_timestamp(Timestamp::from(value))
    }
}

impl From<GeoPoint> for FirestoreValue {
    fn from(value: GeoPoint) -> Self {
        Self::from_geo_point(value)
    }
}

impl From<BytesValue> for FirestoreValue {
    fn from(value: BytesValue) -> Self {
        Self::from_bytes(value)
    }
}

impl<T> From<Vec<T>> for FirestoreValue
where
    T: Into<FirestoreValue>,
{
    fn from(values: Vec<T>) -> Self {
        Self::from_array(values.into_iter().map(Into::into).collect())
    }
}

impl<T> From<BTreeMap<String, T>> for FirestoreValue
where
    T: Into<FirestoreValue>,
{
    fn from(map: BTreeMap<String, T>) -> Self {
        Self::from_map(map.into_iter().map(|(key, value)| (key, value.into())).collect())
    }
}

impl<T> From<Option<T>> for FirestoreValue
where
    T: Into<FirestoreValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<&JsonValue> for FirestoreValue {
    fn from(value: &JsonValue) -> Self {
        Self::from_json(value)
    }
}

impl From<JsonValue> for FirestoreValue {
    fn from(value: JsonValue) -> Self {
        Self::from_json(&value)
    }
}
