use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::firestore::error::{internal_error, invalid_argument, FirestoreResult};
use crate::firestore::model::{relative_path_from_document_name, Timestamp};
use crate::firestore::value::{FirestoreValue, ValueCodec};

/// A document in REST wire form: field values stay encoded until [`Document::obj`] is called.
///
/// The same type is used for reads and as the `update` payload of writes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
}

impl Document {
    /// Encodes `fields` right away, ready to be sent as a write payload.
    pub fn from_fields(
        fields: &BTreeMap<String, FirestoreValue>,
        name: Option<String>,
        codec: &ValueCodec,
    ) -> Self {
        Self {
            name,
            fields: codec.wrap_fields(fields),
            ..Default::default()
        }
    }

    /// Hydrates a document from a response object, then applies `overrides` on top of it.
    ///
    /// Both arguments must be JSON objects; keys of `overrides` replace those of `wire`.
    pub fn from_wire(wire: JsonValue, overrides: JsonValue) -> FirestoreResult<Self> {
        let JsonValue::Object(mut merged) = wire else {
            return Err(invalid_argument("Document payload must be a JSON object"));
        };
        match overrides {
            JsonValue::Object(extra) => merged.extend(extra),
            JsonValue::Null => {}
            _ => return Err(invalid_argument("Document overrides must be a JSON object")),
        }
        serde_json::from_value(JsonValue::Object(merged))
            .map_err(|err| internal_error(format!("Malformed document: {err}")))
    }

    /// Path relative to the database's `documents` root, e.g. `users/alice`.
    pub fn path(&self) -> FirestoreResult<&str> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| invalid_argument("Document has no name yet"))?;
        relative_path_from_document_name(name)
            .ok_or_else(|| invalid_argument(format!("Malformed document name '{name}'")))
    }

    /// Last segment of the name, empty until the server assigned one.
    pub fn id(&self) -> &str {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .unwrap_or_default()
    }

    /// Decodes every field.
    pub fn obj(&self) -> BTreeMap<String, FirestoreValue> {
        ValueCodec::default().unwrap_fields(&self.fields)
    }

    pub fn get(&self, field: &str) -> Option<FirestoreValue> {
        self.fields
            .get(field)
            .map(|value| ValueCodec::default().unwrap(value))
    }

    /// Server creation time, or now for a document the server has not seen.
    pub fn created(&self) -> Timestamp {
        timestamp_or_now(self.create_time.as_deref())
    }

    pub fn updated(&self) -> Timestamp {
        timestamp_or_now(self.update_time.as_deref())
    }

    pub fn read(&self) -> Timestamp {
        timestamp_or_now(self.read_time.as_deref())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document ({})", self.id())
    }
}

fn timestamp_or_now(value: Option<&str>) -> Timestamp {
    match value.map(Timestamp::parse_rfc3339) {
        Some(Ok(timestamp)) => timestamp,
        Some(Err(err)) => {
            log::debug!("using current time for unparseable document timestamp: {err}");
            Timestamp::now()
        }
        None => Timestamp::now(),
    }
}
