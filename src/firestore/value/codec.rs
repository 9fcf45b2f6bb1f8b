use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{json, Value as JsonValue};

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{is_reference_path, GeoPoint, Timestamp};
use crate::firestore::value::{BytesValue, FirestoreValue, ValueKind};

/// How plain strings, doubles and two-key maps are mapped to wire types on write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StringHeuristics {
    /// Shape based promotion, wire compatible with older clients:
    /// reference-shaped strings become `referenceValue`, strings carrying control bytes become
    /// `bytesValue`, `{latitude, longitude}` maps become `geoPointValue` and integral doubles
    /// become `integerValue`.
    #[default]
    Legacy,
    /// Only the explicit `Reference`, `Bytes`, `GeoPoint` and `Integer` variants produce those
    /// wire tags.
    Explicit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodecOptions {
    pub string_heuristics: StringHeuristics,
}

impl CodecOptions {
    pub fn explicit() -> Self {
        Self {
            string_heuristics: StringHeuristics::Explicit,
        }
    }
}

/// Converts between [`FirestoreValue`] and the REST `Value` JSON union.
///
/// Neither direction fails. Anything `unwrap` does not understand becomes `Null`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueCodec {
    options: CodecOptions,
}

impl ValueCodec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CodecOptions {
        self.options
    }

    pub fn wrap(&self, value: &FirestoreValue) -> JsonValue {
        match value.kind() {
            ValueKind::Null => json!({ "nullValue": JsonValue::Null }),
            ValueKind::Boolean(boolean) => json!({ "booleanValue": boolean }),
            ValueKind::Integer(integer) => json!({ "integerValue": integer.to_string() }),
            ValueKind::Double(double) => self.wrap_double(*double),
            ValueKind::Timestamp(timestamp) => match timestamp.to_rfc3339_millis() {
                Some(formatted) => json!({ "timestampValue": formatted }),
                None => {
                    log::debug!("encoding out of range timestamp {timestamp:?} as null");
                    json!({ "nullValue": JsonValue::Null })
                }
            },
            ValueKind::String(string) => self.wrap_string(string),
            ValueKind::Bytes(bytes) => json!({ "bytesValue": bytes.to_base64() }),
            ValueKind::Reference(reference) => json!({ "referenceValue": reference }),
            ValueKind::GeoPoint(point) => json!({
                "geoPointValue": {
                    "latitude": point.latitude(),
                    "longitude": point.longitude(),
                }
            }),
            ValueKind::Array(values) => {
                let values = values.iter().map(|value| self.wrap(value)).collect::<Vec<_>>();
                json!({ "arrayValue": { "values": values } })
            }
            ValueKind::Map(map) => {
                if let Some(point) = self.legacy_geo_point(map) {
                    return self.wrap(&FirestoreValue::from_geo_point(point));
                }
                json!({ "mapValue": { "fields": self.wrap_fields(map) } })
            }
        }
    }

    /// Encodes a field map into the `fields` object of a document or map value.
    pub fn wrap_fields(&self, fields: &BTreeMap<String, FirestoreValue>) -> BTreeMap<String, JsonValue> {
        fields
            .iter()
            .map(|(key, value)| (key.clone(), self.wrap(value)))
            .collect()
    }

    pub fn unwrap(&self, value: &JsonValue) -> FirestoreValue {
        decode_value(value).unwrap_or_else(|err| {
            log::debug!("decoding {value} as null: {err}");
            FirestoreValue::null()
        })
    }

    pub fn unwrap_fields(&self, fields: &BTreeMap<String, JsonValue>) -> BTreeMap<String, FirestoreValue> {
        fields
            .iter()
            .map(|(key, value)| (key.clone(), self.unwrap(value)))
            .collect()
    }

    fn legacy(&self) -> bool {
        self.options.string_heuristics == StringHeuristics::Legacy
    }

    fn wrap_string(&self, value: &str) -> JsonValue {
        if self.legacy() {
            if is_reference_path(value) {
                return json!({ "referenceValue": value });
            }
            if value.bytes().any(is_binary_control) {
                let bytes = BytesValue::from(value.as_bytes());
                return json!({ "bytesValue": bytes.to_base64() });
            }
        }
        json!({ "stringValue": value })
    }

    fn wrap_double(&self, value: f64) -> JsonValue {
        if self.legacy() && is_integral(value) {
            return json!({ "integerValue": (value as i64).to_string() });
        }
        if value.is_nan() {
            json!({ "doubleValue": "NaN" })
        } else if value == f64::INFINITY {
            json!({ "doubleValue": "Infinity" })
        } else if value == f64::NEG_INFINITY {
            json!({ "doubleValue": "-Infinity" })
        } else {
            json!({ "doubleValue": value })
        }
    }

    fn legacy_geo_point(&self, map: &BTreeMap<String, FirestoreValue>) -> Option<GeoPoint> {
        if !self.legacy() || map.len() != 2 {
            return None;
        }
        let latitude = map.get("latitude")?.as_f64()?;
        let longitude = map.get("longitude")?.as_f64()?;
        Some(GeoPoint::unchecked(latitude, longitude))
    }
}

fn is_binary_control(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0E..=0x1F)
}

// i64::MAX as f64 rounds up to 2^63, hence the exclusive upper bound.
fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64
}

fn decode_value(value: &JsonValue) -> FirestoreResult<FirestoreValue> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid_argument("Expected Firestore value object"))?;
    if object.contains_key("nullValue") {
        return Ok(FirestoreValue::null());
    }
    if let Some(bool_value) = object.get("booleanValue") {
        let value = bool_value
            .as_bool()
            .ok_or_else(|| invalid_argument("booleanValue must be bool"))?;
        return Ok(FirestoreValue::from_bool(value));
    }
    if let Some(integer_value) = object.get("integerValue") {
        let parsed = match integer_value {
            JsonValue::String(value) => i64::from_str(value)
                .map_err(|err| invalid_argument(format!("Invalid integerValue: {err}")))?,
            JsonValue::Number(number) => number
                .as_i64()
                .ok_or_else(|| invalid_argument("Integer out of range"))?,
            _ => return Err(invalid_argument("integerValue must be a string or number")),
        };
        return Ok(FirestoreValue::from_integer(parsed));
    }
    if let Some(double_value) = object.get("doubleValue") {
        let parsed = match double_value {
            JsonValue::Number(number) => number
                .as_f64()
                .ok_or_else(|| invalid_argument("Invalid doubleValue"))?,
            JsonValue::String(value) => parse_double(value)?,
            _ => return Err(invalid_argument("doubleValue must be a number or string")),
        };
        return Ok(FirestoreValue::from_double(parsed));
    }
    if let Some(timestamp_value) = object.get("timestampValue") {
        let timestamp_str = timestamp_value
            .as_str()
            .ok_or_else(|| invalid_argument("timestampValue must be string"))?;
        return Ok(FirestoreValue::from_timestamp(Timestamp::parse_rfc3339(
            timestamp_str,
        )?));
    }
    if let Some(string_value) = object.get("stringValue") {
        let str_value = string_value
            .as_str()
            .ok_or_else(|| invalid_argument("stringValue must be string"))?;
        return Ok(FirestoreValue::from_string(str_value));
    }
    if let Some(bytes_value) = object.get("bytesValue") {
        let str_value = bytes_value
            .as_str()
            .ok_or_else(|| invalid_argument("bytesValue must be base64 string"))?;
        let bytes = BytesValue::from_base64(str_value)
            .unwrap_or_else(|_| BytesValue::from(str_value.as_bytes()));
        return Ok(FirestoreValue::from_bytes(bytes));
    }
    if let Some(reference_value) = object.get("referenceValue") {
        let str_value = reference_value
            .as_str()
            .ok_or_else(|| invalid_argument("referenceValue must be string"))?;
        return Ok(FirestoreValue::from_reference(str_value));
    }
    if let Some(geo_point) = object.get("geoPointValue") {
        // Zero coordinates are omitted by the server.
        let latitude = geo_point.get("latitude").and_then(JsonValue::as_f64).unwrap_or(0.0);
        let longitude = geo_point.get("longitude").and_then(JsonValue::as_f64).unwrap_or(0.0);
        return Ok(FirestoreValue::from_geo_point(GeoPoint::unchecked(
            latitude, longitude,
        )));
    }
    if let Some(array_value) = object.get("arrayValue") {
        let decoded = array_value
            .get("values")
            .and_then(JsonValue::as_array)
            .map(|entries| entries.iter().map(decode_or_null).collect())
            .unwrap_or_default();
        return Ok(FirestoreValue::from_array(decoded));
    }
    if let Some(map_value) = object.get("mapValue") {
        let decoded = map_value
            .get("fields")
            .and_then(JsonValue::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), decode_or_null(value)))
                    .collect()
            })
            .unwrap_or_default();
        return Ok(FirestoreValue::from_map(decoded));
    }

    Err(invalid_argument("Unknown Firestore value type"))
}

fn decode_or_null(value: &JsonValue) -> FirestoreValue {
    ValueCodec::default().unwrap(value)
}

fn parse_double(value: &str) -> FirestoreResult<f64> {
    match value {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|err| invalid_argument(format!("Invalid doubleValue: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "projects/demo/databases/(default)/documents/users/alice";

    fn fields(entries: Vec<(&str, FirestoreValue)>) -> BTreeMap<String, FirestoreValue> {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    #[test]
    fn wraps_scalars() {
        let codec = ValueCodec::default();
        assert_eq!(codec.wrap(&FirestoreValue::null()), json!({ "nullValue": null }));
        assert_eq!(codec.wrap(&true.into()), json!({ "booleanValue": true }));
        assert_eq!(codec.wrap(&5.into()), json!({ "integerValue": "5" }));
        assert_eq!(codec.wrap(&5.5.into()), json!({ "doubleValue": 5.5 }));
        assert_eq!(codec.wrap(&"hi".into()), json!({ "stringValue": "hi" }));
        assert_eq!(
            codec.wrap(&Timestamp::new(1_700_000_000, 123_456_789).into()),
            json!({ "timestampValue": "2023-11-14T22:13:20.123Z" })
        );
    }

    #[test]
    fn out_of_range_timestamps_wrap_as_null() {
        let codec = ValueCodec::default();
        assert_eq!(
            codec.wrap(&Timestamp::new(400_000_000_000_000, 0).into()),
            json!({ "nullValue": null })
        );
    }

    #[test]
    fn map_encoding_is_sorted_by_key() {
        let codec = ValueCodec::default();
        let forward = fields(vec![("alpha", 1.into()), ("mid", 2.into()), ("zeta", 3.into())]);
        let backward = fields(vec![("zeta", 3.into()), ("mid", 2.into()), ("alpha", 1.into())]);

        let encoded = serde_json::to_string(&codec.wrap(&FirestoreValue::from_map(backward))).unwrap();
        assert_eq!(
            encoded,
            r#"{"mapValue":{"fields":{"alpha":{"integerValue":"1"},"mid":{"integerValue":"2"},"zeta":{"integerValue":"3"}}}}"#
        );
        assert_eq!(
            encoded,
            serde_json::to_string(&codec.wrap(&FirestoreValue::from_map(forward))).unwrap()
        );
    }

    #[test]
    fn integral_doubles_become_integers_under_legacy() {
        let codec = ValueCodec::default();
        assert_eq!(codec.wrap(&5.0.into()), json!({ "integerValue": "5" }));
        assert_eq!(codec.wrap(&(-0.0).into()), json!({ "integerValue": "0" }));
        assert_eq!(codec.wrap(&1e300.into()), json!({ "doubleValue": 1e300 }));

        let explicit = ValueCodec::new(CodecOptions::explicit());
        assert_eq!(explicit.wrap(&5.0.into()), json!({ "doubleValue": 5.0 }));
    }

    #[test]
    fn non_finite_doubles_use_string_forms() {
        let codec = ValueCodec::default();
        for (value, wire) in [
            (f64::NAN, "NaN"),
            (f64::INFINITY, "Infinity"),
            (f64::NEG_INFINITY, "-Infinity"),
        ] {
            let wrapped = codec.wrap(&value.into());
            assert_eq!(wrapped, json!({ "doubleValue": wire }));
            let back = codec.unwrap(&wrapped).as_f64().unwrap();
            assert!(back.is_nan() == value.is_nan());
            if !value.is_nan() {
                assert_eq!(back, value);
            }
        }
    }

    #[test]
    fn reference_detection() {
        let codec = ValueCodec::default();
        assert_eq!(
            codec.wrap(&REFERENCE.into()),
            json!({ "referenceValue": REFERENCE })
        );
        let off_by_one = "projects/demo/databases/(default)/document/users/alice";
        assert_eq!(
            codec.wrap(&off_by_one.into()),
            json!({ "stringValue": off_by_one })
        );

        let explicit = ValueCodec::new(CodecOptions::explicit());
        assert_eq!(
            explicit.wrap(&REFERENCE.into()),
            json!({ "stringValue": REFERENCE })
        );
        assert_eq!(
            explicit.wrap(&FirestoreValue::from_reference(REFERENCE)),
            json!({ "referenceValue": REFERENCE })
        );
    }

    #[test]
    fn control_bytes_become_bytes() {
        let codec = ValueCodec::default();
        let wrapped = codec.wrap(&"\u{1}\u{2}".into());
        assert_eq!(wrapped, json!({ "bytesValue": "AQI=" }));
        // Not round-trippable: the string comes back as bytes.
        assert_eq!(
            codec.unwrap(&wrapped),
            FirestoreValue::from_bytes(vec![1u8, 2])
        );
        // Tab and newline sit outside the control ranges.
        assert_eq!(
            codec.wrap(&"a\tb\n".into()),
            json!({ "stringValue": "a\tb\n" })
        );
    }

    #[test]
    fn geo_point_detection() {
        let codec = ValueCodec::default();
        let point = FirestoreValue::from_map(fields(vec![
            ("latitude", 1.into()),
            ("longitude", 2.into()),
        ]));
        assert_eq!(
            codec.wrap(&point),
            json!({ "geoPointValue": { "latitude": 1.0, "longitude": 2.0 } })
        );

        let with_altitude = FirestoreValue::from_map(fields(vec![
            ("latitude", 1.into()),
            ("longitude", 2.into()),
            ("altitude", 3.into()),
        ]));
        assert_eq!(
            codec.wrap(&with_altitude),
            json!({ "mapValue": { "fields": {
                "altitude": { "integerValue": "3" },
                "latitude": { "integerValue": "1" },
                "longitude": { "integerValue": "2" },
            } } })
        );

        let explicit = ValueCodec::new(CodecOptions::explicit());
        assert!(explicit.wrap(&point).get("mapValue").is_some());
    }

    #[test]
    fn nested_values_roundtrip() {
        let codec = ValueCodec::default();
        let value = FirestoreValue::from_map(fields(vec![
            ("name", "Ada".into()),
            ("age", 42.into()),
            ("ratio", 0.25.into()),
            ("active", true.into()),
            ("nothing", FirestoreValue::null()),
            ("born", Timestamp::new(1_700_000_000, 5_000_000).into()),
            (
                "nested",
                FirestoreValue::from_map(fields(vec![(
                    "tags",
                    vec![FirestoreValue::from("x"), 7.into()].into(),
                )])),
            ),
        ]));
        assert_eq!(codec.unwrap(&codec.wrap(&value)), value);
    }

    #[test]
    fn timestamps_roundtrip_at_millisecond_precision() {
        let codec = ValueCodec::default();
        let value = FirestoreValue::from(Timestamp::new(1_700_000_000, 123_456_789));
        assert_eq!(
            codec.unwrap(&codec.wrap(&value)),
            FirestoreValue::from(Timestamp::new(1_700_000_000, 123_000_000))
        );
        assert_eq!(
            codec.unwrap(&json!({ "timestampValue": "2023-11-14T22:13:20.987654Z" })),
            FirestoreValue::from(Timestamp::new(1_700_000_000, 987_000_000))
        );
    }

    #[test]
    fn unwrap_is_total() {
        let codec = ValueCodec::default();
        assert!(codec.unwrap(&json!("plain")).is_null());
        assert!(codec.unwrap(&json!({ "mysteryValue": 1 })).is_null());
        assert!(codec.unwrap(&json!({ "integerValue": "twelve" })).is_null());
        assert!(codec.unwrap(&json!({ "timestampValue": "soon" })).is_null());
        assert_eq!(
            codec.unwrap(&json!({ "arrayValue": {} })),
            FirestoreValue::from_array(Vec::new())
        );
        assert_eq!(
            codec.unwrap(&json!({ "arrayValue": { "values": [{ "bogus": 1 }, { "stringValue": "a" }] } })),
            FirestoreValue::from_array(vec![FirestoreValue::null(), "a".into()])
        );
        assert_eq!(
            codec.unwrap(&json!({ "mapValue": {} })),
            FirestoreValue::from_map(BTreeMap::new())
        );
    }

    #[test]
    fn unwrap_passthrough_tags() {
        let codec = ValueCodec::default();
        assert_eq!(
            codec.unwrap(&json!({ "referenceValue": REFERENCE })),
            FirestoreValue::from_reference(REFERENCE)
        );
        assert_eq!(
            codec.unwrap(&json!({ "geoPointValue": { "latitude": 12.5 } })),
            FirestoreValue::from_geo_point(GeoPoint::new(12.5, 0.0).unwrap())
        );
        assert_eq!(
            codec.unwrap(&json!({ "bytesValue": "%%%" })),
            FirestoreValue::from_bytes(b"%%%".to_vec())
        );
        assert_eq!(
            codec.unwrap(&json!({ "integerValue": 12 })),
            FirestoreValue::from_integer(12)
        );
    }
}
