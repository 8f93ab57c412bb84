use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Fields, Timestamp, Value};

/// Typed value as it travels over the Firestore REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireValue {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    MapValue(MapValue),
    ArrayValue(ArrayValue),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

impl WireDocument {
    /// Last path segment of `projects/.../documents/{collection}/{id}`.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<WireDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryItem {
    #[serde(default)]
    pub document: Option<WireDocument>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

pub fn encode_fields(fields: &Fields) -> BTreeMap<String, WireValue> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), WireValue::from(v)))
        .collect()
}

pub fn decode_fields(fields: BTreeMap<String, WireValue>) -> Fields {
    fields
        .into_iter()
        .map(|(k, v)| (k, Value::from(v)))
        .collect()
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => WireValue::NullValue(()),
            Value::Bool(b) => WireValue::BooleanValue(*b),
            Value::Integer(i) => WireValue::IntegerValue(i.to_string()),
            Value::Double(d) => WireValue::DoubleValue(*d),
            Value::String(s) => WireValue::StringValue(s.clone()),
            Value::Timestamp(ts) => WireValue::TimestampValue(
                ts.to_datetime()
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
            ),
            Value::Map(fields) => WireValue::MapValue(MapValue {
                fields: encode_fields(fields),
            }),
            Value::Array(values) => WireValue::ArrayValue(ArrayValue {
                values: values.iter().map(WireValue::from).collect(),
            }),
        }
    }
}

impl From<WireValue> for Value {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::NullValue(()) | WireValue::GeoPointValue(_) => Value::Null,
            WireValue::BooleanValue(b) => Value::Bool(b),
            WireValue::IntegerValue(s) => s.parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
            WireValue::DoubleValue(d) => Value::Double(d),
            WireValue::TimestampValue(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Value::Timestamp(Timestamp::from_datetime(dt.with_timezone(&Utc))))
                .unwrap_or(Value::Null),
            WireValue::StringValue(s) | WireValue::BytesValue(s) | WireValue::ReferenceValue(s) => {
                Value::String(s)
            }
            WireValue::MapValue(map) => Value::Map(decode_fields(map.fields)),
            WireValue::ArrayValue(array) => {
                Value::Array(array.values.into_iter().map(Value::from).collect())
            }
        }
    }
}
