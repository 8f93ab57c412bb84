use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Store-native timestamp, exposed as `{seconds, nanoseconds}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: i32,
}

impl Timestamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanoseconds: dt.timestamp_subsec_nanos() as i32,
        }
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanoseconds.max(0) as u32)
    }

    /// Calendar day (UTC) this timestamp falls on.
    pub fn date(self) -> Option<NaiveDate> {
        self.to_datetime().map(|dt| dt.date_naive())
    }
}

pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    Map(Fields),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Map(fields)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn string(&self, key: &str) -> Result<String, AppError> {
        self.opt_string(key)
            .ok_or_else(|| AppError::BadRequest(format!("Missing string field {} on {}", key, self.id)))
    }

    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Numbers may come back as integers or doubles depending on the writer.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn timestamp(&self, key: &str) -> Result<Timestamp, AppError> {
        match self.get(key) {
            Some(Value::Timestamp(ts)) => Ok(*ts),
            _ => Err(AppError::BadRequest(format!(
                "Missing timestamp field {} on {}",
                key, self.id
            ))),
        }
    }

    pub fn map(&self, key: &str) -> Option<&Fields> {
        match self.get(key) {
            Some(Value::Map(fields)) => Some(fields),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrips_through_datetime() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 59).unwrap();
        let ts = Timestamp::from_datetime(dt);
        assert_eq!(ts.to_datetime(), Some(dt));
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2026, 3, 14));
    }

    #[test]
    fn test_number_accepts_integer_and_double() {
        let mut fields = Fields::new();
        fields.insert("a".into(), Value::Integer(7));
        fields.insert("b".into(), Value::Double(7.5));
        fields.insert("c".into(), Value::from("7"));
        let doc = Document::new("d1", fields);
        assert_eq!(doc.number("a"), Some(7.0));
        assert_eq!(doc.number("b"), Some(7.5));
        assert_eq!(doc.number("c"), None);
        assert!(doc.string("missing").is_err());
    }
}
