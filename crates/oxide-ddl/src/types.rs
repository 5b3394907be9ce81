//! Column type descriptors and value conversion.
//!
//! A descriptor is what the application says about a column ("a string",
//! "uuid", "decimal(10,2)"); the dialect turns it into a native type name and
//! converts values between [`ColumnValue`] and [`SqlValue`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{DdlError, Result};
use crate::schema::{GenerationStrategy, TableColumn};
use crate::value::{ColumnValue, SqlValue};

/// Host-language primitive a column can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    /// Any number.
    Number,
    /// Any string.
    String,
    /// True/false.
    Boolean,
    /// Date and time.
    Date,
    /// Raw bytes.
    Buffer,
}

/// The declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnKind {
    /// A host primitive.
    Host(HostType),
    /// A named type (`"uuid"`, `"simple-json"`, `"varchar"`).
    Named(String),
}

/// Abstract type of a column as declared by the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnTypeDescriptor {
    /// Declared type.
    pub kind: ColumnKind,
    /// Explicit length.
    #[serde(default)]
    pub length: Option<String>,
    /// Explicit precision.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Explicit scale.
    #[serde(default)]
    pub scale: Option<u32>,
    /// Array column.
    #[serde(default)]
    pub is_array: bool,
    /// Generation strategy, if generated.
    #[serde(default)]
    pub generation_strategy: Option<GenerationStrategy>,
}

impl ColumnTypeDescriptor {
    /// Descriptor for a host primitive.
    #[must_use]
    pub const fn host(host: HostType) -> Self {
        Self {
            kind: ColumnKind::Host(host),
            length: None,
            precision: None,
            scale: None,
            is_array: false,
            generation_strategy: None,
        }
    }

    /// Descriptor for a named type.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            kind: ColumnKind::Named(name.into()),
            ..Self::host(HostType::String)
        }
    }

    /// Sets the length.
    #[must_use]
    pub fn length(mut self, length: impl ToString) -> Self {
        self.length = Some(length.to_string());
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub const fn precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    /// Returns the named type in lower case, if this is a named descriptor.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match &self.kind {
            ColumnKind::Named(name) => Some(name.trim().to_ascii_lowercase()),
            ColumnKind::Host(_) => None,
        }
    }

    /// Returns `true` if this descriptor is the given host primitive.
    #[must_use]
    pub fn is_host(&self, host: HostType) -> bool {
        self.kind == ColumnKind::Host(host)
    }

    /// Returns `true` if this descriptor names one of `names`.
    #[must_use]
    pub fn is_named(&self, names: &[&str]) -> bool {
        self.name().is_some_and(|n| names.contains(&n.as_str()))
    }
}

impl From<&TableColumn> for ColumnTypeDescriptor {
    fn from(column: &TableColumn) -> Self {
        Self {
            kind: ColumnKind::Named(column.column_type.clone()),
            length: column.length.clone(),
            precision: column.precision,
            scale: column.scale,
            is_array: column.is_array,
            generation_strategy: column.generation_strategy,
        }
    }
}

/// User hook applied before persisting and after hydrating a value.
pub trait ValueTransformer: Send + Sync {
    /// Application value to database value.
    fn to_database(&self, value: ColumnValue) -> ColumnValue;

    /// Database value to application value.
    fn from_database(&self, value: ColumnValue) -> ColumnValue;
}

/// Per-dialect knobs of the shared value conversion.
#[derive(Debug, Clone, Copy)]
pub struct ValueRules {
    /// Booleans travel as 1/0 instead of a native boolean.
    pub boolean_as_integer: bool,
    /// Type names holding a date and a time.
    pub datetime_types: &'static [&'static str],
    /// Type names holding a date only.
    pub date_types: &'static [&'static str],
    /// Type names holding a time only.
    pub time_types: &'static [&'static str],
    /// Type names whose values are JSON documents serialized to text.
    pub json_types: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Boolean,
    DateTime,
    Date,
    Time,
    Json,
    SimpleArray,
    SimpleEnum,
    Other,
}

fn classify(column: &ColumnTypeDescriptor, rules: &ValueRules) -> ValueKind {
    match &column.kind {
        ColumnKind::Host(HostType::Boolean) => ValueKind::Boolean,
        ColumnKind::Host(HostType::Date) => ValueKind::DateTime,
        ColumnKind::Host(_) => ValueKind::Other,
        ColumnKind::Named(_) => {
            let name = column.name().unwrap_or_default();
            match name.as_str() {
                "boolean" | "bool" => ValueKind::Boolean,
                "simple-json" => ValueKind::Json,
                "simple-array" => ValueKind::SimpleArray,
                "simple-enum" => ValueKind::SimpleEnum,
                n if rules.json_types.contains(&n) => ValueKind::Json,
                n if rules.datetime_types.contains(&n) => ValueKind::DateTime,
                n if rules.date_types.contains(&n) => ValueKind::Date,
                n if rules.time_types.contains(&n) => ValueKind::Time,
                _ => ValueKind::Other,
            }
        }
    }
}

fn type_label(column: &ColumnTypeDescriptor) -> String {
    match &column.kind {
        ColumnKind::Host(host) => format!("{host:?}"),
        ColumnKind::Named(name) => name.clone(),
    }
}

fn conversion_error(column: &ColumnTypeDescriptor, message: impl Into<String>) -> DdlError {
    DdlError::ValueConversion {
        column_type: type_label(column),
        message: message.into(),
    }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn plain(value: ColumnValue, rules: &ValueRules) -> Result<SqlValue> {
    Ok(match value {
        ColumnValue::Null => SqlValue::Null,
        ColumnValue::Bool(b) if rules.boolean_as_integer => SqlValue::Int(i64::from(b)),
        ColumnValue::Bool(b) => SqlValue::Bool(b),
        ColumnValue::Int(n) => SqlValue::Int(n),
        ColumnValue::Float(f) => SqlValue::Float(f),
        ColumnValue::Text(s) => SqlValue::Text(s),
        ColumnValue::Bytes(b) => SqlValue::Blob(b),
        ColumnValue::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        ColumnValue::Time(t) => SqlValue::Text(t.format("%H:%M:%S").to_string()),
        ColumnValue::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        ColumnValue::Json(json) => SqlValue::Text(serde_json::to_string(&json)?),
        ColumnValue::Array(items) => SqlValue::Text(items.join(",")),
    })
}

/// Converts an application value into its wire form.
pub fn persist(
    value: ColumnValue,
    column: &ColumnTypeDescriptor,
    rules: &ValueRules,
    transformer: Option<&dyn ValueTransformer>,
) -> Result<SqlValue> {
    let value = match transformer {
        Some(t) => t.to_database(value),
        None => value,
    };
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    match (classify(column, rules), value) {
        (ValueKind::Boolean, ColumnValue::Bool(b)) => plain(ColumnValue::Bool(b), rules),
        (ValueKind::Boolean, ColumnValue::Int(n)) => plain(ColumnValue::Bool(n != 0), rules),
        (ValueKind::Date, ColumnValue::DateTime(dt)) => plain(ColumnValue::Date(dt.date()), rules),
        (ValueKind::Time, ColumnValue::DateTime(dt)) => plain(ColumnValue::Time(dt.time()), rules),
        (ValueKind::DateTime, ColumnValue::Date(d)) => {
            plain(ColumnValue::DateTime(d.and_time(NaiveTime::default())), rules)
        }
        (ValueKind::Json, ColumnValue::Text(s)) => {
            Ok(SqlValue::Text(serde_json::to_string(&serde_json::Value::String(s))?))
        }
        (ValueKind::Json, other) => {
            let json = match other {
                ColumnValue::Json(json) => json,
                ColumnValue::Bool(b) => serde_json::Value::Bool(b),
                ColumnValue::Int(n) => serde_json::Value::from(n),
                ColumnValue::Float(f) => serde_json::Value::from(f),
                ColumnValue::Array(items) => serde_json::Value::from(items),
                _ => return Err(conversion_error(column, "value is not representable as JSON")),
            };
            Ok(SqlValue::Text(serde_json::to_string(&json)?))
        }
        (ValueKind::SimpleArray, ColumnValue::Array(items)) => Ok(SqlValue::Text(items.join(","))),
        (_, other) => plain(other, rules),
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let trimmed = text.strip_suffix('Z').unwrap_or(text);
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::default()))
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn raw(value: SqlValue, column: &ColumnTypeDescriptor) -> Result<ColumnValue> {
    Ok(match value {
        SqlValue::Null => ColumnValue::Null,
        SqlValue::Bool(b) => ColumnValue::Bool(b),
        SqlValue::Int(n) => ColumnValue::Int(n),
        SqlValue::Float(f) => ColumnValue::Float(f),
        SqlValue::Text(s) => ColumnValue::Text(s),
        SqlValue::Blob(b) => ColumnValue::Bytes(b),
        SqlValue::List(_) => return Err(conversion_error(column, "lists cannot be hydrated")),
    })
}

/// Converts a wire value into its application form.
pub fn hydrate(
    value: SqlValue,
    column: &ColumnTypeDescriptor,
    rules: &ValueRules,
    transformer: Option<&dyn ValueTransformer>,
) -> Result<ColumnValue> {
    let hydrated = if value.is_null() {
        ColumnValue::Null
    } else {
        match (classify(column, rules), value) {
            (ValueKind::Boolean, SqlValue::Bool(b)) => ColumnValue::Bool(b),
            (ValueKind::Boolean, SqlValue::Int(n)) => ColumnValue::Bool(n != 0),
            (ValueKind::Boolean, SqlValue::Float(f)) => ColumnValue::Bool(f != 0.0),
            (ValueKind::Boolean, SqlValue::Text(s)) => {
                ColumnValue::Bool(matches!(s.trim(), "1" | "true" | "TRUE" | "t"))
            }
            (ValueKind::DateTime, SqlValue::Text(s)) => parse_datetime(&s)
                .map(ColumnValue::DateTime)
                .ok_or_else(|| conversion_error(column, format!("invalid datetime '{s}'")))?,
            (ValueKind::DateTime, SqlValue::Int(secs)) => DateTime::from_timestamp(secs, 0)
                .map(|dt| ColumnValue::DateTime(dt.naive_utc()))
                .ok_or_else(|| conversion_error(column, format!("timestamp {secs} out of range")))?,
            (ValueKind::Date, SqlValue::Text(s)) => {
                let date_part = s.get(..10).unwrap_or(&s);
                NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                    .map(ColumnValue::Date)
                    .map_err(|e| conversion_error(column, format!("invalid date '{s}': {e}")))?
            }
            (ValueKind::Time, SqlValue::Text(s)) => parse_time(&s)
                .map(ColumnValue::Time)
                .ok_or_else(|| conversion_error(column, format!("invalid time '{s}'")))?,
            (ValueKind::Json, SqlValue::Text(s)) => ColumnValue::Json(serde_json::from_str(&s)?),
            (ValueKind::SimpleArray, SqlValue::Text(s)) => {
                if s.is_empty() {
                    ColumnValue::Array(Vec::new())
                } else {
                    ColumnValue::Array(s.split(',').map(str::to_string).collect())
                }
            }
            (_, other) => raw(other, column)?,
        }
    };

    Ok(match transformer {
        Some(t) => t.from_database(hydrated),
        None => hydrated,
    })
}

/// Composes `TYPE(length)`, `TYPE(precision,scale)` or `TYPE(precision)`.
#[must_use]
pub fn compose_full_type(column: &TableColumn, length: Option<&str>) -> String {
    let mut full = column.column_type.clone();
    if let Some(length) = length {
        full.push_str(&format!("({length})"));
    } else if let (Some(precision), Some(scale)) = (column.precision, column.scale) {
        full.push_str(&format!("({precision},{scale})"));
    } else if let Some(precision) = column.precision {
        full.push_str(&format!("({precision})"));
    }
    if column.is_array {
        full.push_str(" array");
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: ValueRules = ValueRules {
        boolean_as_integer: true,
        datetime_types: &["datetime"],
        date_types: &["date"],
        time_types: &["time"],
        json_types: &["json"],
    };

    struct Upper;

    impl ValueTransformer for Upper {
        fn to_database(&self, value: ColumnValue) -> ColumnValue {
            match value {
                ColumnValue::Text(s) => ColumnValue::Text(s.to_uppercase()),
                other => other,
            }
        }

        fn from_database(&self, value: ColumnValue) -> ColumnValue {
            match value {
                ColumnValue::Text(s) => ColumnValue::Text(s.to_lowercase()),
                other => other,
            }
        }
    }

    #[test]
    fn test_boolean_as_integer() {
        let column = ColumnTypeDescriptor::host(HostType::Boolean);
        assert_eq!(
            persist(ColumnValue::Bool(true), &column, &RULES, None).unwrap(),
            SqlValue::Int(1)
        );
        assert_eq!(
            hydrate(SqlValue::Int(0), &column, &RULES, None).unwrap(),
            ColumnValue::Bool(false)
        );
    }

    #[test]
    fn test_datetime_string() {
        let column = ColumnTypeDescriptor::named("datetime");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(10, 30, 0, 250)
            .unwrap();
        let wire = persist(ColumnValue::DateTime(dt), &column, &RULES, None).unwrap();
        assert_eq!(wire, SqlValue::Text("2024-03-01 10:30:00.250".into()));
        assert_eq!(
            hydrate(wire, &column, &RULES, None).unwrap(),
            ColumnValue::DateTime(dt)
        );
        assert_eq!(
            hydrate(SqlValue::Text("2024-03-01T10:30:00.250Z".into()), &column, &RULES, None)
                .unwrap(),
            ColumnValue::DateTime(dt)
        );
    }

    #[test]
    fn test_invalid_datetime_is_an_error() {
        let column = ColumnTypeDescriptor::named("datetime");
        let err = hydrate(SqlValue::Text("yesterday".into()), &column, &RULES, None).unwrap_err();
        assert!(matches!(err, DdlError::ValueConversion { .. }));
    }

    #[test]
    fn test_simple_array_and_json() {
        let array = ColumnTypeDescriptor::named("simple-array");
        let wire = persist(
            ColumnValue::Array(vec!["a".into(), "b".into()]),
            &array,
            &RULES,
            None,
        )
        .unwrap();
        assert_eq!(wire, SqlValue::Text("a,b".into()));
        assert_eq!(
            hydrate(SqlValue::Text(String::new()), &array, &RULES, None).unwrap(),
            ColumnValue::Array(Vec::new())
        );

        let json = ColumnTypeDescriptor::named("simple-json");
        let doc = serde_json::json!({"k": [1, 2]});
        let wire = persist(ColumnValue::Json(doc.clone()), &json, &RULES, None).unwrap();
        assert_eq!(wire, SqlValue::Text(r#"{"k":[1,2]}"#.into()));
        assert_eq!(
            hydrate(wire, &json, &RULES, None).unwrap(),
            ColumnValue::Json(doc)
        );
    }

    #[test]
    fn test_transformer_wraps_conversion() {
        let column = ColumnTypeDescriptor::host(HostType::String);
        assert_eq!(
            persist(ColumnValue::Text("abc".into()), &column, &RULES, Some(&Upper)).unwrap(),
            SqlValue::Text("ABC".into())
        );
        assert_eq!(
            hydrate(SqlValue::Text("ABC".into()), &column, &RULES, Some(&Upper)).unwrap(),
            ColumnValue::Text("abc".into())
        );
    }

    #[test]
    fn test_compose_full_type() {
        let column = TableColumn::new("price", "decimal").precision(10, Some(2));
        assert_eq!(compose_full_type(&column, None), "decimal(10,2)");
        assert_eq!(
            compose_full_type(&TableColumn::new("n", "varchar"), Some("40")),
            "varchar(40)"
        );
    }
}
