/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;
use flute_core::{ConversionError, FluteValue, FromFluteValue, JdbcType};

type Converted = std::result::Result<FluteValue, ConversionError>;

/// A strategy that turns a runtime value into what the driver is given
/// for one SQL type.
pub trait ValueType: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Type code used when the value is null.
    fn sql_type(&self) -> JdbcType;

    fn convert(&self, value: &FluteValue) -> Converted;

    /// Nulls of this type are bound through the null type probing.
    fn probes_null_type(&self) -> bool {
        false
    }
}

fn mismatch(expected: &str, value: &FluteValue) -> ConversionError {
    ConversionError::type_mismatch_error(expected, value.type_name())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StringType;

impl ValueType for StringType {
    fn name(&self) -> &'static str {
        "String"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Varchar
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Text(_) => Ok(value.clone()),
            FluteValue::Blob(_) | FluteValue::Array(_) | FluteValue::Cursor(_) => Err(mismatch("String", value)),
            other => Ok(FluteValue::Text(other.coerce_to_string())),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerType;

impl ValueType for IntegerType {
    fn name(&self) -> &'static str {
        "Integer"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Integer
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Text(text) => text.trim().parse::<i32>().map(FluteValue::Int)
                .map_err(|e| ConversionError::parse_error(e.to_string())),
            other => i32::from_value_opt(other).map(FluteValue::Int).map_err(|_| mismatch("Integer", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LongType;

impl ValueType for LongType {
    fn name(&self) -> &'static str {
        "Long"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Bigint
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Text(text) => text.trim().parse::<i64>().map(FluteValue::Bigint)
                .map_err(|e| ConversionError::parse_error(e.to_string())),
            other => other.as_i64().map(FluteValue::Bigint).ok_or_else(|| mismatch("Long", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DecimalType;

impl ValueType for DecimalType {
    fn name(&self) -> &'static str {
        "Decimal"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Decimal
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        BigDecimal::from_value_opt(value).map(FluteValue::BigDecimal).map_err(|_| mismatch("Decimal", value))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DoubleType;

impl ValueType for DoubleType {
    fn name(&self) -> &'static str {
        "Double"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Double
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Text(text) => text.trim().parse::<f64>().map(FluteValue::Double)
                .map_err(|e| ConversionError::parse_error(e.to_string())),
            other => other.as_f64().map(FluteValue::Double).ok_or_else(|| mismatch("Double", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanType;

impl ValueType for BooleanType {
    fn name(&self) -> &'static str {
        "Boolean"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Boolean
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Text(text) => parse_boolean(text).map(FluteValue::Bool)
                .ok_or_else(|| ConversionError::parse_error(format!("not a boolean: {}", text))),
            other => other.as_bool().map(FluteValue::Bool).ok_or_else(|| mismatch("Boolean", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DateType;

impl ValueType for DateType {
    fn name(&self) -> &'static str {
        "Date"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Date
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Date(_) => Ok(value.clone()),
            FluteValue::DateTime(dt) => Ok(FluteValue::Date(dt.date())),
            FluteValue::Timestamp(ts) => Ok(FluteValue::Date(ts.naive_utc().date())),
            FluteValue::Text(text) => parse_date(text).map(FluteValue::Date)
                .ok_or_else(|| ConversionError::parse_error(format!("not a date: {}", text))),
            other => Err(mismatch("Date", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeType;

impl ValueType for TimeType {
    fn name(&self) -> &'static str {
        "Time"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Time
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Time(_) => Ok(value.clone()),
            FluteValue::DateTime(dt) => Ok(FluteValue::Time(dt.time())),
            FluteValue::Text(text) => parse_time(text).map(FluteValue::Time)
                .ok_or_else(|| ConversionError::parse_error(format!("not a time: {}", text))),
            other => Err(mismatch("Time", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampType;

impl ValueType for TimestampType {
    fn name(&self) -> &'static str {
        "Timestamp"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Timestamp
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::DateTime(_) | FluteValue::Timestamp(_) => Ok(value.clone()),
            FluteValue::Date(date) => Ok(FluteValue::DateTime(date.and_time(NaiveTime::MIN))),
            FluteValue::Text(text) => parse_timestamp(text).map(FluteValue::DateTime)
                .ok_or_else(|| ConversionError::parse_error(format!("not a timestamp: {}", text))),
            other => Err(mismatch("Timestamp", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BytesType;

impl ValueType for BytesType {
    fn name(&self) -> &'static str {
        "Bytes"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Blob
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Blob(_) => Ok(value.clone()),
            FluteValue::Text(text) => Ok(FluteValue::Blob(text.as_bytes().to_vec())),
            other => Err(mismatch("Bytes", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidType;

impl ValueType for UuidType {
    fn name(&self) -> &'static str {
        "Uuid"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Other
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Uuid(_) => Ok(value.clone()),
            FluteValue::Text(text) => Uuid::from_str(text.trim()).map(FluteValue::Uuid)
                .map_err(|e| ConversionError::parse_error(e.to_string())),
            other => Err(mismatch("Uuid", other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonType;

impl ValueType for JsonType {
    fn name(&self) -> &'static str {
        "Json"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Other
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        match value {
            FluteValue::Json(_) => Ok(value.clone()),
            FluteValue::Text(text) => serde_json::from_str(text).map(FluteValue::Json)
                .map_err(|e| ConversionError::parse_error(e.to_string())),
            other => Ok(FluteValue::Json(other.to_json())),
        }
    }
}

/// Passes values through untouched; its nulls go to the null type probing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectType;

impl ValueType for ObjectType {
    fn name(&self) -> &'static str {
        "Object"
    }

    fn sql_type(&self) -> JdbcType {
        JdbcType::Other
    }

    fn convert(&self, value: &FluteValue) -> Converted {
        Ok(value.clone())
    }

    fn probes_null_type(&self) -> bool {
        true
    }
}

/// Value types by declared SQL type, with a fallback on the runtime value.
#[derive(Debug, Clone)]
pub struct ValueTypes {
    by_sql_type: HashMap<JdbcType, Arc<dyn ValueType>>,
    object: Arc<dyn ValueType>,
}

impl Default for ValueTypes {
    fn default() -> Self {
        let mut types = Self { by_sql_type: HashMap::new(), object: Arc::new(ObjectType) };
        let string: Arc<dyn ValueType> = Arc::new(StringType);
        for jdbc_type in [JdbcType::Char, JdbcType::Varchar, JdbcType::Longvarchar, JdbcType::Nchar,
            JdbcType::Nvarchar, JdbcType::Longnvarchar, JdbcType::Clob, JdbcType::Nclob, JdbcType::Sqlxml] {
            types.register(jdbc_type, string.clone());
        }
        let integer: Arc<dyn ValueType> = Arc::new(IntegerType);
        for jdbc_type in [JdbcType::Tinyint, JdbcType::Smallint, JdbcType::Integer] {
            types.register(jdbc_type, integer.clone());
        }
        types.register(JdbcType::Bigint, Arc::new(LongType));
        let decimal: Arc<dyn ValueType> = Arc::new(DecimalType);
        types.register(JdbcType::Numeric, decimal.clone());
        types.register(JdbcType::Decimal, decimal);
        let double: Arc<dyn ValueType> = Arc::new(DoubleType);
        for jdbc_type in [JdbcType::Float, JdbcType::Real, JdbcType::Double] {
            types.register(jdbc_type, double.clone());
        }
        let boolean: Arc<dyn ValueType> = Arc::new(BooleanType);
        types.register(JdbcType::Bit, boolean.clone());
        types.register(JdbcType::Boolean, boolean);
        types.register(JdbcType::Date, Arc::new(DateType));
        types.register(JdbcType::Time, Arc::new(TimeType));
        let timestamp: Arc<dyn ValueType> = Arc::new(TimestampType);
        types.register(JdbcType::Timestamp, timestamp.clone());
        types.register(JdbcType::TimestampWithTimezone, timestamp);
        let bytes: Arc<dyn ValueType> = Arc::new(BytesType);
        for jdbc_type in [JdbcType::Binary, JdbcType::Varbinary, JdbcType::Longvarbinary, JdbcType::Blob] {
            types.register(jdbc_type, bytes.clone());
        }
        types
    }
}

impl ValueTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the strategy of a SQL type.
    pub fn register(&mut self, jdbc_type: JdbcType, value_type: Arc<dyn ValueType>) {
        self.by_sql_type.insert(jdbc_type, value_type);
    }

    /// The declared type decides when given; otherwise the runtime value
    /// does, and nulls fall to the object type.
    pub fn resolve(&self, declared: Option<JdbcType>, value: &FluteValue) -> Arc<dyn ValueType> {
        if let Some(declared) = declared {
            return self.by_sql_type.get(&declared).cloned().unwrap_or_else(|| self.object.clone());
        }
        match value {
            FluteValue::Null | FluteValue::Array(_) | FluteValue::Cursor(_) => self.object.clone(),
            FluteValue::Uuid(_) => Arc::new(UuidType),
            FluteValue::Json(_) => Arc::new(JsonType),
            other => self.by_sql_type.get(&other.jdbc_type()).cloned().unwrap_or_else(|| self.object.clone()),
        }
    }

    /// Strategy of a SQL type, `None` when only the object type would do.
    pub fn find(&self, jdbc_type: JdbcType) -> Option<Arc<dyn ValueType>> {
        self.by_sql_type.get(&jdbc_type).cloned()
    }
}

pub(crate) fn parse_boolean(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "y" | "yes" => Some(true),
        "false" | "f" | "0" | "n" | "no" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    ["%Y-%m-%d", "%Y/%m/%d"].iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| parse_timestamp_only(text).map(|dt| dt.date()))
}

pub(crate) fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"].iter().find_map(|f| NaiveTime::parse_from_str(text, f).ok())
}

/// Date-times, and plain dates at midnight.
pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    parse_timestamp_only(text).or_else(|| {
        ["%Y-%m-%d", "%Y/%m/%d"].iter()
            .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
            .map(|d| d.and_time(NaiveTime::MIN))
    })
}

fn parse_timestamp_only(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"].iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_declared_type() {
        let types = ValueTypes::new();
        assert_eq!(types.resolve(Some(JdbcType::Varchar), &FluteValue::Int(3)).name(), "String");
        assert_eq!(types.resolve(None, &FluteValue::Int(3)).name(), "Integer");
        assert_eq!(types.resolve(None, &FluteValue::Uuid(Uuid::nil())).name(), "Uuid");
        assert_eq!(types.resolve(None, &FluteValue::Null).name(), "Object");
        assert_eq!(types.resolve(Some(JdbcType::Struct), &FluteValue::Null).name(), "Object");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(IntegerType.convert(&FluteValue::Text(" 42 ".to_string())).unwrap(), FluteValue::Int(42));
        assert!(IntegerType.convert(&FluteValue::Text("x".to_string())).is_err());
        assert_eq!(BooleanType.convert(&FluteValue::Text("T".to_string())).unwrap(), FluteValue::Bool(true));
        assert_eq!(StringType.convert(&FluteValue::Bigint(7)).unwrap(), FluteValue::Text("7".to_string()));
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(DateType.convert(&FluteValue::Text("2024/02/29".to_string())).unwrap(), FluteValue::Date(date));
        assert_eq!(
            TimestampType.convert(&FluteValue::Date(date)).unwrap(),
            FluteValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap())
        );
        assert!(DateType.convert(&FluteValue::Bool(true)).is_err());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_milli_opt(10, 20, 30, 123).unwrap();
        assert_eq!(parse_timestamp("2024-01-05 10:20:30.123"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-05T10:20:30.123"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-05").map(|d| d.date()), Some(expected.date()));
        assert_eq!(parse_timestamp("05.01.2024"), None);
    }
}
