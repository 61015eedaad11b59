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

use std::fmt;
use std::str::FromStr;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{ConversionError, FluteDataError, JdbcType, Rows};

#[derive(Debug, Clone, PartialEq)]
pub enum FluteValue {
    Null,
    Bool(bool),
    Smallint(i16),
    Int(i32),
    Bigint(i64),
    Double(f64),
    BigDecimal(BigDecimal),
    Text(String),
    Blob(Vec<u8>),
    Json(JsonValue),
    Xml(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Array(Vec<FluteValue>),
    /// Result set handed back through an OUT parameter (ref cursor).
    Cursor(Rows),
}

impl FluteValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FluteValue::Null)
    }

    /// Runtime type name, used in binding diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FluteValue::Null => "Null",
            FluteValue::Bool(_) => "Bool",
            FluteValue::Smallint(_) => "Smallint",
            FluteValue::Int(_) => "Int",
            FluteValue::Bigint(_) => "Bigint",
            FluteValue::Double(_) => "Double",
            FluteValue::BigDecimal(_) => "BigDecimal",
            FluteValue::Text(_) => "Text",
            FluteValue::Blob(_) => "Blob",
            FluteValue::Json(_) => "Json",
            FluteValue::Xml(_) => "Xml",
            FluteValue::Uuid(_) => "Uuid",
            FluteValue::Date(_) => "Date",
            FluteValue::Time(_) => "Time",
            FluteValue::DateTime(_) => "DateTime",
            FluteValue::Timestamp(_) => "Timestamp",
            FluteValue::Array(_) => "Array",
            FluteValue::Cursor(_) => "Cursor",
        }
    }

    /// The type code a driver would report for a value of this kind.
    pub fn jdbc_type(&self) -> JdbcType {
        match self {
            FluteValue::Null => JdbcType::Null,
            FluteValue::Bool(_) => JdbcType::Boolean,
            FluteValue::Smallint(_) => JdbcType::Smallint,
            FluteValue::Int(_) => JdbcType::Integer,
            FluteValue::Bigint(_) => JdbcType::Bigint,
            FluteValue::Double(_) => JdbcType::Double,
            FluteValue::BigDecimal(_) => JdbcType::Decimal,
            FluteValue::Text(_) => JdbcType::Varchar,
            FluteValue::Blob(_) => JdbcType::Blob,
            FluteValue::Json(_) | FluteValue::Uuid(_) => JdbcType::Other,
            FluteValue::Xml(_) => JdbcType::Sqlxml,
            FluteValue::Date(_) => JdbcType::Date,
            FluteValue::Time(_) => JdbcType::Time,
            FluteValue::DateTime(_) => JdbcType::Timestamp,
            FluteValue::Timestamp(_) => JdbcType::TimestampWithTimezone,
            FluteValue::Array(_) => JdbcType::Array,
            FluteValue::Cursor(_) => JdbcType::RefCursor,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FluteValue::Text(v) | FluteValue::Xml(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FluteValue::Bool(v) => Some(*v as i64),
            FluteValue::Smallint(v) => Some(*v as i64),
            FluteValue::Int(v) => Some(*v as i64),
            FluteValue::Bigint(v) => Some(*v),
            FluteValue::Double(v) => Some(*v as i64),
            FluteValue::BigDecimal(v) => v.to_i64(),
            FluteValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FluteValue::Smallint(v) => Some(*v as f64),
            FluteValue::Int(v) => Some(*v as f64),
            FluteValue::Bigint(v) => Some(*v as f64),
            FluteValue::Double(v) => Some(*v),
            FluteValue::BigDecimal(v) => v.to_f64(),
            FluteValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FluteValue::Bool(v) => Some(*v),
            FluteValue::Smallint(_) | FluteValue::Int(_) | FluteValue::Bigint(_) => self.as_i64().map(|v| v != 0),
            FluteValue::Text(v) => match v.trim().to_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => Some(true),
                "false" | "f" | "0" | "no" | "n" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Plain text form without SQL quoting, `""` for null.
    pub fn coerce_to_string(&self) -> String {
        match self {
            FluteValue::Null => String::new(),
            FluteValue::Text(s) | FluteValue::Xml(s) => s.clone(),
            FluteValue::Bool(b) => b.to_string(),
            FluteValue::Smallint(v) => v.to_string(),
            FluteValue::Int(v) => v.to_string(),
            FluteValue::Bigint(v) => v.to_string(),
            FluteValue::Double(v) => v.to_string(),
            FluteValue::BigDecimal(v) => v.to_string(),
            FluteValue::Blob(v) => base64::encode(v),
            FluteValue::Json(v) => v.to_string(),
            FluteValue::Uuid(v) => v.to_string(),
            FluteValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            FluteValue::Time(v) => v.format("%H:%M:%S").to_string(),
            FluteValue::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            FluteValue::Timestamp(v) => v.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            FluteValue::Array(v) => format!(
                "{{{}}}",
                v.iter().map(|item| item.coerce_to_string()).collect::<Vec<_>>().join(",")
            ),
            FluteValue::Cursor(rows) => format!("[CURSOR {} rows]", rows.len()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            FluteValue::Null => JsonValue::Null,
            FluteValue::Bool(v) => JsonValue::Bool(*v),
            FluteValue::Smallint(v) => JsonValue::from(*v),
            FluteValue::Int(v) => JsonValue::from(*v),
            FluteValue::Bigint(v) => JsonValue::from(*v),
            FluteValue::Double(v) => JsonValue::from(*v),
            FluteValue::Json(v) => v.clone(),
            FluteValue::Array(v) => JsonValue::Array(v.iter().map(|item| item.to_json()).collect()),
            FluteValue::Cursor(rows) => JsonValue::Array(
                rows.iter()
                    .map(|row| {
                        let mut map = serde_json::Map::new();
                        for (column, value) in row.iter() {
                            map.insert(column.clone(), value.to_json());
                        }
                        JsonValue::Object(map)
                    })
                    .collect(),
            ),
            other => JsonValue::String(other.coerce_to_string()),
        }
    }
}

impl Serialize for FluteValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// Renders the value the way it would be written as a SQL literal,
/// which is what the display SQL embeds.
impl fmt::Display for FluteValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FluteValue::Null => write!(f, "null"),
            FluteValue::Bool(v) => write!(f, "{}", v),
            FluteValue::Smallint(v) => write!(f, "{}", v),
            FluteValue::Int(v) => write!(f, "{}", v),
            FluteValue::Bigint(v) => write!(f, "{}", v),
            FluteValue::Double(v) => write!(f, "{}", v),
            FluteValue::BigDecimal(v) => write!(f, "{}", v),
            FluteValue::Text(v) | FluteValue::Xml(v) => write!(f, "'{}'", v.replace('\'', "''")),
            FluteValue::Json(v) => write!(f, "'{}'", v.to_string().replace('\'', "''")),
            FluteValue::Uuid(v) => write!(f, "'{}'", v),
            FluteValue::Date(v) => write!(f, "'{}'", v.format("%Y-%m-%d")),
            FluteValue::Time(v) => write!(f, "'{}'", v.format("%H:%M:%S")),
            FluteValue::DateTime(v) => write!(f, "'{}'", v.format("%Y-%m-%d %H:%M:%S%.3f")),
            FluteValue::Timestamp(v) => write!(f, "'{}'", v.format("%Y-%m-%d %H:%M:%S%.3f")),
            FluteValue::Blob(v) => write!(f, "BLOB({} bytes)", v.len()),
            FluteValue::Array(v) => {
                let items: Vec<String> = v.iter().map(|item| item.to_string()).collect();
                write!(f, "({})", items.join(", "))
            }
            FluteValue::Cursor(rows) => write!(f, "CURSOR({} rows)", rows.len()),
        }
    }
}

/// Conversion out of a [`FluteValue`].
pub trait FromFluteValue: Sized {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError>;
}

impl FromFluteValue for FluteValue {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        Ok(v.clone())
    }
}

impl<T: FromFluteValue> FromFluteValue for Option<T> {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::Null => Ok(None),
            other => T::from_value_opt(other).map(Some),
        }
    }
}

impl FromFluteValue for String {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::Null => Err(FluteDataError::null_value_error("String")),
            other => Ok(other.coerce_to_string()),
        }
    }
}

impl FromFluteValue for bool {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        v.as_bool().ok_or_else(|| FluteDataError::type_mismatch_error("bool", v.type_name()))
    }
}

impl FromFluteValue for i64 {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        v.as_i64().ok_or_else(|| FluteDataError::type_mismatch_error("i64", v.type_name()))
    }
}

impl FromFluteValue for i32 {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        let value = i64::from_value_opt(v)?;
        i32::try_from(value)
            .map_err(|_| FluteDataError::ConversionError(ConversionError::numeric_overflow_error("i32")))
    }
}

impl FromFluteValue for i16 {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        let value = i64::from_value_opt(v)?;
        i16::try_from(value)
            .map_err(|_| FluteDataError::ConversionError(ConversionError::numeric_overflow_error("i16")))
    }
}

impl FromFluteValue for f64 {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        v.as_f64().ok_or_else(|| FluteDataError::type_mismatch_error("f64", v.type_name()))
    }
}

impl FromFluteValue for BigDecimal {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::BigDecimal(d) => Ok(d.clone()),
            FluteValue::Smallint(_) | FluteValue::Int(_) | FluteValue::Bigint(_) => {
                Ok(BigDecimal::from(v.as_i64().unwrap_or_default()))
            }
            FluteValue::Double(d) => BigDecimal::from_str(&d.to_string())
                .map_err(|e| FluteDataError::parse_error(e.to_string())),
            FluteValue::Text(s) => BigDecimal::from_str(s.trim())
                .map_err(|e| FluteDataError::parse_error(e.to_string())),
            other => Err(FluteDataError::type_mismatch_error("BigDecimal", other.type_name())),
        }
    }
}

impl FromFluteValue for NaiveDate {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::Date(d) => Ok(*d),
            FluteValue::DateTime(d) => Ok(d.date()),
            FluteValue::Timestamp(d) => Ok(d.date_naive()),
            FluteValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| FluteDataError::parse_error(e.to_string())),
            other => Err(FluteDataError::type_mismatch_error("NaiveDate", other.type_name())),
        }
    }
}

impl FromFluteValue for NaiveDateTime {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::DateTime(d) => Ok(*d),
            FluteValue::Timestamp(d) => Ok(d.naive_utc()),
            FluteValue::Date(d) => Ok(d.and_time(NaiveTime::default())),
            FluteValue::Text(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| FluteDataError::parse_error(e.to_string())),
            other => Err(FluteDataError::type_mismatch_error("NaiveDateTime", other.type_name())),
        }
    }
}

impl FromFluteValue for Uuid {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::Uuid(u) => Ok(*u),
            FluteValue::Text(s) => Uuid::parse_str(s.trim()).map_err(|e| FluteDataError::parse_error(e.to_string())),
            other => Err(FluteDataError::type_mismatch_error("Uuid", other.type_name())),
        }
    }
}

impl FromFluteValue for Vec<u8> {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::Blob(b) => Ok(b.clone()),
            FluteValue::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(FluteDataError::type_mismatch_error("Vec<u8>", other.type_name())),
        }
    }
}

impl FromFluteValue for JsonValue {
    fn from_value_opt(v: &FluteValue) -> Result<Self, FluteDataError> {
        match v {
            FluteValue::Json(j) => Ok(j.clone()),
            FluteValue::Text(s) => serde_json::from_str(s)
                .map_err(|e| FluteDataError::ConversionError(ConversionError::from(e))),
            other => Ok(other.to_json()),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FluteValue {
                fn from(v: $ty) -> Self {
                    FluteValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i16 => Smallint,
    i32 => Int,
    i64 => Bigint,
    f64 => Double,
    BigDecimal => BigDecimal,
    String => Text,
    Vec<u8> => Blob,
    JsonValue => Json,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => Timestamp,
    Vec<FluteValue> => Array,
    Rows => Cursor,
}

impl From<&str> for FluteValue {
    fn from(v: &str) -> Self {
        FluteValue::Text(v.to_string())
    }
}

impl From<&String> for FluteValue {
    fn from(v: &String) -> Self {
        FluteValue::Text(v.clone())
    }
}

impl From<u32> for FluteValue {
    fn from(v: u32) -> Self {
        FluteValue::Bigint(v as i64)
    }
}

impl From<f32> for FluteValue {
    fn from(v: f32) -> Self {
        FluteValue::Double(v as f64)
    }
}

impl<T: Into<FluteValue>> From<Option<T>> for FluteValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => FluteValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_text() {
        assert_eq!(FluteValue::from("O'Reilly").to_string(), "'O''Reilly'");
        assert_eq!(FluteValue::Null.to_string(), "null");
        assert_eq!(FluteValue::Int(3).to_string(), "3");
    }

    #[test]
    fn test_display_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(FluteValue::Date(date).to_string(), "'2024-02-29'");
        let dt = date.and_hms_milli_opt(12, 30, 1, 5).unwrap();
        assert_eq!(FluteValue::DateTime(dt).to_string(), "'2024-02-29 12:30:01.005'");
    }

    #[test]
    fn test_from_value_conversions() {
        assert_eq!(i32::from_value_opt(&FluteValue::Bigint(42)).unwrap(), 42);
        assert_eq!(Option::<i64>::from_value_opt(&FluteValue::Null).unwrap(), None);
        assert!(i16::from_value_opt(&FluteValue::Bigint(1 << 40)).is_err());
        assert!(bool::from_value_opt(&FluteValue::from("yes")).unwrap());
        assert_eq!(
            BigDecimal::from_value_opt(&FluteValue::from("12.50")).unwrap(),
            BigDecimal::from_str("12.50").unwrap()
        );
    }

    #[test]
    fn test_blob_coerces_to_base64() {
        assert_eq!(FluteValue::Blob(b"abc".to_vec()).coerce_to_string(), "YWJj");
    }
}
