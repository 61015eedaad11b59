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

//!
//! SQLite modules.
//!

mod connection;
mod meta;

pub use connection::*;
pub use meta::*;

use bigdecimal::{BigDecimal, ToPrimitive};
use rusqlite::types::Value;
use flute_core::{FluteValue, JdbcType, Row, Rows};
use crate::driver::PreparedStatement;
use crate::errors::{FluteError, Result};

/// Prepared statement binding straight into the SQLite statement.
pub struct SqliteStatement<'c> {
    statement: rusqlite::Statement<'c>,
}

impl<'c> SqliteStatement<'c> {
    pub fn new(statement: rusqlite::Statement<'c>) -> Self {
        Self { statement }
    }
}

impl PreparedStatement for SqliteStatement<'_> {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        self.statement.raw_bind_parameter(index, convert_value_to_sqlite(value)?)?;
        Ok(())
    }

    /// SQLite columns are dynamically typed, every null type is accepted.
    fn set_null(&mut self, index: usize, _jdbc_type: JdbcType) -> Result<()> {
        self.statement.raw_bind_parameter(index, Value::Null)?;
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Rows> {
        let columns: Vec<String> = self.statement.column_names().into_iter().map(String::from).collect();
        let mut rows = self.statement.raw_query();
        let mut result = Rows::new();
        while let Some(row) = rows.next()? {
            let mut data = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                data.push(convert_sqlite_value(row.get::<_, Value>(i)?));
            }
            result.push(Row::new(columns.clone(), data));
        }
        Ok(result)
    }

    fn execute_update(&mut self) -> Result<u64> {
        Ok(self.statement.raw_execute()? as u64)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.statement.finalize()?;
        Ok(())
    }
}

fn convert_value_to_sqlite(value: &FluteValue) -> Result<Value> {
    let converted = match value {
        FluteValue::Null => Value::Null,
        FluteValue::Bool(v) => Value::Integer(if *v { 1 } else { 0 }),
        FluteValue::Smallint(v) => Value::Integer(i64::from(*v)),
        FluteValue::Int(v) => Value::Integer(i64::from(*v)),
        FluteValue::Bigint(v) => Value::Integer(*v),
        FluteValue::Double(v) => Value::Real(*v),
        FluteValue::BigDecimal(v) => match v.to_i64().filter(|i| BigDecimal::from(*i) == *v) {
            Some(i) => Value::Integer(i),
            None => match v.to_f64() {
                Some(f) => Value::Real(f),
                None => Value::Text(v.to_string()),
            },
        },
        FluteValue::Text(v) | FluteValue::Xml(v) => Value::Text(v.clone()),
        FluteValue::Blob(v) => Value::Blob(v.clone()),
        FluteValue::Json(v) => Value::Text(v.to_string()),
        FluteValue::Uuid(v) => Value::Text(v.to_string()),
        FluteValue::Date(v) => Value::Text(v.format("%Y-%m-%d").to_string()),
        FluteValue::Time(v) => Value::Text(v.format("%H:%M:%S").to_string()),
        FluteValue::DateTime(v) => Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        FluteValue::Timestamp(v) => Value::Text(v.to_rfc3339()),
        FluteValue::Array(_) | FluteValue::Cursor(_) => {
            return Err(FluteError::BindingFailure(format!("SQLite cannot bind a value of {}", value.type_name())));
        }
    };
    Ok(converted)
}

fn convert_sqlite_value(value: Value) -> FluteValue {
    match value {
        Value::Null => FluteValue::Null,
        Value::Integer(i) => FluteValue::Bigint(i),
        Value::Real(f) => FluteValue::Double(f),
        Value::Text(text) => FluteValue::Text(text),
        Value::Blob(bytes) => FluteValue::Blob(bytes),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use chrono::NaiveDate;
    use super::*;

    #[test]
    fn test_convert_value_to_sqlite() {
        assert_eq!(convert_value_to_sqlite(&FluteValue::Bool(true)).unwrap(), Value::Integer(1));
        let decimal = BigDecimal::from_str("12").unwrap();
        assert_eq!(convert_value_to_sqlite(&FluteValue::BigDecimal(decimal)).unwrap(), Value::Integer(12));
        let decimal = BigDecimal::from_str("1.5").unwrap();
        assert_eq!(convert_value_to_sqlite(&FluteValue::BigDecimal(decimal)).unwrap(), Value::Real(1.5));
        let date = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        assert_eq!(convert_value_to_sqlite(&FluteValue::Date(date)).unwrap(), Value::Text("2001-02-03".to_string()));
        assert!(convert_value_to_sqlite(&FluteValue::Array(vec![])).is_err());
    }
}
