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
//! MySQL modules.
//!

mod connection;
mod meta;

pub use connection::*;
pub use meta::*;

use std::cell::RefCell;
use std::collections::HashMap;
use mysql::{Params as MysqlParams, Row as MysqlRow, Value as MysqlValue};
use mysql::prelude::Queryable;
use flute_core::{FluteValue, JdbcType, Row, Rows};
use crate::driver::{CallResult, CallSpec, CallableStatement, PreparedStatement, ResultQueue};
use crate::errors::{FluteError, Result};

/// Positional values collected until execution; the driver binds them
/// with the statement.
#[derive(Debug, Default)]
struct BoundValues {
    values: Vec<MysqlValue>,
}

impl BoundValues {
    fn set(&mut self, index: usize, value: MysqlValue) -> Result<()> {
        if index == 0 {
            return Err(FluteError::BindingFailure("Parameter indexes start at 1".to_string()));
        }
        if self.values.len() < index {
            self.values.resize(index, MysqlValue::NULL);
        }
        self.values[index - 1] = value;
        Ok(())
    }

    fn params(&self) -> MysqlParams {
        if self.values.is_empty() {
            MysqlParams::Empty
        } else {
            MysqlParams::Positional(self.values.clone())
        }
    }
}

pub struct MysqlStatement<'c> {
    conn: &'c RefCell<MysqlConnection>,
    sql: String,
    bound: BoundValues,
}

impl<'c> MysqlStatement<'c> {
    pub fn new(conn: &'c RefCell<MysqlConnection>, sql: &str) -> Self {
        Self { conn, sql: sql.to_string(), bound: BoundValues::default() }
    }
}

impl PreparedStatement for MysqlStatement<'_> {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        self.bound.set(index, convert_value_to_mysql(value)?)
    }

    /// MySQL takes an untyped null for every column type.
    fn set_null(&mut self, index: usize, _jdbc_type: JdbcType) -> Result<()> {
        self.bound.set(index, MysqlValue::NULL)
    }

    fn execute_query(&mut self) -> Result<Rows> {
        let mut conn = self.conn.borrow_mut();
        let results = run_all(&mut conn, &self.sql, self.bound.params())?;
        Ok(results.into_iter()
            .find_map(|r| match r {
                CallResult::ResultSet(rows) => Some(rows),
                CallResult::UpdateCount(_) => None,
            })
            .unwrap_or_default())
    }

    fn execute_update(&mut self) -> Result<u64> {
        let mut conn = self.conn.borrow_mut();
        conn.exec_drop(self.sql.as_str(), self.bound.params())?;
        Ok(conn.affected_rows())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Call over `CALL`, OUT parameters travel through session variables:
/// `SET @flute_p2 = ?; CALL SP(?, @flute_p2); SELECT @flute_p2`.
/// Functions are called with `SELECT`.
pub struct MysqlCallableStatement<'c> {
    conn: &'c RefCell<MysqlConnection>,
    spec: CallSpec,
    bound: HashMap<usize, MysqlValue>,
    out_types: HashMap<usize, JdbcType>,
    out_values: HashMap<usize, FluteValue>,
    results: ResultQueue,
}

impl<'c> MysqlCallableStatement<'c> {
    pub fn new(conn: &'c RefCell<MysqlConnection>, spec: CallSpec) -> Self {
        Self {
            conn,
            spec,
            bound: HashMap::new(),
            out_types: HashMap::new(),
            out_values: HashMap::new(),
            results: ResultQueue::default(),
        }
    }

    fn variable(index: usize) -> String {
        format!("@flute_p{}", index)
    }

    fn bound_value(&self, index: usize) -> MysqlValue {
        self.bound.get(&index).cloned().unwrap_or(MysqlValue::NULL)
    }

    fn call_function(&mut self, conn: &mut mysql::Conn) -> Result<()> {
        let marks = vec!["?"; self.spec.arguments().count()].join(", ");
        let sql = format!("SELECT {}({})", self.spec.procedure_name, marks);
        let args: Vec<MysqlValue> = self.spec.arguments().map(|(i, _)| self.bound_value(i)).collect();
        let row: Option<MysqlRow> = conn.exec_first(sql, MysqlParams::Positional(args))?;
        let value = match row {
            Some(row) => convert_mysql_row(row)?.into_data().into_iter().next().unwrap_or(FluteValue::Null),
            None => FluteValue::Null,
        };
        self.out_values.insert(1, value);
        Ok(())
    }

    fn call_procedure(&mut self, conn: &mut mysql::Conn) -> Result<()> {
        let mut marks = Vec::new();
        let mut args = Vec::new();
        let mut outs = Vec::new();
        for (index, parameter) in self.spec.arguments() {
            if parameter.is_output() {
                let variable = Self::variable(index);
                if parameter.is_input() {
                    conn.exec_drop(format!("SET {} = ?", variable), MysqlParams::Positional(vec![self.bound_value(index)]))?;
                }
                marks.push(variable);
                outs.push(index);
            } else {
                marks.push("?".to_string());
                args.push(self.bound_value(index));
            }
        }
        let sql = format!("CALL {}({})", self.spec.procedure_name, marks.join(", "));
        let params = if args.is_empty() { MysqlParams::Empty } else { MysqlParams::Positional(args) };
        self.results = ResultQueue::new(run_all(conn, &sql, params)?);
        if outs.is_empty() {
            return Ok(());
        }
        let variables: Vec<String> = outs.iter().map(|i| Self::variable(*i)).collect();
        let row: Option<MysqlRow> = conn.query_first(format!("SELECT {}", variables.join(", ")))?;
        if let Some(row) = row {
            for (index, value) in outs.into_iter().zip(convert_mysql_row(row)?.into_data()) {
                self.out_values.insert(index, value);
            }
        }
        Ok(())
    }
}

impl CallableStatement for MysqlCallableStatement<'_> {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        self.bound.insert(index, convert_value_to_mysql(value)?);
        Ok(())
    }

    fn set_null(&mut self, index: usize, _jdbc_type: JdbcType) -> Result<()> {
        self.bound.insert(index, MysqlValue::NULL);
        Ok(())
    }

    fn register_out_parameter(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.out_types.insert(index, jdbc_type);
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.out_values.clear();
        let conn = self.conn;
        let mut conn = conn.borrow_mut();
        if self.spec.has_return() {
            self.call_function(&mut conn)?;
            self.results = ResultQueue::default();
        } else {
            self.call_procedure(&mut conn)?;
        }
        Ok(self.results.is_result_set())
    }

    fn get_result_set(&mut self) -> Result<Option<Rows>> {
        Ok(self.results.take_result_set())
    }

    fn get_more_results(&mut self) -> Result<bool> {
        Ok(self.results.advance())
    }

    fn get_update_count(&self) -> Option<u64> {
        self.results.update_count()
    }

    fn get_out_value(&mut self, index: usize) -> Result<FluteValue> {
        if !self.out_types.contains_key(&index) {
            return Err(FluteError::BindingFailure(format!("The parameter {} is not registered as out", index)));
        }
        Ok(self.out_values.get(&index).cloned().unwrap_or(FluteValue::Null))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Every result of the execution, result sets and update counts in order.
fn run_all(conn: &mut mysql::Conn, sql: &str, params: MysqlParams) -> Result<Vec<CallResult>> {
    let mut result = conn.exec_iter(sql, params)?;
    let mut results = Vec::new();
    while let Some(set) = result.iter() {
        if set.columns().as_ref().is_empty() {
            results.push(CallResult::UpdateCount(set.affected_rows()));
            continue;
        }
        let mut rows = Rows::new();
        for row in set {
            rows.push(convert_mysql_row(row?)?);
        }
        results.push(CallResult::ResultSet(rows));
    }
    Ok(results)
}

/// Converted Value To MySQL Value
fn convert_value_to_mysql(value: &FluteValue) -> Result<MysqlValue> {
    let converted = match value {
        FluteValue::Null => MysqlValue::NULL,
        FluteValue::Bool(b) => MysqlValue::from(*b),
        FluteValue::Smallint(i) => MysqlValue::from(*i),
        FluteValue::Int(i) => MysqlValue::from(*i),
        FluteValue::Bigint(i) => MysqlValue::from(*i),
        FluteValue::Double(d) => MysqlValue::from(*d),
        FluteValue::BigDecimal(bd) => MysqlValue::from(bd.clone()),
        FluteValue::Blob(bytes) => MysqlValue::from(bytes.clone()),
        FluteValue::Text(s) | FluteValue::Xml(s) => MysqlValue::from(s.clone()),
        FluteValue::Json(j) => MysqlValue::from(j.to_string()),
        FluteValue::Uuid(uuid) => MysqlValue::from(uuid.to_string()),
        FluteValue::Date(date) => MysqlValue::from(*date),
        FluteValue::Time(time) => MysqlValue::from(*time),
        FluteValue::DateTime(dt) => MysqlValue::from(*dt),
        FluteValue::Timestamp(ts) => MysqlValue::from(ts.naive_utc()),
        FluteValue::Array(_) => MysqlValue::from(value.to_json().to_string()),
        FluteValue::Cursor(_) => {
            return Err(FluteError::BindingFailure("MySQL cannot bind a cursor".to_string()));
        }
    };
    Ok(converted)
}

/// Converted MySQL Value To Value
fn convert_mysql_value(mysql_value: MysqlValue, column_type: mysql::consts::ColumnType) -> Result<FluteValue> {
    use mysql::consts::ColumnType;

    if mysql_value == MysqlValue::NULL {
        return Ok(FluteValue::Null);
    }

    match column_type {
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            let text: String = try_convert(mysql_value)?;
            let decimal = bigdecimal::BigDecimal::parse_bytes(text.as_bytes(), 10)
                .ok_or_else(|| FluteError::sql(format!("Invalid decimal format: {}", text)))?;
            Ok(FluteValue::BigDecimal(decimal))
        }
        ColumnType::MYSQL_TYPE_TINY | ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
            Ok(FluteValue::Smallint(try_convert(mysql_value)?))
        }
        ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => Ok(FluteValue::Int(try_convert(mysql_value)?)),
        ColumnType::MYSQL_TYPE_LONGLONG => Ok(FluteValue::Bigint(try_convert(mysql_value)?)),
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => Ok(FluteValue::Double(try_convert(mysql_value)?)),
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => Ok(FluteValue::Date(try_convert(mysql_value)?)),
        ColumnType::MYSQL_TYPE_TIME => Ok(FluteValue::Time(try_convert(mysql_value)?)),
        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
            Ok(FluteValue::DateTime(try_convert(mysql_value)?))
        }
        ColumnType::MYSQL_TYPE_JSON => {
            let text: String = try_convert(mysql_value)?;
            Ok(FluteValue::Json(serde_json::from_str(&text)?))
        }
        ColumnType::MYSQL_TYPE_TINY_BLOB | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB | ColumnType::MYSQL_TYPE_BLOB => {
            let bytes: Vec<u8> = try_convert(mysql_value)?;
            Ok(match String::from_utf8(bytes) {
                Ok(text) => FluteValue::Text(text),
                Err(e) => FluteValue::Blob(e.into_bytes()),
            })
        }
        ColumnType::MYSQL_TYPE_BIT => {
            let bytes: Vec<u8> = try_convert(mysql_value)?;
            if bytes.len() == 1 {
                Ok(FluteValue::Bool(bytes[0] != 0))
            } else {
                Ok(FluteValue::Blob(bytes))
            }
        }
        _ => try_generic_conversion(mysql_value),
    }
}

fn convert_mysql_row(mysql_row: MysqlRow) -> Result<Row> {
    let columns: Vec<String> = mysql_row.columns_ref().iter().map(|col| col.name_str().to_string()).collect();
    let column_types: Vec<mysql::consts::ColumnType> = mysql_row.columns_ref().iter().map(|col| col.column_type()).collect();
    let values = mysql_row.unwrap().into_iter().zip(column_types)
        .map(|(value, column_type)| convert_mysql_value(value, column_type))
        .collect::<Result<Vec<FluteValue>>>()?;
    Ok(Row::new(columns, values))
}

/// Generic type conversion
fn try_generic_conversion(mysql_value: MysqlValue) -> Result<FluteValue> {
    match mysql_value {
        MysqlValue::NULL => Ok(FluteValue::Null),
        MysqlValue::Int(i) => Ok(FluteValue::Bigint(i)),
        MysqlValue::UInt(u) => Ok(i64::try_from(u).map(FluteValue::Bigint)
            .unwrap_or_else(|_| FluteValue::BigDecimal(bigdecimal::BigDecimal::from(u)))),
        MysqlValue::Float(f) => Ok(FluteValue::Double(f64::from(f))),
        MysqlValue::Double(d) => Ok(FluteValue::Double(d)),
        MysqlValue::Bytes(bytes) => Ok(match String::from_utf8(bytes) {
            Ok(text) => FluteValue::Text(text),
            Err(e) => FluteValue::Blob(e.into_bytes()),
        }),
        other => Ok(FluteValue::Text(other.as_sql(true).trim_matches('\'').to_string())),
    }
}

/// Type-safe conversion
fn try_convert<T>(value: MysqlValue) -> Result<T>
where
    T: mysql::prelude::FromValue,
{
    mysql::from_value_opt::<T>(value).map_err(|e| FluteError::sql(e.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use mysql::consts::ColumnType;
    use super::*;

    #[test]
    fn test_bound_values_fill_gaps_with_null() {
        let mut bound = BoundValues::default();
        bound.set(2, MysqlValue::from(5)).unwrap();
        assert_eq!(bound.values, vec![MysqlValue::NULL, MysqlValue::Int(5)]);
        assert!(bound.set(0, MysqlValue::NULL).is_err());
    }

    #[test]
    fn test_convert_mysql_value() {
        let value = convert_mysql_value(MysqlValue::Bytes(b"12.50".to_vec()), ColumnType::MYSQL_TYPE_NEWDECIMAL).unwrap();
        assert_eq!(value.coerce_to_string(), "12.50");
        let value = convert_mysql_value(MysqlValue::Bytes(vec![1]), ColumnType::MYSQL_TYPE_BIT).unwrap();
        assert_eq!(value, FluteValue::Bool(true));
        let value = convert_mysql_value(MysqlValue::Date(2001, 2, 3, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATE).unwrap();
        assert_eq!(value, FluteValue::Date(NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()));
        assert_eq!(convert_mysql_value(MysqlValue::NULL, ColumnType::MYSQL_TYPE_LONG).unwrap(), FluteValue::Null);
    }

    #[test]
    fn test_cursor_is_not_bindable() {
        assert!(convert_value_to_mysql(&FluteValue::Cursor(Rows::new())).is_err());
        assert_eq!(convert_value_to_mysql(&FluteValue::Int(3)).unwrap(), MysqlValue::Int(3));
    }
}
