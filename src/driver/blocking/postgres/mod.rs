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
//! PostgreSQL modules.
//!

mod connection;
mod meta;
mod numeric;

pub use connection::*;
pub use meta::*;
pub use numeric::*;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use bigdecimal::BigDecimal;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{to_sql_checked, IsNull, Kind, ToSql, Type};
use uuid::Uuid;
use flute_core::{FluteValue, JdbcType, Row, Rows};
use crate::driver::{CallResult, CallSpec, CallableStatement, PreparedStatement, ResultQueue};
use crate::driver::blocking::number_placeholders;
use crate::errors::{FluteError, Result};

/// A bound parameter, converted to the width the statement expects.
#[derive(Debug, Clone)]
enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(PgNumeric),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    TextArray(Vec<Option<String>>),
    Int32Array(Vec<Option<i32>>),
    Int64Array(Vec<Option<i64>>),
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::Numeric(v) => v.to_sql(ty, out),
            PgValue::Text(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::TextArray(v) => v.to_sql(ty, out),
            PgValue::Int32Array(v) => v.to_sql(ty, out),
            PgValue::Int64Array(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Converted Value To PostgreSQL parameter of `target`.
fn convert_value_to_pg(value: &FluteValue, target: &Type) -> Result<PgValue> {
    let integer = |i: i64| match *target {
        Type::INT2 => i16::try_from(i).map(PgValue::Int16).map_err(|e| FluteError::BindingFailure(e.to_string())),
        Type::INT4 => i32::try_from(i).map(PgValue::Int32).map_err(|e| FluteError::BindingFailure(e.to_string())),
        Type::NUMERIC => Ok(PgValue::Numeric(PgNumeric(BigDecimal::from(i)))),
        Type::FLOAT8 => Ok(PgValue::Float64(i as f64)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => Ok(PgValue::Text(i.to_string())),
        _ => Ok(PgValue::Int64(i)),
    };
    let converted = match value {
        FluteValue::Null => PgValue::Null,
        FluteValue::Bool(v) => PgValue::Bool(*v),
        FluteValue::Smallint(v) => integer(i64::from(*v))?,
        FluteValue::Int(v) => integer(i64::from(*v))?,
        FluteValue::Bigint(v) => integer(*v)?,
        FluteValue::Double(v) => match *target {
            Type::FLOAT4 => PgValue::Float32(*v as f32),
            Type::NUMERIC => PgValue::Numeric(PgNumeric(BigDecimal::try_from(*v)
                .map_err(|e| FluteError::BindingFailure(e.to_string()))?)),
            _ => PgValue::Float64(*v),
        },
        FluteValue::BigDecimal(v) => match *target {
            Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::Text(v.to_string()),
            _ => PgValue::Numeric(PgNumeric(v.clone())),
        },
        FluteValue::Text(v) | FluteValue::Xml(v) => PgValue::Text(v.clone()),
        FluteValue::Blob(v) => PgValue::Bytes(v.clone()),
        FluteValue::Json(v) => PgValue::Json(v.clone()),
        FluteValue::Uuid(v) => match *target {
            Type::TEXT | Type::VARCHAR | Type::BPCHAR => PgValue::Text(v.to_string()),
            _ => PgValue::Uuid(*v),
        },
        FluteValue::Date(v) => PgValue::Date(*v),
        FluteValue::Time(v) => PgValue::Time(*v),
        FluteValue::DateTime(v) => match *target {
            Type::TIMESTAMPTZ => PgValue::DateTimeUtc(v.and_utc()),
            _ => PgValue::DateTime(*v),
        },
        FluteValue::Timestamp(v) => match *target {
            Type::TIMESTAMP => PgValue::DateTime(v.naive_utc()),
            _ => PgValue::DateTimeUtc(*v),
        },
        FluteValue::Array(values) => match *target {
            Type::INT4_ARRAY => PgValue::Int32Array(values.iter()
                .map(|v| v.as_i64().and_then(|i| i32::try_from(i).ok()))
                .collect()),
            Type::INT8_ARRAY => PgValue::Int64Array(values.iter().map(|v| v.as_i64()).collect()),
            _ => PgValue::TextArray(values.iter()
                .map(|v| if v.is_null() { None } else { Some(v.coerce_to_string()) })
                .collect()),
        },
        FluteValue::Cursor(_) => {
            return Err(FluteError::BindingFailure("PostgreSQL cannot bind a cursor".to_string()));
        }
    };
    Ok(converted)
}

/// Whether the server accepts a null declared as `jdbc_type` for a
/// parameter of `target`. Untyped nulls go anywhere.
fn null_accepted(jdbc_type: JdbcType, target: &Type) -> bool {
    if matches!(jdbc_type, JdbcType::Null | JdbcType::Other | JdbcType::JavaObject | JdbcType::Unknown(_)) {
        return true;
    }
    if matches!(target.kind(), Kind::Array(_)) {
        return jdbc_type == JdbcType::Array;
    }
    match *target {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => jdbc_type.is_numeric(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => jdbc_type.is_string(),
        Type::DATE | Type::TIMESTAMP | Type::TIMESTAMPTZ => {
            matches!(jdbc_type, JdbcType::Date | JdbcType::Timestamp | JdbcType::TimestampWithTimezone)
        }
        Type::TIME | Type::TIMETZ => matches!(jdbc_type, JdbcType::Time | JdbcType::TimeWithTimezone),
        Type::BOOL => jdbc_type.is_boolean(),
        Type::BYTEA => jdbc_type.is_binary(),
        _ => true,
    }
}

/// Rewrites `?` markers outside literals and comments to `$n`.
pub fn to_pg_placeholders(sql: &str) -> String {
    number_placeholders(sql, "$")
}

fn execute_rows(client: &mut postgres::Client, statement: &postgres::Statement, params: &[PgValue]) -> Result<Rows> {
    let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    let columns: Vec<String> = statement.columns().iter().map(|c| c.name().to_string()).collect();
    let mut rows = Rows::new();
    for row in client.query(statement, &refs)? {
        let mut data = Vec::with_capacity(columns.len());
        for (i, column) in statement.columns().iter().enumerate() {
            data.push(get_value_from_row(&row, i, column.type_())?);
        }
        rows.push(Row::new(columns.clone(), data));
    }
    Ok(rows)
}

pub struct PostgresStatement<'c> {
    client: &'c RefCell<PostgresConnection>,
    statement: postgres::Statement,
    values: Vec<Option<PgValue>>,
}

impl<'c> PostgresStatement<'c> {
    pub fn prepare(client: &'c RefCell<PostgresConnection>, sql: &str) -> Result<Self> {
        let statement = client.borrow_mut().prepare(&to_pg_placeholders(sql))?;
        let values = vec![None; statement.params().len()];
        Ok(Self { client, statement, values })
    }

    fn target(&self, index: usize) -> Result<Type> {
        match index.checked_sub(1).and_then(|i| self.statement.params().get(i)) {
            Some(target) => Ok(target.clone()),
            None => Err(FluteError::BindingFailure(format!(
                "The parameter index {} is out of range, the statement has {}", index, self.values.len()))),
        }
    }

    fn bound(&self) -> Result<Vec<PgValue>> {
        self.values.iter().enumerate()
            .map(|(i, v)| v.clone().ok_or_else(|| FluteError::BindingFailure(format!("No value specified for parameter {}", i + 1))))
            .collect()
    }
}

impl PreparedStatement for PostgresStatement<'_> {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        let target = self.target(index)?;
        self.values[index - 1] = Some(convert_value_to_pg(value, &target)?);
        Ok(())
    }

    fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        let target = self.target(index)?;
        if !null_accepted(jdbc_type, &target) {
            return Err(FluteError::sql(format!(
                "The parameter {} is of type {} but the null is declared as {}", index, target.name(), jdbc_type)));
        }
        self.values[index - 1] = Some(PgValue::Null);
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Rows> {
        let params = self.bound()?;
        execute_rows(&mut self.client.borrow_mut(), &self.statement, &params)
    }

    fn execute_update(&mut self) -> Result<u64> {
        let params = self.bound()?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Ok(self.client.borrow_mut().execute(&self.statement, &refs)?)
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Calls a function with `SELECT`, the way the JDBC driver rewrites the
/// call escape. OUT parameters come back as the columns of the row and
/// ref cursors are fetched inside the transaction that opened them.
pub struct PostgresCallableStatement<'c> {
    client: &'c RefCell<PostgresConnection>,
    in_transaction: &'c Cell<bool>,
    spec: CallSpec,
    values: HashMap<usize, FluteValue>,
    out_types: HashMap<usize, JdbcType>,
    out_values: HashMap<usize, FluteValue>,
    results: ResultQueue,
}

impl<'c> PostgresCallableStatement<'c> {
    pub fn new(client: &'c RefCell<PostgresConnection>, in_transaction: &'c Cell<bool>, spec: CallSpec) -> Self {
        Self {
            client,
            in_transaction,
            spec,
            values: HashMap::new(),
            out_types: HashMap::new(),
            out_values: HashMap::new(),
            results: ResultQueue::default(),
        }
    }

    fn call_sql(&self) -> (String, Vec<usize>) {
        let inputs: Vec<usize> = self.spec.arguments().filter(|(_, p)| p.is_input()).map(|(i, _)| i).collect();
        let marks: Vec<String> = (1..=inputs.len()).map(|n| format!("${}", n)).collect();
        let has_outs = self.spec.arguments().any(|(_, p)| p.is_output());
        let sql = if self.spec.has_return() && !has_outs {
            format!("SELECT {}({})", self.spec.procedure_name, marks.join(", "))
        } else {
            format!("SELECT * FROM {}({})", self.spec.procedure_name, marks.join(", "))
        };
        (sql, inputs)
    }

    fn fetch_cursor(client: &mut postgres::Client, name: &str) -> Result<Rows> {
        let statement = client.prepare(&format!("FETCH ALL IN \"{}\"", name.replace('"', "\"\"")))?;
        execute_rows(client, &statement, &[])
    }

    fn run(&mut self, client: &mut postgres::Client) -> Result<()> {
        let (sql, inputs) = self.call_sql();
        let statement = client.prepare(&sql)?;
        let mut params = Vec::with_capacity(inputs.len());
        for (target, index) in statement.params().iter().zip(inputs.iter()) {
            let value = self.values.get(index).cloned().unwrap_or(FluteValue::Null);
            params.push(convert_value_to_pg(&value, target)?);
        }
        let rows = execute_rows(client, &statement, &params)?;

        // OUT parameters come back as the columns, a plain return value
        // is the only column
        let has_outs = self.spec.arguments().any(|(_, p)| p.is_output());
        let outputs: Vec<(usize, bool)> = self.spec.indexed()
            .filter(|(_, p)| if has_outs { p.is_output() && !p.is_return() } else { p.is_return() })
            .map(|(i, p)| (i, p.is_cursor()))
            .collect();
        if outputs.is_empty() {
            let columns = statement.columns();
            let void = columns.len() == 1 && *columns[0].type_() == Type::VOID;
            self.results = ResultQueue::new(if void { vec![] } else { vec![CallResult::ResultSet(rows)] });
            return Ok(());
        }
        let first = rows.into_inner().into_iter().next().map(Row::into_data).unwrap_or_default();
        let mut values = first.into_iter();
        for (index, cursor) in outputs {
            let value = values.next().unwrap_or(FluteValue::Null);
            let value = match (&value, cursor) {
                (FluteValue::Text(name), true) => FluteValue::Cursor(Self::fetch_cursor(client, name)?),
                _ => value,
            };
            self.out_values.insert(index, value);
        }
        self.results = ResultQueue::default();
        Ok(())
    }
}

impl CallableStatement for PostgresCallableStatement<'_> {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        self.values.insert(index, value.clone());
        Ok(())
    }

    fn set_null(&mut self, index: usize, _jdbc_type: JdbcType) -> Result<()> {
        self.values.insert(index, FluteValue::Null);
        Ok(())
    }

    fn register_out_parameter(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.out_types.insert(index, jdbc_type);
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.out_values.clear();
        let client = self.client;
        let mut client = client.borrow_mut();
        let cursors = self.spec.parameters.iter().any(|p| p.is_output() && p.is_cursor());
        if cursors && !self.in_transaction.get() {
            // cursors live until the end of their transaction
            client.batch_execute("BEGIN")?;
            if let Err(err) = self.run(&mut client) {
                if let Err(rollback) = client.batch_execute("ROLLBACK") {
                    tracing::warn!("Failed to roll back the cursor call: {}", rollback);
                }
                return Err(err);
            }
            client.batch_execute("COMMIT")?;
        } else {
            self.run(&mut client)?;
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

fn get<'a, T: postgres::types::FromSql<'a>>(row: &'a postgres::Row, index: usize) -> Result<Option<T>> {
    Ok(row.try_get::<_, Option<T>>(index)?)
}

fn get_value_from_row(row: &postgres::Row, index: usize, pg_type: &Type) -> Result<FluteValue> {
    fn or_null<T>(value: Option<T>, f: impl FnOnce(T) -> FluteValue) -> FluteValue {
        value.map(f).unwrap_or(FluteValue::Null)
    }

    let value = match *pg_type {
        Type::INT2 => or_null(get(row, index)?, FluteValue::Smallint),
        Type::INT4 => or_null(get(row, index)?, FluteValue::Int),
        Type::INT8 => or_null(get(row, index)?, FluteValue::Bigint),
        Type::OID => or_null(get::<u32>(row, index)?, |v| FluteValue::Bigint(i64::from(v))),
        Type::FLOAT4 => or_null(get::<f32>(row, index)?, |v| FluteValue::Double(f64::from(v))),
        Type::FLOAT8 => or_null(get(row, index)?, FluteValue::Double),
        Type::NUMERIC => or_null(get::<PgNumeric>(row, index)?, |v| FluteValue::BigDecimal(v.0)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => or_null(get(row, index)?, FluteValue::Text),
        Type::BOOL => or_null(get(row, index)?, FluteValue::Bool),
        Type::DATE => or_null(get(row, index)?, FluteValue::Date),
        Type::TIME => or_null(get(row, index)?, FluteValue::Time),
        Type::TIMESTAMP => or_null(get(row, index)?, FluteValue::DateTime),
        Type::TIMESTAMPTZ => or_null(get(row, index)?, FluteValue::Timestamp),
        Type::BYTEA => or_null(get(row, index)?, FluteValue::Blob),
        Type::UUID => or_null(get(row, index)?, FluteValue::Uuid),
        Type::JSON | Type::JSONB => or_null(get(row, index)?, FluteValue::Json),
        Type::XML => or_null(get::<RawText>(row, index)?, |v| FluteValue::Xml(v.0)),
        Type::REFCURSOR => or_null(get::<RawText>(row, index)?, |v| FluteValue::Text(v.0)),
        Type::VOID => FluteValue::Null,
        Type::INT4_ARRAY => or_null(get::<Vec<Option<i32>>>(row, index)?, |v| {
            FluteValue::Array(v.into_iter().map(|i| or_null(i, FluteValue::Int)).collect())
        }),
        Type::INT8_ARRAY => or_null(get::<Vec<Option<i64>>>(row, index)?, |v| {
            FluteValue::Array(v.into_iter().map(|i| or_null(i, FluteValue::Bigint)).collect())
        }),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => or_null(get::<Vec<Option<String>>>(row, index)?, |v| {
            FluteValue::Array(v.into_iter().map(|s| or_null(s, FluteValue::Text)).collect())
        }),
        _ => match pg_type.kind() {
            Kind::Enum(_) => or_null(get::<RawText>(row, index)?, |v| FluteValue::Text(v.0)),
            _ => {
                tracing::trace!("No conversion for the type {}, reading it as text", pg_type.name());
                match row.try_get::<_, Option<String>>(index) {
                    Ok(text) => or_null(text, FluteValue::Text),
                    Err(_) => FluteValue::Null,
                }
            }
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pg_placeholders() {
        assert_eq!(
            to_pg_placeholders("select * from MEMBER where MEMBER_NAME = '?' and MEMBER_ID = ? -- why?\nand STATUS = ?"),
            "select * from MEMBER where MEMBER_NAME = '?' and MEMBER_ID = $1 -- why?\nand STATUS = $2"
        );
    }

    #[test]
    fn test_null_accepted_by_parameter_type() {
        assert!(null_accepted(JdbcType::Varchar, &Type::TEXT));
        assert!(!null_accepted(JdbcType::Varchar, &Type::INT4));
        assert!(null_accepted(JdbcType::Numeric, &Type::INT4));
        assert!(null_accepted(JdbcType::Other, &Type::INT4));
        assert!(!null_accepted(JdbcType::Varchar, &Type::DATE));
        assert!(null_accepted(JdbcType::Timestamp, &Type::DATE));
        assert!(!null_accepted(JdbcType::Varchar, &Type::INT4_ARRAY));
        assert!(null_accepted(JdbcType::Array, &Type::TEXT_ARRAY));
    }

    #[test]
    fn test_convert_value_to_pg_follows_target_width() {
        assert!(matches!(convert_value_to_pg(&FluteValue::Bigint(5), &Type::INT4).unwrap(), PgValue::Int32(5)));
        assert!(matches!(convert_value_to_pg(&FluteValue::Int(5), &Type::INT8).unwrap(), PgValue::Int64(5)));
        assert!(convert_value_to_pg(&FluteValue::Bigint(i64::MAX), &Type::INT2).is_err());
        assert!(matches!(convert_value_to_pg(&FluteValue::Int(5), &Type::NUMERIC).unwrap(), PgValue::Numeric(_)));
    }
}
