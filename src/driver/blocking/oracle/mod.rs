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
//! Oracle modules.
//!

mod connection;
mod meta;

pub use connection::*;
pub use meta::*;

use std::cell::Cell;
use std::collections::HashMap;
use std::str::FromStr;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use oracle::sql_type::{OracleType, RefCursor, ToSql};
use oracle::{ResultSet, Statement};
use flute_core::{FluteValue, JdbcType, Row, Rows};
use crate::driver::blocking::number_placeholders;
use crate::driver::{CallResult, CallSpec, CallableStatement, PreparedStatement, ResultQueue};
use crate::errors::{FluteError, Result};

/// Value kept for a bind position. Oracle has no boolean column type,
/// so booleans travel as `NUMBER(1)`.
#[derive(Debug, Clone)]
enum OracleBind {
    Null(OracleType),
    Integer(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
}

impl OracleBind {
    fn bind(&self, statement: &mut Statement, index: usize, out: Option<&OracleType>) -> Result<()> {
        match self {
            OracleBind::Null(oratype) => statement.bind(index, out.unwrap_or(oratype))?,
            OracleBind::Integer(v) => bind_one(statement, index, v, out)?,
            OracleBind::Double(v) => bind_one(statement, index, v, out)?,
            OracleBind::Text(v) => bind_one(statement, index, v, out)?,
            OracleBind::Bytes(v) => bind_one(statement, index, v, out)?,
            OracleBind::Date(v) => bind_one(statement, index, v, out)?,
            OracleBind::DateTime(v) => bind_one(statement, index, v, out)?,
            OracleBind::Timestamp(v) => bind_one(statement, index, v, out)?,
        }
        Ok(())
    }
}

/// Binds an IN value, or an IN OUT value when the output type is given.
fn bind_one<T: ToSql>(statement: &mut Statement, index: usize, value: &T, out: Option<&OracleType>) -> oracle::Result<()> {
    match out {
        Some(oratype) => statement.bind(index, &(value, oratype)),
        None => statement.bind(index, value),
    }
}

/// helper function that converts FluteValue to Oracle argument values
fn convert_value_to_oracle(value: &FluteValue) -> Result<OracleBind> {
    Ok(match value {
        FluteValue::Null => OracleBind::Null(OracleType::Varchar2(1)),
        FluteValue::Bool(v) => OracleBind::Integer(if *v { 1 } else { 0 }),
        FluteValue::Smallint(v) => OracleBind::Integer(i64::from(*v)),
        FluteValue::Int(v) => OracleBind::Integer(i64::from(*v)),
        FluteValue::Bigint(v) => OracleBind::Integer(*v),
        FluteValue::Double(v) => OracleBind::Double(*v),
        // NUMBER keeps every digit when it arrives as text
        FluteValue::BigDecimal(v) => OracleBind::Text(v.to_string()),
        FluteValue::Text(v) | FluteValue::Xml(v) => OracleBind::Text(v.clone()),
        FluteValue::Blob(v) => OracleBind::Bytes(v.clone()),
        FluteValue::Json(v) => OracleBind::Text(v.to_string()),
        FluteValue::Uuid(v) => OracleBind::Text(v.to_string()),
        FluteValue::Date(v) => OracleBind::Date(*v),
        FluteValue::Time(v) => OracleBind::Text(v.format("%H:%M:%S%.f").to_string()),
        FluteValue::DateTime(v) => OracleBind::DateTime(*v),
        FluteValue::Timestamp(v) => OracleBind::Timestamp(*v),
        FluteValue::Array(_) | FluteValue::Cursor(_) => {
            return Err(FluteError::BindingFailure(format!(
                "Oracle does not bind {} values", value.type_name()
            )));
        }
    })
}

/// Variable type used for a typed null or an output of the JDBC type.
fn oracle_type_of(jdbc_type: JdbcType) -> OracleType {
    match jdbc_type {
        JdbcType::Tinyint | JdbcType::Smallint | JdbcType::Integer | JdbcType::Bigint
        | JdbcType::Numeric | JdbcType::Decimal | JdbcType::Bit | JdbcType::Boolean => OracleType::Number(0, -127),
        JdbcType::Float | JdbcType::Real | JdbcType::Double => OracleType::BinaryDouble,
        JdbcType::Nchar | JdbcType::Nvarchar | JdbcType::Longnvarchar => OracleType::NVarchar2(2000),
        JdbcType::Date => OracleType::Date,
        JdbcType::Time | JdbcType::Timestamp => OracleType::Timestamp(9),
        JdbcType::TimeWithTimezone | JdbcType::TimestampWithTimezone => OracleType::TimestampTZ(9),
        JdbcType::Binary | JdbcType::Varbinary | JdbcType::Longvarbinary => OracleType::Raw(2000),
        JdbcType::Blob => OracleType::BLOB,
        JdbcType::Clob | JdbcType::Sqlxml => OracleType::CLOB,
        JdbcType::Nclob => OracleType::NCLOB,
        JdbcType::RefCursor => OracleType::RefCursor,
        _ => OracleType::Varchar2(4000),
    }
}

/// Collects a result set, keeping the column order of the select list.
fn collect_rows(result_set: ResultSet<'_, oracle::Row>) -> Result<Rows> {
    let columns: Vec<String> = result_set.column_info().iter().map(|c| c.name().to_string()).collect();
    let types: Vec<OracleType> = result_set.column_info().iter().map(|c| c.oracle_type().clone()).collect();
    let mut rows = Rows::new();
    for row in result_set {
        let row = row?;
        let mut data = Vec::with_capacity(types.len());
        for (index, oratype) in types.iter().enumerate() {
            data.push(get_value_from_oracle_row(&row, index, oratype)?);
        }
        rows.push(Row::new(columns.clone(), data));
    }
    Ok(rows)
}

fn parse_decimal(text: Option<String>) -> Result<FluteValue> {
    match text {
        Some(text) => BigDecimal::from_str(text.trim())
            .map(FluteValue::BigDecimal)
            .map_err(|e| FluteError::sql(format!("Invalid NUMBER value {}: {}", text, e))),
        None => Ok(FluteValue::Null),
    }
}

/// Get the value from the Oracle row
fn get_value_from_oracle_row(row: &oracle::Row, index: usize, oratype: &OracleType) -> Result<FluteValue> {
    let value = match oratype {
        OracleType::Number(precision, 0) if (1..=9).contains(precision) => {
            row.get::<usize, Option<i32>>(index)?.map(FluteValue::Int)
        }
        OracleType::Number(precision, 0) if (10..=18).contains(precision) => {
            row.get::<usize, Option<i64>>(index)?.map(FluteValue::Bigint)
        }
        OracleType::Number(_, _) | OracleType::Int64 | OracleType::UInt64 => {
            return parse_decimal(row.get::<usize, Option<String>>(index)?);
        }
        OracleType::BinaryFloat | OracleType::BinaryDouble | OracleType::Float(_) => {
            row.get::<usize, Option<f64>>(index)?.map(FluteValue::Double)
        }
        OracleType::Boolean => row.get::<usize, Option<bool>>(index)?.map(FluteValue::Bool),
        OracleType::Date | OracleType::Timestamp(_) => {
            row.get::<usize, Option<NaiveDateTime>>(index)?.map(FluteValue::DateTime)
        }
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => {
            row.get::<usize, Option<DateTime<Utc>>>(index)?.map(FluteValue::Timestamp)
        }
        OracleType::BLOB | OracleType::Raw(_) | OracleType::LongRaw | OracleType::BFILE => {
            row.get::<usize, Option<Vec<u8>>>(index)?.map(FluteValue::Blob)
        }
        OracleType::RefCursor => match row.get::<usize, Option<RefCursor>>(index)? {
            Some(mut cursor) => Some(FluteValue::Cursor(collect_rows(cursor.query()?)?)),
            None => None,
        },
        _ => row.get::<usize, Option<String>>(index)?.map(FluteValue::Text),
    };
    Ok(value.unwrap_or(FluteValue::Null))
}

/// Reads an output variable as the type it was registered with.
fn get_out_value(statement: &Statement, index: usize, jdbc_type: JdbcType) -> Result<FluteValue> {
    let value = match jdbc_type {
        JdbcType::Tinyint | JdbcType::Smallint => statement.bind_value::<usize, Option<i16>>(index)?.map(FluteValue::Smallint),
        JdbcType::Integer => statement.bind_value::<usize, Option<i32>>(index)?.map(FluteValue::Int),
        JdbcType::Bigint => statement.bind_value::<usize, Option<i64>>(index)?.map(FluteValue::Bigint),
        JdbcType::Numeric | JdbcType::Decimal => return parse_decimal(statement.bind_value(index)?),
        JdbcType::Float | JdbcType::Real | JdbcType::Double => {
            statement.bind_value::<usize, Option<f64>>(index)?.map(FluteValue::Double)
        }
        JdbcType::Bit | JdbcType::Boolean => {
            statement.bind_value::<usize, Option<i64>>(index)?.map(|v| FluteValue::Bool(v != 0))
        }
        JdbcType::Date | JdbcType::Time | JdbcType::Timestamp => {
            statement.bind_value::<usize, Option<NaiveDateTime>>(index)?.map(FluteValue::DateTime)
        }
        JdbcType::TimeWithTimezone | JdbcType::TimestampWithTimezone => {
            statement.bind_value::<usize, Option<DateTime<Utc>>>(index)?.map(FluteValue::Timestamp)
        }
        JdbcType::Binary | JdbcType::Varbinary | JdbcType::Longvarbinary | JdbcType::Blob => {
            statement.bind_value::<usize, Option<Vec<u8>>>(index)?.map(FluteValue::Blob)
        }
        JdbcType::RefCursor => match statement.bind_value::<usize, Option<RefCursor>>(index)? {
            Some(mut cursor) => Some(FluteValue::Cursor(collect_rows(cursor.query()?)?)),
            None => None,
        },
        _ => statement.bind_value::<usize, Option<String>>(index)?.map(FluteValue::Text),
    };
    Ok(value.unwrap_or(FluteValue::Null))
}

pub struct OracleStatement<'c> {
    conn: &'c OracleConnection,
    in_transaction: &'c Cell<bool>,
    statement: Statement,
}

impl<'c> OracleStatement<'c> {
    pub fn prepare(conn: &'c OracleConnection, in_transaction: &'c Cell<bool>, sql: &str) -> Result<Self> {
        let statement = conn.statement(&number_placeholders(sql, ":")).build()?;
        Ok(Self { conn, in_transaction, statement })
    }
}

impl PreparedStatement for OracleStatement<'_> {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        convert_value_to_oracle(value)?.bind(&mut self.statement, index, None)
    }

    fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.statement.bind(index, &oracle_type_of(jdbc_type))?;
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Rows> {
        collect_rows(self.statement.query(&[])?)
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.statement.execute(&[])?;
        let count = self.statement.row_count()?;
        // If not in the transaction, commit automatically
        if !self.in_transaction.get() {
            self.conn.commit()?;
        }
        Ok(count)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.statement.close()?;
        Ok(())
    }
}

fn block_sql(spec: &CallSpec) -> String {
    let marks: Vec<String> = spec.arguments().map(|(i, _)| format!(":{}", i)).collect();
    if spec.has_return() {
        format!("BEGIN :1 := {}({}); END;", spec.procedure_name, marks.join(", "))
    } else if marks.is_empty() {
        format!("BEGIN {}; END;", spec.procedure_name)
    } else {
        format!("BEGIN {}({}); END;", spec.procedure_name, marks.join(", "))
    }
}

/// Call through an anonymous PL/SQL block, `BEGIN :1 := PKG.FN(:2); END;`.
/// Result sets returned with `DBMS_SQL.RETURN_RESULT` are read after the
/// block ran.
pub struct OracleCallableStatement<'c> {
    conn: &'c OracleConnection,
    in_transaction: &'c Cell<bool>,
    spec: CallSpec,
    values: HashMap<usize, OracleBind>,
    out_types: HashMap<usize, JdbcType>,
    out_values: HashMap<usize, FluteValue>,
    results: ResultQueue,
}

impl<'c> OracleCallableStatement<'c> {
    pub fn new(conn: &'c OracleConnection, in_transaction: &'c Cell<bool>, spec: CallSpec) -> Self {
        Self {
            conn,
            in_transaction,
            spec,
            values: HashMap::new(),
            out_types: HashMap::new(),
            out_values: HashMap::new(),
            results: ResultQueue::default(),
        }
    }

    fn run(&mut self) -> Result<()> {
        let mut statement = self.conn.statement(&block_sql(&self.spec)).build()?;
        for (index, parameter) in self.spec.indexed() {
            let out = self.out_types.get(&index).map(|t| {
                if parameter.is_cursor() { OracleType::RefCursor } else { oracle_type_of(*t) }
            });
            match self.values.get(&index) {
                Some(value) => value.bind(&mut statement, index, out.as_ref())?,
                None => match out {
                    Some(oratype) => statement.bind(index, &oratype)?,
                    None => statement.bind(index, &OracleType::Varchar2(1))?,
                },
            }
        }
        statement.execute(&[])?;

        for (index, parameter) in self.spec.indexed() {
            if let Some(jdbc_type) = self.out_types.get(&index) {
                let jdbc_type = if parameter.is_cursor() { JdbcType::RefCursor } else { *jdbc_type };
                self.out_values.insert(index, get_out_value(&statement, index, jdbc_type)?);
            }
        }
        let mut results = Vec::new();
        while let Some(mut cursor) = statement.implicit_result()? {
            results.push(CallResult::ResultSet(collect_rows(cursor.query()?)?));
        }
        self.results = ResultQueue::new(results);
        Ok(())
    }
}

impl CallableStatement for OracleCallableStatement<'_> {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        self.values.insert(index, convert_value_to_oracle(value)?);
        Ok(())
    }

    fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.values.insert(index, OracleBind::Null(oracle_type_of(jdbc_type)));
        Ok(())
    }

    fn register_out_parameter(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.out_types.insert(index, jdbc_type);
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.out_values.clear();
        match self.run() {
            Ok(()) => {
                if !self.in_transaction.get() {
                    self.conn.commit()?;
                }
                Ok(self.results.is_result_set())
            }
            Err(e) => {
                if !self.in_transaction.get() {
                    if let Err(rollback) = self.conn.rollback() {
                        tracing::warn!("Rollback after a failed call did not succeed: {}", rollback);
                    }
                }
                Err(e)
            }
        }
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
            return Err(FluteError::sql(format!("The parameter {} is not registered as an output", index)));
        }
        Ok(self.out_values.remove(&index).unwrap_or(FluteValue::Null))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
