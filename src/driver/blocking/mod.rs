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
//! Pooled adapters over the bundled synchronous drivers.
//!

use std::time::Duration;
use flute_core::JdbcType;
use crate::config::FluteConfig;
use crate::driver::{DataSource, Dbms};
use crate::errors::{FluteError, Result};

#[cfg(feature = "mysql-sync")]
pub mod mysql;
#[cfg(feature = "postgres-sync")]
pub mod postgres;
#[cfg(feature = "oracle-sync")]
pub mod oracle;
#[cfg(feature = "sqlite-sync")]
pub mod sqlite;

#[cfg(feature = "mysql-sync")]
pub use self::mysql::MysqlDataSource;
#[cfg(feature = "postgres-sync")]
pub use self::postgres::PostgresDataSource;
#[cfg(feature = "oracle-sync")]
pub use self::oracle::OracleDataSource;
#[cfg(feature = "sqlite-sync")]
pub use self::sqlite::SqliteDataSource;

/// Opens the data source the URL scheme names.
///
/// Only the adapters compiled in through their features are available,
/// any other product fails with [`FluteError::Unsupported`].
pub fn open_data_source(cfg: &FluteConfig) -> Result<Box<dyn DataSource + Send + Sync>> {
    let dbms = cfg.dbms();
    tracing::debug!("Opening data source for {}", dbms);
    match dbms {
        #[cfg(feature = "mysql-sync")]
        Dbms::MySQL => Ok(Box::new(MysqlDataSource::new(cfg)?)),
        #[cfg(feature = "postgres-sync")]
        Dbms::PostgreSQL => Ok(Box::new(PostgresDataSource::new(cfg)?)),
        #[cfg(feature = "oracle-sync")]
        Dbms::Oracle => Ok(Box::new(OracleDataSource::new(cfg)?)),
        #[cfg(feature = "sqlite-sync")]
        Dbms::SQLite => Ok(Box::new(SqliteDataSource::new(cfg)?)),
        other => Err(FluteError::Unsupported(format!("No bundled adapter for the database: {}", other))),
    }
}

/// Rewrites `?` markers into numbered ones (`$1`, `:1`), leaving quoted
/// text and line comments alone.
pub(crate) fn number_placeholders(sql: &str, marker: &str) -> String {
    let mut result = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut index = 0;
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                result.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    result.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    result.push(c);
                    for rest in chars.by_ref() {
                        result.push(rest);
                        if rest == '\n' {
                            break;
                        }
                    }
                }
                '?' => {
                    index += 1;
                    result.push_str(marker);
                    result.push_str(&index.to_string());
                }
                _ => result.push(c),
            },
        }
    }
    result
}

/// Pool settings shared by every adapter.
pub(crate) fn pool_builder<M: r2d2::ManageConnection>(cfg: &FluteConfig) -> r2d2::Builder<M> {
    r2d2::Pool::builder()
        .max_size(cfg.max_size().max(1))
        .min_idle(cfg.min_idle())
        .connection_timeout(cfg.connection_timeout().max(Duration::from_millis(1)))
}

/// Type code of a database type name, the way the drivers report it in
/// `DATA_TYPE`. Unknown names map to `OTHER`.
pub(crate) fn jdbc_type_of(type_name: &str) -> JdbcType {
    let upper = type_name.trim().to_uppercase();
    if upper.ends_with("[]") || upper.starts_with('_') {
        return JdbcType::Array;
    }
    if upper.contains("WITH TIME ZONE") || upper.contains("WITH LOCAL TIME ZONE") {
        return if upper.starts_with("TIME ") || upper.starts_with("TIME(") {
            JdbcType::TimeWithTimezone
        } else {
            JdbcType::TimestampWithTimezone
        };
    }
    let base = upper.split('(').next().unwrap_or_default().trim();
    let base = base.strip_suffix(" UNSIGNED").unwrap_or(base);
    if let Some(known) = JdbcType::from_name(base) {
        return known;
    }
    match base {
        "INT" | "INT4" | "MEDIUMINT" | "SERIAL" | "PLS_INTEGER" | "BINARY_INTEGER" => JdbcType::Integer,
        "INT8" | "BIGSERIAL" => JdbcType::Bigint,
        "INT2" | "SMALLSERIAL" | "YEAR" => JdbcType::Smallint,
        "BOOL" => JdbcType::Boolean,
        "FLOAT4" | "BINARY_FLOAT" => JdbcType::Real,
        "FLOAT8" | "DOUBLE PRECISION" | "BINARY_DOUBLE" => JdbcType::Double,
        "NUMBER" => JdbcType::Numeric,
        "DEC" | "MONEY" => JdbcType::Decimal,
        "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "LONG" => JdbcType::Longvarchar,
        "VARCHAR2" | "CHARACTER VARYING" | "ENUM" | "SET" | "NAME" | "CITEXT" => JdbcType::Varchar,
        "NVARCHAR2" => JdbcType::Nvarchar,
        "BPCHAR" | "CHARACTER" => JdbcType::Char,
        "DATETIME" | "TIMESTAMP WITHOUT TIME ZONE" => JdbcType::Timestamp,
        "TIMESTAMPTZ" => JdbcType::TimestampWithTimezone,
        "TIMETZ" => JdbcType::TimeWithTimezone,
        "TIME WITHOUT TIME ZONE" => JdbcType::Time,
        "BYTEA" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "LONG RAW" => JdbcType::Longvarbinary,
        "RAW" => JdbcType::Varbinary,
        "XML" | "XMLTYPE" => JdbcType::Sqlxml,
        "REFCURSOR" | "REF CURSOR" => JdbcType::RefCursor,
        "ARRAY" | "VARRAY" | "TABLE" => JdbcType::Array,
        "OBJECT" => JdbcType::Struct,
        _ => JdbcType::Other,
    }
}

/// `(size, decimal digits)` written in a declared type, e.g. `DECIMAL(10, 2)`.
pub(crate) fn declared_size(type_name: &str) -> (Option<i32>, Option<i32>) {
    let args = match (type_name.find('('), type_name.rfind(')')) {
        (Some(open), Some(close)) if open < close => &type_name[open + 1..close],
        _ => return (None, None),
    };
    let mut parts = args.split(',').map(|p| p.trim().parse::<i32>().ok());
    (parts.next().flatten(), parts.next().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jdbc_type_of_vendor_names() {
        assert_eq!(jdbc_type_of("VARCHAR(12)"), JdbcType::Varchar);
        assert_eq!(jdbc_type_of("int unsigned"), JdbcType::Integer);
        assert_eq!(jdbc_type_of("character varying"), JdbcType::Varchar);
        assert_eq!(jdbc_type_of("timestamp with time zone"), JdbcType::TimestampWithTimezone);
        assert_eq!(jdbc_type_of("TIMESTAMP(6) WITH LOCAL TIME ZONE"), JdbcType::TimestampWithTimezone);
        assert_eq!(jdbc_type_of("_int4"), JdbcType::Array);
        assert_eq!(jdbc_type_of("NUMBER"), JdbcType::Numeric);
        assert_eq!(jdbc_type_of("refcursor"), JdbcType::RefCursor);
        assert_eq!(jdbc_type_of("geometry"), JdbcType::Other);
    }

    #[test]
    fn test_declared_size() {
        assert_eq!(declared_size("DECIMAL(10, 2)"), (Some(10), Some(2)));
        assert_eq!(declared_size("VARCHAR(12)"), (Some(12), None));
        assert_eq!(declared_size("INTEGER"), (None, None));
    }

    #[test]
    fn test_number_placeholders() {
        assert_eq!(
            number_placeholders("update MEMBER set MEMBER_NAME = ? where MEMBER_ID = ? and STATUS <> '?'", ":"),
            "update MEMBER set MEMBER_NAME = :1 where MEMBER_ID = :2 and STATUS <> '?'"
        );
    }
}
