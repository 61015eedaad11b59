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
use flute_core::{ConversionError, FluteDataError};

/// Driver level failure, carrying the SQLState and the vendor code when
/// the driver reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlError {
    pub message: String,
    pub sql_state: Option<String>,
    pub vendor_code: Option<i32>,
}

impl SqlError {
    pub fn new<T: Into<String>>(message: T) -> Self {
        Self { message: message.into(), sql_state: None, vendor_code: None }
    }

    pub fn with_sql_state<T: Into<String>>(mut self, sql_state: T) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    pub fn with_vendor_code(mut self, vendor_code: i32) -> Self {
        self.vendor_code = Some(vendor_code);
        self
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(state) = &self.sql_state {
            write!(f, " (SQLState={}", state)?;
            match self.vendor_code {
                Some(code) => write!(f, ", ErrorCode={})", code)?,
                None => write!(f, ")")?,
            }
        } else if let Some(code) = self.vendor_code {
            write!(f, " (ErrorCode={})", code)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum FluteError {
    /// Raw failure from the driver.
    Sql(SqlError),
    TableNotFound(String),
    ProcedureNotFound(String),
    DuplicateTable(String),
    DuplicateSynonym(String),
    /// Unique constraint violation translated from a driver error.
    EntityAlreadyExists { message: String, cause: SqlError },
    SqlFailure { message: String, cause: Option<SqlError> },
    BindingFailure(String),
    ColumnValueProcessing(String),
    IllegalCommand(String),
    ConfigError(String),
    PoolError(String),
    IoError(std::io::Error),
    XmlError(String),
    DataError(FluteDataError),
    Unsupported(String),
}

impl FluteError {
    /// The driver error underneath, if any.
    pub fn sql_error(&self) -> Option<&SqlError> {
        match self {
            FluteError::Sql(e) => Some(e),
            FluteError::EntityAlreadyExists { cause, .. } => Some(cause),
            FluteError::SqlFailure { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    pub fn sql<T: Into<String>>(message: T) -> Self {
        FluteError::Sql(SqlError::new(message))
    }
}

impl fmt::Display for FluteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FluteError::Sql(err) => write!(f, "SQL Error: {}", err),
            FluteError::TableNotFound(msg) => write!(f, "{}", msg),
            FluteError::ProcedureNotFound(msg) => write!(f, "{}", msg),
            FluteError::DuplicateTable(msg) => write!(f, "{}", msg),
            FluteError::DuplicateSynonym(msg) => write!(f, "{}", msg),
            FluteError::EntityAlreadyExists { message, .. } => write!(f, "{}", message),
            FluteError::SqlFailure { message, .. } => write!(f, "{}", message),
            FluteError::BindingFailure(msg) => write!(f, "{}", msg),
            FluteError::ColumnValueProcessing(msg) => write!(f, "{}", msg),
            FluteError::IllegalCommand(msg) => write!(f, "Illegal Behavior Command: {}", msg),
            FluteError::ConfigError(msg) => write!(f, "Config Error: {}", msg),
            FluteError::PoolError(msg) => write!(f, "Pool Error: {}", msg),
            FluteError::IoError(err) => write!(f, "IO Error: {}", err),
            FluteError::XmlError(msg) => write!(f, "XML Error: {}", msg),
            FluteError::DataError(err) => write!(f, "Data Error: {}", err),
            FluteError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl std::error::Error for FluteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FluteError::IoError(err) => Some(err),
            FluteError::DataError(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for SqlError {}

pub type Result<T> = std::result::Result<T, FluteError>;

impl From<SqlError> for FluteError {
    fn from(err: SqlError) -> Self {
        FluteError::Sql(err)
    }
}

impl From<std::io::Error> for FluteError {
    fn from(err: std::io::Error) -> Self {
        FluteError::IoError(err)
    }
}

impl From<FluteDataError> for FluteError {
    fn from(err: FluteDataError) -> Self {
        FluteError::DataError(err)
    }
}

impl From<ConversionError> for FluteError {
    fn from(err: ConversionError) -> Self {
        FluteError::DataError(FluteDataError::ConversionError(err))
    }
}

impl From<quick_xml::Error> for FluteError {
    fn from(err: quick_xml::Error) -> Self {
        FluteError::XmlError(err.to_string())
    }
}

impl From<csv::Error> for FluteError {
    fn from(err: csv::Error) -> Self {
        FluteError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))
    }
}

impl From<serde_json::Error> for FluteError {
    fn from(err: serde_json::Error) -> Self {
        FluteError::ConfigError(err.to_string())
    }
}

#[cfg(any(feature = "mysql-sync", feature = "postgres-sync", feature = "sqlite-sync", feature = "oracle-sync"))]
impl From<r2d2::Error> for FluteError {
    fn from(err: r2d2::Error) -> Self {
        FluteError::PoolError(err.to_string())
    }
}

#[cfg(feature = "sqlite-sync")]
impl From<rusqlite::Error> for FluteError {
    fn from(err: rusqlite::Error) -> Self {
        let sql_error = match &err {
            rusqlite::Error::SqliteFailure(code, _) => {
                SqlError::new(err.to_string()).with_vendor_code(code.extended_code)
            }
            _ => SqlError::new(err.to_string()),
        };
        FluteError::Sql(sql_error)
    }
}

#[cfg(feature = "mysql-sync")]
impl From<mysql::Error> for FluteError {
    fn from(err: mysql::Error) -> Self {
        let sql_error = match &err {
            mysql::Error::MySqlError(e) => SqlError::new(e.message.clone())
                .with_sql_state(e.state.clone())
                .with_vendor_code(e.code as i32),
            _ => SqlError::new(err.to_string()),
        };
        FluteError::Sql(sql_error)
    }
}

#[cfg(feature = "postgres-sync")]
impl From<postgres::Error> for FluteError {
    fn from(err: postgres::Error) -> Self {
        let mut sql_error = SqlError::new(err.to_string());
        if let Some(state) = err.code() {
            sql_error = sql_error.with_sql_state(state.code());
        }
        FluteError::Sql(sql_error)
    }
}

#[cfg(feature = "oracle-sync")]
impl From<oracle::Error> for FluteError {
    fn from(err: oracle::Error) -> Self {
        let message = err.to_string();
        let mut sql_error = SqlError::new(message.clone());
        if let Some(code) = crate::behavior::parse_oracle_error_code(&message) {
            sql_error = sql_error.with_vendor_code(code);
        }
        FluteError::Sql(sql_error)
    }
}
