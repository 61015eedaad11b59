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

use std::cell::Cell;
use std::fmt;
use oracle::Connector;
use crate::config::FluteConfig;
use crate::driver::blocking::pool_builder;
use crate::driver::{CallSpec, CallableStatement, DataSource, DatabaseMetaData, DbConnection, Dbms, PreparedStatement};
use crate::errors::{FluteError, Result};
use super::{OracleCallableStatement, OracleMetaData, OracleStatement};

pub type OracleConnection = r2d2::PooledConnection<OracleConnectionManager>;
pub type OraclePool = r2d2::Pool<OracleConnectionManager>;

/// Oracle Connection Manager
pub struct OracleConnectionManager {
    connector: Connector,
}

impl OracleConnectionManager {
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        let url = cfg.url().ok_or_else(|| FluteError::ConfigError("The url is required".to_string()))?;
        let username = cfg.username()
            .ok_or_else(|| FluteError::ConfigError("Oracle username is required".to_string()))?;
        let password = cfg.password()
            .ok_or_else(|| FluteError::ConfigError("Oracle password is required".to_string()))?;
        Ok(Self::with_easy_connect(username, password, &connect_string(url)?))
    }

    /// Create a connection using the TNS name
    pub fn with_tns(username: &str, password: &str, tns_name: &str) -> Self {
        Self { connector: Connector::new(username, password, tns_name) }
    }

    /// Create a connection using the Easy Connect string
    pub fn with_easy_connect(username: &str, password: &str, easy_connect: &str) -> Self {
        Self { connector: Connector::new(username, password, easy_connect) }
    }
}

/// Connect string of a thin URL.
///
/// `jdbc:oracle:thin:@//host:1521/SERVICE` and `oracle://host:1521/SERVICE`
/// become Easy Connect strings, the SID form `@host:1521:XE` becomes a
/// connect descriptor and anything after a bare `@` is taken as it is.
pub fn connect_string(url: &str) -> Result<String> {
    let url = url.trim();
    let rest = if let Some(at_index) = url.find('@') {
        url[at_index + 1..].trim_start_matches("//")
    } else if let Some(rest) = url.strip_prefix("oracle://") {
        rest
    } else {
        return Err(FluteError::ConfigError(format!("Oracle connection string is required: {}", url)));
    };
    if rest.is_empty() {
        return Err(FluteError::ConfigError(format!("Oracle connection string is required: {}", url)));
    }
    let parts: Vec<&str> = rest.split(':').collect();
    if parts.len() == 3 && !rest.contains('/') && !rest.starts_with('(') {
        return Ok(format!(
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST={})(PORT={}))(CONNECT_DATA=(SID={})))",
            parts[0], parts[1], parts[2]
        ));
    }
    Ok(rest.to_string())
}

impl r2d2::ManageConnection for OracleConnectionManager {
    type Connection = oracle::Connection;
    type Error = oracle::Error;

    fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        self.connector.connect()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.query_row("SELECT 1 FROM DUAL", &[]).map(|_| ())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.ping().is_err()
    }
}

/// Initialize the Oracle connection pool
pub fn init_oracle_pool(cfg: &FluteConfig) -> Result<OraclePool> {
    let manager = OracleConnectionManager::new(cfg)?;
    let pool = pool_builder(cfg).build(manager)
        .map_err(|e| FluteError::PoolError(format!("Failed to create Oracle connection pool: {}", e)))?;

    let conn = pool.get()?;
    conn.query_row("SELECT 1 FROM DUAL", &[])
        .map_err(|e| FluteError::PoolError(format!("Oracle connection test failed: {}", e)))?;
    Ok(pool)
}

#[derive(Clone)]
pub struct OracleDataSource {
    pool: OraclePool,
    url: String,
    user: String,
}

impl OracleDataSource {
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        Ok(Self {
            pool: init_oracle_pool(cfg)?,
            url: cfg.url().cloned().unwrap_or_default(),
            user: cfg.username().cloned().unwrap_or_default(),
        })
    }
}

impl fmt::Debug for OracleDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleDataSource").field("url", &self.url).field("user", &self.user).finish()
    }
}

impl DataSource for OracleDataSource {
    fn dbms(&self) -> Dbms {
        Dbms::Oracle
    }

    fn get_connection(&self) -> Result<Box<dyn DbConnection>> {
        let conn = self.pool.get()?;
        Ok(Box::new(OracleDbConnection {
            conn,
            in_transaction: Cell::new(false),
            url: self.url.clone(),
            user: self.user.clone(),
        }))
    }
}

/// Pooled Oracle session. Oracle opens transactions implicitly, so
/// outside `begin` every statement is committed after it runs.
pub struct OracleDbConnection {
    conn: OracleConnection,
    in_transaction: Cell<bool>,
    url: String,
    user: String,
}

impl DbConnection for OracleDbConnection {
    fn dbms(&self) -> Dbms {
        Dbms::Oracle
    }

    fn meta_data(&self) -> Result<Box<dyn DatabaseMetaData + '_>> {
        Ok(Box::new(OracleMetaData::new(&self.conn, &self.url, &self.user)))
    }

    /// Oracle has no catalogs.
    fn catalog(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn prepare_statement(&self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
        Ok(Box::new(OracleStatement::prepare(&self.conn, &self.in_transaction, sql)?))
    }

    fn prepare_call(&self, spec: &CallSpec) -> Result<Box<dyn CallableStatement + '_>> {
        Ok(Box::new(OracleCallableStatement::new(&self.conn, &self.in_transaction, spec.clone())))
    }

    fn begin(&self) -> Result<()> {
        self.in_transaction.set(true);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.commit()?;
        self.in_transaction.set(false);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn.rollback()?;
        self.in_transaction.set(false);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        if self.in_transaction.get() {
            self.conn.rollback()?;
        }
        Ok(())
    }
}
