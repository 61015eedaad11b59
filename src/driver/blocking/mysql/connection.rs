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

use std::cell::RefCell;
use std::fmt;
use mysql::{Conn, Error, Opts, OptsBuilder};
use mysql::prelude::Queryable;
use crate::config::FluteConfig;
use crate::driver::blocking::pool_builder;
use crate::driver::{CallSpec, CallableStatement, DataSource, DatabaseMetaData, DbConnection, Dbms, PreparedStatement};
use crate::errors::{FluteError, Result};
use super::{MysqlCallableStatement, MysqlMetaData, MysqlStatement};

pub type MysqlPool = r2d2::Pool<MysqlConnectionManager>;
pub type MysqlConnection = r2d2::PooledConnection<MysqlConnectionManager>;

#[derive(Clone, Debug)]
pub struct MysqlConnectionManager {
    params: Opts,
}

impl MysqlConnectionManager {
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        let url = cfg.url().ok_or_else(|| FluteError::ConfigError("The url is required".to_string()))?;
        let url = url.trim();
        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        let opts = Opts::from_url(url)
            .map_err(|e| FluteError::ConfigError(format!("Invalid MySQL URL: {}", e)))?;
        let mut builder = OptsBuilder::from_opts(opts);
        if let Some(username) = cfg.username() {
            builder = builder.user(Some(username.clone()));
        }
        if let Some(password) = cfg.password() {
            builder = builder.pass(Some(password.clone()));
        }
        Ok(Self { params: Opts::from(builder) })
    }
}

impl r2d2::ManageConnection for MysqlConnectionManager {
    type Connection = Conn;
    type Error = Error;

    fn connect(&self) -> std::result::Result<Conn, Error> {
        Conn::new(self.params.clone())
    }

    fn is_valid(&self, conn: &mut Conn) -> std::result::Result<(), Error> {
        match conn.ping() {
            Ok(_) => Ok(()),
            Err(_) => {
                // a failed ping gets a second chance with a query
                conn.query_drop("SELECT 1").map_err(|e| {
                    tracing::warn!("Connection validation failed: {}", e);
                    e
                })
            }
        }
    }

    fn has_broken(&self, conn: &mut Conn) -> bool {
        conn.ping().is_err()
    }
}

///
/// Create a connection pool
///
/// cfg Configuration information
///
pub fn init_mysql_pool(cfg: &FluteConfig) -> Result<MysqlPool> {
    let manager = MysqlConnectionManager::new(cfg)?;
    let pool = pool_builder(cfg).build(manager)
        .map_err(|e| FluteError::PoolError(format!("Failed to create MySQL connection pool: {}", e)))?;

    // Testing connections
    let mut conn = pool.get()?;
    conn.query_drop("SELECT 1")
        .map_err(|e| FluteError::PoolError(format!("MySQL connection test failed: {}", e)))?;
    Ok(pool)
}

#[derive(Clone)]
pub struct MysqlDataSource {
    pool: MysqlPool,
    url: String,
    user: String,
}

impl MysqlDataSource {
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        Ok(Self {
            pool: init_mysql_pool(cfg)?,
            url: cfg.url().cloned().unwrap_or_default(),
            user: cfg.username().cloned().unwrap_or_default(),
        })
    }
}

impl fmt::Debug for MysqlDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlDataSource").field("url", &self.url).field("user", &self.user).finish()
    }
}

impl DataSource for MysqlDataSource {
    fn dbms(&self) -> Dbms {
        Dbms::MySQL
    }

    fn get_connection(&self) -> Result<Box<dyn DbConnection>> {
        let conn = self.pool.get()?;
        Ok(Box::new(MysqlDbConnection {
            conn: RefCell::new(conn),
            url: self.url.clone(),
            user: self.user.clone(),
        }))
    }
}

/// Pooled MySQL connection; the driver needs it mutably for every
/// round trip, so statements share it through a `RefCell`.
pub struct MysqlDbConnection {
    conn: RefCell<MysqlConnection>,
    url: String,
    user: String,
}

impl MysqlDbConnection {
    fn query_drop(&self, sql: &str) -> Result<()> {
        self.conn.borrow_mut().query_drop(sql)?;
        Ok(())
    }
}

impl DbConnection for MysqlDbConnection {
    fn dbms(&self) -> Dbms {
        Dbms::MySQL
    }

    fn meta_data(&self) -> Result<Box<dyn DatabaseMetaData + '_>> {
        Ok(Box::new(MysqlMetaData::new(&self.conn, &self.url, &self.user)))
    }

    /// The current database, which MySQL reports as the catalog.
    fn catalog(&self) -> Result<Option<String>> {
        let database: Option<Option<String>> = self.conn.borrow_mut().query_first("SELECT DATABASE()")?;
        Ok(database.flatten())
    }

    fn prepare_statement(&self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
        Ok(Box::new(MysqlStatement::new(&self.conn, sql)))
    }

    fn prepare_call(&self, spec: &CallSpec) -> Result<Box<dyn CallableStatement + '_>> {
        Ok(Box::new(MysqlCallableStatement::new(&self.conn, spec.clone())))
    }

    fn begin(&self) -> Result<()> {
        self.query_drop("START TRANSACTION")
    }

    fn commit(&self) -> Result<()> {
        self.query_drop("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.query_drop("ROLLBACK")
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
