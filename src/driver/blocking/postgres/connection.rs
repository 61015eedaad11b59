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

use std::cell::{Cell, RefCell};
use std::fmt;
use crate::config::FluteConfig;
use crate::driver::blocking::pool_builder;
use crate::driver::{CallSpec, CallableStatement, DataSource, DatabaseMetaData, DbConnection, Dbms, PreparedStatement};
use crate::errors::{FluteError, Result};
use super::{PostgresCallableStatement, PostgresMetaData, PostgresStatement};

pub type PostgresPool = r2d2::Pool<PostgresConnectionManager>;
pub type PostgresConnection = r2d2::PooledConnection<PostgresConnectionManager>;

#[derive(Clone, Debug)]
pub struct PostgresConnectionManager {
    config: postgres::Config,
    connection_timeout: std::time::Duration,
    application_name: Option<String>,
}

impl PostgresConnectionManager {
    /// Takes `postgres://` URLs or key-value strings; the configured user
    /// and password win over the ones in the URL.
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        let url = cfg.url().ok_or_else(|| FluteError::ConfigError("The url is required".to_string()))?;
        let url = url.trim();
        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        let url = match url.strip_prefix("postgresql:") {
            Some(rest) if !rest.starts_with("//") => format!("postgresql://{}", rest),
            _ => url.to_string(),
        };
        let mut config: postgres::Config = url.parse()
            .map_err(|e| FluteError::ConfigError(format!("Invalid PostgreSQL URL: {}", e)))?;
        if let Some(username) = cfg.username() {
            config.user(username);
        }
        if let Some(password) = cfg.password() {
            config.password(password);
        }
        Ok(Self {
            config,
            connection_timeout: cfg.connection_timeout(),
            application_name: Some("flute".to_string()),
        })
    }

    pub fn with_application_name(mut self, name: &str) -> Self {
        self.application_name = Some(name.to_string());
        self
    }
}

impl r2d2::ManageConnection for PostgresConnectionManager {
    type Connection = postgres::Client;
    type Error = postgres::Error;

    fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let mut config = self.config.clone();
        if let Some(app_name) = &self.application_name {
            config.application_name(app_name);
        }
        config.connect_timeout(self.connection_timeout);
        config.connect(postgres::NoTls)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").map(|_| ())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

///
/// Create a connection pool
///
/// cfg Configuration information
///
pub fn init_postgres_pool(cfg: &FluteConfig) -> Result<PostgresPool> {
    let manager = PostgresConnectionManager::new(cfg)?;
    let pool = pool_builder(cfg).build(manager)
        .map_err(|e| FluteError::PoolError(format!("Failed to create PostgreSQL connection pool: {}", e)))?;

    let mut conn = pool.get()?;
    conn.simple_query("SELECT 1")
        .map_err(|e| FluteError::PoolError(format!("PostgreSQL connection test failed: {}", e)))?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PostgresDataSource {
    pool: PostgresPool,
    url: String,
    user: String,
}

impl PostgresDataSource {
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        Ok(Self {
            pool: init_postgres_pool(cfg)?,
            url: cfg.url().cloned().unwrap_or_default(),
            user: cfg.username().cloned().unwrap_or_default(),
        })
    }
}

impl fmt::Debug for PostgresDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDataSource").field("url", &self.url).field("user", &self.user).finish()
    }
}

impl DataSource for PostgresDataSource {
    fn dbms(&self) -> Dbms {
        Dbms::PostgreSQL
    }

    fn get_connection(&self) -> Result<Box<dyn DbConnection>> {
        let conn = self.pool.get()?;
        Ok(Box::new(PostgresDbConnection {
            client: RefCell::new(conn),
            in_transaction: Cell::new(false),
            url: self.url.clone(),
            user: self.user.clone(),
        }))
    }
}

pub struct PostgresDbConnection {
    client: RefCell<PostgresConnection>,
    in_transaction: Cell<bool>,
    url: String,
    user: String,
}

impl PostgresDbConnection {
    fn batch_execute(&self, sql: &str) -> Result<()> {
        self.client.borrow_mut().batch_execute(sql)?;
        Ok(())
    }
}

impl DbConnection for PostgresDbConnection {
    fn dbms(&self) -> Dbms {
        Dbms::PostgreSQL
    }

    fn meta_data(&self) -> Result<Box<dyn DatabaseMetaData + '_>> {
        Ok(Box::new(PostgresMetaData::new(&self.client, &self.url, &self.user)))
    }

    fn catalog(&self) -> Result<Option<String>> {
        let row = self.client.borrow_mut().query_one("SELECT current_database()::text", &[])?;
        Ok(row.try_get::<_, Option<String>>(0)?)
    }

    fn prepare_statement(&self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
        Ok(Box::new(PostgresStatement::prepare(&self.client, sql)?))
    }

    fn prepare_call(&self, spec: &CallSpec) -> Result<Box<dyn CallableStatement + '_>> {
        Ok(Box::new(PostgresCallableStatement::new(&self.client, &self.in_transaction, spec.clone())))
    }

    fn begin(&self) -> Result<()> {
        self.batch_execute("BEGIN")?;
        self.in_transaction.set(true);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.in_transaction.set(false);
        self.batch_execute("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.in_transaction.set(false);
        self.batch_execute("ROLLBACK")
    }

    fn close(self: Box<Self>) -> Result<()> {
        if self.in_transaction.get() {
            tracing::warn!("Closing a PostgreSQL connection inside a transaction, rolling back");
            self.batch_execute("ROLLBACK")?;
        }
        Ok(())
    }
}
