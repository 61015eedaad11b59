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
use std::path::{Path, PathBuf};
use r2d2::Pool;
use rusqlite::{Connection, Error, OpenFlags};
use crate::config::FluteConfig;
use crate::driver::blocking::pool_builder;
use crate::driver::{CallSpec, CallableStatement, DataSource, DatabaseMetaData, DbConnection, Dbms, PreparedStatement};
use crate::errors::{FluteError, Result};
use super::{SqliteMetaData, SqliteStatement};

pub type SqlitePool = Pool<SqliteConnectionManager>;
pub type SqliteConnection = r2d2::PooledConnection<SqliteConnectionManager>;

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Memory,
}

type InitFn = dyn Fn(&mut Connection) -> std::result::Result<(), rusqlite::Error> + Send + Sync + 'static;

pub struct SqliteConnectionManager {
    source: Source,
    flags: OpenFlags,
    init: Option<Box<InitFn>>,
}

impl fmt::Debug for SqliteConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("SqliteConnectionManager");
        let _ = builder.field("source", &self.source);
        let _ = builder.field("flags", &self.flags);
        let _ = builder.field("init", &self.init.as_ref().map(|_| "InitFn"));
        builder.finish()
    }
}

impl SqliteConnectionManager {
    /// Accepts `sqlite:<path>`, `sqlite://<path>` and `sqlite::memory:`,
    /// with or without a `jdbc:` prefix.
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        if cfg.dbms() != Dbms::SQLite {
            return Err(FluteError::ConfigError("Database type mismatch: expected SQLite".to_string()));
        }
        let url = cfg.url().ok_or_else(|| FluteError::ConfigError("The url is required".to_string()))?;
        let path = sqlite_path(url);
        if path.is_empty() {
            return Err(FluteError::ConfigError(format!("No database file in the url: {}", url)));
        }
        if path == ":memory:" {
            Ok(Self::memory())
        } else {
            Ok(Self::file(path))
        }
    }

    /// See `rusqlite::Connection::open`
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
            flags: OpenFlags::default(),
            init: None,
        }
    }

    pub fn memory() -> Self {
        Self {
            source: Source::Memory,
            flags: OpenFlags::default(),
            init: None,
        }
    }

    pub fn with_flags(self, flags: OpenFlags) -> Self {
        Self { flags, ..self }
    }

    /// Runs `init` on every new connection, e.g. to set PRAGMAs.
    pub fn with_init<F>(self, init: F) -> Self
    where
        F: Fn(&mut Connection) -> std::result::Result<(), rusqlite::Error> + Send + Sync + 'static,
    {
        let init: Option<Box<InitFn>> = Some(Box::new(init));
        Self { init, ..self }
    }

    fn is_memory(&self) -> bool {
        matches!(self.source, Source::Memory)
    }
}

impl r2d2::ManageConnection for SqliteConnectionManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> std::result::Result<Connection, Error> {
        match self.source {
            Source::File(ref path) => Connection::open_with_flags(path, self.flags),
            Source::Memory => Connection::open_in_memory_with_flags(self.flags),
        }
            .and_then(|mut c| match self.init {
                None => Ok(c),
                Some(ref init) => init(&mut c).map(|_| c),
            })
    }

    fn is_valid(&self, conn: &mut Connection) -> std::result::Result<(), Error> {
        conn.execute_batch("")
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        self.is_valid(conn).is_err()
    }
}

fn sqlite_path(url: &str) -> &str {
    let url = url.trim();
    let url = url.strip_prefix("jdbc:").unwrap_or(url);
    let url = url.strip_prefix("sqlite:").unwrap_or(url);
    url.strip_prefix("//").unwrap_or(url)
}

///
/// Create a connection pool
///
/// An in-memory database lives in its connection, so its pool holds one.
///
pub fn init_sqlite_pool(cfg: &FluteConfig) -> Result<SqlitePool> {
    let manager = SqliteConnectionManager::new(cfg)?.with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON"));
    let builder = pool_builder(cfg);
    let builder = if manager.is_memory() { builder.max_size(1).min_idle(Some(1)) } else { builder };
    let pool = builder.build(manager)
        .map_err(|e| FluteError::PoolError(format!("Failed to create SQLite connection pool: {}", e)))?;

    // Testing connections
    let conn = pool.get()?;
    conn.execute_batch("SELECT 1")
        .map_err(|e| FluteError::PoolError(format!("SQLite connection test failed: {}", e)))?;
    Ok(pool)
}

/// Data source over an `r2d2` pool of SQLite connections.
#[derive(Clone)]
pub struct SqliteDataSource {
    pool: SqlitePool,
    url: String,
}

impl SqliteDataSource {
    pub fn new(cfg: &FluteConfig) -> Result<Self> {
        let pool = init_sqlite_pool(cfg)?;
        Ok(Self { pool, url: cfg.url().cloned().unwrap_or_default() })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDataSource").field("url", &self.url).finish()
    }
}

impl DataSource for SqliteDataSource {
    fn dbms(&self) -> Dbms {
        Dbms::SQLite
    }

    fn get_connection(&self) -> Result<Box<dyn DbConnection>> {
        let conn = self.pool.get()?;
        Ok(Box::new(SqliteDbConnection { conn, url: self.url.clone() }))
    }
}

pub struct SqliteDbConnection {
    conn: SqliteConnection,
    url: String,
}

impl DbConnection for SqliteDbConnection {
    fn dbms(&self) -> Dbms {
        Dbms::SQLite
    }

    fn meta_data(&self) -> Result<Box<dyn DatabaseMetaData + '_>> {
        Ok(Box::new(SqliteMetaData::new(&self.conn, &self.url)))
    }

    fn catalog(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn prepare_statement(&self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
        let statement = self.conn.prepare(sql)?;
        Ok(Box::new(SqliteStatement::new(statement)))
    }

    fn prepare_call(&self, spec: &CallSpec) -> Result<Box<dyn CallableStatement + '_>> {
        Err(FluteError::Unsupported(format!("SQLite has no stored procedures: {}", spec.procedure_name)))
    }

    fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        if !self.conn.is_autocommit() {
            tracing::warn!("Closing a SQLite connection inside a transaction, rolling back");
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_path() {
        assert_eq!(sqlite_path("sqlite::memory:"), ":memory:");
        assert_eq!(sqlite_path("jdbc:sqlite:/tmp/x.db"), "/tmp/x.db");
        assert_eq!(sqlite_path("sqlite:///tmp/x.db"), "/tmp/x.db");
    }

    #[test]
    fn test_memory_pool_transactions() {
        let ds = SqliteDataSource::new(&FluteConfig::new("sqlite::memory:")).unwrap();
        let conn = ds.get_connection().unwrap();
        conn.begin().unwrap();
        let mut statement = conn.prepare_statement("CREATE TABLE MEMBER (MEMBER_ID INTEGER PRIMARY KEY)").unwrap();
        statement.execute_update().unwrap();
        statement.close().unwrap();
        conn.rollback().unwrap();
        let tables = conn.meta_data().unwrap().get_tables(None, None, None, &[]).unwrap();
        assert!(tables.is_empty());
        conn.close().unwrap();
    }
}
