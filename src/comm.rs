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
use std::collections::HashMap;
use std::time::{Duration, Instant};
use flute_core::{FluteValue, Params, Rows};
use crate::behavior::{BehaviorCommand, CommandKind};
use crate::driver::{CallableStatement, DbConnection, PreparedStatement};
use crate::errors::{FluteError, Result};
use crate::procedure::ProcedureResult;

/// Result of one behavior command.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteResult {
    Rows(Rows),
    Count(u64),
    AffectedRows(u64),
    Batch(Vec<u64>),
    Procedure(ProcedureResult),
    None,
}

impl ExecuteResult {
    /// Rows fetched or rows affected.
    pub fn len(&self) -> u64 {
        match self {
            ExecuteResult::Rows(rows) => rows.len() as u64,
            ExecuteResult::Count(count) => *count,
            ExecuteResult::AffectedRows(af) => *af,
            ExecuteResult::Batch(counts) => counts.iter().sum(),
            ExecuteResult::Procedure(result) => result.not_param_results.len() as u64,
            ExecuteResult::None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn affected_rows(&self) -> u64 {
        match self {
            ExecuteResult::AffectedRows(af) => *af,
            ExecuteResult::Batch(counts) => counts.iter().sum(),
            _ => 0,
        }
    }

    pub fn rows(self) -> Rows {
        match self {
            ExecuteResult::Rows(rows) => rows,
            _ => Rows::new(),
        }
    }
}

/// Execution context
pub struct ExecuteContext {
    /// SQL as the command carries it
    original_sql: String,

    /// SQL with bound values embedded, for logs
    display_sql: String,

    params: Params,

    table: Option<String>,

    command_name: String,

    kind: CommandKind,

    start_time: Instant,

    /// Values passed between interceptors
    metadata: HashMap<String, FluteValue>,

    executed_interceptors: Vec<&'static str>,

    /// Set by an interceptor to skip execution and the remaining interceptors
    pub stop_propagation: bool,

    metrics: QueryMetrics,

    slow_query_threshold: Duration,
}

impl ExecuteContext {
    pub fn new(command: &BehaviorCommand, display_sql: String) -> Self {
        Self {
            original_sql: command.sql().to_string(),
            display_sql,
            params: command.params(),
            table: command.table_db_name().map(ToString::to_string),
            command_name: command.command_name(),
            kind: command.kind(),
            start_time: Instant::now(),
            metadata: HashMap::new(),
            executed_interceptors: Vec::new(),
            stop_propagation: false,
            metrics: QueryMetrics::new(),
            slow_query_threshold: Duration::from_millis(1000),
        }
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    pub fn record_interceptor(&mut self, name: &'static str) {
        self.executed_interceptors.push(name);
    }

    pub fn stop_propagation(&mut self) {
        self.stop_propagation = true;
    }

    pub fn set_metadata<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FluteValue>,
    {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata<K>(&self, key: K) -> Option<&FluteValue>
    where
        K: AsRef<str>,
    {
        self.metadata.get(key.as_ref())
    }

    /// Record the binding completion time
    pub fn record_parse_complete(&mut self) {
        self.metrics.parse_time = self.start_time.elapsed();
    }

    /// Record the execution completion time
    pub fn record_execute_complete(&mut self, rows_affected: u64) {
        let now = Instant::now();
        self.metrics.total_time = now - self.start_time;
        self.metrics.execute_time = self.metrics.total_time.saturating_sub(self.metrics.parse_time);
        self.metrics.rows_affected = rows_affected;
    }

    pub fn metrics(&self) -> &QueryMetrics {
        &self.metrics
    }

    pub fn original_sql(&self) -> &str {
        &self.original_sql
    }

    pub fn display_sql(&self) -> &str {
        &self.display_sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn start_time(&self) -> &Instant {
        &self.start_time
    }

    pub fn slow_query_threshold(&self) -> Duration {
        self.slow_query_threshold
    }

    pub fn executed_interceptors(&self) -> &[&'static str] {
        &self.executed_interceptors
    }

    pub fn record_query_metrics(&self) {
        tracing::debug!(
            "Behavior executed: {} {}ms (bind: {}ms, execute: {}ms), rows: {}",
            self.command_name,
            self.metrics.total_time.as_millis(),
            self.metrics.parse_time.as_millis(),
            self.metrics.execute_time.as_millis(),
            self.metrics.rows_affected,
        );

        if self.metrics.total_time > self.slow_query_threshold {
            tracing::warn!(
                "{} [Flute] Slow query detected: {}ms - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                self.metrics.total_time.as_millis(),
                self.display_sql
            );
        }
    }
}

/// Query metrics
#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    pub parse_time: Duration,
    pub execute_time: Duration,
    pub total_time: Duration,
    pub rows_affected: u64,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Logs a failed close. Close failures never replace the error of the work
/// the resource was used for.
pub fn close_quietly(kind: &str, result: Result<()>) {
    if let Err(err) = result {
        tracing::warn!("Failed to close the {}: {}", kind, err);
    }
}

/// Owns a driver resource and closes it when dropped, on every path.
pub struct ResourceGuard<T: ?Sized> {
    resource: Option<Box<T>>,
    kind: &'static str,
    close: fn(Box<T>) -> Result<()>,
}

pub type StatementGuard<'a> = ResourceGuard<dyn PreparedStatement + 'a>;
pub type CallGuard<'a> = ResourceGuard<dyn CallableStatement + 'a>;
pub type ConnectionGuard = ResourceGuard<dyn DbConnection>;

impl<'a> ResourceGuard<dyn PreparedStatement + 'a> {
    pub fn new(statement: Box<dyn PreparedStatement + 'a>) -> Self {
        Self { resource: Some(statement), kind: "statement", close: |s| s.close() }
    }
}

impl<'a> ResourceGuard<dyn CallableStatement + 'a> {
    pub fn new(statement: Box<dyn CallableStatement + 'a>) -> Self {
        Self { resource: Some(statement), kind: "callable statement", close: |s| s.close() }
    }
}

impl ResourceGuard<dyn DbConnection> {
    pub fn new(connection: Box<dyn DbConnection>) -> Self {
        Self { resource: Some(connection), kind: "connection", close: |c| c.close() }
    }
}

impl<T: ?Sized> ResourceGuard<T> {
    pub fn get(&mut self) -> Result<&mut T> {
        let kind = self.kind;
        self.resource.as_deref_mut().ok_or_else(|| FluteError::sql(format!("The {} is already closed", kind)))
    }

    pub fn get_ref(&self) -> Result<&T> {
        self.resource.as_deref().ok_or_else(|| FluteError::sql(format!("The {} is already closed", self.kind)))
    }

    /// Closes now, logging a failure instead of returning it.
    pub fn close(mut self) {
        self.close_resource();
    }

    fn close_resource(&mut self) {
        if let Some(resource) = self.resource.take() {
            close_quietly(self.kind, (self.close)(resource));
        }
    }
}

impl<T: ?Sized> Drop for ResourceGuard<T> {
    fn drop(&mut self) {
        self.close_resource();
    }
}

#[cfg(test)]
mod tests {
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use crate::driver::Dbms;
    use super::*;

    fn failing_work(conn: &FakeConnection) -> Result<()> {
        let mut statement = StatementGuard::new(conn.prepare_statement("select * from MEMBER")?);
        statement.get()?.execute_query()?;
        Err(FluteError::TableNotFound("MEMBER".to_string()))
    }

    #[test]
    fn test_close_failure_never_masks_the_primary_error() {
        let conn = FakeConnection::new(Dbms::H2, FakeMetaData::new("H2"));
        conn.db.fail_on_close.set(true);
        let err = failing_work(&conn).unwrap_err();
        assert!(matches!(err, FluteError::TableNotFound(_)));
        assert_eq!(conn.db.closed_statements.get(), 1);
    }

    #[test]
    fn test_connection_guard_closes_once() {
        let conn = FakeConnection::new(Dbms::H2, FakeMetaData::new("H2"));
        let db = conn.db.clone();
        let guard = ConnectionGuard::new(Box::new(conn));
        assert_eq!(guard.get_ref().unwrap().dbms(), Dbms::H2);
        guard.close();
        assert_eq!(db.closed_connections.get(), 1);
    }

    #[test]
    fn test_execute_result_counts() {
        assert_eq!(ExecuteResult::Batch(vec![1, 2, 0]).affected_rows(), 3);
        assert_eq!(ExecuteResult::Count(7).len(), 7);
        assert!(ExecuteResult::None.is_empty());
    }
}
