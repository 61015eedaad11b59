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

//! In-memory driver used by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use flute_core::{FluteValue, JdbcType, Rows};
use crate::driver::{
    CallResult, CallSpec, CallableStatement, ColumnRecord, DataSource, DatabaseMetaData, DbConnection, Dbms,
    ImportedKeyRecord, IndexRecord, PreparedStatement, PrimaryKeyRecord, ProcedureColumnRecord, ProcedureRecord,
    ResultQueue, TableRecord,
};
use crate::errors::{FluteError, Result, SqlError};

fn same_owner(expected: Option<&str>, actual: Option<&String>) -> bool {
    match (expected, actual) {
        (Some(e), Some(a)) => e.eq_ignore_ascii_case(a),
        _ => true,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeMetaData {
    pub product_name: String,
    pub tables: Vec<TableRecord>,
    pub columns: Vec<ColumnRecord>,
    pub primary_keys: Vec<PrimaryKeyRecord>,
    pub indexes: Vec<IndexRecord>,
    pub imported_keys: Vec<ImportedKeyRecord>,
    pub procedures: Vec<ProcedureRecord>,
    pub procedure_columns: Vec<ProcedureColumnRecord>,
    /// Table names must match exactly, as on case sensitive drivers.
    pub case_sensitive: bool,
    /// Lookups of these names fail like a driver error.
    pub failing_names: Vec<String>,
    pub calls: Rc<RefCell<Vec<String>>>,
}

impl FakeMetaData {
    pub fn new(product_name: &str) -> Self {
        Self { product_name: product_name.to_string(), ..Default::default() }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn lookup(&self, call: &str, name: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("{}:{}", call, name));
        if self.failing_names.iter().any(|f| f == name) {
            return Err(FluteError::Sql(SqlError::new(format!("fake failure on {}", name))));
        }
        Ok(())
    }

    fn matches(&self, expected: &str, actual: &str) -> bool {
        if self.case_sensitive {
            expected == actual
        } else {
            expected.eq_ignore_ascii_case(actual)
        }
    }
}

impl DatabaseMetaData for FakeMetaData {
    fn database_product_name(&self) -> Result<String> {
        Ok(self.product_name.clone())
    }

    fn database_product_version(&self) -> Result<String> {
        Ok("1.0".to_string())
    }

    fn driver_name(&self) -> Result<String> {
        Ok("fake".to_string())
    }

    fn url(&self) -> Result<String> {
        Ok("fake://localhost/exampledb".to_string())
    }

    fn user_name(&self) -> Result<String> {
        Err(FluteError::sql("user is not available"))
    }

    fn get_tables(&self, _catalog: Option<&str>, schema: Option<&str>, table_pattern: Option<&str>, types: &[String]) -> Result<Vec<TableRecord>> {
        self.lookup("get_tables", table_pattern.unwrap_or("%"))?;
        Ok(self.tables.iter()
            .filter(|t| same_owner(schema, t.schema.as_ref()))
            .filter(|t| types.is_empty() || types.iter().any(|ty| ty.eq_ignore_ascii_case(&t.table_type)))
            .filter(|t| table_pattern.map(|p| p == "%" || self.matches(p, &t.name)).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn get_columns(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ColumnRecord>> {
        self.lookup("get_columns", table)?;
        Ok(self.columns.iter()
            .filter(|c| same_owner(schema, c.schema.as_ref()) && self.matches(table, &c.table_name))
            .cloned()
            .collect())
    }

    fn get_primary_keys(&self, _catalog: Option<&str>, _schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyRecord>> {
        self.lookup("get_primary_keys", table)?;
        Ok(self.primary_keys.iter().filter(|k| self.matches(table, &k.table_name)).cloned().collect())
    }

    fn get_index_info(&self, _catalog: Option<&str>, _schema: Option<&str>, table: &str, unique_only: bool) -> Result<Vec<IndexRecord>> {
        self.lookup("get_index_info", table)?;
        Ok(self.indexes.iter()
            .filter(|i| self.matches(table, &i.table_name))
            .filter(|i| !unique_only || !i.non_unique)
            .cloned()
            .collect())
    }

    fn get_imported_keys(&self, _catalog: Option<&str>, _schema: Option<&str>, table: &str) -> Result<Vec<ImportedKeyRecord>> {
        self.lookup("get_imported_keys", table)?;
        Ok(self.imported_keys.iter().filter(|k| self.matches(table, &k.fk_table_name)).cloned().collect())
    }

    fn get_procedures(&self, _catalog: Option<&str>, schema: Option<&str>, _procedure_pattern: Option<&str>) -> Result<Vec<ProcedureRecord>> {
        self.lookup("get_procedures", schema.unwrap_or_default())?;
        Ok(self.procedures.iter().filter(|p| same_owner(schema, p.schema.as_ref())).cloned().collect())
    }

    fn get_procedure_columns(&self, catalog: Option<&str>, schema: Option<&str>, procedure: &str) -> Result<Vec<ProcedureColumnRecord>> {
        self.lookup("get_procedure_columns", procedure)?;
        let name = procedure.rsplit('.').next().unwrap_or(procedure);
        Ok(self.procedure_columns.iter()
            .filter(|c| same_owner(schema, c.schema.as_ref()))
            .filter(|c| catalog.is_none() || same_owner(catalog, c.catalog.as_ref()))
            .filter(|c| self.matches(name, &c.procedure_name))
            .cloned()
            .collect())
    }
}

/// Shared state behind fake connections and statements.
#[derive(Debug, Default)]
pub struct FakeDb {
    pub log: RefCell<Vec<String>>,
    pub rejected_null_types: RefCell<Vec<JdbcType>>,
    pub query_results: RefCell<VecDeque<Rows>>,
    pub update_error: RefCell<Option<SqlError>>,
    pub update_count: Cell<u64>,
    pub call_results: RefCell<Vec<CallResult>>,
    pub out_values: RefCell<HashMap<usize, FluteValue>>,
    pub fail_on_close: Cell<bool>,
    pub closed_statements: Cell<usize>,
    pub closed_connections: Cell<usize>,
}

impl FakeDb {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn push(&self, line: String) {
        self.log.borrow_mut().push(line);
    }

    fn set_null(&self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.push(format!("set_null:{}:{}", index, jdbc_type));
        if self.rejected_null_types.borrow().contains(&jdbc_type) {
            return Err(FluteError::Sql(SqlError::new(format!("invalid column type: {}", jdbc_type)).with_vendor_code(17004)));
        }
        Ok(())
    }

    fn close(&self, what: &str) -> Result<()> {
        match what {
            "statement" => self.closed_statements.set(self.closed_statements.get() + 1),
            _ => self.closed_connections.set(self.closed_connections.get() + 1),
        }
        if self.fail_on_close.get() {
            return Err(FluteError::sql(format!("{} close failure", what)));
        }
        Ok(())
    }
}

pub struct FakeStatement {
    db: Rc<FakeDb>,
    sql: String,
}

impl PreparedStatement for FakeStatement {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        self.db.push(format!("set_value:{}:{}", index, value));
        Ok(())
    }

    fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.db.set_null(index, jdbc_type)
    }

    fn execute_query(&mut self) -> Result<Rows> {
        self.db.push(format!("execute_query:{}", self.sql));
        Ok(self.db.query_results.borrow_mut().pop_front().unwrap_or_default())
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.db.push(format!("execute_update:{}", self.sql));
        if let Some(err) = self.db.update_error.borrow().clone() {
            return Err(FluteError::Sql(err));
        }
        Ok(self.db.update_count.get())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.db.close("statement")
    }
}

pub struct FakeCallable {
    db: Rc<FakeDb>,
    sql: String,
    results: ResultQueue,
}

impl CallableStatement for FakeCallable {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        self.db.push(format!("set_value:{}:{}", index, value));
        Ok(())
    }

    fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.db.set_null(index, jdbc_type)
    }

    fn register_out_parameter(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        self.db.push(format!("register_out:{}:{}", index, jdbc_type));
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.db.push(format!("execute:{}", self.sql));
        self.results = ResultQueue::new(self.db.call_results.borrow().clone());
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
        Ok(self.db.out_values.borrow().get(&index).cloned().unwrap_or(FluteValue::Null))
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.db.close("statement")
    }
}

pub struct FakeConnection {
    pub dbms: Dbms,
    pub meta: FakeMetaData,
    pub db: Rc<FakeDb>,
}

impl FakeConnection {
    pub fn new(dbms: Dbms, meta: FakeMetaData) -> Self {
        Self { dbms, meta, db: FakeDb::new() }
    }
}

impl DbConnection for FakeConnection {
    fn dbms(&self) -> Dbms {
        self.dbms
    }

    fn meta_data(&self) -> Result<Box<dyn DatabaseMetaData + '_>> {
        Ok(Box::new(self.meta.clone()))
    }

    fn catalog(&self) -> Result<Option<String>> {
        Ok(Some("exampledb".to_string()))
    }

    fn prepare_statement(&self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
        self.db.push(format!("prepare:{}", sql));
        Ok(Box::new(FakeStatement { db: self.db.clone(), sql: sql.to_string() }))
    }

    fn prepare_call(&self, spec: &CallSpec) -> Result<Box<dyn CallableStatement + '_>> {
        let sql = spec.escape_sql();
        self.db.push(format!("prepare_call:{}", sql));
        Ok(Box::new(FakeCallable { db: self.db.clone(), sql, results: ResultQueue::default() }))
    }

    fn begin(&self) -> Result<()> {
        self.db.push("begin".to_string());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.db.push("commit".to_string());
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.db.push("rollback".to_string());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.db.close("connection")
    }
}

pub struct FakeDataSource {
    pub dbms: Dbms,
    pub meta: FakeMetaData,
    pub db: Rc<FakeDb>,
}

impl DataSource for FakeDataSource {
    fn dbms(&self) -> Dbms {
        self.dbms
    }

    fn get_connection(&self) -> Result<Box<dyn DbConnection>> {
        self.db.push("get_connection".to_string());
        Ok(Box::new(FakeConnection { dbms: self.dbms, meta: self.meta.clone(), db: self.db.clone() }))
    }
}
