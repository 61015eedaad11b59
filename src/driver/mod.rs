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
//! Driver abstraction: catalog metadata, statements and calls.
//!

mod dbms;
mod call;

#[cfg(any(
    feature = "mysql-sync",
    feature = "postgres-sync",
    feature = "sqlite-sync",
    feature = "oracle-sync"
))]
pub mod blocking;

#[cfg(test)]
pub(crate) mod fake;

pub use dbms::*;
pub use call::*;

use flute_core::{FluteValue, JdbcType, Rows};
use crate::errors::Result;

/// `TABLE_INDEX_STATISTIC` rows of `get_index_info`.
pub const TABLE_INDEX_STATISTIC: i16 = 0;
pub const TABLE_INDEX_OTHER: i16 = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRecord {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    pub table_type: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRecord {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table_name: String,
    pub column_name: String,
    pub data_type: i32,
    pub type_name: String,
    pub column_size: Option<i32>,
    pub decimal_digits: Option<i32>,
    pub nullable: bool,
    pub remarks: Option<String>,
    pub column_def: Option<String>,
    pub ordinal_position: i32,
    /// `IS_AUTOINCREMENT`, absent on drivers that do not report it.
    pub auto_increment: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryKeyRecord {
    pub table_name: String,
    pub column_name: String,
    pub key_seq: i32,
    pub pk_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRecord {
    pub table_name: String,
    pub non_unique: bool,
    pub index_name: Option<String>,
    pub index_type: i16,
    pub ordinal_position: i32,
    /// Absent for statistic rows, an expression for function indexes.
    pub column_name: Option<String>,
    pub asc_or_desc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedKeyRecord {
    pub pk_table_catalog: Option<String>,
    pub pk_table_schema: Option<String>,
    pub pk_table_name: String,
    pub pk_column_name: String,
    pub fk_table_name: String,
    pub fk_column_name: String,
    pub key_seq: i32,
    pub fk_name: Option<String>,
    /// Driver-local key id; tells apart the rows of unnamed keys.
    pub key_group: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureRecord {
    /// Oracle reports the package name here.
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    pub procedure_type: i16,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureColumnRecord {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub procedure_name: String,
    pub column_name: String,
    pub column_type: i16,
    pub data_type: i32,
    pub type_name: String,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub remarks: Option<String>,
}

/// Catalog access of one connection.
///
/// Name arguments are passed as given, the callers own case handling.
pub trait DatabaseMetaData {
    fn database_product_name(&self) -> Result<String>;

    fn database_product_version(&self) -> Result<String>;

    fn driver_name(&self) -> Result<String>;

    fn url(&self) -> Result<String>;

    fn user_name(&self) -> Result<String>;

    fn stores_lower_case_identifiers(&self) -> bool {
        false
    }

    fn stores_upper_case_identifiers(&self) -> bool {
        false
    }

    fn get_tables(&self, catalog: Option<&str>, schema: Option<&str>, table_pattern: Option<&str>, types: &[String]) -> Result<Vec<TableRecord>>;

    fn get_columns(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ColumnRecord>>;

    fn get_primary_keys(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyRecord>>;

    fn get_index_info(&self, catalog: Option<&str>, schema: Option<&str>, table: &str, unique_only: bool) -> Result<Vec<IndexRecord>>;

    fn get_imported_keys(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ImportedKeyRecord>>;

    fn get_procedures(&self, catalog: Option<&str>, schema: Option<&str>, procedure_pattern: Option<&str>) -> Result<Vec<ProcedureRecord>>;

    fn get_procedure_columns(&self, catalog: Option<&str>, schema: Option<&str>, procedure: &str) -> Result<Vec<ProcedureColumnRecord>>;
}

pub trait PreparedStatement {
    /// Binds a value, `index` starts at 1.
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()>;

    /// Binds null with an explicit type; drivers may reject the type.
    fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()>;

    fn execute_query(&mut self) -> Result<Rows>;

    fn execute_update(&mut self) -> Result<u64>;

    fn close(self: Box<Self>) -> Result<()>;
}

pub trait CallableStatement {
    fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()>;

    fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()>;

    fn register_out_parameter(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()>;

    /// Runs the call. `true` when the first result is a result set.
    fn execute(&mut self) -> Result<bool>;

    /// Takes the current result set, if the current result is one.
    fn get_result_set(&mut self) -> Result<Option<Rows>>;

    /// Moves to the next result. `true` when it is a result set.
    fn get_more_results(&mut self) -> Result<bool>;

    /// Update count of the current result, `None` when there are no more results
    /// or the current one is a result set.
    fn get_update_count(&self) -> Option<u64>;

    fn get_out_value(&mut self, index: usize) -> Result<FluteValue>;

    fn close(self: Box<Self>) -> Result<()>;
}

pub trait DbConnection {
    fn dbms(&self) -> Dbms;

    fn meta_data(&self) -> Result<Box<dyn DatabaseMetaData + '_>>;

    fn catalog(&self) -> Result<Option<String>>;

    fn prepare_statement(&self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>>;

    fn prepare_call(&self, spec: &CallSpec) -> Result<Box<dyn CallableStatement + '_>>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}

pub trait DataSource {
    fn dbms(&self) -> Dbms;

    fn get_connection(&self) -> Result<Box<dyn DbConnection>>;
}

/// One result of a call, in the order the database produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    ResultSet(Rows),
    UpdateCount(u64),
}

/// Results of a call buffered at execution, walked the way a cursor
/// over `getMoreResults` is walked.
#[derive(Debug, Default)]
pub struct ResultQueue {
    results: Vec<Option<CallResult>>,
    position: usize,
}

impl ResultQueue {
    pub fn new(results: Vec<CallResult>) -> Self {
        Self { results: results.into_iter().map(Some).collect(), position: 0 }
    }

    pub fn is_result_set(&self) -> bool {
        matches!(self.results.get(self.position), Some(Some(CallResult::ResultSet(_))))
    }

    pub fn take_result_set(&mut self) -> Option<Rows> {
        match self.results.get_mut(self.position) {
            Some(slot @ Some(CallResult::ResultSet(_))) => match slot.take() {
                Some(CallResult::ResultSet(rows)) => Some(rows),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn update_count(&self) -> Option<u64> {
        match self.results.get(self.position) {
            Some(Some(CallResult::UpdateCount(count))) => Some(*count),
            _ => None,
        }
    }

    pub fn advance(&mut self) -> bool {
        if self.position < self.results.len() {
            self.position += 1;
        }
        self.is_result_set()
    }
}

#[cfg(test)]
mod tests {
    use flute_core::Row;
    use super::*;

    fn rows(n: i64) -> Rows {
        Rows::from(vec![Row::new(vec!["ID".to_string()], vec![FluteValue::Bigint(n)])])
    }

    #[test]
    fn test_result_queue_walks_like_more_results() {
        let mut queue = ResultQueue::new(vec![
            CallResult::UpdateCount(3),
            CallResult::ResultSet(rows(1)),
            CallResult::ResultSet(rows(2)),
        ]);
        assert!(!queue.is_result_set());
        assert_eq!(queue.update_count(), Some(3));
        assert!(queue.take_result_set().is_none());
        assert!(queue.advance());
        assert_eq!(queue.take_result_set(), Some(rows(1)));
        assert!(queue.take_result_set().is_none());
        assert!(queue.advance());
        assert!(queue.take_result_set().is_some());
        assert!(!queue.advance());
        assert_eq!(queue.update_count(), None);
        assert!(!queue.advance());
    }
}
