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
use flute_core::{ColumnMeta, JdbcType};
use crate::binding::{BindLocation, BindTarget};
use crate::binding::value_type::ValueTypes;
use crate::errors::{FluteError, Result};
use crate::message::ExceptionMessageBuilder;

/// Null types tried in order when nothing is known about the column.
pub const NULL_TYPE_CANDIDATES: [JdbcType; 4] = [JdbcType::Varchar, JdbcType::Numeric, JdbcType::Timestamp, JdbcType::Other];

/// Binds nulls whose SQL type is unknown by trying type codes until the
/// driver accepts one. The accepted code is remembered per column.
///
/// One binder belongs to one writer and is not shared between threads.
#[derive(Debug, Default)]
pub struct NullBinder {
    cache: HashMap<(String, String), JdbcType>,
}

impl NullBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_type(&self, table: &str, column: &str) -> Option<JdbcType> {
        self.cache.get(&cache_key(table, column)).copied()
    }

    pub fn bind_null(&mut self, target: &mut BindTarget, index: usize, location: &BindLocation, value_types: &ValueTypes) -> Result<()> {
        let key = match (location.table, location.column) {
            (Some(table), Some(column)) => Some(cache_key(table, column)),
            _ => None,
        };
        if let Some(cached) = key.as_ref().and_then(|k| self.cache.get(k)).copied() {
            return target.set_null(index, cached)
                .map_err(|err| binding_failure(location, &[cached], &err));
        }

        let candidates = match location.column_meta {
            Some(column) => column_candidates(column, value_types),
            None => NULL_TYPE_CANDIDATES.to_vec(),
        };
        let mut last_error = None;
        for candidate in candidates.iter().copied() {
            match target.set_null(index, candidate) {
                Ok(()) => {
                    if let Some(key) = key {
                        tracing::debug!("Null type of {}.{} resolved: {}", key.0, key.1, candidate);
                        self.cache.insert(key, candidate);
                    }
                    return Ok(());
                }
                Err(err) => {
                    tracing::trace!("Null type {} rejected at {}: {}", candidate, index, err);
                    last_error = Some(err);
                }
            }
        }
        match last_error {
            Some(err) => Err(binding_failure(location, &candidates, &err)),
            None => Err(FluteError::BindingFailure("No null type to try".to_string())),
        }
    }
}

fn cache_key(table: &str, column: &str) -> (String, String) {
    (table.to_lowercase(), column.to_lowercase())
}

/// The type its value type maps the column to, then the column's own type.
fn column_candidates(column: &ColumnMeta, value_types: &ValueTypes) -> Vec<JdbcType> {
    let plain = column.jdbc_type;
    let mapped = value_types.find(plain).map(|t| t.sql_type()).unwrap_or(plain);
    if mapped == plain {
        vec![plain]
    } else {
        vec![mapped, plain]
    }
}

fn binding_failure(location: &BindLocation, tried: &[JdbcType], err: &FluteError) -> FluteError {
    let tried: Vec<String> = tried.iter().map(|t| t.name()).collect();
    FluteError::BindingFailure(ExceptionMessageBuilder::new()
        .notice("Failed to bind null to the parameter.")
        .advice("The driver rejected every null type that was tried.")
        .advice("Declare the SQL type of the parameter explicitly.")
        .item_element("Table", location.table.unwrap_or("(unknown)"))
        .item_element("Column", location.column.unwrap_or("(unknown)"))
        .item_element("Value", "null")
        .item_element("Bind Type", tried.join(", "))
        .item_element("SQLException", err)
        .build())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use crate::driver::{Dbms, DbConnection};
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use super::*;

    fn location<'a>(column_meta: Option<&'a ColumnMeta>) -> BindLocation<'a> {
        BindLocation { table: Some("MEMBER"), column: Some("BIRTHDATE"), column_meta }
    }

    #[test]
    fn test_candidates_until_accepted_then_cached() {
        let conn = FakeConnection::new(Dbms::Oracle, FakeMetaData::new("Oracle"));
        conn.db.rejected_null_types.borrow_mut().extend([JdbcType::Varchar, JdbcType::Numeric]);
        let value_types = ValueTypes::new();
        let mut binder = NullBinder::new();
        let mut statement = conn.prepare_statement("insert into MEMBER values (?)").unwrap();

        binder.bind_null(&mut BindTarget::Statement(statement.as_mut()), 1, &location(None), &value_types).unwrap();
        assert_eq!(binder.cached_type("member", "birthdate"), Some(JdbcType::Timestamp));
        binder.bind_null(&mut BindTarget::Statement(statement.as_mut()), 1, &location(None), &value_types).unwrap();

        let log: Vec<String> = conn.db.log().into_iter().filter(|l| l.starts_with("set_null")).collect();
        assert_eq!(log, vec![
            "set_null:1:VARCHAR",
            "set_null:1:NUMERIC",
            "set_null:1:TIMESTAMP",
            "set_null:1:TIMESTAMP",
        ]);
    }

    #[test]
    fn test_column_meta_tries_mapped_then_plain() {
        let conn = FakeConnection::new(Dbms::Oracle, FakeMetaData::new("Oracle"));
        conn.db.rejected_null_types.borrow_mut().push(JdbcType::Integer);
        let mut statement = conn.prepare_statement("insert into MEMBER values (?)").unwrap();
        let column = ColumnMeta::new("RANK", JdbcType::Tinyint, "TINYINT");
        NullBinder::new()
            .bind_null(&mut BindTarget::Statement(statement.as_mut()), 2, &location(Some(&column)), &ValueTypes::new())
            .unwrap();
        let log: Vec<String> = conn.db.log().into_iter().filter(|l| l.starts_with("set_null")).collect();
        assert_eq!(log, vec!["set_null:2:INTEGER", "set_null:2:TINYINT"]);
    }

    #[test]
    fn test_all_rejected_is_binding_failure() {
        let conn = FakeConnection::new(Dbms::Oracle, FakeMetaData::new("Oracle"));
        conn.db.rejected_null_types.borrow_mut().extend(NULL_TYPE_CANDIDATES);
        let db = Rc::clone(&conn.db);
        let mut statement = conn.prepare_statement("insert into MEMBER values (?)").unwrap();
        let mut binder = NullBinder::new();
        let err = binder
            .bind_null(&mut BindTarget::Statement(statement.as_mut()), 1, &location(None), &ValueTypes::new())
            .unwrap_err();
        match err {
            FluteError::BindingFailure(message) => {
                assert!(message.contains("MEMBER"));
                assert!(message.contains("VARCHAR, NUMERIC, TIMESTAMP, OTHER"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(binder.cached_type("MEMBER", "BIRTHDATE"), None);
        assert_eq!(db.log().iter().filter(|l| l.starts_with("set_null")).count(), 4);
    }
}
