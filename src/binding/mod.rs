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
//! Parameter binding: value types per (declared type, runtime value) and
//! null type probing.

mod null;
mod value_type;

pub use null::*;
pub use value_type::*;
pub(crate) use value_type::{parse_boolean, parse_date, parse_time, parse_timestamp};

use flute_core::{ColumnMeta, FluteValue, JdbcType};
use crate::behavior::BindValue;
use crate::driver::{CallableStatement, PreparedStatement};
use crate::errors::{FluteError, Result};
use crate::message::ExceptionMessageBuilder;

/// The statement a value is bound to.
pub enum BindTarget<'s, 'c> {
    Statement(&'s mut (dyn PreparedStatement + 'c)),
    Call(&'s mut (dyn CallableStatement + 'c)),
}

impl BindTarget<'_, '_> {
    pub fn set_value(&mut self, index: usize, value: &FluteValue) -> Result<()> {
        match self {
            BindTarget::Statement(statement) => statement.set_value(index, value),
            BindTarget::Call(call) => call.set_value(index, value),
        }
    }

    pub fn set_null(&mut self, index: usize, jdbc_type: JdbcType) -> Result<()> {
        match self {
            BindTarget::Statement(statement) => statement.set_null(index, jdbc_type),
            BindTarget::Call(call) => call.set_null(index, jdbc_type),
        }
    }
}

/// Where a bound value goes, for null type caching and diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindLocation<'a> {
    pub table: Option<&'a str>,
    pub column: Option<&'a str>,
    pub column_meta: Option<&'a ColumnMeta>,
}

/// Binds values positionally through the value types, nulls of unknown
/// type through the [`NullBinder`].
#[derive(Debug, Default)]
pub struct ParameterBinder {
    value_types: ValueTypes,
    null_binder: NullBinder,
}

impl ParameterBinder {
    pub fn new(value_types: ValueTypes) -> Self {
        Self { value_types, null_binder: NullBinder::new() }
    }

    pub fn value_types(&self) -> &ValueTypes {
        &self.value_types
    }

    pub fn null_binder(&self) -> &NullBinder {
        &self.null_binder
    }

    pub fn bind(&mut self, target: &mut BindTarget, index: usize, value: &BindValue, location: &BindLocation) -> Result<()> {
        let value_type = self.value_types.resolve(value.declared_type, &value.value);
        if value.value.is_null() {
            if value_type.probes_null_type() {
                return self.null_binder.bind_null(target, index, location, &self.value_types);
            }
            return target.set_null(index, value_type.sql_type())
                .map_err(|err| bind_failure(location, &value.value, value_type.name(), &err));
        }
        let converted = value_type.convert(&value.value)
            .map_err(|err| bind_failure(location, &value.value, value_type.name(), &FluteError::from(err)))?;
        target.set_value(index, &converted)
            .map_err(|err| bind_failure(location, &value.value, value_type.name(), &err))
    }

    /// Binds every value from index 1.
    pub fn bind_all(&mut self, target: &mut BindTarget, values: &[BindValue], table: Option<&str>) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            let location = BindLocation { table, column: value.column.as_deref(), column_meta: None };
            self.bind(target, i + 1, value, &location)?;
        }
        Ok(())
    }
}

fn bind_failure(location: &BindLocation, value: &FluteValue, bind_type: &str, err: &FluteError) -> FluteError {
    if let FluteError::BindingFailure(_) = err {
        return FluteError::BindingFailure(err.to_string());
    }
    FluteError::BindingFailure(ExceptionMessageBuilder::new()
        .notice("Failed to bind the value to the parameter.")
        .advice("Make sure the value fits the type of the column.")
        .item_element("Table", location.table.unwrap_or("(unknown)"))
        .item_element("Column", location.column.unwrap_or("(unknown)"))
        .item_element("Value", value)
        .item_element("Bind Type", bind_type)
        .item_element("Cause", err)
        .build())
}

#[cfg(test)]
mod tests {
    use crate::driver::{Dbms, DbConnection};
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use super::*;

    #[test]
    fn test_bind_all_converts_and_probes_nulls() {
        let conn = FakeConnection::new(Dbms::PostgreSQL, FakeMetaData::new("PostgreSQL"));
        let mut statement = conn.prepare_statement("update MEMBER set MEMBER_NAME = ?, BIRTHDATE = ?, RANK = ?").unwrap();
        let values = vec![
            BindValue::typed("Stojkovic", JdbcType::Varchar),
            BindValue::new(FluteValue::Null).column("BIRTHDATE"),
            BindValue::typed("3", JdbcType::Integer),
        ];
        let mut binder = ParameterBinder::default();
        binder.bind_all(&mut BindTarget::Statement(statement.as_mut()), &values, Some("MEMBER")).unwrap();
        let log: Vec<String> = conn.db.log().into_iter().filter(|l| l.starts_with("set_")).collect();
        assert_eq!(log, vec!["set_value:1:'Stojkovic'", "set_null:2:VARCHAR", "set_value:3:3"]);
        assert_eq!(binder.null_binder().cached_type("MEMBER", "BIRTHDATE"), Some(JdbcType::Varchar));
    }

    #[test]
    fn test_typed_null_binds_declared_type() {
        let conn = FakeConnection::new(Dbms::PostgreSQL, FakeMetaData::new("PostgreSQL"));
        let mut statement = conn.prepare_statement("update MEMBER set BIRTHDATE = ?").unwrap();
        let mut binder = ParameterBinder::default();
        let value = BindValue::typed(FluteValue::Null, JdbcType::Date);
        binder.bind(&mut BindTarget::Statement(statement.as_mut()), 1, &value, &BindLocation::default()).unwrap();
        assert!(conn.db.log().contains(&"set_null:1:DATE".to_string()));
    }

    #[test]
    fn test_unconvertible_value_is_binding_failure() {
        let conn = FakeConnection::new(Dbms::PostgreSQL, FakeMetaData::new("PostgreSQL"));
        let mut statement = conn.prepare_statement("update MEMBER set RANK = ?").unwrap();
        let value = BindValue::typed("high", JdbcType::Integer).column("RANK");
        let location = BindLocation { table: Some("MEMBER"), column: Some("RANK"), column_meta: None };
        let err = ParameterBinder::default()
            .bind(&mut BindTarget::Statement(statement.as_mut()), 1, &value, &location)
            .unwrap_err();
        match err {
            FluteError::BindingFailure(message) => {
                assert!(message.contains("'high'"));
                assert!(message.contains("Integer"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
