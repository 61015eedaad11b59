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
use indexmap::IndexMap;
use flute_core::{FluteValue, JdbcType, ProcedureMeta, Rows};
use crate::behavior::BindValue;
use crate::binding::{BindLocation, BindTarget, ParameterBinder};
use crate::comm::CallGuard;
use crate::driver::{CallParameter, CallSpec, CallableStatement, DbConnection};
use crate::errors::{FluteError, Result};
use crate::message::ExceptionMessageBuilder;

/// Everything a call handed back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureResult {
    /// OUT, INOUT and RETURN values by parameter name, in call order.
    pub out_values: IndexMap<String, FluteValue>,
    /// Result sets returned without a parameter, in the order produced.
    pub not_param_results: Vec<Rows>,
    pub update_counts: Vec<u64>,
}

impl ProcedureResult {
    pub fn out_value(&self, name: &str) -> Option<&FluteValue> {
        self.out_values.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v)
    }

    /// Rows of a cursor OUT parameter.
    pub fn cursor(&self, name: &str) -> Option<&Rows> {
        match self.out_value(name) {
            Some(FluteValue::Cursor(rows)) => Some(rows),
            _ => None,
        }
    }
}

/// Calls procedures: binds the inputs, registers the outputs, then
/// collects result sets and OUT values.
#[derive(Debug, Default)]
pub struct ProcedureExecutor {
    binder: ParameterBinder,
}

impl ProcedureExecutor {
    pub fn new(binder: ParameterBinder) -> Self {
        Self { binder }
    }

    pub fn execute_procedure(&mut self, conn: &dyn DbConnection, procedure: &ProcedureMeta, args: &[BindValue]) -> Result<ProcedureResult> {
        self.execute(conn, &CallSpec::from_procedure(procedure), args)
    }

    /// `args` are the values of the IN and INOUT parameters in call order.
    pub fn execute(&mut self, conn: &dyn DbConnection, spec: &CallSpec, args: &[BindValue]) -> Result<ProcedureResult> {
        execute_call(&mut self.binder, conn, spec, args)
    }
}

pub(crate) fn execute_call(binder: &mut ParameterBinder, conn: &dyn DbConnection, spec: &CallSpec, args: &[BindValue]) -> Result<ProcedureResult> {
    let input_count = spec.parameters.iter().filter(|p| p.is_input()).count();
    if input_count != args.len() {
        return Err(FluteError::IllegalCommand(ExceptionMessageBuilder::new()
            .notice("The count of arguments does not match the procedure parameters.")
            .item_element("Procedure", &spec.procedure_name)
            .item_element("Input Parameters", input_count)
            .item_element("Arguments", args.len())
            .build()));
    }
    let mut guard = CallGuard::new(conn.prepare_call(spec)?);
    let call = guard.get()?;
    let mut inputs = args.iter();
    for (index, parameter) in spec.indexed() {
        if parameter.is_output() {
            call.register_out_parameter(index, parameter.jdbc_type)?;
        }
        if !parameter.is_input() {
            continue;
        }
        if let Some(arg) = inputs.next() {
            let value = declared(arg, parameter);
            let location = BindLocation { table: None, column: Some(&parameter.name), column_meta: None };
            binder.bind(&mut BindTarget::Call(&mut *call), index, &value, &location)?;
        }
    }
    let first_is_result_set = call.execute()?;
    let (not_param_results, update_counts) = harvest_results(&mut *call, first_is_result_set)?;

    let mut out_values = IndexMap::new();
    for (index, parameter) in spec.indexed().filter(|(_, p)| p.is_output()) {
        out_values.insert(out_name(parameter), call.get_out_value(index)?);
    }
    guard.close();
    Ok(ProcedureResult { out_values, not_param_results, update_counts })
}

fn declared(arg: &BindValue, parameter: &CallParameter) -> BindValue {
    let mut value = arg.clone();
    if value.declared_type.is_none() && !matches!(parameter.jdbc_type, JdbcType::Other | JdbcType::Unknown(_)) {
        value.declared_type = Some(parameter.jdbc_type);
    }
    value
}

fn out_name(parameter: &CallParameter) -> String {
    if parameter.name.trim().is_empty() && parameter.is_return() {
        "returnValue".to_string()
    } else {
        parameter.name.clone()
    }
}

/// Walks every result of an executed call. Some products return result
/// sets ahead of the OUT cursors, so the walk goes on until the driver
/// reports neither a result set nor an update count.
pub(crate) fn harvest_results(call: &mut dyn CallableStatement, first_is_result_set: bool) -> Result<(Vec<Rows>, Vec<u64>)> {
    let mut result_sets = Vec::new();
    let mut update_counts = Vec::new();
    let mut is_result_set = first_is_result_set;
    loop {
        if is_result_set {
            match call.get_result_set()? {
                Some(rows) => result_sets.push(rows),
                None => tracing::debug!("Result set reported but not returned"),
            }
        } else {
            match call.get_update_count() {
                Some(count) => update_counts.push(count),
                None => break,
            }
        }
        is_result_set = call.get_more_results()?;
    }
    Ok((result_sets, update_counts))
}

#[cfg(test)]
mod tests {
    use flute_core::{ProcedureColumnType, Row};
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use crate::driver::{CallResult, Dbms};
    use super::*;

    fn rows(id: i64) -> Rows {
        Rows::from(vec![Row::new(vec!["MEMBER_ID".to_string()], vec![FluteValue::Bigint(id)])])
    }

    fn spec() -> CallSpec {
        CallSpec::new("SP_PURCHASE_SUMMARY")
            .parameter(CallParameter::new("V_MEMBER_ID", ProcedureColumnType::In, JdbcType::Integer))
            .parameter(CallParameter::new("V_TOTAL", ProcedureColumnType::InOut, JdbcType::Decimal))
            .parameter(CallParameter::new("V_CURSOR", ProcedureColumnType::Out, JdbcType::RefCursor))
    }

    #[test]
    fn test_binds_registers_and_harvests() {
        let conn = FakeConnection::new(Dbms::MySQL, FakeMetaData::new("MySQL"));
        *conn.db.call_results.borrow_mut() = vec![
            CallResult::ResultSet(rows(1)),
            CallResult::UpdateCount(2),
            CallResult::ResultSet(rows(3)),
        ];
        conn.db.out_values.borrow_mut().insert(2, FluteValue::Int(10));
        conn.db.out_values.borrow_mut().insert(3, FluteValue::Cursor(rows(4)));

        let args = vec![BindValue::new("7"), BindValue::new(FluteValue::Null)];
        let result = ProcedureExecutor::default().execute(&conn, &spec(), &args).unwrap();

        assert_eq!(result.not_param_results, vec![rows(1), rows(3)]);
        assert_eq!(result.update_counts, vec![2]);
        assert_eq!(result.out_value("v_total"), Some(&FluteValue::Int(10)));
        assert_eq!(result.cursor("V_CURSOR"), Some(&rows(4)));

        let log = conn.db.log();
        let expected: Vec<String> = vec![
            "prepare_call:{call SP_PURCHASE_SUMMARY(?, ?, ?)}",
            "set_value:1:7",
            "register_out:2:DECIMAL",
            "set_null:2:DECIMAL",
            "register_out:3:REF_CURSOR",
            "execute:{call SP_PURCHASE_SUMMARY(?, ?, ?)}",
        ].into_iter().map(String::from).collect();
        assert_eq!(log, expected);
        assert_eq!(conn.db.closed_statements.get(), 1);
    }

    #[test]
    fn test_argument_count_mismatch() {
        let conn = FakeConnection::new(Dbms::MySQL, FakeMetaData::new("MySQL"));
        let err = ProcedureExecutor::default().execute(&conn, &spec(), &[]).unwrap_err();
        assert!(matches!(err, FluteError::IllegalCommand(_)));
        assert!(conn.db.log().is_empty());
    }

    #[test]
    fn test_return_value_name() {
        let conn = FakeConnection::new(Dbms::PostgreSQL, FakeMetaData::new("PostgreSQL"));
        conn.db.out_values.borrow_mut().insert(1, FluteValue::Bigint(5));
        let spec = CallSpec::new("FN_COUNT_MEMBER")
            .parameter(CallParameter::new("", ProcedureColumnType::Return, JdbcType::Bigint));
        let result = ProcedureExecutor::default().execute(&conn, &spec, &[]).unwrap();
        assert_eq!(result.out_value("returnValue"), Some(&FluteValue::Bigint(5)));
    }
}
