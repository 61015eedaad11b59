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
use flute_core::{FluteDataError, FluteValue, Rows, TableMeta};
use crate::behavior::{BehaviorCommand, BindValue, CommandKind};
use crate::binding::{BindLocation, BindTarget, ParameterBinder};
use crate::comm::{ExecuteResult, StatementGuard};
use crate::driver::{DbConnection, PreparedStatement};
use crate::errors::{FluteError, Result};
use crate::procedure::execute_call;

/// Runs one behavior command on a connection: prepares, binds, executes and
/// closes the statement.
#[derive(Debug, Default)]
pub struct StatementExecutor {
    binder: ParameterBinder,
}

impl StatementExecutor {
    pub fn new(binder: ParameterBinder) -> Self {
        Self { binder }
    }

    pub fn binder(&self) -> &ParameterBinder {
        &self.binder
    }

    /// `table` supplies column metadata for the null type probing of the
    /// command's table.
    pub fn execute(&mut self, conn: &dyn DbConnection, command: &BehaviorCommand, table: Option<&TableMeta>) -> Result<ExecuteResult> {
        if command.kind() == CommandKind::Procedure {
            let spec = command.call_spec()
                .ok_or_else(|| FluteError::IllegalCommand(format!("call spec is required for {}", command.kind())))?;
            return execute_call(&mut self.binder, conn, spec, command.bind_values()).map(ExecuteResult::Procedure);
        }

        let mut guard = StatementGuard::new(conn.prepare_statement(command.sql())?);
        let statement = guard.get()?;
        let result = match command.kind() {
            CommandKind::BatchUpdate => {
                let mut counts = Vec::with_capacity(command.batch().len());
                for row in command.batch() {
                    self.bind_values(statement, command, row, table)?;
                    counts.push(statement.execute_update()?);
                }
                ExecuteResult::Batch(counts)
            }
            CommandKind::SelectCount => {
                self.bind_values(statement, command, command.bind_values(), table)?;
                ExecuteResult::Count(count_of(&statement.execute_query()?)?)
            }
            kind if kind.is_select() => {
                self.bind_values(statement, command, command.bind_values(), table)?;
                ExecuteResult::Rows(statement.execute_query()?)
            }
            _ => {
                self.bind_values(statement, command, command.bind_values(), table)?;
                ExecuteResult::AffectedRows(statement.execute_update()?)
            }
        };
        guard.close();
        Ok(result)
    }

    fn bind_values(&mut self, statement: &mut dyn PreparedStatement, command: &BehaviorCommand,
                   values: &[BindValue], table: Option<&TableMeta>) -> Result<()> {
        let mut target = BindTarget::Statement(statement);
        for (i, value) in values.iter().enumerate() {
            let column = value.column.as_deref();
            let location = BindLocation {
                table: command.table_db_name(),
                column,
                column_meta: column.and_then(|c| table.and_then(|t| t.column(c))),
            };
            self.binder.bind(&mut target, i + 1, value, &location)?;
        }
        Ok(())
    }
}

/// The first column of the first row as a count.
fn count_of(rows: &Rows) -> Result<u64> {
    let value = rows.first().and_then(|row| row.get_value(0)).unwrap_or(&FluteValue::Null);
    match value {
        FluteValue::Text(text) => text.trim().parse::<u64>()
            .map_err(|_| FluteDataError::type_mismatch_error("count", value.type_name()).into()),
        other => other.as_i64()
            .and_then(|count| u64::try_from(count).ok())
            .ok_or_else(|| FluteDataError::type_mismatch_error("count", other.type_name()).into()),
    }
}

#[cfg(test)]
mod tests {
    use flute_core::{ColumnMeta, JdbcType, Row, TableType, UnifiedSchema};
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use crate::driver::Dbms;
    use super::*;

    fn count_rows(value: FluteValue) -> Rows {
        Rows::from(vec![Row::new(vec!["COUNT(*)".to_string()], vec![value])])
    }

    #[test]
    fn test_select_count() {
        let conn = FakeConnection::new(Dbms::MySQL, FakeMetaData::new("MySQL"));
        conn.db.query_results.borrow_mut().push_back(count_rows(FluteValue::Bigint(12)));
        let command = BehaviorCommand::builder(CommandKind::SelectCount)
            .table_db_name("MEMBER")
            .sql("select count(*) from MEMBER where MEMBER_STATUS_CODE = ?")
            .bind("FML")
            .build()
            .unwrap();
        let result = StatementExecutor::default().execute(&conn, &command, None).unwrap();
        assert_eq!(result, ExecuteResult::Count(12));
        assert_eq!(conn.db.log(), vec![
            "prepare:select count(*) from MEMBER where MEMBER_STATUS_CODE = ?".to_string(),
            "set_value:1:'FML'".to_string(),
            "execute_query:select count(*) from MEMBER where MEMBER_STATUS_CODE = ?".to_string(),
        ]);
        assert_eq!(conn.db.closed_statements.get(), 1);
    }

    #[test]
    fn test_batch_update_uses_column_meta_for_nulls() {
        let conn = FakeConnection::new(Dbms::PostgreSQL, FakeMetaData::new("PostgreSQL"));
        conn.db.update_count.set(1);
        let mut member = TableMeta::new(UnifiedSchema::main(None, Some("public")), "MEMBER", TableType::Table);
        member.columns.push(ColumnMeta::new("BIRTHDATE", JdbcType::Date, "date"));
        let command = BehaviorCommand::builder(CommandKind::BatchUpdate)
            .table_db_name("MEMBER")
            .entity_type("Member")
            .sql("update MEMBER set BIRTHDATE = ? where MEMBER_ID = ?")
            .batch_row(vec![BindValue::new(FluteValue::Null).column("BIRTHDATE"), BindValue::new(1)])
            .batch_row(vec![BindValue::new(FluteValue::Null).column("BIRTHDATE"), BindValue::new(2)])
            .build()
            .unwrap();
        let result = StatementExecutor::default().execute(&conn, &command, Some(&member)).unwrap();
        assert_eq!(result, ExecuteResult::Batch(vec![1, 1]));
        let nulls: Vec<String> = conn.db.log().into_iter().filter(|l| l.starts_with("set_null")).collect();
        assert_eq!(nulls, vec!["set_null:1:DATE".to_string(), "set_null:1:DATE".to_string()]);
    }

    #[test]
    fn test_failed_update_still_closes() {
        let conn = FakeConnection::new(Dbms::MySQL, FakeMetaData::new("MySQL"));
        *conn.db.update_error.borrow_mut() = Some(crate::errors::SqlError::new("Duplicate entry").with_vendor_code(1062));
        let command = BehaviorCommand::builder(CommandKind::Insert)
            .table_db_name("MEMBER")
            .entity_type("Member")
            .sql("insert into MEMBER (MEMBER_ID) values (?)")
            .bind(1)
            .build()
            .unwrap();
        let err = StatementExecutor::default().execute(&conn, &command, None).unwrap_err();
        assert!(matches!(err, FluteError::Sql(_)));
        assert_eq!(conn.db.closed_statements.get(), 1);
    }

    #[test]
    fn test_count_of_text() {
        assert_eq!(count_of(&count_rows(FluteValue::Text(" 3 ".to_string()))).unwrap(), 3);
        assert!(count_of(&Rows::new()).is_err());
    }
}
