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

use flute_core::{FluteValue, JdbcType, Params};
use crate::driver::CallSpec;
use crate::errors::{FluteError, Result};

/// What a behavior command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SelectList,
    SelectCount,
    SelectCursor,
    Insert,
    Update,
    Delete,
    BatchUpdate,
    OutsideSqlSelect,
    OutsideSqlExecute,
    Procedure,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::SelectList => "selectList",
            CommandKind::SelectCount => "selectCount",
            CommandKind::SelectCursor => "selectCursor",
            CommandKind::Insert => "insert",
            CommandKind::Update => "update",
            CommandKind::Delete => "delete",
            CommandKind::BatchUpdate => "batchUpdate",
            CommandKind::OutsideSqlSelect => "outsideSqlSelect",
            CommandKind::OutsideSqlExecute => "outsideSqlExecute",
            CommandKind::Procedure => "procedure",
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, CommandKind::SelectList | CommandKind::SelectCount
            | CommandKind::SelectCursor | CommandKind::OutsideSqlSelect)
    }

    pub fn is_outside_sql(&self) -> bool {
        matches!(self, CommandKind::OutsideSqlSelect | CommandKind::OutsideSqlExecute)
    }

    /// Entity commands write rows of a known entity type.
    pub fn is_entity_update(&self) -> bool {
        matches!(self, CommandKind::Insert | CommandKind::Update | CommandKind::Delete | CommandKind::BatchUpdate)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A value to bind, with the SQL type declared by the caller when known.
#[derive(Debug, Clone, PartialEq)]
pub struct BindValue {
    pub value: FluteValue,
    pub declared_type: Option<JdbcType>,
    /// Column the value is written to, used for null type caching.
    pub column: Option<String>,
}

impl BindValue {
    pub fn new<V: Into<FluteValue>>(value: V) -> Self {
        Self { value: value.into(), declared_type: None, column: None }
    }

    pub fn typed<V: Into<FluteValue>>(value: V, declared_type: JdbcType) -> Self {
        Self { value: value.into(), declared_type: Some(declared_type), column: None }
    }

    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }
}

/// A fully described SQL operation. It owns no database resources.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorCommand {
    kind: CommandKind,
    table_db_name: Option<String>,
    sql: String,
    bind_values: Vec<BindValue>,
    batch: Vec<Vec<BindValue>>,
    entity_type: Option<String>,
    outside_sql_path: Option<String>,
    call_spec: Option<CallSpec>,
}

impl BehaviorCommand {
    pub fn builder(kind: CommandKind) -> BehaviorCommandBuilder {
        BehaviorCommandBuilder::new(kind)
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn table_db_name(&self) -> Option<&str> {
        self.table_db_name.as_deref()
    }

    /// The SQL text, the call escape for procedures.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bind_values(&self) -> &[BindValue] {
        &self.bind_values
    }

    pub fn batch(&self) -> &[Vec<BindValue>] {
        &self.batch
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn outside_sql_path(&self) -> Option<&str> {
        self.outside_sql_path.as_deref()
    }

    pub fn call_spec(&self) -> Option<&CallSpec> {
        self.call_spec.as_ref()
    }

    /// Bound values as positional parameters, the first batch row for batches.
    pub fn params(&self) -> Params {
        let values = match self.kind {
            CommandKind::BatchUpdate => self.batch.first().cloned().unwrap_or_default(),
            _ => self.bind_values.clone(),
        };
        if values.is_empty() {
            Params::None
        } else {
            Params::Positional(values.into_iter().map(|b| b.value).collect())
        }
    }

    /// Short name for logs, e.g. `MEMBER.selectList`.
    pub fn command_name(&self) -> String {
        match (&self.table_db_name, &self.outside_sql_path) {
            (_, Some(path)) if self.kind.is_outside_sql() => format!("{}:{}", path, self.kind),
            (Some(table), _) => format!("{}.{}", table, self.kind),
            (None, _) => match &self.call_spec {
                Some(spec) => format!("{}.{}", spec.procedure_name, self.kind),
                None => self.kind.to_string(),
            },
        }
    }
}

pub struct BehaviorCommandBuilder {
    kind: CommandKind,
    table_db_name: Option<String>,
    sql: Option<String>,
    bind_values: Vec<BindValue>,
    batch: Vec<Vec<BindValue>>,
    entity_type: Option<String>,
    outside_sql_path: Option<String>,
    call_spec: Option<CallSpec>,
}

impl BehaviorCommandBuilder {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            table_db_name: None,
            sql: None,
            bind_values: Vec::new(),
            batch: Vec::new(),
            entity_type: None,
            outside_sql_path: None,
            call_spec: None,
        }
    }

    pub fn table_db_name(mut self, table: &str) -> Self {
        self.table_db_name = Some(table.to_string());
        self
    }

    pub fn sql<S: Into<String>>(mut self, sql: S) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn bind<V: Into<FluteValue>>(mut self, value: V) -> Self {
        self.bind_values.push(BindValue::new(value));
        self
    }

    pub fn bind_value(mut self, value: BindValue) -> Self {
        self.bind_values.push(value);
        self
    }

    pub fn bind_values(mut self, values: Vec<BindValue>) -> Self {
        self.bind_values = values;
        self
    }

    pub fn batch_row(mut self, values: Vec<BindValue>) -> Self {
        self.batch.push(values);
        self
    }

    pub fn entity_type(mut self, entity_type: &str) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self
    }

    pub fn outside_sql_path(mut self, path: &str) -> Self {
        self.outside_sql_path = Some(path.to_string());
        self
    }

    pub fn call_spec(mut self, spec: CallSpec) -> Self {
        self.call_spec = Some(spec);
        self
    }

    pub fn build(self) -> Result<BehaviorCommand> {
        let kind = self.kind;
        let missing = |what: &str| FluteError::IllegalCommand(format!("{} is required for {}", what, kind));
        let sql = match (kind, self.sql, &self.call_spec) {
            (CommandKind::Procedure, _, None) => return Err(missing("call spec")),
            (CommandKind::Procedure, _, Some(spec)) => spec.escape_sql(),
            (_, Some(sql), _) if !sql.trim().is_empty() => sql,
            _ => return Err(missing("sql")),
        };
        if kind.is_outside_sql() {
            if self.outside_sql_path.as_deref().map(|p| p.trim().is_empty()).unwrap_or(true) {
                return Err(missing("outside-sql path"));
            }
        } else if kind != CommandKind::Procedure && self.table_db_name.is_none() {
            return Err(missing("table DB name"));
        }
        if kind.is_entity_update() && self.entity_type.is_none() {
            return Err(missing("entity type"));
        }
        if kind == CommandKind::BatchUpdate && self.batch.is_empty() {
            return Err(missing("batch rows"));
        }
        Ok(BehaviorCommand {
            kind,
            table_db_name: self.table_db_name,
            sql,
            bind_values: self.bind_values,
            batch: self.batch,
            entity_type: self.entity_type,
            outside_sql_path: self.outside_sql_path,
            call_spec: self.call_spec,
        })
    }
}

#[cfg(test)]
mod tests {
    use flute_core::ProcedureColumnType;
    use crate::driver::CallParameter;
    use super::*;

    #[test]
    fn test_build_select() {
        let command = BehaviorCommand::builder(CommandKind::SelectList)
            .table_db_name("MEMBER")
            .sql("select * from MEMBER where MEMBER_ID = ?")
            .bind(3)
            .build()
            .unwrap();
        assert_eq!(command.command_name(), "MEMBER.selectList");
        assert_eq!(command.params().len(), 1);
    }

    #[test]
    fn test_incomplete_commands_are_rejected() {
        let err = BehaviorCommand::builder(CommandKind::SelectList).sql("select 1").build().unwrap_err();
        assert!(matches!(err, FluteError::IllegalCommand(ref m) if m.contains("table DB name")));

        let err = BehaviorCommand::builder(CommandKind::Insert)
            .table_db_name("MEMBER")
            .sql("insert into MEMBER values (?)")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("entity type"));

        let err = BehaviorCommand::builder(CommandKind::OutsideSqlSelect).sql("select 1").build().unwrap_err();
        assert!(err.to_string().contains("outside-sql path"));

        let err = BehaviorCommand::builder(CommandKind::BatchUpdate)
            .table_db_name("MEMBER")
            .entity_type("Member")
            .sql("update MEMBER set x = ?")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("batch rows"));

        assert!(BehaviorCommand::builder(CommandKind::Procedure).build().is_err());
        assert!(BehaviorCommand::builder(CommandKind::Delete).table_db_name("MEMBER").entity_type("Member").sql("  ").build().is_err());
    }

    #[test]
    fn test_procedure_command_uses_call_escape() {
        let spec = CallSpec::new("SP_MEMBER").parameter(CallParameter::new("V_ID", ProcedureColumnType::In, JdbcType::Integer));
        let command = BehaviorCommand::builder(CommandKind::Procedure).call_spec(spec).bind(1).build().unwrap();
        assert_eq!(command.sql(), "{call SP_MEMBER(?)}");
        assert_eq!(command.command_name(), "SP_MEMBER.procedure");
    }
}
