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

use flute_core::{JdbcType, ProcedureColumnType, ProcedureMeta};

#[derive(Debug, Clone, PartialEq)]
pub struct CallParameter {
    pub name: String,
    pub mode: ProcedureColumnType,
    pub jdbc_type: JdbcType,
    pub db_type_name: String,
}

impl CallParameter {
    pub fn new(name: &str, mode: ProcedureColumnType, jdbc_type: JdbcType) -> Self {
        Self { name: name.to_string(), mode, jdbc_type, db_type_name: jdbc_type.name() }
    }

    pub fn with_db_type_name(mut self, db_type_name: &str) -> Self {
        self.db_type_name = db_type_name.to_string();
        self
    }

    pub fn is_input(&self) -> bool {
        matches!(self.mode, ProcedureColumnType::In | ProcedureColumnType::InOut)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.mode, ProcedureColumnType::Out | ProcedureColumnType::InOut | ProcedureColumnType::Return)
    }

    pub fn is_return(&self) -> bool {
        self.mode == ProcedureColumnType::Return
    }

    pub fn is_cursor(&self) -> bool {
        let type_name = self.db_type_name.to_lowercase();
        self.jdbc_type == JdbcType::RefCursor || type_name.contains("refcursor") || type_name.contains("ref cursor")
    }
}

/// Shape of a procedure call. Parameter indexes are 1-based and the
/// return parameter, when present, takes index 1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallSpec {
    pub procedure_name: String,
    pub parameters: Vec<CallParameter>,
}

impl CallSpec {
    pub fn new(procedure_name: &str) -> Self {
        Self { procedure_name: procedure_name.to_string(), parameters: Vec::new() }
    }

    pub fn parameter(mut self, parameter: CallParameter) -> Self {
        if parameter.is_return() {
            self.parameters.insert(0, parameter);
        } else {
            self.parameters.push(parameter);
        }
        self
    }

    /// Parameters of the procedure metadata, without result-set columns.
    pub fn from_procedure(procedure: &ProcedureMeta) -> Self {
        let mut spec = CallSpec::new(&procedure.procedure_sql_name());
        for column in procedure.columns.iter() {
            if column.column_type == ProcedureColumnType::Result || column.is_void_return() {
                continue;
            }
            let parameter = CallParameter::new(&column.name, column.column_type, column.jdbc_type)
                .with_db_type_name(&column.db_type_name);
            spec = spec.parameter(parameter);
        }
        spec
    }

    pub fn has_return(&self) -> bool {
        self.parameters.first().map(|p| p.is_return()).unwrap_or(false)
    }

    /// `(index, parameter)` pairs in binding order.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &CallParameter)> {
        self.parameters.iter().enumerate().map(|(i, p)| (i + 1, p))
    }

    /// Arguments of the call itself, the return parameter excluded.
    pub fn arguments(&self) -> impl Iterator<Item = (usize, &CallParameter)> {
        self.indexed().filter(|(_, p)| !p.is_return())
    }

    /// The call escape, e.g. `{? = call SP_FOO(?, ?)}`.
    pub fn escape_sql(&self) -> String {
        let marks = vec!["?"; self.arguments().count()].join(", ");
        if self.has_return() {
            format!("{{? = call {}({})}}", self.procedure_name, marks)
        } else {
            format!("{{call {}({})}}", self.procedure_name, marks)
        }
    }
}
