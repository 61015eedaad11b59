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
use std::collections::HashSet;
use indexmap::IndexMap;
use flute_core::{ColumnMeta, FluteValue, JdbcType, ProcedureColumnMeta, ProcedureColumnType, ProcedureMeta,
    ProcedureNotParamResult, ProcedureType, Rows, UnifiedSchema};
use crate::behavior::BindValue;
use crate::comm::close_quietly;
use crate::config::SchemaFilter;
use crate::driver::{CallSpec, DatabaseMetaData, DbConnection, Dbms, ProcedureColumnRecord, ProcedureRecord};
use crate::errors::Result;
use crate::meta::oracle_type::OracleTypeMap;
use crate::procedure::ProcedureExecutor;

pub struct ProcedureExtractor<'a> {
    dbms: Dbms,
    filter: &'a dyn SchemaFilter,
    type_map: OracleTypeMap,
}

impl<'a> ProcedureExtractor<'a> {
    pub fn new(dbms: Dbms, filter: &'a dyn SchemaFilter) -> Self {
        Self { dbms, filter, type_map: OracleTypeMap::default() }
    }

    /// Oracle collection and object types that parameters may refer to.
    pub fn with_type_map(mut self, type_map: OracleTypeMap) -> Self {
        self.type_map = type_map;
        self
    }

    /// Procedures of every schema by procedure key. A main schema procedure
    /// replaces a same-key one of another schema; otherwise the first wins.
    pub fn get_available_procedure_map(&self, meta: &dyn DatabaseMetaData, schemas: &[UnifiedSchema]) -> Result<IndexMap<String, ProcedureMeta>> {
        let mut procedures: IndexMap<String, ProcedureMeta> = IndexMap::new();
        for schema in schemas {
            for procedure in self.get_procedure_list(meta, schema)? {
                let key = procedure.procedure_key();
                match procedures.get(&key) {
                    Some(existing) if existing.schema.is_main_schema() || !procedure.schema.is_main_schema() => {
                        tracing::debug!("Skip same-name procedure: {} (kept {})",
                            procedure.procedure_full_qualified_name(), existing.procedure_full_qualified_name());
                    }
                    _ => {
                        procedures.insert(key, procedure);
                    }
                }
            }
        }
        Ok(procedures)
    }

    pub fn get_procedure_list(&self, meta: &dyn DatabaseMetaData, schema: &UnifiedSchema) -> Result<Vec<ProcedureMeta>> {
        // Oracle reports packages in the catalog field
        let catalog = if self.dbms == Dbms::Oracle { None } else { schema.pure_catalog() };
        let records = meta.get_procedures(catalog, schema.pure_schema(), None)?;
        let mut seen = HashSet::new();
        let mut procedures = Vec::new();
        for record in records {
            let procedure = match self.to_procedure_meta(schema, &record) {
                Some(procedure) => procedure,
                None => continue,
            };
            if !seen.insert(procedure.procedure_key()) {
                tracing::debug!("Skip overloaded procedure: {}", procedure.procedure_full_qualified_name());
                continue;
            }
            let mut procedure = procedure;
            let records = self.get_procedure_columns(meta, &procedure)?;
            procedure.columns = self.to_column_list(&procedure, records);
            if self.dbms == Dbms::PostgreSQL {
                adjust_postgres_columns(&mut procedure);
            }
            procedures.push(procedure);
        }
        Ok(procedures)
    }

    fn to_procedure_meta(&self, schema: &UnifiedSchema, record: &ProcedureRecord) -> Option<ProcedureMeta> {
        let name = record.name.trim();
        if name.is_empty() {
            return None;
        }
        let package = match self.dbms {
            Dbms::Oracle => record.catalog.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(String::from),
            _ => None,
        };
        if self.dbms.is_system_procedure(record.schema.as_deref(), package.as_deref(), name) {
            tracing::trace!("Skip system procedure: {}", name);
            return None;
        }
        let procedure = ProcedureMeta {
            schema: schema.clone(),
            package,
            name: name.to_string(),
            procedure_type: ProcedureType::from_code(record.procedure_type),
            comment: record.remarks.clone().filter(|r| !r.trim().is_empty()),
            ..Default::default()
        };
        if self.filter.is_procedure_except(schema, &procedure.procedure_name_with_package()) {
            tracing::debug!("Except procedure: {}", procedure.procedure_name_with_package());
            return None;
        }
        Some(procedure)
    }

    fn get_procedure_columns(&self, meta: &dyn DatabaseMetaData, procedure: &ProcedureMeta) -> Result<Vec<ProcedureColumnRecord>> {
        let schema = &procedure.schema;
        match self.dbms {
            // an empty catalog means no package
            Dbms::Oracle => meta.get_procedure_columns(
                Some(procedure.package.as_deref().unwrap_or_default()), schema.pure_schema(), &procedure.name),
            // the qualified name reaches procedures of other catalogs
            Dbms::MySQL if !schema.is_main_schema() => meta.get_procedure_columns(
                schema.pure_catalog(), schema.pure_schema(), &schema.qualify(&procedure.name)),
            _ => meta.get_procedure_columns(schema.pure_catalog(), schema.pure_schema(), &procedure.name),
        }
    }

    fn to_column_list(&self, procedure: &ProcedureMeta, records: Vec<ProcedureColumnRecord>) -> Vec<ProcedureColumnMeta> {
        let mut names = HashSet::new();
        let mut columns = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let column_type = ProcedureColumnType::from_code(record.column_type);
            let name = match record.column_name.trim() {
                "" if column_type == ProcedureColumnType::Return => "returnValue".to_string(),
                "" => format!("arg{}", i + 1),
                name => name.to_string(),
            };
            if !names.insert(name.to_lowercase()) {
                tracing::debug!("Skip duplicate parameter: {}.{}", procedure.name, name);
                continue;
            }
            let mut column = ProcedureColumnMeta {
                name,
                column_type,
                jdbc_type: JdbcType::from_code(record.data_type),
                db_type_name: record.type_name.trim().to_string(),
                column_size: record.precision,
                decimal_digits: record.scale,
                comment: record.remarks.filter(|r| !r.trim().is_empty()),
                ..Default::default()
            };
            self.normalize(&procedure.schema, &mut column);
            columns.push(column);
        }
        columns
    }

    fn normalize(&self, schema: &UnifiedSchema, column: &mut ProcedureColumnMeta) {
        let type_name = column.db_type_name.to_lowercase();
        match self.dbms {
            Dbms::PostgreSQL if type_name == "refcursor" => column.jdbc_type = JdbcType::RefCursor,
            Dbms::Oracle => {
                if type_name == "ref cursor" {
                    column.jdbc_type = JdbcType::RefCursor;
                } else if type_name == "date" {
                    column.jdbc_type = JdbcType::Timestamp;
                } else if let Some(array) = self.type_map.find_array(schema, &column.db_type_name) {
                    column.jdbc_type = JdbcType::Array;
                    column.type_array = Some(array.clone());
                } else if let Some(type_struct) = self.type_map.find_struct(schema, &column.db_type_name) {
                    column.jdbc_type = JdbcType::Struct;
                    column.type_struct = Some(type_struct.clone());
                }
            }
            _ => {}
        }
    }
}

/// Drops `void` returns, and the RETURN cursor of a function that also
/// declares an OUT cursor, since the driver reports the one cursor twice.
/// Other combinations of cursors are left as reported.
fn adjust_postgres_columns(procedure: &mut ProcedureMeta) {
    procedure.columns.retain(|c| !c.is_void_return());
    let return_cursors = procedure.columns.iter()
        .filter(|c| c.column_type == ProcedureColumnType::Return && c.is_cursor())
        .count();
    let out_cursors = procedure.columns.iter()
        .filter(|c| matches!(c.column_type, ProcedureColumnType::Out | ProcedureColumnType::InOut) && c.is_cursor())
        .count();
    if return_cursors == 0 || out_cursors == 0 {
        return;
    }
    if return_cursors == 1 && out_cursors == 1 {
        procedure.columns.retain(|c| !(c.column_type == ProcedureColumnType::Return && c.is_cursor()));
        tracing::debug!("Drop the return cursor of {}, the OUT cursor stands for it", procedure.name);
    } else {
        tracing::warn!(
            "Ambiguous cursors of {}: {} return and {} OUT, kept as reported",
            procedure.name, return_cursors, out_cursors
        );
    }
}

/// Calls the procedure with null arguments to learn the columns of the
/// result sets it returns. The call runs in a transaction that is always
/// rolled back.
pub fn extract_execution_meta(conn: &dyn DbConnection, procedure: &mut ProcedureMeta) -> Result<()> {
    conn.begin()?;
    let result = execute_for_meta(conn, procedure);
    close_quietly("transaction", conn.rollback());
    result
}

fn execute_for_meta(conn: &dyn DbConnection, procedure: &mut ProcedureMeta) -> Result<()> {
    let spec = CallSpec::from_procedure(procedure);
    let args: Vec<BindValue> = spec.parameters.iter()
        .filter(|p| p.is_input())
        .map(|_| BindValue::new(FluteValue::Null))
        .collect();
    let result = ProcedureExecutor::default().execute(conn, &spec, &args)?;

    procedure.not_param_results = result.not_param_results.iter().enumerate()
        .map(|(i, rows)| ProcedureNotParamResult {
            property_name: format!("notParamResult{}", i + 1),
            columns: result_columns(rows),
        })
        .collect();
    for column in procedure.columns.iter_mut().filter(|c| c.is_cursor()) {
        let name = if column.column_type == ProcedureColumnType::Return { "returnValue" } else { column.name.as_str() };
        if let Some(rows) = result.cursor(name) {
            column.result_set_columns = result_columns(rows);
        }
    }
    Ok(())
}

/// Column shapes of a result set, typed from the first row when there is one.
pub(crate) fn result_columns(rows: &Rows) -> Vec<ColumnMeta> {
    let first = rows.first();
    let names = first.map(|r| r.columns_ref().to_vec()).unwrap_or_default();
    names.iter().enumerate()
        .map(|(i, name)| {
            let jdbc_type = first.and_then(|r| r.get_value(i))
                .map(|v| v.jdbc_type())
                .filter(|t| *t != JdbcType::Null)
                .unwrap_or(JdbcType::Varchar);
            ColumnMeta::new(name, jdbc_type, &jdbc_type.name())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use flute_core::Row;
    use crate::config::{FluteConfig, NoFilter};
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use crate::driver::CallResult;
    use super::*;

    fn procedure(schema: &str, catalog: Option<&str>, name: &str) -> ProcedureRecord {
        ProcedureRecord {
            catalog: catalog.map(String::from),
            schema: Some(schema.to_string()),
            name: name.to_string(),
            procedure_type: 1,
            remarks: None,
        }
    }

    fn param(procedure: &str, name: &str, column_type: ProcedureColumnType, data_type: JdbcType, type_name: &str) -> ProcedureColumnRecord {
        let column_type = match column_type {
            ProcedureColumnType::In => 1,
            ProcedureColumnType::InOut => 2,
            ProcedureColumnType::Result => 3,
            ProcedureColumnType::Out => 4,
            ProcedureColumnType::Return => 5,
            ProcedureColumnType::Unknown => 0,
        };
        ProcedureColumnRecord {
            schema: Some("EXAMPLEDB".to_string()),
            procedure_name: procedure.to_string(),
            column_name: name.to_string(),
            column_type,
            data_type: data_type.code(),
            type_name: type_name.to_string(),
            ..Default::default()
        }
    }

    fn main_schema() -> UnifiedSchema {
        UnifiedSchema::main(None, Some("EXAMPLEDB"))
    }

    #[test]
    fn test_postgres_return_cursor_dropped_when_out_cursor_exists() {
        let mut meta = FakeMetaData::new("PostgreSQL");
        meta.procedures = vec![procedure("EXAMPLEDB", None, "fn_member_cursor")];
        meta.procedure_columns = vec![
            param("fn_member_cursor", "", ProcedureColumnType::Return, JdbcType::Other, "refcursor"),
            param("fn_member_cursor", "v_id", ProcedureColumnType::In, JdbcType::Integer, "int4"),
            param("fn_member_cursor", "v_cursor", ProcedureColumnType::Out, JdbcType::Other, "refcursor"),
        ];
        let list = ProcedureExtractor::new(Dbms::PostgreSQL, &NoFilter).get_procedure_list(&meta, &main_schema()).unwrap();
        let names: Vec<&str> = list[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["v_id", "v_cursor"]);
        assert_eq!(list[0].columns[1].jdbc_type, JdbcType::RefCursor);
    }

    #[test]
    fn test_postgres_ambiguous_cursors_are_kept() {
        let mut meta = FakeMetaData::new("PostgreSQL");
        meta.procedures = vec![procedure("EXAMPLEDB", None, "fn_two_cursors")];
        meta.procedure_columns = vec![
            param("fn_two_cursors", "", ProcedureColumnType::Return, JdbcType::Other, "refcursor"),
            param("fn_two_cursors", "v_first", ProcedureColumnType::Out, JdbcType::Other, "refcursor"),
            param("fn_two_cursors", "v_second", ProcedureColumnType::Out, JdbcType::Other, "refcursor"),
        ];
        let list = ProcedureExtractor::new(Dbms::PostgreSQL, &NoFilter).get_procedure_list(&meta, &main_schema()).unwrap();
        assert_eq!(list[0].columns.len(), 3);
        assert_eq!(list[0].columns[0].name, "returnValue");
    }

    #[test]
    fn test_postgres_void_return_and_duplicate_parameters() {
        let mut meta = FakeMetaData::new("PostgreSQL");
        meta.procedures = vec![procedure("EXAMPLEDB", None, "fn_touch"), procedure("EXAMPLEDB", None, "pldbg_attach")];
        meta.procedure_columns = vec![
            param("fn_touch", "returnValue", ProcedureColumnType::Return, JdbcType::Other, "void"),
            param("fn_touch", "v_id", ProcedureColumnType::In, JdbcType::Integer, "int4"),
            param("fn_touch", "V_ID", ProcedureColumnType::In, JdbcType::Integer, "int4"),
        ];
        let list = ProcedureExtractor::new(Dbms::PostgreSQL, &NoFilter).get_procedure_list(&meta, &main_schema()).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].columns.len(), 1);
        assert_eq!(list[0].columns[0].name, "v_id");
    }

    #[test]
    fn test_oracle_package_from_catalog() {
        let mut meta = FakeMetaData::new("Oracle");
        meta.procedures = vec![
            procedure("EXAMPLEDB", Some("PKG_MEMBER"), "SP_REGISTER"),
            procedure("EXAMPLEDB", None, "SP_PLAIN"),
            procedure("EXAMPLEDB", Some("DBMS_OUTPUT"), "PUT_LINE"),
        ];
        let mut packaged = param("SP_REGISTER", "V_ID", ProcedureColumnType::In, JdbcType::Numeric, "NUMBER");
        packaged.catalog = Some("PKG_MEMBER".to_string());
        let mut plain = param("SP_PLAIN", "V_DATE", ProcedureColumnType::In, JdbcType::Date, "DATE");
        plain.catalog = Some(String::new());
        meta.procedure_columns = vec![packaged, plain];

        let list = ProcedureExtractor::new(Dbms::Oracle, &NoFilter).get_procedure_list(&meta, &main_schema()).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].procedure_name_with_package(), "PKG_MEMBER.SP_REGISTER");
        assert_eq!(list[0].columns.len(), 1);
        assert_eq!(list[1].package, None);
        assert_eq!(list[1].columns[0].jdbc_type, JdbcType::Timestamp);
    }

    #[test]
    fn test_procedure_except_and_main_schema_preference() {
        let mut meta = FakeMetaData::new("MySQL");
        meta.procedures = vec![
            procedure("OTHERDB", None, "SP_SHARED"),
            procedure("OTHERDB", None, "SP_OTHER_ONLY"),
            procedure("EXAMPLEDB", None, "SP_SHARED"),
            procedure("EXAMPLEDB", None, "SP_TMP_WORK"),
        ];
        let config = FluteConfig::default().add_procedure_except("prefix:SP_TMP");
        let schemas = vec![UnifiedSchema::additional(None, Some("OTHERDB")), main_schema()];
        let map = ProcedureExtractor::new(Dbms::MySQL, &config).get_available_procedure_map(&meta, &schemas).unwrap();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["sp_shared", "sp_other_only"]);
        assert!(map["sp_shared"].schema.is_main_schema());
        assert!(meta.calls().contains(&"get_procedure_columns:OTHERDB.SP_OTHER_ONLY".to_string()));
    }

    #[test]
    fn test_execution_meta_captures_result_columns_and_rolls_back() {
        let conn = FakeConnection::new(Dbms::MySQL, FakeMetaData::new("MySQL"));
        let row = Row::new(
            vec!["MEMBER_ID".to_string(), "MEMBER_NAME".to_string()],
            vec![FluteValue::Bigint(1), FluteValue::Text("Stojkovic".to_string())],
        );
        *conn.db.call_results.borrow_mut() = vec![CallResult::ResultSet(Rows::from(vec![row]))];
        let mut procedure = ProcedureMeta {
            schema: main_schema(),
            name: "SP_MEMBER_LIST".to_string(),
            columns: vec![ProcedureColumnMeta {
                name: "V_RANK".to_string(),
                column_type: ProcedureColumnType::In,
                jdbc_type: JdbcType::Integer,
                ..Default::default()
            }],
            ..Default::default()
        };
        extract_execution_meta(&conn, &mut procedure).unwrap();

        assert_eq!(procedure.not_param_results.len(), 1);
        let result = &procedure.not_param_results[0];
        assert_eq!(result.property_name, "notParamResult1");
        assert_eq!(result.columns[0].jdbc_type, JdbcType::Bigint);
        assert_eq!(result.columns[1].name, "MEMBER_NAME");
        let log = conn.db.log();
        assert_eq!(log.first().map(String::as_str), Some("begin"));
        assert_eq!(log.last().map(String::as_str), Some("rollback"));
        assert!(log.contains(&"set_null:1:INTEGER".to_string()));
    }
}
