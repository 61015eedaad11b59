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
//! Loads the whole schema model of a connection.

mod xml;

pub use xml::*;

use std::collections::HashMap;
use indexmap::IndexMap;
use flute_core::{ProcedureMeta, SynonymMeta, TableMeta, TableType, UnifiedSchema};
use crate::config::FluteConfig;
use crate::driver::{DatabaseMetaData, DbConnection, Dbms};
use crate::errors::{FluteError, Result};
use crate::message::{ConnectionDiagnostics, ExceptionMessageBuilder};
use crate::meta::{
    extract_execution_meta, extract_table_detail, translate_foreign_keys, OracleTypeExtractor, OracleTypeMap,
    ProcedureExtractor, SynonymExtractor, TableExtractor,
};

/// Everything extracted from one database.
#[derive(Debug, Clone)]
pub struct DatabaseMeta {
    pub dbms: Dbms,
    pub product_name: String,
    pub product_version: Option<String>,
    pub main_schema: UnifiedSchema,
    pub tables: Vec<TableMeta>,
    pub procedures: IndexMap<String, ProcedureMeta>,
    pub synonyms: IndexMap<String, SynonymMeta>,
}

impl DatabaseMeta {
    pub fn table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.iter()
            .filter(|t| t.name.eq_ignore_ascii_case(name))
            .min_by_key(|t| !t.schema.is_main_schema())
    }

    pub fn procedure(&self, name: &str) -> Option<&ProcedureMeta> {
        self.procedures.get(&name.to_lowercase())
    }
}

pub struct SchemaLoader<'a> {
    conn: &'a dyn DbConnection,
    config: &'a FluteConfig,
}

impl<'a> SchemaLoader<'a> {
    pub fn new(conn: &'a dyn DbConnection, config: &'a FluteConfig) -> Self {
        Self { conn, config }
    }

    /// The main schema first, then the additional schemas in configured order.
    pub fn schemas(&self) -> Vec<UnifiedSchema> {
        let mut schemas = vec![self.config.main_schema()];
        schemas.extend(self.config.additional_schemas().iter().map(|s| s.unified_schema()));
        schemas
    }

    pub fn load(&self) -> Result<DatabaseMeta> {
        let dbms = self.conn.dbms();
        let meta = self.conn.meta_data()?;
        let meta = meta.as_ref();
        let product_name = meta.database_product_name()?;
        tracing::info!("Loading the schema of {} ({})", product_name, dbms);
        let schemas = self.schemas();

        let mut tables = Vec::new();
        for schema in schemas.iter() {
            tables.extend(self.load_tables(meta, schema)?);
        }
        mark_same_name_tables(&mut tables);

        let mut synonyms = IndexMap::new();
        if dbms == Dbms::Oracle {
            let retry = self.config.case_insensitive_retry();
            synonyms = SynonymExtractor::new(self.conn, self.config, retry).extract_synonym_map(&schemas, &tables)?;
            translate_foreign_keys(&mut tables, &mut synonyms, self.config);
            apply_synonyms(&mut tables, &synonyms);
        }

        let procedures = self.load_procedures(meta, &schemas)?;
        tracing::info!("Loaded {} tables, {} procedures, {} synonyms", tables.len(), procedures.len(), synonyms.len());
        Ok(DatabaseMeta {
            dbms,
            product_name,
            product_version: meta.database_product_version().ok(),
            main_schema: self.config.main_schema(),
            tables,
            procedures,
            synonyms,
        })
    }

    fn load_tables(&self, meta: &dyn DatabaseMetaData, schema: &UnifiedSchema) -> Result<Vec<TableMeta>> {
        let dbms = self.conn.dbms();
        let object_types = self.config.additional_schemas().iter()
            .find(|s| schema.is_additional_schema() && s.unified_schema() == *schema && !s.object_types.is_empty())
            .map(|s| s.object_types.clone())
            .unwrap_or_else(|| self.config.object_types(dbms));
        let mut tables = TableExtractor::new(dbms, self.config, object_types).get_table_list(meta, schema)?;
        for table in tables.iter_mut() {
            // synonyms are filled from the synonym metadata
            if table.table_type == TableType::Synonym {
                continue;
            }
            tracing::debug!("Loading table: {}", table.table_full_qualified_name());
            extract_table_detail(dbms, self.config, self.config.case_insensitive_retry(), meta, table)?;
        }
        Ok(tables)
    }

    fn load_procedures(&self, meta: &dyn DatabaseMetaData, schemas: &[UnifiedSchema]) -> Result<IndexMap<String, ProcedureMeta>> {
        let dbms = self.conn.dbms();
        let mut extractor = ProcedureExtractor::new(dbms, self.config);
        if dbms == Dbms::Oracle {
            extractor = extractor.with_type_map(self.load_oracle_types(schemas));
        }
        let mut procedures = extractor.get_available_procedure_map(meta, schemas)?;
        if self.config.procedure_execution_meta() {
            for procedure in procedures.values_mut() {
                if let Err(err) = extract_execution_meta(self.conn, procedure) {
                    tracing::warn!("Failed to execute {} for its result metadata: {}", procedure.procedure_full_qualified_name(), err);
                }
            }
        }
        Ok(procedures)
    }

    fn load_oracle_types(&self, schemas: &[UnifiedSchema]) -> OracleTypeMap {
        let mut merged = OracleTypeMap::default();
        for schema in schemas {
            match OracleTypeExtractor::new(self.conn).extract(schema) {
                Ok(map) => {
                    merged.arrays.extend(map.arrays);
                    merged.structs.extend(map.structs);
                }
                Err(err) => tracing::warn!("Failed to read Oracle types of {}: {}", schema, err),
            }
        }
        merged
    }

    /// One table of the main schema, with its detail.
    pub fn load_table(&self, name: &str) -> Result<TableMeta> {
        let dbms = self.conn.dbms();
        let meta = self.conn.meta_data()?;
        let meta = meta.as_ref();
        let schema = self.config.main_schema();
        let tables = TableExtractor::new(dbms, self.config, self.config.object_types(dbms)).get_table_list(meta, &schema)?;
        let mut table = match tables.into_iter().find(|t| t.name.eq_ignore_ascii_case(name)) {
            Some(table) => table,
            None => return Err(FluteError::TableNotFound(self.not_found_message(meta, "table", name, &schema))),
        };
        extract_table_detail(dbms, self.config, self.config.case_insensitive_retry(), meta, &mut table)?;
        Ok(table)
    }

    /// One procedure of the configured schemas.
    pub fn load_procedure(&self, name: &str) -> Result<ProcedureMeta> {
        let meta = self.conn.meta_data()?;
        let meta = meta.as_ref();
        let schemas = self.schemas();
        let mut procedures = ProcedureExtractor::new(self.conn.dbms(), self.config).get_available_procedure_map(meta, &schemas)?;
        match procedures.shift_remove(&name.to_lowercase()) {
            Some(procedure) => Ok(procedure),
            None => Err(FluteError::ProcedureNotFound(self.not_found_message(meta, "procedure", name, &schemas[0]))),
        }
    }

    fn not_found_message(&self, meta: &dyn DatabaseMetaData, kind: &str, name: &str, schema: &UnifiedSchema) -> String {
        let catalog = self.conn.catalog().ok().flatten();
        let diagnostics = ConnectionDiagnostics::collect(meta, catalog.as_deref(), schema.pure_schema());
        ExceptionMessageBuilder::new()
            .notice(format!("The {} was not found.", kind))
            .advice(format!("Make sure the {} exists in the schema", kind))
            .advice("and that the connection points at the expected database.")
            .item_element(if kind == "table" { "Table" } else { "Procedure" }, name)
            .diagnostics(&diagnostics)
            .build()
    }
}

fn mark_same_name_tables(tables: &mut [TableMeta]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for table in tables.iter() {
        *counts.entry(table.name.to_lowercase()).or_default() += 1;
    }
    for table in tables.iter_mut() {
        table.same_name_table_exists = counts.get(&table.name.to_lowercase()).copied().unwrap_or_default() > 1;
    }
}

fn apply_synonyms(tables: &mut [TableMeta], synonyms: &IndexMap<String, SynonymMeta>) {
    for table in tables.iter_mut().filter(|t| t.table_type == TableType::Synonym) {
        let synonym = match synonyms.get(&table.table_key()) {
            Some(synonym) => synonym,
            None => {
                tracing::debug!("No synonym metadata for {}", table.table_full_qualified_name());
                continue;
            }
        };
        if table.comment.is_none() {
            table.comment = synonym.table_comment.clone();
        }
        table.columns = synonym.columns.clone();
        table.primary_key = synonym.primary_key.clone();
        table.unique_keys = synonym.unique_keys.clone();
        table.indexes = synonym.indexes.clone();
        table.foreign_keys = synonym.foreign_keys.clone();
    }
}

#[cfg(test)]
mod tests {
    use flute_core::JdbcType;
    use crate::config::AdditionalSchema;
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use crate::driver::{ColumnRecord, PrimaryKeyRecord, ProcedureRecord, TableRecord};
    use super::*;

    fn table(schema: &str, name: &str) -> TableRecord {
        TableRecord { schema: Some(schema.to_string()), name: name.to_string(), table_type: "TABLE".to_string(), ..Default::default() }
    }

    fn column(schema: &str, table: &str, name: &str, position: i32) -> ColumnRecord {
        ColumnRecord {
            schema: Some(schema.to_string()),
            table_name: table.to_string(),
            column_name: name.to_string(),
            data_type: JdbcType::Integer.code(),
            type_name: "INT".to_string(),
            ordinal_position: position,
            ..Default::default()
        }
    }

    fn fake() -> FakeMetaData {
        let mut meta = FakeMetaData::new("MySQL");
        meta.tables = vec![table("EXAMPLEDB", "MEMBER"), table("EXAMPLEDB", "PURCHASE"), table("OTHERDB", "MEMBER")];
        meta.columns = vec![
            column("EXAMPLEDB", "MEMBER", "MEMBER_ID", 1),
            column("EXAMPLEDB", "PURCHASE", "PURCHASE_ID", 1),
            column("OTHERDB", "MEMBER", "MEMBER_ID", 1),
        ];
        meta.primary_keys = vec![PrimaryKeyRecord {
            table_name: "MEMBER".to_string(),
            column_name: "MEMBER_ID".to_string(),
            key_seq: 1,
            pk_name: Some("PK_MEMBER".to_string()),
        }];
        meta.procedures = vec![ProcedureRecord {
            schema: Some("EXAMPLEDB".to_string()),
            name: "SP_MEMBER".to_string(),
            procedure_type: 1,
            ..Default::default()
        }];
        meta
    }

    fn config() -> FluteConfig {
        FluteConfig::new("jdbc:mysql://localhost:3306/exampledb")
            .set_main_schema("EXAMPLEDB".to_string())
            .add_additional_schema(AdditionalSchema::new("OTHERDB"))
    }

    #[test]
    fn test_load_marks_same_name_tables_and_pk_columns() {
        let conn = FakeConnection::new(Dbms::MySQL, fake());
        let config = config();
        let database = SchemaLoader::new(&conn, &config).load().unwrap();
        assert_eq!(database.tables.len(), 3);
        let member = database.table("member").unwrap();
        assert!(member.schema.is_main_schema());
        assert!(member.same_name_table_exists);
        assert_eq!(member.table_sql_name(), "EXAMPLEDB.MEMBER");
        assert!(member.columns[0].primary_key);
        assert_eq!(member.columns[0].pk_name.as_deref(), Some("PK_MEMBER"));
        assert!(!database.table("PURCHASE").unwrap().same_name_table_exists);
        assert!(database.procedure("SP_MEMBER").is_some());
    }

    #[test]
    fn test_load_table_not_found_carries_diagnostics() {
        let conn = FakeConnection::new(Dbms::MySQL, fake());
        let config = config();
        let err = SchemaLoader::new(&conn, &config).load_table("NO_SUCH_TABLE").unwrap_err();
        match err {
            FluteError::TableNotFound(message) => {
                assert!(message.contains("NO_SUCH_TABLE"));
                assert!(message.contains("fake://localhost/exampledb"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let err = SchemaLoader::new(&conn, &config).load_procedure("SP_NONE").unwrap_err();
        assert!(matches!(err, FluteError::ProcedureNotFound(_)));
    }
}
