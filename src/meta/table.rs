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
use flute_core::{TableMeta, TableType, UnifiedSchema};
use crate::config::SchemaFilter;
use crate::driver::{DatabaseMetaData, Dbms, TableRecord};
use crate::errors::{FluteError, Result};
use crate::message::ExceptionMessageBuilder;

pub struct TableExtractor<'a> {
    dbms: Dbms,
    filter: &'a dyn SchemaFilter,
    object_types: Vec<String>,
}

impl<'a> TableExtractor<'a> {
    pub fn new(dbms: Dbms, filter: &'a dyn SchemaFilter, object_types: Vec<String>) -> Self {
        Self { dbms, filter, object_types }
    }

    /// Tables of the schema, system and excepted tables removed.
    ///
    /// The same name reported for two owners is ambiguous and fails with
    /// [`FluteError::DuplicateTable`].
    pub fn get_table_list(&self, meta: &dyn DatabaseMetaData, schema: &UnifiedSchema) -> Result<Vec<TableMeta>> {
        let records = meta.get_tables(schema.pure_catalog(), schema.pure_schema(), None, &self.object_types)?;
        let mut tables: IndexMap<String, (TableRecord, TableMeta)> = IndexMap::new();
        for record in records {
            let name = record.name.trim();
            if name.is_empty() {
                continue;
            }
            if self.dbms.is_system_table(record.schema.as_deref(), name) {
                tracing::trace!("Skip system table: {}", name);
                continue;
            }
            if self.filter.is_table_except(schema, name) {
                tracing::debug!("Except table: {}", name);
                continue;
            }
            let key = name.to_lowercase();
            if let Some((existing, _)) = tables.get(&key) {
                if same_owner(existing, &record) {
                    continue;
                }
                return Err(FluteError::DuplicateTable(duplicate_message(schema, existing, &record)));
            }
            let mut table = TableMeta::new(schema.clone(), name, TableType::from_db(&record.table_type));
            table.comment = record.remarks.clone().filter(|r| !r.trim().is_empty());
            tables.insert(key, (record, table));
        }
        Ok(tables.into_values().map(|(_, table)| table).collect())
    }
}

fn same_owner(left: &TableRecord, right: &TableRecord) -> bool {
    let eq = |a: &Option<String>, b: &Option<String>| match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    };
    eq(&left.catalog, &right.catalog) && eq(&left.schema, &right.schema)
}

fn owner_of(record: &TableRecord) -> String {
    let owner = UnifiedSchema::new(record.catalog.as_deref(), record.schema.as_deref());
    owner.qualify(&record.name)
}

fn duplicate_message(schema: &UnifiedSchema, first: &TableRecord, second: &TableRecord) -> String {
    ExceptionMessageBuilder::new()
        .notice("The same-name table between different schemas was found.")
        .advice("Specify the schema of the main connection,")
        .advice("or except one of the tables from the extraction.")
        .item_element("Requested Schema", schema.catalog_schema())
        .item("Tables")
        .element(owner_of(first))
        .element(owner_of(second))
        .build()
}

#[cfg(test)]
mod tests {
    use crate::config::{FluteConfig, NoFilter};
    use crate::driver::fake::FakeMetaData;
    use super::*;

    fn record(schema: &str, name: &str, table_type: &str) -> TableRecord {
        TableRecord {
            schema: Some(schema.to_string()),
            name: name.to_string(),
            table_type: table_type.to_string(),
            ..Default::default()
        }
    }

    fn types() -> Vec<String> {
        vec!["TABLE".to_string(), "VIEW".to_string()]
    }

    #[test]
    fn test_filters_system_and_excepted_tables() {
        let mut meta = FakeMetaData::new("Oracle");
        meta.tables = vec![
            record("EXAMPLEDB", "MEMBER", "TABLE"),
            record("EXAMPLEDB", "BIN$xyz==$0", "TABLE"),
            record("EXAMPLEDB", "TMP_WORK", "TABLE"),
            record("EXAMPLEDB", "VENDOR_VIEW", "VIEW"),
            record("EXAMPLEDB", "MEMBER", "TABLE"),
        ];
        let config = FluteConfig::default().add_table_except("prefix:TMP_");
        let extractor = TableExtractor::new(Dbms::Oracle, &config, types());
        let schema = UnifiedSchema::main(None, Some("EXAMPLEDB"));
        let tables = extractor.get_table_list(&meta, &schema).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["MEMBER", "VENDOR_VIEW"]);
        assert!(tables[1].is_view());
        assert!(tables[0].schema.is_main_schema());
    }

    #[test]
    fn test_same_name_in_two_schemas_is_fatal() {
        let mut meta = FakeMetaData::new("PostgreSQL");
        meta.tables = vec![record("public", "member", "TABLE"), record("nextschema", "member", "TABLE")];
        let extractor = TableExtractor::new(Dbms::PostgreSQL, &NoFilter, types());
        let err = extractor.get_table_list(&meta, &UnifiedSchema::main(None, None)).unwrap_err();
        match err {
            FluteError::DuplicateTable(msg) => {
                assert!(msg.contains("public.member"));
                assert!(msg.contains("nextschema.member"));
            }
            other => panic!("unexpected: {}", other),
        }
    }
}
