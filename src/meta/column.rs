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
use flute_core::{ColumnMeta, JdbcType, UnifiedSchema};
use crate::config::SchemaFilter;
use crate::driver::{ColumnRecord, DatabaseMetaData, Dbms};
use crate::errors::Result;
use crate::meta::probe::CaseProbe;

pub struct ColumnExtractor<'a> {
    dbms: Dbms,
    filter: &'a dyn SchemaFilter,
    probe: CaseProbe,
}

impl<'a> ColumnExtractor<'a> {
    pub fn new(dbms: Dbms, filter: &'a dyn SchemaFilter, retry: bool) -> Self {
        Self { dbms, filter, probe: CaseProbe::new(retry) }
    }

    /// Columns of a table in ordinal order.
    pub fn get_column_list(&self, meta: &dyn DatabaseMetaData, schema: &UnifiedSchema, table: &str) -> Result<Vec<ColumnMeta>> {
        let records = self.probe
            .probe(table, |name| {
                // name patterns may match other tables, e.g. `_` as a wildcard
                let rows = meta.get_columns(schema.pure_catalog(), schema.pure_schema(), name)?;
                Ok(rows.into_iter().filter(|r| r.table_name.eq_ignore_ascii_case(name)).collect::<Vec<_>>())
            })
            .into_rows()?;

        let mut records = records;
        records.sort_by_key(|r| r.ordinal_position);

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(records.len());
        for record in records {
            if self.filter.is_column_except(schema, table, &record.column_name) {
                tracing::debug!("Except column: {}.{}", table, record.column_name);
                continue;
            }
            if !seen.insert(record.column_name.to_lowercase()) {
                tracing::debug!("Skip duplicate column: {}.{}", table, record.column_name);
                continue;
            }
            columns.push(self.to_column_meta(record));
        }
        Ok(columns)
    }

    fn to_column_meta(&self, record: ColumnRecord) -> ColumnMeta {
        let mut jdbc_type = JdbcType::from_code(record.data_type);
        let mut db_type_name = record.type_name.trim().to_string();
        let mut auto_increment = record.auto_increment.unwrap_or(false);
        // Oracle pads defaults with line breaks
        let default_value = record.column_def.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

        match self.dbms {
            Dbms::Oracle => {
                // DATE carries a time part
                if db_type_name.eq_ignore_ascii_case("DATE") {
                    jdbc_type = JdbcType::Timestamp;
                }
            }
            Dbms::PostgreSQL => {
                if default_value.as_deref().map(|d| d.to_lowercase().starts_with("nextval(")).unwrap_or(false) {
                    auto_increment = true;
                }
                if db_type_name.eq_ignore_ascii_case("bpchar") && !jdbc_type.is_string() {
                    jdbc_type = JdbcType::Char;
                }
            }
            Dbms::SQLServer => {
                let lower = db_type_name.to_lowercase();
                if let Some(base) = lower.strip_suffix(" identity") {
                    db_type_name = db_type_name[..base.len()].to_string();
                    auto_increment = true;
                }
            }
            _ => {}
        }
        ColumnMeta {
            name: record.column_name,
            jdbc_type,
            db_type_name,
            column_size: record.column_size,
            decimal_digits: record.decimal_digits,
            required: !record.nullable,
            default_value,
            comment: record.remarks.filter(|r| !r.trim().is_empty()),
            primary_key: false,
            pk_name: None,
            auto_increment,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{FluteConfig, NoFilter};
    use crate::driver::fake::FakeMetaData;
    use super::*;

    fn column(table: &str, name: &str, data_type: JdbcType, type_name: &str, position: i32) -> ColumnRecord {
        ColumnRecord {
            table_name: table.to_string(),
            column_name: name.to_string(),
            data_type: data_type.code(),
            type_name: type_name.to_string(),
            nullable: true,
            ordinal_position: position,
            ..Default::default()
        }
    }

    #[test]
    fn test_case_fallback_and_other_tables() {
        let mut meta = FakeMetaData::new("Oracle");
        meta.case_sensitive = true;
        meta.columns = vec![
            column("MEMBER", "BIRTHDATE", JdbcType::Date, "DATE", 2),
            column("MEMBER", "MEMBER_ID", JdbcType::Numeric, "NUMBER", 1),
            column("MEMBERS", "OTHER", JdbcType::Varchar, "VARCHAR2", 1),
        ];
        let extractor = ColumnExtractor::new(Dbms::Oracle, &NoFilter, true);
        let columns = extractor.get_column_list(&meta, &UnifiedSchema::main(None, None), "member").unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["MEMBER_ID", "BIRTHDATE"]);
        assert_eq!(columns[1].jdbc_type, JdbcType::Timestamp);
        assert_eq!(meta.calls(), vec!["get_columns:member", "get_columns:MEMBER"]);
    }

    #[test]
    fn test_normalization_and_excepts() {
        let mut meta = FakeMetaData::new("PostgreSQL");
        let mut id = column("member", "member_id", JdbcType::Integer, "serial", 1);
        id.column_def = Some("nextval('member_member_id_seq'::regclass)".to_string());
        id.nullable = false;
        meta.columns = vec![
            id,
            column("member", "status_code", JdbcType::Other, "bpchar", 2),
            column("member", "version_no", JdbcType::Bigint, "int8", 3),
            column("member", "status_code", JdbcType::Other, "bpchar", 4),
        ];
        let config = FluteConfig::default().add_column_except("*", "version_no");
        let extractor = ColumnExtractor::new(Dbms::PostgreSQL, &config, true);
        let columns = extractor.get_column_list(&meta, &UnifiedSchema::main(None, Some("public")), "member").unwrap();
        assert_eq!(columns.len(), 2);
        assert!(columns[0].auto_increment);
        assert!(columns[0].required);
        assert_eq!(columns[1].jdbc_type, JdbcType::Char);
    }

    #[test]
    fn test_sql_server_identity() {
        let mut meta = FakeMetaData::new("Microsoft SQL Server");
        meta.columns = vec![column("MEMBER", "MEMBER_ID", JdbcType::Integer, "int identity", 1)];
        let extractor = ColumnExtractor::new(Dbms::SQLServer, &NoFilter, false);
        let columns = extractor.get_column_list(&meta, &UnifiedSchema::main(None, Some("dbo")), "MEMBER").unwrap();
        assert_eq!(columns[0].db_type_name, "int");
        assert!(columns[0].auto_increment);
    }
}
