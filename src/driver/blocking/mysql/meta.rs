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

use std::cell::RefCell;
use mysql::{Row as MysqlRow, Value as MysqlValue};
use mysql::prelude::Queryable;
use crate::driver::blocking::jdbc_type_of;
use crate::driver::{
    ColumnRecord, DatabaseMetaData, ImportedKeyRecord, IndexRecord, PrimaryKeyRecord, ProcedureColumnRecord,
    ProcedureRecord, TableRecord, TABLE_INDEX_OTHER,
};
use crate::errors::Result;
use super::MysqlConnection;

/// Catalog of a MySQL connection, read from `information_schema`.
///
/// MySQL reports the database as the catalog, the schema argument is
/// accepted as a synonym when no catalog is given.
pub struct MysqlMetaData<'c> {
    conn: &'c RefCell<MysqlConnection>,
    url: String,
    user: String,
}

fn text(row: &MysqlRow, index: usize) -> Option<String> {
    row.get_opt::<Option<String>, _>(index).and_then(|r| r.ok()).flatten()
}

fn int(row: &MysqlRow, index: usize) -> Option<i64> {
    row.get_opt::<Option<i64>, _>(index).and_then(|r| r.ok()).flatten()
}

fn table_type_of(mysql_type: &str) -> String {
    match mysql_type {
        "BASE TABLE" => "TABLE".to_string(),
        other => other.to_string(),
    }
}

fn mode_code(mode: Option<&str>) -> i16 {
    match mode {
        Some("IN") => 1,
        Some("INOUT") => 2,
        Some("OUT") => 4,
        None => 5,
        Some(_) => 0,
    }
}

impl<'c> MysqlMetaData<'c> {
    pub fn new(conn: &'c RefCell<MysqlConnection>, url: &str, user: &str) -> Self {
        Self { conn, url: url.to_string(), user: user.to_string() }
    }

    fn select(&self, sql: &str, params: Vec<MysqlValue>) -> Result<Vec<MysqlRow>> {
        Ok(self.conn.borrow_mut().exec(sql, params)?)
    }

    fn database(&self, catalog: Option<&str>, schema: Option<&str>) -> Result<String> {
        if let Some(name) = catalog.or(schema) {
            return Ok(name.to_string());
        }
        let current: Option<Option<String>> = self.conn.borrow_mut().query_first("SELECT DATABASE()")?;
        Ok(current.flatten().unwrap_or_default())
    }
}

impl DatabaseMetaData for MysqlMetaData<'_> {
    fn database_product_name(&self) -> Result<String> {
        Ok("MySQL".to_string())
    }

    fn database_product_version(&self) -> Result<String> {
        let version: Option<String> = self.conn.borrow_mut().query_first("SELECT VERSION()")?;
        Ok(version.unwrap_or_default())
    }

    fn driver_name(&self) -> Result<String> {
        Ok("mysql".to_string())
    }

    fn url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn user_name(&self) -> Result<String> {
        Ok(self.user.clone())
    }

    fn get_tables(&self, catalog: Option<&str>, schema: Option<&str>, table_pattern: Option<&str>, types: &[String]) -> Result<Vec<TableRecord>> {
        let database = self.database(catalog, schema)?;
        let rows = self.select(
            "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE, TABLE_COMMENT FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME LIKE ? ORDER BY TABLE_NAME",
            vec![database.into(), table_pattern.unwrap_or("%").to_string().into()],
        )?;
        let mut records = Vec::new();
        for row in rows.iter() {
            let table_type = table_type_of(&text(row, 2).unwrap_or_default());
            if !types.is_empty() && !types.iter().any(|t| t.eq_ignore_ascii_case(&table_type)) {
                continue;
            }
            records.push(TableRecord {
                catalog: text(row, 0),
                schema: None,
                name: text(row, 1).unwrap_or_default(),
                table_type,
                remarks: text(row, 3),
            });
        }
        Ok(records)
    }

    fn get_columns(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ColumnRecord>> {
        let database = self.database(catalog, schema)?;
        let rows = self.select(
            "SELECT TABLE_SCHEMA, COLUMN_NAME, DATA_TYPE, COLUMN_TYPE, CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, \
             NUMERIC_SCALE, DATETIME_PRECISION, IS_NULLABLE, COLUMN_DEFAULT, COLUMN_COMMENT, ORDINAL_POSITION, EXTRA \
             FROM information_schema.COLUMNS WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
            vec![database.into(), table.to_string().into()],
        )?;
        Ok(rows.iter().map(|row| {
            let column_type = text(row, 3).unwrap_or_default().to_lowercase();
            let mut type_name = text(row, 2).unwrap_or_default().to_uppercase();
            if column_type.contains("unsigned") {
                type_name.push_str(" UNSIGNED");
            }
            let column_size = int(row, 4).or_else(|| int(row, 5)).or_else(|| int(row, 7));
            ColumnRecord {
                catalog: text(row, 0),
                schema: None,
                table_name: table.to_string(),
                column_name: text(row, 1).unwrap_or_default(),
                data_type: jdbc_type_of(&type_name).code(),
                type_name,
                column_size: column_size.and_then(|s| i32::try_from(s).ok()),
                decimal_digits: int(row, 6).map(|s| s as i32),
                nullable: text(row, 8).map(|n| n == "YES").unwrap_or(true),
                remarks: text(row, 10).filter(|r| !r.is_empty()),
                column_def: text(row, 9),
                ordinal_position: int(row, 11).unwrap_or_default() as i32,
                auto_increment: Some(text(row, 12).map(|e| e.contains("auto_increment")).unwrap_or(false)),
            }
        }).collect())
    }

    fn get_primary_keys(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyRecord>> {
        let database = self.database(catalog, schema)?;
        let rows = self.select(
            "SELECT COLUMN_NAME, ORDINAL_POSITION, CONSTRAINT_NAME FROM information_schema.KEY_COLUMN_USAGE \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' ORDER BY ORDINAL_POSITION",
            vec![database.into(), table.to_string().into()],
        )?;
        Ok(rows.iter().map(|row| PrimaryKeyRecord {
            table_name: table.to_string(),
            column_name: text(row, 0).unwrap_or_default(),
            key_seq: int(row, 1).unwrap_or_default() as i32,
            pk_name: text(row, 2),
        }).collect())
    }

    fn get_index_info(&self, catalog: Option<&str>, schema: Option<&str>, table: &str, unique_only: bool) -> Result<Vec<IndexRecord>> {
        let database = self.database(catalog, schema)?;
        let mut sql = String::from(
            "SELECT NON_UNIQUE, INDEX_NAME, SEQ_IN_INDEX, COLUMN_NAME, COLLATION FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
        );
        if unique_only {
            sql.push_str(" AND NON_UNIQUE = 0");
        }
        sql.push_str(" ORDER BY NON_UNIQUE, INDEX_NAME, SEQ_IN_INDEX");
        let rows = self.select(&sql, vec![database.into(), table.to_string().into()])?;
        Ok(rows.iter().map(|row| IndexRecord {
            table_name: table.to_string(),
            non_unique: int(row, 0).unwrap_or(1) != 0,
            index_name: text(row, 1),
            index_type: TABLE_INDEX_OTHER,
            ordinal_position: int(row, 2).unwrap_or_default() as i32,
            column_name: text(row, 3),
            asc_or_desc: text(row, 4),
        }).collect())
    }

    fn get_imported_keys(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ImportedKeyRecord>> {
        let database = self.database(catalog, schema)?;
        let rows = self.select(
            "SELECT REFERENCED_TABLE_SCHEMA, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME, COLUMN_NAME, \
             ORDINAL_POSITION, CONSTRAINT_NAME FROM information_schema.KEY_COLUMN_USAGE \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND REFERENCED_TABLE_NAME IS NOT NULL \
             ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION",
            vec![database.into(), table.to_string().into()],
        )?;
        Ok(rows.iter().map(|row| ImportedKeyRecord {
            pk_table_catalog: text(row, 0),
            pk_table_schema: None,
            pk_table_name: text(row, 1).unwrap_or_default(),
            pk_column_name: text(row, 2).unwrap_or_default(),
            fk_table_name: table.to_string(),
            fk_column_name: text(row, 3).unwrap_or_default(),
            key_seq: int(row, 4).unwrap_or_default() as i32,
            fk_name: text(row, 5),
            key_group: None,
        }).collect())
    }

    fn get_procedures(&self, catalog: Option<&str>, schema: Option<&str>, procedure_pattern: Option<&str>) -> Result<Vec<ProcedureRecord>> {
        let database = self.database(catalog, schema)?;
        let rows = self.select(
            "SELECT ROUTINE_SCHEMA, ROUTINE_NAME, ROUTINE_TYPE, ROUTINE_COMMENT FROM information_schema.ROUTINES \
             WHERE ROUTINE_SCHEMA = ? AND ROUTINE_NAME LIKE ? ORDER BY ROUTINE_NAME",
            vec![database.into(), procedure_pattern.unwrap_or("%").to_string().into()],
        )?;
        Ok(rows.iter().map(|row| ProcedureRecord {
            catalog: text(row, 0),
            schema: None,
            name: text(row, 1).unwrap_or_default(),
            procedure_type: if text(row, 2).as_deref() == Some("FUNCTION") { 2 } else { 1 },
            remarks: text(row, 3).filter(|r| !r.is_empty()),
        }).collect())
    }

    fn get_procedure_columns(&self, catalog: Option<&str>, schema: Option<&str>, procedure: &str) -> Result<Vec<ProcedureColumnRecord>> {
        let database = self.database(catalog, schema)?;
        let rows = self.select(
            "SELECT PARAMETER_NAME, PARAMETER_MODE, DATA_TYPE, NUMERIC_PRECISION, CHARACTER_MAXIMUM_LENGTH, \
             NUMERIC_SCALE, SPECIFIC_SCHEMA FROM information_schema.PARAMETERS \
             WHERE SPECIFIC_SCHEMA = ? AND SPECIFIC_NAME = ? ORDER BY ORDINAL_POSITION",
            vec![database.into(), procedure.to_string().into()],
        )?;
        Ok(rows.iter().map(|row| {
            let mode = text(row, 1);
            let type_name = text(row, 2).unwrap_or_default().to_uppercase();
            ProcedureColumnRecord {
                catalog: text(row, 6),
                schema: None,
                procedure_name: procedure.to_string(),
                column_name: text(row, 0).unwrap_or_else(|| "RETURN_VALUE".to_string()),
                column_type: mode_code(mode.as_deref()),
                data_type: jdbc_type_of(&type_name).code(),
                type_name,
                precision: int(row, 3).or_else(|| int(row, 4)).and_then(|p| i32::try_from(p).ok()),
                scale: int(row, 5).map(|s| s as i32),
                remarks: None,
            }
        }).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_mode_codes() {
        assert_eq!(mode_code(Some("IN")), 1);
        assert_eq!(mode_code(Some("INOUT")), 2);
        assert_eq!(mode_code(Some("OUT")), 4);
        assert_eq!(mode_code(None), 5);
        assert_eq!(table_type_of("BASE TABLE"), "TABLE");
        assert_eq!(table_type_of("VIEW"), "VIEW");
    }
}
