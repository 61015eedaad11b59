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

use oracle::sql_type::ToSql;
use crate::driver::blocking::jdbc_type_of;
use crate::driver::{
    ColumnRecord, DatabaseMetaData, ImportedKeyRecord, IndexRecord, PrimaryKeyRecord, ProcedureColumnRecord,
    ProcedureRecord, TableRecord, TABLE_INDEX_OTHER,
};
use crate::errors::Result;
use super::OracleConnection;

const TABLES_SQL: &str = "\
SELECT t.OWNER, t.TABLE_NAME, 'TABLE', c.COMMENTS
  FROM ALL_TABLES t
  LEFT JOIN ALL_TAB_COMMENTS c ON c.OWNER = t.OWNER AND c.TABLE_NAME = t.TABLE_NAME
 WHERE t.OWNER = :owner AND t.TABLE_NAME LIKE :pattern AND t.NESTED = 'NO'
UNION ALL
SELECT v.OWNER, v.VIEW_NAME, 'VIEW', c.COMMENTS
  FROM ALL_VIEWS v
  LEFT JOIN ALL_TAB_COMMENTS c ON c.OWNER = v.OWNER AND c.TABLE_NAME = v.VIEW_NAME
 WHERE v.OWNER = :owner AND v.VIEW_NAME LIKE :pattern
UNION ALL
SELECT s.OWNER, s.SYNONYM_NAME, 'SYNONYM', NULL
  FROM ALL_SYNONYMS s
 WHERE s.OWNER = :owner AND s.SYNONYM_NAME LIKE :pattern
 ORDER BY 2";

const COLUMNS_SQL: &str = "\
SELECT c.OWNER, c.COLUMN_NAME, c.DATA_TYPE, c.DATA_LENGTH, c.DATA_PRECISION, c.DATA_SCALE,
       c.NULLABLE, c.DATA_DEFAULT, c.COLUMN_ID, c.CHAR_LENGTH, m.COMMENTS
  FROM ALL_TAB_COLUMNS c
  LEFT JOIN ALL_COL_COMMENTS m
    ON m.OWNER = c.OWNER AND m.TABLE_NAME = c.TABLE_NAME AND m.COLUMN_NAME = c.COLUMN_NAME
 WHERE c.OWNER = :owner AND c.TABLE_NAME = :table_name
 ORDER BY c.COLUMN_ID";

const PRIMARY_KEYS_SQL: &str = "\
SELECT cc.COLUMN_NAME, cc.POSITION, c.CONSTRAINT_NAME
  FROM ALL_CONSTRAINTS c
  JOIN ALL_CONS_COLUMNS cc
    ON cc.OWNER = c.OWNER AND cc.CONSTRAINT_NAME = c.CONSTRAINT_NAME AND cc.TABLE_NAME = c.TABLE_NAME
 WHERE c.CONSTRAINT_TYPE = 'P' AND c.OWNER = :owner AND c.TABLE_NAME = :table_name
 ORDER BY cc.POSITION";

const INDEXES_SQL: &str = "\
SELECT i.INDEX_NAME, i.UNIQUENESS, ic.COLUMN_POSITION, ic.COLUMN_NAME, ic.DESCEND
  FROM ALL_INDEXES i
  JOIN ALL_IND_COLUMNS ic ON ic.INDEX_OWNER = i.OWNER AND ic.INDEX_NAME = i.INDEX_NAME
 WHERE i.TABLE_OWNER = :owner AND i.TABLE_NAME = :table_name
   AND (i.UNIQUENESS = 'UNIQUE' OR :unique_only = 0)
 ORDER BY i.UNIQUENESS DESC, i.INDEX_NAME, ic.COLUMN_POSITION";

const IMPORTED_KEYS_SQL: &str = "\
SELECT pc.OWNER, pc.TABLE_NAME, pcc.COLUMN_NAME, fcc.COLUMN_NAME, fcc.POSITION, fc.CONSTRAINT_NAME
  FROM ALL_CONSTRAINTS fc
  JOIN ALL_CONS_COLUMNS fcc ON fcc.OWNER = fc.OWNER AND fcc.CONSTRAINT_NAME = fc.CONSTRAINT_NAME
  JOIN ALL_CONSTRAINTS pc ON pc.OWNER = fc.R_OWNER AND pc.CONSTRAINT_NAME = fc.R_CONSTRAINT_NAME
  JOIN ALL_CONS_COLUMNS pcc
    ON pcc.OWNER = pc.OWNER AND pcc.CONSTRAINT_NAME = pc.CONSTRAINT_NAME AND pcc.POSITION = fcc.POSITION
 WHERE fc.CONSTRAINT_TYPE = 'R' AND fc.OWNER = :owner AND fc.TABLE_NAME = :table_name
 ORDER BY fc.CONSTRAINT_NAME, fcc.POSITION";

const PROCEDURES_SQL: &str = "\
SELECT DISTINCT p.OWNER,
       CASE WHEN p.OBJECT_TYPE = 'PACKAGE' THEN p.OBJECT_NAME END,
       NVL(p.PROCEDURE_NAME, p.OBJECT_NAME),
       CASE WHEN EXISTS (
           SELECT 1 FROM ALL_ARGUMENTS a
            WHERE a.OWNER = p.OWNER AND a.OBJECT_NAME = NVL(p.PROCEDURE_NAME, p.OBJECT_NAME)
              AND NVL(a.PACKAGE_NAME, '-') = CASE WHEN p.OBJECT_TYPE = 'PACKAGE' THEN p.OBJECT_NAME ELSE '-' END
              AND a.POSITION = 0 AND a.DATA_LEVEL = 0) THEN 2 ELSE 1 END
  FROM ALL_PROCEDURES p
 WHERE p.OWNER = :owner AND NVL(p.PROCEDURE_NAME, p.OBJECT_NAME) LIKE :pattern
   AND ((p.OBJECT_TYPE IN ('PROCEDURE', 'FUNCTION') AND p.PROCEDURE_NAME IS NULL)
     OR (p.OBJECT_TYPE = 'PACKAGE' AND p.PROCEDURE_NAME IS NOT NULL))
 ORDER BY 2 NULLS FIRST, 3";

// first overload only, nested attributes of record arguments are skipped
const ARGUMENTS_SQL: &str = "\
SELECT a.ARGUMENT_NAME, a.IN_OUT, a.DATA_TYPE, a.TYPE_OWNER, a.TYPE_NAME, a.DATA_PRECISION,
       a.DATA_LENGTH, a.DATA_SCALE, a.POSITION
  FROM ALL_ARGUMENTS a
 WHERE a.OWNER = :owner AND a.OBJECT_NAME = :name AND NVL(a.PACKAGE_NAME, '-') = :package
   AND a.DATA_LEVEL = 0 AND a.DATA_TYPE IS NOT NULL
   AND NVL(a.OVERLOAD, '0') = (
       SELECT NVL(MIN(o.OVERLOAD), '0') FROM ALL_ARGUMENTS o
        WHERE o.OWNER = a.OWNER AND o.OBJECT_NAME = a.OBJECT_NAME
          AND NVL(o.PACKAGE_NAME, '-') = NVL(a.PACKAGE_NAME, '-'))
 ORDER BY a.POSITION";

/// Catalog of an Oracle session, read from the `ALL_*` dictionary views.
///
/// The owner stands for the schema. Procedures of a package report the
/// package name in the catalog field, and `get_procedure_columns` takes
/// it back the same way.
pub struct OracleMetaData<'c> {
    conn: &'c OracleConnection,
    url: String,
    user: String,
}

impl<'c> OracleMetaData<'c> {
    pub fn new(conn: &'c OracleConnection, url: &str, user: &str) -> Self {
        Self { conn, url: url.to_string(), user: user.to_string() }
    }

    fn owner(&self, schema: Option<&str>) -> Result<String> {
        match schema {
            Some(schema) => Ok(schema.to_string()),
            None => {
                let row = self.conn.query_row("SELECT SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') FROM DUAL", &[])?;
                Ok(row.get::<usize, Option<String>>(0)?.unwrap_or_else(|| self.user.to_uppercase()))
            }
        }
    }

    fn select(&self, sql: &str, params: &[(&str, &dyn ToSql)]) -> Result<Vec<oracle::Row>> {
        let mut rows = Vec::new();
        for row in self.conn.query_named(sql, params)? {
            rows.push(row?);
        }
        Ok(rows)
    }
}

fn text(row: &oracle::Row, index: usize) -> Result<Option<String>> {
    Ok(row.get(index)?)
}

fn int(row: &oracle::Row, index: usize) -> Result<Option<i32>> {
    Ok(row.get(index)?)
}

fn mode_code(position: i32, in_out: Option<&str>) -> i16 {
    if position == 0 {
        return 5;
    }
    match in_out {
        Some("IN") => 1,
        Some("IN/OUT") => 2,
        Some("OUT") => 4,
        _ => 0,
    }
}

/// Type name of an argument. Collection and object types are named by
/// their owner-qualified type, the way the type map keys them.
fn argument_type_name(data_type: &str, type_owner: Option<&str>, type_name: Option<&str>) -> String {
    match (data_type, type_name) {
        ("TABLE" | "VARRAY" | "OBJECT" | "PL/SQL TABLE" | "PL/SQL RECORD", Some(type_name)) => match type_owner {
            Some(owner) => format!("{}.{}", owner, type_name),
            None => type_name.to_string(),
        },
        _ => data_type.to_string(),
    }
}

impl DatabaseMetaData for OracleMetaData<'_> {
    fn database_product_name(&self) -> Result<String> {
        Ok("Oracle".to_string())
    }

    fn database_product_version(&self) -> Result<String> {
        let (version, _) = self.conn.server_version()?;
        Ok(version.to_string())
    }

    fn driver_name(&self) -> Result<String> {
        Ok("oracle".to_string())
    }

    fn url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn user_name(&self) -> Result<String> {
        Ok(self.user.clone())
    }

    fn stores_upper_case_identifiers(&self) -> bool {
        true
    }

    fn get_tables(&self, _catalog: Option<&str>, schema: Option<&str>, table_pattern: Option<&str>, types: &[String]) -> Result<Vec<TableRecord>> {
        let owner = self.owner(schema)?;
        let pattern = table_pattern.unwrap_or("%");
        let mut records = Vec::new();
        for row in self.select(TABLES_SQL, &[("owner", &owner), ("pattern", &pattern)])? {
            let table_type = text(&row, 2)?.unwrap_or_default();
            if !types.is_empty() && !types.iter().any(|t| t.eq_ignore_ascii_case(&table_type)) {
                continue;
            }
            records.push(TableRecord {
                catalog: None,
                schema: text(&row, 0)?,
                name: text(&row, 1)?.unwrap_or_default(),
                table_type,
                remarks: text(&row, 3)?,
            });
        }
        Ok(records)
    }

    fn get_columns(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ColumnRecord>> {
        let owner = self.owner(schema)?;
        self.select(COLUMNS_SQL, &[("owner", &owner), ("table_name", &table)])?.iter().map(|row| {
            let type_name = text(row, 2)?.unwrap_or_default();
            let jdbc_type = jdbc_type_of(&type_name);
            let column_size = if jdbc_type.is_string() {
                int(row, 9)?
            } else if jdbc_type.is_numeric() {
                int(row, 4)?
            } else {
                int(row, 3)?
            };
            Ok(ColumnRecord {
                catalog: None,
                schema: text(row, 0)?,
                table_name: table.to_string(),
                column_name: text(row, 1)?.unwrap_or_default(),
                data_type: jdbc_type.code(),
                type_name,
                column_size,
                decimal_digits: int(row, 5)?,
                nullable: text(row, 6)?.as_deref() != Some("N"),
                remarks: text(row, 10)?,
                column_def: text(row, 7)?.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
                ordinal_position: int(row, 8)?.unwrap_or_default(),
                auto_increment: None,
            })
        }).collect()
    }

    fn get_primary_keys(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyRecord>> {
        let owner = self.owner(schema)?;
        self.select(PRIMARY_KEYS_SQL, &[("owner", &owner), ("table_name", &table)])?.iter().map(|row| {
            Ok(PrimaryKeyRecord {
                table_name: table.to_string(),
                column_name: text(row, 0)?.unwrap_or_default(),
                key_seq: int(row, 1)?.unwrap_or_default(),
                pk_name: text(row, 2)?,
            })
        }).collect()
    }

    fn get_index_info(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str, unique_only: bool) -> Result<Vec<IndexRecord>> {
        let owner = self.owner(schema)?;
        let unique_only = i32::from(unique_only);
        self.select(INDEXES_SQL, &[("owner", &owner), ("table_name", &table), ("unique_only", &unique_only)])?
            .iter()
            .map(|row| {
                Ok(IndexRecord {
                    table_name: table.to_string(),
                    non_unique: text(row, 1)?.as_deref() != Some("UNIQUE"),
                    index_name: text(row, 0)?,
                    index_type: TABLE_INDEX_OTHER,
                    ordinal_position: int(row, 2)?.unwrap_or_default(),
                    column_name: text(row, 3)?,
                    asc_or_desc: text(row, 4)?.map(|d| if d == "DESC" { "D".to_string() } else { "A".to_string() }),
                })
            })
            .collect()
    }

    fn get_imported_keys(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ImportedKeyRecord>> {
        let owner = self.owner(schema)?;
        self.select(IMPORTED_KEYS_SQL, &[("owner", &owner), ("table_name", &table)])?.iter().map(|row| {
            Ok(ImportedKeyRecord {
                pk_table_catalog: None,
                pk_table_schema: text(row, 0)?,
                pk_table_name: text(row, 1)?.unwrap_or_default(),
                pk_column_name: text(row, 2)?.unwrap_or_default(),
                fk_table_name: table.to_string(),
                fk_column_name: text(row, 3)?.unwrap_or_default(),
                key_seq: int(row, 4)?.unwrap_or_default(),
                fk_name: text(row, 5)?,
                key_group: None,
            })
        }).collect()
    }

    fn get_procedures(&self, _catalog: Option<&str>, schema: Option<&str>, procedure_pattern: Option<&str>) -> Result<Vec<ProcedureRecord>> {
        let owner = self.owner(schema)?;
        let pattern = procedure_pattern.unwrap_or("%");
        self.select(PROCEDURES_SQL, &[("owner", &owner), ("pattern", &pattern)])?.iter().map(|row| {
            Ok(ProcedureRecord {
                catalog: text(row, 1)?,
                schema: text(row, 0)?,
                name: text(row, 2)?.unwrap_or_default(),
                procedure_type: row.get::<usize, Option<i16>>(3)?.unwrap_or(1),
                remarks: None,
            })
        }).collect()
    }

    fn get_procedure_columns(&self, catalog: Option<&str>, schema: Option<&str>, procedure: &str) -> Result<Vec<ProcedureColumnRecord>> {
        let owner = self.owner(schema)?;
        let package = catalog.filter(|c| !c.is_empty()).unwrap_or("-");
        let params: [(&str, &dyn ToSql); 3] = [("owner", &owner), ("name", &procedure), ("package", &package)];
        self.select(ARGUMENTS_SQL, &params)?.iter().map(|row| {
            let position = int(row, 8)?.unwrap_or_default();
            let data_type = text(row, 2)?.unwrap_or_default();
            let type_name = argument_type_name(&data_type, text(row, 3)?.as_deref(), text(row, 4)?.as_deref());
            Ok(ProcedureColumnRecord {
                catalog: catalog.filter(|c| !c.is_empty()).map(String::from),
                schema: Some(owner.clone()),
                procedure_name: procedure.to_string(),
                column_name: text(row, 0)?.unwrap_or_default(),
                column_type: mode_code(position, text(row, 1)?.as_deref()),
                data_type: jdbc_type_of(&type_name).code(),
                precision: int(row, 5)?.or(int(row, 6)?),
                scale: int(row, 7)?,
                type_name,
                remarks: None,
            })
        }).collect()
    }
}
