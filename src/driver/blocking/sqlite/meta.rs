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

use rusqlite::Connection;
use crate::driver::blocking::{declared_size, jdbc_type_of};
use crate::driver::{
    ColumnRecord, DatabaseMetaData, ImportedKeyRecord, IndexRecord, PrimaryKeyRecord, ProcedureColumnRecord,
    ProcedureRecord, TableRecord, TABLE_INDEX_OTHER,
};
use crate::errors::Result;

/// Catalog of a SQLite connection, read from `sqlite_master` and the
/// table-valued PRAGMA functions.
pub struct SqliteMetaData<'c> {
    conn: &'c Connection,
    url: String,
}

struct TableInfo {
    name: String,
    type_name: String,
    not_null: bool,
    default_value: Option<String>,
    pk: i32,
    cid: i32,
}

impl<'c> SqliteMetaData<'c> {
    pub fn new(conn: &'c Connection, url: &str) -> Self {
        Self { conn, url: url.to_string() }
    }

    fn table_info(&self, table: &str) -> Result<Vec<TableInfo>> {
        let mut statement = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = statement.query_map([table], |r| {
            Ok(TableInfo {
                cid: r.get(0)?,
                name: r.get(1)?,
                type_name: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                not_null: r.get::<_, i32>(3)? != 0,
                default_value: r.get(4)?,
                pk: r.get(5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut info: Vec<TableInfo> = self.table_info(table)?.into_iter().filter(|c| c.pk > 0).collect();
        info.sort_by_key(|c| c.pk);
        Ok(info.into_iter().map(|c| c.name).collect())
    }
}

impl DatabaseMetaData for SqliteMetaData<'_> {
    fn database_product_name(&self) -> Result<String> {
        Ok("SQLite".to_string())
    }

    fn database_product_version(&self) -> Result<String> {
        Ok(self.conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?)
    }

    fn driver_name(&self) -> Result<String> {
        Ok("rusqlite".to_string())
    }

    fn url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn user_name(&self) -> Result<String> {
        Ok(String::new())
    }

    fn get_tables(&self, _catalog: Option<&str>, _schema: Option<&str>, table_pattern: Option<&str>, types: &[String]) -> Result<Vec<TableRecord>> {
        let mut statement = self.conn.prepare(
            "SELECT name, type FROM sqlite_master WHERE type IN ('table', 'view') AND name LIKE ?1 ORDER BY name",
        )?;
        let rows = statement.query_map([table_pattern.unwrap_or("%")], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (name, kind) = row?;
            let table_type = kind.to_uppercase();
            if !types.is_empty() && !types.iter().any(|t| t.eq_ignore_ascii_case(&table_type)) {
                continue;
            }
            records.push(TableRecord { name, table_type, ..Default::default() });
        }
        Ok(records)
    }

    fn get_columns(&self, _catalog: Option<&str>, _schema: Option<&str>, table: &str) -> Result<Vec<ColumnRecord>> {
        let info = self.table_info(table)?;
        let pk_count = info.iter().filter(|c| c.pk > 0).count();
        let records = info.into_iter().map(|c| {
            let (column_size, decimal_digits) = declared_size(&c.type_name);
            let base_type = c.type_name.split('(').next().unwrap_or_default().trim().to_uppercase();
            // a single INTEGER key is the rowid alias
            let rowid = pk_count == 1 && c.pk == 1 && base_type == "INTEGER";
            ColumnRecord {
                table_name: table.to_string(),
                column_name: c.name,
                data_type: jdbc_type_of(&base_type).code(),
                type_name: base_type,
                column_size,
                decimal_digits,
                nullable: !c.not_null,
                column_def: c.default_value,
                ordinal_position: c.cid + 1,
                auto_increment: Some(rowid),
                ..Default::default()
            }
        }).collect();
        Ok(records)
    }

    fn get_primary_keys(&self, _catalog: Option<&str>, _schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyRecord>> {
        let columns = self.primary_key_columns(table)?;
        Ok(columns.into_iter().enumerate().map(|(i, column_name)| PrimaryKeyRecord {
            table_name: table.to_string(),
            column_name,
            key_seq: i as i32 + 1,
            pk_name: None,
        }).collect())
    }

    fn get_index_info(&self, _catalog: Option<&str>, _schema: Option<&str>, table: &str, unique_only: bool) -> Result<Vec<IndexRecord>> {
        let mut list = self.conn.prepare("SELECT name, \"unique\" FROM pragma_index_list(?1) ORDER BY name")?;
        let indexes = list.query_map([table], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i32>(1)? != 0)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut xinfo = self.conn.prepare(
            "SELECT seqno, name, \"desc\" FROM pragma_index_xinfo(?1) WHERE \"key\" = 1 ORDER BY seqno",
        )?;
        let mut records = Vec::new();
        for (index_name, unique) in indexes {
            if unique_only && !unique {
                continue;
            }
            let columns = xinfo.query_map([index_name.as_str()], |r| {
                Ok((r.get::<_, i32>(0)?, r.get::<_, Option<String>>(1)?, r.get::<_, i32>(2)? != 0))
            })?;
            for column in columns {
                let (seqno, column_name, desc) = column?;
                records.push(IndexRecord {
                    table_name: table.to_string(),
                    non_unique: !unique,
                    index_name: Some(index_name.clone()),
                    index_type: TABLE_INDEX_OTHER,
                    ordinal_position: seqno + 1,
                    column_name,
                    asc_or_desc: Some(if desc { "D" } else { "A" }.to_string()),
                });
            }
        }
        Ok(records)
    }

    fn get_imported_keys(&self, _catalog: Option<&str>, _schema: Option<&str>, table: &str) -> Result<Vec<ImportedKeyRecord>> {
        let mut statement = self.conn.prepare(
            "SELECT id, seq, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let rows = statement.query_map([table], |r| {
            Ok((
                r.get::<_, i32>(0)?,
                r.get::<_, i32>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, Option<String>>(4)?,
            ))
        })?.collect::<std::result::Result<Vec<_>, _>>()?;
        let mut records = Vec::new();
        for (id, seq, pk_table, from, to) in rows {
            // an omitted parent column refers to the parent primary key
            let pk_column = match to {
                Some(to) => to,
                None => self.primary_key_columns(&pk_table)?.get(seq as usize).cloned().unwrap_or_default(),
            };
            records.push(ImportedKeyRecord {
                pk_table_name: pk_table,
                pk_column_name: pk_column,
                fk_table_name: table.to_string(),
                fk_column_name: from,
                key_seq: seq + 1,
                key_group: Some(id),
                ..Default::default()
            });
        }
        Ok(records)
    }

    fn get_procedures(&self, _catalog: Option<&str>, _schema: Option<&str>, _procedure_pattern: Option<&str>) -> Result<Vec<ProcedureRecord>> {
        Ok(Vec::new())
    }

    fn get_procedure_columns(&self, _catalog: Option<&str>, _schema: Option<&str>, _procedure: &str) -> Result<Vec<ProcedureColumnRecord>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use flute_core::JdbcType;
    use super::*;

    fn member_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE MEMBER_STATUS (STATUS_CODE CHAR(3) PRIMARY KEY, STATUS_NAME VARCHAR(50) NOT NULL UNIQUE);
             CREATE TABLE MEMBER (
                 MEMBER_ID INTEGER PRIMARY KEY AUTOINCREMENT,
                 MEMBER_NAME VARCHAR(180) NOT NULL,
                 STATUS_CODE CHAR(3) REFERENCES MEMBER_STATUS,
                 PRICE DECIMAL(10, 2) DEFAULT 0
             );
             CREATE INDEX IX_MEMBER_NAME ON MEMBER (MEMBER_NAME DESC);
             CREATE VIEW V_MEMBER AS SELECT MEMBER_ID FROM MEMBER;",
        ).unwrap();
        conn
    }

    #[test]
    fn test_tables_and_columns() {
        let conn = member_db();
        let meta = SqliteMetaData::new(&conn, "sqlite::memory:");
        let tables = meta.get_tables(None, None, None, &["TABLE".to_string()]).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["MEMBER", "MEMBER_STATUS", "sqlite_sequence"]);
        let views = meta.get_tables(None, None, None, &["VIEW".to_string()]).unwrap();
        assert_eq!(views[0].name, "V_MEMBER");

        let columns = meta.get_columns(None, None, "MEMBER").unwrap();
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[0].auto_increment, Some(true));
        assert_eq!(columns[1].data_type, JdbcType::Varchar.code());
        assert_eq!(columns[1].column_size, Some(180));
        assert!(!columns[1].nullable);
        assert_eq!(columns[3].decimal_digits, Some(2));
        assert_eq!(columns[3].column_def.as_deref(), Some("0"));
    }

    #[test]
    fn test_keys_and_indexes() {
        let conn = member_db();
        let meta = SqliteMetaData::new(&conn, "sqlite::memory:");
        let pk = meta.get_primary_keys(None, None, "MEMBER").unwrap();
        assert_eq!(pk[0].column_name, "MEMBER_ID");

        let fks = meta.get_imported_keys(None, None, "MEMBER").unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].pk_table_name, "MEMBER_STATUS");
        assert_eq!(fks[0].pk_column_name, "STATUS_CODE");

        let indexes = meta.get_index_info(None, None, "MEMBER", false).unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].index_name.as_deref(), Some("IX_MEMBER_NAME"));
        assert_eq!(indexes[0].asc_or_desc.as_deref(), Some("D"));
        assert!(meta.get_index_info(None, None, "MEMBER", true).unwrap().is_empty());

        let uniques = meta.get_index_info(None, None, "MEMBER_STATUS", true).unwrap();
        assert!(uniques.iter().any(|i| i.column_name.as_deref() == Some("STATUS_NAME")));
    }
}
