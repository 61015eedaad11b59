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
use postgres::types::ToSql;
use crate::driver::blocking::{declared_size, jdbc_type_of};
use crate::driver::{
    ColumnRecord, DatabaseMetaData, ImportedKeyRecord, IndexRecord, PrimaryKeyRecord, ProcedureColumnRecord,
    ProcedureRecord, TableRecord, TABLE_INDEX_OTHER,
};
use crate::errors::Result;
use super::PostgresConnection;

const TABLES_SQL: &str = "\
SELECT n.nspname::text, c.relname::text,
       CASE c.relkind WHEN 'r' THEN 'TABLE' WHEN 'p' THEN 'TABLE' WHEN 'v' THEN 'VIEW'
                      WHEN 'm' THEN 'MATERIALIZED VIEW' ELSE 'FOREIGN TABLE' END,
       obj_description(c.oid, 'pg_class')::text
  FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace
 WHERE n.nspname = $1 AND c.relname LIKE $2 AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
 ORDER BY c.relname";

const COLUMNS_SQL: &str = "\
SELECT n.nspname::text, a.attname::text, t.typname::text, format_type(a.atttypid, a.atttypmod)::text,
       a.attnotnull, pg_get_expr(d.adbin, d.adrelid)::text, a.attnum::int4,
       col_description(c.oid, a.attnum)::text, (a.attidentity <> '')
  FROM pg_attribute a
  JOIN pg_class c ON c.oid = a.attrelid
  JOIN pg_namespace n ON n.oid = c.relnamespace
  JOIN pg_type t ON t.oid = a.atttypid
  LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
 WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
 ORDER BY a.attnum";

const PRIMARY_KEYS_SQL: &str = "\
SELECT a.attname::text, k.ord::int4, con.conname::text
  FROM pg_constraint con
  JOIN pg_class c ON c.oid = con.conrelid
  JOIN pg_namespace n ON n.oid = c.relnamespace
 CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
  JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
 WHERE con.contype = 'p' AND n.nspname = $1 AND c.relname = $2
 ORDER BY k.ord";

const INDEXES_SQL: &str = "\
SELECT i.relname::text, NOT ix.indisunique, k.ord::int4, pg_get_indexdef(ix.indexrelid, k.ord, false)::text,
       CASE WHEN (ix.indoption[k.ord - 1] & 1) = 1 THEN 'D' ELSE 'A' END
  FROM pg_index ix
  JOIN pg_class c ON c.oid = ix.indrelid
  JOIN pg_namespace n ON n.oid = c.relnamespace
  JOIN pg_class i ON i.oid = ix.indexrelid
 CROSS JOIN LATERAL generate_series(1, ix.indnatts::int4) AS k(ord)
 WHERE n.nspname = $1 AND c.relname = $2 AND (ix.indisunique OR NOT $3)
 ORDER BY NOT ix.indisunique, i.relname, k.ord";

const IMPORTED_KEYS_SQL: &str = "\
SELECT pns.nspname::text, pc.relname::text, pa.attname::text, fa.attname::text, k.ord::int4, con.conname::text
  FROM pg_constraint con
  JOIN pg_class fc ON fc.oid = con.conrelid
  JOIN pg_namespace fns ON fns.oid = fc.relnamespace
  JOIN pg_class pc ON pc.oid = con.confrelid
  JOIN pg_namespace pns ON pns.oid = pc.relnamespace
 CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(fk_attnum, pk_attnum, ord)
  JOIN pg_attribute fa ON fa.attrelid = fc.oid AND fa.attnum = k.fk_attnum
  JOIN pg_attribute pa ON pa.attrelid = pc.oid AND pa.attnum = k.pk_attnum
 WHERE con.contype = 'f' AND fns.nspname = $1 AND fc.relname = $2
 ORDER BY con.conname, k.ord";

const PROCEDURES_SQL: &str = "\
SELECT n.nspname::text, p.proname::text,
       CASE WHEN p.proretset OR p.prorettype <> 'void'::regtype THEN 2 ELSE 1 END::int2,
       obj_description(p.oid, 'pg_proc')::text
  FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace
 WHERE n.nspname = $1 AND p.proname LIKE $2 AND p.prokind IN ('f', 'p')
 ORDER BY p.proname";

const ROUTINE_SQL: &str = "\
SELECT r.specific_name::text, r.data_type::text, r.type_udt_name::text
  FROM information_schema.routines r
 WHERE r.routine_schema = $1 AND r.routine_name = $2
 ORDER BY r.specific_name";

const PARAMETERS_SQL: &str = "\
SELECT pa.parameter_name::text, pa.parameter_mode::text, pa.udt_name::text,
       pa.numeric_precision::int4, pa.character_maximum_length::int4, pa.numeric_scale::int4
  FROM information_schema.parameters pa
 WHERE pa.specific_schema = $1 AND pa.specific_name = $2
 ORDER BY pa.ordinal_position";

/// Catalog of a PostgreSQL connection, read from `pg_catalog` and
/// `information_schema`. Names are compared as stored, unquoted
/// identifiers are stored in lower case.
pub struct PostgresMetaData<'c> {
    client: &'c RefCell<PostgresConnection>,
    url: String,
    user: String,
}

fn mode_code(mode: Option<&str>) -> i16 {
    match mode {
        Some("IN") => 1,
        Some("INOUT") => 2,
        Some("OUT") => 4,
        _ => 0,
    }
}

impl<'c> PostgresMetaData<'c> {
    pub fn new(client: &'c RefCell<PostgresConnection>, url: &str, user: &str) -> Self {
        Self { client, url: url.to_string(), user: user.to_string() }
    }

    fn select(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<postgres::Row>> {
        Ok(self.client.borrow_mut().query(sql, params)?)
    }

    fn schema(&self, schema: Option<&str>) -> Result<String> {
        match schema {
            Some(schema) => Ok(schema.to_string()),
            None => {
                let row = self.client.borrow_mut().query_one("SELECT current_schema()::text", &[])?;
                Ok(row.try_get::<_, Option<String>>(0)?.unwrap_or_else(|| "public".to_string()))
            }
        }
    }
}

fn text(row: &postgres::Row, index: usize) -> Result<Option<String>> {
    Ok(row.try_get(index)?)
}

fn int(row: &postgres::Row, index: usize) -> Result<Option<i32>> {
    Ok(row.try_get(index)?)
}

impl DatabaseMetaData for PostgresMetaData<'_> {
    fn database_product_name(&self) -> Result<String> {
        Ok("PostgreSQL".to_string())
    }

    fn database_product_version(&self) -> Result<String> {
        let row = self.client.borrow_mut().query_one("SHOW server_version", &[])?;
        Ok(row.try_get(0)?)
    }

    fn driver_name(&self) -> Result<String> {
        Ok("postgres".to_string())
    }

    fn url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn user_name(&self) -> Result<String> {
        Ok(self.user.clone())
    }

    fn stores_lower_case_identifiers(&self) -> bool {
        true
    }

    fn get_tables(&self, _catalog: Option<&str>, schema: Option<&str>, table_pattern: Option<&str>, types: &[String]) -> Result<Vec<TableRecord>> {
        let schema = self.schema(schema)?;
        let pattern = table_pattern.unwrap_or("%");
        let mut records = Vec::new();
        for row in self.select(TABLES_SQL, &[&schema, &pattern])? {
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
        let schema = self.schema(schema)?;
        let mut records = Vec::new();
        for row in self.select(COLUMNS_SQL, &[&schema, &table])? {
            let default_value = text(&row, 5)?;
            let serial = default_value.as_deref().map(|d| d.starts_with("nextval(")).unwrap_or(false);
            let identity: bool = row.try_get(8)?;
            let mut type_name = text(&row, 2)?.unwrap_or_default();
            if serial {
                type_name = match type_name.as_str() {
                    "int8" => "bigserial".to_string(),
                    "int2" => "smallserial".to_string(),
                    _ => "serial".to_string(),
                };
            }
            let (column_size, decimal_digits) = declared_size(&text(&row, 3)?.unwrap_or_default());
            let not_null: bool = row.try_get(4)?;
            records.push(ColumnRecord {
                catalog: None,
                schema: text(&row, 0)?,
                table_name: table.to_string(),
                column_name: text(&row, 1)?.unwrap_or_default(),
                data_type: jdbc_type_of(&type_name).code(),
                type_name,
                column_size,
                decimal_digits,
                nullable: !not_null,
                remarks: text(&row, 7)?,
                column_def: default_value,
                ordinal_position: int(&row, 6)?.unwrap_or_default(),
                auto_increment: Some(serial || identity),
            });
        }
        Ok(records)
    }

    fn get_primary_keys(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyRecord>> {
        let schema = self.schema(schema)?;
        self.select(PRIMARY_KEYS_SQL, &[&schema, &table])?.iter().map(|row| {
            Ok(PrimaryKeyRecord {
                table_name: table.to_string(),
                column_name: text(row, 0)?.unwrap_or_default(),
                key_seq: int(row, 1)?.unwrap_or_default(),
                pk_name: text(row, 2)?,
            })
        }).collect()
    }

    fn get_index_info(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str, unique_only: bool) -> Result<Vec<IndexRecord>> {
        let schema = self.schema(schema)?;
        self.select(INDEXES_SQL, &[&schema, &table, &unique_only])?.iter().map(|row| {
            Ok(IndexRecord {
                table_name: table.to_string(),
                non_unique: row.try_get(1)?,
                index_name: text(row, 0)?,
                index_type: TABLE_INDEX_OTHER,
                ordinal_position: int(row, 2)?.unwrap_or_default(),
                column_name: text(row, 3)?,
                asc_or_desc: text(row, 4)?,
            })
        }).collect()
    }

    fn get_imported_keys(&self, _catalog: Option<&str>, schema: Option<&str>, table: &str) -> Result<Vec<ImportedKeyRecord>> {
        let schema = self.schema(schema)?;
        self.select(IMPORTED_KEYS_SQL, &[&schema, &table])?.iter().map(|row| {
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
        let schema = self.schema(schema)?;
        let pattern = procedure_pattern.unwrap_or("%");
        self.select(PROCEDURES_SQL, &[&schema, &pattern])?.iter().map(|row| {
            Ok(ProcedureRecord {
                catalog: None,
                schema: text(row, 0)?,
                name: text(row, 1)?.unwrap_or_default(),
                procedure_type: row.try_get(2)?,
                remarks: text(row, 3)?,
            })
        }).collect()
    }

    /// Columns of the first overload. A scalar return is reported first as
    /// `returnValue`, OUT and TABLE columns as OUT parameters.
    fn get_procedure_columns(&self, _catalog: Option<&str>, schema: Option<&str>, procedure: &str) -> Result<Vec<ProcedureColumnRecord>> {
        let schema = self.schema(schema)?;
        let routines = self.select(ROUTINE_SQL, &[&schema, &procedure])?;
        let routine = match routines.first() {
            Some(routine) => routine,
            None => return Ok(Vec::new()),
        };
        let specific_name = text(routine, 0)?.unwrap_or_default();
        let return_type = text(routine, 1)?.unwrap_or_default();
        let return_udt = text(routine, 2)?.unwrap_or_default();

        let column = |name: String, column_type: i16, type_name: String, precision, scale| ProcedureColumnRecord {
            catalog: None,
            schema: Some(schema.clone()),
            procedure_name: procedure.to_string(),
            column_name: name,
            column_type,
            data_type: jdbc_type_of(&type_name).code(),
            type_name,
            precision,
            scale,
            remarks: None,
        };

        let mut parameters = Vec::new();
        for (i, row) in self.select(PARAMETERS_SQL, &[&schema, &specific_name])?.iter().enumerate() {
            let name = text(row, 0)?.unwrap_or_else(|| format!("${}", i + 1));
            let precision = int(row, 3)?.or(int(row, 4)?);
            parameters.push(column(name, mode_code(text(row, 1)?.as_deref()), text(row, 2)?.unwrap_or_default(), precision, int(row, 5)?));
        }
        let has_outs = parameters.iter().any(|p| p.column_type == 2 || p.column_type == 4);
        if return_type != "void" && return_udt != "record" && !has_outs {
            parameters.insert(0, column("returnValue".to_string(), 5, return_udt, None, None));
        }
        Ok(parameters)
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
        assert_eq!(mode_code(None), 0);
    }
}
