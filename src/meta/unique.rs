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
use flute_core::{PrimaryKeyMeta, TableMeta, UniqueKeyMeta};
use crate::driver::{DatabaseMetaData, IndexRecord, TABLE_INDEX_STATISTIC};
use crate::errors::Result;
use crate::meta::probe::CaseProbe;

/// Expression columns of function based indexes, which no key can use.
pub(crate) fn is_function_column(column: &str) -> bool {
    column.contains('(') || column.contains('"') || column.to_uppercase().starts_with("SYS_NC")
}

/// Index rows that describe a real column of a named index.
pub(crate) fn is_plain_index_row(record: &IndexRecord) -> bool {
    if record.index_type == TABLE_INDEX_STATISTIC {
        return false;
    }
    match (&record.index_name, &record.column_name) {
        (Some(name), Some(column)) => !name.trim().is_empty() && !is_function_column(column),
        _ => false,
    }
}

pub struct UniqueKeyExtractor {
    probe: CaseProbe,
}

impl UniqueKeyExtractor {
    pub fn new(retry: bool) -> Self {
        Self { probe: CaseProbe::new(retry) }
    }

    /// Primary key of the table, empty for views and key-less tables.
    pub fn get_primary_key(&self, meta: &dyn DatabaseMetaData, table: &TableMeta) -> Result<PrimaryKeyMeta> {
        let mut pk = PrimaryKeyMeta::default();
        if table.is_view() {
            return Ok(pk);
        }
        let schema = &table.schema;
        let records = self.probe
            .probe(&table.name, |name| meta.get_primary_keys(schema.pure_catalog(), schema.pure_schema(), name))
            .into_rows()?;
        for record in records {
            if pk.name.is_none() {
                pk.name = record.pk_name.clone();
            }
            pk.columns.insert(record.key_seq, record.column_name);
        }
        Ok(pk)
    }

    /// Unique constraints by name. Primary key columns never appear here.
    ///
    /// A composite key that overlaps the primary key is reported with the
    /// remaining columns only. That column subset is not itself enforced
    /// as unique by the database.
    pub fn get_unique_key_map(&self, meta: &dyn DatabaseMetaData, table: &TableMeta, pk: &PrimaryKeyMeta) -> Result<IndexMap<String, UniqueKeyMeta>> {
        let mut unique_keys: IndexMap<String, UniqueKeyMeta> = IndexMap::new();
        if table.is_view() {
            return Ok(unique_keys);
        }
        let schema = &table.schema;
        let records = self.probe
            .probe(&table.name, |name| meta.get_index_info(schema.pure_catalog(), schema.pure_schema(), name, true))
            .into_rows()?;
        for record in records {
            if record.non_unique || !is_plain_index_row(&record) {
                continue;
            }
            let (index_name, column_name) = match (record.index_name, record.column_name) {
                (Some(index_name), Some(column_name)) => (index_name, column_name),
                _ => continue,
            };
            if pk.contains_column(&column_name) {
                continue;
            }
            unique_keys
                .entry(index_name.clone())
                .or_insert_with(|| UniqueKeyMeta::new(&index_name))
                .columns
                .insert(record.ordinal_position, column_name);
        }
        unique_keys.retain(|_, uk| !uk.columns.is_empty());
        Ok(unique_keys)
    }
}

#[cfg(test)]
mod tests {
    use flute_core::{TableType, UnifiedSchema};
    use crate::driver::fake::FakeMetaData;
    use crate::driver::{PrimaryKeyRecord, TABLE_INDEX_OTHER};
    use super::*;

    fn table(name: &str, table_type: TableType) -> TableMeta {
        TableMeta::new(UnifiedSchema::main(None, Some("EXAMPLEDB")), name, table_type)
    }

    fn pk_record(table: &str, column: &str, seq: i32) -> PrimaryKeyRecord {
        PrimaryKeyRecord {
            table_name: table.to_string(),
            column_name: column.to_string(),
            key_seq: seq,
            pk_name: Some(format!("PK_{}", table)),
        }
    }

    fn unique_row(index: &str, column: Option<&str>, position: i32, index_type: i16) -> IndexRecord {
        IndexRecord {
            table_name: "PURCHASE".to_string(),
            non_unique: false,
            index_name: Some(index.to_string()),
            index_type,
            ordinal_position: position,
            column_name: column.map(ToString::to_string),
            asc_or_desc: Some("A".to_string()),
        }
    }

    #[test]
    fn test_primary_key_tries_exact_lower_upper() {
        let mut meta = FakeMetaData::new("H2");
        meta.case_sensitive = true;
        meta.primary_keys = vec![pk_record("PURCHASE", "PRODUCT_ID", 2), pk_record("PURCHASE", "MEMBER_ID", 1)];
        let extractor = UniqueKeyExtractor::new(true);
        let pk = extractor.get_primary_key(&meta, &table("Purchase", TableType::Table)).unwrap();
        assert_eq!(pk.column_names(), vec!["MEMBER_ID", "PRODUCT_ID"]);
        assert_eq!(pk.name.as_deref(), Some("PK_PURCHASE"));
        assert_eq!(
            meta.calls(),
            vec!["get_primary_keys:Purchase", "get_primary_keys:purchase", "get_primary_keys:PURCHASE"]
        );
    }

    #[test]
    fn test_primary_key_stops_at_first_hit() {
        let mut meta = FakeMetaData::new("H2");
        meta.case_sensitive = true;
        meta.primary_keys = vec![pk_record("purchase", "member_id", 1)];
        let extractor = UniqueKeyExtractor::new(true);
        extractor.get_primary_key(&meta, &table("Purchase", TableType::Table)).unwrap();
        assert_eq!(meta.calls(), vec!["get_primary_keys:Purchase", "get_primary_keys:purchase"]);
    }

    #[test]
    fn test_view_has_no_keys() {
        let meta = FakeMetaData::new("H2");
        let extractor = UniqueKeyExtractor::new(true);
        let view = table("SUMMARY", TableType::View);
        assert!(extractor.get_primary_key(&meta, &view).unwrap().is_empty());
        assert!(meta.calls().is_empty());
    }

    #[test]
    fn test_unique_keys_never_include_pk_columns() {
        let mut meta = FakeMetaData::new("H2");
        meta.primary_keys = vec![pk_record("PURCHASE", "PURCHASE_ID", 1)];
        meta.indexes = vec![
            unique_row("PK_PURCHASE", Some("PURCHASE_ID"), 1, TABLE_INDEX_OTHER),
            unique_row("UQ_PURCHASE", Some("MEMBER_ID"), 1, TABLE_INDEX_OTHER),
            unique_row("UQ_PURCHASE", Some("PURCHASE_DATETIME"), 2, TABLE_INDEX_OTHER),
            unique_row("UQ_PURCHASE", Some("PURCHASE_ID"), 3, TABLE_INDEX_OTHER),
            unique_row("UQ_FUNC", Some("UPPER(\"NAME\")"), 1, TABLE_INDEX_OTHER),
            unique_row("STAT", None, 0, TABLE_INDEX_STATISTIC),
        ];
        let extractor = UniqueKeyExtractor::new(true);
        let purchase = table("PURCHASE", TableType::Table);
        let pk = extractor.get_primary_key(&meta, &purchase).unwrap();
        let unique_keys = extractor.get_unique_key_map(&meta, &purchase, &pk).unwrap();
        assert_eq!(unique_keys.len(), 1);
        let uq = &unique_keys["UQ_PURCHASE"];
        assert_eq!(uq.column_names(), vec!["MEMBER_ID", "PURCHASE_DATETIME"]);
        for uk in unique_keys.values() {
            for column in uk.column_names() {
                assert!(!pk.contains_column(&column));
            }
        }
    }
}
