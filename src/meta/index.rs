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
use flute_core::{IndexMeta, PrimaryKeyMeta, TableMeta, UniqueKeyMeta};
use crate::driver::DatabaseMetaData;
use crate::errors::Result;
use crate::meta::probe::CaseProbe;
use crate::meta::unique::is_plain_index_row;

pub struct IndexExtractor {
    probe: CaseProbe,
}

impl IndexExtractor {
    pub fn new(retry: bool) -> Self {
        Self { probe: CaseProbe::new(retry) }
    }

    /// Indexes that are neither unique keys nor the primary key index.
    pub fn get_index_map(
        &self,
        meta: &dyn DatabaseMetaData,
        table: &TableMeta,
        pk: &PrimaryKeyMeta,
        unique_keys: &IndexMap<String, UniqueKeyMeta>,
    ) -> Result<IndexMap<String, IndexMeta>> {
        let mut indexes: IndexMap<String, IndexMeta> = IndexMap::new();
        if table.is_view() {
            return Ok(indexes);
        }
        let schema = &table.schema;
        let records = self.probe
            .probe(&table.name, |name| meta.get_index_info(schema.pure_catalog(), schema.pure_schema(), name, false))
            .into_rows()?;
        for record in records {
            if !is_plain_index_row(&record) {
                continue;
            }
            let (index_name, column_name) = match (record.index_name, record.column_name) {
                (Some(index_name), Some(column_name)) => (index_name, column_name),
                _ => continue,
            };
            if unique_keys.keys().any(|k| k.eq_ignore_ascii_case(&index_name)) {
                continue;
            }
            if pk.name.as_deref().map(|n| n.eq_ignore_ascii_case(&index_name)).unwrap_or(false) {
                continue;
            }
            let index = indexes
                .entry(index_name.clone())
                .or_insert_with(|| IndexMeta::new(&index_name, record.non_unique, record.index_type));
            index.columns.insert(record.ordinal_position, column_name);
            if let Some(order) = record.asc_or_desc {
                index.sort_orders.insert(record.ordinal_position, order);
            }
        }
        // a unique index over exactly the primary key columns is the key itself
        indexes.retain(|_, index| index.non_unique || index.column_names() != pk.column_names());
        Ok(indexes)
    }
}
