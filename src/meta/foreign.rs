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
use flute_core::{ForeignKeyMeta, TableMeta, UnifiedSchema};
use crate::config::SchemaFilter;
use crate::driver::DatabaseMetaData;
use crate::errors::Result;
use crate::meta::probe::CaseProbe;

pub struct ForeignKeyExtractor<'a> {
    filter: &'a dyn SchemaFilter,
    probe: CaseProbe,
}

impl<'a> ForeignKeyExtractor<'a> {
    pub fn new(filter: &'a dyn SchemaFilter, retry: bool) -> Self {
        Self { filter, probe: CaseProbe::new(retry) }
    }

    /// Foreign keys of the table by constraint name.
    ///
    /// Keys to excepted tables and keys with the same structure as an
    /// earlier one are dropped.
    pub fn get_foreign_key_map(&self, meta: &dyn DatabaseMetaData, table: &TableMeta) -> Result<IndexMap<String, ForeignKeyMeta>> {
        let mut foreign_keys: IndexMap<String, ForeignKeyMeta> = IndexMap::new();
        let schema = &table.schema;
        let mut records = self.probe
            .probe(&table.name, |name| meta.get_imported_keys(schema.pure_catalog(), schema.pure_schema(), name))
            .into_rows()?;
        records.sort_by(|a, b| {
            a.fk_name.cmp(&b.fk_name)
                .then_with(|| a.key_group.cmp(&b.key_group))
                .then_with(|| a.pk_table_name.cmp(&b.pk_table_name))
                .then_with(|| a.key_seq.cmp(&b.key_seq))
        });

        let mut generated = 0;
        let mut current: Option<String> = None;
        let mut current_group: Option<i32> = None;
        for record in records {
            let foreign_schema = {
                let owner = UnifiedSchema::new(record.pk_table_catalog.as_deref(), record.pk_table_schema.as_deref());
                if owner == *schema || (owner.pure_catalog().is_none() && owner.pure_schema().is_none()) {
                    schema.clone()
                } else {
                    owner.with_sign(flute_core::SchemaSign::Unknown)
                }
            };
            if self.filter.is_table_except(&foreign_schema, &record.pk_table_name) {
                tracing::debug!("Except foreign key to {}: {}", record.pk_table_name, record.fk_name.as_deref().unwrap_or("(no name)"));
                continue;
            }
            let name = match &record.fk_name {
                Some(name) if !name.trim().is_empty() => name.clone(),
                _ => {
                    // without a driver key id, unnamed keys start over at the first column
                    let starts = match record.key_group {
                        Some(group) => current.is_none() || current_group != Some(group),
                        None => record.key_seq <= 1 || current.is_none(),
                    };
                    if starts {
                        generated += 1;
                        current_group = record.key_group;
                        current = Some(format!("FK_{}_{}_{}", table.name, record.pk_table_name, generated).to_uppercase());
                    }
                    current.clone().unwrap_or_default()
                }
            };
            let fk = foreign_keys.entry(name.clone()).or_insert_with(|| ForeignKeyMeta {
                name,
                local_schema: schema.clone(),
                local_table: table.name.clone(),
                foreign_schema,
                foreign_table: record.pk_table_name.clone(),
                column_pairs: IndexMap::new(),
            });
            fk.column_pairs.insert(record.fk_column_name, record.pk_column_name);
        }

        let mut unique: IndexMap<String, ForeignKeyMeta> = IndexMap::new();
        for (name, fk) in foreign_keys {
            if unique.values().any(|existing| existing.same_structure(&fk)) {
                tracing::debug!("Skip same structure foreign key: {}", name);
                continue;
            }
            unique.insert(name, fk);
        }
        Ok(unique)
    }
}
