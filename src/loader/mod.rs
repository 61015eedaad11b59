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
//!
//! Loading delimited data files: column metadata, structural bind types and
//! the string processors that turn cell text into typed values.
//!

mod bind_type;
mod delimiter;
mod processor;

pub use bind_type::*;
pub use delimiter::*;
pub use processor::*;

use std::sync::Arc;
use dashmap::DashMap;
use indexmap::IndexMap;
use flute_core::{ColumnMeta, UnifiedSchema};
use crate::comm::ConnectionGuard;
use crate::config::SchemaFilter;
use crate::driver::DataSource;
use crate::errors::Result;
use crate::meta::ColumnExtractor;

/// Columns of one table by lower-case column name.
pub type ColumnMap = IndexMap<String, ColumnMeta>;

/// Column metadata of the tables being loaded. A table is read once through
/// a short-lived connection of its own.
pub struct ColumnMetaCache {
    schema: UnifiedSchema,
    retry: bool,
    cache: DashMap<String, Arc<ColumnMap>>,
}

impl ColumnMetaCache {
    pub fn new(schema: UnifiedSchema) -> Self {
        Self { schema, retry: true, cache: DashMap::new() }
    }

    pub fn set_case_insensitive_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn schema(&self) -> &UnifiedSchema {
        &self.schema
    }

    pub fn get_or_load(&self, data_source: &dyn DataSource, filter: &dyn SchemaFilter, table: &str) -> Result<Arc<ColumnMap>> {
        let key = table.to_lowercase();
        if let Some(columns) = self.cache.get(&key) {
            return Ok(columns.clone());
        }
        let mut guard = ConnectionGuard::new(data_source.get_connection()?);
        let columns = {
            let conn = guard.get_ref()?;
            let meta = conn.meta_data()?;
            ColumnExtractor::new(conn.dbms(), filter, self.retry).get_column_list(meta.as_ref(), &self.schema, table)?
        };
        guard.close();
        tracing::debug!("Column metadata loaded: {} ({} columns)", table, columns.len());
        let columns: ColumnMap = columns.into_iter().map(|c| (c.name.to_lowercase(), c)).collect();
        let columns = Arc::new(columns);
        self.cache.insert(key, columns.clone());
        Ok(columns)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use crate::config::NoFilter;
    use crate::driver::fake::{FakeDataSource, FakeDb, FakeMetaData};
    use crate::driver::{ColumnRecord, Dbms};
    use super::*;

    pub(crate) fn member_data_source() -> FakeDataSource {
        let mut meta = FakeMetaData::new("H2");
        for (position, (name, data_type, type_name)) in [
            ("MEMBER_ID", 4, "INTEGER"),
            ("MEMBER_NAME", 12, "VARCHAR"),
            ("BIRTHDATE", 91, "DATE"),
        ].into_iter().enumerate() {
            meta.columns.push(ColumnRecord {
                schema: Some("PUBLIC".to_string()),
                table_name: "MEMBER".to_string(),
                column_name: name.to_string(),
                data_type,
                type_name: type_name.to_string(),
                nullable: name != "MEMBER_ID",
                ordinal_position: position as i32 + 1,
                ..Default::default()
            });
        }
        let db: Rc<FakeDb> = FakeDb::new();
        FakeDataSource { dbms: Dbms::H2, meta, db }
    }

    #[test]
    fn test_loads_once_on_its_own_connection() {
        let data_source = member_data_source();
        let cache = ColumnMetaCache::new(UnifiedSchema::main(None, Some("PUBLIC")));
        let columns = cache.get_or_load(&data_source, &NoFilter, "member").unwrap();
        assert_eq!(columns.keys().cloned().collect::<Vec<_>>(), vec!["member_id", "member_name", "birthdate"]);
        cache.get_or_load(&data_source, &NoFilter, "MEMBER").unwrap();
        assert_eq!(data_source.db.log().iter().filter(|l| l.as_str() == "get_connection").count(), 1);
        assert_eq!(data_source.db.closed_connections.get(), 1);
    }
}
