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
//! Schema metadata extraction over [`DatabaseMetaData`].
//!
//! Each extractor owns one concern. Lookups by table name go through the
//! [`CaseProbe`], which tries the name as given, then in lower case, then in
//! upper case, since drivers disagree on the case they store.

mod column;
mod foreign;
mod index;
mod oracle_type;
mod probe;
mod procedure;
mod synonym;
mod table;
mod unique;

pub use column::*;
pub use foreign::*;
pub use index::*;
pub use oracle_type::*;
pub use probe::*;
pub use procedure::*;
pub use synonym::*;
pub use table::*;
pub use unique::*;

use flute_core::{FluteValue, Rows, TableMeta};
use crate::comm::StatementGuard;
use crate::config::SchemaFilter;
use crate::driver::{DatabaseMetaData, DbConnection, Dbms};
use crate::errors::Result;

/// Runs a query and closes its statement on every path.
pub(crate) fn query_rows(conn: &dyn DbConnection, sql: &str, params: &[FluteValue]) -> Result<Rows> {
    let mut guard = StatementGuard::new(conn.prepare_statement(sql)?);
    let statement = guard.get()?;
    for (i, param) in params.iter().enumerate() {
        statement.set_value(i + 1, param)?;
    }
    let rows = statement.execute_query()?;
    guard.close();
    Ok(rows)
}

/// Fills columns, keys and indexes of a table through the metadata.
pub fn extract_table_detail(
    dbms: Dbms,
    filter: &dyn SchemaFilter,
    retry: bool,
    meta: &dyn DatabaseMetaData,
    table: &mut TableMeta,
) -> Result<()> {
    table.columns = ColumnExtractor::new(dbms, filter, retry).get_column_list(meta, &table.schema, &table.name)?;
    let unique_extractor = UniqueKeyExtractor::new(retry);
    let pk = unique_extractor.get_primary_key(meta, table)?;
    table.unique_keys = unique_extractor.get_unique_key_map(meta, table, &pk)?;
    table.indexes = IndexExtractor::new(retry).get_index_map(meta, table, &pk, &table.unique_keys)?;
    table.foreign_keys = ForeignKeyExtractor::new(filter, retry).get_foreign_key_map(meta, table)?;
    apply_primary_key(table, pk);
    Ok(())
}

/// Stores the key and flags its columns.
pub(crate) fn apply_primary_key(table: &mut TableMeta, pk: flute_core::PrimaryKeyMeta) {
    for column in table.columns.iter_mut() {
        if pk.contains_column(&column.name) {
            column.primary_key = true;
            column.pk_name = pk.name.clone();
        }
    }
    table.primary_key = if pk.is_empty() { None } else { Some(pk) };
}
