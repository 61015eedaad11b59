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
use std::path::{Path, PathBuf};
use csv::ReaderBuilder;
use flute_core::ColumnMeta;
use crate::behavior::BindValue;
use crate::binding::{BindLocation, BindTarget, ParameterBinder};
use crate::capability::SqlFileCollector;
use crate::comm::{close_quietly, ConnectionGuard, StatementGuard};
use crate::config::SchemaFilter;
use crate::driver::{DataSource, DbConnection};
use crate::errors::{FluteError, Result};
use crate::loader::{BindTypeResolver, ColumnMap, ColumnMetaCache, ProcessContext, StringProcessorChain};
use crate::message::ExceptionMessageBuilder;

/// What one data file put into its table.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataInfo {
    pub table: String,
    pub file: PathBuf,
    pub rows: usize,
}

/// Inserts the rows of delimited data files. The file name is the table
/// name and the header row holds the column names. Empty cells are null.
pub struct DelimiterDataWriter<'a> {
    data_source: &'a dyn DataSource,
    filter: &'a dyn SchemaFilter,
    column_cache: &'a ColumnMetaCache,
    binder: ParameterBinder,
    resolver: BindTypeResolver,
    processors: StringProcessorChain,
    delimiter: Option<u8>,
}

impl<'a> DelimiterDataWriter<'a> {
    pub fn new(data_source: &'a dyn DataSource, filter: &'a dyn SchemaFilter, column_cache: &'a ColumnMetaCache) -> Self {
        Self {
            data_source,
            filter,
            column_cache,
            binder: ParameterBinder::default(),
            resolver: BindTypeResolver::new(data_source.dbms()),
            processors: StringProcessorChain::new(),
            delimiter: None,
        }
    }

    /// Overrides the delimiter chosen from the extension (`,` for csv, tab otherwise).
    pub fn set_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn processors(&self) -> &StringProcessorChain {
        &self.processors
    }

    /// Every tsv and csv file under the directory, in path order.
    pub fn write_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<Vec<LoadedDataInfo>> {
        let dir = dir.as_ref().to_path_buf();
        let mut files = SqlFileCollector::new(vec![dir.clone()]).with_extension("tsv").collect()?;
        files.extend(SqlFileCollector::new(vec![dir]).with_extension("csv").collect()?);
        files.sort();
        let mut loaded = Vec::with_capacity(files.len());
        for file in files {
            loaded.push(self.write_file(&file)?);
        }
        Ok(loaded)
    }

    pub fn write_file<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadedDataInfo> {
        let path = path.as_ref();
        let table = path.file_stem()
            .and_then(|s| s.to_str())
            .map(ToString::to_string)
            .ok_or_else(|| FluteError::ConfigError(format!("No table name in the file name: {}", path.display())))?;
        let delimiter = self.delimiter.unwrap_or_else(|| match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
            _ => b'\t',
        });

        let columns = self.column_cache.get_or_load(self.data_source, self.filter, &table)?;
        if columns.is_empty() {
            return Err(FluteError::TableNotFound(ExceptionMessageBuilder::new()
                .notice("The table for the data file was not found.")
                .advice("The file name should be the name of the table.")
                .item_element("Data File", path.display())
                .item_element("Table", &table)
                .build()));
        }

        let mut reader = ReaderBuilder::new().delimiter(delimiter).has_headers(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let targets = header_columns(&columns, &table, path, headers.iter())?;
        let sql = insert_sql(self.column_cache, &table, &targets);
        let ctx = ProcessContext { data_dir: path.parent().map(Path::to_path_buf) };

        let mut guard = ConnectionGuard::new(self.data_source.get_connection()?);
        let conn = guard.get_ref()?;
        conn.begin()?;
        let rows = match self.write_rows(conn, &sql, &table, &targets, &mut reader, &ctx) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!("Failed to load {}: {}", path.display(), err);
                close_quietly("transaction", conn.rollback());
                return Err(err);
            }
        };
        conn.commit()?;
        guard.close();
        tracing::info!("Loaded {} rows into {} from {}", rows, table, path.display());
        Ok(LoadedDataInfo { table, file: path.to_path_buf(), rows })
    }

    fn write_rows<R: std::io::Read>(&mut self, conn: &dyn DbConnection, sql: &str, table: &str, targets: &[ColumnMeta],
                                    reader: &mut csv::Reader<R>, ctx: &ProcessContext) -> Result<usize> {
        let mut guard = StatementGuard::new(conn.prepare_statement(sql)?);
        let statement = guard.get()?;
        let mut rows = 0;
        for record in reader.records() {
            let record = record?;
            for (i, (column, cell)) in targets.iter().zip(record.iter()).enumerate() {
                let value = if cell.is_empty() {
                    BindValue::new(flute_core::FluteValue::Null).column(&column.name)
                } else {
                    let bind_type = self.resolver.resolve(table, column);
                    BindValue::new(self.processors.process(table, column, bind_type, cell, ctx)?).column(&column.name)
                };
                let location = BindLocation { table: Some(table), column: Some(&column.name), column_meta: Some(column) };
                self.binder.bind(&mut BindTarget::Statement(&mut *statement), i + 1, &value, &location)?;
            }
            statement.execute_update()?;
            rows += 1;
        }
        guard.close();
        Ok(rows)
    }
}

fn header_columns<'h>(columns: &ColumnMap, table: &str, path: &Path, headers: impl Iterator<Item = &'h str>) -> Result<Vec<ColumnMeta>> {
    let mut targets = Vec::new();
    for header in headers {
        match columns.get(&header.trim().to_lowercase()) {
            Some(column) => targets.push(column.clone()),
            None => return Err(FluteError::ColumnValueProcessing(ExceptionMessageBuilder::new()
                .notice("The column in the data file was not found in the table.")
                .advice("Make sure the header row holds column names of the table.")
                .item_element("Data File", path.display())
                .item_element("Table", table)
                .item_element("Column", header)
                .build())),
        }
    }
    Ok(targets)
}

fn insert_sql(cache: &ColumnMetaCache, table: &str, columns: &[ColumnMeta]) -> String {
    let table_name = if cache.schema().is_main_schema() {
        table.to_string()
    } else {
        cache.schema().qualify(table)
    };
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let marks = vec!["?"; columns.len()].join(", ");
    format!("insert into {} ({}) values ({})", table_name, names.join(", "), marks)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use flute_core::UnifiedSchema;
    use crate::config::NoFilter;
    use crate::loader::tests::member_data_source;
    use super::*;

    #[test]
    fn test_write_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("MEMBER.tsv");
        fs::write(&file, "MEMBER_ID\tMEMBER_NAME\tBIRTHDATE\n1\tStojkovic\t1965-03-03\n2\tO'Neil\t\n").unwrap();
        let data_source = member_data_source();
        let cache = ColumnMetaCache::new(UnifiedSchema::main(None, Some("PUBLIC")));
        let mut writer = DelimiterDataWriter::new(&data_source, &NoFilter, &cache);
        let info = writer.write_file(&file).unwrap();
        assert_eq!(info.table, "MEMBER");
        assert_eq!(info.rows, 2);

        let log = data_source.db.log();
        let sql = "insert into MEMBER (MEMBER_ID, MEMBER_NAME, BIRTHDATE) values (?, ?, ?)";
        assert!(log.contains(&format!("prepare:{}", sql)));
        assert!(log.contains(&"set_value:3:'1965-03-03'".to_string()));
        assert!(log.contains(&"set_value:2:'O''Neil'".to_string()));
        assert!(log.contains(&"set_null:3:DATE".to_string()));
        assert_eq!(log.iter().filter(|l| l.starts_with("execute_update")).count(), 2);
        assert_eq!(log.last(), Some(&"commit".to_string()));
        assert_eq!(writer.processors().cached_processor("MEMBER", "BIRTHDATE"), Some("Date"));
    }

    #[test]
    fn test_unknown_column_and_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let data_source = member_data_source();
        let cache = ColumnMetaCache::new(UnifiedSchema::main(None, Some("PUBLIC")));
        let mut writer = DelimiterDataWriter::new(&data_source, &NoFilter, &cache);

        let unknown = dir.path().join("MEMBER.csv");
        fs::write(&unknown, "MEMBER_ID,NICKNAME\n1,x\n").unwrap();
        assert!(matches!(writer.write_file(&unknown).unwrap_err(), FluteError::ColumnValueProcessing(_)));

        let broken = dir.path().join("member.tsv");
        fs::write(&broken, "MEMBER_ID\tBIRTHDATE\n1\t1965-03-03\n2\tsomeday\n").unwrap();
        let err = writer.write_file(&broken).unwrap_err();
        assert!(matches!(err, FluteError::ColumnValueProcessing(_)));
        assert_eq!(data_source.db.log().last(), Some(&"rollback".to_string()));
        assert!(data_source.db.closed_connections.get() >= 2);
    }
}
