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
//! Small capabilities composed into commands: a schema connection, a source
//! of SQL files and a sink for execution results.
//!

use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use flute_core::UnifiedSchema;
use crate::comm::{ConnectionGuard, ExecuteContext, ExecuteResult};
use crate::driver::DataSource;
use crate::errors::{FluteError, Result};

/// Something that can open a connection to its schema.
pub trait SchemaConnectable {
    fn data_source(&self) -> &dyn DataSource;

    fn main_schema(&self) -> UnifiedSchema;

    /// A connection closed when the guard drops.
    fn connect(&self) -> Result<ConnectionGuard> {
        Ok(ConnectionGuard::new(self.data_source().get_connection()?))
    }
}

/// Something that owns SQL files.
pub trait SqlFileCollectable {
    fn sql_directories(&self) -> Vec<PathBuf>;

    fn collect_sql_files(&self) -> Result<Vec<PathBuf>> {
        SqlFileCollector::new(self.sql_directories()).collect()
    }
}

/// Receives the outcome of every executed behavior command.
pub trait ResultLogger {
    fn log_result(&self, ctx: &ExecuteContext, result: &Result<ExecuteResult>);
}

/// Logs outcomes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingResultLogger;

impl ResultLogger for TracingResultLogger {
    fn log_result(&self, ctx: &ExecuteContext, result: &Result<ExecuteResult>) {
        match result {
            Ok(outcome) => tracing::info!("{}: {} ({} ms)", ctx.command_name(), outcome.len(), ctx.metrics().total_time.as_millis()),
            Err(err) => tracing::error!("{}: failed - {}", ctx.command_name(), err),
        }
    }
}

/// Finds `.sql` files under directories, sorted by path.
#[derive(Debug, Clone)]
pub struct SqlFileCollector {
    directories: Vec<PathBuf>,
    extension: String,
}

impl SqlFileCollector {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories, extension: "sql".to_string() }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Missing directories are skipped.
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for directory in self.directories.iter() {
            if !directory.is_dir() {
                tracing::debug!("SQL directory not found: {}", directory.display());
                continue;
            }
            for entry in WalkDir::new(directory) {
                let entry = entry.map_err(|e| FluteError::IoError(std::io::Error::other(e.to_string())))?;
                if entry.file_type().is_file() && self.matches(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

/// Splits a SQL file into statements on `;` outside literals and comments.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                for rest in chars.by_ref() {
                    if rest == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            ';' => push_statement(&mut statements, &mut current),
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
