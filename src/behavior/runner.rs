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
use std::fs;
use std::path::PathBuf;
use crate::behavior::{BehaviorCommand, BehaviorCommandInvoker, CommandKind};
use crate::capability::{split_statements, SchemaConnectable, SqlFileCollectable};
use crate::errors::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRunSummary {
    pub files: usize,
    pub statements: usize,
    /// Failed statements with the error message, when errors are tolerated.
    pub failures: Vec<(PathBuf, String)>,
}

/// Executes every statement of the collected SQL files on one connection.
pub struct SqlFileRunner {
    invoker: BehaviorCommandInvoker,
    continue_on_error: bool,
}

impl SqlFileRunner {
    pub fn new(invoker: BehaviorCommandInvoker) -> Self {
        Self { invoker, continue_on_error: false }
    }

    pub fn set_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn run<T: SchemaConnectable + SqlFileCollectable>(&mut self, task: &T) -> Result<SqlRunSummary> {
        let files = task.collect_sql_files()?;
        let mut summary = SqlRunSummary::default();
        if files.is_empty() {
            return Ok(summary);
        }
        let mut guard = task.connect()?;
        let conn = guard.get()?;
        for file in files.iter() {
            let path = file.to_string_lossy().to_string();
            let text = fs::read_to_string(file)?;
            summary.files += 1;
            for statement in split_statements(&text) {
                let kind = if statement.get(..6).map(|h| h.eq_ignore_ascii_case("select")).unwrap_or(false) {
                    CommandKind::OutsideSqlSelect
                } else {
                    CommandKind::OutsideSqlExecute
                };
                let command = BehaviorCommand::builder(kind)
                    .outside_sql_path(&path)
                    .sql(statement)
                    .build()?;
                summary.statements += 1;
                if let Err(err) = self.invoker.invoke(&*conn, &command) {
                    if !self.continue_on_error {
                        return Err(err);
                    }
                    tracing::warn!("Continued after the failure in {}: {}", path, err);
                    summary.failures.push((file.clone(), err.to_string()));
                }
            }
        }
        guard.close();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use flute_core::UnifiedSchema;
    use crate::driver::fake::{FakeDataSource, FakeDb, FakeMetaData};
    use crate::driver::{DataSource, Dbms};
    use super::*;

    struct ReplaceSchema {
        data_source: FakeDataSource,
        directory: PathBuf,
    }

    impl SchemaConnectable for ReplaceSchema {
        fn data_source(&self) -> &dyn DataSource {
            &self.data_source
        }

        fn main_schema(&self) -> UnifiedSchema {
            UnifiedSchema::main(None, Some("PUBLIC"))
        }
    }

    impl SqlFileCollectable for ReplaceSchema {
        fn sql_directories(&self) -> Vec<PathBuf> {
            vec![self.directory.clone()]
        }
    }

    #[test]
    fn test_runs_every_statement() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("10-create.sql"), "create table MEMBER (MEMBER_ID int);\ninsert into MEMBER values (1);").unwrap();
        fs::write(dir.path().join("20-check.sql"), "select * from MEMBER;").unwrap();
        let db: Rc<FakeDb> = FakeDb::new();
        let task = ReplaceSchema {
            data_source: FakeDataSource { dbms: Dbms::H2, meta: FakeMetaData::new("H2"), db: db.clone() },
            directory: dir.path().to_path_buf(),
        };
        let summary = SqlFileRunner::new(BehaviorCommandInvoker::new()).run(&task).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.statements, 3);
        assert!(summary.failures.is_empty());
        let executed: Vec<String> = db.log().into_iter().filter(|l| l.starts_with("execute")).collect();
        assert_eq!(executed, vec![
            "execute_update:create table MEMBER (MEMBER_ID int)".to_string(),
            "execute_update:insert into MEMBER values (1)".to_string(),
            "execute_query:select * from MEMBER".to_string(),
        ]);
        assert_eq!(db.closed_connections.get(), 1);
    }
}
