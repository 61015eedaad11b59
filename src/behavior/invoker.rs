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
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use flute_core::TableMeta;
use crate::behavior::{BehaviorCommand, DisplaySqlBuilder, SqlExceptionHandler, StatementExecutor};
use crate::binding::ParameterBinder;
use crate::capability::ResultLogger;
use crate::comm::{ExecuteContext, ExecuteResult};
use crate::config::FluteConfig;
use crate::driver::DbConnection;
use crate::errors::Result;
use crate::interceptor::{InterceptorChain, LoggingInterceptor};

/// Runs behavior commands through the interceptors, the executor and the
/// exception translation, then reports the outcome.
pub struct BehaviorCommandInvoker {
    interceptor_chain: Option<Arc<InterceptorChain>>,
    exception_handler: SqlExceptionHandler,
    result_logger: Option<Arc<dyn ResultLogger>>,
    executor: StatementExecutor,
    display_builder: DisplaySqlBuilder,
    /// Table metadata by lower-case table name.
    tables: HashMap<String, TableMeta>,
    slow_query_threshold: Duration,
}

impl Default for BehaviorCommandInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BehaviorCommandInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorCommandInvoker")
            .field("interceptor_chain", &match &self.interceptor_chain {
                Some(chain) => chain.names(),
                None => Vec::new(),
            })
            .field("tables", &self.tables.len())
            .field("slow_query_threshold", &self.slow_query_threshold)
            .finish()
    }
}

impl BehaviorCommandInvoker {
    pub fn new() -> Self {
        Self {
            interceptor_chain: None,
            exception_handler: SqlExceptionHandler::new(),
            result_logger: None,
            executor: StatementExecutor::default(),
            display_builder: DisplaySqlBuilder::new(),
            tables: HashMap::new(),
            slow_query_threshold: Duration::from_millis(1000),
        }
    }

    /// Logging interceptor at the configured level and slow query threshold.
    pub fn from_config(cfg: &FluteConfig) -> Self {
        let threshold = cfg.slow_query_threshold();
        let logging = LoggingInterceptor::new()
            .with_log_level(cfg.log_level())
            .with_slow_query_threshold(threshold.as_millis() as u64);
        let mut chain = InterceptorChain::new();
        chain.add_interceptor(Arc::new(logging));
        Self::new()
            .with_interceptor_chain(chain)
            .with_slow_query_threshold(threshold)
    }

    pub fn with_interceptor_chain(mut self, chain: InterceptorChain) -> Self {
        self.interceptor_chain = Some(Arc::new(chain));
        self
    }

    pub fn with_result_logger(mut self, logger: Arc<dyn ResultLogger>) -> Self {
        self.result_logger = Some(logger);
        self
    }

    pub fn with_binder(mut self, binder: ParameterBinder) -> Self {
        self.executor = StatementExecutor::new(binder);
        self
    }

    pub fn with_display_builder(mut self, builder: DisplaySqlBuilder) -> Self {
        self.display_builder = builder;
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Column metadata for binding nulls of this table.
    pub fn with_table_meta(mut self, table: TableMeta) -> Self {
        self.tables.insert(table.name.to_lowercase(), table);
        self
    }

    pub fn interceptor_chain(&self) -> Option<&Arc<InterceptorChain>> {
        self.interceptor_chain.as_ref()
    }

    pub fn display_sql(&self, command: &BehaviorCommand) -> String {
        let params = command.params();
        self.display_builder.build(command.sql(), &params.values())
    }

    pub fn invoke(&mut self, conn: &dyn DbConnection, command: &BehaviorCommand) -> Result<ExecuteResult> {
        let mut ctx = ExecuteContext::new(command, self.display_sql(command))
            .with_slow_query_threshold(self.slow_query_threshold);

        if let Some(chain) = &self.interceptor_chain {
            chain.before_execute(&mut ctx)?;
            if ctx.stop_propagation {
                tracing::info!("Behavior propagation stopped by interceptor: {}", ctx.command_name());
                return Ok(ExecuteResult::None);
            }
        }
        ctx.record_parse_complete();

        let table = command.table_db_name().and_then(|t| self.tables.get(&t.to_lowercase()));
        let handler = self.exception_handler;
        let mut result = self.executor
            .execute(conn, command, table)
            .map_err(|err| handler.handle(conn.dbms(), err, command, ctx.display_sql()));

        if let Ok(outcome) = &result {
            ctx.record_execute_complete(outcome.len());
        }
        if let Some(chain) = &self.interceptor_chain {
            chain.after_execute(&mut ctx, &mut result)?;
        }
        ctx.record_query_metrics();
        if let Some(logger) = &self.result_logger {
            logger.log_result(&ctx, &result);
        }
        result
    }
}
