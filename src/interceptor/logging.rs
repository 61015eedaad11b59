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
use tracing::{debug, error, info, trace, warn};
use crate::comm::{ExecuteContext, ExecuteResult};
use crate::errors::Result;
use crate::interceptor::{FluteInterceptor, LogLevel};

/// SQL execution log: display SQL, parameters, elapsed time and failures.
pub struct LoggingInterceptor {
    pub log_level: LogLevel,
    /// Falls back to the context threshold when absent.
    pub slow_query_threshold_ms: Option<u64>,
}

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self {
            log_level: LogLevel::Debug,
            slow_query_threshold_ms: None,
        }
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold_ms: u64) -> Self {
        self.slow_query_threshold_ms = Some(threshold_ms);
        self
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl FluteInterceptor for LoggingInterceptor {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn order(&self) -> i32 {
        90
    }

    fn before_execute(&self, ctx: &mut ExecuteContext) -> Result<()> {
        if self.log_level.should_log(LogLevel::Debug) {
            debug!("==> [Flute]  Behavior: {}", ctx.command_name());
            debug!("==> [Flute] Preparing: {}", ctx.display_sql());
            if ctx.params().is_empty() {
                debug!("==> [Flute] Parameters: None");
            } else {
                debug!("{}", ctx.params());
            }
            if self.log_level.should_log(LogLevel::Trace) {
                trace!("==> [Flute] Start execution at: {:?}", ctx.start_time());
            }
        }
        Ok(())
    }

    fn after_execute(&self, ctx: &mut ExecuteContext, result: &mut Result<ExecuteResult>) -> Result<()> {
        let duration_ms = ctx.start_time().elapsed().as_millis();

        let outcome = match result {
            Err(err) => {
                if self.log_level.should_log(LogLevel::Error) {
                    error!("<== [Flute]    ERROR: {}", err);
                    error!("<== [Flute]    Failed SQL: {}", ctx.display_sql());
                }
                return Ok(());
            }
            Ok(outcome) => outcome,
        };

        let rows = outcome.len();
        let threshold = self.slow_query_threshold_ms
            .map(u128::from)
            .unwrap_or_else(|| ctx.slow_query_threshold().as_millis());
        if duration_ms > threshold && self.log_level.should_log(LogLevel::Warn) {
            warn!("<== [Flute] Slow Query! Cost: {} ms, Rows: {}, SQL: {}", duration_ms, rows, ctx.display_sql());
        }

        if self.log_level.should_log(LogLevel::Info) {
            match outcome {
                ExecuteResult::Rows(fetched) if self.log_level.should_log(LogLevel::Trace) => {
                    trace!("{}", fetched);
                }
                _ => {}
            }
            info!("<== [Flute]      Total: {}, Cost: {} ms", rows, duration_ms);
        }
        Ok(())
    }
}
