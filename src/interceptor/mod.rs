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
use std::collections::HashSet;
use std::sync::Arc;
use crate::behavior::CommandKind;
use crate::comm::{ExecuteContext, ExecuteResult};
use crate::errors::Result;

mod builder;
mod logging;

pub use builder::InterceptorBuilder;
pub use logging::LoggingInterceptor;

/// Interceptor configuration items
#[derive(Debug, Clone)]
pub struct InterceptorConfigItem {
    pub enabled: bool,
    pub order: i32,
    pub ignored_tables: HashSet<String>,
    /// Empty means every kind.
    pub supported_kinds: HashSet<CommandKind>,
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    /// Tracking level (lowest priority)
    Trace = 1,
    /// Debug level
    Debug = 2,
    /// Information level
    #[default]
    Info = 3,
    /// Warning level
    Warn = 4,
    /// Error Level (Highest Priority)
    Error = 5,
}

impl LogLevel {
    /// Parsing logs from the string level
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ERROR" | "ERR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Check if a level is recorded
    pub fn should_log(&self, other: LogLevel) -> bool {
        *self <= other
    }
}

impl PartialOrd for LogLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hook around every behavior command execution.
pub trait FluteInterceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn order(&self) -> i32 {
        0
    }

    fn supports_kind(&self, _kind: CommandKind) -> bool {
        true
    }

    fn will_ignore_table(&self, _table: &str) -> bool {
        false
    }

    fn before_execute(&self, _ctx: &mut ExecuteContext) -> Result<()> {
        Ok(())
    }

    fn after_execute(&self, _ctx: &mut ExecuteContext, _result: &mut Result<ExecuteResult>) -> Result<()> {
        Ok(())
    }
}

struct ChainEntry {
    interceptor: Arc<dyn FluteInterceptor>,
    config: InterceptorConfigItem,
}

impl ChainEntry {
    fn applies_to(&self, ctx: &ExecuteContext) -> bool {
        let kind = ctx.kind();
        if !self.interceptor.supports_kind(kind) {
            return false;
        }
        if !self.config.supported_kinds.is_empty() && !self.config.supported_kinds.contains(&kind) {
            return false;
        }
        match ctx.table() {
            Some(table) => !self.interceptor.will_ignore_table(table)
                && !self.config.ignored_tables.iter().any(|t| t.eq_ignore_ascii_case(table)),
            None => true,
        }
    }
}

/// Interceptors in execution order. `after_execute` runs in reverse.
#[derive(Default)]
pub struct InterceptorChain {
    entries: Vec<ChainEntry>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interceptor(&mut self, interceptor: Arc<dyn FluteInterceptor>) {
        let config = InterceptorConfigItem {
            enabled: true,
            order: interceptor.order(),
            ignored_tables: HashSet::new(),
            supported_kinds: HashSet::new(),
        };
        self.add_with_config(interceptor, config);
    }

    pub(crate) fn add_with_config(&mut self, interceptor: Arc<dyn FluteInterceptor>, config: InterceptorConfigItem) {
        self.entries.push(ChainEntry { interceptor, config });
        self.entries.sort_by_key(|e| e.config.order);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.interceptor.name()).collect()
    }

    pub fn before_execute(&self, ctx: &mut ExecuteContext) -> Result<()> {
        for entry in self.entries.iter() {
            if ctx.stop_propagation {
                break;
            }
            if !entry.applies_to(ctx) {
                continue;
            }
            entry.interceptor.before_execute(ctx)?;
            ctx.record_interceptor(entry.interceptor.name());
        }
        Ok(())
    }

    pub fn after_execute(&self, ctx: &mut ExecuteContext, result: &mut Result<ExecuteResult>) -> Result<()> {
        for entry in self.entries.iter().rev() {
            if !entry.applies_to(ctx) {
                continue;
            }
            entry.interceptor.after_execute(ctx, result)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use crate::behavior::BehaviorCommand;
    use super::*;

    struct Recording {
        name: &'static str,
        order: i32,
        log: Arc<Mutex<Vec<String>>>,
        stop: bool,
    }

    impl FluteInterceptor for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn before_execute(&self, ctx: &mut ExecuteContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            if self.stop {
                ctx.stop_propagation();
            }
            Ok(())
        }

        fn after_execute(&self, _ctx: &mut ExecuteContext, _result: &mut Result<ExecuteResult>) -> Result<()> {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
            Ok(())
        }
    }

    fn context() -> ExecuteContext {
        let command = BehaviorCommand::builder(CommandKind::SelectCount)
            .table_db_name("MEMBER")
            .sql("select count(*) from MEMBER")
            .build()
            .unwrap();
        ExecuteContext::new(&command, command.sql().to_string())
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug.should_log(LogLevel::Info));
        assert!(!LogLevel::Warn.should_log(LogLevel::Info));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_chain_order_and_stop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        chain.add_interceptor(Arc::new(Recording { name: "second", order: 20, log: log.clone(), stop: false }));
        chain.add_interceptor(Arc::new(Recording { name: "first", order: 10, log: log.clone(), stop: false }));
        let mut ctx = context();
        chain.before_execute(&mut ctx).unwrap();
        let mut result = Ok(ExecuteResult::Count(1));
        chain.after_execute(&mut ctx, &mut result).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["before:first", "before:second", "after:second", "after:first"]);
        assert_eq!(ctx.executed_interceptors(), &["first", "second"]);

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        chain.add_interceptor(Arc::new(Recording { name: "stopper", order: 1, log: log.clone(), stop: true }));
        chain.add_interceptor(Arc::new(Recording { name: "skipped", order: 2, log: log.clone(), stop: false }));
        let mut ctx = context();
        chain.before_execute(&mut ctx).unwrap();
        assert!(ctx.stop_propagation);
        assert_eq!(*log.lock().unwrap(), vec!["before:stopper"]);
    }
}
