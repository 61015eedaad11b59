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

use std::collections::BTreeMap;
use std::time::Duration;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use url::Url;
use flute_core::UnifiedSchema;
use crate::driver::Dbms;
use crate::errors::{FluteError, Result};
use crate::interceptor::LogLevel;

/// Name filter as written in configuration.
///
/// `prefix:`, `suffix:` and `contain:` select the match kind, a `*` makes
/// it a glob and anything else is compared for equality. Case is ignored.
#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contain(String),
    Glob(Regex),
}

impl NamePattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if let Some(v) = pattern.strip_prefix("prefix:") {
            NamePattern::Prefix(v.to_lowercase())
        } else if let Some(v) = pattern.strip_prefix("suffix:") {
            NamePattern::Suffix(v.to_lowercase())
        } else if let Some(v) = pattern.strip_prefix("contain:") {
            NamePattern::Contain(v.to_lowercase())
        } else if pattern.contains('*') {
            let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
            match Regex::new(&format!("(?i)^{}$", body)) {
                Ok(regex) => NamePattern::Glob(regex),
                Err(_) => NamePattern::Exact(pattern.to_lowercase()),
            }
        } else {
            NamePattern::Exact(pattern.to_lowercase())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        match self {
            NamePattern::Exact(v) => lower == *v,
            NamePattern::Prefix(v) => lower.starts_with(v.as_str()),
            NamePattern::Suffix(v) => lower.ends_with(v.as_str()),
            NamePattern::Contain(v) => lower.contains(v.as_str()),
            NamePattern::Glob(regex) => regex.is_match(name),
        }
    }
}

fn compile(patterns: &[String]) -> Vec<NamePattern> {
    patterns.iter().map(|p| NamePattern::parse(p)).collect()
}

fn any_match(patterns: &[NamePattern], name: &str) -> bool {
    patterns.iter().any(|p| p.matches(name))
}

/// Predicates the extractors ask before keeping an object.
pub trait SchemaFilter {
    fn is_table_except(&self, schema: &UnifiedSchema, table: &str) -> bool;

    fn is_column_except(&self, schema: &UnifiedSchema, table: &str, column: &str) -> bool;

    fn is_procedure_except(&self, _schema: &UnifiedSchema, _procedure: &str) -> bool {
        false
    }
}

/// Accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFilter;

impl SchemaFilter for NoFilter {
    fn is_table_except(&self, _schema: &UnifiedSchema, _table: &str) -> bool {
        false
    }

    fn is_column_except(&self, _schema: &UnifiedSchema, _table: &str, _column: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdditionalSchema {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub object_types: Vec<String>,
    pub table_except: Vec<String>,
    pub table_target: Vec<String>,
}

impl AdditionalSchema {
    pub fn new(schema: &str) -> Self {
        Self { schema: Some(schema.to_string()), ..Default::default() }
    }

    pub fn unified_schema(&self) -> UnifiedSchema {
        UnifiedSchema::additional(self.catalog.as_deref(), self.schema.as_deref())
    }
}

#[derive(Debug, Default, Clone)]
struct CompiledPatterns {
    table_except: Vec<NamePattern>,
    table_target: Vec<NamePattern>,
    column_except: Vec<(NamePattern, Vec<NamePattern>)>,
    procedure_except: Vec<NamePattern>,
    additional: Vec<(UnifiedSchema, Vec<NamePattern>, Vec<NamePattern>)>,
}

/// Settings of one extraction or execution run, passed explicitly to the
/// components that need them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FluteConfig {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    main_catalog: Option<String>,
    main_schema: Option<String>,
    additional_schemas: Vec<AdditionalSchema>,
    object_types: Vec<String>,
    table_except: Vec<String>,
    table_target: Vec<String>,
    /// Table pattern to column patterns, `*` for every table.
    column_except: BTreeMap<String, Vec<String>>,
    procedure_except: Vec<String>,
    case_insensitive_retry: bool,
    procedure_execution_meta: bool,
    log_level: Option<String>,
    slow_query_threshold_ms: u64,
    max_size: u32,
    min_idle: Option<u32>,
    connection_timeout_secs: u64,
    #[serde(skip)]
    compiled: OnceCell<CompiledPatterns>,
}

impl Default for FluteConfig {
    fn default() -> Self {
        FluteConfig {
            url: None,
            username: None,
            password: None,
            main_catalog: None,
            main_schema: None,
            additional_schemas: Vec::new(),
            object_types: Vec::new(),
            table_except: Vec::new(),
            table_target: Vec::new(),
            column_except: BTreeMap::new(),
            procedure_except: Vec::new(),
            case_insensitive_retry: true,
            procedure_execution_meta: false,
            log_level: None,
            slow_query_threshold_ms: 1000,
            max_size: 16,
            min_idle: None,
            connection_timeout_secs: 6,
            compiled: OnceCell::new(),
        }
    }
}

impl FluteConfig {
    pub fn new(url: &str) -> Self {
        FluteConfig::default().set_url(url.to_string())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FluteError::ConfigError(e.to_string()))
    }

    fn reset_patterns(&mut self) {
        self.compiled = OnceCell::new();
    }

    fn patterns(&self) -> &CompiledPatterns {
        self.compiled.get_or_init(|| CompiledPatterns {
            table_except: compile(&self.table_except),
            table_target: compile(&self.table_target),
            column_except: self.column_except.iter()
                .map(|(table, columns)| (NamePattern::parse(table), compile(columns)))
                .collect(),
            procedure_except: compile(&self.procedure_except),
            additional: self.additional_schemas.iter()
                .map(|s| (s.unified_schema(), compile(&s.table_except), compile(&s.table_target)))
                .collect(),
        })
    }

    pub fn set_url(mut self, url: String) -> Self {
        self.url = url.into();
        self
    }

    pub fn url(&self) -> Option<&String> {
        self.url.as_ref()
    }

    /// DBMS named by the URL scheme; `jdbc:` prefixes are accepted.
    pub fn dbms(&self) -> Dbms {
        let raw = match &self.url {
            Some(url) => url.trim(),
            None => return Dbms::Unknown,
        };
        let stripped = raw.strip_prefix("jdbc:").unwrap_or(raw);
        match Url::parse(stripped) {
            Ok(url) => Dbms::from_url(url.scheme()),
            Err(_) => Dbms::from_url(stripped),
        }
    }

    /// Database name in the URL path, e.g. `exampledb` of `mysql://host/exampledb`.
    pub fn url_database(&self) -> Option<String> {
        let raw = self.url.as_deref()?.trim();
        let url = Url::parse(raw.strip_prefix("jdbc:").unwrap_or(raw)).ok()?;
        let mut segments = url.path_segments()?;
        segments.next().filter(|s| !s.is_empty()).map(ToString::to_string)
    }

    pub fn set_username(mut self, username: String) -> Self {
        self.username = username.into();
        self
    }

    pub fn username(&self) -> Option<&String> {
        self.username.as_ref()
    }

    pub fn set_password(mut self, password: String) -> Self {
        self.password = password.into();
        self
    }

    pub fn password(&self) -> Option<&String> {
        self.password.as_ref()
    }

    pub fn set_main_catalog(mut self, catalog: String) -> Self {
        self.main_catalog = catalog.into();
        self
    }

    pub fn set_main_schema(mut self, schema: String) -> Self {
        self.main_schema = schema.into();
        self
    }

    pub fn main_schema(&self) -> UnifiedSchema {
        let catalog = self.main_catalog.clone().or_else(|| match self.dbms() {
            Dbms::MySQL => self.url_database(),
            _ => None,
        });
        UnifiedSchema::main(catalog.as_deref(), self.main_schema.as_deref())
    }

    pub fn add_additional_schema(mut self, schema: AdditionalSchema) -> Self {
        self.additional_schemas.push(schema);
        self.reset_patterns();
        self
    }

    pub fn additional_schemas(&self) -> &[AdditionalSchema] {
        &self.additional_schemas
    }

    pub fn set_object_types(mut self, object_types: Vec<String>) -> Self {
        self.object_types = object_types;
        self
    }

    /// Configured object types, else `TABLE`, `VIEW` and on Oracle `SYNONYM`.
    pub fn object_types(&self, dbms: Dbms) -> Vec<String> {
        if !self.object_types.is_empty() {
            return self.object_types.iter().map(|t| t.to_uppercase()).collect();
        }
        let mut types = vec!["TABLE".to_string(), "VIEW".to_string()];
        if dbms == Dbms::Oracle {
            types.push("SYNONYM".to_string());
        }
        types
    }

    pub fn add_table_except(mut self, pattern: &str) -> Self {
        self.table_except.push(pattern.to_string());
        self.reset_patterns();
        self
    }

    pub fn add_table_target(mut self, pattern: &str) -> Self {
        self.table_target.push(pattern.to_string());
        self.reset_patterns();
        self
    }

    pub fn add_column_except(mut self, table_pattern: &str, column_pattern: &str) -> Self {
        self.column_except.entry(table_pattern.to_string()).or_default().push(column_pattern.to_string());
        self.reset_patterns();
        self
    }

    pub fn add_procedure_except(mut self, pattern: &str) -> Self {
        self.procedure_except.push(pattern.to_string());
        self.reset_patterns();
        self
    }

    pub fn set_case_insensitive_retry(mut self, retry: bool) -> Self {
        self.case_insensitive_retry = retry;
        self
    }

    /// Whether key lookups retry with lower and upper case names.
    pub fn case_insensitive_retry(&self) -> bool {
        self.case_insensitive_retry
    }

    pub fn set_procedure_execution_meta(mut self, enabled: bool) -> Self {
        self.procedure_execution_meta = enabled;
        self
    }

    pub fn procedure_execution_meta(&self) -> bool {
        self.procedure_execution_meta
    }

    pub fn set_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level.as_str().to_string());
        self
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.as_deref().and_then(LogLevel::from_str).unwrap_or_default()
    }

    pub fn set_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold_ms = threshold.as_millis() as u64;
        self
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold_ms)
    }

    pub fn set_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn set_min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.min_idle = min_idle;
        self
    }

    pub fn min_idle(&self) -> Option<u32> {
        self.min_idle
    }

    pub fn set_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_secs = timeout.as_secs();
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

impl SchemaFilter for FluteConfig {
    fn is_table_except(&self, schema: &UnifiedSchema, table: &str) -> bool {
        let patterns = self.patterns();
        let (excepts, targets) = match patterns.additional.iter().find(|(s, _, _)| s == schema && schema.is_additional_schema()) {
            Some((_, excepts, targets)) => (excepts, targets),
            None => (&patterns.table_except, &patterns.table_target),
        };
        if !targets.is_empty() && !any_match(targets, table) {
            return true;
        }
        any_match(excepts, table)
    }

    fn is_column_except(&self, _schema: &UnifiedSchema, table: &str, column: &str) -> bool {
        self.patterns().column_except.iter()
            .filter(|(t, _)| t.matches(table))
            .any(|(_, columns)| any_match(columns, column))
    }

    fn is_procedure_except(&self, _schema: &UnifiedSchema, procedure: &str) -> bool {
        any_match(&self.patterns().procedure_except, procedure)
    }
}
