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
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use bigdecimal::BigDecimal;
use uuid::Uuid;
use flute_core::{ColumnMeta, FluteValue, JdbcType};
use crate::binding::{parse_boolean, parse_date, parse_time, parse_timestamp};
use crate::errors::{FluteError, Result};
use crate::loader::BindType;
use crate::message::ExceptionMessageBuilder;

/// Where the cell comes from, for resolving file references.
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    pub data_dir: Option<PathBuf>,
}

/// Turns cell text into a typed value for columns of some bind types.
/// `Ok(None)` means the text is not for this processor.
pub trait StringProcessor: Debug {
    fn name(&self) -> &'static str;

    fn accepts(&self, bind_type: BindType) -> bool;

    fn process(&self, text: &str, column: &ColumnMeta, bind_type: BindType, ctx: &ProcessContext) -> Result<Option<FluteValue>>;
}

#[derive(Debug, Default)]
pub struct DateProcessor;

impl StringProcessor for DateProcessor {
    fn name(&self) -> &'static str {
        "Date"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        matches!(bind_type, BindType::Date | BindType::Timestamp | BindType::Time)
    }

    fn process(&self, text: &str, _column: &ColumnMeta, bind_type: BindType, _ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        let value = match bind_type {
            BindType::Date => parse_date(text).map(FluteValue::Date),
            BindType::Time => parse_time(text).map(FluteValue::Time),
            _ => parse_timestamp(text).map(FluteValue::DateTime),
        };
        Ok(value)
    }
}

#[derive(Debug, Default)]
pub struct BooleanProcessor;

impl StringProcessor for BooleanProcessor {
    fn name(&self) -> &'static str {
        "Boolean"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        bind_type == BindType::Boolean
    }

    fn process(&self, text: &str, _column: &ColumnMeta, _bind_type: BindType, _ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        Ok(parse_boolean(text).map(FluteValue::Bool))
    }
}

#[derive(Debug, Default)]
pub struct NumberProcessor;

impl StringProcessor for NumberProcessor {
    fn name(&self) -> &'static str {
        "Number"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        bind_type == BindType::Number
    }

    fn process(&self, text: &str, column: &ColumnMeta, _bind_type: BindType, _ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        let text = text.trim();
        if column.jdbc_type.is_integer() {
            if let Ok(v) = text.parse::<i64>() {
                return Ok(Some(match column.jdbc_type {
                    JdbcType::Bigint => FluteValue::Bigint(v),
                    _ => i32::try_from(v).map(FluteValue::Int).unwrap_or(FluteValue::Bigint(v)),
                }));
            }
        }
        Ok(BigDecimal::from_str(text).ok().map(FluteValue::BigDecimal))
    }
}

#[derive(Debug, Default)]
pub struct UuidProcessor;

impl StringProcessor for UuidProcessor {
    fn name(&self) -> &'static str {
        "Uuid"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        bind_type == BindType::Uuid
    }

    fn process(&self, text: &str, _column: &ColumnMeta, _bind_type: BindType, _ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        Ok(Uuid::parse_str(text.trim()).ok().map(FluteValue::Uuid))
    }
}

/// `{a,b}` or `[a, b]` lists of text elements.
#[derive(Debug, Default)]
pub struct ArrayProcessor;

impl StringProcessor for ArrayProcessor {
    fn name(&self) -> &'static str {
        "Array"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        bind_type == BindType::Array
    }

    fn process(&self, text: &str, _column: &ColumnMeta, _bind_type: BindType, _ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        let text = text.trim();
        let inner = text.strip_prefix('{').and_then(|t| t.strip_suffix('}'))
            .or_else(|| text.strip_prefix('[').and_then(|t| t.strip_suffix(']')));
        let inner = match inner {
            Some(inner) => inner.trim(),
            None => return Ok(None),
        };
        if inner.is_empty() {
            return Ok(Some(FluteValue::Array(Vec::new())));
        }
        let elements = inner.split(',')
            .map(|e| e.trim().trim_matches('"').to_string())
            .map(FluteValue::Text)
            .collect();
        Ok(Some(FluteValue::Array(elements)))
    }
}

#[derive(Debug, Default)]
pub struct XmlProcessor;

impl StringProcessor for XmlProcessor {
    fn name(&self) -> &'static str {
        "Xml"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        bind_type == BindType::Xml
    }

    fn process(&self, text: &str, _column: &ColumnMeta, _bind_type: BindType, _ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        Ok(Some(FluteValue::Xml(text.to_string())))
    }
}

/// Binary cells name a file relative to the data file.
#[derive(Debug, Default)]
pub struct BinaryFileProcessor;

impl StringProcessor for BinaryFileProcessor {
    fn name(&self) -> &'static str {
        "BinaryFile"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        bind_type == BindType::Binary
    }

    fn process(&self, text: &str, column: &ColumnMeta, _bind_type: BindType, ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        let relative = Path::new(text.trim());
        let path = match &ctx.data_dir {
            Some(dir) if relative.is_relative() => dir.join(relative),
            _ => relative.to_path_buf(),
        };
        let bytes = fs::read(&path).map_err(|err| FluteError::ColumnValueProcessing(ExceptionMessageBuilder::new()
            .notice("The binary file for the column was not found.")
            .advice("A binary cell holds the path of a file relative to the data file.")
            .item_element("Column", &column.name)
            .item_element("Path", path.display())
            .item_element("Cause", err)
            .build()))?;
        Ok(Some(FluteValue::Blob(bytes)))
    }
}

/// The text itself, for every column that has no better way.
#[derive(Debug, Default)]
pub struct RealStringProcessor;

impl StringProcessor for RealStringProcessor {
    fn name(&self) -> &'static str {
        "RealString"
    }

    fn accepts(&self, bind_type: BindType) -> bool {
        bind_type != BindType::Binary
    }

    fn process(&self, text: &str, _column: &ColumnMeta, _bind_type: BindType, _ctx: &ProcessContext) -> Result<Option<FluteValue>> {
        Ok(Some(FluteValue::Text(text.to_string())))
    }
}

/// The processors in precedence order, with the winner remembered per column.
#[derive(Debug)]
pub struct StringProcessorChain {
    processors: Vec<Box<dyn StringProcessor>>,
    cache: HashMap<(String, String), usize>,
}

impl Default for StringProcessorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl StringProcessorChain {
    pub fn new() -> Self {
        Self {
            processors: vec![
                Box::new(DateProcessor),
                Box::new(BooleanProcessor),
                Box::new(NumberProcessor),
                Box::new(UuidProcessor),
                Box::new(ArrayProcessor),
                Box::new(XmlProcessor),
                Box::new(BinaryFileProcessor),
                Box::new(RealStringProcessor),
            ],
            cache: HashMap::new(),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn cached_processor(&self, table: &str, column: &str) -> Option<&'static str> {
        self.cache.get(&(table.to_lowercase(), column.to_lowercase()))
            .and_then(|i| self.processors.get(*i))
            .map(|p| p.name())
    }

    pub fn process(&mut self, table: &str, column: &ColumnMeta, bind_type: BindType, text: &str, ctx: &ProcessContext) -> Result<FluteValue> {
        let key = (table.to_lowercase(), column.name.to_lowercase());
        if let Some(index) = self.cache.get(&key).copied() {
            let processor = &self.processors[index];
            return match processor.process(text, column, bind_type, ctx)? {
                Some(value) => Ok(value),
                None => Err(processing_failure(table, column, bind_type, text, Some(processor.name()))),
            };
        }
        for (index, processor) in self.processors.iter().enumerate() {
            if !processor.accepts(bind_type) {
                continue;
            }
            if let Some(value) = processor.process(text, column, bind_type, ctx)? {
                tracing::trace!("String processor of {}.{}: {}", table, column.name, processor.name());
                self.cache.insert(key, index);
                return Ok(value);
            }
        }
        Err(processing_failure(table, column, bind_type, text, None))
    }
}

fn processing_failure(table: &str, column: &ColumnMeta, bind_type: BindType, text: &str, cached: Option<&str>) -> FluteError {
    let mut builder = ExceptionMessageBuilder::new();
    builder = match cached {
        Some(_) => builder
            .notice("The value could not be processed by the processor used for the column's other values.")
            .advice("Make sure every value of the column has the same format."),
        None => builder
            .notice("No string processor could process the value.")
            .advice("Make sure the value fits the type of the column."),
    };
    builder = builder
        .item_element("Table", table)
        .item_element("Column", &column.name)
        .item_element("Column Type", format!("{} ({})", column.db_type_name, column.jdbc_type))
        .item_element("Bind Type", format!("{:?}", bind_type))
        .item_element("Value", text);
    if let Some(name) = cached {
        builder = builder.item_element("Cached Processor", name);
    }
    FluteError::ColumnValueProcessing(builder.build())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use super::*;

    #[test]
    fn test_winner_is_cached_per_column() {
        let mut chain = StringProcessorChain::new();
        let ctx = ProcessContext::default();
        let birthdate = ColumnMeta::new("BIRTHDATE", JdbcType::Date, "DATE");
        let value = chain.process("MEMBER", &birthdate, BindType::Date, "1965-03-03", &ctx).unwrap();
        assert_eq!(value, FluteValue::Date(NaiveDate::from_ymd_opt(1965, 3, 3).unwrap()));
        assert_eq!(chain.cached_processor("member", "birthdate"), Some("Date"));

        let err = chain.process("MEMBER", &birthdate, BindType::Date, "someday", &ctx).unwrap_err();
        assert!(matches!(err, FluteError::ColumnValueProcessing(ref m) if m.contains("Cached Processor")));
    }

    #[test]
    fn test_falls_through_to_real_string() {
        let mut chain = StringProcessorChain::new();
        let ctx = ProcessContext::default();
        let memo = ColumnMeta::new("MEMO", JdbcType::Other, "jsonb");
        let value = chain.process("MEMBER", &memo, BindType::Object, "{\"a\": 1}", &ctx).unwrap();
        assert_eq!(value, FluteValue::Text("{\"a\": 1}".to_string()));
        assert_eq!(chain.cached_processor("MEMBER", "MEMO"), Some("RealString"));

        let id = ColumnMeta::new("MEMBER_ID", JdbcType::Integer, "INTEGER");
        assert_eq!(chain.process("MEMBER", &id, BindType::Number, " 42 ", &ctx).unwrap(), FluteValue::Int(42));
        let tags = ColumnMeta::new("TAGS", JdbcType::Array, "_text");
        assert_eq!(chain.process("MEMBER", &tags, BindType::Array, "{a, b}", &ctx).unwrap(),
                   FluteValue::Array(vec![FluteValue::Text("a".to_string()), FluteValue::Text("b".to_string())]));
    }

    #[test]
    fn test_binary_file_reference() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo.bin"), [1u8, 2, 3]).unwrap();
        let ctx = ProcessContext { data_dir: Some(dir.path().to_path_buf()) };
        let mut chain = StringProcessorChain::new();
        let photo = ColumnMeta::new("PHOTO", JdbcType::Blob, "BLOB");
        assert_eq!(chain.process("MEMBER", &photo, BindType::Binary, "photo.bin", &ctx).unwrap(), FluteValue::Blob(vec![1, 2, 3]));
        let err = chain.process("MEMBER", &photo, BindType::Binary, "missing.bin", &ctx).unwrap_err();
        assert!(matches!(err, FluteError::ColumnValueProcessing(_)));
    }
}
