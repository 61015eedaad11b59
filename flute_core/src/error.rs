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

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    TypeMismatch {
        expected: String,
        found: String,
    },
    NotSupported(String, String),
    NullValue {
        target_type: String,
    },
    NumericOverflow {
        target_type: String,
    },
    ParseError {
        message: String,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            ConversionError::NullValue { target_type } => {
                write!(f, "Cannot convert null value to {}", target_type)
            }
            ConversionError::NumericOverflow { target_type } => {
                write!(f, "Numeric overflow when converting to {}", target_type)
            }
            ConversionError::ParseError { message } => write!(f, "Parse error: {}", message),
            ConversionError::NotSupported(k, v) => write!(f, "NotSupported `{}` :`{}`", k, v),
        }
    }
}

impl std::error::Error for ConversionError {}

impl From<serde_json::Error> for ConversionError {
    fn from(err: serde_json::Error) -> Self {
        ConversionError::NotSupported(err.to_string(), "SerdeJson".to_string())
    }
}

impl ConversionError {
    pub fn parse_error<T: Into<String>>(err: T) -> Self {
        Self::ParseError { message: err.into() }
    }

    pub fn type_mismatch_error<T: Into<String>, E: Into<String>>(expected: T, found: E) -> Self {
        Self::TypeMismatch { expected: expected.into(), found: found.into() }
    }

    pub fn not_supported_error<T: Into<String>, E: Into<String>>(field: T, expected: E) -> Self {
        Self::NotSupported(field.into(), expected.into())
    }

    pub fn null_value_error<T: Into<String>>(target_type: T) -> Self {
        Self::NullValue { target_type: target_type.into() }
    }

    pub fn numeric_overflow_error<T: Into<String>>(target_type: T) -> Self {
        Self::NumericOverflow { target_type: target_type.into() }
    }
}

/// Errors raised while reading values out of rows and metadata records.
#[derive(Debug, Clone, PartialEq)]
pub enum FluteDataError {
    NoSuchColumn(String),
    ConversionError(ConversionError),
    IndexOutOfBounds(usize, usize),
}

impl FluteDataError {
    pub fn parse_error<T: Into<String>>(err: T) -> Self {
        Self::ConversionError(ConversionError::parse_error(err))
    }

    pub fn type_mismatch_error<T: Into<String>, E: Into<String>>(expected: T, found: E) -> Self {
        Self::ConversionError(ConversionError::type_mismatch_error(expected, found))
    }

    pub fn null_value_error<T: Into<String>>(target_type: T) -> Self {
        Self::ConversionError(ConversionError::null_value_error(target_type))
    }
}

impl From<ConversionError> for FluteDataError {
    fn from(err: ConversionError) -> Self {
        FluteDataError::ConversionError(err)
    }
}

impl fmt::Display for FluteDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FluteDataError::ConversionError(e) => write!(f, "Conversion Data Error: {e}"),
            FluteDataError::NoSuchColumn(e) => write!(f, "No Such Column: {e}"),
            FluteDataError::IndexOutOfBounds(i, u) => write!(f, "IndexOutOfBoundsException: Index: {i}, Size: {u}"),
        }
    }
}

impl std::error::Error for FluteDataError {}
