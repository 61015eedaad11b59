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

use serde::{Deserialize, Serialize};

/// Generic SQL type codes as reported by catalog metadata (`DATA_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JdbcType {
    Bit,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    Varchar,
    Longvarchar,
    Date,
    Time,
    Timestamp,
    Binary,
    Varbinary,
    Longvarbinary,
    Null,
    #[default]
    Other,
    JavaObject,
    Distinct,
    Struct,
    Array,
    Blob,
    Clob,
    Ref,
    Datalink,
    Boolean,
    Rowid,
    Nchar,
    Nvarchar,
    Longnvarchar,
    Nclob,
    Sqlxml,
    RefCursor,
    TimeWithTimezone,
    TimestampWithTimezone,
    Unknown(i32),
}

const KNOWN: &[(JdbcType, i32, &str)] = &[
    (JdbcType::Bit, -7, "BIT"),
    (JdbcType::Tinyint, -6, "TINYINT"),
    (JdbcType::Smallint, 5, "SMALLINT"),
    (JdbcType::Integer, 4, "INTEGER"),
    (JdbcType::Bigint, -5, "BIGINT"),
    (JdbcType::Float, 6, "FLOAT"),
    (JdbcType::Real, 7, "REAL"),
    (JdbcType::Double, 8, "DOUBLE"),
    (JdbcType::Numeric, 2, "NUMERIC"),
    (JdbcType::Decimal, 3, "DECIMAL"),
    (JdbcType::Char, 1, "CHAR"),
    (JdbcType::Varchar, 12, "VARCHAR"),
    (JdbcType::Longvarchar, -1, "LONGVARCHAR"),
    (JdbcType::Date, 91, "DATE"),
    (JdbcType::Time, 92, "TIME"),
    (JdbcType::Timestamp, 93, "TIMESTAMP"),
    (JdbcType::Binary, -2, "BINARY"),
    (JdbcType::Varbinary, -3, "VARBINARY"),
    (JdbcType::Longvarbinary, -4, "LONGVARBINARY"),
    (JdbcType::Null, 0, "NULL"),
    (JdbcType::Other, 1111, "OTHER"),
    (JdbcType::JavaObject, 2000, "JAVA_OBJECT"),
    (JdbcType::Distinct, 2001, "DISTINCT"),
    (JdbcType::Struct, 2002, "STRUCT"),
    (JdbcType::Array, 2003, "ARRAY"),
    (JdbcType::Blob, 2004, "BLOB"),
    (JdbcType::Clob, 2005, "CLOB"),
    (JdbcType::Ref, 2006, "REF"),
    (JdbcType::Datalink, 70, "DATALINK"),
    (JdbcType::Boolean, 16, "BOOLEAN"),
    (JdbcType::Rowid, -8, "ROWID"),
    (JdbcType::Nchar, -15, "NCHAR"),
    (JdbcType::Nvarchar, -9, "NVARCHAR"),
    (JdbcType::Longnvarchar, -16, "LONGNVARCHAR"),
    (JdbcType::Nclob, 2011, "NCLOB"),
    (JdbcType::Sqlxml, 2009, "SQLXML"),
    (JdbcType::RefCursor, 2012, "REF_CURSOR"),
    (JdbcType::TimeWithTimezone, 2013, "TIME_WITH_TIMEZONE"),
    (JdbcType::TimestampWithTimezone, 2014, "TIMESTAMP_WITH_TIMEZONE"),
];

impl JdbcType {
    pub fn from_code(code: i32) -> Self {
        KNOWN.iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| *t)
            .unwrap_or(JdbcType::Unknown(code))
    }

    pub fn code(&self) -> i32 {
        match self {
            JdbcType::Unknown(code) => *code,
            known => KNOWN.iter()
                .find(|(t, _, _)| t == known)
                .map(|(_, c, _)| *c)
                .unwrap_or(1111),
        }
    }

    pub fn name(&self) -> String {
        match self {
            JdbcType::Unknown(code) => format!("UNKNOWN({})", code),
            known => KNOWN.iter()
                .find(|(t, _, _)| t == known)
                .map(|(_, _, n)| n.to_string())
                .unwrap_or_else(|| "OTHER".to_string()),
        }
    }

    /// Resolves a type name as written in configuration, e.g. `VARCHAR`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_uppercase();
        KNOWN.iter().find(|(_, _, n)| *n == upper).map(|(t, _, _)| *t)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JdbcType::Char | JdbcType::Varchar | JdbcType::Longvarchar
            | JdbcType::Nchar | JdbcType::Nvarchar | JdbcType::Longnvarchar
            | JdbcType::Clob | JdbcType::Nclob)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, JdbcType::Tinyint | JdbcType::Smallint | JdbcType::Integer | JdbcType::Bigint)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, JdbcType::Float | JdbcType::Real | JdbcType::Double
            | JdbcType::Numeric | JdbcType::Decimal)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, JdbcType::Date | JdbcType::Time | JdbcType::Timestamp
            | JdbcType::TimeWithTimezone | JdbcType::TimestampWithTimezone)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, JdbcType::Binary | JdbcType::Varbinary | JdbcType::Longvarbinary | JdbcType::Blob)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, JdbcType::Bit | JdbcType::Boolean)
    }
}

impl std::fmt::Display for JdbcType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip_for_null_candidates() {
        assert_eq!(JdbcType::Varchar.code(), 12);
        assert_eq!(JdbcType::Numeric.code(), 2);
        assert_eq!(JdbcType::Timestamp.code(), 93);
        assert_eq!(JdbcType::Other.code(), 1111);
        assert_eq!(JdbcType::from_code(-9), JdbcType::Nvarchar);
    }

    #[test]
    fn test_unknown_code_is_preserved() {
        let t = JdbcType::from_code(-101);
        assert_eq!(t, JdbcType::Unknown(-101));
        assert_eq!(t.code(), -101);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(JdbcType::from_name("varchar"), Some(JdbcType::Varchar));
        assert_eq!(JdbcType::from_name("nope"), None);
    }
}
