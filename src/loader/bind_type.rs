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
use flute_core::{ColumnMeta, JdbcType};
use crate::driver::Dbms;

/// What kind of value a column takes when a text cell is bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindType {
    String,
    Number,
    Date,
    Timestamp,
    Time,
    Boolean,
    Uuid,
    Array,
    Xml,
    Binary,
    Object,
}

impl BindType {
    /// Derives the bind type from the JDBC type, falling back to the DB type
    /// name for types drivers report as OTHER.
    pub fn of(dbms: Dbms, column: &ColumnMeta) -> Self {
        let db_type = column.db_type_name.to_lowercase();
        if db_type == "uuid" || db_type == "uniqueidentifier" {
            return BindType::Uuid;
        }
        if db_type.contains("xml") {
            return BindType::Xml;
        }
        // PostgreSQL names array types with a leading underscore
        if db_type.ends_with("[]") || (dbms == Dbms::PostgreSQL && db_type.starts_with('_')) {
            return BindType::Array;
        }
        match column.jdbc_type {
            t if t.is_string() => BindType::String,
            JdbcType::Bit | JdbcType::Boolean => {
                // MySQL BIT(n) is a bit field, not a flag
                if dbms == Dbms::MySQL && column.column_size.map(|s| s > 1).unwrap_or(false) {
                    BindType::Number
                } else {
                    BindType::Boolean
                }
            }
            t if t.is_numeric() => BindType::Number,
            JdbcType::Date if dbms == Dbms::Oracle => BindType::Timestamp,
            JdbcType::Date => BindType::Date,
            JdbcType::Time | JdbcType::TimeWithTimezone => BindType::Time,
            JdbcType::Timestamp | JdbcType::TimestampWithTimezone => BindType::Timestamp,
            JdbcType::Array => BindType::Array,
            JdbcType::Sqlxml => BindType::Xml,
            t if t.is_binary() => BindType::Binary,
            _ => BindType::Object,
        }
    }
}

/// Caches the bind type per column of the tables being written.
#[derive(Debug)]
pub struct BindTypeResolver {
    dbms: Dbms,
    cache: HashMap<(String, String), BindType>,
}

impl BindTypeResolver {
    pub fn new(dbms: Dbms) -> Self {
        Self { dbms, cache: HashMap::new() }
    }

    pub fn resolve(&mut self, table: &str, column: &ColumnMeta) -> BindType {
        let dbms = self.dbms;
        *self.cache
            .entry((table.to_lowercase(), column.name.to_lowercase()))
            .or_insert_with(|| BindType::of(dbms, column))
    }

    pub fn cached(&self, table: &str, column: &str) -> Option<BindType> {
        self.cache.get(&(table.to_lowercase(), column.to_lowercase())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(jdbc_type: JdbcType, db_type: &str) -> ColumnMeta {
        ColumnMeta::new("C", jdbc_type, db_type)
    }

    #[test]
    fn test_bind_types() {
        assert_eq!(BindType::of(Dbms::H2, &column(JdbcType::Varchar, "VARCHAR")), BindType::String);
        assert_eq!(BindType::of(Dbms::Oracle, &column(JdbcType::Date, "DATE")), BindType::Timestamp);
        assert_eq!(BindType::of(Dbms::H2, &column(JdbcType::Date, "DATE")), BindType::Date);
        assert_eq!(BindType::of(Dbms::PostgreSQL, &column(JdbcType::Other, "uuid")), BindType::Uuid);
        assert_eq!(BindType::of(Dbms::PostgreSQL, &column(JdbcType::Other, "_int4")), BindType::Array);
        assert_eq!(BindType::of(Dbms::PostgreSQL, &column(JdbcType::Other, "xml")), BindType::Xml);
        assert_eq!(BindType::of(Dbms::PostgreSQL, &column(JdbcType::Binary, "bytea")), BindType::Binary);
        assert_eq!(BindType::of(Dbms::PostgreSQL, &column(JdbcType::Other, "jsonb")), BindType::Object);

        let mut bits = column(JdbcType::Bit, "BIT");
        assert_eq!(BindType::of(Dbms::MySQL, &bits), BindType::Boolean);
        bits.column_size = Some(8);
        assert_eq!(BindType::of(Dbms::MySQL, &bits), BindType::Number);
    }

    #[test]
    fn test_resolver_caches_per_column() {
        let mut resolver = BindTypeResolver::new(Dbms::H2);
        assert_eq!(resolver.cached("MEMBER", "BIRTHDATE"), None);
        let birthdate = ColumnMeta::new("BIRTHDATE", JdbcType::Date, "DATE");
        assert_eq!(resolver.resolve("MEMBER", &birthdate), BindType::Date);
        assert_eq!(resolver.cached("member", "birthdate"), Some(BindType::Date));
    }
}
