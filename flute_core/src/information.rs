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
use std::fmt;
use std::hash::{Hash, Hasher};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::JdbcType;

/// How a schema takes part in an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemaSign {
    Main,
    Additional,
    /// Reached only through a synonym or a DB link.
    Unknown,
    #[default]
    Plain,
}

/// Catalog, schema and sign of a database object owner.
///
/// Equality and hashing ignore the sign and the case of names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedSchema {
    catalog: Option<String>,
    schema: Option<String>,
    sign: SchemaSign,
}

impl UnifiedSchema {
    pub fn new(catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self {
            catalog: catalog.filter(|v| !v.trim().is_empty()).map(|v| v.trim().to_string()),
            schema: schema.filter(|v| !v.trim().is_empty()).map(|v| v.trim().to_string()),
            sign: SchemaSign::Plain,
        }
    }

    pub fn main(catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self::new(catalog, schema).with_sign(SchemaSign::Main)
    }

    pub fn additional(catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self::new(catalog, schema).with_sign(SchemaSign::Additional)
    }

    pub fn unknown(catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self::new(catalog, schema).with_sign(SchemaSign::Unknown)
    }

    pub fn with_sign(mut self, sign: SchemaSign) -> Self {
        self.sign = sign;
        self
    }

    pub fn pure_catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn pure_schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn sign(&self) -> SchemaSign {
        self.sign
    }

    pub fn is_main_schema(&self) -> bool {
        self.sign == SchemaSign::Main
    }

    pub fn is_additional_schema(&self) -> bool {
        self.sign == SchemaSign::Additional
    }

    pub fn is_unknown_schema(&self) -> bool {
        self.sign == SchemaSign::Unknown
    }

    /// `catalog.schema`, or whichever part exists.
    pub fn catalog_schema(&self) -> String {
        match (&self.catalog, &self.schema) {
            (Some(c), Some(s)) => format!("{}.{}", c, s),
            (Some(c), None) => c.clone(),
            (None, Some(s)) => s.clone(),
            (None, None) => String::new(),
        }
    }

    /// Qualifies an object name with the schema (or catalog when there is no schema).
    pub fn qualify(&self, name: &str) -> String {
        match self.schema.as_ref().or(self.catalog.as_ref()) {
            Some(owner) => format!("{}.{}", owner, name),
            None => name.to_string(),
        }
    }

    fn identity(&self) -> (String, String) {
        (
            self.catalog.as_deref().unwrap_or_default().to_lowercase(),
            self.schema.as_deref().unwrap_or_default().to_lowercase(),
        )
    }
}

impl PartialEq for UnifiedSchema {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for UnifiedSchema {}

impl Hash for UnifiedSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for UnifiedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.catalog_schema())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TableType {
    #[default]
    Table,
    View,
    Synonym,
    Alias,
    Other(String),
}

impl TableType {
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "TABLE" | "BASE TABLE" => TableType::Table,
            "VIEW" | "SYSTEM VIEW" => TableType::View,
            "SYNONYM" => TableType::Synonym,
            "ALIAS" => TableType::Alias,
            other => TableType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TableType::Table => "TABLE",
            TableType::View => "VIEW",
            TableType::Synonym => "SYNONYM",
            TableType::Alias => "ALIAS",
            TableType::Other(v) => v.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub jdbc_type: JdbcType,
    /// Native type name as the DBMS reports it, e.g. `VARCHAR2`.
    pub db_type_name: String,
    pub column_size: Option<i32>,
    pub decimal_digits: Option<i32>,
    pub required: bool,
    pub default_value: Option<String>,
    pub comment: Option<String>,
    pub primary_key: bool,
    pub pk_name: Option<String>,
    pub auto_increment: bool,
}

impl ColumnMeta {
    pub fn new(name: &str, jdbc_type: JdbcType, db_type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            jdbc_type,
            db_type_name: db_type_name.to_string(),
            ..Default::default()
        }
    }

    /// `VARCHAR(20)` / `NUMERIC(10, 2)` style size expression.
    pub fn column_size_expression(&self) -> Option<String> {
        match (self.column_size, self.decimal_digits) {
            (Some(size), Some(digits)) if digits > 0 => Some(format!("{}, {}", size, digits)),
            (Some(size), _) => Some(size.to_string()),
            _ => None,
        }
    }
}

fn ordered_names(columns: &BTreeMap<i32, String>) -> Vec<String> {
    columns.values().cloned().collect()
}

fn contains_ignore_case(columns: &BTreeMap<i32, String>, name: &str) -> bool {
    columns.values().any(|c| c.eq_ignore_ascii_case(name))
}

/// Primary key columns keyed by their position in the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyMeta {
    pub name: Option<String>,
    pub columns: BTreeMap<i32, String>,
}

impl PrimaryKeyMeta {
    pub fn column_names(&self) -> Vec<String> {
        ordered_names(&self.columns)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        contains_ignore_case(&self.columns, name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

/// Unique key without its primary key columns; a column subset, not
/// necessarily a constraint the database enforces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueKeyMeta {
    pub name: String,
    pub columns: BTreeMap<i32, String>,
}

impl UniqueKeyMeta {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), columns: BTreeMap::new() }
    }

    pub fn column_names(&self) -> Vec<String> {
        ordered_names(&self.columns)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        contains_ignore_case(&self.columns, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub non_unique: bool,
    pub index_type: i16,
    pub columns: BTreeMap<i32, String>,
    /// `A` or `D` per position when the driver reports it.
    pub sort_orders: BTreeMap<i32, String>,
}

impl IndexMeta {
    pub fn new(name: &str, non_unique: bool, index_type: i16) -> Self {
        Self {
            name: name.to_string(),
            non_unique,
            index_type,
            ..Default::default()
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        ordered_names(&self.columns)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyMeta {
    pub name: String,
    pub local_schema: UnifiedSchema,
    pub local_table: String,
    pub foreign_schema: UnifiedSchema,
    pub foreign_table: String,
    /// Local column to foreign column, in key order.
    pub column_pairs: IndexMap<String, String>,
}

impl ForeignKeyMeta {
    pub fn local_columns(&self) -> Vec<String> {
        self.column_pairs.keys().cloned().collect()
    }

    pub fn foreign_columns(&self) -> Vec<String> {
        self.column_pairs.values().cloned().collect()
    }

    pub fn foreign_table_key(&self) -> String {
        self.foreign_schema.qualify(&self.foreign_table).to_lowercase()
    }

    /// Same target and the same column mapping, ignoring the constraint name.
    pub fn same_structure(&self, other: &ForeignKeyMeta) -> bool {
        if self.foreign_table_key() != other.foreign_table_key() {
            return false;
        }
        if self.column_pairs.len() != other.column_pairs.len() {
            return false;
        }
        self.column_pairs.iter().zip(other.column_pairs.iter()).all(|((l1, f1), (l2, f2))| {
            l1.eq_ignore_ascii_case(l2) && f1.eq_ignore_ascii_case(f2)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub schema: UnifiedSchema,
    pub table_type: TableType,
    pub comment: Option<String>,
    pub columns: Vec<ColumnMeta>,
    pub primary_key: Option<PrimaryKeyMeta>,
    pub unique_keys: IndexMap<String, UniqueKeyMeta>,
    pub indexes: IndexMap<String, IndexMeta>,
    pub foreign_keys: IndexMap<String, ForeignKeyMeta>,
    /// Another extracted schema owns a table with the same name.
    pub same_name_table_exists: bool,
}

impl TableMeta {
    pub fn new(schema: UnifiedSchema, name: &str, table_type: TableType) -> Self {
        Self {
            name: name.to_string(),
            schema,
            table_type,
            ..Default::default()
        }
    }

    /// Lowercased `schema.name`, the identity of a table.
    pub fn table_key(&self) -> String {
        self.schema.qualify(&self.name).to_lowercase()
    }

    pub fn table_full_qualified_name(&self) -> String {
        self.schema.qualify(&self.name)
    }

    /// Name to use in SQL: schema-qualified unless the table is in the main schema.
    pub fn table_sql_name(&self) -> String {
        if self.schema.is_main_schema() && !self.same_name_table_exists {
            self.name.clone()
        } else {
            self.table_full_qualified_name()
        }
    }

    pub fn is_view(&self) -> bool {
        self.table_type == TableType::View
    }

    pub fn is_synonym(&self) -> bool {
        self.table_type == TableType::Synonym
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key_column_names(&self) -> Vec<String> {
        self.primary_key.as_ref().map(|pk| pk.column_names()).unwrap_or_default()
    }
}

/// Synonym and what it points at. Keys are copied here when the target
/// cannot be reached through regular metadata (DB link).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynonymMeta {
    pub synonym_owner: UnifiedSchema,
    pub synonym_name: String,
    pub table_owner: UnifiedSchema,
    pub table_name: String,
    pub db_link_name: Option<String>,
    pub selectable: bool,
    pub table_comment: Option<String>,
    pub columns: Vec<ColumnMeta>,
    pub primary_key: Option<PrimaryKeyMeta>,
    pub unique_keys: IndexMap<String, UniqueKeyMeta>,
    pub indexes: IndexMap<String, IndexMeta>,
    pub foreign_keys: IndexMap<String, ForeignKeyMeta>,
}

impl SynonymMeta {
    pub fn is_db_link(&self) -> bool {
        self.db_link_name.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
    }

    pub fn synonym_key(&self) -> String {
        self.synonym_owner.qualify(&self.synonym_name).to_lowercase()
    }

    pub fn table_key(&self) -> String {
        self.table_owner.qualify(&self.table_name).to_lowercase()
    }

    /// `OWNER.TABLE@LINK` for DB links, `OWNER.TABLE` otherwise.
    pub fn table_sql_name(&self) -> String {
        let qualified = self.table_owner.qualify(&self.table_name);
        match &self.db_link_name {
            Some(link) if !link.trim().is_empty() => format!("{}@{}", qualified, link),
            _ => qualified,
        }
    }
}

/// Direction of a procedure parameter (`COLUMN_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProcedureColumnType {
    #[default]
    Unknown,
    In,
    InOut,
    Result,
    Out,
    Return,
}

impl ProcedureColumnType {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => ProcedureColumnType::In,
            2 => ProcedureColumnType::InOut,
            3 => ProcedureColumnType::Result,
            4 => ProcedureColumnType::Out,
            5 => ProcedureColumnType::Return,
            _ => ProcedureColumnType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureColumnType::Unknown => "unknown",
            ProcedureColumnType::In => "in",
            ProcedureColumnType::InOut => "inout",
            ProcedureColumnType::Result => "result",
            ProcedureColumnType::Out => "out",
            ProcedureColumnType::Return => "return",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcedureType {
    #[default]
    Unknown,
    NoResult,
    ReturnsResult,
}

impl ProcedureType {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => ProcedureType::NoResult,
            2 => ProcedureType::ReturnsResult,
            _ => ProcedureType::Unknown,
        }
    }
}

/// Oracle collection type (`VARRAY` / nested table).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeArrayMeta {
    pub owner: String,
    pub type_name: String,
    pub element_type_name: String,
    pub element_jdbc_type: JdbcType,
    pub nested_array: Option<Box<TypeArrayMeta>>,
    pub element_struct: Option<Box<TypeStructMeta>>,
}

impl TypeArrayMeta {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.type_name)
    }
}

/// Oracle object type and its attributes in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeStructMeta {
    pub owner: String,
    pub type_name: String,
    pub attributes: IndexMap<String, ColumnMeta>,
}

impl TypeStructMeta {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.type_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcedureColumnMeta {
    pub name: String,
    pub column_type: ProcedureColumnType,
    pub jdbc_type: JdbcType,
    pub db_type_name: String,
    pub column_size: Option<i32>,
    pub decimal_digits: Option<i32>,
    pub comment: Option<String>,
    pub type_array: Option<TypeArrayMeta>,
    pub type_struct: Option<TypeStructMeta>,
    /// Columns of the cursor this parameter returns, when known.
    pub result_set_columns: Vec<ColumnMeta>,
}

impl ProcedureColumnMeta {
    pub fn is_input(&self) -> bool {
        matches!(self.column_type, ProcedureColumnType::In | ProcedureColumnType::InOut)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.column_type, ProcedureColumnType::Out | ProcedureColumnType::InOut | ProcedureColumnType::Return)
    }

    pub fn is_cursor(&self) -> bool {
        let type_name = self.db_type_name.to_lowercase();
        self.jdbc_type == JdbcType::RefCursor
            || type_name.contains("refcursor")
            || type_name.contains("ref cursor")
            || (self.jdbc_type == JdbcType::Other && type_name.contains("cursor"))
    }

    pub fn is_void_return(&self) -> bool {
        self.column_type == ProcedureColumnType::Return && self.db_type_name.eq_ignore_ascii_case("void")
    }
}

/// Result set returned by a procedure without a bound parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcedureNotParamResult {
    pub property_name: String,
    pub columns: Vec<ColumnMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcedureMeta {
    pub schema: UnifiedSchema,
    pub package: Option<String>,
    pub name: String,
    pub procedure_type: ProcedureType,
    pub comment: Option<String>,
    pub columns: Vec<ProcedureColumnMeta>,
    pub not_param_results: Vec<ProcedureNotParamResult>,
    /// Reached through a synonym rather than owned by the schema.
    pub synonym: bool,
}

impl ProcedureMeta {
    /// `PACKAGE.NAME` or `NAME`.
    pub fn procedure_name_with_package(&self) -> String {
        match &self.package {
            Some(package) => format!("{}.{}", package, self.name),
            None => self.name.clone(),
        }
    }

    pub fn procedure_full_qualified_name(&self) -> String {
        self.schema.qualify(&self.procedure_name_with_package())
    }

    /// Name used in the call escape; main schema procedures stay unqualified.
    pub fn procedure_sql_name(&self) -> String {
        if self.schema.is_main_schema() {
            self.procedure_name_with_package()
        } else {
            self.procedure_full_qualified_name()
        }
    }

    /// Identity across schemas: lowercased package and name.
    pub fn procedure_key(&self) -> String {
        self.procedure_name_with_package().to_lowercase()
    }

    pub fn has_return(&self) -> bool {
        self.columns.iter().any(|c| c.column_type == ProcedureColumnType::Return)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_schema_equality_ignores_case_and_sign() {
        let a = UnifiedSchema::main(None, Some("EXAMPLEDB"));
        let b = UnifiedSchema::additional(None, Some("exampledb"));
        assert_eq!(a, b);
        assert_eq!(a.catalog_schema(), "EXAMPLEDB");
        assert_eq!(UnifiedSchema::new(Some("cat"), Some("sch")).catalog_schema(), "cat.sch");
        assert_eq!(UnifiedSchema::new(Some(" "), None).pure_catalog(), None);
    }

    #[test]
    fn test_key_positions_are_ordered() {
        let mut pk = PrimaryKeyMeta::default();
        pk.columns.insert(2, "SECOND_ID".to_string());
        pk.columns.insert(1, "FIRST_ID".to_string());
        assert_eq!(pk.column_names(), vec!["FIRST_ID", "SECOND_ID"]);
        assert!(pk.contains_column("first_id"));
        assert!(pk.is_composite());
    }

    #[test]
    fn test_foreign_key_same_structure() {
        let mut fk1 = ForeignKeyMeta {
            name: "FK_A".to_string(),
            local_table: "PURCHASE".to_string(),
            foreign_table: "MEMBER".to_string(),
            ..Default::default()
        };
        fk1.column_pairs.insert("MEMBER_ID".to_string(), "MEMBER_ID".to_string());
        let mut fk2 = fk1.clone();
        fk2.name = "FK_B".to_string();
        assert!(fk1.same_structure(&fk2));
        fk2.foreign_table = "MEMBER_STATUS".to_string();
        assert!(!fk1.same_structure(&fk2));
    }

    #[test]
    fn test_procedure_names() {
        let procedure = ProcedureMeta {
            schema: UnifiedSchema::additional(None, Some("NEXTSCHEMA")),
            package: Some("PKG".to_string()),
            name: "SP_FOO".to_string(),
            ..Default::default()
        };
        assert_eq!(procedure.procedure_sql_name(), "NEXTSCHEMA.PKG.SP_FOO");
        assert_eq!(procedure.procedure_key(), "pkg.sp_foo");
    }

    #[test]
    fn test_procedure_column_cursor_detection() {
        let mut column = ProcedureColumnMeta {
            jdbc_type: JdbcType::Other,
            db_type_name: "refcursor".to_string(),
            ..Default::default()
        };
        assert!(column.is_cursor());
        column.db_type_name = "varchar".to_string();
        assert!(!column.is_cursor());
    }
}
