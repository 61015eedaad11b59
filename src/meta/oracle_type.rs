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
use indexmap::IndexMap;
use flute_core::{ColumnMeta, FluteValue, JdbcType, Row, TypeArrayMeta, TypeStructMeta, UnifiedSchema};
use crate::driver::DbConnection;
use crate::errors::Result;
use crate::meta::query_rows;

const COLL_TYPES_SQL: &str = "select OWNER, TYPE_NAME, ELEM_TYPE_OWNER, ELEM_TYPE_NAME \
    from ALL_COLL_TYPES where OWNER = ? order by TYPE_NAME";

const TYPE_ATTRS_SQL: &str = "select OWNER, TYPE_NAME, ATTR_NAME, ATTR_TYPE_OWNER, ATTR_TYPE_NAME, \
    LENGTH, PRECISION, SCALE, ATTR_NO from ALL_TYPE_ATTRS where OWNER = ? order by TYPE_NAME, ATTR_NO";

/// Oracle collection and object types of one schema, keyed by `OWNER.TYPE_NAME`.
#[derive(Debug, Clone, Default)]
pub struct OracleTypeMap {
    pub arrays: IndexMap<String, TypeArrayMeta>,
    pub structs: IndexMap<String, TypeStructMeta>,
}

impl OracleTypeMap {
    /// Looks a parameter type up, qualified or relative to the schema.
    pub fn find_array(&self, schema: &UnifiedSchema, db_type_name: &str) -> Option<&TypeArrayMeta> {
        type_keys(schema, db_type_name).iter().find_map(|k| self.arrays.get(k))
    }

    pub fn find_struct(&self, schema: &UnifiedSchema, db_type_name: &str) -> Option<&TypeStructMeta> {
        type_keys(schema, db_type_name).iter().find_map(|k| self.structs.get(k))
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty() && self.structs.is_empty()
    }
}

fn type_keys(schema: &UnifiedSchema, db_type_name: &str) -> Vec<String> {
    let name = db_type_name.trim().to_uppercase();
    if name.contains('.') {
        vec![name]
    } else {
        vec![schema.qualify(&name).to_uppercase(), name]
    }
}

fn type_key(owner: &str, type_name: &str) -> String {
    format!("{}.{}", owner, type_name).to_uppercase()
}

pub struct OracleTypeExtractor<'a> {
    conn: &'a dyn DbConnection,
}

impl<'a> OracleTypeExtractor<'a> {
    pub fn new(conn: &'a dyn DbConnection) -> Self {
        Self { conn }
    }

    /// Reads `ALL_COLL_TYPES` and `ALL_TYPE_ATTRS` and links element and
    /// attribute types to the types of the same map.
    pub fn extract(&self, schema: &UnifiedSchema) -> Result<OracleTypeMap> {
        let owner = match schema.pure_schema() {
            Some(owner) => owner.to_uppercase(),
            None => return Ok(OracleTypeMap::default()),
        };
        let param = [FluteValue::Text(owner)];
        let mut structs = IndexMap::new();
        for row in query_rows(self.conn, TYPE_ATTRS_SQL, &param)?.iter() {
            let (key, attribute) = attribute_of(row)?;
            let type_struct = structs.entry(key).or_insert_with(|| TypeStructMeta {
                owner: row.get::<String>("OWNER").unwrap_or_default(),
                type_name: row.get::<String>("TYPE_NAME").unwrap_or_default(),
                attributes: IndexMap::new(),
            });
            type_struct.attributes.insert(attribute.name.clone(), attribute);
        }

        let mut arrays = IndexMap::new();
        for row in query_rows(self.conn, COLL_TYPES_SQL, &param)?.iter() {
            let owner: String = row.get("OWNER")?;
            let type_name: String = row.get("TYPE_NAME")?;
            let element_owner: Option<String> = row.get_opt("ELEM_TYPE_OWNER")?;
            let element_type_name: String = row.get("ELEM_TYPE_NAME")?;
            let element_type_name = match element_owner {
                Some(element_owner) if !element_owner.trim().is_empty() => format!("{}.{}", element_owner, element_type_name),
                _ => element_type_name,
            };
            arrays.insert(type_key(&owner, &type_name), TypeArrayMeta {
                owner,
                type_name,
                element_jdbc_type: oracle_jdbc_type(&element_type_name),
                element_type_name,
                nested_array: None,
                element_struct: None,
            });
        }

        let mut map = OracleTypeMap { arrays, structs };
        link_nested_types(&mut map);
        Ok(map)
    }
}

fn attribute_of(row: &Row) -> Result<(String, ColumnMeta)> {
    let owner: String = row.get("OWNER")?;
    let type_name: String = row.get("TYPE_NAME")?;
    let attr_name: String = row.get("ATTR_NAME")?;
    let attr_owner: Option<String> = row.get_opt("ATTR_TYPE_OWNER")?;
    let attr_type: String = row.get("ATTR_TYPE_NAME")?;
    let db_type_name = match attr_owner {
        Some(attr_owner) if !attr_owner.trim().is_empty() => format!("{}.{}", attr_owner, attr_type),
        _ => attr_type,
    };
    let mut column = ColumnMeta::new(&attr_name, oracle_jdbc_type(&db_type_name), &db_type_name);
    column.column_size = row.get_opt::<i32>("PRECISION")?.or(row.get_opt::<i32>("LENGTH")?);
    column.decimal_digits = row.get_opt("SCALE")?;
    Ok((type_key(&owner, &type_name), column))
}

/// Element or attribute type of an Oracle type, by name.
pub(crate) fn oracle_jdbc_type(db_type_name: &str) -> JdbcType {
    let name = db_type_name.to_uppercase();
    let base = name.split('(').next().unwrap_or_default().trim();
    match base {
        "VARCHAR2" | "VARCHAR" | "NVARCHAR2" => JdbcType::Varchar,
        "CHAR" | "NCHAR" => JdbcType::Char,
        "NUMBER" | "INTEGER" | "FLOAT" | "BINARY_DOUBLE" | "BINARY_FLOAT" => JdbcType::Numeric,
        "DATE" => JdbcType::Timestamp,
        "CLOB" | "NCLOB" => JdbcType::Clob,
        "BLOB" => JdbcType::Blob,
        "RAW" => JdbcType::Varbinary,
        _ if base.starts_with("TIMESTAMP") => JdbcType::Timestamp,
        // user defined, resolved by the linking pass
        _ => JdbcType::Other,
    }
}

/// Points every array element at the array or struct it names, nesting
/// as deep as the definitions go. Cyclic definitions stop at the repeat.
fn link_nested_types(map: &mut OracleTypeMap) {
    let struct_keys: HashSet<String> = map.structs.keys().cloned().collect();
    for attribute in map.structs.values_mut().flat_map(|s| s.attributes.values_mut()) {
        if attribute.jdbc_type != JdbcType::Other {
            continue;
        }
        let key = attribute.db_type_name.to_uppercase();
        if map.arrays.contains_key(&key) {
            attribute.jdbc_type = JdbcType::Array;
        } else if struct_keys.contains(&key) {
            attribute.jdbc_type = JdbcType::Struct;
        }
    }
    let source = map.clone();
    for array in map.arrays.values_mut() {
        let mut visiting = HashSet::new();
        visiting.insert(array.qualified_name().to_uppercase());
        resolve_element(array, &source, &mut visiting);
    }
}

fn resolve_element(array: &mut TypeArrayMeta, source: &OracleTypeMap, visiting: &mut HashSet<String>) {
    let key = qualify_element(array);
    if !visiting.insert(key.clone()) {
        tracing::warn!("Cyclic Oracle type definition: {}", key);
        return;
    }
    if let Some(nested) = source.arrays.get(&key) {
        let mut nested = nested.clone();
        resolve_element(&mut nested, source, visiting);
        array.element_jdbc_type = JdbcType::Array;
        array.nested_array = Some(Box::new(nested));
    } else if let Some(element_struct) = source.structs.get(&key) {
        array.element_jdbc_type = JdbcType::Struct;
        array.element_struct = Some(Box::new(element_struct.clone()));
    }
    visiting.remove(&key);
}

fn qualify_element(array: &TypeArrayMeta) -> String {
    if array.element_type_name.contains('.') {
        array.element_type_name.to_uppercase()
    } else {
        type_key(&array.owner, &array.element_type_name)
    }
}

#[cfg(test)]
mod tests {
    use flute_core::Rows;
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use crate::driver::Dbms;
    use super::*;

    fn rows(columns: &[&str], data: Vec<Vec<FluteValue>>) -> Rows {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        data.into_iter().map(|d| Row::new(columns.clone(), d)).collect::<Vec<_>>().into()
    }

    fn text(v: &str) -> FluteValue {
        FluteValue::Text(v.to_string())
    }

    #[test]
    fn test_nested_types_are_linked() {
        let conn = FakeConnection::new(Dbms::Oracle, FakeMetaData::new("Oracle"));
        conn.db.query_results.borrow_mut().push_back(rows(
            &["OWNER", "TYPE_NAME", "ATTR_NAME", "ATTR_TYPE_OWNER", "ATTR_TYPE_NAME", "LENGTH", "PRECISION", "SCALE", "ATTR_NO"],
            vec![
                vec![text("EXAMPLEDB"), text("MEMBER_TYPE"), text("MEMBER_ID"), FluteValue::Null, text("NUMBER"), FluteValue::Null, FluteValue::Int(16), FluteValue::Int(0), FluteValue::Int(1)],
                vec![text("EXAMPLEDB"), text("MEMBER_TYPE"), text("MEMBER_NAME"), FluteValue::Null, text("VARCHAR2"), FluteValue::Int(200), FluteValue::Null, FluteValue::Null, FluteValue::Int(2)],
            ],
        ));
        conn.db.query_results.borrow_mut().push_back(rows(
            &["OWNER", "TYPE_NAME", "ELEM_TYPE_OWNER", "ELEM_TYPE_NAME"],
            vec![
                vec![text("EXAMPLEDB"), text("MEMBER_TABLE"), text("EXAMPLEDB"), text("MEMBER_TYPE")],
                vec![text("EXAMPLEDB"), text("MEMBER_MATRIX"), text("EXAMPLEDB"), text("MEMBER_TABLE")],
                vec![text("EXAMPLEDB"), text("NAME_LIST"), FluteValue::Null, text("VARCHAR2")],
            ],
        ));
        let schema = UnifiedSchema::main(None, Some("EXAMPLEDB"));
        let map = OracleTypeExtractor::new(&conn).extract(&schema).unwrap();

        let member = map.find_struct(&schema, "MEMBER_TYPE").unwrap();
        assert_eq!(member.attributes.len(), 2);
        assert_eq!(member.attributes["MEMBER_ID"].column_size, Some(16));
        assert_eq!(member.attributes["MEMBER_NAME"].column_size, Some(200));

        let table = map.find_array(&schema, "EXAMPLEDB.MEMBER_TABLE").unwrap();
        assert_eq!(table.element_jdbc_type, JdbcType::Struct);
        assert_eq!(table.element_struct.as_ref().unwrap().type_name, "MEMBER_TYPE");

        let matrix = map.find_array(&schema, "member_matrix").unwrap();
        assert_eq!(matrix.element_jdbc_type, JdbcType::Array);
        let nested = matrix.nested_array.as_ref().unwrap();
        assert_eq!(nested.type_name, "MEMBER_TABLE");
        assert!(nested.element_struct.is_some());

        let names = map.find_array(&schema, "NAME_LIST").unwrap();
        assert_eq!(names.element_jdbc_type, JdbcType::Varchar);
        assert!(names.nested_array.is_none());
    }

    #[test]
    fn test_no_owner_reads_nothing() {
        let conn = FakeConnection::new(Dbms::Oracle, FakeMetaData::new("Oracle"));
        let map = OracleTypeExtractor::new(&conn).extract(&UnifiedSchema::main(Some("X"), None)).unwrap();
        assert!(map.is_empty());
        assert!(conn.db.log().is_empty());
    }
}
