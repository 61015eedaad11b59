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
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use flute_core::{ColumnMeta, JdbcType, ProcedureMeta, TableMeta};
use crate::errors::{FluteError, Result};
use crate::schema::DatabaseMeta;

/// Writes the schema model as the XML document the generators read.
pub struct SchemaXmlWriter<W: Write> {
    writer: Writer<W>,
}

fn xml_error<E: std::fmt::Display>(err: E) -> FluteError {
    FluteError::XmlError(err.to_string())
}

impl SchemaXmlWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> SchemaXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { writer: Writer::new_with_indent(inner, b' ', 4) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    pub fn write(&mut self, database: &DatabaseMeta) -> Result<()> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut root = BytesStart::new("database");
        root.push_attribute(("name", database.dbms.code()));
        root.push_attribute(("product", database.product_name.as_str()));
        root.push_attribute(("defaultSchema", database.main_schema.catalog_schema().as_str()));
        self.event(Event::Start(root))?;
        for table in database.tables.iter() {
            self.write_table(table)?;
        }
        for procedure in database.procedures.values() {
            self.write_procedure(procedure)?;
        }
        self.event(Event::End(BytesEnd::new("database")))?;
        self.writer.get_mut().flush()?;
        Ok(())
    }

    fn event(&mut self, event: Event) -> Result<()> {
        self.writer.write_event(event).map_err(xml_error)
    }

    fn write_table(&mut self, table: &TableMeta) -> Result<()> {
        let mut start = BytesStart::new("table");
        start.push_attribute(("name", table.name.as_str()));
        start.push_attribute(("type", table.table_type.as_str()));
        start.push_attribute(("schema", table.schema.catalog_schema().as_str()));
        if let Some(comment) = &table.comment {
            start.push_attribute(("comment", comment.as_str()));
        }
        self.event(Event::Start(start))?;

        for column in table.columns.iter() {
            self.event(Event::Empty(column_element("column", column)))?;
        }
        for fk in table.foreign_keys.values() {
            let mut start = BytesStart::new("foreign-key");
            start.push_attribute(("name", fk.name.as_str()));
            start.push_attribute(("foreignTable", fk.foreign_table.as_str()));
            start.push_attribute(("foreignSchema", fk.foreign_schema.catalog_schema().as_str()));
            self.event(Event::Start(start))?;
            for (local, foreign) in fk.column_pairs.iter() {
                let mut reference = BytesStart::new("reference");
                reference.push_attribute(("local", local.as_str()));
                reference.push_attribute(("foreign", foreign.as_str()));
                self.event(Event::Empty(reference))?;
            }
            self.event(Event::End(BytesEnd::new("foreign-key")))?;
        }
        for unique in table.unique_keys.values() {
            let mut start = BytesStart::new("unique");
            start.push_attribute(("name", unique.name.as_str()));
            self.event(Event::Start(start))?;
            for (position, column) in unique.columns.iter() {
                let mut element = BytesStart::new("unique-column");
                element.push_attribute(("name", column.as_str()));
                element.push_attribute(("position", position.to_string().as_str()));
                self.event(Event::Empty(element))?;
            }
            self.event(Event::End(BytesEnd::new("unique")))?;
        }
        for index in table.indexes.values() {
            let mut start = BytesStart::new("index");
            start.push_attribute(("name", index.name.as_str()));
            start.push_attribute(("unique", (!index.non_unique).to_string().as_str()));
            self.event(Event::Start(start))?;
            for (position, column) in index.columns.iter() {
                let mut element = BytesStart::new("index-column");
                element.push_attribute(("name", column.as_str()));
                element.push_attribute(("position", position.to_string().as_str()));
                if let Some(order) = index.sort_orders.get(position) {
                    element.push_attribute(("sort", order.as_str()));
                }
                self.event(Event::Empty(element))?;
            }
            self.event(Event::End(BytesEnd::new("index")))?;
        }
        self.event(Event::End(BytesEnd::new("table")))
    }

    fn write_procedure(&mut self, procedure: &ProcedureMeta) -> Result<()> {
        let mut start = BytesStart::new("procedure");
        start.push_attribute(("name", procedure.procedure_name_with_package().as_str()));
        start.push_attribute(("schema", procedure.schema.catalog_schema().as_str()));
        start.push_attribute(("sqlName", procedure.procedure_sql_name().as_str()));
        if let Some(comment) = &procedure.comment {
            start.push_attribute(("comment", comment.as_str()));
        }
        self.event(Event::Start(start))?;
        for column in procedure.columns.iter() {
            let mut element = BytesStart::new("procedure-column");
            element.push_attribute(("name", column.name.as_str()));
            element.push_attribute(("columnType", column.column_type.as_str()));
            element.push_attribute(("type", column.jdbc_type.name().as_str()));
            element.push_attribute(("dbType", column.db_type_name.as_str()));
            if let Some(size) = column.column_size {
                element.push_attribute(("size", size.to_string().as_str()));
            }
            if column.result_set_columns.is_empty() {
                self.event(Event::Empty(element))?;
                continue;
            }
            self.event(Event::Start(element))?;
            for result_column in column.result_set_columns.iter() {
                self.event(Event::Empty(column_element("result-column", result_column)))?;
            }
            self.event(Event::End(BytesEnd::new("procedure-column")))?;
        }
        self.event(Event::End(BytesEnd::new("procedure")))
    }
}

fn column_element<'a>(tag: &'a str, column: &ColumnMeta) -> BytesStart<'a> {
    let mut element = BytesStart::new(tag);
    element.push_attribute(("name", column.name.as_str()));
    element.push_attribute(("type", column.jdbc_type.name().as_str()));
    element.push_attribute(("dbType", column.db_type_name.as_str()));
    element.push_attribute(("javaType", java_type(column.jdbc_type)));
    if let Some(size) = column.column_size_expression() {
        element.push_attribute(("size", size.as_str()));
    }
    element.push_attribute(("required", column.required.to_string().as_str()));
    element.push_attribute(("primaryKey", column.primary_key.to_string().as_str()));
    if let Some(pk_name) = &column.pk_name {
        element.push_attribute(("pkName", pk_name.as_str()));
    }
    if let Some(comment) = &column.comment {
        element.push_attribute(("comment", comment.as_str()));
    }
    if let Some(default_value) = &column.default_value {
        element.push_attribute(("default", default_value.as_str()));
    }
    element.push_attribute(("autoIncrement", column.auto_increment.to_string().as_str()));
    element
}

/// Class name the generators map a column to.
fn java_type(jdbc_type: JdbcType) -> &'static str {
    match jdbc_type {
        t if t.is_string() => "String",
        JdbcType::Tinyint | JdbcType::Smallint | JdbcType::Integer => "Integer",
        JdbcType::Bigint => "Long",
        JdbcType::Float | JdbcType::Real | JdbcType::Double | JdbcType::Numeric | JdbcType::Decimal => "java.math.BigDecimal",
        JdbcType::Bit | JdbcType::Boolean => "Boolean",
        JdbcType::Date => "java.time.LocalDate",
        JdbcType::Time => "java.time.LocalTime",
        JdbcType::Timestamp | JdbcType::TimestampWithTimezone => "java.time.LocalDateTime",
        t if t.is_binary() => "byte[]",
        _ => "Object",
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use indexmap::IndexMap;
    use flute_core::{ForeignKeyMeta, IndexMeta, PrimaryKeyMeta, TableType, UnifiedSchema, UniqueKeyMeta};
    use crate::driver::Dbms;
    use super::*;

    fn database() -> DatabaseMeta {
        let schema = UnifiedSchema::main(None, Some("EXAMPLEDB"));
        let mut member = TableMeta::new(schema.clone(), "MEMBER", TableType::Table);
        member.comment = Some("member & friends".to_string());
        let mut id = ColumnMeta::new("MEMBER_ID", JdbcType::Integer, "INT");
        id.primary_key = true;
        id.pk_name = Some("PK_MEMBER".to_string());
        id.auto_increment = true;
        member.columns.push(id);
        member.columns.push(ColumnMeta::new("MEMBER_ACCOUNT", JdbcType::Varchar, "VARCHAR"));
        let mut pk = PrimaryKeyMeta::default();
        pk.columns.insert(1, "MEMBER_ID".to_string());
        member.primary_key = Some(pk);
        let mut unique = UniqueKeyMeta::new("UQ_MEMBER_ACCOUNT");
        unique.columns.insert(1, "MEMBER_ACCOUNT".to_string());
        member.unique_keys.insert(unique.name.clone(), unique);
        let mut index = IndexMeta::new("IX_MEMBER_ACCOUNT", true, 3);
        index.columns.insert(1, "MEMBER_ACCOUNT".to_string());
        member.indexes.insert(index.name.clone(), index);

        let mut purchase = TableMeta::new(schema.clone(), "PURCHASE", TableType::Table);
        purchase.columns.push(ColumnMeta::new("MEMBER_ID", JdbcType::Integer, "INT"));
        let mut column_pairs = IndexMap::new();
        column_pairs.insert("MEMBER_ID".to_string(), "MEMBER_ID".to_string());
        purchase.foreign_keys.insert("FK_PURCHASE_MEMBER".to_string(), ForeignKeyMeta {
            name: "FK_PURCHASE_MEMBER".to_string(),
            local_schema: schema.clone(),
            local_table: "PURCHASE".to_string(),
            foreign_schema: schema.clone(),
            foreign_table: "MEMBER".to_string(),
            column_pairs,
        });
        DatabaseMeta {
            dbms: Dbms::MySQL,
            product_name: "MySQL".to_string(),
            product_version: None,
            main_schema: schema,
            tables: vec![member, purchase],
            procedures: IndexMap::new(),
            synonyms: IndexMap::new(),
        }
    }

    #[test]
    fn test_write_schema_xml() {
        let mut writer = SchemaXmlWriter::new(Vec::new());
        writer.write(&database()).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<table name=\"MEMBER\" type=\"TABLE\" schema=\"EXAMPLEDB\" comment=\"member &amp; friends\">"));
        assert!(xml.contains("primaryKey=\"true\" pkName=\"PK_MEMBER\""));
        assert!(xml.contains("autoIncrement=\"true\""));
        assert!(xml.contains("<foreign-key name=\"FK_PURCHASE_MEMBER\" foreignTable=\"MEMBER\""));
        assert!(xml.contains("<reference local=\"MEMBER_ID\" foreign=\"MEMBER_ID\"/>"));
        assert!(xml.contains("<unique-column name=\"MEMBER_ACCOUNT\" position=\"1\"/>"));
        assert!(xml.contains("<index name=\"IX_MEMBER_ACCOUNT\" unique=\"false\">"));
        assert!(xml.trim_end().ends_with("</database>"));
    }

    #[test]
    fn test_create_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut writer = SchemaXmlWriter::create(file.path()).unwrap();
        writer.write(&database()).unwrap();
        drop(writer);
        let mut content = String::new();
        File::open(file.path()).unwrap().read_to_string(&mut content).unwrap();
        assert!(content.contains("<database name=\"mysql\""));
    }
}
