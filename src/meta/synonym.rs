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
use std::collections::{HashMap, HashSet};
use indexmap::IndexMap;
use flute_core::{ColumnMeta, FluteValue, ForeignKeyMeta, PrimaryKeyMeta, Row, SynonymMeta, TableMeta, TableType,
    UnifiedSchema, UniqueKeyMeta};
use crate::config::SchemaFilter;
use crate::driver::DbConnection;
use crate::errors::{FluteError, Result};
use crate::message::ExceptionMessageBuilder;
use crate::meta::oracle_type::oracle_jdbc_type;
use crate::meta::{extract_table_detail, query_rows};

const SYNONYM_SQL: &str = "select SYNONYM_NAME, TABLE_OWNER, TABLE_NAME, DB_LINK from ALL_SYNONYMS where OWNER = ? order by SYNONYM_NAME";

/// Oracle synonyms of the extracted schemas and the metadata of what they
/// point at.
pub struct SynonymExtractor<'a> {
    conn: &'a dyn DbConnection,
    filter: &'a dyn SchemaFilter,
    retry: bool,
}

impl<'a> SynonymExtractor<'a> {
    pub fn new(conn: &'a dyn DbConnection, filter: &'a dyn SchemaFilter, retry: bool) -> Self {
        Self { conn, filter, retry }
    }

    /// Synonyms by synonym key. Synonyms to extracted tables take their
    /// metadata, DB link synonyms read it through the link, the others
    /// through the driver metadata under an unknown schema.
    pub fn extract_synonym_map(&self, schemas: &[UnifiedSchema], tables: &[TableMeta]) -> Result<IndexMap<String, SynonymMeta>> {
        let table_map: HashMap<String, &TableMeta> = tables.iter().map(|t| (t.table_key(), t)).collect();
        let mut synonyms: IndexMap<String, SynonymMeta> = IndexMap::new();
        for schema in schemas {
            let owner = match schema.pure_schema() {
                Some(owner) => owner.to_uppercase(),
                None => continue,
            };
            let rows = query_rows(self.conn, SYNONYM_SQL, &[FluteValue::Text(owner)])?;
            for row in rows.iter() {
                let mut synonym = self.to_synonym_meta(schema, schemas, row)?;
                if self.filter.is_table_except(schema, &synonym.synonym_name) {
                    tracing::debug!("Except synonym: {}", synonym.synonym_name);
                    continue;
                }
                synonym.selectable = self.is_selectable(&synonym);
                if !synonym.selectable {
                    tracing::debug!("Skip synonym that cannot be selected: {}", synonym.synonym_key());
                    continue;
                }
                if synonym.is_db_link() {
                    self.setup_db_link_synonym(&mut synonym)?;
                } else if let Some(table) = table_map.get(&synonym.table_key()) {
                    merge_table(&mut synonym, table);
                } else {
                    self.setup_unknown_table_synonym(&mut synonym)?;
                }
                let key = synonym.synonym_key();
                if let Some(existing) = synonyms.get(&key) {
                    return Err(FluteError::DuplicateSynonym(duplicate_message(existing, &synonym)));
                }
                synonyms.insert(key, synonym);
            }
        }
        Ok(synonyms)
    }

    fn to_synonym_meta(&self, schema: &UnifiedSchema, schemas: &[UnifiedSchema], row: &Row) -> Result<SynonymMeta> {
        let table_owner: String = row.get("TABLE_OWNER")?;
        let table_owner = schemas.iter()
            .find(|s| s.pure_schema().map(|p| p.eq_ignore_ascii_case(&table_owner)).unwrap_or(false))
            .cloned()
            .unwrap_or_else(|| UnifiedSchema::unknown(None, Some(&table_owner)));
        Ok(SynonymMeta {
            synonym_owner: schema.clone(),
            synonym_name: row.get("SYNONYM_NAME")?,
            table_owner,
            table_name: row.get("TABLE_NAME")?,
            db_link_name: row.get_opt::<String>("DB_LINK")?.filter(|l| !l.trim().is_empty()),
            ..Default::default()
        })
    }

    fn is_selectable(&self, synonym: &SynonymMeta) -> bool {
        let sql = format!("select * from {} where 0 = 1", synonym.synonym_owner.qualify(&synonym.synonym_name));
        match query_rows(self.conn, &sql, &[]) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("Synonym not selectable: {}", err);
                false
            }
        }
    }

    fn setup_unknown_table_synonym(&self, synonym: &mut SynonymMeta) -> Result<()> {
        let meta = self.conn.meta_data()?;
        let mut table = TableMeta::new(synonym.table_owner.clone(), &synonym.table_name, TableType::Table);
        extract_table_detail(self.conn.dbms(), self.filter, self.retry, meta.as_ref(), &mut table)?;
        merge_table(synonym, &table);
        Ok(())
    }

    /// Keys and columns through the link, since driver metadata cannot see
    /// across it. Remote foreign keys and indexes are not followed.
    fn setup_db_link_synonym(&self, synonym: &mut SynonymMeta) -> Result<()> {
        let link = synonym.db_link_name.clone().unwrap_or_default();
        let owner = synonym.table_owner.pure_schema().unwrap_or_default().to_uppercase();
        let params = [FluteValue::Text(owner), FluteValue::Text(synonym.table_name.to_uppercase())];

        let comment_sql = format!("select COMMENTS from ALL_TAB_COMMENTS@{} where OWNER = ? and TABLE_NAME = ?", link);
        synonym.table_comment = query_rows(self.conn, &comment_sql, &params)?
            .first()
            .map(|row| row.get_opt::<String>("COMMENTS"))
            .transpose()?
            .flatten();

        let column_sql = format!(
            "select COLUMN_NAME, DATA_TYPE, DATA_LENGTH, DATA_PRECISION, DATA_SCALE, NULLABLE, DATA_DEFAULT \
             from ALL_TAB_COLUMNS@{} where OWNER = ? and TABLE_NAME = ? order by COLUMN_ID", link);
        let mut columns = Vec::new();
        for row in query_rows(self.conn, &column_sql, &params)?.iter() {
            columns.push(link_column(row)?);
        }

        let pk_rows = query_rows(self.conn, &constraint_sql(&link, "P"), &params)?;
        let mut pk = PrimaryKeyMeta::default();
        for row in pk_rows.iter() {
            pk.name = row.get_opt("CONSTRAINT_NAME")?;
            pk.columns.insert(row.get("POSITION")?, row.get("COLUMN_NAME")?);
        }

        let mut unique_keys: IndexMap<String, UniqueKeyMeta> = IndexMap::new();
        for row in query_rows(self.conn, &constraint_sql(&link, "U"), &params)?.iter() {
            let name: String = row.get("CONSTRAINT_NAME")?;
            let column: String = row.get("COLUMN_NAME")?;
            if pk.contains_column(&column) {
                continue;
            }
            unique_keys.entry(name.clone()).or_insert_with(|| UniqueKeyMeta::new(&name))
                .columns.insert(row.get("POSITION")?, column);
        }

        for column in columns.iter_mut() {
            if pk.contains_column(&column.name) {
                column.primary_key = true;
                column.pk_name = pk.name.clone();
            }
        }
        synonym.columns = columns;
        synonym.primary_key = if pk.is_empty() { None } else { Some(pk) };
        synonym.unique_keys = unique_keys;
        Ok(())
    }
}

fn constraint_sql(link: &str, constraint_type: &str) -> String {
    format!(
        "select cons.CONSTRAINT_NAME, cols.COLUMN_NAME, cols.POSITION \
         from ALL_CONSTRAINTS@{link} cons, ALL_CONS_COLUMNS@{link} cols \
         where cons.OWNER = ? and cons.TABLE_NAME = ? and cons.CONSTRAINT_TYPE = '{kind}' \
         and cons.OWNER = cols.OWNER and cons.CONSTRAINT_NAME = cols.CONSTRAINT_NAME \
         order by cons.CONSTRAINT_NAME, cols.POSITION",
        link = link, kind = constraint_type,
    )
}

fn link_column(row: &Row) -> Result<ColumnMeta> {
    let name: String = row.get("COLUMN_NAME")?;
    let data_type: String = row.get("DATA_TYPE")?;
    let mut column = ColumnMeta::new(&name, oracle_jdbc_type(&data_type), &data_type);
    column.column_size = row.get_opt::<i32>("DATA_PRECISION")?.or(row.get_opt::<i32>("DATA_LENGTH")?);
    column.decimal_digits = row.get_opt("DATA_SCALE")?;
    column.required = row.get_opt::<String>("NULLABLE")?.map(|n| n.eq_ignore_ascii_case("N")).unwrap_or(false);
    column.default_value = row.get_opt::<String>("DATA_DEFAULT")?.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    Ok(column)
}

fn merge_table(synonym: &mut SynonymMeta, table: &TableMeta) {
    synonym.table_comment = table.comment.clone();
    synonym.columns = table.columns.clone();
    synonym.primary_key = table.primary_key.clone();
    synonym.unique_keys = table.unique_keys.clone();
    synonym.indexes = table.indexes.clone();
    synonym.foreign_keys = table.foreign_keys.clone();
}

fn duplicate_message(existing: &SynonymMeta, duplicate: &SynonymMeta) -> String {
    ExceptionMessageBuilder::new()
        .notice("The same-name synonym was found.")
        .advice("Except one of them from the extraction.")
        .item("Synonyms")
        .element(format!("{} -> {}", existing.synonym_owner.qualify(&existing.synonym_name), existing.table_sql_name()))
        .element(format!("{} -> {}", duplicate.synonym_owner.qualify(&duplicate.synonym_name), duplicate.table_sql_name()))
        .build()
}

/// Points foreign keys at the synonyms of their foreign tables.
///
/// A key to a table that N synonyms reach becomes N keys: the original
/// redirected to the first synonym, then one `{name}_SYNONYM{i}` key per
/// further synonym. Tables extracted themselves keep their keys. Keys to
/// excepted tables are dropped afterwards.
pub fn translate_foreign_keys(
    tables: &mut [TableMeta],
    synonyms: &mut IndexMap<String, SynonymMeta>,
    filter: &dyn SchemaFilter,
) {
    let extracted: HashSet<String> = tables.iter().filter(|t| t.table_type != TableType::Synonym).map(|t| t.table_key()).collect();
    let mut targets: HashMap<String, Vec<(UnifiedSchema, String)>> = HashMap::new();
    for synonym in synonyms.values() {
        if extracted.contains(&synonym.table_key()) {
            continue;
        }
        targets.entry(synonym.table_key()).or_default()
            .push((synonym.synonym_owner.clone(), synonym.synonym_name.clone()));
    }
    for table in tables.iter_mut() {
        table.foreign_keys = translate_map(std::mem::take(&mut table.foreign_keys), &targets, filter);
    }
    for synonym in synonyms.values_mut() {
        synonym.foreign_keys = translate_map(std::mem::take(&mut synonym.foreign_keys), &targets, filter);
    }
}

fn translate_map(
    foreign_keys: IndexMap<String, ForeignKeyMeta>,
    targets: &HashMap<String, Vec<(UnifiedSchema, String)>>,
    filter: &dyn SchemaFilter,
) -> IndexMap<String, ForeignKeyMeta> {
    let mut translated = IndexMap::new();
    for (name, fk) in foreign_keys {
        let synonyms = match targets.get(&fk.foreign_table_key()) {
            Some(synonyms) if !synonyms.is_empty() => synonyms,
            _ => {
                translated.insert(name, fk);
                continue;
            }
        };
        for (i, (owner, synonym_name)) in synonyms.iter().enumerate() {
            let mut redirected = fk.clone();
            redirected.foreign_schema = owner.clone();
            redirected.foreign_table = synonym_name.clone();
            if i > 0 {
                redirected.name = format!("{}_SYNONYM{}", fk.name, i);
            }
            translated.insert(redirected.name.clone(), redirected);
        }
    }
    translated.retain(|name, fk| {
        let except = filter.is_table_except(&fk.foreign_schema, &fk.foreign_table);
        if except {
            tracing::debug!("Drop foreign key to excepted table: {} -> {}", name, fk.foreign_table);
        }
        !except
    });
    translated
}

#[cfg(test)]
mod tests {
    use flute_core::{JdbcType, Rows};
    use crate::config::{FluteConfig, NoFilter};
    use crate::driver::fake::{FakeConnection, FakeMetaData};
    use crate::driver::Dbms;
    use super::*;

    fn text(v: &str) -> FluteValue {
        FluteValue::Text(v.to_string())
    }

    fn rows(columns: &[&str], data: Vec<Vec<FluteValue>>) -> Rows {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        data.into_iter().map(|d| Row::new(columns.clone(), d)).collect::<Vec<_>>().into()
    }

    fn synonym_rows(data: Vec<Vec<FluteValue>>) -> Rows {
        rows(&["SYNONYM_NAME", "TABLE_OWNER", "TABLE_NAME", "DB_LINK"], data)
    }

    fn main_schema() -> UnifiedSchema {
        UnifiedSchema::main(None, Some("EXAMPLEDB"))
    }

    fn fk(name: &str, local: &str, foreign_owner: &str, foreign: &str) -> ForeignKeyMeta {
        let mut column_pairs = IndexMap::new();
        column_pairs.insert("MEMBER_ID".to_string(), "MEMBER_ID".to_string());
        ForeignKeyMeta {
            name: name.to_string(),
            local_schema: main_schema(),
            local_table: local.to_string(),
            foreign_schema: UnifiedSchema::unknown(None, Some(foreign_owner)),
            foreign_table: foreign.to_string(),
            column_pairs,
        }
    }

    fn synonym(name: &str, table_owner: &str, table: &str) -> SynonymMeta {
        SynonymMeta {
            synonym_owner: main_schema(),
            synonym_name: name.to_string(),
            table_owner: UnifiedSchema::unknown(None, Some(table_owner)),
            table_name: table.to_string(),
            selectable: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fk_to_synonym_target_fans_out_to_each_synonym() {
        let mut purchase = TableMeta::new(main_schema(), "PURCHASE", TableType::Table);
        purchase.foreign_keys.insert("FK_PURCHASE_MEMBER".to_string(), fk("FK_PURCHASE_MEMBER", "PURCHASE", "MASTERDB", "MEMBER"));
        purchase.foreign_keys.insert("FK_PURCHASE_PRODUCT".to_string(), fk("FK_PURCHASE_PRODUCT", "PURCHASE", "MASTERDB", "PRODUCT"));
        let mut tables = vec![purchase];
        let mut synonyms = IndexMap::new();
        for s in [synonym("SYN_MEMBER", "MASTERDB", "MEMBER"), synonym("SYN_MEMBER_ALT", "MASTERDB", "MEMBER"),
                  synonym("SYN_MEMBER_OLD", "MASTERDB", "MEMBER")] {
            synonyms.insert(s.synonym_key(), s);
        }
        translate_foreign_keys(&mut tables, &mut synonyms, &NoFilter);

        let fks = &tables[0].foreign_keys;
        let member_fks: Vec<(&str, &str)> = fks.values()
            .filter(|f| f.foreign_table.starts_with("SYN_MEMBER"))
            .map(|f| (f.name.as_str(), f.foreign_table.as_str()))
            .collect();
        assert_eq!(member_fks, vec![
            ("FK_PURCHASE_MEMBER", "SYN_MEMBER"),
            ("FK_PURCHASE_MEMBER_SYNONYM1", "SYN_MEMBER_ALT"),
            ("FK_PURCHASE_MEMBER_SYNONYM2", "SYN_MEMBER_OLD"),
        ]);
        assert!(fks.values().filter(|f| f.foreign_table.starts_with("SYN_MEMBER")).all(|f| f.foreign_schema.is_main_schema()));
        assert_eq!(fks["FK_PURCHASE_PRODUCT"].foreign_table, "PRODUCT");
    }

    #[test]
    fn test_fk_to_excepted_synonym_is_dropped() {
        let mut purchase = TableMeta::new(main_schema(), "PURCHASE", TableType::Table);
        purchase.foreign_keys.insert("FK_PURCHASE_MEMBER".to_string(), fk("FK_PURCHASE_MEMBER", "PURCHASE", "MASTERDB", "MEMBER"));
        let mut tables = vec![purchase];
        let mut synonyms = IndexMap::new();
        for s in [synonym("SYN_MEMBER", "MASTERDB", "MEMBER"), synonym("TMP_MEMBER", "MASTERDB", "MEMBER")] {
            synonyms.insert(s.synonym_key(), s);
        }
        let config = FluteConfig::default().add_table_except("prefix:TMP_");
        translate_foreign_keys(&mut tables, &mut synonyms, &config);
        let names: Vec<&String> = tables[0].foreign_keys.keys().collect();
        assert_eq!(names, vec!["FK_PURCHASE_MEMBER"]);
    }

    #[test]
    fn test_extract_merges_and_reads_db_link() {
        let conn = FakeConnection::new(Dbms::Oracle, FakeMetaData::new("Oracle"));
        {
            let mut queue = conn.db.query_results.borrow_mut();
            queue.push_back(synonym_rows(vec![
                vec![text("SYN_MEMBER"), text("EXAMPLEDB"), text("MEMBER"), FluteValue::Null],
                vec![text("SYN_REMOTE"), text("REMOTEDB"), text("PRODUCT"), text("REMOTE_LINK")],
            ]));
            queue.push_back(Rows::new());
            queue.push_back(Rows::new());
            queue.push_back(rows(&["COMMENTS"], vec![vec![text("remote products")]]));
            queue.push_back(rows(
                &["COLUMN_NAME", "DATA_TYPE", "DATA_LENGTH", "DATA_PRECISION", "DATA_SCALE", "NULLABLE", "DATA_DEFAULT"],
                vec![
                    vec![text("PRODUCT_ID"), text("NUMBER"), FluteValue::Int(22), FluteValue::Int(16), FluteValue::Int(0), text("N"), FluteValue::Null],
                    vec![text("PRODUCT_CODE"), text("VARCHAR2"), FluteValue::Int(20), FluteValue::Null, FluteValue::Null, text("N"), FluteValue::Null],
                ],
            ));
            queue.push_back(rows(&["CONSTRAINT_NAME", "COLUMN_NAME", "POSITION"], vec![
                vec![text("PK_PRODUCT"), text("PRODUCT_ID"), FluteValue::Int(1)],
            ]));
            queue.push_back(rows(&["CONSTRAINT_NAME", "COLUMN_NAME", "POSITION"], vec![
                vec![text("UQ_PRODUCT"), text("PRODUCT_CODE"), FluteValue::Int(1)],
                vec![text("UQ_PRODUCT_ID"), text("PRODUCT_ID"), FluteValue::Int(1)],
            ]));
        }
        let mut member = TableMeta::new(main_schema(), "MEMBER", TableType::Table);
        member.columns.push(ColumnMeta::new("MEMBER_ID", JdbcType::Numeric, "NUMBER"));
        member.comment = Some("members".to_string());

        let synonyms = SynonymExtractor::new(&conn, &NoFilter, true)
            .extract_synonym_map(&[main_schema()], &[member])
            .unwrap();
        assert_eq!(synonyms.len(), 2);

        let local = &synonyms["exampledb.syn_member"];
        assert_eq!(local.table_comment.as_deref(), Some("members"));
        assert_eq!(local.columns.len(), 1);

        let remote = &synonyms["exampledb.syn_remote"];
        assert!(remote.is_db_link());
        assert!(remote.table_owner.is_unknown_schema());
        assert_eq!(remote.table_sql_name(), "REMOTEDB.PRODUCT@REMOTE_LINK");
        assert_eq!(remote.table_comment.as_deref(), Some("remote products"));
        assert_eq!(remote.columns[0].column_size, Some(16));
        assert!(remote.columns[0].primary_key && remote.columns[0].required);
        assert_eq!(remote.primary_key.as_ref().unwrap().column_names(), vec!["PRODUCT_ID"]);
        let unique_names: Vec<&String> = remote.unique_keys.keys().collect();
        assert_eq!(unique_names, vec!["UQ_PRODUCT"]);

        let log = conn.db.log();
        assert!(log.contains(&"prepare:select * from EXAMPLEDB.SYN_REMOTE where 0 = 1".to_string()));
        assert!(log.iter().any(|l| l.contains("ALL_CONSTRAINTS@REMOTE_LINK")));
    }

    #[test]
    fn test_duplicate_synonym_fails() {
        let conn = FakeConnection::new(Dbms::Oracle, FakeMetaData::new("Oracle"));
        {
            let mut queue = conn.db.query_results.borrow_mut();
            queue.push_back(synonym_rows(vec![vec![text("SYN_MEMBER"), text("EXAMPLEDB"), text("MEMBER"), FluteValue::Null]]));
            queue.push_back(Rows::new());
            queue.push_back(synonym_rows(vec![vec![text("syn_member"), text("EXAMPLEDB"), text("MEMBER"), FluteValue::Null]]));
            queue.push_back(Rows::new());
        }
        let member = TableMeta::new(main_schema(), "MEMBER", TableType::Table);
        let schemas = [main_schema(), UnifiedSchema::additional(None, Some("exampledb"))];
        let err = SynonymExtractor::new(&conn, &NoFilter, true).extract_synonym_map(&schemas, &[member]).unwrap_err();
        assert!(matches!(err, FluteError::DuplicateSynonym(_)));
    }
}
