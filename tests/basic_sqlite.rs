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
//!
//! Tests.
//!
use std::fs;
use std::path::Path;
use flute::*;

const DDL: &str = "
create table MEMBER_STATUS (
    MEMBER_STATUS_CODE char(3) not null primary key,
    MEMBER_STATUS_NAME varchar(50) not null,
    DISPLAY_ORDER integer not null unique
);
create table MEMBER (
    MEMBER_ID integer primary key autoincrement,
    MEMBER_NAME varchar(180) not null,
    MEMBER_ACCOUNT varchar(50) not null unique,
    MEMBER_STATUS_CODE char(3) not null references MEMBER_STATUS (MEMBER_STATUS_CODE),
    BIRTHDATE date,
    VERSION_NO bigint not null default 0
);
create index IX_MEMBER_BIRTHDATE on MEMBER (BIRTHDATE desc);
create table AIRPORT (
    AIRPORT_CODE char(3) not null,
    COUNTRY_CODE char(2) not null,
    primary key (AIRPORT_CODE, COUNTRY_CODE)
);
create table FLIGHT (
    FLIGHT_ID integer primary key,
    FROM_CODE char(3) not null,
    FROM_COUNTRY char(2) not null,
    TO_CODE char(3) not null,
    TO_COUNTRY char(2) not null,
    foreign key (FROM_CODE, FROM_COUNTRY) references AIRPORT (AIRPORT_CODE, COUNTRY_CODE),
    foreign key (TO_CODE, TO_COUNTRY) references AIRPORT (AIRPORT_CODE, COUNTRY_CODE)
);
create view VW_FORMALIZED_MEMBER as select MEMBER_ID, MEMBER_NAME from MEMBER where MEMBER_STATUS_CODE = 'FML';
";

fn create_test_cfg(path: &Path) -> FluteConfig {
    FluteConfig::new(&format!("sqlite:{}", path.display())).set_max_size(2)
}

fn create_test_data_source(cfg: &FluteConfig) -> Box<dyn DataSource + Send + Sync> {
    let data_source = open_data_source(cfg).unwrap();
    let conn = data_source.get_connection().unwrap();
    for statement in split_statements(DDL) {
        let mut prepared = conn.prepare_statement(&statement).unwrap();
        prepared.execute_update().unwrap();
        prepared.close().unwrap();
    }
    conn.close().unwrap();
    data_source
}

fn command(kind: CommandKind, sql: &str) -> BehaviorCommandBuilder {
    BehaviorCommand::builder(kind).table_db_name("MEMBER").entity_type("Member").sql(sql)
}

#[test]
fn test_load_schema() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = create_test_cfg(&dir.path().join("exampledb.db"));
    let data_source = create_test_data_source(&cfg);
    let conn = data_source.get_connection().unwrap();

    let database = SchemaLoader::new(conn.as_ref(), &cfg).load().unwrap();
    assert_eq!(database.dbms, Dbms::SQLite);
    assert!(database.table("sqlite_sequence").is_none(), "system tables are skipped");
    assert!(database.table("VW_FORMALIZED_MEMBER").is_some());

    let member = database.table("MEMBER").unwrap();
    let names: Vec<&str> = member.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["MEMBER_ID", "MEMBER_NAME", "MEMBER_ACCOUNT", "MEMBER_STATUS_CODE", "BIRTHDATE", "VERSION_NO"]);
    let member_id = member.column("MEMBER_ID").unwrap();
    assert!(member_id.primary_key);
    assert!(member_id.auto_increment);
    assert_eq!(member.column("MEMBER_NAME").unwrap().column_size, Some(180));
    assert!(member.column("MEMBER_NAME").unwrap().required);
    assert!(!member.column("BIRTHDATE").unwrap().required);

    assert_eq!(member.primary_key.as_ref().unwrap().column_names(), vec!["MEMBER_ID".to_string()]);
    assert_eq!(member.unique_keys.len(), 1);
    assert_eq!(member.indexes.len(), 1);
    assert!(member.indexes.contains_key("IX_MEMBER_BIRTHDATE"));
    assert_eq!(member.foreign_keys.len(), 1);
    let fk = member.foreign_keys.values().next().unwrap();
    assert_eq!(fk.foreign_table, "MEMBER_STATUS");
    assert_eq!(fk.local_columns(), vec!["MEMBER_STATUS_CODE".to_string()]);

    // unnamed composite keys to the same parent keep their own columns
    let flight = database.table("FLIGHT").unwrap();
    assert_eq!(flight.foreign_keys.len(), 2);
    let mut pairs: Vec<Vec<String>> = flight.foreign_keys.values().map(|fk| fk.local_columns()).collect();
    pairs.sort();
    assert_eq!(pairs, vec![
        vec!["FROM_CODE".to_string(), "FROM_COUNTRY".to_string()],
        vec!["TO_CODE".to_string(), "TO_COUNTRY".to_string()],
    ]);
    for fk in flight.foreign_keys.values() {
        assert_eq!(fk.foreign_columns(), vec!["AIRPORT_CODE".to_string(), "COUNTRY_CODE".to_string()]);
    }

    let mut writer = SchemaXmlWriter::new(Vec::new());
    writer.write(&database).unwrap();
    let xml = String::from_utf8(writer.into_inner()).unwrap();
    assert!(xml.contains("<table name=\"MEMBER\""));
    assert!(xml.contains("foreignTable=\"MEMBER_STATUS\""));
    conn.close().unwrap();
}

#[test]
fn test_invoke_commands() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = create_test_cfg(&dir.path().join("exampledb.db"));
    let data_source = create_test_data_source(&cfg);
    let conn = data_source.get_connection().unwrap();
    let mut invoker = BehaviorCommandInvoker::from_config(&cfg);

    let without_entity = BehaviorCommand::builder(CommandKind::Insert)
        .table_db_name("MEMBER_STATUS")
        .sql("insert into MEMBER_STATUS values (?, ?, ?)")
        .build();
    assert!(matches!(without_entity, Err(FluteError::IllegalCommand(_))));

    let insert = BehaviorCommand::builder(CommandKind::Insert)
        .table_db_name("MEMBER_STATUS")
        .entity_type("MemberStatus")
        .sql("insert into MEMBER_STATUS values (?, ?, ?)")
        .bind("FML")
        .bind("Formalized")
        .bind(1)
        .build()
        .unwrap();
    assert_eq!(invoker.invoke(conn.as_ref(), &insert).unwrap().affected_rows(), 1);

    let insert_member = command(CommandKind::Insert, "insert into MEMBER (MEMBER_NAME, MEMBER_ACCOUNT, MEMBER_STATUS_CODE) values (?, ?, ?)")
        .bind("Stojkovic")
        .bind("Pixy")
        .bind("FML")
        .build()
        .unwrap();
    assert_eq!(invoker.invoke(conn.as_ref(), &insert_member).unwrap().affected_rows(), 1);

    let count = command(CommandKind::SelectCount, "select count(*) from MEMBER where MEMBER_STATUS_CODE = ?")
        .bind("FML")
        .build()
        .unwrap();
    assert_eq!(invoker.invoke(conn.as_ref(), &count).unwrap(), ExecuteResult::Count(1));

    let select = command(CommandKind::SelectList, "select MEMBER_NAME, VERSION_NO from MEMBER where MEMBER_ACCOUNT = ?")
        .bind("Pixy")
        .build()
        .unwrap();
    let rows = invoker.invoke(conn.as_ref(), &select).unwrap().rows();
    assert_eq!(rows.len(), 1);
    let row = rows.first().unwrap();
    assert_eq!(row.get_value(0), Some(&FluteValue::Text("Stojkovic".to_string())));
    assert_eq!(row.get_value(1), Some(&FluteValue::Bigint(0)));

    // same account again
    let result = invoker.invoke(conn.as_ref(), &insert_member);
    assert!(matches!(result, Err(FluteError::EntityAlreadyExists { .. })), "{:?}", result);
    conn.close().unwrap();
}

#[test]
fn test_calls_are_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = create_test_cfg(&dir.path().join("exampledb.db"));
    let data_source = create_test_data_source(&cfg);
    let conn = data_source.get_connection().unwrap();
    let result = conn.prepare_call(&CallSpec::new("SP_MEMBER"));
    assert!(matches!(result, Err(FluteError::Unsupported(_))));
}

#[test]
fn test_write_delimiter_data() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = create_test_cfg(&dir.path().join("exampledb.db"));
    let data_source = create_test_data_source(&cfg);
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    let status_file = data_dir.join("MEMBER_STATUS.tsv");
    fs::write(&status_file, "MEMBER_STATUS_CODE\tMEMBER_STATUS_NAME\tDISPLAY_ORDER\nFML\tFormalized\t1\nWDL\tWithdrawal\t2\n").unwrap();
    let member_file = data_dir.join("MEMBER.csv");
    fs::write(&member_file, "MEMBER_NAME,MEMBER_ACCOUNT,MEMBER_STATUS_CODE,BIRTHDATE\nStojkovic,Pixy,FML,1965-03-03\nMiyagi,Coach,WDL,\n").unwrap();

    let cache = ColumnMetaCache::new(cfg.main_schema());
    let mut writer = DelimiterDataWriter::new(data_source.as_ref(), &cfg, &cache);
    assert_eq!(writer.write_file(&status_file).unwrap().rows, 2);
    let loaded = writer.write_file(&member_file).unwrap();
    assert_eq!(loaded.table, "MEMBER");
    assert_eq!(loaded.rows, 2);

    let conn = data_source.get_connection().unwrap();
    let mut invoker = BehaviorCommandInvoker::new();
    let nulls = command(CommandKind::SelectCount, "select count(*) from MEMBER where BIRTHDATE is null")
        .build()
        .unwrap();
    assert_eq!(invoker.invoke(conn.as_ref(), &nulls).unwrap(), ExecuteResult::Count(1));
    conn.close().unwrap();
}
