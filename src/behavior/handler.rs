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
use once_cell::sync::Lazy;
use regex::Regex;
use crate::behavior::BehaviorCommand;
use crate::driver::Dbms;
use crate::errors::{FluteError, SqlError};
use crate::message::ExceptionMessageBuilder;

static ORACLE_ERROR_CODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"ORA-(\d{5})").ok());

/// The vendor code of the first `ORA-nnnnn` in an Oracle message.
pub fn parse_oracle_error_code(message: &str) -> Option<i32> {
    ORACLE_ERROR_CODE.as_ref()?
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|code| code.as_str().parse().ok())
}

/// Translates driver errors of a behavior command into the application
/// taxonomy. Anything that is not a driver error passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlExceptionHandler;

impl SqlExceptionHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, dbms: Dbms, err: FluteError, command: &BehaviorCommand, display_sql: &str) -> FluteError {
        let cause = match err {
            FluteError::Sql(cause) => cause,
            other => return other,
        };
        let vendor_code = cause.vendor_code.or_else(|| match dbms {
            Dbms::Oracle => parse_oracle_error_code(&cause.message),
            _ => None,
        });
        if dbms.is_unique_violation(cause.sql_state.as_deref(), vendor_code) {
            let message = message(&cause, command, display_sql)
                .notice("The entity already exists on the database.")
                .advice("Confirm the unique constraints of the table.")
                .advice("And confirm the values of the entity, especially the primary key.")
                .build();
            return FluteError::EntityAlreadyExists { message, cause };
        }
        let message = message(&cause, command, display_sql)
            .notice("The SQL failed to execute.")
            .advice("Read the SQLException message and confirm the display SQL.")
            .build();
        FluteError::SqlFailure { message, cause: Some(cause) }
    }
}

fn message(cause: &SqlError, command: &BehaviorCommand, display_sql: &str) -> ExceptionMessageBuilder {
    let mut builder = ExceptionMessageBuilder::new()
        .item_element("Behavior", command.command_name());
    if let Some(entity_type) = command.entity_type() {
        builder = builder.item_element("Entity Type", entity_type);
    }
    builder
        .item_element("SQLState", cause.sql_state.as_deref().unwrap_or("(none)"))
        .item_element("ErrorCode", cause.vendor_code.map(|c| c.to_string()).unwrap_or_else(|| "(none)".to_string()))
        .item_element("SQLException", &cause.message)
        .item_element("Display SQL", display_sql)
}

#[cfg(test)]
mod tests {
    use crate::behavior::CommandKind;
    use super::*;

    fn insert() -> BehaviorCommand {
        BehaviorCommand::builder(CommandKind::Insert)
            .table_db_name("MEMBER")
            .entity_type("Member")
            .sql("insert into MEMBER (MEMBER_ID) values (?)")
            .bind(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_oracle_error_code() {
        assert_eq!(parse_oracle_error_code("ORA-00001: unique constraint (X.PK) violated"), Some(1));
        assert_eq!(parse_oracle_error_code("ORA-06550: line 1"), Some(6550));
        assert_eq!(parse_oracle_error_code("no code"), None);
    }

    #[test]
    fn test_unique_violation_becomes_already_exists() {
        let handler = SqlExceptionHandler::new();
        let err = FluteError::Sql(SqlError::new("Duplicate entry '1'").with_sql_state("23000").with_vendor_code(1062));
        let translated = handler.handle(Dbms::MySQL, err, &insert(), "insert into MEMBER (MEMBER_ID) values (1)");
        match translated {
            FluteError::EntityAlreadyExists { message, cause } => {
                assert!(message.contains("The entity already exists"));
                assert!(message.contains("[Display SQL]\ninsert into MEMBER (MEMBER_ID) values (1)"));
                assert_eq!(cause.vendor_code, Some(1062));
            }
            other => panic!("unexpected: {}", other),
        }

        let oracle = FluteError::Sql(SqlError::new("ORA-00001: unique constraint violated"));
        assert!(matches!(handler.handle(Dbms::Oracle, oracle, &insert(), ""), FluteError::EntityAlreadyExists { .. }));
    }

    #[test]
    fn test_other_errors() {
        let handler = SqlExceptionHandler::new();
        let err = FluteError::Sql(SqlError::new("Cannot add a child row").with_vendor_code(1452));
        assert!(matches!(handler.handle(Dbms::MySQL, err, &insert(), ""), FluteError::SqlFailure { cause: Some(_), .. }));
        let err = FluteError::BindingFailure("x".to_string());
        assert!(matches!(handler.handle(Dbms::MySQL, err, &insert(), ""), FluteError::BindingFailure(_)));
    }
}
