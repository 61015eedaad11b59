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

/// Database products whose metadata quirks are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dbms {
    MySQL,
    PostgreSQL,
    Oracle,
    SQLServer,
    DB2,
    MSAccess,
    SQLite,
    H2,
    Derby,
    Sybase,
    Firebird,
    Unknown,
}

impl Dbms {
    /// Detects the product from a connection URL, with or without the `jdbc:` prefix.
    pub fn from_url(url: &str) -> Self {
        let url = url.trim();
        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        let scheme = url.split(':').next().unwrap_or_default().to_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Dbms::MySQL,
            "postgres" | "postgresql" => Dbms::PostgreSQL,
            "oracle" => Dbms::Oracle,
            "sqlserver" | "mssql" | "jtds" => Dbms::SQLServer,
            "db2" => Dbms::DB2,
            "ucanaccess" | "odbc" => Dbms::MSAccess,
            "sqlite" => Dbms::SQLite,
            "h2" => Dbms::H2,
            "derby" => Dbms::Derby,
            "sybase" => Dbms::Sybase,
            "firebirdsql" | "firebird" => Dbms::Firebird,
            _ => Dbms::Unknown,
        }
    }

    /// Detects the product from `database_product_name()`.
    pub fn from_product_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("mysql") || name.contains("mariadb") {
            Dbms::MySQL
        } else if name.contains("postgres") {
            Dbms::PostgreSQL
        } else if name.contains("oracle") {
            Dbms::Oracle
        } else if name.contains("sql server") {
            Dbms::SQLServer
        } else if name.contains("db2") {
            Dbms::DB2
        } else if name.contains("access") {
            Dbms::MSAccess
        } else if name.contains("sqlite") {
            Dbms::SQLite
        } else if name == "h2" || name.starts_with("h2 ") {
            Dbms::H2
        } else if name.contains("derby") {
            Dbms::Derby
        } else if name.contains("sybase") || name.contains("adaptive server") {
            Dbms::Sybase
        } else if name.contains("firebird") {
            Dbms::Firebird
        } else {
            Dbms::Unknown
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Dbms::MySQL => "mysql",
            Dbms::PostgreSQL => "postgresql",
            Dbms::Oracle => "oracle",
            Dbms::SQLServer => "sqlserver",
            Dbms::DB2 => "db2",
            Dbms::MSAccess => "msaccess",
            Dbms::SQLite => "sqlite",
            Dbms::H2 => "h2",
            Dbms::Derby => "derby",
            Dbms::Sybase => "sybase",
            Dbms::Firebird => "firebird",
            Dbms::Unknown => "unknown",
        }
    }

    /// Schemas owned by the product itself.
    pub fn is_system_schema(&self, schema: &str) -> bool {
        let schema = schema.to_lowercase();
        match self {
            Dbms::PostgreSQL => {
                schema == "pg_catalog" || schema == "information_schema" || schema.starts_with("pg_toast")
            }
            Dbms::DB2 | Dbms::Derby => schema.starts_with("sys"),
            Dbms::H2 => schema == "information_schema",
            Dbms::MySQL => matches!(schema.as_str(), "information_schema" | "mysql" | "performance_schema" | "sys"),
            Dbms::SQLServer => matches!(schema.as_str(), "sys" | "information_schema"),
            _ => false,
        }
    }

    /// Tables that belong to the product rather than the application.
    pub fn is_system_table(&self, schema: Option<&str>, table: &str) -> bool {
        if let Some(schema) = schema {
            if self.is_system_schema(schema) {
                return true;
            }
        }
        match self {
            Dbms::Oracle => {
                let upper = table.to_uppercase();
                upper.starts_with("BIN$") || upper.starts_with("MLOG$_")
                    || upper.starts_with("RUPD$_") || upper.starts_with("SYS_IOT_OVER_")
            }
            Dbms::SQLServer => {
                table.eq_ignore_ascii_case("sysdiagrams") || table.eq_ignore_ascii_case("dtproperties")
            }
            Dbms::MSAccess => table.starts_with("MSys"),
            Dbms::SQLite => table.to_lowercase().starts_with("sqlite_"),
            _ => false,
        }
    }

    /// Procedures installed by the product or its debuggers.
    pub fn is_system_procedure(&self, schema: Option<&str>, package: Option<&str>, procedure: &str) -> bool {
        if let Some(schema) = schema {
            if self.is_system_schema(schema) {
                return true;
            }
        }
        let lower = procedure.to_lowercase();
        match self {
            Dbms::PostgreSQL => lower.starts_with("pldbg_") || lower.starts_with("plpgsql_"),
            Dbms::SQLServer => lower.starts_with("dt_") || lower.starts_with("sp_"),
            Dbms::Oracle => {
                lower.starts_with("bin$")
                    || package.map(|p| p.to_uppercase().starts_with("DBMS_")).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Whether the driver error means a unique constraint was violated.
    pub fn is_unique_violation(&self, sql_state: Option<&str>, vendor_code: Option<i32>) -> bool {
        match self {
            Dbms::Oracle => vendor_code == Some(1),
            Dbms::MySQL => vendor_code == Some(1062),
            Dbms::SQLServer => matches!(vendor_code, Some(2627) | Some(2601)),
            Dbms::H2 => matches!(vendor_code, Some(23001) | Some(23505)) || sql_state == Some("23505"),
            Dbms::SQLite => matches!(vendor_code, Some(2067) | Some(1555)),
            _ => sql_state == Some("23505"),
        }
    }

    /// Default identifier case when the catalog is asked with unquoted names.
    pub fn stores_upper_case(&self) -> bool {
        matches!(self, Dbms::Oracle | Dbms::DB2 | Dbms::H2 | Dbms::Derby | Dbms::Firebird)
    }
}

impl std::fmt::Display for Dbms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        assert_eq!(Dbms::from_url("jdbc:mysql://localhost:3306/exampledb"), Dbms::MySQL);
        assert_eq!(Dbms::from_url("postgres://user@localhost/db"), Dbms::PostgreSQL);
        assert_eq!(Dbms::from_url("jdbc:oracle:thin:@localhost:1521:XE"), Dbms::Oracle);
        assert_eq!(Dbms::from_url("sqlite:///tmp/x.db"), Dbms::SQLite);
        assert_eq!(Dbms::from_url("nope"), Dbms::Unknown);
    }

    #[test]
    fn test_system_tables() {
        assert!(Dbms::Oracle.is_system_table(Some("EXAMPLEDB"), "BIN$abc==$0"));
        assert!(Dbms::SQLServer.is_system_table(Some("dbo"), "sysdiagrams"));
        assert!(Dbms::MSAccess.is_system_table(None, "MSysObjects"));
        assert!(Dbms::SQLite.is_system_table(Some("main"), "sqlite_sequence"));
        assert!(Dbms::PostgreSQL.is_system_table(Some("pg_catalog"), "pg_class"));
        assert!(!Dbms::PostgreSQL.is_system_table(Some("public"), "member"));
    }

    #[test]
    fn test_unique_violation_codes() {
        assert!(Dbms::Oracle.is_unique_violation(Some("23000"), Some(1)));
        assert!(Dbms::MySQL.is_unique_violation(Some("23000"), Some(1062)));
        assert!(Dbms::PostgreSQL.is_unique_violation(Some("23505"), None));
        assert!(Dbms::SQLServer.is_unique_violation(None, Some(2601)));
        assert!(Dbms::SQLite.is_unique_violation(None, Some(2067)));
        assert!(!Dbms::MySQL.is_unique_violation(Some("23000"), Some(1452)));
    }
}
