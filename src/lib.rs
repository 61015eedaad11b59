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

//! # Flute
//!
//! Database metadata extraction and SQL execution core.
//!
//! Flute reads the catalog of a live database (tables, columns, keys,
//! indexes, procedures and Oracle synonyms) into the [`flute_core`] model,
//! writes it out as a schema document, and runs SQL, delimiter data files
//! and procedure calls against the same connection.
//!
//! Put the desired version of the crate into the `dependencies` section of your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! flute = { version = "0.1.0", features = ["sqlite-sync"] }
//! ```
//!
//! ## Feature.
//!
//! * ```mysql-sync``` - to use mysql
//! * ```postgres-sync``` - to use postgresql
//! * ```oracle-sync``` - to use oracle
//! * ```sqlite-sync``` - to use sqlite
//!
//! ## Example
//!
//! ```ignore
//! use flute::*;
//!
//! let cfg = FluteConfig::new("sqlite:/tmp/exampledb.db").set_max_size(2);
//! let data_source = open_data_source(&cfg)?;
//! let conn = data_source.get_connection()?;
//!
//! // Load the catalog and write it as schema XML
//! let database = SchemaLoader::new(conn.as_ref(), &cfg).load()?;
//! SchemaXmlWriter::create("/tmp/project-schema.xml")?.write(&database)?;
//!
//! // Run one statement through the interceptor chain
//! let mut invoker = BehaviorCommandInvoker::from_config(&cfg);
//! let command = BehaviorCommandBuilder::new(CommandKind::Update)
//!     .table_db_name("MEMBER")
//!     .entity_type("Member")
//!     .sql("update MEMBER set MEMBER_NAME = ? where MEMBER_ID = ?")
//!     .bind(FluteValue::Text("Stojkovic".to_string()))
//!     .bind(FluteValue::Int(3))
//!     .build()?;
//! invoker.invoke(conn.as_ref(), &command)?;
//! ```

mod errors;
mod config;
mod message;
mod comm;
mod capability;
mod procedure;

pub mod driver;
pub mod interceptor;
pub mod binding;
pub mod behavior;
pub mod meta;
pub mod schema;
pub mod loader;

#[doc(inline)]
pub use errors::{FluteError, Result, SqlError};
#[doc(inline)]
pub use config::{AdditionalSchema, FluteConfig, NamePattern, NoFilter, SchemaFilter};
#[doc(inline)]
pub use message::{ConnectionDiagnostics, ExceptionMessageBuilder};
#[doc(inline)]
pub use comm::{close_quietly, ExecuteContext, ExecuteResult, QueryMetrics, ResourceGuard};
#[doc(inline)]
pub use capability::{
    split_statements, ResultLogger, SchemaConnectable, SqlFileCollectable, SqlFileCollector, TracingResultLogger,
};
#[doc(inline)]
pub use procedure::{ProcedureExecutor, ProcedureResult};
#[doc(inline)]
pub use driver::{CallParameter, CallSpec, DataSource, DatabaseMetaData, DbConnection, Dbms};
#[cfg(any(
    feature = "mysql-sync",
    feature = "postgres-sync",
    feature = "sqlite-sync",
    feature = "oracle-sync"
))]
#[doc(inline)]
pub use driver::blocking::open_data_source;
#[doc(inline)]
pub use interceptor::{FluteInterceptor, InterceptorBuilder, InterceptorChain, LogLevel, LoggingInterceptor};
#[doc(inline)]
pub use binding::{NullBinder, ParameterBinder, ValueTypes};
#[doc(inline)]
pub use behavior::{
    BehaviorCommand, BehaviorCommandBuilder, BehaviorCommandInvoker, BindValue, CommandKind, SqlFileRunner,
    SqlRunSummary,
};
#[doc(inline)]
pub use schema::{DatabaseMeta, SchemaLoader, SchemaXmlWriter};
#[doc(inline)]
pub use loader::{ColumnMetaCache, DelimiterDataWriter, LoadedDataInfo};

pub use flute_core::*;
