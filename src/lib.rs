//! dbquery: run parameterized SQL over one owned connection and get back
//! rows, an affected-row count, or nothing, depending on the statement.
//!
//! ```no_run
//! use dbquery::{ConnectionSettings, Params, QueryExecutor};
//!
//! # fn main() -> dbquery::Result<()> {
//! let settings = ConnectionSettings::mysql("localhost", "shop", "app", "secret", "utf8mb4");
//! let mut db = QueryExecutor::new(settings)?;
//!
//! let inserted = db.query(
//!     "INSERT INTO users (name) VALUES (:name)",
//!     &Params::new().with_value("name", "Ann"),
//! )?;
//! assert_eq!(inserted.affected(), Some(1));
//!
//! let id = db.last_insert_id()?;
//! let found = db.query("SELECT * FROM users WHERE id = :id", &Params::new().with_value("id", id))?;
//! # let _ = found;
//! # Ok(())
//! # }
//! ```

// Core infrastructure modules
pub mod core;

pub mod config;
pub mod logging;

pub use crate::config::{ConnectionSettings, DriverKind};
pub use crate::core::db::{
    BindType, Binding, ColumnValue, FetchMode, Params, QueryExecutor, QueryResult, Row,
    StatementVerb, Value,
};
pub use crate::core::{DbQueryError, Result};
