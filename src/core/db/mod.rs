/// Database Module
///
/// This module provides the query executor and the backends it drives,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Parameters** (`params.rs`): tagged bind values and per-call bindings
/// - **Connection** (`connection.rs`): the `Driver` seam and the backend factory
/// - **Query Execution** (`query.rs`): `QueryExecutor`, verb classification, result shapes
/// - **Backends** (`sqlite.rs`, `mysql.rs`): rusqlite and, with the `mysql` feature, MySQL
///
/// ## Error Handling
///
/// All database operations return `DbQueryError::Connection` or
/// `DbQueryError::Statement` with the driver's message attached.
pub mod connection;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod params;
pub mod query;
pub mod sqlite;

pub use connection::*;
pub use params::*;
pub use query::*;
