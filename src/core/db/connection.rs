/// Connection Module
///
/// The `Driver` trait is the seam between `QueryExecutor` and a concrete
/// database client. A driver owns exactly one live connection; it prepares
/// a statement, binds the given parameters with their tagged types,
/// executes it and reports the outcome in the shape the caller asked for.

use crate::config::{ConnectionSettings, DriverKind};
use crate::core::db::params::Binding;
use crate::core::db::query::{ColumnValue, ResultKind};
use crate::core::Result;
#[cfg(not(feature = "mysql"))]
use crate::core::DbQueryError;
use tracing::info;

/// Raw outcome of one statement, before fetch-mode shaping.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutput {
    RowSet {
        columns: Vec<String>,
        rows: Vec<Vec<ColumnValue>>,
    },
    AffectedCount(u64),
    Empty,
}

/// A single open database connection.
pub trait Driver: Send {
    /// The backend this driver talks to
    fn kind(&self) -> DriverKind;

    /// Prepares `sql`, binds `bindings` in order, executes, and collects the
    /// output `kind` calls for.
    ///
    /// Failures are `DbQueryError::Statement`.
    fn run(&mut self, sql: &str, bindings: &[Binding], kind: ResultKind) -> Result<StatementOutput>;

    /// Id generated by the most recent insert on this connection
    fn last_insert_id(&self) -> Result<String>;
}

/// Opens a connection for the backend named in `settings`.
///
/// Failures are `DbQueryError::Connection` carrying the driver's message.
pub fn connect(settings: &ConnectionSettings) -> Result<Box<dyn Driver>> {
    let driver: Box<dyn Driver> = match settings.driver {
        DriverKind::Sqlite => Box::new(super::sqlite::SqliteDriver::connect(settings)?),
        DriverKind::Mysql => connect_mysql(settings)?,
    };
    info!(driver = settings.driver.as_str(), dbname = %settings.dbname, "connected");
    Ok(driver)
}

#[cfg(feature = "mysql")]
fn connect_mysql(settings: &ConnectionSettings) -> Result<Box<dyn Driver>> {
    Ok(Box::new(super::mysql::MysqlDriver::connect(settings)?))
}

#[cfg(not(feature = "mysql"))]
fn connect_mysql(_settings: &ConnectionSettings) -> Result<Box<dyn Driver>> {
    Err(DbQueryError::connection(
        "MySQL support is not compiled in (enable the `mysql` feature)",
    ))
}
