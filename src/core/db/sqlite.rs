/// SQLite backend built on rusqlite.
///
/// `dbname` is the database file path. The charset setting selects the
/// database text encoding.

use crate::config::{ConnectionSettings, DriverKind};
use crate::core::db::connection::{Driver, StatementOutput};
use crate::core::db::params::{Binding, Value};
use crate::core::db::query::{ColumnValue, ResultKind};
use crate::core::{DbQueryError, Result};
use rusqlite::types::{Null, ValueRef};
use rusqlite::{Batch, Connection, Statement};
use std::collections::HashSet;

pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    /// Opens the database file and applies the session settings.
    pub fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let encoding = sqlite_encoding(&settings.charset).ok_or_else(|| {
            DbQueryError::connection(format!(
                "charset '{}' is not supported by SQLite",
                settings.charset
            ))
        })?;

        let conn = Connection::open(&settings.dbname)
            .map_err(|e| DbQueryError::connection(e.to_string()))?;

        conn.execute_batch(&format!(
            "PRAGMA encoding = '{}'; PRAGMA foreign_keys = ON;",
            encoding
        ))
        .map_err(|e| DbQueryError::connection(e.to_string()))?;

        Ok(SqliteDriver { conn })
    }
}

impl Driver for SqliteDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Sqlite
    }

    fn run(&mut self, sql: &str, bindings: &[Binding], kind: ResultKind) -> Result<StatementOutput> {
        let mut stmt = prepare_single(&self.conn, sql)?;
        bind_all(&mut stmt, bindings)?;

        match kind {
            ResultKind::RowSet => {
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let mut rows = stmt.raw_query();
                let mut out = Vec::new();
                while let Some(row) = rows.next().map_err(statement_error)? {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        values.push(ColumnValue::from(row.get_ref(i).map_err(statement_error)?));
                    }
                    out.push(values);
                }
                Ok(StatementOutput::RowSet { columns, rows: out })
            }
            ResultKind::AffectedCount => {
                // Stepped rather than executed so `... RETURNING` still counts.
                let mut rows = stmt.raw_query();
                while rows.next().map_err(statement_error)?.is_some() {}
                drop(rows);
                let changed: i64 = self
                    .conn
                    .query_row("SELECT changes()", [], |row| row.get(0))
                    .map_err(statement_error)?;
                Ok(StatementOutput::AffectedCount(changed as u64))
            }
            ResultKind::Nothing => {
                // Step to completion; rows from e.g. PRAGMA are discarded.
                let mut rows = stmt.raw_query();
                while rows.next().map_err(statement_error)?.is_some() {}
                Ok(StatementOutput::Empty)
            }
        }
    }

    fn last_insert_id(&self) -> Result<String> {
        Ok(self.conn.last_insert_rowid().to_string())
    }
}

/// Prepares exactly one statement.
///
/// Text after the first statement (other than whitespace or comments) is
/// rejected instead of being silently dropped.
fn prepare_single<'conn>(conn: &'conn Connection, sql: &str) -> Result<Statement<'conn>> {
    let mut batch = Batch::new(conn, sql);
    let stmt = batch
        .next()
        .map_err(statement_error)?
        .ok_or_else(|| DbQueryError::statement("cannot execute an empty SQL statement"))?;

    match batch.next() {
        Ok(None) => Ok(stmt),
        _ => Err(DbQueryError::statement(
            "multiple statements provided; execute them one at a time",
        )),
    }
}

/// Binds every pair to its named placeholder with its tagged type.
///
/// A name the statement does not declare, or a declared placeholder that
/// nothing binds, fails the statement instead of silently binding NULL.
fn bind_all(stmt: &mut Statement<'_>, bindings: &[Binding]) -> Result<()> {
    let mut bound = HashSet::new();
    for binding in bindings {
        let idx = stmt
            .parameter_index(&binding.placeholder)
            .map_err(statement_error)?
            .ok_or_else(|| {
                DbQueryError::statement(format!(
                    "parameter {} is not defined in the statement",
                    binding.placeholder
                ))
            })?;

        let result = match &binding.value {
            Value::Integer(i) => stmt.raw_bind_parameter(idx, i),
            Value::Boolean(b) => stmt.raw_bind_parameter(idx, b),
            Value::Null => stmt.raw_bind_parameter(idx, Null),
            Value::Text(s) => stmt.raw_bind_parameter(idx, s.as_str()),
        };
        result.map_err(statement_error)?;
        bound.insert(idx);
    }

    let expected = stmt.parameter_count();
    if bound.len() < expected {
        return Err(DbQueryError::statement(format!(
            "statement declares {} parameter(s) but {} were bound",
            expected,
            bound.len()
        )));
    }
    Ok(())
}

fn statement_error(e: rusqlite::Error) -> DbQueryError {
    DbQueryError::statement(e.to_string())
}

/// Maps a MySQL-style charset name onto a SQLite text encoding.
fn sqlite_encoding(charset: &str) -> Option<&'static str> {
    match charset.to_ascii_lowercase().as_str() {
        "utf8" | "utf-8" | "utf8mb4" | "utf8mb3" => Some("UTF-8"),
        "utf16" | "utf-16" => Some("UTF-16"),
        "utf16le" | "utf-16le" => Some("UTF-16le"),
        "utf16be" | "utf-16be" => Some("UTF-16be"),
        _ => None,
    }
}

impl From<ValueRef<'_>> for ColumnValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => ColumnValue::Null,
            ValueRef::Integer(i) => ColumnValue::Integer(i),
            ValueRef::Real(f) => ColumnValue::Real(f),
            ValueRef::Text(t) => ColumnValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => ColumnValue::Blob(b.to_vec()),
        }
    }
}
