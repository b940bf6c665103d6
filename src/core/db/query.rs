/// Query Execution Module
///
/// `QueryExecutor` owns one connection and runs parameterized statements
/// on it. The leading verb of the SQL text decides the shape of the
/// result: `select`/`show` produce rows, `insert`/`update`/`delete`
/// produce an affected-row count, everything else produces nothing.

use crate::config::ConnectionSettings;
use crate::core::db::connection::{self, Driver, StatementOutput};
use crate::core::db::params::Params;
use crate::core::{DbQueryError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use tracing::{debug, info, warn};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A single value read back from a result column.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("NULL"),
            ColumnValue::Integer(i) => write!(f, "{}", i),
            ColumnValue::Real(r) => write!(f, "{}", r),
            ColumnValue::Text(s) => f.write_str(s),
            ColumnValue::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

/// How result columns are keyed in each `Row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// One entry per distinct column name; a repeated name keeps its first
    /// position and takes the last value.
    #[default]
    Associative,
    /// Every column in select order, duplicates included.
    Positional,
}

/// One result row: column names mapped to values, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, ColumnValue)>,
}

impl Row {
    pub fn new(columns: &[String], values: Vec<ColumnValue>, mode: FetchMode) -> Self {
        let mut fields: Vec<(String, ColumnValue)> = Vec::with_capacity(columns.len());
        for (name, value) in columns.iter().zip(values) {
            if mode == FetchMode::Associative {
                if let Some(existing) = fields.iter_mut().find(|(n, _)| n == name) {
                    existing.1 = value;
                    continue;
                }
            }
            fields.push((name.clone(), value));
        }
        Row { fields }
    }

    /// Value of the first column called `name`
    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_index(&self, index: usize) -> Option<&ColumnValue> {
        self.fields.get(index).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The result of `QueryExecutor::query`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows of a `select`/`show` statement
    RowSet(Vec<Row>),
    /// Rows touched by an `insert`/`update`/`delete` statement
    AffectedCount(u64),
    /// Any other statement
    Empty,
}

impl QueryResult {
    fn from_output(output: StatementOutput, mode: FetchMode) -> Self {
        match output {
            StatementOutput::RowSet { columns, rows } => QueryResult::RowSet(
                rows.into_iter()
                    .map(|values| Row::new(&columns, values, mode))
                    .collect(),
            ),
            StatementOutput::AffectedCount(n) => QueryResult::AffectedCount(n),
            StatementOutput::Empty => QueryResult::Empty,
        }
    }

    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryResult::RowSet(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            QueryResult::RowSet(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryResult::AffectedCount(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, QueryResult::Empty)
    }
}

/// What a statement returns, decided by its verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    RowSet,
    AffectedCount,
    Nothing,
}

/// The leading keyword of a SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementVerb {
    Select,
    Show,
    Insert,
    Update,
    Delete,
    /// Any other verb, lower-cased (`create`, `drop`, `begin`, ...)
    Other(String),
}

impl StatementVerb {
    /// Determines the verb of a SQL string.
    ///
    /// Whitespace runs collapse to single spaces, the first token is taken
    /// and lower-cased.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbquery::core::db::StatementVerb;
    ///
    /// assert_eq!(StatementVerb::from_sql("   SELECT\n\t* FROM t"), StatementVerb::Select);
    /// assert_eq!(StatementVerb::from_sql("Create table t (id int)"), StatementVerb::Other("create".into()));
    /// ```
    pub fn from_sql(sql: &str) -> Self {
        let normalized = normalize_sql(sql);
        let collapsed = WHITESPACE_RUN.replace_all(&normalized, " ");
        let first = collapsed.split(' ').next().unwrap_or("").to_lowercase();

        match first.as_str() {
            "select" => StatementVerb::Select,
            "show" => StatementVerb::Show,
            "insert" => StatementVerb::Insert,
            "update" => StatementVerb::Update,
            "delete" => StatementVerb::Delete,
            _ => StatementVerb::Other(first),
        }
    }

    pub fn result_kind(&self) -> ResultKind {
        match self {
            StatementVerb::Select | StatementVerb::Show => ResultKind::RowSet,
            StatementVerb::Insert | StatementVerb::Update | StatementVerb::Delete => {
                ResultKind::AffectedCount
            }
            StatementVerb::Other(_) => ResultKind::Nothing,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StatementVerb::Select => "select",
            StatementVerb::Show => "show",
            StatementVerb::Insert => "insert",
            StatementVerb::Update => "update",
            StatementVerb::Delete => "delete",
            StatementVerb::Other(verb) => verb,
        }
    }
}

impl fmt::Display for StatementVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trims surrounding whitespace (CR included). The body is left untouched,
/// so carriage returns inside string literals reach the database as written.
pub fn normalize_sql(sql: &str) -> String {
    sql.trim().to_string()
}

/// Runs parameterized statements on one exclusively owned connection.
///
/// The connection opens on construction. After `close` the next query
/// reconnects with the same settings.
pub struct QueryExecutor {
    settings: ConnectionSettings,
    driver: Option<Box<dyn Driver>>,
}

impl fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("settings", &self.settings)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl QueryExecutor {
    /// Validates the settings and opens the connection.
    ///
    /// # Errors
    ///
    /// `DbQueryError::Config` for unusable settings, `DbQueryError::Connection`
    /// when the server or file cannot be reached.
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        settings.validate()?;
        let mut executor = QueryExecutor {
            settings,
            driver: None,
        };
        executor.connect()?;
        Ok(executor)
    }

    /// Opens a fresh connection, replacing any current one.
    pub fn connect(&mut self) -> Result<()> {
        match connection::connect(&self.settings) {
            Ok(driver) => {
                self.driver = Some(driver);
                Ok(())
            }
            Err(e) => {
                warn!(driver = self.settings.driver.as_str(), error = %e, "connection failed");
                Err(e)
            }
        }
    }

    /// Releases the connection. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.driver.take().is_some() {
            info!(dbname = %self.settings.dbname, "connection closed");
        }
    }

    pub fn close_connection(&mut self) {
        self.close()
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_some()
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn ensure_connected(&mut self) -> Result<&mut Box<dyn Driver>> {
        if self.driver.is_none() {
            debug!("no open connection, reconnecting");
            self.connect()?;
        }
        self.driver
            .as_mut()
            .ok_or_else(|| DbQueryError::connection("connection is not open"))
    }

    /// Executes `sql` with named parameters and returns rows keyed by column name.
    ///
    /// # Arguments
    ///
    /// * `sql` - Statement text; placeholders are written `:name`
    /// * `params` - Values for the placeholders, bound in insertion order
    ///
    /// # Returns
    ///
    /// `RowSet` for `select`/`show`, `AffectedCount` for
    /// `insert`/`update`/`delete`, `Empty` for any other verb.
    ///
    /// # Errors
    ///
    /// `DbQueryError::Connection` if reconnecting fails, `DbQueryError::Statement`
    /// if prepare, bind or execute fails.
    pub fn query(&mut self, sql: &str, params: &Params) -> Result<QueryResult> {
        self.query_with_mode(sql, params, FetchMode::Associative)
    }

    /// Like `query`, with an explicit row keying mode.
    pub fn query_with_mode(
        &mut self,
        sql: &str,
        params: &Params,
        mode: FetchMode,
    ) -> Result<QueryResult> {
        let sql = normalize_sql(sql);
        let driver = self.ensure_connected()?;

        if sql.is_empty() {
            return Err(DbQueryError::statement(
                "cannot execute an empty SQL statement",
            ));
        }

        let verb = StatementVerb::from_sql(&sql);
        // Built per call and dropped on return, so nothing carries over.
        let bindings = params.bindings();
        debug!(verb = %verb, bindings = bindings.len(), "executing statement");

        let output = driver
            .run(&sql, &bindings, verb.result_kind())
            .map_err(|e| {
                warn!(verb = %verb, error = %e, "statement failed");
                e
            })?;

        let result = QueryResult::from_output(output, mode);
        match &result {
            QueryResult::RowSet(rows) => debug!(rows = rows.len(), "statement returned rows"),
            QueryResult::AffectedCount(n) => debug!(affected = n, "statement changed rows"),
            QueryResult::Empty => {}
        }
        Ok(result)
    }

    /// Id generated by the most recent insert on this connection.
    ///
    /// What it holds without a prior insert is up to the driver.
    pub fn last_insert_id(&self) -> Result<String> {
        self.driver
            .as_ref()
            .ok_or_else(|| DbQueryError::connection("connection is not open"))?
            .last_insert_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::Value;

    fn memory_executor() -> QueryExecutor {
        QueryExecutor::new(ConnectionSettings::sqlite(":memory:")).unwrap()
    }

    fn setup_test_table(executor: &mut QueryExecutor) {
        executor
            .query(
                "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, value REAL)",
                &Params::new(),
            )
            .unwrap();
        for (name, value) in [("Alice", "123.45"), ("Bob", "678.9")] {
            executor
                .query(
                    "INSERT INTO test (name, value) VALUES (:name, :value)",
                    &Params::new().with_value("name", name).with_value("value", value),
                )
                .unwrap();
        }
    }

    #[test]
    fn test_statement_verb_classification() {
        assert_eq!(StatementVerb::from_sql("SELECT * FROM users"), StatementVerb::Select);
        assert_eq!(StatementVerb::from_sql("show tables"), StatementVerb::Show);
        assert_eq!(StatementVerb::from_sql("INSERT INTO users VALUES (1)"), StatementVerb::Insert);
        assert_eq!(StatementVerb::from_sql("UPDATE users SET name = 'x'"), StatementVerb::Update);
        assert_eq!(StatementVerb::from_sql("DELETE FROM users"), StatementVerb::Delete);
        assert_eq!(
            StatementVerb::from_sql("CREATE TABLE t (id INTEGER)"),
            StatementVerb::Other("create".to_string())
        );
        assert_eq!(StatementVerb::from_sql("BEGIN"), StatementVerb::Other("begin".to_string()));
    }

    #[test]
    fn test_verb_detection_normalizes_whitespace_and_case() {
        assert_eq!(StatementVerb::from_sql("   SELECT\n\t* FROM t"), StatementVerb::Select);
        assert_eq!(StatementVerb::from_sql("\r\n\tDeLeTe\r\nFROM t"), StatementVerb::Delete);
        assert_eq!(StatementVerb::from_sql("select\t\t1"), StatementVerb::Select);
    }

    #[test]
    fn test_verb_requires_whole_token() {
        // `selected` is not `select`
        assert_eq!(
            StatementVerb::from_sql("selected 1"),
            StatementVerb::Other("selected".to_string())
        );
        assert_eq!(StatementVerb::from_sql("SELECT(1)").result_kind(), ResultKind::Nothing);
    }

    #[test]
    fn test_result_kind_table() {
        assert_eq!(StatementVerb::Select.result_kind(), ResultKind::RowSet);
        assert_eq!(StatementVerb::Show.result_kind(), ResultKind::RowSet);
        assert_eq!(StatementVerb::Insert.result_kind(), ResultKind::AffectedCount);
        assert_eq!(StatementVerb::Update.result_kind(), ResultKind::AffectedCount);
        assert_eq!(StatementVerb::Delete.result_kind(), ResultKind::AffectedCount);
        assert_eq!(
            StatementVerb::Other("drop".to_string()).result_kind(),
            ResultKind::Nothing
        );
    }

    #[test]
    fn test_normalize_sql() {
        assert_eq!(normalize_sql("  SELECT 1\r\n "), "SELECT 1");
        assert_eq!(normalize_sql("SELECT\r\n'a'"), "SELECT\r\n'a'");
        assert_eq!(normalize_sql(" \r\n\t "), "");
    }

    #[test]
    fn test_carriage_returns_in_literals_are_preserved() {
        let mut executor = memory_executor();
        executor
            .query("CREATE TABLE t (s TEXT)", &Params::new())
            .unwrap();
        executor
            .query("\r\nINSERT INTO t VALUES ('a\r\nb')\r\n", &Params::new())
            .unwrap();

        let result = executor
            .query("SELECT length(s) AS len, s FROM t", &Params::new())
            .unwrap();
        let row = &result.rows().unwrap()[0];
        assert_eq!(row.get("len"), Some(&ColumnValue::Integer(4)));
        assert_eq!(row.get("s"), Some(&ColumnValue::Text("a\r\nb".to_string())));
    }

    #[test]
    fn test_query_execution() {
        let mut executor = memory_executor();
        setup_test_table(&mut executor);

        let result = executor
            .query("SELECT * FROM test ORDER BY id", &Params::new())
            .unwrap();
        let rows = result.rows().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["id", "name", "value"]);
        assert_eq!(rows[0].get("name"), Some(&ColumnValue::Text("Alice".to_string())));
        assert_eq!(rows[1].get("id"), Some(&ColumnValue::Integer(2)));
    }

    #[test]
    fn test_write_statements_return_affected_count() {
        let mut executor = memory_executor();
        setup_test_table(&mut executor);

        let updated = executor
            .query(
                "UPDATE test SET value = :v WHERE name <> :name",
                &Params::new().with_value("v", 1).with_value("name", "nobody"),
            )
            .unwrap();
        assert_eq!(updated, QueryResult::AffectedCount(2));

        let deleted = executor
            .query("DELETE FROM test WHERE name = :name", &Params::new().with_value("name", "Bob"))
            .unwrap();
        assert_eq!(deleted.affected(), Some(1));
    }

    #[test]
    fn test_other_verbs_return_empty() {
        let mut executor = memory_executor();
        let result = executor
            .query("CREATE TABLE t (id INTEGER)", &Params::new())
            .unwrap();
        assert!(result.is_empty());

        let result = executor.query("DROP TABLE t", &Params::new()).unwrap();
        assert_eq!(result, QueryResult::Empty);
    }

    #[test]
    fn test_query_error_handling() {
        let mut executor = memory_executor();
        let result = executor.query("SELECT * FROM nonexistent_table", &Params::new());

        match result {
            Err(DbQueryError::Statement(msg)) => assert!(msg.contains("no such table")),
            other => panic!("Expected Statement error, got {:?}", other),
        }

        // The executor stays usable after a failure
        assert!(executor.query("SELECT 1", &Params::new()).is_ok());
    }

    #[test]
    fn test_empty_statement_is_rejected() {
        let mut executor = memory_executor();
        let result = executor.query(" \r\n ", &Params::new());
        assert!(matches!(result, Err(DbQueryError::Statement(_))));
    }

    #[test]
    fn test_no_stale_bindings_between_calls() {
        let mut executor = memory_executor();
        let first = executor
            .query("SELECT :x AS x", &Params::new().with_value("x", 5))
            .unwrap();
        assert_eq!(first.rows().unwrap()[0].get("x"), Some(&ColumnValue::Integer(5)));

        let second = executor.query("SELECT 1 AS one", &Params::new()).unwrap();
        assert_eq!(second.rows().unwrap()[0].get("one"), Some(&ColumnValue::Integer(1)));
    }

    #[test]
    fn test_close_and_reconnect() {
        let mut executor = memory_executor();
        assert!(executor.is_connected());

        executor.close_connection();
        assert!(!executor.is_connected());
        executor.close();

        assert!(matches!(executor.last_insert_id(), Err(DbQueryError::Connection(_))));

        let result = executor.query("SELECT 1 AS one", &Params::new()).unwrap();
        assert_eq!(result.rows().unwrap().len(), 1);
        assert!(executor.is_connected());
    }

    #[test]
    fn test_fetch_modes_with_duplicate_columns() {
        let mut executor = memory_executor();
        let sql = "SELECT 1 AS id, 'a' AS name, 2 AS id";

        let assoc = executor.query(sql, &Params::new()).unwrap();
        let row = &assoc.rows().unwrap()[0];
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&ColumnValue::Integer(2)));
        assert_eq!(row.get_index(0), Some(&ColumnValue::Integer(2)));

        let positional = executor
            .query_with_mode(sql, &Params::new(), FetchMode::Positional)
            .unwrap();
        let row = &positional.rows().unwrap()[0];
        assert_eq!(row.len(), 3);
        assert_eq!(row.get_index(0), Some(&ColumnValue::Integer(1)));
        assert_eq!(row.get_index(2), Some(&ColumnValue::Integer(2)));
    }

    #[test]
    fn test_typed_bindings_reach_the_database() {
        let mut executor = memory_executor();
        let params = Params::new()
            .with_value("a", 5)
            .with_value("b", true)
            .with_value("c", Value::Null)
            .with_value("d", "hi");

        let result = executor
            .query(
                "SELECT typeof(:a) AS a, typeof(:b) AS b, typeof(:c) AS c, typeof(:d) AS d",
                &params,
            )
            .unwrap();
        let row = &result.rows().unwrap()[0];
        assert_eq!(row.get("a").and_then(ColumnValue::as_str), Some("integer"));
        // SQLite stores booleans as integers
        assert_eq!(row.get("b").and_then(ColumnValue::as_str), Some("integer"));
        assert_eq!(row.get("c").and_then(ColumnValue::as_str), Some("null"));
        assert_eq!(row.get("d").and_then(ColumnValue::as_str), Some("text"));
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new(
            &["id".to_string(), "name".to_string(), "gone".to_string()],
            vec![
                ColumnValue::Integer(1),
                ColumnValue::Text("Ann".to_string()),
                ColumnValue::Null,
            ],
            FetchMode::Associative,
        );
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":1,"name":"Ann","gone":null}"#);
    }

    #[test]
    fn test_invalid_settings_fail_construction() {
        let mut settings = ConnectionSettings::sqlite(":memory:");
        settings.dbname = String::new();
        assert!(matches!(QueryExecutor::new(settings), Err(DbQueryError::Config(_))));
    }
}
