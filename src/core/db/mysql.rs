/// MySQL backend built on the `mysql` crate.
///
/// Statements are prepared on the server; named `:placeholders` are
/// mapped to positional markers by the client before the prepare. The
/// session character set is applied with `SET NAMES` when the
/// connection opens.

use crate::config::{ConnectionSettings, DriverKind};
use crate::core::db::connection::{Driver, StatementOutput};
use crate::core::db::params::{Binding, Value};
use crate::core::db::query::{ColumnValue, ResultKind};
use crate::core::{DbQueryError, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params as MyParams, Row as MyRow, Value as MyValue};
use std::collections::HashMap;

pub struct MysqlDriver {
    conn: Conn,
}

impl MysqlDriver {
    pub fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(settings.host.as_str()))
            .db_name(Some(settings.dbname.as_str()))
            .user(Some(settings.user.as_str()))
            .pass(Some(settings.password.as_str()))
            .init(vec![format!("SET NAMES {}", settings.charset)]);

        let conn = Conn::new(opts).map_err(|e| DbQueryError::connection(e.to_string()))?;
        Ok(MysqlDriver { conn })
    }
}

impl Driver for MysqlDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Mysql
    }

    fn run(&mut self, sql: &str, bindings: &[Binding], kind: ResultKind) -> Result<StatementOutput> {
        check_bindings(sql, bindings)?;
        let stmt = self.conn.prep(sql).map_err(statement_error)?;
        let params = to_mysql_params(bindings);

        match kind {
            ResultKind::RowSet => {
                let rows: Vec<MyRow> = self.conn.exec(&stmt, params).map_err(statement_error)?;
                let columns: Vec<String> = rows
                    .first()
                    .map(|row| {
                        row.columns_ref()
                            .iter()
                            .map(|c| c.name_str().into_owned())
                            .collect()
                    })
                    .unwrap_or_default();
                let rows = rows
                    .iter()
                    .map(|row| {
                        (0..row.len())
                            .map(|i| row.as_ref(i).map(column_value).unwrap_or(ColumnValue::Null))
                            .collect()
                    })
                    .collect();
                Ok(StatementOutput::RowSet { columns, rows })
            }
            ResultKind::AffectedCount => {
                self.conn.exec_drop(&stmt, params).map_err(statement_error)?;
                Ok(StatementOutput::AffectedCount(self.conn.affected_rows()))
            }
            ResultKind::Nothing => {
                self.conn.exec_drop(&stmt, params).map_err(statement_error)?;
                Ok(StatementOutput::Empty)
            }
        }
    }

    fn last_insert_id(&self) -> Result<String> {
        Ok(self.conn.last_insert_id().to_string())
    }
}

fn statement_error(e: mysql::Error) -> DbQueryError {
    DbQueryError::statement(e.to_string())
}

/// Every binding must name a placeholder of the statement.
///
/// The client drops unused named values silently; this keeps MySQL in line
/// with the SQLite backend. Missing values are reported by the client itself.
fn check_bindings(sql: &str, bindings: &[Binding]) -> Result<()> {
    let declared = named_placeholders(sql);
    match bindings.iter().find(|b| !declared.iter().any(|d| d == b.name())) {
        Some(unknown) => Err(DbQueryError::statement(format!(
            "parameter {} is not defined in the statement",
            unknown.placeholder
        ))),
        None => Ok(()),
    }
}

/// Names of the `:name` placeholders in `sql`, outside quotes and comments.
fn named_placeholders(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            quote @ ('\'' | '"' | '`') => {
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    if chars[i] == '\\' && quote != '`' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .map_or(false, |c| c.is_ascii_alphabetic() || *c == '_') =>
            {
                let start = i + 1;
                i = start;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            _ => i += 1,
        }
    }
    names
}

/// MySQL has no boolean wire type; booleans travel as TINYINT 0/1.
fn to_mysql_value(value: &Value) -> MyValue {
    match value {
        Value::Integer(i) => MyValue::Int(*i),
        Value::Boolean(b) => MyValue::Int(i64::from(*b)),
        Value::Null => MyValue::NULL,
        Value::Text(s) => MyValue::Bytes(s.clone().into_bytes()),
    }
}

fn to_mysql_params(bindings: &[Binding]) -> MyParams {
    if bindings.is_empty() {
        return MyParams::Empty;
    }
    let named: HashMap<Vec<u8>, MyValue> = bindings
        .iter()
        .map(|b| (b.name().as_bytes().to_vec(), to_mysql_value(&b.value)))
        .collect();
    MyParams::Named(named)
}

fn column_value(value: &MyValue) -> ColumnValue {
    match value {
        MyValue::NULL => ColumnValue::Null,
        MyValue::Int(i) => ColumnValue::Integer(*i),
        MyValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => ColumnValue::Integer(i),
            Err(_) => ColumnValue::Text(u.to_string()),
        },
        MyValue::Float(f) => ColumnValue::Real(f64::from(*f)),
        MyValue::Double(d) => ColumnValue::Real(*d),
        MyValue::Bytes(bytes) => match String::from_utf8(bytes.clone()) {
            Ok(s) => ColumnValue::Text(s),
            Err(_) => ColumnValue::Blob(bytes.clone()),
        },
        MyValue::Date(y, mo, d, h, mi, s, us) => {
            let mut text = format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, mo, d, h, mi, s);
            if *us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            ColumnValue::Text(text)
        }
        MyValue::Time(negative, days, h, mi, s, us) => {
            let hours = u64::from(*days) * 24 + u64::from(*h);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if *negative { "-" } else { "" },
                hours,
                mi,
                s
            );
            if *us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            ColumnValue::Text(text)
        }
    }
}
