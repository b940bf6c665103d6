/// Parameter Module
///
/// Tagged bind values and the per-call binding sequence built from them.
/// A `Params` map is what callers hand to `QueryExecutor::query`; the
/// executor turns it into `Binding`s for exactly one prepare/bind/execute
/// cycle and drops them afterwards.

use std::fmt;

/// A value that can be bound to a named placeholder.
///
/// Only four logical kinds reach the database. Anything else is converted
/// to `Text` when the value is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    Text(String),
}

/// The driver-level type tag attached to a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindType {
    Integer,
    Boolean,
    Null,
    Text,
}

impl fmt::Display for BindType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindType::Integer => "integer",
            BindType::Boolean => "boolean",
            BindType::Null => "null",
            BindType::Text => "string",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Returns the bind type for this value.
    ///
    /// Checked in priority order: integer, boolean, null, then string.
    pub fn bind_type(&self) -> BindType {
        match self {
            Value::Integer(_) => BindType::Integer,
            Value::Boolean(_) => BindType::Boolean,
            Value::Null => BindType::Null,
            Value::Text(_) => BindType::Text,
        }
    }

    /// Infers a tagged value from untyped text.
    ///
    /// Tries an integer first, then `true`/`false`, then `null`
    /// (all case-insensitive), and falls back to the text itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbquery::core::db::Value;
    ///
    /// assert_eq!(Value::infer("42"), Value::Integer(42));
    /// assert_eq!(Value::infer("TRUE"), Value::Boolean(true));
    /// assert_eq!(Value::infer("null"), Value::Null);
    /// assert_eq!(Value::infer("Ann"), Value::Text("Ann".to_string()));
    /// ```
    pub fn infer(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "null" => Value::Null,
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(i64::from(v))
            }
        })*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(v.to_string()),
        }
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Named parameters for one query, kept in insertion order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named value, builder style
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a named value. An existing name keeps its position and takes the new value.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Builds the binding sequence for one statement execution.
    ///
    /// Each name becomes the placeholder `:name`; order follows insertion.
    pub fn bindings(&self) -> Vec<Binding> {
        self.entries
            .iter()
            .map(|(name, value)| Binding {
                placeholder: format!(":{}", name),
                value: value.clone(),
            })
            .collect()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name.as_ref(), value);
        }
        params
    }
}

/// One `(placeholder, value)` pair ready to be bound to a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub placeholder: String,
    pub value: Value,
}

impl Binding {
    /// The placeholder without its leading `:`
    pub fn name(&self) -> &str {
        self.placeholder.strip_prefix(':').unwrap_or(&self.placeholder)
    }

    pub fn bind_type(&self) -> BindType {
        self.value.bind_type()
    }
}
