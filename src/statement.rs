use std::collections::BTreeMap;

use crate::{FetchMode, HranaError, Params, Result, Rows, Statement, Stream, Value};

/// Explicit type for [`PreparedStatement::bind_value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Null,
    Int,
    Str,
    Bool,
    Float,
    Blob,
}

impl ParamType {
    /// Converts `value` to this type.
    ///
    /// Fails with [`HranaError::InvalidArgument`] when no sensible conversion
    /// exists, such as non-numeric text bound as `Int`.
    pub fn coerce(self, value: Value) -> Result<Value> {
        let coerced = match (self, value) {
            (Self::Null, _) => Value::Null,

            (Self::Int, value @ Value::Integer(_)) => value,
            (Self::Int, Value::Float(float)) if float.is_finite() => Value::Integer(float.trunc() as i64),
            (Self::Int, Value::Text(text)) => match text.trim().parse::<i64>() {
                Ok(int) => Value::Integer(int),
                Err(_) => return Err(impossible(self, &Value::Text(text))),
            },

            (Self::Str, value @ Value::Text(_)) => value,
            (Self::Str, Value::Integer(int)) => Value::Text(int.to_string()),
            (Self::Str, Value::Float(float)) => Value::Text(float.to_string()),
            (Self::Str, Value::Blob(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Value::Text(text),
                Err(err) => return Err(impossible(self, &Value::Blob(err.into_bytes()))),
            },

            (Self::Bool, value) => Value::Integer(i64::from(is_truthy(&value))),

            (Self::Float, value @ Value::Float(_)) => value,
            (Self::Float, Value::Integer(int)) => Value::Float(int as f64),
            (Self::Float, Value::Text(text)) => match text.trim().parse::<f64>() {
                Ok(float) => Value::Float(float),
                Err(_) => return Err(impossible(self, &Value::Text(text))),
            },

            (Self::Blob, value @ Value::Blob(_)) => value,
            (Self::Blob, Value::Text(text)) => Value::Blob(text.into_bytes()),

            (_, value) => return Err(impossible(self, &value)),
        };
        Ok(coerced)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Integer(int) => *int != 0,
        Value::Float(float) => *float != 0.0,
        Value::Text(text) => !(text.is_empty() || text == "0"),
        Value::Blob(bytes) => !bytes.is_empty(),
    }
}

fn impossible(target: ParamType, value: &Value) -> HranaError {
    HranaError::InvalidArgument(format!(
        "cannot bind {} value as {target:?}",
        value.kind()
    ))
}

/// Placeholder selector: a 1-based position or a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamKey {
    Position(usize),
    Name(String),
}

impl From<usize> for ParamKey {
    fn from(position: usize) -> Self {
        Self::Position(position)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// SQL text with values bound ahead of execution.
///
/// Always runs with `want_rows = true` on the stream it was prepared on.
#[derive(Debug)]
pub struct PreparedStatement<'a> {
    stream: &'a mut Stream,
    sql: String,
    positional: BTreeMap<usize, Value>,
    named: Params,
    fetch_mode: FetchMode,
}

impl<'a> PreparedStatement<'a> {
    pub(crate) fn new(stream: &'a mut Stream, sql: impl Into<String>, fetch_mode: FetchMode) -> Self {
        Self {
            stream,
            sql: sql.into(),
            positional: BTreeMap::new(),
            named: Params::default(),
            fetch_mode,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn set_fetch_mode(&mut self, fetch_mode: FetchMode) {
        self.fetch_mode = fetch_mode;
    }

    /// Binds `value` as is, replacing any earlier binding for `key`.
    pub fn bind(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) -> Result<&mut Self> {
        match key.into() {
            ParamKey::Position(0) => {
                return Err(HranaError::InvalidArgument(
                    "parameter positions start at 1".to_owned(),
                ))
            }
            ParamKey::Position(position) => {
                self.positional.insert(position, value.into());
            }
            ParamKey::Name(name) if name.is_empty() => {
                return Err(HranaError::InvalidArgument(
                    "parameter name must not be empty".to_owned(),
                ))
            }
            ParamKey::Name(name) => self.named.set_named(name, value.into()),
        }
        Ok(self)
    }

    /// Binds `value` after converting it to `ty`.
    pub fn bind_value(
        &mut self,
        key: impl Into<ParamKey>,
        value: impl Into<Value>,
        ty: ParamType,
    ) -> Result<&mut Self> {
        let value = ty.coerce(value.into())?;
        self.bind(key, value)
    }

    /// Runs the statement.
    ///
    /// `extra` is merged over the bound values: its n-th positional value
    /// replaces position n + 1 and its named values replace same-named ones.
    pub fn execute<P: Into<Params>>(&mut self, extra: P) -> Result<Rows> {
        let statement = Statement::query(self.sql.clone(), self.merged(extra.into())?);
        let result = self.stream.execute(&statement)?;
        Ok(Rows::new(result, self.fetch_mode))
    }

    fn merged(&self, extra: Params) -> Result<Params> {
        let mut positional = self.positional.clone();
        for (index, value) in extra.positional.into_iter().enumerate() {
            positional.insert(index + 1, value);
        }

        let mut params = self.named.clone();
        for (name, value) in extra.named {
            params.set_named(name, value);
        }

        for (expected, (position, value)) in (1..).zip(positional) {
            if position != expected {
                return Err(HranaError::InvalidArgument(format!(
                    "positional parameter {expected} is not bound"
                )));
            }
            params.positional.push(value);
        }
        Ok(params)
    }
}
