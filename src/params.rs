use crate::Value;

/// SQL parameter container.
///
/// Positional and named values may be mixed; each list keeps insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    /// Values mapped to `?` placeholders, in order.
    pub positional: Vec<Value>,
    /// Values mapped to `:name` / `@name` / `$name` placeholders.
    pub named: Vec<(String, Value)>,
}

impl Params {
    /// Builds positional parameters.
    pub fn positional(values: impl Into<Vec<Value>>) -> Self {
        Self {
            positional: values.into(),
            named: Vec::new(),
        }
    }

    /// Builds named parameters.
    ///
    /// Names are sent as given, so include the prefix if the server expects it.
    pub fn named<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut params = Self::default();
        for (name, value) in pairs {
            params.set_named(name, value);
        }
        params
    }

    /// Appends a positional value.
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds or replaces a named value.
    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_named(name, value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub(crate) fn set_named(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.named.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.named.push((name, value)),
        }
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self::positional(values)
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(values: [Value; N]) -> Self {
        Self::positional(values)
    }
}

impl From<Vec<(String, Value)>> for Params {
    fn from(values: Vec<(String, Value)>) -> Self {
        Self::named(values)
    }
}

/// A single SQL statement with its arguments.
///
/// Re-encoded on every send.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Statement parameters.
    pub params: Params,
    /// Whether the statement should return rows.
    pub want_rows: bool,
}

impl Statement {
    pub fn new<P: Into<Params>>(sql: impl Into<String>, params: P, want_rows: bool) -> Self {
        Self {
            sql: sql.into(),
            params: params.into(),
            want_rows,
        }
    }

    /// Creates a row-returning statement.
    pub fn query<P: Into<Params>>(sql: impl Into<String>, params: P) -> Self {
        Self::new(sql, params, true)
    }

    /// Creates an execution-only statement.
    pub fn execute<P: Into<Params>>(sql: impl Into<String>, params: P) -> Self {
        Self::new(sql, params, false)
    }
}
