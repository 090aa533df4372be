use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ServerError;

// ── Client → server ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg<'a> {
    Hello { jwt: Option<&'a str> },
    Request { request_id: i32, request: &'a Request },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    OpenStream { stream_id: i32 },
    CloseStream { stream_id: i32 },
    Execute { stream_id: i32, stmt: Stmt },
    Batch { stream_id: i32, batch: Batch },
    GetAutocommit { stream_id: i32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Stmt {
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_args: Option<Vec<NamedArg>>,
    pub want_rows: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamedArg {
    pub name: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Batch {
    pub steps: Vec<BatchStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<BatchCond>,
    pub stmt: Stmt,
}

/// Every compound node carries its operand(s) under `step`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchCond {
    Ok { step: usize },
    Error { step: usize },
    Not { step: Box<BatchCond> },
    And { step: Vec<BatchCond> },
    Or { step: Vec<BatchCond> },
    IsAutocommit,
}

// ── Shared ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Value {
    Null {},
    Integer {
        #[serde(deserialize_with = "integer_text")]
        value: String,
    },
    Float {
        value: f64,
    },
    Text {
        value: String,
    },
    Blob {
        base64: String,
    },
}

/// Integers are sent as decimal strings; tolerate servers that send numbers.
fn integer_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(value) => value,
        Repr::Signed(value) => value.to_string(),
        Repr::Unsigned(value) => value.to_string(),
    })
}

// ── Server → client ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ServerEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub response: Option<ResponseEnvelope>,
    #[serde(default)]
    pub error: Option<ServerError>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub is_autocommit: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StmtResult {
    #[serde(default)]
    pub cols: Vec<Col>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(default)]
    pub affected_row_count: u64,
    #[serde(default)]
    pub last_insert_rowid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Col {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decltype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchResult {
    pub step_results: Vec<Option<StmtResult>>,
    pub step_errors: Vec<Option<ServerError>>,
}
