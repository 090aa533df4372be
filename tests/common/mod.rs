#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{Arc, Mutex, MutexGuard},
};

use hrana_ws::{HandshakeResponse, HranaError, Transport};
use serde_json::{json, Value as JsonValue};
use url::Url;

/// Scripted in-memory Hrana server.
///
/// SQL handling is keyword based:
/// - `BEGIN` / `COMMIT` / `ROLLBACK` toggle the stream's autocommit flag
/// - `INSERT` affects one row and reports a fresh rowid
/// - `DELETE` affects two rows
/// - `SELECT` without arguments returns one row `one = 1`; with arguments it
///   echoes them back as a single row (`?1`, `?2`, … then the named args)
/// - any SQL mentioning `missing` fails with `SQLITE_ERROR`
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

#[derive(Default)]
struct ServerState {
    token: Option<String>,
    subprotocol: Option<String>,
    refuse_open_stream: bool,
    connected: bool,
    connect_url: Option<String>,
    connect_headers: Vec<(String, String)>,
    disconnects: usize,
    frames: Vec<JsonValue>,
    scripted: VecDeque<JsonValue>,
    fail_next_send: bool,
    streams: HashMap<i64, bool>,
    next_rowid: i64,
}

impl FakeServer {
    pub fn new() -> Self {
        let server = Self::default();
        server.lock().subprotocol = Some("hrana3".to_owned());
        server
    }

    pub fn with_token(self, token: &str) -> Self {
        self.lock().token = Some(token.to_owned());
        self
    }

    pub fn with_subprotocol(self, subprotocol: Option<&str>) -> Self {
        self.lock().subprotocol = subprotocol.map(str::to_owned);
        self
    }

    pub fn refuse_open_stream(&self, refuse: bool) {
        self.lock().refuse_open_stream = refuse;
    }

    pub fn transport(&self) -> FakeTransport {
        FakeTransport {
            server: self.clone(),
        }
    }

    /// Replies to the next request with `frame` instead of executing it.
    pub fn push_reply(&self, frame: JsonValue) {
        self.lock().scripted.push_back(frame);
    }

    /// Makes the next send fail as if the socket was reset.
    pub fn fail_next_send(&self) {
        self.lock().fail_next_send = true;
    }

    pub fn frames(&self) -> Vec<JsonValue> {
        self.lock().frames.clone()
    }

    /// Inner `request` objects of every request frame, in order.
    pub fn requests(&self) -> Vec<JsonValue> {
        self.frames()
            .into_iter()
            .filter(|frame| frame["type"] == "request")
            .map(|frame| frame["request"].clone())
            .collect()
    }

    pub fn request_ids(&self) -> Vec<i64> {
        self.frames()
            .iter()
            .filter_map(|frame| frame["request_id"].as_i64())
            .collect()
    }

    pub fn requests_of_type(&self, kind: &str) -> Vec<JsonValue> {
        self.requests()
            .into_iter()
            .filter(|request| request["type"] == kind)
            .collect()
    }

    pub fn connect_url(&self) -> Option<String> {
        self.lock().connect_url.clone()
    }

    pub fn connect_header(&self, name: &str) -> Option<String> {
        self.lock()
            .connect_headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn disconnects(&self) -> usize {
        self.lock().disconnects
    }

    pub fn open_streams(&self) -> usize {
        self.lock().streams.len()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("fake server mutex must not be poisoned")
    }
}

pub struct FakeTransport {
    server: FakeServer,
}

fn reset(message: &str) -> HranaError {
    HranaError::Transport(Box::new(io::Error::new(
        io::ErrorKind::ConnectionReset,
        message.to_owned(),
    )))
}

impl Transport for FakeTransport {
    fn connect(
        &mut self,
        url: &Url,
        headers: &[(String, String)],
    ) -> hrana_ws::Result<HandshakeResponse> {
        let mut state = self.server.lock();
        state.connected = true;
        state.connect_url = Some(url.to_string());
        state.connect_headers = headers.to_vec();
        let headers = state
            .subprotocol
            .iter()
            .map(|value| ("sec-websocket-protocol".to_owned(), value.clone()))
            .collect::<Vec<_>>();
        Ok(HandshakeResponse { headers })
    }

    fn disconnect(&mut self) -> hrana_ws::Result<()> {
        let mut state = self.server.lock();
        if state.connected {
            state.connected = false;
            state.disconnects += 1;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.server.lock().connected
    }

    fn send_text_and_receive_text(&mut self, text: &str) -> hrana_ws::Result<String> {
        let mut state = self.server.lock();
        if !state.connected {
            return Err(reset("not connected"));
        }
        if std::mem::take(&mut state.fail_next_send) {
            state.connected = false;
            return Err(reset("connection reset by peer"));
        }

        let frame: JsonValue = serde_json::from_str(text).expect("client frames are valid JSON");
        state.frames.push(frame.clone());

        let reply = match frame["type"].as_str() {
            Some("hello") => match state.scripted.pop_front() {
                Some(scripted) => scripted,
                None => state.hello(&frame),
            },
            Some("request") => match state.scripted.pop_front() {
                Some(scripted) => scripted,
                None => state.handle_request(&frame["request"]),
            },
            other => panic!("unexpected client frame type {other:?}"),
        };
        Ok(reply.to_string())
    }
}

impl ServerState {
    fn hello(&self, frame: &JsonValue) -> JsonValue {
        let jwt = frame["jwt"].as_str();
        match &self.token {
            Some(expected) if jwt != Some(expected.as_str()) => json!({
                "type": "hello_error",
                "error": {"message": "invalid auth token", "code": "AUTH_FAILED"}
            }),
            _ => json!({"type": "hello_ok"}),
        }
    }

    fn handle_request(&mut self, request: &JsonValue) -> JsonValue {
        let stream_id = request["stream_id"].as_i64().expect("request carries stream_id");
        let kind = request["type"].as_str().expect("request carries type");

        let response = match kind {
            "open_stream" => {
                if self.refuse_open_stream || self.streams.contains_key(&stream_id) {
                    return error_reply("cannot open stream", "STREAM_ERROR");
                }
                self.streams.insert(stream_id, true);
                json!({"type": "open_stream"})
            }
            "close_stream" => {
                self.streams.remove(&stream_id);
                json!({"type": "close_stream"})
            }
            "get_autocommit" => match self.streams.get(&stream_id) {
                Some(autocommit) => json!({"type": "get_autocommit", "is_autocommit": autocommit}),
                None => return error_reply("stream not open", "STREAM_CLOSED"),
            },
            "execute" => {
                if !self.streams.contains_key(&stream_id) {
                    return error_reply("stream not open", "STREAM_CLOSED");
                }
                match self.run(stream_id, &request["stmt"]) {
                    Ok(result) => json!({"type": "execute", "result": result}),
                    Err(error) => return json!({"type": "response_error", "error": error}),
                }
            }
            "batch" => {
                if !self.streams.contains_key(&stream_id) {
                    return error_reply("stream not open", "STREAM_CLOSED");
                }
                json!({"type": "batch", "result": self.run_batch(stream_id, &request["batch"])})
            }
            other => panic!("unexpected request type {other}"),
        };
        json!({"type": "response_ok", "response": response})
    }

    fn run(&mut self, stream_id: i64, stmt: &JsonValue) -> Result<JsonValue, JsonValue> {
        let sql = stmt["sql"].as_str().expect("stmt carries sql").trim();
        let upper = sql.to_ascii_uppercase();

        if upper.contains("MISSING") {
            return Err(json!({"message": "no such table: missing", "code": "SQLITE_ERROR"}));
        }

        let mut result = json!({
            "cols": [],
            "rows": [],
            "affected_row_count": 0,
            "last_insert_rowid": null
        });

        if upper.starts_with("BEGIN") {
            self.streams.insert(stream_id, false);
        } else if upper.starts_with("COMMIT") || upper.starts_with("ROLLBACK") {
            self.streams.insert(stream_id, true);
        } else if upper.starts_with("INSERT") {
            self.next_rowid += 1;
            result["affected_row_count"] = json!(1);
            result["last_insert_rowid"] = json!(self.next_rowid.to_string());
        } else if upper.starts_with("DELETE") {
            result["affected_row_count"] = json!(2);
        } else if upper.starts_with("SELECT") {
            let (cols, row) = echo_row(stmt);
            result["cols"] = JsonValue::Array(cols);
            result["rows"] = json!([row]);
        }
        Ok(result)
    }

    fn run_batch(&mut self, stream_id: i64, batch: &JsonValue) -> JsonValue {
        let steps = batch["steps"].as_array().expect("batch carries steps");
        let mut results = Vec::with_capacity(steps.len());
        let mut errors = Vec::with_capacity(steps.len());

        for step in steps {
            let run = match step.get("condition") {
                Some(condition) => self.eval(stream_id, condition, &results, &errors),
                None => true,
            };
            if !run {
                results.push(JsonValue::Null);
                errors.push(JsonValue::Null);
                continue;
            }
            match self.run(stream_id, &step["stmt"]) {
                Ok(result) => {
                    results.push(result);
                    errors.push(JsonValue::Null);
                }
                Err(error) => {
                    results.push(JsonValue::Null);
                    errors.push(error);
                }
            }
        }
        json!({"step_results": results, "step_errors": errors})
    }

    fn eval(
        &self,
        stream_id: i64,
        condition: &JsonValue,
        results: &[JsonValue],
        errors: &[JsonValue],
    ) -> bool {
        let index = || condition["step"].as_u64().expect("step index") as usize;
        match condition["type"].as_str().expect("condition carries type") {
            "ok" => results.get(index()).is_some_and(|result| !result.is_null()),
            "error" => errors.get(index()).is_some_and(|error| !error.is_null()),
            "not" => !self.eval(stream_id, &condition["step"], results, errors),
            "and" => condition["step"]
                .as_array()
                .expect("and operands")
                .iter()
                .all(|item| self.eval(stream_id, item, results, errors)),
            "or" => condition["step"]
                .as_array()
                .expect("or operands")
                .iter()
                .any(|item| self.eval(stream_id, item, results, errors)),
            "is_autocommit" => self.streams.get(&stream_id).copied().unwrap_or(true),
            other => panic!("unexpected condition type {other}"),
        }
    }
}

fn echo_row(stmt: &JsonValue) -> (Vec<JsonValue>, Vec<JsonValue>) {
    let mut cols = Vec::new();
    let mut row = Vec::new();

    if let Some(args) = stmt["args"].as_array() {
        for (index, value) in args.iter().enumerate() {
            cols.push(json!({"name": format!("?{}", index + 1), "decltype": null}));
            row.push(value.clone());
        }
    }
    if let Some(named) = stmt["named_args"].as_array() {
        for arg in named {
            cols.push(json!({"name": arg["name"], "decltype": null}));
            row.push(arg["value"].clone());
        }
    }
    if cols.is_empty() {
        cols.push(json!({"name": "one", "decltype": "INTEGER"}));
        row.push(json!({"type": "integer", "value": "1"}));
    }
    (cols, row)
}

fn error_reply(message: &str, code: &str) -> JsonValue {
    json!({"type": "response_error", "error": {"message": message, "code": code}})
}
