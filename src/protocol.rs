//! Typed Hrana envelopes and the server-message dispatch.
//!
//! Server frames are decoded in two levels: the top-level `type` tag selects a
//! [`ServerMessage`], and the tag inside `response_ok.response` selects a
//! [`Response`]. Both tag sets are closed enums matched without a wildcard, so
//! adding a tag forces every dispatch site to handle it. Tags outside the sets
//! are protocol violations, never silently ignored.

use crate::{
    decode::{decode_batch_result, decode_statement_result},
    error::ServerError,
    wire::{self, ClientMsg, Request},
    BatchResults, HranaError, Result, StatementResult,
};

/// Negotiated protocol version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    Hrana3,
}

impl ProtocolVersion {
    /// Value of `Sec-WebSocket-Protocol` requesting this version.
    pub const fn subprotocol(self) -> &'static str {
        match self {
            Self::Hrana3 => "hrana3",
        }
    }

    pub fn from_subprotocol(value: &str) -> Option<Self> {
        match value.trim() {
            "hrana3" => Some(Self::Hrana3),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ServerMessageKind {
    HelloOk,
    HelloError,
    ResponseOk,
    ResponseError,
}

impl ServerMessageKind {
    pub(crate) const ALL: [Self; 4] = [
        Self::HelloOk,
        Self::HelloError,
        Self::ResponseOk,
        Self::ResponseError,
    ];

    pub(crate) fn tag(self) -> &'static str {
        match self {
            Self::HelloOk => "hello_ok",
            Self::HelloError => "hello_error",
            Self::ResponseOk => "response_ok",
            Self::ResponseError => "response_error",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResponseKind {
    OpenStream,
    CloseStream,
    Execute,
    GetAutocommit,
    Batch,
}

impl ResponseKind {
    pub(crate) const ALL: [Self; 5] = [
        Self::OpenStream,
        Self::CloseStream,
        Self::Execute,
        Self::GetAutocommit,
        Self::Batch,
    ];

    pub(crate) fn tag(self) -> &'static str {
        match self {
            Self::OpenStream => "open_stream",
            Self::CloseStream => "close_stream",
            Self::Execute => "execute",
            Self::GetAutocommit => "get_autocommit",
            Self::Batch => "batch",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// Decoded server → client frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    HelloOk,
    HelloError(ServerError),
    ResponseOk(Response),
    ResponseError(ServerError),
}

impl ServerMessage {
    pub(crate) fn kind(&self) -> ServerMessageKind {
        match self {
            Self::HelloOk => ServerMessageKind::HelloOk,
            Self::HelloError(_) => ServerMessageKind::HelloError,
            Self::ResponseOk(_) => ServerMessageKind::ResponseOk,
            Self::ResponseError(_) => ServerMessageKind::ResponseError,
        }
    }

    /// Wire tag of this message.
    pub fn type_name(&self) -> &'static str {
        self.kind().tag()
    }
}

/// Payload of a `response_ok` frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    OpenStream,
    CloseStream,
    Execute(StatementResult),
    GetAutocommit(bool),
    Batch(BatchResults),
}

impl Response {
    pub(crate) fn kind(&self) -> ResponseKind {
        match self {
            Self::OpenStream => ResponseKind::OpenStream,
            Self::CloseStream => ResponseKind::CloseStream,
            Self::Execute(_) => ResponseKind::Execute,
            Self::GetAutocommit(_) => ResponseKind::GetAutocommit,
            Self::Batch(_) => ResponseKind::Batch,
        }
    }

    /// Wire tag of this response.
    pub fn type_name(&self) -> &'static str {
        self.kind().tag()
    }

    pub(crate) fn expect_open_stream(self) -> Result<()> {
        match self {
            Self::OpenStream => Ok(()),
            other => Err(unexpected_response(ResponseKind::OpenStream, &other)),
        }
    }

    pub(crate) fn expect_close_stream(self) -> Result<()> {
        match self {
            Self::CloseStream => Ok(()),
            other => Err(unexpected_response(ResponseKind::CloseStream, &other)),
        }
    }

    pub(crate) fn into_execute(self) -> Result<StatementResult> {
        match self {
            Self::Execute(result) => Ok(result),
            other => Err(unexpected_response(ResponseKind::Execute, &other)),
        }
    }

    pub(crate) fn into_autocommit(self) -> Result<bool> {
        match self {
            Self::GetAutocommit(is_autocommit) => Ok(is_autocommit),
            other => Err(unexpected_response(ResponseKind::GetAutocommit, &other)),
        }
    }

    pub(crate) fn into_batch(self) -> Result<BatchResults> {
        match self {
            Self::Batch(results) => Ok(results),
            other => Err(unexpected_response(ResponseKind::Batch, &other)),
        }
    }
}

fn unexpected_response(expected: ResponseKind, got: &Response) -> HranaError {
    HranaError::Protocol(format!(
        "expected {} response, got '{}'",
        expected.tag(),
        got.type_name()
    ))
}

impl Request {
    /// Wire tag of this request.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::OpenStream { .. } => "open_stream",
            Self::CloseStream { .. } => "close_stream",
            Self::Execute { .. } => "execute",
            Self::Batch { .. } => "batch",
            Self::GetAutocommit { .. } => "get_autocommit",
        }
    }

    pub fn stream_id(&self) -> i32 {
        match self {
            Self::OpenStream { stream_id }
            | Self::CloseStream { stream_id }
            | Self::Execute { stream_id, .. }
            | Self::Batch { stream_id, .. }
            | Self::GetAutocommit { stream_id } => *stream_id,
        }
    }
}

pub(crate) fn encode_client_message(message: &ClientMsg<'_>) -> Result<String> {
    serde_json::to_string(message)
        .map_err(|err| HranaError::Protocol(format!("cannot encode client message: {err}")))
}

pub(crate) fn decode_server_message(text: &str) -> Result<ServerMessage> {
    let envelope = serde_json::from_str::<wire::ServerEnvelope>(text)
        .map_err(|err| {
            HranaError::Decode(format!(
                "invalid server message JSON ({} bytes): {err}",
                text.len()
            ))
        })?;

    let kind = ServerMessageKind::from_tag(&envelope.kind).ok_or_else(|| {
        HranaError::Protocol(format!("unknown server message type '{}'", envelope.kind))
    })?;

    match kind {
        ServerMessageKind::HelloOk => Ok(ServerMessage::HelloOk),
        ServerMessageKind::HelloError => {
            required_error(envelope.error, kind).map(ServerMessage::HelloError)
        }
        ServerMessageKind::ResponseOk => {
            let response = envelope.response.ok_or_else(|| {
                HranaError::Decode("missing response payload in response_ok".to_owned())
            })?;
            decode_response(response).map(ServerMessage::ResponseOk)
        }
        ServerMessageKind::ResponseError => {
            required_error(envelope.error, kind).map(ServerMessage::ResponseError)
        }
    }
}

fn required_error(error: Option<ServerError>, kind: ServerMessageKind) -> Result<ServerError> {
    error.ok_or_else(|| HranaError::Decode(format!("missing error payload in {}", kind.tag())))
}

fn decode_response(response: wire::ResponseEnvelope) -> Result<Response> {
    let kind = ResponseKind::from_tag(&response.kind).ok_or_else(|| {
        HranaError::Protocol(format!("unknown response type '{}'", response.kind))
    })?;

    match kind {
        ResponseKind::OpenStream => Ok(Response::OpenStream),
        ResponseKind::CloseStream => Ok(Response::CloseStream),
        ResponseKind::Execute => {
            let result = parse_result::<wire::StmtResult>(response.result, kind)?;
            decode_statement_result(result).map(Response::Execute)
        }
        ResponseKind::GetAutocommit => response
            .is_autocommit
            .map(Response::GetAutocommit)
            .ok_or_else(|| {
                HranaError::Decode("missing is_autocommit in get_autocommit response".to_owned())
            }),
        ResponseKind::Batch => {
            let result = parse_result::<wire::BatchResult>(response.result, kind)?;
            decode_batch_result(result).map(Response::Batch)
        }
    }
}

fn parse_result<T>(result: Option<serde_json::Value>, kind: ResponseKind) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let result = result.ok_or_else(|| {
        HranaError::Decode(format!("missing result payload in {} response", kind.tag()))
    })?;
    serde_json::from_value(result)
        .map_err(|err| HranaError::Decode(format!("invalid {} result: {err}", kind.tag())))
}
