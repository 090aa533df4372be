//! Connection handshake, request sequencing and the single wire choke point.

use std::{
    collections::BTreeSet,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    options::{resolve_url, CLIENT_VERSION},
    protocol::{decode_server_message, encode_client_message, ProtocolVersion, Response, ServerMessage},
    transport::Transport,
    wire::{ClientMsg, Request},
    ClientOptions, HranaError, Result,
};

/// Session handle shared by every stream opened on it.
pub type SharedSession = Arc<Mutex<Session>>;

/// Lifecycle of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Created, never connected.
    Disconnected,
    /// Transport open, waiting for `hello_ok`.
    Handshaking,
    /// Requests may be issued.
    Ready,
    /// Disconnected or torn down after a connection failure. Terminal.
    Closed,
}

/// One physical connection to a Hrana server.
///
/// Owns the transport and the request/stream id counters. All traffic goes
/// through [`Session::request`], one round-trip at a time.
pub struct Session {
    transport: Box<dyn Transport>,
    state: SessionState,
    protocol: Option<ProtocolVersion>,
    next_request_id: i32,
    next_stream_id: i32,
    open_streams: BTreeSet<i32>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("protocol", &self.protocol)
            .field("next_request_id", &self.next_request_id)
            .field("open_streams", &self.open_streams)
            .finish()
    }
}

impl Session {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
            protocol: None,
            next_request_id: 1,
            next_stream_id: 1,
            open_streams: BTreeSet::new(),
        }
    }

    /// Opens the transport, checks the negotiated sub-protocol and
    /// authenticates with `hello`.
    ///
    /// On any failure the transport is closed and the session ends in
    /// [`SessionState::Closed`].
    pub fn connect(&mut self, url: &str, token: Option<&str>, options: &ClientOptions) -> Result<()> {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::Closed => return Err(HranaError::Closed),
            SessionState::Handshaking | SessionState::Ready => {
                return Err(HranaError::Connection("session is already connected".to_owned()))
            }
        }

        let url = resolve_url(url, options.secure)?;
        let expected = ProtocolVersion::Hrana3;
        let headers = vec![
            (
                "Sec-WebSocket-Protocol".to_owned(),
                expected.subprotocol().to_owned(),
            ),
            ("X-Libsql-Client-Version".to_owned(), CLIENT_VERSION.to_owned()),
        ];

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %url, "connecting");

        self.state = SessionState::Handshaking;
        let handshake = match self.transport.connect(&url, &headers) {
            Ok(handshake) => handshake,
            Err(err) => {
                self.teardown();
                return Err(err);
            }
        };

        let negotiated = handshake.header("Sec-WebSocket-Protocol");
        if negotiated.and_then(ProtocolVersion::from_subprotocol) != Some(expected) {
            let err = HranaError::VersionMismatch {
                expected: expected.subprotocol(),
                negotiated: negotiated.map(str::to_owned),
            };
            self.teardown();
            return Err(err);
        }
        self.protocol = Some(expected);

        let reply = match self.exchange(&ClientMsg::Hello { jwt: token }) {
            Ok(reply) => reply,
            Err(err) => {
                self.teardown();
                return Err(err);
            }
        };
        match reply {
            ServerMessage::HelloOk => {
                self.state = SessionState::Ready;
                #[cfg(feature = "tracing")]
                tracing::debug!("session ready");
                Ok(())
            }
            ServerMessage::HelloError(error) => {
                self.teardown();
                Err(error.into_auth_error())
            }
            other @ (ServerMessage::ResponseOk(_) | ServerMessage::ResponseError(_)) => {
                self.teardown();
                Err(HranaError::Protocol(format!(
                    "unexpected '{}' in reply to hello",
                    other.type_name()
                )))
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.protocol
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Ready && self.transport.is_connected()
    }

    /// Ids of streams opened and not yet closed, ascending.
    pub fn open_streams(&self) -> impl Iterator<Item = i32> + '_ {
        self.open_streams.iter().copied()
    }

    /// Closes every open stream, then the transport.
    ///
    /// Stream close failures are ignored. Calling this on a session that is
    /// not connected does nothing.
    pub fn disconnect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Disconnected | SessionState::Closed => return Ok(()),
            SessionState::Handshaking | SessionState::Ready => {}
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(streams = self.open_streams.len(), "disconnecting");

        let streams = std::mem::take(&mut self.open_streams);
        for stream_id in streams {
            if self.state != SessionState::Ready {
                break;
            }
            best_effort("close_stream during disconnect", self.close_stream(stream_id));
        }

        self.state = SessionState::Closed;
        self.open_streams.clear();
        self.transport.disconnect()
    }

    pub(crate) fn allocate_stream_id(&mut self) -> Result<i32> {
        self.ensure_ready()?;
        let stream_id = self.next_stream_id;
        self.next_stream_id = stream_id
            .checked_add(1)
            .ok_or_else(|| HranaError::Connection("stream ids exhausted".to_owned()))?;
        Ok(stream_id)
    }

    pub(crate) fn open_stream(&mut self, stream_id: i32) -> Result<()> {
        self.request(&Request::OpenStream { stream_id })?
            .expect_open_stream()?;
        self.open_streams.insert(stream_id);
        #[cfg(feature = "tracing")]
        tracing::debug!(stream_id, "stream opened");
        Ok(())
    }

    /// Closes a stream on the server. The id is forgotten locally even if the
    /// server reports an error.
    pub(crate) fn close_stream(&mut self, stream_id: i32) -> Result<()> {
        self.open_streams.remove(&stream_id);
        self.request(&Request::CloseStream { stream_id })?
            .expect_close_stream()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(stream_id, "stream closed");
        Ok(())
    }

    pub(crate) fn forget_stream(&mut self, stream_id: i32) {
        self.open_streams.remove(&stream_id);
    }

    /// Sends one request and waits for its reply.
    ///
    /// `response_error` becomes [`HranaError::Server`]; a hello reply is a
    /// protocol violation.
    pub(crate) fn request(&mut self, request: &Request) -> Result<Response> {
        self.ensure_ready()?;
        let request_id = self.next_request_id;
        self.next_request_id = request_id
            .checked_add(1)
            .ok_or_else(|| HranaError::Connection("request ids exhausted".to_owned()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            request_id,
            stream_id = request.stream_id(),
            kind = request.type_name(),
            "sending request"
        );

        match self.exchange(&ClientMsg::Request {
            request_id,
            request,
        })? {
            ServerMessage::ResponseOk(response) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(request_id, kind = response.type_name(), "response_ok");
                Ok(response)
            }
            ServerMessage::ResponseError(error) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(request_id, error = %error, "response_error");
                Err(error.into_error())
            }
            other @ (ServerMessage::HelloOk | ServerMessage::HelloError(_)) => {
                Err(HranaError::Protocol(format!(
                    "unexpected '{}' in reply to {} request {request_id} on stream {}",
                    other.type_name(),
                    request.type_name(),
                    request.stream_id()
                )))
            }
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(HranaError::Closed),
            SessionState::Disconnected | SessionState::Handshaking => Err(
                HranaError::Connection("session is not connected".to_owned()),
            ),
        }
    }

    /// Encodes, round-trips and decodes one frame. A transport failure tears
    /// the session down before the error is returned.
    fn exchange(&mut self, message: &ClientMsg<'_>) -> Result<ServerMessage> {
        let text = encode_client_message(message)?;
        let reply = match self.transport.send_text_and_receive_text(&text) {
            Ok(reply) => reply,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %err, "transport failure, closing session");
                self.teardown();
                return Err(err);
            }
        };
        let message = decode_server_message(&reply)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(kind = message.type_name(), "received frame");
        Ok(message)
    }

    fn teardown(&mut self) {
        self.state = SessionState::Closed;
        self.open_streams.clear();
        best_effort("transport disconnect", self.transport.disconnect());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        best_effort("disconnect on drop", self.disconnect());
    }
}

pub(crate) fn lock_session(session: &Mutex<Session>) -> Result<MutexGuard<'_, Session>> {
    session
        .lock()
        .map_err(|_| HranaError::Connection("session lock poisoned".to_owned()))
}

/// Swallows the error of a cleanup step, logging it when tracing is enabled.
pub(crate) fn best_effort(context: &str, result: Result<()>) {
    if let Err(err) = result {
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %err, "{context} failed");

        #[cfg(not(feature = "tracing"))]
        let _ = (context, err);
    }
}
