use url::Url;

use crate::Result;

/// Headers returned by the server in the websocket handshake response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub headers: Vec<(String, String)>,
}

impl HandshakeResponse {
    pub fn new<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Bidirectional text-message channel the session talks through.
///
/// Exactly one request is in flight at a time: every
/// [`send_text_and_receive_text`](Transport::send_text_and_receive_text) call
/// blocks until the reply frame arrives.
pub trait Transport: Send {
    /// Opens the connection, sending `headers` with the upgrade request.
    fn connect(&mut self, url: &Url, headers: &[(String, String)]) -> Result<HandshakeResponse>;

    fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Sends one text frame and returns the next text frame received.
    fn send_text_and_receive_text(&mut self, text: &str) -> Result<String>;
}

#[cfg(feature = "websocket")]
pub use self::websocket::WebsocketTransport;

#[cfg(feature = "websocket")]
mod websocket {
    use std::{net::TcpStream, time::Duration};

    use tungstenite::{
        client::IntoClientRequest,
        error::ProtocolError,
        http::{HeaderName, HeaderValue},
        stream::MaybeTlsStream,
        Message, WebSocket,
    };
    use url::Url;

    use super::{HandshakeResponse, Transport};
    use crate::{HranaError, ProtocolVersion, Result};

    type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

    /// Blocking websocket transport backed by `tungstenite`.
    #[derive(Default)]
    pub struct WebsocketTransport {
        socket: Option<Socket>,
        timeout: Option<Duration>,
    }

    impl std::fmt::Debug for WebsocketTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WebsocketTransport")
                .field("connected", &self.socket.is_some())
                .field("timeout", &self.timeout)
                .finish()
        }
    }

    impl WebsocketTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Applies a read/write timeout to the underlying socket.
        pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
            self.timeout = timeout;
            self
        }

        fn apply_timeout(&self, socket: &mut Socket) -> std::io::Result<()> {
            let stream = match socket.get_mut() {
                MaybeTlsStream::Plain(stream) => stream,
                MaybeTlsStream::Rustls(stream) => stream.get_mut(),
                _ => return Ok(()),
            };
            stream.set_read_timeout(self.timeout)?;
            stream.set_write_timeout(self.timeout)
        }

        fn round_trip(socket: &mut Socket, text: &str) -> std::result::Result<String, tungstenite::Error> {
            socket.send(Message::text(text))?;
            loop {
                match socket.read()? {
                    Message::Text(reply) => return Ok(reply.as_str().to_owned()),
                    // Pongs for incoming pings are queued by tungstenite and
                    // flushed on the next read or write.
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                    Message::Binary(_) => continue,
                    Message::Close(_) => return Err(tungstenite::Error::ConnectionClosed),
                }
            }
        }
    }

    impl Transport for WebsocketTransport {
        fn connect(&mut self, url: &Url, headers: &[(String, String)]) -> Result<HandshakeResponse> {
            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(HranaError::transport)?;
            for (name, value) in headers {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                    HranaError::InvalidArgument(format!("invalid header name '{name}': {err}"))
                })?;
                let value = HeaderValue::from_str(value).map_err(|err| {
                    HranaError::InvalidArgument(format!("invalid header value for '{name}': {err}"))
                })?;
                request.headers_mut().insert(name, value);
            }

            let (mut socket, response) = tungstenite::connect(request)
                .map_err(|err| handshake_error(err, requested_protocol(headers)))?;
            self.apply_timeout(&mut socket)
                .map_err(HranaError::transport)?;

            let handshake = HandshakeResponse::new(response.headers().iter().filter_map(
                |(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_owned(), value.to_owned()))
                },
            ));
            self.socket = Some(socket);
            Ok(handshake)
        }

        fn disconnect(&mut self) -> Result<()> {
            let Some(mut socket) = self.socket.take() else {
                return Ok(());
            };
            match socket.close(None) {
                Ok(()) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(())
                }
                Err(err) => return Err(HranaError::transport(err)),
            }
            // Drive the close handshake until the peer acknowledges it.
            loop {
                match socket.read() {
                    Ok(_) => continue,
                    Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                        return Ok(())
                    }
                    Err(err) => return Err(HranaError::transport(err)),
                }
            }
        }

        fn is_connected(&self) -> bool {
            self.socket
                .as_ref()
                .is_some_and(|socket| socket.can_read() && socket.can_write())
        }

        fn send_text_and_receive_text(&mut self, text: &str) -> Result<String> {
            let socket = self.socket.as_mut().ok_or(HranaError::Closed)?;
            match Self::round_trip(socket, text) {
                Ok(reply) => Ok(reply),
                Err(err) => {
                    self.socket = None;
                    Err(HranaError::transport(err))
                }
            }
        }
    }

    fn requested_protocol(headers: &[(String, String)]) -> ProtocolVersion {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("Sec-WebSocket-Protocol"))
            .and_then(|(_, value)| ProtocolVersion::from_subprotocol(value))
            .unwrap_or(ProtocolVersion::Hrana3)
    }

    /// tungstenite validates the sub-protocol during the upgrade, so a server
    /// that picks another version (or none) fails here instead of reaching the
    /// session's own check.
    fn handshake_error(err: tungstenite::Error, expected: ProtocolVersion) -> HranaError {
        match err {
            tungstenite::Error::Protocol(ProtocolError::SecWebSocketSubProtocolError(reason)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(?reason, "server did not confirm the requested sub-protocol");
                #[cfg(not(feature = "tracing"))]
                let _ = reason;
                // The rejected value is not carried by the error.
                HranaError::VersionMismatch {
                    expected: expected.subprotocol(),
                    negotiated: None,
                }
            }
            other => HranaError::transport(other),
        }
    }
}
