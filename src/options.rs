use std::time::Duration;

use url::Url;

use crate::{FetchMode, HranaError, Result};

/// Address used when no URL is configured.
pub const DEFAULT_URL: &str = "libsql://127.0.0.1:8080";

/// Value of the `X-Libsql-Client-Version` handshake header.
pub const CLIENT_VERSION: &str = concat!("hrana-ws-rust-", env!("CARGO_PKG_VERSION"));

/// Configures connection security, socket timeout and default row shape.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Use `wss` for `libsql://` URLs.
    pub secure: bool,
    /// Socket read/write timeout in milliseconds. `None` waits forever.
    pub timeout_ms: Option<u64>,
    /// Row shape returned by `Rows::fetch` unless overridden per call.
    pub fetch_mode: FetchMode,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            secure: true,
            timeout_ms: Some(10_000),
            fetch_mode: FetchMode::Assoc,
        }
    }
}

impl ClientOptions {
    pub fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_fetch_mode(mut self, fetch_mode: FetchMode) -> Self {
        self.fetch_mode = fetch_mode;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Maps a user-facing URL onto the websocket URL actually dialed.
///
/// `libsql://` becomes `wss://` or `ws://` depending on `secure`; `http(s)://`
/// becomes `ws(s)://`; `ws(s)://` is kept as is.
pub fn resolve_url(url: &str, secure: bool) -> Result<Url> {
    let (scheme, rest) = url
        .trim()
        .split_once(':')
        .ok_or_else(|| HranaError::InvalidArgument(format!("missing scheme in URL '{url}'")))?;

    let target = match scheme.to_ascii_lowercase().as_str() {
        "libsql" if secure => "wss",
        "libsql" => "ws",
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(HranaError::InvalidArgument(format!(
                "unsupported URL scheme '{other}'"
            )))
        }
    };

    // `Url::set_scheme` refuses to move between special and non-special
    // schemes, so the URL is re-parsed with the new scheme instead.
    Url::parse(&format!("{target}:{rest}"))
        .map_err(|err| HranaError::InvalidArgument(format!("invalid URL '{url}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::{resolve_url, ClientOptions, CLIENT_VERSION};
    use crate::{FetchMode, HranaError};

    #[test]
    fn libsql_scheme_follows_secure_flag() {
        let secure = resolve_url("libsql://db.example.com", true).expect("valid url");
        assert_eq!(secure.as_str(), "wss://db.example.com/");

        let plain = resolve_url("libsql://127.0.0.1:8080", false).expect("valid url");
        assert_eq!(plain.as_str(), "ws://127.0.0.1:8080/");
    }

    #[test]
    fn websocket_and_http_schemes_are_mapped() {
        assert_eq!(
            resolve_url("ws://localhost:8080", true).expect("valid").scheme(),
            "ws"
        );
        assert_eq!(
            resolve_url("https://db.example.com/path", false)
                .expect("valid")
                .as_str(),
            "wss://db.example.com/path"
        );
        assert_eq!(
            resolve_url("http://localhost", true).expect("valid").scheme(),
            "ws"
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = resolve_url("postgres://localhost", true).expect_err("must fail");
        assert!(matches!(err, HranaError::InvalidArgument(_)));

        let err = resolve_url("localhost", true).expect_err("must fail");
        assert!(matches!(err, HranaError::InvalidArgument(_)));
    }

    #[test]
    fn defaults() {
        let options = ClientOptions::default();
        assert!(options.secure);
        assert_eq!(options.timeout_ms, Some(10_000));
        assert_eq!(options.fetch_mode, FetchMode::Assoc);
        assert!(CLIENT_VERSION.starts_with("hrana-ws-rust-"));

        let options = options.insecure().with_timeout_ms(None);
        assert!(!options.secure);
        assert_eq!(options.timeout(), None);
    }
}
