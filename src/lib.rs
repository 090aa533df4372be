//! `hrana-ws` is a blocking client for the Hrana protocol: SQL over JSON text
//! frames on a websocket, as spoken by libSQL / sqld servers.
//!
//! Entry points:
//! - [`HranaClient::exec`], [`HranaClient::query`] and [`HranaClient::prepare`]
//! - [`HranaClient::execute_batch`] for conditional batches built with [`Batch`]
//! - [`Session`] and [`Stream`] for direct control over the connection
//!
//! Exactly one request is in flight per connection; every call blocks until
//! its reply arrives.

mod batch;
mod client;
mod decode;
mod error;
mod options;
mod params;
mod protocol;
mod rows;
mod session;
mod statement;
mod stream;
mod transport;
mod types;
mod value;
mod wire;

pub use batch::{Batch, BatchOutcome, Condition, Step};
pub use client::HranaClient;
pub use error::{HranaError, ServerError};
pub use options::{resolve_url, ClientOptions, CLIENT_VERSION, DEFAULT_URL};
pub use params::{Params, Statement};
pub use protocol::ProtocolVersion;
pub use rows::{FetchMode, FetchedRow, FromRow, RowRef, Rows};
pub use session::{Session, SessionState, SharedSession};
pub use statement::{ParamKey, ParamType, PreparedStatement};
pub use stream::Stream;
pub use transport::{HandshakeResponse, Transport};
#[cfg(feature = "websocket")]
pub use transport::WebsocketTransport;
pub use types::{BatchResults, Column, StatementResult};
pub use value::Value;

pub type Result<T> = std::result::Result<T, HranaError>;
