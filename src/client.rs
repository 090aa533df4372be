use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::{
    session::lock_session, Batch, BatchOutcome, ClientOptions, FetchMode, Params,
    PreparedStatement, ProtocolVersion, Result, Rows, Session, Statement, StatementResult, Stream,
    Transport,
};

#[cfg(feature = "websocket")]
use crate::{HranaError, WebsocketTransport};

/// Blocking Hrana client bound to one stream of a session.
///
/// Further streams on the same connection are created with
/// [`HranaClient::new_stream`]; each has its own transaction state.
pub struct HranaClient {
    stream: Stream,
    fetch_mode: FetchMode,
}

impl fmt::Debug for HranaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HranaClient")
            .field("stream", &self.stream)
            .field("fetch_mode", &self.fetch_mode)
            .finish()
    }
}

impl HranaClient {
    /// Connects over websocket with default options.
    ///
    /// `libsql://` URLs are dialed as `wss://`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hrana_ws::HranaClient;
    ///
    /// let mut db = HranaClient::connect("libsql://my-db.example.com", Some("token"))?;
    /// let affected = db.exec("DELETE FROM sessions WHERE expired = 1", ())?;
    /// # Ok::<(), hrana_ws::HranaError>(())
    /// ```
    #[cfg(feature = "websocket")]
    pub fn connect(url: &str, token: Option<&str>) -> Result<Self> {
        Self::connect_with(url, token, ClientOptions::default())
    }

    #[cfg(feature = "websocket")]
    pub fn connect_with(url: &str, token: Option<&str>, options: ClientOptions) -> Result<Self> {
        let transport = WebsocketTransport::new().with_timeout(options.timeout());
        Self::with_transport(transport, url, token, options)
    }

    /// Connects through a caller-supplied transport and opens the default
    /// stream.
    pub fn with_transport<T>(
        transport: T,
        url: &str,
        token: Option<&str>,
        options: ClientOptions,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let mut session = Session::new(Box::new(transport));
        session.connect(url, token, &options)?;
        let session = Arc::new(Mutex::new(session));
        let stream = Stream::open(&session)?;
        Ok(Self {
            stream,
            fetch_mode: options.fetch_mode,
        })
    }

    /// Connects using environment variables.
    ///
    /// Reads:
    /// - `LIBSQL_URL`: server URL (required)
    /// - `LIBSQL_AUTH_TOKEN`: JWT (optional)
    ///
    /// ```no_run
    /// use hrana_ws::HranaClient;
    ///
    /// let db = HranaClient::from_env()?;
    /// # Ok::<(), hrana_ws::HranaError>(())
    /// ```
    #[cfg(feature = "websocket")]
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("LIBSQL_URL").map_err(|_| {
            HranaError::InvalidArgument("missing LIBSQL_URL environment variable".to_owned())
        })?;
        if url.trim().is_empty() {
            return Err(HranaError::InvalidArgument(
                "LIBSQL_URL is set but empty".to_owned(),
            ));
        }
        let token = std::env::var("LIBSQL_AUTH_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Self::connect(&url, token.as_deref())
    }

    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Sets the row shape used by results of later queries.
    pub fn set_fetch_mode(&mut self, fetch_mode: FetchMode) {
        self.fetch_mode = fetch_mode;
    }

    /// Executes a statement and returns the number of affected rows.
    pub fn exec<P: Into<Params>>(&mut self, sql: &str, params: P) -> Result<u64> {
        let result = self.stream.execute(&Statement::execute(sql, params))?;
        Ok(result.affected_row_count)
    }

    /// Executes a query and returns its rows.
    pub fn query<P: Into<Params>>(&mut self, sql: &str, params: P) -> Result<Rows> {
        let result = self.stream.execute(&Statement::query(sql, params))?;
        Ok(Rows::new(result, self.fetch_mode))
    }

    pub fn execute(&mut self, statement: &Statement) -> Result<StatementResult> {
        self.stream.execute(statement)
    }

    pub fn prepare(&mut self, sql: &str) -> PreparedStatement<'_> {
        PreparedStatement::new(&mut self.stream, sql, self.fetch_mode)
    }

    pub fn execute_batch(&mut self, batch: &Batch) -> Result<BatchOutcome> {
        Ok(batch.execute(&mut self.stream)?.with_fetch_mode(self.fetch_mode))
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        self.run_plain("BEGIN TRANSACTION")
    }

    pub fn commit(&mut self) -> Result<()> {
        self.run_plain("COMMIT")
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.run_plain("ROLLBACK")
    }

    /// `true` while an explicit transaction is open on this client's stream.
    pub fn in_transaction(&self) -> Result<bool> {
        Ok(!self.stream.get_autocommit()?)
    }

    /// Rowid of the most recent insert on this client's stream.
    pub fn last_insert_id(&self) -> Option<&str> {
        self.stream.last_insert_rowid()
    }

    pub fn is_connected(&self) -> bool {
        lock_session(self.stream.session()).is_ok_and(|session| session.is_connected())
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        lock_session(self.stream.session())
            .ok()
            .and_then(|session| session.protocol_version())
    }

    /// Opens another stream on the same connection.
    pub fn new_stream(&self) -> Result<Self> {
        Ok(Self {
            stream: Stream::open(self.stream.session())?,
            fetch_mode: self.fetch_mode,
        })
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut Stream {
        &mut self.stream
    }

    /// Closes every stream of the connection and the connection itself.
    pub fn disconnect(&mut self) -> Result<()> {
        lock_session(self.stream.session())?.disconnect()
    }

    fn run_plain(&mut self, sql: &str) -> Result<()> {
        self.stream.execute(&Statement::execute(sql, ()))?;
        Ok(())
    }
}
