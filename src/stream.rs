use std::{fmt, sync::Arc};

use crate::{
    decode::build_stmt,
    protocol::Response,
    session::{best_effort, lock_session, SharedSession},
    wire::{self, Request},
    BatchResults, HranaError, Result, Statement, StatementResult,
};

/// Logical execution context multiplexed over a session.
///
/// Each stream has its own transaction state on the server. The stream id is
/// taken from the session-wide counter and never reused.
pub struct Stream {
    session: SharedSession,
    stream_id: i32,
    is_open: bool,
    last_insert_rowid: Option<String>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("stream_id", &self.stream_id)
            .field("is_open", &self.is_open)
            .field("last_insert_rowid", &self.last_insert_rowid)
            .finish()
    }
}

impl Stream {
    /// Allocates the next stream id and opens it on the server.
    ///
    /// If the server refuses, a `close_stream` for the same id is attempted
    /// before the original error is returned.
    pub fn open(session: &SharedSession) -> Result<Self> {
        let mut guard = lock_session(session)?;
        let stream_id = guard.allocate_stream_id()?;
        if let Err(err) = guard.open_stream(stream_id) {
            if guard.is_ready() {
                best_effort("close_stream after failed open", guard.close_stream(stream_id));
            }
            return Err(err);
        }
        drop(guard);

        Ok(Self {
            session: Arc::clone(session),
            stream_id,
            is_open: true,
            last_insert_rowid: None,
        })
    }

    pub fn id(&self) -> i32 {
        self.stream_id
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Most recent non-null rowid reported by a statement on this stream.
    ///
    /// Statements that insert nothing leave the previous value in place.
    pub fn last_insert_rowid(&self) -> Option<&str> {
        self.last_insert_rowid.as_deref()
    }

    pub fn execute(&mut self, statement: &Statement) -> Result<StatementResult> {
        let stmt = build_stmt(statement)?;
        let result = self
            .request(Request::Execute {
                stream_id: self.stream_id,
                stmt,
            })?
            .into_execute()?;
        if let Some(rowid) = &result.last_insert_rowid {
            self.last_insert_rowid = Some(rowid.clone());
        }
        Ok(result)
    }

    /// `true` when the stream is outside an explicit transaction.
    pub fn get_autocommit(&self) -> Result<bool> {
        self.request(Request::GetAutocommit {
            stream_id: self.stream_id,
        })?
        .into_autocommit()
    }

    pub(crate) fn execute_batch(&self, batch: wire::Batch) -> Result<BatchResults> {
        self.request(Request::Batch {
            stream_id: self.stream_id,
            batch,
        })?
        .into_batch()
    }

    /// Closes the stream. Closing twice, or after the session has gone away,
    /// succeeds without contacting the server.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;

        let mut session = lock_session(&self.session)?;
        if !session.is_ready() {
            session.forget_stream(self.stream_id);
            return Ok(());
        }
        session.close_stream(self.stream_id)
    }

    fn request(&self, request: Request) -> Result<Response> {
        if !self.is_open {
            return Err(HranaError::InvalidArgument(format!(
                "stream {} is closed",
                self.stream_id
            )));
        }
        lock_session(&self.session)?.request(&request)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if self.is_open {
            best_effort("close_stream on drop", self.close());
        }
    }
}
