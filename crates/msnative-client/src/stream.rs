//! Streaming query results.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::request::RequestId;
use crate::row::{QueryResult, Row};

/// Rows of one request, yielded as each row completes.
///
/// The stream ends when the request resolves, whether it succeeded or not.
/// Use [`finish`](Self::finish) to obtain the outcome.
///
/// # Example
///
/// ```rust,ignore
/// use futures_util::StreamExt;
///
/// let mut stream = connection.query("SELECT id, name FROM users");
/// while let Some(row) = stream.next().await {
///     println!("{}", row.get::<String>(1)?);
/// }
/// stream.finish().await?;
/// ```
#[derive(Debug)]
pub struct QueryStream {
    request_id: RequestId,
    rows: mpsc::UnboundedReceiver<Row>,
    completion: oneshot::Receiver<Result<QueryResult>>,
}

impl QueryStream {
    pub(crate) fn new(
        request_id: RequestId,
        rows: mpsc::UnboundedReceiver<Row>,
        completion: oneshot::Receiver<Result<QueryResult>>,
    ) -> Self {
        Self {
            request_id,
            rows,
            completion,
        }
    }

    /// The request feeding this stream.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Wait for the request to resolve.
    ///
    /// The aggregated result holds every row, including rows already
    /// yielded by the stream.
    pub async fn finish(self) -> Result<QueryResult> {
        self.completion
            .await
            .map_err(|_| Error::ConnectionClosed)?
    }

    /// Collect the rows not yet yielded, then wait for the request to
    /// resolve. Fails with the request's error.
    pub async fn collect_all(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.rows.recv().await {
            rows.push(row);
        }
        self.finish().await?;
        Ok(rows)
    }
}

impl Stream for QueryStream {
    type Item = Row;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rows.poll_recv(cx)
    }
}
