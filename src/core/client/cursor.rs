//! Query cursor.
//!
//! A query is read through one "open" call followed by as many "fetch"
//! calls as needed. [`QueryCursor`] hides the pages and yields records one
//! at a time:
//!
//! ```text
//!   Opening -> Fetching <-> Waiting (continuous only)
//!                 |  ^
//!                 v  |
//!              Streaming -> Done (one-shot, after the last page)
//!
//!   any HTTP or decode error -> Failed
//! ```
//!
//! Dropping the cursor stops it; the server expires the query by its TTL.

use crate::core::client::endpoints::QueryInfo;
use crate::core::client::fetch::ReductClient;
use crate::core::client::utils::sleep;
use crate::core::error::{ReductError, Result};
use crate::core::stream::RecordDemuxer;
use crate::core::types::{QueryMode, QueryOptions, QueryState, Record};
use futures::Stream;

/// Lifecycle of a [`QueryCursor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    /// The query has not been opened yet.
    Opening,
    /// The next page is to be fetched.
    Fetching,
    /// A continuous query found nothing new and sleeps for the poll interval.
    Waiting,
    /// Records of a page are being handed out.
    Streaming,
    Done,
    Failed,
}

impl CursorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CursorState::Done | CursorState::Failed)
    }
}

/// Iterator over the records of a query, across pages.
///
/// Records come in page order and, within a page, sorted by
/// `(entry index, timestamp)`. Pages are fetched one after the other, never
/// ahead of the caller. Not meant for concurrent use.
pub struct QueryCursor {
    client: ReductClient,
    bucket: String,
    entries: Vec<String>,
    options: QueryOptions,
    query: Option<QueryState>,
    page: Option<RecordDemuxer>,
    saw_last: bool,
    state: CursorState,
}

impl QueryCursor {
    pub(crate) fn new(client: ReductClient, bucket: String, entries: Vec<String>, options: QueryOptions) -> Self {
        QueryCursor {
            client,
            bucket,
            entries,
            options,
            query: None,
            page: None,
            saw_last: false,
            state: CursorState::Opening,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// The server-side query, once opened.
    pub fn query(&self) -> Option<&QueryState> {
        self.query.as_ref()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Get the next record.
    ///
    /// Returns `None` once a one-shot query is exhausted or after an error
    /// was returned. A continuous cursor never returns `None` by itself.
    pub async fn next(&mut self) -> Option<Result<Record>> {
        loop {
            match self.state {
                CursorState::Opening => {
                    if let Err(err) = self.open().await {
                        return Some(self.fail(err));
                    }
                }
                CursorState::Fetching => {
                    if let Err(err) = self.fetch().await {
                        return Some(self.fail(err));
                    }
                }
                CursorState::Waiting => {
                    sleep(self.options.poll_interval).await;
                    self.state = CursorState::Fetching;
                }
                CursorState::Streaming => {
                    let next = match self.page.as_mut() {
                        Some(page) => page.next_record().await,
                        None => None,
                    };
                    match next {
                        Some(Ok(record)) => {
                            self.saw_last = record.last;
                            return Some(Ok(record));
                        }
                        Some(Err(err)) => return Some(self.fail(err)),
                        None => self.finish_page().await,
                    }
                }
                CursorState::Done | CursorState::Failed => return None,
            }
        }
    }

    /// Consume the cursor as a stream of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record>> + Send {
        futures::stream::unfold(self, |mut cursor| async move {
            cursor.next().await.map(|record| (record, cursor))
        })
    }

    async fn open(&mut self) -> Result<()> {
        let request = self
            .client
            .endpoints()
            .open_query(&self.bucket, &self.entries, &self.options)?;
        let response = self.client.send(request).await?;
        let (_, _, mut body) = response.into_parts();
        let info: QueryInfo = serde_json::from_slice(&body.read_to_end().await?)?;

        if self.client.config().enable_logging {
            tracing::debug!(
                bucket = %self.bucket,
                query_id = info.id,
                entries = ?self.entries,
                mode = ?self.options.mode(),
                "Opened query"
            );
        }

        self.query = Some(QueryState {
            query_id: info.id.to_string(),
            mode: self.options.mode(),
            poll_interval: self.options.poll_interval,
            entries: self.entries.clone(),
            exhausted: false,
        });
        self.state = CursorState::Fetching;
        Ok(())
    }

    async fn fetch(&mut self) -> Result<()> {
        let query_id = self
            .query
            .as_ref()
            .map(|q| q.query_id.clone())
            .ok_or_else(|| ReductError::Config("Query is not open".to_string()))?;
        let request = self.client.endpoints().fetch(
            &self.bucket,
            &self.entries,
            &query_id,
            self.options.head_only,
        )?;
        let response = self.client.send(request).await?;

        if response.is_no_content() {
            self.on_empty_page();
            return Ok(());
        }

        let one_shot = self.options.mode() == QueryMode::OneShot;
        let page = RecordDemuxer::from_response(
            self.client.codec(),
            response,
            self.entries.first().map(String::as_str),
            self.options.head_only,
            one_shot,
        )?;
        if page.is_empty() {
            self.on_empty_page();
            return Ok(());
        }

        if self.client.config().enable_logging {
            tracing::debug!(query_id = %query_id, records = page.remaining(), "Fetched page");
        }
        self.saw_last = false;
        self.page = Some(page);
        self.state = CursorState::Streaming;
        Ok(())
    }

    fn on_empty_page(&mut self) {
        match self.options.mode() {
            QueryMode::OneShot => self.finish(),
            QueryMode::Continuous => self.state = CursorState::Waiting,
        }
    }

    async fn finish_page(&mut self) {
        self.page = None;
        match self.options.mode() {
            QueryMode::OneShot if self.saw_last => self.finish(),
            QueryMode::OneShot => self.state = CursorState::Fetching,
            QueryMode::Continuous => {
                tokio::task::yield_now().await;
                self.state = CursorState::Fetching;
            }
        }
    }

    fn finish(&mut self) {
        if let Some(query) = self.query.as_mut() {
            query.exhausted = true;
        }
        self.state = CursorState::Done;
    }

    fn fail(&mut self, err: ReductError) -> Result<Record> {
        if self.client.config().enable_logging {
            tracing::warn!(bucket = %self.bucket, "Query failed: {}", err);
        }
        self.page = None;
        self.state = CursorState::Failed;
        Err(err)
    }
}

impl std::fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCursor")
            .field("bucket", &self.bucket)
            .field("entries", &self.entries)
            .field("state", &self.state)
            .field("query", &self.query)
            .finish()
    }
}
