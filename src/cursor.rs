//! Lazy paginated cursors over `find` result streams.
//!
//! A [`FindCursor`] is a resumable, restartable view over server-paginated
//! results. Builder methods are legal only before iteration begins and each
//! returns a *new* idle cursor; the original is never mutated. Page fetches
//! are strictly sequential within one cursor: the next page cannot begin
//! until the previous one committed its continuation token.

use crate::error::{Error, TimeoutCategory};
use crate::http::data_api::{Command, DataApiHttpClient, ExecuteOptions};
use crate::http::timeouts::TimeoutManager;
use crate::options::timeouts::ResolvedTimeouts;
use crate::serdes::SerDes;
use crate::value::{DataApiVector, DocValue};
use futures::stream::Stream;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Builders are legal; no page has been fetched on behalf of iteration.
    Idle,
    /// Iteration has begun; the query shape is frozen.
    Started,
    /// No further pages will be fetched.
    Closed,
}

/// Cached result of a sort-vector probe.
#[derive(Debug, Clone, PartialEq)]
enum SortVectorState {
    Unattempted,
    Present(DataApiVector),
    Absent,
}

/// Continuation state across pages.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    /// No page fetched yet.
    Unfetched,
    /// The server returned a continuation token; more pages exist.
    Token(String),
    /// The server signalled the end of the stream.
    Exhausted,
}

/// Supplies the SerDes pipelines for a cursor's requests and responses.
///
/// Collection decoders are response-independent; table decoders build a
/// schema-informed pipeline from each response's `projectionSchema`.
pub trait PageDecoder: Send + Sync {
    /// Pipeline used to serialize filter/sort payloads into the command.
    fn encoder(&self) -> &SerDes;

    /// Pipeline used to rehydrate one page, given the response `status`.
    ///
    /// # Errors
    ///
    /// Fails when the response schema payload is malformed.
    fn decoder_for(&self, status: Option<&serde_json::Value>) -> Result<Arc<SerDes>, Error>;
}

type MapFn<T> = Arc<dyn Fn(DocValue) -> Result<T, Error> + Send + Sync>;

/// A lazy cursor over documents or rows matching a filter.
pub struct FindCursor<T> {
    client: Arc<DataApiHttpClient>,
    decoder: Arc<dyn PageDecoder>,
    collection: String,
    timeouts: ResolvedTimeouts,

    filter: DocValue,
    sort: Option<DocValue>,
    projection: Option<serde_json::Value>,
    limit: Option<u64>,
    skip: Option<u64>,
    include_similarity: Option<bool>,
    include_sort_vector: bool,

    mapping: MapFn<T>,
    has_mapping: bool,

    state: CursorState,
    buffer: VecDeque<DocValue>,
    page_state: PageState,
    consumed: usize,
    sort_vector: SortVectorState,
    /// Cleared after the first page so later pages skip redundant work.
    request_sort_vector: bool,
}

impl<T> std::fmt::Debug for FindCursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindCursor")
            .field("collection", &self.collection)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("projection", &self.projection)
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .field("include_similarity", &self.include_similarity)
            .field("include_sort_vector", &self.include_sort_vector)
            .field("has_mapping", &self.has_mapping)
            .field("state", &self.state)
            .field("page_state", &self.page_state)
            .field("consumed", &self.consumed)
            .field("sort_vector", &self.sort_vector)
            .field("request_sort_vector", &self.request_sort_vector)
            .finish()
    }
}

impl FindCursor<DocValue> {
    pub(crate) fn new(
        client: Arc<DataApiHttpClient>,
        decoder: Arc<dyn PageDecoder>,
        collection: String,
        timeouts: ResolvedTimeouts,
        filter: DocValue,
    ) -> Self {
        Self {
            client,
            decoder,
            collection,
            timeouts,
            filter,
            sort: None,
            projection: None,
            limit: None,
            skip: None,
            include_similarity: None,
            include_sort_vector: false,
            mapping: Arc::new(Ok),
            has_mapping: false,
            state: CursorState::Idle,
            buffer: VecDeque::new(),
            page_state: PageState::Unfetched,
            consumed: 0,
            sort_vector: SortVectorState::Unattempted,
            request_sort_vector: false,
        }
    }
}

impl<T: 'static> FindCursor<T> {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// Items handed to the consumer so far.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.consumed
    }

    /// Items materialized from fetched pages but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn require_idle(&self, method: &'static str) -> Result<(), Error> {
        match self.state {
            CursorState::Idle => Ok(()),
            CursorState::Started => Err(Error::cursor_state(format!(
                "cannot call {method} on a cursor that has started iterating; rewind() it or build from a fresh cursor"
            ))),
            CursorState::Closed => Err(Error::cursor_state(format!(
                "cannot call {method} on a closed cursor"
            ))),
        }
    }

    /// Copies the configuration (mapping included) into a fresh idle cursor
    /// with an empty buffer and cleared page state.
    #[must_use]
    pub fn clone_cursor(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            decoder: Arc::clone(&self.decoder),
            collection: self.collection.clone(),
            timeouts: self.timeouts,
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            projection: self.projection.clone(),
            limit: self.limit,
            skip: self.skip,
            include_similarity: self.include_similarity,
            include_sort_vector: self.include_sort_vector,
            mapping: Arc::clone(&self.mapping),
            has_mapping: self.has_mapping,
            state: CursorState::Idle,
            buffer: VecDeque::new(),
            page_state: PageState::Unfetched,
            consumed: 0,
            sort_vector: SortVectorState::Unattempted,
            request_sort_vector: false,
        }
    }

    /// New idle cursor with a replaced filter (set-last-wins).
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless this cursor is idle.
    pub fn filter(&self, filter: DocValue) -> Result<Self, Error> {
        self.require_idle("filter")?;
        let mut next = self.clone_cursor();
        next.filter = filter;
        Ok(next)
    }

    /// New idle cursor with a replaced sort.
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless this cursor is idle.
    pub fn sort(&self, sort: DocValue) -> Result<Self, Error> {
        self.require_idle("sort")?;
        let mut next = self.clone_cursor();
        next.sort = Some(sort);
        Ok(next)
    }

    /// New idle cursor with a result limit; `0` means unbounded (the server
    /// enforces its own ceiling).
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless this cursor is idle.
    pub fn limit(&self, limit: u64) -> Result<Self, Error> {
        self.require_idle("limit")?;
        let mut next = self.clone_cursor();
        next.limit = Some(limit);
        Ok(next)
    }

    /// New idle cursor skipping the first `skip` results. Requires a sort to
    /// be deterministic, so the sort must already be set.
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless idle; configuration error without a sort.
    pub fn skip(&self, skip: u64) -> Result<Self, Error> {
        self.require_idle("skip")?;
        if self.sort.is_none() {
            return Err(Error::invalid_config(
                "skip",
                "skip requires a sort to be deterministic; set sort first",
            ));
        }
        let mut next = self.clone_cursor();
        next.skip = Some(skip);
        Ok(next)
    }

    /// New idle cursor with a projection. Rejected once a mapping is
    /// installed, since the mapping was written against the unprojected
    /// shape.
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless idle or when a mapping is already present.
    pub fn project(&self, projection: serde_json::Value) -> Result<Self, Error> {
        self.require_idle("project")?;
        if self.has_mapping {
            return Err(Error::cursor_state(
                "cannot set a projection after map(); project first, then map",
            ));
        }
        let mut next = self.clone_cursor();
        next.projection = Some(projection);
        Ok(next)
    }

    /// New idle cursor asking the server to include similarity scores.
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless this cursor is idle.
    pub fn include_similarity(&self, include: bool) -> Result<Self, Error> {
        self.require_idle("include_similarity")?;
        let mut next = self.clone_cursor();
        next.include_similarity = Some(include);
        Ok(next)
    }

    /// New idle cursor asking the server to echo the sort vector on the
    /// first page, retrievable through [`Self::get_sort_vector`].
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless this cursor is idle.
    pub fn include_sort_vector(&self, include: bool) -> Result<Self, Error> {
        self.require_idle("include_sort_vector")?;
        let mut next = self.clone_cursor();
        next.include_sort_vector = include;
        Ok(next)
    }

    /// New idle cursor mapping every result through `f`, composing with any
    /// previous mapping.
    ///
    /// # Errors
    ///
    /// Cursor-state fault unless this cursor is idle.
    pub fn map<U: 'static, F>(&self, f: F) -> Result<FindCursor<U>, Error>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.require_idle("map")?;
        let previous = Arc::clone(&self.mapping);
        let mapping: MapFn<U> = Arc::new(move |raw| previous(raw).map(&f));
        Ok(FindCursor {
            client: Arc::clone(&self.client),
            decoder: Arc::clone(&self.decoder),
            collection: self.collection.clone(),
            timeouts: self.timeouts,
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            projection: self.projection.clone(),
            limit: self.limit,
            skip: self.skip,
            include_similarity: self.include_similarity,
            include_sort_vector: self.include_sort_vector,
            mapping,
            has_mapping: true,
            state: CursorState::Idle,
            buffer: VecDeque::new(),
            page_state: PageState::Unfetched,
            consumed: 0,
            sort_vector: SortVectorState::Unattempted,
            request_sort_vector: false,
        })
    }

    /// Resets *this* cursor to idle, clearing the buffer and page state while
    /// keeping the query shape and mapping.
    pub fn rewind(&mut self) {
        self.state = CursorState::Idle;
        self.buffer.clear();
        self.page_state = PageState::Unfetched;
        self.consumed = 0;
        self.sort_vector = SortVectorState::Unattempted;
        self.request_sort_vector = false;
    }

    /// Closes the cursor; no further pages will be fetched.
    pub fn close(&mut self) {
        self.state = CursorState::Closed;
        self.buffer.clear();
    }

    /// The next result, or `None` at the end of the stream (or on a closed
    /// cursor).
    ///
    /// # Errors
    ///
    /// Downstream fetch/decode/mapping errors close the cursor, then
    /// propagate.
    pub async fn next(&mut self) -> Result<Option<T>, Error> {
        if self.state == CursorState::Closed {
            return Ok(None);
        }
        if !self.fill_buffer().await? {
            return Ok(None);
        }
        let Some(raw) = self.buffer.pop_front() else {
            return Ok(None);
        };
        self.consumed += 1;
        match (self.mapping)(raw) {
            Ok(mapped) => Ok(Some(mapped)),
            Err(error) => {
                self.close();
                Err(error)
            }
        }
    }

    /// Whether another result exists, fetching the next page if needed but
    /// never advancing the consumer.
    ///
    /// # Errors
    ///
    /// Propagates fetch/decode errors (closing the cursor).
    pub async fn has_next(&mut self) -> Result<bool, Error> {
        if self.state == CursorState::Closed {
            return Ok(false);
        }
        self.fill_buffer().await
    }

    /// Drains the cursor to completion.
    ///
    /// # Errors
    ///
    /// Cursor-state fault when invoked on a closed cursor; otherwise
    /// propagates iteration errors.
    pub async fn to_array(&mut self) -> Result<Vec<T>, Error> {
        if self.state == CursorState::Closed {
            return Err(Error::cursor_state("toArray() called on a closed cursor"));
        }
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Invokes `f` for every result; `f` returning `false` closes the cursor
    /// early.
    ///
    /// # Errors
    ///
    /// Propagates iteration errors.
    pub async fn for_each<F>(&mut self, mut f: F) -> Result<(), Error>
    where
        F: FnMut(T) -> bool,
    {
        while let Some(item) = self.next().await? {
            if !f(item) {
                self.close();
                break;
            }
        }
        Ok(())
    }

    /// Removes up to `n` (all, when `None`) raw, un-mapped items from the
    /// buffer. Useful for back-pressure-aware consumers.
    pub fn consume_buffer(&mut self, n: Option<usize>) -> Vec<DocValue> {
        let take = n.unwrap_or(self.buffer.len()).min(self.buffer.len());
        let drained: Vec<DocValue> = self.buffer.drain(..take).collect();
        self.consumed += drained.len();
        drained
    }

    /// The vector the server actually sorted by, when
    /// [`Self::include_sort_vector`] was requested.
    ///
    /// The first call may issue a single probe fetch (populating the buffer
    /// as a side effect); the result is cached, and an idle cursor is
    /// returned to idle after the probe.
    ///
    /// # Errors
    ///
    /// Propagates probe-fetch errors.
    pub async fn get_sort_vector(&mut self) -> Result<Option<DataApiVector>, Error> {
        match &self.sort_vector {
            SortVectorState::Present(vector) => return Ok(Some(vector.clone())),
            SortVectorState::Absent => return Ok(None),
            SortVectorState::Unattempted => {}
        }
        if !self.include_sort_vector {
            self.sort_vector = SortVectorState::Absent;
            return Ok(None);
        }
        if self.page_state == PageState::Unfetched && self.state != CursorState::Closed {
            let was_idle = self.state == CursorState::Idle;
            self.fill_buffer().await?;
            if was_idle {
                self.state = CursorState::Idle;
            }
        }
        if self.sort_vector == SortVectorState::Unattempted {
            self.sort_vector = SortVectorState::Absent;
        }
        match &self.sort_vector {
            SortVectorState::Present(vector) => Ok(Some(vector.clone())),
            _ => Ok(None),
        }
    }

    /// Ensures the buffer is non-empty if more results exist. Returns whether
    /// anything is buffered; closes the cursor at the end of the stream.
    async fn fill_buffer(&mut self) -> Result<bool, Error> {
        while self.buffer.is_empty() {
            match &self.page_state {
                PageState::Exhausted => {
                    self.close();
                    return Ok(false);
                }
                PageState::Unfetched | PageState::Token(_) => {
                    if let Err(error) = self.fetch_page().await {
                        self.close();
                        return Err(error);
                    }
                    // An empty page with a token keeps looping; an empty
                    // final page ends the stream on the next check.
                }
            }
        }
        Ok(true)
    }

    /// Fetches exactly one page and commits its continuation token.
    async fn fetch_page(&mut self) -> Result<(), Error> {
        if self.state == CursorState::Idle {
            self.state = CursorState::Started;
        }
        let first_page = self.page_state == PageState::Unfetched;
        if first_page {
            self.request_sort_vector = self.include_sort_vector;
        }

        let encoded_filter = self.decoder.encoder().serialize(&self.filter)?;
        let mut big_numbers = encoded_filter.big_numbers_present;
        let mut body = serde_json::Map::new();
        body.insert("filter".to_string(), encoded_filter.wire);
        if let Some(projection) = &self.projection {
            body.insert("projection".to_string(), projection.clone());
        }
        if let Some(sort) = &self.sort {
            let encoded_sort = self.decoder.encoder().serialize(sort)?;
            big_numbers |= encoded_sort.big_numbers_present;
            body.insert("sort".to_string(), encoded_sort.wire);
        }

        let mut options = serde_json::Map::new();
        if let Some(include) = self.include_similarity {
            options.insert("includeSimilarity".to_string(), json!(include));
        }
        if self.request_sort_vector {
            options.insert("includeSortVector".to_string(), json!(true));
        }
        if let Some(limit) = self.limit {
            if limit > 0 {
                options.insert("limit".to_string(), json!(limit));
            }
        }
        if let Some(skip) = self.skip {
            options.insert("skip".to_string(), json!(skip));
        }
        if let PageState::Token(token) = &self.page_state {
            options.insert("pageState".to_string(), json!(token));
        }
        body.insert("options".to_string(), serde_json::Value::Object(options));

        let command = Command::new("find", serde_json::Value::Object(body))
            .with_big_numbers(big_numbers);
        // Reads are idempotent; pagination re-fetches are safe.
        let execute_options = ExecuteOptions::for_target(
            TimeoutManager::single_phase(
                TimeoutCategory::Request,
                Duration::from_millis(self.timeouts.request_timeout_ms),
            ),
            self.collection.clone(),
        )
        .retryable(true);

        let response = self.client.execute(&command, &execute_options).await?;

        if first_page && self.request_sort_vector {
            self.sort_vector = response.sort_vector().map_or(
                SortVectorState::Absent,
                |wire| {
                    decode_sort_vector(wire)
                        .map_or(SortVectorState::Absent, SortVectorState::Present)
                },
            );
            // Redundant after the first page.
            self.request_sort_vector = false;
        }

        let page_decoder = self.decoder.decoder_for(response.status())?;
        for document in response.documents() {
            self.buffer.push_back(page_decoder.deserialize(document)?);
        }

        self.page_state = response
            .next_page_state()
            .map_or(PageState::Exhausted, |token| {
                PageState::Token(token.to_string())
            });
        Ok(())
    }
}

/// Sort vectors echo back as plain arrays or packed `$binary` strings.
fn decode_sort_vector(wire: &serde_json::Value) -> Option<DataApiVector> {
    match wire {
        serde_json::Value::Array(items) => {
            let mut components = Vec::with_capacity(items.len());
            for item in items {
                #[allow(clippy::cast_possible_truncation)]
                components.push(item.as_f64()? as f32);
            }
            Some(DataApiVector::new(components))
        }
        serde_json::Value::Object(map) => map
            .get(crate::constants::TAG_BINARY)
            .and_then(serde_json::Value::as_str)
            .and_then(|b64| DataApiVector::from_base64(b64).ok()),
        _ => None,
    }
}

impl<T: Send + 'static> FindCursor<T> {
    /// Adapts the cursor into a `futures` stream. Dropping the stream drops
    /// (and thereby closes) the cursor.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, Error>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut cursor = state?;
            match cursor.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(cursor))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}
