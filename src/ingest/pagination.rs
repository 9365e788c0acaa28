//! Cursor-driven page fetcher

use crate::api::{ApiClient, ApiError, Page, Paged, Query};
use futures_util::stream::{self, Stream};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::time::Instant;

/// Walks one resource collection page by page
///
/// The base query is fixed for the life of a pagination. Cursors are only
/// valid for the query that produced them, so changing parameters goes
/// through [`Paginator::restart`], which starts over from the first page.
pub struct Paginator<P: Paged> {
    client: Arc<ApiClient>,
    path: String,
    params: Query,
    cursor: Option<String>,
    pages: usize,
    records: usize,
    done: bool,
    deadline: Option<Instant>,
    _response: PhantomData<fn() -> P>,
}

impl<P: Paged> Paginator<P> {
    pub fn new(client: Arc<ApiClient>, path: impl Into<String>, params: Query) -> Self {
        Self {
            client,
            path: path.into(),
            params,
            cursor: None,
            pages: 0,
            records: 0,
            done: false,
            deadline: None,
            _response: PhantomData,
        }
    }

    /// Give up waiting for a rate limit token once `deadline` passes
    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn records_fetched(&self) -> usize {
        self.records
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Discard the cursor and start over with a new base query
    pub fn restart(&mut self, params: Query) {
        self.params = params;
        self.cursor = None;
        self.pages = 0;
        self.records = 0;
        self.done = false;
    }

    /// Fetch the next page, or `None` once the last page has been returned
    ///
    /// An error ends the pagination; the failed page is not retried here
    /// beyond the client's own retry policy.
    pub async fn next_page(&mut self) -> Result<Option<Page<P::Record>>, ApiError> {
        if self.done {
            return Ok(None);
        }

        let mut query = self.params.clone();
        if let Some(cursor) = &self.cursor {
            query.push(("cursor".to_string(), cursor.clone()));
        }

        let response: P = match self.client.get_until(&self.path, &query, self.deadline).await {
            Ok(response) => response,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        let page = response.into_page();
        self.pages += 1;
        self.records += page.len();
        self.cursor = page.cursor.clone();
        self.done = !page.has_more();

        tracing::debug!(
            path = %self.path,
            page = self.pages,
            records = page.len(),
            total = self.records,
            more = page.has_more(),
            "Fetched page"
        );

        Ok(Some(page))
    }

    /// Drain every remaining page into one vector
    pub async fn collect_all(&mut self) -> Result<Vec<P::Record>, ApiError> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page.records);
        }
        Ok(records)
    }

    /// Lazy stream of pages; nothing is fetched until it is polled
    pub fn into_stream(self) -> impl Stream<Item = Result<Page<P::Record>, ApiError>> + Send {
        stream::try_unfold(self, |mut paginator| async move {
            let page = paginator.next_page().await?;
            Ok(page.map(|page| (page, paginator)))
        })
    }
}

/// Build a query from string pairs
pub fn query<K: ToString, V: ToString>(pairs: impl IntoIterator<Item = (K, V)>) -> Query {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
