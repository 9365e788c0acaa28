//! Event universe pull

use super::pagination::Paginator;
use super::IngestError;
use crate::api::{endpoints, ApiClient, Event, EventsResponse, Query};
use crate::storage::{read_all, write_pages, Storage, StorageError, WriteSummary};
use futures_util::{StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Largest page the events endpoint serves
pub const EVENTS_PAGE_LIMIT: u32 = 200;

/// Label for events without a category
pub const UNCATEGORIZED: &str = "(none)";

/// Query parameters for `GET /events`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub limit: u32,
    pub status: Option<String>,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            limit: EVENTS_PAGE_LIMIT,
            status: None,
        }
    }
}

impl EventQuery {
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn to_query(&self) -> Query {
        let mut query = vec![("limit".to_string(), self.limit.to_string())];
        if let Some(status) = &self.status {
            query.push(("status".to_string(), status.clone()));
        }
        query
    }
}

/// Stream every event page into `path`
pub async fn write_events(
    client: Arc<ApiClient>,
    storage: &dyn Storage,
    path: &str,
    query: &EventQuery,
    max_pages: Option<usize>,
) -> Result<WriteSummary, IngestError> {
    let pages = Paginator::<EventsResponse>::new(client, endpoints::EVENTS, query.to_query())
        .into_stream()
        .take(max_pages.unwrap_or(usize::MAX))
        .map_err(IngestError::from);

    write_pages(storage, path, pages).await
}

/// Event count per category, most common first
pub fn category_counts<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        let category = event
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED);
        *counts.entry(category).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().map(|(c, n)| (c.to_string(), n)).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Summarize a written events artifact by category
pub fn summarize_artifact(storage: &dyn Storage, path: &str) -> Result<Vec<(String, usize)>, StorageError> {
    let events: Vec<Event> = read_all(storage, path)?;
    let counts = category_counts(&events);

    for (category, count) in &counts {
        tracing::info!(category = %category, count, "Events by category");
    }

    Ok(counts)
}
