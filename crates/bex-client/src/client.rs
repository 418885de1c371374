//! The tracking-service client interface and the chunked fetch driver.

use crate::error::Result;
use async_trait::async_trait;
use bex_core::{QuerySpec, WorkItemRecord, WorkItemType};
use futures::StreamExt;
use std::collections::HashMap;
use tracing::debug;

/// Maximum number of ids per work item batch request.
pub const CHUNK_SIZE: usize = 200;

/// Maximum number of batch requests in flight at once.
pub const MAX_IN_FLIGHT: usize = 8;

/// Per-type mapping from state name to hex color.
pub type StateColors = HashMap<String, HashMap<String, String>>;

/// Everything the export pipeline needs from the tracking service.
/// Implemented by [`crate::rest::RestClient`] and wrapped by
/// [`crate::cache::CachingClient`]; tests supply in-memory fakes.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Fetch full records (fields and relations) for one batch of ids.
    /// Callers needing more than [`CHUNK_SIZE`] ids go through
    /// [`fetch_items_chunked`].
    async fn fetch_items(&self, project: &str, ids: &[u64]) -> Result<Vec<WorkItemRecord>>;

    /// Run a query and return the matching work item ids in result order.
    async fn run_query(&self, project: &str, query: &QuerySpec) -> Result<Vec<u64>>;

    /// Fetch presentation metadata for all work item types of a project.
    async fn fetch_types(&self, project: &str) -> Result<Vec<WorkItemType>>;

    /// Fetch the state color tables for the given type names.
    async fn fetch_state_colors(
        &self,
        project: &str,
        type_names: &[String],
    ) -> Result<StateColors>;

    /// Download an attachment URL and return it as a data URI, or `None`
    /// when the URL does not point at an attachment of this service.
    async fn resolve_attachment(&self, url: &str) -> Result<Option<String>>;
}

/// Fetch an arbitrary number of ids in [`CHUNK_SIZE`] batches, with at
/// most [`MAX_IN_FLIGHT`] requests in flight. Batches complete in any
/// order; the returned records are reordered to match the requested ids,
/// so the query's ordering survives hydration.
///
/// # Errors
/// Fails as soon as any batch fails.
pub async fn fetch_items_chunked(
    client: &dyn TrackerClient,
    project: &str,
    ids: &[u64],
) -> Result<Vec<WorkItemRecord>> {
    debug!(count = ids.len(), "fetching work items in chunks");

    // Each future owns its chunk; borrowing the slice across
    // `buffer_unordered` trips rustc's higher-ranked lifetime inference.
    let mut batches = futures::stream::iter(ids.chunks(CHUNK_SIZE).map(<[u64]>::to_vec).map(
        |chunk| async move { client.fetch_items(project, &chunk).await },
    ))
    .buffer_unordered(MAX_IN_FLIGHT);

    let mut records = Vec::with_capacity(ids.len());
    while let Some(batch) = batches.next().await {
        records.extend(batch?);
    }

    let position: HashMap<u64, usize> = ids
        .iter()
        .enumerate()
        .map(|(index, &id)| (id, index))
        .collect();
    records.sort_by_key(|record| position.get(&record.id).copied().unwrap_or(usize::MAX));
    Ok(records)
}

/// Combine a view's WIQL condition with the backlog's WIQL query, so a
/// view only ever narrows the backlog's result set. The view condition
/// comes first; the backlog's SELECT prefix and any trailing ORDER BY
/// clause are preserved.
#[must_use]
pub fn combine_wiql(view: &str, backlog: &str) -> String {
    let view_condition = condition_of(view).unwrap_or(view).trim();
    let (prefix, backlog_rest) = split_at_keyword(backlog, " where ")
        .map_or((backlog, None), |(p, r)| (p, Some(r)));

    let (backlog_condition, suffix) = match backlog_rest {
        Some(rest) => match split_at_keyword(rest, " order by ") {
            Some((condition, order)) => (Some(condition.trim()), Some(order)),
            None => (Some(rest.trim()), None),
        },
        None => (None, None),
    };

    let mut combined = format!("{} WHERE ({view_condition})", prefix.trim_end());
    if let Some(condition) = backlog_condition {
        combined.push_str(&format!(" AND ({condition})"));
    }
    if let Some(order) = suffix {
        combined.push_str(&format!(" ORDER BY {}", order.trim()));
    }
    combined
}

fn condition_of(wiql: &str) -> Option<&str> {
    let (_, rest) = split_at_keyword(wiql, " where ")?;
    match split_at_keyword(rest, " order by ") {
        Some((condition, _)) => Some(condition),
        None => Some(rest),
    }
}

/// Case-insensitive split around a keyword, returning the text before and
/// after it.
fn split_at_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let position = text.to_ascii_lowercase().find(keyword)?;
    Some((&text[..position], &text[position + keyword.len()..]))
}
