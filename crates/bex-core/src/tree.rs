//! Content tree construction.
//!
//! Turns a flat, possibly incomplete set of query results into a forest
//! following the configured type hierarchy. Parents missing from the flat
//! set are either recorded as unincluded (and their children dropped) or
//! registered as placeholders and fetched lazily in one batch per level.

use crate::config::ContentLevel;
use crate::error::{CoreError, Result};
use crate::item::{sort_items, BacklogItem, SortSpec};
use crate::record::{fields, WorkItemRecord, PARENT_RELATION};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

/// Callback used to hydrate absent parents. Implemented by the remote
/// client; tests supply an in-memory map.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    /// Fetch full records for the given ids, in any order.
    async fn fetch_items(&self, ids: &[u64]) -> Result<Vec<WorkItemRecord>>;
}

/// Result of a tree build: the root forest plus the parents that were
/// referenced but not included (diagnostic only, never an error).
#[derive(Debug)]
pub struct BuiltTree {
    pub roots: Vec<BacklogItem>,
    pub unincluded: BTreeSet<u64>,
}

/// Builds one backlog forest per invocation.
pub struct TreeBuilder<'a> {
    fetcher: &'a dyn ItemFetcher,
    default_fetch_parents: bool,
    default_sort: Option<SortSpec>,
    unincluded: BTreeSet<u64>,
}

impl<'a> TreeBuilder<'a> {
    #[must_use]
    pub fn new(
        fetcher: &'a dyn ItemFetcher,
        default_fetch_parents: bool,
        default_sort: Option<SortSpec>,
    ) -> Self {
        Self {
            fetcher,
            default_fetch_parents,
            default_sort,
            unincluded: BTreeSet::new(),
        }
    }

    /// Build the forest for the given flat record set and hierarchy.
    ///
    /// # Errors
    /// Fails on an empty hierarchy, on fetch failures, and when a queued
    /// placeholder is never resolved by its batch fetch.
    pub async fn build(
        mut self,
        records: &[WorkItemRecord],
        levels: &[ContentLevel],
    ) -> Result<BuiltTree> {
        if levels.is_empty() {
            return Err(CoreError::EmptyHierarchy);
        }

        let roots = self.build_level_list(records, levels).await?;

        // Placeholders must not survive construction.
        assert_all_resolved(&roots)?;

        if !self.unincluded.is_empty() {
            let ids: Vec<String> = self.unincluded.iter().map(ToString::to_string).collect();
            info!(parents = %ids.join(", "), "unparented work items left out of the tree");
        }

        Ok(BuiltTree {
            roots,
            unincluded: self.unincluded,
        })
    }

    fn build_level_list<'b>(
        &'b mut self,
        records: &'b [WorkItemRecord],
        levels: &'b [ContentLevel],
    ) -> BoxFuture<'b, Result<Vec<BacklogItem>>> {
        Box::pin(async move {
            let mut items = Vec::new();
            for level in levels {
                items.extend(self.build_level(records, level).await?);
            }
            Ok(items)
        })
    }

    async fn build_level(
        &mut self,
        records: &[WorkItemRecord],
        level: &ContentLevel,
    ) -> Result<Vec<BacklogItem>> {
        let has_children = !level.content.is_empty();

        let mut level_items: Vec<BacklogItem> = records
            .iter()
            .filter(|record| {
                record
                    .field(fields::TYPE)
                    .and_then(Value::as_str)
                    .is_some_and(|name| level.work_item_types.iter().any(|t| t == name))
            })
            .map(|record| BacklogItem::resolved(record.clone(), has_children))
            .collect();

        if has_children {
            let fetch_parents = level.fetch_parents.unwrap_or(self.default_fetch_parents);

            let mut index: HashMap<u64, usize> = level_items
                .iter()
                .enumerate()
                .map(|(position, item)| (item.id(), position))
                .collect();

            // Placeholders stay out of the level list until their records
            // arrive; the map lets siblings share one placeholder.
            let mut pending: Vec<BacklogItem> = Vec::new();
            let mut pending_index: HashMap<u64, usize> = HashMap::new();

            let children = self.build_level_list(records, &level.content).await?;

            for child in children {
                let parent_id = child
                    .relations()
                    .iter()
                    .find(|relation| relation.name == PARENT_RELATION)
                    .map(|relation| relation.target_id);

                let Some(parent_id) = parent_id else {
                    warn!(child = child.id(), "work item skipped: no parent relation");
                    continue;
                };

                if let Some(&position) = index.get(&parent_id) {
                    level_items[position].children.push(child);
                } else if let Some(&position) = pending_index.get(&parent_id) {
                    pending[position].children.push(child);
                } else if fetch_parents {
                    let mut placeholder = BacklogItem::pending(parent_id);
                    placeholder.children.push(child);
                    pending_index.insert(parent_id, pending.len());
                    pending.push(placeholder);
                } else {
                    warn!(
                        child = child.id(),
                        parent = parent_id,
                        "work item skipped: parent is not part of this backlog"
                    );
                    self.unincluded.insert(parent_id);
                }
            }

            if !pending.is_empty() {
                let ids: Vec<u64> = pending.iter().map(BacklogItem::id).collect();
                info!(count = ids.len(), "fetching absent parents");

                let fetched = self.fetcher.fetch_items(&ids).await?;

                let mut slots: HashMap<u64, BacklogItem> =
                    pending.into_iter().map(|node| (node.id(), node)).collect();

                // Resolved placeholders join the level list in
                // fetch-completion order, as extra roots at this level.
                for record in fetched {
                    let Some(mut node) = slots.remove(&record.id) else {
                        return Err(CoreError::Fetch(format!(
                            "unexpected record {} in absent-parent batch",
                            record.id
                        )));
                    };
                    node.resolve(record)?;
                    index.insert(node.id(), level_items.len());
                    level_items.push(node);
                }

                if let Some(id) = slots.keys().next() {
                    return Err(CoreError::UnresolvedPlaceholder(*id));
                }
            }
        }

        if let Some(spec) = level.sort.as_ref().or(self.default_sort.as_ref()) {
            sort_items(&mut level_items, std::slice::from_ref(spec));
        }

        Ok(level_items)
    }
}

fn assert_all_resolved(items: &[BacklogItem]) -> Result<()> {
    for item in items {
        if item.is_pending() {
            return Err(CoreError::UnresolvedPlaceholder(item.id()));
        }
        assert_all_resolved(&item.children)?;
    }
    Ok(())
}
