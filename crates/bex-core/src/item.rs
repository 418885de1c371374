//! Backlog tree nodes.

use crate::error::{CoreError, Result};
use crate::record::{self, fields, Relation, WorkItemRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slug::slugify;
use std::cmp::Ordering;

/// Sort direction for a content level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Declarative sort for one content level: a field and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A node is either a placeholder registered by id before its record was
/// fetched, or a fully resolved record. Placeholders exist only while the
/// tree is under construction.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum ItemState {
    Pending {
        id: u64,
    },
    Resolved {
        record: WorkItemRecord,
        relations: Vec<Relation>,
    },
}

/// One node of the backlog content tree, wrapping a work item record.
#[derive(Debug, Clone, Serialize)]
pub struct BacklogItem {
    #[serde(flatten)]
    state: ItemState,

    /// Whether this node's type is configured to have children, independent
    /// of whether any currently exist.
    pub has_children: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BacklogItem>,
}

impl BacklogItem {
    /// Wrap a fetched record. Relations are parsed eagerly, with
    /// self-relations filtered out.
    #[must_use]
    pub fn resolved(record: WorkItemRecord, has_children: bool) -> Self {
        let relations = record::parse_relations(&record);
        Self {
            state: ItemState::Resolved { record, relations },
            has_children,
            children: Vec::new(),
        }
    }

    /// Register a placeholder for a parent that was not part of the query
    /// results. Placeholders always have a children slot.
    #[must_use]
    pub fn pending(id: u64) -> Self {
        Self {
            state: ItemState::Pending { id },
            has_children: true,
            children: Vec::new(),
        }
    }

    /// Whether this node is still an unresolved placeholder.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, ItemState::Pending { .. })
    }

    /// Fill a placeholder with its fetched record. Each placeholder receives
    /// exactly one record; resolving twice is a contract violation.
    ///
    /// # Errors
    /// Returns an error if the node is already resolved.
    pub fn resolve(&mut self, record: WorkItemRecord) -> Result<()> {
        match &self.state {
            ItemState::Pending { .. } => {
                let relations = record::parse_relations(&record);
                self.state = ItemState::Resolved { record, relations };
                Ok(())
            }
            ItemState::Resolved { record: existing, .. } => Err(CoreError::Fetch(format!(
                "work item {} resolved twice",
                existing.id
            ))),
        }
    }

    /// Numeric id, available in both states.
    #[must_use]
    pub const fn id(&self) -> u64 {
        match &self.state {
            ItemState::Pending { id } => *id,
            ItemState::Resolved { record, .. } => record.id,
        }
    }

    /// The underlying record.
    ///
    /// # Errors
    /// Returns an error while the node is still a placeholder.
    pub fn record(&self) -> Result<&WorkItemRecord> {
        match &self.state {
            ItemState::Pending { id } => Err(CoreError::PendingItem(*id)),
            ItemState::Resolved { record, .. } => Ok(record),
        }
    }

    /// Parsed relations. Empty while pending.
    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        match &self.state {
            ItemState::Pending { .. } => &[],
            ItemState::Resolved { relations, .. } => relations,
        }
    }

    /// Field lookup on the underlying record.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        match &self.state {
            ItemState::Pending { .. } => None,
            ItemState::Resolved { record, .. } => record.field(key),
        }
    }

    /// Trimmed title.
    ///
    /// # Errors
    /// Returns an error if the record is pending or has no title.
    pub fn title(&self) -> Result<&str> {
        self.required_str(fields::TITLE).map(str::trim)
    }

    /// Work item type name.
    ///
    /// # Errors
    /// Returns an error if the record is pending or has no type.
    pub fn type_name(&self) -> Result<&str> {
        self.required_str(fields::TYPE)
    }

    /// Current state name.
    ///
    /// # Errors
    /// Returns an error if the record is pending or has no state.
    pub fn state_name(&self) -> Result<&str> {
        self.required_str(fields::STATE)
    }

    /// CSS-safe slug of the type name.
    ///
    /// # Errors
    /// Returns an error if the record is pending or has no type.
    pub fn type_slug(&self) -> Result<String> {
        Ok(slugify(self.type_name()?))
    }

    /// Tags, semicolon-split and trimmed. Empty when the field is absent.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        match self.field(fields::TAGS).and_then(Value::as_str) {
            Some(raw) if !raw.is_empty() => raw
                .split(';')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(ToString::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn required_str(&self, key: &'static str) -> Result<&str> {
        self.record()?
            .field(key)
            .and_then(Value::as_str)
            .ok_or(CoreError::MissingField {
                id: self.id(),
                field: key,
            })
    }
}

/// Stable-sort items by the given specs, in declared priority order.
/// Absent values sort smallest; ties keep their original relative order.
pub fn sort_items(items: &mut [BacklogItem], specs: &[SortSpec]) {
    items.sort_by(|a, b| {
        for spec in specs {
            let ordering = compare_values(a.field(&spec.field), b.field(&spec.field));
            let ordering = match spec.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Compare two optional field values with the value's native comparison.
/// `None`/null is not greater than any value.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (normalize(a), normalize(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(a), Value::Number(b)) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        },
    }
}

fn normalize(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Null) | None => None,
        Some(other) => Some(other),
    }
}
