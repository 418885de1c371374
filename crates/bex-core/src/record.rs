//! Raw work item records as returned by the tracking service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Well-known field keys shared by the builder and the renderers.
pub mod fields {
    pub const TITLE: &str = "System.Title";
    pub const TYPE: &str = "System.WorkItemType";
    pub const STATE: &str = "System.State";
    pub const TAGS: &str = "System.Tags";
    pub const DESCRIPTION: &str = "System.Description";
    pub const CHANGED_DATE: &str = "System.ChangedDate";
}

/// The relation attribute name that designates a child's parent.
pub const PARENT_RELATION: &str = "Parent";

/// A work item as fetched from the remote service. The core never mutates
/// field values, it only interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemRecord {
    /// Unique numeric identifier.
    pub id: u64,

    /// Field mapping (string key to typed value).
    #[serde(default)]
    pub fields: HashMap<String, Value>,

    /// Typed links to other work items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RawRelation>,
}

impl WorkItemRecord {
    /// Create a record with just an id, for tests and builders.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            fields: HashMap::new(),
            relations: Vec::new(),
        }
    }

    /// Set a field value.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Append a raw relation.
    #[must_use]
    pub fn with_relation(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.relations.push(RawRelation {
            rel: None,
            name: Some(name.into()),
            url: Some(url.into()),
        });
        self
    }

    /// Field lookup by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// A relation as delivered on the wire: a link kind plus a target URL whose
/// last path segment is the target work item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelation {
    /// Link type (e.g. "System.LinkTypes.Hierarchy-Reverse").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,

    /// Friendly relation name from the link attributes (e.g. "Parent").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// URL of the target work item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A parsed relation: name plus numeric target id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub target_id: u64,
}

/// Parse the numeric work item id from the last segment of a target URL.
#[must_use]
pub fn id_from_url(url: &str) -> Option<u64> {
    url.rsplit('/').next()?.parse().ok()
}

/// Derive the parsed relation list for a record. Relations without a name
/// or URL, with an unparseable target, or pointing back at the owning item
/// are dropped.
#[must_use]
pub fn parse_relations(record: &WorkItemRecord) -> Vec<Relation> {
    record
        .relations
        .iter()
        .filter_map(|raw| {
            let name = raw.name.as_ref().or(raw.rel.as_ref())?;
            let target_id = id_from_url(raw.url.as_deref()?)?;
            Some(Relation {
                name: name.clone(),
                target_id,
            })
        })
        .filter(|rel| rel.target_id != record.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn id_from_url_takes_last_segment() {
        assert_eq!(id_from_url("https://host/org/_apis/wit/workItems/42"), Some(42));
        assert_eq!(id_from_url("42"), Some(42));
        assert_eq!(id_from_url("https://host/org/_apis/wit/workItems/abc"), None);
    }

    #[test]
    fn parse_relations_filters_self_links() {
        let record = WorkItemRecord::new(7)
            .with_relation("Parent", "https://host/wi/3")
            .with_relation("Related", "https://host/wi/7");

        let relations = parse_relations(&record);

        assert_eq!(
            relations,
            vec![Relation {
                name: "Parent".to_string(),
                target_id: 3
            }]
        );
        assert!(relations.iter().all(|r| r.target_id != record.id));
    }

    #[test]
    fn parse_relations_skips_malformed_links() {
        let mut record = WorkItemRecord::new(1);
        record.relations.push(RawRelation {
            rel: None,
            name: Some("Parent".to_string()),
            url: None,
        });
        record.relations.push(RawRelation {
            rel: Some("Hierarchy-Forward".to_string()),
            name: None,
            url: Some("https://host/wi/9".to_string()),
        });

        let relations = parse_relations(&record);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target_id, 9);
    }
}
