//! The backlog aggregate: a built content tree plus everything the
//! renderers need around it (type metadata, state colors, link index,
//! named views).

use crate::config::TypeOverridesConfig;
use crate::error::Result;
use crate::item::BacklogItem;
use crate::record::Relation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Presentation metadata for one work item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemType {
    pub name: String,

    /// Hex color without the leading `#`.
    pub color: String,

    /// Inline SVG markup for the type icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A named subset of the backlog, by item id.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub name: String,
    pub ids: Vec<u64>,
}

/// Flattened entry of the id index. Link rendering needs the title, the
/// type and the outgoing relations of a target without walking the tree.
#[derive(Debug, Clone, Serialize)]
pub struct LinkTarget {
    pub id: u64,
    pub title: String,
    pub type_name: String,
    pub relations: Vec<Relation>,
}

/// One step of a depth-first traversal. `End` events are only produced
/// when requested and always follow the subtree of their item.
#[derive(Debug, Clone, Copy)]
pub enum Visit<'a> {
    /// Pre-order arrival at an item, with its zero-based tree depth.
    Item(&'a BacklogItem, usize),
    /// Post-order departure, after all children.
    End(&'a BacklogItem),
}

/// A fully assembled backlog, ready for export.
#[derive(Debug, Serialize)]
pub struct Backlog {
    pub name: String,
    pub roots: Vec<BacklogItem>,
    pub types: Vec<WorkItemType>,

    /// Per-type state name to color mapping.
    pub state_colors: HashMap<String, HashMap<String, String>>,

    pub views: Vec<View>,

    #[serde(skip)]
    by_id: HashMap<u64, LinkTarget>,
}

impl Backlog {
    /// Assemble the aggregate. The id index is built in one pre-order
    /// pass; configured type overrides are merged in afterwards.
    ///
    /// # Errors
    /// Fails when a tree node lacks a title or type, or is still pending.
    pub fn new(
        name: impl Into<String>,
        roots: Vec<BacklogItem>,
        mut types: Vec<WorkItemType>,
        mut state_colors: HashMap<String, HashMap<String, String>>,
        views: Vec<View>,
        overrides: Option<&TypeOverridesConfig>,
    ) -> Result<Self> {
        let mut by_id = HashMap::new();
        index_items(&roots, &mut by_id)?;

        if let Some(overrides) = overrides {
            apply_overrides(&mut types, &mut state_colors, overrides);
        }

        Ok(Self {
            name: name.into(),
            roots,
            types,
            state_colors,
            views,
            by_id,
        })
    }

    /// Look up an item by id across the whole tree.
    #[must_use]
    pub fn target(&self, id: u64) -> Option<&LinkTarget> {
        self.by_id.get(&id)
    }

    /// Metadata for a type name, if known.
    #[must_use]
    pub fn type_info(&self, name: &str) -> Option<&WorkItemType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Color for a state of a type, if known.
    #[must_use]
    pub fn state_color(&self, type_name: &str, state: &str) -> Option<&str> {
        self.state_colors
            .get(type_name)?
            .get(state)
            .map(String::as_str)
    }

    /// The traversal sequence as a vector, so callers that must await
    /// between nodes still consume them in exact tree order.
    #[must_use]
    pub fn walk(&self, visit_end: bool) -> Vec<Visit<'_>> {
        let mut out = Vec::new();
        walk_items(&self.roots, 0, visit_end, &mut out);
        out
    }

    /// Follow a relation-name path from one item, `depth` iterations deep.
    /// Each name is one hop: the frontier is replaced by the targets of
    /// matching relations, in relation order without deduplication.
    /// Targets outside the tree are discarded.
    #[must_use]
    pub fn links(&self, start_id: u64, path: &[String], depth: usize) -> Vec<&LinkTarget> {
        let mut frontier: Vec<&LinkTarget> = self.by_id.get(&start_id).into_iter().collect();

        for _ in 0..depth {
            for name in path {
                frontier = frontier
                    .iter()
                    .flat_map(|target| target.relations.iter().filter(|r| &r.name == name))
                    .filter_map(|relation| self.by_id.get(&relation.target_id))
                    .collect();
            }
        }

        frontier
    }

    /// The types actually present in the tree, in first-seen traversal
    /// order. Types without known metadata are skipped.
    #[must_use]
    pub fn distinct_used_types(&self) -> Vec<&WorkItemType> {
        let mut names: Vec<&str> = Vec::new();
        for visit in self.walk(false) {
            if let Visit::Item(item, _) = visit {
                if let Some(target) = self.by_id.get(&item.id()) {
                    if !names.contains(&target.type_name.as_str()) {
                        names.push(&target.type_name);
                    }
                }
            }
        }
        names
            .into_iter()
            .filter_map(|name| self.type_info(name))
            .collect()
    }
}

fn index_items(items: &[BacklogItem], by_id: &mut HashMap<u64, LinkTarget>) -> Result<()> {
    for item in items {
        by_id.insert(
            item.id(),
            LinkTarget {
                id: item.id(),
                title: item.title()?.to_string(),
                type_name: item.type_name()?.to_string(),
                relations: item.relations().to_vec(),
            },
        );
        index_items(&item.children, by_id)?;
    }
    Ok(())
}

fn walk_items<'a>(
    items: &'a [BacklogItem],
    level: usize,
    visit_end: bool,
    out: &mut Vec<Visit<'a>>,
) {
    for item in items {
        out.push(Visit::Item(item, level));
        walk_items(&item.children, level + 1, visit_end, out);
        if visit_end {
            out.push(Visit::End(item));
        }
    }
}

/// Merge configured overrides into the fetched type metadata. Icon and
/// color replace wholesale; state colors merge per state, keeping any
/// state the override does not mention.
fn apply_overrides(
    types: &mut [WorkItemType],
    state_colors: &mut HashMap<String, HashMap<String, String>>,
    overrides: &TypeOverridesConfig,
) {
    for over in &overrides.types {
        if let Some(existing) = types.iter_mut().find(|t| t.name == over.name) {
            if let Some(icon) = &over.icon {
                existing.icon = Some(icon.clone());
            }
            if let Some(color) = &over.color {
                existing.color = color.clone();
            }
        }

        if !over.states.is_empty() {
            let colors = state_colors.entry(over.name.clone()).or_default();
            for state in &over.states {
                if let Some(color) = &state.color {
                    colors.insert(state.name.clone(), color.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StateOverrideConfig, TypeOverrideConfig};
    use crate::record::{fields, WorkItemRecord};
    use pretty_assertions::assert_eq;

    fn item(id: u64, type_name: &str, children: Vec<BacklogItem>) -> BacklogItem {
        let record = WorkItemRecord::new(id)
            .with_field(fields::TITLE, format!("Item {id}"))
            .with_field(fields::TYPE, type_name)
            .with_field(fields::STATE, "Active");
        let mut node = BacklogItem::resolved(record, !children.is_empty());
        node.children = children;
        node
    }

    fn epic_type() -> WorkItemType {
        WorkItemType {
            name: "Epic".to_string(),
            color: "ff7b00".to_string(),
            icon: Some("<svg/>".to_string()),
        }
    }

    fn sample() -> Backlog {
        let roots = vec![
            item(1, "Epic", vec![item(2, "Story", vec![]), item(3, "Story", vec![])]),
            item(4, "Epic", vec![]),
        ];
        Backlog::new(
            "Sample",
            roots,
            vec![
                epic_type(),
                WorkItemType {
                    name: "Story".to_string(),
                    color: "009ccc".to_string(),
                    icon: None,
                },
            ],
            HashMap::new(),
            vec![],
            None,
        )
        .unwrap()
    }

    #[test]
    fn walk_yields_items_in_tree_order_with_end_events() {
        let backlog = sample();

        let order: Vec<(u64, bool)> = backlog
            .walk(true)
            .iter()
            .map(|visit| match visit {
                Visit::Item(item, _) => (item.id(), false),
                Visit::End(item) => (item.id(), true),
            })
            .collect();

        assert_eq!(
            order,
            vec![
                (1, false),
                (2, false),
                (2, true),
                (3, false),
                (3, true),
                (1, true),
                (4, false),
                (4, true),
            ]
        );
    }

    #[test]
    fn walk_reports_tree_depth() {
        let backlog = sample();

        let levels: Vec<(u64, usize)> = backlog
            .walk(false)
            .iter()
            .filter_map(|visit| match visit {
                Visit::Item(item, level) => Some((item.id(), *level)),
                Visit::End(_) => None,
            })
            .collect();

        assert_eq!(levels, vec![(1, 0), (2, 1), (3, 1), (4, 0)]);
    }

    #[test]
    fn links_follow_relation_paths_and_discard_dangling_targets() {
        let record = WorkItemRecord::new(2)
            .with_field(fields::TITLE, "Item 2")
            .with_field(fields::TYPE, "Story")
            .with_field(fields::STATE, "Active")
            .with_relation("Parent", "https://host/wi/1")
            .with_relation("Related", "https://host/wi/999");
        let child = BacklogItem::resolved(record, false);

        let mut root = item(1, "Epic", vec![]);
        root.has_children = true;
        root.children.push(child);

        let backlog = Backlog::new(
            "Linked",
            vec![root],
            vec![epic_type()],
            HashMap::new(),
            vec![],
            None,
        )
        .unwrap();

        let parents = backlog.links(2, &["Parent".to_string()], 1);
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, 1);

        // The dangling "Related" target is silently discarded.
        let related = backlog.links(2, &["Related".to_string()], 1);
        assert!(related.is_empty());
    }

    #[test]
    fn distinct_used_types_keeps_first_seen_order() {
        let backlog = sample();

        let names: Vec<&str> = backlog
            .distinct_used_types()
            .iter()
            .map(|t| t.name.as_str())
            .collect();

        assert_eq!(names, vec!["Epic", "Story"]);
    }

    #[test]
    fn overrides_replace_icon_and_merge_state_colors() {
        let mut state_colors = HashMap::new();
        state_colors.insert(
            "Epic".to_string(),
            HashMap::from([
                ("New".to_string(), "b2b2b2".to_string()),
                ("Active".to_string(), "007acc".to_string()),
            ]),
        );

        let overrides = TypeOverridesConfig {
            types: vec![TypeOverrideConfig {
                name: "Epic".to_string(),
                icon: None,
                color: Some("112233".to_string()),
                states: vec![StateOverrideConfig {
                    name: "Active".to_string(),
                    color: Some("00ff00".to_string()),
                }],
            }],
        };

        let backlog = Backlog::new(
            "Overridden",
            vec![item(1, "Epic", vec![])],
            vec![epic_type()],
            state_colors,
            vec![],
            Some(&overrides),
        )
        .unwrap();

        let epic = backlog.type_info("Epic").unwrap();
        assert_eq!(epic.color, "112233");
        assert_eq!(epic.icon.as_deref(), Some("<svg/>"));

        assert_eq!(backlog.state_color("Epic", "Active"), Some("00ff00"));
        assert_eq!(backlog.state_color("Epic", "New"), Some("b2b2b2"));
    }
}
