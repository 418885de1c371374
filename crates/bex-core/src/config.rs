//! Declarative export configuration.
//!
//! The whole configuration is plain serde data parsed from one YAML file;
//! nothing here is interpreted until the builder and renderers consume it.

use crate::error::{CoreError, Result};
use crate::item::SortSpec;
use serde::{Deserialize, Serialize};

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote service connection settings.
    pub api: ApiConfig,

    /// Response cache mode.
    #[serde(default)]
    pub cache: CacheMode,

    /// Backlogs that can be exported.
    #[serde(default)]
    pub backlogs: Vec<BacklogConfig>,

    /// Table of contents layout.
    pub toc: TocConfig,

    /// Per-type rendering templates.
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,

    /// Work item type presentation overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_items: Option<TypeOverridesConfig>,
}

impl Config {
    /// Find a backlog by name, or the first one when no name is given.
    #[must_use]
    pub fn find_backlog(&self, name: Option<&str>) -> Option<&BacklogConfig> {
        match name {
            Some(name) => self.backlogs.iter().find(|b| b.name == name),
            None => self.backlogs.first(),
        }
    }

    /// Template for a work item type, exact match only.
    #[must_use]
    pub fn template_for(&self, type_name: &str) -> Option<&TemplateConfig> {
        self.templates.iter().find(|t| t.work_item_type == type_name)
    }
}

/// Connection settings for the tracking service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Organization base URL (e.g. `https://dev.azure.com/acme`).
    pub organization_url: String,

    /// Personal access token.
    pub token: String,

    /// Skip TLS certificate validation.
    #[serde(default)]
    pub ignore_ssl: bool,
}

/// Cache behavior for remote responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Keep responses on disk between runs.
    Persistent,
    /// Keep responses only for the lifetime of the process.
    #[default]
    Memory,
    /// Always hit the remote service.
    Off,
}

/// One exportable backlog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogConfig {
    /// Display name, also used for output path interpolation.
    pub name: String,

    /// Project to query.
    pub project: String,

    /// Query selecting the flat record set.
    #[serde(flatten)]
    pub query: QuerySpec,

    /// Work item type hierarchy, outermost level first.
    #[serde(default)]
    pub content: Vec<ContentLevel>,

    /// Whether levels fetch parents missing from the query results,
    /// unless a level overrides it.
    #[serde(default)]
    pub fetch_parents: bool,

    /// Default sort applied to levels without their own sort spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,

    /// Named id-subsets for client-side filtering.
    #[serde(default)]
    pub views: Vec<ViewConfig>,

    /// Configured output destinations.
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,

    /// Free-form appendix sections (Markdown).
    #[serde(default)]
    pub appendixes: Vec<AppendixConfig>,

    /// Footer attribution line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl BacklogConfig {
    /// All type names reachable through the content hierarchy, in
    /// declaration order.
    #[must_use]
    pub fn all_work_item_types(&self) -> Vec<&str> {
        fn collect<'a>(levels: &'a [ContentLevel], out: &mut Vec<&'a str>) {
            for level in levels {
                for name in &level.work_item_types {
                    if !out.contains(&name.as_str()) {
                        out.push(name);
                    }
                }
                collect(&level.content, out);
            }
        }

        let mut out = Vec::new();
        collect(&self.content, &mut out);
        out
    }
}

/// One tier of the type hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentLevel {
    /// Type names sharing this level.
    pub work_item_types: Vec<String>,

    /// Per-level sort; falls back to the backlog default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,

    /// Nested child levels.
    #[serde(default)]
    pub content: Vec<ContentLevel>,

    /// Per-level override of the backlog-wide fetch-parents policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_parents: Option<bool>,
}

/// A query addressed by exactly one of: raw WIQL, stored query id, or
/// stored query name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_name: Option<String>,
}

/// The validated form of a [`QuerySpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySelector<'a> {
    Wiql(&'a str),
    Id(&'a str),
    Name(&'a str),
}

impl QuerySpec {
    /// Validate that one and only one query option is set.
    ///
    /// # Errors
    /// Returns an error when zero or more than one option is provided.
    pub fn selector(&self) -> Result<QuerySelector<'_>> {
        let provided = [&self.query, &self.query_id, &self.query_name]
            .iter()
            .filter(|option| option.is_some())
            .count();

        if provided > 1 {
            return Err(CoreError::InvalidQuery(format!(
                "one and only one query option should be provided: wiql, id or name; got {provided}"
            )));
        }

        if let Some(wiql) = &self.query {
            Ok(QuerySelector::Wiql(wiql))
        } else if let Some(id) = &self.query_id {
            Ok(QuerySelector::Id(id))
        } else if let Some(name) = &self.query_name {
            Ok(QuerySelector::Name(name))
        } else {
            Err(CoreError::InvalidQuery(
                "no query wiql, id or name provided".to_string(),
            ))
        }
    }
}

/// A named view: a query whose result ids drive client-side filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    pub name: String,

    #[serde(flatten)]
    pub query: QuerySpec,
}

/// One configured output destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination path template (`{backlog}`, `{date:FMT}` placeholders).
    pub path: String,

    /// Explicit exporter name; inferred from the path extension when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Replace an existing destination instead of failing.
    #[serde(default)]
    pub overwrite: bool,

    /// Create missing parent directories instead of failing.
    #[serde(default)]
    pub mkdir: bool,
}

/// Table of contents layout selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TocMode {
    List,
    Grid,
}

/// Table of contents configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocConfig {
    pub mode: TocMode,

    #[serde(default)]
    pub hide_header: bool,

    /// Extra grid columns beyond the title column.
    #[serde(default)]
    pub values: Vec<TocValueConfig>,
}

impl TocConfig {
    /// The column definitions that apply to a given work item type.
    pub fn values_for<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a TocValueConfig> {
        self.values.iter().filter(move |value| {
            value.work_item_types.is_empty()
                || value.work_item_types.iter().any(|t| t == type_name)
        })
    }
}

/// One extra column of the grid table of contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocValueConfig {
    pub header: String,

    /// Field rendered into the column; empty cell when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<CellAlign>,

    /// Restrict this column to specific work item types (empty = all).
    #[serde(default)]
    pub work_item_types: Vec<String>,
}

/// Horizontal alignment of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellAlign {
    Left,
    Center,
    Right,
}

impl CellAlign {
    #[must_use]
    pub const fn as_css(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// Rendering template for one work item type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub work_item_type: String,

    #[serde(default)]
    pub blocks: Vec<TemplateBlock>,
}

/// A closed set of renderable blocks. Rendering dispatches with an
/// exhaustive match, so adding a variant fails to compile until every
/// renderer handles it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TemplateBlock {
    /// A single field, optionally with a header. Empty fields render
    /// nothing, header included.
    Section {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,

        field: String,

        #[serde(default)]
        rich_text: bool,

        /// Values treated as absent (e.g. a placeholder state).
        #[serde(default)]
        ignored_values: Vec<String>,
    },

    /// Related work items reached through a relation path.
    Links {
        label: String,

        /// Relation names followed in order, one hop each.
        relations: Vec<String>,

        /// Render only the first result, inline.
        #[serde(default)]
        single: bool,
    },

    /// The item's tag list.
    Tags,

    /// A fixed-column grid of nested blocks.
    Metadata {
        columns: usize,

        #[serde(default)]
        cells: Vec<MetadataCell>,
    },
}

/// One cell of a metadata grid: either a full row or a column with a span.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetadataCell {
    Row {
        #[serde(default)]
        blocks: Vec<TemplateBlock>,
    },
    Column {
        #[serde(default)]
        blocks: Vec<TemplateBlock>,

        #[serde(default = "default_colspan")]
        colspan: usize,
    },
}

const fn default_colspan() -> usize {
    1
}

/// Presentation overrides for work item types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeOverridesConfig {
    #[serde(default)]
    pub types: Vec<TypeOverrideConfig>,
}

/// Override of one type's icon, color, or state colors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeOverrideConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default)]
    pub states: Vec<StateOverrideConfig>,
}

/// Color override for one state of one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateOverrideConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// An appendix section appended after the backlog body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendixConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Markdown body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_spec_requires_exactly_one_option() {
        let empty = QuerySpec::default();
        assert!(empty.selector().is_err());

        let wiql = QuerySpec {
            query: Some("[System.State] <> 'Removed'".to_string()),
            ..QuerySpec::default()
        };
        assert!(matches!(wiql.selector().unwrap(), QuerySelector::Wiql(_)));

        let both = QuerySpec {
            query: Some("x".to_string()),
            query_name: Some("My Query".to_string()),
            ..QuerySpec::default()
        };
        assert!(both.selector().is_err());
    }

    #[test]
    fn all_work_item_types_walks_nested_levels() {
        let backlog = BacklogConfig {
            name: "b".to_string(),
            project: "p".to_string(),
            query: QuerySpec::default(),
            content: vec![ContentLevel {
                work_item_types: vec!["Epic".to_string()],
                sort: None,
                fetch_parents: None,
                content: vec![ContentLevel {
                    work_item_types: vec!["Story".to_string(), "Bug".to_string()],
                    sort: None,
                    fetch_parents: None,
                    content: vec![],
                }],
            }],
            fetch_parents: false,
            sort: None,
            views: vec![],
            outputs: vec![],
            appendixes: vec![],
            copyright: None,
        };

        assert_eq!(backlog.all_work_item_types(), vec!["Epic", "Story", "Bug"]);
    }

    #[test]
    fn template_blocks_parse_from_yaml() {
        let yaml = r#"
work_item_type: "User Story"
blocks:
  - type: metadata
    columns: 2
    cells:
      - kind: column
        blocks:
          - type: section
            header: State
            field: System.State
      - kind: row
        blocks:
          - type: tags
  - type: section
    field: System.Description
    rich_text: true
  - type: links
    label: Feature
    single: true
    relations: ["System.LinkTypes.Hierarchy-Reverse"]
"#;

        let template: TemplateConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.work_item_type, "User Story");
        assert_eq!(template.blocks.len(), 3);
        assert!(matches!(
            &template.blocks[0],
            TemplateBlock::Metadata { columns: 2, cells } if cells.len() == 2
        ));
        assert!(matches!(
            &template.blocks[2],
            TemplateBlock::Links { single: true, .. }
        ));
    }
}
