//! bex-core: Domain models and content tree logic for backlog exports.
//!
//! This crate provides:
//! - `WorkItemRecord` / `BacklogItem`: the work item model and tree nodes
//! - `TreeBuilder`: turns flat query results into the configured hierarchy
//! - `Backlog`: the assembled aggregate with link index, types and views
//! - `Config`: the declarative YAML export configuration schema

pub mod backlog;
pub mod config;
pub mod error;
pub mod item;
pub mod record;
pub mod tree;

pub use backlog::{Backlog, LinkTarget, View, Visit, WorkItemType};
pub use config::{
    ApiConfig, AppendixConfig, BacklogConfig, CacheMode, CellAlign, Config, ContentLevel,
    MetadataCell, OutputConfig, QuerySelector, QuerySpec, StateOverrideConfig, TemplateBlock,
    TemplateConfig, TocConfig, TocMode, TocValueConfig, TypeOverrideConfig, TypeOverridesConfig,
    ViewConfig,
};
pub use error::{CoreError, Result};
pub use item::{compare_values, sort_items, BacklogItem, SortDirection, SortSpec};
pub use record::{
    id_from_url, parse_relations, RawRelation, Relation, WorkItemRecord, PARENT_RELATION,
};
pub use tree::{BuiltTree, ItemFetcher, TreeBuilder};
