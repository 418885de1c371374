//! Rendering and export of backlog trees.
//!
//! [`engine::TemplateEngine`] turns backlog items into HTML fragments
//! driven by per-type template configs. The [`exporter::Exporter`]
//! implementations wrap that into complete outputs: a self-contained HTML
//! document, a JSON dump of the tree, or a Markdown directory mirror.
//! [`exporter::ExporterManager`] routes each configured output to the
//! right one.

pub mod assets;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod html;
pub mod json;
pub mod markdown;
pub mod text;

pub use engine::TemplateEngine;
pub use error::{RenderError, Result};
pub use exporter::{
    interpolate, ExportContext, ExportOptions, Exporter, ExporterManager,
};
pub use html::HtmlExporter;
pub use json::JsonExporter;
pub use markdown::MarkdownExporter;
