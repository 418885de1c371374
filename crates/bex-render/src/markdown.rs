//! Markdown export: one file per work item, mirroring the tree as a
//! directory structure.

use crate::error::Result;
use crate::exporter::{prepare_destination, ExportContext, ExportOptions, Exporter};
use crate::text::sanitize_filename;
use async_trait::async_trait;
use bex_core::record::fields;
use bex_core::BacklogItem;
use regex::Regex;
use std::fs;
use std::path::Path;

pub struct MarkdownExporter;

#[async_trait]
impl Exporter for MarkdownExporter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    /// Markdown output is a directory, so an extension-less path is taken
    /// as ours.
    fn accepts(&self, output: &Path) -> bool {
        output.extension().is_none()
    }

    async fn run(
        &self,
        ctx: &ExportContext<'_>,
        output: &Path,
        options: ExportOptions,
    ) -> Result<()> {
        prepare_destination(output, options)?;
        fs::create_dir(output)?;

        let tag_re = Regex::new("<[^>]*>")?;
        for item in &ctx.backlog.roots {
            write_item(item, output, &tag_re)?;
        }
        Ok(())
    }
}

/// `{id} - {title}.md` next to a same-named directory holding the children.
fn write_item(item: &BacklogItem, dir: &Path, tag_re: &Regex) -> Result<()> {
    let title = item.title()?;
    let stem = format!("{} - {}", item.id(), sanitize_filename(title));

    let mut body = format!("# {} - {}\n", item.id(), title);
    if let Some(description) = item.field(fields::DESCRIPTION).and_then(|v| v.as_str()) {
        let text = tag_re.replace_all(description, "");
        let text = text.trim();
        if !text.is_empty() {
            body.push('\n');
            body.push_str(text);
            body.push('\n');
        }
    }
    fs::write(dir.join(format!("{stem}.md")), body)?;

    if !item.children.is_empty() {
        let child_dir = dir.join(&stem);
        fs::create_dir(&child_dir)?;
        for child in &item.children {
            write_item(child, &child_dir, tag_re)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bex_client::{Result as ClientResult, StateColors, TrackerClient};
    use bex_core::record::WorkItemRecord;
    use bex_core::{Backlog, BacklogConfig, QuerySpec, TocConfig, WorkItemType};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct StubClient;

    #[async_trait]
    impl TrackerClient for StubClient {
        async fn fetch_items(&self, _: &str, _: &[u64]) -> ClientResult<Vec<WorkItemRecord>> {
            Ok(vec![])
        }

        async fn run_query(&self, _: &str, _: &QuerySpec) -> ClientResult<Vec<u64>> {
            Ok(vec![])
        }

        async fn fetch_types(&self, _: &str) -> ClientResult<Vec<WorkItemType>> {
            Ok(vec![])
        }

        async fn fetch_state_colors(&self, _: &str, _: &[String]) -> ClientResult<StateColors> {
            Ok(StateColors::new())
        }

        async fn resolve_attachment(&self, _: &str) -> ClientResult<Option<String>> {
            Ok(None)
        }
    }

    fn item(id: u64, title: &str, description: Option<&str>, children: Vec<BacklogItem>) -> BacklogItem {
        let mut record = WorkItemRecord::new(id)
            .with_field(fields::TITLE, title)
            .with_field(fields::TYPE, "Story");
        if let Some(description) = description {
            record = record.with_field(fields::DESCRIPTION, description);
        }
        let mut node = BacklogItem::resolved(record, !children.is_empty());
        node.children = children;
        node
    }

    #[tokio::test]
    async fn mirrors_the_tree_as_directories() {
        let backlog = Backlog::new(
            "Shop",
            vec![item(
                1,
                "Checkout: v2?",
                Some("<p>Pay <b>fast</b>.</p>"),
                vec![item(2, "Cart", None, vec![])],
            )],
            vec![],
            HashMap::new(),
            vec![],
            None,
        )
        .unwrap();
        let config: BacklogConfig = serde_yaml::from_str(
            "name: Shop\nproject: P\nquery: \"SELECT [System.Id] FROM WorkItems\"\ncontent: []",
        )
        .unwrap();
        let toc: TocConfig = serde_yaml::from_str("mode: list").unwrap();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &[],
            client: &StubClient,
        };

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("backlog");
        MarkdownExporter
            .run(&ctx, &output, ExportOptions::default())
            .await
            .unwrap();

        // Unsafe filename characters are dropped, the title itself is kept.
        let root_file = output.join("1 - Checkout v2.md");
        let contents = fs::read_to_string(&root_file).unwrap();
        assert_eq!(contents, "# 1 - Checkout: v2?\n\nPay fast.\n");

        let child_file = output.join("1 - Checkout v2").join("2 - Cart.md");
        assert_eq!(fs::read_to_string(&child_file).unwrap(), "# 2 - Cart\n");
    }

    #[test]
    fn accepts_only_extension_less_destinations() {
        let exporter = MarkdownExporter;
        assert!(exporter.accepts(Path::new("out/backlog")));
        assert!(!exporter.accepts(Path::new("out/backlog.html")));
    }
}
