//! The primary exporter: one self-contained HTML document per backlog.
//!
//! Everything is embedded: stylesheet, icons as SVG data URIs, attachment
//! images as data URIs and the client-side script for collapsing and view
//! filtering. The file can be mailed around and opened offline.

use crate::assets::{
    encode_svg, icon, type_icon, BACK_TO_TOP, COLLAPSE_ICON, COLLAPSE_ICON_BODY, EXPAND_ICON,
    EXPAND_ICON_BODY, SCRIPT, STYLESHEET, TAG_ICON, TAG_ICON_BODY,
};
use crate::engine::TemplateEngine;
use crate::error::Result;
use crate::exporter::{prepare_destination, ExportContext, ExportOptions, Exporter};
use crate::text::{attr, escape_html};
use async_trait::async_trait;
use bex_core::{Backlog, BacklogConfig, CellAlign, TocMode, Visit};
use chrono::Local;
use pulldown_cmark::{html::push_html, Parser};
use slug::slugify;
use std::fs;
use std::path::Path;
use tracing::warn;

pub struct HtmlExporter;

#[async_trait]
impl Exporter for HtmlExporter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn accepts(&self, output: &Path) -> bool {
        output
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                ext == "html" || ext == "htm"
            })
    }

    async fn run(
        &self,
        ctx: &ExportContext<'_>,
        output: &Path,
        options: ExportOptions,
    ) -> Result<()> {
        prepare_destination(output, options)?;
        let document = render_document(ctx).await?;
        fs::write(output, document)?;
        Ok(())
    }
}

/// Assemble the whole document in memory.
pub(crate) async fn render_document(ctx: &ExportContext<'_>) -> Result<String> {
    let engine = TemplateEngine::new(ctx.backlog, ctx.templates, ctx.client)?;

    let mut out = format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>{STYLESHEET}</style>\n",
        escape_html(&ctx.backlog.name)
    );
    push_icon_styles(&mut out, ctx.backlog);
    out.push_str("</head>\n<body>\n");

    push_header(&mut out, ctx.backlog);
    push_views_tabbar(&mut out, ctx.backlog);

    match ctx.toc.mode {
        TocMode::List => push_toc_list(&mut out, ctx),
        TocMode::Grid => push_toc_grid(&mut out, ctx, &engine).await?,
    }

    out.push_str("<div class=\"centered-layout\">\n");

    for visit in ctx.backlog.walk(false) {
        if let Visit::Item(item, _) = visit {
            out.push_str(&engine.render_item(item).await?);
        }
    }

    push_appendixes(&mut out, ctx.config);
    out.push_str(BACK_TO_TOP);
    push_footer(&mut out, ctx.config);
    out.push_str("</div>\n");

    out.push_str(SCRIPT);
    out.push_str("</body>\n</html>\n");
    Ok(out)
}

/// One CSS class per icon, with the SVG embedded as a data URI.
fn push_icon_styles(out: &mut String, backlog: &Backlog) {
    out.push_str("<style>\n.icon {\n    background-size: cover;\n    display: inline-block;\n}\n\n");

    push_icon_svg_style(out, TAG_ICON, TAG_ICON_BODY);
    push_icon_svg_style(out, EXPAND_ICON, EXPAND_ICON_BODY);
    push_icon_svg_style(out, COLLAPSE_ICON, COLLAPSE_ICON_BODY);

    for work_item_type in &backlog.types {
        if let Some(svg) = &work_item_type.icon {
            push_icon_svg_style(out, &format!("wi-{}", slugify(&work_item_type.name)), svg);
        }
    }

    out.push_str("</style>\n");
}

fn push_icon_svg_style(out: &mut String, name: &str, svg: &str) {
    out.push_str(&format!(
        ".icon.icon-{name} {{\n    background-image: url(\"data:image/svg+xml,{}\");\n}}\n\n",
        encode_svg(svg)
    ));
}

fn push_header(out: &mut String, backlog: &Backlog) {
    out.push_str(&format!(
        "<header id=\"top\">\n<h1>{}</h1>\n<p style=\"text-align: center; margin-top: 0;\"><small>{}</small></p>\n<p style=\"text-align: center; margin-top: 0;\">",
        escape_html(&backlog.name),
        Local::now().format("%A, %B %-d, %Y")
    ));

    for work_item_type in backlog.distinct_used_types() {
        out.push_str(&format!(
            "<span title={}>{}</span>",
            attr(&work_item_type.name),
            type_icon(&work_item_type.name, 13)
        ));
    }

    out.push_str("</p>\n</header>\n");
}

/// Tab bar for client-side view filtering. Each tab carries the id list
/// of its view; the "All" tab restores the full document.
fn push_views_tabbar(out: &mut String, backlog: &Backlog) {
    if backlog.views.is_empty() {
        return;
    }

    out.push_str(
        "<nav id=\"views\" class=\"padding-body\">\n<p class=\"views tabbar\" data-tab-callback=\"onViewSelected\">\n",
    );
    out.push_str("<a class=\"tab active\" data-tab-context=\"all\">All</a>");

    for view in &backlog.views {
        let ids = view
            .ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&format!(
            "<a class=\"tab\" data-tab-context=\"{ids}\">{}</a>",
            escape_html(&view.name)
        ));
    }

    out.push_str(
        "\n</p>\n<noscript>\n\"Views\" functionality is not available without JavaScript enabled.\nPlease download this file and open it locally with your browser.\n</noscript>\n</nav>\n",
    );
}

fn push_toc_list(out: &mut String, ctx: &ExportContext<'_>) {
    out.push_str("<div class=\"centered-layout\">\n<nav id=\"toc\">\n");
    if !ctx.toc.hide_header {
        out.push_str("<h1>Table of Contents</h1>\n");
    }

    out.push_str(&format!(
        "<p style=\"text-align: right; margin: 0; margin-bottom: 5px;\">\n<span title=\"Expand All\" data-list-action=\"expand-all\" data-list-selector=\"#toc-list\" class=\"icon-small-button\">{}</span>\n<span title=\"Collapse All\" data-list-action=\"collapse-all\" data-list-selector=\"#toc-list\" class=\"icon-small-button\">{}</span>\n</p>",
        icon(EXPAND_ICON, 13),
        icon(COLLAPSE_ICON, 13)
    ));

    out.push_str("<ul id=\"toc-list\" style=\"margin-top: 5px;\" class=\"collapsible-list\">");
    for visit in ctx.backlog.walk(true) {
        match visit {
            Visit::Item(item, _) => {
                let entry = ctx
                    .backlog
                    .target(item.id())
                    .map_or_else(String::new, |target| {
                        format!(
                            "<li style=\"list-style-type: none\">{}{} <a href=\"#{}\">{}</a></li>",
                            type_icon(&target.type_name, 13),
                            target.id,
                            target.id,
                            escape_html(&target.title)
                        )
                    });
                out.push_str(&entry);
                if item.has_children && !item.children.is_empty() {
                    out.push_str("<ul style=\"margin-top: 5px;\">");
                }
            }
            Visit::End(item) => {
                if item.has_children && !item.children.is_empty() {
                    out.push_str("</ul>");
                }
            }
        }
    }
    out.push_str("</ul>");

    out.push_str("<hr class=\"end-of-work-item\" />\n</nav>\n</div>\n");
}

async fn push_toc_grid(
    out: &mut String,
    ctx: &ExportContext<'_>,
    engine: &TemplateEngine<'_>,
) -> Result<()> {
    let content_types = ctx.config.all_work_item_types();

    // No hierarchy, no table of contents.
    if content_types.is_empty() {
        return Ok(());
    }

    validate_grid_columns(ctx.config, ctx.toc, &content_types);

    out.push_str("<nav id=\"toc\" class=\"padding-body\">");
    if !ctx.toc.hide_header {
        out.push_str("<h1>Table of Contents</h1>\n");
    }

    out.push_str(&format!(
        "<table id=\"toc-grid\" class=\"data-grid collapsible-data-grid\">\n<thead>\n<tr>\n<th>\n<span title=\"Expand All\" data-grid-action=\"expand-all\" data-grid-selector=\"#toc-grid\" class=\"icon-small-button\">{}</span>\n<span title=\"Collapse All\" data-grid-action=\"collapse-all\" data-grid-selector=\"#toc-grid\" class=\"icon-small-button\">{}</span>\nTitle\n</th>\n",
        icon(EXPAND_ICON, 13),
        icon(COLLAPSE_ICON, 13)
    ));

    // Header widths come from the first type of the hierarchy.
    for value in ctx.toc.values_for(content_types[0]) {
        let width = value.width.as_deref().unwrap_or("auto");
        out.push_str(&format!(
            "<th title={} style=\"width: {width}; max-width: {width};\">{}</th>",
            attr(&value.header),
            escape_html(&value.header)
        ));
    }

    out.push_str("</tr>\n</thead>\n<tbody>\n");

    let mut ancestors: Vec<u64> = Vec::new();
    for visit in ctx.backlog.walk(true) {
        match visit {
            Visit::Item(item, depth) => {
                let Some(target) = ctx.backlog.target(item.id()) else {
                    continue;
                };

                match ancestors.last() {
                    None => out.push_str(&format!(
                        "<tr data-grid-row-id=\"{}\" data-grid-row-level=\"{depth}\">",
                        target.id
                    )),
                    Some(parent_id) => out.push_str(&format!(
                        "<tr data-grid-row-id=\"{}\" data-grid-parent-row-id=\"{parent_id}\" data-grid-row-level=\"{depth}\">",
                        target.id
                    )),
                }

                out.push_str(&format!(
                    "\n<td class=\"data-grid-caret-column\" style=\"padding-left: {}px\">\n{}{} <a href=\"#{}\">{}</a>\n</td>\n",
                    16 * (depth + 1),
                    type_icon(&target.type_name, 13),
                    target.id,
                    target.id,
                    escape_html(&target.title)
                ));

                for value in ctx.toc.values_for(&target.type_name) {
                    let align = value.align.map_or("left", CellAlign::as_css);
                    out.push_str(&format!("<td style=\"text-align: {align}\">"));
                    if let Some(field) = &value.field {
                        out.push_str(&engine.render_field(item, field, false, &[]).await?);
                    }
                    out.push_str("</td>");
                }

                out.push_str("</tr>\n");

                if item.has_children && !item.children.is_empty() {
                    ancestors.push(target.id);
                }
            }
            Visit::End(item) => {
                if item.has_children && !item.children.is_empty() {
                    ancestors.pop();
                }
            }
        }
    }

    out.push_str("</tbody>\n</table>");
    out.push_str("<hr class=\"end-of-work-item\" />\n</nav>\n");
    Ok(())
}

/// All types must agree on column count and widths, otherwise the grid
/// header (taken from the first type) will not line up.
fn validate_grid_columns(
    config: &BacklogConfig,
    toc: &bex_core::TocConfig,
    content_types: &[&str],
) {
    let variations: Vec<(&str, Vec<&str>, Vec<Option<&str>>)> = content_types
        .iter()
        .map(|type_name| {
            let headers = toc
                .values_for(type_name)
                .map(|value| value.header.as_str())
                .collect();
            let widths = toc
                .values_for(type_name)
                .map(|value| value.width.as_deref())
                .collect();
            (*type_name, headers, widths)
        })
        .collect();

    let Some((first_type, first_headers, first_widths)) = variations.first() else {
        return;
    };

    for (type_name, headers, widths) in variations.iter().skip(1) {
        if headers.len() != first_headers.len() {
            warn!(
                backlog = %config.name,
                type_name,
                reference = first_type,
                "table of contents column count differs between work item types"
            );
        }
        if widths != first_widths {
            warn!(
                backlog = %config.name,
                type_name,
                reference = first_type,
                "table of contents column widths differ between work item types"
            );
        }
    }
}

fn push_appendixes(out: &mut String, config: &BacklogConfig) {
    for appendix in &config.appendixes {
        out.push_str("<section class=\"appendix from-markdown\">\n");

        if let Some(title) = &appendix.title {
            out.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));
        }

        if let Some(content) = &appendix.content {
            push_html(out, Parser::new(content));
            out.push('\n');
        }

        out.push_str("</section>\n");
    }
}

fn push_footer(out: &mut String, config: &BacklogConfig) {
    let date = Local::now().format("%A, %B %-d, %Y");
    out.push_str("<footer style=\"text-align: center; color: gray\">\n");
    match &config.copyright {
        Some(copyright) => out.push_str(&format!(
            "{}. Document generated in {date}.\n",
            escape_html(copyright)
        )),
        None => out.push_str(&format!("Document generated in {date}.\n")),
    }
    out.push_str("</footer>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bex_client::{Result as ClientResult, StateColors, TrackerClient};
    use bex_core::record::{fields, WorkItemRecord};
    use bex_core::{
        BacklogItem, QuerySpec, TemplateConfig, TocConfig, View, WorkItemType,
    };
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

    fn item(id: u64, type_name: &str, title: &str, children: Vec<BacklogItem>) -> BacklogItem {
        let record = WorkItemRecord::new(id)
            .with_field(fields::TITLE, title)
            .with_field(fields::TYPE, type_name)
            .with_field(fields::STATE, "Active");
        let mut node = BacklogItem::resolved(record, !children.is_empty());
        node.children = children;
        node
    }

    fn sample_backlog(views: Vec<View>) -> Backlog {
        Backlog::new(
            "Product Backlog",
            vec![item(
                1,
                "Epic",
                "Accounts",
                vec![item(2, "Story", "Login", vec![])],
            )],
            vec![
                WorkItemType {
                    name: "Epic".to_string(),
                    color: "ff7b00".to_string(),
                    icon: Some("<svg id=\"epic\"/>".to_string()),
                },
                WorkItemType {
                    name: "Story".to_string(),
                    color: "009ccc".to_string(),
                    icon: Some("<svg id=\"story\"/>".to_string()),
                },
            ],
            HashMap::new(),
            views,
            None,
        )
        .unwrap()
    }

    fn sample_config(yaml: &str) -> BacklogConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn sample_templates() -> Vec<TemplateConfig> {
        serde_yaml::from_str(
            r#"
- work_item_type: Epic
  blocks:
    - type: section
      field: System.State
- work_item_type: Story
  blocks:
    - type: tags
"#,
        )
        .unwrap()
    }

    fn grid_toc() -> TocConfig {
        serde_yaml::from_str(
            r#"
mode: grid
values:
  - header: State
    field: System.State
"#,
        )
        .unwrap()
    }

    fn config_yaml() -> &'static str {
        r#"
name: Product Backlog
project: Proj
query: "SELECT [System.Id] FROM WorkItems"
content:
  - work_item_types: [Epic]
    content:
      - work_item_types: [Story]
"#
    }

    #[tokio::test]
    async fn document_contains_articles_in_tree_order() {
        let backlog = sample_backlog(vec![]);
        let config = sample_config(config_yaml());
        let templates = sample_templates();
        let toc = grid_toc();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &templates,
            client: &StubClient,
        };

        let html = render_document(&ctx).await.unwrap();

        let epic = html.find("data-wi-id=\"1\"").unwrap();
        let story = html.find("data-wi-id=\"2\"").unwrap();
        assert!(epic < story);

        // Anchors resolve: every TOC link has a matching article id.
        assert!(html.contains("<a href=\"#2\">Login</a>"));
        assert!(html.contains("id=\"2\""));

        // Icon styles exist for both used types.
        assert!(html.contains(".icon.icon-wi-epic"));
        assert!(html.contains(".icon.icon-wi-story"));
    }

    #[tokio::test]
    async fn grid_toc_rows_carry_parent_and_level() {
        let backlog = sample_backlog(vec![]);
        let config = sample_config(config_yaml());
        let templates = sample_templates();
        let toc = grid_toc();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &templates,
            client: &StubClient,
        };

        let html = render_document(&ctx).await.unwrap();

        assert!(html.contains("<tr data-grid-row-id=\"1\" data-grid-row-level=\"0\">"));
        assert!(html.contains(
            "<tr data-grid-row-id=\"2\" data-grid-parent-row-id=\"1\" data-grid-row-level=\"1\">"
        ));
        assert!(html.contains("<th title=\"State\""));
    }

    #[tokio::test]
    async fn list_toc_nests_children_in_sublists() {
        let backlog = sample_backlog(vec![]);
        let config = sample_config(config_yaml());
        let templates = sample_templates();
        let toc: TocConfig = serde_yaml::from_str("mode: list").unwrap();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &templates,
            client: &StubClient,
        };

        let html = render_document(&ctx).await.unwrap();

        assert!(html.contains("id=\"toc-list\""));
        let parent = html.find("<a href=\"#1\">Accounts</a>").unwrap();
        let nested = html[parent..].find("<ul style=\"margin-top: 5px;\">").unwrap();
        let child = html[parent..].find("<a href=\"#2\">Login</a>").unwrap();
        assert!(nested < child);
    }

    #[tokio::test]
    async fn views_emit_tab_contexts() {
        let backlog = sample_backlog(vec![View {
            name: "MVP".to_string(),
            ids: vec![2],
        }]);
        let config = sample_config(config_yaml());
        let templates = sample_templates();
        let toc = grid_toc();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &templates,
            client: &StubClient,
        };

        let html = render_document(&ctx).await.unwrap();

        assert!(html.contains("data-tab-context=\"all\""));
        assert!(html.contains("<a class=\"tab\" data-tab-context=\"2\">MVP</a>"));
    }

    #[test]
    fn accepts_html_extensions_case_insensitively() {
        let exporter = HtmlExporter;
        assert!(exporter.accepts(Path::new("out/backlog.html")));
        assert!(exporter.accepts(Path::new("out/backlog.HTM")));
        assert!(!exporter.accepts(Path::new("out/backlog.json")));
    }

    #[tokio::test]
    async fn appendixes_render_markdown() {
        let backlog = sample_backlog(vec![]);
        let mut config = sample_config(config_yaml());
        config.appendixes = serde_yaml::from_str(
            r#"
- title: Glossary
  content: "A **bold** word"
"#,
        )
        .unwrap();
        let templates = sample_templates();
        let toc = grid_toc();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &templates,
            client: &StubClient,
        };

        let html = render_document(&ctx).await.unwrap();

        assert!(html.contains("<h1>Glossary</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn stylesheet_and_script_are_embedded() {
        assert!(STYLESHEET.contains(".collapsible-data-grid"));
        assert!(SCRIPT.contains("onViewSelected"));
        assert_eq!(SCRIPT.matches("<script>").count(), 1);
    }
}
