//! Recursive template rendering for work items.
//!
//! Every work item type must have a template; a template is a list of
//! blocks rendered in order. Blocks that resolve to nothing (empty field,
//! no links, no tags, all metadata cells empty) emit nothing at all,
//! headers and wrappers included.

use crate::assets::{icon, type_icon, TAG_ICON};
use crate::error::{RenderError, Result};
use crate::text::{attr, escape_html};
use bex_client::TrackerClient;
use bex_core::record::fields;
use bex_core::{Backlog, BacklogItem, LinkTarget, MetadataCell, TemplateBlock, TemplateConfig};
use chrono::DateTime;
use futures::future::BoxFuture;
use regex::Regex;
use tracing::warn;

const ICON_SIZE: u32 = 13;

/// Rendering flags passed down the block tree. Inside metadata cells the
/// inline flag switches headers from headings to `<strong>` labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext {
    pub inline: bool,
}

/// Renders one work item at a time against the configured templates.
pub struct TemplateEngine<'a> {
    backlog: &'a Backlog,
    templates: &'a [TemplateConfig],
    client: &'a dyn TrackerClient,
    img_re: Regex,
}

impl<'a> TemplateEngine<'a> {
    /// # Errors
    /// Fails when the image pattern cannot be compiled.
    pub fn new(
        backlog: &'a Backlog,
        templates: &'a [TemplateConfig],
        client: &'a dyn TrackerClient,
    ) -> Result<Self> {
        Ok(Self {
            backlog,
            templates,
            client,
            img_re: Regex::new(r#"<img[^>]*?src\s*=\s*"([^"]*)""#)?,
        })
    }

    /// Render one item as a standalone `<article>`.
    ///
    /// # Errors
    /// Fails when the item's type has no template, on a pending item, and
    /// when attachment resolution fails.
    pub async fn render_item(&self, item: &BacklogItem) -> Result<String> {
        let type_name = item.type_name()?;
        let template = self
            .templates
            .iter()
            .find(|t| t.work_item_type == type_name)
            .ok_or_else(|| RenderError::MissingTemplate(type_name.to_string()))?;

        let id = item.id();
        let title = item.title()?;

        let mut out = format!(
            "<article class=\"workitem {}\" id=\"{id}\" data-wi-id=\"{id}\" data-wi-title={}>\n",
            item.type_slug()?,
            attr(title)
        );
        out.push_str(&format!(
            "<p style=\"margin-bottom: 0; margin-top: 0;\">{}{} {id}</p>\n",
            type_icon(type_name, ICON_SIZE),
            type_name.to_uppercase()
        ));
        out.push_str(&format!("<h2>{}</h2>\n", escape_html(title)));

        for block in &template.blocks {
            out.push_str(
                &self
                    .render_block(block, item, 3, RenderContext::default())
                    .await?,
            );
        }

        out.push_str("<hr class=\"end-of-work-item\" />\n</article>\n");
        Ok(out)
    }

    fn render_block<'b>(
        &'b self,
        block: &'b TemplateBlock,
        item: &'b BacklogItem,
        level: usize,
        ctx: RenderContext,
    ) -> BoxFuture<'b, Result<String>> {
        Box::pin(async move {
            match block {
                TemplateBlock::Section {
                    header,
                    field,
                    rich_text,
                    ignored_values,
                } => {
                    self.render_section(header.as_deref(), field, *rich_text, ignored_values, item, level, ctx)
                        .await
                }
                TemplateBlock::Links {
                    label,
                    relations,
                    single,
                } => self.render_links(label, relations, *single, item, ctx),
                TemplateBlock::Tags => Ok(render_tags(item, ctx)),
                TemplateBlock::Metadata { columns, cells } => {
                    self.render_metadata(*columns, cells, item, level).await
                }
            }
        })
    }

    async fn render_section(
        &self,
        header: Option<&str>,
        field: &str,
        rich_text: bool,
        ignored_values: &[String],
        item: &BacklogItem,
        level: usize,
        ctx: RenderContext,
    ) -> Result<String> {
        // Render the field first so an empty value suppresses the whole
        // section, header included.
        let body = self
            .render_field(item, field, rich_text, ignored_values)
            .await?;
        if body.is_empty() {
            return Ok(String::new());
        }

        let mut out = format!("<section data-wi-field-name={}>", attr(field));
        if let Some(header) = header {
            if ctx.inline {
                out.push_str(&format!("<strong>{}</strong> ", escape_html(header)));
            } else {
                out.push_str(&format!("<h{level}>{}</h{level}>", escape_html(header)));
            }
        }
        out.push_str(&body);
        out.push_str("</section>");
        Ok(out)
    }

    /// Render a single field value. States render as a colored indicator
    /// dot, change dates as a short human date with the precise timestamp
    /// in the tooltip, rich text with attachment images inlined, and any
    /// other scalar as escaped text.
    ///
    /// # Errors
    /// Fails on pending items and failed attachment downloads.
    pub async fn render_field(
        &self,
        item: &BacklogItem,
        field: &str,
        rich_text: bool,
        ignored_values: &[String],
    ) -> Result<String> {
        let Some(value) = item.field(field) else {
            return Ok(String::new());
        };
        if value.is_null() {
            return Ok(String::new());
        }

        if let Some(text) = value.as_str() {
            if text.is_empty() || ignored_values.iter().any(|ignored| ignored == text) {
                return Ok(String::new());
            }

            if field == fields::STATE {
                let color = self
                    .backlog
                    .state_color(item.type_name()?, text)
                    .unwrap_or("b2b2b2");
                let escaped = escape_html(text);
                return Ok(format!(
                    "<span title=\"{escaped}\"><span class=\"state-indicator\" \
                     style=\"background-color: #{color}\"></span> {escaped}</span>"
                ));
            }

            if field == fields::CHANGED_DATE {
                if let Ok(date) = DateTime::parse_from_rfc3339(text) {
                    return Ok(format!(
                        "<span title=\"{}\">{}</span>",
                        date.format("%Y-%m-%d %H:%M:%S"),
                        date.format("%A, %b %-d, %Y")
                    ));
                }
            }

            if rich_text {
                return self.rewrite_images(text).await;
            }

            let escaped = escape_html(text);
            let single_line = escaped.replace('\n', "");
            return Ok(format!("<span title=\"{single_line}\">{escaped}</span>\n"));
        }

        Ok(escape_html(&value.to_string()))
    }

    /// Rewrite every `<img src>` pointing at a service attachment into a
    /// self-contained data URI, in document order. Foreign URLs are left
    /// untouched.
    async fn rewrite_images(&self, html: &str) -> Result<String> {
        let sources: Vec<(std::ops::Range<usize>, String)> = self
            .img_re
            .captures_iter(html)
            .filter_map(|captures| captures.get(1))
            .map(|src| (src.range(), src.as_str().to_string()))
            .collect();

        let mut out = String::with_capacity(html.len());
        let mut cursor = 0;
        for (range, src) in sources {
            if let Some(data) = self.client.resolve_attachment(&src).await? {
                out.push_str(&html[cursor..range.start]);
                out.push_str(&data);
                cursor = range.end;
            }
        }
        out.push_str(&html[cursor..]);
        Ok(out)
    }

    fn render_links(
        &self,
        label: &str,
        relations: &[String],
        single: bool,
        item: &BacklogItem,
        ctx: RenderContext,
    ) -> Result<String> {
        let links = self.backlog.links(item.id(), relations, 1);
        if links.is_empty() {
            return Ok(String::new());
        }

        let mut out = String::from("<section data-wi-links>");
        if single {
            if !ctx.inline {
                out.push_str("<p style=\"margin-bottom: 0\">");
            }
            out.push_str(&format!(
                "<strong style=\"margin-right: 7px\">{}</strong> {}",
                escape_html(label),
                link_entry(links[0])
            ));
            if !ctx.inline {
                out.push_str("</p>");
            }
        } else {
            out.push_str(&format!(
                "<p style=\"margin-bottom: 0\"><strong>{}</strong></p>\n<ul style=\"margin-top: 5px;\">\n",
                escape_html(label)
            ));
            for target in links {
                out.push_str(&format!(
                    "<li style=\"list-style-type: none\">{}</li>\n",
                    link_entry(target)
                ));
            }
            out.push_str("</ul>\n");
        }
        out.push_str("</section>\n");
        Ok(out)
    }

    async fn render_metadata(
        &self,
        columns: usize,
        cells: &[MetadataCell],
        item: &BacklogItem,
        level: usize,
    ) -> Result<String> {
        // Metadata cells always render inline, whatever the outer context.
        let inline = RenderContext { inline: true };

        let mut rendered = Vec::with_capacity(cells.len());
        for cell in cells {
            let (shape, blocks) = match cell {
                MetadataCell::Row { blocks } => (CellShape::Row, blocks),
                MetadataCell::Column { blocks, colspan } => {
                    (CellShape::Column { colspan: *colspan }, blocks)
                }
            };

            let mut html = String::new();
            for block in blocks {
                html.push_str(&self.render_block(block, item, level, inline).await?);
            }
            if !html.is_empty() {
                rendered.push(RenderedCell { shape, html });
            }
        }

        if rendered.is_empty() {
            return Ok(String::new());
        }

        Ok(format!(
            "<section data-wi-metadata class=\"workitem-metadata\">\n<table>{}</table>\n</section>",
            pack_cells(columns, &rendered)
        ))
    }
}

fn link_entry(target: &LinkTarget) -> String {
    format!(
        "{}<span style=\"color: #868686\">{}</span> <a href=\"#{}\">{}</a>",
        type_icon(&target.type_name, ICON_SIZE),
        target.id,
        target.id,
        escape_html(&target.title)
    )
}

fn render_tags(item: &BacklogItem, ctx: RenderContext) -> String {
    let tags = item.tags();
    if tags.is_empty() {
        return String::new();
    }

    let margin = if ctx.inline { 0 } else { 8 };
    format!(
        "<section data-wi-tags style=\"margin-bottom: {margin}px;\"><strong>Tags</strong> {}{}</section>",
        icon(TAG_ICON, ICON_SIZE),
        escape_html(&tags.join(", "))
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellShape {
    Row,
    Column { colspan: usize },
}

#[derive(Debug)]
pub(crate) struct RenderedCell {
    pub shape: CellShape,
    pub html: String,
}

/// Pack pre-rendered cells into a fixed-column table. Rows always open a
/// fresh full-width row; columns flow left to right, and a cell that
/// closes its row expands to consume the remaining width. Cells wider
/// than the whole table are skipped.
pub(crate) fn pack_cells(columns: usize, cells: &[RenderedCell]) -> String {
    let mut out = String::new();

    let mut start_row = true;
    let mut end_row = false;
    let mut column_offset = 0;

    for (i, cell) in cells.iter().enumerate() {
        let mut span = 1;

        match cell.shape {
            CellShape::Row => {
                start_row = true;
                end_row = true;
            }
            CellShape::Column { colspan } => {
                if colspan > 0 {
                    span = colspan;
                }
                if span > columns {
                    warn!(
                        colspan = span,
                        columns, "metadata cell is wider than the table, skipping"
                    );
                    continue;
                }

                // Lookahead: close the row if the next cell cannot fit.
                match cells.get(i + 1).map(|next| next.shape) {
                    Some(CellShape::Row) => end_row = true,
                    Some(CellShape::Column { colspan: next_span }) => {
                        if next_span.max(1) + span + column_offset > columns {
                            end_row = true;
                        }
                    }
                    None => {}
                }
            }
        }

        if start_row && end_row {
            span = columns;
        } else if end_row {
            span = columns - column_offset;
        }

        if start_row {
            out.push_str("\n<tr>\n");
            start_row = false;
        }

        out.push_str(&format!("<td colspan=\"{span}\">{}</td>", cell.html));
        column_offset += span;

        if end_row {
            out.push_str("\n</tr>\n");
            end_row = false;
            start_row = true;
            column_offset = 0;
        }
    }

    out
}
