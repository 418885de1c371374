//! The exporter interface, destination handling and the manager that
//! dispatches configured outputs to the right exporter.

use crate::error::{RenderError, Result};
use async_trait::async_trait;
use bex_client::TrackerClient;
use bex_core::{Backlog, BacklogConfig, TemplateConfig, TocConfig};
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;
use tracing::info;

/// Everything an exporter needs to produce one output.
pub struct ExportContext<'a> {
    pub backlog: &'a Backlog,
    pub config: &'a BacklogConfig,
    pub toc: &'a TocConfig,
    pub templates: &'a [TemplateConfig],
    pub client: &'a dyn TrackerClient,
}

/// Destination handling flags, from the output config or CLI arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    pub overwrite: bool,
    pub mkdir: bool,
}

/// One output format.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Format name used for explicit selection in the output config.
    fn name(&self) -> &'static str;

    /// Whether this exporter wants to handle the given destination path.
    fn accepts(&self, output: &Path) -> bool;

    /// Produce the export at `output`.
    async fn run(
        &self,
        ctx: &ExportContext<'_>,
        output: &Path,
        options: ExportOptions,
    ) -> Result<()>;
}

/// Check the destination before any byte is written: the parent directory
/// must exist (or `mkdir` creates it) and an existing destination is only
/// replaced with `overwrite`.
///
/// # Errors
/// Returns the precondition violation, or the IO error from mkdir/removal.
pub fn prepare_destination(output: &Path, options: ExportOptions) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if !parent.exists() {
            if options.mkdir {
                fs::create_dir_all(parent)?;
            } else {
                return Err(RenderError::OutputDirMissing(parent.to_path_buf()));
            }
        }
    }

    if output.exists() {
        if !options.overwrite {
            return Err(RenderError::OutputExists(output.to_path_buf()));
        }
        if output.is_dir() {
            fs::remove_dir_all(output)?;
        } else {
            fs::remove_file(output)?;
        }
    }

    Ok(())
}

/// Interpolate an output path template. `{backlog}` expands to the
/// backlog name and `{date:FMT}` to the current date in the given
/// strftime format; anything else is kept verbatim.
#[must_use]
pub fn interpolate(template: &str, backlog_name: &str, now: DateTime<Local>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];

        let Some(end) = after.find('}') else {
            out.push_str(after);
            return out;
        };

        let token = &after[1..end];
        if token == "backlog" {
            out.push_str(backlog_name);
        } else if let Some(format) = token.strip_prefix("date:") {
            out.push_str(&now.format(format).to_string());
        } else {
            out.push_str(&after[..=end]);
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Holds the registered exporters and routes outputs to them.
#[derive(Default)]
pub struct ExporterManager {
    exporters: Vec<Box<dyn Exporter>>,
}

impl ExporterManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, exporter: Box<dyn Exporter>) {
        self.exporters.push(exporter);
    }

    /// Find an exporter by explicit format name, or by asking each
    /// exporter whether it accepts the destination.
    #[must_use]
    pub fn find(&self, output: &Path, format: Option<&str>) -> Option<&dyn Exporter> {
        self.exporters
            .iter()
            .find(|exporter| match format {
                Some(format) => exporter.name() == format,
                None => exporter.accepts(output),
            })
            .map(AsRef::as_ref)
    }

    /// Run the matching exporter for one configured output.
    ///
    /// # Errors
    /// Fails when no exporter matches or when the export itself fails.
    pub async fn run(
        &self,
        ctx: &ExportContext<'_>,
        output: &Path,
        format: Option<&str>,
        options: ExportOptions,
    ) -> Result<()> {
        let exporter = self.find(output, format).ok_or_else(|| {
            RenderError::NoExporter(
                format.map_or_else(|| output.display().to_string(), ToString::to_string),
            )
        })?;

        info!(output = %output.display(), exporter = exporter.name(), "exporting");
        exporter.run(ctx, output, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap()
    }

    #[test]
    fn interpolates_backlog_name_and_date() {
        assert_eq!(
            interpolate("out/{backlog}-{date:%Y%m%d}.html", "Product", noon()),
            "out/Product-20260829.html"
        );
    }

    #[test]
    fn unknown_tokens_are_kept_verbatim() {
        assert_eq!(
            interpolate("{unknown}/{backlog}.json", "B", noon()),
            "{unknown}/B.json"
        );
        assert_eq!(interpolate("plain.html", "B", noon()), "plain.html");
        assert_eq!(interpolate("broken{", "B", noon()), "broken{");
    }

    #[test]
    fn missing_parent_directory_is_rejected_without_mkdir() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("deep/nested/out.html");

        let denied = prepare_destination(&output, ExportOptions::default());
        assert!(matches!(denied, Err(RenderError::OutputDirMissing(_))));

        prepare_destination(
            &output,
            ExportOptions {
                mkdir: true,
                ..ExportOptions::default()
            },
        )
        .unwrap();
        assert!(output.parent().unwrap().is_dir());
    }

    #[test]
    fn existing_destination_is_rejected_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.html");
        fs::write(&output, "old").unwrap();

        let denied = prepare_destination(&output, ExportOptions::default());
        assert!(matches!(denied, Err(RenderError::OutputExists(_))));

        prepare_destination(
            &output,
            ExportOptions {
                overwrite: true,
                ..ExportOptions::default()
            },
        )
        .unwrap();
        assert!(!output.exists());
    }
}
