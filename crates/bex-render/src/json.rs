//! Machine-readable export: the whole backlog tree as pretty-printed JSON.

use crate::error::Result;
use crate::exporter::{prepare_destination, ExportContext, ExportOptions, Exporter};
use async_trait::async_trait;
use std::fs;
use std::path::Path;

pub struct JsonExporter;

#[async_trait]
impl Exporter for JsonExporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accepts(&self, output: &Path) -> bool {
        output
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }

    async fn run(
        &self,
        ctx: &ExportContext<'_>,
        output: &Path,
        options: ExportOptions,
    ) -> Result<()> {
        prepare_destination(output, options)?;
        let json = serde_json::to_string_pretty(ctx.backlog)?;
        fs::write(output, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use bex_client::{Result as ClientResult, StateColors, TrackerClient};
    use bex_core::record::{fields, WorkItemRecord};
    use bex_core::{Backlog, BacklogConfig, BacklogItem, QuerySpec, TocConfig, WorkItemType};
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

    fn context_fixtures() -> (Backlog, BacklogConfig, TocConfig) {
        let record = WorkItemRecord::new(7)
            .with_field(fields::TITLE, "Checkout")
            .with_field(fields::TYPE, "Epic");
        let backlog = Backlog::new(
            "Shop",
            vec![BacklogItem::resolved(record, false)],
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
        (backlog, config, toc)
    }

    #[tokio::test]
    async fn writes_the_serialized_tree() {
        let (backlog, config, toc) = context_fixtures();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &[],
            client: &StubClient,
        };

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("shop.json");
        JsonExporter
            .run(&ctx, &output, ExportOptions::default())
            .await
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["name"], "Shop");
        assert_eq!(value["roots"][0]["record"]["id"], 7);
    }

    #[tokio::test]
    async fn refuses_to_clobber_without_overwrite() {
        let (backlog, config, toc) = context_fixtures();
        let ctx = ExportContext {
            backlog: &backlog,
            config: &config,
            toc: &toc,
            templates: &[],
            client: &StubClient,
        };

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("shop.json");
        fs::write(&output, "old").unwrap();

        let denied = JsonExporter
            .run(&ctx, &output, ExportOptions::default())
            .await;
        assert!(matches!(denied, Err(RenderError::OutputExists(_))));
        assert_eq!(fs::read_to_string(&output).unwrap(), "old");
    }
}
