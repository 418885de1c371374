//! CLI command implementations.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bex_client::{
    combine_wiql, fetch_items_chunked, Cache, CachingClient, RestClient, TrackerClient,
};
use bex_core::record::WorkItemRecord;
use bex_core::{
    Backlog, BacklogConfig, Config, CoreError, ItemFetcher, QuerySpec, TreeBuilder, View,
};
use bex_render::{
    interpolate, ExportContext, ExportOptions, ExporterManager, HtmlExporter, JsonExporter,
    MarkdownExporter,
};
use chrono::Local;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Starter configuration written by `bex init`.
const STARTER_CONFIG: &str = r#"# bex export configuration.
#
# Credentials: create a personal access token with work item read scope.
api:
  organization_url: https://dev.azure.com/your-organization
  token: your-pat-here

# persistent | memory | off
cache: memory

toc:
  mode: grid
  values:
    - header: State
      field: System.State
      width: 120px
    - header: Changed
      field: System.ChangedDate
      width: 160px
      align: right

templates:
  - work_item_type: Epic
    blocks:
      - type: section
        field: System.Description
        rich_text: true
  - work_item_type: Feature
    blocks:
      - type: section
        field: System.Description
        rich_text: true
      - type: tags
  - work_item_type: User Story
    blocks:
      - type: metadata
        columns: 2
        cells:
          - kind: column
            blocks:
              - type: section
                header: State
                field: System.State
          - kind: column
            blocks:
              - type: links
                label: Parent
                relations: [Parent]
                single: true
      - type: section
        field: System.Description
        rich_text: true
  - work_item_type: Bug
    blocks:
      - type: section
        header: Repro Steps
        field: Microsoft.VSTS.TCM.ReproSteps
        rich_text: true

backlogs:
  - name: Product Backlog
    project: YourProject
    query: >
      SELECT [System.Id] FROM WorkItems
      WHERE [System.TeamProject] = @project
      ORDER BY [Microsoft.VSTS.Common.StackRank]
    fetch_parents: true
    content:
      - work_item_types: [Epic]
        content:
          - work_item_types: [Feature]
            content:
              - work_item_types: [User Story, Bug]
    outputs:
      - path: "{backlog}-{date:%Y%m%d}.html"
        overwrite: true
"#;

/// Write a starter configuration file.
pub fn init(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!(
            "'{}' already exists; pass --overwrite to replace it",
            path.display()
        );
    }
    fs::write(path, STARTER_CONFIG)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    info!(path = %path.display(), "wrote starter configuration");
    Ok(())
}

/// Export one named backlog, or all configured ones.
pub async fn export(
    config_path: &Path,
    backlog: Option<&str>,
    output: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config '{}'", config_path.display()))?;
    let config: Config = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config '{}'", config_path.display()))?;

    let rest = RestClient::new(&config.api).context("Failed to set up the REST client")?;
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let cache = Cache::open(config.cache, &config.api.organization_url, &cwd)
        .context("Failed to open the response cache")?;
    let client = CachingClient::new(rest, cache);

    let selected: Vec<&BacklogConfig> = match backlog {
        Some(name) => vec![config
            .find_backlog(Some(name))
            .with_context(|| format!("No backlog named '{name}' in the configuration"))?],
        None => config.backlogs.iter().collect(),
    };
    if selected.is_empty() {
        bail!("The configuration defines no backlogs");
    }

    let mut failures = 0usize;
    for backlog_config in &selected {
        info!(backlog = %backlog_config.name, "exporting backlog");
        if let Err(err) = export_backlog(&config, backlog_config, &client, output, overwrite).await
        {
            error!(backlog = %backlog_config.name, error = %format!("{err:#}"), "export failed");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} backlog exports failed", selected.len());
    }
    Ok(())
}

/// Adapts the project-scoped client to the tree builder's fetch callback.
struct ProjectFetcher<'a> {
    client: &'a dyn TrackerClient,
    project: &'a str,
}

#[async_trait]
impl ItemFetcher for ProjectFetcher<'_> {
    async fn fetch_items(&self, ids: &[u64]) -> bex_core::Result<Vec<WorkItemRecord>> {
        fetch_items_chunked(self.client, self.project, ids)
            .await
            .map_err(|err| CoreError::Fetch(err.to_string()))
    }
}

async fn export_backlog(
    config: &Config,
    backlog_config: &BacklogConfig,
    client: &dyn TrackerClient,
    output: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    let project = backlog_config.project.as_str();

    let ids = client
        .run_query(project, &backlog_config.query)
        .await
        .context("Backlog query failed")?;
    info!(count = ids.len(), "query returned work items");

    let records = fetch_items_chunked(client, project, &ids)
        .await
        .context("Fetching work items failed")?;

    let fetcher = ProjectFetcher { client, project };
    let tree = TreeBuilder::new(
        &fetcher,
        backlog_config.fetch_parents,
        backlog_config.sort.clone(),
    )
    .build(&records, &backlog_config.content)
    .await
    .context("Building the content tree failed")?;

    let types = client
        .fetch_types(project)
        .await
        .context("Fetching work item types failed")?;
    let type_names: Vec<String> = backlog_config
        .all_work_item_types()
        .into_iter()
        .map(str::to_string)
        .collect();
    let state_colors = client
        .fetch_state_colors(project, &type_names)
        .await
        .context("Fetching state colors failed")?;

    let mut views = Vec::with_capacity(backlog_config.views.len());
    for view in &backlog_config.views {
        let spec = view_query(&view.query, &backlog_config.query);
        let ids = client
            .run_query(project, &spec)
            .await
            .with_context(|| format!("Query for view '{}' failed", view.name))?;
        views.push(View {
            name: view.name.clone(),
            ids,
        });
    }

    let backlog = Backlog::new(
        backlog_config.name.clone(),
        tree.roots,
        types,
        state_colors,
        views,
        config.work_items.as_ref(),
    )?;

    let mut manager = ExporterManager::new();
    manager.register(Box::new(HtmlExporter));
    manager.register(Box::new(JsonExporter));
    manager.register(Box::new(MarkdownExporter));

    let ctx = ExportContext {
        backlog: &backlog,
        config: backlog_config,
        toc: &config.toc,
        templates: &config.templates,
        client,
    };

    // An explicit --output replaces the configured destinations.
    if let Some(path) = output {
        let options = ExportOptions {
            overwrite,
            mkdir: false,
        };
        return manager
            .run(&ctx, path, None, options)
            .await
            .with_context(|| format!("Export to '{}' failed", path.display()));
    }

    if backlog_config.outputs.is_empty() {
        warn!(backlog = %backlog_config.name, "no outputs configured, nothing to export");
    }

    for output in &backlog_config.outputs {
        let path = interpolate(&output.path, &backlog_config.name, Local::now());
        let options = ExportOptions {
            overwrite: output.overwrite || overwrite,
            mkdir: output.mkdir,
        };
        manager
            .run(&ctx, Path::new(&path), output.format.as_deref(), options)
            .await
            .with_context(|| format!("Export to '{path}' failed"))?;
    }

    Ok(())
}

/// A raw-WIQL view narrows the backlog query; any other view (or a
/// non-WIQL backlog query) stands on its own.
fn view_query(view: &QuerySpec, backlog: &QuerySpec) -> QuerySpec {
    match (&view.query, &backlog.query) {
        (Some(view_wiql), Some(backlog_wiql)) => QuerySpec {
            query: Some(combine_wiql(view_wiql, backlog_wiql)),
            ..QuerySpec::default()
        },
        _ => view.clone(),
    }
}
