//! REST implementation of [`TrackerClient`] for Azure-DevOps-style
//! endpoints.

use crate::client::{StateColors, TrackerClient};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bex_core::{ApiConfig, QuerySelector, QuerySpec, RawRelation, WorkItemRecord, WorkItemType};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

const API_VERSION: &str = "7.0";

/// PAT-authenticated REST client.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    attachment_re: Regex,
}

impl RestClient {
    /// Build a client from the connection settings. The personal access
    /// token is sent as HTTP basic auth with an empty user name.
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let credentials = BASE64.encode(format!(":{}", api.token));
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(api.ignore_ssl)
            .build()?;

        Ok(Self {
            http,
            base_url: api.organization_url.trim_end_matches('/').to_string(),
            attachment_re: attachment_regex()?,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = check(self.http.get(url).send().await?)?;
        Ok(response.json().await?)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = check(self.http.get(url).send().await?)?;
        Ok(response.text().await?)
    }

    async fn query_by_wiql(&self, project: &str, wiql: &str) -> Result<Vec<u64>> {
        let url = format!(
            "{}/{}/_apis/wit/wiql?api-version={API_VERSION}",
            self.base_url, project
        );
        let response = check(
            self.http
                .post(&url)
                .json(&serde_json::json!({ "query": wiql }))
                .send()
                .await?,
        )?;
        let result: WiqlResult = response.json().await?;
        Ok(result.work_items.into_iter().map(|item| item.id).collect())
    }

    async fn query_by_id(&self, project: &str, id: &str) -> Result<Vec<u64>> {
        let url = format!(
            "{}/{}/_apis/wit/wiql/{id}?api-version={API_VERSION}",
            self.base_url, project
        );
        let result: WiqlResult = self.get_json(&url).await?;
        Ok(result.work_items.into_iter().map(|item| item.id).collect())
    }

    async fn query_by_name(&self, project: &str, name: &str) -> Result<Vec<u64>> {
        let url = format!(
            "{}/{}/_apis/wit/queries?$depth=2&api-version={API_VERSION}",
            self.base_url, project
        );
        let result: ValueList<QueryNode> = self.get_json(&url).await?;
        let id = find_query(&result.value, name)
            .ok_or_else(|| ClientError::QueryNotFound(name.to_string()))?;
        self.query_by_id(project, id).await
    }
}

#[async_trait]
impl TrackerClient for RestClient {
    async fn fetch_items(&self, project: &str, ids: &[u64]) -> Result<Vec<WorkItemRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/{}/_apis/wit/workitems?ids={joined}&$expand=relations&api-version={API_VERSION}",
            self.base_url, project
        );

        let result: ValueList<ApiWorkItem> = self.get_json(&url).await?;
        Ok(result.value.into_iter().map(ApiWorkItem::into_record).collect())
    }

    async fn run_query(&self, project: &str, query: &QuerySpec) -> Result<Vec<u64>> {
        match query.selector()? {
            QuerySelector::Wiql(wiql) => self.query_by_wiql(project, wiql).await,
            QuerySelector::Id(id) => self.query_by_id(project, id).await,
            QuerySelector::Name(name) => self.query_by_name(project, name).await,
        }
    }

    async fn fetch_types(&self, project: &str) -> Result<Vec<WorkItemType>> {
        let url = format!(
            "{}/{}/_apis/wit/workitemtypes?api-version={API_VERSION}",
            self.base_url, project
        );
        let result: ValueList<ApiType> = self.get_json(&url).await?;

        let mut types = Vec::with_capacity(result.value.len());
        for api_type in result.value {
            let icon = match &api_type.icon {
                Some(icon) => Some(self.get_text(&icon.url).await?),
                None => None,
            };
            types.push(WorkItemType {
                name: api_type.name,
                color: api_type.color.unwrap_or_else(|| "777777".to_string()),
                icon,
            });
        }
        Ok(types)
    }

    async fn fetch_state_colors(
        &self,
        project: &str,
        type_names: &[String],
    ) -> Result<StateColors> {
        let mut colors = StateColors::new();
        for type_name in type_names {
            let url = format!(
                "{}/{}/_apis/wit/workitemtypes/{}/states?api-version={API_VERSION}",
                self.base_url,
                project,
                type_name.replace(' ', "%20")
            );
            let result: ValueList<ApiState> = self.get_json(&url).await?;
            colors.insert(
                type_name.clone(),
                result
                    .value
                    .into_iter()
                    .filter_map(|state| Some((state.name, state.color?)))
                    .collect(),
            );
        }
        Ok(colors)
    }

    async fn resolve_attachment(&self, url: &str) -> Result<Option<String>> {
        let Some(parsed) = parse_attachment(&self.attachment_re, url) else {
            return Ok(None);
        };

        debug!(file = %parsed.file_name, "downloading attachment");
        let response = check(self.http.get(url).send().await?)?;
        let bytes = response.bytes().await?;
        Ok(Some(data_uri(&parsed.file_name, &bytes)))
    }
}

fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        })
    }
}

fn attachment_regex() -> std::result::Result<Regex, regex::Error> {
    Regex::new(r"/([^/]+)/_apis/wit/attachments/([0-9a-fA-F-]+)\?fileName=([^&]+)")
}

struct ParsedAttachment {
    file_name: String,
}

fn parse_attachment(re: &Regex, url: &str) -> Option<ParsedAttachment> {
    let captures = re.captures(url)?;
    Some(ParsedAttachment {
        file_name: captures.get(3)?.as_str().to_string(),
    })
}

/// Encode attachment bytes as an image data URI, inferring the image
/// subtype from the file extension.
fn data_uri(file_name: &str, bytes: &[u8]) -> String {
    let extension = file_name
        .rsplit('.')
        .next()
        .filter(|ext| !ext.is_empty() && *ext != file_name)
        .map_or_else(|| "png".to_string(), str::to_ascii_lowercase);
    format!("data:image/{extension};base64,{}", BASE64.encode(bytes))
}

fn find_query<'a>(nodes: &'a [QueryNode], name: &str) -> Option<&'a str> {
    for node in nodes {
        if node.name == name {
            return Some(&node.id);
        }
        if let Some(id) = find_query(&node.children, name) {
            return Some(id);
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiWorkItem {
    id: u64,
    #[serde(default)]
    fields: HashMap<String, Value>,
    #[serde(default)]
    relations: Vec<ApiRelation>,
}

impl ApiWorkItem {
    fn into_record(self) -> WorkItemRecord {
        WorkItemRecord {
            id: self.id,
            fields: self.fields,
            relations: self
                .relations
                .into_iter()
                .map(|relation| RawRelation {
                    rel: relation.rel,
                    name: relation.attributes.name,
                    url: relation.url,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRelation {
    #[serde(default)]
    rel: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    attributes: ApiRelationAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct ApiRelationAttributes {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WiqlResult {
    #[serde(default, rename = "workItems")]
    work_items: Vec<WorkItemRef>,
}

#[derive(Debug, Deserialize)]
struct WorkItemRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ApiType {
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    icon: Option<ApiIcon>,
}

#[derive(Debug, Deserialize)]
struct ApiIcon {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiState {
    name: String,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryNode {
    id: String,
    name: String,
    #[serde(default)]
    children: Vec<QueryNode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn attachment_urls_are_recognized() {
        let re = attachment_regex().unwrap();

        let parsed = parse_attachment(
            &re,
            "https://dev.azure.com/acme/MyProject/_apis/wit/attachments/\
             0f37a41e-1bbb-4f12-90f5-9a2e8ab2e5a4?fileName=diagram.png",
        )
        .unwrap();
        assert_eq!(parsed.file_name, "diagram.png");

        assert!(parse_attachment(&re, "https://example.org/external.png").is_none());
    }

    #[test]
    fn data_uri_uses_the_file_extension() {
        assert_eq!(
            data_uri("chart.PNG", b"abc"),
            format!("data:image/png;base64,{}", BASE64.encode(b"abc"))
        );
        assert!(data_uri("noextension", b"x").starts_with("data:image/png;base64,"));
    }

    #[test]
    fn wire_records_map_to_the_core_model() {
        let api_item: ApiWorkItem = serde_json::from_value(serde_json::json!({
            "id": 42,
            "fields": { "System.Title": "A title" },
            "relations": [
                {
                    "rel": "System.LinkTypes.Hierarchy-Reverse",
                    "url": "https://host/org/_apis/wit/workItems/7",
                    "attributes": { "name": "Parent" }
                }
            ]
        }))
        .unwrap();

        let record = api_item.into_record();
        assert_eq!(record.id, 42);
        assert_eq!(record.relations.len(), 1);
        assert_eq!(record.relations[0].name.as_deref(), Some("Parent"));

        let relations = bex_core::parse_relations(&record);
        assert_eq!(relations[0].target_id, 7);
    }

    #[test]
    fn stored_queries_are_found_recursively() {
        let nodes = vec![QueryNode {
            id: "root".to_string(),
            name: "Shared Queries".to_string(),
            children: vec![QueryNode {
                id: "abc-123".to_string(),
                name: "Backlog Export".to_string(),
                children: vec![],
            }],
        }];

        assert_eq!(find_query(&nodes, "Backlog Export"), Some("abc-123"));
        assert_eq!(find_query(&nodes, "Missing"), None);
    }
}
