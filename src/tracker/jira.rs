//! Jira REST client implementation
//!
//! This module implements the TrackerClient trait against the Jira REST v2 API
//! using basic authentication.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::client::{Connector, FieldUpdate, SearchPage, TrackerClient};
use crate::config::TrackerConfig;
use crate::domain::{Comment, CommentEdit, Link, NewComment, NewLink, ProjectMetadata, Ticket, Version};
use crate::error::{Result, WardenError};

/// Date format Jira uses for timestamps, e.g. `2024-03-01T10:15:30.000+0000`
const JIRA_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Connection settings for a Jira instance
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Option<Duration>,
}

impl JiraConfig {
    /// Build from the tracker section of the config file. Missing passwords are fatal.
    pub fn from_tracker_config(tracker: &TrackerConfig) -> Result<Self> {
        Ok(Self {
            base_url: tracker.url.clone(),
            username: tracker.username.clone(),
            password: tracker.resolve_password()?,
            timeout: tracker.request_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Check the settings are usable at all. Failures here are never retried.
    pub fn validate(&self) -> Result<Url> {
        if self.username.trim().is_empty() {
            return Err(WardenError::Configuration("tracker.username is empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(WardenError::Configuration("tracker password is empty".to_string()));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| WardenError::Configuration(format!("tracker.url {:?} is malformed: {}", self.base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(WardenError::Configuration(format!("tracker.url {:?} is not a base URL", self.base_url)));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

/// Logs in to Jira and hands out authenticated clients
pub struct JiraConnector {
    config: JiraConfig,
}

impl JiraConnector {
    pub fn new(config: JiraConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for JiraConnector {
    async fn connect(&self) -> Result<Arc<dyn TrackerClient>> {
        let client = JiraClient::new(&self.config)?;
        client.verify_credentials().await?;
        log::info!("Authenticated against {} as {}", self.config.base_url, self.config.username);
        Ok(Arc::new(client))
    }
}

/// Jira REST v2 client
pub struct JiraClient {
    http: Client,
    base: Url,
    username: String,
    password: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self> {
        let base = config.validate()?;
        let mut builder = Client::builder().user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| WardenError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|e| WardenError::Configuration(format!("bad request path {}: {}", path, e)))?;
        Ok(self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                WardenError::Authentication(format!("{}: {}", status, truncate(&message, 200)))
            }
            _ => WardenError::Tracker {
                status: status.as_u16(),
                message: truncate(&message, 500),
            },
        })
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body: Value = response.json().await?;
        Ok(serde_json::from_value(body)?)
    }

    /// `GET /myself` - cheapest request that proves the credentials work
    pub async fn verify_credentials(&self) -> Result<()> {
        self.send(self.request(Method::GET, "rest/api/2/myself")?).await?;
        Ok(())
    }

    async fn transition_id(&self, key: &str, name: &str) -> Result<String> {
        let response: TransitionsDto = self
            .send_json(self.request(Method::GET, &format!("rest/api/2/issue/{}/transitions", key))?)
            .await?;
        response
            .transitions
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.id)
            .ok_or_else(|| WardenError::InvalidResponse(format!("transition {:?} not available on {}", name, key)))
    }
}

#[async_trait]
impl TrackerClient for JiraClient {
    async fn search(&self, jql: &str, start_at: usize, max_results: usize) -> Result<SearchPage> {
        let body = json!({
            "jql": jql,
            "startAt": start_at,
            "maxResults": max_results,
            "fields": ["*all"],
        });
        let response: SearchResponseDto = self
            .send_json(self.request(Method::POST, "rest/api/2/search")?.json(&body))
            .await?;

        let tickets = response
            .issues
            .into_iter()
            .map(|issue| parse_issue(issue.key, &issue.fields))
            .collect::<Result<Vec<_>>>()?;
        let has_more = response.start_at + tickets.len() < response.total && !tickets.is_empty();
        Ok(SearchPage { tickets, has_more })
    }

    async fn update_fields(&self, key: &str, update: &FieldUpdate) -> Result<()> {
        let request = self
            .request(Method::PUT, &format!("rest/api/2/issue/{}", key))?
            .json(&update.to_json());
        self.send(request).await?;
        Ok(())
    }

    async fn transition(&self, key: &str, transition: &str, update: &FieldUpdate) -> Result<()> {
        let id = self.transition_id(key, transition).await?;
        let mut body = update.to_json();
        body["transition"] = json!({ "id": id });
        let request = self
            .request(Method::POST, &format!("rest/api/2/issue/{}/transitions", key))?
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn add_comment(&self, key: &str, comment: &NewComment) -> Result<()> {
        let body = json!({ "body": comment.body });
        let request = self
            .request(Method::POST, &format!("rest/api/2/issue/{}/comment", key))?
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn update_comment(&self, key: &str, edit: &CommentEdit) -> Result<()> {
        let request = self
            .request(Method::PUT, &format!("rest/api/2/issue/{}/comment/{}", key, edit.comment_id))?
            .json(&json!({ "body": edit.body }));
        self.send(request).await?;
        Ok(())
    }

    async fn create_link(&self, key: &str, link: &NewLink) -> Result<()> {
        let body = json!({
            "type": { "name": link.link_type },
            "inwardIssue": { "key": key },
            "outwardIssue": { "key": link.other_key },
        });
        self.send(self.request(Method::POST, "rest/api/2/issueLink")?.json(&body))
            .await?;
        Ok(())
    }

    async fn delete_link(&self, link_id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("rest/api/2/issueLink/{}", link_id))?)
            .await?;
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectMetadata>> {
        let projects: Vec<ProjectDto> = self
            .send_json(self.request(Method::GET, "rest/api/2/project")?)
            .await?;

        let mut metadata = Vec::with_capacity(projects.len());
        for project in projects {
            let versions: Vec<VersionDto> = self
                .send_json(self.request(Method::GET, &format!("rest/api/2/project/{}/versions", project.key))?)
                .await?;
            metadata.push(ProjectMetadata {
                key: project.key,
                name: project.name,
                versions: versions.into_iter().map(Version::from).collect(),
            });
        }
        Ok(metadata)
    }
}

//=== Wire types ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponseDto {
    #[serde(default)]
    start_at: usize,
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<IssueDto>,
}

#[derive(Debug, Deserialize)]
struct IssueDto {
    key: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TransitionsDto {
    transitions: Vec<TransitionDto>,
}

#[derive(Debug, Deserialize)]
struct TransitionDto {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectDto {
    key: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionDto {
    id: String,
    name: String,
    #[serde(default)]
    released: bool,
    #[serde(default)]
    archived: bool,
    release_date: Option<NaiveDate>,
}

impl From<VersionDto> for Version {
    fn from(dto: VersionDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            released: dto.released,
            archived: dto.archived,
            release_date: dto.release_date,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter().try_fold(value, |v, key| v.get(key))?.as_str()
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(s, JIRA_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| WardenError::InvalidResponse(format!("bad timestamp {:?}: {}", s, e)))
}

fn parse_comment(value: &Value) -> Result<Comment> {
    Ok(Comment {
        id: str_at(value, &["id"]).unwrap_or_default().to_string(),
        author: str_at(value, &["author", "name"]).map(str::to_string),
        body: str_at(value, &["body"]).unwrap_or_default().to_string(),
        created: str_at(value, &["created"])
            .map(parse_date)
            .transpose()?
            .unwrap_or_else(Utc::now),
        visibility: str_at(value, &["visibility", "value"]).map(str::to_string),
    })
}

fn parse_link(value: &Value) -> Option<Link> {
    let id = str_at(value, &["id"])?.to_string();
    let link_type = str_at(value, &["type", "name"])?.to_string();
    if let Some(other) = str_at(value, &["outwardIssue", "key"]) {
        return Some(Link {
            id,
            link_type,
            outward: true,
            other_key: other.to_string(),
        });
    }
    str_at(value, &["inwardIssue", "key"]).map(|other| Link {
        id,
        link_type,
        outward: false,
        other_key: other.to_string(),
    })
}

/// Map a search hit onto a Ticket
fn parse_issue(key: String, fields: &Map<String, Value>) -> Result<Ticket> {
    let fields_value = Value::Object(fields.clone());
    let project = str_at(&fields_value, &["project", "key"])
        .map(str::to_string)
        .or_else(|| key.split('-').next().map(str::to_string))
        .unwrap_or_default();

    let mut ticket = Ticket::new(key, project);
    ticket.summary = str_at(&fields_value, &["summary"]).unwrap_or_default().to_string();
    ticket.description = str_at(&fields_value, &["description"]).map(str::to_string);
    ticket.status = str_at(&fields_value, &["status", "name"]).unwrap_or("Open").to_string();
    ticket.resolution = str_at(&fields_value, &["resolution", "name"]).map(str::to_string);
    ticket.reporter = str_at(&fields_value, &["reporter", "name"]).map(str::to_string);
    if let Some(created) = str_at(&fields_value, &["created"]) {
        ticket.created = parse_date(created)?;
    }
    if let Some(updated) = str_at(&fields_value, &["updated"]) {
        ticket.updated = parse_date(updated)?;
    }

    if let Some(versions) = fields.get("versions").filter(|v| !v.is_null()) {
        let versions: Vec<VersionDto> = serde_json::from_value(versions.clone())?;
        ticket.affected_versions = versions.into_iter().map(Version::from).collect();
    }

    if let Some(comments) = fields_value.pointer("/comment/comments").and_then(Value::as_array) {
        ticket.comments = comments.iter().map(parse_comment).collect::<Result<Vec<_>>>()?;
    }

    if let Some(links) = fields.get("issuelinks").and_then(Value::as_array) {
        ticket.links = links.iter().filter_map(parse_link).collect();
    }

    for (name, value) in fields {
        if name.starts_with("customfield_") && !value.is_null() {
            ticket.fields.insert(name.clone(), value.clone());
        }
    }

    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> JiraConfig {
        JiraConfig {
            base_url: url.to_string(),
            username: "bot".to_string(),
            password: "secret".to_string(),
            timeout: None,
        }
    }

    #[test]
    fn test_validate_appends_trailing_slash() {
        let url = config("https://tracker.test/jira").validate().unwrap();
        assert_eq!(url.as_str(), "https://tracker.test/jira/");
        assert_eq!(url.join("rest/api/2/myself").unwrap().as_str(), "https://tracker.test/jira/rest/api/2/myself");
    }

    #[test]
    fn test_malformed_url_is_fatal() {
        let err = config("not a url").validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_credentials_are_fatal() {
        let mut c = config("https://tracker.test");
        c.username = " ".to_string();
        assert!(c.validate().unwrap_err().is_fatal());

        let mut c = config("https://tracker.test");
        c.password = String::new();
        assert!(c.validate().unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_connector_rejects_bad_config_without_network() {
        let connector = JiraConnector::new(config("::"));
        let err = connector.connect().await.err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_parse_date_formats() {
        let jira = parse_date("2024-03-01T10:15:30.000+0000").unwrap();
        let rfc = parse_date("2024-03-01T10:15:30Z").unwrap();
        assert_eq!(jira, rfc);
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_parse_issue() {
        let fields = json!({
            "project": { "key": "MC" },
            "summary": "Game crashes",
            "description": null,
            "status": { "name": "Resolved" },
            "resolution": { "name": "Duplicate" },
            "reporter": { "name": "alice" },
            "created": "2024-03-01T10:15:30.000+0000",
            "updated": "2024-03-02T10:15:30.000+0000",
            "versions": [ { "id": "10", "name": "1.20", "released": true, "archived": false, "releaseDate": "2023-06-07" } ],
            "comment": { "comments": [
                { "id": "1", "body": "same as MC-2", "author": { "name": "bob" }, "created": "2024-03-01T11:00:00.000+0000" }
            ] },
            "issuelinks": [
                { "id": "7", "type": { "name": "Duplicate" }, "outwardIssue": { "key": "MC-2" } },
                { "id": "8", "type": { "name": "Relates" }, "inwardIssue": { "key": "MC-3" } }
            ],
            "customfield_100": 4,
            "customfield_200": null
        });
        let ticket = parse_issue("MC-1".to_string(), fields.as_object().unwrap()).unwrap();

        assert_eq!(ticket.project, "MC");
        assert_eq!(ticket.status, "Resolved");
        assert_eq!(ticket.resolution.as_deref(), Some("Duplicate"));
        assert!(ticket.description.is_none());
        assert_eq!(ticket.affected_versions[0].name, "1.20");
        assert_eq!(ticket.affected_versions[0].release_date, NaiveDate::from_ymd_opt(2023, 6, 7));
        assert_eq!(ticket.comments[0].author.as_deref(), Some("bob"));
        assert_eq!(ticket.links.len(), 2);
        assert!(ticket.links[0].outward);
        assert!(!ticket.links[1].outward);
        assert_eq!(ticket.fields.get("customfield_100"), Some(&json!(4)));
        assert!(!ticket.fields.contains_key("customfield_200"));
    }

    #[test]
    fn test_parse_issue_project_falls_back_to_key_prefix() {
        let ticket = parse_issue("REALMS-5".to_string(), &Map::new()).unwrap();
        assert_eq!(ticket.project, "REALMS");
        assert_eq!(ticket.status, "Open");
    }
}
