//! Notion task tools.
//!
//! Tasks live in a single Notion database whose pages carry the properties
//! `Task name` (title), `Status` (status), `Due date` (date),
//! `Description` (rich text) and `Assignee` (people).

use crate::args;
use crate::http::{ApiClient, Failure, encode_segment};
use async_trait::async_trait;
use reqwest::Method;
use ronnyx_config::NotionConfig;
use ronnyx_core::error::ToolError;
use ronnyx_core::tool::{Tool, ToolResult};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const OPEN_STATUSES: [&str; 2] = ["Not started", "In Progress"];

/// The Notion operations exposed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotionOp {
    ShowTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
}

impl NotionOp {
    pub const ALL: [NotionOp; 4] = [
        NotionOp::ShowTasks,
        NotionOp::CreateTask,
        NotionOp::UpdateTask,
        NotionOp::DeleteTask,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NotionOp::ShowTasks => "show_notion_tasks",
            NotionOp::CreateTask => "create_notion_task",
            NotionOp::UpdateTask => "update_notion_task",
            NotionOp::DeleteTask => "delete_notion_task",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            NotionOp::ShowTasks => {
                "Show Notion tasks that are Not started or In Progress from the configured database."
            }
            NotionOp::CreateTask => "Adds a new task to the Notion database.",
            NotionOp::UpdateTask => "Updates an existing Notion task (page) by id.",
            NotionOp::DeleteTask => "Archives (effectively deletes) a Notion task (page) by id.",
        }
    }

    pub fn parameters_schema(self) -> Value {
        let task_fields = json!({
            "title": { "type": "string", "description": "Task name" },
            "status": { "type": "string", "description": "Status name, e.g. 'Not started', 'In Progress', 'Done'" },
            "due_date": { "type": "string", "description": "Due date in ISO 8601 format (YYYY-MM-DD)" },
            "description": { "type": "string", "description": "Longer task description" },
            "assignee_name": { "type": "string", "description": "Name (or part of a name) of the Notion user to assign" }
        });

        match self {
            NotionOp::ShowTasks => json!({ "type": "object", "properties": {} }),
            NotionOp::CreateTask => {
                let mut props = task_fields;
                props["status"]["default"] = json!("Not started");
                json!({ "type": "object", "properties": props, "required": ["title"] })
            }
            NotionOp::UpdateTask => {
                let mut props = task_fields;
                props["task_id"] = json!({ "type": "string", "description": "The Notion page id of the task" });
                json!({ "type": "object", "properties": props, "required": ["task_id"] })
            }
            NotionOp::DeleteTask => json!({
                "type": "object",
                "properties": {
                    "task_id": { "type": "string", "description": "The Notion page id of the task" }
                },
                "required": ["task_id"]
            }),
        }
    }
}

/// Credentials and HTTP client shared by all Notion tools.
pub struct NotionClient {
    http: ApiClient,
    token: Option<String>,
    version: String,
    database_id: Option<String>,
}

impl NotionClient {
    pub fn from_config(config: &NotionConfig, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            http: ApiClient::new(&config.api_url, "ronnyx", timeout)?,
            token: config.token.clone(),
            version: config.version.clone(),
            database_id: config.database_id.clone(),
        })
    }

    fn token(&self) -> Result<&str, Failure> {
        self.token
            .as_deref()
            .ok_or_else(|| Failure::message("NOTION_TOKEN is not set."))
    }

    fn token_and_database(&self) -> Result<(&str, &str), Failure> {
        match (self.token.as_deref(), self.database_id.as_deref()) {
            (Some(token), Some(db)) => Ok((token, db)),
            _ => Err(Failure::message("DATABASE_ID or NOTION_TOKEN is not set.")),
        }
    }

    fn request(&self, method: Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, path)
            .bearer_auth(token)
            .header("Notion-Version", &self.version)
            .header("Content-Type", "application/json")
    }

    pub async fn run(&self, op: NotionOp, args: &Value) -> Result<Value, Failure> {
        match op {
            NotionOp::ShowTasks => self.show_tasks().await,
            NotionOp::CreateTask => self.create_task(args).await,
            NotionOp::UpdateTask => self.update_task(args).await,
            NotionOp::DeleteTask => self.delete_task(args).await,
        }
    }

    async fn show_tasks(&self) -> Result<Value, Failure> {
        let (token, db) = self.token_and_database()?;

        let filter: Vec<Value> = OPEN_STATUSES
            .iter()
            .map(|s| json!({ "property": "Status", "status": { "equals": s } }))
            .collect();
        let body = json!({ "filter": { "or": filter }, "page_size": 50 });

        let path = format!("/databases/{}/query", encode_segment(db));
        let data = self
            .http
            .send(
                self.request(Method::POST, &path, token).json(&body),
            )
            .await?;

        let tasks: Vec<Value> = data["results"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|page| {
                let props = &page["properties"];
                json!({
                    "id": page["id"],
                    "title": page_title(props),
                    "status": page_status(props),
                    "assignees": page_assignees(props),
                })
            })
            .collect();

        debug!(count = tasks.len(), "Fetched open Notion tasks");
        Ok(json!({ "tasks": tasks }))
    }

    async fn create_task(&self, args: &Value) -> Result<Value, Failure> {
        let title = args::required_str(args, "title")?;
        let status = args::str_or(args, "status", "Not started")?;
        let due_date = args::opt_str(args, "due_date")?.filter(|d| !d.is_empty());
        let description = args::opt_str(args, "description")?.filter(|d| !d.is_empty());
        let assignee_name = args::opt_str(args, "assignee_name")?.filter(|n| !n.is_empty());

        let (token, db) = self.token_and_database()?;

        let mut properties = Map::new();
        properties.insert("Task name".into(), title_property(&title));
        properties.insert("Status".into(), status_property(&status));
        if let Some(due) = &due_date {
            properties.insert("Due date".into(), date_property(due));
        }
        if let Some(text) = &description {
            properties.insert("Description".into(), rich_text_property(text));
        }

        let mut assignees = Vec::new();
        if let Some(name) = &assignee_name {
            let user_id = self.require_user(name, token).await?;
            properties.insert("Assignee".into(), people_property(&user_id));
            assignees.push(name.clone());
        }

        let body = json!({ "parent": { "database_id": db }, "properties": properties });
        let page = self
            .http
            .send(self.request(Method::POST, "/pages", token).json(&body))
            .await?;

        Ok(json!({
            "task": {
                "id": page["id"],
                "title": title,
                "status": status,
                "due_date": due_date,
                "url": page["url"],
                "assignees": assignees,
            }
        }))
    }

    async fn update_task(&self, args: &Value) -> Result<Value, Failure> {
        let task_id = args::required_str(args, "task_id")?;
        let title = args::opt_str(args, "title")?;
        let status = args::opt_str(args, "status")?;
        let due_date = args::opt_str(args, "due_date")?;
        let description = args::opt_str(args, "description")?;
        let assignee_name = args::opt_str(args, "assignee_name")?;

        let token = self.token()?;

        let mut properties = Map::new();
        if let Some(title) = &title {
            properties.insert("Task name".into(), title_property(title));
        }
        if let Some(status) = &status {
            properties.insert("Status".into(), status_property(status));
        }
        if let Some(due) = &due_date {
            properties.insert("Due date".into(), date_property(due));
        }
        if let Some(text) = &description {
            properties.insert("Description".into(), rich_text_property(text));
        }
        if let Some(name) = &assignee_name {
            let user_id = self.require_user(name, token).await?;
            properties.insert("Assignee".into(), people_property(&user_id));
        }

        if properties.is_empty() {
            return Err(Failure::message("No fields provided to update."));
        }

        let path = format!("/pages/{}", encode_segment(&task_id));
        let page = self
            .http
            .send(
                self.request(Method::PATCH, &path, token)
                    .json(&json!({ "properties": properties })),
            )
            .await?;

        let props = &page["properties"];
        Ok(json!({
            "task": {
                "id": page["id"],
                "title": page_title(props),
                "status": page_status(props),
                "due_date": props["Due date"]["date"]["start"],
                "assignees": page_assignees(props),
                "url": page["url"],
            }
        }))
    }

    async fn delete_task(&self, args: &Value) -> Result<Value, Failure> {
        let task_id = args::required_str(args, "task_id")?;
        let token = self.token()?;

        let path = format!("/pages/{}", encode_segment(&task_id));
        self.http
            .send(
                self.request(Method::PATCH, &path, token)
                    .json(&json!({ "archived": true })),
            )
            .await?;

        Ok(json!({ "task_id": task_id }))
    }

    async fn require_user(&self, name: &str, token: &str) -> Result<String, Failure> {
        self.find_user_id(name, token).await.ok_or_else(|| {
            Failure::message(format!("Could not find Notion user matching name '{name}'."))
        })
    }

    /// First workspace user whose name contains `name`, case-insensitively.
    /// Walks every page of `/users`; a failed lookup reads as "not found".
    async fn find_user_id(&self, name: &str, token: &str) -> Option<String> {
        let needle = name.to_lowercase();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.request(Method::GET, "/users", token);
            if let Some(c) = &cursor {
                request = request.query(&[("start_cursor", c)]);
            }
            let data = match self.http.send(request).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "Notion user lookup failed");
                    return None;
                }
            };

            let found = data["results"].as_array().and_then(|users| {
                users.iter().find_map(|user| {
                    let user_name = user["name"].as_str().unwrap_or_default().to_lowercase();
                    user_name
                        .contains(&needle)
                        .then(|| user["id"].as_str().map(String::from))
                        .flatten()
                })
            });
            if found.is_some() {
                return found;
            }

            match (data["has_more"].as_bool(), data["next_cursor"].as_str()) {
                (Some(true), Some(next)) => cursor = Some(next.to_string()),
                _ => return None,
            }
        }
    }
}

fn title_property(text: &str) -> Value {
    json!({ "title": [{ "text": { "content": text } }] })
}

fn status_property(name: &str) -> Value {
    json!({ "status": { "name": name } })
}

fn date_property(start: &str) -> Value {
    json!({ "date": { "start": start } })
}

fn rich_text_property(text: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": text } }] })
}

fn people_property(user_id: &str) -> Value {
    json!({ "people": [{ "id": user_id }] })
}

fn page_title(props: &Value) -> String {
    props["Task name"]["title"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["plain_text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn page_status(props: &Value) -> String {
    props["Status"]["status"]["name"]
        .as_str()
        .unwrap_or("No Status")
        .to_string()
}

fn page_assignees(props: &Value) -> Vec<String> {
    props["Assignee"]["people"]
        .as_array()
        .map(|people| {
            people
                .iter()
                .filter_map(|p| p["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// One Notion operation exposed as a [`Tool`].
pub struct NotionTool {
    op: NotionOp,
    client: Arc<NotionClient>,
}

impl NotionTool {
    pub fn new(op: NotionOp, client: Arc<NotionClient>) -> Self {
        Self { op, client }
    }
}

#[async_trait]
impl Tool for NotionTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn parameters_schema(&self) -> Value {
        self.op.parameters_schema()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let outcome = self.client.run(self.op, &arguments).await;
        if let Err(e) = &outcome {
            warn!(tool = self.op.name(), error = %e, "Notion tool failed");
        }
        Failure::into_tool_outcome(outcome)
    }
}
