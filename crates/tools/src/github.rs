//! GitHub tools over the REST v3 API.
//!
//! Repositories can be named as `owner/name`, as `name` plus an `owner`
//! argument, or as a bare `name` resolved against the configured default
//! owner.

use crate::args;
use crate::http::{ApiClient, Failure, encode_path, encode_segment};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Method;
use ronnyx_config::GithubConfig;
use ronnyx_core::error::ToolError;
use ronnyx_core::tool::{Tool, ToolResult};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The GitHub operations exposed to the model, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GithubOp {
    Whoami,
    ListRepos,
    CreateRepo,
    DeleteRepo,
    ListCommits,
    ListBranches,
    CreateBranch,
    DeleteBranch,
    CreateFile,
    UpdateFile,
    DeleteFile,
    ListIssues,
    CreateIssue,
    CloseIssue,
    ListPrs,
    CreatePr,
    MergePr,
    AddCollaborator,
    RemoveCollaborator,
    SearchRepositories,
    SearchIssues,
    RateLimit,
}

const STATES: [&str; 3] = ["open", "closed", "all"];
const PERMISSIONS: [&str; 5] = ["pull", "triage", "push", "maintain", "admin"];

impl GithubOp {
    pub const ALL: [GithubOp; 22] = [
        GithubOp::Whoami,
        GithubOp::ListRepos,
        GithubOp::CreateRepo,
        GithubOp::DeleteRepo,
        GithubOp::ListCommits,
        GithubOp::ListBranches,
        GithubOp::CreateBranch,
        GithubOp::DeleteBranch,
        GithubOp::CreateFile,
        GithubOp::UpdateFile,
        GithubOp::DeleteFile,
        GithubOp::ListIssues,
        GithubOp::CreateIssue,
        GithubOp::CloseIssue,
        GithubOp::ListPrs,
        GithubOp::CreatePr,
        GithubOp::MergePr,
        GithubOp::AddCollaborator,
        GithubOp::RemoveCollaborator,
        GithubOp::SearchRepositories,
        GithubOp::SearchIssues,
        GithubOp::RateLimit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GithubOp::Whoami => "github_whoami",
            GithubOp::ListRepos => "github_list_repos",
            GithubOp::CreateRepo => "github_create_repo",
            GithubOp::DeleteRepo => "github_delete_repo",
            GithubOp::ListCommits => "github_list_commits",
            GithubOp::ListBranches => "github_list_branches",
            GithubOp::CreateBranch => "github_create_branch",
            GithubOp::DeleteBranch => "github_delete_branch",
            GithubOp::CreateFile => "github_create_file",
            GithubOp::UpdateFile => "github_update_file",
            GithubOp::DeleteFile => "github_delete_file",
            GithubOp::ListIssues => "github_list_issues",
            GithubOp::CreateIssue => "github_create_issue",
            GithubOp::CloseIssue => "github_close_issue",
            GithubOp::ListPrs => "github_list_prs",
            GithubOp::CreatePr => "github_create_pr",
            GithubOp::MergePr => "github_merge_pr",
            GithubOp::AddCollaborator => "github_add_collaborator",
            GithubOp::RemoveCollaborator => "github_remove_collaborator",
            GithubOp::SearchRepositories => "github_search_repositories",
            GithubOp::SearchIssues => "github_search_issues",
            GithubOp::RateLimit => "github_rate_limit",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GithubOp::Whoami => "Return authenticated GitHub user's login and id.",
            GithubOp::ListRepos => {
                "List authenticated user's repositories. Returns: {success, repos: [{full_name, private, description}]}"
            }
            GithubOp::CreateRepo => {
                "Create a new repository under the authenticated user. Returns: {success, repo: {full_name, private, url}}"
            }
            GithubOp::DeleteRepo => "Delete a repository. DESTRUCTIVE. Returns: {success, full_name}",
            GithubOp::ListCommits => {
                "List commits on a branch. Returns: {success, commits:[{sha, date, message, author}]}"
            }
            GithubOp::ListBranches => "List branches. Returns: {success, branches:[{name}]}",
            GithubOp::CreateBranch => {
                "Create a branch from source_branch. Returns: {success, repo, new_branch, source_branch, sha}"
            }
            GithubOp::DeleteBranch => "Delete a branch. DESTRUCTIVE. Returns: {success, repo, branch}",
            GithubOp::CreateFile => "Create a file. Returns: {success, repo, path, branch, commit_sha}",
            GithubOp::UpdateFile => "Update a file. Returns: {success, repo, path, branch, commit_sha}",
            GithubOp::DeleteFile => {
                "Delete a file. DESTRUCTIVE. Returns: {success, repo, path, branch, commit_sha}"
            }
            GithubOp::ListIssues => "List issues. Returns: {success, repo, issues:[{number,title,state,url}]}",
            GithubOp::CreateIssue => "Create issue. Returns: {success, repo, issue:{number,title,url}}",
            GithubOp::CloseIssue => "Close an issue. Returns: {success, repo, number}",
            GithubOp::ListPrs => {
                "List pull requests. Returns: {success, repo, prs:[{number,title,state,url,head,base}]}"
            }
            GithubOp::CreatePr => "Create pull request. Returns: {success, repo, pr:{number,title,url}}",
            GithubOp::MergePr => "Merge a PR. DESTRUCTIVE-ish. Returns: {success, repo, number, merged}",
            GithubOp::AddCollaborator => {
                "Add collaborator. Returns: {success, repo, username, permission}"
            }
            GithubOp::RemoveCollaborator => "Remove collaborator. Returns: {success, repo, username}",
            GithubOp::SearchRepositories => {
                "Search repositories. Returns: {success, repos:[{full_name, stars, url}]}"
            }
            GithubOp::SearchIssues => {
                "Search issues/PRs. Returns: {success, items:[{title, url, repo, number}]}"
            }
            GithubOp::RateLimit => {
                "Return current rate limit info. Returns: {success, core:{remaining,limit,reset}}"
            }
        }
    }

    pub fn parameters_schema(self) -> Value {
        use GithubOp::*;
        let p = Props::new;
        match self {
            Whoami | RateLimit => p().build(&[]),
            ListRepos => p()
                .enumeration("visibility", &["all", "public", "private"], "all")
                .integer("limit", "Maximum repositories to return (1-200)", 50)
                .build(&[]),
            CreateRepo => p()
                .string("name", "Repository name")
                .string_default("description", "Repository description", "")
                .boolean("private", "Create a private repository", false)
                .boolean("auto_init", "Initialize with a README", true)
                .build(&["name"]),
            DeleteRepo => p().repo().build(&["repo"]),
            ListCommits => p()
                .repo()
                .string_default("branch", "Branch to list commits from", "main")
                .integer("limit", "Maximum commits to return (1-100)", 20)
                .build(&["repo"]),
            ListBranches => p()
                .repo()
                .integer("limit", "Maximum branches to return (1-300)", 100)
                .build(&["repo"]),
            CreateBranch => p()
                .repo()
                .string("new_branch", "Name of the branch to create")
                .string_default("source_branch", "Branch to branch from", "main")
                .build(&["repo", "new_branch"]),
            DeleteBranch => p()
                .repo()
                .string("branch", "Branch to delete")
                .build(&["repo", "branch"]),
            CreateFile | UpdateFile => p()
                .repo()
                .string("path", "File path inside the repository")
                .string("message", "Commit message")
                .string("content", "Full file content (plain text)")
                .string_default("branch", "Target branch", "main")
                .build(&["repo", "path", "message", "content"]),
            DeleteFile => p()
                .repo()
                .string("path", "File path inside the repository")
                .string("message", "Commit message")
                .string_default("branch", "Target branch", "main")
                .build(&["repo", "path", "message"]),
            ListIssues => p()
                .repo()
                .enumeration("state", &STATES, "open")
                .integer("limit", "Maximum issues to return (1-200)", 20)
                .build(&["repo"]),
            CreateIssue => p()
                .repo()
                .string("title", "Issue title")
                .string_default("body", "Issue body", "")
                .build(&["repo", "title"]),
            CloseIssue => p()
                .repo()
                .integer_required("number", "Issue number")
                .build(&["repo", "number"]),
            ListPrs => p()
                .repo()
                .enumeration("state", &STATES, "open")
                .integer("limit", "Maximum pull requests to return (1-200)", 20)
                .build(&["repo"]),
            CreatePr => p()
                .repo()
                .string("title", "Pull request title")
                .string("body", "Pull request description")
                .string("head", "Branch containing the changes")
                .string_default("base", "Branch to merge into", "main")
                .build(&["repo", "title", "body", "head"]),
            MergePr => p()
                .repo()
                .integer_required("number", "Pull request number")
                .string_default("commit_message", "Merge commit message", "")
                .build(&["repo", "number"]),
            AddCollaborator => p()
                .repo()
                .string("username", "GitHub username")
                .enumeration("permission", &PERMISSIONS, "push")
                .build(&["repo", "username"]),
            RemoveCollaborator => p()
                .repo()
                .string("username", "GitHub username")
                .build(&["repo", "username"]),
            SearchRepositories => p()
                .string("query", "GitHub repository search query")
                .integer("limit", "Maximum results (1-50)", 10)
                .build(&["query"]),
            SearchIssues => p()
                .string("query", "GitHub issue search query")
                .integer("limit", "Maximum results (1-50)", 10)
                .build(&["query"]),
        }
    }
}

/// Small builder for JSON Schema `properties` objects.
struct Props(Map<String, Value>);

impl Props {
    fn new() -> Self {
        Props(Map::new())
    }

    fn repo(mut self) -> Self {
        self.0.insert(
            "owner".into(),
            json!({
                "type": ["string", "null"],
                "description": "Repository owner; optional when repo is 'owner/name' or a default owner is configured"
            }),
        );
        self.0.insert(
            "repo".into(),
            json!({ "type": "string", "description": "Repository name or 'owner/name'" }),
        );
        self
    }

    fn string(mut self, key: &str, description: &str) -> Self {
        self.0
            .insert(key.into(), json!({ "type": "string", "description": description }));
        self
    }

    fn string_default(mut self, key: &str, description: &str, default: &str) -> Self {
        self.0.insert(
            key.into(),
            json!({ "type": "string", "description": description, "default": default }),
        );
        self
    }

    fn boolean(mut self, key: &str, description: &str, default: bool) -> Self {
        self.0.insert(
            key.into(),
            json!({ "type": "boolean", "description": description, "default": default }),
        );
        self
    }

    fn integer(mut self, key: &str, description: &str, default: i64) -> Self {
        self.0.insert(
            key.into(),
            json!({ "type": "integer", "description": description, "default": default }),
        );
        self
    }

    fn integer_required(mut self, key: &str, description: &str) -> Self {
        self.0
            .insert(key.into(), json!({ "type": "integer", "description": description }));
        self
    }

    fn enumeration(mut self, key: &str, values: &[&str], default: &str) -> Self {
        self.0.insert(
            key.into(),
            json!({ "type": "string", "enum": values, "default": default }),
        );
        self
    }

    fn build(self, required: &[&str]) -> Value {
        json!({ "type": "object", "properties": self.0, "required": required })
    }
}

/// `/repos/{owner}/{name}` with each part percent-encoded.
fn repo_path(full: &str) -> String {
    format!("/repos/{}", encode_path(full))
}

/// Credentials and HTTP client shared by all GitHub tools.
pub struct GithubClient {
    http: ApiClient,
    token: Option<String>,
    default_owner: Option<String>,
}

impl GithubClient {
    pub fn from_config(config: &GithubConfig, timeout: Duration) -> Result<Self, ToolError> {
        Ok(Self {
            http: ApiClient::new(&config.api_url, "ronnyx", timeout)?,
            token: config.token.clone(),
            default_owner: config.default_owner.clone(),
        })
    }

    /// Resolve a repository reference to `owner/name`.
    pub fn full_name(&self, owner: Option<&str>, repo: &str) -> Result<String, Failure> {
        if repo.contains('/') {
            return Ok(repo.to_string());
        }
        if let Some(owner) = owner.filter(|o| !o.is_empty()) {
            return Ok(format!("{owner}/{repo}"));
        }
        if let Some(owner) = self.default_owner.as_deref().filter(|o| !o.is_empty()) {
            return Ok(format!("{owner}/{repo}"));
        }
        Err(Failure::message(
            "owner is required if repo is not in 'owner/name' form.",
        ))
    }

    fn repo_arg(&self, args: &Value) -> Result<String, Failure> {
        let repo = args::required_str(args, "repo")?;
        let owner = args::opt_str(args, "owner")?;
        self.full_name(owner.as_deref(), &repo)
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, Failure> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Failure::message("GITHUB_TOKEN is not set."))?;
        Ok(self
            .http
            .request(method, path)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28"))
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, Failure> {
        let mut request = self.request(method, path)?;
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.http.send(request).await
    }

    async fn get(&self, path: &str) -> Result<Value, Failure> {
        self.call(Method::GET, path, None).await
    }

    /// Page through a list endpoint until `limit` items are collected.
    /// `items_key` names the array inside search responses; plain list
    /// endpoints return a bare array.
    async fn collect(
        &self,
        path: &str,
        params: &[(&str, String)],
        limit: usize,
        items_key: Option<&str>,
    ) -> Result<Vec<Value>, Failure> {
        let per_page = limit.min(100);
        let mut out = Vec::new();
        let mut page = 1u32;

        while out.len() < limit {
            let request = self.request(Method::GET, path)?.query(params).query(&[
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ]);
            let body = self.http.send(request).await?;
            let batch = match items_key {
                Some(key) => body[key].as_array().cloned(),
                None => body.as_array().cloned(),
            }
            .unwrap_or_default();

            let exhausted = batch.len() < per_page;
            out.extend(batch.into_iter().take(limit - out.len()));
            if exhausted {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    /// The blob sha of a file on a branch, needed to update or delete it.
    async fn file_sha(&self, full: &str, path: &str, branch: &str) -> Result<String, Failure> {
        let request = self
            .request(
                Method::GET,
                &format!("{}/contents/{}", repo_path(full), encode_path(path)),
            )?
            .query(&[("ref", branch)]);
        let body = self.http.send(request).await?;
        body["sha"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| Failure::message(format!("'{path}' is not a file on {branch}")))
    }

    pub async fn run(&self, op: GithubOp, args: &Value) -> Result<Value, Failure> {
        debug!(tool = op.name(), "Running GitHub tool");
        match op {
            GithubOp::Whoami => {
                let me = self.get("/user").await?;
                Ok(json!({ "login": me["login"], "id": me["id"] }))
            }

            GithubOp::ListRepos => {
                let visibility = args::one_of(args, "visibility", "all", &["all", "public", "private"])?;
                let limit = args::limit(args, "limit", 50, 200)?;
                let repos = self
                    .collect("/user/repos", &[("visibility", visibility)], limit, None)
                    .await?;
                let repos: Vec<Value> = repos
                    .iter()
                    .map(|r| {
                        json!({
                            "full_name": r["full_name"],
                            "private": r["private"].as_bool().unwrap_or(false),
                            "description": r["description"],
                        })
                    })
                    .collect();
                Ok(json!({ "repos": repos }))
            }

            GithubOp::CreateRepo => {
                let name = args::required_str(args, "name")?;
                let body = json!({
                    "name": name,
                    "description": args::str_or(args, "description", "")?,
                    "private": args::bool_or(args, "private", false)?,
                    "auto_init": args::bool_or(args, "auto_init", true)?,
                });
                let repo = self.call(Method::POST, "/user/repos", Some(body)).await?;
                Ok(json!({
                    "repo": {
                        "full_name": repo["full_name"],
                        "private": repo["private"],
                        "url": repo["html_url"],
                    }
                }))
            }

            GithubOp::DeleteRepo => {
                let full = self.repo_arg(args)?;
                self.call(Method::DELETE, &repo_path(&full), None).await?;
                Ok(json!({ "full_name": full }))
            }

            GithubOp::ListCommits => {
                let full = self.repo_arg(args)?;
                let branch = args::str_or(args, "branch", "main")?;
                let limit = args::limit(args, "limit", 20, 100)?;
                let commits = self
                    .collect(
                        &format!("{}/commits", repo_path(&full)),
                        &[("sha", branch.clone())],
                        limit,
                        None,
                    )
                    .await?;
                let commits: Vec<Value> = commits
                    .iter()
                    .map(|c| {
                        let commit = &c["commit"];
                        json!({
                            "sha": c["sha"],
                            "date": commit["author"]["date"],
                            "message": commit["message"].as_str().and_then(|m| m.lines().next()).unwrap_or(""),
                            "author": commit["author"]["name"],
                        })
                    })
                    .collect();
                Ok(json!({ "repo": full, "branch": branch, "commits": commits }))
            }

            GithubOp::ListBranches => {
                let full = self.repo_arg(args)?;
                let limit = args::limit(args, "limit", 100, 300)?;
                let branches = self
                    .collect(&format!("{}/branches", repo_path(&full)), &[], limit, None)
                    .await?;
                let branches: Vec<Value> = branches
                    .iter()
                    .map(|b| json!({ "name": b["name"] }))
                    .collect();
                Ok(json!({ "repo": full, "branches": branches }))
            }

            GithubOp::CreateBranch => {
                let full = self.repo_arg(args)?;
                let new_branch = args::required_str(args, "new_branch")?;
                let source_branch = args::str_or(args, "source_branch", "main")?;

                let source = self
                    .get(&format!(
                        "{}/branches/{}",
                        repo_path(&full),
                        encode_path(&source_branch)
                    ))
                    .await?;
                let sha = source["commit"]["sha"]
                    .as_str()
                    .ok_or_else(|| Failure::message(format!("Branch '{source_branch}' has no commit")))?
                    .to_string();

                self.call(
                    Method::POST,
                    &format!("{}/git/refs", repo_path(&full)),
                    Some(json!({ "ref": format!("refs/heads/{new_branch}"), "sha": sha })),
                )
                .await?;
                Ok(json!({
                    "repo": full,
                    "new_branch": new_branch,
                    "source_branch": source_branch,
                    "sha": sha,
                }))
            }

            GithubOp::DeleteBranch => {
                let full = self.repo_arg(args)?;
                let branch = args::required_str(args, "branch")?;
                self.call(
                    Method::DELETE,
                    &format!("{}/git/refs/heads/{}", repo_path(&full), encode_path(&branch)),
                    None,
                )
                .await?;
                Ok(json!({ "repo": full, "branch": branch }))
            }

            GithubOp::CreateFile | GithubOp::UpdateFile => {
                let full = self.repo_arg(args)?;
                let path = args::required_str(args, "path")?;
                let message = args::required_str(args, "message")?;
                let content = args::required_str(args, "content")?;
                let branch = args::str_or(args, "branch", "main")?;

                let mut body = json!({
                    "message": message,
                    "content": BASE64.encode(content.as_bytes()),
                    "branch": branch,
                });
                if op == GithubOp::UpdateFile {
                    body["sha"] = json!(self.file_sha(&full, &path, &branch).await?);
                }

                let res = self
                    .call(
                        Method::PUT,
                        &format!("{}/contents/{}", repo_path(&full), encode_path(&path)),
                        Some(body),
                    )
                    .await?;
                Ok(json!({
                    "repo": full,
                    "path": path,
                    "branch": branch,
                    "commit_sha": res["commit"]["sha"],
                }))
            }

            GithubOp::DeleteFile => {
                let full = self.repo_arg(args)?;
                let path = args::required_str(args, "path")?;
                let message = args::required_str(args, "message")?;
                let branch = args::str_or(args, "branch", "main")?;

                let sha = self.file_sha(&full, &path, &branch).await?;
                let res = self
                    .call(
                        Method::DELETE,
                        &format!("{}/contents/{}", repo_path(&full), encode_path(&path)),
                        Some(json!({ "message": message, "sha": sha, "branch": branch })),
                    )
                    .await?;
                Ok(json!({
                    "repo": full,
                    "path": path,
                    "branch": branch,
                    "commit_sha": res["commit"]["sha"],
                }))
            }

            GithubOp::ListIssues => {
                let full = self.repo_arg(args)?;
                let state = args::one_of(args, "state", "open", &STATES)?;
                let limit = args::limit(args, "limit", 20, 200)?;
                let issues = self
                    .collect(
                        &format!("{}/issues", repo_path(&full)),
                        &[("state", state)],
                        limit,
                        None,
                    )
                    .await?;
                let issues: Vec<Value> = issues
                    .iter()
                    .map(|i| {
                        json!({
                            "number": i["number"],
                            "title": i["title"],
                            "state": i["state"],
                            "url": i["html_url"],
                        })
                    })
                    .collect();
                Ok(json!({ "repo": full, "issues": issues }))
            }

            GithubOp::CreateIssue => {
                let full = self.repo_arg(args)?;
                let title = args::required_str(args, "title")?;
                let body = args::str_or(args, "body", "")?;
                let issue = self
                    .call(
                        Method::POST,
                        &format!("{}/issues", repo_path(&full)),
                        Some(json!({ "title": title, "body": body })),
                    )
                    .await?;
                Ok(json!({
                    "repo": full,
                    "issue": {
                        "number": issue["number"],
                        "title": issue["title"],
                        "url": issue["html_url"],
                    }
                }))
            }

            GithubOp::CloseIssue => {
                let full = self.repo_arg(args)?;
                let number = args::required_int(args, "number")?;
                self.call(
                    Method::PATCH,
                    &format!("{}/issues/{number}", repo_path(&full)),
                    Some(json!({ "state": "closed" })),
                )
                .await?;
                Ok(json!({ "repo": full, "number": number }))
            }

            GithubOp::ListPrs => {
                let full = self.repo_arg(args)?;
                let state = args::one_of(args, "state", "open", &STATES)?;
                let limit = args::limit(args, "limit", 20, 200)?;
                let prs = self
                    .collect(
                        &format!("{}/pulls", repo_path(&full)),
                        &[("state", state)],
                        limit,
                        None,
                    )
                    .await?;
                let prs: Vec<Value> = prs
                    .iter()
                    .map(|pr| {
                        json!({
                            "number": pr["number"],
                            "title": pr["title"],
                            "state": pr["state"],
                            "url": pr["html_url"],
                            "head": pr["head"]["ref"],
                            "base": pr["base"]["ref"],
                        })
                    })
                    .collect();
                Ok(json!({ "repo": full, "prs": prs }))
            }

            GithubOp::CreatePr => {
                let full = self.repo_arg(args)?;
                let body = json!({
                    "title": args::required_str(args, "title")?,
                    "body": args::required_str(args, "body")?,
                    "head": args::required_str(args, "head")?,
                    "base": args::str_or(args, "base", "main")?,
                });
                let pr = self
                    .call(Method::POST, &format!("{}/pulls", repo_path(&full)), Some(body))
                    .await?;
                Ok(json!({
                    "repo": full,
                    "pr": { "number": pr["number"], "title": pr["title"], "url": pr["html_url"] }
                }))
            }

            GithubOp::MergePr => {
                let full = self.repo_arg(args)?;
                let number = args::required_int(args, "number")?;
                let commit_message = args::str_or(args, "commit_message", "")?;
                let body = if commit_message.is_empty() {
                    json!({})
                } else {
                    json!({ "commit_message": commit_message })
                };
                let res = self
                    .call(
                        Method::PUT,
                        &format!("{}/pulls/{number}/merge", repo_path(&full)),
                        Some(body),
                    )
                    .await?;
                Ok(json!({
                    "repo": full,
                    "number": number,
                    "merged": res["merged"].as_bool().unwrap_or(false),
                    "message": res["message"],
                }))
            }

            GithubOp::AddCollaborator => {
                let full = self.repo_arg(args)?;
                let username = args::required_str(args, "username")?;
                let permission = args::one_of(args, "permission", "push", &PERMISSIONS)?;
                self.call(
                    Method::PUT,
                    &format!("{}/collaborators/{}", repo_path(&full), encode_segment(&username)),
                    Some(json!({ "permission": permission })),
                )
                .await?;
                Ok(json!({ "repo": full, "username": username, "permission": permission }))
            }

            GithubOp::RemoveCollaborator => {
                let full = self.repo_arg(args)?;
                let username = args::required_str(args, "username")?;
                self.call(
                    Method::DELETE,
                    &format!("{}/collaborators/{}", repo_path(&full), encode_segment(&username)),
                    None,
                )
                .await?;
                Ok(json!({ "repo": full, "username": username }))
            }

            GithubOp::SearchRepositories => {
                let query = args::required_str(args, "query")?;
                let limit = args::limit(args, "limit", 10, 50)?;
                let items = self
                    .collect("/search/repositories", &[("q", query.clone())], limit, Some("items"))
                    .await?;
                let repos: Vec<Value> = items
                    .iter()
                    .map(|r| {
                        json!({
                            "full_name": r["full_name"],
                            "stars": r["stargazers_count"],
                            "url": r["html_url"],
                        })
                    })
                    .collect();
                Ok(json!({ "query": query, "repos": repos }))
            }

            GithubOp::SearchIssues => {
                let query = args::required_str(args, "query")?;
                let limit = args::limit(args, "limit", 10, 50)?;
                let items = self
                    .collect("/search/issues", &[("q", query.clone())], limit, Some("items"))
                    .await?;
                let items: Vec<Value> = items
                    .iter()
                    .map(|i| {
                        json!({
                            "title": i["title"],
                            "url": i["html_url"],
                            "repo": repo_from_api_url(i["repository_url"].as_str()),
                            "number": i["number"],
                        })
                    })
                    .collect();
                Ok(json!({ "query": query, "items": items }))
            }

            GithubOp::RateLimit => {
                let rate = self.get("/rate_limit").await?;
                let core = &rate["resources"]["core"];
                let reset = core["reset"]
                    .as_i64()
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.to_rfc3339());
                Ok(json!({
                    "core": {
                        "remaining": core["remaining"],
                        "limit": core["limit"],
                        "reset": reset,
                    }
                }))
            }
        }
    }
}

/// `https://api.github.com/repos/owner/name` → `owner/name`.
fn repo_from_api_url(url: Option<&str>) -> Option<String> {
    url?.split_once("/repos/").map(|(_, full)| full.to_string())
}

/// One GitHub operation exposed as a [`Tool`].
pub struct GithubTool {
    op: GithubOp,
    client: Arc<GithubClient>,
}

impl GithubTool {
    pub fn new(op: GithubOp, client: Arc<GithubClient>) -> Self {
        Self { op, client }
    }
}

#[async_trait]
impl Tool for GithubTool {
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
            warn!(tool = self.op.name(), error = %e, "GitHub tool failed");
        }
        Failure::into_tool_outcome(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use std::collections::HashMap;

    fn fake_github() -> Router {
        Router::new()
            .route(
                "/user",
                get(|headers: HeaderMap| async move {
                    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                    let api = headers.get("x-github-api-version").and_then(|v| v.to_str().ok());
                    let agent = headers.get("user-agent").and_then(|v| v.to_str().ok());
                    if auth != Some("Bearer ghp_test") || api != Some("2022-11-28") || agent != Some("ronnyx") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})));
                    }
                    (StatusCode::OK, Json(json!({"login": "octocat", "id": 1})))
                }),
            )
            .route(
                "/user/repos",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let per_page: usize = q["per_page"].parse().unwrap();
                    let page: usize = q["page"].parse().unwrap();
                    // 5 repos in total, served in pages.
                    let all: Vec<Value> = (1..=5)
                        .map(|i| json!({"full_name": format!("octocat/r{i}"), "private": i % 2 == 0, "description": null}))
                        .collect();
                    let start = (page - 1) * per_page;
                    let slice: Vec<Value> = all.into_iter().skip(start).take(per_page).collect();
                    Json(Value::Array(slice))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/commits",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q["sha"], "develop");
                    Json(json!([
                        {"sha": "abc", "commit": {"message": "First line\n\nbody", "author": {"name": "Ada", "date": "2025-01-01T00:00:00Z"}}}
                    ]))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/branches/{branch}",
                get(|Path((_, _, branch)): Path<(String, String, String)>| async move {
                    if branch == "main" {
                        (StatusCode::OK, Json(json!({"name": "main", "commit": {"sha": "sha-main"}})))
                    } else {
                        (StatusCode::NOT_FOUND, Json(json!({"message": "Branch not found"})))
                    }
                }),
            )
            .route(
                "/repos/{owner}/{repo}/git/refs",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["ref"], "refs/heads/feature");
                    assert_eq!(body["sha"], "sha-main");
                    (StatusCode::CREATED, Json(json!({"ref": body["ref"]})))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                get(|| async { Json(json!({"sha": "blob-1", "path": "README.md"})) }).put(
                    |Json(body): Json<Value>| async move {
                        // "hello" in base64
                        assert_eq!(body["content"], "aGVsbG8=");
                        let sha = if body["sha"] == "blob-1" { "commit-update" } else { "commit-create" };
                        Json(json!({"commit": {"sha": sha}}))
                    },
                ),
            )
            .route(
                "/repos/{owner}/{repo}/pulls/{number}/merge",
                put(|Path((_, _, number)): Path<(String, String, u64)>| async move {
                    Json(json!({"merged": number == 7, "message": "Pull Request successfully merged"}))
                }),
            )
            .route(
                "/search/issues",
                get(|| async {
                    Json(json!({"total_count": 1, "items": [
                        {"title": "Crash", "html_url": "https://github.com/o/r/issues/3",
                         "repository_url": "https://api.github.com/repos/o/r", "number": 3}
                    ]}))
                }),
            )
            .route(
                "/rate_limit",
                get(|| async {
                    Json(json!({"resources": {"core": {"limit": 5000, "remaining": 4999, "reset": 1700000000}}}))
                }),
            )
    }

    fn client(base: &str, token: Option<&str>, default_owner: Option<&str>) -> Arc<GithubClient> {
        let config = GithubConfig {
            token: token.map(String::from),
            default_owner: default_owner.map(String::from),
            api_url: base.to_string(),
        };
        Arc::new(GithubClient::from_config(&config, Duration::from_secs(5)).unwrap())
    }

    async fn configured() -> Arc<GithubClient> {
        let base = serve(fake_github()).await;
        client(&base, Some("ghp_test"), Some("octocat"))
    }

    async fn run(client: &Arc<GithubClient>, op: GithubOp, args: Value) -> ToolResult {
        GithubTool::new(op, client.clone()).execute(args).await.unwrap()
    }

    #[test]
    fn twenty_two_ops_with_unique_names() {
        let mut names: Vec<_> = GithubOp::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(names.len(), 22);
        assert_eq!(names[0], "github_whoami");
        assert_eq!(names[21], "github_rate_limit");
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 22);
    }

    #[test]
    fn schemas_declare_required_fields() {
        let schema = GithubOp::CreateFile.parameters_schema();
        assert_eq!(schema["type"], "object");
        let required: Vec<_> = schema["required"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert_eq!(required, vec!["repo", "path", "message", "content"]);
        assert_eq!(schema["properties"]["branch"]["default"], "main");

        let whoami = GithubOp::Whoami.parameters_schema();
        assert!(whoami["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn repo_resolution() {
        let with_default = client("http://127.0.0.1:1", Some("t"), Some("baran"));
        assert_eq!(with_default.full_name(None, "a/b").unwrap(), "a/b");
        assert_eq!(with_default.full_name(Some("x"), "b").unwrap(), "x/b");
        assert_eq!(with_default.full_name(None, "b").unwrap(), "baran/b");

        let without = client("http://127.0.0.1:1", Some("t"), None);
        let err = without.full_name(None, "b").unwrap_err();
        assert_eq!(err.to_string(), "owner is required if repo is not in 'owner/name' form.");
    }

    #[test]
    fn repo_from_search_url() {
        assert_eq!(
            repo_from_api_url(Some("https://api.github.com/repos/o/r")).as_deref(),
            Some("o/r")
        );
        assert!(repo_from_api_url(None).is_none());
    }

    #[tokio::test]
    async fn whoami_sends_github_headers() {
        let client = configured().await;
        let result = run(&client, GithubOp::Whoami, json!({})).await;
        assert!(result.success, "{}", result.output);
        let data = result.data.unwrap();
        assert_eq!(data["login"], "octocat");
        assert_eq!(data["id"], 1);
    }

    #[tokio::test]
    async fn missing_token_is_soft_failure() {
        let result = run(&client("http://127.0.0.1:1", None, None), GithubOp::Whoami, json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error(), Some("GITHUB_TOKEN is not set."));
    }

    #[tokio::test]
    async fn bad_credentials_surface_status() {
        let base = serve(fake_github()).await;
        let result = run(&client(&base, Some("wrong"), None), GithubOp::Whoami, json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error(), Some("Bad credentials"));
        assert_eq!(result.data.unwrap()["status_code"], 401);
    }

    #[tokio::test]
    async fn list_repos_pages_until_limit() {
        let client = configured().await;
        let result = run(&client, GithubOp::ListRepos, json!({"limit": 3})).await;
        let repos = result.data.unwrap()["repos"].as_array().unwrap().clone();
        assert_eq!(repos.len(), 3);
        assert_eq!(repos[2]["full_name"], "octocat/r3");

        let all = run(&client, GithubOp::ListRepos, json!({})).await;
        assert_eq!(all.data.unwrap()["repos"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn list_commits_uses_first_message_line() {
        let client = configured().await;
        let result = run(
            &client,
            GithubOp::ListCommits,
            json!({"repo": "ronnyx", "branch": "develop"}),
        )
        .await;
        assert!(result.success, "{}", result.output);
        let data = result.data.unwrap();
        assert_eq!(data["repo"], "octocat/ronnyx");
        assert_eq!(data["commits"][0]["message"], "First line");
        assert_eq!(data["commits"][0]["author"], "Ada");
    }

    #[tokio::test]
    async fn create_branch_from_source() {
        let client = configured().await;
        let result = run(
            &client,
            GithubOp::CreateBranch,
            json!({"repo": "octocat/ronnyx", "new_branch": "feature"}),
        )
        .await;
        assert!(result.success, "{}", result.output);
        assert_eq!(result.data.unwrap()["sha"], "sha-main");

        let missing = run(
            &client,
            GithubOp::CreateBranch,
            json!({"repo": "octocat/ronnyx", "new_branch": "feature", "source_branch": "nope"}),
        )
        .await;
        assert_eq!(missing.error(), Some("Branch not found"));
    }

    #[tokio::test]
    async fn create_and_update_file() {
        let client = configured().await;
        let args = json!({"repo": "ronnyx", "path": "docs/README.md", "message": "docs", "content": "hello"});

        let created = run(&client, GithubOp::CreateFile, args.clone()).await;
        assert!(created.success, "{}", created.output);
        assert_eq!(created.data.unwrap()["commit_sha"], "commit-create");

        let updated = run(&client, GithubOp::UpdateFile, args).await;
        assert!(updated.success, "{}", updated.output);
        let data = updated.data.unwrap();
        assert_eq!(data["commit_sha"], "commit-update");
        assert_eq!(data["path"], "docs/README.md");
    }

    #[tokio::test]
    async fn path_arguments_reach_the_api_intact() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let (files, refs, people) = (seen.clone(), seen.clone(), seen.clone());
        let app = Router::new()
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                put(move |Path((_, _, path)): Path<(String, String, String)>| async move {
                    files.lock().unwrap().push(path);
                    Json(json!({"commit": {"sha": "c-1"}}))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/git/refs/heads/{*branch}",
                axum::routing::delete(
                    move |Path((_, _, branch)): Path<(String, String, String)>| async move {
                        refs.lock().unwrap().push(branch);
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .route(
                "/repos/{owner}/{repo}/collaborators/{username}",
                put(move |Path((_, _, user)): Path<(String, String, String)>| async move {
                    people.lock().unwrap().push(user);
                    StatusCode::NO_CONTENT
                }),
            );
        let client = client(&serve(app).await, Some("ghp_test"), Some("octocat"));

        let created = run(
            &client,
            GithubOp::CreateFile,
            json!({"repo": "r", "path": "notes/issue#12.md", "message": "m", "content": "hello"}),
        )
        .await;
        assert!(created.success, "{}", created.output);
        assert_eq!(created.data.unwrap()["path"], "notes/issue#12.md");

        let deleted = run(
            &client,
            GithubOp::DeleteBranch,
            json!({"repo": "r", "branch": "fix/50%?done"}),
        )
        .await;
        assert!(deleted.success, "{}", deleted.output);

        let added = run(
            &client,
            GithubOp::AddCollaborator,
            json!({"repo": "r", "username": "dev team"}),
        )
        .await;
        assert!(added.success, "{}", added.output);

        assert_eq!(
            *seen.lock().unwrap(),
            ["notes/issue#12.md", "fix/50%?done", "dev team"]
        );
    }

    #[tokio::test]
    async fn merge_pr_reports_merged_flag() {
        let client = configured().await;
        let result = run(&client, GithubOp::MergePr, json!({"repo": "ronnyx", "number": 7})).await;
        let data = result.data.unwrap();
        assert_eq!(data["merged"], true);
        assert_eq!(data["number"], 7);
    }

    #[tokio::test]
    async fn search_issues_extracts_repo() {
        let client = configured().await;
        let result = run(&client, GithubOp::SearchIssues, json!({"query": "crash"})).await;
        let data = result.data.unwrap();
        assert_eq!(data["items"][0]["repo"], "o/r");
        assert_eq!(data["items"][0]["number"], 3);
    }

    #[tokio::test]
    async fn rate_limit_formats_reset() {
        let client = configured().await;
        let result = run(&client, GithubOp::RateLimit, json!({})).await;
        let core = &result.data.unwrap()["core"];
        assert_eq!(core["remaining"], 4999);
        assert!(core["reset"].as_str().unwrap().starts_with("2023-11-14"));
    }

    #[tokio::test]
    async fn bad_arguments_are_errors() {
        let client = configured().await;
        let tool = GithubTool::new(GithubOp::ListIssues, client);
        let err = tool
            .execute(json!({"repo": "ronnyx", "state": "merged"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn unresolvable_repo_is_soft_failure() {
        let base = serve(fake_github()).await;
        let result = run(&client(&base, Some("ghp_test"), None), GithubOp::DeleteRepo, json!({"repo": "x"})).await;
        assert!(!result.success);
        assert_eq!(
            result.error(),
            Some("owner is required if repo is not in 'owner/name' form.")
        );
    }

    #[tokio::test]
    async fn unreachable_api_never_errors() {
        let client = client("http://127.0.0.1:1", Some("ghp_test"), Some("octocat"));
        for op in [GithubOp::Whoami, GithubOp::ListBranches, GithubOp::RateLimit] {
            let result = run(&client, op, json!({"repo": "ronnyx"})).await;
            assert!(!result.success, "{} should fail", op.name());
        }
    }
}
