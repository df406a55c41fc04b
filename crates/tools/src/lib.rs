//! GitHub and Notion tools for Ronnyx.
//!
//! Each tool wraps one REST call (or a short sequence of calls) and reports
//! its outcome as a `{"success": ..}` envelope the model can read. Credential
//! problems and upstream errors are failed results, not `Err`s, so the agent
//! can explain them to the user.

pub mod args;
pub mod github;
pub mod http;
pub mod notion;

use github::{GithubClient, GithubOp, GithubTool};
use notion::{NotionClient, NotionOp, NotionTool};
use ronnyx_config::AppConfig;
use ronnyx_core::error::ToolError;
use ronnyx_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Build the registry the assistant runs with: the GitHub tools followed by
/// the Notion task tools.
///
/// Tools are registered even when their credentials are missing; calling
/// one then yields a failed result naming the missing setting.
pub fn default_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let timeout = Duration::from_secs(config.tools.timeout_secs.max(1));
    let mut registry = ToolRegistry::new();
    register_github(&mut registry, config, timeout)?;
    register_notion(&mut registry, config, timeout)?;

    tracing::debug!(
        tools = registry.len(),
        github = config.github.token.is_some(),
        notion = config.notion.token.is_some(),
        "Tool registry ready"
    );
    Ok(registry)
}

pub fn register_github(
    registry: &mut ToolRegistry,
    config: &AppConfig,
    timeout: Duration,
) -> Result<(), ToolError> {
    let client = Arc::new(GithubClient::from_config(&config.github, timeout)?);
    for op in GithubOp::ALL {
        registry.register(Box::new(GithubTool::new(op, client.clone())));
    }
    Ok(())
}

pub fn register_notion(
    registry: &mut ToolRegistry,
    config: &AppConfig,
    timeout: Duration,
) -> Result<(), ToolError> {
    let client = Arc::new(NotionClient::from_config(&config.notion, timeout)?);
    for op in NotionOp::ALL {
        registry.register(Box::new(NotionTool::new(op, client.clone())));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_has_github_then_notion_tools() {
        let registry = default_registry(&AppConfig::default()).unwrap();
        assert_eq!(registry.len(), 26);

        let names = registry.names();
        assert_eq!(names[0], "github_whoami");
        assert_eq!(names[21], "github_rate_limit");
        assert_eq!(
            &names[22..],
            &[
                "show_notion_tasks",
                "create_notion_task",
                "update_notion_task",
                "delete_notion_task"
            ]
        );
    }

    #[test]
    fn every_definition_has_an_object_schema() {
        let registry = default_registry(&AppConfig::default()).unwrap();
        for def in registry.definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty(), "{}", def.name);
        }
    }

    #[tokio::test]
    async fn unconfigured_tools_fail_softly() {
        let registry = default_registry(&AppConfig::default()).unwrap();
        let call = ronnyx_core::tool::ToolCall {
            id: "call_1".into(),
            name: "show_notion_tasks".into(),
            arguments: json!({}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.call_id, "call_1");
        assert_eq!(
            result.error(),
            Some("DATABASE_ID or NOTION_TOKEN is not set.")
        );
    }
}
