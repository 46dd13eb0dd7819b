//! Serde shapes of the frontmatter, before interpretation.
//!
//! These types are the single source of the frontmatter JSON schema (see
//! [`crate::schema`]). Loosely-shaped keys such as `on` and `permissions` stay
//! as [`Value`] here and are interpreted by [`crate::spec`].

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level frontmatter of an agentic workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawFrontmatter {
    /// Workflow display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Trigger declarations plus compiler-interpreted trigger options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<Value>,

    /// Condition gating the whole workflow
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Permissions requested for the agent job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,

    /// Repository roles allowed to trigger the workflow, or `all`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<RawRoles>,

    /// Per-user run rate limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RawRateLimit>,

    /// Agent engine id or configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<RawEngine>,

    /// Runner label for the agent job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<String>,

    /// Agent job timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,

    /// Environment variables for the agent job
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Enable strict validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Shared fragments merged into this workflow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    /// Safe-output capabilities, keyed by capability name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub safe_outputs: IndexMap<String, Value>,

    /// Custom job fragments, keyed by job name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub jobs: IndexMap<String, Value>,
}

/// `roles:` as a keyword (`all`) or a role list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawRoles {
    /// `roles: all`
    Keyword(String),
    /// `roles: [admin, maintainer]`
    List(Vec<String>),
}

/// `rate-limit:` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawRateLimit {
    /// Runs allowed per user within the window
    pub max: u32,
    /// Window length in minutes
    #[serde(default = "default_window")]
    pub window: u32,
}

const fn default_window() -> u32 {
    60
}

/// `engine:` as an id or an object.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawEngine {
    /// `engine: claude`
    Id(String),
    /// `engine: { id: claude, model: ... }`
    Config(RawEngineConfig),
}

/// Object form of `engine:`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawEngineConfig {
    /// Engine id
    pub id: String,
    /// Model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Turn limit passed to engines that support one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal() {
        let raw: RawFrontmatter = serde_json::from_value(json!({"on": "issues"})).unwrap();
        assert_eq!(raw.on, Some(json!("issues")));
        assert!(raw.jobs.is_empty());
    }

    #[test]
    fn test_engine_forms() {
        let id: RawEngine = serde_json::from_value(json!("claude")).unwrap();
        assert_eq!(id, RawEngine::Id("claude".into()));

        let config: RawEngine =
            serde_json::from_value(json!({"id": "codex", "model": "gpt-5"})).unwrap();
        assert!(matches!(config, RawEngine::Config(RawEngineConfig { ref id, .. }) if id == "codex"));
    }

    #[test]
    fn test_rate_limit_default_window() {
        let rl: RawRateLimit = serde_json::from_value(json!({"max": 3})).unwrap();
        assert_eq!(rl.window, 60);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_json::from_value::<RawFrontmatter>(json!({"tools": {}})).is_err());
    }
}
