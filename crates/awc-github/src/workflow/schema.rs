//! Serializable shape of a compiled Actions workflow.
//!
//! Field names follow <https://docs.github.com/en/actions/using-workflows/workflow-syntax-for-github-actions>.

use awc_core::PermissionSet;
use awc_expr::ConditionNode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A compiled `.lock.yml` document.
#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    /// `name:`
    pub name: String,

    /// Trigger configuration, passed through from the frontmatter
    #[serde(rename = "on")]
    pub on: IndexMap<String, serde_json::Value>,

    /// Workflow-level `GITHUB_TOKEN` grant; jobs declare their own
    pub permissions: PermissionSet,

    /// Run serialization for this workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<Concurrency>,

    /// Jobs in graph construction order
    pub jobs: IndexMap<String, Job>,
}

/// `concurrency:` block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Concurrency {
    /// Group key, usually built from `github.workflow` and the triggering ref
    pub group: String,

    /// Cancel a running member of the group when a new one starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_in_progress: Option<bool>,
}

/// One entry under `jobs:`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Job {
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Jobs that must finish first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,

    /// Guard, rendered without `${{ }}`
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_condition: Option<String>,

    /// Runner selection
    pub runs_on: RunsOn,

    /// `GITHUB_TOKEN` grant for this job
    pub permissions: PermissionSet,

    /// Minutes before the job is cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,

    /// Environment shared by every step
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Outputs other jobs may read through `needs.<job>.outputs`
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, String>,

    /// Steps, run in order
    pub steps: Vec<Step>,
}

/// `runs-on:` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RunsOn {
    /// One label
    Label(String),
    /// A runner must carry every label
    Labels(Vec<String>),
}

/// A step in a job.
///
/// Steps can either `uses` an action or `run` a shell command. User-written
/// steps from custom job fragments are deserialized into this type, so any
/// key outside the Actions step syntax is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Step {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Id used in `steps.<id>.outputs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Step guard
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub if_condition: Option<String>,

    /// Action to use (e.g., "actions/checkout@v5")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    /// Script body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Directory the script runs in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    /// Shell override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Action inputs (for `uses` steps)
    #[serde(rename = "with", default, skip_serializing_if = "IndexMap::is_empty")]
    pub with_inputs: IndexMap<String, serde_yaml::Value>,

    /// Step environment variables
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Continue on error (don't fail the job)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,

    /// Step timeout in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
}

impl Step {
    /// Create a step that uses an action
    pub fn uses(action: impl Into<String>) -> Self {
        Self {
            uses: Some(action.into()),
            ..Default::default()
        }
    }

    /// Create a step that runs a shell command
    pub fn run(command: impl Into<String>) -> Self {
        Self {
            run: Some(command.into()),
            ..Default::default()
        }
    }

    /// Set the step name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the step ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a with input
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.with_inputs.insert(key.into(), value.into());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set a condition
    #[must_use]
    pub fn with_if(mut self, condition: impl Into<String>) -> Self {
        self.if_condition = Some(condition.into());
        self
    }

    /// Guard the step with a rendered condition
    #[must_use]
    pub fn with_condition(self, condition: &ConditionNode) -> Self {
        self.with_if(condition.render())
    }

    /// Every string value of the step except its `if:`, in field order.
    ///
    /// Used to find `${{ }}` placeholders wherever they appear.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        let mut texts: Vec<&str> = [&self.name, &self.run]
            .into_iter()
            .filter_map(Option::as_deref)
            .collect();
        for value in self.with_inputs.values() {
            collect_yaml_strings(value, &mut texts);
        }
        texts.extend(self.env.values().map(String::as_str));
        texts
    }
}

fn collect_yaml_strings<'a>(value: &'a serde_yaml::Value, out: &mut Vec<&'a str>) {
    match value {
        serde_yaml::Value::String(s) => out.push(s),
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                collect_yaml_strings(item, out);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for item in map.values() {
                collect_yaml_strings(item, out);
            }
        }
        serde_yaml::Value::Tagged(tagged) => collect_yaml_strings(&tagged.value, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awc_core::{Level, Scope};

    #[test]
    fn test_step_builder() {
        let step = Step::uses("actions/checkout@v5")
            .with_name("Checkout")
            .with_input("fetch-depth", serde_yaml::Value::Number(2.into()));

        assert_eq!(step.name, Some("Checkout".to_string()));
        assert_eq!(step.uses, Some("actions/checkout@v5".to_string()));
        assert!(step.with_inputs.contains_key("fetch-depth"));
    }

    #[test]
    fn test_step_rejects_unknown_keys() {
        let value = serde_json::json!({ "run": "make", "retries": 3 });
        let err = serde_json::from_value::<Step>(value).unwrap_err();
        assert!(err.to_string().contains("retries"));
    }

    #[test]
    fn test_step_deserializes_actions_syntax() {
        let value = serde_json::json!({
            "name": "Build",
            "uses": "actions/setup-node@v4",
            "with": { "node-version": 24 },
            "working-directory": "web",
            "continue-on-error": true
        });
        let step: Step = serde_json::from_value(value).unwrap();
        assert_eq!(step.working_directory.as_deref(), Some("web"));
        assert_eq!(step.continue_on_error, Some(true));
        assert_eq!(
            step.with_inputs.get("node-version"),
            Some(&serde_yaml::Value::Number(24.into()))
        );
    }

    #[test]
    fn test_step_texts_walk_nested_inputs() {
        let step = Step::uses("actions/github-script@v8")
            .with_if("needs.a.outputs.ok == 'true'")
            .with_input(
                "script",
                serde_yaml::Value::Sequence(vec!["${{ needs.b.outputs.x }}".into()]),
            )
            .with_env("C", "${{ needs.c.outputs.y }}");
        let texts = step.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("needs.b"));
    }

    #[test]
    fn test_job_serialization() {
        let mut outputs = IndexMap::new();
        outputs.insert("activated".to_string(), "${{ steps.check.outputs.ok }}".to_string());
        let job = Job {
            name: None,
            needs: vec!["pre_activation".to_string()],
            if_condition: Some("needs.pre_activation.outputs.activated == 'true'".to_string()),
            runs_on: RunsOn::Label("ubuntu-latest".to_string()),
            permissions: PermissionSet::with_contents_read().with(Scope::Issues, Level::Write),
            timeout_minutes: None,
            env: IndexMap::new(),
            outputs,
            steps: vec![Step::run("echo hi")],
        };

        let yaml = serde_yaml::to_string(&job).unwrap();
        assert!(yaml.contains("runs-on: ubuntu-latest"));
        assert!(yaml.contains("if: needs.pre_activation.outputs.activated == 'true'"));
        assert!(yaml.contains("contents: read"));
        assert!(yaml.contains("issues: write"));
        assert!(!yaml.contains("timeout-minutes"));
        let needs = yaml.find("needs").unwrap();
        let steps = yaml.find("steps").unwrap();
        assert!(needs < steps);
    }

    #[test]
    fn test_workflow_level_permissions_render_empty() {
        let workflow = Workflow {
            name: "Triage".to_string(),
            on: IndexMap::from([("issues".to_string(), serde_json::Value::Null)]),
            permissions: PermissionSet::new(),
            concurrency: Some(Concurrency {
                group: "awc-${{ github.workflow }}".to_string(),
                cancel_in_progress: None,
            }),
            jobs: IndexMap::new(),
        };
        let yaml = serde_yaml::to_string(&workflow).unwrap();
        assert!(yaml.contains("permissions: {}"));
        assert!(yaml.contains("group: awc-${{ github.workflow }}"));
        assert!(!yaml.contains("cancel-in-progress"));
    }
}
