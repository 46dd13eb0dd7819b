//! Agentic engines and their registry.
//!
//! An engine contributes the steps that install and run a coding agent CLI in
//! the `agent` job, and declares which outputs that job exposes on its behalf.

use crate::error::{CompileError, Result};
use crate::workflow::schema::Step;
use awc_core::WorkflowSpec;
use awc_expr::builder::{secret, step_output};
use indexmap::IndexMap;
use std::fmt;

/// Step id of the agent run step; engine outputs read from it.
pub const EXECUTION_STEP_ID: &str = "agentic_execution";

/// Inputs an engine needs to render its steps.
#[derive(Debug, Clone, Copy)]
pub struct EngineContext<'a> {
    /// The workflow being compiled
    pub spec: &'a WorkflowSpec,
    /// File holding the rendered prompt
    pub prompt_path: &'a str,
    /// File the agent appends safe-output records to, when enabled
    pub safe_outputs_path: Option<&'a str>,
}

/// An agent runtime the `agent` job can execute.
pub trait Engine: fmt::Debug + Send + Sync {
    /// Identifier used in the `engine:` frontmatter key
    fn id(&self) -> &str;

    /// Human-readable name for step titles
    fn display_name(&self) -> &str;

    /// Steps that install and run the agent, in order
    fn steps(&self, ctx: &EngineContext<'_>) -> Vec<Step>;

    /// Outputs the agent job exposes on the engine's behalf
    fn outputs(&self) -> IndexMap<String, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Copilot,
    Claude,
    Codex,
}

/// An engine distributed as an npm-installed command line tool.
#[derive(Debug, Clone)]
pub struct CliEngine {
    id: &'static str,
    display_name: &'static str,
    package: &'static str,
    version: &'static str,
    secret: &'static str,
    flavor: Flavor,
}

impl CliEngine {
    /// GitHub Copilot CLI
    #[must_use]
    pub const fn copilot() -> Self {
        Self {
            id: "copilot",
            display_name: "GitHub Copilot CLI",
            package: "@github/copilot",
            version: "0.0.354",
            secret: "COPILOT_GITHUB_TOKEN",
            flavor: Flavor::Copilot,
        }
    }

    /// Claude Code
    #[must_use]
    pub const fn claude() -> Self {
        Self {
            id: "claude",
            display_name: "Claude Code",
            package: "@anthropic-ai/claude-code",
            version: "2.0.31",
            secret: "ANTHROPIC_API_KEY",
            flavor: Flavor::Claude,
        }
    }

    /// OpenAI Codex CLI
    #[must_use]
    pub const fn codex() -> Self {
        Self {
            id: "codex",
            display_name: "Codex",
            package: "@openai/codex",
            version: "0.53.0",
            secret: "OPENAI_API_KEY",
            flavor: Flavor::Codex,
        }
    }

    fn command(&self, ctx: &EngineContext<'_>) -> String {
        let engine = &ctx.spec.engine;
        let prompt = format!("\"$(cat {})\"", ctx.prompt_path);
        let mut args: Vec<String> = match self.flavor {
            Flavor::Copilot => vec![
                "copilot".into(),
                "--add-dir".into(),
                "/tmp/awc/".into(),
                "--log-level".into(),
                "all".into(),
                "--allow-all-tools".into(),
            ],
            Flavor::Claude => vec![
                "claude".into(),
                "--print".into(),
                "--output-format".into(),
                "stream-json".into(),
                "--verbose".into(),
            ],
            Flavor::Codex => vec![
                "codex".into(),
                "exec".into(),
                "--full-auto".into(),
                "--skip-git-repo-check".into(),
            ],
        };

        if let Some(model) = &engine.model {
            match self.flavor {
                Flavor::Codex => args.push(format!("-c model={model}")),
                Flavor::Copilot | Flavor::Claude => {
                    args.push("--model".into());
                    args.push(model.clone());
                }
            }
        }
        if let (Some(turns), Flavor::Claude) = (engine.max_turns, self.flavor) {
            args.push("--max-turns".into());
            args.push(turns.to_string());
        }
        if self.flavor == Flavor::Copilot {
            args.push("--prompt".into());
        }
        args.push(prompt);

        let model = engine.model.as_deref().unwrap_or("default");
        format!(
            "set -o pipefail\n{} 2>&1 | tee /tmp/awc/agent-stdio.log\necho \"model={model}\" >> \"$GITHUB_OUTPUT\"\n",
            args.join(" ")
        )
    }
}

impl Engine for CliEngine {
    fn id(&self) -> &str {
        self.id
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    fn steps(&self, ctx: &EngineContext<'_>) -> Vec<Step> {
        let setup = Step::uses("actions/setup-node@v4")
            .with_name("Setup Node.js")
            .with_input("node-version", "24");
        let install = Step::run(format!("npm install -g {}@{}", self.package, self.version))
            .with_name(format!("Install {}", self.display_name));

        let mut execute = Step::run(self.command(ctx))
            .with_name(format!("Execute {}", self.display_name))
            .with_id(EXECUTION_STEP_ID)
            .with_env(self.secret, secret(self.secret).render_interpolated())
            .with_env("GH_AW_PROMPT", ctx.prompt_path);
        if let Some(path) = ctx.safe_outputs_path {
            execute = execute.with_env("GH_AW_SAFE_OUTPUTS", path);
        }
        execute.timeout_minutes = Some(ctx.spec.timeout_minutes);

        vec![setup, install, execute]
    }

    fn outputs(&self) -> IndexMap<String, String> {
        IndexMap::from([(
            "model".to_string(),
            step_output(EXECUTION_STEP_ID, "model").render_interpolated(),
        )])
    }
}

/// Engines the compiler can target, keyed by id.
#[derive(Debug)]
pub struct EngineRegistry {
    engines: IndexMap<String, Box<dyn Engine>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(CliEngine::copilot()));
        registry.register(Box::new(CliEngine::claude()));
        registry.register(Box::new(CliEngine::codex()));
        registry
    }
}

impl EngineRegistry {
    /// Registry with the built-in engines
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no engines
    #[must_use]
    pub fn empty() -> Self {
        Self {
            engines: IndexMap::new(),
        }
    }

    /// Add or replace an engine
    pub fn register(&mut self, engine: Box<dyn Engine>) {
        self.engines.insert(engine.id().to_string(), engine);
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    /// Look up an engine.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnknownEngine`] listing the registered ids.
    pub fn get(&self, id: &str) -> Result<&dyn Engine> {
        self.engines
            .get(id)
            .map(|engine| engine.as_ref())
            .ok_or_else(|| CompileError::UnknownEngine {
                engine: id.to_string(),
                available: self.ids().collect::<Vec<_>>().join(", "),
            })
    }
}
