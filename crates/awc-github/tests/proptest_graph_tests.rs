//! Property-based tests for job-graph synthesis.
//!
//! Workflows are generated from random combinations of triggers, activation
//! checks, custom jobs and safe outputs. For every one of them:
//! - the job graph is acyclic and every `needs` entry names an earlier job
//! - the activation gate is the AND-fold of exactly the configured checks
//! - compiling twice yields byte-identical YAML
//! - jobs never receive write access nobody asked for

use awc_core::{NoImports, SchemaCache};
use awc_github::{CompileOptions, CompiledWorkflow, Compiler};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

// =============================================================================
// Strategies for generating test data
// =============================================================================

#[derive(Debug, Clone)]
struct WorkflowShape {
    event: &'static str,
    roles_all: bool,
    stop_after: Option<u32>,
    rate_limit: Option<u32>,
    skip_if_match: bool,
    command: bool,
    custom_jobs: usize,
    capabilities: Vec<&'static str>,
    threat_detection: bool,
}

const CAPABILITIES: &[&str] = &[
    "create-issue",
    "add-comment",
    "add-labels",
    "create-discussion",
    "missing-tool",
    "noop",
];

fn shape_strategy() -> impl Strategy<Value = WorkflowShape> {
    (
        proptest::sample::select(vec!["issues", "pull_request", "schedule", "workflow_dispatch"]),
        any::<bool>(),
        proptest::option::of(1u32..200),
        proptest::option::of(1u32..10),
        any::<bool>(),
        any::<bool>(),
        0usize..4,
        proptest::sample::subsequence(CAPABILITIES.to_vec(), 0..=CAPABILITIES.len()),
        any::<bool>(),
    )
        .prop_map(
            |(
                event,
                roles_all,
                stop_after,
                rate_limit,
                skip_if_match,
                command,
                custom_jobs,
                capabilities,
                threat_detection,
            )| WorkflowShape {
                event,
                roles_all,
                stop_after,
                rate_limit,
                skip_if_match,
                command,
                custom_jobs,
                capabilities,
                threat_detection,
            },
        )
}

impl WorkflowShape {
    fn source(&self) -> String {
        let mut fm = String::from("on:\n");
        if self.command {
            fm.push_str("  command: bot\n");
        } else if self.event == "schedule" {
            fm.push_str("  schedule:\n    - cron: '0 6 * * *'\n");
        } else {
            fm.push_str(&format!("  {}:\n", self.event));
        }
        if let Some(hours) = self.stop_after {
            fm.push_str(&format!("  stop-after: +{hours}h\n"));
        }
        if self.skip_if_match {
            fm.push_str("  skip-if-match: 'is:issue is:open label:done'\n");
        }
        if self.roles_all {
            fm.push_str("roles: all\n");
        }
        if let Some(max) = self.rate_limit {
            fm.push_str(&format!("rate-limit:\n  max: {max}\n"));
        }
        if self.custom_jobs > 0 {
            fm.push_str("jobs:\n");
            for i in 0..self.custom_jobs {
                fm.push_str(&format!("  step_{i}:\n    steps:\n      - id: out\n"));
                if i == 0 {
                    fm.push_str("        run: echo ok=true >> $GITHUB_OUTPUT\n");
                } else {
                    let previous = i - 1;
                    fm.push_str(&format!(
                        "        run: echo ${{{{ needs.step_{previous}.outputs.ok }}}}\n"
                    ));
                }
                fm.push_str("    outputs:\n      ok: ${{ steps.out.outputs.ok }}\n");
            }
        }
        if !self.capabilities.is_empty() {
            fm.push_str("safe-outputs:\n");
            for capability in &self.capabilities {
                fm.push_str(&format!("  {capability}:\n"));
            }
            fm.push_str(&format!("  threat-detection: {}\n", self.threat_detection));
        }
        format!("---\n{fm}---\nDo the work for ${{{{ github.repository }}}}.\n")
    }

    fn expected_checks(&self) -> usize {
        let safe_only = !self.command && matches!(self.event, "schedule" | "workflow_dispatch");
        usize::from(!self.roles_all && !safe_only)
            + usize::from(self.rate_limit.is_some())
            + usize::from(self.stop_after.is_some())
            + usize::from(self.skip_if_match)
            + usize::from(self.command)
    }
}

fn compile(source: &str) -> CompiledWorkflow {
    Compiler::new(Arc::new(SchemaCache::new()))
        .compile(
            "generated",
            source,
            &NoImports,
            &CompileOptions::at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        )
        .unwrap()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_graph_is_acyclic_and_needs_resolve(shape in shape_strategy()) {
        let compiled = compile(&shape.source());
        let graph = &compiled.graph;
        prop_assert!(graph.is_acyclic());

        let names: Vec<&str> = graph.names().collect();
        for (position, job) in graph.jobs().enumerate() {
            for need in &job.needs {
                let index = names.iter().position(|name| name == need);
                prop_assert!(index.is_some_and(|index| index < position), "{} -> {}", job.name, need);
            }
        }
    }

    #[test]
    fn prop_gate_folds_exactly_the_configured_checks(shape in shape_strategy()) {
        let compiled = compile(&shape.source());
        let expected = shape.expected_checks();
        match compiled.graph.get("pre_activation") {
            None => prop_assert_eq!(expected, 0),
            Some(gate) => {
                prop_assert_eq!(gate.steps.len(), expected);
                let folded = gate
                    .steps
                    .iter()
                    .map(|step| {
                        let id = step.id.clone().unwrap_or_default();
                        let output = match id.as_str() {
                            "check_membership" => "is_team_member",
                            "check_rate_limit" => "rate_limit_ok",
                            "check_stop_time" => "stop_time_ok",
                            "check_skip_if_match" => "skip_check_ok",
                            _ => "command_position_ok",
                        };
                        format!("steps.{id}.outputs.{output} == 'true'")
                    })
                    .collect::<Vec<_>>()
                    .join(" && ");
                prop_assert_eq!(
                    gate.outputs.get("activated").cloned(),
                    Some(format!("${{{{ {folded} }}}}"))
                );
            }
        }
    }

    #[test]
    fn prop_compilation_is_deterministic(shape in shape_strategy()) {
        let source = shape.source();
        prop_assert_eq!(compile(&source).yaml, compile(&source).yaml);
    }

    #[test]
    fn prop_agent_never_writes(shape in shape_strategy()) {
        let compiled = compile(&shape.source());
        let agent = compiled.graph.get("agent").unwrap();
        prop_assert!(!agent.permissions.has_write());

        let read_only = shape
            .capabilities
            .iter()
            .all(|capability| matches!(*capability, "missing-tool" | "noop"));
        if let Some(job) = compiled.graph.get("safe_outputs") {
            prop_assert_eq!(job.permissions.has_write(), !read_only);
        }
    }
}
