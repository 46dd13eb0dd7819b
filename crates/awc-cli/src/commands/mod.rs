//! `awc compile` and `awc validate`.
//!
//! Both commands run the same pipeline over every discovered workflow, in
//! parallel with rayon and sharing one schema cache; `compile` additionally
//! writes the lock file.

pub mod compile;
pub mod resolver;
pub mod validate;

use crate::cli::{CliError, SourceArgs};
use awc_core::SchemaCache;
use awc_github::{CompileOptions, CompiledWorkflow, Compiler, ConformanceOracle, JsonSchemaOracle};
use chrono::{DateTime, Utc};
use miette::Report;
use rayon::prelude::*;
use resolver::FsResolver;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Extension of workflow sources.
pub const SOURCE_EXTENSION: &str = "md";

/// Suffix of compiled workflows.
pub const LOCK_SUFFIX: &str = ".lock.yml";

/// Result of processing one workflow file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub jobs: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub error: Option<Report>,
}

impl FileReport {
    fn succeeded(path: &Path, output: Option<&Path>, compiled: &CompiledWorkflow) -> Self {
        Self {
            path: path.display().to_string(),
            output: output.map(|output| output.display().to_string()),
            jobs: compiled.graph.names().map(str::to_string).collect(),
            warnings: compiled.warnings.clone(),
            message: None,
            error: None,
        }
    }

    fn failed(path: &Path, error: Report) -> Self {
        Self {
            path: path.display().to_string(),
            output: None,
            jobs: Vec::new(),
            warnings: Vec::new(),
            message: Some(error.to_string()),
            error: Some(error),
        }
    }

    /// Whether the workflow compiled
    #[must_use]
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Expand the given paths into workflow files.
///
/// Directories contribute their `*.md` files (not recursively), sorted by
/// name; files are taken as given.
///
/// # Errors
///
/// Returns [`CliError::Config`] when a path does not exist, a directory
/// cannot be read, or nothing is found at all.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = fs::read_dir(path).map_err(|err| {
                CliError::config(format!("Cannot read directory {}: {err}", path.display()))
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|entry| {
                    entry.is_file()
                        && entry.extension().and_then(|ext| ext.to_str()) == Some(SOURCE_EXTENSION)
                })
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(CliError::config(format!("{} does not exist", path.display())));
        }
    }

    if files.is_empty() {
        return Err(CliError::config_with_help(
            "No workflow files found",
            format!("Pass a workflow file or a directory containing *.{SOURCE_EXTENSION} files"),
        ));
    }
    Ok(files)
}

/// Workflow id: the file name without its extension.
#[must_use]
pub fn workflow_id(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "workflow".to_string(), |stem| stem.to_string_lossy().into_owned())
}

/// Where the lock file for `source` goes.
#[must_use]
pub fn lock_path(source: &Path, output_dir: Option<&Path>) -> PathBuf {
    let dir = output_dir
        .or_else(|| source.parent())
        .unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}{LOCK_SUFFIX}", workflow_id(source)))
}

/// Load the conformance schema named on the command line.
///
/// # Errors
///
/// Returns [`CliError::Config`] if the file is unreadable or not a valid schema.
pub fn load_oracle(path: &Path) -> Result<JsonSchemaOracle, CliError> {
    let text = fs::read_to_string(path).map_err(|err| {
        CliError::config(format!("Cannot read schema {}: {err}", path.display()))
    })?;
    JsonSchemaOracle::from_json(&text)
        .map_err(|err| CliError::config(format!("Invalid schema {}: {err}", path.display())))
}

/// Everything one run needs besides the file list.
#[derive(Debug)]
struct Pipeline<'a> {
    schema: Arc<SchemaCache>,
    now: DateTime<Utc>,
    oracle: Option<&'a JsonSchemaOracle>,
    output_dir: Option<&'a Path>,
    write: bool,
}

impl Pipeline<'_> {
    fn process(&self, path: &Path) -> FileReport {
        match self.try_process(path) {
            Ok(report) => report,
            Err(error) => {
                debug!(path = %path.display(), "Workflow failed");
                FileReport::failed(path, error)
            }
        }
    }

    fn try_process(&self, path: &Path) -> miette::Result<FileReport> {
        let source = fs::read_to_string(path)
            .map_err(|err| miette::miette!("Failed to read {}: {err}", path.display()))?;

        let compiler = Compiler::new(Arc::clone(&self.schema));
        let options = CompileOptions::at(self.now).with_source_path(path.display().to_string());
        let compiled = compiler.compile(
            &workflow_id(path),
            &source,
            &FsResolver::for_workflow(path),
            &options,
        )?;
        for warning in &compiled.warnings {
            warn!(path = %path.display(), "{warning}");
        }

        if let Some(oracle) = self.oracle {
            let report = oracle.check(&compiled.yaml);
            if !report.passed() {
                return Err(miette::miette!(
                    "{} does not conform to the workflow schema:\n  {}",
                    path.display(),
                    report.diagnostics.join("\n  ")
                ));
            }
        }

        if !self.write {
            return Ok(FileReport::succeeded(path, None, &compiled));
        }
        let output = lock_path(path, self.output_dir);
        fs::write(&output, &compiled.yaml)
            .map_err(|err| miette::miette!("Failed to write {}: {err}", output.display()))?;
        Ok(FileReport::succeeded(path, Some(&output), &compiled))
    }
}

/// Run the pipeline over every workflow named by `args`.
///
/// # Errors
///
/// Returns [`CliError::Config`] for unusable arguments. Per-file failures are
/// reported, not returned.
#[instrument(name = "run_workflows", skip(args))]
fn run(
    args: &SourceArgs,
    output_dir: Option<&Path>,
    write: bool,
) -> Result<Vec<FileReport>, CliError> {
    let files = discover(&args.paths)?;
    let oracle = args.schema.as_deref().map(load_oracle).transpose()?;
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir).map_err(|err| {
            CliError::config(format!("Cannot create output directory {}: {err}", dir.display()))
        })?;
    }

    let pipeline = Pipeline {
        schema: Arc::new(SchemaCache::new()),
        now: args.now.unwrap_or_else(Utc::now),
        oracle: oracle.as_ref(),
        output_dir,
        write,
    };
    debug!(files = files.len(), now = %pipeline.now, "Processing workflows");

    Ok(files.par_iter().map(|path| pipeline.process(path)).collect())
}

/// Print every report and turn failures into an exit status.
///
/// # Errors
///
/// Returns [`CliError::Failed`] when any workflow failed.
#[allow(clippy::print_stdout, clippy::print_stderr)]
fn summarize(reports: &[FileReport], json: bool, verb: &str) -> Result<(), CliError> {
    for report in reports {
        if json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(err) => eprintln!("Error serializing result for {}: {err}", report.path),
            }
            continue;
        }

        match &report.error {
            Some(error) => eprintln!("{error:?}"),
            None => {
                for warning in &report.warnings {
                    eprintln!("warning: {}: {warning}", report.path);
                }
                match &report.output {
                    Some(output) => println!("{verb} {} -> {output}", report.path),
                    None => println!("{verb} {} ({} jobs)", report.path, report.jobs.len()),
                }
            }
        }
    }

    let failed = reports.iter().filter(|report| !report.ok()).count();
    if failed > 0 {
        return Err(CliError::Failed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}
