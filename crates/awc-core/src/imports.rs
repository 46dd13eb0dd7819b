//! Shared workflow fragments pulled in through `imports:`.
//!
//! A fragment is a markdown file with optional frontmatter. Its `env`, `jobs`
//! and `safe-outputs` entries are merged into the importing workflow (the
//! importing workflow wins on key conflicts) and its body is appended to the
//! prompt. A fragment that cannot be resolved, parsed or merged is skipped and
//! reported as a warning; the workflow state before the fragment is kept.

use crate::error::{Error, Result};
use crate::frontmatter::{Document, kind};
use crate::schema::SchemaCache;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Frontmatter keys a fragment may contribute.
pub const MERGEABLE_KEYS: &[&str] = &["env", "jobs", "safe-outputs"];

/// Supplies the text of imported fragments.
///
/// Implementations own all I/O; the compiler core never touches the
/// filesystem itself.
pub trait FragmentResolver {
    /// Return the source text of the fragment at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Import`] when the fragment does not exist or cannot be read.
    fn resolve(&self, path: &str) -> Result<String>;
}

impl<S: std::hash::BuildHasher> FragmentResolver for HashMap<String, String, S> {
    fn resolve(&self, path: &str) -> Result<String> {
        self.get(path)
            .cloned()
            .ok_or_else(|| Error::import(path, "no such fragment"))
    }
}

impl FragmentResolver for BTreeMap<String, String> {
    fn resolve(&self, path: &str) -> Result<String> {
        self.get(path)
            .cloned()
            .ok_or_else(|| Error::import(path, "no such fragment"))
    }
}

/// Resolver for workflows that must not import anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImports;

impl FragmentResolver for NoImports {
    fn resolve(&self, path: &str) -> Result<String> {
        Err(Error::import(path, "imports are not available in this context"))
    }
}

/// Outcome of merging every import into a frontmatter object.
#[derive(Debug, Clone, Default)]
pub struct MergedImports {
    /// Fragment bodies, in import order
    pub bodies: Vec<String>,
    /// One message per skipped fragment
    pub warnings: Vec<String>,
}

/// Merge every fragment named in `imports` into `frontmatter`.
///
/// Each candidate merge is schema-checked before it is kept, so a bad
/// fragment never corrupts the importing workflow.
pub fn merge_imports(
    frontmatter: &mut Map<String, Value>,
    imports: &[String],
    resolver: &dyn FragmentResolver,
    schema: &SchemaCache,
) -> MergedImports {
    let mut merged = MergedImports::default();

    for path in imports {
        match try_merge(frontmatter, path, resolver, schema) {
            Ok((candidate, body)) => {
                debug!(import = %path, "Merged import fragment");
                *frontmatter = candidate;
                if !body.trim().is_empty() {
                    merged.bodies.push(body);
                }
            }
            Err(err) => {
                warn!(import = %path, error = %err, "Skipping import fragment");
                merged.warnings.push(format!("skipped import '{path}': {err}"));
            }
        }
    }

    merged
}

fn try_merge(
    frontmatter: &Map<String, Value>,
    path: &str,
    resolver: &dyn FragmentResolver,
    schema: &SchemaCache,
) -> Result<(Map<String, Value>, String)> {
    let source = resolver.resolve(path)?;
    let doc = Document::split(&source).map_err(|e| Error::import(path, e.to_string()))?;
    let fragment = doc
        .frontmatter_value()
        .map_err(|e| Error::import(path, e.to_string()))?;

    let mut candidate = frontmatter.clone();
    for (key, value) in fragment {
        if !MERGEABLE_KEYS.contains(&key.as_str()) {
            return Err(Error::import(
                path,
                format!("fragments may only declare {}, found '{key}'", MERGEABLE_KEYS.join(", ")),
            ));
        }
        merge_key(&mut candidate, path, &key, value)?;
    }

    schema
        .validate(&Value::Object(candidate.clone()))
        .map_err(|e| Error::import(path, e.to_string()))?;

    Ok((candidate, doc.body.to_string()))
}

fn merge_key(target: &mut Map<String, Value>, path: &str, key: &str, value: Value) -> Result<()> {
    let Value::Object(incoming) = value else {
        return Err(Error::import(
            path,
            format!("'{key}' must be a mapping, found {}", kind(&value)),
        ));
    };

    let slot = target
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(existing) = slot else {
        return Err(Error::import(
            path,
            format!("cannot merge '{key}' into a non-mapping value"),
        ));
    };

    for (name, entry) in incoming {
        existing.entry(name).or_insert(entry);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frontmatter(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_merge_keeps_importer_values() {
        let mut fm = frontmatter(json!({"on": "issues", "env": {"A": "main"}}));
        let resolver = BTreeMap::from([(
            "shared/env.md".to_string(),
            "---\nenv:\n  A: fragment\n  B: fragment\n---\nShared instructions.\n".to_string(),
        )]);

        let merged = merge_imports(
            &mut fm,
            &["shared/env.md".to_string()],
            &resolver,
            &SchemaCache::new(),
        );

        assert!(merged.warnings.is_empty());
        assert_eq!(fm["env"], json!({"A": "main", "B": "fragment"}));
        assert_eq!(merged.bodies, vec!["Shared instructions.\n".to_string()]);
    }

    #[test]
    fn test_missing_fragment_is_skipped() {
        let mut fm = frontmatter(json!({"on": "issues"}));
        let before = fm.clone();
        let merged = merge_imports(
            &mut fm,
            &["missing.md".to_string()],
            &NoImports,
            &SchemaCache::new(),
        );
        assert_eq!(fm, before);
        assert_eq!(merged.warnings.len(), 1);
        assert!(merged.warnings[0].contains("missing.md"));
    }

    #[test]
    fn test_malformed_fragment_preserves_prior_state() {
        let mut fm = frontmatter(json!({"on": "issues"}));
        let resolver = BTreeMap::from([
            ("good.md".to_string(), "---\nenv:\n  A: one\n---\n".to_string()),
            ("bad-yaml.md".to_string(), "---\nenv: [unclosed\n---\n".to_string()),
            ("bad-key.md".to_string(), "---\nengine: claude\n---\n".to_string()),
            ("bad-type.md".to_string(), "---\nenv:\n  B: [1, 2]\n---\n".to_string()),
        ]);
        let imports: Vec<String> = ["good.md", "bad-yaml.md", "bad-key.md", "bad-type.md"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        let merged = merge_imports(&mut fm, &imports, &resolver, &SchemaCache::new());

        assert_eq!(fm["env"], json!({"A": "one"}));
        assert_eq!(merged.warnings.len(), 3);
    }
}
