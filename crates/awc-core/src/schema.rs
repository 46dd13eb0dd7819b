//! Compiled frontmatter schema, built once and shared.
//!
//! The schema document is generated from [`RawFrontmatter`] with `schemars`
//! and compiled with `jsonschema` the first time it is needed. A
//! [`SchemaCache`] is an explicit value owned by the caller; wrap it in an
//! `Arc` to share one compiled schema across concurrent compilations.

use crate::error::{Error, Result};
use crate::raw::RawFrontmatter;
use jsonschema::Validator;
use schemars::schema_for;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Initialize-once holder of the compiled frontmatter schema.
#[derive(Default)]
pub struct SchemaCache {
    compiled: OnceLock<std::result::Result<Validator, String>>,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl SchemaCache {
    /// An empty cache; the schema is compiled on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The generated JSON schema document.
    #[must_use]
    pub fn document() -> Value {
        schema_for!(RawFrontmatter).to_value()
    }

    /// Whether the schema has been compiled yet.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn validator(&self) -> Result<&Validator> {
        self.compiled
            .get_or_init(|| {
                debug!("Compiling frontmatter schema");
                jsonschema::validator_for(&Self::document()).map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|message| Error::SchemaCompile {
                message: message.clone(),
            })
    }

    /// Validate a frontmatter object, reporting every violation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] listing all violations, or
    /// [`Error::SchemaCompile`] if the schema itself cannot be compiled.
    pub fn validate(&self, frontmatter: &Value) -> Result<()> {
        let violations: Vec<String> = self
            .validator()?
            .iter_errors(frontmatter)
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Schema { violations })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_document_describes_frontmatter_keys() {
        let doc = SchemaCache::document();
        let properties = doc["properties"].as_object().unwrap();
        for key in ["on", "if", "safe-outputs", "rate-limit", "timeout-minutes", "jobs"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_lazy_initialization() {
        let cache = SchemaCache::new();
        assert!(!cache.is_initialized());
        cache.validate(&json!({"on": "issues"})).unwrap();
        assert!(cache.is_initialized());
    }

    #[test]
    fn test_collects_all_violations() {
        let cache = SchemaCache::new();
        let err = cache
            .validate(&json!({
                "timeout-minutes": "soon",
                "strict": "yes",
                "unknown-key": 1,
            }))
            .unwrap_err();
        let Error::Schema { violations } = err else {
            panic!("expected schema error");
        };
        assert!(violations.len() >= 3, "{violations:?}");
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(SchemaCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.validate(&json!({"name": "x"})).is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
