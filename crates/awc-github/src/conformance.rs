//! Conformance checking of emitted workflow YAML.
//!
//! The compiler does not ship the Actions workflow schema. Callers hand one
//! to [`JsonSchemaOracle`], or plug in their own [`ConformanceOracle`].

use crate::error::{CompileError, Result};
use jsonschema::Validator;
use serde_json::Value;
use std::fmt;

/// Outcome of a conformance check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConformanceReport {
    /// Human-readable violations; empty when the document conforms
    pub diagnostics: Vec<String>,
}

impl ConformanceReport {
    /// Whether the document conforms
    #[must_use]
    pub fn passed(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Something that can judge serialized workflow YAML.
pub trait ConformanceOracle: fmt::Debug + Send + Sync {
    /// Check one workflow document
    fn check(&self, yaml: &str) -> ConformanceReport;
}

/// Oracle backed by a caller-supplied JSON Schema.
pub struct JsonSchemaOracle {
    validator: Validator,
}

impl fmt::Debug for JsonSchemaOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaOracle").finish_non_exhaustive()
    }
}

impl JsonSchemaOracle {
    /// Compile `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Conformance`] if the schema is invalid.
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema).map_err(|err| CompileError::Conformance {
            message: err.to_string(),
        })?;
        Ok(Self { validator })
    }

    /// Parse and compile a schema given as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Conformance`] if the text is not JSON or the
    /// schema is invalid.
    pub fn from_json(text: &str) -> Result<Self> {
        let schema: Value = serde_json::from_str(text).map_err(|err| CompileError::Conformance {
            message: err.to_string(),
        })?;
        Self::new(&schema)
    }
}

impl ConformanceOracle for JsonSchemaOracle {
    fn check(&self, yaml: &str) -> ConformanceReport {
        let document: Value = match serde_yaml::from_str(yaml) {
            Ok(document) => document,
            Err(err) => {
                return ConformanceReport {
                    diagnostics: vec![format!("not valid YAML: {err}")],
                };
            }
        };

        let diagnostics = self
            .validator
            .iter_errors(&document)
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect();
        ConformanceReport { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_oracle() -> JsonSchemaOracle {
        JsonSchemaOracle::new(&json!({
            "type": "object",
            "required": ["on", "jobs"],
            "properties": {
                "jobs": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "required": ["runs-on"]
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_conforming_document_passes() {
        let report = make_oracle().check("on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n");
        assert!(report.passed(), "{:?}", report.diagnostics);
    }

    #[test]
    fn test_violations_reported_with_paths() {
        let report = make_oracle().check("on: push\njobs:\n  build:\n    steps: []\n");
        assert!(!report.passed());
        assert!(report.diagnostics[0].starts_with("/jobs/build"));
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let report = make_oracle().check("jobs: [unclosed");
        assert!(report.diagnostics[0].starts_with("not valid YAML"));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let err = JsonSchemaOracle::new(&json!({ "type": 12 })).unwrap_err();
        assert!(matches!(err, CompileError::Conformance { .. }));
    }
}
