//! Splitting a workflow source into YAML frontmatter and markdown body.

use crate::error::{Error, Result};
use serde_json::{Map, Value};

const DELIMITER: &str = "---";

/// A workflow source split at its frontmatter delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<'a> {
    /// YAML between the delimiters, empty when the source has no frontmatter
    pub frontmatter: &'a str,
    /// Markdown after the closing delimiter
    pub body: &'a str,
}

impl<'a> Document<'a> {
    /// Split `source`. A source that does not open with `---` is all body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frontmatter`] when the opening delimiter is never closed.
    pub fn split(source: &'a str) -> Result<Self> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);

        let mut lines = source.split_inclusive('\n');
        let Some(first) = lines.next() else {
            return Ok(Self {
                frontmatter: "",
                body: source,
            });
        };
        if first.trim_end() != DELIMITER {
            return Ok(Self {
                frontmatter: "",
                body: source,
            });
        }

        let start = first.len();
        let mut offset = start;
        for line in lines {
            if line.trim_end() == DELIMITER {
                return Ok(Self {
                    frontmatter: &source[start..offset],
                    body: source[offset + line.len()..].trim_start_matches(['\r', '\n']),
                });
            }
            offset += line.len();
        }

        Err(Error::frontmatter("opening '---' has no closing delimiter"))
    }

    /// Parse the frontmatter into a JSON object.
    ///
    /// An empty block yields an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] for malformed YAML and [`Error::Frontmatter`]
    /// when the YAML is not a mapping.
    pub fn frontmatter_value(&self) -> Result<Map<String, Value>> {
        if self.frontmatter.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_yaml::from_str::<Value>(self.frontmatter)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(Error::frontmatter(format!(
                "expected a mapping, found {}",
                kind(&other)
            ))),
        }
    }

    /// Text of the first level-one markdown heading, if any.
    #[must_use]
    pub fn title(&self) -> Option<&'a str> {
        self.body
            .lines()
            .filter_map(|line| line.strip_prefix("# "))
            .map(str::trim)
            .find(|title| !title.is_empty())
    }
}

/// Short name of a JSON value's type, for error messages.
#[must_use]
pub const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
