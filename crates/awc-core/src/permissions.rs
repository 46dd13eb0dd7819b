//! Job permission model.
//!
//! A [`PermissionSet`] maps each [`Scope`] to a [`Level`]. Sets only ever grow:
//! [`PermissionSet::merge`] takes the pointwise maximum and
//! [`PermissionSet::require`] raises a single scope. Serialization emits scopes
//! in the declaration order of [`Scope`] and omits `none`, so the rendered
//! block is independent of the order requirements were added in.

use crate::error::{Error, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Access scope of the `GITHUB_TOKEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// `actions`
    Actions,
    /// `attestations`
    Attestations,
    /// `checks`
    Checks,
    /// `contents`
    Contents,
    /// `deployments`
    Deployments,
    /// `discussions`
    Discussions,
    /// `id-token`
    IdToken,
    /// `issues`
    Issues,
    /// `models`
    Models,
    /// `packages`
    Packages,
    /// `pages`
    Pages,
    /// `pull-requests`
    PullRequests,
    /// `repository-projects`
    RepositoryProjects,
    /// `security-events`
    SecurityEvents,
    /// `statuses`
    Statuses,
}

impl Scope {
    /// Every scope, in rendering order.
    pub const ALL: [Self; 15] = [
        Self::Actions,
        Self::Attestations,
        Self::Checks,
        Self::Contents,
        Self::Deployments,
        Self::Discussions,
        Self::IdToken,
        Self::Issues,
        Self::Models,
        Self::Packages,
        Self::Pages,
        Self::PullRequests,
        Self::RepositoryProjects,
        Self::SecurityEvents,
        Self::Statuses,
    ];

    /// Name as written in a workflow file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Actions => "actions",
            Self::Attestations => "attestations",
            Self::Checks => "checks",
            Self::Contents => "contents",
            Self::Deployments => "deployments",
            Self::Discussions => "discussions",
            Self::IdToken => "id-token",
            Self::Issues => "issues",
            Self::Models => "models",
            Self::Packages => "packages",
            Self::Pages => "pages",
            Self::PullRequests => "pull-requests",
            Self::RepositoryProjects => "repository-projects",
            Self::SecurityEvents => "security-events",
            Self::Statuses => "statuses",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| Error::UnknownScope {
                scope: s.to_string(),
            })
    }
}

/// Access level for one scope, ordered `None < Read < Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    /// No access
    #[default]
    None,
    /// Read access
    Read,
    /// Read and write access
    Write,
}

impl Level {
    /// Name as written in a workflow file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    fn parse(scope: &str, level: &str) -> Result<Self> {
        match level {
            "none" => Ok(Self::None),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(Error::InvalidLevel {
                scope: scope.to_string(),
                level: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulated permission grant for one job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSet {
    levels: BTreeMap<Scope, Level>,
}

impl PermissionSet {
    /// An empty grant (renders as `{}`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The floor every compiled job receives: `contents: read`.
    #[must_use]
    pub fn with_contents_read() -> Self {
        Self::new().with(Scope::Contents, Level::Read)
    }

    /// Every scope at `level`.
    #[must_use]
    pub fn all(level: Level) -> Self {
        Scope::ALL
            .into_iter()
            .fold(Self::new(), |set, scope| set.with(scope, level))
    }

    /// Builder form of [`PermissionSet::require`].
    #[must_use]
    pub fn with(mut self, scope: Scope, level: Level) -> Self {
        self.require(scope, level);
        self
    }

    /// Raise `scope` to at least `level`. Never lowers an existing grant.
    pub fn require(&mut self, scope: Scope, level: Level) {
        if level == Level::None {
            return;
        }
        let entry = self.levels.entry(scope).or_default();
        *entry = (*entry).max(level);
    }

    /// Pointwise maximum of `self` and `other`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.absorb(other);
        merged
    }

    /// In-place [`PermissionSet::merge`].
    pub fn absorb(&mut self, other: &Self) {
        for (&scope, &level) in &other.levels {
            self.require(scope, level);
        }
    }

    /// Level granted for `scope`.
    #[must_use]
    pub fn level(&self, scope: Scope) -> Level {
        self.levels.get(&scope).copied().unwrap_or_default()
    }

    /// Whether any scope is granted `write`.
    #[must_use]
    pub fn has_write(&self) -> bool {
        self.levels.values().any(|&level| level == Level::Write)
    }

    /// Scopes granted `write`, in rendering order.
    pub fn write_scopes(&self) -> impl Iterator<Item = Scope> + '_ {
        self.levels
            .iter()
            .filter(|&(_, &level)| level == Level::Write)
            .map(|(&scope, _)| scope)
    }

    /// Granted scopes in rendering order.
    pub fn iter(&self) -> impl Iterator<Item = (Scope, Level)> + '_ {
        self.levels
            .iter()
            .filter(|&(_, &level)| level != Level::None)
            .map(|(&scope, &level)| (scope, level))
    }

    /// Whether nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Parse a frontmatter `permissions:` value.
    ///
    /// Accepts `read-all`, `write-all`, an empty map or a scope map. The
    /// shorthand `all` scope inside a map sets every scope at once; explicit
    /// scopes in the same map then raise individual entries.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown scopes, unknown levels and values that are
    /// neither a string nor a map.
    pub fn from_frontmatter(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) if s == "read-all" => Ok(Self::all(Level::Read)),
            Value::String(s) if s == "write-all" => Ok(Self::all(Level::Write)),
            Value::String(other) => Err(Error::configuration(
                "permissions",
                format!("expected 'read-all', 'write-all' or a scope map, found '{other}'"),
            )),
            Value::Null => Ok(Self::new()),
            Value::Object(map) => {
                let mut set = Self::new();
                for (scope, level) in map {
                    let Some(level) = level.as_str() else {
                        return Err(Error::InvalidLevel {
                            scope: scope.clone(),
                            level: level.to_string(),
                        });
                    };
                    let level = Level::parse(scope, level)?;
                    if scope == "all" {
                        set.absorb(&Self::all(level));
                    } else {
                        set.require(scope.parse()?, level);
                    }
                }
                Ok(set)
            }
            other => Err(Error::configuration(
                "permissions",
                format!("expected a string or a map, found {other}"),
            )),
        }
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let granted: Vec<_> = self.iter().collect();
        let mut map = serializer.serialize_map(Some(granted.len()))?;
        for (scope, level) in granted {
            map.serialize_entry(scope.as_str(), level.as_str())?;
        }
        map.end()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .iter()
            .map(|(scope, level)| format!("{scope}: {level}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{{{rendered}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_never_lowers() {
        let mut set = PermissionSet::new().with(Scope::Issues, Level::Write);
        set.require(Scope::Issues, Level::Read);
        set.require(Scope::Issues, Level::None);
        assert_eq!(set.level(Scope::Issues), Level::Write);
    }

    #[test]
    fn test_merge_is_pointwise_max() {
        let a = PermissionSet::with_contents_read().with(Scope::Issues, Level::Write);
        let b = PermissionSet::new()
            .with(Scope::Contents, Level::Write)
            .with(Scope::Issues, Level::Read);
        let merged = a.merge(&b);
        assert_eq!(merged.level(Scope::Contents), Level::Write);
        assert_eq!(merged.level(Scope::Issues), Level::Write);
        assert_eq!(merged.level(Scope::Actions), Level::None);
    }

    #[test]
    fn test_serialize_in_fixed_order() {
        let set = PermissionSet::new()
            .with(Scope::Statuses, Level::Read)
            .with(Scope::PullRequests, Level::Write)
            .with(Scope::Contents, Level::Read)
            .with(Scope::Actions, Level::Read);
        let yaml = serde_yaml::to_string(&set).unwrap();
        assert_eq!(
            yaml,
            "actions: read\ncontents: read\npull-requests: write\nstatuses: read\n"
        );
    }

    #[test]
    fn test_empty_serializes_as_empty_map() {
        assert_eq!(serde_json::to_string(&PermissionSet::new()).unwrap(), "{}");
    }

    #[test]
    fn test_from_frontmatter_shorthands() {
        let read = PermissionSet::from_frontmatter(&json!("read-all")).unwrap();
        assert!(Scope::ALL.iter().all(|&s| read.level(s) == Level::Read));

        let write = PermissionSet::from_frontmatter(&json!("write-all")).unwrap();
        assert!(write.has_write());

        assert!(PermissionSet::from_frontmatter(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_from_frontmatter_map() {
        let set = PermissionSet::from_frontmatter(&json!({
            "issues": "write",
            "contents": "read",
            "actions": "none",
        }))
        .unwrap();
        assert_eq!(set.to_string(), "{contents: read, issues: write}");
    }

    #[test]
    fn test_from_frontmatter_rejects_unknown() {
        assert!(matches!(
            PermissionSet::from_frontmatter(&json!({"wiki": "read"})),
            Err(Error::UnknownScope { .. })
        ));
        assert!(matches!(
            PermissionSet::from_frontmatter(&json!({"issues": "admin"})),
            Err(Error::InvalidLevel { .. })
        ));
        assert!(PermissionSet::from_frontmatter(&json!("read")).is_err());
    }

    #[test]
    fn test_scope_round_trip() {
        for scope in Scope::ALL {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
    }
}
