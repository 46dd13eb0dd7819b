//! Filesystem import resolution.

use awc_core::{Error, FragmentResolver};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Resolves `imports:` entries relative to the importing workflow's directory.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    /// Resolver rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolver for the workflow at `path`
    #[must_use]
    pub fn for_workflow(path: &Path) -> Self {
        Self::new(path.parent().unwrap_or_else(|| Path::new(".")))
    }
}

impl FragmentResolver for FsResolver {
    fn resolve(&self, path: &str) -> awc_core::Result<String> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::import(
                path,
                "import paths must stay inside the workflow directory",
            ));
        }

        let full = self.root.join(relative);
        debug!(import = path, file = %full.display(), "Resolving import");
        fs::read_to_string(&full).map_err(|err| Error::import(path, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolves_relative_to_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("shared")).unwrap();
        fs::write(dir.path().join("shared/tone.md"), "Be brief.\n").unwrap();

        let resolver = FsResolver::for_workflow(&dir.path().join("triage.md"));
        assert_eq!(resolver.resolve("shared/tone.md").unwrap(), "Be brief.\n");
    }

    #[test]
    fn test_missing_fragment_is_import_error() {
        let dir = TempDir::new().unwrap();
        let err = FsResolver::new(dir.path()).resolve("nope.md").unwrap_err();
        assert!(matches!(err, Error::Import { .. }));
    }

    #[test]
    fn test_escaping_paths_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = FsResolver::new(dir.path());
        assert!(resolver.resolve("../secrets.md").is_err());
        assert!(resolver.resolve("/etc/passwd").is_err());
    }
}
