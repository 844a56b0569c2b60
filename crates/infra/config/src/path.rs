use std::path::{Path, PathBuf};

/// Resolves INI-style configuration files against a fixed cascade of
/// directories: an explicit override, the current working directory, the
/// user's config directory, then a system-wide fallback. First existing file
/// wins.
#[derive(Debug, Clone)]
pub struct PathResolver {
    search_dirs: Vec<PathBuf>,
}

impl PathResolver {
    #[must_use]
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        let mut search_dirs = Vec::new();
        if let Some(dir) = override_dir {
            search_dirs.push(dir);
        }
        if let Ok(cwd) = std::env::current_dir() {
            search_dirs.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            search_dirs.push(config_dir.join("systemprompt"));
        }
        search_dirs.push(PathBuf::from("/etc/systemprompt"));
        Self { search_dirs }
    }

    /// Returns the first existing path for `relative` across the cascade, if any.
    #[must_use]
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        let relative = relative.as_ref();
        self.search_dirs
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }

    #[must_use]
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("gateway.ini"), "[core]\n").expect("write");
        let resolver = PathResolver::new(Some(dir.path().to_path_buf()));
        assert_eq!(
            resolver.resolve("gateway.ini"),
            Some(dir.path().join("gateway.ini"))
        );
    }

    #[test]
    fn missing_file_resolves_to_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = PathResolver::new(Some(dir.path().to_path_buf()));
        assert_eq!(resolver.resolve("missing.ini"), None);
    }
}
