use std::path::{Component, Path, PathBuf};
use crate::protocol::{TfshError, TfshResult};

#[derive(Debug, Clone)]
pub struct PathValidator {
    root_path: PathBuf,
}

impl PathValidator {
    pub fn new(root_path: PathBuf) -> TfshResult<Self> {
        let canonical_root = root_path.canonicalize()
            .map_err(|e| TfshError::InvalidPath(format!("Cannot canonicalize root path: {}", e)))?;

        Ok(Self {
            root_path: canonical_root,
        })
    }

    /// Append a client-supplied relative path to `cwd`.
    ///
    /// Only plain names and `.` are accepted. Absolute paths and `..`
    /// segments are refused outright, and so is an argument that names no
    /// entry at all (empty, or only `.`).
    pub fn join_segments(&self, cwd: &[String], argument: &str) -> TfshResult<Vec<String>> {
        let mut segments = cwd.to_vec();
        let mut named = false;

        for component in Path::new(argument).components() {
            match component {
                Component::Normal(name) => {
                    segments.push(name.to_string_lossy().into_owned());
                    named = true;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(TfshError::PermissionDenied(
                        format!("Path '{}' contains parent directory traversal", argument)
                    ));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(TfshError::PermissionDenied(
                        "Absolute paths are not allowed".to_string()
                    ));
                }
            }
        }

        if !named {
            return Err(TfshError::InvalidPath(format!("'{}' does not name an entry", argument)));
        }

        Ok(segments)
    }

    /// Host path for a list of segments, checked against symlink escapes.
    pub fn host_path(&self, segments: &[String]) -> TfshResult<PathBuf> {
        let path = segments.iter().fold(self.root_path.clone(), |path, segment| path.join(segment));
        self.ensure_within_root(&path)?;
        Ok(path)
    }

    /// Resolve `argument` relative to `cwd` into a host path inside the root.
    pub fn resolve(&self, cwd: &[String], argument: &str) -> TfshResult<PathBuf> {
        let segments = self.join_segments(cwd, argument)?;
        self.host_path(&segments)
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn ensure_within_root(&self, path: &Path) -> TfshResult<()> {
        // The target itself may not exist yet; check its closest existing
        // ancestor. A symlink counts as existing even when it dangles, and
        // then fails to canonicalize.
        let mut ancestor = path.to_path_buf();
        loop {
            if ancestor.symlink_metadata().is_ok() {
                let canonical = ancestor.canonicalize()
                    .map_err(|e| TfshError::InvalidPath(format!("Cannot resolve path '{}': {}", ancestor.display(), e)))?;

                if !canonical.starts_with(&self.root_path) {
                    return Err(TfshError::PermissionDenied(
                        format!("Path '{}' is outside the allowed directory", path.display())
                    ));
                }
                return Ok(());
            }

            if !ancestor.pop() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn segments(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_path_validation() {
        let temp_dir = TempDir::new().unwrap();
        let validator = PathValidator::new(temp_dir.path().to_path_buf()).unwrap();

        // Valid relative path, even when it does not exist yet
        let valid_path = validator.resolve(&[], "test.txt").unwrap();
        assert_eq!(valid_path, validator.root_path().join("test.txt"));

        // Invalid path traversal
        let invalid_path = validator.resolve(&[], "../../../etc/passwd");
        assert!(matches!(invalid_path, Err(TfshError::PermissionDenied(_))));

        // Traversal hidden in the middle of a path
        assert!(validator.resolve(&segments(&["a"]), "b/../../x").is_err());
    }

    #[test]
    fn test_absolute_paths_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let validator = PathValidator::new(temp_dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            validator.resolve(&[], "/etc/passwd"),
            Err(TfshError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_empty_argument_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let validator = PathValidator::new(temp_dir.path().to_path_buf()).unwrap();

        assert!(matches!(validator.resolve(&[], ""), Err(TfshError::InvalidPath(_))));
        assert!(matches!(validator.resolve(&[], "./."), Err(TfshError::InvalidPath(_))));
    }

    #[test]
    fn test_segments_are_appended() {
        let temp_dir = TempDir::new().unwrap();
        let validator = PathValidator::new(temp_dir.path().to_path_buf()).unwrap();

        let joined = validator.join_segments(&segments(&["docs"]), "./a/b").unwrap();
        assert_eq!(joined, segments(&["docs", "a", "b"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();

        let validator = PathValidator::new(temp_dir.path().to_path_buf()).unwrap();
        assert!(matches!(
            validator.resolve(&[], "link/secret.txt"),
            Err(TfshError::PermissionDenied(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path().join("missing"), temp_dir.path().join("link")).unwrap();

        let validator = PathValidator::new(temp_dir.path().to_path_buf()).unwrap();
        assert!(validator.resolve(&[], "link").is_err());
        assert!(validator.resolve(&[], "link/child").is_err());
        assert!(validator.resolve(&[], "other").is_ok());
    }
}
