use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::protocol::{TfshError, TfshResult};
use super::*;

/// The sandboxed file operations behind every command.
///
/// Each operation takes the caller's current directory (segments below the
/// root) and returns the line to show the client. Nothing is cached between
/// calls; the host filesystem is the only state.
#[derive(Debug, Clone)]
pub struct FileOperations {
    validator: PathValidator,
    root_label: String,
}

impl FileOperations {
    /// Open the sandbox at `root_path`, creating the directory if needed.
    pub fn new(root_path: impl Into<PathBuf>) -> TfshResult<Self> {
        let root_path = root_path.into();
        fs::create_dir_all(&root_path)
            .map_err(|e| TfshError::ConfigError(format!("Failed to create server root {}: {}", root_path.display(), e)))?;

        let validator = PathValidator::new(root_path)?;
        let root_label = validator.root_path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());

        Ok(Self { validator, root_label })
    }

    pub fn root_path(&self) -> &Path {
        self.validator.root_path()
    }

    /// How a directory is shown to clients: the root's name followed by the
    /// session segments.
    pub fn display_path(&self, cwd: &[String]) -> String {
        std::iter::once(self.root_label.as_str())
            .chain(cwd.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn list(&self, cwd: &[String]) -> String {
        let dir = match self.validator.host_path(cwd) {
            Ok(dir) => dir,
            Err(e) => return rejected(e, NO_SUCH_FILE_OR_DIRECTORY),
        };

        match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("\t"),
            Err(e) => host_failure("ls", &dir, e),
        }
    }

    pub fn touch(&self, cwd: &[String], name: &str) -> String {
        self.create(cwd, name, |path| {
            OpenOptions::new().write(true).create_new(true).open(path).map(|_| ())
        })
    }

    pub fn mkdir(&self, cwd: &[String], name: &str) -> String {
        self.create(cwd, name, |path| fs::create_dir(path))
    }

    fn create<F>(&self, cwd: &[String], name: &str, create: F) -> String
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let path = match self.validator.resolve(cwd, name) {
            Ok(path) => path,
            Err(e) => return rejected(e, NO_SUCH_FILE_OR_DIRECTORY),
        };

        if path.symlink_metadata().is_ok() {
            return format!("{} already exists", name);
        }

        match create(&path) {
            Ok(()) => format!("{} was created successfully", name),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => format!("{} already exists", name),
            Err(e) => host_failure("create", &path, e),
        }
    }

    /// Change `cwd` in place. `..` climbs one segment but never above the root.
    pub fn cd(&self, cwd: &mut Vec<String>, target: &str) -> String {
        if target == ".." {
            if cwd.pop().is_none() {
                return format!("Current directory is root - {}", self.display_path(cwd));
            }
            return format!("Dir was changed to {}", self.display_path(cwd));
        }

        let segments = match self.validator.join_segments(cwd, target) {
            Ok(segments) => segments,
            Err(e) => return rejected(e, NO_SUCH_DIRECTORY),
        };

        match self.validator.host_path(&segments) {
            Ok(path) if path.is_dir() => {
                *cwd = segments;
                format!("Dir was changed to {}", self.display_path(cwd))
            }
            Ok(_) => NO_SUCH_DIRECTORY.to_string(),
            Err(e) => rejected(e, NO_SUCH_DIRECTORY),
        }
    }

    /// Delete a file, or an empty directory.
    pub fn rm(&self, cwd: &[String], name: &str) -> String {
        let path = match self.validator.resolve(cwd, name) {
            Ok(path) => path,
            Err(e) => return rejected(e, NO_SUCH_FILE_OR_DIRECTORY),
        };

        let metadata = match path.symlink_metadata() {
            Ok(metadata) => metadata,
            Err(_) => return NO_SUCH_FILE_OR_DIRECTORY.to_string(),
        };

        let result = if metadata.is_dir() {
            match fs::read_dir(&path) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        return DIRECTORY_NOT_EMPTY.to_string();
                    }
                    fs::remove_dir(&path)
                }
                Err(e) => Err(e),
            }
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => FILE_DELETED.to_string(),
            Err(e) => host_failure("rm", &path, e),
        }
    }

    /// Copy a file, creating or overwriting the destination.
    pub fn copy(&self, cwd: &[String], source: Option<&str>, destination: Option<&str>) -> String {
        let source = match source.map(|source| self.validator.resolve(cwd, source)) {
            Some(Ok(path)) => path,
            Some(Err(e)) => return rejected(e, SOURCE_DOES_NOT_EXIST),
            None => return SOURCE_DOES_NOT_EXIST.to_string(),
        };

        if !source.exists() {
            return SOURCE_DOES_NOT_EXIST.to_string();
        }
        if !source.is_file() {
            return SOURCE_NOT_A_FILE.to_string();
        }

        let destination = match destination.map(|destination| self.validator.resolve(cwd, destination)) {
            Some(Ok(path)) => path,
            Some(Err(e)) => return rejected(e, DESTINATION_DOES_NOT_EXIST),
            None => return DESTINATION_DOES_NOT_EXIST.to_string(),
        };

        // Copying a file onto itself would truncate it first
        if same_file(&source, &destination) {
            return COPY_CREATED.to_string();
        }

        match fs::copy(&source, &destination) {
            Ok(_) => COPY_CREATED.to_string(),
            Err(e) => host_failure("copy", &destination, e),
        }
    }

    pub fn cat(&self, cwd: &[String], name: &str) -> String {
        let path = match self.validator.resolve(cwd, name) {
            Ok(path) => path,
            Err(e) => return rejected(e, FILE_DOES_NOT_EXIST),
        };

        if !path.is_file() {
            return FILE_DOES_NOT_EXIST.to_string();
        }

        match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => host_failure("cat", &path, e),
        }
    }
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn rejected(error: TfshError, message: &str) -> String {
    debug!("Path rejected: {}", error);
    message.to_string()
}

fn host_failure(operation: &str, path: &Path, error: io::Error) -> String {
    warn!("{} failed on {}: {}", operation, path.display(), error);
    NO_SUCH_FILE_OR_DIRECTORY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileOperations) {
        let temp_dir = TempDir::new().unwrap();
        let ops = FileOperations::new(temp_dir.path().join("server")).unwrap();
        (temp_dir, ops)
    }

    #[test]
    fn test_root_is_created() {
        let (temp_dir, ops) = setup();
        assert!(temp_dir.path().join("server").is_dir());
        assert_eq!(ops.display_path(&[]), "server");
    }

    #[test]
    fn test_touch_twice_then_rm() {
        let (_temp_dir, ops) = setup();

        assert_eq!(ops.touch(&[], "x"), "x was created successfully");
        assert_eq!(ops.touch(&[], "x"), "x already exists");
        assert_eq!(ops.rm(&[], "x"), FILE_DELETED);
        assert_eq!(ops.touch(&[], "x"), "x was created successfully");
    }

    #[test]
    fn test_mkdir_and_list() {
        let (_temp_dir, ops) = setup();

        assert_eq!(ops.list(&[]), "");
        assert_eq!(ops.mkdir(&[], "docs"), "docs was created successfully");
        assert_eq!(ops.mkdir(&[], "docs"), "docs already exists");
        ops.touch(&[], "a.txt");

        let listing = ops.list(&[]);
        let mut names: Vec<&str> = listing.split('\t').collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "docs"]);
    }

    #[test]
    fn test_cd_never_leaves_root() {
        let (_temp_dir, ops) = setup();
        ops.mkdir(&[], "docs");

        let mut cwd = Vec::new();
        assert_eq!(ops.cd(&mut cwd, "docs"), "Dir was changed to server/docs");
        assert_eq!(cwd, vec!["docs".to_string()]);

        assert_eq!(ops.cd(&mut cwd, ".."), "Dir was changed to server");
        for _ in 0..3 {
            assert_eq!(ops.cd(&mut cwd, ".."), "Current directory is root - server");
            assert!(cwd.is_empty());
        }
    }

    #[test]
    fn test_cd_rejects_missing_files_and_traversal() {
        let (_temp_dir, ops) = setup();
        ops.touch(&[], "file.txt");

        let mut cwd = Vec::new();
        assert_eq!(ops.cd(&mut cwd, "nowhere"), NO_SUCH_DIRECTORY);
        assert_eq!(ops.cd(&mut cwd, "file.txt"), NO_SUCH_DIRECTORY);
        assert_eq!(ops.cd(&mut cwd, ""), NO_SUCH_DIRECTORY);
        assert_eq!(ops.cd(&mut cwd, "../.."), NO_SUCH_DIRECTORY);
        assert_eq!(ops.cd(&mut cwd, "/tmp"), NO_SUCH_DIRECTORY);
        assert!(cwd.is_empty());
    }

    #[test]
    fn test_nested_cd_and_relative_operations() {
        let (_temp_dir, ops) = setup();
        ops.mkdir(&[], "a");
        ops.mkdir(&["a".to_string()], "b");

        let mut cwd = Vec::new();
        assert_eq!(ops.cd(&mut cwd, "a/b"), "Dir was changed to server/a/b");
        assert_eq!(ops.touch(&cwd, "deep.txt"), "deep.txt was created successfully");
        assert!(ops.root_path().join("a").join("b").join("deep.txt").is_file());
    }

    #[test]
    fn test_cat() {
        let (_temp_dir, ops) = setup();

        ops.touch(&[], "empty.txt");
        assert_eq!(ops.cat(&[], "empty.txt"), "");
        assert_eq!(ops.cat(&[], "missing.txt"), FILE_DOES_NOT_EXIST);

        fs::write(ops.root_path().join("note.txt"), "line one\nline two\n").unwrap();
        assert_eq!(ops.cat(&[], "note.txt"), "line one\nline two\n");

        ops.mkdir(&[], "dir");
        assert_eq!(ops.cat(&[], "dir"), FILE_DOES_NOT_EXIST);
    }

    #[test]
    fn test_copy_creates_missing_destination() {
        let (_temp_dir, ops) = setup();
        fs::write(ops.root_path().join("a"), "payload").unwrap();

        assert_eq!(ops.copy(&[], Some("a"), Some("b")), COPY_CREATED);
        assert_eq!(ops.cat(&[], "b"), "payload");

        fs::write(ops.root_path().join("a"), "changed").unwrap();
        assert_eq!(ops.copy(&[], Some("a"), Some("b")), COPY_CREATED);
        assert_eq!(ops.cat(&[], "b"), "changed");
    }

    #[test]
    fn test_copy_onto_itself_keeps_content() {
        let (_temp_dir, ops) = setup();
        fs::write(ops.root_path().join("a"), "payload").unwrap();

        assert_eq!(ops.copy(&[], Some("a"), Some("a")), COPY_CREATED);
        assert_eq!(ops.copy(&[], Some("a"), Some("./a")), COPY_CREATED);
        assert_eq!(ops.cat(&[], "a"), "payload");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_onto_hard_link_keeps_content() {
        let (_temp_dir, ops) = setup();
        fs::write(ops.root_path().join("a"), "payload").unwrap();
        fs::hard_link(ops.root_path().join("a"), ops.root_path().join("b")).unwrap();

        assert_eq!(ops.copy(&[], Some("b"), Some("a")), COPY_CREATED);
        assert_eq!(ops.cat(&[], "a"), "payload");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_through_dangling_symlink_stays_inside() {
        let (temp_dir, ops) = setup();
        let outside = temp_dir.path().join("outside.txt");
        fs::write(ops.root_path().join("a"), "payload").unwrap();
        std::os::unix::fs::symlink(&outside, ops.root_path().join("link")).unwrap();

        assert_eq!(ops.copy(&[], Some("a"), Some("link")), DESTINATION_DOES_NOT_EXIST);
        assert!(!outside.exists());
    }

    #[test]
    fn test_copy_failures() {
        let (_temp_dir, ops) = setup();
        ops.touch(&[], "a");
        ops.mkdir(&[], "dir");

        assert_eq!(ops.copy(&[], None, None), SOURCE_DOES_NOT_EXIST);
        assert_eq!(ops.copy(&[], Some("missing"), Some("b")), SOURCE_DOES_NOT_EXIST);
        assert_eq!(ops.copy(&[], Some("a"), None), DESTINATION_DOES_NOT_EXIST);
        assert_eq!(ops.copy(&[], Some("dir"), Some("b")), SOURCE_NOT_A_FILE);
        assert_eq!(ops.copy(&[], Some("a"), Some("../escape")), DESTINATION_DOES_NOT_EXIST);
    }

    #[test]
    fn test_rm_directories() {
        let (_temp_dir, ops) = setup();
        ops.mkdir(&[], "full");
        ops.touch(&["full".to_string()], "inner.txt");
        ops.mkdir(&[], "empty");

        assert_eq!(ops.rm(&[], "full"), DIRECTORY_NOT_EMPTY);
        assert!(ops.root_path().join("full").is_dir());
        assert_eq!(ops.rm(&[], "empty"), FILE_DELETED);
        assert_eq!(ops.rm(&[], "empty"), NO_SUCH_FILE_OR_DIRECTORY);
    }

    #[test]
    fn test_traversal_is_reported_as_missing() {
        let (temp_dir, ops) = setup();
        fs::write(temp_dir.path().join("outside.txt"), "secret").unwrap();

        assert_eq!(ops.cat(&[], "../outside.txt"), FILE_DOES_NOT_EXIST);
        assert_eq!(ops.rm(&[], "../outside.txt"), NO_SUCH_FILE_OR_DIRECTORY);
        assert_eq!(ops.touch(&[], "../new.txt"), NO_SUCH_FILE_OR_DIRECTORY);
        assert!(temp_dir.path().join("outside.txt").exists());
        assert!(!temp_dir.path().join("new.txt").exists());
    }

    #[test]
    fn test_touch_in_missing_directory_does_not_leak_io_errors() {
        let (_temp_dir, ops) = setup();
        assert_eq!(ops.touch(&[], "nope/file.txt"), NO_SUCH_FILE_OR_DIRECTORY);
    }
}
