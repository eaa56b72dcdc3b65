//! Log file naming and directory enumeration.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const NAME_PREFIX: &str = "log";
const NAME_INFIX: &str = ".tokulog";
const INDEX_WIDTH: usize = 12;

/// Parsed name of a log file: `log{index:012}.tokulog{version}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogFileName {
    /// Position of the file in the log sequence.
    pub index: u64,
    /// Format version the file was written with.
    pub version: u32,
}

impl LogFileName {
    /// Creates a name from its parts.
    #[must_use]
    pub const fn new(index: u64, version: u32) -> Self {
        Self { index, version }
    }

    /// Parses a file name, returning `None` for anything that is not a log
    /// file.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(NAME_PREFIX)?;
        let (index, version) = rest.split_once(NAME_INFIX)?;
        if index.len() != INDEX_WIDTH || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            index: index.parse().ok()?,
            version: version.parse().ok()?,
        })
    }

    /// Returns the file name.
    #[must_use]
    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LogFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{NAME_PREFIX}{:0width$}{NAME_INFIX}{}",
            self.index,
            self.version,
            width = INDEX_WIDTH
        )
    }
}

/// Returns `dir` as an absolute path, prefixing the working directory when
/// it is relative.
///
/// # Errors
///
/// Returns an error if the working directory cannot be determined.
pub fn absolute_dir(dir: &Path) -> CoreResult<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

/// The log files of one directory, oldest first.
///
/// The set is a snapshot: files created after it was built are not seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileSet {
    dir: PathBuf,
    names: Vec<LogFileName>,
}

impl LogFileSet {
    /// Enumerates every log file in `dir`.
    ///
    /// An empty directory yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory cannot be read.
    pub fn scan(dir: &Path) -> CoreResult<Self> {
        let dir = absolute_dir(dir)?;
        let entries = fs::read_dir(&dir).map_err(|_| CoreError::NotFound { path: dir.clone() })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str().and_then(LogFileName::parse) {
                names.push(name);
            }
        }
        names.sort();

        Ok(Self { dir, names })
    }

    /// A set holding exactly one named file of `dir`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `file_name` is not a log file name and
    /// `NotFound` if the file does not exist.
    pub fn single(dir: &Path, file_name: &str) -> CoreResult<Self> {
        let dir = absolute_dir(dir)?;
        let name = LogFileName::parse(file_name).ok_or_else(|| {
            CoreError::invalid_operation(format!("not a log file name: {file_name}"))
        })?;
        let path = dir.join(file_name);
        if !path.is_file() {
            return Err(CoreError::NotFound { path });
        }
        Ok(Self {
            dir,
            names: vec![name],
        })
    }

    /// Returns the (absolute) directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file names, oldest first.
    #[must_use]
    pub fn names(&self) -> &[LogFileName] {
        &self.names
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the directory holds no log file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Full path of the file at `index`.
    #[must_use]
    pub fn path(&self, index: usize) -> PathBuf {
        self.dir.join(self.names[index].to_string())
    }

    /// Name of the newest file, if any.
    #[must_use]
    pub fn newest(&self) -> Option<LogFileName> {
        self.names.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn name_format_and_parse() {
        let name = LogFileName::new(123, 25);
        assert_eq!(name.format(), "log000000000123.tokulog25");
        assert_eq!(LogFileName::parse("log000000000123.tokulog25"), Some(name));
    }

    #[test]
    fn parse_rejects_other_files() {
        for bad in [
            "log123.tokulog25",
            "log000000000123.tokulog",
            "log000000000123.tokulogx",
            "xlog000000000123.tokulog25",
            "log00000000012a.tokulog25",
            "__recovery_lock",
        ] {
            assert_eq!(LogFileName::parse(bad), None, "{bad}");
        }
    }

    #[test]
    fn scan_sorts_by_index_and_ignores_noise() {
        let dir = tempdir().unwrap();
        for name in [
            "log000000000010.tokulog29",
            "log000000000002.tokulog27",
            "notes.txt",
            "log000000000007.tokulog29",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let set = LogFileSet::scan(dir.path()).unwrap();
        let indexes: Vec<u64> = set.names().iter().map(|n| n.index).collect();
        assert_eq!(indexes, vec![2, 7, 10]);
        assert_eq!(set.newest().unwrap().index, 10);
        assert_eq!(set.path(0), dir.path().join("log000000000002.tokulog27"));
    }

    #[test]
    fn scan_of_empty_dir_is_empty() {
        let dir = tempdir().unwrap();
        let set = LogFileSet::scan(dir.path()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn scan_of_missing_dir_is_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            LogFileSet::scan(&missing),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn relative_dirs_become_absolute() {
        let abs = absolute_dir(Path::new("some/logs")).unwrap();
        assert!(abs.is_absolute());
        assert!(abs.ends_with("some/logs"));
    }

    #[test]
    fn single_requires_existing_log_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("log000000000001.tokulog29"), b"").unwrap();

        let set = LogFileSet::single(dir.path(), "log000000000001.tokulog29").unwrap();
        assert_eq!(set.len(), 1);
        assert!(matches!(
            LogFileSet::single(dir.path(), "log000000000002.tokulog29"),
            Err(CoreError::NotFound { .. })
        ));
        assert!(LogFileSet::single(dir.path(), "readme").is_err());
    }
}
