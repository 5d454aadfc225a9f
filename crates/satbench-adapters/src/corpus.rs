use crate::AdapterError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file under `root`, in a stable (sorted) order.
///
/// A missing or unreadable root, or any directory that cannot be listed, is an
/// error.
pub fn discover_cases(root: &Path) -> Result<Vec<PathBuf>, AdapterError> {
    let meta = std::fs::metadata(root).map_err(|source| AdapterError::CorpusUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(AdapterError::CorpusUnreadable {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        });
    }

    let mut cases = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            AdapterError::CorpusUnreadable {
                path,
                source: err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            }
        })?;
        if entry.file_type().is_file() {
            cases.push(entry.into_path());
        }
    }
    Ok(cases)
}

/// Full contents of one case file, passed to the solver untouched.
pub fn read_case(path: &Path) -> Result<Vec<u8>, AdapterError> {
    std::fs::read(path).map_err(|source| AdapterError::CaseUnreadable {
        path: path.to_path_buf(),
        source,
    })
}
