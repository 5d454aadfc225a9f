//! Expected outcome and size bucket from the corpus directory layout.
//!
//! Two layouts are in use:
//!
//! ```text
//! benchmarks/<size>/<case>                   single-category sets (satisfiable)
//! benchmarks/<size>/<category>/<case>        multi-category sets
//! ```
//!
//! Category detection is a substring match on the directory part of the path,
//! so a segment like `old_unsatisfiable_runs` also marks its cases as
//! unsatisfiable.

use crate::DomainError;
use satbench_types::Category;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseClass {
    pub category: Category,
    pub size_key: String,
}

/// A corpus file with its derived classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkCase {
    pub path: PathBuf,
    pub category: Category,
    pub size_key: String,
}

impl BenchmarkCase {
    pub fn new(path: PathBuf, class: CaseClass) -> Self {
        Self {
            path,
            category: class.category,
            size_key: class.size_key,
        }
    }
}

/// Derive `(category, size_key)` for a case file.
///
/// When a directory named after the category sits above the file, the size key
/// is that directory's parent. Otherwise it is the file's immediate parent.
pub fn classify(path: &Path) -> Result<CaseClass, DomainError> {
    let no_key = || DomainError::NoSizeKey(path.to_path_buf());

    let dir = path.parent().ok_or_else(no_key)?;
    let dir_text = dir.to_string_lossy();

    let category = if dir_text.contains(Category::Unsatisfiable.as_str()) {
        Category::Unsatisfiable
    } else {
        Category::Satisfiable
    };

    let names: Vec<String> = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let size_key = match names.iter().rposition(|n| n.contains(category.as_str())) {
        Some(idx) => idx.checked_sub(1).map(|i| names[i].clone()),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
    };

    let size_key = size_key
        .filter(|k| is_named_dir(k))
        .ok_or_else(no_key)?;

    Ok(CaseClass { category, size_key })
}

fn is_named_dir(name: &str) -> bool {
    !name.is_empty() && name != "/" && name != "." && name != ".."
}
