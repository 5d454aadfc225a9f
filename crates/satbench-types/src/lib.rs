//! Shared types for satbench.
//!
//! Design goal: versioned, explicit, boring.
//! These structs describe the benchmark manifest, the optional config file and
//! the report a run leaves behind.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const REPORT_SCHEMA_V1: &str = "satbench.report.v1";

/// Marker a solver prints for a satisfiable instance.
pub const MARKER_SAT: &str = "IS SAT";

/// Marker a solver prints for an unsatisfiable instance.
pub const MARKER_UNSAT: &str = "UNSAT";

/// Expected-result class of a benchmark case.
#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Satisfiable,
    Unsatisfiable,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Satisfiable => "satisfiable",
            Category::Unsatisfiable => "unsatisfiable",
        }
    }

    /// The stdout substring that counts as a correct answer for this category.
    pub fn marker(self) -> &'static str {
        match self {
            Category::Satisfiable => MARKER_SAT,
            Category::Unsatisfiable => MARKER_UNSAT,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown category: {0} (expected satisfiable|unsatisfiable)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "satisfiable" => Ok(Category::Satisfiable),
            "unsatisfiable" => Ok(Category::Unsatisfiable),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

// ----------------------------
// Report
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunMeta {
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub host: HostInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SolverMeta {
    /// argv vector (no shell parsing).
    pub command: Vec<String>,

    /// Optional working directory (stringified path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    pub timeout_secs: f64,
    pub jobs: u32,
}

/// Finalized statistics for one (size key, category) group.
///
/// Times are wall-clock seconds. Timed-out cases contribute the configured
/// timeout to both `average_time` and `median_time`, but are left out of the
/// `accuracy` denominator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GroupSummary {
    pub average_time: f64,
    pub median_time: f64,

    /// Percentage in `0.0..=100.0`.
    pub accuracy: f64,

    pub total: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub timeouts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BenchReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunMeta,
    pub solver: SolverMeta,

    /// Corpus root the cases were discovered under.
    pub corpus: String,

    /// Number of cases recorded into `results`.
    pub cases: u64,

    /// True if the run was stopped before every case was processed.
    #[serde(default)]
    pub interrupted: bool,

    /// size key -> category -> summary
    pub results: BTreeMap<String, BTreeMap<Category, GroupSummary>>,
}

// ----------------------------
// Benchmark manifest
// ----------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("benchmark set {0} must have exactly one of `link` or `links`")]
    AmbiguousSource(String),

    #[error("invalid size identifier {0:?}: must be a single directory name")]
    InvalidSize(String),

    #[error("invalid category name {0:?}: must be a single directory name")]
    InvalidCategory(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Manifest {
    /// Links are resolved relative to this URL.
    pub base_url: String,

    #[serde(rename = "sets", alias = "uniform_random_3sat")]
    pub sets: Vec<BenchmarkSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct BenchmarkSet {
    #[serde(alias = "clauses")]
    pub size: SizeId,

    /// Single archive, treated as the satisfiable category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Category name -> archive link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<BTreeMap<String, String>>,
}

/// Size identifier of a benchmark set.
///
/// A clause count `N` lays out as `N_clauses`; a name is used verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum SizeId {
    Clauses(u64),
    Named(String),
}

impl SizeId {
    pub fn dir_name(&self) -> String {
        match self {
            SizeId::Clauses(n) => format!("{n}_clauses"),
            SizeId::Named(name) => name.clone(),
        }
    }
}

/// One archive to fetch for a benchmark set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDownload {
    pub category: String,
    pub link: String,

    /// Whether the archive lands in a `<size>/<category>/` subdirectory.
    pub nested: bool,
}

impl BenchmarkSet {
    /// Directory name for this set, validated to be a single path component.
    pub fn size_dir(&self) -> Result<String, ManifestError> {
        let name = self.size.dir_name();
        if !is_plain_component(&name) {
            return Err(ManifestError::InvalidSize(name));
        }
        Ok(name)
    }

    pub fn downloads(&self) -> Result<Vec<SetDownload>, ManifestError> {
        match (&self.link, &self.links) {
            (Some(link), None) => Ok(vec![SetDownload {
                category: Category::Satisfiable.as_str().to_string(),
                link: link.clone(),
                nested: false,
            }]),
            (None, Some(links)) => links
                .iter()
                .map(|(category, link)| {
                    if !is_plain_component(category) {
                        return Err(ManifestError::InvalidCategory(category.clone()));
                    }
                    Ok(SetDownload {
                        category: category.clone(),
                        link: link.clone(),
                        nested: true,
                    })
                })
                .collect(),
            _ => Err(ManifestError::AmbiguousSource(self.size.dir_name())),
        }
    }
}

fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

// ----------------------------
// Optional config file schema
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct DefaultsConfig {
    /// Duration string parseable by humantime, e.g. "90s".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cap_bytes: Option<usize>,

    /// Solver argv vector (no shell parsing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serde_keys_are_snake_case() {
        let mut m = BTreeMap::new();
        m.insert(Category::Unsatisfiable, 1);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"unsatisfiable":1}"#);
    }

    #[test]
    fn category_markers() {
        assert_eq!(Category::Satisfiable.marker(), "IS SAT");
        assert_eq!(Category::Unsatisfiable.marker(), "UNSAT");
    }

    #[test]
    fn category_from_str_rejects_unknown() {
        assert_eq!("unsatisfiable".parse::<Category>(), Ok(Category::Unsatisfiable));
        assert_eq!(
            "sat".parse::<Category>(),
            Err(UnknownCategory("sat".to_string()))
        );
    }

    #[test]
    fn manifest_accepts_legacy_layout() {
        let json = r#"{
            "base_url": "https://example.org/sat/",
            "uniform_random_3sat": [
                { "clauses": 91, "link": "uf20-91.tar.gz" },
                { "clauses": 218, "links": {
                    "satisfiable": "uf50-218.tar.gz",
                    "unsatisfiable": "uuf50-218.tar.gz"
                } }
            ]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.sets.len(), 2);

        let single = &manifest.sets[0];
        assert_eq!(single.size_dir().unwrap(), "91_clauses");
        assert_eq!(
            single.downloads().unwrap(),
            vec![SetDownload {
                category: "satisfiable".to_string(),
                link: "uf20-91.tar.gz".to_string(),
                nested: false,
            }]
        );

        let multi = manifest.sets[1].downloads().unwrap();
        assert_eq!(multi.len(), 2);
        assert!(multi.iter().all(|d| d.nested));
        assert_eq!(multi[1].category, "unsatisfiable");
    }

    #[test]
    fn manifest_accepts_named_sizes() {
        let json = r#"{
            "base_url": "https://example.org/",
            "sets": [ { "size": "industrial", "link": "a.tar.gz" } ]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.sets[0].size_dir().unwrap(), "industrial");
    }

    #[test]
    fn set_with_both_link_kinds_is_rejected() {
        let set = BenchmarkSet {
            size: SizeId::Clauses(10),
            link: Some("a".into()),
            links: Some(BTreeMap::new()),
        };
        assert_eq!(
            set.downloads(),
            Err(ManifestError::AmbiguousSource("10_clauses".into()))
        );

        let empty = BenchmarkSet {
            size: SizeId::Clauses(10),
            link: None,
            links: None,
        };
        assert!(empty.downloads().is_err());
    }

    #[test]
    fn traversal_in_names_is_rejected() {
        let set = BenchmarkSet {
            size: SizeId::Named("../etc".into()),
            link: Some("a".into()),
            links: None,
        };
        assert!(matches!(set.size_dir(), Err(ManifestError::InvalidSize(_))));

        let mut links = BTreeMap::new();
        links.insert("sat/../../x".to_string(), "a".to_string());
        let set = BenchmarkSet {
            size: SizeId::Clauses(1),
            link: None,
            links: Some(links),
        };
        assert!(matches!(
            set.downloads(),
            Err(ManifestError::InvalidCategory(_))
        ));
    }

    #[test]
    fn config_parses_from_toml() {
        let cfg: ConfigFile = toml::from_str(
            r#"
            [defaults]
            timeout = "90s"
            jobs = 4
            solver = ["./target/release/solver", "--quiet"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.defaults.timeout.as_deref(), Some("90s"));
        assert_eq!(cfg.defaults.jobs, Some(4));
        assert_eq!(cfg.defaults.solver.unwrap().len(), 2);
        assert!(cfg.defaults.corpus_dir.is_none());
    }

    #[test]
    fn empty_config_is_default() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(cfg, ConfigFile::default());
    }
}
