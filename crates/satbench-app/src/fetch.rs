//! Populate a corpus directory from a benchmark manifest.

use crate::describe;
use anyhow::Context;
use satbench_adapters::{ArchiveSource, ExtractMode, stage_and_extract};
use satbench_types::{Category, Manifest};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchCorpusRequest {
    pub manifest: Manifest,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Sets whose directory was created (or already existed).
    pub sets: u64,
    pub archives_extracted: u64,
    pub files_extracted: u64,

    /// Everything that went wrong, one line each. None of it stops the fetch.
    pub failures: Vec<String>,
}

pub struct FetchCorpusUseCase<S: ArchiveSource> {
    source: S,
}

impl<S: ArchiveSource> FetchCorpusUseCase<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Download and extract every archive in the manifest.
    ///
    /// Only an unusable `base_url` is fatal; per-set and per-archive problems
    /// are logged, collected in [`FetchOutcome::failures`], and skipped.
    pub fn execute(&self, req: FetchCorpusRequest) -> anyhow::Result<FetchOutcome> {
        let base = Url::parse(&req.manifest.base_url)
            .with_context(|| format!("invalid base_url {:?}", req.manifest.base_url))?;

        let mut out = FetchOutcome::default();

        for set in &req.manifest.sets {
            let size_dir = match set.size_dir() {
                Ok(d) => d,
                Err(e) => {
                    fail(&mut out, describe(e));
                    continue;
                }
            };
            let downloads = match set.downloads() {
                Ok(d) => d,
                Err(e) => {
                    fail(&mut out, describe(e));
                    continue;
                }
            };

            let set_path = req.out_dir.join(&size_dir);
            if let Err(e) = std::fs::create_dir_all(&set_path) {
                fail(
                    &mut out,
                    format!("cannot create {}: {e}", set_path.display()),
                );
                continue;
            }
            out.sets += 1;

            for dl in downloads {
                let target = if dl.nested {
                    set_path.join(&dl.category)
                } else {
                    set_path.clone()
                };
                self.fetch_one(&base, &dl.link, &dl.category, &target, &mut out);
            }
        }

        info!(
            sets = out.sets,
            archives = out.archives_extracted,
            files = out.files_extracted,
            failures = out.failures.len(),
            "fetch finished"
        );
        Ok(out)
    }

    fn fetch_one(
        &self,
        base: &Url,
        link: &str,
        category: &str,
        target: &Path,
        out: &mut FetchOutcome,
    ) {
        if let Err(e) = std::fs::create_dir_all(target) {
            fail(out, format!("cannot create {}: {e}", target.display()));
            return;
        }

        let url = match base.join(link) {
            Ok(u) => u,
            Err(e) => {
                fail(out, format!("invalid link {link:?}: {e}"));
                return;
            }
        };

        info!(url = %url, dest = %target.display(), "downloading");
        let bytes = match self.source.fetch(url.as_str()) {
            Ok(b) => b,
            Err(e) => {
                fail(out, describe(e));
                return;
            }
        };

        let mode = if category == Category::Unsatisfiable.as_str() {
            ExtractMode::Flatten
        } else {
            ExtractMode::Preserve
        };

        match stage_and_extract(&bytes, target, mode) {
            Ok(stats) => {
                out.archives_extracted += 1;
                out.files_extracted += stats.files;
                for entry in stats.skipped {
                    fail(out, format!("{url}: {entry}"));
                }
            }
            Err(e) => fail(out, format!("{url}: {}", describe(e))),
        }
    }
}

fn fail(out: &mut FetchOutcome, reason: String) {
    warn!(reason = %reason, "fetch problem, continuing");
    out.failures.push(reason);
}
