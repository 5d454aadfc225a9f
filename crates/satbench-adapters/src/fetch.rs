//! Archive download and extraction.

use flate2::read::GzDecoder;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to stage archive in {dir}")]
    Stage {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive")]
    Archive(#[source] std::io::Error),
}

/// Where benchmark archives come from.
pub trait ArchiveSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpArchiveSource {
    client: reqwest::blocking::Client,
}

impl HttpArchiveSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("satbench/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl ArchiveSource for HttpArchiveSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().map_err(http_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().map_err(http_err)?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExtractMode {
    /// Keep the directory structure recorded in the archive.
    Preserve,

    /// Regular files only, each written under its base name.
    Flatten,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: u64,

    /// Entries that could not be written, with the reason.
    pub skipped: Vec<String>,
}

/// Stage gzipped tar bytes to a temporary file and unpack them into `dest`.
///
/// Staging happens in the system temp directory, so a fetch killed mid-way
/// never leaves a partial archive inside the corpus. The staged file is
/// removed when this returns, whether extraction worked or not. `dest` must
/// already exist.
pub fn stage_and_extract(
    bytes: &[u8],
    dest: &Path,
    mode: ExtractMode,
) -> Result<ExtractStats, FetchError> {
    stage_in_and_extract(bytes, &std::env::temp_dir(), dest, mode)
}

fn stage_in_and_extract(
    bytes: &[u8],
    staging: &Path,
    dest: &Path,
    mode: ExtractMode,
) -> Result<ExtractStats, FetchError> {
    if !dest.is_dir() {
        return Err(FetchError::Stage {
            dir: dest.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "destination is not a directory",
            ),
        });
    }

    let stage_err = |source| FetchError::Stage {
        dir: staging.to_path_buf(),
        source,
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".satbench-")
        .suffix(".tar.gz.part")
        .tempfile_in(staging)
        .map_err(stage_err)?;
    staged.write_all(bytes).map_err(stage_err)?;
    staged.flush().map_err(stage_err)?;

    let file = staged.reopen().map_err(stage_err)?;
    extract_tar_gz(file, dest, mode)
}

fn extract_tar_gz<R: Read>(
    reader: R,
    dest: &Path,
    mode: ExtractMode,
) -> Result<ExtractStats, FetchError> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut stats = ExtractStats::default();

    for entry in archive.entries().map_err(FetchError::Archive)? {
        let mut entry = entry.map_err(FetchError::Archive)?;
        let is_file = entry.header().entry_type().is_file();
        let path = entry.path().map_err(FetchError::Archive)?.into_owned();

        match mode {
            ExtractMode::Preserve => match entry.unpack_in(dest) {
                Ok(true) if is_file => stats.files += 1,
                Ok(true) => {}
                Ok(false) => stats
                    .skipped
                    .push(format!("{}: outside destination", path.display())),
                Err(e) => stats.skipped.push(format!("{}: {e}", path.display())),
            },
            ExtractMode::Flatten => {
                if !is_file {
                    continue;
                }
                let Some(name) = path.file_name() else {
                    stats
                        .skipped
                        .push(format!("{}: no file name", path.display()));
                    continue;
                };
                match entry.unpack(dest.join(name)) {
                    Ok(_) => stats.files += 1,
                    Err(e) => stats.skipped.push(format!("{}: {e}", path.display())),
                }
            }
        }
    }

    Ok(stats)
}
