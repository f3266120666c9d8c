//! Persisted catalog of eligible media paths.
//!
//! The index is a newline-separated list of paths relative to the media root,
//! stored in `index.txt` at the root. A rebuild writes the complete listing to
//! `index.txt.tmp` and renames it over the destination, so readers only ever
//! see the previous listing or the new one.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::eligible::is_eligible;
use crate::{Error, Result};

/// Name of the index file at the media root.
pub const INDEX_FILE_NAME: &str = "index.txt";

/// Name of the staging file used during a rebuild.
pub const INDEX_TEMP_FILE_NAME: &str = "index.txt.tmp";

/// Maximum directory depth visited by a rebuild.
pub const MAX_INDEX_DEPTH: usize = 64;

/// Immutable listing produced by one rebuild.
pub type IndexSnapshot = Arc<[String]>;

/// Outcome of walking the media root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Eligible paths relative to the root, sorted.
    pub entries: Vec<String>,
    /// Directories at the depth cap that were not descended.
    pub truncated_dirs: usize,
    /// Entries that could not be read or represented in the index.
    pub skipped_entries: usize,
}

/// Catalog of eligible media files under a root directory.
pub struct PathIndex {
    root: PathBuf,
    index_path: PathBuf,
    temp_path: PathBuf,
    cache: RwLock<Option<IndexSnapshot>>,
}

impl PathIndex {
    /// Create an index for `root`. Nothing is read until `rebuild` or `load`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            index_path: root.join(INDEX_FILE_NAME),
            temp_path: root.join(INDEX_TEMP_FILE_NAME),
            root,
            cache: RwLock::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Absolute path of an index entry.
    pub fn resolve(&self, entry: &str) -> PathBuf {
        self.root.join(entry)
    }

    /// Walk the root, persist the listing atomically and refresh the cache.
    ///
    /// Returns the number of eligible files. On error the previous index file
    /// and cache are left untouched.
    pub fn rebuild(&self) -> Result<usize> {
        let report = scan(&self.root)?;

        if report.truncated_dirs > 0 {
            warn!(
                root = %self.root.display(),
                truncated_dirs = report.truncated_dirs,
                max_depth = MAX_INDEX_DEPTH,
                "Directory tree exceeds the index depth limit; deeper files are not indexed"
            );
        }

        self.persist(&report.entries)?;

        let count = report.entries.len();
        *self.cache.write() = Some(IndexSnapshot::from(report.entries));

        info!(
            root = %self.root.display(),
            count,
            skipped = report.skipped_entries,
            "Index rebuilt"
        );
        Ok(count)
    }

    /// Run `rebuild` on the blocking thread pool.
    pub async fn rebuild_blocking(self: &Arc<Self>) -> Result<usize> {
        let index = Arc::clone(self);
        tokio::task::spawn_blocking(move || index.rebuild())
            .await
            .map_err(|e| Error::Other(format!("Index rebuild task failed: {e}")))?
    }

    /// Read the persisted index from disk.
    ///
    /// Fails with `IndexUnavailable` if no rebuild has ever completed.
    pub fn load(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.index_path) {
            Ok(content) => Ok(parse_listing(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::IndexUnavailable {
                path: self.index_path.clone(),
            }),
            Err(e) => Err(Error::io_path("reading index", &self.index_path, e)),
        }
    }

    /// Current listing, served from memory when available.
    ///
    /// A cold cache (index written by an earlier run) is filled from disk.
    pub fn snapshot(&self) -> Result<IndexSnapshot> {
        if let Some(snapshot) = self.cache.read().as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let snapshot = IndexSnapshot::from(self.load()?);
        debug!(count = snapshot.len(), "Index cache filled from disk");

        let mut cache = self.cache.write();
        // A concurrent rebuild may have filled it meanwhile; keep that one.
        Ok(Arc::clone(cache.get_or_insert(snapshot)))
    }

    fn persist(&self, entries: &[String]) -> Result<()> {
        let written = write_listing(&self.temp_path, entries)
            .and_then(|()| std::fs::rename(&self.temp_path, &self.index_path));

        if let Err(source) = written {
            if let Err(e) = std::fs::remove_file(&self.temp_path)
                && e.kind() != ErrorKind::NotFound
            {
                debug!(path = %self.temp_path.display(), error = %e, "Failed to remove staging file");
            }
            return Err(Error::PersistFailed {
                path: self.index_path.clone(),
                source,
            });
        }
        Ok(())
    }
}

/// Collect eligible regular files under `root`.
///
/// Symbolic links are not followed. An unreadable root is an error; anything
/// unreadable below it is skipped.
pub fn scan(root: &Path) -> Result<ScanReport> {
    let mut report = ScanReport::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .max_depth(MAX_INDEX_DEPTH)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::WalkFailed {
                    root: root.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                report.skipped_entries += 1;
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            if entry.depth() == MAX_INDEX_DEPTH {
                report.truncated_dirs += 1;
            }
            continue;
        }
        if !file_type.is_file() || !is_eligible(entry.path()) {
            continue;
        }

        match relative_entry(root, entry.path()) {
            Some(rel) => report.entries.push(rel),
            None => {
                warn!(path = %entry.path().display(), "Skipping file name that cannot be indexed");
                report.skipped_entries += 1;
            }
        }
    }

    report.entries.sort_unstable();
    Ok(report)
}

/// `/`-joined path of `path` relative to `root`, if it fits the line format.
fn relative_entry(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    let joined = parts.join("/");
    if joined.is_empty() || joined.contains(['\n', '\r']) {
        return None;
    }
    Some(joined)
}

fn write_listing(path: &Path, entries: &[String]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in entries {
        writer.write_all(entry.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Split a persisted listing into entries, dropping blank lines.
pub fn parse_listing(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
