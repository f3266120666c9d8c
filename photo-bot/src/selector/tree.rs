//! Direct-descent selection.
//!
//! Walks down from the root one random child at a time. The result is biased
//! toward files in shallow, sparse directories; it is not uniform over all
//! files. Kept for trees that have no index yet.

use std::fs::FileType;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::Selector;
use crate::index::is_eligible;
use crate::random::SharedRandom;
use crate::{Error, Result};

/// Depth budget of a single descent.
pub const MAX_DESCENT_DEPTH: usize = 32;

/// Randomized descent from the media root.
pub struct TreeSelector {
    root: PathBuf,
    max_depth: usize,
    rng: SharedRandom,
}

impl TreeSelector {
    pub fn new(root: PathBuf, rng: SharedRandom) -> Self {
        Self::with_max_depth(root, MAX_DESCENT_DEPTH, rng)
    }

    pub fn with_max_depth(root: PathBuf, max_depth: usize, rng: SharedRandom) -> Self {
        Self {
            root,
            max_depth,
            rng,
        }
    }

    /// Pick starting at `dir`.
    ///
    /// At each level up to `2 × children` random draws are made. A directory
    /// draw descends immediately, an eligible file draw returns it.
    pub fn pick_from(&self, dir: &Path) -> Result<PathBuf> {
        let mut current = dir.to_path_buf();
        let mut depth = 0;

        'levels: loop {
            if depth >= self.max_depth {
                return Err(Error::RecursionTooDeep {
                    depth,
                    dir: current,
                });
            }

            let children = list_children(&current)?;
            let attempts = children.len() * 2;

            for _ in 0..attempts {
                let (path, file_type) = &children[self.rng.below(children.len() as u64) as usize];

                if file_type.is_dir() {
                    trace!(dir = %path.display(), depth, "Descending");
                    current = path.clone();
                    depth += 1;
                    continue 'levels;
                }

                if file_type.is_file() && is_eligible(path) {
                    return Ok(path.clone());
                }
            }

            return Err(Error::NoSuitableFile { dir: current });
        }
    }
}

impl Selector for TreeSelector {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn pick(&self) -> Result<PathBuf> {
        self.pick_from(&self.root)
    }
}

/// Immediate children of `dir`, sorted by name. Symlinks are not resolved.
fn list_children(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let read_dir =
        std::fs::read_dir(dir).map_err(|e| Error::io_path("reading directory", dir, e))?;

    let mut children: Vec<(PathBuf, FileType)> = read_dir
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_type().ok().map(|ft| (entry.path(), ft)))
        .collect();
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children)
}
