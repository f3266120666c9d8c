//! Random media selection.
//!
//! Two interchangeable strategies sit behind the [`Selector`] trait:
//! - [`IndexSelector`]: uniform pick over the persisted index (default)
//! - [`TreeSelector`]: randomized directory descent that needs no index

mod tree;

pub use tree::{MAX_DESCENT_DEPTH, TreeSelector};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::SelectorStrategy;
use crate::index::PathIndex;
use crate::random::SharedRandom;
use crate::{Error, Result};

/// Picks one media file.
///
/// Implementations perform blocking filesystem I/O; async callers should run
/// them on the blocking pool (see [`pick_blocking`]).
pub trait Selector: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Absolute path of a randomly chosen eligible file.
    fn pick(&self) -> Result<PathBuf>;
}

/// Run `selector.pick()` on the blocking thread pool.
pub async fn pick_blocking(selector: Arc<dyn Selector>) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || selector.pick())
        .await
        .map_err(|e| Error::Other(format!("Selection task failed: {e}")))?
}

/// Choose one entry with probability `1/N`.
///
/// Empty input is `NoEligibleFiles`; blank entries are never returned.
pub fn pick_uniform<'a>(entries: &'a [String], rng: &SharedRandom) -> Result<&'a str> {
    if entries.is_empty() {
        return Err(Error::NoEligibleFiles);
    }
    let entry = entries[rng.below(entries.len() as u64) as usize].as_str();
    if entry.trim().is_empty() {
        return Err(Error::NoEligibleFiles);
    }
    Ok(entry)
}

/// Uniform selection over the persisted index.
pub struct IndexSelector {
    index: Arc<PathIndex>,
    rng: SharedRandom,
}

impl IndexSelector {
    pub fn new(index: Arc<PathIndex>, rng: SharedRandom) -> Self {
        Self { index, rng }
    }
}

impl Selector for IndexSelector {
    fn name(&self) -> &'static str {
        "index"
    }

    fn pick(&self) -> Result<PathBuf> {
        let snapshot = self.index.snapshot()?;
        let entry = pick_uniform(&snapshot, &self.rng)?;
        Ok(self.index.resolve(entry))
    }
}

/// Build the selector for the configured strategy.
pub fn build_selector(
    strategy: SelectorStrategy,
    index: Arc<PathIndex>,
    rng: SharedRandom,
) -> Arc<dyn Selector> {
    match strategy {
        SelectorStrategy::Index => Arc::new(IndexSelector::new(index, rng)),
        SelectorStrategy::Tree => Arc::new(TreeSelector::new(index.root().to_path_buf(), rng)),
    }
}
