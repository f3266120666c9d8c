//! Media index.
//!
//! Builds and serves the persisted catalog of eligible media files under the
//! media root.

mod eligible;
mod path_index;

pub use eligible::{ELIGIBLE_EXTENSIONS, is_eligible};
pub use path_index::{
    INDEX_FILE_NAME, INDEX_TEMP_FILE_NAME, IndexSnapshot, MAX_INDEX_DEPTH, PathIndex, ScanReport,
    parse_listing, scan,
};
