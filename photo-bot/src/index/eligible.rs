//! Media eligibility by file extension.

use std::path::Path;

/// Extensions served by the bot, compared case-insensitively.
pub const ELIGIBLE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Whether `path` names an eligible media file.
///
/// Only the extension is inspected; content is never read.
pub fn is_eligible(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ELIGIBLE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}
