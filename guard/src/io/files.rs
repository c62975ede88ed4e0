//! Glob-based enumeration of a stone's artifact files.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use glob::MatchOptions;
use tracing::debug;

use crate::io::route::STORE_DIR;

/// Return files under `base` matching any of `patterns`, as sorted relative paths.
///
/// Directories and anything under the engine-owned `.route/` store are skipped
/// so writing artifacts never feeds back into the content hash.
pub fn enumerate(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let escaped_base = glob::Pattern::escape(&base.to_string_lossy());
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut found = BTreeSet::new();
    for pattern in patterns {
        let full = format!("{escaped_base}/{}", pattern.trim_start_matches("./"));
        let entries =
            glob::glob_with(&full, options).with_context(|| format!("invalid glob {pattern:?}"))?;
        for entry in entries {
            let path = entry.with_context(|| format!("read glob match for {pattern:?}"))?;
            if !path.is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(base) else {
                continue;
            };
            if in_store(rel) {
                continue;
            }
            found.insert(rel.to_path_buf());
        }
    }
    debug!(base = %base.display(), count = found.len(), "enumerated artifact files");
    Ok(found.into_iter().collect())
}

/// Relative path rendered with `/` separators for hashing.
pub fn portable(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn in_store(rel: &Path) -> bool {
    matches!(rel.components().next(), Some(Component::Normal(name)) if name == STORE_DIR)
}
