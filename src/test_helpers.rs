//! Shared test utilities.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_tree(tmp.path(), &[("a.md", "# A"), ("sub/b.md", "# B")]);
//! let config = build_config("/work", "out");
//! ```

use crate::config::{BuildConfig, BuildSection};
use std::fs;
use std::path::Path;

/// Create files (and their parent folders) under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }
}

/// A build snapshot with default flags and no patterns.
///
/// Nothing is touched on disk, so `root` does not need to exist.
pub fn build_config(root: &str, out_dir: &str) -> BuildConfig {
    let section = BuildSection {
        out_dir: out_dir.to_string(),
        ..BuildSection::default()
    };
    BuildConfig::new(Path::new(root), Vec::new(), &section)
}
