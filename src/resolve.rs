//! Expansion of input patterns into candidate files.
//!
//! Patterns use glob syntax (`*`, `?`, `**`, `[a-z]`, `{a,b}`) and are
//! matched against slash-separated paths relative to the working directory.
//! `*` and `?` never cross a `/`; use `**` for that.
//!
//! Only regular files match. Symbolic links are neither followed nor
//! returned. The walk starts at the longest literal directory prefix of the
//! pattern, so `docs/**/*.md` never looks outside `docs/`.
//!
//! The pattern `stdin` is not globbed at all: it stands for one document
//! read from standard input.
//!
//! Absolute patterns are accepted when they point inside the working
//! directory and come back relative to it. A pattern matching anything
//! outside the working directory is an error, since its output would land
//! outside the output folder.

use crate::naming;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Pseudo-pattern for standard input.
pub const STDIN_PATTERN: &str = "stdin";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("pattern '{pattern}' matches {} outside the working directory", path.display())]
    OutsideRoot { pattern: String, path: PathBuf },
}

/// Outcome of expanding one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Stdin,
    /// Matching files, cleaned and relative to the working directory, in
    /// walk order. May be empty.
    Files(Vec<PathBuf>),
}

/// Expand `pattern` against `root`.
pub fn resolve(pattern: &str, root: &Path) -> Result<Resolved, ResolveError> {
    if pattern == STDIN_PATTERN {
        return Ok(Resolved::Stdin);
    }

    let trimmed = pattern.strip_prefix("./").unwrap_or(pattern);
    let found = if has_meta(trimmed) {
        glob(trimmed, root)?
    } else {
        literal(trimmed, root)
    };

    found
        .into_iter()
        .map(|path| {
            within_root(&path, root).ok_or_else(|| ResolveError::OutsideRoot {
                pattern: pattern.to_string(),
                path,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Resolved::Files)
}

fn glob(pattern: &str, root: &Path) -> Result<Vec<PathBuf>, ResolveError> {
    let matcher = compile(pattern)?;
    let absolute = Path::new(pattern).is_absolute();
    let base = root.join(literal_prefix(pattern));

    let files = WalkDir::new(&base)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = if absolute {
                e.path().to_path_buf()
            } else {
                e.path().strip_prefix(root).ok()?.to_path_buf()
            };
            matcher
                .is_match(naming::to_slash(&path))
                .then_some(path)
        })
        .collect();

    Ok(files)
}

/// Cleaned path relative to `root`, or `None` when it lies outside it.
fn within_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let cleaned = naming::clean_path(path);
    let relative = if cleaned.is_absolute() {
        cleaned
            .strip_prefix(naming::clean_path(root))
            .ok()?
            .to_path_buf()
    } else {
        cleaned
    };
    match relative.components().next() {
        Some(Component::Normal(_)) => Some(relative),
        _ => None,
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, ResolveError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|source| ResolveError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn has_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

/// Leading directory segments free of glob syntax.
fn literal_prefix(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = pattern.split('/').collect();
    let dirs = &segments[..segments.len().saturating_sub(1)];
    let literal: Vec<&str> = dirs.iter().copied().take_while(|s| !has_meta(s)).collect();
    // An absolute pattern keeps its leading empty segment, so the join starts with `/`
    PathBuf::from(literal.join("/"))
}

/// A pattern without glob syntax names at most one file.
fn literal(pattern: &str, root: &Path) -> Vec<PathBuf> {
    let full = root.join(pattern);
    match full.symlink_metadata() {
        Ok(meta) if meta.file_type().is_file() => vec![PathBuf::from(pattern)],
        _ => Vec::new(),
    }
}
