//! Output naming for source files.
//!
//! The output tree mirrors the source tree one-to-one. Only the file name
//! changes, and only for documents:
//!
//! - `notes/intro.md` → `notes/intro.html` (extension swap)
//! - `notes/README.md` → `notes/index.html` (canonical entry rename, opt-in,
//!   case-insensitive on the source name)
//!
//! Paths handled here are always relative to the working directory and are
//! cleaned lexically first, so `./a//b/../c.md` and `a/c.md` name the same
//! candidate.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

/// Extension of source documents.
pub const DOCUMENT_EXTENSION: &str = "md";
/// Extension of rendered documents.
pub const RENDERED_EXTENSION: &str = "html";
/// Source file name that becomes the directory's entry page when enabled.
pub const README_NAME: &str = "readme.md";
/// Entry page name that a README renders to.
pub const INDEX_NAME: &str = "index.html";

/// Lexically normalize a path: drop `.` segments, fold `..` into the
/// preceding normal segment, and collapse redundant separators.
///
/// Leading `..` segments that have nothing to fold into are kept.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// True when the path ends in `.md`. Case-sensitive, like the `.md` link
/// rewriting, so `NOTES.MD` is neither converted nor linked.
pub fn is_document(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == DOCUMENT_EXTENSION)
}

/// True when the path ends in `.html`.
pub fn is_rendered(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == RENDERED_EXTENSION)
}

/// Rendered name for a document path, relative to the same base.
///
/// With `readme_index`, a file named `README.md` (any case) keeps its
/// directory but takes the name `index.html`.
pub fn rendered_name(source: &Path, readme_index: bool) -> PathBuf {
    let is_readme = source
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case(README_NAME));

    if readme_index && is_readme {
        source.with_file_name(INDEX_NAME)
    } else {
        source.with_extension(RENDERED_EXTENSION)
    }
}

/// Source document that a rendered path would have been built from.
pub fn source_name(rendered: &Path) -> PathBuf {
    rendered.with_extension(DOCUMENT_EXTENSION)
}

/// Path components as forward-slash text, for glob matching and display.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| match c {
            // Joined as the empty first segment: `/a/b`
            Component::RootDir => Cow::Borrowed(""),
            other => other.as_os_str().to_string_lossy(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
