//! Mapping of request URLs onto the served folder.

use crate::naming;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

pub const FAVICON_PATH: &str = "/favicon.ico";

/// What a request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Favicon,
    LiveScript,
    /// A markdown source to compile. `requested` is the file the URL named,
    /// served as-is if compilation fails.
    Document { source: PathBuf, requested: PathBuf },
    File(PathBuf),
    Listing(PathBuf),
    /// A folder URL without its trailing slash.
    Redirect(String),
    NotFound,
}

/// Resolve a request URL against `root`.
pub fn route(url: &str, root: &Path) -> Route {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    match path {
        FAVICON_PATH => return Route::Favicon,
        crate::template::LIVE_SCRIPT_PATH => return Route::LiveScript,
        _ => {}
    }

    let Some(relative) = url_to_relative(path) else {
        return Route::NotFound;
    };
    let local = root.join(&relative);

    if naming::is_rendered(&local) {
        let source = naming::source_name(&local);
        if source.is_file() {
            return Route::Document {
                source,
                requested: local,
            };
        }
    }
    if naming::is_document(&local) && local.is_file() {
        return Route::Document {
            source: local.clone(),
            requested: local,
        };
    }

    if local.is_dir() {
        if !path.ends_with('/') {
            return Route::Redirect(format!("{path}/"));
        }
        let index = local.join(naming::INDEX_NAME);
        return if index.is_file() {
            Route::File(index)
        } else {
            Route::Listing(local)
        };
    }

    if local.is_file() {
        Route::File(local)
    } else {
        Route::NotFound
    }
}

/// Decode a URL path into a relative filesystem path. `None` for paths that
/// try to climb out of the served folder.
fn url_to_relative(path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}
