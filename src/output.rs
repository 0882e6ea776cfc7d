//! Terminal output for builds and the preview server.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! docs/intro.md → site/docs/intro.html
//! img/logo.png → site/img/logo.png (moved)
//! notes.txt: skipped, not markdown
//! Error: broken.md: markdown conversion failed: document is not valid UTF-8
//! No file matches '*.rst'.
//!
//! Converted 1, moved 1, skipped 1, failed 1
//! ```
//!
//! ## Serve
//!
//! ```text
//! Serving 'docs' at http://localhost:8080/
//! GET '/intro.html': serve converted .md file
//! HEAD '/intro.html': check for changes
//! No request for 10 seconds. Exit.
//! ```
//!
//! Repeated identical request lines (the reload client polls once a second)
//! are printed once.
//!
//! # Architecture
//!
//! Formatting is pure: `format_*` functions and [`ServeLog`] return lines
//! and never write. The caller prints them to stderr, keeping stdout free
//! for documents piped through `stdin`.

use crate::build::{BuildEvent, BuildReport};
use crate::classify::SkipReason;
use crate::serve::{ServeEvent, Served};
use std::path::Path;

/// Show `path` relative to `root` when it lies inside it.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn skip_reason(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::InOutputDir => "in the output folder",
        SkipReason::DotPath => "hidden",
        SkipReason::NotDocument => "not markdown",
    }
}

/// Format one build event. Destinations are shown relative to `root`.
pub fn format_build_event(event: &BuildEvent, root: &Path) -> Vec<String> {
    match event {
        BuildEvent::NoMatch { pattern } => vec![format!("No file matches '{pattern}'.")],
        BuildEvent::Converted {
            source,
            destination,
        } => vec![format!(
            "{} → {}",
            source.display(),
            display_path(destination, root)
        )],
        BuildEvent::Moved {
            source,
            destination,
        } => vec![format!(
            "{} → {} (moved)",
            source.display(),
            display_path(destination, root)
        )],
        BuildEvent::Skipped { source, reason } => vec![format!(
            "{}: skipped, {}",
            source.display(),
            skip_reason(*reason)
        )],
        BuildEvent::Piped => vec!["stdin → stdout".to_string()],
        BuildEvent::Failed { error } => vec![format!("Error: {error}")],
    }
}

pub fn format_build_summary(report: &BuildReport) -> String {
    format!(
        "Converted {}, moved {}, skipped {}, failed {}",
        report.converted, report.moved, report.skipped, report.failed
    )
}

fn served_label(served: Served) -> &'static str {
    match served {
        Served::Page => "serve converted .md file",
        Served::Head => "check for changes",
        Served::Asset => "serve internal asset",
        Served::File => "serve raw file",
        Served::Listing => "serve folder listing",
        Served::Redirect => "redirect to folder",
        Served::NotFound => "not found",
        Served::MethodNotAllowed => "method not allowed",
    }
}

/// Formats server events, folding repeated request lines.
#[derive(Debug, Default)]
pub struct ServeLog {
    last_request: Option<String>,
}

impl ServeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&mut self, event: &ServeEvent) -> Vec<String> {
        let line = match event {
            ServeEvent::Request {
                method,
                path,
                served,
            } => {
                let line = format!("{method} '{path}': {}", served_label(*served));
                if self.last_request.as_deref() == Some(line.as_str()) {
                    return Vec::new();
                }
                self.last_request = Some(line.clone());
                return vec![line];
            }
            ServeEvent::Listening { url, root } => {
                format!("Serving '{}' at {url}", root.display())
            }
            ServeEvent::PortChanged { requested, used } => {
                format!("Port {requested} is busy, using {used} instead.")
            }
            ServeEvent::CompileFailed { source, error } => {
                format!("Error: cannot compile {}: {error}", source.display())
            }
            ServeEvent::ResponseFailed { path, error } => {
                format!("Error: response to '{path}' failed: {error}")
            }
            ServeEvent::IdleShutdown { interval } => {
                format!("No request for {} seconds. Exit.", interval.as_secs())
            }
        };
        // Anything in between makes the next request line worth repeating
        self.last_request = None;
        vec![line]
    }
}
