//! Disposition of candidate files.
//!
//! Every path produced by pattern resolution is labelled before anything
//! touches the disk:
//!
//! | Check (first match wins)                        | Disposition |
//! |-------------------------------------------------|-------------|
//! | inside the output directory                     | Skip        |
//! | `skip_dot` and some segment starts with `.`     | Skip        |
//! | extension is `.md`                              | Convert     |
//! | `move_non_markdown`                             | Move        |
//! | anything else                                   | Skip        |
//!
//! The output-directory check compares whole path segments, so with an
//! output directory `out`, `out/a.md` is skipped but `out2/a.md` is not.

use crate::config::BuildConfig;
use crate::naming;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Previously generated output.
    InOutputDir,
    /// Hidden file or file under a hidden directory.
    DotPath,
    /// Not a document, and non-documents are not being moved.
    NotDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Convert,
    Move,
    Skip(SkipReason),
}

/// A resolved source path with its disposition and destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Cleaned path, relative to the working directory.
    pub source: PathBuf,
    pub disposition: Disposition,
    /// Absolute output path; `None` for skipped files.
    pub destination: Option<PathBuf>,
}

/// Classify a cleaned, working-directory-relative path.
pub fn classify(path: &Path, config: &BuildConfig) -> Candidate {
    let source = naming::clean_path(path);

    let (disposition, destination) = if in_output_dir(&source, config) {
        (Disposition::Skip(SkipReason::InOutputDir), None)
    } else if config.skip_dot && has_dot_segment(&source) {
        (Disposition::Skip(SkipReason::DotPath), None)
    } else if naming::is_document(&source) {
        let rendered = naming::rendered_name(&source, config.readme_index);
        (Disposition::Convert, Some(config.out_dir.join(rendered)))
    } else if config.move_non_markdown {
        (Disposition::Move, Some(config.out_dir.join(&source)))
    } else {
        (Disposition::Skip(SkipReason::NotDocument), None)
    };

    Candidate {
        source,
        disposition,
        destination,
    }
}

/// Segment-wise prefix test against the output directory.
fn in_output_dir(path: &Path, config: &BuildConfig) -> bool {
    config
        .out_dir_rel
        .as_deref()
        .is_some_and(|out| path.starts_with(out))
}

fn has_dot_segment(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::build_config;

    #[test]
    fn markdown_converts_under_out_dir() {
        let config = build_config("/work", "out");
        let c = classify(Path::new("docs/intro.md"), &config);
        assert_eq!(c.disposition, Disposition::Convert);
        assert_eq!(c.destination, Some(PathBuf::from("/work/out/docs/intro.html")));
    }

    #[test]
    fn source_is_cleaned() {
        let config = build_config("/work", "out");
        let c = classify(Path::new("./docs//a/../intro.md"), &config);
        assert_eq!(c.source, PathBuf::from("docs/intro.md"));
    }

    #[test]
    fn output_dir_is_skipped_for_every_kind() {
        let mut config = build_config("/work", "out");
        config.move_non_markdown = true;
        config.skip_dot = false;
        for p in ["out/a.md", "out/sub/b.png", "out/.hidden.md", "./out/c.md"] {
            let c = classify(Path::new(p), &config);
            assert_eq!(
                c.disposition,
                Disposition::Skip(SkipReason::InOutputDir),
                "{p}"
            );
            assert_eq!(c.destination, None);
        }
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_output() {
        let config = build_config("/work", "out");
        let c = classify(Path::new("out2/a.md"), &config);
        assert_eq!(c.disposition, Disposition::Convert);
        assert_eq!(c.destination, Some(PathBuf::from("/work/out/out2/a.html")));
    }

    #[test]
    fn nested_output_dir_matches_all_segments() {
        let config = build_config("/work", "site/out");
        assert_eq!(
            classify(Path::new("site/out/a.md"), &config).disposition,
            Disposition::Skip(SkipReason::InOutputDir)
        );
        assert_eq!(
            classify(Path::new("site/a.md"), &config).disposition,
            Disposition::Convert
        );
    }

    #[test]
    fn no_exclusion_when_out_dir_is_working_dir() {
        let config = build_config("/work", "");
        let c = classify(Path::new("a.md"), &config);
        assert_eq!(c.disposition, Disposition::Convert);
        assert_eq!(c.destination, Some(PathBuf::from("/work/a.html")));
    }

    #[test]
    fn dot_segments_skipped_when_enabled() {
        let mut config = build_config("/work", "out");
        config.skip_dot = true;
        for p in [".hidden.md", ".git/notes.md", "docs/.drafts/a.md"] {
            assert_eq!(
                classify(Path::new(p), &config).disposition,
                Disposition::Skip(SkipReason::DotPath),
                "{p}"
            );
        }
    }

    #[test]
    fn dot_segments_kept_when_disabled() {
        let config = build_config("/work", "out");
        assert_eq!(
            classify(Path::new(".drafts/a.md"), &config).disposition,
            Disposition::Convert
        );
    }

    #[test]
    fn non_markdown_skipped_without_move() {
        let config = build_config("/work", "out");
        let c = classify(Path::new("notes.txt"), &config);
        assert_eq!(c.disposition, Disposition::Skip(SkipReason::NotDocument));
        assert_eq!(c.destination, None);
    }

    #[test]
    fn uppercase_md_is_not_a_document() {
        let config = build_config("/work", "out");
        assert_eq!(
            classify(Path::new("NOTES.MD"), &config).disposition,
            Disposition::Skip(SkipReason::NotDocument)
        );
    }

    #[test]
    fn non_markdown_moved_with_move() {
        let mut config = build_config("/work", "out");
        config.move_non_markdown = true;
        let c = classify(Path::new("img/logo.png"), &config);
        assert_eq!(c.disposition, Disposition::Move);
        assert_eq!(c.destination, Some(PathBuf::from("/work/out/img/logo.png")));
    }

    #[test]
    fn readme_index_renames_destination() {
        let mut config = build_config("/work", "out");
        config.readme_index = true;
        let c = classify(Path::new("guide/ReadMe.md"), &config);
        assert_eq!(c.destination, Some(PathBuf::from("/work/out/guide/index.html")));
    }
}
