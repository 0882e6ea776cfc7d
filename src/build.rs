//! Batch build over a set of input patterns.
//!
//! Patterns are handled in command-line order and files in walk order
//! within each pattern. Work is strictly sequential:
//!
//! ```text
//! pattern ─▶ resolve ─▶ classify ─┬─ Convert ─▶ compile ─▶ write
//!                                  ├─ Move    ─▶ rename (copy + remove across devices)
//!                                  └─ Skip
//! ```
//!
//! A failing file or pattern is reported and the build moves on. The
//! returned [`BuildReport`] tells the caller whether anything failed.
//!
//! Progress is reported as [`BuildEvent`]s over an optional channel, the
//! same way the caller's printer thread consumes them for display.

use crate::classify::{self, Disposition, SkipReason};
use crate::compile::{CompileError, Compiler};
use crate::config::BuildConfig;
use crate::resolve::{self, ResolveError, Resolved};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot create folder {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("cannot move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("{}: {source}", path.display())]
    Compile { path: PathBuf, source: CompileError },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Progress of a build, one event per file or pattern-level condition.
#[derive(Debug)]
pub enum BuildEvent {
    /// A pattern matched nothing. Informational only.
    NoMatch { pattern: String },
    Converted {
        source: PathBuf,
        destination: PathBuf,
    },
    Moved {
        source: PathBuf,
        destination: PathBuf,
    },
    Skipped { source: PathBuf, reason: SkipReason },
    /// Standard input was compiled to standard output.
    Piped,
    Failed { error: BuildError },
}

impl BuildEvent {
    /// Errors are shown even in quiet mode.
    pub fn is_error(&self) -> bool {
        matches!(self, BuildEvent::Failed { .. })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub converted: usize,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BuildReport {
    pub fn has_errors(&self) -> bool {
        self.failed > 0
    }
}

/// Run a build with the process's standard input and output.
pub fn build(
    config: &BuildConfig,
    compiler: &Compiler,
    events: Option<Sender<BuildEvent>>,
) -> BuildReport {
    build_with_io(
        config,
        compiler,
        &mut io::stdin().lock(),
        &mut io::stdout().lock(),
        events,
    )
}

/// Run a build, reading the `stdin` pattern from `input` and writing its
/// page to `output`.
pub fn build_with_io(
    config: &BuildConfig,
    compiler: &Compiler,
    input: &mut dyn Read,
    output: &mut dyn Write,
    events: Option<Sender<BuildEvent>>,
) -> BuildReport {
    let mut run = Run {
        config,
        compiler,
        events,
        report: BuildReport::default(),
    };

    for pattern in &config.patterns {
        match resolve::resolve(pattern, &config.root) {
            Ok(Resolved::Stdin) => match run.pipe(input, output) {
                Ok(()) => run.emit(BuildEvent::Piped),
                Err(error) => run.fail(error),
            },
            Ok(Resolved::Files(files)) if files.is_empty() => run.emit(BuildEvent::NoMatch {
                pattern: pattern.clone(),
            }),
            Ok(Resolved::Files(files)) => {
                for file in files {
                    run.handle(&file);
                }
            }
            Err(e) => run.fail(e.into()),
        }
    }

    run.report
}

struct Run<'a> {
    config: &'a BuildConfig,
    compiler: &'a Compiler,
    events: Option<Sender<BuildEvent>>,
    report: BuildReport,
}

impl Run<'_> {
    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    fn fail(&mut self, error: BuildError) {
        self.report.failed += 1;
        self.emit(BuildEvent::Failed { error });
    }

    fn handle(&mut self, path: &Path) {
        let candidate = classify::classify(path, self.config);
        let source = candidate.source;

        match (candidate.disposition, candidate.destination) {
            (Disposition::Convert, Some(destination)) => {
                match self.convert(&source, &destination) {
                    Ok(()) => {
                        self.report.converted += 1;
                        self.emit(BuildEvent::Converted {
                            source,
                            destination,
                        });
                    }
                    Err(error) => self.fail(error),
                }
            }
            (Disposition::Move, Some(destination)) => {
                match self.relocate(&source, &destination) {
                    Ok(()) => {
                        self.report.moved += 1;
                        self.emit(BuildEvent::Moved {
                            source,
                            destination,
                        });
                    }
                    Err(error) => self.fail(error),
                }
            }
            (Disposition::Skip(reason), _) => {
                self.report.skipped += 1;
                self.emit(BuildEvent::Skipped { source, reason });
            }
            // The classifier always pairs Convert and Move with a destination
            (_, None) => {}
        }
    }

    fn convert(&self, source: &Path, destination: &Path) -> Result<(), BuildError> {
        let full = self.config.root.join(source);
        let bytes = fs::read(&full).map_err(|e| BuildError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;

        let source_dir = full.parent().unwrap_or(&self.config.root);
        let page = self
            .compiler
            .compile(&bytes, source_dir, false)
            .map_err(|e| BuildError::Compile {
                path: source.to_path_buf(),
                source: e,
            })?;

        ensure_parent(destination)?;
        fs::write(destination, page).map_err(|e| BuildError::Write {
            path: destination.to_path_buf(),
            source: e,
        })
    }

    fn relocate(&self, source: &Path, destination: &Path) -> Result<(), BuildError> {
        let from = self.config.root.join(source);
        if from == destination {
            return Ok(());
        }
        ensure_parent(destination)?;

        let move_error = |e| BuildError::Move {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        };
        if fs::rename(&from, destination).is_err() {
            // Rename fails across filesystems
            fs::copy(&from, destination).map_err(move_error)?;
            fs::remove_file(&from).map_err(move_error)?;
        }
        Ok(())
    }

    fn pipe(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<(), BuildError> {
        let stdin = PathBuf::from(resolve::STDIN_PATTERN);
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes).map_err(|e| BuildError::Read {
            path: stdin.clone(),
            source: e,
        })?;

        let page = self
            .compiler
            .compile(&bytes, &self.config.root, false)
            .map_err(|e| BuildError::Compile {
                path: stdin.clone(),
                source: e,
            })?;

        output
            .write_all(&page)
            .and_then(|()| output.flush())
            .map_err(|e| BuildError::Write {
                path: PathBuf::from("stdout"),
                source: e,
            })
    }
}

fn ensure_parent(destination: &Path) -> Result<(), BuildError> {
    match destination.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|source| BuildError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildSection, SiteConfig};
    use crate::test_helpers::write_tree;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn plain_compiler() -> Compiler {
        let mut site = SiteConfig::default();
        site.page.template = "<title>{{ title }}</title>{{ html }}".into();
        Compiler::new(&site).unwrap()
    }

    fn config(root: &Path, patterns: &[&str], f: impl FnOnce(&mut BuildSection)) -> BuildConfig {
        let mut section = BuildSection::default();
        f(&mut section);
        BuildConfig::new(
            root,
            patterns.iter().map(|p| p.to_string()).collect(),
            &section,
        )
    }

    fn run(config: &BuildConfig) -> (BuildReport, Vec<BuildEvent>) {
        let (tx, rx) = mpsc::channel();
        let report = build_with_io(
            config,
            &plain_compiler(),
            &mut io::empty(),
            &mut io::sink(),
            Some(tx),
        );
        (report, rx.into_iter().collect())
    }

    #[test]
    fn converts_next_to_sources_by_default() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.md", "# A"), ("notes.txt", "n")]);
        let (report, _) = run(&config(tmp.path(), &["*"], |_| {}));

        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped, 1);
        let page = fs::read_to_string(tmp.path().join("a.html")).unwrap();
        assert!(page.contains("<title>A</title>"));
    }

    #[test]
    fn out_dir_mirrors_tree() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("docs/guide/intro.md", "# Intro")]);
        let (report, _) = run(&config(tmp.path(), &["**/*.md"], |b| b.out_dir = "site".into()));

        assert_eq!(report.converted, 1);
        assert!(tmp.path().join("site/docs/guide/intro.html").is_file());
    }

    #[test]
    fn move_relocates_non_documents() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("img/logo.png", "png"), ("a.md", "a")]);
        let (report, _) = run(&config(tmp.path(), &["**/*"], |b| {
            b.out_dir = "out".into();
            b.move_non_markdown = true;
        }));

        assert_eq!(report.moved, 1);
        assert_eq!(report.converted, 1);
        assert!(!tmp.path().join("img/logo.png").exists());
        assert_eq!(fs::read(tmp.path().join("out/img/logo.png")).unwrap(), b"png");
        // Sources are never removed
        assert!(tmp.path().join("a.md").is_file());
    }

    #[test]
    fn move_into_same_place_is_noop() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("logo.png", "png")]);
        let (report, _) = run(&config(tmp.path(), &["*.png"], |b| b.move_non_markdown = true));
        assert_eq!(report.moved, 1);
        assert!(tmp.path().join("logo.png").is_file());
    }

    #[test]
    fn second_run_skips_previous_output() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.md", "a")]);
        let cfg = config(tmp.path(), &["**/*"], |b| {
            b.out_dir = "out".into();
            b.move_non_markdown = true;
        });
        run(&cfg);
        let (report, events) = run(&cfg);

        assert_eq!(report.converted, 1);
        assert_eq!(report.moved, 0);
        assert!(events.iter().any(|e| matches!(
            e,
            BuildEvent::Skipped { reason: SkipReason::InOutputDir, .. }
        )));
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.md", "a"), ("c.md", "c")]);
        fs::write(tmp.path().join("b.md"), [0xff, 0xfe]).unwrap();
        let (report, events) = run(&config(tmp.path(), &["*.md"], |_| {}));

        assert_eq!(report.converted, 2);
        assert_eq!(report.failed, 1);
        assert!(report.has_errors());
        assert!(!tmp.path().join("b.html").exists());
        assert!(tmp.path().join("c.html").is_file());
        assert!(events.iter().any(|e| matches!(
            e,
            BuildEvent::Failed { error: BuildError::Compile { .. } }
        )));
    }

    #[test]
    fn bad_pattern_fails_only_itself() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a.md", "a")]);
        let (report, _) = run(&config(tmp.path(), &["[oops", "a.md"], |_| {}));
        assert_eq!(report.failed, 1);
        assert_eq!(report.converted, 1);
    }

    #[test]
    fn empty_pattern_is_informational() {
        let tmp = TempDir::new().unwrap();
        let (report, events) = run(&config(tmp.path(), &["*.md"], |_| {}));
        assert!(!report.has_errors());
        assert!(matches!(&events[..], [BuildEvent::NoMatch { pattern }] if pattern == "*.md"));
    }

    #[test]
    fn stdin_goes_to_output() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(tmp.path(), &["stdin"], |b| b.out_dir = "out".into());
        let mut out = Vec::new();
        let report = build_with_io(
            &cfg,
            &plain_compiler(),
            &mut "# Piped".as_bytes(),
            &mut out,
            None,
        );

        assert_eq!(report, BuildReport::default());
        assert!(String::from_utf8(out).unwrap().starts_with("<title>Piped</title>"));
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn readme_index_renames_output() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("guide/README.md", "# Guide")]);
        run(&config(tmp.path(), &["**/*.md"], |b| b.readme_index = true));
        assert!(tmp.path().join("guide/index.html").is_file());
        assert!(!tmp.path().join("guide/README.html").exists());
    }
}
