//! Batch builds over scratch trees, through the public library API.

use simple_md::build::{BuildEvent, BuildReport, build_with_io};
use simple_md::compile::Compiler;
use simple_md::config::{self, BuildConfig, BuildSection, SiteConfig};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::mpsc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn build_tree(
    root: &Path,
    site: &SiteConfig,
    patterns: &[&str],
) -> (BuildReport, Vec<BuildEvent>) {
    let compiler = Compiler::new(site).unwrap();
    let config = BuildConfig::new(
        root,
        patterns.iter().map(|p| p.to_string()).collect(),
        &site.build,
    );
    let (tx, rx) = mpsc::channel();
    let report = build_with_io(&config, &compiler, &mut io::empty(), &mut io::sink(), Some(tx));
    (report, rx.into_iter().collect())
}

fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[test]
fn star_md_converts_only_documents() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.md", "# A");
    write(tmp.path(), "b.md", "# B");
    write(tmp.path(), "notes.txt", "keep me");

    let (report, _) = build_tree(tmp.path(), &SiteConfig::default(), &["*.md"]);

    assert_eq!(report.converted, 2);
    assert!(!report.has_errors());
    assert_eq!(
        files_under(tmp.path()),
        ["a.html", "a.md", "b.html", "b.md", "notes.txt"]
    );
    assert_eq!(fs::read_to_string(tmp.path().join("notes.txt")).unwrap(), "keep me");
}

#[test]
fn readme_index_names_entry_page() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "README.md", "# Home");
    let mut site = SiteConfig::default();
    site.build.readme_index = true;

    build_tree(tmp.path(), &site, &["*.md"]);

    assert!(tmp.path().join("index.html").is_file());
    assert!(!tmp.path().join("README.html").exists());
}

#[test]
fn whole_tree_into_output_folder() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "index.md", "# Index\n\nSee [guide](docs/guide.md#setup).");
    write(tmp.path(), "docs/guide.md", "# Guide\n\n[Back](../index.md) [gone](gone.md)");
    write(tmp.path(), "docs/diagram.svg", "<svg/>");
    write(tmp.path(), ".git/config", "[core]");
    let mut site = SiteConfig::default();
    site.build.out_dir = "site".into();
    site.build.move_non_markdown = true;
    site.build.skip_dot = true;

    let (report, _) = build_tree(tmp.path(), &site, &["**/*"]);

    assert_eq!(report.converted, 2);
    assert_eq!(report.moved, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        files_under(&tmp.path().join("site")),
        ["docs/diagram.svg", "docs/guide.html", "index.html"]
    );

    let index = fs::read_to_string(tmp.path().join("site/index.html")).unwrap();
    assert!(index.contains(r##"href="docs/guide.html#setup""##));
    let guide = fs::read_to_string(tmp.path().join("site/docs/guide.html")).unwrap();
    assert!(guide.contains(r#"href="../index.html""#));
    assert!(guide.contains(r#"href="gone.md""#));
    assert!(guide.contains("<title>Guide</title>"));
}

#[test]
fn rebuild_is_identical_and_ignores_output() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.md", "# A\n\n\"Quotes\" and a table:\n\n| x |\n|---|\n| 1 |\n");
    let mut site = SiteConfig::default();
    site.build.out_dir = "out".into();

    build_tree(tmp.path(), &site, &["**/*.md"]);
    let first = fs::read(tmp.path().join("out/a.html")).unwrap();
    // out/ holds no markdown, but a stray one there must still be ignored
    write(tmp.path(), "out/stray.md", "# Stray");
    let (report, _) = build_tree(tmp.path(), &site, &["**/*.md"]);
    let second = fs::read(tmp.path().join("out/a.html")).unwrap();

    assert_eq!(first, second);
    assert_eq!(report.converted, 1);
    assert!(!tmp.path().join("out/out/stray.html").exists());
    assert!(!tmp.path().join("out/stray.html").exists());
}

#[test]
fn output_folder_prefix_sibling_still_built() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "out2/a.md", "# A");
    let mut site = SiteConfig::default();
    site.build.out_dir = "out".into();

    build_tree(tmp.path(), &site, &["**/*.md"]);

    assert!(tmp.path().join("out/out2/a.html").is_file());
}

#[test]
fn substitution_rules_hit_their_stage_only() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "md.md", "foo");
    write(tmp.path(), "html.md", "foo");

    let mut site = SiteConfig::default();
    site.rules.markdown = vec!["/foo/bar/".into()];
    site.page.template = "{{ html }}".into();
    build_tree(tmp.path(), &site, &["md.md"]);

    let mut site = SiteConfig::default();
    site.rules.html = vec!["|<p>foo|<p>bar|".into()];
    site.page.template = "<!-- foo -->{{ html }}".into();
    build_tree(tmp.path(), &site, &["html.md"]);

    assert_eq!(fs::read_to_string(tmp.path().join("md.html")).unwrap(), "<p>bar</p>\n");
    assert_eq!(
        fs::read_to_string(tmp.path().join("html.html")).unwrap(),
        "<!-- foo --><p>bar</p>\n"
    );
    // Sources are never rewritten
    assert_eq!(fs::read_to_string(tmp.path().join("md.md")).unwrap(), "foo");
}

#[test]
fn config_file_drives_the_build() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        config::CONFIG_FILE_NAME,
        "[page]\ntitle = \"Fixed\"\n\n[build]\nout_dir = \"public\"\n",
    );
    write(tmp.path(), "a.md", "# Ignored heading");

    let site = config::load_config(tmp.path(), None).unwrap();
    let (report, _) = build_tree(tmp.path(), &site, &["*.md"]);

    assert_eq!(report.converted, 1);
    let page = fs::read_to_string(tmp.path().join("public/a.html")).unwrap();
    assert!(page.contains("<title>Fixed</title>"));
}

#[test]
fn bad_file_reported_rest_built() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "good.md", "# Good");
    fs::write(tmp.path().join("bad.md"), [b'#', 0xc3, 0x28]).unwrap();

    let (report, events) = build_tree(tmp.path(), &SiteConfig::default(), &["*.md", "*.rst"]);

    assert_eq!(report.converted, 1);
    assert_eq!(report.failed, 1);
    assert!(tmp.path().join("good.html").is_file());
    assert!(!tmp.path().join("bad.html").exists());
    assert!(events.iter().any(|e| e.is_error()));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, BuildEvent::NoMatch { pattern } if pattern == "*.rst"))
    );
}

#[test]
fn build_section_defaults_write_next_to_sources() {
    let section = BuildSection::default();
    let config = BuildConfig::new(Path::new("/work"), vec!["*.md".into()], &section);
    assert_eq!(config.out_dir, Path::new("/work"));
    assert_eq!(config.out_dir_rel, None);
}

#[test]
fn patterns_outside_working_folder_fail_without_writing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "work/a.md", "# A");
    write(tmp.path(), "sib/b.md", "# B");
    let root = tmp.path().join("work");
    let mut site = SiteConfig::default();
    site.build.out_dir = "out".into();
    let sib = tmp.path().join("sib").to_string_lossy().replace('\\', "/");
    let absolute = format!("{sib}/*.md");

    let (report, events) = build_tree(&root, &site, &["../sib/b.md", &absolute, "*.md"]);

    assert_eq!(report.failed, 2);
    assert_eq!(report.converted, 1);
    assert!(root.join("out/a.html").is_file());
    assert!(!tmp.path().join("sib/b.html").exists());
    assert!(!root.join("sib/b.html").exists());
    assert_eq!(files_under(&tmp.path().join("sib")), ["b.md"]);
    assert_eq!(events.iter().filter(|e| e.is_error()).count(), 2);
}

#[test]
fn absolute_pattern_inside_working_folder_builds_into_output() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "docs/a.md", "# A");
    let mut site = SiteConfig::default();
    site.build.out_dir = "out".into();
    let docs = tmp.path().join("docs").to_string_lossy().replace('\\', "/");
    let pattern = format!("{docs}/*.md");

    let (report, _) = build_tree(tmp.path(), &site, &[&pattern]);

    assert_eq!(report.converted, 1);
    assert!(tmp.path().join("out/docs/a.html").is_file());
}
