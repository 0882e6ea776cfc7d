//! The `simple-md` binary end to end.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn simple_md(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_simple-md"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run simple-md")
}

#[test]
fn gen_config_output_is_loadable() {
    let tmp = TempDir::new().unwrap();
    let out = simple_md(tmp.path(), &["gen-config"]);
    assert!(out.status.success());

    fs::write(tmp.path().join("simple-md.toml"), &out.stdout).unwrap();
    let loaded = simple_md::config::load_config(tmp.path(), None).unwrap();
    let defaults = simple_md::config::SiteConfig::default();
    assert_eq!(loaded.page.css, defaults.page.css);
    assert_eq!(loaded.markdown, defaults.markdown);
    assert_eq!(loaded.serve.port, defaults.serve.port);
    assert_eq!(loaded.build.out_dir, defaults.build.out_dir);
}

#[test]
fn build_with_flags() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("README.md"), "# Read me\n\nfoo").unwrap();

    let out = simple_md(
        tmp.path(),
        &[
            "build",
            "-o",
            "site",
            "--readme-index",
            "-t",
            "Docs",
            "--re-md",
            "/foo/bar/",
            "*.md",
        ],
    );

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let page = fs::read_to_string(tmp.path().join("site/index.html")).unwrap();
    assert!(page.contains("<title>Docs</title>"));
    assert!(page.contains("<p>bar</p>"));
    let log = String::from_utf8_lossy(&out.stderr);
    assert!(log.contains("Converted 1, moved 0, skipped 0, failed 0"), "{log}");
}

#[test]
fn stdin_to_stdout() {
    let tmp = TempDir::new().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_simple-md"))
        .current_dir(tmp.path())
        .args(["build", "--html", "{{ html }}", "stdin"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"*piped*")
        .unwrap();
    let out = child.wait_with_output().unwrap();

    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "<p><em>piped</em></p>\n");
}

#[test]
fn failed_file_sets_exit_code() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("ok.md"), "# Ok").unwrap();
    fs::write(tmp.path().join("bad.md"), [0xff, 0xfe]).unwrap();

    let out = simple_md(tmp.path(), &["build", "*.md"]);

    assert!(!out.status.success());
    assert!(tmp.path().join("ok.html").is_file());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Error:"));
}

#[test]
fn invalid_rule_rejected_before_building() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.md"), "# A").unwrap();

    let out = simple_md(tmp.path(), &["build", "--re-html", "/unclosed", "*.md"]);

    assert!(!out.status.success());
    assert!(!tmp.path().join("a.html").exists());
}

#[test]
fn unknown_config_key_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("simple-md.toml"), "[build]\nturbo = true\n").unwrap();

    let out = simple_md(tmp.path(), &["build", "*.md"]);

    assert!(!out.status.success());
}
