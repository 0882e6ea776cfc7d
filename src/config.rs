//! Configuration: `simple-md.toml`, stock defaults, and the frozen build snapshot.
//!
//! Settings come from three layers, later layers winning:
//!
//! ```text
//! stock defaults  <  simple-md.toml (or --config FILE)  <  command-line flags
//! ```
//!
//! The file layer is sparse. Only the keys you want to change need to be
//! present; it is merged over the stock defaults with [`merge_toml`] before
//! being deserialized, and unknown keys are rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! [page]
//! title = ""              # empty = first <h1> of the document
//! css = ["github"]        # theme names, stylesheet URLs, or inline CSS
//! favicon = ""
//! template = ""           # empty = built-in page; else a file path or template text
//!
//! [markdown]
//! table = true            # ...one switch per parser feature
//!
//! [build]
//! out_dir = ""            # empty = next to the sources
//! move_non_markdown = false
//! skip_dot = false
//! readme_index = false
//! links_md2html = true
//!
//! [serve]
//! timeout = 10            # seconds without requests before exiting, 0 = never
//! live_update = true
//! open_browser = true
//! port = 8080
//!
//! [rules]
//! markdown = []           # applied to the source before parsing
//! html = []               # applied to the finished page
//! ```
//!
//! Once resolved, the build-related values are frozen into a [`BuildConfig`]
//! that every component receives by reference.

use crate::markdown::MarkdownOptions;
use crate::naming;
use crate::rules::RuleError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "simple-md.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid substitution rule: {0}")]
    Rules(#[from] RuleError),
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("Output folder '{path}' is not reachable: {source}")]
    OutDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Everything configurable, as read from `simple-md.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Page assembly: title, styles, favicon, template.
    pub page: PageConfig,
    /// Parser feature switches.
    pub markdown: MarkdownOptions,
    /// Batch build behaviour.
    pub build: BuildSection,
    /// Preview server behaviour.
    pub serve: ServeSection,
    /// Substitution rules for both pipeline stages.
    pub rules: RulesSection,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serve.port == 0 {
            return Err(ConfigError::Validation("serve.port must be non-zero".into()));
        }
        if self.page.css.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "page.css entries must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    /// Fixed page title. Empty means "first level-1 heading, else the default".
    pub title: String,
    /// Style entries, in document order.
    pub css: Vec<String>,
    /// Favicon URL. Empty means none.
    pub favicon: String,
    /// Template file path or literal template. Empty means built-in.
    pub template: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            css: vec!["github".to_string()],
            favicon: String::new(),
            template: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    /// Output folder. Empty writes next to the sources.
    pub out_dir: String,
    /// Relocate non-markdown files into the output folder.
    pub move_non_markdown: bool,
    /// Ignore files and folders whose name starts with a dot.
    pub skip_dot: bool,
    /// Render `README.md` as `index.html`.
    pub readme_index: bool,
    /// Point links to existing local `.md` files at their `.html` output.
    pub links_md2html: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            out_dir: String::new(),
            move_non_markdown: false,
            skip_dot: false,
            readme_index: false,
            links_md2html: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeSection {
    /// Seconds without any request before the server exits. 0 disables.
    pub timeout: u64,
    /// Inject the live-reload script into served documents.
    pub live_update: bool,
    /// Open the default browser on start.
    pub open_browser: bool,
    /// First port to try.
    pub port: u16,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            timeout: 10,
            live_update: true,
            open_browser: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesSection {
    /// Rules (or rule files) applied to markdown before parsing.
    pub markdown: Vec<String>,
    /// Rules (or rule files) applied to the rendered page.
    pub html: Vec<String>,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` when it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the site config.
///
/// An explicit path must exist. Without one, `simple-md.toml` in `root` is
/// used when present and stock defaults otherwise.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str(&content)?)
        }
        None => load_raw_config(&root.join(CONFIG_FILE_NAME))?,
    };
    resolve_config(overlay)
}

// =============================================================================
// Frozen build snapshot
// =============================================================================

/// Immutable options for one batch build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Input patterns, in command-line order.
    pub patterns: Vec<String>,
    /// Working directory all patterns and candidate paths are relative to.
    pub root: PathBuf,
    /// Absolute output folder.
    pub out_dir: PathBuf,
    /// Output folder relative to `root`, when it is a proper subfolder of it.
    /// This is the exclusion zone for candidate paths.
    pub out_dir_rel: Option<PathBuf>,
    pub move_non_markdown: bool,
    pub skip_dot: bool,
    pub readme_index: bool,
    pub links_md2html: bool,
}

impl BuildConfig {
    pub fn new(root: &Path, patterns: Vec<String>, build: &BuildSection) -> Self {
        let out = naming::clean_path(Path::new(&build.out_dir));
        let out_dir = naming::clean_path(&root.join(&out));

        let out_dir_rel = out_dir
            .strip_prefix(root)
            .ok()
            .map(Path::to_path_buf)
            .filter(|rel| !rel.as_os_str().is_empty());

        Self {
            patterns,
            root: root.to_path_buf(),
            out_dir,
            out_dir_rel,
            move_non_markdown: build.move_non_markdown,
            skip_dot: build.skip_dot,
            readme_index: build.readme_index,
            links_md2html: build.links_md2html,
        }
    }

    /// Create the output folder up front so an unusable path fails before any work.
    pub fn ensure_out_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.out_dir).map_err(|source| ConfigError::OutDir {
            path: self.out_dir.clone(),
            source,
        })
    }
}

/// Returns a fully-commented stock `simple-md.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# simple-md configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Page assembly
# ---------------------------------------------------------------------------
[page]
# Fixed page title. Leave empty to use the first level-1 heading.
title = ""

# Styles, in order. Each entry is one of:
#   - a theme name from https://github.com/kpym/markdown-css (e.g. "github")
#   - a stylesheet URL or file name
#   - inline CSS (anything containing "{")
css = ["github"]

# Favicon URL. Leave empty for none.
favicon = ""

# Page template: a file path or the template text itself.
# Leave empty for the built-in page. Available variables:
#   title, favicon, styles (kind = "link" | "inline", value), html, live_update
template = ""

# ---------------------------------------------------------------------------
# Markdown features
# ---------------------------------------------------------------------------
[markdown]
attribute = true          # {#id .class} after headings
auto_heading_id = true    # generate ids for headings
definition_list = true
footnote = true
linkify = true            # bare URLs become links
strikethrough = true
table = true
task_list = true
typographer = true        # smart quotes and dashes
unsafe = true             # pass raw HTML through
hard_wraps = false        # every newline becomes <br />

# ---------------------------------------------------------------------------
# Batch build
# ---------------------------------------------------------------------------
[build]
# Output folder (created when missing). Leave empty to write next to sources.
out_dir = ""

# Move non-markdown files matched by the patterns into the output folder.
move_non_markdown = false

# Ignore files and folders whose name starts with a dot.
skip_dot = false

# Render README.md as index.html.
readme_index = false

# Rewrite links to existing local .md files so they point at the .html output.
links_md2html = true

# ---------------------------------------------------------------------------
# Live preview
# ---------------------------------------------------------------------------
[serve]
# Exit after this many seconds without requests once a page has been
# served live. 0 keeps the server running.
timeout = 10

# Reload the page in the browser when the source changes.
live_update = true

# Open the default browser on start.
open_browser = true

# First port to try; the next free one up to 8180 is used otherwise.
port = 8080

# ---------------------------------------------------------------------------
# Substitution rules: "<d>pattern<d>replacement<d>" or a path to a rule file
# ---------------------------------------------------------------------------
[rules]
markdown = []
html = []
"##
}
