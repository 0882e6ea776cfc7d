//! Single-document compilation.
//!
//! [`Compiler::compile`] turns markdown bytes into a finished page:
//!
//! ```text
//! source ─▶ markdown rules ─▶ parse ─▶ title ─▶ template ─▶ .md link rewrite ─▶ html rules
//! ```
//!
//! Only parsing and template execution can fail. Either failure aborts the
//! document; nothing is returned for partial output.
//!
//! A `Compiler` is built once from the resolved configuration and is
//! read-only afterwards, so the preview server shares one across request
//! threads.

use crate::config::{ConfigError, SiteConfig};
use crate::markdown::{self, MarkdownError, MarkdownOptions};
use crate::rules::SubstRuleList;
use crate::template::{PageData, PageTemplate, StyleEntry, TemplateError};
use maud::html;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Title used when neither an explicit title nor a level-1 heading exists.
pub const DEFAULT_TITLE: &str = "simple-md";

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("markdown conversion failed: {0}")]
    Markdown(#[from] MarkdownError),
    #[error("template execution failed: {0}")]
    Template(#[from] TemplateError),
}

static FIRST_H1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<h1[^>]*>(.*?)</h1>").expect("valid heading regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static MD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"(href\s*=\s*")([^"#]+?)\.md(#[^"]*)?""##).expect("valid link regex")
});

pub struct Compiler {
    markdown: MarkdownOptions,
    /// Explicit title, HTML-escaped.
    title: Option<String>,
    favicon: Option<String>,
    styles: Vec<StyleEntry>,
    template: PageTemplate,
    links_md2html: bool,
    markdown_rules: SubstRuleList,
    html_rules: SubstRuleList,
}

impl Compiler {
    /// Freeze the page-related settings.
    ///
    /// Invalid rules and template syntax errors are configuration errors.
    pub fn new(config: &SiteConfig) -> Result<Self, ConfigError> {
        let (markdown_rules, error) = SubstRuleList::load_all(&config.rules.markdown);
        if let Some(e) = error {
            return Err(e.into());
        }
        let (html_rules, error) = SubstRuleList::load_all(&config.rules.html);
        if let Some(e) = error {
            return Err(e.into());
        }

        let page = &config.page;
        let title = Some(page.title.trim())
            .filter(|t| !t.is_empty())
            .map(|t| html! { (t) }.into_string());
        let favicon = Some(page.favicon.trim())
            .filter(|f| !f.is_empty())
            .map(String::from);

        Ok(Self {
            markdown: config.markdown.clone(),
            title,
            favicon,
            styles: page.css.iter().map(|c| StyleEntry::parse(c)).collect(),
            template: PageTemplate::load(&page.template)?,
            links_md2html: config.build.links_md2html,
            markdown_rules,
            html_rules,
        })
    }

    /// Compile one document. Relative `.md` links are checked against
    /// `source_dir`. `live_update` embeds the reload client.
    pub fn compile(
        &self,
        source: &[u8],
        source_dir: &Path,
        live_update: bool,
    ) -> Result<Vec<u8>, CompileError> {
        let source = self.markdown_rules.apply(source.to_vec());
        let fragment = markdown::render(&source, &self.markdown)?;

        let title = self
            .title
            .clone()
            .or_else(|| first_heading(&fragment))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let data = PageData {
            title,
            favicon: self.favicon.clone(),
            styles: self.styles.clone(),
            html: fragment,
            live_update,
        };
        let mut page = self.template.render(&data)?;

        if self.links_md2html {
            page = rewrite_md_links(&page, source_dir);
        }

        Ok(self.html_rules.apply(page.into_bytes()))
    }
}

/// Text of the first `<h1>`, markup stripped.
pub fn first_heading(fragment: &str) -> Option<String> {
    let inner = FIRST_H1.captures(fragment)?.get(1)?.as_str();
    let text = TAG.replace_all(inner, "");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Point links at existing local `.md` files to their `.html` output.
///
/// Targets are resolved against `source_dir`, leading slash included;
/// links to missing files are left byte-identical.
pub fn rewrite_md_links(page: &str, source_dir: &Path) -> String {
    MD_LINK
        .replace_all(page, |caps: &Captures| {
            let target = format!("{}.md", &caps[2]);
            let decoded = percent_decode_str(&target).decode_utf8_lossy();
            // `/x.md` is still looked up under `source_dir`
            let relative = decoded.trim_start_matches('/');
            if source_dir.join(relative).is_file() {
                let fragment = caps.get(3).map_or("", |m| m.as_str());
                format!("{}{}.html{}\"", &caps[1], &caps[2], fragment)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
