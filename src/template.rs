//! Page assembly around a rendered markdown fragment.
//!
//! The built-in page is a [maud](https://maud.lambda.xyz/) template. A user
//! template (from `[page] template` or `--html`) is rendered with
//! [minijinja](https://docs.rs/minijinja) against the same [`PageData`]
//! record:
//!
//! ```text
//! {{ title }}        page title, already HTML-escaped
//! {{ favicon }}      favicon URL or none
//! {% for s in styles %}{{ s.kind }} / {{ s.value }}{% endfor %}
//! {{ html }}         the rendered fragment
//! {{ live_update }}  true when served by the preview server
//! ```
//!
//! Auto-escaping is off for user templates: every value is either markup
//! or has been escaped already.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use minijinja::Environment;
use serde::Serialize;
use std::fs;
use thiserror::Error;

/// Where bare theme names are looked up.
pub const THEME_URL_PREFIX: &str = "https://kpym.github.io/markdown-css/";
/// Route of the reload client, embedded in live pages.
pub const LIVE_SCRIPT_PATH: &str = "/live.js";

const TEMPLATE_NAME: &str = "page";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("{0}")]
    Render(#[from] minijinja::Error),
}

/// One stylesheet reference or inline style block, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum StyleEntry {
    Link(String),
    Inline(String),
}

impl StyleEntry {
    /// Anything with a `{` is CSS; a bare word is a theme name; the rest is a URL.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('{') {
            let css = raw
                .strip_prefix("<style>")
                .and_then(|s| s.strip_suffix("</style>"))
                .unwrap_or(raw);
            StyleEntry::Inline(css.trim().to_string())
        } else if !raw.contains('/') && !raw.contains('.') {
            StyleEntry::Link(format!("{THEME_URL_PREFIX}{raw}.min.css"))
        } else {
            StyleEntry::Link(raw.to_string())
        }
    }
}

/// Everything a page template can see.
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub favicon: Option<String>,
    pub styles: Vec<StyleEntry>,
    pub html: String,
    pub live_update: bool,
}

/// The page template in effect for a run.
#[derive(Debug)]
pub enum PageTemplate {
    Builtin,
    Custom(Environment<'static>),
}

impl PageTemplate {
    /// Resolve the template option.
    ///
    /// Empty means the built-in page, a readable file supplies the template
    /// text, and any other value is the template text itself. Syntax errors
    /// surface here, before any document is compiled.
    pub fn load(option: &str) -> Result<Self, minijinja::Error> {
        if option.trim().is_empty() {
            return Ok(PageTemplate::Builtin);
        }
        let body = fs::read_to_string(option).unwrap_or_else(|_| option.to_string());
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, body)?;
        Ok(PageTemplate::Custom(env))
    }

    pub fn render(&self, data: &PageData) -> Result<String, TemplateError> {
        match self {
            PageTemplate::Builtin => Ok(builtin_page(data).into_string()),
            PageTemplate::Custom(env) => Ok(env.get_template(TEMPLATE_NAME)?.render(data)?),
        }
    }
}

fn builtin_page(data: &PageData) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (PreEscaped(&data.title)) }
                @if let Some(favicon) = &data.favicon {
                    link rel="icon" href=(favicon);
                }
                @for style in &data.styles {
                    @match style {
                        StyleEntry::Link(href) => {
                            link rel="stylesheet" href=(href);
                        }
                        StyleEntry::Inline(css) => {
                            style { (PreEscaped(css)) }
                        }
                    }
                }
                style { (PreEscaped(BODY_CSS)) }
            }
            body {
                article.markdown-body {
                    (PreEscaped(&data.html))
                }
                @if data.live_update {
                    script src=(LIVE_SCRIPT_PATH) {}
                }
            }
        }
    }
}

const BODY_CSS: &str = ".markdown-body{box-sizing:border-box;min-width:200px;max-width:980px;margin:0 auto;padding:45px}\
@media (max-width:767px){.markdown-body{padding:15px}}";
