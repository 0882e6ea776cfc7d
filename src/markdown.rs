//! Markdown to HTML fragment conversion.
//!
//! Parsing is delegated to [pulldown-cmark](https://docs.rs/pulldown-cmark).
//! The switches in [`MarkdownOptions`] map onto parser extensions where the
//! parser has them, and onto small passes over the event stream where it
//! does not:
//!
//! | Switch            | Implemented by                                  |
//! |-------------------|-------------------------------------------------|
//! | `table`, `footnote`, `strikethrough`, `task_list`, `definition_list` | parser extension |
//! | `typographer`     | smart punctuation extension                     |
//! | `attribute`       | heading attribute extension (`# Title {#id}`)   |
//! | `linkify`         | bare `http(s)://` and `www.` text become links  |
//! | `auto_heading_id` | slug ids for headings without an explicit one   |
//! | `unsafe`          | raw HTML kept; otherwise replaced by a comment  |
//! | `hard_wraps`      | soft line breaks rendered as `<br />`           |

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, html};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkdownError {
    #[error("document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Parser feature switches, forwarded unchanged from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownOptions {
    pub attribute: bool,
    pub auto_heading_id: bool,
    pub definition_list: bool,
    pub footnote: bool,
    pub linkify: bool,
    pub strikethrough: bool,
    pub table: bool,
    pub task_list: bool,
    pub typographer: bool,
    #[serde(rename = "unsafe")]
    pub unsafe_html: bool,
    pub hard_wraps: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            attribute: true,
            auto_heading_id: true,
            definition_list: true,
            footnote: true,
            linkify: true,
            strikethrough: true,
            table: true,
            task_list: true,
            typographer: true,
            unsafe_html: true,
            hard_wraps: false,
        }
    }
}

impl MarkdownOptions {
    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        let switches = [
            (self.table, Options::ENABLE_TABLES),
            (self.footnote, Options::ENABLE_FOOTNOTES),
            (self.strikethrough, Options::ENABLE_STRIKETHROUGH),
            (self.task_list, Options::ENABLE_TASKLISTS),
            (self.typographer, Options::ENABLE_SMART_PUNCTUATION),
            (self.attribute, Options::ENABLE_HEADING_ATTRIBUTES),
            (self.definition_list, Options::ENABLE_DEFINITION_LIST),
        ];
        for (enabled, flag) in switches {
            if enabled {
                options.insert(flag);
            }
        }
        options
    }
}

const RAW_HTML_OMITTED: &str = "<!-- raw HTML omitted -->";

/// Convert markdown source to an HTML fragment.
pub fn render(source: &[u8], options: &MarkdownOptions) -> Result<String, MarkdownError> {
    let text = std::str::from_utf8(source)?;
    let mut events: Vec<Event> = Parser::new_ext(text, options.parser_options()).collect();

    if options.hard_wraps {
        for event in events.iter_mut() {
            if matches!(event, Event::SoftBreak) {
                *event = Event::HardBreak;
            }
        }
    }
    if !options.unsafe_html {
        events = omit_raw_html(events);
    }
    if options.linkify {
        events = linkify(merge_text(events));
    }
    if options.auto_heading_id {
        assign_heading_ids(&mut events);
    }

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    Ok(out)
}

fn omit_raw_html(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut in_block = false;
    for event in events {
        match event {
            Event::Start(Tag::HtmlBlock) => {
                in_block = true;
                out.push(Event::Html(CowStr::from(format!("{RAW_HTML_OMITTED}\n"))));
            }
            Event::End(TagEnd::HtmlBlock) => in_block = false,
            Event::Html(_) if in_block => {}
            Event::Html(_) => out.push(Event::Html(CowStr::Borrowed(RAW_HTML_OMITTED))),
            Event::InlineHtml(_) => out.push(Event::InlineHtml(CowStr::Borrowed(RAW_HTML_OMITTED))),
            other => out.push(other),
        }
    }
    out
}

/// The parser may split one run of text into several events; join them so
/// URLs are seen whole.
fn merge_text(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out: Vec<Event> = Vec::with_capacity(events.len());
    for event in events {
        if let (Some(Event::Text(prev)), Event::Text(next)) = (out.last_mut(), &event) {
            let joined = format!("{prev}{next}");
            *prev = CowStr::from(joined);
            continue;
        }
        out.push(event);
    }
    out
}

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:https?://|www\.)[^\s<>"'`]+"#).expect("valid url regex"));

/// Drop trailing punctuation that more likely ends the sentence than the URL.
fn trim_url(url: &str) -> &str {
    let mut url = url.trim_end_matches(['.', ',', ':', ';', '!', '?', '*', '_', '~']);
    while url.ends_with(')') && url.matches(')').count() > url.matches('(').count() {
        url = &url[..url.len() - 1];
        url = url.trim_end_matches(['.', ',', ':', ';', '!', '?', '*', '_', '~']);
    }
    url
}

fn linkify(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    // Depth inside links, images and code blocks, where text stays text
    let mut opaque = 0usize;
    for event in events {
        match &event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. } | Tag::CodeBlock(_)) => opaque += 1,
            Event::End(TagEnd::Link | TagEnd::Image | TagEnd::CodeBlock) => {
                opaque = opaque.saturating_sub(1)
            }
            Event::Text(text) if opaque == 0 && URL.is_match(text) => {
                push_linkified(text, &mut out);
                continue;
            }
            _ => {}
        }
        out.push(event);
    }
    out
}

fn push_linkified(text: &str, out: &mut Vec<Event<'_>>) {
    let mut last = 0;
    for m in URL.find_iter(text) {
        let url = trim_url(m.as_str());
        if url.len() <= "www.".len() {
            continue;
        }
        if m.start() > last {
            out.push(Event::Text(CowStr::from(text[last..m.start()].to_string())));
        }
        let dest = if url.starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(dest),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        out.push(Event::Text(CowStr::from(url.to_string())));
        out.push(Event::End(TagEnd::Link));
        last = m.start() + url.len();
    }
    if last < text.len() {
        out.push(Event::Text(CowStr::from(text[last..].to_string())));
    }
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    // Explicit ids are reserved first so generated ones never collide
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            seen.insert(id.to_string(), 0);
        }
    }

    for i in 0..events.len() {
        if !matches!(events[i], Event::Start(Tag::Heading { id: None, .. })) {
            continue;
        }
        let slug = unique_slug(slugify(&heading_text(&events[i + 1..])), &mut seen);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
    }
}

fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// Lowercase, spaces and dashes to `-`, other punctuation dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "heading".to_string()
    } else {
        slug.to_string()
    }
}

/// First free id among `base`, `base-1`, `base-2`, ...
fn unique_slug(base: String, seen: &mut HashMap<String, usize>) -> String {
    let Some(&used) = seen.get(&base) else {
        seen.insert(base.clone(), 0);
        return base;
    };
    let mut n = used;
    let candidate = loop {
        n += 1;
        let candidate = format!("{base}-{n}");
        if !seen.contains_key(&candidate) {
            break candidate;
        }
    };
    seen.insert(base, n);
    seen.insert(candidate.clone(), 0);
    candidate
}
