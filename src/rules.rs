//! Ordered find/replace rules applied to raw text buffers.
//!
//! A rule is written as `<delim>pattern<delim>replacement[<delim>[comment]]`,
//! where `<delim>` is the first character of the string. The delimiter cannot
//! be escaped, so it must not appear in the pattern or the replacement:
//!
//! ```text
//! /colour/color/            plain replacement
//! |<b>(.*?)</b>|<strong>$1</strong>|   capture groups use `$1` / `${name}`
//! #TODO#**TODO**#  highlight todos     trailing text is a comment
//! ```
//!
//! Rules run as a pipeline: each rule sees the output of the previous one.
//! Two rule lists exist per run, one applied to the markdown source before
//! parsing and one applied to the rendered HTML page.

use regex::bytes::Regex;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("invalid delimiter in rule: {0}")]
    InvalidDelimiter(String),
    #[error("invalid rule format (expected <d>pattern<d>replace<d>): {0}")]
    InvalidFormat(String),
    #[error("invalid pattern in rule {rule}: {reason}")]
    InvalidPattern { rule: String, reason: String },
}

/// One compiled substitution.
#[derive(Debug, Clone)]
pub struct SubstRule {
    pattern: Regex,
    replace: Vec<u8>,
}

impl SubstRule {
    /// Parse a single rule specification.
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let delimiter = text
            .chars()
            .next()
            .ok_or_else(|| RuleError::InvalidDelimiter(text.to_string()))?;

        // parts[0] is the empty string before the leading delimiter
        let parts: Vec<&str> = text.splitn(4, delimiter).collect();
        if parts.len() < 3 {
            return Err(RuleError::InvalidFormat(text.to_string()));
        }

        let pattern = Regex::new(parts[1]).map_err(|e| RuleError::InvalidPattern {
            rule: text.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern,
            replace: parts[2].as_bytes().to_vec(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &[u8] {
        &self.replace
    }

    pub fn apply(&self, input: &[u8]) -> Vec<u8> {
        self.pattern
            .replace_all(input, self.replace.as_slice())
            .into_owned()
    }
}

const PREFERRED_DELIMITERS: &str = "/|#@!$%^&*()[]{}<>?;:'\"\\`~";

impl fmt::Display for SubstRule {
    /// Re-serialize with the first delimiter absent from both halves.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = self.pattern.as_str();
        let replace = String::from_utf8_lossy(&self.replace);
        let free = |d: &char| !pattern.contains(*d) && !replace.contains(*d);

        let delimiter = PREFERRED_DELIMITERS
            .chars()
            .find(free)
            .or_else(|| (0x80..=u32::from(char::MAX)).filter_map(char::from_u32).find(free))
            .ok_or(fmt::Error)?;

        write!(f, "{delimiter}{pattern}{delimiter}{replace}{delimiter}")
    }
}

/// Rules applied in list order, each on the previous rule's output.
#[derive(Debug, Clone, Default)]
pub struct SubstRuleList {
    rules: Vec<SubstRule>,
}

impl SubstRuleList {
    /// Decode a newline-separated list of rule specifications.
    ///
    /// A line naming a readable file is replaced by that file's lines (one
    /// level, no recursion). Blank lines are dropped. Invalid rules are
    /// skipped; the first failure is returned next to the rules that did
    /// parse so the caller can decide whether to abort.
    pub fn load(text: &str) -> (Self, Option<RuleError>) {
        let mut rules = Vec::new();
        let mut first_error = None;

        for line in expand_rule_files(text) {
            match SubstRule::parse(&line) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        (Self { rules }, first_error)
    }

    /// Load from several specification chunks, e.g. repeated CLI flags.
    pub fn load_all<S: AsRef<str>>(texts: &[S]) -> (Self, Option<RuleError>) {
        let joined = texts
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join("\n");
        Self::load(&joined)
    }

    pub fn apply(&self, input: Vec<u8>) -> Vec<u8> {
        self.rules
            .iter()
            .fold(input, |buffer, rule| rule.apply(&buffer))
    }
}

fn expand_rule_files(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let path = Path::new(line);
        if path.is_file() {
            // Unreadable include files contribute nothing
            if let Ok(content) = fs::read_to_string(path) {
                lines.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(String::from),
                );
            }
        } else {
            lines.push(line.to_string());
        }
    }
    lines
}
