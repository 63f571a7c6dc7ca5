//! Line-oriented `.env` document model
//!
//! Text is split into lines classified as blank, comment, `KEY=VALUE`
//! assignment or anything else. Rendering reproduces unchanged lines byte for
//! byte, so edits touch only the lines they target.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static ASSIGNMENT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("static regex pattern is valid")
});

/// One line of a `.env` document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvLine {
    /// Empty or whitespace-only (raw text kept)
    Blank(String),
    /// First non-whitespace character is `#` (raw text kept)
    Comment(String),
    /// `KEY=VALUE`; the value is everything after the first `=`
    Assignment { key: String, value: String },
    /// Any other line, kept verbatim
    Other(String),
}

impl EnvLine {
    /// Classify a single line (without its newline)
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            return EnvLine::Blank(line.to_string());
        }
        if trimmed.starts_with('#') {
            return EnvLine::Comment(line.to_string());
        }
        match line.split_once('=') {
            Some((key, value)) if ASSIGNMENT_KEY.is_match(key) => EnvLine::Assignment {
                key: key.to_string(),
                value: value.to_string(),
            },
            _ => EnvLine::Other(line.to_string()),
        }
    }

    /// Lines that are never scanned for tokens
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        matches!(self, EnvLine::Blank(_) | EnvLine::Comment(_))
    }

    /// The text that token substitution operates on
    #[must_use]
    pub fn scannable_text(&self) -> Option<&str> {
        match self {
            EnvLine::Assignment { value, .. } => Some(value),
            EnvLine::Other(raw) => Some(raw),
            EnvLine::Blank(_) | EnvLine::Comment(_) => None,
        }
    }
}

impl fmt::Display for EnvLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvLine::Blank(raw) | EnvLine::Comment(raw) | EnvLine::Other(raw) => f.write_str(raw),
            EnvLine::Assignment { key, value } => write!(f, "{key}={value}"),
        }
    }
}

/// A parsed `.env` document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDocument {
    lines: Vec<EnvLine>,
    trailing_newline: bool,
}

impl EnvDocument {
    #[must_use]
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(EnvLine::parse).collect(),
            trailing_newline: content.ends_with('\n'),
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[EnvLine] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut [EnvLine] {
        &mut self.lines
    }

    /// Value of the first assignment to `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            EnvLine::Assignment { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace the value of every assignment to `key`; returns whether any existed
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let mut found = false;
        for line in &mut self.lines {
            if let EnvLine::Assignment { key: k, value: v } = line {
                if k == key {
                    *v = value.to_string();
                    found = true;
                }
            }
        }
        found
    }

    /// Replace `key` in place, or append it when absent
    pub fn set_or_append(&mut self, key: &str, value: &str) {
        if !self.set(key, value) {
            self.lines.push(EnvLine::Assignment {
                key: key.to_string(),
                value: value.to_string(),
            });
            // An appended line always ends with a newline
            self.trailing_newline = true;
        }
    }

    /// Rewrite the value of every assignment with `f(key, value)`
    pub fn map_values(&mut self, mut f: impl FnMut(&str, &str) -> Option<String>) {
        for line in &mut self.lines {
            if let EnvLine::Assignment { key, value } = line {
                if let Some(new_value) = f(key, value) {
                    *value = new_value;
                }
            }
        }
    }

    /// Keys in first-assignment order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            EnvLine::Assignment { key, .. } => Some(key.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for EnvDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{line}")?;
        }
        if self.trailing_newline && !self.lines.is_empty() {
            f.write_str("\n")?;
        }
        Ok(())
    }
}
