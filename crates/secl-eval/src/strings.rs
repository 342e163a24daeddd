//! String matchers and constant string sets.
//!
//! Scalar string literals compare by equality; `~"..."` patterns use
//! shell-style globbing (`*` any run, `?` one character, anchored at both
//! ends); `r"..."` literals use full regular expressions. Globs are
//! translated to regexes once, at compile time.

use std::collections::HashSet;

use regex::Regex;
use secl_ast::Pos;

use crate::error::{CompileError, Result};
use crate::evaluator::ValueType;

/// A compiled matcher for one string value.
#[derive(Debug, Clone)]
pub enum StringMatcher {
    /// Literal equality.
    Literal(String),
    /// Shell-style glob, compiled to an anchored regex.
    Glob(Regex),
    /// A user-supplied regular expression.
    Regex(Regex),
}

impl StringMatcher {
    /// Compile a matcher for a constant of the given value type.
    pub fn compile(value_type: ValueType, value: &str) -> Result<Self> {
        match value_type {
            ValueType::Pattern => {
                let translated = glob_to_regex(value);
                let re = Regex::new(&translated).map_err(|source| {
                    CompileError::InvalidPattern {
                        pos: Pos::default(),
                        pattern: value.to_string(),
                        source,
                    }
                })?;
                Ok(StringMatcher::Glob(re))
            }
            ValueType::Regexp => {
                let re = Regex::new(value).map_err(|source| CompileError::InvalidPattern {
                    pos: Pos::default(),
                    pattern: value.to_string(),
                    source,
                })?;
                Ok(StringMatcher::Regex(re))
            }
            _ => Ok(StringMatcher::Literal(value.to_string())),
        }
    }

    /// Whether the candidate string matches.
    pub fn matches(&self, s: &str) -> bool {
        match self {
            StringMatcher::Literal(v) => v == s,
            StringMatcher::Glob(re) | StringMatcher::Regex(re) => re.is_match(s),
        }
    }

    /// Whether this matcher is regex-backed (glob or regexp).
    pub fn is_pattern(&self) -> bool {
        !matches!(self, StringMatcher::Literal(_))
    }
}

/// Translate a glob into an anchored regex source string.
///
/// `*` becomes `.*`, `?` becomes `.`; everything else is escaped.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// A constant set of string members, precompiled for containment tests.
///
/// Scalar members live in a hash set; pattern and regex members keep their
/// compiled matchers and are scanned in order.
#[derive(Debug, Clone, Default)]
pub struct StringValues {
    scalars: HashSet<String>,
    matchers: Vec<StringMatcher>,
}

impl StringValues {
    /// Add a scalar member.
    pub fn append_scalar(&mut self, value: &str) {
        self.scalars.insert(value.to_string());
    }

    /// Add a glob pattern member.
    pub fn append_pattern(&mut self, value: &str) -> Result<()> {
        self.matchers
            .push(StringMatcher::compile(ValueType::Pattern, value)?);
        Ok(())
    }

    /// Add a regex member.
    pub fn append_regexp(&mut self, value: &str) -> Result<()> {
        self.matchers
            .push(StringMatcher::compile(ValueType::Regexp, value)?);
        Ok(())
    }

    /// Whether the candidate is a member of the set.
    pub fn matches(&self, s: &str) -> bool {
        self.scalars.contains(s) || self.matchers.iter().any(|m| m.matches(s))
    }

    /// Whether the set contains pattern or regex members.
    pub fn has_patterns(&self) -> bool {
        !self.matchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scalars.len() + self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<String> for StringValues {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut values = StringValues::default();
        for s in iter {
            values.append_scalar(&s);
        }
        values
    }
}
