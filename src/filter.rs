//! Ordered include/exclude rules deciding which files get fingerprinted.
//!
//! # Rule file format
//!
//! One rule per line. Blank lines and lines starting with `#` are ignored.
//! Every other line starts with `+` (include) or `-` (exclude) followed by a
//! regular expression that is searched for in the canonical path:
//!
//! ```text
//! # skip editor droppings, fingerprint everything else
//! -\.tmp$
//! -(^|/)\.DS_Store$
//! +.*
//! ```
//!
//! Rules are evaluated top to bottom and the first matching rule decides.
//! A path no rule matches is excluded, so an empty rule set excludes
//! everything.
//!
//! # Example
//!
//! ```
//! use diskprint::filter::FilterSet;
//!
//! let filters = FilterSet::parse("-\\.tmp$\n+.*\n").unwrap();
//! assert!(!filters.is_eligible("a.tmp"));
//! assert!(filters.is_eligible("a.txt"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::scanner::path_utils::normalize_path_str;

/// Errors raised while loading filter rules. All of them are fatal.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    /// The rule file could not be read.
    #[error("Failed to read filter rule file {path}: {source}")]
    Read {
        /// Rule file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The rule file is not UTF-8 text.
    #[error("Filter rule file is not valid UTF-8: {0}")]
    Encoding(PathBuf),

    /// A line does not start with `+` or `-`.
    #[error("Malformed filter rule at line {line}: expected '+' or '-' but found '{found}'")]
    InvalidPrefix {
        /// 1-based line number
        line: usize,
        /// The offending first character
        found: char,
    },

    /// A `+`/`-` marker without a pattern.
    #[error("Malformed filter rule at line {line}: missing pattern")]
    MissingPattern {
        /// 1-based line number
        line: usize,
    },

    /// The pattern is not a valid regular expression.
    #[error("Malformed filter rule at line {line}: {source}")]
    InvalidPattern {
        /// 1-based line number
        line: usize,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },
}

/// A single rule: pattern plus inclusion flag.
#[derive(Debug, Clone)]
pub struct FilterRule {
    pattern: Regex,
    include: bool,
}

impl FilterRule {
    /// Compile a rule.
    ///
    /// # Errors
    ///
    /// Returns the regex compilation error for an invalid pattern.
    pub fn new(pattern: &str, include: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            include,
        })
    }

    /// `Some(include)` when the pattern matches, `None` otherwise.
    #[must_use]
    pub fn decide(&self, canonical_path: &str) -> Option<bool> {
        self.pattern
            .is_match(canonical_path)
            .then_some(self.include)
    }

    /// Whether this rule includes matching paths.
    #[must_use]
    pub fn is_include(&self) -> bool {
        self.include
    }
}

/// Ordered rule list; first match wins, default exclude.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    rules: Vec<FilterRule>,
}

impl FilterSet {
    /// Load and parse a rule file.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable, not UTF-8, or contains a
    /// malformed rule.
    pub fn load(path: &Path) -> Result<Self, FilterError> {
        let bytes = fs::read(path).map_err(|source| FilterError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text =
            String::from_utf8(bytes).map_err(|_| FilterError::Encoding(path.to_path_buf()))?;

        let filters = Self::parse(&text)?;
        log::debug!(
            "Loaded {} filter rules from {}",
            filters.len(),
            path.display()
        );
        Ok(filters)
    }

    /// Parse rule text.
    ///
    /// The text is NFC-composed first so rules written on a decomposing
    /// filesystem still match canonical paths.
    ///
    /// # Errors
    ///
    /// Returns the first malformed line as a [`FilterError`].
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let text = normalize_path_str(text);
        let mut rules = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut chars = line.chars();
            let include = match chars.next() {
                Some('+') => true,
                Some('-') => false,
                Some(found) => {
                    return Err(FilterError::InvalidPrefix {
                        line: line_number,
                        found,
                    })
                }
                None => continue,
            };

            let pattern = chars.as_str();
            if pattern.is_empty() {
                return Err(FilterError::MissingPattern { line: line_number });
            }

            let rule = FilterRule::new(pattern, include).map_err(|source| {
                FilterError::InvalidPattern {
                    line: line_number,
                    source,
                }
            })?;
            rules.push(rule);
        }

        Ok(Self { rules })
    }

    /// Decide whether a canonical path should be hashed.
    #[must_use]
    pub fn is_eligible(&self, canonical_path: &str) -> bool {
        self.rules
            .iter()
            .find_map(|rule| rule.decide(canonical_path))
            .unwrap_or(false)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules (and therefore excludes everything).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over the rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &FilterRule> {
        self.rules.iter()
    }
}
