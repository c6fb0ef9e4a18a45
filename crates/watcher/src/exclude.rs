//! Path exclusion by basename prefix, basename suffix, and full-path regex
//!
//! Rules are loaded once at startup from three line-oriented files and are
//! immutable afterwards, so a matcher can be shared behind an `Arc` and
//! queried from any task without locking.

use fsreport_core::{Error, Result};
use regex::Regex;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, trace};

/// The rule that caused a path to be excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionRule {
    Prefix(String),
    Suffix(String),
    Pattern(String),
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(p) => write!(f, "prefix '{p}'"),
            Self::Suffix(s) => write!(f, "suffix '{s}'"),
            Self::Pattern(r) => write!(f, "pattern '{r}'"),
        }
    }
}

/// Classifies paths as excluded or included
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    patterns: Vec<Regex>,
}

impl ExclusionMatcher {
    /// A matcher that excludes nothing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ExclusionMatcherBuilder {
        ExclusionMatcherBuilder::default()
    }

    /// Load rules from the prefix, suffix, and regex files
    ///
    /// A missing file contributes no rules. Unreadable files and malformed
    /// regular expressions are configuration errors.
    pub fn load(prefix_file: &Path, suffix_file: &Path, regex_file: &Path) -> Result<Self> {
        let matcher = Self::builder()
            .prefixes(read_rule_lines(prefix_file)?)
            .suffixes(read_rule_lines(suffix_file)?)
            .patterns(read_rule_lines(regex_file)?)
            .build()?;

        info!(
            "Loaded exclusion rules: {} prefixes, {} suffixes, {} patterns",
            matcher.prefixes.len(),
            matcher.suffixes.len(),
            matcher.patterns.len()
        );
        Ok(matcher)
    }

    /// Returns the first rule that excludes `path`, if any
    ///
    /// Prefix rules are checked before suffix rules, and both apply to the
    /// basename only. Regex rules search the full path string.
    pub fn matching_rule(&self, path: &Path) -> Option<ExclusionRule> {
        if let Some(name) = path.file_name() {
            let name = name.to_string_lossy();

            if let Some(prefix) = self.prefixes.iter().find(|p| name.starts_with(p.as_str())) {
                return Some(ExclusionRule::Prefix(prefix.clone()));
            }
            if let Some(suffix) = self.suffixes.iter().find(|s| name.ends_with(s.as_str())) {
                return Some(ExclusionRule::Suffix(suffix.clone()));
            }
        }

        let full = path.to_string_lossy();
        self.patterns
            .iter()
            .find(|re| re.is_match(&full))
            .map(|re| ExclusionRule::Pattern(re.as_str().to_string()))
    }

    pub fn should_exclude(&self, path: &Path) -> bool {
        match self.matching_rule(path) {
            Some(rule) => {
                trace!("Excluding {:?} by {}", path, rule);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.suffixes.is_empty() && self.patterns.is_empty()
    }
}

/// Builder for [`ExclusionMatcher`]
#[derive(Debug, Default)]
pub struct ExclusionMatcherBuilder {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    patterns: Vec<String>,
}

impl ExclusionMatcherBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    pub fn suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes.extend(suffixes.into_iter().map(Into::into));
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Compile the rules
    ///
    /// Empty prefixes and suffixes are dropped, since they would match
    /// every basename.
    pub fn build(self) -> Result<ExclusionMatcher> {
        let patterns = self
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| Error::config(format!("Invalid exclusion pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ExclusionMatcher {
            prefixes: self.prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
            suffixes: self.suffixes.into_iter().filter(|s| !s.is_empty()).collect(),
            patterns,
        })
    }
}

/// Read one rule per line, skipping blanks and `#` comments
///
/// A file that does not exist yields no rules.
pub fn read_rule_lines(path: &Path) -> Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Rule file {} not found, no rules loaded", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(Error::config(format!(
                "Failed to read rule file {}: {e}",
                path.display()
            )));
        }
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}
