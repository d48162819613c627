//! File name filtering with shell-style globs

use crate::config::DEFAULT_PATTERN;
use globset::{Glob, GlobMatcher};
use std::path::Path;
use tracing::{debug, warn};

/// Compiled file name pattern
///
/// Matching only ever looks at the final path component. The default
/// pattern `*.*` accepts every name, including names without a dot.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: String,
    kind: MatcherKind,
}

#[derive(Debug, Clone)]
enum MatcherKind {
    Any,
    Glob(GlobMatcher),
    Invalid,
}

impl PatternMatcher {
    /// Compile a pattern; an empty pattern means match-all
    pub fn new(pattern: &str) -> Self {
        let pattern = normalize(pattern);

        let kind = if pattern == DEFAULT_PATTERN {
            MatcherKind::Any
        } else {
            match Glob::new(pattern) {
                Ok(glob) => MatcherKind::Glob(glob.compile_matcher()),
                Err(e) => {
                    warn!(
                        "Invalid file pattern {:?}, no files will match: {}",
                        pattern, e
                    );
                    MatcherKind::Invalid
                }
            }
        };

        Self {
            pattern: pattern.to_string(),
            kind,
        }
    }

    /// The normalized pattern text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern compiled
    pub fn is_valid(&self) -> bool {
        !matches!(self.kind, MatcherKind::Invalid)
    }

    /// Check the base name of `path` against the pattern
    pub fn is_match(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };

        match &self.kind {
            MatcherKind::Any => true,
            MatcherKind::Glob(matcher) => matcher.is_match(name),
            MatcherKind::Invalid => {
                debug!(
                    "Skipping {:?}: file pattern {:?} is invalid",
                    path, self.pattern
                );
                false
            }
        }
    }
}

/// One-shot match of `path` against `pattern`
pub fn matches(path: impl AsRef<Path>, pattern: &str) -> bool {
    PatternMatcher::new(pattern).is_match(path.as_ref())
}

fn normalize(pattern: &str) -> &str {
    if pattern.is_empty() {
        DEFAULT_PATTERN
    } else {
        pattern
    }
}
