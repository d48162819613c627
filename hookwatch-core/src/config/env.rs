//! `$VAR` / `${VAR}` expansion from the process environment

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}]*)\}|\$([A-Za-z0-9_]+)")
        .expect("Invalid regex pattern")
});

/// Expand environment references; unset variables become empty strings
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand references using a custom lookup
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let expanded: Cow<'_, str> = VAR_PATTERN.replace_all(input, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        if name.is_empty() {
            String::new()
        } else {
            lookup(name).unwrap_or_default()
        }
    });
    expanded.into_owned()
}
