//! Key Pattern Module
//!
//! Two matchers with different strictness live here:
//! - [`matches_wildcard_pattern`] is the glob engine used by bulk invalidation
//!   (`*` = any sequence, `?` = one character, anchored to the whole key).
//! - [`matches_subscription_key`] is the cheap prefix test used by
//!   subscriptions.

use regex::Regex;

// == Wildcard Matcher ==
/// A compiled, fully anchored wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardMatcher {
    /// None when compilation failed; such a matcher never matches.
    regex: Option<Regex>,
}

impl WildcardMatcher {
    /// Returns true if `key` matches the whole pattern.
    pub fn is_match(&self, key: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(key))
    }
}

// == Pattern To Matcher ==
/// Compiles a glob-style key pattern into an anchored matcher.
///
/// `*` becomes `.*`, `?` becomes `.`, everything else is matched literally,
/// including regex metacharacters such as `.`, `+` or `(`.
pub fn pattern_to_matcher(pattern: &str) -> WildcardMatcher {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("^(?s:");

    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                if !literal.is_empty() {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                source.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        source.push_str(&regex::escape(&literal));
    }
    source.push_str(")$");

    let regex = Regex::new(&source)
        .map_err(|e| {
            tracing::warn!(
                pattern = %pattern,
                error = %e,
                "invalid wildcard pattern, it will never match"
            );
            e
        })
        .ok();
    WildcardMatcher { regex }
}

// == Matches Wildcard Pattern ==
/// One-shot form of [`pattern_to_matcher`].
pub fn matches_wildcard_pattern(pattern: &str, key: &str) -> bool {
    pattern_to_matcher(pattern).is_match(key)
}

// == Matches Subscription Key ==
/// Subscription matching rules, in order:
/// 1. exact equality
/// 2. `key` starts with `pattern + ":"`
/// 3. `pattern` ends with `*` and `key` starts with the part before it
///
/// Only a trailing `*` is special; `?` and inner `*` are literal here.
pub fn matches_subscription_key(key: &str, pattern: &str) -> bool {
    if key == pattern {
        return true;
    }

    if key
        .strip_prefix(pattern)
        .is_some_and(|rest| rest.starts_with(':'))
    {
        return true;
    }

    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => false,
    }
}
