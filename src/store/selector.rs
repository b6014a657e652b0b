//! Label selectors.
//!
//! Parses the Kubernetes string selector grammar (`a=b,c!=d,e in (f,g),!h`)
//! into kube's [`Selector`], which handles matching and renders the string
//! sent to the API server. Structured `LabelSelector`s convert through
//! kube's own `TryFrom`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use kube::core::{Expression, ParseExpressionError, Selector};
use regex::Regex;
use thiserror::Error;

/// Maximum length of a label name or value.
const MAX_LABEL_LENGTH: usize = 63;
/// Maximum length of a label key prefix (DNS subdomain).
const MAX_PREFIX_LENGTH: usize = 253;

static NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").ok());
static PREFIX_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").ok()
});
static SET_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+(in|notin)\s*\((.*)\)$").ok());

/// Errors produced while building a selector.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("invalid label key {0:?}")]
    InvalidKey(String),

    #[error("invalid label value {0:?}")]
    InvalidValue(String),

    #[error("unable to parse requirement {0:?}")]
    Malformed(String),

    #[error(transparent)]
    Structured(#[from] ParseExpressionError),
}

/// Parse a string selector. The empty string selects everything.
pub fn parse_selector(s: &str) -> Result<Selector, SelectorError> {
    split_top_level(s)
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_requirement)
        .collect()
}

/// Split on commas that are not inside a parenthesised value set.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_requirement(part: &str) -> Result<Expression, SelectorError> {
    if let Some(key) = part.strip_prefix('!') {
        return Ok(Expression::DoesNotExist(validated_key(key.trim())?));
    }

    if let Some(caps) = SET_RE.as_ref().and_then(|re| re.captures(part)) {
        let key = validated_key(caps.get(1).map_or("", |m| m.as_str()))?;
        let values = caps
            .get(3)
            .map_or("", |m| m.as_str())
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(validated_value)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if values.is_empty() {
            return Err(SelectorError::Malformed(part.to_string()));
        }
        return Ok(match caps.get(2).map(|m| m.as_str()) {
            Some("in") => Expression::In(key, values),
            _ => Expression::NotIn(key, values),
        });
    }

    if let Some((key, value)) = part.split_once("!=") {
        return Ok(Expression::NotEqual(
            validated_key(key.trim())?,
            validated_value(value.trim())?,
        ));
    }

    if let Some((key, value)) = part.split_once("==").or_else(|| part.split_once('=')) {
        return Ok(Expression::Equal(
            validated_key(key.trim())?,
            validated_value(value.trim())?,
        ));
    }

    if part.contains(char::is_whitespace) || part.contains(['(', ')']) {
        return Err(SelectorError::Malformed(part.to_string()));
    }
    Ok(Expression::Exists(validated_key(part)?))
}

fn is_label_name(s: &str) -> bool {
    s.len() <= MAX_LABEL_LENGTH && NAME_RE.as_ref().is_some_and(|re| re.is_match(s))
}

fn validated_key(key: &str) -> Result<String, SelectorError> {
    let valid = match key.split_once('/') {
        Some((prefix, name)) => {
            !prefix.is_empty()
                && prefix.len() <= MAX_PREFIX_LENGTH
                && PREFIX_RE.as_ref().is_some_and(|re| re.is_match(prefix))
                && is_label_name(name)
        }
        None => is_label_name(key),
    };
    if valid {
        Ok(key.to_string())
    } else {
        Err(SelectorError::InvalidKey(key.to_string()))
    }
}

fn validated_value(value: &str) -> Result<String, SelectorError> {
    if value.is_empty() || is_label_name(value) {
        Ok(value.to_string())
    } else {
        Err(SelectorError::InvalidValue(value.to_string()))
    }
}
