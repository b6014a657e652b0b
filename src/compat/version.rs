//! Semantic version and constraint evaluation.
//!
//! Versions are parsed leniently: a leading `v` is dropped and missing
//! minor/patch components are filled with zero, so `v1.30` reads as
//! `1.30.0`. Constraints accept the range grammar used in chart
//! annotations:
//! - comparators separated by commas or spaces (`>= 1.2, < 2.0`)
//! - alternatives separated by `||`
//! - hyphen ranges (`1.2 - 1.4`)
//! - `~`, `^` and wildcards (`1.x`, `1.2.*`)
//! - `!=` exclusions (`>= 1.29, != 1.30.0`) and the `=>`/`=<` spellings
//!
//! A bare version is an exact match. An empty constraint matches everything.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use thiserror::Error;

/// A version or constraint that failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("failed to parse {field} version {value:?}: {reason}")]
    Version {
        field: String,
        value: String,
        reason: String,
    },

    #[error("failed to parse {field} constraint {value:?}: {reason}")]
    Constraint {
        field: String,
        value: String,
        reason: String,
    },
}

/// Parse a version string, tolerating a `v` prefix and short forms.
pub fn parse_version(version: &str) -> Result<Version, semver::Error> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    // Pad only the numeric core; pre-release and build metadata stay as-is
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let normalized = match core.matches('.').count() {
        0 => format!("{core}.0.0{rest}"),
        1 => format!("{core}.0{rest}"),
        _ => trimmed.to_string(),
    };

    Version::parse(&normalized)
}

/// A parsed version constraint.
///
/// Holds one entry per `||` alternative. No alternatives means the
/// constraint was empty and matches any version.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraint {
    alternatives: Vec<Alternative>,
}

/// One `||` alternative: a range plus the versions `!=` carves out of it.
#[derive(Clone, Debug, PartialEq)]
struct Alternative {
    req: VersionReq,
    excluded: Vec<Version>,
}

impl Alternative {
    fn matches(&self, version: &Version) -> bool {
        // Build metadata never distinguishes versions
        self.req.matches(version)
            && !self.excluded.iter().any(|ex| {
                ex.major == version.major
                    && ex.minor == version.minor
                    && ex.patch == version.patch
                    && ex.pre == version.pre
            })
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(self.excluded.len() + 1);
        if self.excluded.is_empty() || self.req != VersionReq::STAR {
            parts.push(self.req.to_string());
        }
        parts.extend(self.excluded.iter().map(|v| format!("!={v}")));
        f.write_str(&parts.join(", "))
    }
}

impl Constraint {
    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.is_any() || self.alternatives.iter().any(|alt| alt.matches(version))
    }
}

impl FromStr for Constraint {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let alternatives = s
            .split("||")
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Constraint { alternatives })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("*");
        }
        let alternatives: Vec<String> = self.alternatives.iter().map(|a| a.to_string()).collect();
        f.write_str(&alternatives.join(" || "))
    }
}

/// Parse one `||` alternative. Range comparators go to `semver::VersionReq`
/// syntax; `!=` operands become exclusions.
fn parse_alternative(alt: &str) -> Result<Alternative, semver::Error> {
    // Split on commas and whitespace, then glue dangling operators
    // (`>= 1.2`) back onto their operand.
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for raw in alt.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
        if is_operator(raw) && raw != "-" {
            pending_op = Some(raw);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{op}{raw}")),
            None => tokens.push(raw.to_string()),
        }
    }
    if let Some(op) = pending_op {
        tokens.push(op.to_string());
    }

    let mut comparators = Vec::with_capacity(tokens.len());
    let mut excluded = Vec::new();
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if iter.peek().is_some_and(|t| t == "-") {
            iter.next();
            let upper = iter.next().unwrap_or_default();
            comparators.push(format!(">={}", strip_v(&token)));
            comparators.push(format!("<={}", strip_v(&upper)));
            continue;
        }
        if let Some(operand) = token.strip_prefix("!=") {
            excluded.push(parse_version(operand)?);
            continue;
        }
        comparators.push(normalize_comparator(&token));
    }

    let req = if comparators.is_empty() {
        VersionReq::STAR
    } else {
        VersionReq::parse(&comparators.join(", "))?
    };
    Ok(Alternative { req, excluded })
}

fn is_operator(token: &str) -> bool {
    token.chars().all(|c| matches!(c, '=' | '!' | '<' | '>' | '~' | '^' | '-'))
}

fn normalize_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| !matches!(c, '=' | '<' | '>' | '~' | '^'))
        .unwrap_or(token.len());
    let (op, operand) = token.split_at(split);
    let operand = strip_v(operand);
    let is_wildcard = operand == "*" || operand.contains(".x") || operand.contains(".*");
    match op {
        "" if is_wildcard || operand.eq_ignore_ascii_case("x") => operand.to_string(),
        "" => format!("={operand}"),
        "=>" => format!(">={operand}"),
        "=<" => format!("<={operand}"),
        op => format!("{op}{operand}"),
    }
}

fn strip_v(s: &str) -> &str {
    s.strip_prefix('v').unwrap_or(s)
}

/// Check `version` against `constraint`, naming `field` in parse errors.
///
/// An empty constraint or an empty version is always satisfied.
pub fn satisfies(version: &str, constraint: &str, field: &str) -> Result<bool, ConstraintError> {
    if constraint.trim().is_empty() || version.trim().is_empty() {
        return Ok(true);
    }

    let parsed_version = parse_version(version).map_err(|e| ConstraintError::Version {
        field: field.to_string(),
        value: version.to_string(),
        reason: e.to_string(),
    })?;
    let parsed_constraint: Constraint =
        constraint.parse().map_err(|e: semver::Error| ConstraintError::Constraint {
            field: field.to_string(),
            value: constraint.to_string(),
            reason: e.to_string(),
        })?;

    Ok(parsed_constraint.matches(&parsed_version))
}
