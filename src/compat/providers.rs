//! Provider compatibility between templates and the platform.
//!
//! A template declares the providers it requires, optionally with a version
//! constraint. The Management status lists the providers that are ready,
//! with exact versions. Each category is compared independently and every
//! category is checked, so a single call reports all problems at once.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::CompatError;
use super::version::{ConstraintError, satisfies};
use crate::crd::{ProviderTuple, Providers};

/// CAPI provider category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderCategory {
    Bootstrap,
    ControlPlane,
    Infrastructure,
}

impl ProviderCategory {
    pub const ALL: [ProviderCategory; 3] = [
        ProviderCategory::Bootstrap,
        ProviderCategory::ControlPlane,
        ProviderCategory::Infrastructure,
    ];

    /// Label used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            ProviderCategory::Bootstrap => "bootstrap",
            ProviderCategory::ControlPlane => "control plane",
            ProviderCategory::Infrastructure => "infrastructure",
        }
    }

    /// Providers of this category.
    pub fn select(self, providers: &Providers) -> &[ProviderTuple] {
        match self {
            ProviderCategory::Bootstrap => &providers.bootstrap_providers,
            ProviderCategory::ControlPlane => &providers.control_plane_providers,
            ProviderCategory::Infrastructure => &providers.infrastructure_providers,
        }
    }
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Required providers absent from `exposed`, in `required` order.
pub fn missing_providers(exposed: &[ProviderTuple], required: &[ProviderTuple]) -> Vec<String> {
    required
        .iter()
        .filter(|r| !exposed.iter().any(|e| e.name == r.name))
        .map(|r| r.name.clone())
        .collect()
}

/// Required providers whose exposed version falls outside their constraint.
///
/// Entries read `"<name> <exposed version> !~ <constraint>"`. Providers
/// lacking either a version or a constraint are skipped.
pub fn non_satisfying_providers(
    exposed: &[ProviderTuple],
    required: &[ProviderTuple],
) -> Result<Vec<String>, ConstraintError> {
    let exposed_versions: HashMap<&str, &str> = exposed
        .iter()
        .map(|e| (e.name.as_str(), e.version_or_constraint.as_str()))
        .collect();

    let mut unsatisfied = Vec::new();
    for req in required {
        let Some(&version) = exposed_versions.get(req.name.as_str()) else {
            continue;
        };
        let constraint = req.version_or_constraint.as_str();
        if version.is_empty() || constraint.is_empty() {
            continue;
        }
        if !satisfies(version, constraint, &req.name)? {
            unsatisfied.push(format!("{} {version} !~ {constraint}", req.name));
        }
    }
    Ok(unsatisfied)
}

/// Check every category of `required` against `exposed`.
///
/// Version constraints are evaluated only when `check_versions` is set.
/// Returns all failures sorted by message; an empty list means compatible.
pub fn check_providers(
    exposed: &Providers,
    required: &Providers,
    check_versions: bool,
) -> Vec<CompatError> {
    let mut errors = Vec::new();

    for category in ProviderCategory::ALL {
        let exposed = category.select(exposed);
        let required = category.select(required);

        let mut missing = missing_providers(exposed, required);
        if !missing.is_empty() {
            missing.sort();
            debug!(%category, ?missing, "Required providers are not deployed");
            errors.push(CompatError::MissingProviders {
                category,
                names: missing,
            });
        }

        if !check_versions {
            continue;
        }
        match non_satisfying_providers(exposed, required) {
            Ok(mut unsatisfied) if !unsatisfied.is_empty() => {
                unsatisfied.sort();
                debug!(%category, ?unsatisfied, "Provider versions do not satisfy constraints");
                errors.push(CompatError::UnsatisfiedProviders {
                    category,
                    entries: unsatisfied,
                });
            }
            Ok(_) => {}
            Err(e) => errors.push(e.into()),
        }
    }

    errors.sort_by_cached_key(|e| e.to_string());
    errors
}
