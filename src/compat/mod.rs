//! Compatibility checks between templates, the platform and credentials.
//!
//! - [`version`]: lenient semver parsing and constraint matching
//! - [`providers`]: required vs exposed providers per category
//! - [`credential`]: ClusterIdentity kinds accepted per infrastructure provider

pub mod credential;
pub mod providers;
pub mod version;

pub use credential::check_identity;
pub use providers::{ProviderCategory, check_providers, missing_providers, non_satisfying_providers};
pub use version::{Constraint, ConstraintError, parse_version, satisfies};

use thiserror::Error;

/// A compatibility failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompatError {
    #[error("one or more required {category} providers are not deployed yet: [{}]", .names.join(" "))]
    MissingProviders {
        category: ProviderCategory,
        names: Vec<String>,
    },

    #[error("one or more required {category} providers does not satisfy constraints: [{}]", .entries.join(" "))]
    UnsatisfiedProviders {
        category: ProviderCategory,
        entries: Vec<String>,
    },

    #[error("wrong kind of the ClusterIdentity {kind:?} for provider {provider:?}")]
    WrongIdentityKind { kind: String, provider: String },

    #[error("unsupported infrastructure provider {0}")]
    UnsupportedInfrastructure(String),

    #[error("template {0:?} has no infrastructure providers defined")]
    NoInfrastructureProviders(String),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}
