//! Credential identity compatibility.
//!
//! Each infrastructure provider accepts a fixed set of ClusterIdentity
//! kinds. A Credential may be used with a template only if its identity
//! kind is accepted by every infrastructure provider the template requires.

use super::CompatError;

const INFRASTRUCTURE_PREFIX: &str = "infrastructure-";

/// Identity kinds accepted by an infrastructure provider, or `None` for a
/// provider this platform does not support.
pub fn accepted_identity_kinds(provider: &str) -> Option<&'static [&'static str]> {
    let kinds: &'static [&'static str] = match provider {
        "infrastructure-aws" => &[
            "AWSClusterStaticIdentity",
            "AWSClusterRoleIdentity",
            "AWSClusterControllerIdentity",
        ],
        "infrastructure-azure" => &["AzureClusterIdentity"],
        "infrastructure-vsphere" => &["VSphereClusterIdentity"],
        "infrastructure-openstack" | "infrastructure-internal" | "infrastructure-gcp" => {
            &["Secret"]
        }
        _ => return None,
    };
    Some(kinds)
}

/// Check an identity kind against the template's providers.
///
/// Only `infrastructure-*` providers are considered; a template without any
/// is rejected, since no credential could ever match it.
pub fn check_identity<'a>(
    template: &str,
    providers: impl IntoIterator<Item = &'a str>,
    identity_kind: &str,
) -> Result<(), CompatError> {
    let mut has_infrastructure = false;

    for provider in providers {
        if !provider.starts_with(INFRASTRUCTURE_PREFIX) {
            continue;
        }
        has_infrastructure = true;

        let accepted = accepted_identity_kinds(provider)
            .ok_or_else(|| CompatError::UnsupportedInfrastructure(provider.to_string()))?;
        if !accepted.contains(&identity_kind) {
            return Err(CompatError::WrongIdentityKind {
                kind: identity_kind.to_string(),
                provider: provider.to_string(),
            });
        }
    }

    if !has_infrastructure {
        return Err(CompatError::NoInfrastructureProviders(template.to_string()));
    }
    Ok(())
}
