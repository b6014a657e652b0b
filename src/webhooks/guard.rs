//! Deletion safety checks.
//!
//! Each check runs a sequence of independent existence probes and stops at
//! the first one that finds a live reference. Reference lookups use
//! limit-1 lists: only existence matters, not the full set.

use std::collections::BTreeSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::debug;

use super::admission::{AdmissionResult, allowed};
use super::error::{AdmissionError, Denied};
use crate::crd::{
    ClusterDeployment, ClusterTemplate, ClusterTemplateChain, Management, MultiClusterService,
    ProviderTemplate, Release, ServiceTemplate, ServiceTemplateChain, Template, TemplateChain,
    owners_with_kind,
};
use crate::store::{IndexField, ListOptions, Store, collect, exists};

/// The Management singleton.
///
/// Zero objects is [`AdmissionError::ManagementNotFound`]; more than one is
/// an error as well.
pub async fn get_management<S: Store>(store: &S) -> Result<Management, AdmissionError> {
    let mut managements: Vec<Management> = collect(store, ListOptions::default()).await?;
    match managements.len() {
        0 => Err(AdmissionError::ManagementNotFound),
        1 => managements.pop().ok_or(AdmissionError::ManagementNotFound),
        n => Err(AdmissionError::message(format!(
            "expected 1 Management object, got {n}"
        ))),
    }
}

/// The Management singleton, or `None` if there is none.
pub async fn find_management<S: Store>(store: &S) -> Result<Option<Management>, AdmissionError> {
    match get_management(store).await {
        Ok(mgmt) => Ok(Some(mgmt)),
        Err(AdmissionError::ManagementNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Deny if a ClusterDeployment in `namespace` references `name` through
/// `index`.
async fn ensure_no_deployments<S: Store>(
    store: &S,
    kind: &str,
    namespace: &str,
    name: &str,
    index: IndexField,
) -> Result<(), Denied> {
    let options = ListOptions::default()
        .in_namespace(namespace)
        .indexed(index, name);
    if exists::<ClusterDeployment, S>(store, options).await? {
        debug!(kind, namespace, name, "Template is referenced by a ClusterDeployment");
        return Err(Denied::warn(
            format!(
                "The {kind} object can't be removed if ClusterDeployment objects referencing it still exist"
            ),
            AdmissionError::TemplateDeletionForbidden,
        ));
    }
    Ok(())
}

/// Deny if the template is owned by a template chain.
fn ensure_not_chain_managed<C: TemplateChain>(meta: &ObjectMeta) -> Result<(), Denied> {
    let owners = owners_with_kind(meta, C::KIND);
    if !owners.is_empty() {
        return Err(Denied::warn(
            format!(
                "The {} object can't be removed if it is managed by {}: {}",
                C::TEMPLATE_KIND,
                C::KIND,
                owners.join(", ")
            ),
            AdmissionError::TemplateDeletionForbidden,
        ));
    }
    Ok(())
}

/// Deletion of a ClusterTemplate.
pub async fn check_cluster_template_delete<S: Store>(
    store: &S,
    template: &ClusterTemplate,
) -> AdmissionResult {
    ensure_no_deployments(
        store,
        ClusterTemplate::KIND,
        &template.namespace().unwrap_or_default(),
        &template.name_any(),
        IndexField::ClusterDeploymentTemplate,
    )
    .await?;
    ensure_not_chain_managed::<ClusterTemplateChain>(&template.metadata)?;
    allowed()
}

/// Deletion of a ServiceTemplate.
///
/// Templates in the system namespace may also be referenced by
/// MultiClusterServices, which are cluster-scoped.
pub async fn check_service_template_delete<S: Store>(
    store: &S,
    system_namespace: &str,
    template: &ServiceTemplate,
) -> AdmissionResult {
    let namespace = template.namespace().unwrap_or_default();
    let name = template.name_any();

    ensure_no_deployments(
        store,
        ServiceTemplate::KIND,
        &namespace,
        &name,
        IndexField::ClusterDeploymentServiceTemplates,
    )
    .await?;
    ensure_not_chain_managed::<ServiceTemplateChain>(&template.metadata)?;

    if namespace == system_namespace {
        let options =
            ListOptions::default().indexed(IndexField::MultiClusterServiceTemplates, &name);
        if exists::<MultiClusterService, S>(store, options).await? {
            return Err(Denied::warn(
                "The ServiceTemplate object can't be removed if MultiClusterService objects referencing it still exist",
                AdmissionError::TemplateDeletionForbidden,
            ));
        }
    }
    allowed()
}

/// Deletion of a ProviderTemplate.
///
/// Blocked while a Release owns it or the Management spec names it. With no
/// Management, nothing can be using it.
pub async fn check_provider_template_delete<S: Store>(
    store: &S,
    template: &ProviderTemplate,
) -> AdmissionResult {
    let name = template.name_any();

    let releases = owners_with_kind(&template.metadata, "Release");
    if !releases.is_empty() {
        return Err(Denied::new(AdmissionError::message(format!(
            "The ProviderTemplate {name} cannot be removed while it is part of existing Releases: {}",
            releases.join(", ")
        ))));
    }

    let Some(mgmt) = find_management(store).await? else {
        return allowed();
    };
    if mgmt.templates().contains(&name.as_str()) {
        return Err(Denied::new(AdmissionError::message(format!(
            "The ProviderTemplate {name} cannot be removed while it is used in the Management spec"
        ))));
    }
    allowed()
}

/// Deletion of a Release.
pub async fn check_release_delete<S: Store>(store: &S, release: &Release) -> AdmissionResult {
    let Some(mgmt) = find_management(store).await? else {
        return allowed();
    };

    let name = release.name_any();
    if mgmt.spec.release == name {
        return Err(Denied::new(AdmissionError::message(format!(
            "release {name} is still in use"
        ))));
    }

    let release_templates: BTreeSet<&str> = release.templates().into_iter().collect();
    let in_use: BTreeSet<&str> = mgmt
        .templates()
        .into_iter()
        .filter(|t| release_templates.contains(t))
        .collect();
    if !in_use.is_empty() {
        let in_use: Vec<&str> = in_use.into_iter().collect();
        return Err(Denied::new(AdmissionError::message(format!(
            "the following ProviderTemplates associated with the Release are still in use: {}",
            in_use.join(", ")
        ))));
    }
    allowed()
}

/// Deletion of the Management object: blocked while any ClusterDeployment
/// exists in any namespace.
pub async fn check_management_delete<S: Store>(store: &S) -> AdmissionResult {
    if exists::<ClusterDeployment, S>(store, ListOptions::default()).await? {
        return Err(Denied::warn(
            "The Management object can't be removed if ClusterDeployment objects still exist",
            AdmissionError::ManagementDeletionForbidden,
        ));
    }
    allowed()
}

/// Deletion of the AccessManagement object: allowed only once the
/// Management object is itself being deleted, or is gone.
pub async fn check_access_management_delete<S: Store>(store: &S) -> AdmissionResult {
    let Some(mgmt) = find_management(store).await? else {
        return allowed();
    };
    if mgmt.metadata.deletion_timestamp.is_none() {
        return Err(Denied::new(AdmissionError::AccessManagementDeletionForbidden));
    }
    allowed()
}
