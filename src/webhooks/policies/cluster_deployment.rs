//! ClusterDeployment admission.
//!
//! Create and update check, in order:
//! - the referenced ClusterTemplate exists and is valid
//! - the providers it requires are ready on the platform
//! - the services' Kubernetes constraints accept the template's version
//! - the Credential is ready and of a kind the providers accept
//! - every enabled service references a valid ServiceTemplate
//!
//! Updates that switch templates must follow the upgrade paths recorded
//! in the old object's status.

use std::collections::HashMap;
use std::sync::Arc;

use kube::ResourceExt;
use tracing::debug;

use super::{ensure_template_valid, validate_services};
use crate::compat::{Constraint, check_identity, check_providers, parse_version};
use crate::crd::{
    ClusterDeployment, ClusterTemplate, Credential, ServiceSpec, ServiceTemplate, Template,
};
use crate::store::{ListOptions, Store, collect};
use crate::webhooks::admission::{
    AdmissionResult, Defaulter, ValidationContext, Validator, allowed,
};
use crate::webhooks::error::{AdmissionError, Denied};
use crate::webhooks::guard::get_management;

const INVALID_CLUSTER_DEPLOYMENT: &str = "the ClusterDeployment is invalid";

/// Validates and defaults ClusterDeployments.
pub struct ClusterDeploymentValidator<S> {
    store: Arc<S>,
}

impl<S: Store> ClusterDeploymentValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn template(&self, cd: &ClusterDeployment) -> Result<ClusterTemplate, AdmissionError> {
        let namespace = cd.namespace().unwrap_or_default();
        Ok(self
            .store
            .get(Some(namespace.as_str()), &cd.spec.template)
            .await?)
    }

    /// The template is valid and its providers are available.
    ///
    /// Provider versions are compared against constraints only on update.
    async fn check_template(
        &self,
        ctx: &ValidationContext,
        template: &ClusterTemplate,
    ) -> Result<(), AdmissionError> {
        ensure_template_valid(template.common_status())?;

        let mgmt = get_management(self.store.as_ref())
            .await
            .map_err(|e| AdmissionError::invalid("providers verification failed", e))?;
        let required = template
            .status
            .as_ref()
            .map(|s| s.providers.clone())
            .unwrap_or_default();
        let errors = check_providers(&mgmt.available_providers(), &required, ctx.is_update());
        if let Some(err) = AdmissionError::aggregate(errors) {
            return Err(AdmissionError::invalid("providers verification failed", err));
        }
        Ok(())
    }

    /// Each enabled service's ServiceTemplate constraint must accept the
    /// template's Kubernetes version.
    async fn check_k8s_compatibility(
        &self,
        cd: &ClusterDeployment,
        template: &ClusterTemplate,
    ) -> Result<(), AdmissionError> {
        let version = template
            .status
            .as_ref()
            .map(|s| s.kubernetes_version.as_str())
            .unwrap_or_default();
        if cd.spec.services.is_empty() || version.is_empty() {
            return Ok(());
        }

        let namespace = cd.namespace().unwrap_or_default();
        let service_templates: Vec<ServiceTemplate> =
            collect(self.store.as_ref(), ListOptions::default().in_namespace(&namespace)).await?;
        let constraints: HashMap<String, String> = service_templates
            .into_iter()
            .map(|t| {
                let constraint = t
                    .status
                    .as_ref()
                    .map(|s| s.kubernetes_constraint.clone())
                    .unwrap_or_default();
                (t.name_any(), constraint)
            })
            .collect();

        let parsed_version = parse_version(version).map_err(|e| {
            AdmissionError::message(format!(
                "failed to parse k8s version {version} of the ClusterTemplate {namespace}/{}: {e}",
                template.name_any()
            ))
        })?;

        for service in cd.enabled_services() {
            check_service_constraint(cd, &namespace, service, &constraints, version, &parsed_version)?;
        }
        Ok(())
    }

    async fn check_credential(
        &self,
        cd: &ClusterDeployment,
        template: &ClusterTemplate,
    ) -> Result<(), AdmissionError> {
        let namespace = cd.namespace().unwrap_or_default();
        let credential: Credential = self
            .store
            .get(Some(namespace.as_str()), &cd.spec.credential)
            .await?;
        if !credential.is_ready() {
            return Err(AdmissionError::message("credential is not Ready"));
        }

        let providers = template.status.as_ref().map(|s| &s.providers);
        check_identity(
            &template.name_any(),
            providers.into_iter().flat_map(|p| p.names()),
            &credential.spec.identity_ref.kind,
        )?;
        Ok(())
    }

    /// Checks shared by create and update after template validity.
    async fn check_dependencies(
        &self,
        cd: &ClusterDeployment,
        template: &ClusterTemplate,
    ) -> AdmissionResult {
        if let Err(e) = self.check_k8s_compatibility(cd, template).await {
            return Err(Denied::warn(
                "Failed to validate k8s version compatibility with ServiceTemplates",
                AdmissionError::invalid("failed to validate k8s compatibility", e),
            ));
        }

        self.check_credential(cd, template)
            .await
            .map_err(|e| AdmissionError::invalid(INVALID_CLUSTER_DEPLOYMENT, e))?;

        let namespace = cd.namespace().unwrap_or_default();
        let services: Vec<ServiceSpec> = cd.enabled_services().cloned().collect();
        validate_services(self.store.as_ref(), &namespace, &services)
            .await
            .map_err(|e| AdmissionError::invalid(INVALID_CLUSTER_DEPLOYMENT, e))?;

        allowed()
    }
}

fn check_service_constraint(
    cd: &ClusterDeployment,
    namespace: &str,
    service: &ServiceSpec,
    constraints: &HashMap<String, String>,
    version: &str,
    parsed_version: &semver::Version,
) -> Result<(), AdmissionError> {
    let Some(constraint) = constraints.get(&service.template) else {
        return Err(AdmissionError::message(format!(
            "specified ServiceTemplate {namespace}/{} is missing in the cluster",
            service.template
        )));
    };
    if constraint.is_empty() {
        return Ok(());
    }

    let parsed: Constraint = constraint.parse().map_err(|e| {
        AdmissionError::message(format!(
            "failed to parse k8s constrained version {constraint} of the ServiceTemplate {namespace}/{}: {e}",
            service.template
        ))
    })?;
    if !parsed.matches(parsed_version) {
        return Err(AdmissionError::message(format!(
            "k8s version {version} of the ClusterDeployment {namespace}/{} does not satisfy constrained version {constraint} from the ServiceTemplate {namespace}/{}",
            cd.name_any(),
            service.template
        )));
    }
    Ok(())
}

impl<S: Store> Validator<ClusterDeployment> for ClusterDeploymentValidator<S> {
    async fn validate_create(
        &self,
        ctx: &ValidationContext,
        cd: &ClusterDeployment,
    ) -> AdmissionResult {
        let template = self
            .template(cd)
            .await
            .map_err(|e| AdmissionError::invalid(INVALID_CLUSTER_DEPLOYMENT, e))?;
        self.check_template(ctx, &template)
            .await
            .map_err(|e| AdmissionError::invalid(INVALID_CLUSTER_DEPLOYMENT, e))?;

        self.check_dependencies(cd, &template).await
    }

    async fn validate_update(
        &self,
        ctx: &ValidationContext,
        old: &ClusterDeployment,
        new: &ClusterDeployment,
    ) -> AdmissionResult {
        let template = self
            .template(new)
            .await
            .map_err(|e| AdmissionError::invalid(INVALID_CLUSTER_DEPLOYMENT, e))?;

        if old.spec.template != new.spec.template {
            if !old.available_upgrades().contains(&new.spec.template) {
                debug!(
                    from = %old.spec.template,
                    to = %new.spec.template,
                    available = ?old.available_upgrades(),
                    "Rejecting upgrade outside the template chain"
                );
                return Err(Denied::warn(
                    format!(
                        "Cluster can't be upgraded from {} to {}. This upgrade sequence is not allowed",
                        old.spec.template, new.spec.template
                    ),
                    AdmissionError::ClusterUpgradeForbidden,
                ));
            }

            self.check_template(ctx, &template)
                .await
                .map_err(|e| AdmissionError::invalid(INVALID_CLUSTER_DEPLOYMENT, e))?;
        }

        self.check_dependencies(new, &template).await
    }
}

impl<S: Store> Defaulter<ClusterDeployment> for ClusterDeploymentValidator<S> {
    /// Copy the template's default config onto deployments that omit one,
    /// forcing dry-run whenever a config is filled in.
    async fn apply_defaults(
        &self,
        _ctx: &ValidationContext,
        cd: &mut ClusterDeployment,
    ) -> Result<(), AdmissionError> {
        if cd.spec.config.is_some() || cd.spec.template.is_empty() {
            return Ok(());
        }

        let template = self.template(cd).await.map_err(|e| {
            AdmissionError::invalid("could not get template for the ClusterDeployment", e)
        })?;
        ensure_template_valid(template.common_status())?;

        let Some(config) = template.status.and_then(|s| s.common.config) else {
            return Ok(());
        };
        debug!(template = %cd.spec.template, "Defaulting ClusterDeployment config from template");
        cd.spec.config = Some(config);
        cd.spec.dry_run = true;
        Ok(())
    }
}
