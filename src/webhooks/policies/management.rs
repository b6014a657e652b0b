//! Management admission.
//!
//! The Management object is a singleton. Updates may not drop a provider
//! still needed by a running ClusterDeployment, and every enabled provider
//! must support the CAPI contract of the core CAPI template.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::debug;

use crate::compat::ProviderCategory;
use crate::crd::{
    ClusterDeployment, ClusterTemplate, Management, Provider, ProviderTemplate, Release,
};
use crate::store::{IndexField, ListOptions, Store, collect, exists, first};
use crate::webhooks::admission::{AdmissionResult, ValidationContext, Validator, allowed};
use crate::webhooks::error::{AdmissionError, Denied};
use crate::webhooks::guard::check_management_delete;

const INVALID_MANAGEMENT: &str = "the Management is invalid";

pub struct ManagementValidator<S> {
    store: Arc<S>,
}

impl<S: Store> ManagementValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn release(&self, name: &str) -> Result<Release, AdmissionError> {
        self.store
            .get(None, name)
            .await
            .map_err(|e| AdmissionError::invalid(format!("failed to get Release {name}"), e))
    }

    async fn provider_template(&self, name: &str) -> Result<ProviderTemplate, AdmissionError> {
        self.store
            .get(None, name)
            .await
            .map_err(|e| AdmissionError::invalid(format!("failed to get ProviderTemplate {name}"), e))
    }

    /// Providers present in `old` but not in `new` must not back any
    /// ClusterTemplate that a ClusterDeployment is using.
    async fn check_providers_removal(
        &self,
        old: &Management,
        new: &Management,
    ) -> Result<(), AdmissionError> {
        let removed: Vec<&Provider> = old
            .spec
            .providers
            .iter()
            .filter(|p| !new.spec.providers.iter().any(|n| n.name == p.name))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }

        let release = self.release(&new.spec.release).await?;
        for component in removed {
            let template_name = component_template(component, &release);
            let template = self.provider_template(&template_name).await?;
            let exposed = template
                .status
                .map(|s| s.providers)
                .unwrap_or_default();

            for category in ProviderCategory::ALL {
                for provider in category.select(&exposed) {
                    if let Some(key) = self.deployment_requiring(&provider.name).await? {
                        return Err(AdmissionError::message(format!(
                            "provider {} is required by at least one ClusterDeployment ({key}) and cannot be removed from the Management {}",
                            provider.name,
                            new.name_any()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// `namespace/name` of some ClusterDeployment whose template requires
    /// `provider`.
    async fn deployment_requiring(&self, provider: &str) -> Result<Option<String>, AdmissionError> {
        let templates: Vec<ClusterTemplate> = collect(
            self.store.as_ref(),
            ListOptions::default().indexed(IndexField::ClusterTemplateProviders, provider),
        )
        .await?;

        for template in templates {
            let namespace = template.namespace().unwrap_or_default();
            let options = ListOptions::default()
                .in_namespace(&namespace)
                .indexed(IndexField::ClusterDeploymentTemplate, template.name_any());
            if let Some(cd) = first::<ClusterDeployment, S>(self.store.as_ref(), options).await? {
                return Ok(Some(format!(
                    "{}/{}",
                    cd.namespace().unwrap_or_default(),
                    cd.name_any()
                )));
            }
        }
        Ok(None)
    }

    /// Every enabled provider declaring CAPI contracts must support the
    /// contract of the core CAPI template. Returns the collected
    /// incompatibilities.
    async fn check_capi_contracts(&self, mgmt: &Management) -> Result<Vec<String>, AdmissionError> {
        let release = self.release(&mgmt.spec.release).await?;

        let capi_name = mgmt
            .spec
            .core
            .as_ref()
            .map(|c| c.capi.template.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| release.spec.capi.template.clone());
        let capi = self.provider_template(&capi_name).await?;
        let Some(capi_status) = capi.status.as_ref().filter(|s| !s.capi_contract.is_empty()) else {
            return Ok(Vec::new());
        };
        if !capi_status.common.valid {
            return Err(AdmissionError::message(format!(
                "not valid ProviderTemplate {capi_name}"
            )));
        }
        let contract = &capi_status.capi_contract;

        let mut incompatible = Vec::new();
        for component in &mgmt.spec.providers {
            let template_name = component_template(component, &release);
            if template_name == capi_name {
                continue;
            }

            let template = self.provider_template(&template_name).await?;
            let Some(status) = template.status.filter(|s| !s.capi_contracts.is_empty()) else {
                continue;
            };
            if !status.common.valid {
                return Err(AdmissionError::message(format!(
                    "not valid ProviderTemplate {template_name}"
                )));
            }
            if !status.capi_contracts.contains_key(contract) {
                incompatible.push(format!(
                    "core CAPI contract versions does not support {contract} version in the ProviderTemplate {template_name}"
                ));
            }
        }
        debug!(contract = %contract, incompatible = incompatible.len(), "Checked CAPI contracts");
        Ok(incompatible)
    }
}

/// ProviderTemplate installing `component`: the explicit template, else
/// the one pinned by the release.
fn component_template(component: &Provider, release: &Release) -> String {
    if component.component.template.is_empty() {
        release
            .provider_template(&component.name)
            .unwrap_or_default()
            .to_string()
    } else {
        component.component.template.clone()
    }
}

impl<S: Store> Validator<Management> for ManagementValidator<S> {
    async fn validate_create(&self, _ctx: &ValidationContext, _mgmt: &Management) -> AdmissionResult {
        if exists::<Management, S>(self.store.as_ref(), ListOptions::default()).await? {
            return Err(Denied::new(AdmissionError::message(
                "Management object already exists",
            )));
        }
        allowed()
    }

    async fn validate_update(
        &self,
        _ctx: &ValidationContext,
        old: &Management,
        new: &Management,
    ) -> AdmissionResult {
        if let Err(e) = self.check_providers_removal(old, new).await {
            return Err(Denied::warn(
                "Some of the providers cannot be removed",
                AdmissionError::invalid(INVALID_MANAGEMENT, e),
            ));
        }

        let incompatible = self.check_capi_contracts(new).await?;
        if let Some(err) = AdmissionError::aggregate(incompatible.into_iter().map(AdmissionError::Message)) {
            return Err(Denied::warn(
                "The Management object has incompatible CAPI contract versions in ProviderTemplates",
                AdmissionError::invalid(INVALID_MANAGEMENT, err),
            ));
        }
        allowed()
    }

    async fn validate_delete(&self, _ctx: &ValidationContext, _mgmt: &Management) -> AdmissionResult {
        check_management_delete(self.store.as_ref()).await
    }
}
