//! Template admission. Templates are only guarded on deletion.

use std::sync::Arc;

use crate::crd::{ClusterTemplate, ProviderTemplate, ServiceTemplate};
use crate::store::Store;
use crate::webhooks::admission::{AdmissionResult, ValidationContext, Validator};
use crate::webhooks::guard::{
    check_cluster_template_delete, check_provider_template_delete, check_service_template_delete,
};

pub struct ClusterTemplateValidator<S> {
    store: Arc<S>,
}

impl<S: Store> ClusterTemplateValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: Store> Validator<ClusterTemplate> for ClusterTemplateValidator<S> {
    async fn validate_delete(
        &self,
        _ctx: &ValidationContext,
        template: &ClusterTemplate,
    ) -> AdmissionResult {
        check_cluster_template_delete(self.store.as_ref(), template).await
    }
}

/// ServiceTemplates in the system namespace are also checked against
/// MultiClusterServices.
pub struct ServiceTemplateValidator<S> {
    store: Arc<S>,
    system_namespace: String,
}

impl<S: Store> ServiceTemplateValidator<S> {
    pub fn new(store: Arc<S>, system_namespace: impl Into<String>) -> Self {
        Self {
            store,
            system_namespace: system_namespace.into(),
        }
    }
}

impl<S: Store> Validator<ServiceTemplate> for ServiceTemplateValidator<S> {
    async fn validate_delete(
        &self,
        _ctx: &ValidationContext,
        template: &ServiceTemplate,
    ) -> AdmissionResult {
        check_service_template_delete(self.store.as_ref(), &self.system_namespace, template).await
    }
}

pub struct ProviderTemplateValidator<S> {
    store: Arc<S>,
}

impl<S: Store> ProviderTemplateValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: Store> Validator<ProviderTemplate> for ProviderTemplateValidator<S> {
    async fn validate_delete(
        &self,
        _ctx: &ValidationContext,
        template: &ProviderTemplate,
    ) -> AdmissionResult {
        check_provider_template_delete(self.store.as_ref(), template).await
    }
}
