//! MultiClusterService admission. Its ServiceTemplates live in the system
//! namespace.

use std::sync::Arc;

use super::validate_services;
use crate::crd::MultiClusterService;
use crate::store::Store;
use crate::webhooks::admission::{AdmissionResult, ValidationContext, Validator, allowed};
use crate::webhooks::error::AdmissionError;

pub struct MultiClusterServiceValidator<S> {
    store: Arc<S>,
    system_namespace: String,
}

impl<S: Store> MultiClusterServiceValidator<S> {
    pub fn new(store: Arc<S>, system_namespace: impl Into<String>) -> Self {
        Self {
            store,
            system_namespace: system_namespace.into(),
        }
    }

    async fn check_services(&self, mcs: &MultiClusterService) -> AdmissionResult {
        validate_services(self.store.as_ref(), &self.system_namespace, &mcs.spec.services)
            .await
            .map_err(|e| AdmissionError::invalid("the MultiClusterService is invalid", e))?;
        allowed()
    }
}

impl<S: Store> Validator<MultiClusterService> for MultiClusterServiceValidator<S> {
    async fn validate_create(
        &self,
        _ctx: &ValidationContext,
        mcs: &MultiClusterService,
    ) -> AdmissionResult {
        self.check_services(mcs).await
    }

    async fn validate_update(
        &self,
        _ctx: &ValidationContext,
        _old: &MultiClusterService,
        new: &MultiClusterService,
    ) -> AdmissionResult {
        self.check_services(new).await
    }
}
