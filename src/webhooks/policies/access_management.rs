//! AccessManagement admission.
//!
//! New access rules are rejected when they would withdraw a template from
//! a namespace where a ClusterDeployment still uses it.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, info};

use crate::crd::{AccessManagement, ClusterDeployment};
use crate::store::{ListOptions, Store, collect, exists};
use crate::templates::{Removal, expected_templates_state};
use crate::webhooks::admission::{AdmissionResult, ValidationContext, Validator, allowed};
use crate::webhooks::error::{AdmissionError, Denied};
use crate::webhooks::guard::check_access_management_delete;

pub struct AccessManagementValidator<S> {
    store: Arc<S>,
    system_namespace: String,
}

impl<S: Store> AccessManagementValidator<S> {
    pub fn new(store: Arc<S>, system_namespace: impl Into<String>) -> Self {
        Self {
            store,
            system_namespace: system_namespace.into(),
        }
    }

    /// ClusterDeployments in the removal's namespace that reference the
    /// removed template.
    async fn users(&self, removal: &Removal) -> Result<Vec<ClusterDeployment>, AdmissionError> {
        let options = ListOptions::default()
            .in_namespace(&removal.namespace)
            .indexed(removal.kind.deployment_index(), &removal.template);
        Ok(collect(self.store.as_ref(), options).await?)
    }
}

impl<S: Store> Validator<AccessManagement> for AccessManagementValidator<S> {
    async fn validate_create(
        &self,
        _ctx: &ValidationContext,
        _obj: &AccessManagement,
    ) -> AdmissionResult {
        if exists::<AccessManagement, S>(self.store.as_ref(), ListOptions::default()).await? {
            return Err(Denied::new(AdmissionError::message(
                "AccessManagement object already exists",
            )));
        }
        allowed()
    }

    async fn validate_update(
        &self,
        _ctx: &ValidationContext,
        _old: &AccessManagement,
        new: &AccessManagement,
    ) -> AdmissionResult {
        let expected = expected_templates_state(
            self.store.as_ref(),
            &self.system_namespace,
            &new.spec.access_rules,
        )
        .await?;

        let removals = expected.removals();
        debug!(removals = removals.len(), "Computed template removals for new access rules");

        let mut warnings = Vec::new();
        for removal in &removals {
            for cd in self.users(removal).await? {
                warnings.push(format!(
                    "The {} {} is in use by the ClusterDeployment {}/{}",
                    removal.kind,
                    removal.template,
                    removal.namespace,
                    cd.name_any()
                ));
            }
        }

        if !warnings.is_empty() {
            warnings.sort();
            info!(in_use = warnings.len(), "Rejecting access rules that remove templates in use");
            return Err(Denied::with_warnings(
                warnings,
                AdmissionError::AccessRulesRejected,
            ));
        }
        allowed()
    }

    async fn validate_delete(
        &self,
        _ctx: &ValidationContext,
        _obj: &AccessManagement,
    ) -> AdmissionResult {
        check_access_management_delete(self.store.as_ref()).await
    }
}
