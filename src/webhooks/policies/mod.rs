//! Admission policies, one validator per resource kind.
//!
//! Every validator holds a shared [`Store`] handle and re-reads the state
//! it needs on each request:
//! - [`ClusterDeploymentValidator`]: template validity, providers,
//!   credential, services, upgrade paths, config defaulting
//! - [`ClusterTemplateValidator`], [`ServiceTemplateValidator`],
//!   [`ProviderTemplateValidator`]: deletion guards
//! - [`TemplateChainValidator`]: upgrade graph consistency
//! - [`ManagementValidator`], [`ReleaseValidator`],
//!   [`AccessManagementValidator`], [`ManagementBackupValidator`]:
//!   platform singletons
//! - [`MultiClusterServiceValidator`]: service template validity

mod access_management;
mod cluster_deployment;
mod management;
mod management_backup;
mod multi_cluster_service;
mod release;
mod template;
mod template_chain;

pub use access_management::AccessManagementValidator;
pub use cluster_deployment::ClusterDeploymentValidator;
pub use management::ManagementValidator;
pub use management_backup::ManagementBackupValidator;
pub use multi_cluster_service::MultiClusterServiceValidator;
pub use release::ReleaseValidator;
pub use template::{ClusterTemplateValidator, ProviderTemplateValidator, ServiceTemplateValidator};
pub use template_chain::{TemplateChainValidator, template_chain_warnings};

use std::sync::Arc;

use crate::crd::{
    AccessManagement, ClusterDeployment, ClusterTemplate, ClusterTemplateChain, Management,
    ManagementBackup, MultiClusterService, ProviderTemplate, Release, ServiceSpec,
    ServiceTemplate, ServiceTemplateChain, Template, TemplateStatusCommon,
};
use crate::store::Store;
use crate::webhooks::AdmissionError;
use crate::webhooks::admission::Validator;

/// All validators, sharing one store.
pub struct Policies<S> {
    pub cluster_deployment: ClusterDeploymentValidator<S>,
    pub cluster_template: ClusterTemplateValidator<S>,
    pub service_template: ServiceTemplateValidator<S>,
    pub provider_template: ProviderTemplateValidator<S>,
    pub cluster_template_chain: TemplateChainValidator<ClusterTemplateChain>,
    pub service_template_chain: TemplateChainValidator<ServiceTemplateChain>,
    pub management: ManagementValidator<S>,
    pub release: ReleaseValidator<S>,
    pub access_management: AccessManagementValidator<S>,
    pub management_backup: ManagementBackupValidator<S>,
    pub multi_cluster_service: MultiClusterServiceValidator<S>,
}

impl<S: Store> Policies<S> {
    pub fn new(store: Arc<S>, system_namespace: impl Into<String>) -> Self {
        let system_namespace = system_namespace.into();
        Self {
            cluster_deployment: ClusterDeploymentValidator::new(store.clone()),
            cluster_template: ClusterTemplateValidator::new(store.clone()),
            service_template: ServiceTemplateValidator::new(
                store.clone(),
                system_namespace.clone(),
            ),
            provider_template: ProviderTemplateValidator::new(store.clone()),
            cluster_template_chain: TemplateChainValidator::new(),
            service_template_chain: TemplateChainValidator::new(),
            management: ManagementValidator::new(store.clone()),
            release: ReleaseValidator::new(store.clone()),
            access_management: AccessManagementValidator::new(
                store.clone(),
                system_namespace.clone(),
            ),
            management_backup: ManagementBackupValidator::new(store.clone()),
            multi_cluster_service: MultiClusterServiceValidator::new(store, system_namespace),
        }
    }
}

/// Selects the validator for objects of kind `K`.
pub trait PolicyFor<K> {
    type Validator: Validator<K>;

    fn validator(&self) -> &Self::Validator;
}

impl<S: Store> PolicyFor<ClusterDeployment> for Policies<S> {
    type Validator = ClusterDeploymentValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.cluster_deployment
    }
}

impl<S: Store> PolicyFor<ClusterTemplate> for Policies<S> {
    type Validator = ClusterTemplateValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.cluster_template
    }
}

impl<S: Store> PolicyFor<ServiceTemplate> for Policies<S> {
    type Validator = ServiceTemplateValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.service_template
    }
}

impl<S: Store> PolicyFor<ProviderTemplate> for Policies<S> {
    type Validator = ProviderTemplateValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.provider_template
    }
}

impl<S: Store> PolicyFor<ClusterTemplateChain> for Policies<S> {
    type Validator = TemplateChainValidator<ClusterTemplateChain>;

    fn validator(&self) -> &Self::Validator {
        &self.cluster_template_chain
    }
}

impl<S: Store> PolicyFor<ServiceTemplateChain> for Policies<S> {
    type Validator = TemplateChainValidator<ServiceTemplateChain>;

    fn validator(&self) -> &Self::Validator {
        &self.service_template_chain
    }
}

impl<S: Store> PolicyFor<Management> for Policies<S> {
    type Validator = ManagementValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.management
    }
}

impl<S: Store> PolicyFor<Release> for Policies<S> {
    type Validator = ReleaseValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.release
    }
}

impl<S: Store> PolicyFor<AccessManagement> for Policies<S> {
    type Validator = AccessManagementValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.access_management
    }
}

impl<S: Store> PolicyFor<ManagementBackup> for Policies<S> {
    type Validator = ManagementBackupValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.management_backup
    }
}

impl<S: Store> PolicyFor<MultiClusterService> for Policies<S> {
    type Validator = MultiClusterServiceValidator<S>;

    fn validator(&self) -> &Self::Validator {
        &self.multi_cluster_service
    }
}

/// A template may be referenced only once it has been validated.
pub(crate) fn ensure_template_valid(
    status: Option<&TemplateStatusCommon>,
) -> Result<(), AdmissionError> {
    match status {
        Some(status) if status.valid => Ok(()),
        Some(status) => Err(AdmissionError::message(format!(
            "the template is not valid: {}",
            status.validation_error
        ))),
        None => Err(AdmissionError::message("the template is not valid: ")),
    }
}

/// Every referenced ServiceTemplate in `namespace` must exist and be valid.
/// All failures are reported together.
pub(crate) async fn validate_services<S: Store>(
    store: &S,
    namespace: &str,
    services: &[ServiceSpec],
) -> Result<(), AdmissionError> {
    let mut errors = Vec::new();
    for service in services {
        let template: ServiceTemplate = match store.get(Some(namespace), &service.template).await
        {
            Ok(template) => template,
            Err(e) => {
                errors.push(AdmissionError::invalid(
                    format!("failed to get ServiceTemplate {namespace}/{}", service.template),
                    e,
                ));
                continue;
            }
        };
        let status = template.common_status();
        if !status.is_some_and(|s| s.valid) {
            errors.push(AdmissionError::message(format!(
                "the ServiceTemplate {namespace}/{} is invalid with the error: {}",
                service.template,
                status.map(|s| s.validation_error.as_str()).unwrap_or_default()
            )));
        }
    }

    match AdmissionError::aggregate(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
