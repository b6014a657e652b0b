//! Deletion guards for templates and platform objects.

use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use template_operator::crd::{
    ClusterDeployment, Component, CoreProviderTemplate, Management, MultiClusterService,
    MultiClusterServiceSpec, NamedProviderTemplate, Provider, ProviderTemplate,
    ProviderTemplateSpec, Release, ReleaseSpec, ServiceSpec,
};
use template_operator::store::MemoryStore;
use template_operator::webhooks::{
    AdmissionError, Operation, Policies, ValidationContext, Validator,
};

use crate::common::fixtures::*;

fn delete_ctx() -> ValidationContext {
    ValidationContext::new(Operation::Delete)
}

fn policies(store: MemoryStore) -> Policies<MemoryStore> {
    Policies::new(Arc::new(store), SYSTEM_NAMESPACE)
}

fn release(name: &str, capi: &str, providers: &[(&str, &str)]) -> Release {
    Release::new(
        name,
        ReleaseSpec {
            version: "0.0.3".to_string(),
            capi: CoreProviderTemplate {
                template: capi.to_string(),
            },
            providers: providers
                .iter()
                .map(|(name, template)| NamedProviderTemplate {
                    name: name.to_string(),
                    template: template.to_string(),
                })
                .collect(),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_cluster_template_in_use_cannot_be_deleted() {
    let template = ClusterTemplateBuilder::new("aws-standalone-cp").build();
    let store = MemoryStore::new().with(
        ClusterDeploymentBuilder::new("aws-1")
            .template("aws-standalone-cp")
            .build(),
    );

    let denied = policies(store)
        .cluster_template
        .validate_delete(&delete_ctx(), &template)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::TemplateDeletionForbidden));
    assert_eq!(
        denied.warnings,
        vec!["The ClusterTemplate object can't be removed if ClusterDeployment objects referencing it still exist"]
    );
}

#[tokio::test]
async fn test_cluster_template_in_other_namespace_is_not_in_use() {
    let template = ClusterTemplateBuilder::new("aws-standalone-cp").build();
    let store = MemoryStore::new().with(
        ClusterDeploymentBuilder::new("aws-1")
            .namespace("prod")
            .template("aws-standalone-cp")
            .build(),
    );

    assert!(
        policies(store)
            .cluster_template
            .validate_delete(&delete_ctx(), &template)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_chain_managed_template_cannot_be_deleted() {
    let template = ClusterTemplateBuilder::new("aws-standalone-cp")
        .owned_by("ClusterTemplateChain", "aws")
        .build();

    let denied = policies(MemoryStore::new())
        .cluster_template
        .validate_delete(&delete_ctx(), &template)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::TemplateDeletionForbidden));
    assert_eq!(
        denied.warnings,
        vec!["The ClusterTemplate object can't be removed if it is managed by ClusterTemplateChain: aws"]
    );
}

#[tokio::test]
async fn test_system_service_template_used_by_multi_cluster_service() {
    let template = service_template(SYSTEM_NAMESPACE, "ingress-nginx-4-11-0", "");
    let mcs = MultiClusterService::new(
        "global-ingress",
        MultiClusterServiceSpec {
            services: vec![ServiceSpec {
                template: "ingress-nginx-4-11-0".to_string(),
                name: "ingress".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        },
    );

    let denied = policies(MemoryStore::new().with(mcs))
        .service_template
        .validate_delete(&delete_ctx(), &template)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::TemplateDeletionForbidden));
    assert_eq!(
        denied.warnings,
        vec!["The ServiceTemplate object can't be removed if MultiClusterService objects referencing it still exist"]
    );
}

#[tokio::test]
async fn test_service_template_used_by_deployment_service() {
    let template = service_template("default", "ingress-nginx-4-11-0", "");
    let store = MemoryStore::new().with(
        ClusterDeploymentBuilder::new("aws-1")
            .template("aws-standalone-cp")
            .service("ingress-nginx-4-11-0")
            .build(),
    );

    let denied = policies(store)
        .service_template
        .validate_delete(&delete_ctx(), &template)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::TemplateDeletionForbidden));
}

#[tokio::test]
async fn test_provider_template_owned_by_release() {
    let mut template = ProviderTemplate::new("cluster-api-0-0-4", ProviderTemplateSpec::default());
    template.metadata.owner_references = Some(vec![
        owner("Release", "hmc-0-0-3"),
        owner("Release", "hmc-0-0-4"),
    ]);

    let denied = policies(MemoryStore::new())
        .provider_template
        .validate_delete(&delete_ctx(), &template)
        .await
        .unwrap_err();
    assert_eq!(
        denied.error.to_string(),
        "The ProviderTemplate cluster-api-0-0-4 cannot be removed while it is part of existing Releases: hmc-0-0-3, hmc-0-0-4"
    );
}

#[tokio::test]
async fn test_provider_template_without_management_is_deletable() {
    let template = ProviderTemplate::new("cluster-api-0-0-4", ProviderTemplateSpec::default());
    assert!(
        policies(MemoryStore::new())
            .provider_template
            .validate_delete(&delete_ctx(), &template)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_release_in_use_by_management() {
    let mgmt = management(&[], &[], &[]);
    let current = release("hmc-0-0-3", "cluster-api-0-0-4", &[]);

    let denied = policies(MemoryStore::new().with(mgmt))
        .release
        .validate_delete(&delete_ctx(), &current)
        .await
        .unwrap_err();
    assert_eq!(denied.error.to_string(), "release hmc-0-0-3 is still in use");
}

#[tokio::test]
async fn test_release_with_templates_in_use() {
    let mut mgmt = management(&[], &[], &[]);
    mgmt.spec.release = "hmc-0-0-4".to_string();
    mgmt.spec.providers = vec![Provider {
        name: "infrastructure-aws".to_string(),
        component: Component {
            template: "cluster-api-provider-aws-0-0-2".to_string(),
            config: None,
        },
    }];
    let old = release(
        "hmc-0-0-2",
        "cluster-api-0-0-2",
        &[("infrastructure-aws", "cluster-api-provider-aws-0-0-2")],
    );
    let policies = policies(MemoryStore::new().with(mgmt));

    let denied = policies
        .release
        .validate_delete(&delete_ctx(), &old)
        .await
        .unwrap_err();
    assert_eq!(
        denied.error.to_string(),
        "the following ProviderTemplates associated with the Release are still in use: cluster-api-provider-aws-0-0-2"
    );

    let unrelated = release("hmc-0-0-1", "cluster-api-0-0-1", &[]);
    assert!(
        policies
            .release
            .validate_delete(&delete_ctx(), &unrelated)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_management_with_deployments_cannot_be_deleted() {
    let store = MemoryStore::new()
        .with(management(&[], &[], &[]))
        .with(ClusterDeploymentBuilder::new("aws-1").namespace("prod").build());

    let denied = policies(store)
        .management
        .validate_delete(&delete_ctx(), &management(&[], &[], &[]))
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::ManagementDeletionForbidden));
    assert_eq!(
        denied.warnings,
        vec!["The Management object can't be removed if ClusterDeployment objects still exist"]
    );
}

#[tokio::test]
async fn test_access_management_deletion_follows_management() {
    let am = access_management(Vec::new());

    let denied = policies(MemoryStore::new().with(management(&[], &[], &[])))
        .access_management
        .validate_delete(&delete_ctx(), &am)
        .await
        .unwrap_err();
    assert!(matches!(
        denied.error,
        AdmissionError::AccessManagementDeletionForbidden
    ));

    let mut deleting: Management = management(&[], &[], &[]);
    deleting.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    assert!(
        policies(MemoryStore::new().with(deleting))
            .access_management
            .validate_delete(&delete_ctx(), &am)
            .await
            .is_ok()
    );

    assert!(
        policies(MemoryStore::new())
            .access_management
            .validate_delete(&delete_ctx(), &am)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_deleting_unreferenced_objects_is_allowed() {
    let policies = policies(MemoryStore::new().with(management(&[], &[], &[])));
    let template = ClusterTemplateBuilder::new("aws-standalone-cp").build();
    let deployment: ClusterDeployment = ClusterDeploymentBuilder::new("aws-1").build();

    assert!(
        policies
            .cluster_template
            .validate_delete(&delete_ctx(), &template)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        policies
            .cluster_deployment
            .validate_delete(&delete_ctx(), &deployment)
            .await
            .is_ok()
    );
}
