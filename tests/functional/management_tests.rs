//! Management, ManagementBackup and template chain admission.

use std::collections::BTreeMap;
use std::sync::Arc;

use template_operator::crd::{
    ClusterTemplateChain, ClusterTemplateChainSpec, CoreProviderTemplate, Management,
    ManagementBackup, ManagementBackupSpec, NamedProviderTemplate, Provider, ProviderTemplate,
    ProviderTemplateSpec, ProviderTemplateStatus, ProviderTuple, Providers, Release, ReleaseSpec,
    ServiceTemplateChain, ServiceTemplateChainSpec, TemplateStatusCommon,
};
use template_operator::store::MemoryStore;
use template_operator::webhooks::{
    AdmissionError, Operation, Policies, ValidationContext, Validator,
};

use crate::common::fixtures::*;

fn policies(store: MemoryStore) -> Policies<MemoryStore> {
    Policies::new(Arc::new(store), SYSTEM_NAMESPACE)
}

fn release() -> Release {
    Release::new(
        "hmc-0-0-3",
        ReleaseSpec {
            version: "0.0.3".to_string(),
            capi: CoreProviderTemplate {
                template: "cluster-api-0-0-4".to_string(),
            },
            providers: vec![
                NamedProviderTemplate {
                    name: "cluster-api-provider-aws".to_string(),
                    template: "cluster-api-provider-aws-0-0-4".to_string(),
                },
                NamedProviderTemplate {
                    name: "cluster-api-provider-azure".to_string(),
                    template: "cluster-api-provider-azure-0-0-4".to_string(),
                },
            ],
            ..Default::default()
        },
    )
}

fn provider_template(
    name: &str,
    contract: &str,
    contracts: &[&str],
    infrastructure: &[&str],
) -> ProviderTemplate {
    let mut template = ProviderTemplate::new(name, ProviderTemplateSpec::default());
    template.status = Some(ProviderTemplateStatus {
        common: TemplateStatusCommon {
            valid: true,
            ..Default::default()
        },
        providers: Providers {
            infrastructure_providers: infrastructure
                .iter()
                .map(|p| ProviderTuple::new(*p, ""))
                .collect(),
            ..Default::default()
        },
        capi_contract: contract.to_string(),
        capi_contracts: contracts
            .iter()
            .map(|c| (c.to_string(), String::new()))
            .collect::<BTreeMap<_, _>>(),
    });
    template
}

fn with_providers(names: &[&str]) -> Management {
    let mut mgmt = management(&[], &[], &[]);
    mgmt.spec.providers = names
        .iter()
        .map(|n| Provider {
            name: n.to_string(),
            ..Default::default()
        })
        .collect();
    mgmt
}

fn platform() -> MemoryStore {
    MemoryStore::new()
        .with(release())
        .with(provider_template("cluster-api-0-0-4", "v1beta1", &[], &[]))
        .with(provider_template(
            "cluster-api-provider-aws-0-0-4",
            "",
            &["v1beta1"],
            &["infrastructure-aws"],
        ))
        .with(provider_template(
            "cluster-api-provider-azure-0-0-4",
            "",
            &["v1alpha4"],
            &["infrastructure-azure"],
        ))
        .with(
            ClusterTemplateBuilder::new("aws-standalone-cp")
                .namespace("prod")
                .infrastructure("infrastructure-aws", "")
                .build(),
        )
        .with(
            ClusterDeploymentBuilder::new("aws-1")
                .namespace("prod")
                .template("aws-standalone-cp")
                .build(),
        )
}

#[tokio::test]
async fn test_management_is_a_singleton() {
    let ctx = ValidationContext::new(Operation::Create);
    let mgmt = management(&[], &[], &[]);

    assert!(
        policies(MemoryStore::new())
            .management
            .validate_create(&ctx, &mgmt)
            .await
            .is_ok()
    );
    let denied = policies(MemoryStore::new().with(mgmt.clone()))
        .management
        .validate_create(&ctx, &mgmt)
        .await
        .unwrap_err();
    assert_eq!(denied.error.to_string(), "Management object already exists");
}

#[tokio::test]
async fn test_removing_provider_in_use_is_rejected() {
    let ctx = ValidationContext::new(Operation::Update);
    let old = with_providers(&["cluster-api-provider-aws"]);
    let new = with_providers(&[]);

    let denied = policies(platform())
        .management
        .validate_update(&ctx, &old, &new)
        .await
        .unwrap_err();
    assert_eq!(denied.warnings, vec!["Some of the providers cannot be removed"]);
    assert_eq!(
        denied.error.to_string(),
        "the Management is invalid: provider infrastructure-aws is required by at least one ClusterDeployment (prod/aws-1) and cannot be removed from the Management hmc"
    );
}

#[tokio::test]
async fn test_incompatible_capi_contract_is_rejected() {
    let ctx = ValidationContext::new(Operation::Update);
    let old = with_providers(&["cluster-api-provider-aws"]);
    let new = with_providers(&["cluster-api-provider-aws", "cluster-api-provider-azure"]);

    let denied = policies(platform())
        .management
        .validate_update(&ctx, &old, &new)
        .await
        .unwrap_err();
    assert_eq!(
        denied.warnings,
        vec!["The Management object has incompatible CAPI contract versions in ProviderTemplates"]
    );
    assert_eq!(
        denied.error.to_string(),
        "the Management is invalid: core CAPI contract versions does not support v1beta1 version in the ProviderTemplate cluster-api-provider-azure-0-0-4"
    );
}

#[tokio::test]
async fn test_compatible_update_is_allowed() {
    let ctx = ValidationContext::new(Operation::Update);
    let mgmt = with_providers(&["cluster-api-provider-aws"]);
    assert!(
        policies(platform())
            .management
            .validate_update(&ctx, &mgmt, &mgmt)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_missing_release_is_reported() {
    let ctx = ValidationContext::new(Operation::Update);
    let mut new = with_providers(&[]);
    new.spec.release = "hmc-9-9-9".to_string();

    let denied = policies(MemoryStore::new())
        .management
        .validate_update(&ctx, &new, &new)
        .await
        .unwrap_err();
    assert!(denied.error.is_not_found());
    assert!(denied.error.to_string().starts_with("failed to get Release hmc-9-9-9"));
}

#[tokio::test]
async fn test_backup_requires_enabled_feature() {
    let ctx = ValidationContext::new(Operation::Create);
    let backup = ManagementBackup::new("nightly", ManagementBackupSpec::default());

    let denied = policies(MemoryStore::new().with(management(&[], &[], &[])))
        .management_backup
        .validate_create(&ctx, &backup)
        .await
        .unwrap_err();
    assert_eq!(denied.warnings, vec!["Management backup feature is disabled"]);

    let mut enabled = management(&[], &[], &[]);
    enabled.spec.backup.enabled = true;
    assert!(
        policies(MemoryStore::new().with(enabled))
            .management_backup
            .validate_create(&ctx, &backup)
            .await
            .is_ok()
    );

    let denied = policies(MemoryStore::new())
        .management_backup
        .validate_create(&ctx, &backup)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::ManagementNotFound));
}

#[tokio::test]
async fn test_chain_with_dangling_upgrade_is_rejected() {
    let ctx = ValidationContext::new(Operation::Create);
    let chain = ClusterTemplateChain::new(
        "aws",
        ClusterTemplateChainSpec {
            supported_templates: supported(&[
                ("aws-standalone-cp-0-0-1", &["aws-standalone-cp-0-0-2"]),
                ("aws-standalone-cp-0-0-2", &["aws-standalone-cp-0-0-3"]),
            ]),
        },
    );

    let denied = policies(MemoryStore::new())
        .cluster_template_chain
        .validate_create(&ctx, &chain)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::InvalidTemplateChainSpec));
    assert_eq!(
        denied.warnings,
        vec!["template aws-standalone-cp-0-0-3 is allowed for upgrade but is not present in the list of spec.SupportedTemplates"]
    );
}

#[tokio::test]
async fn test_closed_service_chain_is_accepted() {
    let ctx = ValidationContext::new(Operation::Create);
    let chain = ServiceTemplateChain::new(
        "ingress",
        ServiceTemplateChainSpec {
            supported_templates: supported(&[
                ("ingress-nginx-4-11-0", &["ingress-nginx-4-11-3"]),
                ("ingress-nginx-4-11-3", &[]),
            ]),
        },
    );

    assert!(
        policies(MemoryStore::new())
            .service_template_chain
            .validate_create(&ctx, &chain)
            .await
            .unwrap()
            .is_empty()
    );
}
