//! ClusterDeployment creation, upgrades and defaulting.

use std::sync::Arc;

use template_operator::crd::ClusterDeployment;
use template_operator::store::MemoryStore;
use template_operator::webhooks::policies::ClusterDeploymentValidator;
use template_operator::webhooks::{
    AdmissionError, Defaulter, Operation, ValidationContext, Validator, default_patch,
};

use crate::common::fixtures::*;

const AWS_IDENTITY: &str = "AWSClusterStaticIdentity";

/// Platform with AWS providers ready at fixed versions, two templates on
/// the upgrade path and a ready AWS credential.
fn platform() -> MemoryStore {
    MemoryStore::new()
        .with(management(
            &[("infrastructure-aws", "v2.6.1")],
            &["bootstrap-k0smotron"],
            &["control-plane-k0smotron"],
        ))
        .with(
            ClusterTemplateBuilder::new("aws-standalone-cp-0-0-1")
                .infrastructure("infrastructure-aws", "")
                .bootstrap(&["bootstrap-k0smotron"])
                .control_plane(&["control-plane-k0smotron"])
                .kubernetes_version("v1.30.4")
                .config(serde_json::json!({"region": "us-east-2"}))
                .build(),
        )
        .with(
            ClusterTemplateBuilder::new("aws-standalone-cp-0-0-2")
                .infrastructure("infrastructure-aws", ">= 2.7.0")
                .bootstrap(&["bootstrap-k0smotron"])
                .control_plane(&["control-plane-k0smotron"])
                .kubernetes_version("v1.31.1")
                .build(),
        )
        .with(credential("default", "cred", AWS_IDENTITY))
}

fn validator(store: MemoryStore) -> ClusterDeploymentValidator<MemoryStore> {
    ClusterDeploymentValidator::new(Arc::new(store))
}

fn deployment(template: &str) -> ClusterDeployment {
    ClusterDeploymentBuilder::new("aws-1").template(template).build()
}

#[tokio::test]
async fn test_create_with_ready_providers_and_credential() {
    let ctx = ValidationContext::new(Operation::Create);
    let warnings = validator(platform())
        .validate_create(&ctx, &deployment("aws-standalone-cp-0-0-1"))
        .await
        .unwrap();
    assert!(warnings.is_empty());
}

#[tokio::test]
async fn test_create_ignores_provider_versions() {
    // Version constraints are enforced on update only.
    let ctx = ValidationContext::new(Operation::Create);
    assert!(
        validator(platform())
            .validate_create(&ctx, &deployment("aws-standalone-cp-0-0-2"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_create_with_missing_template() {
    let ctx = ValidationContext::new(Operation::Create);
    let denied = validator(platform())
        .validate_create(&ctx, &deployment("gcp-standalone-cp"))
        .await
        .unwrap_err();
    assert!(denied.error.is_not_found());
    assert!(
        denied
            .error
            .to_string()
            .starts_with("the ClusterDeployment is invalid: ")
    );
}

#[tokio::test]
async fn test_create_with_invalid_template() {
    let store = platform().with(
        ClusterTemplateBuilder::new("broken")
            .invalid("chart not found")
            .build(),
    );
    let ctx = ValidationContext::new(Operation::Create);
    let denied = validator(store)
        .validate_create(&ctx, &deployment("broken"))
        .await
        .unwrap_err();
    assert_eq!(
        denied.error.to_string(),
        "the ClusterDeployment is invalid: the template is not valid: chart not found"
    );
}

#[tokio::test]
async fn test_create_with_missing_providers_reports_every_category() {
    let store = platform().with(
        ClusterTemplateBuilder::new("azure-standalone-cp")
            .infrastructure("infrastructure-azure", "")
            .bootstrap(&["bootstrap-kubeadm"])
            .control_plane(&["control-plane-k0smotron"])
            .build(),
    );
    let ctx = ValidationContext::new(Operation::Create);
    let denied = validator(store)
        .validate_create(&ctx, &deployment("azure-standalone-cp"))
        .await
        .unwrap_err();

    let message = denied.error.to_string();
    assert!(message.starts_with("the ClusterDeployment is invalid: providers verification failed: "));
    assert!(message.contains(
        "one or more required bootstrap providers are not deployed yet: [bootstrap-kubeadm]"
    ));
    assert!(message.contains(
        "one or more required infrastructure providers are not deployed yet: [infrastructure-azure]"
    ));
    assert!(!message.contains("control plane"));
}

#[tokio::test]
async fn test_create_without_management() {
    let store = MemoryStore::new().with(
        ClusterTemplateBuilder::new("aws-standalone-cp-0-0-1")
            .infrastructure("infrastructure-aws", "")
            .build(),
    );
    let ctx = ValidationContext::new(Operation::Create);
    let denied = validator(store)
        .validate_create(&ctx, &deployment("aws-standalone-cp-0-0-1"))
        .await
        .unwrap_err();
    assert_eq!(
        denied.error.to_string(),
        "the ClusterDeployment is invalid: providers verification failed: no Management object found"
    );
}

#[tokio::test]
async fn test_create_with_wrong_identity_kind() {
    let store = platform().with(credential("default", "azure-cred", "AzureClusterIdentity"));
    let cd = ClusterDeploymentBuilder::new("aws-1")
        .template("aws-standalone-cp-0-0-1")
        .credential("azure-cred")
        .build();
    let ctx = ValidationContext::new(Operation::Create);

    let denied = validator(store).validate_create(&ctx, &cd).await.unwrap_err();
    assert_eq!(
        denied.error.to_string(),
        "the ClusterDeployment is invalid: wrong kind of the ClusterIdentity \"AzureClusterIdentity\" for provider \"infrastructure-aws\""
    );
}

#[tokio::test]
async fn test_service_constraint_rejects_cluster_version() {
    let store = platform().with(service_template("default", "ingress-nginx", "< 1.30.0"));
    let cd = ClusterDeploymentBuilder::new("aws-1")
        .template("aws-standalone-cp-0-0-1")
        .service("ingress-nginx")
        .build();
    let ctx = ValidationContext::new(Operation::Create);

    let denied = validator(store).validate_create(&ctx, &cd).await.unwrap_err();
    assert_eq!(
        denied.warnings,
        vec!["Failed to validate k8s version compatibility with ServiceTemplates"]
    );
    assert_eq!(
        denied.error.to_string(),
        "failed to validate k8s compatibility: k8s version v1.30.4 of the ClusterDeployment default/aws-1 does not satisfy constrained version < 1.30.0 from the ServiceTemplate default/ingress-nginx"
    );
}

#[tokio::test]
async fn test_service_constraint_accepts_cluster_version() {
    let store = platform().with(service_template("default", "ingress-nginx", ">= 1.29, < 1.32"));
    let cd = ClusterDeploymentBuilder::new("aws-1")
        .template("aws-standalone-cp-0-0-1")
        .service("ingress-nginx")
        .build();
    let ctx = ValidationContext::new(Operation::Create);

    assert!(validator(store).validate_create(&ctx, &cd).await.is_ok());
}

#[tokio::test]
async fn test_upgrade_outside_available_upgrades_is_forbidden() {
    let old = ClusterDeploymentBuilder::new("aws-1")
        .template("aws-standalone-cp-0-0-1")
        .build();
    let new = deployment("aws-standalone-cp-0-0-2");
    let ctx = ValidationContext::new(Operation::Update);

    let denied = validator(platform())
        .validate_update(&ctx, &old, &new)
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AdmissionError::ClusterUpgradeForbidden));
    assert_eq!(
        denied.warnings,
        vec!["Cluster can't be upgraded from aws-standalone-cp-0-0-1 to aws-standalone-cp-0-0-2. This upgrade sequence is not allowed"]
    );
}

#[tokio::test]
async fn test_upgrade_checks_provider_versions() {
    let old = ClusterDeploymentBuilder::new("aws-1")
        .template("aws-standalone-cp-0-0-1")
        .upgrades(&["aws-standalone-cp-0-0-2"])
        .build();
    let new = deployment("aws-standalone-cp-0-0-2");
    let ctx = ValidationContext::new(Operation::Update);

    let denied = validator(platform())
        .validate_update(&ctx, &old, &new)
        .await
        .unwrap_err();
    assert_eq!(
        denied.error.to_string(),
        "the ClusterDeployment is invalid: providers verification failed: one or more required infrastructure providers does not satisfy constraints: [infrastructure-aws v2.6.1 !~ >= 2.7.0]"
    );
}

#[tokio::test]
async fn test_upgrade_along_chain_succeeds() {
    let mut store = platform();
    store.insert(management(
        &[("infrastructure-aws", "v2.7.3")],
        &["bootstrap-k0smotron"],
        &["control-plane-k0smotron"],
    ));
    let old = ClusterDeploymentBuilder::new("aws-1")
        .template("aws-standalone-cp-0-0-1")
        .upgrades(&["aws-standalone-cp-0-0-2"])
        .build();
    let new = deployment("aws-standalone-cp-0-0-2");
    let ctx = ValidationContext::new(Operation::Update);

    assert!(validator(store).validate_update(&ctx, &old, &new).await.is_ok());
}

#[tokio::test]
async fn test_update_without_template_change_skips_upgrade_rules() {
    let cd = deployment("aws-standalone-cp-0-0-2");
    let ctx = ValidationContext::new(Operation::Update);
    assert!(validator(platform()).validate_update(&ctx, &cd, &cd).await.is_ok());
}

#[tokio::test]
async fn test_defaults_copy_template_config() {
    let ctx = ValidationContext::new(Operation::Create);
    let mut cd = deployment("aws-standalone-cp-0-0-1");

    validator(platform()).apply_defaults(&ctx, &mut cd).await.unwrap();
    assert_eq!(cd.spec.config, Some(serde_json::json!({"region": "us-east-2"})));
    assert!(cd.spec.dry_run);
}

#[tokio::test]
async fn test_defaults_keep_explicit_config() {
    let ctx = ValidationContext::new(Operation::Create);
    let cd = ClusterDeploymentBuilder::new("aws-1")
        .template("aws-standalone-cp-0-0-1")
        .config(serde_json::json!({"region": "eu-west-1"}))
        .build();

    let patch = default_patch(&validator(platform()), &ctx, &cd).await.unwrap();
    assert!(patch.0.is_empty());
}

#[tokio::test]
async fn test_default_patch_adds_config_and_dry_run() {
    let ctx = ValidationContext::new(Operation::Create);
    let cd = deployment("aws-standalone-cp-0-0-1");

    let patch = default_patch(&validator(platform()), &ctx, &cd).await.unwrap();
    let mut patched = serde_json::to_value(&cd).unwrap();
    json_patch::patch(&mut patched, &patch.0).unwrap();
    assert_eq!(patched["spec"]["config"]["region"], "us-east-2");
    assert_eq!(patched["spec"]["dryRun"], true);
}
