//! AdmissionReview handling: request in, response with warnings out.

use std::sync::Arc;

use serde::Serialize;
use template_operator::crd::{AccessManagement, ClusterDeployment, ClusterTemplate};
use template_operator::store::MemoryStore;
use template_operator::webhooks::{
    AdmissionRequest, AdmissionReview, Policies, ValidationContext, evaluate, respond,
};

use crate::common::fixtures::*;

fn review<K: Serialize>(
    kind: &str,
    operation: &str,
    object: Option<&K>,
    old_object: Option<&K>,
) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "7c1e5b0a-3f0e-4a59-9d43-6b8e3d0f2b11",
            "kind": {"group": "hmc.mirantis.com", "version": "v1alpha1", "kind": kind},
            "resource": {"group": "hmc.mirantis.com", "version": "v1alpha1", "resource": kind.to_lowercase()},
            "name": "object",
            "namespace": "prod",
            "operation": operation,
            "userInfo": {"username": "platform-admin"},
            "object": object,
            "oldObject": old_object,
            "dryRun": false
        }
    })
}

fn request<K>(value: serde_json::Value) -> AdmissionRequest<K>
where
    K: kube::Resource + serde::de::DeserializeOwned,
{
    let review: AdmissionReview<K> = serde_json::from_value(value).unwrap();
    review.try_into().unwrap()
}

#[tokio::test]
async fn test_denied_response_carries_reason_and_warnings() {
    let store = MemoryStore::new()
        .with(namespace("prod", &[]))
        .with(cluster_chain("azure", &[("azure-hosted-cp", &[])]))
        .with(
            ClusterTemplateBuilder::new("azure-hosted-cp")
                .namespace("prod")
                .managed()
                .build(),
        )
        .with(
            ClusterTemplateBuilder::new("azure-hosted-cp")
                .namespace("dev")
                .managed()
                .build(),
        )
        .with(
            ClusterDeploymentBuilder::new("azure-hosted-1")
                .namespace("prod")
                .template("azure-hosted-cp")
                .build(),
        );
    let policies = Policies::new(Arc::new(store), SYSTEM_NAMESPACE);
    let old = access_management(vec![cluster_rule(&["azure"], &["dev", "prod"])]);
    let new = access_management(vec![cluster_rule(&["azure"], &["dev"])]);

    let request: AdmissionRequest<AccessManagement> =
        request(review("AccessManagement", "UPDATE", Some(&new), Some(&old)));
    let ctx = ValidationContext::from_request(&request);
    let response = respond(
        &request,
        evaluate(&policies.access_management, &ctx, &request).await,
    );

    assert!(!response.allowed);
    assert_eq!(response.uid, "7c1e5b0a-3f0e-4a59-9d43-6b8e3d0f2b11");
    assert_eq!(
        response.result.message,
        "[AccessRulesRejected] can not apply new access rules"
    );
    assert_eq!(
        response.warnings,
        Some(vec![
            "The ClusterTemplate azure-hosted-cp is in use by the ClusterDeployment prod/azure-hosted-1"
                .to_string()
        ])
    );
}

#[tokio::test]
async fn test_allowed_create_round_trip() {
    let policies = Policies::new(Arc::new(MemoryStore::new()), SYSTEM_NAMESPACE);
    let template = ClusterTemplateBuilder::new("aws-standalone-cp")
        .namespace("prod")
        .build();

    let request: AdmissionRequest<ClusterTemplate> =
        request(review("ClusterTemplate", "CREATE", Some(&template), None));
    let ctx = ValidationContext::from_request(&request);
    assert!(ctx.is_create());
    assert_eq!(ctx.namespace.as_deref(), Some("prod"));

    let response = respond(&request, evaluate(&policies.cluster_template, &ctx, &request).await);
    assert!(response.allowed);
    assert!(response.warnings.is_none());
}

#[tokio::test]
async fn test_create_without_object_is_bad_request() {
    let policies = Policies::new(Arc::new(MemoryStore::new()), SYSTEM_NAMESPACE);
    let request: AdmissionRequest<ClusterDeployment> =
        request(review::<ClusterDeployment>("ClusterDeployment", "CREATE", None, None));
    let ctx = ValidationContext::from_request(&request);

    let denied = evaluate(&policies.cluster_deployment, &ctx, &request)
        .await
        .unwrap_err();
    assert_eq!(denied.error.reason(), "BadRequest");
    assert_eq!(denied.error.to_string(), "missing object in CREATE request");
}

#[tokio::test]
async fn test_repeated_evaluation_is_idempotent() {
    let store = MemoryStore::new().with(
        ClusterDeploymentBuilder::new("aws-1")
            .namespace("prod")
            .template("aws-standalone-cp")
            .build(),
    );
    let policies = Policies::new(Arc::new(store), SYSTEM_NAMESPACE);
    let template = ClusterTemplateBuilder::new("aws-standalone-cp")
        .namespace("prod")
        .build();
    let request: AdmissionRequest<ClusterTemplate> =
        request(review("ClusterTemplate", "DELETE", None, Some(&template)));
    let ctx = ValidationContext::from_request(&request);

    let first = respond(&request, evaluate(&policies.cluster_template, &ctx, &request).await);
    let second = respond(&request, evaluate(&policies.cluster_template, &ctx, &request).await);
    assert!(!first.allowed);
    assert_eq!(first.allowed, second.allowed);
    assert_eq!(first.warnings, second.warnings);
    assert_eq!(first.result.message, second.result.message);
}
