//! ClusterDeployment and MultiClusterService Custom Resource Definitions.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::{IndexField, Indexed};

/// ClusterDeployment requests a cluster built from one ClusterTemplate.
///
/// Example:
/// ```yaml
/// apiVersion: hmc.mirantis.com/v1alpha1
/// kind: ClusterDeployment
/// metadata:
///   name: aws-prod-1
///   namespace: prod
/// spec:
///   template: aws-standalone-cp-0-0-2
///   credential: aws-cred
///   services:
///     - template: ingress-nginx-4-11-0
///       name: ingress-nginx
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "ClusterDeployment",
    plural = "clusterdeployments",
    shortname = "clusterd",
    status = "ClusterDeploymentStatus",
    namespaced,
    printcolumn = r#"{"name":"Template","type":"string","jsonPath":".spec.template"}"#,
    printcolumn = r#"{"name":"DryRun","type":"boolean","jsonPath":".spec.dryRun"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    /// Name of the ClusterTemplate in the same namespace.
    pub template: String,

    /// Name of the Credential in the same namespace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credential: String,

    /// Chart values. Defaulted from the template when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,

    /// Render the cluster without creating infrastructure.
    #[serde(default)]
    pub dry_run: bool,

    /// Services to deploy onto the cluster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSpec>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub stop_on_conflict: bool,
}

/// A service to install from a ServiceTemplate.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Name of the ServiceTemplate.
    pub template: String,

    /// Release name of the service.
    pub name: String,

    /// Target namespace on the managed cluster.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,

    /// Skip this service without removing it from the spec.
    #[serde(default)]
    pub disable: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentStatus {
    /// Templates this deployment may be upgraded to, per its template chain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_upgrades: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ClusterDeployment {
    /// Templates of services that are not disabled.
    pub fn enabled_services(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.spec.services.iter().filter(|s| !s.disable)
    }

    pub fn available_upgrades(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|s| s.available_upgrades.as_slice())
            .unwrap_or_default()
    }
}

impl Indexed for ClusterDeployment {
    fn index_values(&self, field: IndexField) -> Vec<&str> {
        match field {
            IndexField::ClusterDeploymentTemplate => vec![self.spec.template.as_str()],
            IndexField::ClusterDeploymentServiceTemplates => self
                .spec
                .services
                .iter()
                .map(|s| s.template.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// MultiClusterService
// ============================================================================

/// MultiClusterService deploys services onto every cluster matching a selector.
///
/// Cluster-scoped; its ServiceTemplates are resolved in the system namespace.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "MultiClusterService",
    plural = "multiclusterservices",
    status = "MultiClusterServiceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterServiceSpec {
    #[serde(default)]
    pub cluster_selector: LabelSelector,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSpec>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub stop_on_conflict: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterServiceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Indexed for MultiClusterService {
    fn index_values(&self, field: IndexField) -> Vec<&str> {
        match field {
            IndexField::MultiClusterServiceTemplates => self
                .spec
                .services
                .iter()
                .map(|s| s.template.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}
