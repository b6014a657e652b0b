//! AccessManagement, Credential and ManagementBackup Custom Resource Definitions.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::Indexed;

/// Name of the AccessManagement singleton.
pub const ACCESS_MANAGEMENT_NAME: &str = "hmc";

/// AccessManagement declares which template chains are distributed to
/// which namespaces.
///
/// Example:
/// ```yaml
/// apiVersion: hmc.mirantis.com/v1alpha1
/// kind: AccessManagement
/// metadata:
///   name: hmc
/// spec:
///   accessRules:
///     - targetNamespaces:
///         selector:
///           matchLabels:
///             environment: prod
///       clusterTemplateChains:
///         - azure
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "AccessManagement",
    plural = "accessmanagements",
    status = "AccessManagementStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct AccessManagementSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_rules: Vec<AccessRule>,
}

/// Distributes the templates of the named chains to the target namespaces.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    #[serde(default)]
    pub target_namespaces: TargetNamespaces,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_template_chains: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_template_chains: Vec<String>,
}

/// Namespaces an access rule applies to.
///
/// At most one of the fields should be set. An explicit list wins over a
/// string selector, which wins over a structured selector. Nothing set
/// selects every namespace.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetNamespaces {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub string_selector: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessManagementStatus {
    /// Rules applied by the last successful reconciliation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub current: Vec<AccessRule>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Indexed for AccessManagement {}

// ============================================================================
// Credential
// ============================================================================

/// Credential binds a namespace to a CAPI cluster identity.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "Credential",
    plural = "credentials",
    shortname = "cred",
    status = "CredentialStatus",
    namespaced,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSpec {
    pub identity_ref: IdentityRef,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Reference to the provider-specific ClusterIdentity object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    pub kind: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Credential {
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }
}

impl Indexed for Credential {}

// ============================================================================
// ManagementBackup
// ============================================================================

/// ManagementBackup records a backup of the management cluster.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "ManagementBackup",
    plural = "managementbackups",
    status = "ManagementBackupStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagementBackupSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_location: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagementBackupStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_backup_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Indexed for ManagementBackup {}
