//! Template Custom Resource Definitions.
//!
//! Three template flavours share one status shape:
//! - `ClusterTemplate`: a Helm chart that provisions a managed cluster
//! - `ServiceTemplate`: a Helm chart deployed onto managed clusters
//! - `ProviderTemplate`: a Helm chart installing a CAPI provider (cluster-scoped)
//!
//! Templates are produced by chart synchronisation and validated
//! asynchronously; a template may be referenced only once `status.valid` is
//! true.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::{IndexField, Indexed};

/// Label marking objects created and owned by the platform.
pub const MANAGED_LABEL_KEY: &str = "hmc.mirantis.com/managed";
/// Value of [`MANAGED_LABEL_KEY`] on platform-owned objects.
pub const MANAGED_LABEL_VALUE: &str = "true";

/// Helm chart reference shared by all template kinds.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmSpec {
    /// Name of the chart in the default repository.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chart_name: String,

    /// Chart version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chart_version: String,

    /// Reference to an existing chart source object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_ref: Option<ChartRef>,
}

/// Reference to a chart source object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A provider name paired with an exact version or a version constraint.
///
/// Providers exposed by the platform carry exact versions, providers
/// required by templates carry constraints. Either side may be empty.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTuple {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_or_constraint: String,
}

impl ProviderTuple {
    pub fn new(name: impl Into<String>, version_or_constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_or_constraint: version_or_constraint.into(),
        }
    }
}

/// Providers grouped by CAPI provider category.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Providers {
    #[serde(default, rename = "infrastructure", skip_serializing_if = "Vec::is_empty")]
    pub infrastructure_providers: Vec<ProviderTuple>,

    #[serde(default, rename = "bootstrap", skip_serializing_if = "Vec::is_empty")]
    pub bootstrap_providers: Vec<ProviderTuple>,

    #[serde(default, rename = "controlPlane", skip_serializing_if = "Vec::is_empty")]
    pub control_plane_providers: Vec<ProviderTuple>,
}

impl Providers {
    /// Names of every provider across all categories.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.infrastructure_providers
            .iter()
            .chain(&self.bootstrap_providers)
            .chain(&self.control_plane_providers)
            .map(|p| p.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.infrastructure_providers.is_empty()
            && self.bootstrap_providers.is_empty()
            && self.control_plane_providers.is_empty()
    }
}

/// Status fields common to every template kind.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStatusCommon {
    /// Whether the template passed chart validation.
    #[serde(default)]
    pub valid: bool,

    /// Validation failure details when `valid` is false.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub validation_error: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Default chart values, copied onto deployments that omit a config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_ref: Option<ChartRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Access to the status shared by all template kinds.
pub trait Template {
    /// Kind name used in user-facing messages.
    const KIND: &'static str;

    fn common_status(&self) -> Option<&TemplateStatusCommon>;
}

// ============================================================================
// ClusterTemplate
// ============================================================================

/// ClusterTemplate describes how to provision a managed cluster.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "ClusterTemplate",
    plural = "clustertemplates",
    shortname = "clustertmpl",
    status = "ClusterTemplateStatus",
    namespaced,
    printcolumn = r#"{"name":"Valid","type":"boolean","jsonPath":".status.valid"}"#,
    printcolumn = r#"{"name":"Description","type":"string","jsonPath":".status.description"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateSpec {
    pub helm: HelmSpec,

    /// Providers required by the template, overriding chart annotations.
    #[serde(default)]
    pub providers: Providers,

    /// Kubernetes version the template provisions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub k8s_version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateStatus {
    #[serde(flatten)]
    pub common: TemplateStatusCommon,

    /// Providers required by the template, with version constraints.
    #[serde(default)]
    pub providers: Providers,

    /// Exact Kubernetes version of clusters built from this template.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,
}

impl Template for ClusterTemplate {
    const KIND: &'static str = "ClusterTemplate";

    fn common_status(&self) -> Option<&TemplateStatusCommon> {
        self.status.as_ref().map(|s| &s.common)
    }
}

impl Indexed for ClusterTemplate {
    fn index_values(&self, field: IndexField) -> Vec<&str> {
        match (field, &self.status) {
            (IndexField::ClusterTemplateProviders, Some(status)) => {
                status.providers.names().collect()
            }
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// ServiceTemplate
// ============================================================================

/// ServiceTemplate describes a service deployable onto managed clusters.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "ServiceTemplate",
    plural = "servicetemplates",
    shortname = "svctmpl",
    status = "ServiceTemplateStatus",
    namespaced,
    printcolumn = r#"{"name":"Valid","type":"boolean","jsonPath":".status.valid"}"#,
    printcolumn = r#"{"name":"Description","type":"string","jsonPath":".status.description"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplateSpec {
    pub helm: HelmSpec,

    /// Constraint on the Kubernetes version of target clusters.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub k8s_constraint: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplateStatus {
    #[serde(flatten)]
    pub common: TemplateStatusCommon,

    /// Constraint on the Kubernetes version of target clusters.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_constraint: String,
}

impl Template for ServiceTemplate {
    const KIND: &'static str = "ServiceTemplate";

    fn common_status(&self) -> Option<&TemplateStatusCommon> {
        self.status.as_ref().map(|s| &s.common)
    }
}

impl Indexed for ServiceTemplate {}

// ============================================================================
// ProviderTemplate
// ============================================================================

/// ProviderTemplate installs a CAPI provider or a core platform component.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "ProviderTemplate",
    plural = "providertemplates",
    shortname = "providertmpl",
    status = "ProviderTemplateStatus",
    printcolumn = r#"{"name":"Valid","type":"boolean","jsonPath":".status.valid"}"#,
    printcolumn = r#"{"name":"Description","type":"string","jsonPath":".status.description"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTemplateSpec {
    pub helm: HelmSpec,

    /// CAPI contract versions supported by the provider, keyed by CAPI version.
    #[serde(default, rename = "capiContracts", skip_serializing_if = "BTreeMap::is_empty")]
    pub capi_contracts: BTreeMap<String, String>,

    /// Providers installed by the template.
    #[serde(default)]
    pub providers: Providers,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTemplateStatus {
    #[serde(flatten)]
    pub common: TemplateStatusCommon,

    /// Providers installed by the template, with exact versions.
    #[serde(default)]
    pub providers: Providers,

    /// CAPI contract version implemented by the core CAPI template.
    #[serde(default, rename = "capiContract", skip_serializing_if = "String::is_empty")]
    pub capi_contract: String,

    /// CAPI contract versions supported by the provider, keyed by CAPI version.
    #[serde(default, rename = "capiContracts", skip_serializing_if = "BTreeMap::is_empty")]
    pub capi_contracts: BTreeMap<String, String>,
}

impl Template for ProviderTemplate {
    const KIND: &'static str = "ProviderTemplate";

    fn common_status(&self) -> Option<&TemplateStatusCommon> {
        self.status.as_ref().map(|s| &s.common)
    }
}

impl Indexed for ProviderTemplate {}
