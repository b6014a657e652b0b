//! Management and Release Custom Resource Definitions.
//!
//! `Management` is the cluster-wide singleton naming the active release and
//! the provider components enabled on the platform. `Release` pins the
//! provider templates that make up one platform version.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::template::Providers;
use crate::store::Indexed;

/// Name of the Management singleton.
pub const MANAGEMENT_NAME: &str = "hmc";

/// Management describes the platform's enabled components.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "Management",
    plural = "managements",
    shortname = "hmc-mgmt",
    status = "ManagementStatus",
    printcolumn = r#"{"name":"Release","type":"string","jsonPath":".spec.release"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ManagementSpec {
    /// Name of the active Release.
    pub release: String,

    /// Core components. Templates default to those of the release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<Core>,

    /// Enabled CAPI providers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<Provider>,

    #[serde(default)]
    pub backup: ManagementBackupSettings,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Core {
    #[serde(default)]
    pub hmc: Component,

    #[serde(default)]
    pub capi: Component,
}

/// A platform component installed from a ProviderTemplate.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// ProviderTemplate name. Empty means "the release's template".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub name: String,

    #[serde(flatten)]
    pub component: Component,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagementBackupSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schedule: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagementStatus {
    /// Providers that are installed and ready, with exact versions.
    #[serde(default)]
    pub available_providers: Providers,

    /// Installation state per component name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentStatus>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
}

impl Management {
    /// Explicitly named ProviderTemplates in the spec.
    pub fn templates(&self) -> Vec<&str> {
        let core = self
            .spec
            .core
            .iter()
            .flat_map(|c| [c.capi.template.as_str(), c.hmc.template.as_str()]);
        let providers = self
            .spec
            .providers
            .iter()
            .map(|p| p.component.template.as_str());
        core.chain(providers).filter(|t| !t.is_empty()).collect()
    }

    pub fn available_providers(&self) -> Providers {
        self.status
            .as_ref()
            .map(|s| s.available_providers.clone())
            .unwrap_or_default()
    }

    pub fn backup_enabled(&self) -> bool {
        self.spec.backup.enabled
    }
}

impl Indexed for Management {}

// ============================================================================
// Release
// ============================================================================

/// Release pins the provider templates of one platform version.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "Release",
    plural = "releases",
    status = "ReleaseStatus",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    pub version: String,

    /// Core controller template.
    pub hmc: CoreProviderTemplate,

    /// Core CAPI template.
    pub capi: CoreProviderTemplate,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<NamedProviderTemplate>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CoreProviderTemplate {
    pub template: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamedProviderTemplate {
    pub name: String,
    pub template: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Release {
    /// All ProviderTemplates named by the release.
    pub fn templates(&self) -> Vec<&str> {
        [self.spec.capi.template.as_str(), self.spec.hmc.template.as_str()]
            .into_iter()
            .chain(self.spec.providers.iter().map(|p| p.template.as_str()))
            .collect()
    }

    /// Template pinned for the named provider, if any.
    pub fn provider_template(&self, name: &str) -> Option<&str> {
        self.spec
            .providers
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.template.as_str())
    }
}

impl Indexed for Release {}
