//! Template chain Custom Resource Definitions.
//!
//! A chain lists the templates it supports and, for each, the templates a
//! deployment may upgrade to. Chains live in the system namespace and are
//! the unit access rules distribute.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::Indexed;

/// A template supported by a chain, with its allowed upgrade targets.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportedTemplate {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_upgrades: Vec<AvailableUpgrade>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct AvailableUpgrade {
    pub name: String,
}

/// Read access to a chain's upgrade graph.
pub trait TemplateChain {
    /// Kind of the chain object.
    const KIND: &'static str;
    /// Kind of the templates the chain manages.
    const TEMPLATE_KIND: &'static str;

    fn supported_templates(&self) -> &[SupportedTemplate];

    /// Names of all supported templates, in declaration order.
    fn template_names(&self) -> Vec<String> {
        self.supported_templates()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }
}

/// ClusterTemplateChain is the upgrade graph over ClusterTemplates.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "ClusterTemplateChain",
    plural = "clustertemplatechains",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateChainSpec {
    #[serde(default)]
    pub supported_templates: Vec<SupportedTemplate>,
}

/// ServiceTemplateChain is the upgrade graph over ServiceTemplates.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hmc.mirantis.com",
    version = "v1alpha1",
    kind = "ServiceTemplateChain",
    plural = "servicetemplatechains",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplateChainSpec {
    #[serde(default)]
    pub supported_templates: Vec<SupportedTemplate>,
}

impl TemplateChain for ClusterTemplateChain {
    const KIND: &'static str = "ClusterTemplateChain";
    const TEMPLATE_KIND: &'static str = "ClusterTemplate";

    fn supported_templates(&self) -> &[SupportedTemplate] {
        &self.spec.supported_templates
    }
}

impl TemplateChain for ServiceTemplateChain {
    const KIND: &'static str = "ServiceTemplateChain";
    const TEMPLATE_KIND: &'static str = "ServiceTemplate";

    fn supported_templates(&self) -> &[SupportedTemplate] {
        &self.spec.supported_templates
    }
}

impl Indexed for ClusterTemplateChain {}
impl Indexed for ServiceTemplateChain {}
