//! Test fixtures and builder patterns for platform objects.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use template_operator::crd::{
    AccessManagement, AccessManagementSpec, AccessRule, AvailableUpgrade, ClusterDeployment,
    ClusterDeploymentSpec, ClusterDeploymentStatus, ClusterTemplate, ClusterTemplateChain,
    ClusterTemplateChainSpec, ClusterTemplateSpec, ClusterTemplateStatus, Credential,
    CredentialSpec, CredentialStatus, IdentityRef, MANAGED_LABEL_KEY, MANAGED_LABEL_VALUE,
    Management, ManagementSpec, ManagementStatus, Provider, ProviderTuple, Providers, ServiceSpec,
    ServiceTemplate, ServiceTemplateSpec, ServiceTemplateStatus, SupportedTemplate,
    TargetNamespaces, TemplateStatusCommon,
};

/// Namespace holding platform-owned templates and chains in tests.
pub const SYSTEM_NAMESPACE: &str = "hmc-system";

fn tuples(names: &[&str]) -> Vec<ProviderTuple> {
    names.iter().map(|n| ProviderTuple::new(*n, "")).collect()
}

pub fn namespace(name: &str, labels: &[(&str, &str)]) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Builder for ClusterTemplate fixtures. Templates are valid by default.
#[derive(Clone, Debug)]
pub struct ClusterTemplateBuilder {
    name: String,
    namespace: String,
    valid: bool,
    validation_error: String,
    infrastructure: Vec<ProviderTuple>,
    bootstrap: Vec<ProviderTuple>,
    control_plane: Vec<ProviderTuple>,
    kubernetes_version: String,
    config: Option<serde_json::Value>,
    managed: bool,
    owners: Vec<OwnerReference>,
}

impl ClusterTemplateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            valid: true,
            validation_error: String::new(),
            infrastructure: Vec::new(),
            bootstrap: Vec::new(),
            control_plane: Vec::new(),
            kubernetes_version: String::new(),
            config: None,
            managed: false,
            owners: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn invalid(mut self, error: impl Into<String>) -> Self {
        self.valid = false;
        self.validation_error = error.into();
        self
    }

    /// Required infrastructure provider with a version constraint.
    pub fn infrastructure(mut self, name: &str, constraint: &str) -> Self {
        self.infrastructure.push(ProviderTuple::new(name, constraint));
        self
    }

    pub fn bootstrap(mut self, names: &[&str]) -> Self {
        self.bootstrap.extend(tuples(names));
        self
    }

    pub fn control_plane(mut self, names: &[&str]) -> Self {
        self.control_plane.extend(tuples(names));
        self
    }

    pub fn kubernetes_version(mut self, version: impl Into<String>) -> Self {
        self.kubernetes_version = version.into();
        self
    }

    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Mark the template as distributed by the platform.
    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    pub fn owned_by(mut self, kind: &str, name: &str) -> Self {
        self.owners.push(owner(kind, name));
        self
    }

    pub fn build(self) -> ClusterTemplate {
        let mut template = ClusterTemplate::new(&self.name, ClusterTemplateSpec::default());
        template.metadata.namespace = Some(self.namespace);
        if self.managed {
            template.metadata.labels = Some(managed_labels());
        }
        if !self.owners.is_empty() {
            template.metadata.owner_references = Some(self.owners);
        }
        template.status = Some(ClusterTemplateStatus {
            common: TemplateStatusCommon {
                valid: self.valid,
                validation_error: self.validation_error,
                config: self.config,
                ..Default::default()
            },
            providers: Providers {
                infrastructure_providers: self.infrastructure,
                bootstrap_providers: self.bootstrap,
                control_plane_providers: self.control_plane,
            },
            kubernetes_version: self.kubernetes_version,
        });
        template
    }
}

pub fn service_template(namespace: &str, name: &str, constraint: &str) -> ServiceTemplate {
    let mut template = ServiceTemplate::new(name, ServiceTemplateSpec::default());
    template.metadata.namespace = Some(namespace.to_string());
    template.status = Some(ServiceTemplateStatus {
        common: TemplateStatusCommon {
            valid: true,
            ..Default::default()
        },
        kubernetes_constraint: constraint.to_string(),
    });
    template
}

/// Builder for ClusterDeployment fixtures.
#[derive(Clone, Debug)]
pub struct ClusterDeploymentBuilder {
    name: String,
    namespace: String,
    template: String,
    credential: String,
    services: Vec<ServiceSpec>,
    config: Option<serde_json::Value>,
    available_upgrades: Vec<String>,
}

impl ClusterDeploymentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            template: String::new(),
            credential: "cred".to_string(),
            services: Vec::new(),
            config: None,
            available_upgrades: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    pub fn service(mut self, template: &str) -> Self {
        self.services.push(ServiceSpec {
            template: template.to_string(),
            name: template.to_string(),
            ..Default::default()
        });
        self
    }

    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn upgrades(mut self, templates: &[&str]) -> Self {
        self.available_upgrades = templates.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn build(self) -> ClusterDeployment {
        let mut cd = ClusterDeployment::new(
            &self.name,
            ClusterDeploymentSpec {
                template: self.template,
                credential: self.credential,
                config: self.config,
                services: self.services,
                ..Default::default()
            },
        );
        cd.metadata.namespace = Some(self.namespace);
        if !self.available_upgrades.is_empty() {
            cd.status = Some(ClusterDeploymentStatus {
                available_upgrades: self.available_upgrades,
                ..Default::default()
            });
        }
        cd
    }
}

pub fn credential(namespace: &str, name: &str, identity_kind: &str) -> Credential {
    let mut cred = Credential::new(
        name,
        CredentialSpec {
            identity_ref: IdentityRef {
                kind: identity_kind.to_string(),
                name: format!("{name}-identity"),
                ..Default::default()
            },
            description: String::new(),
        },
    );
    cred.metadata.namespace = Some(namespace.to_string());
    cred.status = Some(CredentialStatus {
        ready: true,
        error: String::new(),
    });
    cred
}

/// Management exposing the given providers, keyed by category.
pub fn management(infrastructure: &[(&str, &str)], bootstrap: &[&str], control_plane: &[&str]) -> Management {
    let mut mgmt = Management::new(
        "hmc",
        ManagementSpec {
            release: "hmc-0-0-3".to_string(),
            providers: infrastructure
                .iter()
                .map(|(name, _)| Provider {
                    name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        },
    );
    mgmt.status = Some(ManagementStatus {
        available_providers: Providers {
            infrastructure_providers: infrastructure
                .iter()
                .map(|(name, version)| ProviderTuple::new(*name, *version))
                .collect(),
            bootstrap_providers: tuples(bootstrap),
            control_plane_providers: tuples(control_plane),
        },
        ..Default::default()
    });
    mgmt
}

pub fn cluster_chain(name: &str, templates: &[(&str, &[&str])]) -> ClusterTemplateChain {
    let mut chain = ClusterTemplateChain::new(
        name,
        ClusterTemplateChainSpec {
            supported_templates: supported(templates),
        },
    );
    chain.metadata.namespace = Some(SYSTEM_NAMESPACE.to_string());
    chain
}

pub fn supported(templates: &[(&str, &[&str])]) -> Vec<SupportedTemplate> {
    templates
        .iter()
        .map(|(name, upgrades)| SupportedTemplate {
            name: name.to_string(),
            available_upgrades: upgrades
                .iter()
                .map(|u| AvailableUpgrade {
                    name: u.to_string(),
                })
                .collect(),
        })
        .collect()
}

pub fn access_management(rules: Vec<AccessRule>) -> AccessManagement {
    AccessManagement::new("hmc", AccessManagementSpec { access_rules: rules })
}

pub fn cluster_rule(chains: &[&str], namespaces: &[&str]) -> AccessRule {
    AccessRule {
        target_namespaces: TargetNamespaces {
            list: namespaces.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        },
        cluster_template_chains: chains.iter().map(|c| c.to_string()).collect(),
        ..Default::default()
    }
}

pub fn owner(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "hmc.mirantis.com/v1alpha1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("{name}-uid"),
        ..Default::default()
    }
}

fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_LABEL_KEY.to_string(), MANAGED_LABEL_VALUE.to_string())])
}
