//! Distribution state of managed templates across namespaces.
//!
//! For each template kind the state maps template name to namespace to a
//! flag. The current state seeds every managed copy with `false`; applying
//! access rules flips the pairs the rules allow to `true`. What remains
//! `false` under a name that is allowed somewhere is a copy the new rules
//! would remove.

use std::collections::BTreeMap;
use std::fmt;

use futures::TryStreamExt;
use kube::ResourceExt;
use tracing::debug;

use crate::crd::{ClusterTemplate, MANAGED_LABEL_KEY, MANAGED_LABEL_VALUE, ServiceTemplate};
use crate::store::{IndexField, ListOptions, Selector, Store, StoreError, StoreObject, list_all};

/// Template kinds distributed by access rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateKind {
    Cluster,
    Service,
}

impl TemplateKind {
    pub fn kind(self) -> &'static str {
        match self {
            TemplateKind::Cluster => "ClusterTemplate",
            TemplateKind::Service => "ServiceTemplate",
        }
    }

    /// ClusterDeployment index holding references to templates of this kind.
    pub fn deployment_index(self) -> IndexField {
        match self {
            TemplateKind::Cluster => IndexField::ClusterDeploymentTemplate,
            TemplateKind::Service => IndexField::ClusterDeploymentServiceTemplates,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Template name to namespace to "allowed here".
pub type Distribution = BTreeMap<String, BTreeMap<String, bool>>;

/// A managed template copy that the proposed rules no longer allow.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Removal {
    pub kind: TemplateKind,
    pub template: String,
    pub namespace: String,
}

/// Distribution of cluster and service templates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplatesState {
    pub cluster_templates: Distribution,
    pub service_templates: Distribution,
}

impl TemplatesState {
    pub fn distribution(&self, kind: TemplateKind) -> &Distribution {
        match kind {
            TemplateKind::Cluster => &self.cluster_templates,
            TemplateKind::Service => &self.service_templates,
        }
    }

    fn distribution_mut(&mut self, kind: TemplateKind) -> &mut Distribution {
        match kind {
            TemplateKind::Cluster => &mut self.cluster_templates,
            TemplateKind::Service => &mut self.service_templates,
        }
    }

    /// Record whether `template` is allowed in `namespace`.
    pub fn set(&mut self, kind: TemplateKind, template: &str, namespace: &str, allowed: bool) {
        self.distribution_mut(kind)
            .entry(template.to_string())
            .or_default()
            .insert(namespace.to_string(), allowed);
    }

    pub fn allow(&mut self, kind: TemplateKind, template: &str, namespace: &str) {
        self.set(kind, template, namespace, true);
    }

    pub fn is_allowed(&self, kind: TemplateKind, template: &str, namespace: &str) -> bool {
        self.distribution(kind)
            .get(template)
            .and_then(|namespaces| namespaces.get(namespace))
            .copied()
            .unwrap_or(false)
    }

    /// Copies left disallowed under a template name that is allowed in at
    /// least one namespace, ordered by kind, template and namespace.
    pub fn removals(&self) -> Vec<Removal> {
        [TemplateKind::Cluster, TemplateKind::Service]
            .into_iter()
            .flat_map(|kind| {
                self.distribution(kind)
                    .iter()
                    .filter(|(_, namespaces)| namespaces.values().any(|allowed| *allowed))
                    .flat_map(move |(template, namespaces)| {
                        namespaces
                            .iter()
                            .filter(|(_, allowed)| !**allowed)
                            .map(move |(namespace, _)| Removal {
                                kind,
                                template: template.clone(),
                                namespace: namespace.clone(),
                            })
                    })
            })
            .collect()
    }
}

/// Current distribution: every managed template outside the system
/// namespace, each marked not allowed.
pub async fn current_templates_state<S: Store>(
    store: &S,
    system_namespace: &str,
) -> Result<TemplatesState, StoreError> {
    let mut state = TemplatesState::default();
    seed::<ClusterTemplate, S>(store, system_namespace, TemplateKind::Cluster, &mut state).await?;
    seed::<ServiceTemplate, S>(store, system_namespace, TemplateKind::Service, &mut state).await?;
    debug!(
        cluster_templates = state.cluster_templates.len(),
        service_templates = state.service_templates.len(),
        "Computed current templates state"
    );
    Ok(state)
}

async fn seed<K, S>(
    store: &S,
    system_namespace: &str,
    kind: TemplateKind,
    state: &mut TemplatesState,
) -> Result<(), StoreError>
where
    K: StoreObject,
    S: Store,
{
    let managed: Selector = [(MANAGED_LABEL_KEY, MANAGED_LABEL_VALUE)].into_iter().collect();
    let templates = list_all::<K, S>(store, ListOptions::default().matching(managed));
    let mut templates = std::pin::pin!(templates);

    while let Some(template) = templates.try_next().await? {
        let namespace = template.namespace().unwrap_or_default();
        if namespace == system_namespace {
            continue;
        }
        state.set(kind, &template.name_any(), &namespace, false);
    }
    Ok(())
}
