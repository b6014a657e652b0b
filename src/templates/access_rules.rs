//! Expansion of access rules into (template, namespace) pairs.
//!
//! A rule names template chains and a set of target namespaces. Chains are
//! read from the system namespace and flattened into the template names
//! they support; target namespaces are resolved against live Namespace
//! objects unless listed explicitly.

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tracing::{debug, warn};

use super::state::{TemplateKind, TemplatesState};
use crate::crd::{
    AccessRule, ClusterTemplateChain, ServiceTemplateChain, TargetNamespaces, TemplateChain,
};
use crate::store::{ListOptions, Selector, SelectorError, Store, StoreObject, collect, parse_selector};
use crate::webhooks::AdmissionError;

/// Namespaces selected by `target`.
///
/// An explicit list is returned verbatim. Otherwise the string selector is
/// used when set, else the structured selector; an empty selector selects
/// every namespace.
pub async fn target_namespaces<S: Store>(
    store: &S,
    target: &TargetNamespaces,
) -> Result<Vec<String>, AdmissionError> {
    if !target.list.is_empty() {
        return Ok(target.list.clone());
    }

    let selector = if !target.string_selector.is_empty() {
        parse_selector(&target.string_selector)
    } else if let Some(structured) = &target.selector {
        Selector::try_from(structured.clone()).map_err(SelectorError::from)
    } else {
        Ok(Selector::default())
    }
    .map_err(|e| AdmissionError::message(format!("failed to parse target namespaces selector: {e}")))?;

    let namespaces: Vec<Namespace> =
        collect(store, ListOptions::default().matching(selector)).await?;
    Ok(namespaces.iter().map(ResourceExt::name_any).collect())
}

/// Template names supported by the chain `name` in the system namespace.
pub async fn chain_templates<C, S>(
    store: &S,
    system_namespace: &str,
    name: &str,
) -> Result<Vec<String>, AdmissionError>
where
    C: TemplateChain + StoreObject,
    S: Store,
{
    let chain: C = store.get(Some(system_namespace), name).await.map_err(|e| {
        AdmissionError::invalid(format!("failed to get {} {system_namespace}/{name}", C::KIND), e)
    })?;
    Ok(chain.template_names())
}

/// Overlay the pairs allowed by `rules` onto `state`.
///
/// A chain that cannot be read skips that chain only; every such failure
/// is returned together once all rules have been applied. Namespace
/// resolution failures abort immediately.
pub async fn apply_access_rules<S: Store>(
    store: &S,
    system_namespace: &str,
    rules: &[AccessRule],
    state: &mut TemplatesState,
) -> Result<(), AdmissionError> {
    let mut errors = Vec::new();

    for rule in rules {
        let namespaces = target_namespaces(store, &rule.target_namespaces).await?;
        debug!(?namespaces, "Resolved access rule target namespaces");

        for chain in &rule.cluster_template_chains {
            match chain_templates::<ClusterTemplateChain, S>(store, system_namespace, chain).await {
                Ok(templates) => allow_all(state, TemplateKind::Cluster, &templates, &namespaces),
                Err(e) => {
                    warn!(chain = %chain, error = %e, "Skipping unreadable ClusterTemplateChain");
                    errors.push(e);
                }
            }
        }

        for chain in &rule.service_template_chains {
            match chain_templates::<ServiceTemplateChain, S>(store, system_namespace, chain).await {
                Ok(templates) => allow_all(state, TemplateKind::Service, &templates, &namespaces),
                Err(e) => {
                    warn!(chain = %chain, error = %e, "Skipping unreadable ServiceTemplateChain");
                    errors.push(e);
                }
            }
        }
    }

    match AdmissionError::aggregate(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn allow_all(
    state: &mut TemplatesState,
    kind: TemplateKind,
    templates: &[String],
    namespaces: &[String],
) {
    for template in templates {
        for namespace in namespaces {
            state.allow(kind, template, namespace);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::crd::{ClusterTemplateChainSpec, SupportedTemplate};
    use crate::store::MemoryStore;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use std::collections::BTreeMap;

    fn namespace(name: &str, env: &str) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([("env".to_string(), env.to_string())])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn chain(name: &str, templates: &[&str]) -> ClusterTemplateChain {
        let mut chain = ClusterTemplateChain::new(
            name,
            ClusterTemplateChainSpec {
                supported_templates: templates
                    .iter()
                    .map(|t| SupportedTemplate {
                        name: t.to_string(),
                        available_upgrades: Vec::new(),
                    })
                    .collect(),
            },
        );
        chain.metadata.namespace = Some("hmc-system".to_string());
        chain
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with(namespace("dev", "dev"))
            .with(namespace("prod", "prod"))
            .with(namespace("staging", "prod"))
            .with(chain("azure", &["azure-hosted-cp", "azure-standalone-cp"]))
    }

    #[tokio::test]
    async fn test_explicit_list_is_verbatim() {
        let target = TargetNamespaces {
            list: vec!["does-not-exist".to_string()],
            string_selector: "env=prod".to_string(),
            ..Default::default()
        };
        let namespaces = target_namespaces(&store(), &target).await.unwrap();
        assert_eq!(namespaces, vec!["does-not-exist"]);
    }

    #[tokio::test]
    async fn test_string_selector_wins_over_structured() {
        let target = TargetNamespaces {
            string_selector: "env=dev".to_string(),
            selector: Some(LabelSelector {
                match_labels: Some(BTreeMap::from([("env".to_string(), "prod".to_string())])),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(target_namespaces(&store(), &target).await.unwrap(), vec!["dev"]);
    }

    #[tokio::test]
    async fn test_structured_selector() {
        let target = TargetNamespaces {
            selector: Some(LabelSelector {
                match_labels: Some(BTreeMap::from([("env".to_string(), "prod".to_string())])),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            target_namespaces(&store(), &target).await.unwrap(),
            vec!["prod", "staging"]
        );
    }

    #[tokio::test]
    async fn test_empty_target_selects_all() {
        let all = target_namespaces(&store(), &TargetNamespaces::default()).await.unwrap();
        assert_eq!(all, vec!["dev", "prod", "staging"]);

        let empty_structured = TargetNamespaces {
            selector: Some(LabelSelector::default()),
            ..Default::default()
        };
        assert_eq!(target_namespaces(&store(), &empty_structured).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_bad_selector_is_an_error() {
        let target = TargetNamespaces {
            string_selector: "env in prod".to_string(),
            ..Default::default()
        };
        assert!(target_namespaces(&store(), &target).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_rules_marks_cross_product() {
        let rules = vec![AccessRule {
            target_namespaces: TargetNamespaces {
                list: vec!["dev".to_string(), "prod".to_string()],
                ..Default::default()
            },
            cluster_template_chains: vec!["azure".to_string()],
            ..Default::default()
        }];
        let mut state = TemplatesState::default();
        apply_access_rules(&store(), "hmc-system", &rules, &mut state)
            .await
            .unwrap();

        for template in ["azure-hosted-cp", "azure-standalone-cp"] {
            for ns in ["dev", "prod"] {
                assert!(state.is_allowed(TemplateKind::Cluster, template, ns));
            }
        }
        assert!(state.service_templates.is_empty());
    }

    #[tokio::test]
    async fn test_missing_chains_do_not_stop_other_rules() {
        let rules = vec![
            AccessRule {
                target_namespaces: TargetNamespaces {
                    list: vec!["dev".to_string()],
                    ..Default::default()
                },
                cluster_template_chains: vec!["missing".to_string()],
                service_template_chains: vec!["also-missing".to_string()],
            },
            AccessRule {
                target_namespaces: TargetNamespaces {
                    list: vec!["prod".to_string()],
                    ..Default::default()
                },
                cluster_template_chains: vec!["azure".to_string()],
                ..Default::default()
            },
        ];
        let mut state = TemplatesState::default();
        let err = apply_access_rules(&store(), "hmc-system", &rules, &mut state)
            .await
            .unwrap_err();

        assert!(state.is_allowed(TemplateKind::Cluster, "azure-hosted-cp", "prod"));
        let AdmissionError::Aggregate(errors) = &err else {
            panic!("expected aggregate error, got {err:?}");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().starts_with("failed to get ClusterTemplateChain hmc-system/missing"));
        assert!(errors[1].to_string().starts_with("failed to get ServiceTemplateChain hmc-system/also-missing"));
        assert!(errors.iter().all(AdmissionError::is_not_found));
    }
}
