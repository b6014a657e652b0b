//! Template distribution tracking.
//!
//! [`state`] records where managed templates currently live and where the
//! access rules say they should; [`access_rules`] expands rules into the
//! allowed (template, namespace) pairs.

pub mod access_rules;
pub mod state;

pub use access_rules::{apply_access_rules, chain_templates, target_namespaces};
pub use state::{Removal, TemplateKind, TemplatesState, current_templates_state};

use crate::crd::AccessRule;
use crate::store::Store;
use crate::webhooks::AdmissionError;

/// Distribution the given rules would produce, starting from the managed
/// templates that exist now.
pub async fn expected_templates_state<S: Store>(
    store: &S,
    system_namespace: &str,
    rules: &[AccessRule],
) -> Result<TemplatesState, AdmissionError> {
    let mut state = current_templates_state(store, system_namespace).await?;
    apply_access_rules(store, system_namespace, rules, &mut state).await?;
    Ok(state)
}
