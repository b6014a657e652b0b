//! Template chain admission.
//!
//! A chain is consistent when every upgrade target is itself one of the
//! chain's supported templates. Only creation is checked; chains are
//! rewritten wholesale by the platform afterwards.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use tracing::debug;

use crate::crd::{SupportedTemplate, TemplateChain};
use crate::webhooks::admission::{AdmissionResult, ValidationContext, Validator, allowed};
use crate::webhooks::error::{AdmissionError, Denied};

/// Validator for chains of type `C`.
pub struct TemplateChainValidator<C> {
    _chain: PhantomData<fn() -> C>,
}

impl<C> TemplateChainValidator<C> {
    pub fn new() -> Self {
        Self {
            _chain: PhantomData,
        }
    }
}

impl<C> Default for TemplateChainValidator<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// One warning per upgrade target missing from the supported list, sorted.
pub fn template_chain_warnings(supported: &[SupportedTemplate]) -> Vec<String> {
    let names: BTreeSet<&str> = supported.iter().map(|t| t.name.as_str()).collect();
    let missing: BTreeSet<&str> = supported
        .iter()
        .flat_map(|t| &t.available_upgrades)
        .map(|u| u.name.as_str())
        .filter(|name| !names.contains(name))
        .collect();

    missing
        .into_iter()
        .map(|name| {
            format!(
                "template {name} is allowed for upgrade but is not present in the list of spec.SupportedTemplates"
            )
        })
        .collect()
}

impl<C> Validator<C> for TemplateChainValidator<C>
where
    C: TemplateChain + Send + Sync,
{
    async fn validate_create(&self, _ctx: &ValidationContext, chain: &C) -> AdmissionResult {
        let warnings = template_chain_warnings(chain.supported_templates());
        if !warnings.is_empty() {
            debug!(kind = C::KIND, missing = warnings.len(), "Rejecting inconsistent template chain");
            return Err(Denied::with_warnings(
                warnings,
                AdmissionError::InvalidTemplateChainSpec,
            ));
        }
        allowed()
    }
}
