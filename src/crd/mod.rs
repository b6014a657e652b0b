//! Custom Resource Definitions (CRDs) for template-operator.
//!
//! - Templates: `ClusterTemplate`, `ServiceTemplate`, `ProviderTemplate`
//! - Upgrade graphs: `ClusterTemplateChain`, `ServiceTemplateChain`
//! - Workloads: `ClusterDeployment`, `MultiClusterService`, `Credential`
//! - Platform singletons: `Management`, `Release`, `AccessManagement`,
//!   `ManagementBackup`

mod access_management;
mod cluster_deployment;
mod management;
mod template;
mod template_chain;

pub use access_management::*;
pub use cluster_deployment::*;
pub use management::*;
pub use template::*;
pub use template_chain::*;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Names of the owners of `meta` whose owner reference has the given kind.
pub fn owners_with_kind<'a>(meta: &'a ObjectMeta, kind: &str) -> Vec<&'a str> {
    meta.owner_references
        .iter()
        .flatten()
        .filter(|owner| owner.kind == kind)
        .map(|owner| owner.name.as_str())
        .collect()
}
