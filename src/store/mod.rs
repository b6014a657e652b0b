//! Read access to the object store.
//!
//! Validators never cache cluster state: every admission request re-reads
//! what it needs through a [`Store`]. Two implementations exist:
//! - [`KubeStore`]: the live API server via a kube `Client`
//! - [`MemoryStore`]: an in-process store used by tests
//!
//! Lists are paginated. [`list_all`] turns the continuation cursor into a
//! lazy stream, [`first`] and [`exists`] are limit-1 probes on top of it.

mod kube_store;
mod memory;
pub mod selector;

pub use kube_store::KubeStore;
pub use memory::MemoryStore;
pub use kube::core::{Selector, SelectorExt};
pub use selector::{SelectorError, parse_selector};

use std::fmt::Debug;
use std::future::Future;

use futures::{Stream, StreamExt, TryStreamExt, stream};
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Error type for store reads
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Invalid label selector
    #[error("invalid label selector: {0}")]
    Selector(#[from] SelectorError),

    /// A continuation token not issued by this store
    #[error("invalid continue token {0:?}")]
    InvalidContinueToken(String),
}

impl StoreError {
    /// Not-found error for an object of kind `K`, named like the API server does.
    pub fn not_found<K: Resource<DynamicType = ()>>(name: &str) -> Self {
        let plural = K::plural(&());
        let group = K::group(&());
        let resource = if group.is_empty() {
            plural.to_string()
        } else {
            format!("{plural}.{group}")
        };
        StoreError::NotFound {
            resource,
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound { .. } => true,
            StoreError::Api(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }
}

/// Secondary indexes that list calls can filter on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexField {
    /// `ClusterDeployment.spec.template`
    ClusterDeploymentTemplate,
    /// `ClusterDeployment.spec.services[*].template`
    ClusterDeploymentServiceTemplates,
    /// `MultiClusterService.spec.services[*].template`
    MultiClusterServiceTemplates,
    /// Provider names in `ClusterTemplate.status.providers`
    ClusterTemplateProviders,
}

impl std::fmt::Display for IndexField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IndexField::ClusterDeploymentTemplate => ".spec.template",
            IndexField::ClusterDeploymentServiceTemplates => ".spec.services[].template",
            IndexField::MultiClusterServiceTemplates => ".spec.services[].template",
            IndexField::ClusterTemplateProviders => ".status.providers",
        };
        f.write_str(name)
    }
}

/// Objects that expose values for secondary indexes.
///
/// Kinds without indexes keep the default, which indexes nothing.
pub trait Indexed {
    fn index_values(&self, _field: IndexField) -> Vec<&str> {
        Vec::new()
    }
}

impl Indexed for k8s_openapi::api::core::v1::Namespace {}

/// Everything a store needs to read and decode an object of kind `K`.
pub trait StoreObject:
    Resource<DynamicType = ()>
    + Indexed
    + Clone
    + DeserializeOwned
    + Serialize
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<K> StoreObject for K where
    K: Resource<DynamicType = ()>
        + Indexed
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// Filters and paging for a list call.
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    /// Restrict to one namespace. `None` lists across all namespaces.
    pub namespace: Option<String>,
    /// Label selector. Empty selects everything.
    pub selector: Selector,
    /// Secondary index match.
    pub index: Option<(IndexField, String)>,
    /// Page size.
    pub limit: Option<u32>,
    /// Cursor returned by the previous page.
    pub continue_token: Option<String>,
}

impl ListOptions {
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn matching(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    pub fn indexed(mut self, field: IndexField, value: impl Into<String>) -> Self {
        self.index = Some((field, value.into()));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `obj` satisfies the index match, if any.
    pub fn matches_index<K: Indexed>(&self, obj: &K) -> bool {
        match &self.index {
            Some((field, value)) => obj.index_values(*field).contains(&value.as_str()),
            None => true,
        }
    }
}

/// One page of list results.
#[derive(Clone, Debug)]
pub struct Page<K> {
    pub items: Vec<K>,
    /// Cursor for the next page. `None` on the last page.
    pub continue_token: Option<String>,
}

/// Read-only access to cluster objects.
pub trait Store: Send + Sync {
    /// Fetch one object. A missing object is [`StoreError::NotFound`].
    fn get<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> impl Future<Output = Result<K, StoreError>> + Send;

    /// Fetch one page of a list.
    fn list_page<K: StoreObject>(
        &self,
        options: &ListOptions,
    ) -> impl Future<Output = Result<Page<K>, StoreError>> + Send;
}

/// Lazily stream every object matching `options`, following continuation
/// tokens until the store reports the last page.
pub fn list_all<'a, K, S>(
    store: &'a S,
    options: ListOptions,
) -> impl Stream<Item = Result<K, StoreError>> + Send + 'a
where
    K: StoreObject,
    S: Store,
{
    stream::try_unfold(Some(options), move |next| async move {
        let Some(options) = next else {
            return Ok::<_, StoreError>(None);
        };
        let page = store.list_page::<K>(&options).await?;
        let next = page.continue_token.map(|token| ListOptions {
            continue_token: Some(token),
            ..options
        });
        let items = stream::iter(page.items.into_iter().map(Ok::<K, StoreError>));
        Ok(Some((items, next)))
    })
    .try_flatten()
}

/// Collect every object matching `options`.
pub async fn collect<K, S>(store: &S, options: ListOptions) -> Result<Vec<K>, StoreError>
where
    K: StoreObject,
    S: Store,
{
    list_all(store, options).try_collect().await
}

/// First object matching `options`, fetched one item per page.
pub async fn first<K, S>(store: &S, options: ListOptions) -> Result<Option<K>, StoreError>
where
    K: StoreObject,
    S: Store,
{
    let items = list_all::<K, S>(store, options.limit(1));
    let mut items = std::pin::pin!(items);
    items.next().await.transpose()
}

/// Whether any object matches `options`.
pub async fn exists<K, S>(store: &S, options: ListOptions) -> Result<bool, StoreError>
where
    K: StoreObject,
    S: Store,
{
    Ok(first::<K, S>(store, options).await?.is_some())
}
