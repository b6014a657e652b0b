//! Store backed by the Kubernetes API server.

use kube::Client;
use kube::api::{GetParams, ListParams};
use kube::core::{ObjectList, Request};
use tracing::debug;

use super::{ListOptions, Page, Store, StoreError, StoreObject};

/// Page size used when an index filter is evaluated on fetched pages.
const INDEXED_PAGE_SIZE: u32 = 500;

/// Store reading live objects through a kube `Client`.
///
/// Requests are built from the object's URL path, so one code path serves
/// namespaced and cluster-scoped kinds alike. Index matches are evaluated
/// on each fetched page; a page may therefore come back shorter than the
/// limit while a continuation token is still present.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Store for KubeStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let request = Request::new(K::url_path(&(), namespace))
            .get(name, &GetParams::default())
            .map_err(kube::Error::BuildRequest)?;

        match self.client.request::<K>(request).await {
            Ok(obj) => Ok(obj),
            Err(kube::Error::Api(e)) if e.code == 404 => Err(StoreError::not_found::<K>(name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_page<K: StoreObject>(
        &self,
        options: &ListOptions,
    ) -> Result<Page<K>, StoreError> {
        let mut params = ListParams::default();
        if !options.selector.selects_all() {
            params = params.labels_from(&options.selector);
        }
        let limit = match (&options.index, options.limit) {
            (Some(_), limit) => Some(limit.unwrap_or_default().max(INDEXED_PAGE_SIZE)),
            (None, limit) => limit.filter(|l| *l > 0),
        };
        if let Some(limit) = limit {
            params = params.limit(limit);
        }
        if let Some(token) = &options.continue_token {
            params = params.continue_token(token);
        }

        let request = Request::new(K::url_path(&(), options.namespace.as_deref()))
            .list(&params)
            .map_err(kube::Error::BuildRequest)?;
        let list = self.client.request::<ObjectList<K>>(request).await?;

        let fetched = list.items.len();
        let items: Vec<K> = list
            .items
            .into_iter()
            .filter(|item| options.matches_index(item))
            .collect();
        debug!(
            kind = %K::kind(&()),
            namespace = ?options.namespace,
            fetched,
            matched = items.len(),
            "Listed page"
        );

        Ok(Page {
            items,
            continue_token: list.metadata.continue_.filter(|t| !t.is_empty()),
        })
    }
}
