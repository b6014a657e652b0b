//! In-process store.
//!
//! Holds typed objects keyed by kind, namespace and name. Lists are
//! returned in (namespace, name) order and paginated with real continuation
//! tokens, so callers exercise the same paging path as against the API
//! server.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kube::ResourceExt;

use super::{ListOptions, Page, SelectorExt, Store, StoreError, StoreObject};

type ObjectKey = (TypeId, String, String);

/// Store holding objects in memory.
#[derive(Default)]
pub struct MemoryStore {
    objects: BTreeMap<ObjectKey, Arc<dyn Any + Send + Sync>>,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object.
    pub fn insert<K: StoreObject>(&mut self, obj: K) {
        let key = (
            TypeId::of::<K>(),
            obj.namespace().unwrap_or_default(),
            obj.name_any(),
        );
        self.objects.insert(key, Arc::new(obj));
    }

    /// Builder form of [`MemoryStore::insert`].
    pub fn with<K: StoreObject>(mut self, obj: K) -> Self {
        self.insert(obj);
        self
    }

    /// Remove an object, returning whether it existed.
    pub fn remove<K: StoreObject>(&mut self, namespace: Option<&str>, name: &str) -> bool {
        let key = (
            TypeId::of::<K>(),
            namespace.unwrap_or_default().to_string(),
            name.to_string(),
        );
        self.objects.remove(&key).is_some()
    }

    /// Number of list pages served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn matching<K: StoreObject>(&self, options: &ListOptions) -> Vec<K> {
        let type_id = TypeId::of::<K>();
        self.objects
            .iter()
            .filter(|((t, ns, _), _)| {
                *t == type_id
                    && options
                        .namespace
                        .as_deref()
                        .is_none_or(|wanted| wanted == ns)
            })
            .filter_map(|(_, obj)| obj.downcast_ref::<K>())
            .filter(|obj| options.selector.matches(obj.labels()))
            .filter(|obj| options.matches_index(*obj))
            .cloned()
            .collect()
    }
}

impl Store for MemoryStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let key = (
            TypeId::of::<K>(),
            namespace.unwrap_or_default().to_string(),
            name.to_string(),
        );
        self.objects
            .get(&key)
            .and_then(|obj| obj.downcast_ref::<K>())
            .cloned()
            .ok_or_else(|| StoreError::not_found::<K>(name))
    }

    async fn list_page<K: StoreObject>(
        &self,
        options: &ListOptions,
    ) -> Result<Page<K>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let offset = match &options.continue_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidContinueToken(token.clone()))?,
            None => 0,
        };
        let matching = self.matching::<K>(options);
        let total = matching.len();
        // Zero means unbounded, as on the API server
        let limit = options
            .limit
            .filter(|l| *l > 0)
            .map_or(total, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let end = offset.saturating_add(limit).min(total);

        let items = matching
            .into_iter()
            .skip(offset)
            .take(end.saturating_sub(offset))
            .collect::<Vec<_>>();

        Ok(Page {
            items,
            continue_token: (end < total).then(|| end.to_string()),
        })
    }
}
