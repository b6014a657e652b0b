//! Release admission. Releases are only guarded on deletion.

use std::sync::Arc;

use crate::crd::Release;
use crate::store::Store;
use crate::webhooks::admission::{AdmissionResult, ValidationContext, Validator};
use crate::webhooks::guard::check_release_delete;

pub struct ReleaseValidator<S> {
    store: Arc<S>,
}

impl<S: Store> ReleaseValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: Store> Validator<Release> for ReleaseValidator<S> {
    async fn validate_delete(&self, _ctx: &ValidationContext, release: &Release) -> AdmissionResult {
        check_release_delete(self.store.as_ref(), release).await
    }
}
