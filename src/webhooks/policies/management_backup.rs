//! ManagementBackup admission: backups may only be recorded while the
//! Management object has the backup feature enabled.

use std::sync::Arc;

use crate::crd::ManagementBackup;
use crate::store::Store;
use crate::webhooks::admission::{AdmissionResult, ValidationContext, Validator, allowed};
use crate::webhooks::error::{AdmissionError, Denied};
use crate::webhooks::guard::get_management;

pub struct ManagementBackupValidator<S> {
    store: Arc<S>,
}

impl<S: Store> ManagementBackupValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn ensure_backup_enabled(&self) -> AdmissionResult {
        let mgmt = get_management(self.store.as_ref()).await?;
        if !mgmt.backup_enabled() {
            return Err(Denied::warn(
                "Management backup feature is disabled",
                AdmissionError::message(
                    "management backup is disabled, create or update of ManagementBackup objects disabled",
                ),
            ));
        }
        allowed()
    }
}

impl<S: Store> Validator<ManagementBackup> for ManagementBackupValidator<S> {
    async fn validate_create(
        &self,
        _ctx: &ValidationContext,
        _obj: &ManagementBackup,
    ) -> AdmissionResult {
        self.ensure_backup_enabled().await
    }

    async fn validate_update(
        &self,
        _ctx: &ValidationContext,
        _old: &ManagementBackup,
        _new: &ManagementBackup,
    ) -> AdmissionResult {
        self.ensure_backup_enabled().await
    }
}
