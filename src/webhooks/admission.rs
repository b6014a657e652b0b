//! Admission contracts shared by every resource kind.
//!
//! A validator answers create, update and delete with either a list of
//! warnings (allowed) or a [`Denied`] carrying warnings and the error. A
//! defaulter mutates the incoming object in place; the server turns the
//! mutation into a JSON patch.

use std::future::Future;

use kube::Resource;
use kube::core::admission::{AdmissionRequest, Operation};

use super::error::{AdmissionError, Denied};

/// Advisory messages returned to the API caller.
pub type Warnings = Vec<String>;

/// Outcome of a validation: warnings on success, or the denial.
pub type AdmissionResult = Result<Warnings, Denied>;

/// Request attributes visible to policies.
#[derive(Clone, Debug)]
pub struct ValidationContext {
    pub operation: Operation,
    pub uid: String,
    pub dry_run: bool,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl ValidationContext {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            uid: String::new(),
            dry_run: false,
            namespace: None,
            name: None,
        }
    }

    pub fn from_request<K: Resource>(request: &AdmissionRequest<K>) -> Self {
        Self {
            operation: request.operation.clone(),
            uid: request.uid.clone(),
            dry_run: request.dry_run,
            namespace: request.namespace.clone(),
            name: Some(request.name.clone()).filter(|n| !n.is_empty()),
        }
    }

    pub fn is_create(&self) -> bool {
        self.operation == Operation::Create
    }

    /// Check if this is an UPDATE operation
    pub fn is_update(&self) -> bool {
        self.operation == Operation::Update
    }
}

/// Validating admission for objects of kind `K`.
///
/// Every hook defaults to allowing the operation without warnings.
pub trait Validator<K>: Send + Sync {
    fn validate_create(
        &self,
        _ctx: &ValidationContext,
        _obj: &K,
    ) -> impl Future<Output = AdmissionResult> + Send {
        async { Ok(Warnings::new()) }
    }

    fn validate_update(
        &self,
        _ctx: &ValidationContext,
        _old: &K,
        _new: &K,
    ) -> impl Future<Output = AdmissionResult> + Send {
        async { Ok(Warnings::new()) }
    }

    fn validate_delete(
        &self,
        _ctx: &ValidationContext,
        _obj: &K,
    ) -> impl Future<Output = AdmissionResult> + Send {
        async { Ok(Warnings::new()) }
    }
}

/// Mutating admission for objects of kind `K`.
pub trait Defaulter<K>: Send + Sync {
    fn apply_defaults(
        &self,
        ctx: &ValidationContext,
        obj: &mut K,
    ) -> impl Future<Output = Result<(), AdmissionError>> + Send;
}

/// Allow with no warnings.
pub fn allowed() -> AdmissionResult {
    Ok(Warnings::new())
}
