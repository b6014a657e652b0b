//! Admission webhooks.
//!
//! - [`admission`]: validator/defaulter contracts and request context
//! - [`error`]: error taxonomy shared by every check
//! - [`guard`]: deletion safety checks
//! - [`policies`]: one validator per resource kind
//! - [`server`]: axum routes and the TLS listener

pub mod admission;
pub mod error;
pub mod guard;
pub mod policies;
mod server;

pub use admission::{AdmissionResult, Defaulter, ValidationContext, Validator, Warnings};
pub use error::{AdmissionError, Denied, WebhookError};
pub use policies::{Policies, PolicyFor};
pub use server::{
    ReviewParams, WebhookState, create_webhook_router, default_patch, evaluate, parse_timeout,
    respond, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
