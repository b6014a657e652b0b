//! template-operator library crate
//!
//! Admission webhooks for a cluster-provisioning platform: CRD definitions,
//! the object store seam, provider and version compatibility checks,
//! template distribution tracking and the per-kind admission policies.

pub mod compat;
pub mod config;
pub mod crd;
pub mod health;
pub mod store;
pub mod templates;
pub mod webhooks;

pub use config::OperatorConfig;
pub use health::HealthState;
pub use store::{KubeStore, MemoryStore, Store};
pub use webhooks::{AdmissionError, Denied, WebhookError, WebhookState, run_webhook_server};
