//! Admission error taxonomy.
//!
//! Policy violations use dedicated variants so callers and tests can match
//! on them regardless of the surrounding message. Checks that are not
//! short-circuited report through [`AdmissionError::Aggregate`], whose
//! members are kept sorted by message so the rendered text is stable.

use thiserror::Error;

use crate::compat::CompatError;
use crate::store::StoreError;

/// Why an admission request was rejected.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("template deletion is forbidden")]
    TemplateDeletionForbidden,

    #[error("cluster upgrade is forbidden")]
    ClusterUpgradeForbidden,

    #[error("management deletion is forbidden")]
    ManagementDeletionForbidden,

    #[error("AccessManagement deletion is forbidden")]
    AccessManagementDeletionForbidden,

    #[error("the template chain spec is invalid")]
    InvalidTemplateChainSpec,

    #[error("no Management object found")]
    ManagementNotFound,

    #[error("can not apply new access rules")]
    AccessRulesRejected,

    /// A failure wrapped with the check or object it came from.
    #[error("{context}: {source}")]
    Invalid {
        context: String,
        source: Box<AdmissionError>,
    },

    /// Several independent failures, sorted by message.
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Aggregate(Vec<AdmissionError>),

    #[error(transparent)]
    Compat(#[from] CompatError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The admission request itself is unusable.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Message(String),
}

impl AdmissionError {
    pub fn message(msg: impl Into<String>) -> Self {
        AdmissionError::Message(msg.into())
    }

    /// Wrap `source` as `"<context>: <source>"`.
    pub fn invalid(context: impl Into<String>, source: impl Into<AdmissionError>) -> Self {
        AdmissionError::Invalid {
            context: context.into(),
            source: Box::new(source.into()),
        }
    }

    /// Join independent failures. `None` when there are none; a single
    /// failure is returned as-is.
    pub fn aggregate<E>(errors: impl IntoIterator<Item = E>) -> Option<Self>
    where
        E: Into<AdmissionError>,
    {
        let mut errors: Vec<AdmissionError> = errors.into_iter().map(Into::into).collect();
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => {
                errors.sort_by_cached_key(|e| e.to_string());
                Some(AdmissionError::Aggregate(errors))
            }
        }
    }

    /// Whether the failure is, or wraps, a missing object.
    pub fn is_not_found(&self) -> bool {
        match self {
            AdmissionError::Store(e) => e.is_not_found(),
            AdmissionError::Invalid { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Short machine-readable reason, used as the admission status reason
    /// and as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::TemplateDeletionForbidden
            | AdmissionError::ManagementDeletionForbidden
            | AdmissionError::AccessManagementDeletionForbidden => "DeletionForbidden",
            AdmissionError::ClusterUpgradeForbidden => "UpgradeForbidden",
            AdmissionError::InvalidTemplateChainSpec => "InvalidTemplateChain",
            AdmissionError::ManagementNotFound => "ManagementNotFound",
            AdmissionError::AccessRulesRejected => "AccessRulesRejected",
            AdmissionError::Invalid { source, .. } => source.reason(),
            AdmissionError::Aggregate(_) | AdmissionError::Compat(_) => "ValidationFailed",
            AdmissionError::Store(e) if e.is_not_found() => "NotFound",
            AdmissionError::Store(_) => "StoreError",
            AdmissionError::BadRequest(_) => "BadRequest",
            AdmissionError::Message(_) => "Forbidden",
        }
    }
}

/// Negative outcome of an admission check: the error plus any warnings
/// gathered before it.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Denied {
    pub warnings: Vec<String>,
    #[source]
    pub error: AdmissionError,
}

impl Denied {
    pub fn new(error: impl Into<AdmissionError>) -> Self {
        Denied {
            warnings: Vec::new(),
            error: error.into(),
        }
    }

    pub fn with_warnings(warnings: Vec<String>, error: impl Into<AdmissionError>) -> Self {
        Denied {
            warnings,
            error: error.into(),
        }
    }

    /// Single-warning form, the common shape for deletion guards.
    pub fn warn(warning: impl Into<String>, error: impl Into<AdmissionError>) -> Self {
        Denied::with_warnings(vec![warning.into()], error)
    }
}

impl From<AdmissionError> for Denied {
    fn from(error: AdmissionError) -> Self {
        Denied::new(error)
    }
}

impl From<StoreError> for Denied {
    fn from(error: StoreError) -> Self {
        Denied::new(error)
    }
}

impl From<CompatError> for Denied {
    fn from(error: CompatError) -> Self {
        Denied::new(error)
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}
