//! Errors surfaced by the cloud capability layer.

use thiserror::Error;

/// Errors from provider calls and provider-side lookups.
#[derive(Debug, Error)]
pub enum CloudError {
    /// A provider call failed. Carries the operation name for context.
    #[error("{op} failed: {message}")]
    Api { op: &'static str, message: String },

    /// Instance class is not in the machine type table.
    #[error("unknown instance type: {0}")]
    UnknownInstanceType(String),
}

impl CloudError {
    /// Wrap a provider failure with the operation that produced it.
    pub fn api(op: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            op,
            message: message.into(),
        }
    }
}
