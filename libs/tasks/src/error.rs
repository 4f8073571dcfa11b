//! Error taxonomy for convergence passes.
//!
//! Nothing here is retried internally; every fault propagates to the
//! external driver, which owns retry policy across passes.

use stratus_cloud::CloudError;
use thiserror::Error;

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors that can end a convergence pass.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A field required for the requested transition is not set.
    #[error("field is required: {0}")]
    RequiredField(&'static str),

    /// More than one live resource matched a stable name.
    ///
    /// This is a data-integrity fault, never silently resolved by picking
    /// one of the matches.
    #[error("found multiple instances with name {name}: {count} matches")]
    MultipleMatches { name: String, count: usize },

    /// The desired image reference matched nothing at creation time.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// Side-channel payload from the provider failed to decode.
    #[error("decoding user data for instance {instance_id}: {source}")]
    UserDataDecode {
        instance_id: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Startup payload exceeds the provider ceiling.
    #[error("user data is {size} bytes, exceeding the {limit} byte limit")]
    UserDataTooLarge { size: usize, limit: usize },

    /// The delta asks for a change an existing instance cannot absorb.
    #[error("cannot change {fields:?} on an existing instance; the resource must be replaced")]
    UnsupportedChange { fields: Vec<&'static str> },

    /// Provider call failure, with operation context.
    #[error(transparent)]
    Cloud(#[from] CloudError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_fault_reports_size_and_limit() {
        let err = TaskError::UserDataTooLarge {
            size: 20000,
            limit: 16384,
        };
        assert_eq!(
            err.to_string(),
            "user data is 20000 bytes, exceeding the 16384 byte limit"
        );
    }

    #[test]
    fn test_cloud_errors_convert() {
        let err: TaskError = CloudError::api("run_instances", "throttled").into();
        assert!(matches!(err, TaskError::Cloud(_)));
    }
}
