//! The driver-facing convergence contract.

use std::sync::Arc;

use async_trait::async_trait;
use stratus_cloud::{CloudApi, CloudConfig};

use crate::error::TaskResult;
use crate::target::Target;

/// Shared context for one convergence pass.
///
/// Owned by the pass; nothing here is shared between concurrently
/// converging resources.
#[derive(Clone)]
pub struct Context {
    /// Provider capability handle.
    pub cloud: Arc<dyn CloudApi>,

    /// Cloud layer configuration (region, common tags).
    pub config: CloudConfig,
}

impl Context {
    pub fn new(cloud: Arc<dyn CloudApi>, config: CloudConfig) -> Self {
        Self { cloud, config }
    }
}

/// Degraded-but-not-fatal discovery outcomes.
///
/// Surfaced as values so callers and tests can observe them; discovery also
/// logs each one at `warn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindWarning {
    /// Image alias resolution failed; drift is reported as real.
    ImageResolution { image: String, reason: String },

    /// Privilege-binding reference had an unexpected format.
    UnexpectedProfileArn { arn: String },
}

impl std::fmt::Display for FindWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageResolution { image, reason } => {
                write!(f, "unable to resolve image {image}: {reason}")
            }
            Self::UnexpectedProfileArn { arn } => {
                write!(f, "unexpected instance profile ARN: {arn}")
            }
        }
    }
}

/// Result of a discovery query.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOutcome<T> {
    /// The unique live match, or `None` when the resource is absent.
    pub actual: Option<T>,

    /// Warnings accumulated while normalizing the match.
    pub warnings: Vec<FindWarning>,
}

impl<T> FindOutcome<T> {
    /// Outcome for a resource with no live match.
    pub fn absent() -> Self {
        Self {
            actual: None,
            warnings: Vec::new(),
        }
    }
}

/// Id-based correlation for the external driver.
pub trait CompareWithId {
    /// Provider identity, if assigned.
    fn compare_with_id(&self) -> Option<&str>;
}

/// The single-resource convergence contract.
///
/// The driver invokes the triad once per resource per pass: `find` to
/// obtain actual state, `check_changes` with the externally computed delta,
/// then `render` against exactly one execution target.
#[async_trait]
pub trait Task: Sized {
    /// Discover the unique live resource matching this descriptor's stable
    /// name.
    ///
    /// Discovery writes resolved identity back into the desired descriptor,
    /// which is why it takes `&mut self`.
    async fn find(&mut self, ctx: &Context) -> TaskResult<FindOutcome<Self>>;

    /// Validate a proposed transition before any backend runs.
    fn check_changes(actual: Option<&Self>, desired: &Self, changes: &Self) -> TaskResult<()>;

    /// Realize the transition through the given execution target.
    async fn render(
        &mut self,
        target: &mut Target,
        actual: Option<&Self>,
        changes: &Self,
    ) -> TaskResult<()>;
}
