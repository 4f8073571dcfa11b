//! Execution targets.
//!
//! The backend set is closed: a pass renders against the live provider API
//! or against the code generation collector, never both.

use stratus_cloud::ApiTarget;
use stratus_codegen::CodegenTarget;

/// Execution target for a convergence pass.
pub enum Target {
    /// Live provisioning through provider calls.
    Api(ApiTarget),

    /// Declarative code generation; no provider calls.
    Codegen(CodegenTarget),
}

impl Target {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api(_) => "api",
            Self::Codegen(_) => "codegen",
        }
    }
}
