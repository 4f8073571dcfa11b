//! Code generation backend primitives.
//!
//! The codegen target never talks to a provider. It materializes stable
//! symbolic references for resources so a generated infrastructure-as-code
//! document can wire resources together before any of them exist.
//!
//! # Invariants
//!
//! - References are deterministic: the same resource kind and name always
//!   produce the same expression.
//! - Rendering has no side effect beyond recording the reference.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// A symbolic expression referring to a generated resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Literal {
    expression: String,
}

impl Literal {
    /// Reference to a resource's own identifier.
    pub fn self_link(kind: &str, name: &str) -> Self {
        Self::property(kind, name, "id")
    }

    /// Reference to a named property of a resource.
    pub fn property(kind: &str, name: &str, property: &str) -> Self {
        Self {
            expression: format!("${{{}.{}.{}}}", kind, sanitize_name(name), property),
        }
    }

    /// The rendered expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expression)
    }
}

impl Serialize for Literal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.expression)
    }
}

/// Restrict a user-assigned name to characters valid in a generated token.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Execution target that collects symbolic references for code generation.
#[derive(Debug, Default)]
pub struct CodegenTarget {
    references: BTreeMap<String, Literal>,
}

impl CodegenTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and return the self link for a resource.
    ///
    /// Keyed by kind and name; repeated renders of the same resource yield
    /// the identical reference.
    pub fn record_self_link(&mut self, kind: &str, name: &str) -> Literal {
        let literal = Literal::self_link(kind, name);
        self.references
            .insert(format!("{kind}.{name}"), literal.clone());
        literal
    }

    /// Recorded references in deterministic (sorted) order.
    pub fn references(&self) -> impl Iterator<Item = (&str, &Literal)> {
        self.references.iter().map(|(key, lit)| (key.as_str(), lit))
    }

    /// Render the reference map as a JSON document fragment.
    pub fn document(&self) -> serde_json::Value {
        serde_json::json!({ "references": self.references })
    }
}
