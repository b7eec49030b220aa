//! Program IR - the compiled IDL unit.
//!
//! Produced by the parser, serialized to `program.json`, and consumed
//! read-only by generation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::prefix::Prefix;

/// Complete compiled IDL unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// IDL unit name (e.g. `events`). Used when a target needs a package
    /// name and no namespace is configured.
    #[serde(default)]
    pub name: String,

    /// Target language id → namespace/package (e.g. `java` → `com.acme.events`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespaces: BTreeMap<String, String>,

    /// All scopes, in declaration order.
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

impl Program {
    /// Find a scope by name.
    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.name == name)
    }

    /// Namespace configured for a target language, if any.
    pub fn namespace(&self, language: &str) -> Option<&str> {
        self.namespaces
            .get(language)
            .map(String::as_str)
            .filter(|ns| !ns.is_empty())
    }
}

/// A named publish/subscribe namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Scope name (e.g. `Foo`). Becomes part of every topic.
    pub name: String,

    /// Topic prefix shared by all operations.
    #[serde(default)]
    pub prefix: Prefix,

    /// Operations in declaration order. Order only affects generation order.
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Scope {
    pub fn new(name: impl Into<String>, prefix: Prefix) -> Self {
        Self {
            name: name.into(),
            prefix,
            operations: Vec::new(),
        }
    }

    /// Builder-style helper for tests and hand-built programs.
    pub fn with_operation(mut self, name: impl Into<String>, param: impl Into<String>) -> Self {
        self.operations.push(Operation {
            name: name.into(),
            param: param.into(),
        });
        self
    }

    /// Find an operation by name.
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name == name)
    }
}

/// One publishable/subscribable message within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name (e.g. `Bar`). Sent as the frame's message name.
    pub name: String,

    /// Message type transmitted (e.g. `BarEvent`).
    pub param: String,
}

/// True if `s` is a non-empty ASCII identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
