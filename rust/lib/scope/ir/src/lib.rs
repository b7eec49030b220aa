//! Scope IDL Intermediate Representation (IR)
//!
//! Data structures handed over by the IDL parser and consumed read-only by:
//! - validator (consistency checks before generation)
//! - codegen library (scope plans + per-language renderers)
//! - codegen binary (loads `program.json`)
//!
//! Three layers:
//! 1. Program   - the compiled IDL unit (namespaces + scopes)
//! 2. Scope     - a pub/sub namespace with its operations
//! 3. Prefix    - the topic-prefix template of a scope

pub mod prefix;
pub mod program;

pub use prefix::*;
pub use program::*;

/// Separator placed between topic segments.
///
/// Every backend and the runtime library must agree on this value.
pub const DEFAULT_TOPIC_DELIMITER: &str = ".";
