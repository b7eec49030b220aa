//! Codegen Library - scope publisher/subscriber generation
//!
//! A validated [`Program`](scopegen_ir::Program) is planned once per scope
//! ([`plan::ScopePlan`]) and rendered by a per-language [`Codegen`] backend
//! into one publisher and one subscriber file per scope.

pub mod generator;
pub mod naming;
pub mod plan;
pub mod targets;
pub mod topic;

pub use generator::{
    Codegen, FileType, GenerateError, GeneratedCode, GeneratedFile, Generator, GeneratorOptions,
    Layout, Provenance,
};
pub use plan::{FrameKind, FrameOp, OperationPlan, ScopePlan};
pub use topic::{TopicExpr, TopicPrefix};

// Re-export IR types
pub use scopegen_ir as ir;
