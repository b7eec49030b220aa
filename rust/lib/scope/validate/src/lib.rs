//! Scope IDL Validator
//!
//! Consistency checks run before any code is generated:
//! - Scope and operation names must be identifiers
//! - Scope names are unique within a program
//! - Operation names are unique within a scope
//! - Every operation names a message type
//! - Prefix templates reference exactly their declared variables, in order

use scopegen_ir::*;

/// Names used by generated method bodies; a prefix variable with one of
/// these names would shadow them.
const RESERVED_VARIABLES: &[&str] = &[
    "req", "handler", "op", "prefix", "topic", "self", "p", "s", "err", "msg", "sub", "client",
    "transport", "protocol", "provider", "received", "iprot", "fmt", "log",
];

/// A validation error with a descriptive message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    /// Which layer produced the error (program, scope, prefix, operation).
    pub layer: String,
    /// Which scope/operation the error is about.
    pub context: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.layer, self.context, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate an entire program.
/// Returns all errors found (does not stop at first error).
pub fn validate_program(program: &Program) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // 1. Scope names: identifiers, unique.
    for (i, scope) in program.scopes.iter().enumerate() {
        if !is_identifier(&scope.name) {
            errors.push(ValidationError {
                message: format!("scope name '{}' is not a valid identifier", scope.name),
                layer: "scope".into(),
                context: scope.name.clone(),
            });
        }
        if program.scopes[..i].iter().any(|s| s.name == scope.name) {
            errors.push(ValidationError {
                message: format!("scope '{}' is declared more than once", scope.name),
                layer: "program".into(),
                context: program.name.clone(),
            });
        }
    }

    // 2. Each scope on its own.
    for scope in &program.scopes {
        errors.extend(validate_scope(scope));
    }

    errors
}

/// Validate one scope: prefix template and operations.
pub fn validate_scope(scope: &Scope) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = scope.prefix.check() {
        errors.push(ValidationError {
            message: e.to_string(),
            layer: "prefix".into(),
            context: scope.name.clone(),
        });
    }
    for var in &scope.prefix.variables {
        if !is_identifier(var) {
            errors.push(ValidationError {
                message: format!("prefix variable '{}' is not a valid identifier", var),
                layer: "prefix".into(),
                context: scope.name.clone(),
            });
        }
        if RESERVED_VARIABLES.contains(&var.as_str()) {
            errors.push(ValidationError {
                message: format!("prefix variable '{}' collides with a generated local", var),
                layer: "prefix".into(),
                context: scope.name.clone(),
            });
        }
    }

    for (i, op) in scope.operations.iter().enumerate() {
        let ctx = format!("{}::{}", scope.name, op.name);
        if !is_identifier(&op.name) {
            errors.push(ValidationError {
                message: format!("operation name '{}' is not a valid identifier", op.name),
                layer: "operation".into(),
                context: ctx.clone(),
            });
        }
        if scope.operations[..i].iter().any(|o| o.name == op.name) {
            errors.push(ValidationError {
                message: format!("operation '{}' is declared more than once", op.name),
                layer: "operation".into(),
                context: ctx.clone(),
            });
        }
        if op.param.trim().is_empty() {
            errors.push(ValidationError {
                message: "operation has no message type".into(),
                layer: "operation".into(),
                context: ctx,
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_program() -> Program {
        Program {
            name: "events".into(),
            namespaces: Default::default(),
            scopes: vec![
                Scope::new("Foo", Prefix::parse("user.{id}").unwrap())
                    .with_operation("Bar", "BarEvent"),
                Scope::new("Baz", Prefix::literal("")).with_operation("Qux", "QuxEvent"),
            ],
        }
    }

    #[test]
    fn valid_program_has_no_errors() {
        assert!(validate_program(&minimal_program()).is_empty());
    }

    #[test]
    fn duplicate_scope_names() {
        let mut p = minimal_program();
        p.scopes.push(Scope::new("Foo", Prefix::default()));
        let errors = validate_program(&p);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].layer, "program");
        assert!(errors[0].message.contains("'Foo'"));
    }

    #[test]
    fn duplicate_operation_names() {
        let scope = Scope::new("Foo", Prefix::default())
            .with_operation("Bar", "BarEvent")
            .with_operation("Bar", "OtherEvent");
        let errors = validate_scope(&scope);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context, "Foo::Bar");
    }

    #[test]
    fn collects_all_errors() {
        let p = Program {
            name: "bad".into(),
            namespaces: Default::default(),
            scopes: vec![Scope {
                name: "".into(),
                prefix: Prefix {
                    string: "{a}".into(),
                    variables: vec!["b".into()],
                },
                operations: vec![Operation {
                    name: "9op".into(),
                    param: " ".into(),
                }],
            }],
        };
        let errors = validate_program(&p);
        let layers: Vec<&str> = errors.iter().map(|e| e.layer.as_str()).collect();
        assert_eq!(layers, vec!["scope", "prefix", "operation", "operation"]);
    }

    #[test]
    fn reserved_prefix_variable() {
        let scope = Scope::new("Foo", Prefix::parse("{req}").unwrap()).with_operation("Bar", "B");
        let errors = validate_scope(&scope);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'req'"));
    }

    #[test]
    fn display_format() {
        let e = ValidationError {
            message: "boom".into(),
            layer: "scope".into(),
            context: "Foo".into(),
        };
        assert_eq!(e.to_string(), "[scope:Foo] boom");
    }
}
