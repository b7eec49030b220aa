//! Topic expressions.
//!
//! Every operation's topic is
//! `resolvedPrefix ++ scopeName ++ delimiter ++ operationName`, where a
//! non-empty prefix carries its own trailing delimiter:
//!
//! | prefix        | scope | op    | topic               |
//! |---------------|-------|-------|---------------------|
//! | `""`          | `Baz` | `Qux` | `Baz.Qux`           |
//! | `"env.prod"`  | `Foo` | `Bar` | `env.prod.Foo.Bar`  |
//! | `"user.{id}"` | `Foo` | `Bar` | `user.<id>.Foo.Bar` |
//!
//! Publisher and subscriber renderers read the same [`TopicExpr`], so both
//! sides of a scope always compute the same topic for the same values.

use std::fmt;

use scopegen_ir::{Operation, Prefix, PrefixError, PrefixSegment, Scope};
use thiserror::Error;

/// The prefix part of a topic, with its trailing delimiter already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPrefix {
    /// No prefix: the topic starts with the scope name.
    Empty,
    /// Fixed text, e.g. `env.prod.`.
    Literal(String),
    /// Text with caller-supplied values, e.g. `user.{id}.`.
    Template {
        segments: Vec<PrefixSegment>,
        variables: Vec<String>,
    },
}

impl TopicPrefix {
    pub fn resolve(prefix: &Prefix, delimiter: &str) -> Result<Self, PrefixError> {
        if prefix.variables.is_empty() {
            if prefix.string.is_empty() {
                return Ok(TopicPrefix::Empty);
            }
            return Ok(TopicPrefix::Literal(format!("{}{}", prefix.string, delimiter)));
        }
        prefix.check()?;
        let mut segments = prefix.segments()?;
        segments.push(PrefixSegment::Literal(delimiter.to_string()));
        Ok(TopicPrefix::Template {
            segments,
            variables: prefix.variables.clone(),
        })
    }

    pub fn variables(&self) -> &[String] {
        match self {
            TopicPrefix::Template { variables, .. } => variables,
            _ => &[],
        }
    }
}

/// A piece of a topic: fixed text or a caller-supplied value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPart {
    Text(String),
    Var(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("topic {topic} takes {expected} value(s), got {found}")]
pub struct ArityError {
    pub topic: String,
    pub expected: usize,
    pub found: usize,
}

/// Topic of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicExpr {
    pub prefix: TopicPrefix,
    pub scope: String,
    pub operation: String,
    pub delimiter: String,
}

impl TopicExpr {
    pub fn new(scope: &Scope, op: &Operation, delimiter: &str) -> Result<Self, PrefixError> {
        Ok(Self {
            prefix: TopicPrefix::resolve(&scope.prefix, delimiter)?,
            scope: scope.name.clone(),
            operation: op.name.clone(),
            delimiter: delimiter.to_string(),
        })
    }

    /// Names of the values a caller supplies, in declared order.
    pub fn variables(&self) -> &[String] {
        self.prefix.variables()
    }

    /// The topic as a sequence of text and variables, adjacent text merged.
    pub fn parts(&self) -> Vec<TopicPart> {
        let mut parts = Vec::new();
        match &self.prefix {
            TopicPrefix::Empty => {}
            TopicPrefix::Literal(text) => parts.push(TopicPart::Text(text.clone())),
            TopicPrefix::Template { segments, .. } => {
                for seg in segments {
                    match seg {
                        PrefixSegment::Literal(text) => push_text(&mut parts, text),
                        PrefixSegment::Variable(name) => parts.push(TopicPart::Var(name.clone())),
                    }
                }
            }
        }
        push_text(
            &mut parts,
            &format!("{}{}{}", self.scope, self.delimiter, self.operation),
        );
        parts
    }

    /// The full topic when it has no variables.
    pub fn literal(&self) -> Option<String> {
        if !self.variables().is_empty() {
            return None;
        }
        Some(
            self.parts()
                .into_iter()
                .map(|p| match p {
                    TopicPart::Text(t) | TopicPart::Var(t) => t,
                })
                .collect(),
        )
    }

    /// Render as a format string: text goes through `escape`, every
    /// variable becomes `placeholder`.
    pub fn template(&self, placeholder: &str, escape: impl Fn(&str) -> String) -> String {
        self.parts()
            .iter()
            .map(|p| match p {
                TopicPart::Text(t) => escape(t),
                TopicPart::Var(_) => placeholder.to_string(),
            })
            .collect()
    }

    /// Compute the topic for `values`, given in declared variable order.
    pub fn evaluate(&self, values: &[&str]) -> Result<String, ArityError> {
        let expected = self.variables().len();
        if values.len() != expected {
            return Err(ArityError {
                topic: self.to_string(),
                expected,
                found: values.len(),
            });
        }
        let mut values = values.iter();
        let mut out = String::new();
        for part in self.parts() {
            match part {
                TopicPart::Text(t) => out.push_str(&t),
                TopicPart::Var(_) => {
                    if let Some(v) = values.next() {
                        out.push_str(v);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn push_text(parts: &mut Vec<TopicPart>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(TopicPart::Text(last)) = parts.last_mut() {
        last.push_str(text);
    } else {
        parts.push(TopicPart::Text(text.to_string()));
    }
}

impl fmt::Display for TopicExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in self.parts() {
            match part {
                TopicPart::Text(t) => f.write_str(&t)?,
                TopicPart::Var(name) => write!(f, "{{{}}}", name)?,
            }
        }
        Ok(())
    }
}
