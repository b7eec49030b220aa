//! Prefix IR - topic-prefix templates.
//!
//! A prefix is either a literal (`"env.prod"`, possibly empty) or a template
//! with named placeholders (`"user.{id}"`) whose values are supplied by the
//! caller of every generated publish/subscribe method.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors found while reading a prefix template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("unterminated placeholder starting at byte {0}")]
    UnterminatedPlaceholder(usize),

    #[error("empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),

    #[error("variable '{0}' appears more than once")]
    DuplicateVariable(String),

    #[error("placeholder '{0}' is not a declared variable")]
    UndeclaredVariable(String),

    #[error("declared variable '{0}' is not referenced by the template")]
    UnusedVariable(String),

    #[error("variables out of order: declared {declared:?}, template uses {found:?}")]
    OrderMismatch {
        declared: Vec<String>,
        found: Vec<String>,
    },
}

/// One piece of a prefix template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixSegment {
    /// Text copied into the topic verbatim.
    Literal(String),
    /// A caller-supplied value.
    Variable(String),
}

/// Topic prefix of a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefix {
    /// Template text. Placeholders are written `{name}`.
    #[serde(default)]
    pub string: String,

    /// Variables referenced by the template, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

impl Prefix {
    /// A prefix without variables.
    pub fn literal(s: impl Into<String>) -> Self {
        Self {
            string: s.into(),
            variables: Vec::new(),
        }
    }

    /// Build a prefix from template text, declaring every placeholder found
    /// as a variable in order of appearance.
    pub fn parse(s: impl Into<String>) -> Result<Self, PrefixError> {
        let string = s.into();
        let variables = split_segments(&string)?
            .into_iter()
            .filter_map(|seg| match seg {
                PrefixSegment::Variable(name) => Some(name),
                PrefixSegment::Literal(_) => None,
            })
            .collect();
        Ok(Self { string, variables })
    }

    /// True when the prefix contributes nothing to the topic.
    pub fn is_empty(&self) -> bool {
        self.string.is_empty() && self.variables.is_empty()
    }

    /// True when callers have to supply values.
    pub fn has_variables(&self) -> bool {
        !self.variables.is_empty()
    }

    /// Split the template into literal and variable segments.
    pub fn segments(&self) -> Result<Vec<PrefixSegment>, PrefixError> {
        split_segments(&self.string)
    }

    /// Check that the template references exactly the declared variables,
    /// in declared order, without duplicates.
    pub fn check(&self) -> Result<(), PrefixError> {
        let found: Vec<String> = self
            .segments()?
            .into_iter()
            .filter_map(|seg| match seg {
                PrefixSegment::Variable(name) => Some(name),
                PrefixSegment::Literal(_) => None,
            })
            .collect();

        for (i, name) in self.variables.iter().enumerate() {
            if self.variables[..i].contains(name) {
                return Err(PrefixError::DuplicateVariable(name.clone()));
            }
        }
        for (i, name) in found.iter().enumerate() {
            if found[..i].contains(name) {
                return Err(PrefixError::DuplicateVariable(name.clone()));
            }
            if !self.variables.contains(name) {
                return Err(PrefixError::UndeclaredVariable(name.clone()));
            }
        }
        for name in &self.variables {
            if !found.contains(name) {
                return Err(PrefixError::UnusedVariable(name.clone()));
            }
        }
        if found != self.variables {
            return Err(PrefixError::OrderMismatch {
                declared: self.variables.clone(),
                found,
            });
        }
        Ok(())
    }

    /// Rewrite every `{var}` placeholder into `placeholder`
    /// (e.g. `%s` for printf-style targets).
    ///
    /// Literal text is not escaped; renderers that need escaping work on
    /// [`Prefix::segments`] instead.
    pub fn template(&self, placeholder: &str) -> Result<String, PrefixError> {
        let mut out = String::with_capacity(self.string.len());
        for seg in self.segments()? {
            match seg {
                PrefixSegment::Literal(text) => out.push_str(&text),
                PrefixSegment::Variable(_) => out.push_str(placeholder),
            }
        }
        Ok(out)
    }
}

fn split_segments(s: &str) -> Result<Vec<PrefixSegment>, PrefixError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = s.char_indices();

    while let Some((pos, ch)) = chars.next() {
        if ch != '{' {
            literal.push(ch);
            continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for (_, c) in chars.by_ref() {
            match c {
                '}' => {
                    closed = true;
                    break;
                }
                '{' => return Err(PrefixError::UnterminatedPlaceholder(pos)),
                _ => name.push(c),
            }
        }
        if !closed {
            return Err(PrefixError::UnterminatedPlaceholder(pos));
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(PrefixError::EmptyPlaceholder(pos));
        }

        if !literal.is_empty() {
            segments.push(PrefixSegment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(PrefixSegment::Variable(name));
    }

    if !literal.is_empty() {
        segments.push(PrefixSegment::Literal(literal));
    }
    Ok(segments)
}
