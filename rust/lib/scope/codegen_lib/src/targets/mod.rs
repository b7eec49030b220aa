pub mod go;
pub mod java;
pub mod rust;

use crate::generator::{Codegen, GenerateError};

pub use go::GoGenerator;
pub use java::JavaGenerator;
pub use rust::RustGenerator;

/// Target names accepted by [`by_name`].
pub const LANGUAGES: [&str; 3] = ["java", "go", "rust"];

pub fn by_name(name: &str) -> Result<Box<dyn Codegen>, GenerateError> {
    match name {
        "java" => Ok(Box::new(JavaGenerator)),
        "go" => Ok(Box::new(GoGenerator)),
        "rust" => Ok(Box::new(RustGenerator)),
        other => Err(GenerateError::UnknownLanguage(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_language() {
        for name in LANGUAGES {
            assert_eq!(by_name(name).unwrap().language(), name);
        }
    }

    #[test]
    fn unknown_language() {
        assert!(matches!(by_name("cobol"), Err(GenerateError::UnknownLanguage(l)) if l == "cobol"));
    }
}
