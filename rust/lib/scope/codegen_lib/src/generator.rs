//! Generator façade: one [`Codegen`] backend per target language, driven by
//! [`Generator`] over every scope of a program.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use scopegen_ir::{PrefixError, Program, DEFAULT_TOPIC_DELIMITER};
use scopegen_validate::{validate_program, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::plan::ScopePlan;

pub const TOOL_NAME: &str = "Scopegen Compiler";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("{language} generator does not support {file_type} files")]
    UnsupportedFileType { language: String, file_type: FileType },

    #[error("unknown target language '{0}'")]
    UnknownLanguage(String),

    #[error("invalid program: {}", join_errors(.0))]
    InvalidProgram(Vec<ValidationError>),

    #[error("invalid topic delimiter {0:?}: must be non-empty and contain no whitespace")]
    InvalidDelimiter(String),

    #[error("{language}: scopes '{first}' and '{second}' both generate '{name}'")]
    NameCollision {
        language: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("scope {scope}: {source}")]
    Prefix {
        scope: String,
        #[source]
        source: PrefixError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Which artifact of a scope is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Publish,
    Subscribe,
    /// Publisher and subscriber in one file. No current target supports it.
    Combined,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::Publish => "publish",
            FileType::Subscribe => "subscribe",
            FileType::Combined => "combined",
        })
    }
}

/// How a scope's artifacts are laid out on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One publisher file and one subscriber file per scope.
    #[default]
    Split,
    /// Both in a single file ([`FileType::Combined`]).
    Combined,
}

/// Tool version and generation date stamped on every artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub version: String,
    pub date: NaiveDate,
}

impl Provenance {
    /// `Scopegen Compiler (0.1.0)`
    pub fn tool(&self) -> String {
        format!("{} ({})", TOOL_NAME, self.version)
    }

    pub fn banner(&self) -> String {
        format!("Autogenerated by {}", self.tool())
    }

    /// `2024-03-05`
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// `2024-3-5`, as used in Java `@Generated` annotations.
    pub fn short_date(&self) -> String {
        self.date.format("%Y-%-m-%-d").to_string()
    }
}

pub const DO_NOT_EDIT: &str = "DO NOT EDIT UNLESS YOU ARE SURE THAT YOU KNOW WHAT YOU ARE DOING";

/// Codegen trait - implement this for each target language.
pub trait Codegen: Send + Sync {
    fn language(&self) -> &str;

    fn default_output_dir(&self) -> &str;

    /// Directory for a program's artifacts: `base` plus the language
    /// namespace split on `.`, or `base` itself without a namespace.
    fn output_dir(&self, base: &Path, program: &Program) -> PathBuf {
        let mut dir = base.to_path_buf();
        if let Some(ns) = program.namespace(self.language()) {
            for component in ns.split('.').filter(|c| !c.is_empty()) {
                dir.push(component);
            }
        }
        dir
    }

    fn file_name(&self, scope: &str, file_type: FileType) -> Result<String, GenerateError>;

    /// Words a prefix variable may not be named in this target: keywords,
    /// plus identifiers the generated method bodies rely on.
    fn reserved_identifiers(&self) -> &'static [&'static str] {
        &[]
    }

    /// Names a scope declares in the namespace it shares with the other
    /// scopes of the program (Go packages). Checked for collisions.
    fn shared_symbols(&self, _plan: &ScopePlan) -> Vec<String> {
        Vec::new()
    }

    fn render_header(&self, provenance: &Provenance) -> String;

    fn render_package(&self, _program: &Program, _plan: &ScopePlan) -> String {
        String::new()
    }

    fn render_imports(&self, plan: &ScopePlan, file_type: FileType) -> String;

    fn render_constants(&self, _plan: &ScopePlan) -> String {
        String::new()
    }

    fn render_publisher(&self, plan: &ScopePlan, provenance: &Provenance) -> String;

    fn render_subscriber(&self, plan: &ScopePlan, provenance: &Provenance) -> String;

    /// Support files a target needs next to the generated code. None of the
    /// current targets needs any.
    fn generate_dependencies(&self, _program: &Program, _dir: &Path) -> Result<(), GenerateError> {
        Ok(())
    }

    /// Assemble one artifact from the render hooks.
    fn render_file(
        &self,
        program: &Program,
        plan: &ScopePlan,
        file_type: FileType,
        provenance: &Provenance,
    ) -> Result<String, GenerateError> {
        let body = match file_type {
            FileType::Publish => self.render_publisher(plan, provenance),
            FileType::Subscribe => self.render_subscriber(plan, provenance),
            FileType::Combined => {
                return Err(GenerateError::UnsupportedFileType {
                    language: self.language().to_string(),
                    file_type,
                })
            }
        };
        let mut output = String::new();
        for section in [
            self.render_header(provenance),
            self.render_package(program, plan),
            self.render_imports(plan, file_type),
            self.render_constants(plan),
            body,
        ] {
            if section.is_empty() {
                continue;
            }
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&section);
        }
        Ok(output)
    }
}

pub struct GeneratedCode {
    pub language: String,
    pub files: Vec<GeneratedFile>,
}

pub struct GeneratedFile {
    /// Relative to the output root.
    pub path: PathBuf,
    pub content: String,
}

impl GeneratedCode {
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == path.as_ref())
    }

    /// Write every file under `root`, creating directories as needed.
    pub fn write_to(&self, root: &Path) -> Result<Vec<PathBuf>, GenerateError> {
        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = root.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| GenerateError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, &file.content).map_err(|source| GenerateError::Io {
                path: path.clone(),
                source,
            })?;
            info!(language = %self.language, path = %path.display(), "wrote file");
            written.push(path);
        }
        Ok(written)
    }
}

/// Generation settings shared by all targets.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub delimiter: String,
    pub version: String,
    pub date: NaiveDate,
    pub layout: Layout,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_TOPIC_DELIMITER.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            date: Local::now().date_naive(),
            layout: Layout::Split,
        }
    }
}

impl GeneratorOptions {
    /// Reject delimiters that would make topics ambiguous or unroutable.
    pub fn check(&self) -> Result<(), GenerateError> {
        if self.delimiter.is_empty() || self.delimiter.chars().any(char::is_whitespace) {
            return Err(GenerateError::InvalidDelimiter(self.delimiter.clone()));
        }
        Ok(())
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            version: self.version.clone(),
            date: self.date,
        }
    }
}

/// Drives one backend over a whole program.
pub struct Generator {
    backend: Box<dyn Codegen>,
    options: GeneratorOptions,
}

impl Generator {
    pub fn new(backend: Box<dyn Codegen>, options: GeneratorOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &dyn Codegen {
        self.backend.as_ref()
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Produce the publisher and subscriber file of every scope.
    ///
    /// Fails before producing anything if the combined layout is requested,
    /// the delimiter is unusable, the program does not validate (including
    /// prefix variables reserved by the backend), or two scopes would
    /// generate the same file or shared symbol.
    pub fn generate(&self, program: &Program) -> Result<GeneratedCode, GenerateError> {
        let language = self.backend.language().to_string();
        if self.options.layout == Layout::Combined {
            return Err(GenerateError::UnsupportedFileType {
                language,
                file_type: FileType::Combined,
            });
        }

        self.options.check()?;

        let mut errors = validate_program(program);
        errors.extend(self.reserved_variables(program));
        if !errors.is_empty() {
            return Err(GenerateError::InvalidProgram(errors));
        }

        let provenance = self.options.provenance();
        let dir = self.backend.output_dir(Path::new(""), program);
        let mut files = Vec::with_capacity(program.scopes.len() * 2);
        // Generated name -> scope that produced it.
        let mut owners: HashMap<String, &str> = HashMap::new();

        for scope in &program.scopes {
            let plan = ScopePlan::new(scope, &self.options.delimiter).map_err(|source| {
                GenerateError::Prefix {
                    scope: scope.name.clone(),
                    source,
                }
            })?;
            for symbol in self.backend.shared_symbols(&plan) {
                claim(&mut owners, &language, symbol, &scope.name)?;
            }
            for file_type in [FileType::Publish, FileType::Subscribe] {
                let name = self.backend.file_name(&scope.name, file_type)?;
                let path = dir.join(&name).display().to_string();
                claim(&mut owners, &language, path, &scope.name)?;
                let content = self.backend.render_file(program, &plan, file_type, &provenance)?;
                debug!(%language, scope = %scope.name, file = %name, "rendered");
                files.push(GeneratedFile {
                    path: dir.join(name),
                    content,
                });
            }
        }

        Ok(GeneratedCode { language, files })
    }

    /// Prefix variables that are reserved words of this backend.
    fn reserved_variables(&self, program: &Program) -> Vec<ValidationError> {
        let reserved = self.backend.reserved_identifiers();
        let mut errors = Vec::new();
        for scope in &program.scopes {
            for var in &scope.prefix.variables {
                if reserved.contains(&var.as_str()) {
                    errors.push(ValidationError {
                        message: format!(
                            "prefix variable '{}' is reserved in {}",
                            var,
                            self.backend.language()
                        ),
                        layer: "prefix".into(),
                        context: scope.name.clone(),
                    });
                }
            }
        }
        errors
    }
}

/// Record that `scope` generates `name`, failing if another scope already did.
fn claim<'p>(
    owners: &mut HashMap<String, &'p str>,
    language: &str,
    name: String,
    scope: &'p str,
) -> Result<(), GenerateError> {
    if let Some(first) = owners.get(&name) {
        return Err(GenerateError::NameCollision {
            language: language.to_string(),
            name,
            first: first.to_string(),
            second: scope.to_string(),
        });
    }
    owners.insert(name, scope);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_dates() {
        let p = Provenance {
            version: "1.2.3".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        };
        assert_eq!(p.banner(), "Autogenerated by Scopegen Compiler (1.2.3)");
        assert_eq!(p.iso_date(), "2024-03-05");
        assert_eq!(p.short_date(), "2024-3-5");
    }

    #[test]
    fn file_type_display() {
        assert_eq!(FileType::Combined.to_string(), "combined");
        assert_eq!(FileType::Publish.to_string(), "publish");
    }

    #[test]
    fn default_options() {
        let o = GeneratorOptions::default();
        assert_eq!(o.delimiter, ".");
        assert_eq!(o.layout, Layout::Split);
    }

    #[test]
    fn delimiter_must_be_routable() {
        let mut o = GeneratorOptions::default();
        assert!(o.check().is_ok());
        o.delimiter = String::new();
        assert!(matches!(o.check(), Err(GenerateError::InvalidDelimiter(_))));
        o.delimiter = ". ".into();
        assert!(matches!(o.check(), Err(GenerateError::InvalidDelimiter(_))));
    }

    #[test]
    fn claim_reports_both_scopes() {
        let mut owners = HashMap::new();
        claim(&mut owners, "go", "foo_bar_publisher.go".into(), "FooBar").unwrap();
        let err = claim(&mut owners, "go", "foo_bar_publisher.go".into(), "Foo_Bar").unwrap_err();
        assert_eq!(
            err.to_string(),
            "go: scopes 'FooBar' and 'Foo_Bar' both generate 'foo_bar_publisher.go'"
        );
    }
}
