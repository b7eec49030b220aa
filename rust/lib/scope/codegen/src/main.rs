//! `scopegen` - generate scope publishers and subscribers.
//!
//! Usage:
//!   scopegen -i program.json --gen java,go [--out <dir>] [-c scopegen.toml]
//!
//! Each target writes under `<out>/<target dir>` (`gen-java`, `gen-go`,
//! `gen-rust`), or under the target dir in the working directory when
//! `--out` is absent.

mod config;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use scopegen_codegen_lib::{targets, Generator, GeneratorOptions};
use scopegen_ir::Program;
use tracing::info;

use config::{GeneratorConfig, DEFAULT_CONFIG};

#[derive(Parser, Debug)]
#[command(name = "scopegen", about = "Generate scope publishers and subscribers")]
struct Args {
    /// Program JSON produced by the IDL parser.
    #[arg(short, long)]
    input: PathBuf,

    /// Output root (default: each target's own directory).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Target languages (java, go, rust). Repeatable or comma-separated.
    #[arg(short, long = "gen", value_delimiter = ',')]
    targets: Vec<String>,

    /// Config file (default: ./scopegen.toml if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Topic delimiter.
    #[arg(long)]
    delimiter: Option<String>,

    /// Version stamped into generated headers.
    #[arg(long = "version-stamp")]
    version_stamp: Option<String>,
}

/// Everything a run needs after flags and config are merged.
#[derive(Debug)]
struct Plan {
    options: GeneratorOptions,
    targets: Vec<String>,
    out: Option<PathBuf>,
}

impl Args {
    /// Merge config file values under the command-line flags.
    fn resolve(self, config: GeneratorConfig) -> Result<Plan> {
        let mut options = config.apply(GeneratorOptions::default());
        if let Some(delimiter) = self.delimiter {
            options.delimiter = delimiter;
        }
        if let Some(version) = self.version_stamp {
            options.version = version;
        }
        options.check()?;

        let requested = if self.targets.is_empty() {
            config.targets
        } else {
            self.targets
        };
        // First occurrence wins; order is kept.
        let mut seen = HashSet::new();
        let selected: Vec<String> = requested
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if selected.is_empty() {
            bail!(
                "no targets given; pass --gen with one of: {}",
                targets::LANGUAGES.join(", ")
            );
        }

        Ok(Plan {
            options,
            targets: selected,
            out: self.out.or(config.out),
        })
    }
}

fn load_program(path: &Path) -> Result<Program> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Generate every target into memory first, so a bad target name or an
/// invalid program leaves the output tree untouched.
fn run(program: &Program, plan: &Plan) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::with_capacity(plan.targets.len());
    for name in &plan.targets {
        let backend = targets::by_name(name)?;
        let generator = Generator::new(backend, plan.options.clone());
        let code = generator
            .generate(program)
            .with_context(|| format!("generating {}", name))?;
        outputs.push((generator, code));
    }

    let mut written = Vec::new();
    for (generator, code) in outputs {
        let backend = generator.backend();
        let root = match &plan.out {
            Some(out) => out.join(backend.default_output_dir()),
            None => PathBuf::from(backend.default_output_dir()),
        };
        backend.generate_dependencies(program, &root)?;
        written.extend(
            code.write_to(&root)
                .with_context(|| format!("writing {} output", code.language))?,
        );
    }
    Ok(written)
}

fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let (config_path, explicit) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let config = GeneratorConfig::load(&config_path, explicit)?;

    info!("Reading program from {}", args.input.display());
    let program = load_program(&args.input)?;

    let plan = args.resolve(config)?;
    let written = run(&program, &plan)?;
    info!(
        "Generated {} files for {} scopes ({})",
        written.len(),
        program.scopes.len(),
        plan.targets.join(", ")
    );
    Ok(())
}
