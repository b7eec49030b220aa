//! Rust publisher/subscriber generator.
//!
//! Generated modules link against `scopegen-runtime` and expect the payload
//! types in their parent module (`use super::*`).

use crate::generator::{Codegen, FileType, GenerateError, Provenance, DO_NOT_EDIT};
use crate::naming::to_snake_case;
use crate::plan::{MethodSignature, OperationPlan, ParamKind, ScopePlan};

/// Keywords usable as raw identifiers (`r#type`).
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Path keywords have no raw form; `subscribe` is the runtime function the
/// generated subscribe methods call.
const RESERVED: &[&str] = &["crate", "self", "Self", "super", "subscribe"];

pub struct RustGenerator;

impl Codegen for RustGenerator {
    fn language(&self) -> &str {
        "rust"
    }

    fn default_output_dir(&self) -> &str {
        "gen-rust"
    }

    fn file_name(&self, scope: &str, file_type: FileType) -> Result<String, GenerateError> {
        match file_type {
            FileType::Publish => Ok(format!("{}_publisher.rs", to_snake_case(scope))),
            FileType::Subscribe => Ok(format!("{}_subscriber.rs", to_snake_case(scope))),
            FileType::Combined => Err(GenerateError::UnsupportedFileType {
                language: self.language().to_string(),
                file_type,
            }),
        }
    }

    fn reserved_identifiers(&self) -> &'static [&'static str] {
        RESERVED
    }

    fn render_header(&self, provenance: &Provenance) -> String {
        let mut output = String::new();
        output.push_str(&format!("// {}\n", provenance.banner()));
        output.push_str(&format!("// Generated on {}\n", provenance.iso_date()));
        output.push_str(&format!("// {}\n", DO_NOT_EDIT));
        output
    }

    fn render_imports(&self, _plan: &ScopePlan, file_type: FileType) -> String {
        let mut output = String::new();
        match file_type {
            FileType::Subscribe => {
                output.push_str("use scopegen_runtime::{subscribe, Provider, RuntimeError, Subscription};\n")
            }
            _ => output.push_str("use scopegen_runtime::{Provider, PublisherCore, RuntimeError};\n"),
        }
        output.push('\n');
        output.push_str("use super::*;\n");
        output
    }

    fn render_constants(&self, plan: &ScopePlan) -> String {
        let mut output = String::new();
        output.push_str("/// Topic delimiter these topics were generated with.\n");
        output.push_str(&format!("pub const DELIMITER: &str = {:?};\n", plan.delimiter));
        output
    }

    fn render_publisher(&self, plan: &ScopePlan, _provenance: &Provenance) -> String {
        let mut output = String::new();
        output.push_str(&format!("/// Publishes `{}` operations.\n", plan.scope));
        output.push_str("///\n");
        output.push_str("/// Safe to share between threads; publishes are serialized.\n");
        output.push_str(&format!("pub struct {} {{\n", plan.publisher));
        output.push_str("    core: PublisherCore,\n");
        output.push_str("}\n\n");

        output.push_str(&format!("impl {} {{\n", plan.publisher));
        output.push_str("    pub fn new(provider: &Provider) -> Result<Self, RuntimeError> {\n");
        output.push_str("        Ok(Self {\n");
        output.push_str("            core: PublisherCore::new(provider)?,\n");
        output.push_str("        })\n");
        output.push_str("    }\n");

        for method in &plan.methods {
            output.push('\n');
            output.push_str(&format!(
                "    /// Publishes `{}` on `{}`.\n",
                method.op, method.topic
            ));
            output.push_str(&format!(
                "    pub fn publish_{}(&self, {}) -> Result<(), RuntimeError> {{\n",
                to_snake_case(&method.op),
                params(&method.publish)
            ));
            output.push_str(&format!("        let topic = {};\n", topic_expr(method)));
            output.push_str(&format!(
                "        self.core.publish(&topic, {:?}, req)\n",
                method.op
            ));
            output.push_str("    }\n");
        }

        output.push('\n');
        output.push_str("    /// Last sequence number used.\n");
        output.push_str("    pub fn seq(&self) -> i32 {\n");
        output.push_str("        self.core.seq()\n");
        output.push_str("    }\n");
        output.push_str("}\n");
        output
    }

    fn render_subscriber(&self, plan: &ScopePlan, _provenance: &Provenance) -> String {
        let mut output = String::new();

        for method in &plan.methods {
            let handler = handler_trait(&method.op);
            let callback = format!("on_{}", to_snake_case(&method.op));
            let param = &method.handler.param;

            output.push_str(&format!("/// Handles `{}` messages.\n", method.op));
            output.push_str(&format!("pub trait {}: Send + 'static {{\n", handler));
            output.push_str(&format!("    fn {}(&mut self, req: {});\n", callback, param));
            output.push_str("}\n\n");

            output.push_str(&format!("impl<F> {} for F\n", handler));
            output.push_str("where\n");
            output.push_str(&format!("    F: FnMut({}) + Send + 'static,\n", param));
            output.push_str("{\n");
            output.push_str(&format!("    fn {}(&mut self, req: {}) {{\n", callback, param));
            output.push_str("        self(req)\n");
            output.push_str("    }\n");
            output.push_str("}\n\n");
        }

        output.push_str(&format!("/// Subscribes to `{}` operations.\n", plan.scope));
        output.push_str("#[derive(Clone)]\n");
        output.push_str(&format!("pub struct {} {{\n", plan.subscriber));
        output.push_str("    provider: Provider,\n");
        output.push_str("}\n\n");

        output.push_str(&format!("impl {} {{\n", plan.subscriber));
        output.push_str("    pub fn new(provider: Provider) -> Self {\n");
        output.push_str("        Self { provider }\n");
        output.push_str("    }\n");

        for method in &plan.methods {
            let handler = handler_trait(&method.op);
            output.push('\n');
            output.push_str(&format!(
                "    /// Delivers every `{}` published on `{}` to `handler` on a background thread.\n",
                method.op, method.topic
            ));
            output.push_str(&format!(
                "    pub fn subscribe_{}<H: {}>(&self, {}) -> Result<Subscription, RuntimeError> {{\n",
                to_snake_case(&method.op),
                handler,
                params(&method.subscribe)
            ));
            output.push_str(&format!("        let topic = {};\n", topic_expr(method)));
            output.push_str(&format!(
                "        subscribe(&self.provider, topic, {:?}, move |req: {}| handler.on_{}(req))\n",
                method.op,
                method.handler.param,
                to_snake_case(&method.op)
            ));
            output.push_str("    }\n");
        }

        output.push_str("}\n");
        output
    }
}

fn handler_trait(op: &str) -> String {
    format!("{}Handler", op)
}

fn ident(name: &str) -> String {
    if KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

fn params(sig: &MethodSignature) -> String {
    sig.params
        .iter()
        .map(|p| match &p.kind {
            ParamKind::Text => format!("{}: &str", ident(&p.name)),
            ParamKind::Message(ty) => format!("{}: &{}", p.name, ty),
            ParamKind::Handler(_) => format!("mut {}: H", p.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn topic_expr(method: &OperationPlan) -> String {
    match method.topic.literal() {
        Some(topic) => format!("String::from({:?})", topic),
        None => {
            let template = method
                .topic
                .template("{}", |s| s.replace('{', "{{").replace('}', "}}"));
            let args: Vec<String> = method.topic.variables().iter().map(|v| ident(v)).collect();
            format!("format!({:?}, {})", template, args.join(", "))
        }
    }
}
