//! Java publisher/subscriber generator.

use scopegen_ir::Program;

use crate::generator::{Codegen, FileType, GenerateError, Provenance, DO_NOT_EDIT};
use crate::naming::{escape_printf, escape_quoted, upper_first};
use crate::plan::{FrameKind, FrameOp, MethodSignature, OperationPlan, ParamKind, ScopePlan};

const RUNTIME_PACKAGE: &str = "io.scopegen.runtime";

/// Java keywords and literals, plus names the generated bodies use: locals,
/// fields, and classes referenced in expressions (a variable would obscure
/// them).
const RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "null", "package", "private", "protected", "public",
    "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this", "throw",
    "throws", "transient", "true", "try", "void", "volatile", "while", "var", "yield", "record",
    "_", "seqId", "e", "e1", "String", "Thread", "Runnable", "MessageKind", "FrameHeader",
    "Provider", "Subscription", "ApplicationException", "TransportException",
];

pub struct JavaGenerator;

impl Codegen for JavaGenerator {
    fn language(&self) -> &str {
        "java"
    }

    fn default_output_dir(&self) -> &str {
        "gen-java"
    }

    fn reserved_identifiers(&self) -> &'static [&'static str] {
        RESERVED
    }

    fn file_name(&self, scope: &str, file_type: FileType) -> Result<String, GenerateError> {
        match file_type {
            FileType::Publish => Ok(format!("{}Publisher.java", upper_first(scope))),
            FileType::Subscribe => Ok(format!("{}Subscriber.java", upper_first(scope))),
            FileType::Combined => Err(GenerateError::UnsupportedFileType {
                language: self.language().to_string(),
                file_type,
            }),
        }
    }

    fn render_header(&self, provenance: &Provenance) -> String {
        let mut output = String::new();
        output.push_str("/**\n");
        output.push_str(&format!(" * {}\n", provenance.banner()));
        output.push_str(&format!(" * Generated on {}\n", provenance.iso_date()));
        output.push_str(&format!(" * {}\n", DO_NOT_EDIT));
        output.push_str(" */\n");
        output
    }

    fn render_package(&self, program: &Program, _plan: &ScopePlan) -> String {
        match program.namespace(self.language()) {
            Some(ns) => format!("package {};\n", ns),
            None => String::new(),
        }
    }

    fn render_imports(&self, _plan: &ScopePlan, file_type: FileType) -> String {
        let classes: &[&str] = match file_type {
            FileType::Subscribe => &[
                "ApplicationException",
                "FrameHeader",
                "Protocol",
                "Provider",
                "ScopegenException",
                "Subscription",
                "Transport",
                "TransportException",
            ],
            _ => &[
                "FrameHeader",
                "MessageKind",
                "Protocol",
                "Provider",
                "ScopegenException",
                "Transport",
            ],
        };
        let mut output = String::new();
        for class in classes {
            output.push_str(&format!("import {}.{};\n", RUNTIME_PACKAGE, class));
        }
        output.push('\n');
        output.push_str("import javax.annotation.Generated;\n");
        output
    }

    fn render_publisher(&self, plan: &ScopePlan, provenance: &Provenance) -> String {
        let mut output = String::new();
        output.push_str(&generated_annotation(provenance));
        output.push_str(&format!("public class {} {{\n\n", plan.publisher));
        output.push_str(&delimiter_constant(plan));
        output.push_str("\tprivate final Transport transport;\n");
        output.push_str("\tprivate final Protocol protocol;\n");
        output.push_str("\tprivate int seqId;\n\n");

        output.push_str(&format!("\tpublic {}(Provider provider) {{\n", plan.publisher));
        output.push_str("\t\tProvider.Client client = provider.build();\n");
        output.push_str("\t\ttransport = client.getTransport();\n");
        output.push_str("\t\tprotocol = client.getProtocol();\n");
        output.push_str("\t}\n");

        for method in &plan.methods {
            output.push('\n');
            output.push_str("\t/**\n");
            output.push_str(&format!("\t * Publishes {} on {}.\n", method.op, method.topic));
            output.push_str("\t * Calls on one instance are serialized.\n");
            output.push_str("\t */\n");
            output.push_str(&format!(
                "\tpublic synchronized void publish{}({}) throws ScopegenException {{\n",
                upper_first(&method.op),
                params(&method.publish)
            ));
            output.push_str(&format!("\t\tString op = \"{}\";\n", escape_quoted(&method.op)));
            output.push_str(&format!("\t\tString topic = {};\n", topic_expr(method)));
            for step in &method.publish_steps {
                if let Some(line) = publish_step(step) {
                    output.push_str(&format!("\t\t{}\n", line));
                }
            }
            output.push_str("\t}\n");
        }

        output.push_str("}\n");
        output
    }

    fn render_subscriber(&self, plan: &ScopePlan, provenance: &Provenance) -> String {
        let mut output = String::new();
        output.push_str(&generated_annotation(provenance));
        output.push_str(&format!("public class {} {{\n\n", plan.subscriber));
        output.push_str(&delimiter_constant(plan));
        output.push_str("\tprivate final Provider provider;\n\n");

        output.push_str(&format!("\tpublic {}(Provider provider) {{\n", plan.subscriber));
        output.push_str("\t\tthis.provider = provider;\n");
        output.push_str("\t}\n");

        for method in &plan.methods {
            let op = upper_first(&method.op);
            let param = &method.handler.param;

            output.push('\n');
            output.push_str(&format!("\tpublic interface {}Handler {{\n", op));
            output.push_str(&format!("\t\tvoid on{}({} req);\n", op, param));
            output.push_str("\t}\n\n");

            output.push_str(&format!(
                "\tpublic Subscription subscribe{}({}) throws ScopegenException {{\n",
                op,
                params(&method.subscribe)
            ));
            output.push_str(&format!("\t\tfinal String op = \"{}\";\n", escape_quoted(&method.op)));
            output.push_str(&format!("\t\tString topic = {};\n", topic_expr(method)));
            output.push_str("\t\tfinal Provider.Client client = provider.build();\n");
            output.push_str("\t\tTransport transport = client.getTransport();\n");
            if method.receive_steps.contains(&FrameOp::Subscribe) {
                output.push_str("\t\ttransport.subscribe(topic);\n");
            }
            output.push('\n');

            output.push_str("\t\tfinal Subscription sub = new Subscription(topic, transport);\n");
            output.push_str("\t\tnew Thread(new Runnable() {\n");
            output.push_str("\t\t\tpublic void run() {\n");
            output.push_str("\t\t\t\twhile (true) {\n");
            output.push_str("\t\t\t\t\ttry {\n");
            output.push_str(&format!(
                "\t\t\t\t\t\t{} received = recv{}(op, client.getProtocol());\n",
                param, op
            ));
            output.push_str(&format!("\t\t\t\t\t\thandler.on{}(received);\n", op));
            output.push_str("\t\t\t\t\t} catch (ScopegenException e) {\n");
            output.push_str("\t\t\t\t\t\tif (e instanceof TransportException\n");
            output.push_str("\t\t\t\t\t\t\t\t&& ((TransportException) e).getType() == TransportException.END_OF_FILE) {\n");
            output.push_str("\t\t\t\t\t\t\treturn;\n");
            output.push_str("\t\t\t\t\t\t}\n");
            output.push_str("\t\t\t\t\t\tif (sub.isClosed()) {\n");
            output.push_str("\t\t\t\t\t\t\treturn;\n");
            output.push_str("\t\t\t\t\t\t}\n");
            output.push_str("\t\t\t\t\t\tsub.signal(e);\n");
            output.push_str("\t\t\t\t\t\ttry {\n");
            output.push_str("\t\t\t\t\t\t\tsub.unsubscribe();\n");
            output.push_str("\t\t\t\t\t\t} catch (TransportException e1) {\n");
            output.push_str("\t\t\t\t\t\t\te1.printStackTrace();\n");
            output.push_str("\t\t\t\t\t\t}\n");
            output.push_str("\t\t\t\t\t\treturn;\n");
            output.push_str("\t\t\t\t\t}\n");
            output.push_str("\t\t\t\t}\n");
            output.push_str("\t\t\t}\n");
            output.push_str("\t\t}).start();\n\n");
            output.push_str("\t\treturn sub;\n");
            output.push_str("\t}\n\n");

            output.push_str(&render_recv(method, &op));
        }

        output.push_str("}\n");
        output
    }
}

fn generated_annotation(provenance: &Provenance) -> String {
    format!(
        "@Generated(value = \"{}\", date = \"{}\")\n",
        escape_quoted(&provenance.banner()),
        provenance.short_date()
    )
}

fn delimiter_constant(plan: &ScopePlan) -> String {
    format!(
        "\tpublic static final String DELIMITER = \"{}\";\n\n",
        escape_quoted(&plan.delimiter)
    )
}

fn params(sig: &MethodSignature) -> String {
    sig.params
        .iter()
        .map(|p| match &p.kind {
            ParamKind::Text => format!("String {}", p.name),
            ParamKind::Message(ty) => format!("{} {}", ty, p.name),
            ParamKind::Handler(op) => format!("final {}Handler {}", upper_first(op), p.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn topic_expr(method: &OperationPlan) -> String {
    match method.topic.literal() {
        Some(topic) => format!("\"{}\"", escape_quoted(&topic)),
        None => format!(
            "String.format(\"{}\", {})",
            method.topic.template("%s", escape_printf),
            method.topic.variables().join(", ")
        ),
    }
}

fn message_kind(kind: FrameKind) -> &'static str {
    match kind {
        FrameKind::Call => "MessageKind.CALL",
        FrameKind::Reply => "MessageKind.REPLY",
        FrameKind::Exception => "MessageKind.EXCEPTION",
        FrameKind::Oneway => "MessageKind.ONEWAY",
    }
}

fn publish_step(step: &FrameOp) -> Option<String> {
    let line = match step {
        FrameOp::PreparePublish => "transport.preparePublish(topic);".to_string(),
        FrameOp::IncrementSeq => "seqId++;".to_string(),
        FrameOp::WriteHeader(kind) => format!(
            "protocol.writeMessageBegin(new FrameHeader(op, {}, seqId));",
            message_kind(*kind)
        ),
        FrameOp::WritePayload => "req.write(protocol);".to_string(),
        FrameOp::WriteEnd => "protocol.writeMessageEnd();".to_string(),
        FrameOp::Flush => "transport.flush();".to_string(),
        _ => return None,
    };
    Some(line)
}

fn render_recv(method: &OperationPlan, op: &str) -> String {
    let param = &method.handler.param;
    let mut output = String::new();
    output.push_str(&format!(
        "\tprivate {} recv{}(String op, Protocol iprot) throws ScopegenException {{\n",
        param, op
    ));
    for step in method.per_message_steps() {
        match step {
            FrameOp::ReadHeader => {
                output.push_str("\t\tFrameHeader msg = iprot.readMessageBegin();\n");
            }
            FrameOp::CheckOperation => {
                output.push_str("\t\tif (!msg.name.equals(op)) {\n");
                output.push_str("\t\t\tiprot.skipStruct();\n");
                output.push_str("\t\t\tiprot.readMessageEnd();\n");
                output.push_str("\t\t\tthrow ApplicationException.unknownMethod(op, msg.name);\n");
                output.push_str("\t\t}\n");
            }
            FrameOp::ReadPayload => {
                output.push_str(&format!("\t\t{} req = new {}();\n", param, param));
                output.push_str("\t\treq.read(iprot);\n");
            }
            FrameOp::ReadEnd => {
                output.push_str("\t\tiprot.readMessageEnd();\n");
            }
            _ => {}
        }
    }
    output.push_str("\t\treturn req;\n");
    output.push_str("\t}\n");
    output
}
