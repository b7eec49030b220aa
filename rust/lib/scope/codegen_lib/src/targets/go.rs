//! Go publisher/subscriber generator.

use scopegen_ir::Program;

use crate::generator::{Codegen, FileType, GenerateError, Provenance};
use crate::naming::{escape_printf, escape_quoted, to_snake_case, upper_first};
use crate::plan::{FrameKind, FrameOp, MethodSignature, OperationPlan, ParamKind, ScopePlan};

const RUNTIME_IMPORT: &str = "github.com/scopegen/scopegen-go";

/// Package name used when neither a Go namespace nor a program name is set.
const FALLBACK_PACKAGE: &str = "scopes";

/// Go keywords, plus the predeclared values and the runtime package alias
/// the generated bodies refer to.
const RESERVED: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var", "nil", "true", "false", "scopegen",
];

pub struct GoGenerator;

impl Codegen for GoGenerator {
    fn language(&self) -> &str {
        "go"
    }

    fn default_output_dir(&self) -> &str {
        "gen-go"
    }

    fn reserved_identifiers(&self) -> &'static [&'static str] {
        RESERVED
    }

    /// Every scope of a program lands in one Go package.
    fn shared_symbols(&self, plan: &ScopePlan) -> Vec<String> {
        let mut symbols = vec![plan.publisher.clone(), plan.subscriber.clone()];
        for method in &plan.methods {
            symbols.push(handler_type(plan, &method.op));
        }
        symbols
    }

    fn file_name(&self, scope: &str, file_type: FileType) -> Result<String, GenerateError> {
        match file_type {
            FileType::Publish => Ok(format!("{}_publisher.go", to_snake_case(scope))),
            FileType::Subscribe => Ok(format!("{}_subscriber.go", to_snake_case(scope))),
            FileType::Combined => Err(GenerateError::UnsupportedFileType {
                language: self.language().to_string(),
                file_type,
            }),
        }
    }

    fn render_header(&self, provenance: &Provenance) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "// Code generated by {}. DO NOT EDIT.\n",
            provenance.tool()
        ));
        output.push_str(&format!("// Generated on {}\n", provenance.iso_date()));
        output
    }

    fn render_package(&self, program: &Program, _plan: &ScopePlan) -> String {
        format!("package {}\n", package_name(program))
    }

    fn render_imports(&self, plan: &ScopePlan, file_type: FileType) -> String {
        let mut std_imports = Vec::new();
        if plan.has_variables() {
            std_imports.push("fmt");
        }
        match file_type {
            FileType::Subscribe => std_imports.push("log"),
            _ => std_imports.push("sync"),
        }

        let mut output = String::from("import (\n");
        for import in std_imports {
            output.push_str(&format!("\t\"{}\"\n", import));
        }
        output.push('\n');
        output.push_str(&format!("\tscopegen \"{}\"\n", RUNTIME_IMPORT));
        output.push_str(")\n");
        output
    }

    fn render_publisher(&self, plan: &ScopePlan, _provenance: &Provenance) -> String {
        let name = &plan.publisher;
        let mut output = String::new();

        output.push_str(&format!(
            "// {} publishes {} operations. It is safe for concurrent use.\n",
            name, plan.scope
        ));
        output.push_str(&format!("type {} struct {{\n", name));
        output.push_str("\tmu        sync.Mutex\n");
        output.push_str("\ttransport scopegen.Transport\n");
        output.push_str("\tprotocol  scopegen.Protocol\n");
        output.push_str("\tseqID     int32\n");
        output.push_str("}\n\n");

        output.push_str(&format!(
            "func New{}(provider *scopegen.Provider) (*{}, error) {{\n",
            name, name
        ));
        output.push_str("\ttransport, protocol, err := provider.Build()\n");
        output.push_str("\tif err != nil {\n");
        output.push_str("\t\treturn nil, err\n");
        output.push_str("\t}\n");
        output.push_str(&format!(
            "\treturn &{}{{transport: transport, protocol: protocol}}, nil\n",
            name
        ));
        output.push_str("}\n");

        for method in &plan.methods {
            output.push('\n');
            output.push_str(&format!(
                "func (p *{}) Publish{}({}) error {{\n",
                name,
                upper_first(&method.op),
                params(plan, &method.publish)
            ));
            output.push_str("\tp.mu.Lock()\n");
            output.push_str("\tdefer p.mu.Unlock()\n");
            output.push_str(&format!("\top := \"{}\"\n", escape_quoted(&method.op)));
            output.push_str(&format!("\ttopic := {}\n", topic_expr(method)));

            let steps = &method.publish_steps;
            for (i, step) in steps.iter().enumerate() {
                let last = i + 1 == steps.len();
                match publish_step(step) {
                    StepCode::Stmt(line) => output.push_str(&format!("\t{}\n", line)),
                    StepCode::Call(call) if last => output.push_str(&format!("\treturn {}\n", call)),
                    StepCode::Call(call) => {
                        output.push_str(&format!("\tif err := {}; err != nil {{\n", call));
                        output.push_str("\t\treturn err\n");
                        output.push_str("\t}\n");
                    }
                    StepCode::None => {}
                }
            }
            output.push_str("}\n");
        }

        output
    }

    fn render_subscriber(&self, plan: &ScopePlan, _provenance: &Provenance) -> String {
        let name = &plan.subscriber;
        let mut output = String::new();

        for method in &plan.methods {
            output.push_str(&format!(
                "// {} handles {} messages received by {}.\n",
                handler_type(plan, &method.op),
                method.op,
                name
            ));
            output.push_str(&format!(
                "type {} func(*{})\n\n",
                handler_type(plan, &method.op),
                method.handler.param
            ));
        }

        output.push_str(&format!("// {} subscribes to {} operations.\n", name, plan.scope));
        output.push_str(&format!("type {} struct {{\n", name));
        output.push_str("\tprovider *scopegen.Provider\n");
        output.push_str("}\n\n");

        output.push_str(&format!(
            "func New{}(provider *scopegen.Provider) *{} {{\n",
            name, name
        ));
        output.push_str(&format!("\treturn &{}{{provider: provider}}\n", name));
        output.push_str("}\n");

        for method in &plan.methods {
            let op = upper_first(&method.op);
            output.push('\n');
            output.push_str(&format!(
                "func (s *{}) Subscribe{}({}) (*scopegen.Subscription, error) {{\n",
                name,
                op,
                params(plan, &method.subscribe)
            ));
            output.push_str(&format!("\top := \"{}\"\n", escape_quoted(&method.op)));
            output.push_str(&format!("\ttopic := {}\n", topic_expr(method)));
            output.push_str("\ttransport, protocol, err := s.provider.Build()\n");
            output.push_str("\tif err != nil {\n");
            output.push_str("\t\treturn nil, err\n");
            output.push_str("\t}\n");
            if method.receive_steps.contains(&FrameOp::Subscribe) {
                output.push_str("\tif err := transport.Subscribe(topic); err != nil {\n");
                output.push_str("\t\treturn nil, err\n");
                output.push_str("\t}\n");
            }
            output.push('\n');
            output.push_str("\tsub := scopegen.NewSubscription(topic, transport)\n");
            output.push_str("\tgo func() {\n");
            output.push_str("\t\tfor {\n");
            output.push_str(&format!("\t\t\treceived, err := s.recv{}(op, protocol)\n", op));
            output.push_str("\t\t\tif err != nil {\n");
            output.push_str("\t\t\t\tif scopegen.IsEndOfFile(err) || sub.IsClosed() {\n");
            output.push_str("\t\t\t\t\treturn\n");
            output.push_str("\t\t\t\t}\n");
            output.push_str("\t\t\t\tsub.Signal(err)\n");
            output.push_str("\t\t\t\tif err := sub.Unsubscribe(); err != nil {\n");
            output.push_str("\t\t\t\t\tlog.Printf(\"scopegen: unsubscribe %s: %v\", topic, err)\n");
            output.push_str("\t\t\t\t}\n");
            output.push_str("\t\t\t\treturn\n");
            output.push_str("\t\t\t}\n");
            output.push_str("\t\t\thandler(received)\n");
            output.push_str("\t\t}\n");
            output.push_str("\t}()\n\n");
            output.push_str("\treturn sub, nil\n");
            output.push_str("}\n\n");

            output.push_str(&render_recv(name, method, &op));
        }

        output
    }
}

fn package_name(program: &Program) -> String {
    let candidate = match program.namespace("go") {
        Some(ns) => ns.rsplit('.').next().unwrap_or(ns).to_string(),
        None => to_snake_case(&program.name),
    };
    let cleaned: String = candidate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        FALLBACK_PACKAGE.to_string()
    } else {
        cleaned
    }
}

fn handler_type(plan: &ScopePlan, op: &str) -> String {
    format!("{}{}Handler", upper_first(&plan.scope), upper_first(op))
}

fn params(plan: &ScopePlan, sig: &MethodSignature) -> String {
    let mut rendered = Vec::new();
    let prefix: Vec<&str> = sig.prefix_params().map(|p| p.name.as_str()).collect();
    if !prefix.is_empty() {
        rendered.push(format!("{} string", prefix.join(", ")));
    }
    for p in &sig.params {
        match &p.kind {
            ParamKind::Text => {}
            ParamKind::Message(ty) => rendered.push(format!("{} *{}", p.name, ty)),
            ParamKind::Handler(op) => rendered.push(format!("{} {}", p.name, handler_type(plan, op))),
        }
    }
    rendered.join(", ")
}

fn topic_expr(method: &OperationPlan) -> String {
    match method.topic.literal() {
        Some(topic) => format!("\"{}\"", escape_quoted(&topic)),
        None => format!(
            "fmt.Sprintf(\"{}\", {})",
            method.topic.template("%s", escape_printf),
            method.topic.variables().join(", ")
        ),
    }
}

enum StepCode {
    Stmt(String),
    Call(String),
    None,
}

fn message_kind(kind: FrameKind) -> &'static str {
    match kind {
        FrameKind::Call => "scopegen.Call",
        FrameKind::Reply => "scopegen.Reply",
        FrameKind::Exception => "scopegen.Exception",
        FrameKind::Oneway => "scopegen.Oneway",
    }
}

fn publish_step(step: &FrameOp) -> StepCode {
    match step {
        FrameOp::PreparePublish => StepCode::Call("p.transport.PreparePublish(topic)".into()),
        FrameOp::IncrementSeq => StepCode::Stmt("p.seqID++".into()),
        FrameOp::WriteHeader(kind) => StepCode::Call(format!(
            "p.protocol.WriteMessageBegin(op, {}, p.seqID)",
            message_kind(*kind)
        )),
        FrameOp::WritePayload => StepCode::Call("req.Write(p.protocol)".into()),
        FrameOp::WriteEnd => StepCode::Call("p.protocol.WriteMessageEnd()".into()),
        FrameOp::Flush => StepCode::Call("p.transport.Flush()".into()),
        _ => StepCode::None,
    }
}

fn render_recv(subscriber: &str, method: &OperationPlan, op: &str) -> String {
    let param = &method.handler.param;
    let mut output = String::new();
    output.push_str(&format!(
        "func (s *{}) recv{}(op string, iprot scopegen.Protocol) (*{}, error) {{\n",
        subscriber, op, param
    ));
    for step in method.per_message_steps() {
        match step {
            FrameOp::ReadHeader => {
                output.push_str("\tname, _, _, err := iprot.ReadMessageBegin()\n");
                output.push_str("\tif err != nil {\n");
                output.push_str("\t\treturn nil, err\n");
                output.push_str("\t}\n");
            }
            FrameOp::CheckOperation => {
                output.push_str("\tif name != op {\n");
                output.push_str("\t\tiprot.SkipStruct()\n");
                output.push_str("\t\tiprot.ReadMessageEnd()\n");
                output.push_str("\t\treturn nil, scopegen.NewUnknownMethodError(op, name)\n");
                output.push_str("\t}\n");
            }
            FrameOp::ReadPayload => {
                output.push_str(&format!("\treq := &{}{{}}\n", param));
                output.push_str("\tif err := req.Read(iprot); err != nil {\n");
                output.push_str("\t\treturn nil, err\n");
                output.push_str("\t}\n");
            }
            FrameOp::ReadEnd => {
                output.push_str("\treturn req, iprot.ReadMessageEnd()\n");
            }
            _ => {}
        }
    }
    output.push_str("}\n");
    output
}
