//! Scope plans: the language-neutral description every renderer works from.
//!
//! A plan fixes, per operation, the topic expression, the method
//! signatures, and the ordered frame operations of the publish and receive
//! paths. Renderers translate each step into their target's runtime calls
//! instead of re-deriving the protocol.

use scopegen_ir::{Operation, PrefixError, Scope};
use tracing::debug;

use crate::topic::TopicExpr;

/// Message kind written in a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Call,
    Reply,
    Exception,
    Oneway,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Call => "call",
            FrameKind::Reply => "reply",
            FrameKind::Exception => "exception",
            FrameKind::Oneway => "oneway",
        }
    }
}

/// One step of the publish or receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOp {
    PreparePublish,
    IncrementSeq,
    WriteHeader(FrameKind),
    WritePayload,
    WriteEnd,
    Flush,
    Subscribe,
    ReadHeader,
    CheckOperation,
    ReadPayload,
    ReadEnd,
}

/// Publish path: prepare, count, frame, send.
pub const PUBLISH_STEPS: [FrameOp; 6] = [
    FrameOp::PreparePublish,
    FrameOp::IncrementSeq,
    FrameOp::WriteHeader(FrameKind::Call),
    FrameOp::WritePayload,
    FrameOp::WriteEnd,
    FrameOp::Flush,
];

/// Receive path: subscribe once, then per message read, check, decode.
pub const RECEIVE_STEPS: [FrameOp; 5] = [
    FrameOp::Subscribe,
    FrameOp::ReadHeader,
    FrameOp::CheckOperation,
    FrameOp::ReadPayload,
    FrameOp::ReadEnd,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Publish,
    Subscribe,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Publish => "publish",
            Verb::Subscribe => "subscribe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// A prefix variable, passed as a string.
    Text,
    /// The request payload of the named type.
    Message(String),
    /// The handler for the named operation.
    Handler(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// A generated publish or subscribe method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub verb: Verb,
    pub operation: String,
    /// Prefix variables first, in declared order, then the payload or handler.
    pub params: Vec<Param>,
}

impl MethodSignature {
    fn new(verb: Verb, operation: &str, variables: &[String], last: Param) -> Self {
        let mut params: Vec<Param> = variables
            .iter()
            .map(|v| Param {
                name: v.clone(),
                kind: ParamKind::Text,
            })
            .collect();
        params.push(last);
        Self {
            verb,
            operation: operation.to_string(),
            params,
        }
    }

    /// Parameters that feed the topic.
    pub fn prefix_params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.kind == ParamKind::Text)
    }
}

/// The callback a subscriber invokes for each message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSignature {
    pub operation: String,
    pub param: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    pub op: String,
    pub param: String,
    pub topic: TopicExpr,
    pub publish: MethodSignature,
    pub subscribe: MethodSignature,
    pub handler: HandlerSignature,
    pub publish_steps: Vec<FrameOp>,
    pub receive_steps: Vec<FrameOp>,
}

impl OperationPlan {
    pub fn new(scope: &Scope, op: &Operation, delimiter: &str) -> Result<Self, PrefixError> {
        let topic = TopicExpr::new(scope, op, delimiter)?;
        let variables = topic.variables().to_vec();
        Ok(Self {
            op: op.name.clone(),
            param: op.param.clone(),
            publish: MethodSignature::new(
                Verb::Publish,
                &op.name,
                &variables,
                Param {
                    name: "req".into(),
                    kind: ParamKind::Message(op.param.clone()),
                },
            ),
            subscribe: MethodSignature::new(
                Verb::Subscribe,
                &op.name,
                &variables,
                Param {
                    name: "handler".into(),
                    kind: ParamKind::Handler(op.name.clone()),
                },
            ),
            handler: HandlerSignature {
                operation: op.name.clone(),
                param: op.param.clone(),
            },
            topic,
            publish_steps: PUBLISH_STEPS.to_vec(),
            receive_steps: RECEIVE_STEPS.to_vec(),
        })
    }

    /// Steps run for every received message, after subscribing.
    pub fn per_message_steps(&self) -> impl Iterator<Item = &FrameOp> {
        self.receive_steps.iter().filter(|s| **s != FrameOp::Subscribe)
    }
}

/// Everything a renderer needs for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePlan {
    pub scope: String,
    pub publisher: String,
    pub subscriber: String,
    pub delimiter: String,
    pub methods: Vec<OperationPlan>,
}

impl ScopePlan {
    pub fn new(scope: &Scope, delimiter: &str) -> Result<Self, PrefixError> {
        let methods = scope
            .operations
            .iter()
            .map(|op| OperationPlan::new(scope, op, delimiter))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(scope = %scope.name, operations = methods.len(), "planned scope");
        Ok(Self {
            scope: scope.name.clone(),
            publisher: format!("{}Publisher", scope.name),
            subscriber: format!("{}Subscriber", scope.name),
            delimiter: delimiter.to_string(),
            methods,
        })
    }

    /// True if any topic needs caller-supplied values.
    pub fn has_variables(&self) -> bool {
        self.methods.iter().any(|m| !m.topic.variables().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegen_ir::Prefix;

    #[test]
    fn prefix_arity_matches_variables() {
        let scope = Scope::new("Foo", Prefix::parse("{tenant}.user.{id}").unwrap())
            .with_operation("Bar", "BarEvent")
            .with_operation("Baz", "BazEvent");
        let plan = ScopePlan::new(&scope, ".").unwrap();

        assert_eq!(plan.publisher, "FooPublisher");
        assert_eq!(plan.subscriber, "FooSubscriber");
        assert_eq!(plan.methods.len(), 2);
        for m in &plan.methods {
            for sig in [&m.publish, &m.subscribe] {
                let names: Vec<&str> = sig.prefix_params().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["tenant", "id"]);
                assert_eq!(sig.params.len(), 3);
            }
            assert_eq!(m.publish.params[2].kind, ParamKind::Message(m.param.clone()));
            assert_eq!(m.subscribe.params[2].kind, ParamKind::Handler(m.op.clone()));
        }
        assert!(plan.has_variables());
    }

    #[test]
    fn empty_prefix_has_no_leading_params() {
        let scope = Scope::new("Baz", Prefix::default()).with_operation("Qux", "QuxEvent");
        let plan = ScopePlan::new(&scope, ".").unwrap();
        let m = &plan.methods[0];
        assert_eq!(m.publish.params.len(), 1);
        assert_eq!(m.subscribe.params.len(), 1);
        assert_eq!(m.topic.literal().as_deref(), Some("Baz.Qux"));
        assert!(!plan.has_variables());
    }

    #[test]
    fn steps_follow_the_wire_contract() {
        let scope = Scope::new("Foo", Prefix::default()).with_operation("Bar", "BarEvent");
        let m = &ScopePlan::new(&scope, ".").unwrap().methods[0];
        assert_eq!(m.publish_steps, PUBLISH_STEPS.to_vec());
        assert_eq!(m.publish_steps[2], FrameOp::WriteHeader(FrameKind::Call));
        assert_eq!(m.receive_steps[0], FrameOp::Subscribe);
        assert_eq!(m.per_message_steps().count(), 4);
    }

    #[test]
    fn publisher_and_subscriber_share_one_topic() {
        let scope = Scope::new("Foo", Prefix::parse("user.{id}").unwrap()).with_operation("Bar", "BarEvent");
        let m = &ScopePlan::new(&scope, ".").unwrap().methods[0];
        let from_publish: Vec<&str> = m.publish.prefix_params().map(|_| "42").collect();
        let from_subscribe: Vec<&str> = m.subscribe.prefix_params().map(|_| "42").collect();
        assert_eq!(
            m.topic.evaluate(&from_publish).unwrap(),
            m.topic.evaluate(&from_subscribe).unwrap()
        );
        assert_eq!(m.topic.evaluate(&from_publish).unwrap(), "user.42.Foo.Bar");
    }
}
