//! Execution traces as produced by the GraphQL execution layer.
//!
//! Unlike the wire messages in [`crate::proto`], values that may genuinely be
//! missing are `Option`s here. Traces decoded from the wire turn empty strings
//! into `None`; numeric fields keep whatever the wire carried.
use std::time::SystemTime;

use base64::Engine as _;
use prost::Message;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::iterate::trace_has_errors;
use crate::proto;

/// A single GraphQL operation's execution record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Trace {
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    /// Total operation duration.
    pub duration_ns: u64,
    pub root: Option<Node>,
    pub signature: Option<String>,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub client_reference_id: Option<String>,
    pub full_query_cache_hit: bool,
    pub cache_policy: Option<CachePolicy>,
    pub persisted_query_hit: bool,
    pub persisted_query_register: bool,
    pub forbidden_operation: bool,
    pub registered_operation: bool,
    /// Only present for federated operations.
    pub query_plan: Option<QueryPlanNode>,
}

/// One resolved field, or one list element, of the response tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Node {
    pub response_name: Option<String>,
    /// Set for list elements, which carry no response name.
    pub index: Option<u32>,
    /// Only set when the field was aliased.
    pub original_field_name: Option<String>,
    pub parent_type: Option<String>,
    #[serde(rename = "type")]
    pub return_type: Option<String>,
    /// Nanoseconds since the start of the trace.
    pub start_time: Option<u64>,
    /// Nanoseconds since the start of the trace.
    pub end_time: Option<u64>,
    #[serde(rename = "error")]
    pub errors: Vec<NodeError>,
    #[serde(rename = "child")]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeError {
    pub message: String,
    pub location: Vec<Location>,
    pub time_ns: u64,
    /// The full error as JSON, including its path and extensions.
    pub json: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CachePolicy {
    pub scope: CacheScope,
    pub max_age_ns: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheScope {
    #[default]
    Unknown,
    Public,
    Private,
}

/// How a federated operation was split into subgraph fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryPlanNode {
    Sequence(Vec<QueryPlanNode>),
    Parallel(Vec<QueryPlanNode>),
    Fetch(FetchNode),
    Flatten(Box<QueryPlanNode>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchNode {
    pub service_name: Option<String>,
    pub trace_parsing_failed: bool,
    /// The subgraph's own trace for this fetch.
    pub trace: Option<Box<Trace>>,
}

/// The parts of a [`Node`] that field statistics are keyed and measured by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRecord<'a> {
    pub parent_type: &'a str,
    pub field_name: &'a str,
    pub return_type: &'a str,
    pub duration_ns: u64,
}

impl Trace {
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(proto::Trace::decode(bytes)?.into())
    }

    /// Decodes a base64 encoded subgraph trace, as found in the `ftv1`
    /// response extension.
    pub fn from_ftv1(payload: &str) -> Result<Self, Error> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
        Self::decode(&bytes)
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        proto::Trace::from(self).encode_to_vec()
    }

    /// Whether any node, including those of subgraph traces, recorded an error.
    pub fn has_errors(&self) -> bool {
        trace_has_errors(self)
    }
}

impl Node {
    /// The schema field name behind this node. List elements and the root
    /// have none.
    pub fn field_name(&self) -> Option<&str> {
        non_empty(&self.original_field_name).or_else(|| non_empty(&self.response_name))
    }

    /// Returns the field record if the node was completely written.
    ///
    /// A node may carry errors without timings when the resolver failed before
    /// they were finalized; such nodes have no record.
    pub fn field_record(&self) -> Option<FieldRecord<'_>> {
        let parent_type = non_empty(&self.parent_type)?;
        let field_name = self.field_name()?;
        let return_type = non_empty(&self.return_type)?;
        let (start_time, end_time) = self.start_time.zip(self.end_time)?;
        if end_time < start_time {
            return None;
        }
        Some(FieldRecord {
            parent_type,
            field_name,
            return_type,
            duration_ns: end_time - start_time,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn from_wire_string(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl From<proto::Trace> for Trace {
    fn from(trace: proto::Trace) -> Self {
        Self {
            start_time: trace
                .start_time
                .and_then(|time| SystemTime::try_from(time).ok()),
            end_time: trace
                .end_time
                .and_then(|time| SystemTime::try_from(time).ok()),
            duration_ns: trace.duration_ns,
            root: trace.root.map(Into::into),
            signature: from_wire_string(trace.signature),
            client_name: from_wire_string(trace.client_name),
            client_version: from_wire_string(trace.client_version),
            client_reference_id: from_wire_string(trace.client_reference_id),
            full_query_cache_hit: trace.full_query_cache_hit,
            cache_policy: trace.cache_policy.map(Into::into),
            persisted_query_hit: trace.persisted_query_hit,
            persisted_query_register: trace.persisted_query_register,
            forbidden_operation: trace.forbidden_operation,
            registered_operation: trace.registered_operation,
            query_plan: trace
                .query_plan
                .and_then(|node| QueryPlanNode::from_proto(*node)),
        }
    }
}

impl From<&Trace> for proto::Trace {
    fn from(trace: &Trace) -> Self {
        Self {
            start_time: trace.start_time.map(Into::into),
            end_time: trace.end_time.map(Into::into),
            duration_ns: trace.duration_ns,
            root: trace.root.as_ref().map(Into::into),
            signature: trace.signature.clone().unwrap_or_default(),
            client_name: trace.client_name.clone().unwrap_or_default(),
            client_version: trace.client_version.clone().unwrap_or_default(),
            client_reference_id: trace.client_reference_id.clone().unwrap_or_default(),
            cache_policy: trace.cache_policy.as_ref().map(Into::into),
            query_plan: trace.query_plan.as_ref().map(|node| Box::new(node.into())),
            full_query_cache_hit: trace.full_query_cache_hit,
            persisted_query_hit: trace.persisted_query_hit,
            persisted_query_register: trace.persisted_query_register,
            registered_operation: trace.registered_operation,
            forbidden_operation: trace.forbidden_operation,
        }
    }
}

impl From<proto::trace::Node> for Node {
    fn from(node: proto::trace::Node) -> Self {
        let (response_name, index) = match node.id {
            Some(proto::trace::node::Id::ResponseName(name)) => (from_wire_string(name), None),
            Some(proto::trace::node::Id::Index(index)) => (None, Some(index)),
            None => (None, None),
        };
        Self {
            response_name,
            index,
            original_field_name: from_wire_string(node.original_field_name),
            parent_type: from_wire_string(node.parent_type),
            return_type: from_wire_string(node.r#type),
            start_time: Some(node.start_time),
            end_time: Some(node.end_time),
            errors: node.error.into_iter().map(Into::into).collect(),
            children: node.child.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&Node> for proto::trace::Node {
    fn from(node: &Node) -> Self {
        let id = match (&node.response_name, node.index) {
            (Some(name), _) => Some(proto::trace::node::Id::ResponseName(name.clone())),
            (None, Some(index)) => Some(proto::trace::node::Id::Index(index)),
            (None, None) => None,
        };
        Self {
            original_field_name: node.original_field_name.clone().unwrap_or_default(),
            r#type: node.return_type.clone().unwrap_or_default(),
            parent_type: node.parent_type.clone().unwrap_or_default(),
            start_time: node.start_time.unwrap_or_default(),
            end_time: node.end_time.unwrap_or_default(),
            error: node.errors.iter().map(Into::into).collect(),
            child: node.children.iter().map(Into::into).collect(),
            id,
        }
    }
}

impl From<proto::trace::Error> for NodeError {
    fn from(error: proto::trace::Error) -> Self {
        Self {
            message: error.message,
            location: error
                .location
                .into_iter()
                .map(|location| Location {
                    line: location.line,
                    column: location.column,
                })
                .collect(),
            time_ns: error.time_ns,
            json: from_wire_string(error.json),
        }
    }
}

impl From<&NodeError> for proto::trace::Error {
    fn from(error: &NodeError) -> Self {
        Self {
            message: error.message.clone(),
            location: error
                .location
                .iter()
                .map(|location| proto::trace::Location {
                    line: location.line,
                    column: location.column,
                })
                .collect(),
            time_ns: error.time_ns,
            json: error.json.clone().unwrap_or_default(),
        }
    }
}

impl From<proto::trace::CachePolicy> for CachePolicy {
    fn from(policy: proto::trace::CachePolicy) -> Self {
        use proto::trace::cache_policy::Scope;

        Self {
            scope: match Scope::try_from(policy.scope) {
                Ok(Scope::Public) => CacheScope::Public,
                Ok(Scope::Private) => CacheScope::Private,
                Ok(Scope::Unknown) | Err(_) => CacheScope::Unknown,
            },
            max_age_ns: Some(policy.max_age_ns),
        }
    }
}

impl From<&CachePolicy> for proto::trace::CachePolicy {
    fn from(policy: &CachePolicy) -> Self {
        use proto::trace::cache_policy::Scope;

        let scope = match policy.scope {
            CacheScope::Unknown => Scope::Unknown,
            CacheScope::Public => Scope::Public,
            CacheScope::Private => Scope::Private,
        };
        Self {
            scope: scope as i32,
            max_age_ns: policy.max_age_ns.unwrap_or_default(),
        }
    }
}

impl QueryPlanNode {
    /// Plan nodes of a kind that carries no statistics are dropped.
    fn from_proto(node: proto::trace::QueryPlanNode) -> Option<Self> {
        use proto::trace::query_plan_node::Node as Kind;

        Some(match node.node? {
            Kind::Sequence(sequence) => QueryPlanNode::Sequence(
                sequence
                    .nodes
                    .into_iter()
                    .filter_map(QueryPlanNode::from_proto)
                    .collect(),
            ),
            Kind::Parallel(parallel) => QueryPlanNode::Parallel(
                parallel
                    .nodes
                    .into_iter()
                    .filter_map(QueryPlanNode::from_proto)
                    .collect(),
            ),
            Kind::Fetch(fetch) => QueryPlanNode::Fetch(FetchNode {
                service_name: from_wire_string(fetch.service_name),
                trace_parsing_failed: fetch.trace_parsing_failed,
                trace: fetch.trace.map(|trace| Box::new((*trace).into())),
            }),
            Kind::Flatten(flatten) => {
                QueryPlanNode::Flatten(Box::new(QueryPlanNode::from_proto(*flatten.node?)?))
            }
        })
    }
}

impl From<&QueryPlanNode> for proto::trace::QueryPlanNode {
    fn from(node: &QueryPlanNode) -> Self {
        use proto::trace::query_plan_node::FetchNode as WireFetchNode;
        use proto::trace::query_plan_node::FlattenNode;
        use proto::trace::query_plan_node::Node as Kind;
        use proto::trace::query_plan_node::ParallelNode;
        use proto::trace::query_plan_node::SequenceNode;

        let node = match node {
            QueryPlanNode::Sequence(nodes) => Kind::Sequence(SequenceNode {
                nodes: nodes.iter().map(Into::into).collect(),
            }),
            QueryPlanNode::Parallel(nodes) => Kind::Parallel(ParallelNode {
                nodes: nodes.iter().map(Into::into).collect(),
            }),
            QueryPlanNode::Fetch(fetch) => Kind::Fetch(Box::new(WireFetchNode {
                service_name: fetch.service_name.clone().unwrap_or_default(),
                trace_parsing_failed: fetch.trace_parsing_failed,
                trace: fetch.trace.as_deref().map(|trace| Box::new(trace.into())),
                sent_time_offset: 0,
            })),
            QueryPlanNode::Flatten(node) => Kind::Flatten(Box::new(FlattenNode {
                response_path: Vec::new(),
                node: Some(Box::new(node.as_ref().into())),
            })),
        };
        Self { node: Some(node) }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn timed_node(start_time: Option<u64>, end_time: Option<u64>) -> Node {
        Node {
            response_name: Some("user".to_string()),
            parent_type: Some("Query".to_string()),
            return_type: Some("User!".to_string()),
            start_time,
            end_time,
            ..Default::default()
        }
    }

    #[test]
    fn field_name_prefers_original_field_name() {
        let mut node = timed_node(Some(1), Some(2));
        assert_eq!(node.field_name(), Some("user"));
        node.original_field_name = Some("account".to_string());
        assert_eq!(node.field_name(), Some("account"));
        node.original_field_name = Some(String::new());
        assert_eq!(node.field_name(), Some("user"));

        let index_node = Node {
            index: Some(3),
            ..Default::default()
        };
        assert_eq!(index_node.field_name(), None);
    }

    #[test]
    fn field_record_requires_complete_node() {
        assert_eq!(
            timed_node(Some(10), Some(25)).field_record(),
            Some(FieldRecord {
                parent_type: "Query",
                field_name: "user",
                return_type: "User!",
                duration_ns: 15,
            })
        );
        // A node starting with the trace is plausible
        assert_eq!(
            timed_node(Some(0), Some(0))
                .field_record()
                .map(|record| record.duration_ns),
            Some(0)
        );
        assert_eq!(timed_node(Some(10), None).field_record(), None);
        assert_eq!(timed_node(None, Some(10)).field_record(), None);
        assert_eq!(timed_node(Some(10), Some(9)).field_record(), None);

        let mut untyped = timed_node(Some(1), Some(2));
        untyped.return_type = Some(String::new());
        assert_eq!(untyped.field_record(), None);

        let mut orphan = timed_node(Some(1), Some(2));
        orphan.parent_type = None;
        assert_eq!(orphan.field_record(), None);
    }

    #[test]
    fn deserializes_wire_style_json() {
        let trace: Trace = serde_json::from_value(json!({
            "durationNs": 1200,
            "clientName": "web",
            "cachePolicy": { "scope": "PRIVATE", "maxAgeNs": 30 },
            "root": {
                "child": [{
                    "responseName": "me",
                    "parentType": "Query",
                    "type": "User",
                    "startTime": 5,
                    "endTime": 9,
                    "error": [{ "message": "boom" }]
                }]
            },
            "queryPlan": {
                "sequence": [
                    { "fetch": { "serviceName": "accounts" } },
                    { "flatten": { "parallel": [] } }
                ]
            }
        }))
        .unwrap();

        assert_eq!(trace.duration_ns, 1200);
        assert_eq!(trace.client_name.as_deref(), Some("web"));
        assert_eq!(trace.client_version, None);
        assert_eq!(
            trace.cache_policy,
            Some(CachePolicy {
                scope: CacheScope::Private,
                max_age_ns: Some(30),
            })
        );
        let me = &trace.root.as_ref().unwrap().children[0];
        assert_eq!(me.return_type.as_deref(), Some("User"));
        assert_eq!(me.errors[0].message, "boom");
        let Some(QueryPlanNode::Sequence(nodes)) = &trace.query_plan else {
            panic!("expected a sequence node");
        };
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn wire_round_trip_keeps_query_plan() {
        let trace = Trace {
            start_time: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            duration_ns: 42,
            client_name: Some("ios".to_string()),
            cache_policy: Some(CachePolicy {
                scope: CacheScope::Public,
                max_age_ns: Some(1_000),
            }),
            query_plan: Some(QueryPlanNode::Parallel(vec![QueryPlanNode::Flatten(
                Box::new(QueryPlanNode::Fetch(FetchNode {
                    service_name: Some("products".to_string()),
                    trace: Some(Box::new(Trace {
                        root: Some(Node {
                            children: vec![timed_node(Some(1), Some(3))],
                            ..Default::default()
                        }),
                        ..Default::default()
                    })),
                    ..Default::default()
                })),
            )])),
            ..Default::default()
        };

        let decoded = Trace::decode(&trace.encode_to_vec()).unwrap();
        assert_eq!(decoded.client_name.as_deref(), Some("ios"));
        assert_eq!(decoded.start_time, trace.start_time);
        assert_eq!(decoded.cache_policy, trace.cache_policy);
        let Some(QueryPlanNode::Parallel(nodes)) = &decoded.query_plan else {
            panic!("expected a parallel node");
        };
        let QueryPlanNode::Flatten(flatten) = &nodes[0] else {
            panic!("expected a flatten node");
        };
        let QueryPlanNode::Fetch(fetch) = flatten.as_ref() else {
            panic!("expected a fetch node");
        };
        assert_eq!(fetch.service_name.as_deref(), Some("products"));
        let subgraph_root = fetch.trace.as_ref().unwrap().root.as_ref().unwrap();
        let record = subgraph_root.children[0].field_record().unwrap();
        assert_eq!(record.duration_ns, 2);
    }

    #[test]
    fn decodes_ftv1_payload() {
        let subgraph_trace = Trace {
            root: Some(Node {
                children: vec![Node {
                    response_name: Some("me".to_string()),
                    errors: vec![NodeError {
                        message: "denied".to_string(),
                        location: vec![Location { line: 1, column: 3 }],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let payload =
            base64::engine::general_purpose::STANDARD.encode(subgraph_trace.encode_to_vec());

        let decoded = Trace::from_ftv1(&payload).unwrap();
        assert!(decoded.has_errors());
        let me = &decoded.root.unwrap().children[0];
        assert_eq!(me.response_name.as_deref(), Some("me"));
        assert_eq!(me.errors[0].location, vec![Location { line: 1, column: 3 }]);
    }

    #[test]
    fn rejects_invalid_ftv1_payload() {
        assert!(matches!(
            Trace::from_ftv1("not base64!"),
            Err(Error::Base64Decode(_))
        ));
        let garbage = base64::engine::general_purpose::STANDARD.encode([0xff, 0xff, 0xff]);
        assert!(matches!(
            Trace::from_ftv1(&garbage),
            Err(Error::ProtobufDecode(_))
        ));
    }
}
