//! Wire-transfer messages of the Apollo usage reporting protocol.
//!
//! These mirror the reporting protobuf schema field for field. They are only
//! produced when a report is finalized (or consumed when a trace is decoded);
//! aggregation happens on the types in [`crate::studio`].
use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Trace {
    #[prost(message, optional, tag = "4")]
    pub start_time: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub end_time: Option<::prost_types::Timestamp>,
    #[prost(uint64, tag = "11")]
    pub duration_ns: u64,
    #[prost(message, optional, tag = "14")]
    pub root: Option<trace::Node>,
    #[prost(string, tag = "19")]
    pub signature: String,
    #[prost(string, tag = "7")]
    pub client_name: String,
    #[prost(string, tag = "8")]
    pub client_version: String,
    #[prost(string, tag = "23")]
    pub client_reference_id: String,
    #[prost(message, optional, tag = "18")]
    pub cache_policy: Option<trace::CachePolicy>,
    #[prost(message, optional, boxed, tag = "26")]
    pub query_plan: Option<Box<trace::QueryPlanNode>>,
    #[prost(bool, tag = "20")]
    pub full_query_cache_hit: bool,
    #[prost(bool, tag = "21")]
    pub persisted_query_hit: bool,
    #[prost(bool, tag = "22")]
    pub persisted_query_register: bool,
    #[prost(bool, tag = "24")]
    pub registered_operation: bool,
    #[prost(bool, tag = "25")]
    pub forbidden_operation: bool,
}

pub mod trace {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CachePolicy {
        #[prost(enumeration = "cache_policy::Scope", tag = "1")]
        pub scope: i32,
        #[prost(int64, tag = "2")]
        pub max_age_ns: i64,
    }

    pub mod cache_policy {
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum Scope {
            Unknown = 0,
            Public = 1,
            Private = 2,
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Location {
        #[prost(uint32, tag = "1")]
        pub line: u32,
        #[prost(uint32, tag = "2")]
        pub column: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Error {
        #[prost(string, tag = "1")]
        pub message: String,
        #[prost(message, repeated, tag = "2")]
        pub location: Vec<Location>,
        #[prost(uint64, tag = "3")]
        pub time_ns: u64,
        #[prost(string, tag = "4")]
        pub json: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Node {
        #[prost(string, tag = "14")]
        pub original_field_name: String,
        #[prost(string, tag = "3")]
        pub r#type: String,
        #[prost(string, tag = "13")]
        pub parent_type: String,
        #[prost(uint64, tag = "8")]
        pub start_time: u64,
        #[prost(uint64, tag = "9")]
        pub end_time: u64,
        #[prost(message, repeated, tag = "11")]
        pub error: Vec<Error>,
        #[prost(message, repeated, tag = "12")]
        pub child: Vec<Node>,
        #[prost(oneof = "node::Id", tags = "1, 2")]
        pub id: Option<node::Id>,
    }

    pub mod node {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Id {
            #[prost(string, tag = "1")]
            ResponseName(String),
            #[prost(uint32, tag = "2")]
            Index(u32),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryPlanNode {
        #[prost(oneof = "query_plan_node::Node", tags = "1, 2, 3, 4")]
        pub node: Option<query_plan_node::Node>,
    }

    pub mod query_plan_node {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct SequenceNode {
            #[prost(message, repeated, tag = "1")]
            pub nodes: Vec<super::QueryPlanNode>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct ParallelNode {
            #[prost(message, repeated, tag = "1")]
            pub nodes: Vec<super::QueryPlanNode>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct FetchNode {
            #[prost(string, tag = "1")]
            pub service_name: String,
            #[prost(bool, tag = "2")]
            pub trace_parsing_failed: bool,
            #[prost(message, optional, boxed, tag = "3")]
            pub trace: Option<Box<super::super::Trace>>,
            #[prost(uint64, tag = "4")]
            pub sent_time_offset: u64,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct FlattenNode {
            #[prost(message, repeated, tag = "1")]
            pub response_path: Vec<ResponsePathElement>,
            #[prost(message, optional, boxed, tag = "2")]
            pub node: Option<Box<super::QueryPlanNode>>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct ResponsePathElement {
            #[prost(oneof = "response_path_element::Id", tags = "1, 2")]
            pub id: Option<response_path_element::Id>,
        }

        pub mod response_path_element {
            #[derive(Clone, PartialEq, ::prost::Oneof)]
            pub enum Id {
                #[prost(string, tag = "1")]
                FieldName(String),
                #[prost(uint32, tag = "2")]
                Index(u32),
            }
        }

        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Node {
            #[prost(message, tag = "1")]
            Sequence(SequenceNode),
            #[prost(message, tag = "2")]
            Parallel(ParallelNode),
            #[prost(message, tag = "3")]
            Fetch(Box<FetchNode>),
            #[prost(message, tag = "4")]
            Flatten(Box<FlattenNode>),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReportHeader {
    #[prost(string, tag = "12")]
    pub graph_ref: String,
    #[prost(string, tag = "5")]
    pub hostname: String,
    #[prost(string, tag = "6")]
    pub agent_version: String,
    #[prost(string, tag = "7")]
    pub service_version: String,
    #[prost(string, tag = "8")]
    pub runtime_version: String,
    #[prost(string, tag = "9")]
    pub uname: String,
    #[prost(string, tag = "11")]
    pub executable_schema_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatsContext {
    #[prost(string, tag = "2")]
    pub client_name: String,
    #[prost(string, tag = "3")]
    pub client_version: String,
    #[prost(string, tag = "4")]
    pub client_reference_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PathErrorStats {
    #[prost(map = "string, message", tag = "1")]
    pub children: HashMap<String, PathErrorStats>,
    #[prost(uint64, tag = "4")]
    pub errors_count: u64,
    #[prost(uint64, tag = "5")]
    pub requests_with_errors_count: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryLatencyStats {
    #[prost(sint64, repeated, tag = "13")]
    pub latency_count: Vec<i64>,
    #[prost(uint64, tag = "2")]
    pub request_count: u64,
    #[prost(uint64, tag = "3")]
    pub cache_hits: u64,
    #[prost(uint64, tag = "4")]
    pub persisted_query_hits: u64,
    #[prost(uint64, tag = "5")]
    pub persisted_query_misses: u64,
    #[prost(sint64, repeated, tag = "14")]
    pub cache_latency_count: Vec<i64>,
    #[prost(message, optional, tag = "7")]
    pub root_error_stats: Option<PathErrorStats>,
    #[prost(uint64, tag = "8")]
    pub requests_with_errors_count: u64,
    #[prost(sint64, repeated, tag = "15")]
    pub public_cache_ttl_count: Vec<i64>,
    #[prost(sint64, repeated, tag = "16")]
    pub private_cache_ttl_count: Vec<i64>,
    #[prost(uint64, tag = "11")]
    pub registered_operation_count: u64,
    #[prost(uint64, tag = "12")]
    pub forbidden_operation_count: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldStat {
    #[prost(string, tag = "3")]
    pub return_type: String,
    #[prost(uint64, tag = "4")]
    pub errors_count: u64,
    #[prost(uint64, tag = "5")]
    pub count: u64,
    #[prost(uint64, tag = "6")]
    pub requests_with_errors_count: u64,
    #[prost(sint64, repeated, tag = "9")]
    pub latency_count: Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypeStat {
    #[prost(map = "string, message", tag = "3")]
    pub per_field_stat: HashMap<String, FieldStat>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContextualizedStats {
    #[prost(message, optional, tag = "1")]
    pub context: Option<StatsContext>,
    #[prost(message, optional, tag = "2")]
    pub query_latency_stats: Option<QueryLatencyStats>,
    #[prost(map = "string, message", tag = "3")]
    pub per_type_stat: HashMap<String, TypeStat>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TracesAndStats {
    /// Pre-encoded `Trace` messages; an embedded message and a `bytes` field
    /// share the same wire representation.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub trace: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "2")]
    pub stats_with_context: Vec<ContextualizedStats>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Report {
    #[prost(message, optional, tag = "1")]
    pub header: Option<ReportHeader>,
    #[prost(map = "string, message", tag = "5")]
    pub traces_per_query: HashMap<String, TracesAndStats>,
    #[prost(message, optional, tag = "2")]
    pub end_time: Option<::prost_types::Timestamp>,
}
