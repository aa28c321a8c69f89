//! Walking every node of a trace, including the traces of subgraph fetches.
use std::ops::ControlFlow;

use crate::trace::Node;
use crate::trace::QueryPlanNode;
use crate::trace::Trace;

/// The response names leading to a node, as a linked list living on the stack
/// of the walk.
///
/// List indexes are never part of the path: for error statistics `foo.3.bar`
/// and `foo.5.bar` are the same place. Nodes inside a subgraph fetch are
/// rooted under a `service:<subgraph name>` segment.
#[derive(Debug, Clone, Copy)]
pub enum ResponseNamePath<'a> {
    /// The walk was started without path tracking; nothing is recorded.
    NotCollecting,
    Root,
    Child {
        response_name: &'a str,
        prev: &'a ResponseNamePath<'a>,
    },
}

impl<'a> ResponseNamePath<'a> {
    fn new(include_path: bool) -> Self {
        if include_path {
            ResponseNamePath::Root
        } else {
            ResponseNamePath::NotCollecting
        }
    }

    pub fn is_collecting(&self) -> bool {
        !matches!(self, ResponseNamePath::NotCollecting)
    }

    pub fn child<'b>(&'b self, response_name: &'b str) -> ResponseNamePath<'b> {
        match self {
            ResponseNamePath::NotCollecting => ResponseNamePath::NotCollecting,
            _ => ResponseNamePath::Child {
                response_name,
                prev: self,
            },
        }
    }

    /// Materializes the path from the root down.
    ///
    /// # Panics
    ///
    /// If the walk was started without path tracking.
    pub fn to_vec(&self) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut current = self;
        loop {
            match current {
                ResponseNamePath::NotCollecting => panic!("not collecting paths!"),
                ResponseNamePath::Root => break,
                ResponseNamePath::Child {
                    response_name,
                    prev,
                } => {
                    out.push(*response_name);
                    current = *prev;
                }
            }
        }
        out.reverse();
        out
    }
}

/// Calls `f` on every node of the trace: first the `root` tree, depth first
/// with parents before children, then the roots of every subgraph fetch of the
/// query plan in declaration order.
///
/// The walk stops as soon as `f` breaks. When `include_path` is false no path
/// is built, and reading the path in `f` panics.
pub fn iterate_over_trace_for_stats<F>(trace: &Trace, include_path: bool, mut f: F)
where
    F: FnMut(&Node, &ResponseNamePath<'_>) -> ControlFlow<()>,
{
    let root_path = ResponseNamePath::new(include_path);
    let _ = iterate_over_trace(trace, &root_path, &mut f);
}

fn iterate_over_trace<F>(
    trace: &Trace,
    root_path: &ResponseNamePath<'_>,
    f: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(&Node, &ResponseNamePath<'_>) -> ControlFlow<()>,
{
    if let Some(root) = &trace.root {
        iterate_over_trace_node(root, root_path, f)?;
    }
    if let Some(query_plan) = &trace.query_plan {
        iterate_over_query_plan(query_plan, root_path, f)?;
    }
    ControlFlow::Continue(())
}

fn iterate_over_query_plan<F>(
    node: &QueryPlanNode,
    root_path: &ResponseNamePath<'_>,
    f: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(&Node, &ResponseNamePath<'_>) -> ControlFlow<()>,
{
    match node {
        QueryPlanNode::Fetch(fetch) => {
            let service_name = fetch
                .service_name
                .as_deref()
                .filter(|name| !name.is_empty());
            let root = fetch.trace.as_ref().and_then(|trace| trace.root.as_ref());
            match (root, service_name) {
                (Some(root), Some(service_name)) if root_path.is_collecting() => {
                    let segment = format!("service:{service_name}");
                    iterate_over_trace_node(root, &root_path.child(&segment), f)
                }
                (Some(root), Some(_)) => iterate_over_trace_node(root, root_path, f),
                _ => ControlFlow::Continue(()),
            }
        }
        QueryPlanNode::Flatten(node) => iterate_over_query_plan(node, root_path, f),
        QueryPlanNode::Parallel(nodes) | QueryPlanNode::Sequence(nodes) => nodes
            .iter()
            .try_for_each(|node| iterate_over_query_plan(node, root_path, f)),
    }
}

fn iterate_over_trace_node<F>(
    node: &Node,
    path: &ResponseNamePath<'_>,
    f: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(&Node, &ResponseNamePath<'_>) -> ControlFlow<()>,
{
    // Breaking on a node also skips its children
    f(node, path)?;

    node.children
        .iter()
        .try_for_each(|child| match &child.response_name {
            Some(response_name) if !response_name.is_empty() => {
                iterate_over_trace_node(child, &path.child(response_name), f)
            }
            _ => iterate_over_trace_node(child, path, f),
        })
}

/// Whether any node of the trace, or of the traces of its subgraph fetches,
/// has at least one error. Stops at the first error found.
pub fn trace_has_errors(trace: &Trace) -> bool {
    has_errors_inspecting(trace, |_| {})
}

fn has_errors_inspecting<F>(trace: &Trace, mut inspect: F) -> bool
where
    F: FnMut(&Node),
{
    let mut has_errors = false;
    iterate_over_trace_for_stats(trace, false, |node, _| {
        inspect(node);
        if node.errors.is_empty() {
            ControlFlow::Continue(())
        } else {
            has_errors = true;
            ControlFlow::Break(())
        }
    });
    has_errors
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn trace(value: serde_json::Value) -> Trace {
        serde_json::from_value(value).unwrap()
    }

    fn federated_trace() -> Trace {
        trace(json!({
            "root": {
                "child": [
                    { "responseName": "top" }
                ]
            },
            "queryPlan": {
                "sequence": [
                    { "fetch": {
                        "serviceName": "accounts",
                        "trace": { "root": { "child": [
                            { "responseName": "me", "child": [
                                { "responseName": "name" }
                            ] }
                        ] } }
                    } },
                    { "flatten": { "parallel": [
                        { "fetch": {
                            "serviceName": "reviews",
                            "trace": { "root": { "child": [
                                { "responseName": "_entities", "child": [
                                    { "index": 0, "child": [
                                        { "responseName": "reviews" }
                                    ] }
                                ] }
                            ] } }
                        } },
                        { "fetch": { "serviceName": "inventory" } },
                        { "fetch": {
                            "trace": { "root": { "child": [
                                { "responseName": "unnamed" }
                            ] } }
                        } }
                    ] } }
                ]
            }
        }))
    }

    fn collect_paths(trace: &Trace) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        iterate_over_trace_for_stats(trace, true, |_, path| {
            paths.push(path.to_vec().into_iter().map(String::from).collect());
            ControlFlow::Continue(())
        });
        paths
    }

    #[test]
    fn it_walks_root_then_query_plan_in_order() {
        let paths = collect_paths(&federated_trace());
        let expected: Vec<Vec<&str>> = vec![
            vec![],
            vec!["top"],
            vec!["service:accounts"],
            vec!["service:accounts", "me"],
            vec!["service:accounts", "me", "name"],
            vec!["service:reviews"],
            vec!["service:reviews", "_entities"],
            // list elements do not extend the path
            vec!["service:reviews", "_entities"],
            vec!["service:reviews", "_entities", "reviews"],
        ];
        assert_eq!(paths, expected);
    }

    #[test]
    fn it_records_response_names_under_root() {
        let trace = trace(json!({
            "root": { "child": [
                { "responseName": "bar" },
                { "responseName": "foo" }
            ] }
        }));
        let mut foo_path = None;
        iterate_over_trace_for_stats(&trace, true, |node, path| {
            if node.response_name.as_deref() == Some("foo") {
                foo_path = Some(path.to_vec().join("."));
            }
            ControlFlow::Continue(())
        });
        assert_eq!(foo_path.as_deref(), Some("foo"));
    }

    #[test]
    fn it_stops_as_soon_as_the_visitor_breaks() {
        let mut visited = Vec::new();
        iterate_over_trace_for_stats(&federated_trace(), true, |node, _| {
            visited.push(node.response_name.clone());
            if node.response_name.as_deref() == Some("me") {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(
            visited,
            vec![
                None,
                Some("top".to_string()),
                None,
                Some("me".to_string()),
            ]
        );
    }

    #[test]
    fn it_does_not_build_paths_when_not_asked_to() {
        let mut visited = 0;
        iterate_over_trace_for_stats(&federated_trace(), false, |_, path| {
            assert!(!path.is_collecting());
            visited += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(visited, 9);
    }

    #[test]
    #[should_panic(expected = "not collecting paths!")]
    fn it_panics_when_reading_an_uncollected_path() {
        iterate_over_trace_for_stats(&federated_trace(), false, |_, path| {
            path.to_vec();
            ControlFlow::Continue(())
        });
    }

    #[test]
    fn it_detects_errors() {
        assert!(!trace_has_errors(&federated_trace()));
        assert!(!trace_has_errors(&Trace::default()));

        let root_error = trace(json!({
            "root": { "child": [
                { "responseName": "a", "error": [{ "message": "nope" }] }
            ] }
        }));
        assert!(trace_has_errors(&root_error));

        let subgraph_error = trace(json!({
            "queryPlan": { "parallel": [
                { "fetch": { "serviceName": "a" } },
                { "flatten": { "fetch": {
                    "serviceName": "b",
                    "trace": { "root": { "child": [
                        { "index": 1, "error": [{ "message": "nope" }] }
                    ] } }
                } } }
            ] }
        }));
        assert!(trace_has_errors(&subgraph_error));
    }

    #[test]
    fn it_stops_at_the_first_error() {
        let trace = trace(json!({
            "root": { "child": [
                { "responseName": "a" }
            ] },
            "queryPlan": { "sequence": [
                { "fetch": {
                    "serviceName": "accounts",
                    "trace": { "root": { "child": [
                        { "responseName": "me", "error": [{ "message": "first" }] },
                        { "responseName": "friends" }
                    ] } }
                } },
                { "fetch": {
                    "serviceName": "reviews",
                    "trace": { "root": { "child": [
                        { "responseName": "reviews", "error": [{ "message": "second" }] }
                    ] } }
                } }
            ] }
        }));

        let mut walked = Vec::new();
        iterate_over_trace_for_stats(&trace, false, |node, _| {
            walked.push(node.response_name.clone());
            ControlFlow::Continue(())
        });
        assert_eq!(walked.len(), 7);

        let mut inspected = Vec::new();
        let has_errors = has_errors_inspecting(&trace, |node| {
            inspected.push(node.response_name.clone());
        });
        assert!(has_errors);
        assert_eq!(inspected, walked[..4]);
        assert_eq!(inspected.last(), Some(&Some("me".to_string())));
    }
}
