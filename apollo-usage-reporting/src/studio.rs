use std::collections::HashMap;
use std::ops::AddAssign;
use std::ops::ControlFlow;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use crate::duration_histogram::saturating_ns;
use crate::duration_histogram::DurationHistogram;
use crate::iterate::iterate_over_trace_for_stats;
use crate::proto;
use crate::trace::CacheScope;
use crate::trace::Trace;

/// The client identity statistics are grouped by.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StatsContext {
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub client_reference_id: Option<String>,
}

impl StatsContext {
    pub fn from_trace(trace: &Trace) -> Self {
        Self {
            client_name: trace.client_name.clone(),
            client_version: trace.client_version.clone(),
            client_reference_id: trace.client_reference_id.clone(),
        }
    }
}

/// Statistics of one operation shape, bucketed by client identity.
///
/// Buckets keep the order in which their client was first seen.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct StatsByContext {
    #[serde(with = "vectorize")]
    map: IndexMap<StatsContext, ContextualizedStats>,
}

impl StatsByContext {
    pub fn add_trace(&mut self, trace: &Trace) {
        self.map
            .entry(StatsContext::from_trace(trace))
            .or_insert_with_key(|context| {
                tracing::debug!(
                    client_name = ?context.client_name,
                    client_version = ?context.client_version,
                    "adding stats bucket for new client"
                );
                ContextualizedStats::new(context.clone())
            })
            .add_trace(trace);
    }

    pub fn get(&self, context: &StatsContext) -> Option<&ContextualizedStats> {
        self.map.get(context)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextualizedStats> {
        self.map.values()
    }

    /// The buckets in the shape the wire format expects.
    pub fn to_array(&self) -> Vec<proto::ContextualizedStats> {
        self.map.values().cloned().map_into().collect()
    }
}

impl AddAssign for StatsByContext {
    fn add_assign(&mut self, other: StatsByContext) {
        for (context, stats) in other.map {
            match self.map.get_mut(&context) {
                Some(existing) => *existing += stats,
                None => {
                    self.map.insert(context, stats);
                }
            }
        }
    }
}

/// Everything recorded about the traces of one client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextualizedStats {
    pub context: StatsContext,
    pub query_latency_stats: QueryLatencyStats,
    pub per_type_stat: HashMap<String, TypeStat>,
}

impl ContextualizedStats {
    pub fn new(context: StatsContext) -> Self {
        Self {
            context,
            query_latency_stats: QueryLatencyStats::default(),
            per_type_stat: HashMap::new(),
        }
    }

    pub fn add_trace(&mut self, trace: &Trace) {
        let latency_stats = &mut self.query_latency_stats;
        latency_stats.request_count += 1;
        if trace.full_query_cache_hit {
            latency_stats
                .cache_latency_count
                .increment_duration(saturating_ns(trace.duration_ns));
            latency_stats.cache_hits += 1;
        } else {
            latency_stats
                .latency_count
                .increment_duration(saturating_ns(trace.duration_ns));
        }

        // Cache TTLs are only recorded for cache misses, where the TTL was
        // computed by the backend.
        if !trace.full_query_cache_hit {
            if let Some((scope, max_age_ns)) = trace
                .cache_policy
                .as_ref()
                .and_then(|policy| policy.max_age_ns.map(|max_age| (policy.scope, max_age)))
            {
                match scope {
                    CacheScope::Private => latency_stats
                        .private_cache_ttl_count
                        .increment_duration(max_age_ns),
                    CacheScope::Public => latency_stats
                        .public_cache_ttl_count
                        .increment_duration(max_age_ns),
                    CacheScope::Unknown => {}
                }
            }
        }

        if trace.persisted_query_hit {
            latency_stats.persisted_query_hits += 1;
        }
        if trace.persisted_query_register {
            latency_stats.persisted_query_misses += 1;
        }
        if trace.forbidden_operation {
            latency_stats.forbidden_operation_count += 1;
        }
        if trace.registered_operation {
            latency_stats.registered_operation_count += 1;
        }

        let mut has_errors = false;
        let root_error_stats = &mut latency_stats.root_error_stats;
        let per_type_stat = &mut self.per_type_stat;

        iterate_over_trace_for_stats(trace, true, |node, path| {
            let errors_count = node.errors.len() as u64;
            if errors_count > 0 {
                has_errors = true;

                let mut path_error_stats = &mut *root_error_stats;
                for response_name in path.to_vec() {
                    path_error_stats = path_error_stats
                        .children
                        .entry(response_name.to_string())
                        .or_default();
                }
                path_error_stats.requests_with_errors_count += 1;
                path_error_stats.errors_count += errors_count;
            }

            match node.field_record() {
                Some(record) => {
                    let field_stat = per_type_stat
                        .entry(record.parent_type.to_string())
                        .or_default()
                        .per_field_stat
                        .entry(record.field_name.to_string())
                        .or_insert_with(|| FieldStat::new(record.return_type.to_string()));

                    field_stat.errors_count += errors_count;
                    field_stat.count += 1;
                    // This counts resolver calls with at least one error, not
                    // operations with an error in this field.
                    field_stat.requests_with_errors_count += (errors_count > 0) as u64;
                    field_stat
                        .latency_count
                        .increment_duration(saturating_ns(record.duration_ns));
                }
                None if node.field_name().is_some() => {
                    tracing::trace!(
                        field_name = ?node.field_name(),
                        "skipping incomplete node in field statistics"
                    );
                }
                None => {}
            }

            ControlFlow::Continue(())
        });

        if has_errors {
            latency_stats.requests_with_errors_count += 1;
        }
    }
}

impl AddAssign for ContextualizedStats {
    fn add_assign(&mut self, stats: ContextualizedStats) {
        self.query_latency_stats += stats.query_latency_stats;
        for (k, v) in stats.per_type_stat {
            *self.per_type_stat.entry(k).or_default() += v;
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct QueryLatencyStats {
    pub latency_count: DurationHistogram,
    pub request_count: u64,
    pub cache_hits: u64,
    pub persisted_query_hits: u64,
    pub persisted_query_misses: u64,
    pub cache_latency_count: DurationHistogram,
    pub root_error_stats: PathErrorStats,
    pub requests_with_errors_count: u64,
    pub public_cache_ttl_count: DurationHistogram,
    pub private_cache_ttl_count: DurationHistogram,
    pub registered_operation_count: u64,
    pub forbidden_operation_count: u64,
}

impl AddAssign for QueryLatencyStats {
    fn add_assign(&mut self, stats: QueryLatencyStats) {
        self.latency_count += stats.latency_count;
        self.request_count += stats.request_count;
        self.cache_hits += stats.cache_hits;
        self.persisted_query_hits += stats.persisted_query_hits;
        self.persisted_query_misses += stats.persisted_query_misses;
        self.cache_latency_count += stats.cache_latency_count;
        self.root_error_stats += stats.root_error_stats;
        self.requests_with_errors_count += stats.requests_with_errors_count;
        self.public_cache_ttl_count += stats.public_cache_ttl_count;
        self.private_cache_ttl_count += stats.private_cache_ttl_count;
        self.registered_operation_count += stats.registered_operation_count;
        self.forbidden_operation_count += stats.forbidden_operation_count;
    }
}

/// Error counts by response path. Nodes only exist where an error was seen.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct PathErrorStats {
    pub children: HashMap<String, PathErrorStats>,
    pub errors_count: u64,
    pub requests_with_errors_count: u64,
}

impl AddAssign for PathErrorStats {
    fn add_assign(&mut self, stats: PathErrorStats) {
        for (k, v) in stats.children {
            *self.children.entry(k).or_default() += v;
        }
        self.errors_count += stats.errors_count;
        self.requests_with_errors_count += stats.requests_with_errors_count;
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct TypeStat {
    pub per_field_stat: HashMap<String, FieldStat>,
}

impl AddAssign for TypeStat {
    fn add_assign(&mut self, stat: TypeStat) {
        for (k, v) in stat.per_field_stat {
            match self.per_field_stat.get_mut(&k) {
                Some(existing) => *existing += v,
                None => {
                    self.per_field_stat.insert(k, v);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStat {
    /// Taken from the first observation of the field; later observations
    /// never change it.
    pub return_type: String,
    pub errors_count: u64,
    pub count: u64,
    pub requests_with_errors_count: u64,
    pub latency_count: DurationHistogram,
}

impl FieldStat {
    pub fn new(return_type: String) -> Self {
        Self {
            return_type,
            errors_count: 0,
            count: 0,
            requests_with_errors_count: 0,
            latency_count: DurationHistogram::default(),
        }
    }
}

impl AddAssign for FieldStat {
    fn add_assign(&mut self, stat: FieldStat) {
        self.errors_count += stat.errors_count;
        self.count += stat.count;
        self.requests_with_errors_count += stat.requests_with_errors_count;
        self.latency_count += stat.latency_count;
    }
}

impl From<StatsContext> for proto::StatsContext {
    fn from(context: StatsContext) -> Self {
        Self {
            client_name: context.client_name.unwrap_or_default(),
            client_version: context.client_version.unwrap_or_default(),
            client_reference_id: context.client_reference_id.unwrap_or_default(),
        }
    }
}

impl From<ContextualizedStats> for proto::ContextualizedStats {
    fn from(stats: ContextualizedStats) -> Self {
        Self {
            per_type_stat: stats
                .per_type_stat
                .into_iter()
                .map(|(k, v)| (k, v.into()))
                .collect(),
            query_latency_stats: Some(stats.query_latency_stats.into()),
            context: Some(stats.context.into()),
        }
    }
}

impl From<StatsByContext> for Vec<proto::ContextualizedStats> {
    fn from(stats: StatsByContext) -> Self {
        stats.map.into_values().map_into().collect()
    }
}

impl From<QueryLatencyStats> for proto::QueryLatencyStats {
    fn from(stats: QueryLatencyStats) -> Self {
        Self {
            latency_count: stats.latency_count.to_array(),
            request_count: stats.request_count,
            cache_hits: stats.cache_hits,
            persisted_query_hits: stats.persisted_query_hits,
            persisted_query_misses: stats.persisted_query_misses,
            cache_latency_count: stats.cache_latency_count.to_array(),
            root_error_stats: Some(stats.root_error_stats.into()),
            requests_with_errors_count: stats.requests_with_errors_count,
            public_cache_ttl_count: stats.public_cache_ttl_count.to_array(),
            private_cache_ttl_count: stats.private_cache_ttl_count.to_array(),
            registered_operation_count: stats.registered_operation_count,
            forbidden_operation_count: stats.forbidden_operation_count,
        }
    }
}

impl From<PathErrorStats> for proto::PathErrorStats {
    fn from(stats: PathErrorStats) -> Self {
        Self {
            children: stats
                .children
                .into_iter()
                .map(|(k, v)| (k, v.into()))
                .collect(),
            errors_count: stats.errors_count,
            requests_with_errors_count: stats.requests_with_errors_count,
        }
    }
}

impl From<TypeStat> for proto::TypeStat {
    fn from(stat: TypeStat) -> Self {
        Self {
            per_field_stat: stat
                .per_field_stat
                .into_iter()
                .map(|(k, v)| (k, v.into()))
                .collect(),
        }
    }
}

impl From<FieldStat> for proto::FieldStat {
    fn from(stat: FieldStat) -> Self {
        Self {
            return_type: stat.return_type,
            errors_count: stat.errors_count,
            count: stat.count,
            requests_with_errors_count: stat.requests_with_errors_count,
            latency_count: stat.latency_count.to_array(),
        }
    }
}

pub(crate) mod vectorize {
    use serde::Serialize;
    use serde::Serializer;

    pub(crate) fn serialize<'a, T, K, V, S>(target: T, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: IntoIterator<Item = (&'a K, &'a V)>,
        K: Serialize + 'a,
        V: Serialize + 'a,
    {
        let container: Vec<_> = target.into_iter().collect();
        serde::Serialize::serialize(&container, ser)
    }
}
