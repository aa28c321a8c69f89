use std::collections::HashMap;
use std::ops::AddAssign;
use std::time::SystemTime;

use serde::Serialize;

use crate::proto;
use crate::studio::StatsByContext;
use crate::trace::Trace;

/// Everything recorded during one reporting interval.
///
/// Operations are keyed by their stats report key, which callers derive from
/// the operation name and normalized signature (for example
/// `"# GetUser\nquery GetUser{user{id}}"`). The key is treated as opaque.
///
/// A report is not synchronized: callers accumulating from several threads
/// either serialize access or build one report per worker and merge them with
/// `+=` before finalizing.
#[derive(Debug)]
pub struct Report {
    header: proto::ReportHeader,
    traces_per_query: HashMap<String, TracesAndStats>,
    end_time: Option<SystemTime>,
}

impl Report {
    pub fn new(header: proto::ReportHeader) -> Self {
        Self {
            header,
            traces_per_query: HashMap::new(),
            end_time: None,
        }
    }

    pub fn header(&self) -> &proto::ReportHeader {
        &self.header
    }

    /// Returns the traces and statistics recorded for `stats_report_key`,
    /// creating an empty entry on first use.
    pub fn traces_and_stats_by_stats_report_key(
        &mut self,
        stats_report_key: &str,
    ) -> &mut TracesAndStats {
        if !self.traces_per_query.contains_key(stats_report_key) {
            tracing::debug!(%stats_report_key, "adding new stats report key");
        }
        self.traces_per_query
            .entry(stats_report_key.to_string())
            .or_default()
    }

    pub fn get(&self, stats_report_key: &str) -> Option<&TracesAndStats> {
        self.traces_per_query.get(stats_report_key)
    }

    /// Number of distinct stats report keys.
    pub fn len(&self) -> usize {
        self.traces_per_query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces_per_query.is_empty()
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    pub fn set_end_time(&mut self, end_time: SystemTime) {
        self.end_time = Some(end_time);
    }

    /// Converts the report to its wire form. The end time is stamped now
    /// unless it was set already.
    pub fn into_proto(self) -> proto::Report {
        let end_time = self.end_time.unwrap_or_else(SystemTime::now);
        tracing::debug!(
            stats_report_keys = self.traces_per_query.len(),
            traces = self
                .traces_per_query
                .values()
                .map(|traces_and_stats| traces_and_stats.trace.len())
                .sum::<usize>(),
            "finalizing usage report"
        );

        proto::Report {
            header: Some(self.header),
            traces_per_query: self
                .traces_per_query
                .into_iter()
                .map(|(key, traces_and_stats)| (key, traces_and_stats.into()))
                .collect(),
            end_time: Some(end_time.into()),
        }
    }
}

impl AddAssign for Report {
    fn add_assign(&mut self, report: Report) {
        for (key, traces_and_stats) in report.traces_per_query {
            *self.traces_per_query.entry(key).or_default() += traces_and_stats;
        }
    }
}

/// The traces and statistics of one stats report key.
///
/// The same operation may be both stored as a full trace and aggregated into
/// statistics.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct TracesAndStats {
    /// Protobuf encoded traces, uploaded as they are.
    pub trace: Vec<Vec<u8>>,
    pub stats_with_context: StatsByContext,
}

impl TracesAndStats {
    /// Stores the full trace for upload.
    pub fn add_trace(&mut self, trace: &Trace) {
        self.trace.push(trace.encode_to_vec());
    }
}

impl AddAssign for TracesAndStats {
    fn add_assign(&mut self, stats: TracesAndStats) {
        self.trace.extend(stats.trace);
        self.stats_with_context += stats.stats_with_context;
    }
}

impl From<TracesAndStats> for proto::TracesAndStats {
    fn from(stats: TracesAndStats) -> Self {
        Self {
            trace: stats.trace,
            stats_with_context: stats.stats_with_context.into(),
        }
    }
}
