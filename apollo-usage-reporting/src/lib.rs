//! Aggregation of GraphQL execution traces into Apollo usage-reporting
//! statistics.
//!
//! For every completed operation the caller picks the [`TracesAndStats`] of
//! the operation's stats report key in the current [`Report`], then stores the
//! full trace, aggregates it into statistics, or both:
//!
//! ```ignore
//! let traces_and_stats = report.traces_and_stats_by_stats_report_key(&key);
//! if sampled {
//!     traces_and_stats.add_trace(&trace);
//! }
//! traces_and_stats.stats_with_context.add_trace(&trace);
//! ```
//!
//! At the end of the reporting interval [`Report::into_proto`] produces the
//! wire message. Sending it is left to the caller.

#![warn(unreachable_pub)]

pub mod config;
pub mod duration_histogram;
pub mod error;
pub mod iterate;
pub mod proto;
pub mod report;
pub mod studio;
pub mod trace;

pub use crate::config::Config;
pub use crate::duration_histogram::DurationHistogram;
pub use crate::error::Error;
pub use crate::iterate::iterate_over_trace_for_stats;
pub use crate::iterate::trace_has_errors;
pub use crate::iterate::ResponseNamePath;
pub use crate::report::Report;
pub use crate::report::TracesAndStats;
pub use crate::studio::ContextualizedStats;
pub use crate::studio::StatsByContext;
pub use crate::studio::StatsContext;
pub use crate::trace::Trace;
