//! Monitoring Plugin: strongly typed Nagios plugins
//!
//! The goal is to make it easy to write checks that follow the
//! [monitoring plugin API](https://www.monitoring-plugins.org/doc/guidelines.html)
//! without re-implementing threshold parsing, status aggregation and output
//! formatting in every script.
//!
//! A check is assembled from a few pieces:
//!
//! * [`Resource`](resource/trait.Resource.html)s probe the system and emit
//!   [`Metric`](metric/struct.Metric.html)s
//! * [`Context`](context/trait.Context.html)s evaluate metrics into
//!   [`CheckResult`](result/struct.CheckResult.html)s and performance data
//! * a [`Summary`](summary/trait.Summary.html) turns the results into the
//!   status line
//! * the [`Check`](check/struct.Check.html) controller runs all of the above,
//!   and the [`Runtime`](runtime/struct.Runtime.html) prints the result and
//!   exits with the right status
//!
//! ```rust,no_run
//! use monitoring_plugin::{Check, Metric, Metrics, Resource, Result};
//!
//! struct World;
//!
//! impl Resource for World {
//!     fn probe(&self) -> Result<Metrics<'_>> {
//!         Ok(Metric::new("world", true).with_context("null").into())
//!     }
//! }
//!
//! fn main() {
//!     let mut check = Check::new();
//!     check.add_resource(World);
//!     check.main(None, None);
//! }
//! ```

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate tracing;

use std::fmt;
use std::process;
use std::str::FromStr;

pub mod check;
pub mod cli;
pub mod context;
pub mod cookie;
pub mod error;
pub mod logtail;
pub mod metric;
pub mod multiarg;
pub mod output;
pub mod performance;
pub mod range;
pub mod resource;
pub mod result;
pub mod runtime;
pub mod summary;

pub use crate::check::{Check, Component};
pub use crate::cli::CommonArgs;
pub use crate::context::{
    Context, Contexts, Evaluation, GenericContext, MetricFormat, ResultFn, ScalarContext,
};
pub use crate::cookie::Cookie;
pub use crate::error::{Error, Result};
pub use crate::logtail::LogTail;
pub use crate::metric::{Metric, Value};
pub use crate::multiarg::MultiArg;
pub use crate::performance::Performance;
pub use crate::range::Range;
pub use crate::resource::{Metrics, Resource};
pub use crate::result::{CheckResult, RenderFn, Results};
pub use crate::runtime::{guarded, LogBuffer, Report, Runtime};
pub use crate::summary::{DefaultSummary, Summary};

/// The outcome of a check, ordered by significance
///
/// `Ok < Warning < Critical < Unknown`, so `max` picks the state that should
/// be reported.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// The exit code mandated by the plugin API
    pub fn code(self) -> i32 {
        use self::ServiceState::*;
        match self {
            Ok => 0,
            Warning => 1,
            Critical => 2,
            Unknown => 3,
        }
    }

    /// Short lowercase name, e.g. `warning`
    pub fn text(self) -> &'static str {
        use self::ServiceState::*;
        match self {
            Ok => "ok",
            Warning => "warning",
            Critical => "critical",
            Unknown => "unknown",
        }
    }

    /// Look a state up by its exit code
    pub fn from_code(code: i32) -> Option<ServiceState> {
        use self::ServiceState::*;
        match code {
            0 => Some(Ok),
            1 => Some(Warning),
            2 => Some(Critical),
            3 => Some(Unknown),
            _ => None,
        }
    }

    pub fn str_values() -> [&'static str; 4] {
        ["ok", "warning", "critical", "unknown"]
    }

    #[cfg_attr(test, allow(dead_code))]
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }
}

impl Default for ServiceState {
    fn default() -> ServiceState {
        ServiceState::Ok
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> ::std::result::Result<ServiceState, String> {
        match s {
            "ok" => Ok(ServiceState::Ok),
            "warn" | "warning" => Ok(ServiceState::Warning),
            "critical" => Ok(ServiceState::Critical),
            "unknown" => Ok(ServiceState::Unknown),
            _ => Err(format!(
                "Unexpected service state '{}', expected one of: {}",
                s,
                ServiceState::str_values().join(", ")
            )),
        }
    }
}

/// Reduce `states` to the most significant one
///
/// An empty sequence is `Ok`.
pub fn worst<I>(states: I) -> ServiceState
where
    I: IntoIterator<Item = ServiceState>,
{
    states.into_iter().fold(ServiceState::Ok, ::std::cmp::max)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::ServiceState::{Critical, Unknown, Warning};
    use super::{worst, ServiceState};

    const OK: ServiceState = ServiceState::Ok;

    #[test]
    fn states_are_ordered_by_code() {
        assert!(OK < Warning);
        assert!(Warning < Critical);
        assert!(Critical < Unknown);
        for state in &[OK, Warning, Critical, Unknown] {
            assert_eq!(ServiceState::from_code(state.code()), Some(*state));
        }
        assert_eq!(ServiceState::from_code(70), None);
    }

    #[test]
    fn worst_of_nothing_is_ok() {
        assert_eq!(worst(Vec::<ServiceState>::new()), OK);
    }

    #[test]
    fn worst_picks_most_significant() {
        assert_eq!(worst(vec![OK, Critical, Warning]), Critical);
        assert_eq!(worst(vec![Unknown, OK]), Unknown);
        assert_eq!(worst(vec![Warning, Warning]), Warning);
    }

    #[test]
    fn display_and_parse() {
        assert_eq!(Warning.to_string(), "warning");
        assert_eq!("warn".parse::<ServiceState>(), Ok(Warning));
        assert!("bad".parse::<ServiceState>().is_err());
    }

    fn any_state() -> impl Strategy<Value = ServiceState> {
        prop_oneof![Just(OK), Just(Warning), Just(Critical), Just(Unknown)]
    }

    proptest! {
        #[test]
        fn worst_ignores_order(mut states in proptest::collection::vec(any_state(), 0..12)) {
            let forward = worst(states.clone());
            states.reverse();
            prop_assert_eq!(forward, worst(states.clone()));
            states.sort();
            prop_assert_eq!(forward, worst(states.clone()));
            prop_assert_eq!(forward, worst(vec![forward, forward]));
        }
    }
}
