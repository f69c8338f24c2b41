//! Status line formatting
//!
//! The status line is the most important piece of text a plugin prints: it
//! should lead directly to the problem. The defaults are usable for most
//! checks; plugins with a lot of metrics usually want their own `Summary`.

use crate::result::Results;
use crate::ServiceState;

/// Turns check results into human-readable text
pub trait Summary: Send {
    /// Status line when the overall state is `ok`
    fn ok(&self, results: &Results) -> String {
        results.get(0).map(|r| r.to_string()).unwrap_or_default()
    }

    /// Status line when the overall state is anything but `ok`
    fn problem(&self, results: &Results) -> String {
        results
            .first_significant()
            .map(|r| r.to_string())
            .unwrap_or_default()
    }

    /// Additional lines in verbose mode, one per non-ok result
    fn verbose(&self, results: &Results) -> Vec<String> {
        results
            .iter()
            .filter(|r| r.state != ServiceState::Ok)
            .map(|r| format!("{}: {}", r.state, r))
            .collect()
    }

    /// Status line when there are no results at all
    fn empty(&self) -> String {
        "no check results".to_owned()
    }
}

/// The summary checks use unless they are given another one
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSummary;

impl Summary for DefaultSummary {}
