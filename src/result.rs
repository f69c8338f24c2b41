//! Outcomes of metric evaluation

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::resource::Resource;
use crate::ServiceState;

/// Renders a result in place of the default text
pub type RenderFn = Arc<dyn Fn(&CheckResult) -> String + Send + Sync>;

/// The state of one metric, and why
#[derive(Clone)]
pub struct CheckResult {
    pub state: ServiceState,
    /// Reason for the state, e.g. the range that was violated
    pub hint: Option<String>,
    /// The evaluated metric, absent for results of aborted resources
    pub metric: Option<Metric>,
    render: Option<RenderFn>,
}

impl CheckResult {
    pub fn new(state: ServiceState, hint: Option<String>, metric: Option<Metric>) -> CheckResult {
        CheckResult {
            state,
            hint,
            metric,
            render: None,
        }
    }

    /// Display this result with `render`, which replaces description and
    /// hint in the status line and the verbose output
    pub fn with_render<F>(mut self, render: F) -> CheckResult
    where
        F: Fn(&CheckResult) -> String + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    /// Metric description and hint, ignoring any custom renderer
    pub fn plain(&self) -> String {
        let description = self.metric.as_ref().and_then(|m| m.description());
        match (description, self.hint.as_ref()) {
            (Some(desc), Some(hint)) => format!("{} ({})", desc, hint),
            (None, Some(hint)) => hint.clone(),
            (Some(desc), None) => desc,
            (None, None) => String::new(),
        }
    }

    /// The resource that produced the metric
    pub fn resource(&self) -> Option<&Arc<dyn Resource>> {
        self.metric.as_ref().and_then(|m| m.resource())
    }

    /// The context that evaluated the metric
    pub fn context(&self) -> Option<&Arc<dyn Context>> {
        self.metric.as_ref().and_then(|m| m.context_obj())
    }
}

impl PartialEq for CheckResult {
    /// Renderers are not compared
    fn eq(&self, other: &CheckResult) -> bool {
        self.state == other.state && self.hint == other.hint && self.metric == other.metric
    }
}

impl fmt::Debug for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CheckResult")
            .field("state", &self.state)
            .field("hint", &self.hint)
            .field("metric", &self.metric)
            .field("custom_render", &self.render.is_some())
            .finish()
    }
}

impl fmt::Display for CheckResult {
    /// The state is left to the caller
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.render {
            Some(ref render) => f.write_str(&render(self)),
            None => f.write_str(&self.plain()),
        }
    }
}

/// All results of a check run
///
/// Iterating yields the most significant results first and keeps insertion
/// order within each state. Indexing with an integer uses insertion order.
#[derive(Clone, Debug, Default)]
pub struct Results {
    results: Vec<CheckResult>,
    by_state: BTreeMap<ServiceState, Vec<usize>>,
    by_name: HashMap<String, usize>,
}

impl Results {
    pub fn new() -> Results {
        Results::default()
    }

    /// Append a result
    ///
    /// A later result for a metric with the same name replaces the earlier
    /// one in `by_name` lookups, iteration still yields both.
    pub fn add(&mut self, result: CheckResult) {
        let idx = self.results.len();
        self.by_state.entry(result.state).or_insert_with(Vec::new).push(idx);
        if let Some(ref metric) = result.metric {
            self.by_name.insert(metric.name.clone(), idx);
        }
        self.results.push(result);
    }

    /// Results ordered by descending severity
    pub fn iter(&self) -> impl Iterator<Item = &CheckResult> {
        self.by_state
            .values()
            .rev()
            .flat_map(|group| group.iter())
            .map(move |&idx| &self.results[idx])
    }

    /// The `idx`th result in insertion order
    pub fn get(&self, idx: usize) -> Option<&CheckResult> {
        self.results.get(idx)
    }

    /// The latest result for the metric called `name`
    pub fn by_name(&self, name: &str) -> Result<&CheckResult> {
        self.by_name
            .get(name)
            .map(|&idx| &self.results[idx])
            .ok_or_else(|| Error::ResultNotFound(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The worst state of all results, fails if there are none
    pub fn most_significant_state(&self) -> Result<ServiceState> {
        self.by_state.keys().next_back().cloned().ok_or(Error::NoResults)
    }

    /// All results that share the worst state
    pub fn most_significant(&self) -> Vec<&CheckResult> {
        match self.by_state.values().next_back() {
            Some(group) => group.iter().map(|&idx| &self.results[idx]).collect(),
            None => Vec::new(),
        }
    }

    /// The first result that has the worst state
    pub fn first_significant(&self) -> Option<&CheckResult> {
        self.iter().next()
    }
}

impl Index<usize> for Results {
    type Output = CheckResult;

    fn index(&self, idx: usize) -> &CheckResult {
        &self.results[idx]
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a CheckResult;
    type IntoIter = Box<dyn Iterator<Item = &'a CheckResult> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Extend<CheckResult> for Results {
    fn extend<I: IntoIterator<Item = CheckResult>>(&mut self, iter: I) {
        for result in iter {
            self.add(result);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{CheckResult, Results};
    use crate::error::Error;
    use crate::metric::Metric;
    use crate::ServiceState::{self, Critical, Unknown, Warning};

    const OK: ServiceState = ServiceState::Ok;

    fn result(state: ServiceState, name: &str) -> CheckResult {
        CheckResult::new(state, None, Some(Metric::new(name, 1)))
    }

    #[test]
    fn display_description_and_hint() {
        let metric = Metric::new("time", 1).with_uom("s");
        let r = CheckResult::new(OK, Some("hint".into()), Some(metric));
        assert_eq!(r.to_string(), "1s (hint)");
    }

    #[test]
    fn custom_render_replaces_text() {
        let r = CheckResult::new(Warning, Some("hint".into()), Some(Metric::new("time", 1)))
            .with_render(|r: &CheckResult| format!("[{}]", r.plain()));
        assert_eq!(r.to_string(), "[1 (hint)]");
        assert_eq!(r, CheckResult::new(Warning, Some("hint".into()), Some(Metric::new("time", 1))));
    }

    #[test]
    fn display_hint_only() {
        assert_eq!(CheckResult::new(Unknown, Some("hint".into()), None).to_string(), "hint");
    }

    #[test]
    fn display_description_only() {
        assert_eq!(result(OK, "time").to_string(), "1");
    }

    #[test]
    fn display_nothing() {
        assert_eq!(CheckResult::new(OK, None, None).to_string(), "");
    }

    #[test]
    fn iterates_by_severity() {
        let mut results = Results::new();
        results.add(result(OK, "a"));
        results.add(result(Critical, "b"));
        results.add(result(Warning, "c"));
        let states: Vec<_> = results.iter().map(|r| r.state).collect();
        assert_eq!(states, vec![Critical, Warning, OK]);
    }

    #[test]
    fn stable_within_state() {
        let mut results = Results::new();
        results.extend(vec![
            result(Warning, "a"),
            result(OK, "b"),
            result(Warning, "c"),
            result(Unknown, "d"),
        ]);
        let names: Vec<_> = results
            .iter()
            .map(|r| r.metric.as_ref().unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn index_uses_insertion_order() {
        let mut results = Results::new();
        results.add(result(OK, "a"));
        results.add(result(Critical, "b"));
        assert_eq!(results[0].state, OK);
        assert_eq!(results.get(1).map(|r| r.state), Some(Critical));
        assert!(results.get(2).is_none());
    }

    #[test]
    fn by_name_last_write_wins() {
        let mut results = Results::new();
        results.add(result(OK, "a"));
        results.add(result(Critical, "a"));
        results.add(CheckResult::new(Unknown, Some("no metric".into()), None));
        assert_eq!(results.by_name("a").unwrap().state, Critical);
        assert_eq!(results.len(), 3);
        assert!(results.contains("a"));
        match results.by_name("b") {
            Err(Error::ResultNotFound(name)) => assert_eq!(name, "b"),
            other => panic!("Unexpected lookup: {:?}", other),
        }
    }

    #[test]
    fn most_significant() {
        let mut results = Results::new();
        results.add(result(Warning, "a"));
        results.add(result(OK, "b"));
        results.add(result(Warning, "c"));
        assert_eq!(results.most_significant_state().unwrap(), Warning);
        let names: Vec<_> = results
            .most_significant()
            .iter()
            .map(|r| r.metric.as_ref().unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(results.first_significant(), Some(&results[0]));
    }

    #[test]
    fn empty_results() {
        let results = Results::new();
        assert!(results.is_empty());
        match results.most_significant_state() {
            Err(Error::NoResults) => {}
            other => panic!("Unexpected state: {:?}", other),
        }
        assert!(results.most_significant().is_empty());
        assert!(results.first_significant().is_none());
    }
}
