//! Contexts evaluate metrics
//!
//! A context turns a `Metric` into a `CheckResult` and optionally into
//! performance data. Metrics pick their context by name, so one context can
//! evaluate any number of metrics that share the same thresholds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::performance::Performance;
use crate::range::Range;
use crate::resource::Resource;
use crate::result::CheckResult;
use crate::ServiceState;

/// Builds the result of an evaluation
///
/// Contexts use `CheckResult::new` unless they are given a constructor, e.g.
/// one that attaches a custom renderer to every result.
#[derive(Clone)]
pub struct ResultFn(
    Arc<dyn Fn(ServiceState, Option<String>, Metric) -> CheckResult + Send + Sync>,
);

impl ResultFn {
    pub fn new<F>(f: F) -> ResultFn
    where
        F: Fn(ServiceState, Option<String>, Metric) -> CheckResult + Send + Sync + 'static,
    {
        ResultFn(Arc::new(f))
    }

    pub fn build(
        &self,
        state: ServiceState,
        hint: Option<String>,
        metric: Metric,
    ) -> CheckResult {
        (self.0)(state, hint, metric)
    }
}

impl Default for ResultFn {
    fn default() -> ResultFn {
        ResultFn::new(|state, hint, metric| CheckResult::new(state, hint, Some(metric)))
    }
}

impl fmt::Debug for ResultFn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ResultFn(..)")
    }
}

/// A function that describes a metric, called with the bound context
pub type FormatFn = Arc<dyn Fn(&Metric, &dyn Context) -> String + Send + Sync>;

/// How a context describes the metrics it evaluates
#[derive(Clone)]
pub enum MetricFormat {
    /// A template like `{name} is {valueunit}`
    ///
    /// Known keys are `name`, `value`, `uom`, `valueunit`, `min` and `max`.
    /// Unset optional fields are replaced with nothing; `{{` and `}}` are
    /// literal braces.
    Template(String),
    Func(FormatFn),
}

impl MetricFormat {
    pub fn func<F>(f: F) -> MetricFormat
    where
        F: Fn(&Metric, &dyn Context) -> String + Send + Sync + 'static,
    {
        MetricFormat::Func(Arc::new(f))
    }

    /// Describe `metric` on behalf of `context`
    pub fn render(&self, metric: &Metric, context: &dyn Context) -> String {
        match *self {
            MetricFormat::Template(ref template) => fill_template(template, metric),
            MetricFormat::Func(ref f) => f(metric, context),
        }
    }
}

impl fmt::Debug for MetricFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MetricFormat::Template(ref t) => f.debug_tuple("Template").field(t).finish(),
            MetricFormat::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'a> From<&'a str> for MetricFormat {
    fn from(template: &'a str) -> MetricFormat {
        MetricFormat::Template(template.to_owned())
    }
}

impl From<String> for MetricFormat {
    fn from(template: String) -> MetricFormat {
        MetricFormat::Template(template)
    }
}

fn template_value(metric: &Metric, key: &str) -> Option<String> {
    let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    Some(match key {
        "name" => metric.name.clone(),
        "value" => metric.value.to_string(),
        "uom" => metric.uom.clone().unwrap_or_default(),
        "valueunit" => metric.valueunit(),
        "min" => opt(metric.min),
        "max" => opt(metric.max),
        _ => return None,
    })
}

fn fill_template(template: &str, metric: &Metric) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(close) = tail.find('}') {
                let key = &tail[1..close];
                match template_value(metric, key) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&tail[..=close]),
                }
                rest = &tail[close + 1..];
                continue;
            }
        }
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// What a context returns from `evaluate`
///
/// A bare state is wrapped into a result that carries the evaluated metric.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluation {
    Result(CheckResult),
    State(ServiceState),
}

impl From<CheckResult> for Evaluation {
    fn from(result: CheckResult) -> Evaluation {
        Evaluation::Result(result)
    }
}

impl From<ServiceState> for Evaluation {
    fn from(state: ServiceState) -> Evaluation {
        Evaluation::State(state)
    }
}

/// Access to any context as a trait object
///
/// Implemented for every sized `Context`, so default methods can hand
/// `self` to formatting functions.
pub trait AsContext {
    fn as_context(&self) -> &dyn Context;
}

impl<C: Context> AsContext for C {
    fn as_context(&self) -> &dyn Context {
        self
    }
}

/// Evaluation policy for a class of metrics
///
/// Every method but `name` has a default: the plain context thinks
/// everything is fine, produces no performance data and describes metrics
/// with its `metric_format`, if any.
pub trait Context: AsContext + Send + Sync {
    fn name(&self) -> &str;

    fn metric_format(&self) -> Option<&MetricFormat> {
        None
    }

    /// Determine the state of `metric`
    ///
    /// `resource` is the resource that produced the metric, for contexts
    /// that need more information than the metric carries.
    fn evaluate(&self, metric: &Metric, resource: &dyn Resource) -> Result<Evaluation> {
        let _ = (metric, resource);
        Ok(ServiceState::Ok.into())
    }

    fn performance(
        &self,
        metric: &Metric,
        resource: &dyn Resource,
    ) -> Result<Option<Performance>> {
        let _ = (metric, resource);
        Ok(None)
    }

    fn describe(&self, metric: &Metric) -> Option<String> {
        self.metric_format().map(|fmt| fmt.render(metric, self.as_context()))
    }
}

/// A context that accepts every metric
#[derive(Clone, Debug)]
pub struct GenericContext {
    name: String,
    fmt: Option<MetricFormat>,
    result: ResultFn,
}

impl GenericContext {
    pub fn new<S: Into<String>>(name: S) -> GenericContext {
        GenericContext {
            name: name.into(),
            fmt: None,
            result: ResultFn::default(),
        }
    }

    pub fn with_format<F: Into<MetricFormat>>(mut self, fmt: F) -> GenericContext {
        self.fmt = Some(fmt.into());
        self
    }

    /// Build results with `result` instead of `CheckResult::new`
    pub fn with_result<F>(mut self, result: F) -> GenericContext
    where
        F: Fn(ServiceState, Option<String>, Metric) -> CheckResult + Send + Sync + 'static,
    {
        self.result = ResultFn::new(result);
        self
    }
}

impl Context for GenericContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric_format(&self) -> Option<&MetricFormat> {
        self.fmt.as_ref()
    }

    fn evaluate(&self, metric: &Metric, _resource: &dyn Resource) -> Result<Evaluation> {
        Ok(self.result.build(ServiceState::Ok, None, metric.clone()).into())
    }
}

/// Compare numeric metrics against warning and critical ranges
///
/// Produces full performance data for every metric it evaluates.
#[derive(Clone, Debug)]
pub struct ScalarContext {
    name: String,
    pub warning: Range,
    pub critical: Range,
    fmt: MetricFormat,
    result: ResultFn,
}

impl ScalarContext {
    /// A context whose ranges accept every non-negative value
    pub fn new<S: Into<String>>(name: S) -> ScalarContext {
        ScalarContext {
            name: name.into(),
            warning: Range::default(),
            critical: Range::default(),
            fmt: MetricFormat::from("{name} is {valueunit}"),
            result: ResultFn::default(),
        }
    }

    /// Parse both ranges from the threshold format
    pub fn from_specs<S: Into<String>>(
        name: S,
        warning: &str,
        critical: &str,
    ) -> Result<ScalarContext> {
        Ok(ScalarContext::new(name)
            .with_warning(warning.parse()?)
            .with_critical(critical.parse()?))
    }

    pub fn with_warning(mut self, warning: Range) -> ScalarContext {
        self.warning = warning;
        self
    }

    pub fn with_critical(mut self, critical: Range) -> ScalarContext {
        self.critical = critical;
        self
    }

    pub fn with_format<F: Into<MetricFormat>>(mut self, fmt: F) -> ScalarContext {
        self.fmt = fmt.into();
        self
    }

    /// Build results with `result` instead of `CheckResult::new`
    pub fn with_result<F>(mut self, result: F) -> ScalarContext
    where
        F: Fn(ServiceState, Option<String>, Metric) -> CheckResult + Send + Sync + 'static,
    {
        self.result = ResultFn::new(result);
        self
    }
}

impl Context for ScalarContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric_format(&self) -> Option<&MetricFormat> {
        Some(&self.fmt)
    }

    /// The critical range is checked first
    fn evaluate(&self, metric: &Metric, _resource: &dyn Resource) -> Result<Evaluation> {
        let value = metric.value.as_f64().ok_or_else(|| Error::NotNumeric {
            metric: metric.name.clone(),
            value: metric.value.clone(),
        })?;
        let (state, hint) = if !self.critical.matches(value) {
            (ServiceState::Critical, Some(self.critical.violation()))
        } else if !self.warning.matches(value) {
            (ServiceState::Warning, Some(self.warning.violation()))
        } else {
            (ServiceState::Ok, None)
        };
        Ok(self.result.build(state, hint, metric.clone()).into())
    }

    fn performance(
        &self,
        metric: &Metric,
        _resource: &dyn Resource,
    ) -> Result<Option<Performance>> {
        let perf = Performance::new(metric.name.clone(), metric.value.clone())?
            .with_uom(metric.uom.clone())
            .with_thresholds(Some(self.warning), Some(self.critical))
            .with_bounds(metric.min, metric.max);
        Ok(Some(perf))
    }
}

/// The contexts known to a check, by name
///
/// Always contains `default`, a scalar context that accepts every
/// non-negative number, and `null`, which accepts everything and produces
/// no performance data.
#[derive(Clone)]
pub struct Contexts {
    by_name: BTreeMap<String, Arc<dyn Context>>,
}

impl Contexts {
    pub fn new() -> Contexts {
        let mut contexts = Contexts {
            by_name: BTreeMap::new(),
        };
        contexts.add(ScalarContext::new("default"));
        contexts.add(GenericContext::new("null"));
        contexts
    }

    /// Register `context`, replacing any context with the same name
    pub fn add<C: Context + 'static>(&mut self, context: C) {
        self.add_shared(Arc::new(context));
    }

    pub fn add_shared(&mut self, context: Arc<dyn Context>) {
        self.by_name.insert(context.name().to_owned(), context);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Context>> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ContextNotFound {
                name: name.to_owned(),
                known: self.names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }
}

impl Default for Contexts {
    fn default() -> Contexts {
        Contexts::new()
    }
}

impl fmt::Debug for Contexts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.by_name.keys()).finish()
    }
}
