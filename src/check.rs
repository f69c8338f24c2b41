//! The check controller
//!
//! A `Check` is populated with resources, contexts and optionally a summary,
//! and then run once. Running probes every resource in the order it was
//! added, evaluates each metric in its context and collects results and
//! performance data. Printing and exiting is left to the
//! [`Runtime`](../runtime/struct.Runtime.html).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{Context, Contexts, Evaluation};
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::result::{CheckResult, Results};
use crate::runtime::Runtime;
use crate::summary::{DefaultSummary, Summary};
use crate::ServiceState;

/// Anything that can be added to a check
pub enum Component {
    Resource(Arc<dyn Resource>),
    Context(Arc<dyn Context>),
    Summary(Box<dyn Summary>),
    Results(Results),
}

impl Component {
    pub fn resource<R: Resource + 'static>(resource: R) -> Component {
        Component::Resource(Arc::new(resource))
    }

    pub fn context<C: Context + 'static>(context: C) -> Component {
        Component::Context(Arc::new(context))
    }

    pub fn summary<S: Summary + 'static>(summary: S) -> Component {
        Component::Summary(Box::new(summary))
    }
}

impl From<Results> for Component {
    fn from(results: Results) -> Component {
        Component::Results(results)
    }
}

pub struct Check {
    resources: Vec<Arc<dyn Resource>>,
    contexts: Contexts,
    summary: Box<dyn Summary>,
    results: Results,
    perfdata: Vec<String>,
    name: Option<String>,
}

impl Check {
    /// A check named after its first resource
    pub fn new() -> Check {
        Check {
            resources: Vec::new(),
            contexts: Contexts::new(),
            summary: Box::new(DefaultSummary),
            results: Results::new(),
            perfdata: Vec::new(),
            name: None,
        }
    }

    /// A check with an explicit name, the empty name means no prefix at all
    pub fn with_name<S: Into<String>>(name: S) -> Check {
        Check {
            name: Some(name.into()),
            ..Check::new()
        }
    }

    pub fn add(&mut self, component: Component) -> &mut Check {
        match component {
            Component::Resource(resource) => self.resources.push(resource),
            Component::Context(context) => self.contexts.add_shared(context),
            Component::Summary(summary) => self.summary = summary,
            Component::Results(results) => self.results = results,
        }
        self
    }

    pub fn add_resource<R: Resource + 'static>(&mut self, resource: R) -> &mut Check {
        self.add(Component::resource(resource))
    }

    pub fn add_context<C: Context + 'static>(&mut self, context: C) -> &mut Check {
        self.add(Component::context(context))
    }

    pub fn set_summary<S: Summary + 'static>(&mut self, summary: S) -> &mut Check {
        self.add(Component::summary(summary))
    }

    pub fn set_results(&mut self, results: Results) -> &mut Check {
        self.add(results.into())
    }

    /// The name printed in front of the state, before uppercasing
    pub fn name(&self) -> String {
        match self.name {
            Some(ref name) => name.clone(),
            None => self.resources.first().map(|r| r.name()).unwrap_or_default(),
        }
    }

    pub fn resources(&self) -> &[Arc<dyn Resource>] {
        &self.resources
    }

    pub fn contexts(&self) -> &Contexts {
        &self.contexts
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    /// Rendered performance data, sorted once the check has run
    pub fn perfdata(&self) -> &[String] {
        &self.perfdata
    }

    /// Probe `resource` and evaluate its metrics
    ///
    /// An abort error records a single `unknown` result for the resource
    /// and is not returned; every other error is.
    pub fn evaluate_resource(&mut self, resource: &Arc<dyn Resource>) -> Result<()> {
        match self.evaluate_metrics(resource) {
            Err(Error::Abort(msg)) => {
                debug!("resource {} aborted: {}", resource.name(), msg);
                self.results
                    .add(CheckResult::new(ServiceState::Unknown, Some(msg), None));
                Ok(())
            }
            other => other,
        }
    }

    fn evaluate_metrics(&mut self, resource: &Arc<dyn Resource>) -> Result<()> {
        let (metrics, failure) = resource.probe()?.collect();
        if metrics.is_empty() && failure.is_none() {
            warn!("resource {} did not produce any metric", resource.name());
        }
        for metric in metrics {
            let context = self.contexts.get(&metric.context)?;
            let metric = metric.bind(context, Arc::clone(resource));
            let result = match metric.evaluate()? {
                Evaluation::Result(result) => result,
                Evaluation::State(state) => CheckResult::new(state, None, Some(metric.clone())),
            };
            debug!("{} evaluated to {}", metric.name, result.state);
            self.results.add(result);
            let perfdata = metric.performance()?;
            self.perfdata
                .push(perfdata.map(|p| p.to_string()).unwrap_or_default());
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Evaluate every resource in the order they were added
    ///
    /// Afterwards the performance data is sorted and free of empty entries.
    pub fn run(&mut self) -> Result<()> {
        info!("running check {}", self.name());
        let resources = self.resources.clone();
        for resource in &resources {
            self.evaluate_resource(resource)?;
        }
        self.perfdata.retain(|p| !p.is_empty());
        self.perfdata.sort();
        Ok(())
    }

    /// The worst state of all results, `unknown` if there are none
    pub fn state(&self) -> ServiceState {
        self.results
            .most_significant_state()
            .unwrap_or(ServiceState::Unknown)
    }

    pub fn summary_str(&self) -> String {
        if self.results.is_empty() {
            self.summary.empty()
        } else if self.state() == ServiceState::Ok {
            self.summary.ok(&self.results)
        } else {
            self.summary.problem(&self.results)
        }
    }

    pub fn verbose_str(&self) -> Vec<String> {
        self.summary.verbose(&self.results)
    }

    pub fn exitcode(&self) -> i32 {
        self.state().code()
    }

    /// Run the check in a fresh runtime, print the output and exit
    ///
    /// A timeout of zero seconds means no timeout.
    pub fn main(self, verbose: Option<usize>, timeout: Option<Duration>) -> ! {
        let mut runtime = Runtime::new().with_timeout(timeout);
        if let Some(verbose) = verbose {
            runtime.set_verbose(verbose);
        }
        runtime.execute(self)
    }
}

impl Default for Check {
    fn default() -> Check {
        Check::new()
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name())
            .field("resources", &self.resources.len())
            .field("contexts", &self.contexts)
            .field("results", &self.results)
            .field("perfdata", &self.perfdata)
            .finish()
    }
}
