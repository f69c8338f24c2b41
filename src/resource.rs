//! Resources take measurements
//!
//! A resource is a domain object that knows how to look at one part of the
//! system, e.g. the load average or a single filesystem. `probe` returns the
//! metrics; evaluating them is left to contexts.

use std::any;
use std::fmt;
use std::iter;
use std::vec;

use crate::error::{Error, Result};
use crate::metric::Metric;

/// The model of the thing being checked
pub trait Resource: Send + Sync {
    /// Used as the check name if the check was not given one explicitly
    ///
    /// Defaults to the name of the implementing type, without its module
    /// path.
    fn name(&self) -> String {
        short_type_name(any::type_name::<Self>()).to_owned()
    }

    /// Take the measurements
    ///
    /// Return `Error::Abort` if the measurement is impossible; the check
    /// reports `unknown` with the error message for this resource and
    /// continues with the next one.
    fn probe(&self) -> Result<Metrics<'_>>;
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// What a probe produced
///
/// Every shape is normalized into a plain list before evaluation, a lazy
/// probe that fails part way keeps the metrics it produced up to the
/// failure.
pub enum Metrics<'a> {
    Single(Metric),
    List(Vec<Metric>),
    Lazy(Box<dyn Iterator<Item = Result<Metric>> + 'a>),
}

impl<'a> Metrics<'a> {
    /// No metrics at all
    pub fn none() -> Metrics<'a> {
        Metrics::List(Vec::new())
    }

    /// Produce metrics on demand
    pub fn lazy<I>(iter: I) -> Metrics<'a>
    where
        I: IntoIterator<Item = Result<Metric>>,
        I::IntoIter: 'a,
    {
        Metrics::Lazy(Box::new(iter.into_iter()))
    }

    /// The metrics produced before the first error, and that error
    pub fn collect(self) -> (Vec<Metric>, Option<Error>) {
        match self {
            Metrics::Single(metric) => (vec![metric], None),
            Metrics::List(metrics) => (metrics, None),
            Metrics::Lazy(iter) => {
                let mut metrics = Vec::new();
                for item in iter {
                    match item {
                        Ok(metric) => metrics.push(metric),
                        Err(e) => return (metrics, Some(e)),
                    }
                }
                (metrics, None)
            }
        }
    }
}

impl<'a> From<Metric> for Metrics<'a> {
    fn from(metric: Metric) -> Metrics<'a> {
        Metrics::Single(metric)
    }
}

impl<'a> From<Vec<Metric>> for Metrics<'a> {
    fn from(metrics: Vec<Metric>) -> Metrics<'a> {
        Metrics::List(metrics)
    }
}

impl<'a> From<Option<Metric>> for Metrics<'a> {
    fn from(metric: Option<Metric>) -> Metrics<'a> {
        Metrics::List(metric.into_iter().collect())
    }
}

impl<'a> iter::FromIterator<Metric> for Metrics<'a> {
    fn from_iter<I: IntoIterator<Item = Metric>>(iter: I) -> Metrics<'a> {
        Metrics::List(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for Metrics<'a> {
    type Item = Metric;
    type IntoIter = vec::IntoIter<Metric>;

    /// Every metric produced before the first error
    fn into_iter(self) -> vec::IntoIter<Metric> {
        self.collect().0.into_iter()
    }
}

impl<'a> fmt::Debug for Metrics<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Metrics::Single(ref m) => f.debug_tuple("Single").field(m).finish(),
            Metrics::List(ref ms) => f.debug_tuple("List").field(ms).finish(),
            Metrics::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::{short_type_name, Metrics, Resource};
    use crate::error::{Error, Result};
    use crate::metric::Metric;

    /// Emits the same metrics on every probe
    pub(crate) struct Fixed {
        pub metrics: Vec<Metric>,
    }

    impl Fixed {
        pub fn new(metrics: Vec<Metric>) -> Fixed {
            Fixed { metrics }
        }

        pub fn empty() -> Fixed {
            Fixed::new(Vec::new())
        }
    }

    impl Resource for Fixed {
        fn probe(&self) -> Result<Metrics<'_>> {
            Ok(self.metrics.clone().into())
        }
    }

    #[test]
    fn default_name_is_type_name() {
        assert_eq!(Fixed::empty().name(), "Fixed");
        assert_eq!(short_type_name("a::b::Thing<c::D>"), "Thing");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn single_metric_is_normalized() {
        let (metrics, err) = Metrics::from(Metric::new("a", 1)).collect();
        assert_eq!(metrics, vec![Metric::new("a", 1)]);
        assert!(err.is_none());
    }

    #[test]
    fn lazy_stops_at_first_error() {
        let items = vec![
            Ok(Metric::new("a", 1)),
            Err(Error::abort("broken")),
            Ok(Metric::new("c", 3)),
        ];
        let (metrics, err) = Metrics::lazy(items).collect();
        assert_eq!(metrics, vec![Metric::new("a", 1)]);
        match err {
            Some(Error::Abort(msg)) => assert_eq!(msg, "broken"),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn collects_from_iterator() {
        let metrics: Metrics = (1..4).map(|i| Metric::new(format!("m{}", i), i)).collect();
        assert_eq!(metrics.into_iter().count(), 3);
        assert_eq!(Metrics::from(None).into_iter().count(), 0);
    }
}
