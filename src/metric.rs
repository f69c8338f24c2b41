//! Structured representation of measured values
//!
//! Resources emit `Metric`s from their `probe` method. The check controller
//! binds every metric to the context that evaluates it and to the resource
//! that produced it, and then turns it into exactly one result and at most
//! one piece of performance data.

use std::fmt;
use std::sync::Arc;

use crate::context::{Context, Evaluation};
use crate::error::{Error, Result};
use crate::performance::Performance;
use crate::resource::Resource;

/// A measured value
///
/// Usually a number or a boolean, but contexts that know what to do with
/// them may accept text as well.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// The value as a number, for comparing against thresholds
    ///
    /// Booleans count as 0 and 1; text is never numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(i) => Some(i as f64),
            Value::Float(f) => Some(f),
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::Text(_) => None,
        }
    }

    /// Like `Display`, but floats are limited to 4 significant digits
    pub fn human_readable(&self) -> String {
        match *self {
            Value::Float(f) => significant_digits(f, 4),
            ref other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(ref s) => f.write_str(s),
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Value {
                    Value::$variant(v.into())
                }
            }
        )*
    }
}

value_from!(Int: i8, i16, i32, i64, u8, u16, u32);
value_from!(Float: f32, f64);
value_from!(Bool: bool);
value_from!(Text: String, &str);

impl From<u64> for Value {
    fn from(v: u64) -> Value {
        if v <= i64::max_value() as u64 {
            Value::Int(v as i64)
        } else {
            Value::Float(v as f64)
        }
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Value {
        Value::from(v as u64)
    }
}

/// Format like printf's `%.<digits>g`
///
/// Uses scientific notation only for very large or very small magnitudes
/// and strips trailing zeros.
pub(crate) fn significant_digits(v: f64, digits: usize) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{}", v);
    }
    let digits = digits.max(1);
    let sci = format!("{:.*e}", digits - 1, v);
    let (mantissa, exp) = match sci.find('e') {
        Some(pos) => (&sci[..pos], &sci[pos + 1..]),
        None => return sci,
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= digits as i32 {
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, v)).to_owned()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// A single measured value
///
/// The value should be expressed in base units, so
/// `Metric::new("swap", 10240).with_uom("B")` is better than
/// `Metric::new("swap", 10).with_uom("kiB")`.
#[derive(Clone)]
pub struct Metric {
    /// Short identifier, also used as the performance data label
    pub name: String,
    pub value: Value,
    /// Unit of measure, preferably an ISO abbreviation like `s`
    pub uom: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Name of the context that evaluates this metric, defaults to `name`
    pub context: String,
    context_obj: Option<Arc<dyn Context>>,
    resource: Option<Arc<dyn Resource>>,
}

impl Metric {
    pub fn new<N: Into<String>, V: Into<Value>>(name: N, value: V) -> Metric {
        let name = name.into();
        Metric {
            context: name.clone(),
            name,
            value: value.into(),
            uom: None,
            min: None,
            max: None,
            context_obj: None,
            resource: None,
        }
    }

    pub fn with_uom<S: Into<String>>(mut self, uom: S) -> Metric {
        self.uom = Some(uom.into());
        self
    }

    pub fn with_min(mut self, min: f64) -> Metric {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Metric {
        self.max = Some(max);
        self
    }

    /// Evaluate this metric in the context called `context`
    pub fn with_context<S: Into<String>>(mut self, context: S) -> Metric {
        self.context = context.into();
        self
    }

    /// Attach the context and resource this metric is evaluated with
    ///
    /// The check controller calls this once per metric; the returned metric
    /// is the one that gets evaluated. Binding consumes the metric, so a
    /// metric bound to one resource is never seen unbound or rebound by
    /// another: binding a clone yields an independent metric.
    ///
    /// `evaluate` and `performance` only read the bound metric, calling
    /// them repeatedly yields the same outcome.
    pub fn bind(mut self, context: Arc<dyn Context>, resource: Arc<dyn Resource>) -> Metric {
        self.context_obj = Some(context);
        self.resource = Some(resource);
        self
    }

    /// The context this metric has been bound to
    pub fn context_obj(&self) -> Option<&Arc<dyn Context>> {
        self.context_obj.as_ref()
    }

    /// The resource that produced this metric, once bound
    pub fn resource(&self) -> Option<&Arc<dyn Resource>> {
        self.resource.as_ref()
    }

    /// Value and unit, e.g. `1.302s`
    pub fn valueunit(&self) -> String {
        format!(
            "{}{}",
            self.value.human_readable(),
            self.uom.as_ref().map_or("", |u| u.as_str())
        )
    }

    /// Human-readable description, as formatted by the bound context
    ///
    /// Before the metric is bound this is just `valueunit`.
    pub fn description(&self) -> Option<String> {
        match self.context_obj {
            Some(ref ctx) => ctx.describe(self),
            None => Some(self.valueunit()),
        }
    }

    /// Evaluate this metric in its context
    pub fn evaluate(&self) -> Result<Evaluation> {
        let (context, resource) = self.bindings()?;
        context.evaluate(self, resource.as_ref())
    }

    /// Performance data for this metric, if its context produces any
    pub fn performance(&self) -> Result<Option<Performance>> {
        let (context, resource) = self.bindings()?;
        context.performance(self, resource.as_ref())
    }

    fn bindings(&self) -> Result<(&Arc<dyn Context>, &Arc<dyn Resource>)> {
        let context = self.context_obj.as_ref().ok_or_else(|| Error::Unbound {
            metric: self.name.clone(),
            missing: "context",
        })?;
        let resource = self.resource.as_ref().ok_or_else(|| Error::Unbound {
            metric: self.name.clone(),
            missing: "resource",
        })?;
        Ok((context, resource))
    }
}

impl PartialEq for Metric {
    /// Metrics are equal if they carry the same measurement; bindings are
    /// not compared
    fn eq(&self, other: &Metric) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.uom == other.uom
            && self.min == other.min
            && self.max == other.max
            && self.context == other.context
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("uom", &self.uom)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("context", &self.context)
            .field("bound", &self.context_obj.is_some())
            .finish()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.valueunit())
    }
}
