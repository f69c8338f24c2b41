//! Performance data, the machine-readable part of the plugin output

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};
use crate::metric::Value;
use crate::range::Range;

lazy_static! {
    static ref PLAIN_LABEL: Regex = Regex::new(r"^\w+$").unwrap();
}

/// One `label=value[uom][;warn][;crit][;min][;max]` token
#[derive(Clone, Debug, PartialEq)]
pub struct Performance {
    label: String,
    pub value: Value,
    pub uom: Option<String>,
    pub warn: Option<Range>,
    pub crit: Option<Range>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Performance {
    /// Fails if `label` contains `'` or `=`, which cannot be represented in
    /// the output
    pub fn new<L: Into<String>, V: Into<Value>>(label: L, value: V) -> Result<Performance> {
        let label = label.into();
        if label.contains('\'') || label.contains('=') {
            return Err(Error::IllegalLabel(label));
        }
        Ok(Performance {
            label,
            value: value.into(),
            uom: None,
            warn: None,
            crit: None,
            min: None,
            max: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn with_uom<S: Into<String>>(mut self, uom: Option<S>) -> Performance {
        self.uom = uom.map(Into::into);
        self
    }

    pub fn with_thresholds(mut self, warn: Option<Range>, crit: Option<Range>) -> Performance {
        self.warn = warn;
        self.crit = crit;
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Performance {
        self.min = min;
        self.max = max;
        self
    }
}

fn threshold(range: &Option<Range>) -> String {
    match *range {
        Some(ref r) if *r != Range::default() => r.to_string(),
        _ => String::new(),
    }
}

fn bound(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl fmt::Display for Performance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if PLAIN_LABEL.is_match(&self.label) {
            f.write_str(&self.label)?;
        } else {
            write!(f, "'{}'", self.label)?;
        }
        write!(
            f,
            "={}{}",
            self.value,
            self.uom.as_ref().map_or("", |u| u.as_str())
        )?;
        let mut fields = vec![
            threshold(&self.warn),
            threshold(&self.crit),
            bound(self.min),
            bound(self.max),
        ];
        // empty fields are only kept as separators before a meaningful one
        while fields.last().map_or(false, |s| s.is_empty()) {
            fields.pop();
        }
        for field in fields {
            write!(f, ";{}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::Performance;
    use crate::error::Error;
    use crate::range::Range;

    #[test]
    fn value_only() {
        assert_eq!(Performance::new("swap", 10).unwrap().to_string(), "swap=10");
    }

    #[test]
    fn fully_populated() {
        let perf = Performance::new("time", 1.5)
            .unwrap()
            .with_uom(Some("s"))
            .with_thresholds(Some(Range::from(2)), Some("1:4".parse().unwrap()))
            .with_bounds(Some(0.0), Some(10.0));
        assert_eq!(perf.to_string(), "time=1.5s;2;1:4;0;10");
    }

    #[test]
    fn empty_thresholds_keep_their_place() {
        let perf = Performance::new("time", 1)
            .unwrap()
            .with_thresholds(Some(Range::default()), None)
            .with_bounds(Some(0.0), None);
        assert_eq!(perf.to_string(), "time=1;;;0");
    }

    #[test]
    fn trailing_empty_fields_are_dropped() {
        let perf = Performance::new("time", 1)
            .unwrap()
            .with_thresholds(Some(Range::from(3)), Some(Range::default()));
        assert_eq!(perf.to_string(), "time=1;3");
    }

    #[test]
    fn label_with_spaces_is_quoted() {
        let perf = Performance::new("disk usage /", 7).unwrap();
        assert_eq!(perf.to_string(), "'disk usage /'=7");
    }

    #[test]
    fn illegal_label() {
        match Performance::new("d'", 10) {
            Err(Error::IllegalLabel(label)) => assert_eq!(label, "d'"),
            other => panic!("Unexpected performance: {:?}", other),
        }
        assert!(Performance::new("a=b", 10).is_err());
    }
}
