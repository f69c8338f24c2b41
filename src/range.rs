//! Threshold ranges
//!
//! The general format is `[@][start:][end]`:
//!
//! * `start:` may be omitted if start is 0
//! * `~:` means that start is negative infinity
//! * if `end` is omitted, infinity is assumed
//! * a leading `@` inverts the match
//!
//! See the
//! [threshold format](https://www.monitoring-plugins.org/doc/guidelines.html#THRESHOLDFORMAT)
//! in the plugin development guidelines.

use std::f64::{INFINITY, NEG_INFINITY};
use std::fmt;
use std::str::FromStr;

/// A threshold range that values are matched against
///
/// A value *matches* if it lies within `start..=end`, or outside of it for
/// inverted ranges. Contexts treat a value that does not match as a
/// violation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub start: f64,
    pub end: f64,
    pub invert: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RangeError {
    /// One side of the range is not a number
    InvalidNumber(String),
    /// `start` is greater than `end`
    StartAfterEnd { start: f64, end: f64 },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RangeError::InvalidNumber(ref atom) => {
                write!(f, "invalid number '{}' in range specification", atom)
            }
            RangeError::StartAfterEnd { start, end } => write!(
                f,
                "start {} must not be greater than end {}",
                fmt_bound(start),
                fmt_bound(end)
            ),
        }
    }
}

impl ::std::error::Error for RangeError {}

impl Default for Range {
    /// The unrestricted range, `0:`
    fn default() -> Range {
        Range {
            start: 0.0,
            end: INFINITY,
            invert: false,
        }
    }
}

impl Range {
    /// Build a range, failing if `start > end`
    pub fn new(start: f64, end: f64, invert: bool) -> Result<Range, RangeError> {
        if start > end {
            return Err(RangeError::StartAfterEnd { start, end });
        }
        Ok(Range { start, end, invert })
    }

    /// Parse a range from the compact threshold format
    ///
    /// The empty string is the unrestricted range.
    pub fn parse(spec: &str) -> Result<Range, RangeError> {
        let (invert, spec) = if spec.starts_with('@') {
            (true, &spec[1..])
        } else {
            (false, spec)
        };
        let (start, end) = match spec.find(':') {
            Some(colon) => (&spec[..colon], &spec[colon + 1..]),
            None => ("", spec),
        };
        let start = if start == "~" {
            NEG_INFINITY
        } else {
            parse_atom(start, 0.0)?
        };
        let end = parse_atom(end, INFINITY)?;
        Range::new(start, end, invert)
    }

    /// Whether `value` is inside the bounds (outside, for inverted ranges)
    pub fn matches(&self, value: f64) -> bool {
        if value < self.start {
            return self.invert;
        }
        if value > self.end {
            return self.invert;
        }
        !self.invert
    }

    /// The inverted version of this range
    pub fn inverted(self) -> Range {
        Range {
            invert: !self.invert,
            ..self
        }
    }

    /// Why a value does not match this range
    pub fn violation(&self) -> String {
        format!("outside range {}", self.render(false))
    }

    fn render(&self, omit_zero_start: bool) -> String {
        let mut out = String::new();
        if self.invert {
            out.push('@');
        }
        if self.start == NEG_INFINITY {
            out.push_str("~:");
        } else if !omit_zero_start || self.start != 0.0 {
            out.push_str(&fmt_bound(self.start));
            out.push(':');
        }
        if self.end != INFINITY {
            out.push_str(&fmt_bound(self.end));
        }
        out
    }
}

/// Parse one side of a range, `default` if it is empty
fn parse_atom(atom: &str, default: f64) -> Result<f64, RangeError> {
    if atom.is_empty() {
        return Ok(default);
    }
    let parsed = if atom.contains('.') {
        atom.parse::<f64>().ok()
    } else {
        // integers too large for i64 still make fine thresholds
        atom.parse::<i64>()
            .map(|i| i as f64)
            .or_else(|_| atom.parse::<f64>())
            .ok()
    };
    match parsed {
        Some(v) if !v.is_nan() => Ok(v),
        _ => Err(RangeError::InvalidNumber(atom.to_owned())),
    }
}

fn fmt_bound(v: f64) -> String {
    format!("{}", v)
}

impl fmt::Display for Range {
    /// The canonical form: zero start and infinite end are left out
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

impl FromStr for Range {
    type Err = RangeError;
    fn from_str(spec: &str) -> Result<Range, RangeError> {
        Range::parse(spec)
    }
}

impl From<f64> for Range {
    /// A bare number `v` means `0:v`
    fn from(end: f64) -> Range {
        Range {
            start: 0.0,
            end,
            invert: false,
        }
    }
}

impl From<i64> for Range {
    fn from(end: i64) -> Range {
        Range::from(end as f64)
    }
}
