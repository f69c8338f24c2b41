//! Command line values that apply to several items at once
//!
//! `-w 5,3.5,2.5` sets one threshold per item; a shorter list repeats its
//! last value for the remaining items.

use std::convert::Infallible;
use std::fmt;
use std::slice;
use std::str::FromStr;

/// A comma-separated list of per-item values
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiArg {
    args: Vec<String>,
    fill: Option<String>,
}

impl MultiArg {
    pub fn new<S: AsRef<str>>(args: S) -> MultiArg {
        MultiArg::split(args.as_ref(), ',')
    }

    pub fn split(args: &str, separator: char) -> MultiArg {
        MultiArg {
            args: args.split(separator).map(str::to_owned).collect(),
            fill: None,
        }
    }

    /// Use `fill` for items past the end instead of repeating the last one
    pub fn with_fill<S: Into<String>>(mut self, fill: S) -> MultiArg {
        self.fill = Some(fill.into());
        self
    }

    /// The value for item `idx`
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.args
            .get(idx)
            .or_else(|| self.fill.as_ref())
            .or_else(|| self.args.last())
            .map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, String> {
        self.args.iter()
    }
}

impl From<Vec<String>> for MultiArg {
    fn from(args: Vec<String>) -> MultiArg {
        MultiArg { args, fill: None }
    }
}

impl FromStr for MultiArg {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<MultiArg, Infallible> {
        Ok(MultiArg::new(s))
    }
}

impl fmt::Display for MultiArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.args.join(","))
    }
}

impl<'a> IntoIterator for &'a MultiArg {
    type Item = &'a String;
    type IntoIter = slice::Iter<'a, String>;

    fn into_iter(self) -> slice::Iter<'a, String> {
        self.iter()
    }
}
