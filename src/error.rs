//! Errors raised while building or running a check
//!
//! Most variants are programming errors that should show up while a plugin
//! is being written. `Abort` is the exception: a resource or context returns
//! it when it cannot determine the state of the system, and the check
//! records it as an `unknown` result instead of failing.

use std::error;
use std::fmt;
use std::io;
use std::result::Result as StdResult;
use std::time::Duration;

use crate::metric::Value;
use crate::range::RangeError;

/// Every error in this crate can be converted into an `Error`
#[derive(Debug)]
pub enum Error {
    /// Stop evaluating the current resource and report `unknown`
    Abort(String),
    /// The check ran longer than the runtime allowed
    Timeout(Duration),
    /// A threshold range could not be parsed
    Range(RangeError),
    /// Performance data labels may not contain `'` or `=`
    IllegalLabel(String),
    /// A metric refers to a context that was never added to the check
    ContextNotFound { name: String, known: Vec<String> },
    /// No result has been recorded for the metric with this name
    ResultNotFound(String),
    /// The results container is empty
    NoResults,
    /// A metric was evaluated before the check bound it to its context and
    /// resource
    Unbound { metric: String, missing: &'static str },
    /// Threshold evaluation needs a number
    NotNumeric { metric: String, value: Value },
    /// The state file does not contain a JSON object
    Cookie(String),
    Io(io::Error),
    Json(serde_json::Error),
    Lock(nix::Error),
}

impl Error {
    /// Build the error that aborts evaluation of the current resource
    pub fn abort<S: Into<String>>(msg: S) -> Error {
        Error::Abort(msg.into())
    }

    /// Whether this error only aborts the current resource
    pub fn is_abort(&self) -> bool {
        match *self {
            Error::Abort(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> StdResult<(), fmt::Error> {
        use self::Error::*;
        match self {
            &Abort(ref msg) => write!(f, "{}", msg),
            &Timeout(ref after) => write!(
                f,
                "Timeout: check execution aborted after {}s",
                after.as_secs()
            ),
            &Range(ref e) => write!(f, "{}", e),
            &IllegalLabel(ref label) => write!(
                f,
                "performance label {:?} contains illegal characters (' or =)",
                label
            ),
            &ContextNotFound { ref name, ref known } => write!(
                f,
                "cannot find context '{}', known contexts: {}",
                name,
                known.join(", ")
            ),
            &ResultNotFound(ref name) => write!(f, "no result for metric '{}'", name),
            &NoResults => write!(f, "no check results"),
            &Unbound { ref metric, missing } => {
                write!(f, "no {} set for metric '{}'", missing, metric)
            }
            &NotNumeric { ref metric, ref value } => write!(
                f,
                "metric '{}' has non-numeric value '{}', cannot compare with thresholds",
                metric, value
            ),
            &Cookie(ref msg) => write!(f, "{}", msg),
            &Io(ref e) => write!(f, "{}", e),
            &Json(ref e) => write!(f, "{}", e),
            &Lock(ref e) => write!(f, "unable to lock state file: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Range(ref e) => Some(e),
            Error::Io(ref e) => Some(e),
            Error::Json(ref e) => Some(e),
            Error::Lock(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<RangeError> for Error {
    fn from(e: RangeError) -> Error {
        Error::Range(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}

impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Error {
        Error::Lock(e)
    }
}

/// All the results are results with `Error`s
pub type Result<T> = StdResult<T, Error>;
