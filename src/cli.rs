//! Command line handling shared by all plugins
//!
//! Plugins flatten `CommonArgs` into their own argument struct:
//!
//! ```rust,no_run
//! use monitoring_plugin::cli::{parse_args, CommonArgs};
//! use structopt::StructOpt;
//!
//! #[derive(StructOpt, Debug)]
//! struct Args {
//!     #[structopt(flatten)]
//!     common: CommonArgs,
//!     #[structopt(short = "w", long = "warning", default_value = "")]
//!     warning: String,
//! }
//!
//! let args: Args = parse_args();
//! ```

use std::env;
use std::ffi::OsString;
use std::time::Duration;

use structopt::clap::ErrorKind;
use structopt::StructOpt;

use crate::runtime::Runtime;
use crate::ServiceState;

#[derive(StructOpt, Debug, Clone, PartialEq)]
pub struct CommonArgs {
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Increase output verbosity, use up to 3 times"
    )]
    pub verbose: usize,
    #[structopt(
        short = "t",
        long = "timeout",
        default_value = "10",
        help = "Abort execution after this many seconds, 0 means never"
    )]
    pub timeout: u64,
}

impl CommonArgs {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout))
        }
    }

    /// Apply verbosity and timeout to `runtime`
    pub fn configure(&self, runtime: &mut Runtime) {
        runtime.set_verbose(self.verbose);
        runtime.set_timeout(self.timeout());
    }
}

/// Parse the process arguments, exiting with `unknown` on bad usage
pub fn parse_args<T: StructOpt>() -> T {
    parse_args_from(env::args_os())
}

/// Parse `args`, exiting with `unknown` on bad usage
///
/// Help and version requests exit with `unknown` as well, the plugin API
/// has no other code for "no check was done".
pub fn parse_args_from<T, I>(args: I) -> T
where
    T: StructOpt,
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    match T::from_iter_safe(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            match e.kind {
                ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => println!("{}", e.message),
                _ => println!("{} {}", ServiceState::Unknown.text().to_uppercase(), e.message),
            }
            ServiceState::Unknown.exit()
        }
    }
}
