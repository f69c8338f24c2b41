//! Running checks, the way the monitoring system expects
//!
//! The runtime runs a check with a timeout, captures its log messages,
//! renders the output and turns every outcome into one of the four plugin
//! exit codes. It is a plain value: every plugin run creates its own.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::check::Check;
use crate::error::{Error, Result};
use crate::output::Output;
use crate::ServiceState;

/// Shared in-memory sink for log messages
#[derive(Clone, Debug, Default)]
pub struct LogBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub fn new() -> LogBuffer {
        LogBuffer::default()
    }

    /// Everything logged so far
    pub fn contents(&self) -> String {
        match self.buf.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .buf
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log buffer poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> LogBuffer {
        self.clone()
    }
}

/// What a plugin prints, and the code it exits with
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub output: String,
    pub exitcode: i32,
}

impl Report {
    pub fn exit(self) -> ! {
        print!("{}", self.output);
        process::exit(self.exitcode)
    }
}

/// The environment of plugin runs
///
/// Log messages are captured per run, so a runtime can run any number of
/// checks without one report picking up another's logs.
#[derive(Clone, Debug)]
pub struct Runtime {
    verbose: usize,
    timeout: Option<Duration>,
}

impl Runtime {
    /// Verbosity 1 and no timeout
    pub fn new() -> Runtime {
        Runtime {
            verbose: 1,
            timeout: None,
        }
    }

    pub fn verbose(&self) -> usize {
        self.verbose
    }

    /// Set the verbosity, values above 3 are treated as 3
    pub fn set_verbose(&mut self, verbose: usize) {
        self.verbose = verbose.min(3);
    }

    pub fn with_verbose(mut self, verbose: usize) -> Runtime {
        self.set_verbose(verbose);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Abort checks that run longer than `timeout`, zero means never
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|t| *t > Duration::from_secs(0));
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Runtime {
        self.set_timeout(timeout);
        self
    }

    fn log_level(&self) -> Level {
        match self.verbose {
            0 | 1 => Level::WARN,
            2 => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    /// Run `check` and render what the plugin should print
    ///
    /// The check runs on its own thread so that it can be abandoned when it
    /// exceeds the timeout.
    pub fn run(&self, check: Check) -> Report {
        let name = check.name();
        let logs = LogBuffer::new();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(self.log_level())
            .without_time()
            .with_level(false)
            .with_target(false)
            .with_ansi(false)
            .finish();

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("check".to_owned())
            .spawn(move || {
                let mut check = check;
                let outcome = tracing::subscriber::with_default(subscriber, || check.run());
                // the receiver is gone if we timed out
                let _ = tx.send((check, outcome));
            });
        if let Err(e) = spawned {
            return self.error_report(&name, &Error::Io(e), "");
        }

        let received = match self.timeout {
            Some(timeout) => rx.recv_timeout(timeout),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((check, Ok(()))) => {
                let mut output = Output::new(self.verbose);
                output.add(&check);
                output.set_log(&logs.contents());
                Report {
                    output: output.to_string(),
                    exitcode: check.exitcode(),
                }
            }
            Ok((_, Err(e))) => self.error_report(&name, &e, &logs.contents()),
            Err(RecvTimeoutError::Timeout) => {
                let after = self.timeout.unwrap_or_default();
                self.error_report(&name, &Error::Timeout(after), &logs.contents())
            }
            Err(RecvTimeoutError::Disconnected) => self.report_unknown(
                &name,
                "check execution panicked",
                None,
                &logs.contents(),
            ),
        }
    }

    /// Run `check`, print the output and exit
    pub fn execute(&self, check: Check) -> ! {
        self.run(check).exit()
    }

    /// The report for an error that ended the run early
    ///
    /// In verbose mode the error details become the long output.
    pub fn report_error(&self, name: &str, error: &Error) -> Report {
        self.error_report(name, error, "")
    }

    fn error_report(&self, name: &str, error: &Error, log: &str) -> Report {
        let detail = match *error {
            Error::Timeout(_) => None,
            _ => Some(format!("{:?}", error)),
        };
        self.report_unknown(name, &error.to_string(), detail, log)
    }

    fn report_unknown(
        &self,
        name: &str,
        message: &str,
        detail: Option<String>,
        log: &str,
    ) -> Report {
        let mut output = Output::new(self.verbose);
        let prefix = if name.is_empty() {
            String::new()
        } else {
            format!("{} ", name.to_uppercase())
        };
        output.set_status(&format!(
            "{}{}: {}",
            prefix,
            ServiceState::Unknown.text().to_uppercase(),
            message
        ));
        if self.verbose > 0 {
            if let Some(detail) = detail {
                output.add_long_output(&detail);
            }
        }
        output.set_log(log);
        Report {
            output: output.to_string(),
            exitcode: ServiceState::Unknown.code(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Runtime {
        Runtime::new()
    }
}

/// Run a plugin's setup code so that every failure is reported properly
///
/// `main` builds the check, configuring the runtime on the way, e.g. with
/// the verbosity and timeout from the command line. Errors and panics in
/// `main` are reported as `UNKNOWN`; otherwise the check is executed.
pub fn guarded<F>(verbose: Option<usize>, main: F) -> !
where
    F: FnOnce(&mut Runtime) -> Result<Check>,
{
    let mut runtime = Runtime::new();
    if let Some(verbose) = verbose {
        runtime.set_verbose(verbose);
    }
    guarded_report(runtime, main).exit()
}

fn guarded_report<F>(mut runtime: Runtime, main: F) -> Report
where
    F: FnOnce(&mut Runtime) -> Result<Check>,
{
    let built = panic::catch_unwind(AssertUnwindSafe(|| main(&mut runtime)));
    match built {
        Ok(Ok(check)) => runtime.run(check),
        Ok(Err(e)) => runtime.report_error("", &e),
        Err(_) => runtime.report_unknown("", "plugin setup panicked", None, ""),
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Duration;

    use super::{guarded_report, Runtime};
    use crate::check::Check;
    use crate::context::ScalarContext;
    use crate::error::{Error, Result};
    use crate::metric::Metric;
    use crate::resource::test::Fixed;
    use crate::resource::{Metrics, Resource};

    struct World;

    impl Resource for World {
        fn probe(&self) -> Result<Metrics<'_>> {
            Ok(Metric::new("world", true).with_context("null").into())
        }
    }

    struct Sleepy;

    impl Resource for Sleepy {
        fn probe(&self) -> Result<Metrics<'_>> {
            thread::sleep(Duration::from_secs(5));
            Ok(Metrics::none())
        }
    }

    struct Exploding;

    impl Resource for Exploding {
        fn probe(&self) -> Result<Metrics<'_>> {
            panic!("boom")
        }
    }

    struct Chatty;

    impl Resource for Chatty {
        fn probe(&self) -> Result<Metrics<'_>> {
            warn!("disk is slow");
            info!("looked at the disk");
            Ok(Metric::new("disk", 1).with_context("default").into())
        }
    }

    fn world() -> Check {
        let mut check = Check::new();
        check.add_resource(World);
        check
    }

    #[test]
    fn hello_world() {
        let report = Runtime::new().with_verbose(0).run(world());
        assert_eq!(report.output, "WORLD OK\n");
        assert_eq!(report.exitcode, 0);
    }

    #[test]
    fn perfdata_by_verbosity() {
        let check = || {
            let mut check = Check::with_name("time");
            check
                .add_resource(Fixed::new(vec![Metric::new("time", 1).with_uom("s")]))
                .add_context(ScalarContext::from_specs("time", "2", "3").unwrap());
            check
        };
        assert_eq!(
            Runtime::new().with_verbose(0).run(check()).output,
            "TIME OK - time is 1s | time=1s;2;3\n"
        );
        assert_eq!(
            Runtime::new().run(check()).output,
            "TIME OK - time is 1s\n| time=1s;2;3\n"
        );
    }

    #[test]
    fn empty_check_is_unknown() {
        let mut check = Check::new();
        check.add_resource(Fixed::empty());
        let report = Runtime::new().run(check);
        assert_eq!(
            report.output,
            "FIXED UNKNOWN - no check results\nresource Fixed did not produce any metric\n"
        );
        assert_eq!(report.exitcode, 3);
    }

    #[test]
    fn logs_are_filtered_by_verbosity() {
        let check = || {
            let mut check = Check::new();
            check.add_resource(Chatty);
            check
        };
        let quiet = Runtime::new().with_verbose(1).run(check());
        assert_eq!(quiet.output, "CHATTY OK - disk is 1\ndisk is slow\n| disk=1\n");

        let loud = Runtime::new().with_verbose(2).run(check());
        assert!(loud.output.contains("looked at the disk\n"));
        assert!(loud.output.contains("running check Chatty\n"));
    }

    #[test]
    fn runs_do_not_share_logs() {
        let runtime = Runtime::new();
        let mut empty = Check::new();
        empty.add_resource(Fixed::empty());
        assert!(runtime
            .run(empty)
            .output
            .contains("resource Fixed did not produce any metric"));

        let mut second = Check::with_name("second");
        second.add_resource(World);
        assert_eq!(runtime.run(second).output, "SECOND OK\n");
    }

    #[test]
    fn timeout_is_unknown() {
        let mut check = Check::new();
        check.add_resource(Sleepy);
        let report = Runtime::new()
            .with_timeout(Some(Duration::from_secs(1)))
            .run(check);
        assert_eq!(
            report.output,
            "SLEEPY UNKNOWN: Timeout: check execution aborted after 1s\n"
        );
        assert_eq!(report.exitcode, 3);
    }

    #[test]
    fn errors_are_unknown() {
        let mut check = Check::new();
        check.add_resource(Fixed::new(vec![Metric::new("x", 1)]));
        let report = Runtime::new().with_verbose(0).run(check);
        assert_eq!(
            report.output,
            "FIXED UNKNOWN: cannot find context 'x', known contexts: default, null\n"
        );
        assert_eq!(report.exitcode, 3);

        let mut check = Check::new();
        check.add_resource(Fixed::new(vec![Metric::new("x", 1)]));
        let verbose = Runtime::new().run(check);
        assert!(verbose.output.contains("\nContextNotFound {"));
    }

    #[test]
    fn panics_are_unknown() {
        let mut check = Check::new();
        check.add_resource(Exploding);
        let report = Runtime::new().run(check);
        assert_eq!(report.output, "EXPLODING UNKNOWN: check execution panicked\n");
        assert_eq!(report.exitcode, 3);
    }

    #[test]
    fn zero_timeout_means_none() {
        assert_eq!(Runtime::new().with_timeout(Some(Duration::from_secs(0))).timeout(), None);
        assert_eq!(Runtime::new().with_verbose(7).verbose(), 3);
    }

    #[test]
    fn guarded_reports_setup_errors() {
        let report = guarded_report(Runtime::new().with_verbose(0), |_| {
            Err(Error::from("4:3".parse::<crate::range::Range>().unwrap_err()))
        });
        assert_eq!(
            report.output,
            "UNKNOWN: start 4 must not be greater than end 3\n"
        );
        assert_eq!(report.exitcode, 3);
    }

    #[test]
    fn guarded_reports_setup_panics() {
        let report = guarded_report(Runtime::new(), |_| -> Result<Check> { panic!("oops") });
        assert_eq!(report.output, "UNKNOWN: plugin setup panicked\n");
    }

    #[test]
    fn guarded_runs_the_check() {
        let report = guarded_report(Runtime::new(), |runtime| {
            runtime.set_verbose(0);
            Ok(world())
        });
        assert_eq!(report, super::Report { output: "WORLD OK\n".into(), exitcode: 0 });
    }
}
