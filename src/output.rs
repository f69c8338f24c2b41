//! Rendering of the text a plugin prints
//!
//! ```text
//! NAME STATE - summary | perfdata
//! long output lines
//! log messages
//! warnings
//! | perfdata (verbose mode)
//! ```
//!
//! The pipe character separates performance data from text in the plugin
//! API, so it is removed from every section and a warning is added for each
//! section that contained one.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;

use crate::check::Check;

const ILLEGAL: &[char] = &['|'];

/// The complete output of one plugin run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Output {
    verbose: usize,
    status: String,
    long_output: Vec<String>,
    log: String,
    warnings: Vec<String>,
    long_perfdata: Vec<String>,
}

impl Output {
    pub fn new(verbose: usize) -> Output {
        Output {
            verbose,
            ..Output::default()
        }
    }

    /// Take status line, perfdata and, if verbose, long output from `check`
    pub fn add(&mut self, check: &Check) {
        self.status = self.format_status(check);
        let perfdata = self.format_perfdata(check);
        if self.verbose == 0 {
            if !perfdata.is_empty() {
                self.status.push(' ');
                self.status.push_str(&perfdata);
            }
        } else {
            for line in check.verbose_str() {
                self.add_long_output(&line);
            }
            self.long_perfdata.push(perfdata);
        }
    }

    /// `NAME STATE - summary`
    pub fn format_status(&mut self, check: &Check) -> String {
        let name = check.name();
        let summary = check.summary_str();
        let summary = summary.trim();
        let status = format!(
            "{}{}{}",
            if name.is_empty() {
                String::new()
            } else {
                format!("{} ", name.to_uppercase())
            },
            check.state().text().to_uppercase(),
            if summary.is_empty() {
                String::new()
            } else {
                format!(" - {}", summary)
            }
        );
        self.screen(&status, "status line")
    }

    /// `| token token ...`, or nothing if there is no performance data
    pub fn format_perfdata(&mut self, check: &Check) -> String {
        if check.perfdata().is_empty() {
            return String::new();
        }
        let joined = check.perfdata().join(" ");
        format!("| {}", self.screen(&joined, "perfdata"))
    }

    /// Replace the status line
    pub fn set_status(&mut self, status: &str) {
        self.status = self.screen(status, "status line");
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn add_long_output(&mut self, text: &str) {
        let screened = self.screen(text, "long output");
        self.long_output.push(screened);
    }

    /// Captured log messages, printed after the long output
    pub fn set_log(&mut self, text: &str) {
        self.log = self.screen(text, "logging output");
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn screen(&mut self, text: &str, location: &str) -> String {
        let text = text.trim_end_matches('\n');
        let screened: String = text.chars().filter(|c| !ILLEGAL.contains(c)).collect();
        if screened.len() != text.len() {
            let removed: BTreeSet<char> = text.chars().filter(|c| ILLEGAL.contains(c)).collect();
            self.warnings.push(format!(
                "warning: removed illegal characters ({}) from {}",
                removed.iter().map(|&c| format!("0x{:x}", c as u32)).join(", "),
                location
            ));
        }
        screened
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines = Some(&self.status)
            .into_iter()
            .chain(&self.long_output)
            .chain(Some(&self.log))
            .chain(&self.warnings)
            .chain(&self.long_perfdata)
            .filter(|line| !line.is_empty())
            .join("\n");
        writeln!(f, "{}", lines)
    }
}

#[cfg(test)]
mod test {
    use super::Output;
    use crate::check::Check;
    use crate::context::ScalarContext;
    use crate::metric::Metric;
    use crate::resource::test::Fixed;

    fn check(metrics: Vec<Metric>) -> Check {
        let mut check = Check::new();
        check.add_resource(Fixed::new(metrics));
        check.add_context(ScalarContext::from_specs("time", "1", "2").unwrap());
        check.run().unwrap();
        check
    }

    #[test]
    fn quiet_puts_perfdata_on_status_line() {
        let mut out = Output::new(0);
        out.add(&check(vec![Metric::new("time", 1).with_uom("s")]));
        assert_eq!(out.to_string(), "FIXED OK - time is 1s | time=1s;1;2\n");
    }

    #[test]
    fn verbose_puts_perfdata_last() {
        let mut out = Output::new(1);
        out.add(&check(vec![Metric::new("time", 3).with_uom("s")]));
        out.set_log("something happened\n");
        assert_eq!(
            out.to_string(),
            "FIXED CRITICAL - time is 3s (outside range 0:2)\n\
             critical: time is 3s (outside range 0:2)\n\
             something happened\n\
             | time=3s;1;2\n"
        );
    }

    #[test]
    fn empty_sections_are_skipped() {
        let mut out = Output::new(0);
        out.set_status("UNKNOWN");
        out.set_log("");
        out.add_long_output("");
        assert_eq!(out.to_string(), "UNKNOWN\n");
    }

    #[test]
    fn pipes_are_removed_with_a_warning() {
        let mut out = Output::new(0);
        out.set_status("OK - a|b");
        out.add_long_output("long|output");
        out.set_log("log|\n");
        assert_eq!(
            out.to_string(),
            "OK - ab\n\
             longoutput\n\
             log\n\
             warning: removed illegal characters (0x7c) from status line\n\
             warning: removed illegal characters (0x7c) from long output\n\
             warning: removed illegal characters (0x7c) from logging output\n"
        );
        assert_eq!(out.warnings().len(), 3);
    }

    #[test]
    fn perfdata_is_screened() {
        let mut out = Output::new(0);
        out.add(&check(vec![Metric::new("a|b", 1).with_context("time")]));
        assert_eq!(out.status(), "FIXED OK - ab is 1 | 'ab'=1;1;2");
        assert_eq!(
            out.warnings().to_vec(),
            vec![
                "warning: removed illegal characters (0x7c) from status line",
                "warning: removed illegal characters (0x7c) from perfdata",
            ]
        );
    }
}
