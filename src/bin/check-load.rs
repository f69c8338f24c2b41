//! Check the load average of the system
//!
//! Load average is the number of processes *waiting* to do work in a queue, either
//! due to IO or CPU constraints. The numbers used to check are the load averaged
//! over 1, 5 and 15 minutes, respectively

#[macro_use]
extern crate lazy_static;

use std::fs;
use std::ops::Div;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use structopt::StructOpt;
use tracing::debug;

use monitoring_plugin::cli::{parse_args, CommonArgs};
use monitoring_plugin::{
    guarded, Check, Error, Metric, Metrics, MultiArg, Resource, Result, Results, ScalarContext,
    Summary,
};

const METRICS: [&str; 3] = ["load1", "load5", "load15"];

lazy_static! {
    static ref SEPARATOR: Regex = Regex::new(r"[ ,]").unwrap();
}

/// Check the load average of the system
///
/// Load average is the number of processes *waiting* to do work in a queue, either
/// due to IO or CPU constraints. The numbers used to check are the load averaged
/// over 1, 5 and 15 minutes, respectively
#[derive(Debug, StructOpt)]
#[structopt(
    name = "check-load (part of monitoring-plugin)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        short = "w",
        long = "warn",
        help = "Averages to warn at, as ranges for 1, 5 and 15 minutes",
        default_value = "5,3.5,2.5"
    )]
    warn: MultiArg,
    #[structopt(
        short = "c",
        long = "crit",
        help = "Averages to go critical at, as ranges for 1, 5 and 15 minutes",
        default_value = "10,5,3"
    )]
    crit: MultiArg,
    #[structopt(
        long = "per-cpu",
        help = "Divide the load average by the number of processors on the \
                system."
    )]
    per_cpu: bool,
    #[structopt(flatten)]
    common: CommonArgs,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct LoadAvg {
    one: f64,
    five: f64,
    fifteen: f64,
}

impl Div<usize> for LoadAvg {
    type Output = LoadAvg;

    /// Divide by an integer. Useful to divide by the number of CPUs
    fn div(self, rhs: usize) -> LoadAvg {
        LoadAvg {
            one: self.one / rhs as f64,
            five: self.five / rhs as f64,
            fifteen: self.fifteen / rhs as f64,
        }
    }
}

impl FromStr for LoadAvg {
    type Err = Error;

    fn from_str(contents: &str) -> Result<LoadAvg> {
        let malformed = || Error::abort(format!("malformed load average '{}'", contents.trim()));
        let fields = SEPARATOR
            .split(contents.trim())
            .take(3)
            .map(|load| load.parse::<f64>().map_err(|_| malformed()))
            .collect::<Result<Vec<f64>>>()?;
        match fields[..] {
            [one, five, fifteen] => Ok(LoadAvg { one, five, fifteen }),
            _ => Err(malformed()),
        }
    }
}

/// Number of processors listed in a /proc/stat file
fn count_cpus(stat: &str) -> usize {
    stat.lines()
        .filter(|line| {
            line.starts_with("cpu")
                && line[3..].chars().next().map_or(false, |c| c.is_ascii_digit())
        })
        .count()
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::abort(format!("cannot read {}: {}", path.display(), e)))
}

struct Load {
    per_cpu: bool,
    loadavg: PathBuf,
    stat: PathBuf,
}

impl Load {
    fn system(per_cpu: bool) -> Load {
        Load {
            per_cpu,
            loadavg: PathBuf::from("/proc/loadavg"),
            stat: PathBuf::from("/proc/stat"),
        }
    }
}

impl Resource for Load {
    fn probe(&self) -> Result<Metrics<'_>> {
        let actual: LoadAvg = read(&self.loadavg)?.parse()?;
        let cpus = if self.per_cpu {
            count_cpus(&read(&self.stat)?).max(1)
        } else {
            1
        };
        debug!("dividing load average {:?} by {} cpus", actual, cpus);
        let actual = actual / cpus;
        Ok([actual.one, actual.five, actual.fifteen]
            .iter()
            .zip(METRICS.iter())
            .map(|(&value, &name)| Metric::new(name, value).with_min(0.0))
            .collect())
    }
}

/// `loadavg is 0.52, 0.58, 0.59` when everything is fine
struct LoadSummary {
    per_cpu: bool,
}

impl Summary for LoadSummary {
    fn ok(&self, results: &Results) -> String {
        let values = METRICS
            .iter()
            .filter_map(|name| results.by_name(name).ok())
            .filter_map(|result| result.metric.as_ref())
            .map(|metric| metric.to_string())
            .collect::<Vec<_>>();
        format!(
            "loadavg {}is {}",
            if self.per_cpu { "per cpu " } else { "" },
            values.join(", ")
        )
    }
}

fn build_check(args: &Args, load: Load) -> Result<Check> {
    let mut check = Check::new();
    check.add_resource(load);
    for (i, name) in METRICS.iter().enumerate() {
        check.add_context(ScalarContext::from_specs(
            *name,
            args.warn.get(i).unwrap_or(""),
            args.crit.get(i).unwrap_or(""),
        )?);
    }
    check.set_summary(LoadSummary {
        per_cpu: args.per_cpu,
    });
    Ok(check)
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args: Args = parse_args();
    guarded(Some(args.common.verbose), |runtime| {
        args.common.configure(runtime);
        build_check(&args, Load::system(args.per_cpu))
    })
}
