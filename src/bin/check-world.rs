//! The smallest possible plugin
//!
//! Always prints `WORLD OK` and exits with 0.

use structopt::StructOpt;

use monitoring_plugin::cli::{parse_args, CommonArgs};
use monitoring_plugin::{guarded, Check, Metric, Metrics, Resource, Result};

/// Check that the world is still there
#[derive(StructOpt, Debug)]
#[structopt(name = "check-world (part of monitoring-plugin)")]
struct Args {
    #[structopt(flatten)]
    common: CommonArgs,
}

struct World;

impl Resource for World {
    fn probe(&self) -> Result<Metrics<'_>> {
        Ok(Metric::new("world", true).with_context("null").into())
    }
}

fn build_check() -> Check {
    let mut check = Check::new();
    check.add_resource(World);
    check
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args: Args = parse_args();
    guarded(Some(args.common.verbose), |runtime| {
        args.common.configure(runtime);
        Ok(build_check())
    })
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use monitoring_plugin::Runtime;

    use super::{build_check, Args};

    #[test]
    fn can_parse_args() {
        let args = Args::from_iter(vec!["check-world", "-v", "-t", "5"].into_iter());
        assert_eq!(args.common.verbose, 1);
        assert_eq!(args.common.timeout, 5);
    }

    #[test]
    fn world_is_ok() {
        let report = Runtime::new().with_verbose(0).run(build_check());
        assert_eq!(report.output, "WORLD OK\n");
        assert_eq!(report.exitcode, 0);
    }
}
