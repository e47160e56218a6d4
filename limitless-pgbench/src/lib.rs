use tracing::info;

use crate::args::Args;
use crate::environment::Environment;
use crate::error::Result;
use crate::process::Runner;
use crate::workload::Workload;

pub mod args;
pub mod environment;
pub mod error;
pub mod init;
pub mod prereq;
pub mod process;
pub mod scripts;
pub mod topology;
pub mod workload;

/// Scale used for `--initialize` when none is given.
pub const DEFAULT_SCALE: u32 = 1;

/// Check the clients, resolve the cluster's endpoints, then initialize or benchmark.
pub async fn run(args: Args, env: &Environment, runner: &mut dyn Runner) -> Result<()> {
    prereq::check(runner, env).await?;

    let connection = args.connection(env);
    let target = topology::probe(runner, &connection, &args, env).await?;

    if args.initialize {
        let scale = args.scale.unwrap_or(DEFAULT_SCALE);
        init::initialize(runner, &target, scale, args.clients).await
    } else if let Some(name) = args.limitless_workload() {
        let workload = name.parse::<Workload>()?;
        workload::run_limitless(runner, &target, workload, &args).await
    } else {
        info!("No limitless workload requested, running pgbench as given");
        workload::run_passthrough(runner, &target, &args).await
    }
}
