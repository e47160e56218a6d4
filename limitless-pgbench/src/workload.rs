use std::fmt::Display;
use std::str::FromStr;

use tracing::info;

use crate::args::Args;
use crate::error::Error;
use crate::error::Result;
use crate::error::Stage;
use crate::process::Invocation;
use crate::process::Program;
use crate::process::Runner;
use crate::scripts;
use crate::topology::Target;

/// Shard-aware replacements for the pgbench builtin scripts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Workload {
    SimpleUpdate,
    SelectOnly,
    TpcbLike,
}

impl Display for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::SimpleUpdate => "simple-update",
                Self::SelectOnly => "select-only",
                Self::TpcbLike => "tpcb-like",
            }
        )
    }
}

impl FromStr for Workload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple-update" => Ok(Self::SimpleUpdate),
            "select-only" => Ok(Self::SelectOnly),
            "tpcb-like" => Ok(Self::TpcbLike),
            other => Err(Error::InvalidWorkload(other.to_owned())),
        }
    }
}

impl Workload {
    pub fn script(&self) -> &'static str {
        match self {
            Self::SimpleUpdate => scripts::SIMPLE_UPDATE,
            Self::SelectOnly => scripts::SELECT_ONLY,
            Self::TpcbLike => scripts::TPCB_LIKE,
        }
    }

    /// The script as sent to pgbench, optionally inside a pipeline.
    pub fn render(&self, pipelined: bool) -> String {
        if pipelined {
            format!("\\startpipeline\n{}\n\\endpipeline\n", self.script().trim())
        } else {
            self.script().to_owned()
        }
    }
}

/// Stream a named workload to pgbench, spreading clients over the router hosts.
pub async fn run_limitless(
    runner: &mut dyn Runner,
    target: &Target,
    workload: Workload,
    args: &Args,
) -> Result<()> {
    let mut flags = args.bench_flags();
    if let Some(scale) = args.scale {
        flags.push("-s".to_owned());
        flags.push(scale.to_string());
    }
    // pipelines need the extended query protocol
    if args.pipelined && !selects_protocol(&flags) {
        flags.push("-M".to_owned());
        flags.push("extended".to_owned());
    }

    info!(%workload, pipelined = args.pipelined, clients = args.clients, "Running limitless workload");
    Invocation::new(Program::Pgbench)
        .args(&target.connection)
        .envs(&target.env)
        .env("PGLOADBALANCEHOSTS", "random")
        .args(flags)
        .arg("--file=-")
        .stdin(workload.render(args.pipelined))
        .run_stage(runner, Stage::LimitlessWorkload)
        .await?;
    Ok(())
}

/// Run pgbench exactly as asked, with no script of ours.
pub async fn run_passthrough(runner: &mut dyn Runner, target: &Target, args: &Args) -> Result<()> {
    let invocation = Invocation::new(Program::Pgbench)
        .args(&target.connection)
        .envs(&target.env)
        .args(args.bench_flags());
    info!(%invocation, "Running pgbench");
    invocation.run_stage(runner, Stage::Passthrough).await?;
    Ok(())
}

fn selects_protocol(flags: &[String]) -> bool {
    flags
        .iter()
        .any(|f| f.starts_with("-M") || f.starts_with("--protocol"))
}
