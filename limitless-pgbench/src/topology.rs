use tracing::info;
use tracing::warn;

use crate::args::Args;
use crate::args::Connection;
use crate::environment::Environment;
use crate::error::Error;
use crate::error::Result;
use crate::error::Stage;
use crate::process::Invocation;
use crate::process::Program;
use crate::process::Runner;
use crate::scripts;

/// What the clients should connect to for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Connection tokens placed right after the client binary.
    pub connection: Vec<String>,
    pub env: Vec<(String, String)>,
    pub limitless: bool,
}

/// Detect a Limitless cluster and, if found, swap the host for its router endpoints.
pub async fn probe(
    runner: &mut dyn Runner,
    connection: &Connection,
    args: &Args,
    env: &Environment,
) -> Result<Target> {
    let endpoint = connection
        .host
        .as_deref()
        .or_else(|| env.host())
        .unwrap_or("<default>");
    info!(endpoint, "Checking for a Limitless cluster");

    let detected = query(runner, connection, scripts::DETECT_LIMITLESS).await?;
    let count = detected
        .parse::<u64>()
        .map_err(|_| Error::UnexpectedOutput {
            query: scripts::DETECT_LIMITLESS,
            output: detected.clone(),
        })?;

    if count == 0 {
        return Ok(Target {
            connection: connection.flags(),
            env: connection.env(),
            limitless: false,
        });
    }

    info!("Limitless cluster detected, discovering router endpoints");
    let routers = query(runner, connection, scripts::ROUTER_ENDPOINTS).await?;
    if !args.initialize && args.limitless_workload().is_none() {
        return Err(Error::LimitlessRequiresMode);
    }

    let connection_flags = if routers.is_empty() {
        warn!(endpoint, "No router endpoints reported, keeping the given host");
        connection.flags()
    } else {
        info!(%routers, "Discovered router endpoints");
        connection.limitless_flags(&routers)
    };
    Ok(Target {
        connection: connection_flags,
        env: connection.env(),
        limitless: true,
    })
}

async fn query(runner: &mut dyn Runner, connection: &Connection, sql: &str) -> Result<String> {
    let completed = Invocation::new(Program::Psql)
        .args(connection.flags())
        .args(["-Aqt", "-c", sql])
        .envs(&connection.env())
        .capture()
        .run_stage(runner, Stage::Probe)
        .await?;
    Ok(completed.stdout.trim().to_owned())
}
