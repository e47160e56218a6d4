use tracing::info;

use crate::error::Result;
use crate::error::Stage;
use crate::process::Invocation;
use crate::process::Program;
use crate::process::Runner;
use crate::scripts;
use crate::topology::Target;

/// Create, load and finalize the pgbench tables.
///
/// Each step must succeed before the next starts. Nothing is rolled back on
/// failure; the tables stay as they were for inspection.
pub async fn initialize(
    runner: &mut dyn Runner,
    target: &Target,
    scale: u32,
    clients: u32,
) -> Result<()> {
    info!(scale, limitless = target.limitless, "Creating pgbench tables");
    psql(target)
        .args(["-v".to_owned(), format!("scale={scale}")])
        .stdin(scripts::INIT_SCHEMA)
        .run_stage(runner, Stage::InitSchema)
        .await?;

    info!(clients, "Loading pgbench_accounts");
    Invocation::new(Program::Pgbench)
        .args(&target.connection)
        .envs(&target.env)
        .args(["-n".to_owned(), format!("-c{clients}"), "-t1".to_owned(), "-f-".to_owned()])
        .stdin(scripts::LOAD_ACCOUNTS)
        .run_stage(runner, Stage::LoadAccounts)
        .await?;

    info!("Adding primary keys and freezing tables");
    psql(target)
        .arg("-f-")
        .stdin(scripts::FINALIZE_INIT)
        .run_stage(runner, Stage::FinalizeInit)
        .await?;

    info!(
        branches = scale,
        tellers = u64::from(scale) * scripts::TELLERS_PER_BRANCH,
        accounts = *scripts::account_range(u64::from(scale)).end(),
        "Initialization complete"
    );
    Ok(())
}

fn psql(target: &Target) -> Invocation {
    Invocation::new(Program::Psql)
        .args(&target.connection)
        .envs(&target.env)
        .args(["-v", "ON_ERROR_STOP=1"])
}
