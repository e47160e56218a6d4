use std::io;

use tracing::info;

use crate::environment::Environment;
use crate::error::Error;
use crate::error::Result;
use crate::process::Invocation;
use crate::process::Program;
use crate::process::Runner;

/// Fail fast unless both clients run and a password is available.
pub async fn check(runner: &mut dyn Runner, env: &Environment) -> Result<()> {
    for program in [Program::Pgbench, Program::Psql] {
        let invocation = Invocation::new(program).arg("-V").capture();
        match runner.execute(&invocation).await {
            Ok(completed) if completed.success() => {
                info!(version = completed.stdout.trim(), "Found {program}")
            }
            Ok(_) => {
                return Err(Error::MissingBinary {
                    binary: program.binary(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::MissingBinary {
                    binary: program.binary(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !env.has_password() {
        return Err(Error::MissingPassword);
    }
    Ok(())
}
