use std::process::ExitCode;

use limitless_pgbench::args::Args;
use limitless_pgbench::environment::Environment;
use limitless_pgbench::process::ProcessRunner;
use tracing::error;
use tracing::info;
use tracing::metadata::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        eprintln!("No arguments provided. Use --help for more information.");
        return ExitCode::FAILURE;
    }

    // pgbench reports on stdout, keep our logs off it
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let argv = match limitless_pgbench::args::utf8_argv(std::env::args_os()) {
        Ok(argv) => argv,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let args = match Args::try_parse_with_passthrough(argv) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };
    let env = Environment::from_process();
    info!(?args, %env, "Parsed arguments");

    match limitless_pgbench::run(args, &env, &mut ProcessRunner).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
