use std::fmt::Display;
use std::io;

/// A step of the run that delegates to an external client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    InitSchema,
    LoadAccounts,
    FinalizeInit,
    LimitlessWorkload,
    Passthrough,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Probe => "Failed to query the cluster topology.",
                Self::InitSchema => "Failed to initialize pgbench.",
                Self::LoadAccounts => "Failed to load pgbench accounts.",
                Self::FinalizeInit => "Failed to finalize pgbench initialization.",
                Self::LimitlessWorkload => "Failed to run limitless workload benchmark.",
                Self::Passthrough => "Failed to run pgbench.",
            }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{binary} is not in the PATH")]
    MissingBinary { binary: &'static str },

    #[error("argument is not valid UTF-8: {0}")]
    NonUtf8Argument(String),

    #[error("PGPASSWORD must be set as an environment variable")]
    MissingPassword,

    #[error(
        "The --limitless-workload argument must be provided for a limitless cluster unless \
         --initialize is used."
    )]
    LimitlessRequiresMode,

    #[error("Invalid limitless-workload set: {0}")]
    InvalidWorkload(String),

    #[error("{0}")]
    StageFailed(Stage),

    #[error("unexpected output from `{query}`: {output:?}")]
    UnexpectedOutput { query: &'static str, output: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
