use std::fmt::Display;
use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;
use crate::error::Stage;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Program {
    Psql,
    Pgbench,
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary())
    }
}

impl Program {
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Psql => "psql",
            Self::Pgbench => "pgbench",
        }
    }
}

/// One run of an external client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: Program,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Script written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    /// Collect stdout instead of passing it through.
    pub capture: bool,
}

impl Invocation {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            capture: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<'a, I>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        self.env.extend(envs.into_iter().cloned());
        self
    }

    pub fn stdin(mut self, script: impl Into<String>) -> Self {
        self.stdin = Some(script.into());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Run to completion, mapping a non-zero exit to a failure of `stage`.
    pub async fn run_stage(&self, runner: &mut dyn Runner, stage: Stage) -> Result<Completed> {
        let completed = runner.execute(self).await?;
        if completed.success() {
            Ok(completed)
        } else {
            debug!(program = %self.program, code = ?completed.code, ?stage, "Client failed");
            Err(Error::StageFailed(stage))
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    /// `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
}

impl Completed {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
pub trait Runner: Send {
    async fn execute(&mut self, invocation: &Invocation) -> io::Result<Completed>;
}

/// Spawns the clients found on `PATH`.
#[derive(Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl Runner for ProcessRunner {
    async fn execute(&mut self, invocation: &Invocation) -> io::Result<Completed> {
        debug!(%invocation, "Spawning client");
        let mut child = Command::new(invocation.program.binary())
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stdout(if invocation.capture {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .spawn()?;

        if let (Some(script), Some(mut stdin)) = (&invocation.stdin, child.stdin.take()) {
            match stdin.write_all(script.as_bytes()).await {
                // the child exited early, its status says why
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(program = %invocation.program, "Client closed stdin early")
                }
                res => res?,
            }
        }

        let output = child.wait_with_output().await?;
        Ok(Completed {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
pub mod fake {
    use std::collections::VecDeque;

    use super::*;

    /// Records every invocation and answers with scripted results.
    ///
    /// Once the script runs out every call succeeds with empty output.
    #[derive(Debug, Default)]
    pub struct FakeRunner {
        pub calls: Vec<Invocation>,
        responses: VecDeque<io::Result<Completed>>,
    }

    impl FakeRunner {
        /// A runner whose first two answers satisfy the version checks.
        pub fn with_clients() -> Self {
            Self::default()
                .respond(0, "pgbench (PostgreSQL) 16.1\n")
                .respond(0, "psql (PostgreSQL) 16.1\n")
        }

        pub fn respond(mut self, code: i32, stdout: &str) -> Self {
            self.responses.push_back(Ok(Completed {
                code: Some(code),
                stdout: stdout.to_owned(),
            }));
            self
        }

        pub fn fail(mut self, kind: io::ErrorKind) -> Self {
            self.responses.push_back(Err(kind.into()));
            self
        }

        pub fn programs(&self) -> Vec<Program> {
            self.calls.iter().map(|c| c.program).collect()
        }
    }

    #[async_trait]
    impl Runner for FakeRunner {
        async fn execute(&mut self, invocation: &Invocation) -> io::Result<Completed> {
            self.calls.push(invocation.clone());
            self.responses.pop_front().unwrap_or_else(|| {
                Ok(Completed {
                    code: Some(0),
                    stdout: String::new(),
                })
            })
        }
    }
}
