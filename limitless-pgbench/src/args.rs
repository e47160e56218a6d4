use std::ffi::OsString;

use clap::CommandFactory;
use clap::Parser;

use crate::environment::Environment;
use crate::error::Error;

/// Run pgbench against an Aurora Limitless Database cluster.
///
/// Any argument not listed here is handed to pgbench unchanged.
#[derive(Debug, clap::Parser)]
#[clap(
    name = "limitless-pgbench",
    disable_help_flag = true,
    args_override_self = true
)]
pub struct Args {
    /// Print help.
    #[clap(long, action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// Database server host, or a Limitless endpoint.
    #[clap(short = 'h', long, default_value = "")]
    pub host: String,

    #[clap(short = 'p', long)]
    pub port: Option<u16>,

    #[clap(short = 'd', long, default_value = "")]
    pub dbname: String,

    #[clap(short = 'U', long, default_value = "")]
    pub username: String,

    /// Scale factor; 100000 accounts per unit.
    #[clap(short = 's', long)]
    pub scale: Option<u32>,

    /// Create and populate the sharded pgbench tables.
    #[clap(short = 'i', long)]
    pub initialize: bool,

    /// Number of concurrent pgbench clients.
    #[clap(short = 'c', long, default_value = "1")]
    pub clients: u32,

    /// Shard-aware workload: simple-update, select-only or tpcb-like.
    #[clap(long)]
    pub limitless_workload: Option<String>,

    #[clap(short = 'f', long)]
    pub file: Option<String>,

    #[clap(short = 'b', long)]
    pub builtin: Option<String>,

    /// Wrap the limitless workload in a pgbench pipeline.
    #[clap(long)]
    pub pipelined: bool,

    /// Unrecognised arguments, forwarded to pgbench.
    #[clap(skip)]
    pub passthrough: Vec<String>,
}

impl Args {
    /// Parse `argv`, splitting off every token this wrapper does not know about.
    pub fn try_parse_with_passthrough<I, S>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (known, passthrough) = split_known(argv.into_iter().map(Into::into));
        let mut args = Self::try_parse_from(known)?;
        args.passthrough = passthrough;
        Ok(args)
    }

    pub fn limitless_workload(&self) -> Option<&str> {
        self.limitless_workload.as_deref().filter(|w| !w.is_empty())
    }

    pub fn connection(&self, env: &Environment) -> Connection {
        let database = if self.dbname.is_empty() {
            env.database().or_else(|| env.login_name()).map(str::to_owned)
        } else {
            Some(self.dbname.clone())
        };
        Connection {
            host: non_empty(&self.host),
            port: self.port,
            username: non_empty(&self.username),
            database,
        }
    }

    /// Flags for pgbench: client count, passthrough tokens, then any script selection.
    pub fn bench_flags(&self) -> Vec<String> {
        let mut flags = vec!["-c".to_owned(), self.clients.to_string()];
        flags.extend(self.passthrough.iter().cloned());
        if let Some(file) = self.file.as_deref().filter(|f| !f.is_empty()) {
            flags.push("-f".to_owned());
            flags.push(file.to_owned());
        }
        if let Some(builtin) = self.builtin.as_deref().filter(|b| !b.is_empty()) {
            flags.push("-b".to_owned());
            flags.push(builtin.to_owned());
        }
        flags
    }
}

/// Convert argv to strings, refusing tokens that would not reach pgbench intact.
pub fn utf8_argv<I>(argv: I) -> Result<Vec<String>, Error>
where
    I: IntoIterator<Item = OsString>,
{
    argv.into_iter()
        .map(|arg| {
            arg.into_string()
                .map_err(|arg| Error::NonUtf8Argument(arg.to_string_lossy().into_owned()))
        })
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_owned())
}

/// Split argv into the tokens clap should parse and the ones pgbench should get.
///
/// The first token is the binary name and always stays on the known side.
fn split_known(mut tokens: impl Iterator<Item = String>) -> (Vec<String>, Vec<String>) {
    let command = Args::command();
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    known.extend(tokens.next());

    while let Some(token) = tokens.next() {
        if token == "--" {
            unknown.extend(tokens.by_ref());
            break;
        }

        // (argument, whether its value is the next token)
        let matched = if let Some(long) = token.strip_prefix("--") {
            let (name, inline) = match long.split_once('=') {
                Some((name, _)) => (name, true),
                None => (long, false),
            };
            command
                .get_arguments()
                .find(|a| a.get_long() == Some(name))
                .filter(|a| !inline || a.get_action().takes_values())
                .map(|a| (a, !inline))
        } else if let Some(short) = token.strip_prefix('-') {
            let mut chars = short.chars();
            chars.next().and_then(|c| {
                let attached = !chars.as_str().is_empty();
                command
                    .get_arguments()
                    .find(|a| a.get_short() == Some(c))
                    .filter(|a| !attached || a.get_action().takes_values())
                    .map(|a| (a, !attached))
            })
        } else {
            None
        };

        match matched {
            Some((arg, value_follows)) => {
                known.push(token);
                if value_follows && arg.get_action().takes_values() {
                    known.extend(tokens.next());
                }
            }
            None => unknown.push(token),
        }
    }

    (known, unknown)
}

/// Where and as whom the clients connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub database: Option<String>,
}

impl Connection {
    /// `-h`, `-p` and `-U` tokens for whichever values were given.
    pub fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(host) = &self.host {
            flags.push("-h".to_owned());
            flags.push(host.clone());
        }
        if let Some(port) = self.port {
            flags.push("-p".to_owned());
            flags.push(port.to_string());
        }
        if let Some(username) = &self.username {
            flags.push("-U".to_owned());
            flags.push(username.clone());
        }
        flags
    }

    /// Connection tokens pointing at a comma-separated set of router hosts.
    pub fn limitless_flags(&self, routers: &str) -> Vec<String> {
        let mut flags = Connection {
            host: Some(routers.to_owned()),
            ..self.clone()
        }
        .flags();
        if let Some(database) = &self.database {
            flags.push("-d".to_owned());
            flags.push(database.clone());
        }
        flags
    }

    /// Environment applied to every child client.
    pub fn env(&self) -> Vec<(String, String)> {
        self.database
            .iter()
            .map(|db| ("PGDATABASE".to_owned(), db.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_with_passthrough(
            std::iter::once("limitless-pgbench").chain(argv.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn known_flags_are_parsed() {
        let args = parse(&[
            "-h",
            "cluster.example.com",
            "--port=5433",
            "-U",
            "admin",
            "-s",
            "2",
            "-i",
            "-c4",
            "--limitless-workload",
            "tpcb-like",
            "--pipelined",
        ]);
        assert_eq!(args.host, "cluster.example.com");
        assert_eq!(args.port, Some(5433));
        assert_eq!(args.username, "admin");
        assert_eq!(args.scale, Some(2));
        assert!(args.initialize);
        assert_eq!(args.clients, 4);
        assert_eq!(args.limitless_workload(), Some("tpcb-like"));
        assert!(args.pipelined);
        assert!(args.passthrough.is_empty());
    }

    #[test]
    fn unknown_tokens_pass_through_in_order() {
        let args = parse(&["-c", "8", "-T", "60", "--progress=5", "-j", "2", "-P5"]);
        assert_eq!(args.clients, 8);
        assert_eq!(args.passthrough, ["-T", "60", "--progress=5", "-j", "2", "-P5"]);
    }

    #[test]
    fn repeated_flags_keep_the_last_value() {
        let args = parse(&["-c", "4", "-T", "60", "-c", "8", "--scale=2", "-s", "3"]);
        assert_eq!(args.clients, 8);
        assert_eq!(args.scale, Some(3));
        assert_eq!(args.passthrough, ["-T", "60"]);
    }

    #[test]
    fn utf8_arguments_convert_unchanged() {
        let argv = utf8_argv(["limitless-pgbench", "-f", "bench.sql"].map(OsString::from)).unwrap();
        assert_eq!(argv, ["limitless-pgbench", "-f", "bench.sql"]);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_arguments_are_refused() {
        use std::os::unix::ffi::OsStringExt;

        let argv = vec![
            OsString::from("limitless-pgbench"),
            OsString::from("-f"),
            OsString::from_vec(b"caf\xe9.sql".to_vec()),
        ];
        let err = utf8_argv(argv).unwrap_err();
        assert!(matches!(err, Error::NonUtf8Argument(ref arg) if arg == "caf\u{FFFD}.sql"));
    }

    #[test]
    fn everything_after_double_dash_passes_through() {
        let args = parse(&["-c", "2", "--", "-c", "9"]);
        assert_eq!(args.clients, 2);
        assert_eq!(args.passthrough, ["-c", "9"]);
    }

    #[test]
    fn flags_with_attached_text_are_not_mistaken_for_switches() {
        // -i takes no value, so -iX is not ours
        let args = parse(&["-iX"]);
        assert!(!args.initialize);
        assert_eq!(args.passthrough, ["-iX"]);
    }

    #[test]
    fn bench_flags_follow_client_count_with_passthrough_then_scripts() {
        let args = parse(&["-c", "3", "-T", "10", "-f", "custom.sql", "-b", "select-only"]);
        assert_eq!(
            args.bench_flags(),
            ["-c", "3", "-T", "10", "-f", "custom.sql", "-b", "select-only"]
        );
    }

    #[test]
    fn bench_flags_default_to_one_client() {
        let args = parse(&["-h", "db"]);
        assert_eq!(args.bench_flags(), ["-c", "1"]);
    }

    #[test]
    fn connection_flags_only_include_given_values() {
        let env = Environment::default();
        assert_eq!(
            parse(&["-h", "db", "-p", "5432", "-U", "u"])
                .connection(&env)
                .flags(),
            ["-h", "db", "-p", "5432", "-U", "u"]
        );
        assert!(parse(&["-c", "1"]).connection(&env).flags().is_empty());
    }

    #[test]
    fn database_prefers_flag_then_environment_then_login() {
        let env = Environment::from_pairs([("PGDATABASE", "envdb"), ("USER", "alice")]);
        assert_eq!(
            parse(&["-d", "flagdb"]).connection(&env).database.as_deref(),
            Some("flagdb")
        );
        assert_eq!(
            parse(&["-c", "1"]).connection(&env).database.as_deref(),
            Some("envdb")
        );

        let env = Environment::from_pairs([("USER", "alice")]);
        let connection = parse(&["-c", "1"]).connection(&env);
        assert_eq!(
            connection.env(),
            [("PGDATABASE".to_owned(), "alice".to_owned())]
        );
    }

    #[test]
    fn limitless_flags_swap_in_routers_and_name_the_database() {
        let env = Environment::default();
        let connection = parse(&["-h", "ep", "-U", "admin", "-d", "bench"]).connection(&env);
        assert_eq!(
            connection.limitless_flags("r1,r2"),
            ["-h", "r1,r2", "-U", "admin", "-d", "bench"]
        );
    }
}
