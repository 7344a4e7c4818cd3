mod cli;
mod config;
mod costs;
mod git;
mod output;
mod session;
mod trailer;
mod usage;

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cli::commit::CommitRequest;
use cli::Workspace;
use git::SystemGit;
use output::{Envelope, Status};

#[derive(Parser)]
#[command(
    name = "write-git-commit",
    about = "Git commits annotated with Claude Code session cost metrics",
    version
)]
struct Cli {
    /// Project directory (default: the git root above the current directory)
    #[arg(long, global = true, env = "CLAUDE_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// Claude data directory (default: ~/.claude)
    #[arg(long, global = true, env = "CLAUDE_CONFIG_DIR")]
    claude_dir: Option<PathBuf>,

    /// Command used to run ccusage, e.g. "bunx ccusage"
    #[arg(long, global = true, env = "CCUSAGE_BIN")]
    ccusage: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the session and fetch its validated cost metrics
    Prepare {
        #[arg(long, allow_hyphen_values = true)]
        session_id: Option<String>,
    },
    /// Commit staged changes with a cost metrics trailer
    Commit {
        /// Session id (default: the saved config)
        #[arg(long, allow_hyphen_values = true)]
        session_id: Option<String>,
        /// Cost metrics JSON array, as returned by `prepare`
        #[arg(long)]
        costs: Option<String>,
        /// Commit message (default: read from stdin)
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Save the session id to use for this project
    SaveConfig {
        #[arg(long, allow_hyphen_values = true)]
        session_id: Option<String>,
    },
    /// Show the saved session config
    CheckConfig,
    /// Show the cost metrics of the most recent annotated commit
    PreviousCosts,
    /// Show the cost breakdown of a session
    Costs {
        #[arg(long, allow_hyphen_values = true)]
        session_id: Option<String>,
        /// Exclude subagent sessions
        #[arg(long)]
        main_only: bool,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => return emit(&Envelope::error(e.to_string().trim().to_string())),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(envelope) => emit(&envelope),
        Err(e) => emit(&Envelope::error(format!("{e:#}"))),
    }
}

fn run(cli: Cli) -> anyhow::Result<Envelope> {
    let project_dir = config::detect_project_dir(cli.project_dir.as_deref())?;
    let projects_dir = config::claude_dir(cli.claude_dir.as_deref()).map(|d| config::projects_dir(&d));
    let workspace = Workspace {
        project_dir,
        projects_dir,
    };
    let gateway = || cli::build_gateway(workspace.projects_dir.as_deref(), cli.ccusage.clone());
    let git = SystemGit::new(&workspace.project_dir);

    let envelope = match cli.command {
        Commands::Prepare { session_id } => {
            cli::prepare::run(&workspace, session_id.as_deref(), &gateway(), &git)
        }
        Commands::Commit {
            session_id,
            costs,
            message,
        } => {
            let message = match message {
                Some(m) => m,
                None => read_stdin()?,
            };
            match cli::commit::session_for_commit(&workspace, session_id) {
                Ok(session_id) => {
                    let request = CommitRequest {
                        message,
                        session_id,
                        costs,
                    };
                    cli::commit::run(&request, &git)
                }
                Err(e) => Envelope::error(e.to_string()),
            }
        }
        Commands::SaveConfig { session_id } => cli::config::save(&workspace, session_id.as_deref()),
        Commands::CheckConfig => cli::config::check(&workspace, &gateway()),
        Commands::PreviousCosts => cli::costs::previous(&git),
        Commands::Costs {
            session_id,
            main_only,
        } => cli::costs::show(&workspace, session_id.as_deref(), main_only, &gateway()),
    };

    Ok(envelope)
}

/// Commit message from stdin; empty when stdin is a terminal.
fn read_stdin() -> anyhow::Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }
    let mut input = String::new();
    stdin.lock().read_to_string(&mut input)?;
    Ok(input)
}

/// Print the envelope; only `error` outcomes exit non-zero.
fn emit(envelope: &Envelope) -> ExitCode {
    if let Err(e) = output::print_json(envelope) {
        eprintln!("write-git-commit: failed to write output: {e}");
        return ExitCode::FAILURE;
    }
    if envelope.status == Status::Error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
