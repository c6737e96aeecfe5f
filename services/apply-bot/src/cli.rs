use crate::commands::{self, AnswersCommand, ApplyArgs, JobsCommand};
use crate::server;
use clap::{Args, Parser, Subcommand};
use quick_apply::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "apply-bot",
    about = "Fill and submit quick-apply job forms and review the answers they need",
    version
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Start the answer review HTTP service (default command)
    Serve(ServeArgs),
    /// Apply to pending jobs through the configured WebDriver session
    Apply(ApplyArgs),
    /// Inspect and verify stored answers
    Answers {
        #[command(subcommand)]
        command: AnswersCommand,
    },
    /// Manage the job queue
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Apply(args) => commands::run_apply(args).await,
        Command::Answers { command } => commands::run_answers(command),
        Command::Jobs { command } => commands::run_jobs(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["apply-bot"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn apply_accepts_a_limit() {
        let cli = Cli::try_parse_from(["apply-bot", "apply", "--limit", "3"]).expect("parses");
        match cli.command {
            Some(Command::Apply(args)) => assert_eq!(args.limit, Some(3)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn approve_collects_repeated_values() {
        let cli = Cli::try_parse_from([
            "apply-bot",
            "answers",
            "approve",
            "--question",
            "Languages",
            "--value",
            "Rust",
            "--value",
            "Go",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Answers {
                command: AnswersCommand::Approve(args),
            }) => {
                assert_eq!(args.question, "Languages");
                assert_eq!(args.value, ["Rust", "Go"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn requeue_flag_defaults_off() {
        let cli = Cli::try_parse_from(["apply-bot", "jobs", "requeue"]).expect("parses");
        match cli.command {
            Some(Command::Jobs {
                command: JobsCommand::Requeue(args),
            }) => assert!(!args.include_failed),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
