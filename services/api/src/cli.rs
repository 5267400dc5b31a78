use crate::replay;
use crate::server;
use clap::{Args, Parser, Subcommand};
use incentives::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Incentives Worker",
    about = "Process prisoner life-cycle events and keep incentive review schedules current",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consume events from stdin and expose operational endpoints (default command)
    Serve(ServeArgs),
    /// Process a file of events against reference data and print the resulting histories
    Replay(ReplayArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON file with levels, prison levels and prisoners; starts empty when omitted
    #[arg(long)]
    pub(crate) reference_data: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// JSON file with levels, prison levels and prisoners
    #[arg(long)]
    pub(crate) reference_data: PathBuf,
    /// Newline-delimited inbound events, processed in file order
    #[arg(long)]
    pub(crate) events: PathBuf,
    /// Clock used for summaries, formatted YYYY-MM-DDTHH:MM:SS (defaults to local now)
    #[arg(long)]
    pub(crate) now: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Replay(args) => replay::run(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_without_subcommand() {
        let cli = Cli::try_parse_from(["incentives"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn replay_requires_reference_data_and_events() {
        let result = Cli::try_parse_from(["incentives", "replay", "--events", "events.ndjson"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "incentives",
            "replay",
            "--reference-data",
            "reference.json",
            "--events",
            "events.ndjson",
            "--now",
            "2024-03-01T09:00:00",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Replay(args)) => {
                assert_eq!(args.reference_data, PathBuf::from("reference.json"));
                assert_eq!(args.now.as_deref(), Some("2024-03-01T09:00:00"));
            }
            other => panic!("expected replay command, got {other:?}"),
        }
    }
}
