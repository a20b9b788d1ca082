use crate::demo::{run_allocate, run_demo, AllocateArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use scholar_panels::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Scholar Panels",
    about = "Allocate interview panels, score candidates and forward results",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk through allocation, scoring and a panel added mid-session
    Demo(DemoArgs),
    /// Import a candidate export and print balanced panel rosters
    Allocate(AllocateArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Candidate export (CSV) to seed the in-memory store with
    #[arg(long)]
    pub(crate) candidates_csv: Option<PathBuf>,
    /// Number of panels to seat at startup
    #[arg(long, default_value_t = 0)]
    pub(crate) panels: u32,
    /// Evaluators per generated panel (1-3)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub(crate) evaluators: u8,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            candidates_csv: None,
            panels: 0,
            evaluators: 2,
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Allocate(args) => run_allocate(args),
    }
}
