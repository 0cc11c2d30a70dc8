mod credentials;
mod engine;
mod exa;
mod openai;
mod pipeline;
mod report;
mod server;

pub const USER_AGENT: &str = concat!("lumen/", env!("CARGO_PKG_VERSION"));

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "lumen", version, about = "Answer questions from LLM-suggested web sources")]
struct Cli {
    /// Completion model (overrides OPENAI_MODEL, default gpt-4o-mini)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one query and print the answer
    Ask {
        /// The question; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Print the pipeline state as JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lumen=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let engine = engine::from_env(cli.model)
        .inspect_err(|e| tracing::error!("cannot start: {e}"))?;

    match cli.command {
        Command::Ask { query, json } => {
            let query = query.join(" ");
            let state = engine.answer(&query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print!("{}", report::format_report(&state, &query));
            }
            Ok(if state.error.is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Serve { bind } => {
            info!("starting lumen HTTP server");
            server::serve(server::AppState::new(engine), bind)
                .await
                .inspect_err(|e| tracing::error!("server error: {e}"))?;
            info!("server stopped, API clients released");
            Ok(ExitCode::SUCCESS)
        }
    }
}
