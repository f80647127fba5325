mod cli;
mod main_lib;

use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    main_lib::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => main_lib::run(args).await,
        Command::Smoke(args) => main_lib::smoke(args).await,
        Command::Validate(args) => main_lib::validate(args),
        Command::Normalize(args) => main_lib::normalize(args),
    }
}
