//! Pixlink CLI - share, tag, discuss and generate images from the terminal

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::chat::run_chat;
use crate::commands::common::{AppContext, GlobalOptions};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::gallery::run_gallery;
use crate::commands::generate::run_generate;
use crate::commands::image::run_image;
use crate::commands::language::run_language;
use crate::commands::profile::run_profile;
use crate::commands::upload::run_upload;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(error.exit_code());
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "pixlink=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        db_path: cli.db_path,
        storage_dir: cli.storage_dir,
        profile: cli.profile,
    };

    match cli.command {
        Commands::Auth { command } => run_auth(command, &options).await,
        Commands::Config { command } => run_config(command, &options),
        Commands::Language { command } => run_language(command),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Gallery {
            search,
            json,
            watch,
        } => {
            let context = AppContext::open(&options).await?;
            run_gallery(&context, search.as_deref(), json, watch).await
        }
        Commands::Image { command } => {
            let context = AppContext::open(&options).await?;
            run_image(command, &context).await
        }
        Commands::Upload { file, tags } => {
            let context = AppContext::open(&options).await?;
            run_upload(&context, &file, &tags).await
        }
        Commands::Generate {
            prompt,
            publish,
            save,
        } => {
            let context = AppContext::open(&options).await?;
            run_generate(&context, &prompt, publish, save.as_deref()).await
        }
        Commands::Chat { command } => {
            let context = AppContext::open(&options).await?;
            run_chat(command, &context).await
        }
        Commands::Profile { command } => {
            let context = AppContext::open(&options).await?;
            run_profile(command, &context).await
        }
    }
}
