//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and dispatches into the chat
//! loop or one of the TUI-less subcommands.

pub mod ask;
pub mod model_list;
pub mod template_list;

use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::core::catalog::DEFAULT_MODEL_ID;
use crate::core::config::Config;
use crate::generation::DEFAULT_BASE_URL;
use crate::ui::chat_loop::run_chat;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser)]
#[command(name = "causerie")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A terminal chat workbench for remote generative-language models")]
#[command(
    long_about = "Causerie is a full-screen terminal chat workbench for remote \
generative-language models. Sessions, sampling parameters, and prompt templates \
are kept locally; chat history survives restarts.\n\n\
Controls:\n\
  Type              Enter your message in the input field\n\
  Enter             Send the message\n\
  Up/Down/Mouse     Scroll through chat history\n\
  Ctrl+N            Start a new chat session\n\
  Ctrl+P            Switch to the next stored session\n\
  Ctrl+T            Toggle light/dark theme\n\
  Ctrl+C            Quit\n\n\
Commands:\n\
  /help             List the available slash commands\n\
  /model <id>       Switch the model for the active session\n\
  /temp <value>     Adjust the sampling temperature\n\
  /template ...     Manage reusable prompt templates"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for new sessions
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Base URL of the generation endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Write diagnostic logging to the given file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send one prompt and print the reply
    Ask {
        /// The prompt to send
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// List the available models
    Models,
    /// List the available prompt templates
    Templates,
}

pub(crate) fn resolve_base_url(cli: Option<String>, config: &Config) -> String {
    cli.or_else(|| config.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

pub(crate) fn resolve_model(cli: Option<String>, config: &Config) -> String {
    cli.or_else(|| config.default_model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string())
}

fn init_tracing(log_file: Option<&str>, interactive: bool) -> Result<(), Box<dyn Error>> {
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(std::sync::Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None if !interactive => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(std::io::stderr)
                .init();
        }
        // The TUI owns the terminal; without a log file, tracing stays off.
        None => {}
    }
    Ok(())
}

pub fn run() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_run())
}

async fn async_run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Commands::Chat);
    let interactive = matches!(command, Commands::Chat);
    init_tracing(args.log.as_deref(), interactive)?;

    match command {
        Commands::Chat => run_chat(args.model, args.base_url).await,
        Commands::Ask { prompt } => ask::run_ask(prompt, args.model, args.base_url).await,
        Commands::Models => model_list::run(args.base_url).await,
        Commands::Templates => template_list::run(args.base_url).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_beats_config_beats_builtin() {
        let config = Config {
            base_url: Some("http://config:1".to_string()),
            default_model: Some("gemini-pro".to_string()),
        };

        assert_eq!(
            resolve_base_url(Some("http://flag:2".to_string()), &config),
            "http://flag:2"
        );
        assert_eq!(resolve_base_url(None, &config), "http://config:1");
        assert_eq!(resolve_base_url(None, &Config::default()), DEFAULT_BASE_URL);

        assert_eq!(
            resolve_model(Some("custom".to_string()), &config),
            "custom"
        );
        assert_eq!(resolve_model(None, &config), "gemini-pro");
        assert_eq!(resolve_model(None, &Config::default()), DEFAULT_MODEL_ID);
    }
}
