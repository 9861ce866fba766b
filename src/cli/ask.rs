//! TUI-less one-shot prompt: run a single exchange and print the reply.
//!
//! The exchange goes through the same session manager as the chat loop, so
//! the conversation lands in the persisted history and shows up the next
//! time the interactive interface opens.

use std::error::Error;

use crate::cli::{resolve_base_url, resolve_model};
use crate::core::config::Config;
use crate::core::manager::{run_exchange, SessionManager};
use crate::core::params::ModelParameters;
use crate::generation::GenerationClient;
use crate::persistence::HistoryStore;

pub async fn run_ask(
    prompt: Vec<String>,
    model: Option<String>,
    base_url: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: causerie ask <prompt>");
        std::process::exit(1);
    }

    let config = Config::load()?;
    let base_url = resolve_base_url(base_url, &config);
    let model = resolve_model(model, &config);

    let mut manager = SessionManager::hydrate(HistoryStore::open());
    let session_id = manager
        .create_session(&model, ModelParameters::default())
        .id
        .clone();

    let client = GenerationClient::new(base_url);
    match run_exchange(&mut manager, &client, &session_id, &prompt).await {
        Some(Ok(text)) => {
            println!("{text}");
            Ok(())
        }
        Some(Err(error)) => {
            // The recorded reply is the degraded fallback or the apology;
            // print it so the output matches what the chat would show.
            if let Some(reply) = manager
                .session(&session_id)
                .and_then(|s| s.messages.last())
                .filter(|m| m.is_assistant())
            {
                println!("{}", reply.content);
            }
            eprintln!("error: {error}");
            std::process::exit(1);
        }
        None => {
            eprintln!("Nothing to send.");
            Ok(())
        }
    }
}
