//! `causerie models`: print the model catalog.

use std::error::Error;

use tracing::debug;

use crate::cli::resolve_base_url;
use crate::core::catalog::builtin_models;
use crate::core::config::Config;
use crate::generation::GenerationClient;

pub async fn run(base_url: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let base_url = resolve_base_url(base_url, &config);
    let client = GenerationClient::new(&base_url);

    let models = match client.fetch_models().await {
        Ok(models) => models,
        Err(e) => {
            debug!(error = %e, "model catalog endpoint unavailable");
            eprintln!("Catalog endpoint unreachable ({base_url}); showing the builtin catalog.");
            builtin_models()
        }
    };

    for model in models {
        let marker = if model.disabled { "  (disabled)" } else { "" };
        println!("{:<16} {} [{}]{}", model.id, model.name, model.provider, marker);
        if !model.description.is_empty() {
            println!("{:<16} {}", "", model.description);
        }
    }

    Ok(())
}
