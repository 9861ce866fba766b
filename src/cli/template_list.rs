//! `causerie templates`: print the prompt-template catalog.

use std::error::Error;

use chrono::Utc;
use tracing::debug;

use crate::cli::resolve_base_url;
use crate::core::config::Config;
use crate::core::templates::TemplateStore;
use crate::generation::GenerationClient;

pub async fn run(base_url: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let base_url = resolve_base_url(base_url, &config);
    let client = GenerationClient::new(&base_url);

    let entries: Vec<(String, String, String)> = match client.fetch_templates().await {
        Ok(templates) => templates
            .into_iter()
            .map(|t| (t.id, t.name, t.content))
            .collect(),
        Err(e) => {
            debug!(error = %e, "template catalog endpoint unavailable");
            eprintln!("Catalog endpoint unreachable ({base_url}); showing the builtin templates.");
            TemplateStore::with_builtins(Utc::now())
                .list()
                .iter()
                .map(|t| (t.id.clone(), t.name.clone(), t.content.clone()))
                .collect()
        }
    };

    for (id, name, content) in entries {
        let preview = content.lines().next().unwrap_or_default();
        println!("{:<4} {}", id, name);
        if !preview.is_empty() {
            println!("{:<4} {}", "", preview);
        }
    }

    Ok(())
}
