//! System status dashboard command.

use anyhow::Result;
use console::style;

use marianna_core::chat::repository::ConversationStore;
use marianna_infra::config::{gemini_api_key, process_env};

use crate::state::AppState;

/// Display the status dashboard.
///
/// Shows store counts, generator settings, and delivery pacing.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let store = state.chat_service.store();
    let conversations = store.count_conversations().await?;
    let messages = store.count_messages().await?;

    let config = &state.config;
    let key_set = gemini_api_key(process_env).is_some();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "store": {
                "backend": state.backend.to_string(),
                "conversations": conversations,
                "messages": messages,
            },
            "uploads_dir": state.uploads.root().display().to_string(),
            "generator": {
                "model": config.generator.model,
                "api_key_set": key_set,
                "timeout_secs": config.generator.timeout_secs,
            },
            "delivery": {
                "delay_ms": config.delivery.delay_ms,
                "queue_capacity": config.delivery.queue_capacity,
            },
            "persona": {
                "name": config.persona.name,
                "max_fragments": config.persona.effective_max_fragments(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Marianna v{}",
        style("💜").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Store ──").dim());
    println!("  Backend:       {}", style(state.backend).bold());
    println!("  Conversations: {}", style(conversations).bold());
    println!("  Messages:      {}", messages);
    println!();

    println!("  {}", style("── Generator ──").dim());
    println!("  Model:   {}", style(&config.generator.model).cyan());
    if key_set {
        println!("  API key: {}", style("set").green());
    } else {
        println!(
            "  API key: {} (replies fall back to stock messages)",
            style("missing").yellow()
        );
    }
    println!("  Timeout: {}s", config.generator.timeout_secs);
    println!();

    println!("  {}", style("── Delivery ──").dim());
    println!("  Persona:       {}", config.persona.name);
    println!("  Max fragments: {}", config.persona.effective_max_fragments());
    println!("  Delay:         {}ms", config.delivery.delay_ms);
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Uploads:  {}", style(state.uploads.root().display()).dim());
    println!();

    Ok(())
}
