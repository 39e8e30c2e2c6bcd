//! Routing policy CLI commands: show, apply.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use zeno_infra::policy_watch::apply_policy_file;
use zeno_types::policy::RoutingPolicy;

use crate::state::AppState;

/// Print the stored routing policy.
pub async fn show_policy(state: &AppState, json: bool) -> Result<()> {
    let policy = state.policy_service.current_policy().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&*policy)?);
        return Ok(());
    }

    print_policy(&policy);
    Ok(())
}

/// Validate `file` and make it the stored policy.
pub async fn apply_policy(state: &AppState, file: &Path, json: bool) -> Result<()> {
    apply_policy_file(file, &state.policy_service).await?;
    let policy = state.policy_service.current_policy().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&*policy)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Routing policy applied from {}",
        style("✓").green().bold(),
        style(file.display()).cyan()
    );
    print_policy(&policy);
    Ok(())
}

fn print_policy(policy: &RoutingPolicy) {
    println!();
    println!("  {}", style("Routing Policy").bold());
    println!();
    println!("  {:<16} {}", style("Default model").dim(), policy.default_model);
    println!("  {:<16} {}", style("Retries").dim(), policy.retry_count);
    println!("  {:<16} {}", style("Max tokens").dim(), policy.max_tokens);
    println!("  {:<16} {}", style("Memory window").dim(), policy.memory_window);
    println!("  {:<16} {}", style("System prompt").dim(), policy.system_prompt);
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Timeout").fg(Color::White),
        Cell::new("Enabled").fg(Color::White),
    ]);

    for (position, id) in policy.fallback_order.iter().enumerate() {
        let settings = policy.model(id);
        let provider = settings
            .and_then(|m| m.provider)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "default".to_string());
        let enabled = match settings.is_none_or(|m| m.enabled) {
            true => Cell::new("yes").fg(Color::Green),
            false => Cell::new("no").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(id),
            Cell::new(provider),
            Cell::new(format!("{}s", policy.timeout_for(id).as_secs())),
            enabled,
        ]);
    }

    println!("{table}");
    println!();
}
