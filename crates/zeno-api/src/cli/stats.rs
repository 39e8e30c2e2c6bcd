//! Request statistics CLI command.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::json;

use zeno_core::metrics::repository::MetricsRepository;
use zeno_types::metric::{LiveRequest, TurnStats, TurnStatus};

use crate::http::handlers::admin::LIVE_REQUEST_LIMIT;
use crate::state::AppState;

/// Print last-hour aggregates and the most recent turns.
pub async fn show_stats(state: &AppState, json: bool) -> Result<()> {
    let since = chrono::Utc::now() - chrono::Duration::hours(1);
    let stats = state.metrics.stats(since).await?;
    let recent: Vec<LiveRequest> = state
        .metrics
        .recent_metrics(LIVE_REQUEST_LIMIT)
        .await?
        .into_iter()
        .map(LiveRequest::from)
        .collect();

    if json {
        let body = json!({ "stats": stats, "recent": recent });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    print_summary(&stats);

    if recent.is_empty() {
        println!("  {}", style("No turns recorded yet.").dim());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("Session").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Latency").fg(Color::White),
        Cell::new("Fallback").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for row in &recent {
        let status = match row.status {
            TurnStatus::Success => Cell::new("success").fg(Color::Green),
            TurnStatus::Failed => Cell::new("failed").fg(Color::Red),
        };
        let fallback = if row.fallback {
            Cell::new("yes").fg(Color::Yellow)
        } else {
            Cell::new("-")
        };
        table.add_row(vec![
            Cell::new(row.time.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(short_id(&row.session.to_string())),
            Cell::new(&row.model),
            Cell::new(format!("{}ms", row.latency)),
            fallback,
            status,
        ]);
    }

    println!("{table}");
    println!();
    Ok(())
}

fn print_summary(stats: &TurnStats) {
    println!();
    println!("  {}", style("Last Hour").bold());
    println!();
    println!("  {:<16} {}", style("Requests").dim(), stats.req_last_hour);
    println!(
        "  {:<16} {:.2}ms",
        style("Avg latency").dim(),
        stats.avg_latency
    );
    println!("  {:<16} {}", style("Fallbacks").dim(), stats.fallback_count);
    if !stats.model_distribution.is_empty() {
        let mix: Vec<String> = stats
            .model_distribution
            .iter()
            .map(|usage| format!("{} ({})", usage.model, usage.count))
            .collect();
        println!("  {:<16} {}", style("Models").dim(), mix.join(", "));
    }
    println!();
}

/// First eight characters of an id, enough to tell sessions apart.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
