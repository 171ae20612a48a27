//! Commands that query a running handover agent

use anyhow::Result;
use colored::Colorize;
use handover_lib::registry::RegistrySnapshot;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_seconds, print_json, print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct UeRow {
    #[tabled(rename = "UE")]
    ue: String,
    #[tabled(rename = "Serving")]
    serving: String,
    #[tabled(rename = "Priority")]
    priority: u8,
    #[tabled(rename = "Last Handover")]
    last_handover: String,
    #[tabled(rename = "History")]
    history: String,
}

fn status_label<T: serde::Serialize>(status: &T) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Show agent health
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (code, health) = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            let overall = status_label(&health.status);
            println!("{} {} (HTTP {})", "Agent:".bold(), color_status(&overall), code.as_u16());

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&status_label(&component.status)),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            print_table(rows, "Agent reports no components");
        }
    }
    Ok(())
}

fn ue_rows(snapshot: &RegistrySnapshot) -> Vec<UeRow> {
    snapshot
        .ues
        .iter()
        .map(|ue| UeRow {
            ue: ue.tracker.ue_id.to_string(),
            serving: ue.tracker.current_cell.to_string(),
            priority: ue.profile.priority,
            last_handover: ue
                .tracker
                .last_handover_time
                .map(format_seconds)
                .unwrap_or_else(|| "-".to_string()),
            history: ue
                .tracker
                .cell_history
                .iter()
                .map(|r| r.cell_id.to_string())
                .collect::<Vec<_>>()
                .join(" > "),
        })
        .collect()
}

/// Show cells and UE trackers held by the agent
pub async fn show_registry(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let snapshot = client.registry().await?;

    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => {
            if snapshot.cells.is_empty() {
                print_warning("Agent has no cells registered");
            } else {
                let cells: Vec<String> = snapshot.cells.iter().map(|c| c.id.to_string()).collect();
                println!("{} {}", "Cells:".bold(), cells.join(", ").cyan());
            }
            println!();
            print_table(ue_rows(&snapshot), "No UEs registered");
        }
    }
    Ok(())
}
