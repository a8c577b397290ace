//! Server health command

use anyhow::Result;
use colored::Colorize;
use manager_lib::ComponentStatus;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct HealthSummary {
    health: manager_lib::HealthResponse,
    readiness: manager_lib::ReadinessResponse,
}

fn status_name(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "healthy",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "unhealthy",
    }
}

/// Show liveness and readiness of the server
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    match format {
        OutputFormat::Json => print_json(&HealthSummary { health, readiness })?,
        OutputFormat::Table => {
            println!("{}", "Server Health".bold());
            println!("{}", "=".repeat(40));
            println!("Status:  {}", color_status(status_name(health.status)));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            match &readiness.reason {
                Some(reason) => println!("Ready:   {} ({})", color_status(ready), reason),
                None => println!("Ready:   {}", color_status(ready)),
            }
            println!();

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(status_name(component.status)),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            print_table(rows);
        }
    }

    Ok(())
}
