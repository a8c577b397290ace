//! Container usage commands

use anyhow::{Context, Result};
use colored::Colorize;
use manager_lib::{compute_usage, usage::DockerStats, UsageReport};
use std::io::Read;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_percent, format_bytes, print_json, print_table, print_warning, OutputFormat,
};

/// Row for the usage table
#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Show live usage of a container through the server
pub async fn show_container_stats(
    client: &ApiClient,
    container: &str,
    format: OutputFormat,
) -> Result<()> {
    let report = client.container_stats(container).await?;
    print_report(container, &report, format)
}

/// Compute usage from a Docker stats document on disk or stdin
pub fn compute_offline(input: &str, format: OutputFormat) -> Result<()> {
    let content = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stats from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read stats file {}", input))?
    };

    let report = report_from_stats(&content)?;
    print_report(input, &report, format)
}

fn report_from_stats(content: &str) -> Result<UsageReport> {
    let stats = DockerStats::from_json(content).context("Failed to parse Docker stats JSON")?;
    let (previous, current) = stats.snapshots();
    Ok(compute_usage(&previous, &current))
}

fn print_report(subject: &str, report: &UsageReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("{} {}", "Resource usage:".bold(), subject.cyan());

            let memory_limit = if report.memory_limit == 0 {
                "unlimited".to_string()
            } else {
                format_bytes(report.memory_limit)
            };

            print_table(vec![
                UsageRow {
                    metric: "CPU",
                    value: color_percent(report.cpu_percent),
                },
                UsageRow {
                    metric: "Memory",
                    value: format!(
                        "{} / {} ({})",
                        format_bytes(report.memory_usage),
                        memory_limit,
                        color_percent(report.memory_percent)
                    ),
                },
                UsageRow {
                    metric: "Net RX / TX",
                    value: format!(
                        "{} / {}",
                        format_bytes(report.network_rx),
                        format_bytes(report.network_tx)
                    ),
                },
                UsageRow {
                    metric: "Block Read / Write",
                    value: format!(
                        "{} / {}",
                        format_bytes(report.block_read),
                        format_bytes(report.block_write)
                    ),
                },
            ]);

            if report.counter_reset {
                print_warning("CPU counters went backwards; the container likely restarted");
            }
        }
    }

    Ok(())
}
