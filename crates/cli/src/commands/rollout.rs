//! Deployment history and rollback commands

use anyhow::Result;
use colored::Colorize;
use manager_lib::RevisionRecord;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{print_info, print_json, print_success, print_table, print_warning, OutputFormat};

/// Row for the history table
#[derive(Tabled)]
struct RevisionRow {
    #[tabled(rename = "Revision")]
    revision: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Change Cause")]
    change_cause: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "ReplicaSet")]
    replica_set: String,
}

impl RevisionRow {
    fn new(record: &RevisionRecord, current: bool) -> Self {
        let revision = if current {
            format!("{} (current)", record.revision_number)
        } else {
            record.revision_number.to_string()
        };

        Self {
            revision,
            image: record.container_image_reference.clone(),
            ready: format!(
                "{}/{}",
                record.ready_replica_count, record.desired_replica_count
            ),
            change_cause: if record.change_cause.is_empty() {
                "-".to_string()
            } else {
                record.change_cause.clone()
            },
            created: record
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            replica_set: record.source_name.clone(),
        }
    }
}

/// Show revision history, newest first
pub async fn show_history(
    client: &ApiClient,
    namespace: Option<&str>,
    deployment: &str,
    format: OutputFormat,
) -> Result<()> {
    let history = client.history(namespace, deployment).await?;

    match format {
        OutputFormat::Json => print_json(&history)?,
        OutputFormat::Table => {
            println!("{} {}", "Revision history:".bold(), deployment.cyan());

            if history.is_empty() {
                print_warning("No revisions found for this deployment");
                return Ok(());
            }

            let rows: Vec<RevisionRow> = history
                .iter()
                .enumerate()
                .map(|(i, record)| RevisionRow::new(record, i == 0))
                .collect();
            print_table(rows);
            println!("\nTotal: {} revisions", history.len());
        }
    }

    Ok(())
}

/// Roll a deployment back to `to_revision`, or to the previous revision
pub async fn rollback(
    client: &ApiClient,
    namespace: Option<&str>,
    deployment: &str,
    to_revision: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let outcome = client.rollback(namespace, deployment, to_revision).await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => {
            if outcome.applied {
                print_success(&format!(
                    "Rolled back {}/{} to revision {} ({})",
                    outcome.namespace, outcome.deployment, outcome.revision, outcome.image
                ));
            } else {
                print_info(&format!(
                    "{}/{} already runs the template of revision {}; nothing to do",
                    outcome.namespace, outcome.deployment, outcome.revision
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> RevisionRecord {
        RevisionRecord {
            revision_number: 4,
            change_cause: String::new(),
            created_at: Some(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()),
            desired_replica_count: 3,
            ready_replica_count: 2,
            container_image_reference: "nginx:1.25".to_string(),
            source_name: "web-5d8f".to_string(),
        }
    }

    #[test]
    fn test_revision_row() {
        let row = RevisionRow::new(&record(), true);

        assert_eq!(row.revision, "4 (current)");
        assert_eq!(row.ready, "2/3");
        assert_eq!(row.change_cause, "-");
        assert_eq!(row.created, "2024-05-01 12:30:00");
    }

    #[test]
    fn test_revision_row_without_timestamp() {
        let mut record = record();
        record.created_at = None;
        record.change_cause = "kubectl set image".to_string();

        let row = RevisionRow::new(&record, false);
        assert_eq!(row.revision, "4");
        assert_eq!(row.created, "-");
        assert_eq!(row.change_cause, "kubectl set image");
    }
}
