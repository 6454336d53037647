//! Markdown rendering of the alert report.
//!
//! Owners and admins are rendered once and repeated on every row, one row
//! per alert in fetch order.

use crate::github::{Alert, Contact};
use serde::Serialize;

pub const TITLE: &str = "## Dependabot Alerts";
const HEADER: &str =
    "| SI No | Org/Repo Name | Org Owners | Repo Admins | Package Name | Severity | Summary | Status |";
const SEPARATOR: &str =
    "|-------|---------------|------------|-------------|--------------|----------|---------|--------|";

const UNKNOWN: &str = "Unknown";
const NO_SUMMARY: &str = "No summary available";
const NO_EMAIL: &str = "No email";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub index: usize,
    pub label: String,
    pub owners: String,
    pub admins: String,
    pub package: String,
    pub severity: String,
    pub summary: String,
    pub status: String,
}

/// `login (email)` for each resolved contact, comma separated. Skipped
/// contacts are left out.
pub fn contacts_line(contacts: &[Contact]) -> String {
    contacts
        .iter()
        .filter_map(Contact::detail)
        .map(|user| {
            format!(
                "{} ({})",
                user.login,
                user.email.as_deref().unwrap_or(NO_EMAIL)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_rows(
    org: &str,
    repo: &str,
    alerts: &[Alert],
    owners: &[Contact],
    admins: &[Contact],
) -> Vec<ReportRow> {
    let label = format!("{org}/{repo}");
    let owners = contacts_line(owners);
    let admins = contacts_line(admins);

    alerts
        .iter()
        .enumerate()
        .map(|(i, alert)| ReportRow {
            index: i + 1,
            label: label.clone(),
            owners: owners.clone(),
            admins: admins.clone(),
            package: alert.package.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            severity: alert.severity.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            summary: alert
                .summary
                .clone()
                .unwrap_or_else(|| NO_SUMMARY.to_string()),
            status: alert.status.to_string(),
        })
        .collect()
}

pub fn render_markdown(rows: &[ReportRow]) -> String {
    let mut lines = vec![TITLE.to_string(), String::new(), HEADER.to_string(), SEPARATOR.to_string()];
    for row in rows {
        let cells = [
            row.index.to_string(),
            escape_cell(&row.label),
            escape_cell(&row.owners),
            escape_cell(&row.admins),
            escape_cell(&row.package),
            escape_cell(&row.severity),
            escape_cell(&row.summary),
            escape_cell(&row.status),
        ];
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn escape_cell(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('|', "\\|")
}
