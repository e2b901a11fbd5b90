//! Export rendering.
//!
//! A thin serialization layer over bulk export: records reaching this
//! module are already authorized and already decrypted. No security logic
//! lives here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use keyhaven_store::models::Environment;

/// Output format for a bulk export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Dotenv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "dotenv" | "env" => Ok(Self::Dotenv),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// One decrypted record in an export payload.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedSecret {
    pub name: String,
    pub value: String,
    pub description: Option<String>,
    pub environment: Environment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Render records in the requested format.
#[must_use]
pub fn render(format: ExportFormat, records: &[ExportedSecret]) -> String {
    match format {
        ExportFormat::Json => {
            // Plain structs with string keys — serialization cannot fail.
            serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_owned())
        }
        ExportFormat::Csv => render_csv(records),
        ExportFormat::Dotenv => render_dotenv(records),
    }
}

fn render_csv(records: &[ExportedSecret]) -> String {
    let mut out = String::from("name,value,description,environment,created_at,updated_at\n");
    for record in records {
        let row = [
            csv_field(&record.name),
            csv_field(&record.value),
            csv_field(record.description.as_deref().unwrap_or("")),
            csv_field(&record.environment.to_string()),
            csv_field(&record.created_at.to_rfc3339()),
            csv_field(&record.updated_at.to_rfc3339()),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn render_dotenv(records: &[ExportedSecret]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.name);
        out.push('=');
        if record.value.contains(['\n', '"', ' ', '#']) {
            out.push('"');
            out.push_str(
                &record
                    .value
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n"),
            );
            out.push('"');
        } else {
            out.push_str(&record.value);
        }
        out.push('\n');
    }
    out
}
