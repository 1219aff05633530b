//! Output formatting for CLI commands.
//!
//! Module results are printed as the JSON document Ansible expects on
//! stdout. The text format renders the same data for humans.

use colored::Colorize;
use serde_json::{Map, Value, json};
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::error::MetalError;
use crate::reconciler::Outcome;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Field row for table display.
#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a module outcome.
    #[must_use]
    pub fn format_outcome(&self, outcome: &Outcome) -> String {
        match self.format {
            OutputFormat::Json => outcome.to_json().to_string(),
            OutputFormat::Text => {
                let status = if outcome.changed {
                    "changed".yellow()
                } else {
                    "ok".green()
                };
                let mut output = format!("{status}\n");
                if !outcome.fields.is_empty() {
                    output.push_str(&Self::field_table(&outcome.fields));
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats a failure.
    #[must_use]
    pub fn format_failure(&self, error: &MetalError) -> String {
        match self.format {
            OutputFormat::Json => failure_json(error).to_string(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "{} [{}] {error}",
                    "Error".red().bold(),
                    error.kind()
                );
                let context = error.context();
                if !context.is_empty() {
                    output.push_str(&Self::field_table(&context));
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats an arbitrary JSON result such as a lookup.
    #[must_use]
    pub fn format_value(&self, value: &Value) -> String {
        match self.format {
            OutputFormat::Json => value.to_string(),
            OutputFormat::Text => serde_json::to_string_pretty(value).unwrap_or_default(),
        }
    }

    fn field_table(fields: &Map<String, Value>) -> String {
        let rows: Vec<FieldRow> = fields
            .iter()
            .map(|(field, value)| FieldRow {
                field: field.clone(),
                value: match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
            .collect();
        Table::new(rows).to_string()
    }
}

/// The failure document: `{"failed": true, "msg", "kind", ...context}`.
#[must_use]
pub fn failure_json(error: &MetalError) -> Value {
    let mut body = error.context();
    body.insert(String::from("failed"), Value::Bool(true));
    body.insert(String::from("msg"), json!(error.to_string()));
    body.insert(String::from("kind"), json!(error.kind()));
    Value::Object(body)
}
