//! Output formatting for parse results.

use flagcap_core::{FlagState, ParseResult};
use indexmap::IndexMap;
use serde::Serialize;

/// Supported output formats.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Text,
}

/// What `parse` reports: every flag, or only the satisfied ones.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub flags: IndexMap<&'a str, &'a FlagState>,
    pub rest: &'a [String],
}

impl<'a> Report<'a> {
    pub fn new(result: &'a ParseResult, satisfied_only: bool) -> Self {
        let flags = if satisfied_only {
            result.satisfied().collect()
        } else {
            result
                .flags
                .iter()
                .map(|(name, state)| (name.as_str(), state))
                .collect()
        };
        Self {
            flags,
            rest: &result.rest,
        }
    }
}

/// Formats a report in the requested output format.
pub fn format_report(report: &Report<'_>, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Text => Ok(report_to_text(report)),
    }
}

fn report_to_text(report: &Report<'_>) -> String {
    let mut out = String::new();
    let width = report.flags.keys().map(|name| name.len()).max().unwrap_or(0);

    for (name, state) in &report.flags {
        let mark = if !state.is_present() {
            "-"
        } else if state.is_satisfied() {
            "ok"
        } else {
            "unsatisfied"
        };
        out.push_str(&format!(
            "{name:width$}  x{}  [{}]  {mark}\n",
            state.present,
            state.values.join(", ")
        ));
    }
    out.push_str(&format!("rest: [{}]\n", report.rest.join(", ")));
    out
}
