//! Output formatting for the `dsf` commands.
//!
//! Everything a command prints goes through here so that `--output json`
//! produces one machine-readable document per line and the pretty form
//! stays readable in a terminal.

use std::io::{self, IsTerminal};

use dsfapi_client::Update;
use dsfapi_core::{Code, CodeParseError};
use serde::Serialize;

// ── Output format ───────────────────────────────────────────────────────

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Human-readable text.
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Use the explicit choice, or pretty for a TTY and JSON for pipes.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── Parsed lines ────────────────────────────────────────────────────────

/// One input line as reported by `dsf parse`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParsedLine<'a> {
    /// 1-based line number in the input.
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a Code>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print the outcome of parsing a single line.
pub(crate) fn print_parsed(line: usize, parsed: &Result<Code, CodeParseError>, format: Format) {
    match format {
        Format::Json => {
            let entry = ParsedLine {
                line,
                code: parsed.as_ref().ok(),
                error: parsed.as_ref().err().map(ToString::to_string),
            };
            match serde_json::to_string(&entry) {
                Ok(json) => println!("{json}"),
                Err(err) => eprintln!("line {line}: {err}"),
            }
        }
        Format::Pretty => match parsed {
            Ok(code) => {
                println!("{line}: {code}");
                for parameter in &code.parameters {
                    let kind = parameter.kind().to_string();
                    println!("    {:<4}{kind:<16}{}", parameter.letter(), parameter.raw_text());
                }
            }
            Err(err) => eprintln!("{line}: error: {err}"),
        },
    }
}

// ── Object model ────────────────────────────────────────────────────────

/// Print a JSON value: indented when pretty, one line when JSON.
pub(crate) fn print_value(value: &serde_json::Value, format: Format) -> anyhow::Result<()> {
    let text = match format {
        Format::Pretty => serde_json::to_string_pretty(value)?,
        Format::Json => serde_json::to_string(value)?,
    };
    println!("{text}");
    Ok(())
}

/// Print one subscription update.
pub(crate) fn print_update(update: &Update, format: Format) -> anyhow::Result<()> {
    let kind = if update.is_full() { "full" } else { "patch" };
    match format {
        Format::Json => {
            let entry = serde_json::json!({ "kind": kind, "value": update.value() });
            println!("{}", serde_json::to_string(&entry)?);
        }
        Format::Pretty => {
            println!("{kind}: {}", serde_json::to_string(update.value())?);
        }
    }
    Ok(())
}

/// Print an intercepted code and what was done with it.
pub(crate) fn print_intercepted(code: &Code, decision: &str, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => {
            let entry = serde_json::json!({
                "channel": code.channel,
                "code": code.to_string(),
                "decision": decision,
            });
            println!("{}", serde_json::to_string(&entry)?);
        }
        Format::Pretty => println!("[{}] {code} -> {decision}", code.channel),
    }
    Ok(())
}
