use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use probeline_barrier::Segment;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    command: &'a str,
    line_count: usize,
    lines: &'a [String],
    text: String,
    timestamp: String,
}

pub fn print_response(command: &str, segment: &Segment, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                command,
                line_count: segment.len(),
                lines: segment.lines(),
                text: segment.text(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "LINES", "RESPONSE"])
                .add_row(vec![
                    command.to_string(),
                    segment.len().to_string(),
                    segment.text(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("> {command}");
            for line in segment.lines() {
                println!("  {line}");
            }
        }
        OutputFormat::Raw => {
            if !segment.is_empty() {
                print_raw(&segment.text());
            }
        }
    }
}

fn print_raw(text: &str) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
