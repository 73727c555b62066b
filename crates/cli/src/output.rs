//! Report rendering for the terminal
//!
//! Tables and plain text are for people; JSON and YAML go to stdout untouched
//! so they can be piped. Status lines always go to stderr.

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
    /// `header: value` lines, one block per row
    Plain,
}

impl OutputFormat {
    pub fn is_machine_readable(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

/// A row in a report table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print report rows. `empty` is shown instead of an empty table.
pub fn print_rows<T: Serialize + TableDisplay>(rows: &[T], format: OutputFormat, empty: &str) {
    if format.is_machine_readable() {
        print_value(rows, format);
        return;
    }
    if rows.is_empty() {
        println!("{}", empty);
        return;
    }

    if let OutputFormat::Table = format {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(T::headers());
        for row in rows {
            table.add_row(row.row());
        }
        println!("{table}");
        return;
    }

    let headers = T::headers();
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        for (header, value) in headers.iter().zip(row.row()) {
            println!("{}: {}", header, value);
        }
    }
}

/// Serialize `value` as YAML, or as pretty JSON for every other format
pub fn print_value<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
    };
    match rendered {
        Ok(text) => print!("{}", text),
        Err(e) => print_error(&format!("cannot render report: {}", e)),
    }
}

pub fn print_success(message: &str) {
    eprintln!("✅ {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

pub fn print_warning(message: &str) {
    eprintln!("⚠️  {}", message);
}
