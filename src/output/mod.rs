//! Result rendering and console echo helpers.

pub mod csv;
pub mod table;

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::bolt::QueryData;
use crate::config::{CsvOptions, OutputFormat, OutputOptions};
use crate::error::Result;

/// Prints a result set to stdout in the configured format.
pub fn print(data: &QueryData, output: &OutputOptions, csv_opts: &CsvOptions) -> Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    match output.format {
        OutputFormat::Tabular => table::print_tabular(&mut lock, &data.header, &data.records),
        OutputFormat::Csv => csv::print_csv(&mut lock, &data.header, &data.records, csv_opts),
    }
}

pub fn echo_failure(what: &str, explanation: &str) {
    eprintln!("{what}: {explanation}");
}

pub fn echo_info(message: &str) {
    println!("{message}");
}

pub fn echo_stats(stats: &BTreeMap<String, i64>) {
    let rendered: Vec<String> = stats
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();
    println!("{}", rendered.join(", "));
}

pub fn echo_notification(notification: &BTreeMap<String, String>) {
    for (key, value) in notification {
        println!("{key}: {value}");
    }
}

pub fn echo_execution_info(info: &BTreeMap<String, f64>) {
    let mut lock = io::stdout().lock();
    for (key, value) in info {
        let _ = writeln!(lock, "{key}: {value:.6}");
    }
}
