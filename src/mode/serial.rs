//! Strictly serial import: statements run one at a time in input order.

use std::io;

use crate::bolt::{Connector, SessionFactory};
use crate::config::{BoltConfig, CsvOptions, OutputOptions};
use crate::error::Result;
use crate::input::StatementSource;
use crate::output::{self, echo_failure};

/// The first failing statement aborts the whole run.
pub fn run(config: &BoltConfig, output_opts: &OutputOptions, csv_opts: &CsvOptions) -> Result<()> {
    let connector = Connector::new(config.clone());
    let mut session = connector.open()?;
    let stdin = io::stdin();
    let mut source = StatementSource::without_classification(stdin.lock());
    while let Some(query) = source.next_query()? {
        match session.run(&query.text) {
            Ok(data) => {
                if !data.records.is_empty() {
                    output::print(&data, output_opts, csv_opts)?;
                }
            }
            Err(err) => {
                echo_failure("Failed query", &query.text);
                return Err(err);
            }
        }
    }
    Ok(())
}
