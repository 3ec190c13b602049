//! CSV rendering for query results.

use std::io::Write;

use csv::WriterBuilder;

use crate::bolt::value::Value;
use crate::config::CsvOptions;
use crate::error::{ClientError, Result};

/// Writes header and rows as CSV. String values go out raw; every other
/// value uses its display form.
pub fn print_csv(
    out: &mut impl Write,
    header: &[String],
    records: &[Vec<Value>],
    opts: &CsvOptions,
) -> Result<()> {
    let mut builder = WriterBuilder::new();
    builder.delimiter(opts.delimiter as u8);
    builder.double_quote(opts.doublequote);
    if let Some(escape) = opts.escapechar {
        builder.escape(escape as u8);
    }
    let mut writer = builder.from_writer(out);
    writer
        .write_record(header)
        .map_err(|e| ClientError::Console(format!("CSV write failed: {e}")))?;
    for row in records {
        let fields: Vec<String> = row.iter().map(Value::csv_field).collect();
        writer
            .write_record(&fields)
            .map_err(|e| ClientError::Console(format!("CSV write failed: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| ClientError::Console(format!("CSV write failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_written_raw_and_quoted_only_when_needed() {
        let header = vec!["name".to_string(), "note".to_string()];
        let records = vec![vec![Value::from("Ada"), Value::from("a,b")]];
        let mut out = Vec::new();
        print_csv(&mut out, &header, &records, &CsvOptions::default()).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert_eq!(rendered, "name,note\nAda,\"a,b\"\n");
    }

    #[test]
    fn custom_delimiter_is_honored() {
        let header = vec!["a".to_string(), "b".to_string()];
        let records = vec![vec![Value::Integer(1), Value::Integer(2)]];
        let opts = CsvOptions {
            delimiter: '|',
            ..CsvOptions::default()
        };
        let mut out = Vec::new();
        print_csv(&mut out, &header, &records, &opts).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a|b\n1|2\n");
    }
}
