//! ASCII table rendering for query results.

use std::io::Write;

use crate::bolt::value::Value;
use crate::error::Result;

const MARGIN: usize = 1;

fn column_widths(header: &[String], records: &[Vec<Value>]) -> Vec<usize> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in records {
        for (i, value) in row.iter().enumerate() {
            if i >= widths.len() {
                widths.push(0);
            }
            widths[i] = widths[i].max(value.to_string().chars().count());
        }
    }
    widths
}

fn write_separator(out: &mut impl Write, widths: &[usize]) -> Result<()> {
    for width in widths {
        write!(out, "+{}", "-".repeat(width + 2 * MARGIN))?;
    }
    writeln!(out, "+")?;
    Ok(())
}

fn write_row(out: &mut impl Write, widths: &[usize], cells: &[String]) -> Result<()> {
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        write!(out, "|{0}{1:<2$}{0}", " ".repeat(MARGIN), cell, width)?;
    }
    writeln!(out, "|")?;
    Ok(())
}

/// Renders header and rows as a boxed table sized to the widest cell of
/// each column.
pub fn print_tabular(
    out: &mut impl Write,
    header: &[String],
    records: &[Vec<Value>],
) -> Result<()> {
    if header.is_empty() && records.is_empty() {
        return Ok(());
    }
    let widths = column_widths(header, records);
    write_separator(out, &widths)?;
    write_row(out, &widths, header)?;
    write_separator(out, &widths)?;
    for row in records {
        let cells: Vec<String> = row.iter().map(Value::to_string).collect();
        write_row(out, &widths, &cells)?;
    }
    write_separator(out, &widths)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sized_to_the_widest_cell() {
        let header = vec!["n".to_string(), "name".to_string()];
        let records = vec![
            vec![Value::Integer(1), Value::from("Ada")],
            vec![Value::Integer(2), Value::from("Grace")],
        ];
        let mut out = Vec::new();
        print_tabular(&mut out, &header, &records).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        let expected = "\
+---+---------+
| n | name    |
+---+---------+
| 1 | \"Ada\"   |
| 2 | \"Grace\" |
+---+---------+
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn empty_result_prints_nothing() {
        let mut out = Vec::new();
        print_tabular(&mut out, &[], &[]).unwrap();
        assert!(out.is_empty());
    }
}
