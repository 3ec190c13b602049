//! Lazy statement stream over a line-oriented reader.

use std::io::BufRead;

use crate::error::{ClientError, Result};
use crate::input::classifier::{classify, QueryInfo};
use crate::input::tokenizer::LineTokenizer;

/// One complete statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Statement text without the trailing terminator.
    pub text: String,
    /// Line on which the statement started, 1-based.
    pub line_number: u64,
    /// Position of the statement in the stream, 0-based and dense.
    pub index: u64,
    /// Clause traits, absent when classification is disabled.
    pub info: Option<QueryInfo>,
}

/// Pulls lines from a reader and yields classified statements. Finite and
/// non-restartable; text after a terminator is carried over to the next
/// call, so a single line may yield several statements.
pub struct StatementSource<R> {
    reader: R,
    tokenizer: LineTokenizer,
    carry: String,
    line_number: u64,
    next_index: u64,
    collect_info: bool,
    exhausted: bool,
}

impl<R: BufRead> StatementSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_classification(reader, true)
    }

    pub fn without_classification(reader: R) -> Self {
        Self::with_classification(reader, false)
    }

    pub fn with_classification(reader: R, collect_info: bool) -> Self {
        Self {
            reader,
            tokenizer: LineTokenizer::new(),
            carry: String::new(),
            line_number: 0,
            next_index: 0,
            collect_info,
            exhausted: false,
        }
    }

    /// Next statement, or `None` once the reader is drained. Statements
    /// that are empty or whitespace-only are skipped.
    pub fn next_query(&mut self) -> Result<Option<Query>> {
        loop {
            let Some((text, line_number)) = self.next_statement()? else {
                return Ok(None);
            };
            if text.trim().is_empty() {
                continue;
            }
            let info = self.collect_info.then(|| classify(&text));
            let query = Query {
                text,
                line_number,
                index: self.next_index,
                info,
            };
            self.next_index += 1;
            return Ok(Some(query));
        }
    }

    fn next_statement(&mut self) -> Result<Option<(String, u64)>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut statement = String::new();
        let mut start_line = 0;
        loop {
            let chunk = if statement.is_empty() && !self.carry.is_empty() {
                std::mem::take(&mut self.carry)
            } else {
                match self.read_line()? {
                    Some(line) => line,
                    None => {
                        self.exhausted = true;
                        if self.tokenizer.in_quote() {
                            return Err(ClientError::MalformedInput(
                                "unterminated string literal at end of input".into(),
                            ));
                        }
                        // An unterminated trailing statement is dropped.
                        return Ok(None);
                    }
                }
            };
            if start_line == 0 {
                start_line = self.line_number.max(1);
            }
            let (text, terminated) = self.tokenizer.consume_line(&chunk);
            if !statement.is_empty() {
                statement.push('\n');
            }
            statement.push_str(&text);
            if terminated {
                // The consumed text is a byte prefix of the chunk and the
                // terminator is one byte, so slicing here is safe.
                self.carry = chunk[text.len() + 1..].trim().to_string();
                return Ok(Some((statement, start_line)));
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(input: &str) -> Vec<Query> {
        let mut source = StatementSource::new(Cursor::new(input.to_string()));
        let mut out = Vec::new();
        while let Some(query) = source.next_query().unwrap() {
            out.push(query);
        }
        out
    }

    #[test]
    fn statements_split_on_unquoted_semicolons() {
        let queries = drain("CREATE (n {name: \"a;b\"}); MATCH (n) RETURN n;\n");
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].text, "CREATE (n {name: \"a;b\"})");
        assert_eq!(queries[1].text, "MATCH (n) RETURN n");
        assert!(queries[0].info.unwrap().has_create);
        assert!(queries[1].info.unwrap().has_match);
    }

    #[test]
    fn indices_are_dense_and_monotonic() {
        let queries = drain("RETURN 1;\nRETURN 2;\nRETURN 3;\n");
        let indices: Vec<u64> = queries.iter().map(|q| q.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn multiline_statements_join_with_a_line_feed() {
        let queries = drain("CREATE (n\n{id: 1})\n;\n");
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].text, "CREATE (n\n{id: 1})\n");
        assert_eq!(queries[0].line_number, 1);
    }

    #[test]
    fn line_numbers_point_at_the_statement_start() {
        let queries = drain("RETURN 1;\nRETURN\n2;\n");
        assert_eq!(queries[0].line_number, 1);
        assert_eq!(queries[1].line_number, 2);
    }

    #[test]
    fn carryover_statement_keeps_its_line_number() {
        let queries = drain("RETURN 1; RETURN 2;\nRETURN 3;\n");
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[1].text, "RETURN 2");
        assert_eq!(queries[1].line_number, 1);
        assert_eq!(queries[2].line_number, 2);
    }

    #[test]
    fn empty_statements_are_skipped() {
        let queries = drain("RETURN 1;; ;\nRETURN 2;\n");
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].text, "RETURN 2");
        assert_eq!(queries[1].index, 1);
    }

    #[test]
    fn unterminated_trailing_statement_is_dropped() {
        let queries = drain("RETURN 1;\nRETURN 2\n");
        assert_eq!(queries.len(), 1);
    }

    #[test]
    fn open_quote_at_eof_is_malformed() {
        let mut source = StatementSource::new(Cursor::new("RETURN \"abc\n".to_string()));
        let err = source.next_query().unwrap_err();
        assert!(matches!(err, ClientError::MalformedInput(_)));
    }

    #[test]
    fn classification_can_be_disabled() {
        let mut source =
            StatementSource::without_classification(Cursor::new("CREATE (n);\n".to_string()));
        let query = source.next_query().unwrap().unwrap();
        assert!(query.info.is_none());
    }

    #[test]
    fn round_trip_preserves_statement_text() {
        let input = "MATCH (n) RETURN n; CREATE (m {p: ';'});\n";
        let queries = drain(input);
        let rebuilt: Vec<&str> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(rebuilt, vec!["MATCH (n) RETURN n", "CREATE (m {p: ';'})"]);
    }
}
