//! Quote-aware splitting of input lines into statement text.
//!
//! A statement ends at the first semicolon that is not inside a string
//! literal. Quote and escape state carries across lines, so a statement may
//! span any number of lines and a single line may hold several statements.

/// Per-stream tokenizer state. All state is explicit so the tokenizer is
/// reentrant and independent of where the lines come from.
#[derive(Debug, Default)]
pub struct LineTokenizer {
    quote: Option<char>,
    escaped: bool,
}

impl LineTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the stream position is inside an unterminated string
    /// literal. At end of input this means the input was malformed.
    pub fn in_quote(&self) -> bool {
        self.quote.is_some()
    }

    /// Consumes one line up to the first unquoted `;`. Returns the text
    /// consumed (the terminator excluded) and whether a terminator was hit.
    /// The returned text is always a byte-exact prefix of `line`.
    pub fn consume_line(&mut self, line: &str) -> (String, bool) {
        let mut out = String::with_capacity(line.len());
        for c in line.chars() {
            if self.quote.is_some() && c == '\\' {
                // Escaping only matters inside quotation, where it keeps an
                // escaped quote character from ending the literal.
                self.escaped = !self.escaped;
                out.push(c);
                continue;
            }
            if (self.quote.is_none() && (c == '"' || c == '\''))
                || (!self.escaped && self.quote == Some(c))
            {
                self.quote = match self.quote {
                    Some(_) => None,
                    None => Some(c),
                };
            } else if self.quote.is_none() && c == ';' {
                return (out, true);
            }
            out.push(c);
            self.escaped = false;
        }
        (out, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consume(line: &str) -> (String, bool) {
        LineTokenizer::new().consume_line(line)
    }

    #[test]
    fn plain_statement_terminates_at_semicolon() {
        let (text, done) = consume("RETURN 1; RETURN 2;");
        assert_eq!(text, "RETURN 1");
        assert!(done);
    }

    #[test]
    fn quoted_semicolon_is_not_a_terminator() {
        let (text, done) = consume(r#"CREATE (n {name: "a;b"});"#);
        assert_eq!(text, r#"CREATE (n {name: "a;b"})"#);
        assert!(done);
    }

    #[test]
    fn single_quotes_also_guard_semicolons() {
        let (text, done) = consume("CREATE (n {name: 'x;y'});");
        assert_eq!(text, "CREATE (n {name: 'x;y'})");
        assert!(done);
    }

    #[test]
    fn escaped_quote_keeps_the_literal_open() {
        let (text, done) = consume(r#"RETURN "a\";b";"#);
        assert_eq!(text, r#"RETURN "a\";b""#);
        assert!(done);
    }

    #[test]
    fn double_backslash_cancels_the_escape() {
        let (text, done) = consume(r#"RETURN "a\\";"#);
        assert_eq!(text, r#"RETURN "a\\""#);
        assert!(done);
    }

    #[test]
    fn quote_state_carries_across_lines() {
        let mut tok = LineTokenizer::new();
        let (first, done) = tok.consume_line("RETURN \"a");
        assert_eq!(first, "RETURN \"a");
        assert!(!done);
        assert!(tok.in_quote());
        let (second, done) = tok.consume_line("b\";");
        assert_eq!(second, "b\"");
        assert!(done);
        assert!(!tok.in_quote());
    }

    #[test]
    fn unterminated_line_reports_not_done() {
        let (text, done) = consume("MATCH (n) RETURN n");
        assert_eq!(text, "MATCH (n) RETURN n");
        assert!(!done);
    }

    #[test]
    fn consumed_text_is_a_prefix_of_the_line() {
        let line = "MATCH (n) RETURN n; trailing";
        let (text, done) = consume(line);
        assert!(done);
        assert_eq!(&line[..text.len()], text);
        assert_eq!(&line[text.len() + 1..], " trailing");
    }
}
