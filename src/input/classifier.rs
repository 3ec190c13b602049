//! Keyword-level classification of statements.
//!
//! A character state machine recognizes a fixed set of top-level clause
//! keywords without parsing the query language. Matching is anchored: a
//! keyword counts only when it forms a whole word starting at a word
//! boundary, so keywords embedded in identifiers, labels or string literals
//! are never collected. The machine advances only outside string literals
//! and is O(input length) with no backtracking.

use serde::Serialize;

/// Clause traits observed anywhere in one statement body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryInfo {
    pub has_create: bool,
    pub has_match: bool,
    pub has_merge: bool,
    pub has_detach_delete: bool,
    pub has_create_index: bool,
    pub has_drop_index: bool,
    pub has_remove: bool,
    pub has_storage_mode: bool,
}

/// First word of a recognized clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head {
    Create,
    Match,
    Merge,
    Detach,
    Drop,
    Storage,
}

impl Head {
    fn word(self) -> &'static str {
        match self {
            Head::Create => "CREATE",
            Head::Match => "MATCH",
            Head::Merge => "MERGE",
            Head::Detach => "DETACH",
            Head::Drop => "DROP",
            Head::Storage => "STORAGE",
        }
    }

    /// Heads whose clause completes on an opening parenthesis.
    fn takes_paren(self) -> bool {
        matches!(self, Head::Create | Head::Match | Head::Merge)
    }
}

/// Second word of a multi-word clause, or `REMOVE` after a closing `)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    CreateIndex,
    DropIndex,
    DetachDelete,
    StorageMode,
    Remove,
}

impl Tail {
    fn word(self) -> &'static str {
        match self {
            Tail::CreateIndex | Tail::DropIndex => "INDEX",
            Tail::DetachDelete => "DELETE",
            Tail::StorageMode => "MODE",
            Tail::Remove => "REMOVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At a word boundary; the next word may anchor a clause.
    Start,
    /// Matched the first `1`-based count of characters of a head word.
    InHead(Head, usize),
    /// Head word completed at a whitespace boundary; a follower word or an
    /// opening parenthesis may still complete the clause.
    Gap(Head),
    /// Matching the follower word.
    InTail(Tail, usize),
    /// An unquoted `)` just ended a token.
    CloseParen,
    /// `)` followed by whitespace; `REMOVE` may start here.
    ParenGap,
    /// Inside a word that can no longer match; sleeps until a boundary.
    Dead,
}

/// Streaming collector. Feed characters, then take the traits out.
#[derive(Debug)]
pub struct ClauseMachine {
    state: State,
    quote: Option<char>,
    escaped: bool,
    info: QueryInfo,
}

impl Default for ClauseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ClauseMachine {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            quote: None,
            escaped: false,
            info: QueryInfo::default(),
        }
    }

    pub fn feed(&mut self, c: char) {
        if self.quote.is_some() {
            if c == '\\' {
                self.escaped = !self.escaped;
                return;
            }
            if !self.escaped && self.quote == Some(c) {
                self.quote = None;
            }
            self.escaped = false;
            return;
        }
        if c == '"' || c == '\'' {
            self.resolve_tail();
            self.quote = Some(c);
            self.state = State::Start;
            return;
        }
        if is_word_char(c) {
            self.state = self.advance_word(c.to_ascii_uppercase());
        } else if c == ' ' || c == '\t' || c == '\n' {
            self.state = self.whitespace_boundary();
        } else {
            self.punct_boundary(c);
        }
    }

    pub fn finish(mut self) -> QueryInfo {
        self.resolve_tail();
        self.info
    }

    fn advance_word(&self, c: char) -> State {
        match self.state {
            State::Start => match c {
                'C' => State::InHead(Head::Create, 1),
                'M' => State::InHead(Head::Match, 1),
                'D' => State::InHead(Head::Detach, 1),
                'S' => State::InHead(Head::Storage, 1),
                _ => State::Dead,
            },
            State::InHead(head, 1) if matches!(head, Head::Match | Head::Detach) => {
                // Single-letter prefixes shared by two keywords split here.
                match (head, c) {
                    (Head::Match, 'A') => State::InHead(Head::Match, 2),
                    (Head::Match, 'E') => State::InHead(Head::Merge, 2),
                    (Head::Detach, 'E') => State::InHead(Head::Detach, 2),
                    (Head::Detach, 'R') => State::InHead(Head::Drop, 2),
                    _ => State::Dead,
                }
            }
            State::InHead(head, len) => {
                let word = head.word().as_bytes();
                if len < word.len() && word[len] == c as u8 {
                    State::InHead(head, len + 1)
                } else {
                    State::Dead
                }
            }
            State::Gap(head) => match (head, c) {
                (Head::Create, 'I') => State::InTail(Tail::CreateIndex, 1),
                (Head::Drop, 'I') => State::InTail(Tail::DropIndex, 1),
                (Head::Detach, 'D') => State::InTail(Tail::DetachDelete, 1),
                (Head::Storage, 'M') => State::InTail(Tail::StorageMode, 1),
                _ => State::Dead,
            },
            State::InTail(tail, len) => {
                let word = tail.word().as_bytes();
                if len < word.len() && word[len] == c as u8 {
                    State::InTail(tail, len + 1)
                } else {
                    State::Dead
                }
            }
            State::ParenGap if c == 'R' => State::InTail(Tail::Remove, 1),
            State::ParenGap | State::CloseParen | State::Dead => State::Dead,
        }
    }

    fn whitespace_boundary(&mut self) -> State {
        match self.state {
            State::InHead(head, len) if len == head.word().len() => State::Gap(head),
            State::Gap(head) => State::Gap(head),
            State::InTail(tail, len) if len == tail.word().len() => {
                self.record_tail(tail);
                State::Start
            }
            State::CloseParen | State::ParenGap => State::ParenGap,
            _ => State::Start,
        }
    }

    fn punct_boundary(&mut self, c: char) {
        // A completed clause resolves before the boundary character itself
        // is interpreted.
        match self.state {
            State::InHead(head, len)
                if c == '(' && head.takes_paren() && len == head.word().len() =>
            {
                self.record_head(head);
                self.state = State::Start;
                return;
            }
            State::Gap(head) if c == '(' && head.takes_paren() => {
                self.record_head(head);
                self.state = State::Start;
                return;
            }
            State::InTail(tail, len) if len == tail.word().len() => {
                self.record_tail(tail);
            }
            _ => {}
        }
        self.state = if c == ')' {
            State::CloseParen
        } else {
            State::Start
        };
    }

    fn resolve_tail(&mut self) {
        if let State::InTail(tail, len) = self.state {
            if len == tail.word().len() {
                self.record_tail(tail);
                self.state = State::Start;
            }
        }
    }

    fn record_head(&mut self, head: Head) {
        match head {
            Head::Create => self.info.has_create = true,
            Head::Match => self.info.has_match = true,
            Head::Merge => self.info.has_merge = true,
            Head::Detach | Head::Drop | Head::Storage => {}
        }
    }

    fn record_tail(&mut self, tail: Tail) {
        match tail {
            Tail::CreateIndex => self.info.has_create_index = true,
            Tail::DropIndex => self.info.has_drop_index = true,
            Tail::DetachDelete => self.info.has_detach_delete = true,
            Tail::StorageMode => self.info.has_storage_mode = true,
            Tail::Remove => self.info.has_remove = true,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Collects the clause traits of one complete statement.
pub fn classify(text: &str) -> QueryInfo {
    let mut machine = ClauseMachine::new();
    for c in text.chars() {
        machine.feed(c);
    }
    machine.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_with_parenthesis() {
        let info = classify("CREATE (n:Label {id: 1})");
        assert!(info.has_create);
        assert!(!info.has_match);
        assert!(!info.has_create_index);
    }

    #[test]
    fn create_without_whitespace_before_paren() {
        assert!(classify("CREATE(n)").has_create);
    }

    #[test]
    fn match_and_create_in_one_statement() {
        let info = classify(
            "MATCH (a:L),(b:L) WHERE a.id = 1 AND b.id = 2 CREATE (a)-[:R]->(b)",
        );
        assert!(info.has_match);
        assert!(info.has_create);
    }

    #[test]
    fn merge_is_separate_from_match() {
        let info = classify("MERGE (n {id: 1})");
        assert!(info.has_merge);
        assert!(!info.has_match);
    }

    #[test]
    fn create_index_and_drop_index() {
        assert!(classify("CREATE INDEX ON :Label").has_create_index);
        assert!(classify("DROP INDEX ON :Label").has_drop_index);
        let info = classify("CREATE INDEX ON :Label(prop)");
        assert!(info.has_create_index);
        assert!(!info.has_create);
    }

    #[test]
    fn case_is_folded() {
        assert!(classify("create index on :l").has_create_index);
        assert!(classify("mAtCh (n) return n").has_match);
    }

    #[test]
    fn detach_delete_at_statement_start() {
        assert!(classify("DETACH DELETE n").has_detach_delete);
    }

    #[test]
    fn storage_mode_statement() {
        assert!(classify("STORAGE MODE IN_MEMORY_ANALYTICAL").has_storage_mode);
    }

    #[test]
    fn remove_requires_a_closing_paren_and_whitespace() {
        assert!(classify("MATCH (n) REMOVE n.prop").has_remove);
        assert!(!classify("REMOVE n.prop").has_remove);
        assert!(!classify("MATCH (n)REMOVE n.prop").has_remove);
    }

    #[test]
    fn keywords_inside_identifiers_do_not_count() {
        assert!(!classify("RETURN xcreate (1)").has_create);
        assert!(!classify("RETURN created_at (1)").has_create);
        assert!(!classify("SET n.match_id = 1 (x)").has_match);
    }

    #[test]
    fn keywords_inside_string_literals_do_not_count() {
        let info = classify(r#"RETURN "CREATE (n)" AS text"#);
        assert!(!info.has_create);
        let info = classify(r#"SET n.q = 'MATCH (m) RETURN m' (x)"#);
        assert!(!info.has_match);
    }

    #[test]
    fn keyword_without_its_follower_or_paren_is_ignored() {
        let info = classify("CREATE USER admin");
        assert!(!info.has_create);
        assert!(!info.has_create_index);
        assert!(!classify("DROP GRAPH").has_drop_index);
    }

    #[test]
    fn multiple_whitespace_and_newlines_between_words() {
        assert!(classify("CREATE\n\tINDEX ON :L").has_create_index);
        assert!(classify("CREATE  \n (n)").has_create);
    }

    #[test]
    fn trailing_follower_resolves_at_end_of_statement() {
        assert!(classify("DETACH DELETE").has_detach_delete);
        assert!(classify("CREATE INDEX").has_create_index);
    }

    #[test]
    fn detach_delete_after_a_closing_paren_is_not_anchored() {
        // After `)` only REMOVE may start; the D of DETACH kills the word.
        let info = classify("MATCH (n) DETACH DELETE n");
        assert!(info.has_match);
        assert!(!info.has_detach_delete);
    }
}
