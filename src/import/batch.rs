//! Routing statements into lanes and packing them into batches.

use parking_lot::Mutex;

use crate::config::ImportOptions;
use crate::error::Result;
use crate::input::classifier::QueryInfo;
use crate::input::source::{Query, StatementSource};
use std::io::BufRead;

/// Execution class of a statement. Lanes are disjoint: exactly one applies
/// to every statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Index creations; cannot share a transaction with other writes.
    Pre,
    /// Plain node creations, safe to run in parallel batches.
    Vertex,
    /// Statements that match existing nodes and create, typically edges.
    Edge,
    /// Everything else: drops, deletes, removes, storage-mode changes and
    /// unclassified statements.
    Post,
}

impl Lane {
    /// First matching rule wins. An unclassified statement lands in `Post`.
    pub fn of(info: Option<&QueryInfo>) -> Lane {
        let Some(info) = info else {
            return Lane::Post;
        };
        if info.has_create_index {
            return Lane::Pre;
        }
        if info.has_create
            && !info.has_match
            && !info.has_merge
            && !info.has_detach_delete
            && !info.has_create_index
            && !info.has_drop_index
            && !info.has_remove
        {
            return Lane::Vertex;
        }
        if info.has_match && info.has_create {
            return Lane::Edge;
        }
        Lane::Post
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Pre => "pre",
            Lane::Vertex => "vertex",
            Lane::Edge => "edge",
            Lane::Post => "post",
        }
    }
}

#[derive(Debug, Default)]
struct BatchProgress {
    executed: bool,
    attempts: u64,
    backoff_ms: u64,
}

/// A sealed run of queries executed as one transaction. Scheduling state
/// is interior-mutable: during a dispatch round exactly one worker task
/// touches it, and the scheduling loop reads it only between rounds.
#[derive(Debug)]
pub struct Batch {
    index: usize,
    capacity: usize,
    queries: Vec<Query>,
    progress: Mutex<BatchProgress>,
}

impl Batch {
    fn new(capacity: usize, index: usize, queries: Vec<Query>) -> Self {
        Self {
            index,
            capacity,
            queries,
            progress: Mutex::new(BatchProgress {
                executed: false,
                attempts: 0,
                backoff_ms: 1,
            }),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn is_executed(&self) -> bool {
        self.progress.lock().executed
    }

    pub fn attempts(&self) -> u64 {
        self.progress.lock().attempts
    }

    pub fn backoff_ms(&self) -> u64 {
        self.progress.lock().backoff_ms
    }

    /// Marks the batch done. The flag never reverts.
    pub fn mark_executed(&self) {
        self.progress.lock().executed = true;
    }

    /// Records a failed attempt: doubles the backoff, wrapping to 1 when it
    /// would exceed 100 ms so a stubborn batch cannot starve the rest.
    /// Returns the new attempt count.
    pub fn record_failure(&self) -> u64 {
        let mut progress = self.progress.lock();
        progress.backoff_ms *= 2;
        if progress.backoff_ms > 100 {
            progress.backoff_ms = 1;
        }
        progress.attempts += 1;
        progress.attempts
    }
}

/// One fetched round of statements, partitioned by lane. Pre and post are
/// flat; vertex and edge are packed into batches of at most `batch_size`.
#[derive(Debug, Default)]
pub struct Window {
    pub pre: Vec<Query>,
    pub vertex: Vec<Batch>,
    pub edge: Vec<Batch>,
    pub post: Vec<Query>,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.total_queries() == 0
    }

    pub fn total_queries(&self) -> usize {
        self.pre.len()
            + self.post.len()
            + self.vertex.iter().map(Batch::len).sum::<usize>()
            + self.edge.iter().map(Batch::len).sum::<usize>()
    }
}

struct LanePacker {
    batch_size: usize,
    open: Vec<Query>,
    sealed: Vec<Batch>,
}

impl LanePacker {
    fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            open: Vec::new(),
            sealed: Vec::new(),
        }
    }

    fn push(&mut self, query: Query) {
        self.open.push(query);
        if self.open.len() == self.batch_size {
            self.seal();
        }
    }

    fn seal(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let queries = std::mem::take(&mut self.open);
        let index = self.sealed.len();
        self.sealed.push(Batch::new(self.batch_size, index, queries));
    }

    fn finish(mut self) -> Vec<Batch> {
        self.seal();
        self.sealed
    }
}

/// Routes queries into lanes and packs the batched lanes. One builder
/// produces one window.
pub struct BatchBuilder {
    capacity: usize,
    total: usize,
    pre: Vec<Query>,
    post: Vec<Query>,
    vertex: LanePacker,
    edge: LanePacker,
}

impl BatchBuilder {
    pub fn new(opts: &ImportOptions) -> Self {
        Self {
            capacity: opts.window_capacity(),
            total: 0,
            pre: Vec::new(),
            post: Vec::new(),
            vertex: LanePacker::new(opts.batch_size),
            edge: LanePacker::new(opts.batch_size),
        }
    }

    pub fn is_full(&self) -> bool {
        self.total >= self.capacity
    }

    pub fn push(&mut self, query: Query) {
        self.total += 1;
        match Lane::of(query.info.as_ref()) {
            Lane::Pre => self.pre.push(query),
            Lane::Vertex => self.vertex.push(query),
            Lane::Edge => self.edge.push(query),
            Lane::Post => self.post.push(query),
        }
    }

    /// Seals any partial open batches. The window is immutable afterwards.
    pub fn finalize(self) -> Window {
        Window {
            pre: self.pre,
            vertex: self.vertex.finish(),
            edge: self.edge.finish(),
            post: self.post,
        }
    }

    /// Consumes up to one window's worth of queries from the source.
    pub fn fill<R: BufRead>(mut self, source: &mut StatementSource<R>) -> Result<Window> {
        while !self.is_full() {
            match source.next_query()? {
                Some(query) => self.push(query),
                None => break,
            }
        }
        Ok(self.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::classifier::classify;

    fn query(index: u64, text: &str) -> Query {
        Query {
            text: text.to_string(),
            line_number: index + 1,
            index,
            info: Some(classify(text)),
        }
    }

    fn opts(batch_size: usize, max_batches: usize) -> ImportOptions {
        ImportOptions {
            batch_size,
            workers: max_batches,
            max_batches,
        }
    }

    #[test]
    fn lanes_are_disjoint_and_first_match_wins() {
        let cases = [
            ("CREATE INDEX ON :L", Lane::Pre),
            ("CREATE (:L {id: 1})", Lane::Vertex),
            (
                "MATCH (a:L),(b:L) WHERE a.id = 1 AND b.id = 2 CREATE (a)-[:R]->(b)",
                Lane::Edge,
            ),
            ("DROP INDEX ON :L", Lane::Post),
            ("MATCH (n) RETURN n", Lane::Post),
            ("MERGE (n {id: 1})", Lane::Post),
            ("STORAGE MODE IN_MEMORY_ANALYTICAL", Lane::Post),
            ("MATCH (n) REMOVE n.p", Lane::Post),
        ];
        for (text, expected) in cases {
            assert_eq!(Lane::of(Some(&classify(text))), expected, "{text}");
        }
    }

    #[test]
    fn unclassified_statements_go_to_post() {
        assert_eq!(Lane::of(None), Lane::Post);
    }

    #[test]
    fn packing_250_vertices_into_batches_of_100() {
        let mut builder = BatchBuilder::new(&opts(100, 20));
        for i in 0..250 {
            builder.push(query(i, "CREATE (:L)"));
        }
        let window = builder.finalize();
        let sizes: Vec<usize> = window.vertex.iter().map(Batch::len).collect();
        let indices: Vec<usize> = window.vertex.iter().map(Batch::index).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(window.total_queries(), 250);
    }

    #[test]
    fn only_the_tail_batch_may_be_partial() {
        let mut builder = BatchBuilder::new(&opts(10, 100));
        for i in 0..95 {
            builder.push(query(i, "CREATE (:L)"));
        }
        let window = builder.finalize();
        let sizes: Vec<usize> = window.vertex.iter().map(Batch::len).collect();
        for (i, size) in sizes.iter().enumerate() {
            if i + 1 < sizes.len() {
                assert_eq!(*size, 10);
            } else {
                assert!(*size > 0 && *size <= 10);
            }
        }
    }

    #[test]
    fn window_capacity_bounds_consumption() {
        let mut builder = BatchBuilder::new(&opts(2, 3));
        let mut pushed = 0;
        while !builder.is_full() {
            builder.push(query(pushed, "CREATE (:L)"));
            pushed += 1;
        }
        assert_eq!(pushed, 6);
    }

    #[test]
    fn mixed_lanes_keep_their_input_order_within_a_lane() {
        let mut builder = BatchBuilder::new(&opts(2, 10));
        builder.push(query(0, "CREATE INDEX ON :L"));
        builder.push(query(1, "CREATE (:L {id: 1})"));
        builder.push(query(2, "CREATE (:L {id: 2})"));
        builder.push(query(3, "CREATE (:L {id: 3})"));
        builder.push(query(4, "MATCH (a),(b) CREATE (a)-[:R]->(b)"));
        builder.push(query(5, "DROP INDEX ON :L"));
        let window = builder.finalize();
        assert_eq!(window.pre.len(), 1);
        assert_eq!(window.post.len(), 1);
        assert_eq!(window.vertex.len(), 2);
        assert_eq!(window.vertex[0].len(), 2);
        assert_eq!(window.vertex[1].len(), 1);
        assert_eq!(window.edge.len(), 1);
        let ids: Vec<u64> = window.vertex[0]
            .queries()
            .iter()
            .chain(window.vertex[1].queries())
            .map(|q| q.index)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn backoff_doubles_and_wraps_past_100() {
        let batch = Batch::new(10, 0, vec![query(0, "CREATE (:L)")]);
        assert_eq!(batch.backoff_ms(), 1);
        let mut seen = Vec::new();
        for _ in 0..7 {
            batch.record_failure();
            seen.push(batch.backoff_ms());
        }
        assert_eq!(seen, vec![2, 4, 8, 16, 32, 64, 1]);
        assert_eq!(batch.attempts(), 7);
    }

    #[test]
    fn executed_flag_is_sticky() {
        let batch = Batch::new(10, 0, vec![query(0, "CREATE (:L)")]);
        assert!(!batch.is_executed());
        batch.mark_executed();
        assert!(batch.is_executed());
        batch.record_failure();
        assert!(batch.is_executed());
    }
}
