use std::hint::black_box;
use std::io::Cursor;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use boltline::import::Lane;
use boltline::input::StatementSource;

fn mixed_workload(statements: usize) -> String {
    let mut input = String::with_capacity(statements * 64);
    input.push_str("CREATE INDEX ON :Node;\n");
    for i in 0..statements {
        match i % 10 {
            9 => input.push_str(&format!(
                "MATCH (a:Node),(b:Node) WHERE a.id = {i} AND b.id = {} CREATE (a)-[:LINK]->(b);\n",
                i / 2
            )),
            _ => input.push_str(&format!(
                "CREATE (:Node {{id: {i}, name: \"node;{i}\", active: true}});\n"
            )),
        }
    }
    input.push_str("DROP INDEX ON :Node;\n");
    input
}

fn bench_statement_stream(c: &mut Criterion) {
    let input = mixed_workload(2000);
    let mut group = c.benchmark_group("statement_stream");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("tokenize_and_classify", |b| {
        b.iter(|| {
            let mut source = StatementSource::new(Cursor::new(input.as_bytes()));
            let mut lanes = [0u64; 4];
            while let Some(query) = source.next_query().unwrap() {
                let slot = match Lane::of(query.info.as_ref()) {
                    Lane::Pre => 0,
                    Lane::Vertex => 1,
                    Lane::Edge => 2,
                    Lane::Post => 3,
                };
                lanes[slot] += 1;
            }
            black_box(lanes)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_statement_stream);
criterion_main!(benches);
