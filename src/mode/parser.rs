//! Parser mode: classify statements without executing anything.

use std::io;

use crate::error::Result;
use crate::import::Lane;
use crate::input::StatementSource;
use crate::output::echo_info;

/// Counts statements per lane; with `print_stats` each statement's
/// classification is emitted as one JSON line.
pub fn run(collect_stats: bool, print_stats: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut source = StatementSource::with_classification(stdin.lock(), collect_stats);
    let mut total = 0u64;
    let mut per_lane = [0u64; 4];
    while let Some(query) = source.next_query()? {
        total += 1;
        let lane = Lane::of(query.info.as_ref());
        per_lane[lane_slot(lane)] += 1;
        if print_stats {
            let line = serde_json::json!({
                "index": query.index,
                "line": query.line_number,
                "lane": lane.as_str(),
                "clauses": query.info,
            });
            println!("{line}");
        }
    }
    echo_info(&format!("Parsed {total} queries"));
    if collect_stats {
        echo_info(&format!(
            "pre: {}, vertex: {}, edge: {}, post: {}",
            per_lane[0], per_lane[1], per_lane[2], per_lane[3]
        ));
    }
    Ok(())
}

fn lane_slot(lane: Lane) -> usize {
    match lane {
        Lane::Pre => 0,
        Lane::Vertex => 1,
        Lane::Edge => 2,
        Lane::Post => 3,
    }
}
