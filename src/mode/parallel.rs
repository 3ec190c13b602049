//! Batched-parallel import mode.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::bolt::Connector;
use crate::config::{BoltConfig, ImportOptions};
use crate::error::Result;
use crate::import::{run_import, BatchRunner};
use crate::input::StatementSource;
use crate::output::echo_info;

pub fn run(config: &BoltConfig, opts: &ImportOptions, shutdown: Arc<AtomicBool>) -> Result<()> {
    let runner = BatchRunner::new(Connector::new(config.clone()), opts.workers)?;
    let stdin = io::stdin();
    let mut source = StatementSource::new(stdin.lock());
    let started = Instant::now();
    let summary = run_import(&mut source, &runner, opts, &shutdown)?;
    echo_info(&format!(
        "{} statements imported in {:.3} sec over {} windows",
        summary.statements,
        started.elapsed().as_secs_f64(),
        summary.windows
    ));
    echo_info(&format!("  pre: {} statements", summary.pre_statements));
    echo_info(&format!("  vertex: {} batches", summary.vertex_batches));
    echo_info(&format!("  edge: {} batches", summary.edge_batches));
    echo_info(&format!("  post: {} statements", summary.post_statements));
    Ok(())
}
