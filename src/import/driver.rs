//! Windowed phase driver: pre, then vertex, then edge, then post.
//!
//! Node-creating statements must commit before anything that matches them
//! to create edges, and index work cannot share a transaction with other
//! writes. The driver turns that into a hard phase order per window.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::bolt::SessionFactory;
use crate::config::ImportOptions;
use crate::error::Result;
use crate::import::batch::BatchBuilder;
use crate::import::executor::BatchRunner;
use crate::input::source::StatementSource;

/// Per-phase totals accumulated over all windows.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportSummary {
    pub windows: u64,
    pub statements: u64,
    pub pre_statements: u64,
    pub vertex_batches: u64,
    pub edge_batches: u64,
    pub post_statements: u64,
}

/// Drains the source window by window. Within each window the four phases
/// run strictly in order; pre and post errors and exhausted retries abort
/// the import.
pub fn run_import<R, F>(
    source: &mut StatementSource<R>,
    runner: &BatchRunner<F>,
    opts: &ImportOptions,
    shutdown: &AtomicBool,
) -> Result<ImportSummary>
where
    R: BufRead,
    F: SessionFactory + 'static,
{
    let mut summary = ImportSummary::default();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("import.driver.interrupted");
            break;
        }
        let window = BatchBuilder::new(opts).fill(source)?;
        if window.is_empty() {
            break;
        }
        summary.statements += window.total_queries() as u64;
        info!(
            window = summary.windows,
            pre = window.pre.len(),
            vertex_batches = window.vertex.len(),
            edge_batches = window.edge.len(),
            post = window.post.len(),
            "import.driver.window"
        );

        summary.pre_statements += runner.run_serial(&window.pre)?;
        summary.vertex_batches += runner.run_parallel(Arc::new(window.vertex))?;
        summary.edge_batches += runner.run_parallel(Arc::new(window.edge))?;
        summary.post_statements += runner.run_serial(&window.post)?;
        summary.windows += 1;
    }
    info!(
        windows = summary.windows,
        statements = summary.statements,
        "import.driver.done"
    );
    Ok(summary)
}
