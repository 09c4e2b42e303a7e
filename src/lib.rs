use hashbrown::HashSet;
use tracing::info;

pub mod aggregate;
pub mod common;
pub mod errors;
pub mod graph;
pub mod hot_refs;
pub mod loading;
pub mod metrics;
pub mod para;
pub mod scheduler;
pub mod windows;

pub use aggregate::{ResultRow, ResultTable, RunOutput};
pub use common::{DiConfig, SourceSpec};
pub use errors::{DiError, DiResult};
pub use metrics::{DiMetrics, MetricRecord};

use aggregate::{collect_tables, write_tables};
use loading::{load_all_inputs, Inputs};
use scheduler::run_source;

/// Runs every declared source in order over already loaded inputs.
pub fn compute(config: &DiConfig, inputs: &Inputs) -> DiResult<RunOutput> {
    let mut logged_invalid = HashSet::new();
    let mut per_source = Vec::with_capacity(config.sources.len());
    for src in config.sources.iter() {
        let batch = inputs
            .citations
            .get(src.name.as_str())
            .ok_or_else(|| DiError::MissingSource(src.name.clone()))?;
        let records = run_source(
            &src.name,
            &batch.edges,
            &inputs.doi_year,
            &inputs.targets,
            config,
            &mut logged_invalid,
        )?;
        per_source.push((src.name.clone(), records));
    }
    Ok(collect_tables(per_source))
}

pub fn runner(config: &DiConfig) -> DiResult<RunOutput> {
    info!(
        cutoff_year = config.cutoff_year,
        n_sources = config.sources.len(),
        "starting run"
    );
    let inputs = load_all_inputs(config)?;
    let output = compute(config, &inputs)?;
    write_tables(config, &output)?;
    info!(n_rows = output.combined.rows.len(), "run finished");
    Ok(output)
}
