use hashbrown::HashSet;
use tracing::{debug, info, warn};

use crate::{
    common::{parse_target_year, DiConfig, Doi, DoiMap, Year},
    errors::{DiError, DiResult},
    graph::{CitationGraph, YearIndex},
    hot_refs::HotRefCache,
    metrics::MetricRecord,
    para::Worker,
    windows::{run_target, SourceContext},
};

#[derive(Debug, Clone, PartialEq)]
pub struct TargetTask {
    pub doi: Doi,
    pub year: Year,
}

struct TargetWorker<'a> {
    ctx: SourceContext<'a>,
}

impl Worker<TargetTask> for TargetWorker<'_> {
    type Out = Vec<MetricRecord>;

    fn proc(&self, task: TargetTask) -> Self::Out {
        run_target(&self.ctx, &task.doi, task.year)
    }
}

/// One task per roster entry whose publication year resolves; the rest are skipped with a warning.
pub fn plan_tasks(
    roster: &[Doi],
    doi_year: &DoiMap<String>,
    cutoff_year: Year,
    source: &str,
) -> Vec<TargetTask> {
    let mut tasks = Vec::new();
    for target in roster {
        let raw_year = match doi_year.get(target.as_str()) {
            Some(raw_year) => raw_year,
            None => {
                warn!(doi = %target, source, "target not found in DOI-year mapping, skipped");
                continue;
            }
        };
        let year = match parse_target_year(raw_year) {
            Some(year) => year,
            None => {
                warn!(
                    doi = %target,
                    year = %raw_year,
                    source,
                    "invalid target year format, skipped"
                );
                continue;
            }
        };
        match cutoff_year.checked_sub(year) {
            Some(last_elapsed) => {
                debug!(doi = %target, year, last_elapsed, source, "planned target");
                tasks.push(TargetTask {
                    doi: target.clone(),
                    year,
                });
            }
            None => {
                warn!(
                    doi = %target,
                    year,
                    cutoff_year,
                    source,
                    "target year out of range for the cutoff, skipped"
                );
            }
        }
    }
    tasks
}

/// Computes every (target, window) record of one citation source.
///
/// Citing works with unusable years are reported once per run through `logged_invalid`.
pub fn run_source(
    source: &str,
    edges: &[(Doi, Doi)],
    doi_year: &DoiMap<String>,
    roster: &[Doi],
    config: &DiConfig,
    logged_invalid: &mut HashSet<Doi>,
) -> DiResult<Vec<MetricRecord>> {
    info!(source, n_edges = edges.len(), "processing source");
    let graph = CitationGraph::build(edges, doi_year);
    let (years, invalid) = YearIndex::build(&graph, config.cutoff_year);
    for entry in invalid {
        if !logged_invalid.contains(entry.doi.as_str()) {
            warn!(
                doi = %entry.doi,
                year = %entry.raw_year,
                source,
                "citing DOI has invalid year"
            );
            logged_invalid.insert(entry.doi);
        }
    }

    let tasks = plan_tasks(roster, doi_year, config.cutoff_year, source);
    if tasks.is_empty() {
        info!(source, "no targets to window");
        return Ok(Vec::new());
    }

    let hot_ref_cache = if config.cache_hot_refs {
        // nothing is binned before the first year, those windows fall back to on-demand
        let first_target = tasks.iter().map(|t| t.year).min();
        let first_bin = years.sorted_years.first().copied();
        let first_threshold = first_target
            .unwrap_or(config.cutoff_year)
            .saturating_add(1)
            .max(first_bin.unwrap_or(config.cutoff_year));
        Some(HotRefCache::build(
            roster,
            &graph,
            &years,
            first_threshold..=config.cutoff_year,
            config.hot_ref_percentage,
        ))
    } else {
        None
    };

    let worker = TargetWorker {
        ctx: SourceContext {
            source,
            graph: &graph,
            years: &years,
            roster,
            cutoff_year: config.cutoff_year,
            hot_ref_percentage: config.hot_ref_percentage,
            d5_threshold: config.d5_threshold,
            hot_ref_cache,
        },
    };
    let n_threads = config.n_threads(tasks.len());
    let n_tasks = tasks.len();
    let per_target = worker
        .para(tasks.into_iter(), n_threads, source)
        .map_err(|crashed| {
            warn!(source, crashed, "worker crashed");
            DiError::WorkerPanicked {
                source_name: source.to_string(),
            }
        })?;

    let records: Vec<MetricRecord> = per_target.into_iter().flatten().collect();
    info!(source, n_tasks, n_records = records.len(), "source done");
    Ok(records)
}
