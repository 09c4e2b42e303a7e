use tracing::{debug, warn};

use crate::{
    common::{AllowedSet, Doi, Year},
    graph::{CitationGraph, YearIndex},
    hot_refs::{select_hot_refs, HotRefCache},
    metrics::{compute_metrics, MetricRecord},
};

/// Read-only snapshot shared by every task of one source.
pub struct SourceContext<'a> {
    pub source: &'a str,
    pub graph: &'a CitationGraph,
    pub years: &'a YearIndex,
    pub roster: &'a [Doi],
    pub cutoff_year: Year,
    pub hot_ref_percentage: f64,
    pub d5_threshold: usize,
    pub hot_ref_cache: Option<HotRefCache<'a>>,
}

/// Allowed citing set that only ever grows, fed from the year bins in ascending order.
pub struct Window<'a> {
    years: &'a YearIndex,
    cursor: usize,
    allowed: AllowedSet<'a>,
}

impl<'a> Window<'a> {
    pub fn new(years: &'a YearIndex) -> Self {
        Self {
            years,
            cursor: 0,
            allowed: AllowedSet::new(),
        }
    }

    /// The target is visible to itself whenever it cites anything.
    pub fn admit_target(&mut self, target: &str, graph: &'a CitationGraph) {
        if let Some((key, _)) = graph.forward.get_key_value(target) {
            self.allowed.insert(key.as_str());
        }
    }

    pub fn advance_to(&mut self, threshold: Year) {
        let years = self.years;
        while let Some(year) = years.sorted_years.get(self.cursor) {
            if *year > threshold {
                break;
            }
            self.allowed.extend(years.bin(*year));
            self.cursor += 1;
        }
    }

    pub fn allowed(&self) -> &AllowedSet<'a> {
        &self.allowed
    }
}

/// One record per elapsed year `1..=cutoff - target_year`, in ascending order.
pub fn run_target(ctx: &SourceContext, target: &str, target_year: Year) -> Vec<MetricRecord> {
    let last_elapsed = match ctx.cutoff_year.checked_sub(target_year) {
        Some(last_elapsed) => last_elapsed,
        None => {
            warn!(doi = target, target_year, source = ctx.source, "target year out of range");
            return Vec::new();
        }
    };
    debug!(
        doi = target,
        target_year,
        last_elapsed,
        source = ctx.source,
        "windowing target"
    );

    let mut window = Window::new(ctx.years);
    window.admit_target(target, ctx.graph);

    let mut records = Vec::new();
    for elapsed in 1..=last_elapsed {
        let threshold = target_year + elapsed;
        window.advance_to(threshold);

        let on_demand;
        let cached = ctx
            .hot_ref_cache
            .as_ref()
            .and_then(|cache| cache.get(threshold, window.allowed()));
        let hot_refs = match cached {
            Some(hot_refs) => hot_refs,
            None => {
                on_demand = select_hot_refs(
                    ctx.roster,
                    ctx.graph,
                    window.allowed(),
                    ctx.hot_ref_percentage,
                );
                &on_demand
            }
        };

        let metrics = compute_metrics(
            target,
            ctx.graph,
            window.allowed(),
            hot_refs,
            ctx.d5_threshold,
        );
        records.push(MetricRecord {
            doi: target.to_string(),
            publication_year: target_year,
            elapsed,
            source: ctx.source.to_string(),
            metrics,
        });
    }
    records
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::{D5_THRESHOLD, HOT_REF_PERCENTAGE};
    use crate::graph::tests::{edges, years};
    use crate::metrics::direct_citers;

    pub fn context<'a>(
        graph: &'a CitationGraph,
        index: &'a YearIndex,
        roster: &'a [Doi],
        cutoff_year: Year,
    ) -> SourceContext<'a> {
        SourceContext {
            source: "test",
            graph,
            years: index,
            roster,
            cutoff_year,
            hot_ref_percentage: HOT_REF_PERCENTAGE,
            d5_threshold: D5_THRESHOLD,
            hot_ref_cache: None,
        }
    }

    fn staggered_graph() -> CitationGraph {
        CitationGraph::build(
            &edges(&[
                ("A1", "T"),
                ("T", "c1"),
                ("T", "c2"),
                ("A1", "c2"),
                ("A1", "c3"),
                ("T", "late"),
            ]),
            &years(&[
                ("T", "2000"),
                ("c1", "2001"),
                ("c2", "2002"),
                ("c3", "2003"),
                ("late", "2007"),
            ]),
        )
    }

    #[test]
    fn window_grows_monotonically() {
        let graph = staggered_graph();
        let (index, _) = YearIndex::build(&graph, 2005);
        let mut window = Window::new(&index);
        window.admit_target("T", &graph);
        assert_eq!(window.allowed().len(), 1);

        let mut last: AllowedSet = AllowedSet::new();
        for threshold in 2001..=2005 {
            window.advance_to(threshold);
            assert!(last.is_subset(window.allowed()));
            last = window.allowed().clone();
        }
        assert_eq!(last.len(), 4);
        assert!(!last.contains("late"));
    }

    #[test]
    fn three_windows_before_cutoff() {
        let graph = staggered_graph();
        let (index, _) = YearIndex::build(&graph, 2003);
        let roster = vec!["T".to_string()];
        let ctx = context(&graph, &index, &roster, 2003);

        let records = run_target(&ctx, "T", 2000);
        let elapsed: Vec<Year> = records.iter().map(|r| r.elapsed).collect();
        assert_eq!(elapsed, vec![1, 2, 3]);
        assert!(records.iter().all(|r| r.doi == "T" && r.publication_year == 2000));

        let visible: Vec<usize> = records
            .iter()
            .map(|r| r.metrics.n_f + r.metrics.n_b)
            .collect();
        assert_eq!(visible, vec![1, 2, 2]);

        let mut window = Window::new(&index);
        window.admit_target("T", &graph);
        let mut sizes = Vec::new();
        let mut direct = Vec::new();
        for threshold in 2001..=2003 {
            window.advance_to(threshold);
            sizes.push(window.allowed().len());
            direct.push(direct_citers("T", &graph, window.allowed()).len());
        }
        assert_eq!(sizes, vec![2, 3, 4]);
        assert_eq!(direct, vec![1, 2, 2]);
        assert_eq!(records[0].metrics.di, Some(1.0));
        assert_eq!(records[1].metrics.di, Some(0.0));
        assert_eq!(records[2].metrics.n_r, 1);
        assert_eq!(records[2].metrics.m_di, Some(0.0));
    }

    #[test]
    fn out_of_range_target_year_has_no_windows() {
        let graph = staggered_graph();
        let (index, _) = YearIndex::build(&graph, 2003);
        let roster = vec!["T".to_string()];
        let ctx = context(&graph, &index, &roster, 2003);
        assert!(run_target(&ctx, "T", -2147483000).is_empty());
        assert!(run_target(&ctx, "T", Year::MAX).is_empty());
    }

    #[test]
    fn no_windows_at_or_after_cutoff() {
        let graph = staggered_graph();
        let (index, _) = YearIndex::build(&graph, 2003);
        let roster = vec!["T".to_string()];
        let ctx = context(&graph, &index, &roster, 2000);
        assert!(run_target(&ctx, "T", 2000).is_empty());
        assert!(run_target(&ctx, "T", 2002).is_empty());
    }

    #[test]
    fn cached_hot_refs_do_not_change_records() {
        let graph = staggered_graph();
        let (index, _) = YearIndex::build(&graph, 2004);
        let roster = vec!["T".to_string(), "c2".to_string()];
        let plain = context(&graph, &index, &roster, 2004);
        let mut cached = context(&graph, &index, &roster, 2004);
        cached.hot_ref_cache = Some(HotRefCache::build(
            &roster,
            &graph,
            &index,
            2001..=2004,
            HOT_REF_PERCENTAGE,
        ));
        assert_eq!(run_target(&plain, "T", 2000), run_target(&cached, "T", 2000));
    }
}
