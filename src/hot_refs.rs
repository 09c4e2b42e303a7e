use std::ops::RangeInclusive;

use hashbrown::{HashMap, HashSet};

use crate::{
    common::{count_visible, AllowedSet, Doi, Year},
    graph::{CitationGraph, YearIndex},
    windows::Window,
};

pub type HotRefs<'a> = HashSet<&'a str>;

/// References of the whole roster whose visible citer count puts them in the top `pct`.
///
/// Ties at the boundary frequency are all kept, so the result may exceed `ceil(pct * n)`.
pub fn select_hot_refs<'a>(
    roster: &[Doi],
    graph: &'a CitationGraph,
    allowed: &AllowedSet,
    pct: f64,
) -> HotRefs<'a> {
    let freq = citation_pressure(roster, graph, allowed);
    if freq.is_empty() {
        return HotRefs::new();
    }

    let k = ((pct * freq.len() as f64).ceil() as usize).max(1);
    let mut ranked: Vec<(&'a str, usize)> = freq.into_iter().collect();
    ranked.sort_unstable_by(|l, r| r.1.cmp(&l.1).then_with(|| l.0.cmp(r.0)));
    let threshold = ranked[k.min(ranked.len()) - 1].1;

    ranked
        .into_iter()
        .take_while(|(_, c)| *c >= threshold)
        .map(|(doi, _)| doi)
        .collect()
}

fn citation_pressure<'a>(
    roster: &[Doi],
    graph: &'a CitationGraph,
    allowed: &AllowedSet,
) -> HashMap<&'a str, usize> {
    let mut freq = HashMap::new();
    // duplicated roster entries count once per occurrence
    for target in roster {
        let refs = match graph.refs(target) {
            Some(refs) if !refs.is_empty() => refs,
            _ => continue,
        };
        for reference in refs {
            let citers = match graph.citers(reference) {
                Some(citers) if !citers.is_empty() => citers,
                _ => continue,
            };
            let visible = count_visible(citers, allowed);
            if visible > 0 {
                *freq.entry(reference.as_str()).or_insert(0) += visible;
            }
        }
    }
    freq
}

struct CachedHotRefs<'a> {
    allowed_len: usize,
    refs: HotRefs<'a>,
}

/// Hot-reference sets keyed by admission threshold year.
///
/// The bins merged up to a threshold are the same for every target, so a set computed here is
/// valid for any window whose allowed set has the same size as the one it was built from.
pub struct HotRefCache<'a> {
    by_threshold: HashMap<Year, CachedHotRefs<'a>>,
}

impl<'a> HotRefCache<'a> {
    pub fn build(
        roster: &[Doi],
        graph: &'a CitationGraph,
        years: &'a YearIndex,
        thresholds: RangeInclusive<Year>,
        pct: f64,
    ) -> Self {
        let mut window = Window::new(years);
        let mut by_threshold = HashMap::new();
        for threshold in thresholds {
            window.advance_to(threshold);
            by_threshold.insert(
                threshold,
                CachedHotRefs {
                    allowed_len: window.allowed().len(),
                    refs: select_hot_refs(roster, graph, window.allowed(), pct),
                },
            );
        }
        Self { by_threshold }
    }

    pub fn get(&self, threshold: Year, allowed: &AllowedSet) -> Option<&HotRefs<'a>> {
        self.by_threshold
            .get(&threshold)
            .filter(|cached| cached.allowed_len == allowed.len())
            .map(|cached| &cached.refs)
    }

    pub fn len(&self) -> usize {
        self.by_threshold.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_threshold.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{edges, years};

    fn allowed_of<'a>(dois: &[&'a str]) -> AllowedSet<'a> {
        dois.iter().copied().collect()
    }

    fn roster(dois: &[&str]) -> Vec<Doi> {
        dois.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn empty_without_visible_citers() {
        let graph = CitationGraph::build(&edges(&[("a", "t"), ("a", "x")]), &years(&[]));
        let hot = select_hot_refs(&roster(&["t"]), &graph, &allowed_of(&[]), 0.03);
        assert!(hot.is_empty());
        let hot = select_hot_refs(&roster(&["nope"]), &graph, &allowed_of(&["x"]), 0.03);
        assert!(hot.is_empty());
    }

    #[test]
    fn picks_most_pressured_reference() {
        // t cites a, b, c; a has 3 visible citers, b 2, c 1
        let graph = CitationGraph::build(
            &edges(&[
                ("a", "t"),
                ("b", "t"),
                ("c", "t"),
                ("a", "x"),
                ("a", "y"),
                ("b", "y"),
            ]),
            &years(&[]),
        );
        let allowed = allowed_of(&["t", "x", "y"]);
        let hot = select_hot_refs(&roster(&["t"]), &graph, &allowed, 0.03);
        assert_eq!(hot, allowed_of(&["a"]));

        // k = ceil(0.5 * 3) = 2 -> threshold is b's count
        let hot = select_hot_refs(&roster(&["t"]), &graph, &allowed, 0.5);
        assert_eq!(hot, allowed_of(&["a", "b"]));
    }

    #[test]
    fn boundary_ties_are_all_kept() {
        let graph = CitationGraph::build(
            &edges(&[
                ("a", "t"),
                ("b", "t"),
                ("c", "t"),
                ("d", "t"),
                ("a", "x"),
                ("b", "x"),
                ("c", "x"),
            ]),
            &years(&[]),
        );
        let allowed = allowed_of(&["t", "x"]);
        // a, b, c tie at 2 while d has 1; k = 1
        let hot = select_hot_refs(&roster(&["t"]), &graph, &allowed, 0.03);
        assert_eq!(hot.len(), 3);
        assert!(!hot.contains("d"));
    }

    #[test]
    fn pressure_pools_the_whole_roster() {
        let graph = CitationGraph::build(
            &edges(&[("a", "t"), ("b", "t"), ("b", "u"), ("a", "x")]),
            &years(&[]),
        );
        let allowed = allowed_of(&["t", "u", "x"]);
        // alone, a and b tie; u's reference to b breaks it
        assert_eq!(
            select_hot_refs(&roster(&["t"]), &graph, &allowed, 0.03).len(),
            2
        );
        assert_eq!(
            select_hot_refs(&roster(&["t", "u"]), &graph, &allowed, 0.03),
            allowed_of(&["b"])
        );
        // a repeated roster entry counts again
        assert_eq!(
            select_hot_refs(&roster(&["u", "t", "t"]), &graph, &allowed, 0.03),
            allowed_of(&["b"])
        );
    }

    #[test]
    fn cache_matches_on_demand_selection() {
        let graph = CitationGraph::build(
            &edges(&[
                ("a", "t"),
                ("b", "t"),
                ("a", "x"),
                ("t", "x"),
                ("b", "y"),
                ("t", "y"),
                ("a", "z"),
            ]),
            &years(&[("t", "2000"), ("x", "2001"), ("y", "2002"), ("z", "2002")]),
        );
        let (index, _) = YearIndex::build(&graph, 2003);
        let rost = roster(&["t"]);
        let cache = HotRefCache::build(&rost, &graph, &index, 2001..=2003, 0.03);
        assert_eq!(cache.len(), 3);

        let mut window = Window::new(&index);
        window.admit_target("t", &graph);
        for threshold in 2001..=2003 {
            window.advance_to(threshold);
            let on_demand = select_hot_refs(&rost, &graph, window.allowed(), 0.03);
            assert_eq!(cache.get(threshold, window.allowed()), Some(&on_demand));
        }
        assert!(cache.get(2004, window.allowed()).is_none());
    }

    #[test]
    fn cache_refuses_differently_sized_windows() {
        let graph = CitationGraph::build(
            &edges(&[("a", "t"), ("a", "x")]),
            // t's year does not bin, so it only enters through its own window
            &years(&[("t", "+2000"), ("x", "2001")]),
        );
        let (index, _) = YearIndex::build(&graph, 2002);
        let rost = roster(&["t"]);
        let cache = HotRefCache::build(&rost, &graph, &index, 2001..=2002, 0.03);

        let mut window = Window::new(&index);
        window.admit_target("t", &graph);
        window.advance_to(2001);
        assert!(cache.get(2001, window.allowed()).is_none());
    }
}
