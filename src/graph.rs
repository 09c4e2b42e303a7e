use hashbrown::HashMap;

use crate::common::{parse_bin_year, Doi, DoiMap, DoiSet, Year};

/// Forward and reverse adjacency of one citation source, built once and read-only afterwards.
#[derive(Debug, Default)]
pub struct CitationGraph {
    /// citing -> works it cites
    pub forward: DoiMap<DoiSet>,
    /// cited -> works citing it
    pub reverse: DoiMap<DoiSet>,
    /// raw year strings of citing works present in the year mapping
    pub citing_year: DoiMap<String>,
}

impl CitationGraph {
    pub fn build(edges: &[(Doi, Doi)], doi_year: &DoiMap<String>) -> Self {
        let mut graph = Self::default();
        for (cited, citing) in edges {
            graph
                .forward
                .entry(citing.clone())
                .or_default()
                .insert(cited.clone());
            graph
                .reverse
                .entry(cited.clone())
                .or_default()
                .insert(citing.clone());
            if !graph.citing_year.contains_key(citing.as_str()) {
                if let Some(year) = doi_year.get(citing.as_str()) {
                    graph.citing_year.insert(citing.clone(), year.clone());
                }
            }
        }
        graph
    }

    pub fn refs(&self, doi: &str) -> Option<&DoiSet> {
        self.forward.get(doi)
    }

    pub fn citers(&self, doi: &str) -> Option<&DoiSet> {
        self.reverse.get(doi)
    }

    pub fn n_edges(&self) -> usize {
        self.forward.values().map(|s| s.len()).sum()
    }
}

/// Citing works bucketed by publication year.
#[derive(Debug, Default)]
pub struct YearIndex {
    /// ascending, distinct, none after the cutoff
    pub sorted_years: Vec<Year>,
    pub bins: HashMap<Year, DoiSet>,
}

pub struct InvalidYear {
    pub doi: Doi,
    pub raw_year: String,
}

impl YearIndex {
    /// Bins every citing work with a numeric year; the rest come back separately, sorted by DOI.
    pub fn build(graph: &CitationGraph, cutoff_year: Year) -> (Self, Vec<InvalidYear>) {
        let mut bins: HashMap<Year, DoiSet> = HashMap::new();
        let mut invalid = Vec::new();
        for (doi, raw_year) in graph.citing_year.iter() {
            match parse_bin_year(raw_year) {
                Some(year) => {
                    bins.entry(year).or_default().insert(doi.clone());
                }
                None => invalid.push(InvalidYear {
                    doi: doi.clone(),
                    raw_year: raw_year.clone(),
                }),
            }
        }
        invalid.sort_by(|l, r| l.doi.cmp(&r.doi));

        let mut sorted_years: Vec<Year> = bins
            .keys()
            .copied()
            .filter(|y| *y <= cutoff_year)
            .collect();
        sorted_years.sort_unstable();
        (Self { sorted_years, bins }, invalid)
    }

    pub fn bin(&self, year: Year) -> impl Iterator<Item = &str> {
        self.bins
            .get(&year)
            .into_iter()
            .flat_map(|s| s.iter().map(|d| d.as_str()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn edges(pairs: &[(&str, &str)]) -> Vec<(Doi, Doi)> {
        pairs
            .iter()
            .map(|(cited, citing)| (cited.to_string(), citing.to_string()))
            .collect()
    }

    pub fn years(pairs: &[(&str, &str)]) -> DoiMap<String> {
        pairs
            .iter()
            .map(|(d, y)| (d.to_string(), y.to_string()))
            .collect()
    }

    #[test]
    fn forward_and_reverse_mirror_edges() {
        let es = edges(&[("a", "x"), ("b", "x"), ("a", "y"), ("x", "y"), ("a", "x")]);
        let graph = CitationGraph::build(&es, &DoiMap::new());

        for (cited, citing) in es.iter() {
            assert!(graph.refs(citing).unwrap().contains(cited));
            assert!(graph.citers(cited).unwrap().contains(citing));
        }
        assert_eq!(graph.n_edges(), 4);
        let n_rev: usize = graph.reverse.values().map(|s| s.len()).sum();
        assert_eq!(n_rev, 4);
        assert!(graph.refs("a").is_none());
        assert_eq!(graph.citers("a").unwrap().len(), 2);
    }

    #[test]
    fn citing_years_only_for_known_citers() {
        let es = edges(&[("a", "x"), ("a", "y")]);
        let ys = years(&[("x", "2001"), ("a", "1999"), ("z", "2005")]);
        let graph = CitationGraph::build(&es, &ys);
        assert_eq!(graph.citing_year.len(), 1);
        assert_eq!(graph.citing_year["x"], "2001");
    }

    #[test]
    fn year_bins_partition_and_cut() {
        let es = edges(&[
            ("a", "x"),
            ("a", "y"),
            ("a", "z"),
            ("a", "w"),
            ("a", "v"),
            ("a", "far"),
        ]);
        let ys = years(&[
            ("x", "2001"),
            ("y", "2001"),
            ("z", "2010"),
            ("w", "unknown"),
            ("v", "1999"),
            ("far", "99999999999"),
        ]);
        let graph = CitationGraph::build(&es, &ys);
        let (index, invalid) = YearIndex::build(&graph, 2005);

        assert_eq!(index.sorted_years, vec![1999, 2001]);
        assert_eq!(index.bins[&2001].len(), 2);
        // binned but past the cutoff
        assert!(index.bins.contains_key(&2010));
        assert!(index.bins[&Year::MAX].contains("far"));
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].doi, "w");
        assert_eq!(invalid[0].raw_year, "unknown");
        assert!(index.bins.values().all(|b| !b.contains("w")));
    }
}
