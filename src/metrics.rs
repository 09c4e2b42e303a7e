use crate::{
    common::{count_common, AllowedSet, Doi, DoiSet, Year},
    graph::CitationGraph,
    hot_refs::HotRefs,
};

pub const METRIC_COLUMNS: [&str; 15] = [
    "N_F",
    "N_B",
    "N_R",
    "DI",
    "mDI",
    "N_B^5",
    "DI_5",
    "DI^noR",
    "N_F_new",
    "N_B_new",
    "DI_3%",
    "DEP",
    "Orig_base",
    "Destabilization(D)",
    "Consolidation(C)",
];

pub const RECORD_COLUMNS: [&str; 4] = ["DOI", "Publication year", "Y", "Source"];

/// Indicators of one target in one window. `None` marks a zero denominator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiMetrics {
    pub n_f: usize,
    pub n_b: usize,
    pub n_r: usize,
    pub di: Option<f64>,
    pub m_di: Option<f64>,
    pub n_b5: usize,
    pub di_5: Option<f64>,
    pub di_no_r: Option<f64>,
    pub n_f_new: usize,
    pub n_b_new: usize,
    pub di_3pct: Option<f64>,
    pub dep: Option<f64>,
    pub orig_base: Option<f64>,
    pub destabilization: Option<f64>,
    pub consolidation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub doi: Doi,
    pub publication_year: Year,
    pub elapsed: Year,
    pub source: String,
    pub metrics: DiMetrics,
}

impl DiMetrics {
    pub fn cells(&self) -> Vec<String> {
        let counts = |n: usize| n.to_string();
        vec![
            counts(self.n_f),
            counts(self.n_b),
            counts(self.n_r),
            float_cell(self.di),
            float_cell(self.m_di),
            counts(self.n_b5),
            float_cell(self.di_5),
            float_cell(self.di_no_r),
            counts(self.n_f_new),
            counts(self.n_b_new),
            float_cell(self.di_3pct),
            float_cell(self.dep),
            float_cell(self.orig_base),
            float_cell(self.destabilization),
            float_cell(self.consolidation),
        ]
    }
}

impl MetricRecord {
    pub fn cells(&self) -> Vec<String> {
        let mut out = vec![
            self.doi.clone(),
            self.publication_year.to_string(),
            self.elapsed.to_string(),
            self.source.clone(),
        ];
        out.extend(self.metrics.cells());
        out
    }
}

pub fn float_cell(v: Option<f64>) -> String {
    v.map(|f| f.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CiterKind {
    /// cites the target and one of its references
    Consolidating,
    /// cites the target only
    Destabilizing,
    /// cites a reference but not the target
    Root,
}

#[derive(Debug, Default)]
struct Tally {
    destabilizing: usize,
    consolidating: usize,
    root: usize,
}

impl Tally {
    fn add(&mut self, kind: CiterKind) {
        match kind {
            CiterKind::Consolidating => self.consolidating += 1,
            CiterKind::Destabilizing => self.destabilizing += 1,
            CiterKind::Root => self.root += 1,
        }
    }

    fn di(&self) -> Option<f64> {
        ratio(
            self.destabilizing as f64 - self.consolidating as f64,
            self.destabilizing + self.consolidating + self.root,
        )
    }
}

fn ratio(num: f64, den: usize) -> Option<f64> {
    if den == 0 {
        None
    } else {
        Some(num / den as f64)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn classify(
    target: &str,
    refs: &DoiSet,
    cited: &DoiSet,
    trim: Option<&HotRefs>,
) -> Option<CiterKind> {
    let kept = |doi: &str| trim.map_or(true, |hot| !hot.contains(doi));
    let cites_target = cited.contains(target) && kept(target);
    let hits_refs = !refs.is_empty() && {
        let (small, large) = if cited.len() < refs.len() {
            (cited, refs)
        } else {
            (refs, cited)
        };
        small.iter().any(|d| large.contains(d) && kept(d.as_str()))
    };
    match (cites_target, hits_refs) {
        (true, true) => Some(CiterKind::Consolidating),
        (true, false) => Some(CiterKind::Destabilizing),
        (false, true) => Some(CiterKind::Root),
        (false, false) => None,
    }
}

/// Classifies every visible citer; hot references are removed only from direct citers' lists.
fn tally_citers(
    target: &str,
    refs: &DoiSet,
    graph: &CitationGraph,
    allowed: &AllowedSet,
    trim: Option<(&HotRefs, &AllowedSet)>,
) -> Tally {
    let mut tally = Tally::default();
    for citing in allowed.iter().copied() {
        if citing == target {
            continue;
        }
        let cited = match graph.refs(citing) {
            Some(cited) if !cited.is_empty() => cited,
            _ => continue,
        };
        let hot = trim
            .filter(|(hot, direct)| !hot.is_empty() && direct.contains(citing))
            .map(|(hot, _)| hot);
        if let Some(kind) = classify(target, refs, cited, hot) {
            tally.add(kind);
        }
    }
    tally
}

/// Visible works citing the target; its size is the `m` behind mDI and DEP.
pub fn direct_citers<'a>(
    target: &str,
    graph: &CitationGraph,
    allowed: &AllowedSet<'a>,
) -> AllowedSet<'a> {
    match graph.citers(target) {
        Some(citers) => allowed
            .iter()
            .copied()
            .filter(|d| citers.contains(*d))
            .collect(),
        None => AllowedSet::new(),
    }
}

pub fn compute_metrics(
    target: &str,
    graph: &CitationGraph,
    allowed: &AllowedSet,
    hot_refs: &HotRefs,
    d5_threshold: usize,
) -> DiMetrics {
    let no_refs = DoiSet::new();
    let refs = graph.refs(target).unwrap_or(&no_refs);
    let direct = direct_citers(target, graph, allowed);

    let base = tally_citers(target, refs, graph, allowed, None);
    let di = base.di();
    let m = direct.len();

    let mut n_b5 = 0;
    if !refs.is_empty() {
        for citing in allowed.iter().copied() {
            let cited = match graph.refs(citing) {
                Some(cited) if cited.contains(target) => cited,
                _ => continue,
            };
            if count_common(cited, refs) >= d5_threshold {
                n_b5 += 1;
            }
        }
    }

    let trimmed = tally_citers(target, refs, graph, allowed, Some((hot_refs, &direct)));

    let shared_refs: usize = direct
        .iter()
        .map(|d| graph.refs(d).map_or(0, |cited| count_common(cited, refs)))
        .sum();

    let (destabilization, consolidation) = dual_view(target, refs, graph, allowed, &direct);

    DiMetrics {
        n_f: base.destabilizing,
        n_b: base.consolidating,
        n_r: base.root,
        di,
        m_di: di.map(|v| m as f64 * v),
        n_b5,
        di_5: ratio(
            base.destabilizing as f64 - n_b5 as f64,
            base.destabilizing + n_b5 + base.root,
        ),
        di_no_r: ratio(
            base.destabilizing as f64 - base.consolidating as f64,
            base.destabilizing + base.consolidating,
        ),
        n_f_new: trimmed.destabilizing,
        n_b_new: trimmed.consolidating,
        di_3pct: trimmed.di(),
        dep: ratio(shared_refs as f64, m),
        orig_base: ratio(shared_refs as f64, m * refs.len()).map(|v| 1.0 - v),
        destabilization,
        consolidation,
    }
}

/// Mean share of the target's direct citers that skip (resp. share) each reference's citers.
fn dual_view(
    target: &str,
    refs: &DoiSet,
    graph: &CitationGraph,
    allowed: &AllowedSet,
    direct: &AllowedSet,
) -> (Option<f64>, Option<f64>) {
    let mut sorted_refs: Vec<&str> = refs.iter().map(|d| d.as_str()).collect();
    sorted_refs.sort_unstable();

    let mut destab = Vec::new();
    let mut consol = Vec::new();
    for reference in sorted_refs {
        let ref_citers: AllowedSet = graph
            .citers(reference)
            .into_iter()
            .flat_map(|citers| citers.iter())
            .map(|d| d.as_str())
            .filter(|d| *d != target && allowed.contains(d))
            .collect();
        let p = direct.iter().filter(|d| ref_citers.contains(**d)).count();
        let o = direct.len() - p;
        let q = ref_citers.len() - p;
        let denom = (o + p + q) as f64;
        if o + p + q != 0 {
            destab.push(o as f64 / denom);
            consol.push(p as f64 / denom);
        }
    }
    (mean(&destab), mean(&consol))
}
