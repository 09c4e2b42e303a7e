use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    thread,
};

use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use hashbrown::HashMap;
use tracing::{info, warn};

use crate::{
    common::{parse_bin_year, DiConfig, Doi, DoiMap},
    errors::{DiError, DiResult},
};

const BOM: char = '\u{feff}';

pub struct CitationBatch {
    /// (cited, citing)
    pub edges: Vec<(Doi, Doi)>,
    pub total_lines: usize,
}

pub struct Inputs {
    pub doi_year: DoiMap<String>,
    pub targets: Vec<Doi>,
    pub citations: HashMap<String, CitationBatch>,
}

/// Reads a whole text file, gunzipping `.gz` paths and dropping a leading BOM.
pub fn read_text(path: &Path) -> DiResult<String> {
    let file = File::open(path).map_err(|e| DiError::load(path, e))?;
    let mut text = String::new();
    let res = if path.extension().map_or(false, |ext| ext == "gz") {
        BufReader::new(GzDecoder::new(file)).read_to_string(&mut text)
    } else {
        BufReader::new(file).read_to_string(&mut text)
    };
    res.map_err(|e| DiError::load(path, e))?;
    if text.starts_with(BOM) {
        text.remove(0);
    }
    Ok(text)
}

fn clean(field: &str) -> &str {
    field.trim().trim_matches('"')
}

/// Fields of a line after trimming its ends, so blank edge fields do not count as columns.
fn line_fields(rec: &StringRecord) -> Vec<&str> {
    let fields: Vec<&str> = rec.iter().collect();
    let first = fields.iter().position(|f| !f.trim().is_empty());
    let last = fields.iter().rposition(|f| !f.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => fields[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

/// Non-blank records after the header line, with their 1-based line numbers.
fn data_records(text: &str) -> DiResult<Vec<(u64, StringRecord)>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());
    let mut out = Vec::new();
    let mut seen_header = false;
    for rec in rdr.records() {
        let rec = rec?;
        if rec.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if !seen_header {
            seen_header = true;
            continue;
        }
        let line = rec.position().map_or(0, |p| p.line());
        out.push((line, rec));
    }
    Ok(out)
}

pub fn read_citation_file(path: &Path) -> DiResult<CitationBatch> {
    let text = read_text(path)?;
    let total_lines = text.lines().count();
    let mut edges = Vec::new();
    for (line, rec) in data_records(&text)? {
        let fields = line_fields(&rec);
        if fields.len() != 2 {
            warn!(path = %path.display(), line, ?fields, "invalid citation line");
            continue;
        }
        edges.push((clean(fields[0]).to_string(), clean(fields[1]).to_string()));
    }
    info!(path = %path.display(), n_edges = edges.len(), total_lines, "loaded citations");
    Ok(CitationBatch { edges, total_lines })
}

/// Later duplicates win. Non-numeric years are reported but kept.
pub fn read_doi_year_file(path: &Path) -> DiResult<DoiMap<String>> {
    let text = read_text(path)?;
    let total_lines = text.lines().count();
    let mut doi_year = DoiMap::new();
    for (line, rec) in data_records(&text)? {
        let fields = line_fields(&rec);
        if fields.len() != 2 {
            warn!(path = %path.display(), line, n_cols = fields.len(), "expected 2 columns");
            continue;
        }
        let doi = clean(fields[0]);
        let year = clean(fields[1]);
        if parse_bin_year(year).is_none() {
            warn!(path = %path.display(), line, doi, year, "non-numeric year");
        }
        doi_year.insert(doi.to_string(), year.to_string());
    }
    info!(path = %path.display(), n_rows = doi_year.len(), total_lines, "loaded DOI years");
    Ok(doi_year)
}

pub fn read_target_file(path: &Path) -> DiResult<Vec<Doi>> {
    let text = read_text(path)?;
    let total_lines = text.lines().count();
    let mut targets = Vec::new();
    for (_, rec) in data_records(&text)? {
        let line = rec.iter().collect::<Vec<&str>>().join("\t");
        let doi = clean(&line).trim_start_matches(BOM);
        if !doi.is_empty() {
            targets.push(doi.to_string());
        }
    }
    info!(path = %path.display(), n_targets = targets.len(), total_lines, "loaded targets");
    Ok(targets)
}

/// Loads the year mapping, the targets and every declared source concurrently.
///
/// Any unreadable file aborts the whole load.
pub fn load_all_inputs(config: &DiConfig) -> DiResult<Inputs> {
    thread::scope(|s| {
        let doi_year_h = s.spawn(move || read_doi_year_file(&config.doi_year_path));
        let targets_h = s.spawn(move || read_target_file(&config.target_path));
        let source_hs: Vec<_> = config
            .sources
            .iter()
            .map(|src| (src.name.clone(), s.spawn(move || read_citation_file(&src.path))))
            .collect();

        let doi_year = join_loader(doi_year_h)?;
        let targets = join_loader(targets_h)?;
        let mut citations = HashMap::new();
        for (name, handle) in source_hs {
            citations.insert(name, join_loader(handle)?);
        }
        for src in config.sources.iter() {
            if !citations.contains_key(src.name.as_str()) {
                return Err(DiError::MissingSource(src.name.clone()));
            }
        }
        Ok(Inputs {
            doi_year,
            targets,
            citations,
        })
    })
}

fn join_loader<T>(handle: thread::ScopedJoinHandle<'_, DiResult<T>>) -> DiResult<T> {
    match handle.join() {
        Ok(res) => res,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
