use std::path::Path;

use csv::Writer;
use hashbrown::HashMap;
use tracing::info;

use crate::{
    common::{DiConfig, Year, ALL_SOURCES},
    errors::DiResult,
    metrics::{float_cell, MetricRecord, METRIC_COLUMNS, RECORD_COLUMNS},
};

pub const INV_DEP: &str = "invDEP";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub record: MetricRecord,
    pub inv_dep: Option<f64>,
}

pub struct ResultTable {
    pub name: String,
    pub rows: Vec<ResultRow>,
}

pub struct RunOutput {
    pub sources: Vec<ResultTable>,
    pub combined: ResultTable,
}

/// `invDEP = 1 + max(DEP) - DEP` within each (Source, Y) group; undefined DEP stays undefined.
pub fn with_inv_dep(records: Vec<MetricRecord>) -> Vec<ResultRow> {
    let mut group_max: HashMap<(String, Year), f64> = HashMap::new();
    for rec in records.iter() {
        if let Some(dep) = rec.metrics.dep {
            group_max
                .entry((rec.source.clone(), rec.elapsed))
                .and_modify(|m| *m = m.max(dep))
                .or_insert(dep);
        }
    }

    records
        .into_iter()
        .map(|record| {
            let inv_dep = record.metrics.dep.and_then(|dep| {
                group_max
                    .get(&(record.source.clone(), record.elapsed))
                    .map(|max_dep| 1.0 + (max_dep - dep))
            });
            ResultRow { record, inv_dep }
        })
        .collect()
}

pub fn source_table(name: &str, mut records: Vec<MetricRecord>) -> ResultTable {
    records.sort_by(|l, r| l.doi.cmp(&r.doi).then(l.elapsed.cmp(&r.elapsed)));
    ResultTable {
        name: name.to_string(),
        rows: with_inv_dep(records),
    }
}

/// Concatenates every source's records and ranks them again as one stream.
pub fn combined_table(sources: &[ResultTable]) -> ResultTable {
    let mut records: Vec<MetricRecord> = sources
        .iter()
        .flat_map(|t| t.rows.iter().map(|row| row.record.clone()))
        .collect();
    records.sort_by(|l, r| {
        l.source
            .cmp(&r.source)
            .then_with(|| l.doi.cmp(&r.doi))
            .then(l.elapsed.cmp(&r.elapsed))
    });
    ResultTable {
        name: ALL_SOURCES.to_string(),
        rows: with_inv_dep(records),
    }
}

pub fn collect_tables(per_source: Vec<(String, Vec<MetricRecord>)>) -> RunOutput {
    let sources: Vec<ResultTable> = per_source
        .into_iter()
        .map(|(name, records)| source_table(&name, records))
        .collect();
    let combined = combined_table(&sources);
    RunOutput { sources, combined }
}

pub fn header() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = RECORD_COLUMNS.to_vec();
    out.extend(METRIC_COLUMNS);
    out.push(INV_DEP);
    out
}

pub fn write_table(path: &Path, table: &ResultTable) -> DiResult<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(header())?;
    for row in table.rows.iter() {
        let mut cells = row.record.cells();
        cells.push(float_cell(row.inv_dep));
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    info!(table = %table.name, path = %path.display(), n_rows = table.rows.len(), "wrote table");
    Ok(())
}

pub fn write_tables(config: &DiConfig, output: &RunOutput) -> DiResult<()> {
    for table in output.sources.iter().chain(std::iter::once(&output.combined)) {
        write_table(&config.out_path(&table.name)?, table)?;
    }
    Ok(())
}
