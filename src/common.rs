use std::{
    fs::{create_dir_all, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use hashbrown::{HashMap, HashSet};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::{DiError, DiResult};

pub type Doi = String;
pub type Year = i32;

pub type DoiSet = HashSet<Doi>;
pub type DoiMap<T> = HashMap<Doi, T>;
/// Citing works visible in one window, borrowed from the year bins.
pub type AllowedSet<'a> = HashSet<&'a str>;

pub const HOT_REF_PERCENTAGE: f64 = 0.03;
pub const D5_THRESHOLD: usize = 5;

pub const ALL_SOURCES: &str = "ALL-SOURCES";

/// Year of a citing work as used for binning: only plain runs of ASCII digits count.
///
/// Runs too large for `Year` saturate to `Year::MAX`, past any reachable window.
pub fn parse_bin_year(raw: &str) -> Option<Year> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(raw.parse::<Year>().unwrap_or(Year::MAX))
}

/// Publication year of a target, lenient about surrounding whitespace and a sign.
pub fn parse_target_year(raw: &str) -> Option<Year> {
    raw.trim().parse::<Year>().ok()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SourceSpec {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiConfig {
    pub cutoff_year: Year,

    #[serde(default = "default_hot_ref_percentage")]
    pub hot_ref_percentage: f64,

    #[serde(default = "default_d5_threshold")]
    pub d5_threshold: usize,

    /// worker count; available parallelism when absent
    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default = "default_true")]
    pub cache_hot_refs: bool,

    #[serde(default)]
    pub doi_year_path: PathBuf,

    #[serde(default)]
    pub target_path: PathBuf,

    #[serde(default)]
    pub sources: Vec<SourceSpec>,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    #[serde(default = "default_out_prefix")]
    pub out_prefix: String,
}

fn default_hot_ref_percentage() -> f64 {
    HOT_REF_PERCENTAGE
}

fn default_d5_threshold() -> usize {
    D5_THRESHOLD
}

fn default_true() -> bool {
    true
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_out_prefix() -> String {
    "results".to_string()
}

impl DiConfig {
    pub fn new(cutoff_year: Year) -> Self {
        Self {
            cutoff_year,
            hot_ref_percentage: HOT_REF_PERCENTAGE,
            d5_threshold: D5_THRESHOLD,
            threads: None,
            cache_hot_refs: true,
            doi_year_path: PathBuf::new(),
            target_path: PathBuf::new(),
            sources: Vec::new(),
            out_dir: default_out_dir(),
            out_prefix: default_out_prefix(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> DiResult<Self> {
        let path = path.as_ref();
        let mut js_str = String::new();
        BufReader::new(File::open(path).map_err(|e| DiError::load(path, e))?)
            .read_to_string(&mut js_str)
            .map_err(|e| DiError::load(path, e))?;
        let conf: Self = deserialize_verbose(&js_str)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> DiResult<()> {
        if self.cutoff_year == Year::MAX {
            return Err(DiError::Config(format!(
                "cutoff_year must be below {}",
                Year::MAX
            )));
        }
        if !(self.hot_ref_percentage > 0.0 && self.hot_ref_percentage <= 1.0) {
            return Err(DiError::Config(format!(
                "hot_ref_percentage must be in (0, 1], got {}",
                self.hot_ref_percentage
            )));
        }
        if self.d5_threshold < 1 {
            return Err(DiError::Config("d5_threshold must be at least 1".to_string()));
        }
        if self.threads == Some(0) {
            return Err(DiError::Config("threads must be at least 1".to_string()));
        }
        if self.sources.is_empty() {
            return Err(DiError::Config("no citation sources declared".to_string()));
        }
        Ok(())
    }

    pub fn n_threads(&self, n_tasks: usize) -> usize {
        let available = self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        });
        available.min(n_tasks).max(1)
    }

    pub fn out_path(&self, table_name: &str) -> DiResult<PathBuf> {
        create_dir_all(&self.out_dir).map_err(|e| DiError::load(&self.out_dir, e))?;
        Ok(self
            .out_dir
            .join(format!("{}-{}.csv", self.out_prefix, table_name)))
    }
}

pub fn count_visible(dois: &DoiSet, allowed: &AllowedSet) -> usize {
    if dois.len() < allowed.len() {
        dois.iter().filter(|d| allowed.contains(d.as_str())).count()
    } else {
        allowed.iter().filter(|d| dois.contains(**d)).count()
    }
}

pub fn count_common(left: &DoiSet, right: &DoiSet) -> usize {
    let (small, large) = if left.len() < right.len() {
        (left, right)
    } else {
        (right, left)
    };
    small.iter().filter(|d| large.contains(*d)).count()
}

pub fn deserialize_verbose<T: DeserializeOwned>(s: &str) -> DiResult<T> {
    let deserializer = &mut serde_json::Deserializer::from_str(s);
    Ok(serde_path_to_error::deserialize(deserializer)?)
}
