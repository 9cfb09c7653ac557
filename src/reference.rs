use crate::error::{Result, TspliceError};
use crate::layout::{Interval, Strand};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

pub const GENES_FILE: &str = "genes_coordinates.tsv";
pub const EXONS_FILE: &str = "exon_coordinates.tsv";
pub const DATASET_FILE: &str = "SL_&_mimic_positions.tsv";
pub const ATG_FILE: &str = "CDS_start_positions.tsv";

lazy_static! {
    static ref GENE_FROM_ISOFORM: Regex = Regex::new(r"\w+.\d+").expect("static pattern");
}

/// Gene identifier of a transcript name, e.g. `Y105E8B.1a` -> `Y105E8B.1`.
pub fn isoform_to_gene(isoform: &str) -> Option<&str> {
    GENE_FROM_ISOFORM.find(isoform).map(|m| m.as_str())
}

/// Integer columns are sometimes written as floats (`1234.0`) by upstream tools.
pub(crate) fn de_int<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let value: f64 = raw.trim().parse().map_err(de::Error::custom)?;
    if !value.is_finite() {
        return Err(de::Error::custom(format!("not an integer: {}", raw)));
    }
    Ok(value.trunc() as i64)
}

/// Optional float column; empty cells and `NaN` both mean missing.
pub(crate) fn de_opt_float<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => {
            let v: f64 = s.parse().map_err(de::Error::custom)?;
            Ok(if v.is_nan() { None } else { Some(v) })
        }
    }
}

/// Reads a tab-separated table with a header row.
pub(crate) fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let table_err = |source| TspliceError::Table { path: path.to_path_buf(), source };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(table_err)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.map_err(table_err)?);
    }
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[derive(Debug, Clone, Deserialize)]
struct GeneRow {
    #[serde(rename = "CDS")]
    cds: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(deserialize_with = "de_int")]
    start: i64,
    #[serde(deserialize_with = "de_int")]
    end: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ExonRow {
    gene: String,
    #[serde(deserialize_with = "de_int")]
    start: i64,
    #[serde(deserialize_with = "de_int")]
    end: i64,
    #[serde(default)]
    strand: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SplicingRow {
    gene: String,
    #[serde(deserialize_with = "de_int")]
    position: i64,
    total: f64,
    #[serde(rename = "%SL")]
    pct_sl: f64,
    #[serde(rename = "%hairpin")]
    pct_hairpin: f64,
    #[serde(rename = "%unidentified")]
    pct_unidentified: f64,
    #[serde(rename = "SL2_ratio", default, deserialize_with = "de_opt_float")]
    sl2_ratio: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct AtgRow {
    transcript: String,
    #[serde(rename = "CDS_start", deserialize_with = "de_int")]
    cds_start: i64,
}

/// One alignment start position of the splicing dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SplicingPoint {
    pub position: i64,
    pub total: f64,
    pub pct_sl: f64,
    pub pct_hairpin: f64,
    pub pct_unidentified: f64,
    pub sl2_ratio: Option<f64>,
}

/// Systematic gene ID <-> display name, restricted to genes with data.
#[derive(Debug, Clone, Default)]
pub struct GeneNames {
    by_id: HashMap<String, String>,
    by_name: HashMap<String, String>,
    ordered: Vec<(String, String)>,
}

impl GeneNames {
    /// `pairs` is `(id, name)`; a missing or empty name falls back to the id.
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let mut ordered: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(id, name)| {
                let name = name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| id.clone());
                (id, name)
            })
            .collect();
        ordered.sort_by(|a, b| {
            a.1.to_lowercase()
                .cmp(&b.1.to_lowercase())
                .then_with(|| a.0.cmp(&b.0))
        });
        ordered.dedup_by(|a, b| a.0 == b.0);

        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (id, name) in &ordered {
            by_id.insert(id.clone(), name.clone());
            by_name.entry(name.clone()).or_insert_with(|| id.clone());
        }
        Self { by_id, by_name, ordered }
    }

    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn gene_id_for_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// Systematic ID first, then display name.
    pub fn resolve(&self, input: &str) -> Option<&str> {
        let input = input.trim();
        match self.by_id.get_key_value(input) {
            Some((id, _)) => Some(id.as_str()),
            None => self.gene_id_for_name(input),
        }
    }

    /// `(id, name)` ordered by case-insensitive display name.
    pub fn ordered(&self) -> &[(String, String)] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// `"name (id)"`, or just the id when both are the same.
    pub fn title(&self, id: &str) -> String {
        match self.display_name(id) {
            Some(name) if name != id => format!("{} ({})", name, id),
            _ => id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneExons {
    pub exons: Vec<Interval>,
    pub strand: Strand,
}

/// Immutable reference tables, loaded once and shared read-only.
#[derive(Debug, Default)]
pub struct ReferenceData {
    spans: HashMap<String, (i64, i64)>,
    exons: HashMap<String, Vec<ExonRow>>,
    splicing: HashMap<String, Vec<SplicingPoint>>,
    atg: HashMap<String, Vec<i64>>,
    names: GeneNames,
}

impl ReferenceData {
    pub fn load(dir: &Path) -> Result<Self> {
        info!("Loading reference tables from {}", dir.display());
        let genes: Vec<GeneRow> = read_table(&dir.join(GENES_FILE))?;
        let exons: Vec<ExonRow> = read_table(&dir.join(EXONS_FILE))?;
        let dataset: Vec<SplicingRow> = read_table(&dir.join(DATASET_FILE))?;
        let atg: Vec<AtgRow> = read_table(&dir.join(ATG_FILE))?;
        let data = Self::from_rows(genes, exons, dataset, atg);
        info!(
            "Reference data ready: {} genes with data, {} gene models, {} genes with ATG positions",
            data.names.len(),
            data.spans.len(),
            data.atg.len()
        );
        Ok(data)
    }

    fn from_rows(
        genes: Vec<GeneRow>,
        exons: Vec<ExonRow>,
        dataset: Vec<SplicingRow>,
        atg: Vec<AtgRow>,
    ) -> Self {
        let mut splicing: HashMap<String, Vec<SplicingPoint>> = HashMap::new();
        for row in dataset {
            splicing.entry(row.gene).or_default().push(SplicingPoint {
                position: row.position,
                total: row.total,
                pct_sl: row.pct_sl,
                pct_hairpin: row.pct_hairpin,
                pct_unidentified: row.pct_unidentified,
                sl2_ratio: row.sl2_ratio,
            });
        }

        let mut spans = HashMap::new();
        let mut gene_names: HashMap<String, Option<String>> = HashMap::new();
        for row in genes {
            if splicing.contains_key(&row.cds) {
                gene_names.insert(row.cds.clone(), row.name.clone());
            }
            spans.insert(row.cds, (row.start, row.end));
        }
        let names = GeneNames::new(
            splicing
                .keys()
                .map(|id| (id.clone(), gene_names.get(id).cloned().flatten())),
        );

        let mut grouped: HashMap<String, Vec<ExonRow>> = HashMap::new();
        for row in exons {
            grouped.entry(row.gene.clone()).or_default().push(row);
        }

        let mut atg_sets: HashMap<String, BTreeSet<i64>> = HashMap::new();
        for row in atg {
            match isoform_to_gene(&row.transcript) {
                Some(gene) => {
                    atg_sets.entry(gene.to_string()).or_default().insert(row.cds_start);
                }
                None => warn!("Skipping ATG row with unparsable transcript {}", row.transcript),
            }
        }
        let atg = atg_sets
            .into_iter()
            .map(|(gene, set)| (gene, set.into_iter().collect()))
            .collect();

        Self {
            spans,
            exons: grouped,
            splicing,
            atg,
            names,
        }
    }

    pub fn names(&self) -> &GeneNames {
        &self.names
    }

    /// True when the gene is part of the splicing dataset.
    pub fn has_data(&self, id: &str) -> bool {
        self.splicing.contains_key(id)
    }

    pub fn resolve(&self, input: &str) -> Result<String> {
        self.names
            .resolve(input)
            .map(str::to_string)
            .ok_or_else(|| TspliceError::UnknownGene(input.trim().to_string()))
    }

    pub fn gene_span(&self, id: &str) -> Result<(i64, i64)> {
        self.spans.get(id).copied().ok_or_else(|| TspliceError::MissingGeometry {
            gene: id.to_string(),
            table: GENES_FILE,
        })
    }

    /// Exons of a gene with duplicate spans removed, sorted by start. The
    /// strand is taken from the first exon.
    pub fn gene_exons(&self, id: &str) -> GeneExons {
        let rows = self.exons.get(id).map(Vec::as_slice).unwrap_or(&[]);
        let mut seen = HashSet::new();
        let mut unique: Vec<&ExonRow> = rows
            .iter()
            .filter(|row| seen.insert((row.start, row.end)))
            .collect();
        unique.sort_by_key(|row| row.start);
        let strand = unique
            .first()
            .and_then(|row| row.strand.as_deref())
            .map(Strand::from_symbol)
            .unwrap_or(Strand::Unknown);
        GeneExons {
            exons: unique.iter().map(|row| Interval::new(row.start, row.end)).collect(),
            strand,
        }
    }

    pub fn splicing_points(&self, id: &str) -> &[SplicingPoint] {
        self.splicing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn atg_positions(&self, id: &str) -> &[i64] {
        self.atg.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Small reference directory: lev-11 (+ strand, named), Y105E8B.1
    /// (- strand, no name) and a dataset gene without coordinates.
    pub(crate) fn fixture_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(GENES_FILE),
            "CDS\tname\tstart\tend\n\
             C09D4.5\tlev-11\t1000\t2000\n\
             Y105E8B.1\t\t5000\t5600\n\
             F00A0.1\tunused\t1\t2\n\
             T05E7.4\t\t3000\t3500\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(EXONS_FILE),
            "gene\tstart\tend\tstrand\n\
             C09D4.5\t1500\t1700\t+\n\
             C09D4.5\t1000\t1200\t+\n\
             C09D4.5\t1000\t1200\t+\n\
             C09D4.5\t1100\t1300\t+\n\
             C09D4.5\t1800\t2000\t+\n\
             Y105E8B.1\t5000\t5200\t-\n\
             Y105E8B.1\t5400\t5600\t-\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(DATASET_FILE),
            "gene\tposition\ttotal\t%SL\t%hairpin\t%unidentified\tSL2_ratio\n\
             C09D4.5\t1010\t12\t100.0\t0.0\t0.0\t0.25\n\
             C09D4.5\t1020\t4\t50.0\t25.0\t25.0\tNaN\n\
             Y105E8B.1\t5590\t7\t0.0\t100.0\t0.0\t\n\
             ZK000.9\t10\t1\t0.0\t0.0\t100.0\t\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(ATG_FILE),
            "transcript\tCDS_start\n\
             C09D4.5a\t1100\n\
             C09D4.5b\t1100\n\
             C09D4.5c\t1050\n\
             ---\t1\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn isoform_names_map_to_genes() {
        assert_eq!(isoform_to_gene("Y105E8B.1a"), Some("Y105E8B.1"));
        assert_eq!(isoform_to_gene("C09D4.5"), Some("C09D4.5"));
        assert_eq!(isoform_to_gene("---"), None);
    }

    #[test]
    fn names_resolve_both_ways() {
        let dir = fixture_dir();
        let data = ReferenceData::load(dir.path()).unwrap();
        let names = data.names();
        assert_eq!(names.len(), 3);
        assert_eq!(names.display_name("C09D4.5"), Some("lev-11"));
        assert_eq!(names.gene_id_for_name("lev-11"), Some("C09D4.5"));
        assert_eq!(names.display_name("Y105E8B.1"), Some("Y105E8B.1"));
        assert_eq!(names.resolve("lev-11"), Some("C09D4.5"));
        assert_eq!(names.resolve(" C09D4.5 "), Some("C09D4.5"));
        assert_eq!(names.resolve("unused"), None);
        assert_eq!(names.resolve("F00A0.1"), None);
        assert_eq!(names.title("C09D4.5"), "lev-11 (C09D4.5)");
        assert_eq!(names.title("Y105E8B.1"), "Y105E8B.1");
    }

    #[test]
    fn ordered_names_sort_case_insensitively() {
        let names = GeneNames::new(vec![
            ("b".to_string(), Some("Zed".to_string())),
            ("a".to_string(), Some("alpha".to_string())),
            ("c".to_string(), None),
        ]);
        let order: Vec<&str> = names.ordered().iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(order, vec!["alpha", "c", "Zed"]);
    }

    #[test]
    fn gene_exons_are_deduplicated_and_sorted() {
        let dir = fixture_dir();
        let data = ReferenceData::load(dir.path()).unwrap();
        let exons = data.gene_exons("C09D4.5");
        assert_eq!(exons.strand, Strand::Forward);
        let spans: Vec<(i64, i64)> = exons.exons.iter().map(|i| (i.start, i.end)).collect();
        assert_eq!(spans, vec![(1000, 1200), (1100, 1300), (1500, 1700), (1800, 2000)]);
        assert_eq!(data.gene_exons("Y105E8B.1").strand, Strand::Reverse);
        let none = data.gene_exons("ZK000.9");
        assert!(none.exons.is_empty());
        assert_eq!(none.strand, Strand::Unknown);
    }

    #[test]
    fn missing_coordinates_are_reported() {
        let dir = fixture_dir();
        let data = ReferenceData::load(dir.path()).unwrap();
        assert_eq!(data.gene_span("C09D4.5").unwrap(), (1000, 2000));
        match data.gene_span("ZK000.9") {
            Err(TspliceError::MissingGeometry { gene, table }) => {
                assert_eq!(gene, "ZK000.9");
                assert_eq!(table, GENES_FILE);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(data.resolve("nope"), Err(TspliceError::UnknownGene(_))));
    }

    #[test]
    fn dataset_and_atg_tables_are_grouped() {
        let dir = fixture_dir();
        let data = ReferenceData::load(dir.path()).unwrap();
        let points = data.splicing_points("C09D4.5");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].sl2_ratio, Some(0.25));
        assert_eq!(points[1].sl2_ratio, None);
        assert_eq!(data.splicing_points("Y105E8B.1")[0].sl2_ratio, None);
        assert_eq!(data.atg_positions("C09D4.5"), &[1050, 1100]);
        assert!(data.atg_positions("Y105E8B.1").is_empty());
    }

    #[test]
    fn missing_table_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReferenceData::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(GENES_FILE));
    }
}
