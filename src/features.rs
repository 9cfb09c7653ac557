use crate::error::{Result, TspliceError};
use crate::layout::{Interval, Strand};
use crate::reference::{de_int, de_opt_float, read_table};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

pub const TRANSCRIPTS_FILE: &str = "transcripts_length.tsv";
pub const ISOFORM_EXONS_FILE: &str = "exon_coordinates_full.txt";
pub const ISOFORMS_FILE: &str = "isoform_list.tsv";
pub const FEATURES_FILE: &str = "features_dataset.tsv";

#[derive(Debug, Deserialize)]
struct TranscriptRow {
    transcript: String,
    #[serde(deserialize_with = "de_int")]
    size: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct IsoformExonRow {
    #[serde(rename = "Transcript stable ID")]
    transcript: String,
    #[serde(rename = "cDNA coding start", default, deserialize_with = "de_opt_float")]
    coding_start: Option<f64>,
    #[serde(rename = "cDNA coding end", default, deserialize_with = "de_opt_float")]
    coding_end: Option<f64>,
    #[serde(rename = "Exon rank in transcript", deserialize_with = "de_int")]
    rank: i64,
    #[serde(rename = "Strand", deserialize_with = "de_int")]
    strand: i64,
}

#[derive(Debug, Deserialize)]
struct IsoformRow {
    gene: String,
    isoform: String,
}

/// Per-read feature annotations, in transcript coordinates relative to
/// `transcriptomic_start`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureRead {
    pub isoform: String,
    pub transcriptomic_start: f64,
    #[serde(rename = "SC5")]
    pub sc5: f64,
    pub alignment_length: f64,
    #[serde(rename = "SC3")]
    pub sc3: f64,
    #[serde(rename = "SSP_FOUND", default, deserialize_with = "de_opt_float")]
    pub ssp_found: Option<f64>,
    #[serde(rename = "SSP_dist", default, deserialize_with = "de_opt_float")]
    pub ssp_dist: Option<f64>,
    #[serde(rename = "SSP_size", default, deserialize_with = "de_opt_float")]
    pub ssp_size: Option<f64>,
    #[serde(rename = "ROBUST_SL_FOUND", default, deserialize_with = "de_opt_float")]
    pub sl_found: Option<f64>,
    #[serde(rename = "SL_distance", default, deserialize_with = "de_opt_float")]
    pub sl_distance: Option<f64>,
    #[serde(rename = "SL_score", default, deserialize_with = "de_opt_float")]
    pub sl_score: Option<f64>,
    #[serde(rename = "HAIRPIN_FOUND", default, deserialize_with = "de_opt_float")]
    pub hairpin_found: Option<f64>,
    #[serde(rename = "HAIRPIN_stem1_start", default, deserialize_with = "de_opt_float")]
    pub stem1_start: Option<f64>,
    #[serde(rename = "HAIRPIN_stem1_end", default, deserialize_with = "de_opt_float")]
    pub stem1_end: Option<f64>,
    #[serde(rename = "HAIRPIN_stem2_start", default, deserialize_with = "de_opt_float")]
    pub stem2_start: Option<f64>,
    #[serde(rename = "HAIRPIN_stem2_end", default, deserialize_with = "de_opt_float")]
    pub stem2_end: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentKind {
    FivePrimeClip,
    Alignment,
    ThreePrimeClip,
    Ssp,
    SpliceLeader,
    HairpinStem1,
    HairpinLoop,
    HairpinStem2,
}

impl SegmentKind {
    pub fn color(self) -> &'static str {
        match self {
            SegmentKind::FivePrimeClip => "rgba(173,216,230,0.2)",
            SegmentKind::Alignment => "rgba(128,128,128,0.2)",
            SegmentKind::ThreePrimeClip => "rgba(255,182,193,0.2)",
            SegmentKind::Ssp => "orange",
            SegmentKind::SpliceLeader => "#d40f2c",
            SegmentKind::HairpinStem1 => "#89e0a0",
            SegmentKind::HairpinLoop => "black",
            SegmentKind::HairpinStem2 => "#3c9152",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SegmentKind::FivePrimeClip => "5' soft-clip",
            SegmentKind::Alignment => "Alignment",
            SegmentKind::ThreePrimeClip => "3' soft-clip",
            SegmentKind::Ssp => "SSP sequence",
            SegmentKind::SpliceLeader => "SL sequence",
            SegmentKind::HairpinStem1 | SegmentKind::HairpinLoop | SegmentKind::HairpinStem2 => "HAIRPIN",
        }
    }

    pub fn dotted(self) -> bool {
        self == SegmentKind::HairpinLoop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadSegment {
    pub kind: SegmentKind,
    pub x0: f64,
    pub x1: f64,
}

fn flagged(flag: Option<f64>) -> bool {
    flag == Some(1.0)
}

impl FeatureRead {
    pub fn offset(&self) -> f64 {
        self.transcriptomic_start.trunc()
    }

    /// Leftmost base covered by the read, 5' soft-clip included.
    pub fn clip_start(&self) -> f64 {
        self.sc5 + self.offset()
    }

    /// Rightmost base covered by the read, 3' soft-clip included.
    pub fn clip_end(&self) -> f64 {
        self.sc3 + self.offset()
    }

    pub fn segments(&self) -> Vec<ReadSegment> {
        let offset = self.offset();
        let aln_end = self.alignment_length + offset;
        let mut segments = vec![
            ReadSegment { kind: SegmentKind::FivePrimeClip, x0: self.clip_start(), x1: offset },
            ReadSegment { kind: SegmentKind::Alignment, x0: offset, x1: aln_end },
            ReadSegment { kind: SegmentKind::ThreePrimeClip, x0: aln_end, x1: self.clip_end() },
        ];

        if flagged(self.ssp_found) {
            if let (Some(dist), Some(size)) = (self.ssp_dist, self.ssp_size) {
                let end = dist.trunc() + offset;
                segments.push(ReadSegment { kind: SegmentKind::Ssp, x0: end - size.trunc(), x1: end });
            }
        }

        if flagged(self.sl_found) {
            if let (Some(dist), Some(score)) = (self.sl_distance, self.sl_score) {
                let end = dist.trunc() + offset;
                segments.push(ReadSegment { kind: SegmentKind::SpliceLeader, x0: end - score.trunc(), x1: end });
            }
        }

        if flagged(self.hairpin_found) {
            if let (Some(s1), Some(e1), Some(s2), Some(e2)) =
                (self.stem1_start, self.stem1_end, self.stem2_start, self.stem2_end)
            {
                let (s1, e1, s2, e2) = (s1 + offset, e1 + offset, s2 + offset, e2 + offset);
                segments.push(ReadSegment { kind: SegmentKind::HairpinStem1, x0: s1, x1: e1 });
                segments.push(ReadSegment { kind: SegmentKind::HairpinLoop, x0: e1, x1: s2 });
                segments.push(ReadSegment { kind: SegmentKind::HairpinStem2, x0: s2, x1: e2 });
            }
        }
        segments
    }
}

#[derive(Debug, Clone)]
pub struct IsoformExons {
    pub exons: Vec<Interval>,
    pub strand: Strand,
}

/// Tables behind the read-feature view.
#[derive(Debug, Default)]
pub struct FeatureData {
    transcript_lengths: HashMap<String, i64>,
    exons: HashMap<String, Vec<IsoformExonRow>>,
    isoforms: HashMap<String, Vec<String>>,
    reads: HashMap<String, Vec<FeatureRead>>,
}

impl FeatureData {
    pub fn available(dir: &Path) -> bool {
        [TRANSCRIPTS_FILE, ISOFORM_EXONS_FILE, ISOFORMS_FILE, FEATURES_FILE]
            .iter()
            .all(|f| dir.join(f).is_file())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        info!("Loading read feature tables from {}", dir.display());
        let transcripts: Vec<TranscriptRow> = read_table(&dir.join(TRANSCRIPTS_FILE))?;
        let exon_rows: Vec<IsoformExonRow> = read_table(&dir.join(ISOFORM_EXONS_FILE))?;
        let isoform_rows: Vec<IsoformRow> = read_table(&dir.join(ISOFORMS_FILE))?;
        let read_rows: Vec<FeatureRead> = read_table(&dir.join(FEATURES_FILE))?;

        let transcript_lengths = transcripts.into_iter().map(|r| (r.transcript, r.size)).collect();

        let mut exons: HashMap<String, Vec<IsoformExonRow>> = HashMap::new();
        for row in exon_rows {
            exons.entry(row.transcript.clone()).or_default().push(row);
        }
        for rows in exons.values_mut() {
            rows.sort_by_key(|r| r.rank);
        }

        let mut isoform_sets: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in isoform_rows {
            isoform_sets.entry(row.gene).or_default().insert(row.isoform);
        }
        let isoforms = isoform_sets
            .into_iter()
            .map(|(gene, set)| (gene, set.into_iter().collect()))
            .collect();

        let mut reads: HashMap<String, Vec<FeatureRead>> = HashMap::new();
        let total = read_rows.len();
        for read in read_rows {
            reads.entry(read.isoform.clone()).or_default().push(read);
        }
        for rows in reads.values_mut() {
            // descending by start, then by 5' clip
            rows.sort_by(|a, b| {
                b.transcriptomic_start
                    .total_cmp(&a.transcriptomic_start)
                    .then_with(|| b.sc5.total_cmp(&a.sc5))
            });
        }
        info!("Read feature data ready: {} reads over {} isoforms", total, reads.len());

        Ok(Self {
            transcript_lengths,
            exons,
            isoforms,
            reads,
        })
    }

    /// Sorted isoforms of a gene.
    pub fn isoforms(&self, gene: &str) -> &[String] {
        self.isoforms.get(gene).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn transcript_length(&self, isoform: &str) -> Result<i64> {
        self.transcript_lengths
            .get(isoform)
            .copied()
            .ok_or_else(|| TspliceError::UnknownIsoform(isoform.to_string()))
    }

    /// Coding exons in exon rank order, as `(cDNA start - 1, cDNA end)`.
    pub fn isoform_exons(&self, isoform: &str) -> IsoformExons {
        let coding: Vec<&IsoformExonRow> = self
            .exons
            .get(isoform)
            .map(|rows| rows.iter().filter(|r| r.coding_start.is_some()).collect())
            .unwrap_or_default();
        let strand = coding
            .first()
            .map(|r| Strand::from_sign(r.strand))
            .unwrap_or(Strand::Unknown);
        let exons = coding
            .iter()
            .filter_map(|r| match (r.coding_start, r.coding_end) {
                (Some(start), Some(end)) => Some(Interval::new(start as i64 - 1, end as i64)),
                _ => None,
            })
            .collect();
        IsoformExons { exons, strand }
    }

    /// Reads of an isoform in display order (row 0 first).
    pub fn reads(&self, isoform: &str) -> &[FeatureRead] {
        self.reads.get(isoform).map(Vec::as_slice).unwrap_or(&[])
    }
}
