//! Renderer-neutral figures for the gene plot and the read-feature plot.

use crate::axis::{self, AxisRange, MODEL_ROW_RANGE};
use crate::error::Result;
use crate::features::FeatureData;
use crate::layout::{layout_track, TrackKind, TrackLayout};
use crate::reference::{ReferenceData, SplicingPoint};
use serde::Serialize;

pub const ATG_COLOR: &str = "#36454F";
pub const MARKER_SIZE: f64 = 10.0;
const VERTICAL_SPACING: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Margin {
    pub const INTERACTIVE: Margin = Margin { left: 0.0, right: 10.0, top: 0.0, bottom: 0.0 };
    pub const EXPORT: Margin = Margin { left: 100.0, right: 100.0, top: 100.0, bottom: 100.0 };
    pub const TITLED: Margin = Margin { left: 0.0, right: 10.0, top: TITLE_BAND as f64, bottom: 0.0 };
}

/// Extra canvas height reserved above a titled figure.
pub const TITLE_BAND: u32 = 60;

/// A scatter point on the data row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    pub color: String,
    /// One entry per hover line.
    pub hover: Vec<String>,
}

/// A horizontal line segment on the data row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
    pub color: &'static str,
    pub dotted: bool,
    pub label: &'static str,
}

/// A dotted vertical marker spanning the data row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VLine {
    pub x: f64,
    pub color: &'static str,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub width: u32,
    pub height: u32,
    pub margin: Margin,
    /// Relative heights of the model row and the data row.
    pub row_heights: [f64; 2],
    pub vertical_spacing: f64,
    pub title: Option<String>,
    pub track: TrackLayout,
    pub x_range: AxisRange,
    pub model_y_range: AxisRange,
    pub data_y_range: AxisRange,
    pub markers: Vec<Marker>,
    pub segments: Vec<Segment>,
    pub vlines: Vec<VLine>,
    pub x_title: &'static str,
    pub y_title: &'static str,
    pub x_tick_suffix: &'static str,
    pub show_grid: bool,
}

impl Figure {
    /// Static export layout: larger canvas, wide margins and a title.
    pub fn for_export(mut self, title: impl Into<String>) -> Self {
        self.width = 1200;
        self.height = 900;
        self.margin = Margin::EXPORT;
        self.title = Some(title.into());
        self
    }

    /// Adds a title band on top and keeps the plot area as sized.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.height += TITLE_BAND;
        self.margin = Margin::TITLED;
        self.title = Some(title.into());
        self
    }
}

/// Marker color: red for SL, green for hairpin, blue for unidentified reads.
pub fn splicing_color(point: &SplicingPoint) -> String {
    let channel = |pct: f64| pct / 100.0 * 255.0;
    format!(
        "rgb({},{},{})",
        channel(point.pct_sl),
        channel(point.pct_hairpin),
        channel(point.pct_unidentified)
    )
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn splicing_hover(point: &SplicingPoint) -> Vec<String> {
    let sl2 = point
        .sl2_ratio
        .map(|r| format!("{}%", round2(r * 100.0)))
        .unwrap_or_else(|| "N/A%".to_string());
    vec![
        format!("Position: {}", thousands(point.position as f64)),
        format!("Reads: {}", point.total),
        String::new(),
        format!("SL: {}% | SL2 ratio: {}", point.pct_sl, sl2),
        format!("Hairpin: {}%", point.pct_hairpin),
        format!("Unknown: {}%", point.pct_unidentified),
    ]
}

/// Formats a number with `,` thousands separators, dropping a zero fraction.
pub fn thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (digits, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    let frac = frac.trim_end_matches('0');
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    if value < 0.0 && out != "0" {
        out.insert(0, '-');
    }
    out
}

/// Gene model plus per-position read counts for one gene.
pub fn gene_plot(reference: &ReferenceData, gene: &str, show_atg: bool) -> Result<Figure> {
    let (start, end) = reference.gene_span(gene)?;
    let exons = reference.gene_exons(gene);
    let track = layout_track(TrackKind::Gene, start, end, &exons.exons, exons.strand);

    let points = reference.splicing_points(gene);
    let markers: Vec<Marker> = points
        .iter()
        .map(|p| Marker {
            x: p.position as f64,
            y: p.total,
            color: splicing_color(p),
            hover: splicing_hover(p),
        })
        .collect();
    let totals: Vec<f64> = points.iter().map(|p| p.total).collect();

    let vlines = if show_atg {
        reference
            .atg_positions(gene)
            .iter()
            .map(|&x| VLine { x: x as f64, color: ATG_COLOR, width: 2.0 })
            .collect()
    } else {
        Vec::new()
    };

    Ok(Figure {
        width: 890,
        height: 500,
        margin: Margin::INTERACTIVE,
        row_heights: [2.0, 10.0],
        vertical_spacing: VERTICAL_SPACING,
        title: None,
        x_range: axis::gene_x_range(&track.geometry),
        model_y_range: MODEL_ROW_RANGE,
        data_y_range: axis::gene_y_range(&totals),
        track,
        markers,
        segments: Vec::new(),
        vlines,
        x_title: "genomic start position (bp)",
        y_title: "Number of reads",
        x_tick_suffix: "bp",
        show_grid: true,
    })
}

/// Row heights and canvas height for the read-feature plot, by read count.
pub fn feature_plot_size(read_count: usize) -> ([f64; 2], u32) {
    match read_count {
        0..=50 => ([6.0, 4.0], 200),
        51..=500 => ([2.0, 8.0], 500),
        501..=1000 => ([1.0, 9.0], 800),
        _ => ([0.5, 9.5], 1500),
    }
}

/// Isoform model plus one row of feature segments per read.
pub fn feature_plot(features: &FeatureData, isoform: &str) -> Result<Figure> {
    let transcript_end = features.transcript_length(isoform)?;
    let exons = features.isoform_exons(isoform);
    let track = layout_track(TrackKind::Isoform, 0, transcript_end, &exons.exons, exons.strand);

    let reads = features.reads(isoform);
    let mut segments = Vec::new();
    let mut starts = Vec::with_capacity(reads.len());
    let mut ends = Vec::with_capacity(reads.len());
    for (row, read) in reads.iter().enumerate() {
        starts.push(read.clip_start());
        ends.push(read.clip_end());
        segments.extend(read.segments().into_iter().map(|s| Segment {
            x0: s.x0,
            x1: s.x1,
            y: row as f64,
            color: s.kind.color(),
            dotted: s.kind.dotted(),
            label: s.kind.label(),
        }));
    }

    let (row_heights, height) = feature_plot_size(reads.len());
    Ok(Figure {
        width: 890,
        height,
        margin: Margin::INTERACTIVE,
        row_heights,
        vertical_spacing: VERTICAL_SPACING,
        title: None,
        x_range: axis::isoform_x_range(0, transcript_end, &starts, &ends),
        model_y_range: MODEL_ROW_RANGE,
        data_y_range: axis::isoform_y_range(reads.len()),
        track,
        markers: Vec::new(),
        segments,
        vlines: Vec::new(),
        x_title: "Reference transcript bases (nt)",
        y_title: "Number of reads",
        x_tick_suffix: "bp",
        show_grid: false,
    })
}
