//! Display ranges for the two plot types. Everything here is a pure function
//! of the input data.

use crate::layout::TrackGeometry;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Fixed vertical range of the gene/isoform model row.
pub const MODEL_ROW_RANGE: AxisRange = AxisRange { min: -1.0, max: 2.0 };

/// Gene track x range: the gene span padded by 10% of its length on each side.
pub fn gene_x_range(geometry: &TrackGeometry) -> AxisRange {
    let length = geometry.length as f64;
    AxisRange::new(
        geometry.track_start as f64 - length * 0.1,
        geometry.track_end as f64 + length * 0.1,
    )
}

/// Read count range for the gene track data row.
pub fn gene_y_range(totals: &[f64]) -> AxisRange {
    let max_y = totals.iter().cloned().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    });
    let max_y = max_y.unwrap_or(0.0);
    AxisRange::new(-(0.05 * max_y), max_y * 1.05)
}

/// Percentile with linear interpolation between closest ranks.
/// Returns `None` for an empty sample.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Isoform track x range: 5th percentile of read starts to 95th percentile of
/// read ends (never short of the transcript end), padded by 5%.
pub fn isoform_x_range(
    transcript_start: i64,
    transcript_end: i64,
    read_starts: &[f64],
    read_ends: &[f64],
) -> AxisRange {
    let xmin = percentile(read_starts, 5.0)
        .map(|v| v.trunc() as i64)
        .unwrap_or(transcript_start);
    let xmax = percentile(read_ends, 95.0)
        .map(|v| v.trunc() as i64)
        .unwrap_or(transcript_end)
        .max(transcript_end);
    let length = (xmax - xmin) as f64;
    AxisRange::new(xmin as f64 - 0.05 * length, xmax as f64 + 0.05 * length)
}

/// Isoform track data row: one row per read, indexed from zero.
pub fn isoform_y_range(read_count: usize) -> AxisRange {
    AxisRange::new(0.0, read_count.saturating_sub(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TrackKind;

    #[test]
    fn gene_range_is_padded_by_ten_percent() {
        let geometry = TrackGeometry::new(100, 200, TrackKind::Gene);
        assert_eq!(gene_x_range(&geometry), AxisRange::new(90.0, 210.0));
    }

    #[test]
    fn gene_y_range_pads_max() {
        let r = gene_y_range(&[3.0, 20.0, 7.0]);
        assert!((r.min + 1.0).abs() < 1e-12);
        assert!((r.max - 21.0).abs() < 1e-12);
    }

    #[test]
    fn gene_y_range_without_points_is_flat() {
        let r = gene_y_range(&[]);
        assert_eq!(r.span(), 0.0);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 50.0), Some(3.0));
        assert!((percentile(&v, 5.0).unwrap() - 1.2).abs() < 1e-12);
        assert!((percentile(&v, 95.0).unwrap() - 4.8).abs() < 1e-12);
        assert_eq!(percentile(&[], 5.0), None);
        assert_eq!(percentile(&[7.0], 95.0), Some(7.0));
    }

    #[test]
    fn isoform_range_never_cuts_transcript_end() {
        // reads end well before the transcript end
        let r = isoform_x_range(0, 1000, &[-10.0, 0.0, 5.0], &[200.0, 300.0, 400.0]);
        // xmin = trunc(-9.0) = -9, xmax = 1000, length 1009
        assert!((r.min - (-9.0 - 50.45)).abs() < 1e-9);
        assert!((r.max - (1000.0 + 50.45)).abs() < 1e-9);
    }

    #[test]
    fn isoform_range_follows_long_reads() {
        let starts = [0.0; 10];
        let ends = [2000.0; 10];
        let r = isoform_x_range(0, 1000, &starts, &ends);
        assert_eq!(r, AxisRange::new(-100.0, 2100.0));
    }

    #[test]
    fn isoform_range_without_reads_uses_transcript() {
        let r = isoform_x_range(0, 500, &[], &[]);
        assert_eq!(r, AxisRange::new(-25.0, 525.0));
        assert_eq!(isoform_y_range(0), AxisRange::new(0.0, 0.0));
        assert_eq!(isoform_y_range(12), AxisRange::new(0.0, 11.0));
    }
}
