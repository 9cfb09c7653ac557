//! Exon layout for a single-row gene or isoform diagram.
//!
//! The reducer keeps a non-overlapping subset of the exons of one gene or
//! isoform, the emitter turns every kept exon into one glyph. Coordinates are
//! base positions on x and the normalized row height on y: the reference line
//! sits at `y = 0.5` and exon glyphs span `[0, 1]`.

use serde::Serialize;

/// Arrow size factor for genome-anchored gene tracks.
pub const GENE_ARROW_FACTOR: f64 = 0.02;
/// Arrow size factor for transcript-anchored isoform tracks.
pub const ISOFORM_ARROW_FACTOR: f64 = 0.04;

pub const FORWARD_FILL: &str = "LightPink";
pub const REVERSE_FILL: &str = "LightSkyBlue";
pub const UNKNOWN_FILL: &str = "grey";
pub const EXON_STROKE: &str = "black";
pub const EXON_STROKE_WIDTH: f64 = 2.0;
pub const REFERENCE_LINE_WIDTH: f64 = 1.5;

/// A coordinate span. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    /// Builds an interval, swapping the bounds if they come in reversed.
    pub fn new(start: i64, end: i64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    #[inline]
    pub fn len(self) -> i64 {
        (self.start - self.end).abs()
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    /// `+` / `-` as written in the genomic exon table.
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.trim() {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    /// `1` / `-1` as written in the isoform exon table.
    pub fn from_sign(sign: i64) -> Self {
        match sign {
            1 => Strand::Forward,
            -1 => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    pub fn fill(self) -> &'static str {
        match self {
            Strand::Forward => FORWARD_FILL,
            Strand::Reverse => REVERSE_FILL,
            Strand::Unknown => UNKNOWN_FILL,
        }
    }
}

/// Acceptance test applied by [`reduce_exons`] against every kept exon.
///
/// The two tracks historically used different predicates. They disagree when
/// a candidate starts outside a kept exon but ends inside it: the gene track
/// drops it, the isoform track keeps it. Both are kept as is since unifying
/// them changes rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// `!(x <= s < y) && !(x <= e < y)`
    GeneTrack,
    /// `!(x <= s < y) || (x <= e < y)`
    IsoformTrack,
}

impl OverlapPolicy {
    pub fn accepts(self, candidate: Interval, kept: Interval) -> bool {
        let (s, e) = (candidate.start, candidate.end);
        let (x, y) = (kept.start, kept.end);
        let start_inside = x <= s && s < y;
        let end_inside = x <= e && e < y;
        match self {
            OverlapPolicy::GeneTrack => !start_inside && !end_inside,
            OverlapPolicy::IsoformTrack => !start_inside || end_inside,
        }
    }
}

/// Greedy single-row filter. Input must already be ordered and deduplicated.
pub fn reduce_exons(exons: &[Interval], policy: OverlapPolicy) -> Vec<Interval> {
    let mut kept: Vec<Interval> = Vec::with_capacity(exons.len());
    for &exon in exons {
        if kept.iter().all(|&k| policy.accepts(exon, k)) {
            kept.push(exon);
        }
    }
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Gene,
    Isoform,
}

impl TrackKind {
    pub fn arrow_factor(self) -> f64 {
        match self {
            TrackKind::Gene => GENE_ARROW_FACTOR,
            TrackKind::Isoform => ISOFORM_ARROW_FACTOR,
        }
    }

    pub fn policy(self) -> OverlapPolicy {
        match self {
            TrackKind::Gene => OverlapPolicy::GeneTrack,
            TrackKind::Isoform => OverlapPolicy::IsoformTrack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackGeometry {
    pub track_start: i64,
    pub track_end: i64,
    pub length: i64,
    pub arrow_size: f64,
}

impl TrackGeometry {
    pub fn new(track_start: i64, track_end: i64, kind: TrackKind) -> Self {
        let length = track_end - track_start;
        let padded = length as f64 + length as f64 * 0.2;
        Self {
            track_start,
            track_end,
            length,
            arrow_size: kind.arrow_factor() * padded,
        }
    }

    /// A terminal exon gets a pointed arrowhead only when it can host one.
    #[inline]
    pub fn fits_arrow(&self, exon: Interval) -> bool {
        self.arrow_size <= exon.len() as f64
    }
}

pub type Point = (f64, f64);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Glyph {
    Rect { x0: f64, y0: f64, x1: f64, y1: f64 },
    /// Exon with a pointed end; closed polygon.
    Arrow { points: Vec<Point> },
    /// Terminal exon too short for an arrowhead, drawn as a triangle.
    Wedge { points: Vec<Point> },
}

impl Glyph {
    fn rect(exon: Interval) -> Self {
        Glyph::Rect {
            x0: exon.start as f64,
            y0: 0.0,
            x1: exon.end as f64,
            y1: 1.0,
        }
    }

    fn pointing_left(exon: Interval, arrow_size: f64, fits: bool) -> Self {
        let (s, e) = (exon.start as f64, exon.end as f64);
        if fits {
            let xn = s + arrow_size;
            Glyph::Arrow {
                points: vec![(s, 0.5), (xn, 1.0), (e, 1.0), (e, 0.0), (xn, 0.0)],
            }
        } else {
            Glyph::Wedge {
                points: vec![(s, 0.5), (e, 1.0), (e, 0.0)],
            }
        }
    }

    fn pointing_right(exon: Interval, arrow_size: f64, fits: bool) -> Self {
        let (s, e) = (exon.start as f64, exon.end as f64);
        if fits {
            let xn = e - arrow_size;
            Glyph::Arrow {
                points: vec![(s, 0.0), (s, 1.0), (xn, 1.0), (e, 0.5), (xn, 0.0)],
            }
        } else {
            Glyph::Wedge {
                points: vec![(s, 0.0), (s, 1.0), (e, 0.5)],
            }
        }
    }

    /// Outline as an SVG/Plotly path string, e.g. `M10,0 L10,1 L20,0.5 Z`.
    pub fn path_data(&self) -> String {
        let points = match self {
            Glyph::Rect { x0, y0, x1, y1 } => vec![(*x0, *y0), (*x0, *y1), (*x1, *y1), (*x1, *y0)],
            Glyph::Arrow { points } | Glyph::Wedge { points } => points.clone(),
        };
        let mut d = String::new();
        for (i, (x, y)) in points.iter().enumerate() {
            if i > 0 {
                d.push(' ');
            }
            d.push(if i == 0 { 'M' } else { 'L' });
            d.push_str(&format!("{},{}", x, y));
        }
        d.push_str(" Z");
        d
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    pub glyph: Glyph,
    pub fill: &'static str,
}

/// The horizontal backbone of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackLayout {
    pub geometry: TrackGeometry,
    pub reference: ReferenceLine,
    pub exons: Vec<Interval>,
    pub shapes: Vec<Shape>,
}

/// Glyphs for a genome-anchored gene track; orientation follows the strand.
pub fn gene_shapes(kept: &[Interval], strand: Strand, geometry: &TrackGeometry) -> Vec<Shape> {
    let last = kept.len().saturating_sub(1);
    kept.iter()
        .enumerate()
        .map(|(i, &exon)| {
            let fits = geometry.fits_arrow(exon);
            let glyph = match strand {
                Strand::Reverse if i == 0 => Glyph::pointing_left(exon, geometry.arrow_size, fits),
                Strand::Forward if i == last => Glyph::pointing_right(exon, geometry.arrow_size, fits),
                _ => Glyph::rect(exon),
            };
            Shape { glyph, fill: strand.fill() }
        })
        .collect()
}

/// Glyphs for a transcript-anchored isoform track. Transcript coordinates
/// always run 5' to 3', so the arrow sits on the last exon for either strand.
pub fn isoform_shapes(kept: &[Interval], strand: Strand, geometry: &TrackGeometry) -> Vec<Shape> {
    let last = kept.len().saturating_sub(1);
    kept.iter()
        .enumerate()
        .map(|(i, &exon)| {
            let glyph = if i == last {
                Glyph::pointing_right(exon, geometry.arrow_size, geometry.fits_arrow(exon))
            } else {
                Glyph::rect(exon)
            };
            Shape { glyph, fill: strand.fill() }
        })
        .collect()
}

/// Reduces `exons` and emits one glyph per kept exon for the given track.
pub fn layout_track(
    kind: TrackKind,
    track_start: i64,
    track_end: i64,
    exons: &[Interval],
    strand: Strand,
) -> TrackLayout {
    let geometry = TrackGeometry::new(track_start, track_end, kind);
    let kept = reduce_exons(exons, kind.policy());
    let shapes = match kind {
        TrackKind::Gene => gene_shapes(&kept, strand, &geometry),
        TrackKind::Isoform => isoform_shapes(&kept, strand, &geometry),
    };
    TrackLayout {
        geometry,
        reference: ReferenceLine {
            x0: track_start as f64,
            x1: track_end as f64,
            y: 0.5,
        },
        exons: kept,
        shapes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(v: &[(i64, i64)]) -> Vec<Interval> {
        v.iter().map(|&(s, e)| Interval::new(s, e)).collect()
    }

    #[test]
    fn interval_normalizes_reversed_bounds() {
        let i = Interval::new(20, 10);
        assert_eq!((i.start, i.end), (10, 20));
        assert_eq!(i.len(), 10);
    }

    #[test]
    fn gene_policy_golden_value() {
        let kept = reduce_exons(&iv(&[(10, 20), (15, 25), (30, 40)]), OverlapPolicy::GeneTrack);
        assert_eq!(kept, iv(&[(10, 20), (30, 40)]));
    }

    #[test]
    fn isoform_policy_golden_value() {
        let kept = reduce_exons(&iv(&[(10, 20), (15, 25), (30, 40)]), OverlapPolicy::IsoformTrack);
        assert_eq!(kept, iv(&[(10, 20), (30, 40)]));
    }

    #[test]
    fn policies_diverge_on_contained_exon() {
        let input = iv(&[(10, 20), (12, 15)]);
        assert_eq!(reduce_exons(&input, OverlapPolicy::GeneTrack), iv(&[(10, 20)]));
        assert_eq!(reduce_exons(&input, OverlapPolicy::IsoformTrack), input);
    }

    #[test]
    fn touching_exons_are_both_kept() {
        // end of a kept exon is exclusive
        let input = iv(&[(10, 20), (20, 30)]);
        assert_eq!(reduce_exons(&input, OverlapPolicy::GeneTrack), input);
    }

    #[test]
    fn reducer_never_grows_and_is_monotone() {
        let mut input = iv(&[(0, 10), (5, 8), (9, 30)]);
        let mut previous = reduce_exons(&input, OverlapPolicy::GeneTrack).len();
        assert!(previous <= input.len());
        for k in 0..5 {
            let s = 100 + k * 20;
            input.push(Interval::new(s, s + 10));
            let now = reduce_exons(&input, OverlapPolicy::GeneTrack).len();
            assert!(now <= input.len());
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn empty_track_has_only_reference_line() {
        let layout = layout_track(TrackKind::Gene, 100, 200, &[], Strand::Forward);
        assert!(layout.shapes.is_empty());
        assert!(layout.exons.is_empty());
        assert_eq!(layout.reference, ReferenceLine { x0: 100.0, x1: 200.0, y: 0.5 });
    }

    #[test]
    fn arrow_size_constants_differ_per_track() {
        let gene = TrackGeometry::new(0, 1000, TrackKind::Gene);
        let isoform = TrackGeometry::new(0, 1000, TrackKind::Isoform);
        assert!((gene.arrow_size - 24.0).abs() < 1e-9);
        assert!((isoform.arrow_size - 48.0).abs() < 1e-9);
    }

    #[test]
    fn single_forward_exon_at_boundary_gets_arrow() {
        // arrow_size = 0.02 * 1200 = 24
        let layout = layout_track(TrackKind::Gene, 0, 1000, &iv(&[(100, 124)]), Strand::Forward);
        assert_eq!(layout.shapes.len(), 1);
        match &layout.shapes[0].glyph {
            Glyph::Arrow { points } => {
                assert_eq!(points, &vec![(100.0, 0.0), (100.0, 1.0), (100.0, 1.0), (124.0, 0.5), (100.0, 0.0)]);
            }
            other => panic!("expected arrow, got {:?}", other),
        }
        assert_eq!(layout.shapes[0].fill, FORWARD_FILL);
    }

    #[test]
    fn single_forward_exon_below_boundary_gets_wedge() {
        let layout = layout_track(TrackKind::Gene, 0, 1000, &iv(&[(100, 123)]), Strand::Forward);
        assert_eq!(
            layout.shapes[0].glyph,
            Glyph::Wedge { points: vec![(100.0, 0.0), (100.0, 1.0), (123.0, 0.5)] }
        );
        assert_eq!(layout.shapes[0].fill, FORWARD_FILL);
    }

    #[test]
    fn isoform_last_exon_arrow_boundary() {
        // arrow_size = 0.04 * 1200 = 48
        let layout = layout_track(TrackKind::Isoform, 0, 1000, &iv(&[(0, 50), (100, 148)]), Strand::Forward);
        assert!(matches!(layout.shapes[0].glyph, Glyph::Rect { .. }));
        assert_eq!(
            layout.shapes[1].glyph,
            Glyph::Arrow { points: vec![(100.0, 0.0), (100.0, 1.0), (100.0, 1.0), (148.0, 0.5), (100.0, 0.0)] }
        );
        assert!(layout.shapes.iter().all(|s| s.fill == FORWARD_FILL));
    }

    #[test]
    fn isoform_last_exon_below_boundary_gets_wedge() {
        let layout = layout_track(TrackKind::Isoform, 0, 1000, &iv(&[(0, 50), (100, 147)]), Strand::Forward);
        assert_eq!(
            layout.shapes[1].glyph,
            Glyph::Wedge { points: vec![(100.0, 0.0), (100.0, 1.0), (147.0, 0.5)] }
        );
        assert_eq!(layout.shapes[1].fill, FORWARD_FILL);

        // same exon is wide enough for the gene track's smaller arrowhead
        let gene = layout_track(TrackKind::Gene, 0, 1000, &iv(&[(100, 147)]), Strand::Forward);
        assert!(matches!(gene.shapes[0].glyph, Glyph::Arrow { .. }));
    }

    #[test]
    fn reverse_strand_points_left_on_first_exon() {
        let layout = layout_track(TrackKind::Gene, 0, 1000, &iv(&[(0, 100), (200, 300)]), Strand::Reverse);
        assert_eq!(
            layout.shapes[0].glyph,
            Glyph::Arrow { points: vec![(0.0, 0.5), (24.0, 1.0), (100.0, 1.0), (100.0, 0.0), (24.0, 0.0)] }
        );
        assert_eq!(layout.shapes[1].glyph, Glyph::Rect { x0: 200.0, y0: 0.0, x1: 300.0, y1: 1.0 });
        assert!(layout.shapes.iter().all(|s| s.fill == REVERSE_FILL));
    }

    #[test]
    fn reverse_strand_short_first_exon_gets_wedge() {
        let layout = layout_track(TrackKind::Gene, 0, 1000, &iv(&[(0, 10)]), Strand::Reverse);
        assert_eq!(
            layout.shapes[0].glyph,
            Glyph::Wedge { points: vec![(0.0, 0.5), (10.0, 1.0), (10.0, 0.0)] }
        );
    }

    #[test]
    fn forward_strand_only_last_exon_is_pointed() {
        let layout = layout_track(TrackKind::Gene, 0, 1000, &iv(&[(0, 100), (200, 300), (400, 500)]), Strand::Forward);
        assert!(matches!(layout.shapes[0].glyph, Glyph::Rect { .. }));
        assert!(matches!(layout.shapes[1].glyph, Glyph::Rect { .. }));
        assert!(matches!(layout.shapes[2].glyph, Glyph::Arrow { .. }));
    }

    #[test]
    fn unknown_strand_is_always_neutral_rect() {
        for exons in [iv(&[(0, 100)]), iv(&[(0, 100), (200, 300)])] {
            let layout = layout_track(TrackKind::Gene, 0, 1000, &exons, Strand::Unknown);
            assert_eq!(layout.shapes.len(), exons.len());
            for shape in &layout.shapes {
                assert!(matches!(shape.glyph, Glyph::Rect { .. }));
                assert_eq!(shape.fill, UNKNOWN_FILL);
            }
        }
    }

    #[test]
    fn isoform_track_points_right_for_reverse_strand() {
        let layout = layout_track(TrackKind::Isoform, 0, 1000, &iv(&[(0, 100), (100, 400)]), Strand::Reverse);
        assert!(matches!(layout.shapes[0].glyph, Glyph::Rect { .. }));
        match &layout.shapes[1].glyph {
            Glyph::Arrow { points } => assert_eq!(points[3], (400.0, 0.5)),
            other => panic!("expected arrow, got {:?}", other),
        }
        assert_eq!(layout.shapes[1].fill, REVERSE_FILL);
    }

    #[test]
    fn layout_is_deterministic() {
        let exons = iv(&[(10, 20), (15, 25), (30, 40)]);
        let a = layout_track(TrackKind::Gene, 0, 50, &exons, Strand::Forward);
        let b = layout_track(TrackKind::Gene, 0, 50, &exons, Strand::Forward);
        assert_eq!(a, b);
    }

    #[test]
    fn path_data_closes_polygon() {
        let glyph = Glyph::Wedge { points: vec![(1.0, 0.0), (1.0, 1.0), (3.5, 0.5)] };
        assert_eq!(glyph.path_data(), "M1,0 L1,1 L3.5,0.5 Z");
    }
}
