//! Static SVG rendering of a [`Figure`].

use crate::axis::AxisRange;
use crate::layout::{Glyph, EXON_STROKE, EXON_STROKE_WIDTH, REFERENCE_LINE_WIDTH};
use crate::plot::{thousands, Figure, MARKER_SIZE};
use svg::node::element::path::Data;
use svg::node::element::{Circle, ClipPath, Definitions, Group, Line, Path, Rectangle, Text};
use svg::Document;

const AXIS_COLOR: &str = "#36454F";
const GRID_COLOR: &str = "lightgrey";
const FONT: &str = "Roboto, Helvetica, Arial, sans-serif";
const TICK_LEN: f64 = 5.0;
/// Room for tick labels and axis titles inside the margins.
const LEFT_GUTTER: f64 = 80.0;
const BOTTOM_GUTTER: f64 = 55.0;
const TOP_GUTTER: f64 = 10.0;
const RIGHT_GUTTER: f64 = 10.0;

/// Pixel box of one subplot row.
#[derive(Debug, Clone, Copy)]
struct Panel {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Panel {
    fn width(&self) -> f64 {
        self.right - self.left
    }

    fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

fn safe_span(range: &AxisRange) -> f64 {
    let span = range.span();
    if span.abs() < f64::EPSILON {
        1.0
    } else {
        span
    }
}

fn map_x(v: f64, range: &AxisRange, panel: &Panel) -> f64 {
    panel.left + (v - range.min) / safe_span(range) * panel.width()
}

fn map_y(v: f64, range: &AxisRange, panel: &Panel) -> f64 {
    let min = if range.span().abs() < f64::EPSILON { range.min - 0.5 } else { range.min };
    panel.bottom - (v - min) / safe_span(range) * panel.height()
}

/// Round tick values covering `range`, aiming at about `target` ticks.
pub fn nice_ticks(range: &AxisRange, target: usize) -> Vec<f64> {
    let span = range.span();
    if !(span.is_finite()) || span <= 0.0 || target == 0 {
        return vec![range.min];
    }
    let raw = span / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| span / s <= target as f64)
        .unwrap_or(10.0 * magnitude);
    let mut ticks = Vec::new();
    let mut v = (range.min / step).ceil() * step;
    while v <= range.max + step * 1e-9 {
        // snap away float noise such as 0.30000000000000004
        ticks.push((v / step).round() * step);
        v += step;
    }
    ticks
}

fn text(content: String, x: f64, y: f64, size: f64) -> Text {
    Text::new(content)
        .set("x", x)
        .set("y", y)
        .set("font-family", FONT)
        .set("font-size", size)
        .set("fill", AXIS_COLOR)
}

fn panels(fig: &Figure) -> (Panel, Panel) {
    let left = fig.margin.left + LEFT_GUTTER;
    let right = fig.width as f64 - fig.margin.right - RIGHT_GUTTER;
    let top = fig.margin.top + TOP_GUTTER;
    let bottom = fig.height as f64 - fig.margin.bottom - BOTTOM_GUTTER;
    let total = (bottom - top).max(1.0);
    let spacing = total * fig.vertical_spacing;
    let weights = fig.row_heights[0] + fig.row_heights[1];
    let model_h = (total - spacing) * fig.row_heights[0] / weights;
    let model = Panel { left, right, top, bottom: top + model_h };
    let data = Panel { left, right, top: top + model_h + spacing, bottom };
    (model, data)
}

fn clip(id: &str, panel: &Panel) -> ClipPath {
    ClipPath::new().set("id", id).add(
        Rectangle::new()
            .set("x", panel.left)
            .set("y", panel.top)
            .set("width", panel.width())
            .set("height", panel.height()),
    )
}

fn model_row(fig: &Figure, panel: &Panel) -> Group {
    let xr = &fig.x_range;
    let yr = &fig.model_y_range;
    let line = &fig.track.reference;
    let mut group = Group::new().set("clip-path", "url(#model-clip)").add(
        Line::new()
            .set("x1", map_x(line.x0, xr, panel))
            .set("y1", map_y(line.y, yr, panel))
            .set("x2", map_x(line.x1, xr, panel))
            .set("y2", map_y(line.y, yr, panel))
            .set("stroke", EXON_STROKE)
            .set("stroke-width", REFERENCE_LINE_WIDTH),
    );

    for shape in &fig.track.shapes {
        let points = match &shape.glyph {
            Glyph::Rect { x0, y0, x1, y1 } => vec![(*x0, *y0), (*x0, *y1), (*x1, *y1), (*x1, *y0)],
            Glyph::Arrow { points } | Glyph::Wedge { points } => points.clone(),
        };
        let mut data = Data::new();
        for (i, (x, y)) in points.iter().enumerate() {
            let p = (map_x(*x, xr, panel) as f32, map_y(*y, yr, panel) as f32);
            data = if i == 0 { data.move_to(p) } else { data.line_to(p) };
        }
        group = group.add(
            Path::new()
                .set("d", data.close())
                .set("fill", shape.fill)
                .set("stroke", EXON_STROKE)
                .set("stroke-width", EXON_STROKE_WIDTH),
        );
    }
    group
}

fn data_row(fig: &Figure, panel: &Panel) -> Group {
    let xr = &fig.x_range;
    let yr = &fig.data_y_range;
    let mut group = Group::new().set("clip-path", "url(#data-clip)");

    for vline in &fig.vlines {
        let x = map_x(vline.x, xr, panel);
        group = group.add(
            Line::new()
                .set("x1", x)
                .set("y1", panel.top)
                .set("x2", x)
                .set("y2", panel.bottom)
                .set("stroke", vline.color)
                .set("stroke-width", vline.width)
                .set("stroke-dasharray", "2,3"),
        );
    }

    for seg in &fig.segments {
        let y = map_y(seg.y, yr, panel);
        let mut line = Line::new()
            .set("x1", map_x(seg.x0, xr, panel))
            .set("y1", y)
            .set("x2", map_x(seg.x1, xr, panel))
            .set("y2", y)
            .set("stroke", seg.color)
            .set("stroke-width", 2);
        if seg.dotted {
            line = line.set("stroke-dasharray", "2,3");
        }
        group = group.add(line);
    }

    for marker in &fig.markers {
        group = group.add(
            Circle::new()
                .set("cx", map_x(marker.x, xr, panel))
                .set("cy", map_y(marker.y, yr, panel))
                .set("r", MARKER_SIZE / 2.0)
                .set("fill", marker.color.as_str()),
        );
    }
    group
}

/// Frame, grid, ticks and titles of the data row.
fn axes(fig: &Figure, panel: &Panel) -> Group {
    let xr = &fig.x_range;
    let yr = &fig.data_y_range;
    let mut group = Group::new();

    let x_ticks = nice_ticks(xr, 6);
    let y_ticks = nice_ticks(yr, 5);

    if fig.show_grid {
        for &t in &x_ticks {
            let x = map_x(t, xr, panel);
            group = group.add(
                Line::new()
                    .set("x1", x)
                    .set("y1", panel.top)
                    .set("x2", x)
                    .set("y2", panel.bottom)
                    .set("stroke", GRID_COLOR)
                    .set("stroke-width", 0.5),
            );
        }
        for &t in &y_ticks {
            let y = map_y(t, yr, panel);
            group = group.add(
                Line::new()
                    .set("x1", panel.left)
                    .set("y1", y)
                    .set("x2", panel.right)
                    .set("y2", y)
                    .set("stroke", GRID_COLOR)
                    .set("stroke-width", 0.5),
            );
        }
    }

    group = group.add(
        Rectangle::new()
            .set("x", panel.left)
            .set("y", panel.top)
            .set("width", panel.width())
            .set("height", panel.height())
            .set("fill", "none")
            .set("stroke", AXIS_COLOR)
            .set("stroke-width", 1.2),
    );

    for &t in &x_ticks {
        let x = map_x(t, xr, panel);
        group = group
            .add(
                Line::new()
                    .set("x1", x)
                    .set("y1", panel.bottom)
                    .set("x2", x)
                    .set("y2", panel.bottom + TICK_LEN)
                    .set("stroke", "black"),
            )
            .add(
                text(format!("{}{}", thousands(t), fig.x_tick_suffix), x, panel.bottom + 20.0, 12.0)
                    .set("text-anchor", "middle"),
            );
    }
    for &t in &y_ticks {
        let y = map_y(t, yr, panel);
        group = group
            .add(
                Line::new()
                    .set("x1", panel.left - TICK_LEN)
                    .set("y1", y)
                    .set("x2", panel.left)
                    .set("y2", y)
                    .set("stroke", "black"),
            )
            .add(
                text(thousands(t), panel.left - TICK_LEN - 3.0, y + 4.0, 12.0)
                    .set("text-anchor", "end"),
            );
    }

    let x_mid = panel.left + panel.width() / 2.0;
    let y_mid = panel.top + panel.height() / 2.0;
    let y_title_x = panel.left - LEFT_GUTTER + 18.0;
    group
        .add(
            text(fig.x_title.to_string(), x_mid, panel.bottom + 45.0, 16.0)
                .set("text-anchor", "middle")
                .set("font-weight", "bold"),
        )
        .add(
            text(fig.y_title.to_string(), y_title_x, y_mid, 16.0)
                .set("text-anchor", "middle")
                .set("font-weight", "bold")
                .set("transform", format!("rotate(-90 {} {})", y_title_x, y_mid)),
        )
}

pub fn svg_document(fig: &Figure) -> Document {
    let (model, data) = panels(fig);
    let mut doc = Document::new()
        .set("xmlns", "http://www.w3.org/2000/svg")
        .set("width", fig.width)
        .set("height", fig.height)
        .set("viewBox", (0, 0, fig.width, fig.height))
        .add(Definitions::new().add(clip("model-clip", &model)).add(clip("data-clip", &data)))
        .add(
            Rectangle::new()
                .set("width", fig.width)
                .set("height", fig.height)
                .set("fill", "white"),
        );

    if let Some(title) = &fig.title {
        doc = doc.add(
            text(title.clone(), fig.width as f64 / 2.0, fig.margin.top / 2.0 + 10.0, 30.0)
                .set("text-anchor", "middle")
                .set("font-weight", "bold")
                .set("fill", "black"),
        );
    }

    doc.add(axes(fig, &data))
        .add(model_row(fig, &model))
        .add(data_row(fig, &data))
}

pub fn render_svg(fig: &Figure) -> String {
    svg_document(fig).to_string()
}
