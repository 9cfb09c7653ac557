//! Plotly figure JSON for the interactive dashboard pages.

use crate::layout::{Glyph, EXON_STROKE, EXON_STROKE_WIDTH, REFERENCE_LINE_WIDTH};
use crate::plot::{Figure, MARKER_SIZE};
use serde_json::{json, Value};

const AXIS_COLOR: &str = "#36454F";

fn axis_style(show_grid: bool) -> Value {
    json!({
        "zeroline": false,
        "showline": true,
        "linewidth": 1.2,
        "linecolor": AXIS_COLOR,
        "mirror": true,
        "showgrid": show_grid,
        "gridwidth": 0.5,
        "gridcolor": "lightgrey",
        "tickformat": ",",
        "ticks": "outside",
        "tickcolor": "black",
        "ticklen": 5,
        "tickfont": { "size": 12, "color": AXIS_COLOR, "family": "Roboto" },
        "title": { "font": { "size": 16, "color": AXIS_COLOR, "family": "Roboto" } },
    })
}

fn model_shapes(fig: &Figure) -> Vec<Value> {
    let line = &fig.track.reference;
    let mut shapes = vec![json!({
        "type": "line",
        "xref": "x", "yref": "y",
        "x0": line.x0, "y0": line.y, "x1": line.x1, "y1": line.y,
        "line": { "color": EXON_STROKE, "width": REFERENCE_LINE_WIDTH },
    })];
    for shape in &fig.track.shapes {
        let border = json!({ "color": EXON_STROKE, "width": EXON_STROKE_WIDTH });
        shapes.push(match &shape.glyph {
            Glyph::Rect { x0, y0, x1, y1 } => json!({
                "type": "rect",
                "xref": "x", "yref": "y",
                "x0": x0, "y0": y0, "x1": x1, "y1": y1,
                "fillcolor": shape.fill,
                "line": border,
            }),
            glyph => json!({
                "type": "path",
                "xref": "x", "yref": "y",
                "path": glyph.path_data(),
                "fillcolor": shape.fill,
                "line": border,
            }),
        });
    }
    shapes
}

fn atg_shapes(fig: &Figure) -> Vec<Value> {
    fig.vlines
        .iter()
        .map(|v| {
            json!({
                "type": "line",
                "xref": "x2", "yref": "y2 domain",
                "x0": v.x, "x1": v.x, "y0": 0, "y1": 1,
                "layer": "below",
                "line": { "color": v.color, "width": v.width, "dash": "dot" },
            })
        })
        .collect()
}

fn traces(fig: &Figure) -> Vec<Value> {
    let mut data = Vec::new();
    if !fig.markers.is_empty() {
        data.push(json!({
            "type": "scatter",
            "mode": "markers",
            "xaxis": "x2", "yaxis": "y2",
            "x": fig.markers.iter().map(|m| m.x).collect::<Vec<_>>(),
            "y": fig.markers.iter().map(|m| m.y).collect::<Vec<_>>(),
            "marker": {
                "color": fig.markers.iter().map(|m| m.color.as_str()).collect::<Vec<_>>(),
                "size": MARKER_SIZE,
            },
            "text": fig.markers.iter().map(|m| m.hover.join("<br>")).collect::<Vec<_>>(),
            "hovertemplate": "%{text}<extra></extra>",
        }));
    }
    for seg in &fig.segments {
        let mut line = json!({ "color": seg.color });
        if seg.dotted {
            line["dash"] = json!("dot");
        }
        data.push(json!({
            "type": "scatter",
            "mode": "lines",
            "xaxis": "x2", "yaxis": "y2",
            "x": [seg.x0, seg.x1],
            "y": [seg.y, seg.y],
            "line": line,
            "hovertext": seg.label,
            "hoverinfo": "text",
        }));
    }
    data
}

/// `{ "data": [...], "layout": {...} }` ready for `Plotly.newPlot`.
pub fn plotly_figure(fig: &Figure) -> Value {
    let weights = fig.row_heights[0] + fig.row_heights[1];
    let usable = 1.0 - fig.vertical_spacing;
    let data_top = usable * fig.row_heights[1] / weights;
    let model_bottom = data_top + fig.vertical_spacing;

    let mut x2 = axis_style(fig.show_grid);
    x2["anchor"] = json!("y2");
    x2["domain"] = json!([0.0, 1.0]);
    x2["range"] = json!([fig.x_range.min, fig.x_range.max]);
    x2["ticksuffix"] = json!(fig.x_tick_suffix);
    x2["title"]["text"] = json!(format!("<b>{}</b>", fig.x_title));

    let mut y2 = axis_style(fig.show_grid);
    y2["anchor"] = json!("x2");
    y2["domain"] = json!([0.0, data_top]);
    y2["range"] = json!([fig.data_y_range.min, fig.data_y_range.max]);
    y2["title"]["text"] = json!(format!("<b>{}</b>", fig.y_title));

    let mut shapes = model_shapes(fig);
    shapes.extend(atg_shapes(fig));

    let mut layout = json!({
        "width": fig.width,
        "height": fig.height,
        "margin": { "l": fig.margin.left, "r": fig.margin.right, "t": fig.margin.top, "b": fig.margin.bottom },
        "plot_bgcolor": "white",
        "showlegend": false,
        "xaxis": {
            "anchor": "y", "matches": "x2", "visible": false, "showgrid": false,
            "range": [fig.x_range.min, fig.x_range.max],
        },
        "yaxis": {
            "anchor": "x", "domain": [model_bottom, 1.0], "visible": false, "fixedrange": true,
            "range": [fig.model_y_range.min, fig.model_y_range.max],
        },
        "xaxis2": x2,
        "yaxis2": y2,
        "shapes": shapes,
    });
    if let Some(title) = &fig.title {
        layout["title"] = json!({
            "text": format!("<b>{}</b>", title),
            "font": { "size": 30, "family": "Roboto", "color": "black" },
        });
    }

    json!({ "data": traces(fig), "layout": layout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::tests::fixture_dir;
    use crate::reference::ReferenceData;

    #[test]
    fn figure_json_carries_shapes_and_ranges() {
        let dir = fixture_dir();
        let reference = ReferenceData::load(dir.path()).unwrap();
        let fig = crate::plot::gene_plot(&reference, "C09D4.5", true).unwrap();
        let value = plotly_figure(&fig);

        let shapes = value["layout"]["shapes"].as_array().unwrap();
        // reference line + 3 exons + 2 ATG lines
        assert_eq!(shapes.len(), 6);
        assert_eq!(shapes[0]["type"], "line");
        assert_eq!(shapes[3]["type"], "path");
        assert!(shapes[3]["path"].as_str().unwrap().starts_with("M1800,0 L1800,1"));
        assert_eq!(shapes[5]["line"]["dash"], "dot");

        assert_eq!(value["layout"]["xaxis2"]["range"][0], 900.0);
        assert_eq!(value["layout"]["yaxis"]["range"][0], -1.0);
        assert_eq!(value["data"].as_array().unwrap().len(), 1);
        assert_eq!(value["data"][0]["marker"]["color"][0], "rgb(255,0,0)");
    }
}
