use crate::error::{format_invalid_list, TspliceError};
use crate::export::{export_pdf, validate_input, EXPORT_FILE_NAME};
use crate::features::FeatureData;
use crate::plot::{feature_plot, gene_plot, Figure};
use crate::plotly::plotly_figure;
use crate::reference::ReferenceData;
use crate::render::render_svg;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GENE: &str = "lev-11";

/// Everything the handlers read; loaded once before the server starts.
pub struct AppState {
    pub reference: ReferenceData,
    pub features: Option<FeatureData>,
}

#[derive(Debug, Deserialize)]
pub struct PlotQuery {
    gene: Option<String>,
    atg: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureQuery {
    gene: Option<String>,
    isoform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    genes: String,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Serialize)]
struct SvgLinkQuery<'a> {
    gene: &'a str,
    atg: bool,
}

/// `/plot.svg` URL with a percent-encoded query string.
fn svg_link(gene: &str, atg: bool) -> String {
    let query = serde_urlencoded::to_string(SvgLinkQuery { gene, atg }).unwrap_or_default();
    format!("/plot.svg?{}", query)
}

fn page(title: &str, body: &str) -> HttpResponse {
    let html = format!(
r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>C.elegans trans-splicing - {title}</title>
    <script src="https://cdn.plot.ly/plotly-latest.min.js"></script>
    <style>
        body {{
            font-family: 'Roboto', 'Arial', sans-serif;
            margin: 0;
            display: flex;
        }}
        nav {{
            width: 220px;
            min-height: 100vh;
            padding: 20px;
            background: #f5f6fa;
        }}
        nav h2 {{
            font-size: 24px;
            color: #223170;
        }}
        nav a {{
            display: block;
            padding: 8px 10px;
            color: #223170;
            text-decoration: none;
            border-radius: 4px;
        }}
        nav a:hover {{
            background: #edf0fa;
        }}
        main {{
            max-width: 1000px;
            padding: 1rem 1.5rem 2rem 1.5rem;
        }}
        .error {{
            background: #ffe2e0;
            font-size: 16px;
            padding: 10px;
            border-radius: 10px;
            border: 1px solid DarkRed;
            margin: 10px;
        }}
        .gene-box {{
            background: ghostwhite;
            font-size: 18px;
            padding: 10px;
            border-radius: 5px;
            border: 1px solid lightgray;
            margin: 10px 0;
            display: inline-block;
        }}
        select, input, textarea {{
            padding: 8px;
            border: 1px solid #ddd;
            border-radius: 4px;
            margin-right: 10px;
        }}
        button {{
            padding: 8px 16px;
            background: #223170;
            color: white;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }}
    </style>
</head>
<body>
    <nav>
        <h2>Navigation:</h2>
        <a href="/">Informations</a>
        <a href="/plot">Interactive plot</a>
        <a href="/features">Read features</a>
        <a href="/download">Download plot(s)</a>
    </nav>
    <main>
{body}
    </main>
</body>
</html>"#,
        title = escape_html(title),
        body = body
    );
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(html)
}

fn plot_div(fig: &Figure, id: &str) -> String {
    format!(
        r#"<div id="{id}"></div>
<script>
    var fig = {json};
    Plotly.newPlot('{id}', fig.data, fig.layout, {{displayModeBar: false, responsive: true}});
</script>"#,
        id = id,
        json = plotly_figure(fig)
    )
}

fn gene_error_panel() -> String {
    "<div class=\"error\"><div style=\"color: darkred;\"><strong>Requested gene plot cannot be generated.\
     </strong></div><br />This error can appear because:<br />- The name entered is invalid<br />- The \
     requested gene was not detected in our sequencing experiments.<br /><br />Please verify the \
     informations entered and contact the authors if necessary.</div>"
        .to_string()
}

fn invalid_names_panel(names: &[String]) -> String {
    format!(
        "<div class=\"error\"><div style=\"color: darkred;\"><strong>Invalid gene name identified:</strong></div>\
         {}<br /><div style=\"color: black;\"><strong><br />Please verify your input and re-start.</strong></div></div>",
        escape_html(&format_invalid_list(names))
    )
}

fn message_panel(message: &str) -> String {
    format!("<div class=\"error\">{}</div>", escape_html(message))
}

fn server_error(err: &TspliceError) -> HttpResponse {
    error!("Request failed: {}", err);
    HttpResponse::InternalServerError()
        .content_type("text/plain; charset=utf-8")
        .body(err.to_string())
}

fn gene_selector(state: &AppState, action: &str, current: &str, extra: &str) -> String {
    let options: String = state
        .reference
        .names()
        .ordered()
        .iter()
        .map(|(_, name)| format!("<option value=\"{}\">", escape_html(name)))
        .collect();
    format!(
        r#"<form method="get" action="{action}">
    <label><b>Type name: (ex: Y105E8B.1 or lev-11)</b></label><br />
    <input name="gene" list="gene-names" value="{current}" />
    <datalist id="gene-names">{options}</datalist>
    {extra}
    <button type="submit">Show</button>
</form>"#,
        action = action,
        current = escape_html(current),
        options = options,
        extra = extra
    )
}

async fn index() -> impl Responder {
    let body = r#"<p style="font-size:140%;"><b>Quantitative analysis of <i>C. elegans</i> transcripts by Nanopore
direct-cDNA sequencing reveals terminal hairpins in non trans-spliced mRNAs.</b></p>
<p style="font-size:110%;">Florian Bernard, Delphine Dargere, Oded Rechavi, Denis Dupuy.</p>
<p style="font-size:120%;"><b>Abstract:</b></p>
<p>Nematode mRNA processing involves a trans-splicing step through which a 21bp sequence from a snRNP
replaces the original 5' end of the primary transcript. It has long been held that 70% of <i>C. elegans</i>
mRNAs are submitted to trans-splicing. Our recent work suggested that the mechanism is more pervasive but
not fully captured by mainstream transcriptome sequencing methods.<br />
In this study, we used Oxford Nanopore's long-read amplification-free sequencing technology to perform a
comprehensive analysis of trans-splicing in worms. We demonstrated that spliced leader (SL) sequences
presence at the 5' end of the messengers affected library preparation and generated sequencing artefacts
due to their self-complementarity. Consistent with our previous observations, we found evidence of
trans-splicing for most genes. However, a subset of genes appears to be only marginally trans-spliced.
These messengers all share the capacity to generate a 5' terminal hairpin structure mimicking the SL
structure providing a mechanistic explanation for their non conformity. Altogether, our data provides the
most comprehensive quantitative analysis of SL usage to date in <i>C. elegans</i>.</p>
<hr />
<p>This work is a collaboration between
<b><a href="http://www.iecb.u-bordeaux.fr/teams/DUPUY/DupuylabSite/Welcome.html">Dupuy's Lab</a></b> and
<b><a href="https://www.odedrechavilab.com/">Rechavi's Lab</a></b>.</p>
<p>App created by <b>Florian Bernard, Ph.D</b>.</p>"#;
    page("Informations", body)
}

const GENE_LEGEND: &str = "<p><b>Figure legend:</b> Each alignment start position observed was plotted at the \
corresponding genomic position with the number of supporting reads. The dots are colored according to the \
observed trans-splicing events with red indicating a majority of SL reads, green a majority of endogenous \
hairpin reads and blue reads with no evidence for either.</p>";

async fn plot_page(state: web::Data<AppState>, query: web::Query<PlotQuery>) -> impl Responder {
    let input = query.gene.clone().unwrap_or_else(|| DEFAULT_GENE.to_string());
    let show_atg = query.atg.unwrap_or(true);
    let (shown, hidden) = if show_atg { (" selected", "") } else { ("", " selected") };
    let atg_box = format!(
        "<label><b>Known ATG positions (WS270):</b> <select name=\"atg\">\
         <option value=\"true\"{}>Show</option><option value=\"false\"{}>Hide</option></select></label>",
        shown, hidden
    );
    let mut body = gene_selector(&state, "/plot", &input, &atg_box);

    let gene = match state.reference.resolve(&input) {
        Ok(gene) if state.reference.has_data(&gene) => gene,
        Ok(gene) => {
            warn!("No reads recorded for {}", gene);
            body.push_str(&gene_error_panel());
            return page("Interactive plot", &body);
        }
        Err(err) => {
            warn!("{}", err);
            body.push_str(&gene_error_panel());
            return page("Interactive plot", &body);
        }
    };

    match gene_plot(&state.reference, &gene, show_atg) {
        Ok(fig) => {
            let name = state.reference.names().display_name(&gene).unwrap_or(&gene);
            body.push_str(&format!(
                "<div class=\"gene-box\"><b>Gene:</b> {} ({})</div>",
                escape_html(name),
                escape_html(&gene)
            ));
            body.push_str(&plot_div(&fig, "gene-plot"));
            body.push_str(&format!(
                "<p><a href=\"{}\">Save plot (SVG)</a></p>",
                escape_html(&svg_link(&gene, show_atg))
            ));
            body.push_str(GENE_LEGEND);
            page("Interactive plot", &body)
        }
        Err(err) => server_error(&err),
    }
}

async fn plot_svg(state: web::Data<AppState>, query: web::Query<PlotQuery>) -> impl Responder {
    let input = query.gene.clone().unwrap_or_else(|| DEFAULT_GENE.to_string());
    let result = state.reference.resolve(&input).and_then(|gene| {
        let title = state.reference.names().title(&gene);
        gene_plot(&state.reference, &gene, query.atg.unwrap_or(true)).map(|fig| fig.for_export(title))
    });
    match result {
        Ok(fig) => HttpResponse::Ok().content_type("image/svg+xml").body(render_svg(&fig)),
        Err(err) if err.is_validation() => HttpResponse::NotFound().body(err.to_string()),
        Err(err) => server_error(&err),
    }
}

async fn features_page(state: web::Data<AppState>, query: web::Query<FeatureQuery>) -> impl Responder {
    let features = match &state.features {
        Some(features) => features,
        None => return page("Read features", &message_panel(&TspliceError::FeaturesUnavailable.to_string())),
    };
    let input = query.gene.clone().unwrap_or_else(|| DEFAULT_GENE.to_string());
    let gene = state.reference.resolve(&input).ok();
    let isoforms = gene.as_deref().map(|g| features.isoforms(g)).unwrap_or(&[]);

    let selected = query.isoform.clone().filter(|i| isoforms.contains(i));
    let options: String = isoforms
        .iter()
        .map(|i| {
            let sel = if Some(i) == selected.as_ref() { " selected" } else { "" };
            format!("<option{}>{}</option>", sel, escape_html(i))
        })
        .collect();
    let select = if isoforms.is_empty() {
        String::new()
    } else {
        format!("<label><b>Select isoform:</b> <select name=\"isoform\">{}</select></label>", options)
    };
    let mut body = gene_selector(&state, "/features", &input, &select);

    if gene.is_none() || isoforms.is_empty() {
        body.push_str(&gene_error_panel());
        return page("Read features", &body);
    }

    if let Some(isoform) = selected {
        info!("Parsing reads for {}", isoform);
        match feature_plot(features, &isoform) {
            Ok(fig) => {
                body.push_str(&plot_div(&fig, "feature-plot"));
                body.push_str(
                    "<p><b>Figure legend:</b> Expanded representation of read features identified for each \
                     annotated gene isoform.</p>",
                );
            }
            Err(err) if err.is_validation() => body.push_str(&message_panel(&err.to_string())),
            Err(err) => return server_error(&err),
        }
    }
    page("Read features", &body)
}

async fn download_form() -> impl Responder {
    page(
        "Download plot(s)",
        r#"<form method="post" action="/download">
    <p><b>Type one gene name per line:</b></p>
    <textarea name="genes" rows="10" cols="40" maxlength="500"></textarea><br /><br />
    <button type="submit">Validate</button>
</form>
<p><i>(Only plots showing trans-splicing per positions will be generated, expanded features annotations are
currently not available for download.)</i></p>"#,
    )
}

async fn download(state: web::Data<AppState>, form: web::Form<DownloadForm>) -> impl Responder {
    let genes = match validate_input(&state.reference, &form.genes) {
        Ok(genes) => genes,
        Err(TspliceError::InvalidGenes(names)) => {
            warn!("Rejected export request with {} invalid name(s)", names.len());
            return page("Download plot(s)", &invalid_names_panel(&names));
        }
        Err(err) if err.is_validation() => return page("Download plot(s)", &message_panel(&err.to_string())),
        Err(err) => return server_error(&err),
    };

    let worker_state = state.clone();
    let result = web::block(move || {
        export_pdf(&worker_state.reference, &genes, |n, total, title| {
            let percent = (n as f64 / total as f64 * 100.0).round();
            info!("processing {} - Completed: {}/{} ({}%)", title, n, total, percent);
        })
    })
    .await;

    match result {
        Ok(Ok(bytes)) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ))
            .body(bytes),
        Ok(Err(err)) => server_error(&err),
        Err(err) => {
            error!("Export worker failed: {}", err);
            HttpResponse::InternalServerError().body("export worker failed")
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/plot", web::get().to(plot_page))
        .route("/plot.svg", web::get().to(plot_svg))
        .route("/features", web::get().to(features_page))
        .route("/download", web::get().to(download_form))
        .route("/download", web::post().to(download));
}

pub async fn run_dashboard(state: AppState, bind: &str) -> std::io::Result<()> {
    let data = web::Data::new(state);
    info!("Dashboard listening on http://{}", bind);

    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(bind)?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::write_feature_tables;
    use crate::reference::tests::fixture_dir;
    use actix_web::test as atest;

    fn state(with_features: bool) -> (tempfile::TempDir, web::Data<AppState>) {
        let dir = fixture_dir();
        let features = if with_features {
            write_feature_tables(dir.path());
            Some(FeatureData::load(dir.path()).unwrap())
        } else {
            None
        };
        let reference = ReferenceData::load(dir.path()).unwrap();
        (dir, web::Data::new(AppState { reference, features }))
    }

    async fn get_body(data: web::Data<AppState>, uri: &str) -> (u16, String) {
        let app = atest::init_service(App::new().app_data(data).configure(configure)).await;
        let resp = atest::call_service(&app, atest::TestRequest::get().uri(uri).to_request()).await;
        let status = resp.status().as_u16();
        let body = atest::read_body(resp).await;
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn escape_is_applied() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn svg_link_is_percent_encoded() {
        assert_eq!(svg_link("C09D4.5", true), "/plot.svg?gene=C09D4.5&atg=true");
        assert_eq!(svg_link("a b&c", false), "/plot.svg?gene=a+b%26c&atg=false");
    }

    #[actix_web::test]
    async fn atg_form_sends_a_single_value() {
        let (_dir, data) = state(false);
        let (status, body) = get_body(data.clone(), "/plot").await;
        assert_eq!(status, 200);
        assert_eq!(body.matches("name=\"atg\"").count(), 1);
        assert!(body.contains("<option value=\"true\" selected>Show</option>"));
        assert!(body.contains("/plot.svg?gene=C09D4.5&amp;atg=true"));

        // submitting the untouched form, then switching the selector to Hide
        let (status, body) = get_body(data.clone(), "/plot?gene=lev-11&atg=true").await;
        assert_eq!(status, 200);
        assert!(body.contains("Plotly.newPlot('gene-plot'"));
        let (status, body) = get_body(data, "/plot?gene=lev-11&atg=false").await;
        assert_eq!(status, 200);
        assert!(body.contains("<option value=\"false\" selected>Hide</option>"));
    }

    #[actix_web::test]
    async fn default_gene_page_renders_plot() {
        let (_dir, data) = state(false);
        let (status, body) = get_body(data, "/plot").await;
        assert_eq!(status, 200);
        assert!(body.contains("Plotly.newPlot('gene-plot'"));
        assert!(body.contains("lev-11 (C09D4.5)"));
    }

    #[actix_web::test]
    async fn unknown_gene_shows_error_panel() {
        let (_dir, data) = state(false);
        let (status, body) = get_body(data, "/plot?gene=nope").await;
        assert_eq!(status, 200);
        assert!(body.contains("Requested gene plot cannot be generated."));
        assert!(!body.contains("Plotly.newPlot("));
    }

    #[actix_web::test]
    async fn gene_without_reads_shows_error_panel() {
        let (_dir, data) = state(false);
        let (status, body) = get_body(data, "/plot?gene=unused").await;
        assert_eq!(status, 200);
        assert!(body.contains("Requested gene plot cannot be generated."));
    }

    #[actix_web::test]
    async fn gene_without_coordinates_is_a_server_error() {
        let (_dir, data) = state(false);
        let (status, body) = get_body(data, "/plot?gene=ZK000.9").await;
        assert_eq!(status, 500);
        assert!(body.contains("missing from"));
    }

    #[actix_web::test]
    async fn svg_endpoint_returns_image() {
        let (_dir, data) = state(false);
        let (status, body) = get_body(data, "/plot.svg?gene=Y105E8B.1&atg=false").await;
        assert_eq!(status, 200);
        assert!(body.starts_with("<svg"));
    }

    #[actix_web::test]
    async fn features_page_lists_isoforms_and_plots() {
        let (_dir, data) = state(true);
        let (status, body) = get_body(data.clone(), "/features?gene=lev-11").await;
        assert_eq!(status, 200);
        assert!(body.contains("C09D4.5a"));
        assert!(!body.contains("feature-plot"));

        let (status, body) = get_body(data, "/features?gene=lev-11&isoform=C09D4.5a").await;
        assert_eq!(status, 200);
        assert!(body.contains("Plotly.newPlot('feature-plot'"));
    }

    #[actix_web::test]
    async fn features_page_without_tables() {
        let (_dir, data) = state(false);
        let (_, body) = get_body(data, "/features").await;
        assert!(body.contains("not available"));
    }

    #[actix_web::test]
    async fn download_rejects_invalid_names() {
        let (_dir, data) = state(false);
        let app = atest::init_service(App::new().app_data(data).configure(configure)).await;
        let req = atest::TestRequest::post()
            .uri("/download")
            .set_form(DownloadFormBody { genes: "lev-11\nfoo".to_string() })
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
        let body = atest::read_body(resp).await;
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("Invalid gene name identified:"));
        assert!(body.contains("foo"));
    }

    #[actix_web::test]
    async fn download_returns_pdf() {
        let (_dir, data) = state(false);
        let app = atest::init_service(App::new().app_data(data).configure(configure)).await;
        let req = atest::TestRequest::post()
            .uri("/download")
            .set_form(DownloadFormBody { genes: "lev-11\nY105E8B.1".to_string() })
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
        let disposition = resp.headers().get("Content-Disposition").unwrap().to_str().unwrap().to_string();
        assert!(disposition.contains(EXPORT_FILE_NAME));
        let body = atest::read_body(resp).await;
        assert!(body.starts_with(b"%PDF"));
    }

    #[derive(serde::Serialize)]
    struct DownloadFormBody {
        genes: String,
    }
}
