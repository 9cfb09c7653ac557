//! Batch export of gene plots into one multi-page PDF.
//!
//! Every page is rendered to SVG in memory, converted to a PDF form XObject
//! and placed on a landscape 240 x 180 mm page.

use crate::error::{Result, TspliceError};
use crate::plot::gene_plot;
use crate::reference::ReferenceData;
use crate::render::render_svg;
use log::{debug, info};
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref};
use std::collections::HashMap;
use svg2pdf::usvg;

pub const EXPORT_FILE_NAME: &str = "elegans_trans-splicing_plots.pdf";

const MM_TO_PT: f32 = 72.0 / 25.4;
const PAGE_WIDTH_MM: f32 = 240.0;
const PAGE_HEIGHT_MM: f32 = 180.0;
const IMAGE_X_MM: f32 = 15.0;
const IMAGE_Y_MM: f32 = 20.0;
const IMAGE_WIDTH_MM: f32 = 200.0;
const IMAGE_HEIGHT_MM: f32 = 150.0;

/// One entry per non-blank line.
pub fn parse_gene_list(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits entries into resolved gene IDs and names nothing matched.
pub fn convert_genes(reference: &ReferenceData, entries: &[String]) -> (Vec<String>, Vec<String>) {
    let mut genes = Vec::with_capacity(entries.len());
    let mut invalid = Vec::new();
    for entry in entries {
        match reference.names().resolve(entry) {
            Some(id) => genes.push(id.to_string()),
            None => invalid.push(entry.clone()),
        }
    }
    (genes, invalid)
}

/// Parses, resolves and validates raw user input in one go.
pub fn validate_input(reference: &ReferenceData, input: &str) -> Result<Vec<String>> {
    let entries = parse_gene_list(input);
    if entries.is_empty() {
        return Err(TspliceError::EmptyGeneList);
    }
    let (genes, invalid) = convert_genes(reference, &entries);
    if !invalid.is_empty() {
        return Err(TspliceError::InvalidGenes(invalid));
    }
    Ok(genes)
}

/// Accumulates pages into a PDF document.
struct PdfBook {
    pdf: Pdf,
    alloc: Ref,
    catalog_id: Ref,
    page_tree_id: Ref,
    page_ids: Vec<Ref>,
}

impl PdfBook {
    fn new() -> Self {
        let mut alloc = Ref::new(1);
        let catalog_id = alloc.bump();
        let page_tree_id = alloc.bump();
        Self {
            pdf: Pdf::new(),
            alloc,
            catalog_id,
            page_tree_id,
            page_ids: Vec::new(),
        }
    }

    fn add_svg_page(&mut self, tree: &usvg::Tree, gene: &str) -> Result<()> {
        let (chunk, svg_ref) = svg2pdf::to_chunk(tree, svg2pdf::ConversionOptions::default())
            .map_err(|e| TspliceError::Pdf { gene: gene.to_string(), reason: e.to_string() })?;

        let alloc = &mut self.alloc;
        let mut map = HashMap::new();
        let chunk = chunk.renumber(|old| *map.entry(old).or_insert_with(|| alloc.bump()));
        let svg_id = map.get(&svg_ref).copied().ok_or_else(|| TspliceError::Pdf {
            gene: gene.to_string(),
            reason: "converted plot has no root object".to_string(),
        })?;
        self.pdf.extend(&chunk);

        let page_id = self.alloc.bump();
        let content_id = self.alloc.bump();
        let plot_name = Name(b"Plot");

        let mut page = self.pdf.page(page_id);
        page.media_box(Rect::new(
            0.0,
            0.0,
            PAGE_WIDTH_MM * MM_TO_PT,
            PAGE_HEIGHT_MM * MM_TO_PT,
        ));
        page.parent(self.page_tree_id);
        page.contents(content_id);
        let mut resources = page.resources();
        resources.x_objects().pair(plot_name, svg_id);
        resources.finish();
        page.finish();

        // the XObject is a unit square, scale it to the image box
        let bottom_mm = PAGE_HEIGHT_MM - IMAGE_Y_MM - IMAGE_HEIGHT_MM;
        let mut content = Content::new();
        content.save_state();
        content.transform([
            IMAGE_WIDTH_MM * MM_TO_PT,
            0.0,
            0.0,
            IMAGE_HEIGHT_MM * MM_TO_PT,
            IMAGE_X_MM * MM_TO_PT,
            bottom_mm * MM_TO_PT,
        ]);
        content.x_object(plot_name);
        content.restore_state();
        self.pdf.stream(content_id, &content.finish());

        self.page_ids.push(page_id);
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        self.pdf.catalog(self.catalog_id).pages(self.page_tree_id);
        self.pdf
            .pages(self.page_tree_id)
            .kids(self.page_ids.iter().copied())
            .count(self.page_ids.len() as i32);
        self.pdf.finish()
    }
}

fn svg_options() -> usvg::Options<'static> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    options
}

fn export_page(
    book: &mut PdfBook,
    reference: &ReferenceData,
    options: &usvg::Options,
    gene: &str,
    title: &str,
) -> Result<()> {
    let figure = gene_plot(reference, gene, true)?.for_export(title);
    let svg = render_svg(&figure);
    let tree = usvg::Tree::from_str(&svg, options).map_err(|e| TspliceError::Svg(e.to_string()))?;
    book.add_svg_page(&tree, gene)
}

/// Renders one page per gene. `progress` is called before each page with
/// `(done, total, title)`. The first failing gene aborts the whole batch.
pub fn export_pdf<F>(reference: &ReferenceData, genes: &[String], mut progress: F) -> Result<Vec<u8>>
where
    F: FnMut(usize, usize, &str),
{
    if genes.is_empty() {
        return Err(TspliceError::EmptyGeneList);
    }
    let options = svg_options();
    let mut book = PdfBook::new();
    let total = genes.len();

    for (n, gene) in genes.iter().enumerate() {
        let title = reference.names().title(gene);
        progress(n, total, &title);
        debug!("Rendering export page {} for {}", n + 1, title);
        export_page(&mut book, reference, &options, gene, &title).map_err(|e| TspliceError::Export {
            gene: gene.clone(),
            source: Box::new(e),
        })?;
    }

    let bytes = book.finish();
    info!("Exported {} plot(s) into a {} byte PDF", total, bytes.len());
    Ok(bytes)
}
