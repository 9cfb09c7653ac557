//! elegans-tsplice: trans-splicing visualisation for C. elegans genes
//!
//! Draws per-gene exon structures overlaid with per-position read counts
//! (splice leader, hairpin and unidentified fractions), per-isoform read
//! feature tracks, and batch PDF exports. Everything is available from an
//! actix-web dashboard or directly from the command line.
//!
//! v0.3.0

use clap::{ArgGroup, Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

mod axis;
mod dashboard;
mod error;
mod export;
mod features;
mod layout;
mod plot;
mod plotly;
mod reference;
mod render;

use dashboard::{run_dashboard, AppState};
use error::{Result, TspliceError};
use export::{export_pdf, validate_input, EXPORT_FILE_NAME};
use features::FeatureData;
use reference::ReferenceData;

const DEFAULT_DATA_DIR: &str = "app/src";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding the reference and read-feature tables
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the interactive dashboard (web-based)
    Serve {
        /// Address the HTTP server binds to
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Render one gene plot to SVG
    Plot {
        /// Gene identifier or common name (ex: Y105E8B.1 or lev-11)
        #[arg(long)]
        gene: String,

        /// Hide known ATG positions
        #[arg(long, default_value_t = false)]
        no_atg: bool,

        /// Output SVG file (default: <gene>.svg)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render the read-feature track of one isoform to SVG
    Features {
        /// Isoform identifier (ex: C09D4.5a)
        #[arg(long)]
        isoform: String,

        /// Output SVG file (default: <isoform>.svg)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Export one PDF page per gene
    Export(ExportArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["genes", "gene_file"])))]
struct ExportArgs {
    /// Comma separated gene identifiers or names
    #[arg(long, value_delimiter = ',')]
    genes: Vec<String>,

    /// File with one gene identifier or name per line
    #[arg(long)]
    gene_file: Option<PathBuf>,

    /// Output PDF file
    #[arg(long, default_value = EXPORT_FILE_NAME)]
    output: PathBuf,
}

fn display_banner() {
    println!("{}", r#"

      _                                _             _ _
  ___| | ___  __ _  __ _ _ __  ___    | |_ ___ _ __ | (_) ___ ___
 / _ \ |/ _ \/ _` |/ _` | '_ \/ __|___| __/ __| '_ \| | |/ __/ _ \
|  __/ |  __/ (_| | (_| | | | \__ \___| |_\__ \ |_) | | | (_|  __/
 \___|_|\___|\__, |\__,_|_| |_|___/    \__|___/ .__/|_|_|\___\___|
             |___/                            |_|
"#.bright_green().bold());
    println!("{}", "Quantitative analysis of C. elegans trans-splicing by Nanopore direct-cDNA sequencing".cyan());
    println!("version {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("    elegans-tsplice serve [--data-dir DIR] [--bind ADDR]");
    println!("    elegans-tsplice plot --gene <GENE> [--no-atg] [--output FILE.svg]");
    println!("    elegans-tsplice features --isoform <ISOFORM> [--output FILE.svg]");
    println!("    elegans-tsplice export (--genes G1,G2 | --gene-file FILE) [--output FILE.pdf]");
    println!();
    println!("For full documentation, run:");
    println!("    elegans-tsplice --help");
    println!();
}

fn serve(data_dir: &Path, bind: &str) -> Result<()> {
    let reference = ReferenceData::load(data_dir)?;
    let features = if FeatureData::available(data_dir) {
        Some(FeatureData::load(data_dir)?)
    } else {
        warn!("Read feature tables not found in {}, feature view disabled", data_dir.display());
        None
    };
    let state = AppState { reference, features };

    let sys = actix_web::rt::System::new();
    sys.block_on(run_dashboard(state, bind))?;
    Ok(())
}

fn plot_gene(data_dir: &Path, input: &str, show_atg: bool, output: Option<PathBuf>) -> Result<()> {
    let reference = ReferenceData::load(data_dir)?;
    let gene = reference.resolve(input)?;
    let title = reference.names().title(&gene);
    let figure = plot::gene_plot(&reference, &gene, show_atg)?.for_export(title);

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.svg", gene)));
    std::fs::write(&output, render::render_svg(&figure))?;
    info!("Gene plot written to {}", output.display());
    Ok(())
}

fn plot_features(data_dir: &Path, isoform: &str, output: Option<PathBuf>) -> Result<()> {
    if !FeatureData::available(data_dir) {
        return Err(TspliceError::FeaturesUnavailable);
    }
    let features = FeatureData::load(data_dir)?;
    let figure = plot::feature_plot(&features, isoform)?.with_title(isoform);

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.svg", isoform)));
    std::fs::write(&output, render::render_svg(&figure))?;
    info!("Feature plot written to {}", output.display());
    Ok(())
}

fn export(data_dir: &Path, args: ExportArgs) -> Result<()> {
    let reference = ReferenceData::load(data_dir)?;
    let raw = match &args.gene_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => args.genes.join("\n"),
    };
    let genes = validate_input(&reference, &raw)?;

    let pb = ProgressBar::new(genes.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.green/black}] {pos}/{len} ({percent}%) - {msg}"
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
    );

    let bytes = export_pdf(&reference, &genes, |n, total, title| {
        let percent = (n as f64 / total as f64 * 100.0).round();
        info!("processing {} - Completed: {}/{} ({}%)", title, n, total, percent);
        pb.set_position(n as u64);
        pb.set_message(title.to_string());
    });
    match bytes {
        Ok(bytes) => {
            pb.finish_with_message("done");
            std::fs::write(&args.output, bytes)?;
            info!("{} plot(s) written to {}", genes.len(), args.output.display());
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("aborted");
            Err(e)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { bind } => serve(&cli.data_dir, &bind),
        Commands::Plot { gene, no_atg, output } => plot_gene(&cli.data_dir, &gene, !no_atg, output),
        Commands::Features { isoform, output } => plot_features(&cli.data_dir, &isoform, output),
        Commands::Export(args) => export(&cli.data_dir, args),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // If no arguments provided, show banner and exit
    if std::env::args().len() <= 1 {
        display_banner();
        std::process::exit(0);
    }

    let cli = Cli::parse();
    info!("Starting elegans-tsplice v{}", env!("CARGO_PKG_VERSION"));
    let start_time = std::time::Instant::now();

    match run(cli) {
        Ok(_) => {
            info!("Completed in {:.2} seconds", start_time.elapsed().as_secs_f64());
        }
        Err(TspliceError::InvalidGenes(names)) => {
            error!("Invalid gene name identified: {}", error::format_invalid_list(&names));
            error!("Please verify your input and re-start.");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
