//! reftypeset - Reference sequence typesetter
//!
//! Lays out the exons of every transcript of a gene as a numbered,
//! translated reference document.
//!
//! ## Usage
//!
//! ```bash
//! reftypeset -i BRCA1.gb                    # LaTeX document per transcript
//! reftypeset -i BRCA1.gb --text             # plain text instead
//! reftypeset -i BRCA1.gb --padding 50 --compile
//! reftypeset -i LRG_292.xml                 # LRG transcripts, named LRG_292t1, ...
//! ```
//!
//! ## Supported Formats
//!
//! - GenBank (.gb, .gbk, .genbank)
//! - LRG XML (.xml)

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reftypeset::config::{Settings, DEFAULT_CONFIG_FILE};
use reftypeset::document::{assemble, OutputMode};
use reftypeset::formats::{parse_file_with_options, FileFormat, ParseOptions};
use reftypeset::model::Reference;
use reftypeset::primer::{annotate_reference, find_primer_file, read_primer_file};
use reftypeset::render::{render_transcript, RenderOptions};
use reftypeset::writer::{compile, output_stem, timestamp, write_document};

const TOOL_VERSION: &str = concat!("ReferenceTypeSetter: Version: ", env!("CARGO_PKG_VERSION"));

/// File format specification for command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// GenBank flat file
    Genbank,
    /// LRG XML
    Lrg,
    /// Auto-detect from extension and content
    Auto,
}

impl From<FormatArg> for Option<FileFormat> {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Genbank => Some(FileFormat::GenBank),
            FormatArg::Lrg => Some(FileFormat::Lrg),
            FormatArg::Auto => None,
        }
    }
}

/// reftypeset - Typesets annotated reference sequences for transcripts
///
/// Writes one document per transcript found in the input file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Reference file (GenBank or LRG)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Force a specific file format (overrides auto-detection)
    #[arg(short = 'f', long = "format", value_enum, default_value = "auto")]
    format: FormatArg,

    /// Settings file
    #[arg(long = "config", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Intronic bases shown on each side of an exon (overrides settings)
    #[arg(long = "padding")]
    padding: Option<usize>,

    /// Repeat shared intronic bases instead of splitting them between exons
    #[arg(long = "no-trim")]
    no_trim: bool,

    /// Do not print shared-intron warnings
    #[arg(long = "no-clashes")]
    no_clashes: bool,

    /// Write plain text instead of a LaTeX document
    #[arg(long = "text")]
    text: bool,

    /// Author written into the document metadata (overrides settings)
    #[arg(long = "author")]
    author: Option<String>,

    /// Primer CSV (default: <primer_dir>/<gene>.csv when present)
    #[arg(long = "primers")]
    primers: Option<PathBuf>,

    /// Output directory (overrides settings)
    #[arg(long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Genetic code for the codon check (overrides settings)
    #[arg(short = 'g', long = "genetic-code")]
    genetic_code: Option<u8>,

    /// Run the LaTeX compiler on every document
    #[arg(long = "compile", conflicts_with = "text")]
    compile: bool,

    /// Increase logging verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Settings file values with command line overrides applied.
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load_from(&self.config)?;
        if let Some(padding) = self.padding {
            settings.padding = padding;
        }
        if let Some(author) = &self.author {
            settings.author = author.clone();
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(code) = self.genetic_code {
            settings.genetic_code = code;
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Applies the primer list given on the command line, or the gene's list
/// from the primer directory.
fn apply_primers(args: &Args, settings: &Settings, reference: &mut Reference) -> Result<Option<String>> {
    let path = match &args.primers {
        Some(path) => path.clone(),
        None => match find_primer_file(&settings.primer_dir, &reference.gene_name) {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let primers = read_primer_file(&path)
        .with_context(|| format!("Failed to read primers from {}", path.display()))?;
    annotate_reference(reference, &primers)?;
    Ok(Some(format!(
        "Primer Labels: {} ({} primers)",
        path.display(),
        primers.len()
    )))
}

fn run(args: &Args) -> Result<()> {
    let settings = args.settings()?;
    let options = ParseOptions {
        padding: settings.padding,
        trim_flanking: !args.no_trim,
    };

    let mut reference = parse_file_with_options(&args.input, args.format.into(), options)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    info!(
        gene = %reference.gene_name,
        reference = %reference.reference_id,
        transcripts = reference.transcripts.len(),
        "reference loaded"
    );

    let mut provenance = vec![reference.parser_version.clone(), TOOL_VERSION.to_string()];
    if let Some(primer_details) = apply_primers(args, &settings, &mut reference)? {
        provenance.push(primer_details);
    }

    let mode = OutputMode::from_document_flag(!args.text);
    let render_options = RenderOptions {
        mode,
        print_clashes: !args.no_clashes,
        genetic_code: settings.genetic_code,
    };
    let stamp = timestamp(&Local::now());

    let mut failed = Vec::new();
    for (number, transcript) in &reference.transcripts {
        let rendered = match render_transcript(transcript, &render_options) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(transcript = %transcript.nm_id, "{e}");
                failed.push(transcript.nm_id.clone());
                continue;
            }
        };
        if !rendered.warnings.is_empty() {
            warn!(
                transcript = %transcript.nm_id,
                mismatches = rendered.warnings.len(),
                "codon mismatches found"
            );
        }

        let lrg_label = reference.lrg_label(*number);
        let document = assemble(
            &rendered,
            transcript,
            lrg_label.as_deref(),
            mode,
            &settings.author,
            &provenance,
        );
        let stem = output_stem(&reference.gene_name, &document.identifier, &stamp);
        let path = write_document(&settings.output_dir, &stem, &document)
            .with_context(|| format!("Failed to write transcript {number}"))?;
        println!("{}", path.display());

        if args.compile && compile(&settings.latex_command, &path, &settings.keep_extensions) {
            info!(file = %path.display(), "compiled");
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} of {} transcripts failed: {}",
            failed.len(),
            reference.transcripts.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(&args)
}
