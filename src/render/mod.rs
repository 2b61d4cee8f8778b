//! Multi-track layout of a transcript.
//!
//! Every base of every exon produces one column in four tracks:
//!
//! ```text
//!   .    .    |1        |11       |21
//! aaacctgcaggtATGGATTTTCGTGTTATACAGCAGGAA
//!             M  D  F  R  V  I  Q  Q  E
//!             |1
//! ```
//!
//! 1. base ruler: coding positions every 10 bases, dots every 5 intronic bases
//! 2. DNA: lower-case flanks, upper-case exon, optional highlight markup
//! 3. amino acid letter on the first base of each codon
//! 4. amino acid number on the 1st, 11th, 21st... residue
//!
//! Lines wrap after [`LINE_WIDTH`] bases. [`render_transcript`] returns the
//! lines tagged with their [`LineKind`]; turning them into a document is the
//! job of [`crate::document`].

pub mod clash;
mod engine;
pub mod pagination;
pub mod state;

use std::fmt;

use thiserror::Error;

use crate::document::OutputMode;
use crate::markup::MarkupError;
use crate::model::ModelError;

pub use engine::render_transcript;

/// Bases per line.
pub const LINE_WIDTH: usize = 60;

/// Errors that abort the rendering of a transcript.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Malformed markup in exon {exon}: {source}")]
    Markup {
        exon: u32,
        #[source]
        source: MarkupError,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Codon of amino acid {amino_number} in exon {exon} runs past the end of the coding sequence")]
    IndexOutOfRange { exon: u32, amino_number: usize },

    #[error("Unknown genetic code: {0}")]
    UnknownGeneticCode(u8),
}

/// Result type for rendering.
pub type RenderResult<T> = Result<T, RenderError>;

/// Rendering switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub mode: OutputMode,
    /// Print shared-intron warnings under exon summaries
    pub print_clashes: bool,
    /// NCBI translation table used to cross-check codons
    pub genetic_code: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Latex,
            print_clashes: true,
            genetic_code: 1,
        }
    }
}

/// Role of an emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    ExonSummary,
    Clash,
    Blank,
    BaseRuler,
    Sequence,
    AminoAcids,
    AminoRuler,
    Warning,
    /// Page break marker, expanded by the document assembler
    PageBreak,
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub text: String,
}

impl Line {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn blank() -> Self {
        Self::new(LineKind::Blank, "")
    }

    pub fn page_break() -> Self {
        Self::new(LineKind::PageBreak, "")
    }
}

/// A printed amino acid that disagrees with the codon beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodonMismatch {
    pub exon: u32,
    /// 1-based residue number
    pub amino_number: usize,
    pub codon: String,
    pub printed: char,
    /// Translation of the codon
    pub expected: char,
}

impl fmt::Display for CodonMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "There is an error with the amino acid - codon pairing in exon {}: {} - {}, amino acid number {} (codon translates to {})",
            self.exon, self.codon, self.printed, self.amino_number, self.expected
        )
    }
}

/// Layout of one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Transcript identifier, used to name the output
    pub identifier: String,
    pub lines: Vec<Line>,
    pub warnings: Vec<CodonMismatch>,
}

impl Rendered {
    /// Text of every line of one kind, in order.
    pub fn track(&self, kind: LineKind) -> impl Iterator<Item = &str> + '_ {
        self.lines
            .iter()
            .filter(move |line| line.kind == kind)
            .map(|line| line.text.as_str())
    }
}
