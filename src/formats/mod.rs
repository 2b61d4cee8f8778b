//! Reference file readers.
//!
//! Supports automatic format detection for:
//! - GenBank flat files (.gb, .gbk, .genbank)
//! - LRG XML files (.xml)
//!
//! Format detection priority:
//! 1. Explicit format specification
//! 2. File extension
//! 3. Content-based detection

pub mod genbank;
pub mod lrg;

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::model::Reference;

/// Detected reference format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    GenBank,
    Lrg,
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::GenBank => write!(f, "GBK"),
            FileFormat::Lrg => write!(f, "LRG"),
        }
    }
}

/// Errors that can occur while reading a reference file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to open file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Empty file")]
    EmptyFile,

    #[error("Could not determine file format.\n\
             Hint: reference files must be GenBank (.gb, .gbk) or LRG (.xml)")]
    UnknownFormat,

    #[error("GenBank error: {0}")]
    GenbankError(#[from] genbank::GenbankError),

    #[error("LRG error: {0}")]
    LrgError(#[from] lrg::LrgError),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// How exon sequences are cut out of the genomic sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Intronic bases kept on each side of an exon
    pub padding: usize,
    /// Split shared introns between close exons instead of repeating bases
    pub trim_flanking: bool,
}

/// Detects format from file extension.
pub fn detect_format_from_extension<P: AsRef<Path>>(path: P) -> Option<FileFormat> {
    let ext = path.as_ref().extension().and_then(OsStr::to_str)?;
    match ext.to_lowercase().as_str() {
        "gb" | "gbk" | "genbank" => Some(FileFormat::GenBank),
        "xml" => Some(FileFormat::Lrg),
        _ => None,
    }
}

/// Detects the format by examining the first non-empty line.
pub fn detect_format_from_content(content: &str) -> Option<FileFormat> {
    let first = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    if first.starts_with("LOCUS") {
        Some(FileFormat::GenBank)
    } else if first.starts_with("<?xml") || first.starts_with("<lrg") {
        Some(FileFormat::Lrg)
    } else {
        None
    }
}

fn parse_content(content: &str, format: FileFormat, options: ParseOptions) -> ParseResult<Reference> {
    match format {
        FileFormat::GenBank => {
            let record = genbank::parse_genbank_str(content)?;
            Ok(genbank::reference_from_record(&record, options)?)
        }
        FileFormat::Lrg => Ok(lrg::parse_lrg_str(content, options)?),
    }
}

/// Reads a reference file with optional format specification.
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    forced_format: Option<FileFormat>,
    options: ParseOptions,
) -> ParseResult<Reference> {
    let content = fs::read_to_string(&path)?;
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let format = forced_format
        .or_else(|| detect_format_from_extension(&path))
        .or_else(|| detect_format_from_content(&content))
        .ok_or(ParseError::UnknownFormat)?;
    debug!(path = %path.as_ref().display(), %format, "reading reference");

    parse_content(&content, format, options)
}

/// Reads a reference file, detecting the format.
pub fn parse_file<P: AsRef<Path>>(path: P, options: ParseOptions) -> ParseResult<Reference> {
    parse_file_with_options(path, None, options)
}
