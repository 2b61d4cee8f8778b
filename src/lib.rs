//! # reftypeset - Reference sequence typesetter
//!
//! Builds printable reference documents for the transcripts of a gene: each
//! exon with its intronic flanks, a base ruler, the translated protein and
//! an amino acid ruler, laid out 60 bases per line.
//!
//! ## Architecture
//!
//! Data flows one way through the modules:
//! - `formats`: reference file detection, GenBank and LRG readers
//! - `model`: transcripts, exon coordinates and flank application
//! - `primer`: primer lists turned into highlight markup
//! - `markup`: tokenizer for the highlight markup
//! - `render`: per-base track state, line wrapping, clashes and pagination
//! - `document`: LaTeX or plain text assembly
//! - `writer`: output naming, writing and compilation
//! - `config`: settings file
//! - `genetic_code`: codon tables used to cross-check the protein

pub mod config;
pub mod document;
pub mod formats;
pub mod genetic_code;
pub mod markup;
pub mod model;
pub mod primer;
pub mod render;
pub mod writer;
