//! Genetic code definitions and codon translation.
//!
//! This module provides:
//! - NCBI genetic code tables, built once per process
//! - Codon to amino acid translation used by the codon cross-check

use std::sync::OnceLock;

/// NCBI base order used to lay out the 64-letter amino acid strings.
const BASE_ORDER: [u8; 4] = [b'T', b'C', b'A', b'G'];

const STANDARD_AAS: &str = "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";
const VERTEBRATE_MITO_AAS: &str = "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG";

/// A genetic code table for translating codons to amino acids.
#[derive(Debug, Clone)]
pub struct GeneticCode {
    /// NCBI genetic code ID
    pub id: u8,
    /// Name of the genetic code
    pub name: &'static str,
    /// Amino acid per codon, indexed in NCBI order (TTT, TTC, TTA, TTG, TCT, ...)
    table: [char; 64],
}

impl GeneticCode {
    /// Creates a genetic code from an NCBI `ncbieaa` string (64 letters).
    fn new(id: u8, name: &'static str, ncbieaa: &str) -> Self {
        let mut table = ['X'; 64];
        for (slot, aa) in table.iter_mut().zip(ncbieaa.chars()) {
            *slot = aa;
        }
        Self { id, name, table }
    }

    /// Position of a base in NCBI order, `None` for anything ambiguous.
    fn base_index(base: u8) -> Option<usize> {
        let base = match base.to_ascii_uppercase() {
            b'U' => b'T',
            other => other,
        };
        BASE_ORDER.iter().position(|&b| b == base)
    }

    /// Translates a single codon to an amino acid.
    ///
    /// Case-insensitive, `U` is read as `T`. Codons that are not exactly three
    /// unambiguous nucleotides translate to `X`.
    pub fn translate_codon(&self, codon: &str) -> char {
        let bytes = codon.as_bytes();
        if bytes.len() != 3 {
            return 'X';
        }
        let index = bytes.iter().try_fold(0usize, |acc, &b| {
            Self::base_index(b).map(|i| acc * 4 + i)
        });
        index.map_or('X', |i| self.table[i])
    }

    /// Translates a nucleotide sequence in frame 0, ignoring a trailing partial codon.
    pub fn translate_sequence(&self, sequence: &str) -> String {
        sequence
            .as_bytes()
            .chunks_exact(3)
            .map(|codon| std::str::from_utf8(codon).map_or('X', |c| self.translate_codon(c)))
            .collect()
    }
}

/// The genetic codes known to the renderer.
pub struct GeneticCodes {
    codes: Vec<GeneticCode>,
}

impl GeneticCodes {
    fn new() -> Self {
        Self {
            codes: vec![
                GeneticCode::new(1, "Standard", STANDARD_AAS),
                GeneticCode::new(2, "Vertebrate Mitochondrial", VERTEBRATE_MITO_AAS),
            ],
        }
    }

    /// Returns the process-wide table set.
    pub fn get_all() -> &'static GeneticCodes {
        static CODES: OnceLock<GeneticCodes> = OnceLock::new();
        CODES.get_or_init(GeneticCodes::new)
    }

    /// Returns all genetic codes.
    pub fn all(&self) -> &[GeneticCode] {
        &self.codes
    }

    /// Gets a genetic code by NCBI ID.
    pub fn get(&self, id: u8) -> Option<&GeneticCode> {
        self.codes.iter().find(|c| c.id == id)
    }
}

/// The standard code (NCBI table 1).
pub fn standard() -> &'static GeneticCode {
    &GeneticCodes::get_all().codes[0]
}

/// Reverse complement of a nucleotide string, preserving case.
pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            'a' => 't',
            't' => 'a',
            'c' => 'g',
            'g' => 'c',
            other => other,
        })
        .collect()
}
