//! Primer lists and their annotation onto exon sequences.
//!
//! A primer list is a CSV file named after the gene (`BRCA1.csv`):
//!
//! ```text
//! Primer Sequences,Exon,Direction,Fragment Size,Primer Batch Numbers
//! TGAATATGATGTTCCC,1,F,250,B12
//! CCTGTTGATCGCAGTG,,R,,B12
//! ```
//!
//! Every match of a primer in an exon sequence is wrapped in a highlight
//! token carrying the primer label. Reverse primers are matched by their
//! reverse complement.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::document::escape_latex;
use crate::genetic_code::reverse_complement;
use crate::markup::{highlight, plain_runs, MarkupError};
use crate::model::Reference;

/// Options of the comment directive written for every primer.
pub const PRIMER_COMMENT_OPTIONS: &str = "date";

/// Errors raised while reading or applying primers.
#[derive(Error, Debug)]
pub enum PrimerError {
    #[error("Failed to read primer file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed primer CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row {row}: '{sequence}' is not a nucleotide sequence")]
    InvalidSequence { row: usize, sequence: String },

    #[error("Cannot annotate exon {exon}: {source}")]
    Markup {
        exon: u32,
        #[source]
        source: MarkupError,
    },
}

/// Result type for primer operations.
pub type PrimerResult<T> = Result<T, PrimerError>;

#[derive(Debug, Deserialize)]
struct PrimerRow {
    #[serde(rename = "Primer Sequences", default)]
    sequence: String,
    #[serde(rename = "Exon", default)]
    exon: String,
    #[serde(rename = "Direction", default)]
    direction: String,
    #[serde(rename = "Fragment Size", default)]
    fragment_size: String,
}

/// A primer ready to be searched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primer {
    /// Upper-case bases as they appear on the reference strand
    pub sequence: String,
    /// Annotation text, e.g. `Primer 3F, Frag size = 250`
    pub label: String,
}

/// Reads a primer list.
///
/// Rows without a sequence are skipped. An empty exon cell repeats the
/// previous row's exon. A reverse primer without a fragment size takes the
/// size of the row before it.
pub fn read_primers<R: Read>(reader: R) -> PrimerResult<Vec<Primer>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut primers = Vec::new();
    let mut exon = "1".to_string();
    let mut carried_size: Option<String> = None;

    for (index, row) in csv_reader.deserialize::<PrimerRow>().enumerate() {
        let row = row?;
        let sequence = row.sequence.to_ascii_uppercase();
        if sequence.is_empty() {
            continue;
        }
        if !sequence.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PrimerError::InvalidSequence {
                row: index + 1,
                sequence: row.sequence,
            });
        }
        if !row.exon.is_empty() {
            exon = row.exon;
        }

        let reverse = row.direction == "R";
        let fragment = if row.fragment_size.is_empty() {
            if reverse {
                carried_size.take()
            } else {
                None
            }
        } else {
            carried_size = Some(row.fragment_size.clone());
            Some(row.fragment_size)
        };

        let label = match fragment {
            Some(size) => format!("Primer {exon}{}, Frag size = {size}", row.direction),
            None => format!("Primer {exon}{}", row.direction),
        };
        let sequence = if reverse {
            reverse_complement(&sequence)
        } else {
            sequence
        };
        primers.push(Primer { sequence, label });
    }
    Ok(primers)
}

pub fn read_primer_file<P: AsRef<Path>>(path: P) -> PrimerResult<Vec<Primer>> {
    let primers = read_primers(File::open(&path)?)?;
    debug!(path = %path.as_ref().display(), count = primers.len(), "read primers");
    Ok(primers)
}

/// Finds `<gene>.csv` in `dir`, ignoring case. A missing directory means no
/// primers.
pub fn find_primer_file<P: AsRef<Path>>(dir: P, gene_name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries.filter_map(Result::ok).map(|e| e.path()).find(|path| {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case(gene_name));
        is_csv && stem_matches
    })
}

/// Wraps every case-insensitive match of `primer` in `sequence`.
///
/// Bases already inside a highlight are left alone. Returns the new sequence
/// and the number of matches.
pub fn annotate_sequence(sequence: &str, primer: &Primer) -> Result<(String, usize), MarkupError> {
    if primer.sequence.is_empty() {
        return Ok((sequence.to_string(), 0));
    }
    let label = escape_latex(&primer.label);
    let width = primer.sequence.len();

    let mut annotated = String::with_capacity(sequence.len());
    let mut copied = 0;
    let mut hits = 0;
    for run in plain_runs(sequence)? {
        let upper = sequence[run.clone()].to_ascii_uppercase();
        let mut from = 0;
        while let Some(found) = upper[from..].find(&primer.sequence) {
            let start = run.start + from + found;
            let end = start + width;
            annotated.push_str(&sequence[copied..start]);
            annotated.push_str(&highlight(
                Some(PRIMER_COMMENT_OPTIONS),
                &label,
                &sequence[start..end],
            ));
            copied = end;
            from += found + width;
            hits += 1;
        }
    }
    annotated.push_str(&sequence[copied..]);
    Ok((annotated, hits))
}

/// Applies every primer to every exon of every transcript.
pub fn annotate_reference(reference: &mut Reference, primers: &[Primer]) -> PrimerResult<usize> {
    let mut total = 0;
    for (_, transcript) in &mut reference.transcripts {
        for (&number, exon) in &mut transcript.exons {
            for primer in primers {
                let (annotated, hits) = annotate_sequence(&exon.sequence, primer)
                    .map_err(|source| PrimerError::Markup {
                        exon: number,
                        source,
                    })?;
                if hits > 0 {
                    debug!(exon = number, primer = %primer.label, hits, "primer matched");
                    exon.sequence = annotated;
                    total += hits;
                }
            }
        }
    }
    info!(gene = %reference.gene_name, matches = total, "primers applied");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::strip_markup;

    const CSV: &str = "\
Primer Sequences,Exon,Direction,Fragment Size,Primer Batch Numbers
tgaatatgatg,1,F,250,B12
TCTCAACATCA,,R,,B12
,,,,
GTACCCACTG,2,F,,
CCTGTTGATC,2,R,,
";

    #[test]
    fn test_read_primers() {
        let primers = read_primers(CSV.as_bytes()).unwrap();
        assert_eq!(primers.len(), 4);
        assert_eq!(primers[0].sequence, "TGAATATGATG");
        assert_eq!(primers[0].label, "Primer 1F, Frag size = 250");
        // Reverse primer inherits exon and fragment size
        assert_eq!(primers[1].sequence, "TGATGTTGAGA");
        assert_eq!(primers[1].label, "Primer 1R, Frag size = 250");
        assert_eq!(primers[2].label, "Primer 2F");
        // The size was consumed by the first reverse primer
        assert_eq!(primers[3].label, "Primer 2R");
        assert_eq!(primers[3].sequence, "GATCAACAGG");
    }

    #[test]
    fn test_invalid_sequence() {
        let csv = "Primer Sequences,Exon,Direction,Fragment Size\nACG-T,1,F,\n";
        assert!(matches!(
            read_primers(csv.as_bytes()),
            Err(PrimerError::InvalidSequence { row: 1, .. })
        ));
    }

    #[test]
    fn test_annotate_sequence_keeps_case_and_bases() {
        let primer = Primer {
            sequence: "GTGTGA".into(),
            label: "Primer 1F".into(),
        };
        let seq = "cccagtgTGAATAT";
        let (annotated, hits) = annotate_sequence(seq, &primer).unwrap();
        assert_eq!(hits, 1);
        assert_eq!(annotated, "ccca\\pdfcomment[date]{Primer 1F}\\hl{gtgTGA}ATAT");
        assert_eq!(strip_markup(&annotated).unwrap(), seq);
    }

    #[test]
    fn test_annotate_skips_existing_markup() {
        let primer = Primer {
            sequence: "ACGT".into(),
            label: "Primer 2R".into(),
        };
        let seq = format!("ACGT{}acgt", highlight(Some("date"), "old", "ACGT"));
        let (annotated, hits) = annotate_sequence(&seq, &primer).unwrap();
        assert_eq!(hits, 2);
        assert_eq!(annotated.matches("\\hl{").count(), 3);
        assert_eq!(strip_markup(&annotated).unwrap(), "ACGTACGTacgt");
    }

    #[test]
    fn test_label_is_escaped() {
        let primer = Primer {
            sequence: "AC".into(),
            label: "Primer X_1F".into(),
        };
        let (annotated, _) = annotate_sequence("AC", &primer).unwrap();
        assert_eq!(annotated, "\\pdfcomment[date]{Primer X\\_1F}\\hl{AC}");
    }

    #[test]
    fn test_find_primer_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("toy1.csv"), CSV).unwrap();
        std::fs::write(dir.path().join("TOY1.txt"), "").unwrap();
        let found = find_primer_file(dir.path(), "TOY1").unwrap();
        assert_eq!(found.file_name().unwrap(), "toy1.csv");
        assert!(find_primer_file(dir.path(), "OTHER").is_none());
        assert!(find_primer_file(dir.path().join("missing"), "TOY1").is_none());
    }
}
