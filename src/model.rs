//! Data model for reference sequences.
//!
//! This module contains the structures handed to the renderer:
//! - [`Reference`]: one parsed reference file, possibly several transcripts
//! - [`TranscriptModel`]: one transcript with its padded exon sequences
//! - [`ExonSpan`] and [`build_exon_sequences`]: exon coordinates on the
//!   genomic sequence and flank application

use std::collections::BTreeMap;

use thiserror::Error;

use crate::formats::FileFormat;

/// Errors raised by an inconsistent transcript model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Exon order does not match the exon records (order: {order:?}, records: {records:?})")]
    ExonOrderMismatch { order: Vec<u32>, records: Vec<u32> },

    #[error("Exon order must be strictly ascending: {0:?}")]
    UnsortedExons(Vec<u32>),

    #[error("Exon {exon} ends ({end}) before it starts ({start})")]
    InvalidCoordinates { exon: u32, start: u64, end: u64 },

    #[error("Exon {exon} ({start}..{end}) lies outside the genomic sequence of length {length}")]
    ExonOutOfBounds {
        exon: u32,
        start: u64,
        end: u64,
        length: usize,
    },

    #[error("Flanking sequence of exon {exon} reaches past the genomic sequence (padding {padding})")]
    FlankOutOfBounds { exon: u32, padding: usize },

    #[error("CDS offset {offset} lies outside the transcript length {length}")]
    CdsOffsetOutOfRange { offset: i64, length: usize },

    #[error("Padding {padding} exceeds the maximum of {max}")]
    PaddingTooLarge { padding: usize, max: usize },
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// One exon of a transcript, with its flanked and possibly decorated sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExonRecord {
    /// First genomic base (1-based, inclusive)
    pub genomic_start: u64,
    /// Last genomic base (1-based, inclusive)
    pub genomic_end: u64,
    /// Upper-case exon, lower-case flanks, optional highlight markup
    pub sequence: String,
}

impl ExonRecord {
    pub fn new(genomic_start: u64, genomic_end: u64, sequence: impl Into<String>) -> Self {
        Self {
            genomic_start,
            genomic_end,
            sequence: sequence.into(),
        }
    }

    /// Number of genomic bases covered by the exon.
    pub fn length(&self) -> u64 {
        self.genomic_end.saturating_sub(self.genomic_start) + 1
    }

    pub fn span(&self) -> ExonSpan {
        ExonSpan::new(self.genomic_start, self.genomic_end)
    }
}

/// A transcript ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptModel {
    pub gene_name: String,
    pub reference_id: String,
    /// Intronic flank requested on each side of an exon
    pub padding: usize,
    /// Exon numbers in transcript order
    pub exon_order: Vec<u32>,
    pub exons: BTreeMap<u32, ExonRecord>,
    /// Exonic bases preceding the first coding base
    pub cds_offset: i64,
    /// Amino acid letters, ending in `*`
    pub protein_sequence: String,
    pub nm_id: String,
    pub np_id: String,
}

impl TranscriptModel {
    /// Remainder of the padding against the 5-base tick spacing.
    pub fn pad_offset(&self) -> usize {
        self.padding % 5
    }

    /// Exons in transcript order. Numbers without a record are skipped;
    /// [`TranscriptModel::validate`] reports them.
    pub fn exons_in_order(&self) -> impl Iterator<Item = (u32, &ExonRecord)> + '_ {
        self.exon_order
            .iter()
            .filter_map(|n| self.exons.get(n).map(|exon| (*n, exon)))
    }

    /// Checks the structural invariants the renderer relies on.
    pub fn validate(&self) -> ModelResult<()> {
        if self.exon_order.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ModelError::UnsortedExons(self.exon_order.clone()));
        }
        let records: Vec<u32> = self.exons.keys().copied().collect();
        if records != self.exon_order {
            return Err(ModelError::ExonOrderMismatch {
                order: self.exon_order.clone(),
                records,
            });
        }
        for (number, exon) in self.exons_in_order() {
            if exon.genomic_end < exon.genomic_start {
                return Err(ModelError::InvalidCoordinates {
                    exon: number,
                    start: exon.genomic_start,
                    end: exon.genomic_end,
                });
            }
        }
        Ok(())
    }
}

/// A parsed reference file: one gene, one or more transcripts.
#[derive(Debug, Clone)]
pub struct Reference {
    pub gene_name: String,
    pub reference_id: String,
    pub padding: usize,
    /// Format the reference was read from
    pub source: FileFormat,
    /// Provenance line for the parser that produced this reference
    pub parser_version: String,
    /// Transcripts keyed by their number within the file
    pub transcripts: Vec<(u32, TranscriptModel)>,
}

impl Reference {
    /// LRG transcript name such as `LRG_292t1`, for references read from LRG.
    pub fn lrg_label(&self, transcript: u32) -> Option<String> {
        match self.source {
            FileFormat::Lrg => Some(format!("{}t{transcript}", self.reference_id)),
            FileFormat::GenBank => None,
        }
    }
}

/// Exon coordinates on the genomic sequence (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExonSpan {
    pub start: u64,
    pub end: u64,
}

impl ExonSpan {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, position: u64) -> bool {
        (self.start..=self.end).contains(&position)
    }
}

/// True when the 3' flank of `exon` would run into `next`.
pub fn clashes_after(exon: &ExonSpan, next: &ExonSpan, padding: usize) -> bool {
    exon.end + 2 * padding as u64 > next.start
}

/// True when the 5' flank of `exon` would run into `previous`.
pub fn clashes_before(exon: &ExonSpan, previous: &ExonSpan, padding: usize) -> bool {
    exon.start < previous.end + 2 * padding as u64
}

/// Half of an intronic gap, rounded down to an even number of bases.
fn even_half(gap: u64) -> u64 {
    let half = gap / 2;
    half - half % 2
}

/// Builds `lower(5' flank) + UPPER(exon) + lower(3' flank)` for every span.
///
/// Flanks are `padding` bases long. With `trim_flanking`, the intron between
/// two exons closer than twice the padding is split between them: the first
/// exon's 3' flank takes the even half of the gap and the next exon's 5' flank
/// the rest, so no base is shown twice.
pub fn build_exon_sequences(
    genomic: &str,
    spans: &[ExonSpan],
    padding: usize,
    trim_flanking: bool,
) -> ModelResult<Vec<String>> {
    let length = genomic.len();
    let pad = padding as u64;
    let mut sequences = Vec::with_capacity(spans.len());

    for (i, span) in spans.iter().enumerate() {
        let exon = i as u32 + 1;
        if span.start == 0 || span.is_empty() || span.end > length as u64 {
            return Err(ModelError::ExonOutOfBounds {
                exon,
                start: span.start,
                end: span.end,
                length,
            });
        }

        let next = spans.get(i + 1);
        let previous = i.checked_sub(1).and_then(|p| spans.get(p));

        let flank3 = match next {
            Some(next) if trim_flanking && clashes_after(span, next, padding) => {
                even_half(next.start.saturating_sub(span.end + 1)).min(pad)
            }
            _ => pad,
        };
        let flank5 = match previous {
            Some(previous) if trim_flanking && clashes_before(span, previous, padding) => {
                let gap = span.start.saturating_sub(previous.end + 1);
                (gap - even_half(gap)).min(pad)
            }
            _ => pad,
        };

        // 0-based half-open exon bounds
        let start = (span.start - 1) as usize;
        let end = span.end as usize;
        let flank5 = flank5 as usize;
        let flank3 = flank3 as usize;
        if start < flank5 || end + flank3 > length {
            return Err(ModelError::FlankOutOfBounds { exon, padding });
        }

        let mut seq = String::with_capacity(flank5 + (end - start) + flank3);
        seq.push_str(&genomic[start - flank5..start].to_ascii_lowercase());
        seq.push_str(&genomic[start..end].to_ascii_uppercase());
        seq.push_str(&genomic[end..end + flank3].to_ascii_lowercase());
        sequences.push(seq);
    }

    Ok(sequences)
}

/// Number of exonic transcript bases before the genomic position `cds_start`.
pub fn cds_offset_for(spans: &[ExonSpan], cds_start: u64) -> Option<i64> {
    let mut total = 0u64;
    for span in spans {
        if span.contains(cds_start) {
            return Some((total + cds_start - span.start) as i64);
        }
        if cds_start > span.end {
            total += span.len();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(order: Vec<u32>, exons: Vec<(u32, ExonRecord)>) -> TranscriptModel {
        TranscriptModel {
            gene_name: "GENE".to_string(),
            reference_id: "NG_000001.1".to_string(),
            padding: 12,
            exon_order: order,
            exons: exons.into_iter().collect(),
            cds_offset: 0,
            protein_sequence: "M*".to_string(),
            nm_id: "NM_000001.1".to_string(),
            np_id: "NP_000001.1".to_string(),
        }
    }

    #[test]
    fn test_exon_length_is_inclusive() {
        assert_eq!(ExonRecord::new(10, 19, "").length(), 10);
        assert_eq!(ExonSpan::new(5, 5).len(), 1);
    }

    #[test]
    fn test_pad_offset() {
        let t = transcript(vec![], vec![]);
        assert_eq!(t.pad_offset(), 2);
    }

    #[test]
    fn test_validate_accepts_consistent_model() {
        let t = transcript(
            vec![1, 2],
            vec![(1, ExonRecord::new(1, 3, "ATG")), (2, ExonRecord::new(10, 12, "TAA"))],
        );
        assert!(t.validate().is_ok());
        let numbers: Vec<u32> = t.exons_in_order().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_validate_rejects_bad_models() {
        let unsorted = transcript(
            vec![2, 1],
            vec![(1, ExonRecord::new(1, 3, "ATG")), (2, ExonRecord::new(10, 12, "TAA"))],
        );
        assert!(matches!(unsorted.validate(), Err(ModelError::UnsortedExons(_))));

        let missing = transcript(vec![1, 2], vec![(1, ExonRecord::new(1, 3, "ATG"))]);
        assert!(matches!(
            missing.validate(),
            Err(ModelError::ExonOrderMismatch { .. })
        ));

        let reversed = transcript(vec![1], vec![(1, ExonRecord::new(9, 3, "ATG"))]);
        assert!(matches!(
            reversed.validate(),
            Err(ModelError::InvalidCoordinates { exon: 1, .. })
        ));
    }

    #[test]
    fn test_build_without_padding() {
        let genomic = "aaaCCCCttttGGGGaaa";
        let spans = [ExonSpan::new(4, 7), ExonSpan::new(12, 15)];
        let seqs = build_exon_sequences(genomic, &spans, 0, false).unwrap();
        assert_eq!(seqs, vec!["CCCC", "GGGG"]);
    }

    #[test]
    fn test_flanks_applied_once() {
        let genomic = "AAACCCCTTTTGGGGAAA";
        let spans = [ExonSpan::new(4, 7), ExonSpan::new(12, 15)];
        let seqs = build_exon_sequences(genomic, &spans, 3, false).unwrap();
        assert_eq!(seqs, vec!["aaaCCCCttt", "tttGGGGaaa"]);
    }

    #[test]
    fn test_trimmed_flanks_split_the_intron() {
        // Intron of 8 bases between the exons, padding 6 would overlap
        let genomic = "AAAAAAACCCCTTTTTTTTGGGGAAAAAAA";
        let spans = [ExonSpan::new(8, 11), ExonSpan::new(20, 23)];
        let seqs = build_exon_sequences(genomic, &spans, 6, true).unwrap();
        assert_eq!(seqs[0], "aaaaaaCCCCtttt");
        assert_eq!(seqs[1], "ttttGGGGaaaaaa");
    }

    #[test]
    fn test_flank_out_of_bounds() {
        let genomic = "AACCCCAA";
        let spans = [ExonSpan::new(3, 6)];
        assert_eq!(
            build_exon_sequences(genomic, &spans, 3, false),
            Err(ModelError::FlankOutOfBounds {
                exon: 1,
                padding: 3
            })
        );
        assert!(matches!(
            build_exon_sequences(genomic, &[ExonSpan::new(3, 20)], 0, false),
            Err(ModelError::ExonOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_clash_predicates() {
        let a = ExonSpan::new(100, 100);
        let b = ExonSpan::new(150, 180);
        assert!(clashes_after(&a, &b, 30));
        assert!(clashes_before(&b, &a, 30));
        assert!(!clashes_after(&a, &b, 20));
    }

    #[test]
    fn test_cds_offset_for() {
        let spans = [ExonSpan::new(11, 20), ExonSpan::new(41, 60)];
        assert_eq!(cds_offset_for(&spans, 11), Some(0));
        assert_eq!(cds_offset_for(&spans, 15), Some(4));
        assert_eq!(cds_offset_for(&spans, 45), Some(14));
        assert_eq!(cds_offset_for(&spans, 30), None);
    }

    #[test]
    fn test_lrg_label_only_for_lrg_sources() {
        let mut reference = Reference {
            gene_name: "GENE".to_string(),
            reference_id: "LRG_292".to_string(),
            padding: 0,
            source: FileFormat::Lrg,
            parser_version: String::new(),
            transcripts: Vec::new(),
        };
        assert_eq!(reference.lrg_label(2), Some("LRG_292t2".to_string()));
        reference.source = FileFormat::GenBank;
        assert_eq!(reference.lrg_label(2), None);
    }
}
