//! GenBank flat-file parser.
//!
//! Reads the parts of a RefSeqGene record needed to lay out a transcript:
//!
//! ```text
//! LOCUS       NG_999001              160 bp    DNA     linear   PRI 01-JAN-2020
//! VERSION     NG_999001.1
//! FEATURES             Location/Qualifiers
//!      mRNA            join(21..50,81..110,121..135)
//!                      /gene="TOY1"
//!                      /transcript_id="NM_999001.2"
//!      CDS             join(26..50,81..110,121..125)
//!                      /protein_id="NP_999001.1"
//!                      /translation="MMFPCDVENWCTHCDQQDI"
//! ORIGIN
//!         1 cgaaacttgt tggcccagtg tgaatatgat gttcccttgt gatgttgaga gcatacgcct
//! //
//! ```
//!
//! mRNA and CDS features are paired by order, one transcript per pair.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use super::{FileFormat, ParseOptions};
use crate::genetic_code::standard;
use crate::model::{
    build_exon_sequences, cds_offset_for, ExonRecord, ExonSpan, ModelError, Reference,
    TranscriptModel,
};

/// Column where feature locations and qualifiers start.
const QUALIFIER_COLUMN: usize = 21;

/// Errors that can occur during GenBank parsing.
#[derive(Error, Debug)]
pub enum GenbankError {
    #[error("Empty GenBank file")]
    EmptyFile,

    #[error("Missing LOCUS line")]
    MissingLocus,

    #[error("Line {line}: invalid location '{text}'")]
    InvalidLocation { line: usize, text: String },

    #[error("Complement-strand location '{0}' is not supported")]
    UnsupportedLocation(String),

    #[error("Line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("No gene name found on exon, gene or mRNA features")]
    MissingGeneName,

    #[error("There are a different number of CDS ({cds}) and mRNA ({mrna}) features")]
    FeatureCountMismatch { cds: usize, mrna: usize },

    #[error("No mRNA/CDS feature pair found")]
    NoTranscripts,

    #[error("CDS of transcript {0} has no /translation")]
    MissingTranslation(u32),

    #[error("CDS of transcript {0} does not start inside one of its exons")]
    CdsOutsideTranscript(u32),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for GenBank operations.
pub type GenbankResult<T> = Result<T, GenbankError>;

/// A feature location: one or more spans on one strand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub spans: Vec<ExonSpan>,
    pub complement: bool,
    /// Location text as written in the file
    pub text: String,
}

/// One entry of the FEATURES table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub kind: String,
    pub location: Location,
    pub qualifiers: Vec<(String, String)>,
}

impl Feature {
    /// First value of a qualifier.
    pub fn qualifier(&self, key: &str) -> Option<&str> {
        self.qualifiers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The parsed content of one GenBank record.
#[derive(Debug, Clone, Default)]
pub struct GenbankRecord {
    /// LOCUS name
    pub name: String,
    /// Accession with version, from the VERSION line
    pub version: Option<String>,
    pub features: Vec<Feature>,
    /// Lower-case genomic sequence from ORIGIN
    pub sequence: String,
}

impl GenbankRecord {
    /// Identifier used for the reference sequence.
    pub fn id(&self) -> &str {
        self.version.as_deref().unwrap_or(&self.name)
    }

    pub fn features_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features.iter().filter(move |f| f.kind == kind)
    }
}

/// Parses a location such as `join(<21..50,81..110)` or `complement(5..9)`.
pub fn parse_location(text: &str) -> Option<Location> {
    let mut inner = text.trim();
    let mut complement = false;
    loop {
        if let Some(rest) = inner.strip_prefix("complement(") {
            complement = true;
            inner = rest.strip_suffix(')')?;
        } else if let Some(rest) = inner
            .strip_prefix("join(")
            .or_else(|| inner.strip_prefix("order("))
        {
            inner = rest.strip_suffix(')')?;
        } else {
            break;
        }
    }

    let spans = inner
        .split(',')
        .map(|part| {
            let part = part.trim();
            if part.starts_with("complement(") {
                complement = true;
            }
            let part = part
                .trim_start_matches("complement(")
                .trim_end_matches(')');
            let (start, end) = part.split_once("..").unwrap_or((part, part));
            let start = start.trim_start_matches('<').parse().ok()?;
            let end = end.trim_start_matches('>').parse().ok()?;
            Some(ExonSpan::new(start, end))
        })
        .collect::<Option<Vec<_>>>()?;

    if spans.is_empty() {
        return None;
    }
    Some(Location {
        spans,
        complement,
        text: text.trim().to_string(),
    })
}

/// Feature under construction while its continuation lines are read.
struct PendingFeature {
    kind: String,
    location: String,
    location_line: usize,
    qualifiers: Vec<(String, String)>,
    /// A quoted qualifier value is still open
    open_quote: bool,
}

impl PendingFeature {
    fn push_continuation(&mut self, text: &str) {
        if let Some((key, value)) = self.qualifiers.last_mut() {
            if !self.open_quote {
                return;
            }
            // Protein translations wrap without a separator
            if key != "translation" {
                value.push(' ');
            }
            let text = match text.strip_suffix('"') {
                Some(stripped) => {
                    self.open_quote = false;
                    stripped
                }
                None => text,
            };
            value.push_str(text);
        } else {
            self.location.push_str(text);
        }
    }

    fn push_qualifier(&mut self, text: &str) {
        let body = text.trim_start_matches('/');
        let (key, raw) = body.split_once('=').unwrap_or((body, ""));
        let value = match raw.strip_prefix('"') {
            Some(quoted) => match quoted.strip_suffix('"') {
                Some(closed) => closed,
                None => {
                    self.open_quote = true;
                    quoted
                }
            },
            None => raw,
        };
        self.qualifiers.push((key.to_string(), value.to_string()));
    }

    fn finish(self) -> GenbankResult<Feature> {
        let location =
            parse_location(&self.location).ok_or_else(|| GenbankError::InvalidLocation {
                line: self.location_line,
                text: self.location.clone(),
            })?;
        Ok(Feature {
            kind: self.kind,
            location,
            qualifiers: self.qualifiers,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Features,
    Origin,
}

/// Parses GenBank content from a string. Only the first record is read.
pub fn parse_genbank_str(content: &str) -> GenbankResult<GenbankRecord> {
    if content.trim().is_empty() {
        return Err(GenbankError::EmptyFile);
    }

    let mut record = GenbankRecord::default();
    let mut section = Section::Header;
    let mut pending: Option<PendingFeature> = None;
    let mut seen_locus = false;

    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("//") {
            break;
        }

        // Top-level keywords start in column 0
        if !line.starts_with(' ') {
            if let Some(feature) = pending.take() {
                record.features.push(feature.finish()?);
            }
            let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            section = match keyword {
                "LOCUS" => {
                    seen_locus = true;
                    record.name = rest.split_whitespace().next().unwrap_or_default().to_string();
                    Section::Header
                }
                "VERSION" => {
                    record.version = rest.split_whitespace().next().map(str::to_string);
                    Section::Header
                }
                "FEATURES" => Section::Features,
                "ORIGIN" => Section::Origin,
                _ => Section::Header,
            };
            continue;
        }

        match section {
            Section::Header => {}
            Section::Origin => {
                record
                    .sequence
                    .extend(line.chars().filter(char::is_ascii_alphabetic).map(|c| c.to_ascii_lowercase()));
            }
            Section::Features => {
                let indent = line.len() - line.trim_start().len();
                let text = line.trim();
                if indent < QUALIFIER_COLUMN {
                    if let Some(feature) = pending.take() {
                        record.features.push(feature.finish()?);
                    }
                    let (kind, location) =
                        text.split_once(char::is_whitespace)
                            .ok_or_else(|| GenbankError::ParseError {
                                line: line_number,
                                message: format!("feature '{text}' has no location"),
                            })?;
                    pending = Some(PendingFeature {
                        kind: kind.to_string(),
                        location: location.trim().to_string(),
                        location_line: line_number,
                        qualifiers: Vec::new(),
                        open_quote: false,
                    });
                } else {
                    let feature = pending.as_mut().ok_or_else(|| GenbankError::ParseError {
                        line: line_number,
                        message: "qualifier outside of a feature".to_string(),
                    })?;
                    if text.starts_with('/') && !feature.open_quote {
                        feature.push_qualifier(text);
                    } else {
                        feature.push_continuation(text);
                    }
                }
            }
        }
    }

    if let Some(feature) = pending.take() {
        record.features.push(feature.finish()?);
    }
    if !seen_locus {
        return Err(GenbankError::MissingLocus);
    }

    debug!(
        name = %record.name,
        features = record.features.len(),
        length = record.sequence.len(),
        "parsed GenBank record"
    );
    Ok(record)
}

/// Whether the CDS bases translate to `protein` with the standard code.
/// `None` when the CDS cannot be cut out of the sequence.
fn translation_matches(record: &GenbankRecord, cds: &Feature, protein: &str) -> Option<bool> {
    let bases: String = cds
        .location
        .spans
        .iter()
        .map(|span| {
            let start = (span.start as usize).checked_sub(1)?;
            record.sequence.get(start..span.end as usize)
        })
        .collect::<Option<String>>()?;
    let translated = standard().translate_sequence(&bases);
    Some(translated.trim_end_matches('*') == protein.trim_end_matches('*'))
}

/// Gene name from the first exon, gene or mRNA note, in that order.
fn find_gene_name(record: &GenbankRecord) -> Option<String> {
    record
        .features_of("exon")
        .chain(record.features_of("gene"))
        .find_map(|f| f.qualifier("gene"))
        .or_else(|| {
            record
                .features_of("mRNA")
                .find_map(|f| f.qualifier("note"))
                .and_then(|note| note.split_once('=').map(|(_, name)| name.trim()))
        })
        .map(str::to_string)
}

/// Builds the transcript models of a record.
pub fn reference_from_record(
    record: &GenbankRecord,
    options: ParseOptions,
) -> GenbankResult<Reference> {
    let gene_name = find_gene_name(record).ok_or(GenbankError::MissingGeneName)?;
    let belongs = |f: &&Feature| f.qualifier("gene").map_or(true, |g| g == gene_name);
    let mrnas: Vec<&Feature> = record.features_of("mRNA").filter(belongs).collect();
    let cdss: Vec<&Feature> = record.features_of("CDS").filter(belongs).collect();

    if mrnas.len() != cdss.len() {
        return Err(GenbankError::FeatureCountMismatch {
            cds: cdss.len(),
            mrna: mrnas.len(),
        });
    }
    if mrnas.is_empty() {
        return Err(GenbankError::NoTranscripts);
    }

    let mut transcripts = Vec::with_capacity(mrnas.len());
    for (number, (mrna, cds)) in (1u32..).zip(mrnas.iter().zip(&cdss)) {
        for location in [&mrna.location, &cds.location] {
            if location.complement {
                return Err(GenbankError::UnsupportedLocation(location.text.clone()));
            }
        }

        let spans = &mrna.location.spans;
        let translation = cds
            .qualifier("translation")
            .ok_or(GenbankError::MissingTranslation(number))?;
        let cds_start = cds.location.spans[0].start;
        let cds_offset =
            cds_offset_for(spans, cds_start).ok_or(GenbankError::CdsOutsideTranscript(number))?;

        let sequences = build_exon_sequences(
            &record.sequence,
            spans,
            options.padding,
            options.trim_flanking,
        )?;
        let exons: BTreeMap<u32, ExonRecord> = (1u32..)
            .zip(spans.iter().zip(sequences))
            .map(|(n, (span, seq))| (n, ExonRecord::new(span.start, span.end, seq)))
            .collect();

        let model = TranscriptModel {
            gene_name: gene_name.clone(),
            reference_id: record.id().to_string(),
            padding: options.padding,
            exon_order: exons.keys().copied().collect(),
            exons,
            cds_offset,
            protein_sequence: format!("{}*", translation.replace(' ', "")),
            nm_id: mrna
                .qualifier("transcript_id")
                .unwrap_or(&gene_name)
                .to_string(),
            np_id: cds.qualifier("protein_id").unwrap_or_default().to_string(),
        };
        if translation_matches(record, cds, &model.protein_sequence) == Some(false) {
            warn!(transcript = %model.nm_id, "CDS does not translate to the annotated protein");
        }
        debug!(transcript = number, nm = %model.nm_id, exons = model.exon_order.len(), "built transcript");
        transcripts.push((number, model));
    }

    Ok(Reference {
        gene_name,
        reference_id: record.id().to_string(),
        padding: options.padding,
        source: FileFormat::GenBank,
        parser_version: format!("GBK Parser: Version: {}", env!("CARGO_PKG_VERSION")),
        transcripts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY: &str = include_str!("../../tests/data/toy1.gb");

    fn options(padding: usize) -> ParseOptions {
        ParseOptions {
            padding,
            trim_flanking: true,
        }
    }

    #[test]
    fn test_translation_matches_annotation() {
        let record = parse_genbank_str(TOY).unwrap();
        let cds = record.features_of("CDS").next().unwrap();
        assert_eq!(translation_matches(&record, cds, "MMFPCDVENWCTHCDQQDI*"), Some(true));
        assert_eq!(translation_matches(&record, cds, "MMFPCDVENWCTHCDQQDW*"), Some(false));
    }

    #[test]
    fn test_parse_location() {
        let loc = parse_location("join(21..50,81..110,121..135)").unwrap();
        assert_eq!(loc.spans.len(), 3);
        assert_eq!(loc.spans[1], ExonSpan::new(81, 110));
        assert!(!loc.complement);

        let partial = parse_location("<1..>200").unwrap();
        assert_eq!(partial.spans, vec![ExonSpan::new(1, 200)]);

        let single = parse_location("42").unwrap();
        assert_eq!(single.spans, vec![ExonSpan::new(42, 42)]);

        assert!(parse_location("complement(5..9)").unwrap().complement);
        assert!(parse_location("join(1..2,complement(5..9))").unwrap().complement);
        assert!(parse_location("join(1..x)").is_none());
    }

    #[test]
    fn test_parse_toy_record() {
        let record = parse_genbank_str(TOY).unwrap();
        assert_eq!(record.name, "NG_999001");
        assert_eq!(record.id(), "NG_999001.1");
        assert_eq!(record.sequence.len(), 160);
        assert!(record.sequence.starts_with("cgaaacttgt"));

        let mrna = record.features_of("mRNA").next().unwrap();
        assert_eq!(mrna.location.spans.len(), 3, "location continues on next line");
        assert_eq!(mrna.qualifier("transcript_id"), Some("NM_999001.2"));
        assert_eq!(mrna.qualifier("product"), Some("toy protein 1"));

        let cds = record.features_of("CDS").next().unwrap();
        assert_eq!(cds.qualifier("translation"), Some("MMFPCDVENWCTHCDQQDI"));
        assert_eq!(cds.qualifier("codon_start"), Some("1"));
        assert_eq!(record.features_of("exon").count(), 3);
    }

    #[test]
    fn test_reference_from_toy_record() {
        let record = parse_genbank_str(TOY).unwrap();
        let reference = reference_from_record(&record, options(10)).unwrap();

        assert_eq!(reference.gene_name, "TOY1");
        assert_eq!(reference.transcripts.len(), 1);
        let (number, model) = &reference.transcripts[0];
        assert_eq!(*number, 1);
        assert_eq!(model.nm_id, "NM_999001.2");
        assert_eq!(model.np_id, "NP_999001.1");
        assert_eq!(model.protein_sequence, "MMFPCDVENWCTHCDQQDI*");
        assert_eq!(model.cds_offset, 5);
        assert_eq!(model.exon_order, vec![1, 2, 3]);

        let exon1 = &model.exons[&1];
        assert_eq!((exon1.genomic_start, exon1.genomic_end), (21, 50));
        assert_eq!(
            exon1.sequence,
            "tggcccagtgTGAATATGATGTTCCCTTGTGATGTTGAGAgcatacgcct"
        );
        // Exons 2 and 3 are 10 bases apart: the intron is split 4/6
        assert!(model.exons[&2].sequence.ends_with("ATAacag"));
        assert!(model.exons[&3].sequence.starts_with("aactcgTTTAA"));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_missing_locus_and_translation() {
        assert!(matches!(
            parse_genbank_str("FEATURES             Location/Qualifiers\n"),
            Err(GenbankError::MissingLocus)
        ));

        let no_translation = TOY.replace("/translation", "/note");
        let record = parse_genbank_str(&no_translation).unwrap();
        assert!(matches!(
            reference_from_record(&record, options(0)),
            Err(GenbankError::MissingTranslation(1))
        ));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let text = TOY.replace("     CDS  ", "     misc ");
        let record = parse_genbank_str(&text).unwrap();
        assert!(matches!(
            reference_from_record(&record, options(0)),
            Err(GenbankError::FeatureCountMismatch { cds: 0, mrna: 1 })
        ));
    }

    #[test]
    fn test_complement_rejected() {
        let text = TOY.replace("join(26..50,81..110,121..125)", "complement(26..125)");
        let record = parse_genbank_str(&text).unwrap();
        assert!(matches!(
            reference_from_record(&record, options(0)),
            Err(GenbankError::UnsupportedLocation(_))
        ));
    }

    #[test]
    fn test_padding_past_sequence_end() {
        let record = parse_genbank_str(TOY).unwrap();
        assert!(matches!(
            reference_from_record(&record, options(30)),
            Err(GenbankError::Model(ModelError::FlankOutOfBounds { exon: 1, .. }))
        ));
    }
}
