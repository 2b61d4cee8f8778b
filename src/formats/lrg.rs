//! LRG (Locus Reference Genomic) XML reader.
//!
//! Transcripts, exon coordinates, coding regions and protein sequences come
//! from the `fixed_annotation` block. The gene symbol and the RefSeq
//! NM/NP accessions come from the `updatable_annotation` block:
//!
//! ```text
//! <lrg schema_version="1.9">
//!   <fixed_annotation>
//!     <id>LRG_999</id>
//!     <sequence_source>NG_999001.1</sequence_source>
//!     <sequence>CGAAACTTGT...</sequence>
//!     <transcript name="t1">
//!       <coding_region>
//!         <coordinates coord_system="LRG_999" start="26" end="125"/>
//!         <translation name="p1"><sequence>MMFPCDVENW...</sequence></translation>
//!       </coding_region>
//!       <exon label="1">
//!         <coordinates coord_system="LRG_999" start="21" end="50"/>
//!         <coordinates coord_system="LRG_999t1" start="1" end="30"/>
//!       </exon>
//!     </transcript>
//!   </fixed_annotation>
//!   <updatable_annotation>
//!     <annotation_set type="lrg"><lrg_locus>TOY1</lrg_locus></annotation_set>
//!     <annotation_set type="ncbi">
//!       <features><gene>
//!         <transcript accession="NM_999001.2" fixed_id="t1">
//!           <protein_product accession="NP_999001.1" fixed_id="p1"/>
//!         </transcript>
//!       </gene></features>
//!     </annotation_set>
//!   </updatable_annotation>
//! </lrg>
//! ```
//!
//! Only coordinates in the LRG's own genomic system are used.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::{debug, info};

use super::{FileFormat, ParseOptions};
use crate::model::{
    build_exon_sequences, cds_offset_for, ExonRecord, ExonSpan, ModelError, Reference,
    TranscriptModel,
};

/// Schema version the reader was written against.
pub const SCHEMA_VERSION: &str = "1.9";

/// Errors that can occur during LRG parsing.
#[derive(Error, Debug)]
pub enum LrgError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Root element is <{0}>, expected <lrg>")]
    NotLrg(String),

    #[error("Missing <{0}> element")]
    MissingElement(&'static str),

    #[error("<{element}> has no '{attribute}' attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("Invalid {what}: '{value}'")]
    InvalidNumber { what: &'static str, value: String },

    #[error("Transcript {transcript} has two exons labelled {exon}")]
    DuplicateExon { transcript: u32, exon: u32 },

    #[error("Transcript {0} has no exons in the genomic coordinate system")]
    NoExons(u32),

    #[error("No transcripts in the fixed annotation")]
    NoTranscripts,

    #[error("Coding region of transcript {0} does not start inside one of its exons")]
    CdsOutsideTranscript(u32),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for LRG operations.
pub type LrgResult<T> = Result<T, LrgError>;

/// RefSeq accessions of one fixed transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Accessions {
    nm: Option<String>,
    np: Option<String>,
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &'static str) -> LrgResult<Node<'a, 'input>> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .ok_or(LrgError::MissingElement(tag))
}

fn children<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| n.has_tag_name(tag))
}

fn attribute<'a>(node: Node<'a, '_>, name: &'static str) -> LrgResult<&'a str> {
    node.attribute(name).ok_or_else(|| LrgError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        attribute: name,
    })
}

fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().map(str::trim).unwrap_or_default()
}

fn number<T: FromStr>(value: &str, what: &'static str) -> LrgResult<T> {
    value.trim().parse().map_err(|_| LrgError::InvalidNumber {
        what,
        value: value.to_string(),
    })
}

/// Number in a fixed id such as `t2` or `p2`.
fn fixed_number(id: &str) -> Option<u32> {
    id.get(1..)?.parse().ok()
}

/// Exon number from a label, ignoring a trailing `a`-`d` sub-exon letter.
pub fn exon_number(label: &str) -> Option<u32> {
    let label = label.trim();
    let digits = label.strip_suffix(&['a', 'b', 'c', 'd'][..]).unwrap_or(label);
    digits.parse().ok()
}

/// Span of an element in the given coordinate system.
fn genomic_span(node: Node<'_, '_>, system: &str) -> LrgResult<Option<ExonSpan>> {
    for coordinates in children(node, "coordinates") {
        if coordinates.attribute("coord_system") == Some(system) {
            let start = number(attribute(coordinates, "start")?, "start coordinate")?;
            let end = number(attribute(coordinates, "end")?, "end coordinate")?;
            return Ok(Some(ExonSpan::new(start, end)));
        }
    }
    Ok(None)
}

/// NM/NP accessions from the `ncbi` annotation set, keyed by transcript number.
fn ncbi_accessions(updatable: Node<'_, '_>) -> HashMap<u32, Accessions> {
    let mut accessions = HashMap::new();
    let transcripts = children(updatable, "annotation_set")
        .filter(|set| set.attribute("type") == Some("ncbi"))
        .flat_map(|set| children(set, "features"))
        .flat_map(|features| children(features, "gene"))
        .flat_map(|gene| children(gene, "transcript"));

    for transcript in transcripts {
        let Some(number) = transcript.attribute("fixed_id").and_then(fixed_number) else {
            debug!(accession = ?transcript.attribute("accession"), "skipping transcript without fixed id");
            continue;
        };
        let np = children(transcript, "protein_product")
            .find(|p| p.attribute("fixed_id").and_then(fixed_number) == Some(number))
            .and_then(|p| p.attribute("accession"))
            .map(str::to_string);
        accessions.insert(
            number,
            Accessions {
                nm: transcript.attribute("accession").map(str::to_string),
                np,
            },
        );
    }
    accessions
}

/// Exon numbers and genomic spans of one fixed transcript, in exon order.
fn transcript_exons(
    transcript: Node<'_, '_>,
    number: u32,
    system: &str,
) -> LrgResult<Vec<(u32, ExonSpan)>> {
    let mut exons = BTreeMap::new();
    for exon in children(transcript, "exon") {
        let label = attribute(exon, "label")?;
        let exon_no = exon_number(label).ok_or_else(|| LrgError::InvalidNumber {
            what: "exon label",
            value: label.to_string(),
        })?;
        let Some(span) = genomic_span(exon, system)? else {
            continue;
        };
        if exons.insert(exon_no, span).is_some() {
            return Err(LrgError::DuplicateExon {
                transcript: number,
                exon: exon_no,
            });
        }
    }
    if exons.is_empty() {
        return Err(LrgError::NoExons(number));
    }
    Ok(exons.into_iter().collect())
}

/// Parses LRG XML and builds one transcript model per fixed transcript.
pub fn parse_lrg_str(content: &str, options: ParseOptions) -> LrgResult<Reference> {
    let document = Document::parse(content)?;
    let root = document.root_element();
    if !root.has_tag_name("lrg") {
        return Err(LrgError::NotLrg(root.tag_name().name().to_string()));
    }
    match root.attribute("schema_version") {
        Some(SCHEMA_VERSION) => {}
        version => info!(?version, expected = SCHEMA_VERSION, "unexpected LRG schema version"),
    }

    let fixed = child(root, "fixed_annotation")?;
    let updatable = child(root, "updatable_annotation")?;
    let lrg_id = text(child(fixed, "id")?).to_string();
    let sequence_source = text(child(fixed, "sequence_source")?).to_string();
    let genomic: String = text(child(fixed, "sequence")?)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let gene_name = children(updatable, "annotation_set")
        .flat_map(|set| children(set, "lrg_locus"))
        .map(text)
        .find(|name| !name.is_empty())
        .ok_or(LrgError::MissingElement("lrg_locus"))?
        .to_string();
    let accessions = ncbi_accessions(updatable);

    let mut transcripts = Vec::new();
    for transcript in children(fixed, "transcript") {
        let name = attribute(transcript, "name")?;
        let number = fixed_number(name).ok_or_else(|| LrgError::InvalidNumber {
            what: "transcript name",
            value: name.to_string(),
        })?;

        let exons = transcript_exons(transcript, number, &lrg_id)?;
        let spans: Vec<ExonSpan> = exons.iter().map(|(_, span)| *span).collect();

        let coding_region = child(transcript, "coding_region")?;
        let cds_start = genomic_span(coding_region, &lrg_id)?
            .ok_or(LrgError::MissingElement("coordinates"))?
            .start;
        let cds_offset =
            cds_offset_for(&spans, cds_start).ok_or(LrgError::CdsOutsideTranscript(number))?;
        let translation = text(child(child(coding_region, "translation")?, "sequence")?);

        let sequences =
            build_exon_sequences(&genomic, &spans, options.padding, options.trim_flanking)?;
        let exons: BTreeMap<u32, ExonRecord> = exons
            .iter()
            .zip(sequences)
            .map(|((n, span), seq)| (*n, ExonRecord::new(span.start, span.end, seq)))
            .collect();

        let ids = accessions.get(&number).cloned().unwrap_or_default();
        let model = TranscriptModel {
            gene_name: gene_name.clone(),
            reference_id: sequence_source.clone(),
            padding: options.padding,
            exon_order: exons.keys().copied().collect(),
            exons,
            cds_offset,
            protein_sequence: format!("{}*", translation.replace(char::is_whitespace, "")),
            nm_id: ids.nm.unwrap_or_else(|| format!("{lrg_id}{name}")),
            np_id: ids.np.unwrap_or_default(),
        };
        debug!(transcript = number, nm = %model.nm_id, exons = model.exon_order.len(), "built transcript");
        transcripts.push((number, model));
    }

    if transcripts.is_empty() {
        return Err(LrgError::NoTranscripts);
    }
    transcripts.sort_by_key(|(number, _)| *number);

    Ok(Reference {
        gene_name,
        reference_id: lrg_id,
        padding: options.padding,
        source: FileFormat::Lrg,
        parser_version: format!("LRG Parser: Version: {}", env!("CARGO_PKG_VERSION")),
        transcripts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY: &str = include_str!("../../tests/data/LRG_999.xml");

    fn options(padding: usize) -> ParseOptions {
        ParseOptions {
            padding,
            trim_flanking: true,
        }
    }

    #[test]
    fn test_exon_number() {
        assert_eq!(exon_number("1"), Some(1));
        assert_eq!(exon_number("12b"), Some(12));
        assert_eq!(exon_number("3d"), Some(3));
        assert_eq!(exon_number("3e"), None);
        assert_eq!(exon_number("a"), None);
    }

    #[test]
    fn test_parse_toy_lrg() {
        let reference = parse_lrg_str(TOY, options(10)).unwrap();
        assert_eq!(reference.gene_name, "TOY1");
        assert_eq!(reference.reference_id, "LRG_999");
        assert_eq!(reference.source, FileFormat::Lrg);
        assert!(reference.parser_version.starts_with("LRG Parser: Version: "));
        assert_eq!(reference.transcripts.len(), 1);

        let (number, model) = &reference.transcripts[0];
        assert_eq!(*number, 1);
        assert_eq!(model.reference_id, "NG_999001.1");
        assert_eq!(model.nm_id, "NM_999001.2");
        assert_eq!(model.np_id, "NP_999001.1");
        assert_eq!(model.exon_order, vec![1, 2, 3]);
        assert_eq!(model.cds_offset, 5);
        assert_eq!(model.protein_sequence, "MMFPCDVENWCTHCDQQDI*");

        let exon3 = &model.exons[&3];
        assert_eq!((exon3.genomic_start, exon3.genomic_end), (121, 135));
        assert_eq!(exon3.sequence, "aactcgTTTAATTTTGACAGGtcacgcagag");
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_missing_ncbi_accessions_fall_back_to_lrg_name() {
        let without_ncbi = TOY.replace("type=\"ncbi\"", "type=\"ensembl\"");
        let reference = parse_lrg_str(&without_ncbi, options(0)).unwrap();
        let (_, model) = &reference.transcripts[0];
        assert_eq!(model.nm_id, "LRG_999t1");
        assert_eq!(model.np_id, "");
    }

    #[test]
    fn test_duplicate_exon_labels() {
        let duplicated = TOY.replace("label=\"2\"", "label=\"1b\"");
        assert!(matches!(
            parse_lrg_str(&duplicated, options(0)),
            Err(LrgError::DuplicateExon {
                transcript: 1,
                exon: 1
            })
        ));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(parse_lrg_str("<lrg>", options(0)), Err(LrgError::Xml(_))));
        assert!(matches!(
            parse_lrg_str("<gene/>", options(0)),
            Err(LrgError::NotLrg(name)) if name == "gene"
        ));
        assert!(matches!(
            parse_lrg_str("<lrg><updatable_annotation/></lrg>", options(0)),
            Err(LrgError::MissingElement("fixed_annotation"))
        ));

        let outside = TOY.replace("start=\"26\" end=\"125\"", "start=\"60\" end=\"125\"");
        assert!(matches!(
            parse_lrg_str(&outside, options(0)),
            Err(LrgError::CdsOutsideTranscript(1))
        ));
    }

    #[test]
    fn test_flank_past_sequence_end() {
        assert!(matches!(
            parse_lrg_str(TOY, options(30)),
            Err(LrgError::Model(ModelError::FlankOutOfBounds { .. }))
        ));
    }
}
