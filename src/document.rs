//! Turns rendered lines into a LaTeX document or a plain text listing.
//!
//! Page breaks become `\newpage` in LaTeX. Plain listings have no pages, so
//! each break (one after every exon) becomes a single blank line instead.

use crate::markup::{Annotation, COMMENT_DIRECTIVE, HIGHLIGHT_OPEN};
use crate::model::TranscriptModel;
use crate::render::{LineKind, Rendered};

/// Output flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Plain text, markup dropped
    Plain,
    /// LaTeX document, markup kept as highlight commands
    #[default]
    Latex,
}

const LATEX_PAGE_BREAK: [&str; 3] = ["\\end{alltt}", "\\newpage", "\\begin{alltt}"];
const PLAIN_PAGE_BREAK: [&str; 1] = [""];

impl OutputMode {
    pub fn from_document_flag(write_as_document: bool) -> Self {
        if write_as_document {
            OutputMode::Latex
        } else {
            OutputMode::Plain
        }
    }

    /// File extension of the written output.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Plain => "txt",
            OutputMode::Latex => "tex",
        }
    }

    /// Text opening a highlighted run in the DNA track.
    pub fn open_highlight(&self, annotation: &Annotation<'_>) -> String {
        match self {
            OutputMode::Plain => String::new(),
            OutputMode::Latex => match annotation.options {
                Some(opts) => format!("{COMMENT_DIRECTIVE}[{opts}]{{{}}}{HIGHLIGHT_OPEN}", annotation.text),
                None => format!("{COMMENT_DIRECTIVE}{{{}}}{HIGHLIGHT_OPEN}", annotation.text),
            },
        }
    }

    /// Text continuing a highlighted run on a new line.
    pub fn reopen_highlight(&self) -> &'static str {
        match self {
            OutputMode::Plain => "",
            OutputMode::Latex => HIGHLIGHT_OPEN,
        }
    }

    pub fn close_highlight(&self) -> &'static str {
        match self {
            OutputMode::Plain => "",
            OutputMode::Latex => "}",
        }
    }

    /// Lines replacing a page break marker.
    pub fn page_break(&self) -> &'static [&'static str] {
        match self {
            OutputMode::Plain => &PLAIN_PAGE_BREAK,
            OutputMode::Latex => &LATEX_PAGE_BREAK,
        }
    }
}

/// An assembled output, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Primary transcript identifier
    pub identifier: String,
    pub mode: OutputMode,
    pub lines: Vec<String>,
}

/// Escapes characters LaTeX treats specially in identifiers.
pub fn escape_latex(text: &str) -> String {
    text.replace('_', "\\_")
}

fn header(model: &TranscriptModel, lrg_label: Option<&str>, author: &str) -> Vec<String> {
    let gene = escape_latex(&model.gene_name);
    let nm = escape_latex(&model.nm_id);
    vec![
        "\\documentclass{article}".to_string(),
        "\\usepackage{color, soul}".to_string(),
        "\\usepackage{alltt}".to_string(),
        "\\usepackage{pdfcomment}".to_string(),
        format!("\\hypersetup{{pdfauthor={{{}}},", escape_latex(author)),
        format!("pdftitle={{Reference sequence for gene: {gene} ({nm})}}}}"),
        "\\begin{document}".to_string(),
        "\\begin{center}".to_string(),
        "\\begin{large}".to_string(),
        format!(
            "Gene: {gene} - Sequence: {}\\\\",
            escape_latex(&model.reference_id)
        ),
        format!("Transcript: {nm} - Protein: {}", escape_latex(&model.np_id)),
        match lrg_label {
            Some(label) => format!("LRG: {} - Date : \\today", escape_latex(label)),
            None => "Date : \\today".to_string(),
        },
        "\\end{large}".to_string(),
        "\\end{center}".to_string(),
        "$1^{st}$ line: Base numbering. Full stops for intronic +/- 5, 10, 15...\\\\".to_string(),
        "$2^{nd}$ line: Base sequence. lower case Introns, upper case Exons\\\\".to_string(),
        "$3^{rd}$ line: Amino acid sequence. Printed on FIRST base of codon\\\\".to_string(),
        "$4^{th}$ line: Amino acid numbering. Numbered on $1^{st}$ and increments of 10\\\\".to_string(),
        "\\begin{alltt}".to_string(),
    ]
}

/// Wraps a rendered transcript into its final line list.
///
/// `lrg_label` names the LRG transcript the model was read from; it goes into
/// the title block and replaces the transcript accession as the document
/// identifier. `provenance` lines (parser and tool versions) are appended
/// after the body.
pub fn assemble(
    rendered: &Rendered,
    model: &TranscriptModel,
    lrg_label: Option<&str>,
    mode: OutputMode,
    author: &str,
    provenance: &[String],
) -> Document {
    let mut lines = match mode {
        OutputMode::Latex => header(model, lrg_label, author),
        OutputMode::Plain => Vec::new(),
    };

    for line in &rendered.lines {
        match line.kind {
            LineKind::PageBreak => lines.extend(mode.page_break().iter().map(|s| s.to_string())),
            _ => lines.push(line.text.clone()),
        }
    }

    lines.extend(provenance.iter().cloned());
    if mode == OutputMode::Latex {
        lines.push("\\end{alltt}".to_string());
        lines.push("\\end{document}".to_string());
    }

    Document {
        identifier: lrg_label.unwrap_or(&rendered.identifier).to_string(),
        mode,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExonRecord;
    use crate::render::Line;
    use std::collections::BTreeMap;

    fn toy_model() -> TranscriptModel {
        let mut exons = BTreeMap::new();
        exons.insert(1, ExonRecord::new(1, 3, "ATG"));
        TranscriptModel {
            gene_name: "MY_GENE".into(),
            reference_id: "NG_000001.1".into(),
            padding: 0,
            exon_order: vec![1],
            exons,
            cds_offset: 0,
            protein_sequence: "M".into(),
            nm_id: "NM_000001.1".into(),
            np_id: "NP_000001.1".into(),
        }
    }

    fn toy_rendered() -> Rendered {
        Rendered {
            identifier: "NM_000001.1".into(),
            lines: vec![
                Line::new(LineKind::ExonSummary, "Exon 1 | Start: 1 | End: 3 | Length: 3"),
                Line::blank(),
                Line::new(LineKind::Sequence, "ATG"),
                Line::page_break(),
            ],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_escape_latex() {
        assert_eq!(escape_latex("NM_000001.1"), "NM\\_000001.1");
        assert_eq!(escape_latex("BRCA1"), "BRCA1");
    }

    #[test]
    fn test_latex_document() {
        let provenance = vec!["GBK Parser: Version: 0.1.0".to_string()];
        let doc = assemble(&toy_rendered(), &toy_model(), None, OutputMode::Latex, "lab", &provenance);
        assert_eq!(doc.identifier, "NM_000001.1");
        assert_eq!(doc.lines.first().unwrap(), "\\documentclass{article}");
        assert!(doc.lines.contains(&"Gene: MY\\_GENE - Sequence: NG\\_000001.1\\\\".to_string()));
        assert!(doc.lines.contains(&"Transcript: NM\\_000001.1 - Protein: NP\\_000001.1".to_string()));
        assert!(doc.lines.contains(&"\\hypersetup{pdfauthor={lab},".to_string()));
        assert!(doc.lines.contains(&"Date : \\today".to_string()));

        let tail: Vec<&str> = doc.lines.iter().rev().take(6).rev().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "\\end{alltt}",
                "\\newpage",
                "\\begin{alltt}",
                "GBK Parser: Version: 0.1.0",
                "\\end{alltt}",
                "\\end{document}"
            ]
        );
    }

    #[test]
    fn test_plain_listing() {
        let doc = assemble(&toy_rendered(), &toy_model(), None, OutputMode::Plain, "lab", &[]);
        assert_eq!(
            doc.lines,
            vec!["Exon 1 | Start: 1 | End: 3 | Length: 3", "", "ATG", ""]
        );
        assert_eq!(doc.mode.extension(), "txt");
    }

    #[test]
    fn test_lrg_title_and_identifier() {
        let doc = assemble(
            &toy_rendered(),
            &toy_model(),
            Some("LRG_292t1"),
            OutputMode::Latex,
            "lab",
            &[],
        );
        assert_eq!(doc.identifier, "LRG_292t1");
        assert!(doc.lines.contains(&"LRG: LRG\\_292t1 - Date : \\today".to_string()));
        assert!(!doc.lines.contains(&"Date : \\today".to_string()));
    }

    #[test]
    fn test_highlight_texts() {
        let annotation = Annotation {
            options: Some("date"),
            text: "Primer 1F",
        };
        assert_eq!(
            OutputMode::Latex.open_highlight(&annotation),
            "\\pdfcomment[date]{Primer 1F}\\hl{"
        );
        assert_eq!(OutputMode::Plain.open_highlight(&annotation), "");
        assert_eq!(OutputMode::Latex.reopen_highlight(), "\\hl{");
        assert_eq!(OutputMode::Latex.close_highlight(), "}");
    }
}
