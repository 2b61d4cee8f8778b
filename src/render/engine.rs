//! Drives [`TrackState`] over the tokenized exons and collects lines.

use std::mem;

use tracing::{debug, warn};

use super::clash::Clash;
use super::pagination::Pager;
use super::state::{Cells, FlankTicks, TrackState, TranscriptContext};
use super::{
    CodonMismatch, Line, LineKind, RenderError, RenderOptions, RenderResult, Rendered, LINE_WIDTH,
};
use crate::genetic_code::{GeneticCode, GeneticCodes};
use crate::markup::{Token, Tokenizer};
use crate::model::{ExonRecord, ModelError, TranscriptModel};

/// An exon scanned up front so markup errors surface before any output.
struct ExonTokens<'m> {
    number: u32,
    record: &'m ExonRecord,
    tokens: Vec<Token<'m>>,
    /// Intronic bases before the first exonic base
    flank5: usize,
}

impl<'m> ExonTokens<'m> {
    fn scan(number: u32, record: &'m ExonRecord) -> RenderResult<Self> {
        let tokens = Tokenizer::new(&record.sequence)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| RenderError::Markup {
                exon: number,
                source,
            })?;
        let mut exon = Self {
            number,
            record,
            tokens,
            flank5: 0,
        };
        exon.flank5 = exon.bases().take_while(|c| !c.is_ascii_uppercase()).count();
        Ok(exon)
    }

    fn bases(&self) -> impl Iterator<Item = char> + '_ {
        self.tokens.iter().filter_map(|token| match token {
            Token::Base(c) => Some(*c),
            _ => None,
        })
    }
}

/// Line buffers of the block being filled.
#[derive(Debug, Default)]
struct Tracks {
    ruler: String,
    dna: String,
    amino: String,
    amino_ruler: String,
    bases: usize,
}

impl Tracks {
    fn push(&mut self, cells: &Cells) {
        self.ruler.push_str(&cells.ruler);
        self.dna.push(cells.base);
        self.amino.push(cells.amino);
        self.amino_ruler.push_str(&cells.amino_ruler);
        self.bases += 1;
    }

    fn has_amino(&self) -> bool {
        !self.amino.trim().is_empty()
    }

    fn has_amino_ruler(&self) -> bool {
        !self.amino_ruler.trim().is_empty()
    }
}

struct Layout<'a> {
    options: &'a RenderOptions,
    code: &'static GeneticCode,
    ctx: TranscriptContext,
    /// Exonic bases of the whole transcript, for codon look-ahead
    coding_bases: Vec<char>,
    state: TrackState,
    pager: Pager,
    tracks: Tracks,
    lines: Vec<Line>,
    pending: Vec<CodonMismatch>,
    warnings: Vec<CodonMismatch>,
}

impl<'a> Layout<'a> {
    fn new(
        model: &TranscriptModel,
        options: &'a RenderOptions,
        code: &'static GeneticCode,
        coding_bases: Vec<char>,
    ) -> Self {
        Self {
            options,
            code,
            ctx: TranscriptContext::new(&model.protein_sequence),
            coding_bases,
            state: TrackState::new(model.cds_offset),
            pager: Pager::new(),
            tracks: Tracks::default(),
            lines: Vec::new(),
            pending: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn exon(&mut self, exon: &ExonTokens<'_>, clash: Clash, model: &TranscriptModel) -> RenderResult<()> {
        let record = exon.record;
        self.lines.push(Line::new(
            LineKind::ExonSummary,
            format!(
                "Exon {} | Start: {} | End: {} | Length: {}",
                exon.number,
                record.genomic_start,
                record.genomic_end,
                record.length()
            ),
        ));
        if self.options.print_clashes {
            for message in clash.messages() {
                self.lines.push(Line::new(LineKind::Clash, message));
            }
        }
        self.lines.push(Line::blank());

        let flank = FlankTicks::new(exon.flank5, model.padding, model.pad_offset());
        self.state = self.state.begin_exon(flank);

        for token in &exon.tokens {
            match token {
                Token::Base(base) => self.base(exon.number, *base)?,
                Token::MarkupOpen(annotation) => {
                    // A run starting on a full line belongs to the next one
                    if self.tracks.bases == LINE_WIDTH {
                        self.wrap();
                    }
                    let open = self.options.mode.open_highlight(annotation);
                    self.tracks.dna.push_str(&open);
                    self.state = self.state.with_highlight(true);
                }
                Token::MarkupClose => {
                    self.tracks.dna.push_str(self.options.mode.close_highlight());
                    self.state = self.state.with_highlight(false);
                }
            }
        }
        self.finish_exon();
        Ok(())
    }

    fn base(&mut self, exon: u32, base: char) -> RenderResult<()> {
        if self.tracks.bases == LINE_WIDTH {
            self.wrap();
        }
        let (cells, next) = self.state.step(base, &self.ctx);
        self.state = next;
        self.tracks.push(&cells);
        if let Some(index) = cells.codon_check {
            self.check_codon(exon, index, cells.amino)?;
        }
        Ok(())
    }

    fn check_codon(&mut self, exon: u32, index: usize, printed: char) -> RenderResult<()> {
        let amino_number = self.state.amino_index;
        let codon: String = self
            .coding_bases
            .get(index..index + 3)
            .ok_or(RenderError::IndexOutOfRange { exon, amino_number })?
            .iter()
            .collect();
        let expected = self.code.translate_codon(&codon);
        if expected != printed {
            let mismatch = CodonMismatch {
                exon,
                amino_number,
                codon,
                printed,
                expected,
            };
            warn!("{mismatch}");
            self.pending.push(mismatch);
        }
        Ok(())
    }

    /// Flushes a full block and starts the next line.
    fn wrap(&mut self) {
        if self
            .pager
            .break_before_block(self.tracks.has_amino(), self.tracks.has_amino_ruler())
        {
            self.lines.push(Line::page_break());
        }
        let highlight_open = self.state.highlight_open;
        if highlight_open {
            self.tracks.dna.push_str(self.options.mode.close_highlight());
        }
        let emitted = self.emit_tracks();
        self.lines.push(Line::blank());
        self.pager.charge(emitted + 1);
        self.flush_warnings();

        if highlight_open {
            self.tracks.dna.push_str(self.options.mode.reopen_highlight());
        }
        self.state = self.state.line_wrapped();
    }

    fn finish_exon(&mut self) {
        if !self.tracks.dna.is_empty() {
            if self.pager.break_before_exon_tail() {
                self.lines.push(Line::page_break());
            }
            self.emit_tracks();
        }
        self.flush_warnings();
        self.lines.push(Line::page_break());
        self.pager.exon_finished();
    }

    /// Moves the buffered tracks into the output, skipping blank amino
    /// tracks. Returns the number of lines written.
    fn emit_tracks(&mut self) -> usize {
        let has_amino = self.tracks.has_amino();
        let has_amino_ruler = self.tracks.has_amino_ruler();
        let block = mem::take(&mut self.tracks);
        let before = self.lines.len();

        if !block.ruler.is_empty() {
            self.lines.push(Line::new(LineKind::BaseRuler, block.ruler));
        }
        self.lines.push(Line::new(LineKind::Sequence, block.dna));
        if has_amino {
            self.lines.push(Line::new(LineKind::AminoAcids, block.amino));
        }
        if has_amino_ruler {
            self.lines.push(Line::new(LineKind::AminoRuler, block.amino_ruler));
        }
        self.lines.len() - before
    }

    fn flush_warnings(&mut self) {
        for mismatch in self.pending.drain(..) {
            self.lines.push(Line::new(LineKind::Warning, mismatch.to_string()));
            self.pager.charge(1);
            self.warnings.push(mismatch);
        }
    }

    fn finish(self, identifier: String) -> Rendered {
        Rendered {
            identifier,
            lines: self.lines,
            warnings: self.warnings,
        }
    }
}

/// Lays out every exon of a transcript.
///
/// Fails before producing any line when the model is inconsistent or an
/// exon carries malformed markup. A codon whose translation disagrees with
/// the printed letter is not fatal: it is logged and reported in
/// [`Rendered::warnings`] and as a [`LineKind::Warning`] line after the block.
pub fn render_transcript(model: &TranscriptModel, options: &RenderOptions) -> RenderResult<Rendered> {
    model.validate()?;
    let code = GeneticCodes::get_all()
        .get(options.genetic_code)
        .ok_or(RenderError::UnknownGeneticCode(options.genetic_code))?;

    let exons = model
        .exons_in_order()
        .map(|(number, record)| ExonTokens::scan(number, record))
        .collect::<RenderResult<Vec<_>>>()?;

    let coding_bases: Vec<char> = exons
        .iter()
        .flat_map(|exon| exon.bases())
        .filter(char::is_ascii_uppercase)
        .collect();
    if model.cds_offset < 0 || model.cds_offset as usize > coding_bases.len() {
        return Err(ModelError::CdsOffsetOutOfRange {
            offset: model.cds_offset,
            length: coding_bases.len(),
        }
        .into());
    }
    debug!(
        transcript = %model.nm_id,
        exons = exons.len(),
        coding_bases = coding_bases.len(),
        "rendering transcript"
    );

    let mut layout = Layout::new(model, options, code, coding_bases);
    for (i, exon) in exons.iter().enumerate() {
        let previous = i.checked_sub(1).map(|p| exons[p].record);
        let next = exons.get(i + 1).map(|e| e.record);
        let clash = Clash::detect(previous, exon.record, next, model.padding);
        if clash.any() && !options.print_clashes {
            debug!(exon = exon.number, "shared flanking intron not printed");
        }
        layout.exon(exon, clash, model)?;
    }
    Ok(layout.finish(model.nm_id.clone()))
}
