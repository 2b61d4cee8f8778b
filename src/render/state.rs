//! Per-transcript track state and the base-by-base transition.
//!
//! [`TrackState::step`] is pure: it takes the current state and one base and
//! returns the cells to print plus the next state. Counters that must survive
//! exon boundaries (coding position, codon phase, amino acid index) live at the
//! top level; the intron tick counters in [`FlankTicks`] are replaced at every
//! exon start.

/// Immutable per-transcript inputs of the transition.
#[derive(Debug, Clone)]
pub struct TranscriptContext {
    /// Amino acid letters, stop included
    pub protein: Vec<char>,
    /// Coding bases covered by the protein (three per letter)
    pub coding_len: i64,
}

impl TranscriptContext {
    pub fn new(protein_sequence: &str) -> Self {
        let protein: Vec<char> = protein_sequence.chars().collect();
        let coding_len = 3 * protein.len() as i64;
        Self {
            protein,
            coding_len,
        }
    }
}

/// What one base contributes to each of the four tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cells {
    /// Base ruler output: empty while a number is still being written
    pub ruler: String,
    pub base: char,
    /// Amino acid letter, `' '` when blank
    pub amino: char,
    /// Amino acid ruler output, empty while a number is still being written
    pub amino_ruler: String,
    /// Transcript-wide exonic index of a codon whose letter must be verified
    pub codon_check: Option<usize>,
}

/// Intron tick counters for the exon being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlankTicks {
    /// An exonic base of this exon has been seen
    pub exon_seen: bool,
    /// 5' flank bases still printed blank before ticks start
    pub lead_blank: usize,
    /// Distance of the next 5' flank base to the exon boundary
    pub to_boundary: usize,
    /// 3' flank bases already printed
    pub past_boundary: usize,
}

impl FlankTicks {
    /// Counters for an exon whose sequence starts with `flank5` intronic bases.
    ///
    /// A full-length flank starts with `pad_offset` blank positions; a trimmed
    /// one with its own remainder against the 5-base spacing.
    pub fn new(flank5: usize, padding: usize, pad_offset: usize) -> Self {
        let lead_blank = if flank5 == padding {
            pad_offset
        } else {
            flank5 % 5
        };
        Self {
            exon_seen: false,
            lead_blank,
            to_boundary: flank5,
            past_boundary: 0,
        }
    }
}

/// Counters threaded through every base of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackState {
    /// Coding position of the next exonic base; negative in the 5' UTR, never 0
    pub cds_position: i64,
    /// Coding position 1 has been reached
    pub translating: bool,
    /// Position in the current codon, a letter is printed when it is 3
    pub codon_phase: u8,
    /// Index of the next amino acid letter
    pub amino_index: usize,
    /// The codon that produced the last letter already carries its number
    pub codon_numbered: bool,
    /// 3' positions counted after the stop codon
    pub post_stop: u64,
    /// Base ruler cells still covered by a number
    pub ruler_wait: usize,
    /// Amino ruler cells still covered by a number
    pub amino_wait: usize,
    /// Exonic bases consumed so far in the transcript
    pub exonic_bases: usize,
    /// Codon cross-check enabled; cleared once the stop is printed
    pub check_codons: bool,
    /// A highlight wrapper is open and must continue on the next line
    pub highlight_open: bool,
    pub flank: FlankTicks,
}

impl TrackState {
    /// Fresh state for a transcript with `cds_offset` exonic bases before the CDS.
    pub fn new(cds_offset: i64) -> Self {
        Self {
            cds_position: -cds_offset,
            translating: false,
            codon_phase: 3,
            amino_index: 0,
            codon_numbered: false,
            post_stop: 0,
            ruler_wait: 0,
            amino_wait: 0,
            exonic_bases: 0,
            check_codons: true,
            highlight_open: false,
            flank: FlankTicks::default(),
        }
    }

    /// State at the start of an exon.
    pub fn begin_exon(self, flank: FlankTicks) -> Self {
        Self {
            flank,
            ruler_wait: 0,
            amino_wait: 0,
            ..self
        }
    }

    /// State after the line buffers were flushed: numbers never continue
    /// across lines.
    pub fn line_wrapped(self) -> Self {
        Self {
            ruler_wait: 0,
            amino_wait: 0,
            ..self
        }
    }

    pub fn with_highlight(self, highlight_open: bool) -> Self {
        Self {
            highlight_open,
            ..self
        }
    }

    /// Advances the state by one base.
    pub fn step(self, base: char, ctx: &TranscriptContext) -> (Cells, TrackState) {
        let mut next = self;
        let exonic = base.is_ascii_uppercase();

        if exonic {
            next.flank.exon_seen = true;
            if next.cds_position == 0 {
                next.cds_position = 1;
                next.translating = true;
            }
        }

        let amino = next.amino_letter(exonic, ctx);
        let codon_check = if amino != ' ' && next.check_codons {
            if amino == '*' {
                next.check_codons = false;
                None
            } else {
                Some(next.exonic_bases)
            }
        } else {
            None
        };
        let amino_ruler = next.amino_ruler();
        let ruler = if exonic {
            next.exonic_ruler(ctx)
        } else {
            next.intronic_ruler()
        };
        if exonic {
            next.exonic_bases += 1;
        }

        let cells = Cells {
            ruler,
            base,
            amino,
            amino_ruler,
            codon_check,
        };
        (cells, next)
    }

    fn amino_letter(&mut self, exonic: bool, ctx: &TranscriptContext) -> char {
        if !(exonic && self.translating && self.amino_index < ctx.protein.len()) {
            return ' ';
        }
        if self.codon_phase == 3 {
            let letter = ctx.protein[self.amino_index];
            self.amino_index += 1;
            self.codon_phase = 1;
            self.codon_numbered = false;
            letter
        } else {
            self.codon_phase += 1;
            ' '
        }
    }

    fn amino_ruler(&mut self) -> String {
        if self.amino_wait > 0 {
            self.amino_wait -= 1;
            String::new()
        } else if self.amino_index % 10 == 1 && !self.codon_numbered {
            let label = format!("|{}", self.amino_index);
            self.amino_wait = label.len() - 1;
            self.codon_numbered = true;
            label
        } else {
            " ".to_string()
        }
    }

    fn exonic_ruler(&mut self, ctx: &TranscriptContext) -> String {
        if self.cds_position <= ctx.coding_len {
            let position = self.cds_position;
            self.cds_position += 1;
            self.numbered_cell(position.rem_euclid(10) == 1, || format!("|{position}"))
        } else {
            self.post_stop += 1;
            let position = self.post_stop;
            self.numbered_cell(position % 10 == 1, || format!("|*{position}"))
        }
    }

    /// Prints `label` when due and no earlier number still covers this cell.
    fn numbered_cell(&mut self, due: bool, label: impl FnOnce() -> String) -> String {
        if self.ruler_wait > 0 {
            self.ruler_wait -= 1;
            String::new()
        } else if due {
            let label = label();
            self.ruler_wait = label.len() - 1;
            label
        } else {
            " ".to_string()
        }
    }

    fn intronic_ruler(&mut self) -> String {
        let flank = &mut self.flank;
        if !flank.exon_seen {
            let tick = if flank.lead_blank > 0 {
                flank.lead_blank -= 1;
                ' '
            } else if flank.to_boundary % 5 == 0 {
                '.'
            } else {
                ' '
            };
            flank.to_boundary = flank.to_boundary.saturating_sub(1);
            return tick.to_string();
        }

        if self.ruler_wait > 0 {
            self.ruler_wait -= 1;
            flank.past_boundary += 1;
            return String::new();
        }
        let tick = if flank.past_boundary % 5 == 4 { '.' } else { ' ' };
        flank.past_boundary += 1;
        tick.to_string()
    }
}
