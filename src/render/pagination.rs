//! Page accounting for the LaTeX page geometry.

/// Lines already used on the first page by the title and legend.
pub const HEADER_LINES: usize = 10;
/// Past this many lines a full block is checked against the page limit.
pub const SOFT_LIMIT: usize = 41;
/// A block projected to reach this many lines goes to a new page.
pub const PAGE_LIMIT: usize = 45;
/// A partial block at exon end goes to a new page from this many lines.
pub const EXON_END_LIMIT: usize = 44;
/// Lines charged for an exon summary once an exon is finished.
pub const EXON_OVERHEAD: usize = 2;

/// Tracks how many lines the current page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    lines_on_page: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager {
    pub fn new() -> Self {
        Self {
            lines_on_page: HEADER_LINES,
        }
    }

    /// Whether a full block needs a page break first. Resets the page when it
    /// does.
    pub fn break_before_block(&mut self, has_amino: bool, has_amino_ruler: bool) -> bool {
        if self.lines_on_page < SOFT_LIMIT {
            return false;
        }
        let projected = self.lines_on_page + 2 + usize::from(has_amino) + usize::from(has_amino_ruler);
        if projected >= PAGE_LIMIT {
            self.lines_on_page = 0;
            true
        } else {
            false
        }
    }

    /// Whether the partial block closing an exon needs a page break first.
    pub fn break_before_exon_tail(&mut self) -> bool {
        if self.lines_on_page >= EXON_END_LIMIT {
            self.lines_on_page = 0;
            true
        } else {
            false
        }
    }

    pub fn charge(&mut self, lines: usize) {
        self.lines_on_page += lines;
    }

    pub fn exon_finished(&mut self) {
        self.lines_on_page = EXON_OVERHEAD;
    }
}
