//! Shared-intron warnings printed under an exon summary.

use crate::model::{clashes_after, clashes_before, ExonRecord};

pub const SHARED_WITH_PREVIOUS: &str = "BE AWARE: Flanking intron is shared with the previous exon";
pub const SHARED_WITH_FOLLOWING: &str = "BE AWARE: Flanking intron is shared with the following exon";

/// Which flanks of an exon overlap a neighbour's flank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clash {
    pub before: bool,
    pub after: bool,
}

impl Clash {
    /// Compares an exon with its neighbours in transcript order.
    pub fn detect(
        previous: Option<&ExonRecord>,
        exon: &ExonRecord,
        next: Option<&ExonRecord>,
        padding: usize,
    ) -> Self {
        let span = exon.span();
        Self {
            before: previous.is_some_and(|p| clashes_before(&span, &p.span(), padding)),
            after: next.is_some_and(|n| clashes_after(&span, &n.span(), padding)),
        }
    }

    pub fn any(&self) -> bool {
        self.before || self.after
    }

    /// Warning lines, previous exon first.
    pub fn messages(&self) -> Vec<&'static str> {
        let mut lines = Vec::with_capacity(2);
        if self.before {
            lines.push(SHARED_WITH_PREVIOUS);
        }
        if self.after {
            lines.push(SHARED_WITH_FOLLOWING);
        }
        lines
    }
}
