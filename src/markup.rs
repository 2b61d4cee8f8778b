//! Highlight markup embedded in exon sequences.
//!
//! The primer pass decorates matched bases with a LaTeX comment directive and
//! a highlight wrapper:
//!
//! ```text
//! acgtAC\pdfcomment[date]{Primer 2F}\hl{GTTCAG}GATtgca
//! ```
//!
//! [`Tokenizer`] turns such a string into typed events. Only the bases inside
//! `\hl{...}` are reported as [`Token::Base`], so position and codon counters
//! advance exactly once per genomic base whatever the decoration.

use std::ops::Range;

use thiserror::Error;

/// Directive that opens every markup token.
pub const COMMENT_DIRECTIVE: &str = "\\pdfcomment";
/// Wrapper enclosing the highlighted bases.
pub const HIGHLIGHT_OPEN: &str = "\\hl{";
/// Closes the highlight wrapper.
pub const HIGHLIGHT_CLOSE: char = '}';

/// Errors raised while scanning markup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("Unknown markup directive at position {position}")]
    UnknownDirective { position: usize },

    #[error("Expected '{expected}' at position {position}")]
    Expected {
        expected: &'static str,
        position: usize,
    },

    #[error("Markup opened at position {position} is never closed")]
    Unterminated { position: usize },

    #[error("Nested markup at position {position}")]
    Nested { position: usize },

    #[error("Unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },
}

/// Result type for markup operations.
pub type MarkupResult<T> = Result<T, MarkupError>;

/// Display annotation carried by a markup token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotation<'a> {
    /// Directive options, e.g. `date` in `\pdfcomment[date]{...}`
    pub options: Option<&'a str>,
    /// Text shown for the annotation
    pub text: &'a str,
}

/// One event of a tokenized exon sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A genomic base, upper-case exonic or lower-case intronic
    Base(char),
    /// Start of a highlighted run
    MarkupOpen(Annotation<'a>),
    /// End of the highlighted run
    MarkupClose,
}

/// Lazy scanner over one raw exon sequence.
///
/// Cloning a tokenizer restarts nothing: the clone continues from the same
/// position. Create a new one with [`Tokenizer::new`] to scan again.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    /// Start of the currently open token, if inside `\hl{...}`
    open_at: Option<usize>,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            open_at: None,
            done: false,
        }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the scanner is inside a highlight wrapper.
    pub fn in_markup(&self) -> bool {
        self.open_at.is_some()
    }

    fn fail(&mut self, err: MarkupError) -> Option<MarkupResult<Token<'a>>> {
        self.done = true;
        Some(Err(err))
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Parses `\pdfcomment[opts]{text}\hl{` starting at the current escape.
    fn open_token(&mut self) -> MarkupResult<Token<'a>> {
        let start = self.pos;
        if !self.rest().starts_with(COMMENT_DIRECTIVE) {
            return Err(MarkupError::UnknownDirective { position: start });
        }
        self.pos += COMMENT_DIRECTIVE.len();

        let options = if self.rest().starts_with('[') {
            let close = self
                .rest()
                .find(']')
                .ok_or(MarkupError::Unterminated { position: start })?;
            let opts = &self.rest()[1..close];
            self.pos += close + 1;
            Some(opts)
        } else {
            None
        };

        if !self.rest().starts_with('{') {
            return Err(MarkupError::Expected {
                expected: "{",
                position: self.pos,
            });
        }
        let text_start = self.pos + 1;
        let text_end = balanced_group_end(self.src, text_start)
            .ok_or(MarkupError::Unterminated { position: start })?;
        let text = &self.src[text_start..text_end];
        self.pos = text_end + 1;

        if !self.rest().starts_with(HIGHLIGHT_OPEN) {
            return Err(MarkupError::Expected {
                expected: HIGHLIGHT_OPEN,
                position: self.pos,
            });
        }
        self.pos += HIGHLIGHT_OPEN.len();
        self.open_at = Some(start);

        Ok(Token::MarkupOpen(Annotation { options, text }))
    }
}

/// Finds the `}` closing a group whose content starts at `from`.
/// Backslash escapes and nested braces are skipped.
fn balanced_group_end(src: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = MarkupResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(c) = self.rest().chars().next() else {
            self.done = true;
            return self
                .open_at
                .map(|position| Err(MarkupError::Unterminated { position }));
        };
        let position = self.pos;

        if self.open_at.is_some() {
            return match c {
                HIGHLIGHT_CLOSE => {
                    self.pos += 1;
                    self.open_at = None;
                    Some(Ok(Token::MarkupClose))
                }
                '\\' => self.fail(MarkupError::Nested { position }),
                c if c.is_ascii_alphabetic() => {
                    self.pos += 1;
                    Some(Ok(Token::Base(c)))
                }
                found => self.fail(MarkupError::UnexpectedChar { found, position }),
            };
        }

        match c {
            '\\' => match self.open_token() {
                Ok(token) => Some(Ok(token)),
                Err(e) => self.fail(e),
            },
            c if c.is_ascii_alphabetic() => {
                self.pos += 1;
                Some(Ok(Token::Base(c)))
            }
            found => self.fail(MarkupError::UnexpectedChar { found, position }),
        }
    }
}

/// Writes a markup token around `bases`.
pub fn highlight(options: Option<&str>, text: &str, bases: &str) -> String {
    match options {
        Some(opts) => format!("{COMMENT_DIRECTIVE}[{opts}]{{{text}}}{HIGHLIGHT_OPEN}{bases}{HIGHLIGHT_CLOSE}"),
        None => format!("{COMMENT_DIRECTIVE}{{{text}}}{HIGHLIGHT_OPEN}{bases}{HIGHLIGHT_CLOSE}"),
    }
}

/// Returns only the bases of a decorated sequence.
pub fn strip_markup(sequence: &str) -> MarkupResult<String> {
    let mut bases = String::with_capacity(sequence.len());
    for token in Tokenizer::new(sequence) {
        if let Token::Base(c) = token? {
            bases.push(c);
        }
    }
    Ok(bases)
}

/// Byte ranges of the undecorated base runs, i.e. the bases outside any
/// highlight wrapper.
pub fn plain_runs(sequence: &str) -> MarkupResult<Vec<Range<usize>>> {
    let mut runs: Vec<Range<usize>> = Vec::new();
    let mut tokens = Tokenizer::new(sequence);
    loop {
        let inside = tokens.in_markup();
        let start = tokens.position();
        let Some(token) = tokens.next() else {
            break;
        };
        if let Token::Base(_) = token? {
            if inside {
                continue;
            }
            match runs.last_mut() {
                Some(run) if run.end == start => run.end = start + 1,
                _ => runs.push(start..start + 1),
            }
        }
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(src: &str) -> MarkupResult<Vec<Token<'_>>> {
        Tokenizer::new(src).collect()
    }

    #[test]
    fn test_plain_bases() {
        let tokens = collect("acGT").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Base('a'),
                Token::Base('c'),
                Token::Base('G'),
                Token::Base('T')
            ]
        );
    }

    #[test]
    fn test_markup_token() {
        let tokens = collect("A\\pdfcomment[date]{Primer 1F}\\hl{CG}t").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Base('A'),
                Token::MarkupOpen(Annotation {
                    options: Some("date"),
                    text: "Primer 1F"
                }),
                Token::Base('C'),
                Token::Base('G'),
                Token::MarkupClose,
                Token::Base('t'),
            ]
        );
    }

    #[test]
    fn test_display_text_with_braces_and_escapes() {
        let tokens = collect("\\pdfcomment{Frag {a}\\_b}\\hl{A}").unwrap();
        assert_eq!(
            tokens[0],
            Token::MarkupOpen(Annotation {
                options: None,
                text: "Frag {a}\\_b"
            })
        );
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_unterminated_highlight() {
        let result = collect("AC\\pdfcomment{x}\\hl{GT");
        assert_eq!(result, Err(MarkupError::Unterminated { position: 2 }));
    }

    #[test]
    fn test_unterminated_display_text() {
        let result = collect("\\pdfcomment{never closed");
        assert_eq!(result, Err(MarkupError::Unterminated { position: 0 }));
    }

    #[test]
    fn test_missing_highlight_wrapper() {
        let result = collect("\\pdfcomment{x}GT");
        assert!(matches!(
            result,
            Err(MarkupError::Expected { expected: "\\hl{", .. })
        ));
    }

    #[test]
    fn test_unknown_directive_and_nesting() {
        assert_eq!(
            collect("A\\textbf{A}"),
            Err(MarkupError::UnknownDirective { position: 1 })
        );
        assert!(matches!(
            collect("\\pdfcomment{x}\\hl{A\\pdfcomment{y}\\hl{C}}"),
            Err(MarkupError::Nested { .. })
        ));
    }

    #[test]
    fn test_unexpected_characters() {
        assert_eq!(
            collect("AC GT"),
            Err(MarkupError::UnexpectedChar {
                found: ' ',
                position: 2
            })
        );
        assert!(matches!(
            collect("AC}"),
            Err(MarkupError::UnexpectedChar { found: '}', .. })
        ));
    }

    #[test]
    fn test_tokenizer_stops_after_error() {
        let mut tokens = Tokenizer::new("A?C");
        assert!(matches!(tokens.next(), Some(Ok(Token::Base('A')))));
        assert!(matches!(tokens.next(), Some(Err(_))));
        assert!(tokens.next().is_none());
    }

    #[test]
    fn test_highlight_and_strip() {
        let token = highlight(Some("date"), "Primer 3R", "GATTACA");
        assert_eq!(token, "\\pdfcomment[date]{Primer 3R}\\hl{GATTACA}");

        let decorated = format!("cc{token}gg");
        assert_eq!(strip_markup(&decorated).unwrap(), "ccGATTACAgg");
    }

    #[test]
    fn test_plain_runs_skip_markup() {
        let decorated = format!("AC{}GT", highlight(None, "p", "TT"));
        let runs = plain_runs(&decorated).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(&decorated[runs[0].clone()], "AC");
        assert_eq!(&decorated[runs[1].clone()], "GT");
    }
}
